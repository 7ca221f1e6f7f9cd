//! Network simulation core module.
//!
//! This module provides the complete discrete-event infrastructure for one
//! directional-antenna cell. It integrates:
//! - A picosecond clock and a deterministic event queue
//! - Antenna gain patterns and beam steering
//! - Path loss, propagation delay and SINR-based reception
//! - Client and access point MAC state machines
//! - Upper-layer traffic sources and result tracing
//!
//! ## Module Organization
//!
//! - `time`, `scheduler`: Simulated clock and timer queue
//! - `geometry`, `antenna`: Positions, bearings and directional gain
//! - `signal_calculations`: Link budget, noise and airtime formulas
//! - `frame`, `phy`, `channel`: Frames on the air and their reception
//! - `mac`: Discovery, handshakes, queues and retries
//! - `traffic`: Packet arrival processes
//! - `trace`: Result, discovery and rediscovery records
//! - `network`: World assembly and the event loop
//!
//! ## Public API
//!
//! The main entry point is `network::Network`, built from a scene and a
//! configuration and driven with `run`.

pub mod antenna;
pub mod channel;
pub mod frame;
pub mod geometry;
pub mod mac;
pub mod network;
pub mod phy;
pub mod scheduler;
pub mod signal_calculations;
pub mod time;
pub mod trace;
pub mod traffic;
pub mod types;
