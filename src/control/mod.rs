//! Run configuration: protocol timing, handshake variant and output options.

pub mod config;
