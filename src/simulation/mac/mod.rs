//! Medium access control roles.
//!
//! Two roles share one event interface:
//! - `client`: beam discovery, link watchdog and the 1-way / 3-way handshake initiator
//! - `access_point`: sector sweep, beacons and handshake responder
//!
//! Handlers never reach for global state. Everything they may touch (clock,
//! antenna, radio, scheduler, randomness, trace sinks) arrives in a
//! [`MacContext`] built by the network for the duration of one call.

pub mod access_point;
pub mod client;
pub mod discovery;
pub mod queue;
pub mod watchdog;

use rand::rngs::StdRng;

use super::antenna::DirectionalAntenna;
use super::frame::{FrameIdAllocator, FrameKind, MacFrame};
use super::geometry::Position;
use super::phy::PhyLayer;
use super::scheduler::{Scheduler, TimerHandle, TimerSlot};
use super::time::{SimDuration, SimTime};
use super::trace::SimulationContext;
use super::types::{Event, PhyHandle, StationId};
use crate::control::config::SimulationConfig;

pub use access_point::AccessPointMac;
pub use client::ClientMac;

/// MAC-owned timers. Each variant is delivered back to the role that armed it.
#[derive(Debug, Clone, PartialEq)]
pub enum MacTimer {
    /// Client: step the discovery scan.
    SectorTimeout,
    /// Client: no beacon within the adaptive link timeout.
    LinkTimeout,
    /// Client: induced relocation after a first discovery.
    LocationChange,
    /// Client: backoff elapsed, request the medium for a queue entry.
    SendRts { sequence: u16 },
    /// Client: answer a dummy beacon.
    SendSectorReport { access_point: StationId },
    /// Client: transmit the DATA frame of a queue entry.
    SendData { sequence: u16, mcs: u8 },
    /// Client: DATA went unacknowledged.
    AckTimeout { sequence: u16 },
    /// Access point: move to the next sector and beacon.
    NextSector,
    /// Access point: grant the medium to a requester.
    SendCts { destination: StationId, sequence: u16, wait: SimDuration },
    /// Access point: acknowledge a DATA frame.
    SendAck { destination: StationId, sequence: u16 },
    /// Access point: tell a client which sector it was heard in.
    SendFeedback { destination: StationId, sector: u16 },
}

/// Per-call view of the resources a MAC handler may use.
pub struct MacContext<'a> {
    pub station: StationId,
    pub handle: PhyHandle,
    pub position: &'a mut Position,
    pub antenna: &'a mut DirectionalAntenna,
    pub phy: &'a mut dyn PhyLayer,
    pub scheduler: &'a mut Scheduler<Event>,
    pub rng: &'a mut StdRng,
    pub frame_ids: &'a mut FrameIdAllocator,
    pub trace: &'a mut SimulationContext,
}

impl MacContext<'_> {
    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn schedule(&mut self, delay: SimDuration, timer: MacTimer) -> TimerHandle {
        self.scheduler.schedule(
            delay,
            Event::Mac {
                station: self.handle,
                timer,
            },
        )
    }

    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        self.scheduler.cancel(handle)
    }

    /// Cancel whatever `slot` holds and arm it with a new timer.
    pub fn rearm(&mut self, slot: &mut TimerSlot, delay: SimDuration, timer: MacTimer) {
        slot.cancel(self.scheduler);
        let handle = self.schedule(delay, timer);
        slot.arm(handle);
    }

    pub fn next_uid(&mut self) -> u64 {
        self.frame_ids.next_uid()
    }
}

/// Event interface shared by every MAC role.
pub trait MacProtocol {
    /// Called once when the simulation starts.
    fn start(&mut self, ctx: &mut MacContext<'_>);
    /// Offer an upper-layer packet. Returns whether it was queued.
    fn enqueue(&mut self, ctx: &mut MacContext<'_>, payload_bytes: u32) -> bool;
    /// The radio started receiving a frame.
    fn on_receive_start(&mut self, ctx: &mut MacContext<'_>, frame: &MacFrame);
    /// The radio finished receiving a frame; `decoded` is the PHY verdict.
    fn on_frame_received(&mut self, ctx: &mut MacContext<'_>, frame: &MacFrame, decoded: bool);
    fn on_transmit_complete(&mut self, ctx: &mut MacContext<'_>, uid: u64);
    fn on_timer_fired(&mut self, ctx: &mut MacContext<'_>, handle: TimerHandle, timer: MacTimer);
}

/// The role a station plays.
pub enum MacRole {
    Client(Box<ClientMac>),
    AccessPoint(Box<AccessPointMac>),
}

impl MacRole {
    pub fn as_client(&self) -> Option<&ClientMac> {
        match self {
            MacRole::Client(c) => Some(c),
            MacRole::AccessPoint(_) => None,
        }
    }

    pub fn as_access_point(&self) -> Option<&AccessPointMac> {
        match self {
            MacRole::AccessPoint(ap) => Some(ap),
            MacRole::Client(_) => None,
        }
    }

    fn inner(&mut self) -> &mut dyn MacProtocol {
        match self {
            MacRole::Client(c) => c.as_mut(),
            MacRole::AccessPoint(ap) => ap.as_mut(),
        }
    }
}

impl MacProtocol for MacRole {
    fn start(&mut self, ctx: &mut MacContext<'_>) {
        self.inner().start(ctx)
    }

    fn enqueue(&mut self, ctx: &mut MacContext<'_>, payload_bytes: u32) -> bool {
        self.inner().enqueue(ctx, payload_bytes)
    }

    fn on_receive_start(&mut self, ctx: &mut MacContext<'_>, frame: &MacFrame) {
        self.inner().on_receive_start(ctx, frame)
    }

    fn on_frame_received(&mut self, ctx: &mut MacContext<'_>, frame: &MacFrame, decoded: bool) {
        self.inner().on_frame_received(ctx, frame, decoded)
    }

    fn on_transmit_complete(&mut self, ctx: &mut MacContext<'_>, uid: u64) {
        self.inner().on_transmit_complete(ctx, uid)
    }

    fn on_timer_fired(&mut self, ctx: &mut MacContext<'_>, handle: TimerHandle, timer: MacTimer) {
        self.inner().on_timer_fired(ctx, handle, timer)
    }
}

/// Time a sector is held: every handshake frame's airtime plus propagation delay,
/// SIFS and the largest backoff.
pub fn sector_duration(phy: &dyn PhyLayer, config: &SimulationConfig, prop_delay: SimDuration, data_airtime: SimDuration) -> SimDuration {
    let per_frame = prop_delay + config.sifs() + config.max_backoff();
    let mut total = data_airtime + per_frame;
    for kind in [FrameKind::Cta, FrameKind::Rts, FrameKind::Cts, FrameKind::Ack] {
        total += phy.control_frame_airtime(kind) + per_frame;
    }
    total
}

/// Airtime of a DATA frame carrying the minimum enqueue payload.
pub fn reference_data_airtime(phy: &dyn PhyLayer, config: &SimulationConfig) -> SimDuration {
    phy.data_airtime(config.min_enqueue_bytes + super::frame::MAC_HEADER_BYTES, 0)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Minimal single-station harness for driving a MAC role by hand.

    use super::*;
    use crate::simulation::antenna::AntennaMode;
    use crate::simulation::phy::{SimplePhy, tests::test_params};
    use rand::SeedableRng;

    pub(crate) struct Bench {
        pub station: StationId,
        pub position: Position,
        pub antenna: DirectionalAntenna,
        pub phy: SimplePhy,
        pub scheduler: Scheduler<Event>,
        pub rng: StdRng,
        pub frame_ids: FrameIdAllocator,
        pub trace: SimulationContext,
    }

    impl Bench {
        pub(crate) fn new(station: StationId, mode: AntennaMode, position: Position) -> Self {
            Bench {
                station,
                position,
                antenna: DirectionalAntenna::new(mode, 12.0, 24.57).unwrap(),
                phy: SimplePhy::new(station, test_params()),
                scheduler: Scheduler::new(),
                rng: StdRng::seed_from_u64(42),
                frame_ids: FrameIdAllocator::default(),
                trace: SimulationContext::in_memory(),
            }
        }

        pub(crate) fn ctx(&mut self) -> MacContext<'_> {
            MacContext {
                station: self.station,
                handle: PhyHandle(0),
                position: &mut self.position,
                antenna: &mut self.antenna,
                phy: &mut self.phy,
                scheduler: &mut self.scheduler,
                rng: &mut self.rng,
                frame_ids: &mut self.frame_ids,
                trace: &mut self.trace,
            }
        }

        /// Frames handed to the radio since the last call.
        pub(crate) fn sent(&mut self) -> Vec<MacFrame> {
            self.phy.take_outgoing().into_iter().map(|t| t.frame).collect()
        }

        /// Advance to `until`, delivering MAC timers and completing transmissions
        /// after their airtime. Returns every frame put on air meanwhile.
        pub(crate) fn run_until<M: MacProtocol>(&mut self, mac: &mut M, until: SimTime) -> Vec<MacFrame> {
            let mut sent = Vec::new();
            self.launch_outgoing(&mut sent);
            while let Some(at) = self.scheduler.peek_deadline() {
                if at > until {
                    break;
                }
                let Some(fired) = self.scheduler.pop_next() else { break };
                match fired.event {
                    Event::Mac { timer, .. } => {
                        let mut ctx = self.ctx();
                        mac.on_timer_fired(&mut ctx, fired.handle, timer);
                    }
                    Event::TransmitDone { uid, .. } => {
                        let now = self.scheduler.now();
                        self.phy.on_transmit_complete(now, uid);
                        let mut ctx = self.ctx();
                        mac.on_transmit_complete(&mut ctx, uid);
                    }
                    _ => {}
                }
                self.launch_outgoing(&mut sent);
            }
            self.scheduler.advance_to(until);
            sent
        }

        fn launch_outgoing(&mut self, sent: &mut Vec<MacFrame>) {
            for t in self.phy.take_outgoing() {
                self.scheduler.schedule(
                    t.duration,
                    Event::TransmitDone {
                        station: PhyHandle(0),
                        uid: t.frame.uid,
                    },
                );
                sent.push(t.frame);
            }
        }

        /// Deliver a decoded frame to the MAC (receive start and completion at the current instant).
        pub(crate) fn deliver<M: MacProtocol>(&mut self, mac: &mut M, frame: &MacFrame) {
            let mut ctx = self.ctx();
            mac.on_receive_start(&mut ctx, frame);
            mac.on_frame_received(&mut ctx, frame, true);
        }
    }
}
