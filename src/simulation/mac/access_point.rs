//! Access point MAC.
//!
//! The access point listens through a directional receive beam that sweeps the
//! full circle at its own turning speed, one sector per sector period. Each
//! sector opens with a CTA broadcast; clients aligned with that sector answer
//! within the period. The period is independent of the client scan step, so
//! the two sweeps drift against each other and every bearing is eventually met.

use log::{debug, info, trace, warn};

use super::queue::SequenceTracker;
use super::{MacContext, MacProtocol, MacTimer, reference_data_airtime, sector_duration};
use crate::control::config::{Handshake, SimulationConfig};
use crate::simulation::antenna::{AntennaMode, Beam};
use crate::simulation::frame::{
    Address, CTA_FLAG_DUMMY, CTA_FLAG_FEEDBACK, CTA_FLAG_NORMAL, FrameKind, MacFrame, RTS_FLAG_SECTOR_REPORT,
};
use crate::simulation::phy::RateClass;
use crate::simulation::scheduler::{TimerHandle, TimerSlot};
use crate::simulation::time::SimDuration;
use crate::simulation::types::StationId;

pub struct AccessPointMac {
    id: StationId,
    config: SimulationConfig,
    handshake: Handshake,
    cell_propagation_delay: SimDuration,

    sectors: u16,
    sector: u16,
    /// Completed and current sweeps, starting at 1.
    sweep: u32,
    grants_in_sector: u32,
    sector_timer: TimerSlot,
    in_flight: Option<u64>,

    tracker: SequenceTracker,
    delivered: u64,
    duplicates: u64,

    t_sector: SimDuration,
    t_data: SimDuration,
}

impl AccessPointMac {
    pub fn new(id: StationId, config: SimulationConfig, handshake: Handshake, cell_propagation_delay: SimDuration) -> Self {
        AccessPointMac {
            id,
            config,
            handshake,
            cell_propagation_delay,
            sectors: 1,
            sector: 0,
            sweep: 0,
            grants_in_sector: 0,
            sector_timer: TimerSlot::default(),
            in_flight: None,
            tracker: SequenceTracker::default(),
            delivered: 0,
            duplicates: 0,
            t_sector: SimDuration::ZERO,
            t_data: SimDuration::ZERO,
        }
    }

    pub fn current_sector(&self) -> u16 {
        self.sector
    }

    pub fn sector_count(&self) -> u16 {
        self.sectors
    }

    pub fn sweep(&self) -> u32 {
        self.sweep
    }

    /// DATA frames delivered for the first time.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    pub fn sector_duration(&self) -> SimDuration {
        self.t_sector
    }

    /// Airtime budget of one granted exchange, used to stagger CTS waits.
    fn exchange_slot(&self, ctx: &MacContext<'_>) -> SimDuration {
        self.t_data
            + self.config.max_backoff()
            + ctx.phy.control_frame_airtime(FrameKind::Cts)
            + ctx.phy.control_frame_airtime(FrameKind::Ack)
    }

    fn is_dummy_sweep(&self) -> bool {
        self.config.dummy_cta_every.is_some_and(|every| self.sweep % every == 0)
    }

    fn open_sector(&mut self, ctx: &mut MacContext<'_>, sector: u16) {
        if sector == 0 {
            self.sweep += 1;
        }
        self.sector = sector;
        self.grants_in_sector = 0;
        let angle = sector as f64 * ctx.antenna.beamwidth_degrees();
        ctx.antenna.tune_orientation(Beam::Rx, angle);

        let mut cta = MacFrame::control(ctx.next_uid(), FrameKind::Cta, self.id, Address::Broadcast);
        cta.ways = self.handshake.ways();
        cta.sector = sector;
        cta.flags = if self.is_dummy_sweep() { CTA_FLAG_DUMMY } else { CTA_FLAG_NORMAL };
        trace!("[{}] Sector {} at {} (sweep {}, flags {})", self.id, sector, angle, self.sweep, cta.flags);
        self.send(ctx, cta);

        ctx.rearm(&mut self.sector_timer, self.t_sector, MacTimer::NextSector);
    }

    fn send(&mut self, ctx: &mut MacContext<'_>, frame: MacFrame) {
        let uid = frame.uid;
        let kind = frame.kind;
        let now = ctx.now();
        if ctx.phy.transmit(now, frame, RateClass::Basic, 0) {
            self.in_flight = Some(uid);
        } else {
            debug!("[{}] Radio busy, {:?} not sent", self.id, kind);
        }
    }

    fn receive_rts(&mut self, ctx: &mut MacContext<'_>, rts: &MacFrame) {
        if rts.flags == RTS_FLAG_SECTOR_REPORT {
            if self.config.sector_feedback {
                debug!("[{}] Sector report from {} in sector {}", self.id, rts.source, self.sector);
                ctx.schedule(
                    self.config.sifs(),
                    MacTimer::SendFeedback {
                        destination: rts.source,
                        sector: self.sector,
                    },
                );
            }
            return;
        }
        let wait = self.exchange_slot(ctx) * self.grants_in_sector as u64;
        self.grants_in_sector += 1;
        debug!("[{}] RTS {} from {}, CTS grants a wait of {}", self.id, rts.sequence, rts.source, wait);
        ctx.schedule(
            self.config.sifs(),
            MacTimer::SendCts {
                destination: rts.source,
                sequence: rts.sequence,
                wait,
            },
        );
    }

    fn receive_data(&mut self, ctx: &mut MacContext<'_>, data: &MacFrame) {
        if self.tracker.is_new(data.source, data.sequence) {
            self.delivered += 1;
            debug!("[{}] DATA {} from {} ({} bytes)", self.id, data.sequence, data.source, data.size_bytes);
        } else {
            self.duplicates += 1;
            debug!("[{}] Duplicate DATA {} from {}", self.id, data.sequence, data.source);
        }
        ctx.schedule(
            self.config.sifs(),
            MacTimer::SendAck {
                destination: data.source,
                sequence: data.sequence,
            },
        );
    }
}

impl MacProtocol for AccessPointMac {
    fn start(&mut self, ctx: &mut MacContext<'_>) {
        self.t_data = reference_data_airtime(ctx.phy, &self.config);
        self.sectors = (360.0 / ctx.antenna.beamwidth_degrees()).floor().max(1.0) as u16;
        self.t_sector = self.config.ap_sector_duration(self.sectors);
        let exchange = sector_duration(ctx.phy, &self.config, self.cell_propagation_delay, self.t_data);
        if self.t_sector < exchange {
            warn!(
                "[{}] Sector period {} is shorter than one exchange ({}), lower ap-turning-speed",
                self.id, self.t_sector, exchange
            );
        }
        ctx.antenna.set_mode(AntennaMode::DirectionalReceiver);
        ctx.antenna.set_turning_speed(self.config.ap_turning_speed);
        info!(
            "[{}] Access point up: {} sectors of {}, {:?}",
            self.id, self.sectors, self.t_sector, self.handshake
        );
        self.open_sector(ctx, 0);
    }

    fn enqueue(&mut self, _ctx: &mut MacContext<'_>, payload_bytes: u32) -> bool {
        trace!("[{}] Access point has no uplink queue, {} bytes dropped", self.id, payload_bytes);
        false
    }

    fn on_receive_start(&mut self, _ctx: &mut MacContext<'_>, frame: &MacFrame) {
        trace!("[{}] Receiving {:?} from {}", self.id, frame.kind, frame.source);
    }

    fn on_frame_received(&mut self, ctx: &mut MacContext<'_>, frame: &MacFrame, decoded: bool) {
        if !decoded {
            trace!("[{}] {:?} from {} not decoded, dropped", self.id, frame.kind, frame.source);
            return;
        }
        if !frame.is_for(self.id) {
            trace!("[{}] {:?} for {:?} ignored", self.id, frame.kind, frame.destination);
            return;
        }
        match frame.kind {
            FrameKind::Rts if self.handshake == Handshake::ThreeWay || frame.flags == RTS_FLAG_SECTOR_REPORT => {
                self.receive_rts(ctx, frame)
            }
            FrameKind::Data => self.receive_data(ctx, frame),
            other => debug!("[{}] Unexpected {:?} from {} at the access point", self.id, other, frame.source),
        }
    }

    fn on_transmit_complete(&mut self, _ctx: &mut MacContext<'_>, uid: u64) {
        if self.in_flight == Some(uid) {
            self.in_flight = None;
        } else {
            warn!("[{}] Transmit completion for uid {} does not match the frame in flight", self.id, uid);
        }
    }

    fn on_timer_fired(&mut self, ctx: &mut MacContext<'_>, handle: TimerHandle, timer: MacTimer) {
        match timer {
            MacTimer::NextSector => {
                if self.sector_timer.take_if_current(handle) {
                    let next = (self.sector + 1) % self.sectors;
                    self.open_sector(ctx, next);
                }
            }
            MacTimer::SendCts {
                destination,
                sequence,
                wait,
            } => {
                let mut cts = MacFrame::control(ctx.next_uid(), FrameKind::Cts, self.id, Address::Station(destination));
                cts.sequence = sequence;
                cts.duration = wait;
                self.send(ctx, cts);
            }
            MacTimer::SendAck { destination, sequence } => {
                let mut ack = MacFrame::control(ctx.next_uid(), FrameKind::Ack, self.id, Address::Station(destination));
                ack.sequence = sequence;
                self.send(ctx, ack);
            }
            MacTimer::SendFeedback { destination, sector } => {
                let mut cta = MacFrame::control(ctx.next_uid(), FrameKind::Cta, self.id, Address::Station(destination));
                cta.ways = self.handshake.ways();
                cta.flags = CTA_FLAG_FEEDBACK;
                cta.sector = sector;
                self.send(ctx, cta);
            }
            other => warn!("[{}] Client timer {:?} delivered to the access point", self.id, other),
        }
    }
}
