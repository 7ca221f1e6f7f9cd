//! Client station MAC.
//!
//! A client starts without knowing where the access point is. It sweeps its
//! transmit beam sector by sector until a beacon (CTA) is heard, then holds the
//! beam and contends for the medium on subsequent beacons:
//!
//! - 3-way: beacon → random backoff → RTS → CTS (with wait and optional MCS hint) → DATA → ACK
//! - 1-way: beacon → fairness delay + random backoff → DATA → ACK
//!
//! A link watchdog derived from recent beacon spacing sends the client back to
//! discovery when the access point goes quiet. Each queued packet ends in
//! exactly one result record, either delivered or discarded after the retry
//! limit of the phase that failed.

use log::{debug, error, info, trace, warn};
use rand::Rng;
use std::collections::VecDeque;

use super::discovery::DiscoveryScan;
use super::queue::{AckWait, QueueEntry};
use super::watchdog::LinkWatchdog;
use super::{MacContext, MacProtocol, MacTimer, reference_data_airtime, sector_duration};
use crate::control::config::{Handshake, SimulationConfig};
use crate::simulation::antenna::{AntennaMode, Beam};
use crate::simulation::frame::{
    Address, CTA_FLAG_DUMMY, CTA_FLAG_FEEDBACK, FrameKind, MAC_HEADER_BYTES, MCS_HINT_RANGE, MacFrame,
    RTS_FLAG_SECTOR_REPORT,
};
use crate::simulation::geometry::{Position, distance};
use crate::simulation::phy::RateClass;
use crate::simulation::scheduler::{TimerHandle, TimerSlot};
use crate::simulation::signal_calculations::SPEED_OF_LIGHT;
use crate::simulation::time::{SimDuration, SimTime};
use crate::simulation::trace::{DiscoveryRecord, RediscoveryRecord, ResultRecord};
use crate::simulation::types::StationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    ApDiscovery,
    Idle,
    WaitTx,
    Tx,
    WaitAck,
    Rx,
    Backoff,
    Collision,
}

/// Where the client's access point is and how far away the farthest client can be.
#[derive(Debug, Clone)]
pub struct ClientSetup {
    pub access_point: StationId,
    pub access_point_position: Position,
    /// One-way propagation delay across the cell.
    pub cell_propagation_delay: SimDuration,
    /// Fixed starting orientation; a random multiple of the beamwidth when absent.
    pub initial_orientation: Option<f64>,
}

pub struct ClientMac {
    id: StationId,
    setup: ClientSetup,
    config: SimulationConfig,
    handshake: Handshake,
    state: ClientState,

    queue: VecDeque<QueueEntry>,
    sequence: u16,
    ack_waits: Vec<AckWait>,
    /// Sequence whose backoff is counting down, if any.
    backoff: Option<u16>,
    rts_answered: bool,
    last_rts_sequence: u16,
    cts_received: u32,
    cts_received_at: SimTime,
    assigned_sector: Option<u16>,
    in_flight: Option<(u64, FrameKind)>,

    scan: DiscoveryScan,
    watchdog: LinkWatchdog,
    sector_timer: TimerSlot,
    link_timer: TimerSlot,
    send_data_timer: TimerSlot,
    link_lost_at: Option<SimTime>,
    relocations: u32,

    t_sector: SimDuration,
    t_data: SimDuration,
}

impl ClientMac {
    pub fn new(id: StationId, setup: ClientSetup, config: SimulationConfig, handshake: Handshake) -> Self {
        let watchdog = LinkWatchdog::new(config.link_timeout_floor());
        ClientMac {
            id,
            setup,
            handshake,
            state: ClientState::ApDiscovery,
            queue: VecDeque::new(),
            sequence: 0,
            ack_waits: Vec::new(),
            backoff: None,
            rts_answered: true,
            last_rts_sequence: 0,
            cts_received: 0,
            cts_received_at: SimTime::ZERO,
            assigned_sector: None,
            in_flight: None,
            scan: DiscoveryScan::new(0.0, 0.0, config.full_step_rounds),
            watchdog,
            sector_timer: TimerSlot::default(),
            link_timer: TimerSlot::default(),
            send_data_timer: TimerSlot::default(),
            link_lost_at: None,
            relocations: 0,
            t_sector: SimDuration::ZERO,
            t_data: SimDuration::ZERO,
            config,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_head(&self) -> Option<&QueueEntry> {
        self.queue.front()
    }

    pub fn scan(&self) -> &DiscoveryScan {
        &self.scan
    }

    pub fn sector_duration(&self) -> SimDuration {
        self.t_sector
    }

    pub fn link_timeout(&self) -> SimDuration {
        self.watchdog.timeout()
    }

    pub fn assigned_sector(&self) -> Option<u16> {
        self.assigned_sector
    }

    pub fn backoff_active(&self) -> bool {
        self.backoff.is_some()
    }

    fn entry_mut(&mut self, sequence: u16) -> Option<&mut QueueEntry> {
        self.queue.iter_mut().find(|e| e.sequence == sequence)
    }

    fn random_backoff(&self, ctx: &mut MacContext<'_>) -> SimDuration {
        let slots = ctx.rng.gen_range(1..=self.config.bo_slots);
        self.config.slot_time() * slots as u64
    }

    // ---------------------------------------------------------------- discovery

    fn turn_tx_antenna(&mut self, ctx: &mut MacContext<'_>) {
        if self.state != ClientState::ApDiscovery {
            trace!("[{}] Not in discovery ({:?}), keeping beam at {}", self.id, self.state, self.scan.angle());
            return;
        }
        let angle = self.scan.advance();
        ctx.antenna.tune_orientation(Beam::Tx, angle);
        trace!("[{}] Discovery: beam to {} (round {})", self.id, angle, self.scan.rounds());
        ctx.rearm(&mut self.sector_timer, self.t_sector, MacTimer::SectorTimeout);
    }

    fn sector_timeout(&mut self, ctx: &mut MacContext<'_>) {
        if self.state == ClientState::ApDiscovery {
            self.turn_tx_antenna(ctx);
        } else {
            trace!("[{}] Sector timeout outside discovery, facing access point at {}", self.id, self.scan.angle());
        }
    }

    fn link_lost(&mut self, ctx: &mut MacContext<'_>) {
        let now = ctx.now();
        info!("[{}] Link to access point lost at {} (timeout {})", self.id, now, self.watchdog.timeout());
        self.link_lost_at = Some(now);
        self.state = ClientState::ApDiscovery;
        self.assigned_sector = None;
        self.scan.restart_forward();
        self.turn_tx_antenna(ctx);
    }

    fn location_change(&mut self, ctx: &mut MacContext<'_>) {
        self.relocations += 1;
        let previous = *ctx.position;
        *ctx.position = previous.mirrored();
        self.scan.reset();
        info!(
            "[{}] Relocated from ({:.3}, {:.3}) to ({:.3}, {:.3}) at {}",
            self.id,
            previous.x,
            previous.y,
            ctx.position.x,
            ctx.position.y,
            ctx.now()
        );
    }

    // ---------------------------------------------------------------- beacons

    fn receive_cta3(&mut self, ctx: &mut MacContext<'_>, cta: &MacFrame) {
        let now = ctx.now();
        self.sector_timer.cancel(ctx.scheduler);
        let timeout = self.watchdog.observe_beacon(now, ctx.position);

        if self.state == ClientState::ApDiscovery {
            if let Some(lost_at) = self.link_lost_at {
                let latency = now - lost_at;
                info!("[{}] Rediscovered access point at {} after {}", self.id, self.scan.angle(), latency);
                ctx.trace.record_rediscovery(RediscoveryRecord { station: self.id, latency });
            }
        }
        self.link_timer.cancel(ctx.scheduler);

        if self.state == ClientState::ApDiscovery {
            self.state = ClientState::Idle;
            if self.link_lost_at.is_none() {
                info!(
                    "[{}] Discovered access point at {} after {} rounds, t={}",
                    self.id,
                    self.scan.angle(),
                    self.scan.rounds(),
                    now
                );
                ctx.trace.record_discovery(DiscoveryRecord {
                    station: self.id,
                    rounds: self.scan.rounds(),
                    angle_degrees: self.scan.angle(),
                    at: now,
                });
                self.scan.reset_rounds();
                if let Some(delay) = self.config.relocate_after_discovery() {
                    if self.id % 2 == 0 && self.relocations == 0 {
                        ctx.schedule(delay, MacTimer::LocationChange);
                    }
                }
            }
        }
        self.link_lost_at = None;
        ctx.rearm(&mut self.link_timer, timeout, MacTimer::LinkTimeout);

        if cta.flags == CTA_FLAG_DUMMY {
            let wait = self.random_backoff(ctx);
            debug!("[{}] Dummy CTA, sector report in {}", self.id, wait);
            ctx.schedule(wait, MacTimer::SendSectorReport { access_point: cta.source });
            return;
        }
        if cta.flags == CTA_FLAG_FEEDBACK && cta.is_for(self.id) {
            info!("[{}] Assigned sector {}", self.id, cta.sector);
            self.assigned_sector = Some(cta.sector);
            return;
        }
        let Some(head_sequence) = self.queue.front().map(|e| e.sequence) else {
            trace!("[{}] CTA received, queue empty", self.id);
            return;
        };
        if !self.rts_answered {
            debug!("[{}] RTS {} went unanswered", self.id, self.last_rts_sequence);
            self.cts_timeout(ctx, self.last_rts_sequence);
            self.rts_answered = true;
        }
        if self.backoff.is_some() {
            self.decrease_backoff();
            return;
        }
        self.cts_received = 0;
        if let Some(sector) = self.assigned_sector {
            if sector != cta.sector {
                trace!("[{}] CTA for sector {}, assigned {}", self.id, cta.sector, sector);
                return;
            }
        }
        // The unanswered-RTS path may have discarded the head entry
        let Some(head) = self.queue.front() else {
            return;
        };
        let sequence = head.sequence;
        let wait = self.random_backoff(ctx);
        self.state = ClientState::WaitTx;
        ctx.schedule(wait, MacTimer::SendRts { sequence });
        self.last_rts_sequence = sequence;
        self.rts_answered = false;
        debug!("[{}] CTA received, RTS for {} (head {}) in {}", self.id, sequence, head_sequence, wait);
    }

    fn receive_cta1(&mut self, ctx: &mut MacContext<'_>) {
        self.state = ClientState::Idle;
        let Some(sequence) = self.queue.front().map(|e| e.sequence) else {
            trace!("[{}] CTA received, queue empty", self.id);
            return;
        };
        if self.backoff.is_some() {
            self.decrease_backoff();
            return;
        }
        // Closer clients wait longer so every DATA frame reaches the access point at the same instant
        let d = distance(ctx.position, &self.setup.access_point_position);
        let round_trip = SimDuration::from_secs_f64(2.0 * d / SPEED_OF_LIGHT);
        let fairness = (self.setup.cell_propagation_delay * 2).saturating_sub(round_trip);
        let wait = fairness + self.random_backoff(ctx);
        self.state = ClientState::WaitTx;
        self.cts_received_at = ctx.now();
        debug!("[{}] CTA received, DATA {} in {}", self.id, sequence, wait);
        ctx.rearm(&mut self.send_data_timer, wait, MacTimer::SendData { sequence, mcs: 0 });
    }

    fn decrease_backoff(&mut self) {
        let Some(sequence) = self.backoff else { return };
        match self.entry_mut(sequence) {
            Some(entry) => {
                entry.backoff_life = entry.backoff_life.saturating_sub(1);
                let remaining = entry.backoff_life;
                if remaining == 0 {
                    self.backoff = None;
                }
                trace!("[{}] Backoff for {}: {} beacons left", self.id, sequence, remaining);
            }
            None => {
                error!("[{}] Backoff refers to sequence {} which is not queued", self.id, sequence);
                self.backoff = None;
            }
        }
    }

    // ---------------------------------------------------------------- handshake

    fn receive_cts(&mut self, ctx: &mut MacContext<'_>, cts: &MacFrame) {
        self.state = ClientState::Idle;
        self.cts_received += 1;
        if !cts.is_for(self.id) {
            trace!("[{}] CTS for {:?} overheard", self.id, cts.destination);
            return;
        }
        if self.queue.iter().any(|e| e.sequence == cts.sequence) {
            self.rts_answered = true;
            self.cts_received_at = ctx.now();
            let mcs = if MCS_HINT_RANGE.contains(&cts.flags) { cts.flags } else { 0 };
            debug!("[{}] CTS for {}, DATA in {} (mcs {})", self.id, cts.sequence, cts.duration, mcs);
            ctx.schedule(cts.duration, MacTimer::SendData { sequence: cts.sequence, mcs });
        } else {
            warn!("[{}] CTS for unknown sequence {}", self.id, cts.sequence);
        }
    }

    fn send_rts(&mut self, ctx: &mut MacContext<'_>, sequence: u16) {
        let Some(entry) = self.queue.iter().find(|e| e.sequence == sequence) else {
            debug!("[{}] RTS for {} no longer needed", self.id, sequence);
            return;
        };
        let mut rts = MacFrame::control(ctx.next_uid(), FrameKind::Rts, self.id, Address::Station(self.setup.access_point));
        rts.sequence = sequence;
        rts.retry = entry.retry;
        self.send_packet(ctx, rts, RateClass::Basic, 0);
    }

    fn send_sector_report(&mut self, ctx: &mut MacContext<'_>, access_point: StationId) {
        let mut rts = MacFrame::control(ctx.next_uid(), FrameKind::Rts, self.id, Address::Station(access_point));
        rts.flags = RTS_FLAG_SECTOR_REPORT;
        self.send_packet(ctx, rts, RateClass::Basic, 0);
    }

    fn send_data(&mut self, ctx: &mut MacContext<'_>, sequence: u16, mcs: u8) {
        self.state = ClientState::WaitTx;
        let Some(entry) = self.queue.iter().find(|e| e.sequence == sequence) else {
            debug!("[{}] DATA {} no longer queued", self.id, sequence);
            self.state = ClientState::Idle;
            return;
        };
        let payload = entry.size_bytes - MAC_HEADER_BYTES;
        let mut data = MacFrame::data(ctx.next_uid(), self.id, self.setup.access_point, sequence, payload);
        data.retry = entry.retry;
        if !self.send_packet(ctx, data, RateClass::Data, mcs) {
            self.state = ClientState::Idle;
            return;
        }
        let now = ctx.now();
        let ack_airtime = ctx.phy.control_frame_airtime(FrameKind::Ack);
        let t_prop = self.setup.cell_propagation_delay;
        let ack_timeout = match self.handshake {
            Handshake::ThreeWay => {
                let per_grant = self.t_data + self.config.max_backoff() + ctx.phy.control_frame_airtime(FrameKind::Cts) + ack_airtime;
                let budget = per_grant * self.cts_received as u64 + t_prop + self.config.sifs() + t_prop + SimDuration::from_nanos(10);
                budget.saturating_sub(now - self.cts_received_at)
            }
            Handshake::OneWay => self.t_data + t_prop + self.config.sifs() + ack_airtime + t_prop + SimDuration::from_nanos(1),
        };
        let timer = ctx.schedule(ack_timeout, MacTimer::AckTimeout { sequence });
        self.ack_waits.push(AckWait { sequence, timer });
        trace!("[{}] DATA {} sent, ACK timeout in {}", self.id, sequence, ack_timeout);
    }

    /// Hand a frame to the radio if the state allows it.
    fn send_packet(&mut self, ctx: &mut MacContext<'_>, frame: MacFrame, rate: RateClass, mcs: u8) -> bool {
        if !matches!(self.state, ClientState::Idle | ClientState::WaitTx) {
            debug!("[{}] Cannot send {:?} in state {:?}", self.id, frame.kind, self.state);
            return false;
        }
        let uid = frame.uid;
        let kind = frame.kind;
        let now = ctx.now();
        if ctx.phy.transmit(now, frame, rate, mcs) {
            self.state = ClientState::Tx;
            self.in_flight = Some((uid, kind));
            true
        } else {
            debug!("[{}] Radio refused {:?}", self.id, kind);
            self.state = ClientState::Idle;
            false
        }
    }

    fn receive_ack(&mut self, ctx: &mut MacContext<'_>, ack: &MacFrame) {
        if !ack.is_for(self.id) {
            trace!("[{}] ACK for {:?} overheard", self.id, ack.destination);
            return;
        }
        self.state = ClientState::Idle;
        let Some(index) = self.ack_waits.iter().position(|w| w.sequence == ack.sequence) else {
            debug!("[{}] ACK for {} without pending wait", self.id, ack.sequence);
            return;
        };
        let wait = self.ack_waits.remove(index);
        ctx.cancel(wait.timer);
        self.finish(ctx, ack.sequence, true);
    }

    /// Emit the single result record of a queue entry and drop it.
    fn finish(&mut self, ctx: &mut MacContext<'_>, sequence: u16, success: bool) {
        let Some(index) = self.queue.iter().position(|e| e.sequence == sequence) else {
            warn!("[{}] Finalizing unknown sequence {}", self.id, sequence);
            return;
        };
        let Some(entry) = self.queue.remove(index) else { return };
        if self.backoff == Some(sequence) {
            self.backoff = None;
        }
        let payload_bytes = entry.reported_payload_bytes();
        let delay = if success { ctx.now() - entry.enqueued_at } else { SimDuration::ZERO };
        if success {
            info!("[{}] Packet {} delivered, {} bytes in {}", self.id, sequence, payload_bytes, delay);
            if !delay.is_zero() {
                ctx.trace.record_throughput(self.id, payload_bytes as f64 * 8.0 / delay.as_secs_f64());
            }
        } else {
            warn!("[{}] Packet {} discarded after {} retries", self.id, sequence, entry.retry);
        }
        ctx.trace.record_result(ResultRecord {
            station: self.id,
            payload_bytes,
            delay,
            success,
            discard: !success,
        });
    }

    /// Shared retry policy of both timeout paths.
    fn retry_or_discard(&mut self, ctx: &mut MacContext<'_>, sequence: u16, limit: u16) {
        let draw = |retry: u16, ctx: &mut MacContext<'_>| ctx.rng.gen_range(1..=(1u32 << retry.min(31)));
        let Some(entry) = self.entry_mut(sequence) else {
            debug!("[{}] Timeout for {} which is no longer queued", self.id, sequence);
            return;
        };
        entry.retry += 1;
        let retry = entry.retry;
        ctx.trace.record_collision(self.id);
        if retry >= limit {
            self.finish(ctx, sequence, false);
            return;
        }
        let life = draw(retry, ctx);
        if let Some(entry) = self.entry_mut(sequence) {
            entry.backoff_life = life;
        }
        self.backoff = Some(sequence);
        debug!("[{}] Retry {} for {}, backing off {} beacons", self.id, retry, sequence, life);
    }

    fn cts_timeout(&mut self, ctx: &mut MacContext<'_>, sequence: u16) {
        self.state = ClientState::Idle;
        self.retry_or_discard(ctx, sequence, self.config.rts_retry_limit);
        self.cts_received = 0;
    }

    fn ack_timeout(&mut self, ctx: &mut MacContext<'_>, handle: TimerHandle, sequence: u16) {
        let Some(index) = self.ack_waits.iter().position(|w| w.sequence == sequence && w.timer == handle) else {
            trace!("[{}] Stale ACK timeout for {}", self.id, sequence);
            return;
        };
        self.ack_waits.remove(index);
        self.state = ClientState::Idle;
        if self.handshake == Handshake::ThreeWay {
            error!("[{}] ACK for {} missing after a granted CTS", self.id, sequence);
        }
        self.retry_or_discard(ctx, sequence, self.config.data_retry_limit);
    }
}

impl MacProtocol for ClientMac {
    fn start(&mut self, ctx: &mut MacContext<'_>) {
        self.t_data = reference_data_airtime(ctx.phy, &self.config);
        self.t_sector = sector_duration(ctx.phy, &self.config, self.setup.cell_propagation_delay, self.t_data);

        let beamwidth = ctx.antenna.beamwidth_degrees();
        let initial = match self.setup.initial_orientation {
            Some(angle) => angle,
            None => {
                let steps = (360.0 / beamwidth).floor() as u32;
                ctx.rng.gen_range(0..=steps) as f64 * beamwidth
            }
        };
        self.scan = DiscoveryScan::new(beamwidth, initial, self.config.full_step_rounds);
        ctx.antenna.set_mode(AntennaMode::DirectionalTransmitter);
        ctx.antenna.tune_orientation(Beam::Tx, initial);

        let sectors = (360.0 / beamwidth).floor().max(1.0) as u64;
        let circle = self.t_sector * sectors;
        if !circle.is_zero() {
            ctx.antenna.set_turning_speed(1.0 / circle.as_secs_f64());
        }
        self.state = ClientState::ApDiscovery;
        info!(
            "[{}] Client up: initial angle {}, sector time {}, full circle {}, {:?}",
            self.id, initial, self.t_sector, circle, self.handshake
        );
        self.turn_tx_antenna(ctx);
    }

    fn enqueue(&mut self, ctx: &mut MacContext<'_>, payload_bytes: u32) -> bool {
        if payload_bytes < self.config.min_enqueue_bytes {
            trace!("[{}] Payload of {} bytes below minimum, dropped", self.id, payload_bytes);
            return false;
        }
        if self.queue.len() >= self.config.queue_limit {
            debug!("[{}] Queue full, payload dropped", self.id);
            return false;
        }
        self.sequence = self.sequence.wrapping_add(1);
        self.queue.push_back(QueueEntry {
            sequence: self.sequence,
            size_bytes: payload_bytes + MAC_HEADER_BYTES,
            enqueued_at: ctx.now(),
            retry: 0,
            backoff_life: 0,
        });
        trace!("[{}] Enqueued {} ({} bytes), queue {}", self.id, self.sequence, payload_bytes, self.queue.len());
        true
    }

    fn on_receive_start(&mut self, ctx: &mut MacContext<'_>, frame: &MacFrame) {
        // Channel busy: a pending 1-way DATA must not be sent into it
        if self.send_data_timer.cancel(ctx.scheduler) {
            debug!("[{}] Channel busy, pending DATA cancelled", self.id);
        }
        if matches!(
            self.state,
            ClientState::WaitTx | ClientState::Rx | ClientState::Backoff | ClientState::Idle
        ) {
            self.state = ClientState::Rx;
        }
        trace!("[{}] Receiving {:?} from {}", self.id, frame.kind, frame.source);
    }

    fn on_frame_received(&mut self, ctx: &mut MacContext<'_>, frame: &MacFrame, decoded: bool) {
        let expected = matches!(self.state, ClientState::ApDiscovery | ClientState::Rx)
            || (self.state == ClientState::WaitAck && frame.kind == FrameKind::Ack);
        if !expected {
            debug!("[{}] {:?} from {} arrived in state {:?}, ignored", self.id, frame.kind, frame.source, self.state);
            return;
        }
        if !decoded {
            trace!("[{}] {:?} from {} not decoded, dropped", self.id, frame.kind, frame.source);
            return;
        }
        match frame.kind {
            FrameKind::Rts | FrameKind::Data => {
                debug!("[{}] Unexpected {:?} at a client", self.id, frame.kind);
            }
            FrameKind::Cta => match self.handshake {
                Handshake::OneWay => self.receive_cta1(ctx),
                Handshake::ThreeWay => self.receive_cta3(ctx, frame),
            },
            FrameKind::Cts => self.receive_cts(ctx, frame),
            FrameKind::Ack => self.receive_ack(ctx, frame),
        }
    }

    fn on_transmit_complete(&mut self, _ctx: &mut MacContext<'_>, uid: u64) {
        match self.in_flight {
            Some((current, kind)) if current == uid && self.state == ClientState::Tx => {
                self.in_flight = None;
                self.state = if kind == FrameKind::Data {
                    ClientState::WaitAck
                } else {
                    ClientState::Idle
                };
            }
            _ => warn!(
                "[{}] Transmit completion for uid {} in state {:?} does not match the frame in flight",
                self.id, uid, self.state
            ),
        }
    }

    fn on_timer_fired(&mut self, ctx: &mut MacContext<'_>, handle: TimerHandle, timer: MacTimer) {
        match timer {
            MacTimer::SectorTimeout => {
                if self.sector_timer.take_if_current(handle) {
                    self.sector_timeout(ctx);
                }
            }
            MacTimer::LinkTimeout => {
                if self.link_timer.take_if_current(handle) {
                    self.link_lost(ctx);
                }
            }
            MacTimer::SendData { sequence, mcs } => {
                // 1-way sends go through the cancellable slot, CTS-granted sends do not
                if self.handshake == Handshake::OneWay && !self.send_data_timer.take_if_current(handle) {
                    return;
                }
                self.send_data(ctx, sequence, mcs);
            }
            MacTimer::LocationChange => self.location_change(ctx),
            MacTimer::SendRts { sequence } => self.send_rts(ctx, sequence),
            MacTimer::SendSectorReport { access_point } => self.send_sector_report(ctx, access_point),
            MacTimer::AckTimeout { sequence } => self.ack_timeout(ctx, handle, sequence),
            other => warn!("[{}] Access point timer {:?} delivered to a client", self.id, other),
        }
    }
}
