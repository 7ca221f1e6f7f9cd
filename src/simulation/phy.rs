//! Physical layer model.
//!
//! The MAC talks to the radio only through [`PhyLayer`]. The default
//! [`SimplePhy`] is half-duplex and decides decode success from the SINR of
//! each reception:
//! - Interference is the mW sum of every reception that overlapped in time
//! - A frame starting while another decodable frame is already being received
//!   is lost unless it is at least `CAPTURE_THRESHOLD_DB` stronger
//! - Anything arriving while the station transmits is lost

use log::trace;
use serde::Deserialize;

use super::frame::{FrameKind, MacFrame};
use super::signal_calculations::{airtime, dbm_to_mw, mw_to_dbm, sinr_threshold_db, thermal_noise_floor_dbm};
use super::time::{SimDuration, SimTime};
use super::types::StationId;

/// A later frame must exceed the locked one by this margin to capture the receiver.
const CAPTURE_THRESHOLD_DB: f64 = 6.0;

/// Rate class requested for a transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateClass {
    /// Control frames.
    Basic,
    /// Payload-carrying frames; may be refined by an MCS index.
    Data,
}

/// One modulation-and-coding profile, selected by MCS index 10 + position.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct McsProfile {
    pub rate_bps: f64,
    /// Required Eb/N0 in dB.
    pub bit_energy_db: f64,
}

fn default_temperature() -> f64 {
    300.0
}

fn default_noise_figure() -> f64 {
    7.0
}

fn default_mcs_profiles() -> Vec<McsProfile> {
    [(52.4e9, 10.6), (105.28e9, 10.6), (157.44e9, 14.0), (210.24e9, 14.4), (315.52e9, 18.8)]
        .into_iter()
        .map(|(rate_bps, bit_energy_db)| McsProfile { rate_bps, bit_energy_db })
        .collect()
}

/// Radio parameters shared by every station in a scene.
#[derive(Debug, Clone, Deserialize)]
pub struct PhyParameters {
    pub tx_power_dbm: f64,
    pub basic_rate_bps: f64,
    pub data_rate_bps: f64,
    pub bandwidth_hz: f64,
    /// Required Eb/N0 in dB at the default rates.
    pub bit_energy_db: f64,
    #[serde(default = "default_temperature")]
    pub temperature_k: f64,
    #[serde(default = "default_noise_figure")]
    pub noise_figure_db: f64,
    /// Profiles for MCS hints 10..=14, in order.
    #[serde(default = "default_mcs_profiles")]
    pub mcs_profiles: Vec<McsProfile>,
}

impl PhyParameters {
    /// Receiver noise floor (kTB plus noise figure) in dBm.
    pub fn noise_floor_dbm(&self) -> f64 {
        thermal_noise_floor_dbm(self.temperature_k, self.bandwidth_hz, self.noise_figure_db)
    }

    fn mcs_profile(&self, mcs: u8) -> Option<&McsProfile> {
        mcs.checked_sub(10).and_then(|i| self.mcs_profiles.get(i as usize))
    }

    pub fn rate_bps(&self, rate: RateClass, mcs: u8) -> f64 {
        match rate {
            RateClass::Basic => self.basic_rate_bps,
            RateClass::Data => self.mcs_profile(mcs).map(|p| p.rate_bps).unwrap_or(self.data_rate_bps),
        }
    }

    /// SINR needed to decode a frame of `kind` sent with `mcs`.
    pub fn sinr_threshold_db(&self, kind: FrameKind, mcs: u8) -> f64 {
        match (kind, self.mcs_profile(mcs)) {
            (FrameKind::Data, Some(p)) => sinr_threshold_db(p.bit_energy_db, p.rate_bps, self.bandwidth_hz),
            (FrameKind::Data, None) => sinr_threshold_db(self.bit_energy_db, self.data_rate_bps, self.bandwidth_hz),
            _ => sinr_threshold_db(self.bit_energy_db, self.basic_rate_bps, self.bandwidth_hz),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, v) in [
            ("basic_rate_bps", self.basic_rate_bps),
            ("data_rate_bps", self.data_rate_bps),
            ("bandwidth_hz", self.bandwidth_hz),
            ("temperature_k", self.temperature_k),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(format!("{} must be positive, got {}", name, v));
            }
        }
        if self.mcs_profiles.iter().any(|p| !(p.rate_bps.is_finite() && p.rate_bps > 0.0)) {
            return Err("every MCS profile needs a positive rate".to_string());
        }
        Ok(())
    }
}

/// A frame accepted for transmission, waiting for the channel to pick it up.
#[derive(Debug, Clone)]
pub struct Transmission {
    pub frame: MacFrame,
    pub duration: SimDuration,
    pub tx_power_dbm: f64,
}

/// Capabilities the MAC relies on.
pub trait PhyLayer {
    /// Try to put `frame` on air. Returns `false` if the radio is busy transmitting.
    fn transmit(&mut self, now: SimTime, frame: MacFrame, rate: RateClass, mcs: u8) -> bool;
    fn on_receive_start(&mut self, now: SimTime, frame: &MacFrame, duration: SimDuration, rx_power_dbm: f64);
    /// Finish a reception. Returns whether the frame was decoded.
    fn on_receive_complete(&mut self, now: SimTime, frame: &MacFrame) -> bool;
    /// Returns `false` if `uid` is not the frame currently on air.
    fn on_transmit_complete(&mut self, now: SimTime, uid: u64) -> bool;
    fn control_frame_airtime(&self, kind: FrameKind) -> SimDuration;
    /// Airtime of a DATA frame of `frame_bytes` MAC bytes at the rate selected by `mcs`.
    fn data_airtime(&self, frame_bytes: u32, mcs: u8) -> SimDuration;
    /// Drain transmissions accepted since the last call.
    fn take_outgoing(&mut self) -> Vec<Transmission>;
}

#[derive(Debug)]
struct ActiveReception {
    uid: u64,
    power_dbm: f64,
    interference_mw: f64,
    corrupted: bool,
}

pub struct SimplePhy {
    station: StationId,
    params: PhyParameters,
    noise_floor_mw: f64,
    transmitting: Option<(u64, SimTime)>,
    receptions: Vec<ActiveReception>,
    outgoing: Vec<Transmission>,
}

impl SimplePhy {
    pub fn new(station: StationId, params: PhyParameters) -> Self {
        let noise_floor_mw = dbm_to_mw(params.noise_floor_dbm());
        SimplePhy {
            station,
            params,
            noise_floor_mw,
            transmitting: None,
            receptions: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn params(&self) -> &PhyParameters {
        &self.params
    }

    fn is_transmitting(&self, now: SimTime) -> bool {
        matches!(self.transmitting, Some((_, end)) if end > now)
    }

    /// Weakest power that can be decoded at basic rate with no interference.
    fn sensitivity_dbm(&self) -> f64 {
        mw_to_dbm(self.noise_floor_mw) + self.params.sinr_threshold_db(FrameKind::Cta, 0)
    }
}

impl PhyLayer for SimplePhy {
    fn transmit(&mut self, now: SimTime, frame: MacFrame, rate: RateClass, mcs: u8) -> bool {
        if self.is_transmitting(now) {
            trace!("[{}] PHY busy, refusing {:?} uid {}", self.station, frame.kind, frame.uid);
            return false;
        }
        let duration = match rate {
            RateClass::Basic => airtime(frame.air_bytes(), self.params.rate_bps(RateClass::Basic, 0)),
            RateClass::Data => self.data_airtime(frame.size_bytes, mcs),
        };
        // Half duplex: whatever is being received now is lost
        for r in self.receptions.iter_mut() {
            r.corrupted = true;
        }
        let mut frame = frame;
        if rate == RateClass::Data {
            frame.mcs = mcs;
        }
        self.transmitting = Some((frame.uid, now + duration));
        self.outgoing.push(Transmission {
            frame,
            duration,
            tx_power_dbm: self.params.tx_power_dbm,
        });
        true
    }

    fn on_receive_start(&mut self, now: SimTime, frame: &MacFrame, _duration: SimDuration, rx_power_dbm: f64) {
        let sensitivity = self.sensitivity_dbm();
        let mut incoming = ActiveReception {
            uid: frame.uid,
            power_dbm: rx_power_dbm,
            interference_mw: 0.0,
            corrupted: self.is_transmitting(now),
        };
        let incoming_mw = dbm_to_mw(rx_power_dbm);
        for other in self.receptions.iter_mut() {
            other.interference_mw += incoming_mw;
            incoming.interference_mw += dbm_to_mw(other.power_dbm);
            // Preamble locked to an earlier decodable frame
            if other.power_dbm >= sensitivity && rx_power_dbm - other.power_dbm < CAPTURE_THRESHOLD_DB {
                incoming.corrupted = true;
            }
        }
        self.receptions.push(incoming);
    }

    fn on_receive_complete(&mut self, _now: SimTime, frame: &MacFrame) -> bool {
        let Some(index) = self.receptions.iter().position(|r| r.uid == frame.uid) else {
            return false;
        };
        let reception = self.receptions.swap_remove(index);
        let sinr = reception.power_dbm - mw_to_dbm(self.noise_floor_mw + reception.interference_mw);
        let threshold = self.params.sinr_threshold_db(frame.kind, frame.mcs);
        let decoded = !reception.corrupted && sinr >= threshold;
        trace!(
            "[{}] {:?} uid {} from {}: power {:.2} dBm, SINR {:.2} dB (threshold {:.2}), corrupted {} -> decoded {}",
            self.station, frame.kind, frame.uid, frame.source, reception.power_dbm, sinr, threshold, reception.corrupted, decoded
        );
        decoded
    }

    fn on_transmit_complete(&mut self, _now: SimTime, uid: u64) -> bool {
        match self.transmitting {
            Some((current, _)) if current == uid => {
                self.transmitting = None;
                true
            }
            _ => false,
        }
    }

    fn control_frame_airtime(&self, kind: FrameKind) -> SimDuration {
        airtime(kind.control_size_bytes(), self.params.rate_bps(RateClass::Basic, 0))
    }

    fn data_airtime(&self, frame_bytes: u32, mcs: u8) -> SimDuration {
        airtime(frame_bytes + super::frame::PHY_OVERHEAD_BYTES, self.params.rate_bps(RateClass::Data, mcs))
    }

    fn take_outgoing(&mut self) -> Vec<Transmission> {
        std::mem::take(&mut self.outgoing)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::simulation::frame::Address;

    pub(crate) fn test_params() -> PhyParameters {
        PhyParameters {
            tx_power_dbm: 20.0,
            basic_rate_bps: 157.44e9,
            data_rate_bps: 157.44e9,
            bandwidth_hz: 69.12e9,
            bit_energy_db: 14.0,
            temperature_k: 300.0,
            noise_figure_db: 7.0,
            mcs_profiles: default_mcs_profiles(),
        }
    }

    fn cta(uid: u64) -> MacFrame {
        MacFrame::control(uid, FrameKind::Cta, 0, Address::Broadcast)
    }

    #[test]
    fn strong_lone_frame_is_decoded_weak_one_is_not() {
        let mut phy = SimplePhy::new(1, test_params());
        let now = SimTime::ZERO;
        phy.on_receive_start(now, &cta(1), SimDuration::from_nanos(3), -30.0);
        assert!(phy.on_receive_complete(now, &cta(1)));
        phy.on_receive_start(now, &cta(2), SimDuration::from_nanos(3), -80.0);
        assert!(!phy.on_receive_complete(now, &cta(2)));
    }

    #[test]
    fn overlapping_frames_of_similar_power_collide() {
        let mut phy = SimplePhy::new(1, test_params());
        let now = SimTime::ZERO;
        phy.on_receive_start(now, &cta(1), SimDuration::from_nanos(3), -30.0);
        phy.on_receive_start(now, &cta(2), SimDuration::from_nanos(3), -31.0);
        assert!(!phy.on_receive_complete(now, &cta(1)));
        assert!(!phy.on_receive_complete(now, &cta(2)));
    }

    #[test]
    fn much_stronger_late_frame_captures_the_receiver() {
        let mut phy = SimplePhy::new(1, test_params());
        let now = SimTime::ZERO;
        phy.on_receive_start(now, &cta(1), SimDuration::from_nanos(3), -50.0);
        phy.on_receive_start(now, &cta(2), SimDuration::from_nanos(3), -20.0);
        assert!(phy.on_receive_complete(now, &cta(2)));
        assert!(!phy.on_receive_complete(now, &cta(1)));
    }

    #[test]
    fn half_duplex_blocks_reception_and_second_transmit() {
        let mut phy = SimplePhy::new(1, test_params());
        let now = SimTime::ZERO;
        phy.on_receive_start(now, &cta(1), SimDuration::from_nanos(3), -30.0);
        assert!(phy.transmit(now, MacFrame::control(5, FrameKind::Rts, 1, Address::Station(0)), RateClass::Basic, 0));
        assert!(!phy.transmit(now, MacFrame::control(6, FrameKind::Rts, 1, Address::Station(0)), RateClass::Basic, 0));
        assert!(!phy.on_receive_complete(now, &cta(1)));

        let out = phy.take_outgoing();
        assert_eq!(out.len(), 1);
        assert!(!phy.on_transmit_complete(now, 6));
        assert!(phy.on_transmit_complete(now + out[0].duration, 5));
        assert!(phy.transmit(now + out[0].duration, MacFrame::control(7, FrameKind::Ack, 1, Address::Station(0)), RateClass::Basic, 0));
    }

    #[test]
    fn mcs_hint_selects_rate_and_threshold() {
        let p = test_params();
        assert_eq!(p.rate_bps(RateClass::Data, 14), 315.52e9);
        assert_eq!(p.rate_bps(RateClass::Data, 0), p.data_rate_bps);
        assert_eq!(p.rate_bps(RateClass::Data, 15), p.data_rate_bps);
        assert!(p.sinr_threshold_db(FrameKind::Data, 14) > p.sinr_threshold_db(FrameKind::Data, 10));
        let phy = SimplePhy::new(0, p);
        assert!(phy.data_airtime(59_000, 14) < phy.data_airtime(59_000, 0));
    }
}
