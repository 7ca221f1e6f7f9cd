//! Steerable directional antenna model.
//!
//! The radiation pattern is a raised-cosine lobe whose sharpness is derived from
//! the 3 dB beamwidth:
//!
//! ```text
//! exponent = -3 / (20 × log₁₀(cos(bw / 4)))
//! G(θ)     = 20 × exponent × log₁₀(cos(θ / 2)) + G_max     [dB]
//! ```
//!
//! `θ` is the angle between the beam boresight and the direction of the peer,
//! wrapped into (-π, π] before evaluation. A station keeps two independent
//! boresights: one used while transmitting and one used while receiving.

use std::f64::consts::PI;
use thiserror::Error;

use super::geometry::{Position, bearing, normalize_degrees, wrap_to_pi};

/// Operating mode of an antenna, as used to pair transmitter and receiver legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntennaMode {
    /// Client side: the tx boresight is steered towards the access point.
    DirectionalTransmitter,
    /// Access point side: the rx boresight sweeps sectors.
    DirectionalReceiver,
    Omni,
}

/// Which of the two boresights an operation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Beam {
    Tx,
    Rx,
}

#[derive(Debug, Error, PartialEq)]
pub enum AntennaError {
    #[error("beamwidth must lie strictly between 0 and 180 degrees, got {0}")]
    InvalidBeamwidth(f64),
}

#[derive(Debug, Clone)]
pub struct DirectionalAntenna {
    mode: AntennaMode,
    beamwidth_degrees: f64,
    max_gain_db: f64,
    exponent: f64,
    /// Rotation speed in full circles per second, informational for sweeping stations.
    turning_speed: f64,
    tx_orientation_degrees: f64,
    rx_orientation_degrees: f64,
}

impl DirectionalAntenna {
    /// Build an antenna with both boresights at 0°.
    ///
    /// # Parameters
    ///
    /// * `mode` - Initial operating mode
    /// * `beamwidth_degrees` - 3 dB beamwidth, exclusive range (0, 180)
    /// * `max_gain_db` - Boresight gain
    pub fn new(mode: AntennaMode, beamwidth_degrees: f64, max_gain_db: f64) -> Result<Self, AntennaError> {
        let mut antenna = DirectionalAntenna {
            mode,
            beamwidth_degrees: 0.0,
            max_gain_db,
            exponent: 0.0,
            turning_speed: 0.0,
            tx_orientation_degrees: 0.0,
            rx_orientation_degrees: 0.0,
        };
        antenna.set_beamwidth(beamwidth_degrees)?;
        Ok(antenna)
    }

    /// Change the beamwidth and recompute the pattern exponent.
    pub fn set_beamwidth(&mut self, degrees: f64) -> Result<(), AntennaError> {
        if !degrees.is_finite() || degrees <= 0.0 || degrees >= 180.0 {
            return Err(AntennaError::InvalidBeamwidth(degrees));
        }
        let beamwidth_rad = degrees.to_radians();
        self.beamwidth_degrees = degrees;
        self.exponent = -3.0 / (20.0 * (beamwidth_rad / 4.0).cos().log10());
        Ok(())
    }

    pub fn beamwidth_degrees(&self) -> f64 {
        self.beamwidth_degrees
    }

    pub fn exponent(&self) -> f64 {
        self.exponent
    }

    pub fn mode(&self) -> AntennaMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: AntennaMode) {
        self.mode = mode;
    }

    pub fn turning_speed(&self) -> f64 {
        self.turning_speed
    }

    pub fn set_turning_speed(&mut self, circles_per_second: f64) {
        self.turning_speed = circles_per_second;
    }

    /// Point one boresight at `angle_degrees`, stored folded into (-360, 360].
    pub fn tune_orientation(&mut self, beam: Beam, angle_degrees: f64) {
        let angle = normalize_degrees(angle_degrees);
        match beam {
            Beam::Tx => self.tx_orientation_degrees = angle,
            Beam::Rx => self.rx_orientation_degrees = angle,
        }
    }

    pub fn orientation_degrees(&self, beam: Beam) -> f64 {
        match beam {
            Beam::Tx => self.tx_orientation_degrees,
            Beam::Rx => self.rx_orientation_degrees,
        }
    }

    pub fn orientation_radians(&self, beam: Beam) -> f64 {
        self.orientation_degrees(beam) * PI / 180.0
    }

    /// Pattern attenuation relative to boresight, in dB (≤ 0).
    pub fn element_gain_db(&self, relative_angle_rad: f64) -> f64 {
        let theta = wrap_to_pi(relative_angle_rad);
        let cos_half = (theta / 2.0).cos().max(f64::MIN_POSITIVE);
        20.0 * self.exponent * cos_half.log10()
    }

    fn leg_gain_db(&self, relative_angle_rad: f64) -> f64 {
        self.element_gain_db(relative_angle_rad) + self.max_gain_db
    }

    /// Combined transmit + receive gain in dB for a frame sent by X and received by Y.
    ///
    /// `rx_orientation` belongs to whichever side is the directional receiver and
    /// `tx_orientation` to the directional transmitter, both in radians. Mode
    /// pairs other than transmitter/receiver (either way round) or omni/omni have
    /// no link and yield 0 dB.
    pub fn pair_gain_db(
        &self,
        x_mode: AntennaMode,
        y_mode: AntennaMode,
        x_position: &Position,
        y_position: &Position,
        rx_orientation: f64,
        tx_orientation: f64,
    ) -> f64 {
        use AntennaMode::*;
        let (rx_relative, tx_relative) = match (x_mode, y_mode) {
            (DirectionalReceiver, DirectionalTransmitter) => (
                bearing(x_position, y_position) - rx_orientation,
                bearing(y_position, x_position) - tx_orientation,
            ),
            (DirectionalTransmitter, DirectionalReceiver) => (
                bearing(y_position, x_position) - rx_orientation,
                bearing(x_position, y_position) - tx_orientation,
            ),
            (Omni, Omni) => (0.0, 0.0),
            _ => return 0.0,
        };
        self.leg_gain_db(rx_relative) + self.leg_gain_db(tx_relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn antenna(mode: AntennaMode, bw: f64, gain: f64) -> DirectionalAntenna {
        DirectionalAntenna::new(mode, bw, gain).unwrap()
    }

    #[test]
    fn exponent_is_finite_and_positive_across_valid_range() {
        let mut a = antenna(AntennaMode::Omni, 40.0, 14.12);
        for bw in [0.5, 6.0, 12.0, 40.0, 90.0, 179.5] {
            a.set_beamwidth(bw).unwrap();
            assert!(a.exponent().is_finite() && a.exponent() > 0.0, "bw {} -> {}", bw, a.exponent());
        }
    }

    #[test]
    fn beamwidth_outside_open_range_is_rejected() {
        for bw in [0.0, -5.0, 180.0, 200.0, f64::NAN] {
            assert!(DirectionalAntenna::new(AntennaMode::Omni, bw, 0.0).is_err());
        }
        let mut a = antenna(AntennaMode::Omni, 40.0, 0.0);
        assert_eq!(a.set_beamwidth(180.0), Err(AntennaError::InvalidBeamwidth(180.0)));
        assert_eq!(a.beamwidth_degrees(), 40.0);
    }

    #[test]
    fn half_beamwidth_offset_loses_three_db() {
        let a = antenna(AntennaMode::Omni, 12.0, 0.0);
        let g = a.element_gain_db(6.0_f64.to_radians());
        assert!((g + 3.0).abs() < 1e-9, "gain {}", g);
        assert_eq!(a.element_gain_db(0.0), 0.0);
    }

    #[test]
    fn aligned_pair_gets_twice_max_gain() {
        // Access point at the origin listening towards +x, client at (5, 0) pointing back.
        let mut ap = antenna(AntennaMode::DirectionalReceiver, 12.0, 24.57);
        ap.tune_orientation(Beam::Rx, 0.0);
        let mut client = antenna(AntennaMode::DirectionalTransmitter, 12.0, 24.57);
        client.tune_orientation(Beam::Tx, 180.0);
        let ap_pos = Position::new(0.0, 0.0, 0.0);
        let client_pos = Position::new(5.0, 0.0, 0.0);

        let rx = ap.orientation_radians(Beam::Rx);
        let tx = client.orientation_radians(Beam::Tx);
        let downlink = ap.pair_gain_db(ap.mode(), client.mode(), &ap_pos, &client_pos, rx, tx);
        let uplink = client.pair_gain_db(client.mode(), ap.mode(), &client_pos, &ap_pos, rx, tx);

        assert!((downlink - 49.14).abs() < 1e-9, "downlink {}", downlink);
        assert!((uplink - 49.14).abs() < 1e-9, "uplink {}", uplink);
    }

    #[test]
    fn misaligned_beam_is_heavily_attenuated() {
        let a = antenna(AntennaMode::DirectionalReceiver, 12.0, 24.57);
        let aligned = a.pair_gain_db(
            AntennaMode::DirectionalReceiver,
            AntennaMode::DirectionalTransmitter,
            &Position::ORIGIN,
            &Position::new(5.0, 0.0, 0.0),
            0.0,
            PI,
        );
        let off = a.pair_gain_db(
            AntennaMode::DirectionalReceiver,
            AntennaMode::DirectionalTransmitter,
            &Position::ORIGIN,
            &Position::new(5.0, 0.0, 0.0),
            30.0_f64.to_radians(),
            PI,
        );
        assert!(aligned - off > 40.0);
    }

    #[test]
    fn omni_pair_and_unsupported_pairs() {
        let a = antenna(AntennaMode::Omni, 40.0, 14.12);
        let p = Position::new(1.0, 1.0, 0.0);
        let omni = a.pair_gain_db(AntennaMode::Omni, AntennaMode::Omni, &Position::ORIGIN, &p, 1.0, 2.0);
        assert!((omni - 28.24).abs() < 1e-9);
        let none = a.pair_gain_db(
            AntennaMode::DirectionalTransmitter,
            AntennaMode::DirectionalTransmitter,
            &Position::ORIGIN,
            &p,
            0.0,
            0.0,
        );
        assert_eq!(none, 0.0);
    }

    #[test]
    fn orientation_is_folded_and_exposed_in_radians() {
        let mut a = antenna(AntennaMode::DirectionalTransmitter, 40.0, 0.0);
        a.tune_orientation(Beam::Tx, 400.0);
        assert_eq!(a.orientation_degrees(Beam::Tx), 40.0);
        assert!((a.orientation_radians(Beam::Tx) - 40.0_f64.to_radians()).abs() < 1e-12);
        assert_eq!(a.orientation_degrees(Beam::Rx), 0.0);
    }
}
