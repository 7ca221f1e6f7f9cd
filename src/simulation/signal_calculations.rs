//! Radio signal and timing calculations.
//!
//! Contains helpers for:
//! - Free-space and log-distance path loss (the latter with optional log-normal shadowing)
//! - Propagation delay at a constant speed
//! - Thermal noise floor and the SINR threshold implied by a target Eb/N0
//! - Frame airtime at a given bit rate
//!
//! Units:
//! - Power: dBm, mW and W (conversions provided)
//! - Distance: meters
//! - Time: seconds (f64) inside formulas, `SimDuration` at the API boundary

use rand::RngCore;
use rand_distr::{Distribution, Normal};
use serde::Deserialize;

use super::time::SimDuration;

/// Speed of light in vacuum, m/s.
pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Boltzmann constant, J/K.
const BOLTZMANN: f64 = 1.380_649e-23;

/// Maps a link geometry and gain budget to received power.
pub trait PathLossModel {
    /// Received power in dBm for a transmission at `tx_power_dbm` over `distance_m`
    /// with `total_gain_db` of combined antenna gain.
    fn rx_power_dbm(&self, tx_power_dbm: f64, distance_m: f64, total_gain_db: f64, rng: &mut dyn RngCore) -> f64;
}

/// Maps a link distance to propagation delay.
pub trait DelayModel {
    fn delay(&self, distance_m: f64) -> SimDuration;
}

/// Path loss model selection, as written in the scene file.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum PathLossParameters {
    /// Friis spreading loss at the carrier frequency.
    FreeSpace { central_frequency_hz: f64 },
    /// `PL(d) = PL(d₀) + 10 × n × log₁₀(d/d₀) + X_σ` with d₀ = 1 m.
    LogDistance {
        path_loss_exponent: f64,
        shadowing_sigma: f64,
        path_loss_at_reference_distance: f64,
    },
}

impl PathLossParameters {
    /// Path loss in dB at `distance_m`. Distances under one metre use the one-metre value.
    pub fn path_loss_db(&self, distance_m: f64, rng: &mut dyn RngCore) -> f64 {
        let d = distance_m.max(1.0);
        match self {
            PathLossParameters::FreeSpace { central_frequency_hz } => {
                20.0 * (4.0 * std::f64::consts::PI * d * central_frequency_hz / SPEED_OF_LIGHT).log10()
            }
            PathLossParameters::LogDistance {
                path_loss_exponent,
                shadowing_sigma,
                path_loss_at_reference_distance,
            } => {
                let path_loss = path_loss_at_reference_distance + 10.0 * path_loss_exponent * d.log10();
                // Sample log-normal shadowing as a Normal(0, sigma) in dB
                let shadowing = match Normal::new(0.0, *shadowing_sigma) {
                    Ok(normal) if *shadowing_sigma > 0.0 => normal.sample(rng),
                    _ => 0.0,
                };
                path_loss + shadowing
            }
        }
    }
}

impl PathLossModel for PathLossParameters {
    fn rx_power_dbm(&self, tx_power_dbm: f64, distance_m: f64, total_gain_db: f64, rng: &mut dyn RngCore) -> f64 {
        tx_power_dbm + total_gain_db - self.path_loss_db(distance_m, rng)
    }
}

/// Propagation at a fixed speed, the speed of light by default.
#[derive(Debug, Clone, Copy)]
pub struct ConstantSpeedDelay {
    pub speed_m_per_s: f64,
}

impl Default for ConstantSpeedDelay {
    fn default() -> Self {
        ConstantSpeedDelay {
            speed_m_per_s: SPEED_OF_LIGHT,
        }
    }
}

impl DelayModel for ConstantSpeedDelay {
    fn delay(&self, distance_m: f64) -> SimDuration {
        SimDuration::from_secs_f64(distance_m / self.speed_m_per_s)
    }
}

/// Convert power from dBm to milliwatts: `P(mW) = 10^(P(dBm) / 10)`.
pub fn dbm_to_mw(dbm: f64) -> f64 {
    10f64.powf(dbm / 10.0)
}

/// Convert power from milliwatts to dBm. Non-positive input yields -∞.
pub fn mw_to_dbm(mw: f64) -> f64 {
    10.0 * mw.log10()
}

/// Convert power from dBm to watts.
pub fn dbm_to_w(dbm: f64) -> f64 {
    dbm_to_mw(dbm) / 1000.0
}

/// Thermal noise floor `10·log₁₀(k·T·B) + 30 + NF` in dBm.
///
/// # Parameters
///
/// - `temperature_k`: receiver temperature in kelvin
/// - `bandwidth_hz`: noise bandwidth
/// - `noise_figure_db`: receiver noise figure
pub fn thermal_noise_floor_dbm(temperature_k: f64, bandwidth_hz: f64, noise_figure_db: f64) -> f64 {
    10.0 * (BOLTZMANN * temperature_k * bandwidth_hz).log10() + 30.0 + noise_figure_db
}

/// Minimum SINR (dB) for a target bit energy to noise density at a given rate/bandwidth ratio.
pub fn sinr_threshold_db(bit_energy_db: f64, bit_rate_bps: f64, bandwidth_hz: f64) -> f64 {
    bit_energy_db + 10.0 * (bit_rate_bps / bandwidth_hz).log10()
}

/// Time on air for `bytes` at `bit_rate_bps`.
pub fn airtime(bytes: u32, bit_rate_bps: f64) -> SimDuration {
    if bit_rate_bps <= 0.0 {
        return SimDuration::ZERO;
    }
    SimDuration::from_secs_f64(bytes as f64 * 8.0 / bit_rate_bps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn free_space_loss_grows_six_db_per_distance_doubling() {
        let model = PathLossParameters::FreeSpace {
            central_frequency_hz: 300e9,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let near = model.path_loss_db(2.0, &mut rng);
        let far = model.path_loss_db(4.0, &mut rng);
        assert!((far - near - 6.0206).abs() < 1e-3);
        // ~88 dB at 2 m and 300 GHz
        assert!(near > 87.0 && near < 89.0, "{}", near);
    }

    #[test]
    fn log_distance_without_shadowing_is_deterministic() {
        let model = PathLossParameters::LogDistance {
            path_loss_exponent: 2.0,
            shadowing_sigma: 0.0,
            path_loss_at_reference_distance: 40.0,
        };
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(model.path_loss_db(10.0, &mut rng), 60.0);
        assert_eq!(model.path_loss_db(0.2, &mut rng), 40.0);
        assert_eq!(model.rx_power_dbm(20.0, 10.0, 30.0, &mut rng), -10.0);
    }

    #[test]
    fn light_covers_one_metre_in_about_3336_ps() {
        let d = ConstantSpeedDelay::default().delay(1.0);
        assert_eq!(d.as_picos(), 3_336);
    }

    #[test]
    fn noise_floor_matches_kt_reference() {
        // kT at 290 K is -174 dBm/Hz
        let n = thermal_noise_floor_dbm(290.0, 1.0, 0.0);
        assert!((n + 174.0).abs() < 0.1, "{}", n);
        let wide = thermal_noise_floor_dbm(290.0, 1e9, 7.0);
        assert!((wide - (n + 97.0)).abs() < 1e-9);
    }

    #[test]
    fn power_conversions_agree() {
        assert!((dbm_to_mw(20.0) - 100.0).abs() < 1e-9);
        assert!((mw_to_dbm(0.1) + 10.0).abs() < 1e-9);
        assert!((dbm_to_w(30.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn airtime_scales_with_size() {
        let a = airtime(1_000, 1e9);
        assert_eq!(a.as_nanos(), 8_000);
        assert_eq!(airtime(10, 0.0), SimDuration::ZERO);
        assert!((sinr_threshold_db(10.0, 1e9, 1e9) - 10.0).abs() < 1e-12);
    }
}
