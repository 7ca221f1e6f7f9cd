//! Protocol and run configuration, loaded from a TOML file next to the scene.
//!
//! Keys are kebab-case. Every key is optional; missing keys take the defaults
//! of the reference deployment (3-way handshake, 5 backoff slots, 2 ns slots).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::simulation::time::SimDuration;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unsupported handshake variant: {0}-way (supported: 1, 3)")]
    UnsupportedHandshake(u8),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Handshake variant run by clients and the access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handshake {
    /// CTA, then DATA after a fairness delay, then ACK.
    OneWay,
    /// CTA, RTS, CTS, DATA, ACK.
    ThreeWay,
}

impl Handshake {
    pub fn ways(self) -> u8 {
        match self {
            Handshake::OneWay => 1,
            Handshake::ThreeWay => 3,
        }
    }
}

impl TryFrom<u8> for Handshake {
    type Error = ConfigError;

    fn try_from(ways: u8) -> Result<Self, ConfigError> {
        match ways {
            1 => Ok(Handshake::OneWay),
            3 => Ok(Handshake::ThreeWay),
            other => Err(ConfigError::UnsupportedHandshake(other)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub handshake_ways: u8,
    /// Contention window upper bound, in slots.
    pub bo_slots: u32,
    pub slot_time_ps: u64,
    /// Slot time used when running the 3-way handshake.
    pub slot_time_three_way_ps: u64,
    pub sifs_ps: u64,
    pub queue_limit: usize,
    pub rts_retry_limit: u16,
    pub data_retry_limit: u16,
    /// Payloads smaller than this are dropped at enqueue.
    pub min_enqueue_bytes: u32,
    /// Lower bound of the beacon-derived link timeout.
    pub link_timeout_floor_us: u64,
    /// Discovery rounds swept with a full-beamwidth step before halving it.
    pub full_step_rounds: u32,
    /// Delay after a first discovery before even-numbered clients relocate. Disabled when absent.
    pub relocate_after_discovery_us: Option<u64>,
    /// The access point sends a dummy CTA sweep every N sweeps. Disabled when absent.
    pub dummy_cta_every: Option<u32>,
    /// The access point answers sector reports with feedback CTAs.
    pub sector_feedback: bool,
    /// Receive-beam rotation of the access point, in full circles per second.
    pub ap_turning_speed: f64,
    pub duration_ms: u64,
    pub seed: u64,
    /// Result file; derived from the scenario when absent.
    pub output_file: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            handshake_ways: 3,
            bo_slots: 5,
            slot_time_ps: 2_000,
            slot_time_three_way_ps: 2_000,
            sifs_ps: 0,
            queue_limit: 10_000,
            rts_retry_limit: 7,
            data_retry_limit: 5,
            min_enqueue_bytes: 15_000,
            link_timeout_floor_us: 1_000,
            full_step_rounds: 10,
            relocate_after_discovery_us: None,
            dummy_cta_every: None,
            sector_feedback: false,
            ap_turning_speed: 9_000.0,
            duration_ms: 20,
            seed: 1,
            output_file: None,
        }
    }
}

impl SimulationConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `config_path` - Path to the config.toml file
    ///
    /// # Returns
    /// * `Ok(SimulationConfig)` if the file was read, parsed and validated
    /// * `Err(ConfigError)` otherwise
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Derive the config path from a scene file path.
    ///
    /// Replaces the scene filename with "config.toml" in the same directory.
    pub fn config_path_from_scene(scene_path: &str) -> PathBuf {
        let scene = Path::new(scene_path);
        scene.parent().unwrap_or(Path::new(".")).join("config.toml")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.handshake()?;
        if self.bo_slots == 0 {
            return Err(ConfigError::Invalid("bo-slots must be at least 1".into()));
        }
        if self.rts_retry_limit == 0 || self.data_retry_limit == 0 {
            return Err(ConfigError::Invalid("retry limits must be at least 1".into()));
        }
        // Backoff life is drawn from [1, 2^retry]
        if self.rts_retry_limit > 31 || self.data_retry_limit > 31 {
            return Err(ConfigError::Invalid("retry limits above 31 are not supported".into()));
        }
        if self.queue_limit == 0 {
            return Err(ConfigError::Invalid("queue-limit must be at least 1".into()));
        }
        if self.duration_ms == 0 {
            return Err(ConfigError::Invalid("duration-ms must be positive".into()));
        }
        if !(self.ap_turning_speed.is_finite() && self.ap_turning_speed > 0.0) {
            return Err(ConfigError::Invalid("ap-turning-speed must be positive".into()));
        }
        if self.dummy_cta_every == Some(0) {
            return Err(ConfigError::Invalid("dummy-cta-every must be at least 1".into()));
        }
        Ok(())
    }

    pub fn handshake(&self) -> Result<Handshake, ConfigError> {
        Handshake::try_from(self.handshake_ways)
    }

    /// Backoff slot duration for the configured handshake.
    pub fn slot_time(&self) -> SimDuration {
        if self.handshake_ways == 3 {
            SimDuration::from_picos(self.slot_time_three_way_ps)
        } else {
            SimDuration::from_picos(self.slot_time_ps)
        }
    }

    pub fn sifs(&self) -> SimDuration {
        SimDuration::from_picos(self.sifs_ps)
    }

    /// Longest random backoff: `slot_time × bo_slots`.
    pub fn max_backoff(&self) -> SimDuration {
        self.slot_time() * self.bo_slots as u64
    }

    pub fn link_timeout_floor(&self) -> SimDuration {
        SimDuration::from_micros(self.link_timeout_floor_us)
    }

    pub fn relocate_after_discovery(&self) -> Option<SimDuration> {
        self.relocate_after_discovery_us.map(SimDuration::from_micros)
    }

    /// Time the access point dwells on each of `sectors` sectors at its turning speed.
    pub fn ap_sector_duration(&self, sectors: u16) -> SimDuration {
        SimDuration::from_secs_f64(1.0 / (self.ap_turning_speed * sectors.max(1) as f64))
    }
}
