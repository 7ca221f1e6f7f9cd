//! Scene loading, parsing, and validation logic.
//!
//! A scene describes the physical setup of one cell: antenna and radio
//! parameters shared by every station, the propagation model, where the access
//! point and the clients stand, and the traffic each client offers.

use anyhow::Context;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use thiserror::Error;

use crate::simulation::antenna::{AntennaMode, DirectionalAntenna};
use crate::simulation::geometry::Position;
use crate::simulation::phy::PhyParameters;
use crate::simulation::signal_calculations::PathLossParameters;
use crate::simulation::traffic::TrafficParameters;
use crate::simulation::types::StationId;

/// Error type for scene loading failures.
#[derive(Debug, Error)]
pub enum SceneLoadError {
    #[error("Failed to read file: {0}")]
    FileReadError(String),
    #[error("Failed to parse JSON: {0}")]
    ParseError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Beam shape shared by every station.
#[derive(Debug, Deserialize, Clone)]
pub struct AntennaParameters {
    /// 3 dB beamwidth in degrees, exclusive range (0, 180).
    pub beamwidth_degrees: f64,
    /// Boresight gain in dB.
    pub max_gain_db: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccessPointSpec {
    pub station_id: StationId,
    pub position: Position,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientSpec {
    pub station_id: StationId,
    pub position: Position,
    /// Starting transmit orientation; a random multiple of the beamwidth when absent.
    #[serde(default)]
    pub initial_orientation_degrees: Option<f64>,
}

/// Root structure representing the entire scene.
#[derive(Debug, Deserialize, Clone)]
pub struct Scene {
    pub antenna: AntennaParameters,
    pub phy: PhyParameters,
    pub path_loss: PathLossParameters,
    /// Propagation speed for delay computation; the speed of light when absent.
    #[serde(default)]
    pub propagation_speed_m_per_s: Option<f64>,
    pub access_point: AccessPointSpec,
    pub clients: Vec<ClientSpec>,
    pub traffic: TrafficParameters,
}

/// Load and parse a scene from a file.
///
/// # Parameters
///
/// * `path` - Path to the scene JSON file
///
/// # Returns
///
/// Parsed and validated Scene or an error.
pub fn load_scene(path: &str) -> Result<Scene, SceneLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| SceneLoadError::FileReadError(format!("{:#}", e)))?;
    parse_scene(&data)
}

/// Parse and validate a scene from JSON text.
pub fn parse_scene(data: &str) -> Result<Scene, SceneLoadError> {
    let scene: Scene = serde_json::from_str(data)
        .context("Invalid JSON format")
        .map_err(|e| SceneLoadError::ParseError(format!("{:#}", e)))?;
    validate_scene(&scene).map_err(SceneLoadError::ValidationError)?;
    Ok(scene)
}

fn check_position(id: StationId, p: &Position) -> Result<(), String> {
    const MAX_WORLD_COORD: f64 = 10_000.0;
    if ![p.x, p.y, p.z].iter().all(|c| c.is_finite() && c.abs() <= MAX_WORLD_COORD) {
        return Err(format!(
            "Station {} position ({}, {}, {}) outside world bounds (±{})",
            id, p.x, p.y, p.z, MAX_WORLD_COORD
        ));
    }
    Ok(())
}

/// Validate scene configuration.
///
/// Checks for issues that would cause runtime problems:
/// - No clients, or more than the supported station count
/// - Duplicate station ids (the access point included)
/// - Positions outside world bounds or non-finite
/// - Beamwidth outside (0, 180) degrees
/// - Non-positive rates, bandwidth or temperature
/// - Invalid path loss or traffic parameters
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scene(scene: &Scene) -> Result<(), String> {
    const MAX_CLIENTS: usize = 10_000;
    const MIN_TX_POWER: f64 = -50.0;
    const MAX_TX_POWER: f64 = 50.0;

    if scene.clients.is_empty() {
        return Err("Scene must contain at least one client".to_string());
    }
    if scene.clients.len() > MAX_CLIENTS {
        return Err(format!("Client count {} exceeds maximum of {}", scene.clients.len(), MAX_CLIENTS));
    }

    let mut station_ids = HashSet::new();
    station_ids.insert(scene.access_point.station_id);
    for client in &scene.clients {
        if !station_ids.insert(client.station_id) {
            return Err(format!("Duplicate station_id found: {}", client.station_id));
        }
    }

    check_position(scene.access_point.station_id, &scene.access_point.position)?;
    for client in &scene.clients {
        check_position(client.station_id, &client.position)?;
        if let Some(angle) = client.initial_orientation_degrees {
            if !(angle.is_finite() && (-360.0..=360.0).contains(&angle)) {
                return Err(format!(
                    "Client {} initial orientation {} outside [-360, 360] degrees",
                    client.station_id, angle
                ));
            }
        }
    }

    DirectionalAntenna::new(AntennaMode::Omni, scene.antenna.beamwidth_degrees, scene.antenna.max_gain_db)
        .map_err(|e| e.to_string())?;

    if scene.phy.tx_power_dbm < MIN_TX_POWER || scene.phy.tx_power_dbm > MAX_TX_POWER {
        return Err(format!(
            "tx_power_dbm {} outside realistic range ({} to {} dBm)",
            scene.phy.tx_power_dbm, MIN_TX_POWER, MAX_TX_POWER
        ));
    }
    scene.phy.validate()?;

    match &scene.path_loss {
        PathLossParameters::FreeSpace { central_frequency_hz } => {
            if !(central_frequency_hz.is_finite() && *central_frequency_hz > 0.0) {
                return Err("Invalid central_frequency_hz, must be positive".to_string());
            }
        }
        PathLossParameters::LogDistance {
            path_loss_exponent,
            shadowing_sigma,
            ..
        } => {
            if *path_loss_exponent <= 0.0 {
                return Err("Invalid path_loss_exponent, must be positive".to_string());
            }
            if *shadowing_sigma < 0.0 {
                return Err("Invalid shadowing_sigma, must be non-negative".to_string());
            }
        }
    }

    if let Some(speed) = scene.propagation_speed_m_per_s {
        if !(speed.is_finite() && speed > 0.0) {
            return Err(format!("Invalid propagation_speed_m_per_s {}, must be positive", speed));
        }
    }

    scene.traffic.validate()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"{
        "antenna": { "beamwidth_degrees": 12.0, "max_gain_db": 24.57 },
        "phy": {
            "tx_power_dbm": 20.0,
            "basic_rate_bps": 157.44e9,
            "data_rate_bps": 157.44e9,
            "bandwidth_hz": 69.12e9,
            "bit_energy_db": 14.0
        },
        "path_loss": { "model": "free_space", "central_frequency_hz": 287.28e9 },
        "access_point": { "station_id": 0, "position": { "x": 0.0, "y": 0.0 } },
        "clients": [
            { "station_id": 1, "position": { "x": 5.0, "y": 0.0 }, "initial_orientation_degrees": 168.0 },
            { "station_id": 2, "position": { "x": -3.0, "y": 4.0 } }
        ],
        "traffic": { "payload_bytes": 58952, "mean_inter_arrival_us": 4.0 }
    }"#;

    #[test]
    fn parses_a_complete_scene_with_defaults() {
        let scene = parse_scene(SCENE).unwrap();
        assert_eq!(scene.clients.len(), 2);
        assert_eq!(scene.clients[0].initial_orientation_degrees, Some(168.0));
        assert_eq!(scene.clients[1].initial_orientation_degrees, None);
        assert_eq!(scene.phy.temperature_k, 300.0);
        assert_eq!(scene.phy.mcs_profiles.len(), 5);
        assert_eq!(scene.traffic.start_offset_us, 0.0);
        assert!(scene.propagation_speed_m_per_s.is_none());
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let text = SCENE.replace("\"station_id\": 2", "\"station_id\": 0");
        match parse_scene(&text) {
            Err(SceneLoadError::ValidationError(msg)) => assert!(msg.contains("Duplicate"), "{}", msg),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn bad_beamwidth_and_json_are_reported() {
        let text = SCENE.replace("\"beamwidth_degrees\": 12.0", "\"beamwidth_degrees\": 180.0");
        assert!(matches!(parse_scene(&text), Err(SceneLoadError::ValidationError(_))));
        assert!(matches!(parse_scene("{ not json"), Err(SceneLoadError::ParseError(_))));
    }

    #[test]
    fn initial_orientation_must_be_a_plain_angle() {
        let text = SCENE.replace("\"initial_orientation_degrees\": 168.0", "\"initial_orientation_degrees\": 1e20");
        match parse_scene(&text) {
            Err(SceneLoadError::ValidationError(msg)) => assert!(msg.contains("initial orientation"), "{}", msg),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
        let text = SCENE.replace("\"initial_orientation_degrees\": 168.0", "\"initial_orientation_degrees\": -360.0");
        assert!(parse_scene(&text).is_ok());
    }

    #[test]
    fn missing_file_is_a_read_error() {
        assert!(matches!(
            load_scene("/definitely/not/here/scene.json"),
            Err(SceneLoadError::FileReadError(_))
        ));
    }
}
