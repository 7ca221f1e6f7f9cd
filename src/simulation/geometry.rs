//! Planar geometry for beam steering.
//!
//! Contains helper functions for:
//! - Euclidean distance between station positions
//! - Bearings (azimuth of one position as seen from another)
//! - Angle normalisation in degrees and radians

use serde::Deserialize;
use std::f64::consts::PI;

/// Station position in metres. The z coordinate only contributes to distance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0, z: 0.0 };

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Position { x, y, z }
    }

    /// Mirror the position through the origin in the horizontal plane.
    pub fn mirrored(&self) -> Position {
        Position {
            x: -self.x,
            y: -self.y,
            z: self.z,
        }
    }
}

/// Euclidean distance in metres.
pub fn distance(a: &Position, b: &Position) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Azimuth of `target` as seen from `origin`, in radians within (-π, π].
///
/// Coincident positions have no defined bearing and yield 0.
pub fn bearing(origin: &Position, target: &Position) -> f64 {
    let dx = target.x - origin.x;
    let dy = target.y - origin.y;
    if dx == 0.0 && dy == 0.0 {
        return 0.0;
    }
    dy.atan2(dx)
}

/// Wrap an angle in radians into (-π, π]. Non-finite input yields 0.
pub fn wrap_to_pi(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// Fold an angle in degrees into (-360, 360]. Positive angles land in
/// (0, 360], negative ones in (-360, 0]. Non-finite input yields 0.
pub fn normalize_degrees(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    if angle > 360.0 {
        let a = angle.rem_euclid(360.0);
        if a == 0.0 { 360.0 } else { a }
    } else if angle <= -360.0 {
        angle % 360.0
    } else {
        angle
    }
}
