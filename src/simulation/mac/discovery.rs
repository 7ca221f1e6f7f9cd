//! Sector scan used by clients to find the access point.
//!
//! The transmit beam sweeps back and forth between 0° and 360°, one beamwidth
//! per step. Each time the sweep reaches an end it reverses and counts a round.
//! After `full_step_rounds` rounds the step halves so the beam also visits the
//! angles in between the first grid.

use crate::simulation::geometry::normalize_degrees;

#[derive(Debug, Clone)]
pub struct DiscoveryScan {
    beamwidth: f64,
    full_step_rounds: u32,
    angle: f64,
    direction: f64,
    rounds: u32,
}

impl DiscoveryScan {
    pub fn new(beamwidth: f64, initial_angle: f64, full_step_rounds: u32) -> Self {
        DiscoveryScan {
            beamwidth,
            full_step_rounds,
            angle: initial_angle,
            direction: 1.0,
            rounds: 0,
        }
    }

    /// Step the scan and return the new orientation in degrees.
    pub fn advance(&mut self) -> f64 {
        let step = if self.rounds <= self.full_step_rounds {
            self.beamwidth
        } else {
            self.beamwidth / 2.0
        };
        self.angle += self.direction * step;
        if self.angle >= 360.0 {
            self.rounds += 1;
            self.direction = -1.0;
        } else if self.angle <= 0.0 {
            self.rounds += 1;
            self.direction = 1.0;
        }
        self.angle = normalize_degrees(self.angle);
        self.angle
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Sweep forward from the current angle, as after a link loss.
    pub fn restart_forward(&mut self) {
        self.direction = 1.0;
    }

    pub fn reset_rounds(&mut self) {
        self.rounds = 0;
    }

    /// Return to 0° with no completed rounds.
    pub fn reset(&mut self) {
        self.angle = 0.0;
        self.rounds = 0;
    }
}
