//! Adaptive link-loss watchdog.
//!
//! The access point revisits a client's sector once per sweep, so the gap
//! between beacons tells the client how long silence is normal. The watchdog
//! keeps the last five beacon arrival times and uses the largest of the four
//! gaps as the timeout, never less than the configured floor.

use std::collections::VecDeque;

use crate::simulation::geometry::Position;
use crate::simulation::time::{SimDuration, SimTime};

const WINDOW: usize = 5;

#[derive(Debug, Clone)]
pub struct LinkWatchdog {
    arrivals: VecDeque<SimTime>,
    floor: SimDuration,
    timeout: SimDuration,
    last_position: Option<Position>,
}

impl LinkWatchdog {
    pub fn new(floor: SimDuration) -> Self {
        LinkWatchdog {
            arrivals: VecDeque::with_capacity(WINDOW),
            floor,
            timeout: floor,
            last_position: None,
        }
    }

    /// Record a beacon received at `at` while the station sits at `position`.
    ///
    /// # Returns
    ///
    /// The timeout to arm the watchdog with.
    pub fn observe_beacon(&mut self, at: SimTime, position: &Position) -> SimDuration {
        self.arrivals.push_back(at);
        if self.arrivals.len() > WINDOW {
            self.arrivals.pop_front();
        }
        let moved = self.last_position.is_some_and(|p| p != *position);
        self.last_position = Some(*position);

        self.timeout = if moved || self.arrivals.len() < WINDOW {
            self.floor
        } else {
            let largest_gap = self
                .arrivals
                .iter()
                .zip(self.arrivals.iter().skip(1))
                .map(|(earlier, later)| later.saturating_since(*earlier))
                .max()
                .unwrap_or(SimDuration::ZERO);
            largest_gap.max(self.floor)
        };
        self.timeout
    }

    pub fn timeout(&self) -> SimDuration {
        self.timeout
    }
}
