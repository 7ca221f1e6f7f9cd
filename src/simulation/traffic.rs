//! Upper-layer packet sources feeding client queues.

use rand::RngCore;
use rand_distr::{Distribution, Exp};
use serde::Deserialize;

use super::time::SimDuration;

/// How packet arrival times are spaced.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalProcess {
    /// Exponentially distributed gaps around the mean.
    #[default]
    Poisson,
    /// Every gap equals the mean.
    Constant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrafficParameters {
    pub payload_bytes: u32,
    /// Mean time between packets, in microseconds.
    pub mean_inter_arrival_us: f64,
    #[serde(default)]
    pub arrival: ArrivalProcess,
    /// Delay before the first packet, in microseconds.
    #[serde(default)]
    pub start_offset_us: f64,
}

impl TrafficParameters {
    pub fn validate(&self) -> Result<(), String> {
        if self.payload_bytes == 0 {
            return Err("traffic payload_bytes must be positive".to_string());
        }
        if !(self.mean_inter_arrival_us.is_finite() && self.mean_inter_arrival_us > 0.0) {
            return Err(format!(
                "traffic mean_inter_arrival_us must be positive, got {}",
                self.mean_inter_arrival_us
            ));
        }
        if !(self.start_offset_us.is_finite() && self.start_offset_us >= 0.0) {
            return Err(format!("traffic start_offset_us must be non-negative, got {}", self.start_offset_us));
        }
        Ok(())
    }
}

/// Packet generator attached to one client.
#[derive(Debug, Clone)]
pub struct TrafficSource {
    params: TrafficParameters,
    gaps: Option<Exp<f64>>,
    generated: u64,
}

impl TrafficSource {
    pub fn new(params: TrafficParameters) -> Result<Self, String> {
        params.validate()?;
        let gaps = match params.arrival {
            ArrivalProcess::Poisson => Some(Exp::new(1.0 / params.mean_inter_arrival_us).map_err(|e| e.to_string())?),
            ArrivalProcess::Constant => None,
        };
        Ok(TrafficSource {
            params,
            gaps,
            generated: 0,
        })
    }

    pub fn payload_bytes(&self) -> u32 {
        self.params.payload_bytes
    }

    pub fn first_arrival(&self) -> SimDuration {
        SimDuration::from_secs_f64(self.params.start_offset_us * 1e-6)
    }

    /// Count one generated packet and draw the gap to the next one.
    pub fn next_gap(&mut self, rng: &mut dyn RngCore) -> SimDuration {
        self.generated += 1;
        let micros = match &self.gaps {
            Some(exp) => exp.sample(rng),
            None => self.params.mean_inter_arrival_us,
        };
        SimDuration::from_secs_f64(micros * 1e-6)
    }

    pub fn generated(&self) -> u64 {
        self.generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn params(arrival: ArrivalProcess) -> TrafficParameters {
        TrafficParameters {
            payload_bytes: 58_952,
            mean_inter_arrival_us: 2.0,
            arrival,
            start_offset_us: 0.5,
        }
    }

    #[test]
    fn constant_gaps_equal_the_mean() {
        let mut source = TrafficSource::new(params(ArrivalProcess::Constant)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(source.first_arrival(), SimDuration::from_nanos(500));
        assert_eq!(source.next_gap(&mut rng), SimDuration::from_micros(2));
        assert_eq!(source.generated(), 1);
    }

    #[test]
    fn poisson_gaps_average_near_the_mean() {
        let mut source = TrafficSource::new(params(ArrivalProcess::Poisson)).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let total: f64 = (0..n).map(|_| source.next_gap(&mut rng).as_secs_f64()).sum();
        let mean_us = total / n as f64 * 1e6;
        assert!((mean_us - 2.0).abs() < 0.1, "mean {}", mean_us);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let mut p = params(ArrivalProcess::Poisson);
        p.mean_inter_arrival_us = 0.0;
        assert!(TrafficSource::new(p).is_err());
        let mut p = params(ArrivalProcess::Constant);
        p.payload_bytes = 0;
        assert!(TrafficSource::new(p).is_err());
    }
}
