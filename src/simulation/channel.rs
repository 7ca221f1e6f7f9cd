//! Shared propagation medium.
//!
//! The channel knows every registered physical layer. When one of them
//! transmits, it computes for every other station:
//! - propagation delay from the delay model
//! - combined antenna gain from the sender/receiver beam orientations
//! - received power from the path loss model
//!
//! and schedules a receive-start event carrying a private copy of the frame.
//! Frames in flight at a receiver are tracked as noise entries until their
//! reception window closes.

use log::{trace, warn};
use rand::RngCore;

use super::antenna::{AntennaMode, Beam, DirectionalAntenna};
use super::frame::MacFrame;
use super::geometry::{Position, distance};
use super::phy::Transmission;
use super::scheduler::Scheduler;
use super::signal_calculations::{DelayModel, PathLossModel};
use super::time::{SimDuration, SimTime};
use super::types::{Event, PhyHandle, StationId};

/// Read access to the parts of a station the channel needs.
pub trait StationView {
    fn position(&self) -> &Position;
    fn antenna(&self) -> &DirectionalAntenna;
}

/// A frame copy travelling towards one receiver.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub receiver: PhyHandle,
    pub frame: MacFrame,
    pub duration: SimDuration,
    pub rx_power_dbm: f64,
    /// Instant the sender stops transmitting.
    pub tx_end: SimTime,
}

/// Signal energy currently arriving at a receiver.
#[derive(Debug, Clone)]
pub struct NoiseEntry {
    pub frame: MacFrame,
    pub receiver: PhyHandle,
}

pub struct PropagationChannel {
    roster: Vec<(StationId, PhyHandle)>,
    path_loss: Box<dyn PathLossModel>,
    delay_model: Box<dyn DelayModel>,
    noise: Vec<NoiseEntry>,
}

/// Pick the (rx, tx) boresights, in radians, that apply to a sender/receiver pair.
fn pair_orientations(sender: &DirectionalAntenna, receiver: &DirectionalAntenna) -> (f64, f64) {
    match sender.mode() {
        AntennaMode::DirectionalReceiver => (sender.orientation_radians(Beam::Rx), receiver.orientation_radians(Beam::Tx)),
        AntennaMode::DirectionalTransmitter => (receiver.orientation_radians(Beam::Rx), sender.orientation_radians(Beam::Tx)),
        AntennaMode::Omni => (0.0, 0.0),
    }
}

impl PropagationChannel {
    pub fn new(path_loss: Box<dyn PathLossModel>, delay_model: Box<dyn DelayModel>) -> Self {
        PropagationChannel {
            roster: Vec::new(),
            path_loss,
            delay_model,
            noise: Vec::new(),
        }
    }

    /// Add a station's physical layer. Handles are dense indices in registration order.
    pub fn register_station(&mut self, station: StationId) -> PhyHandle {
        let handle = PhyHandle(self.roster.len());
        self.roster.push((station, handle));
        handle
    }

    /// Fan a transmission out to every other registered station.
    ///
    /// `stations` must be indexed by `PhyHandle`.
    pub fn send_packet<S: StationView>(
        &mut self,
        scheduler: &mut Scheduler<Event>,
        stations: &[S],
        sender: PhyHandle,
        transmission: Transmission,
        rng: &mut dyn RngCore,
    ) {
        let now = scheduler.now();
        let Some(&(sender_id, _)) = self.roster.iter().find(|(_, h)| *h == sender) else {
            warn!("Transmission from unregistered phy {:?} dropped", sender);
            return;
        };
        let Some(sender_station) = stations.get(sender.0) else {
            warn!("[{}] Transmission from phy {:?} without station state dropped", sender_id, sender);
            return;
        };
        let tx_end = now + transmission.duration;
        scheduler.schedule(
            transmission.duration,
            Event::TransmitDone {
                station: sender,
                uid: transmission.frame.uid,
            },
        );

        for &(receiver_id, receiver) in self.roster.iter() {
            if receiver == sender {
                continue;
            }
            let Some(receiver_station) = stations.get(receiver.0) else {
                continue;
            };
            let tx_antenna = sender_station.antenna();
            let rx_antenna = receiver_station.antenna();
            let d = distance(sender_station.position(), receiver_station.position());
            let delay = self.delay_model.delay(d);
            let (rx_orientation, tx_orientation) = pair_orientations(tx_antenna, rx_antenna);
            let gain = rx_antenna.pair_gain_db(
                tx_antenna.mode(),
                rx_antenna.mode(),
                sender_station.position(),
                receiver_station.position(),
                rx_orientation,
                tx_orientation,
            );
            let rx_power_dbm = self.path_loss.rx_power_dbm(transmission.tx_power_dbm, d, gain, rng);
            trace!(
                "[{}] {:?} uid {} -> {}: distance {:.3} m, delay {}, gain {:.2} dB, power {:.2} dBm",
                sender_id, transmission.frame.kind, transmission.frame.uid, receiver_id, d, delay, gain, rx_power_dbm
            );
            scheduler.schedule(
                delay,
                Event::ReceiveStart(Delivery {
                    receiver,
                    frame: transmission.frame.clone(),
                    duration: transmission.duration,
                    rx_power_dbm,
                    tx_end,
                }),
            );
        }
    }

    /// First bit arrived: track the energy and schedule the end of the reception window.
    pub fn receive_packet(&mut self, scheduler: &mut Scheduler<Event>, delivery: &Delivery) {
        self.noise.push(NoiseEntry {
            frame: delivery.frame.clone(),
            receiver: delivery.receiver,
        });
        scheduler.schedule(delivery.duration, Event::ReceiveEnd(delivery.clone()));
    }

    /// Reception window closed: retire the matching noise entry.
    pub fn receive_packet_done(&mut self, delivery: &Delivery) {
        if let Some(i) = self
            .noise
            .iter()
            .position(|n| n.receiver == delivery.receiver && n.frame.uid == delivery.frame.uid)
        {
            self.noise.remove(i);
        }
    }

    /// Noise entries currently arriving at `receiver`.
    #[cfg(test)]
    fn active_noise(&self, receiver: PhyHandle) -> impl Iterator<Item = &NoiseEntry> {
        self.noise.iter().filter(move |n| n.receiver == receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::frame::{Address, FrameKind};
    use crate::simulation::signal_calculations::{ConstantSpeedDelay, PathLossParameters};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    struct Node {
        position: Position,
        antenna: DirectionalAntenna,
    }

    impl StationView for Node {
        fn position(&self) -> &Position {
            &self.position
        }
        fn antenna(&self) -> &DirectionalAntenna {
            &self.antenna
        }
    }

    fn channel() -> PropagationChannel {
        PropagationChannel::new(
            Box::new(PathLossParameters::LogDistance {
                path_loss_exponent: 2.0,
                shadowing_sigma: 0.0,
                path_loss_at_reference_distance: 40.0,
            }),
            Box::new(ConstantSpeedDelay::default()),
        )
    }

    fn nodes() -> Vec<Node> {
        let mut ap = DirectionalAntenna::new(AntennaMode::DirectionalReceiver, 12.0, 24.57).unwrap();
        ap.tune_orientation(Beam::Rx, 0.0);
        let mut client = DirectionalAntenna::new(AntennaMode::DirectionalTransmitter, 12.0, 24.57).unwrap();
        client.tune_orientation(Beam::Tx, 180.0);
        vec![
            Node {
                position: Position::ORIGIN,
                antenna: ap,
            },
            Node {
                position: Position::new(3.0, 0.0, 0.0),
                antenna: client,
            },
        ]
    }

    fn transmission(uid: u64, source: StationId) -> Transmission {
        Transmission {
            frame: MacFrame::control(uid, FrameKind::Cta, source, Address::Broadcast),
            duration: SimDuration::from_nanos(4),
            tx_power_dbm: 20.0,
        }
    }

    #[test]
    fn send_schedules_delivery_to_peers_and_completion_to_sender() {
        let mut ch = channel();
        let ap = ch.register_station(0);
        let client = ch.register_station(7);
        let stations = nodes();
        let mut scheduler = Scheduler::new();
        let mut rng = StdRng::seed_from_u64(3);

        ch.send_packet(&mut scheduler, &stations, ap, transmission(1, 0), &mut rng);
        assert_eq!(scheduler.pending_count(), 2);

        let mut deliveries = Vec::new();
        let mut done = Vec::new();
        while let Some(fired) = scheduler.pop_next() {
            match fired.event {
                Event::ReceiveStart(d) => deliveries.push((fired.at, d)),
                Event::TransmitDone { station, uid } => done.push((fired.at, station, uid)),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(done, vec![(SimTime::from_nanos(4), ap, 1)]);
        assert_eq!(deliveries.len(), 1);
        let (at, d) = &deliveries[0];
        assert_eq!(d.receiver, client);
        // 3 m at the speed of light
        assert_eq!(at.as_picos(), 10_007);
        // 20 dBm + 49.14 dB - (40 + 20 log10 3) dB
        let expected = 20.0 + 49.14 - (40.0 + 20.0 * 3f64.log10());
        assert!((d.rx_power_dbm - expected).abs() < 1e-6, "{}", d.rx_power_dbm);
        assert_eq!(d.tx_end, SimTime::from_nanos(4));
    }

    #[test]
    fn client_to_access_point_uses_same_pair_gain() {
        let mut ch = channel();
        let _ap = ch.register_station(0);
        let client = ch.register_station(7);
        let stations = nodes();
        let mut scheduler = Scheduler::new();
        let mut rng = StdRng::seed_from_u64(3);
        ch.send_packet(&mut scheduler, &stations, client, transmission(2, 7), &mut rng);
        let power = std::iter::from_fn(|| scheduler.pop_next())
            .find_map(|f| match f.event {
                Event::ReceiveStart(d) => Some(d.rx_power_dbm),
                _ => None,
            })
            .unwrap();
        let expected = 20.0 + 49.14 - (40.0 + 20.0 * 3f64.log10());
        assert!((power - expected).abs() < 1e-6);
    }

    #[test]
    fn noise_entries_live_for_the_reception_window() {
        let mut ch = channel();
        let ap = ch.register_station(0);
        let mut scheduler: Scheduler<Event> = Scheduler::new();
        let d1 = Delivery {
            receiver: ap,
            frame: MacFrame::control(1, FrameKind::Rts, 7, Address::Station(0)),
            duration: SimDuration::from_nanos(3),
            rx_power_dbm: -30.0,
            tx_end: SimTime::from_nanos(3),
        };
        let mut d2 = d1.clone();
        d2.frame.uid = 2;
        d2.rx_power_dbm = -40.0;

        ch.receive_packet(&mut scheduler, &d1);
        ch.receive_packet(&mut scheduler, &d2);
        assert_eq!(ch.active_noise(ap).count(), 2);
        assert_eq!(scheduler.pending_count(), 2);

        ch.receive_packet_done(&d1);
        let left: Vec<u64> = ch.active_noise(ap).map(|n| n.frame.uid).collect();
        assert_eq!(left, vec![2]);
        ch.receive_packet_done(&d2);
        assert_eq!(ch.active_noise(ap).count(), 0);
    }
}
