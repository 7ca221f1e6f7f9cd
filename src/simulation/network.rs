//! Network world and the event loop driving the simulation timeline.
//!
//! High-level flow of each loop step:
//! 1) Pop the earliest event from the scheduler (virtual time jumps to it).
//! 2) Route it: MAC timers and transmit completions go to the owning station,
//!    receive start/end events pass through the channel and the receiver's PHY
//!    before the MAC sees them, traffic arrivals feed the client queue.
//! 3) Hand every frame the PHY accepted during the step to the channel, which
//!    fans it out to all other stations.
//!
//! The run ends when the queue is empty or the next event lies past the end time.

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

use super::antenna::{AntennaError, AntennaMode, DirectionalAntenna};
use super::channel::{PropagationChannel, StationView};
use super::frame::FrameIdAllocator;
use super::geometry::{Position, distance};
use super::mac::client::ClientSetup;
use super::mac::{AccessPointMac, ClientMac, MacContext, MacProtocol, MacRole};
use super::phy::{PhyLayer, SimplePhy};
use super::scheduler::{Scheduler, TimerHandle};
use super::signal_calculations::{ConstantSpeedDelay, DelayModel};
use super::time::{SimDuration, SimTime};
use super::trace::SimulationContext;
use super::traffic::TrafficSource;
use super::types::{Event, PhyHandle, StationId};
use crate::common::scene::Scene;
use crate::control::config::{ConfigError, SimulationConfig};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Antenna(#[from] AntennaError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid traffic parameters: {0}")]
    Traffic(String),
}

/// One simulated device: geometry, radio and protocol role.
pub struct Station {
    pub id: StationId,
    pub handle: PhyHandle,
    pub position: Position,
    pub antenna: DirectionalAntenna,
    pub phy: SimplePhy,
    pub mac: MacRole,
    pub traffic: Option<TrafficSource>,
}

impl StationView for Station {
    fn position(&self) -> &Position {
        &self.position
    }

    fn antenna(&self) -> &DirectionalAntenna {
        &self.antenna
    }
}

/// Global frame counters, in the spirit of a live network view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkCounters {
    pub sent_frames: u64,
    pub decoded_frames: u64,
    pub lost_frames: u64,
    pub offered_packets: u64,
    pub queued_packets: u64,
}

pub struct Network {
    stations: Vec<Station>,
    scheduler: Scheduler<Event>,
    channel: PropagationChannel,
    trace: SimulationContext,
    rng: StdRng,
    frame_ids: FrameIdAllocator,
    end: SimTime,
    started: bool,
    counters: NetworkCounters,
}

impl Network {
    /// Build the world described by `scene`: the access point gets the first
    /// handle, clients follow in scene order.
    pub fn from_scene(scene: &Scene, config: &SimulationConfig, trace: SimulationContext) -> Result<Self, BuildError> {
        let handshake = config.handshake()?;
        let delay_model = match scene.propagation_speed_m_per_s {
            Some(speed_m_per_s) => ConstantSpeedDelay { speed_m_per_s },
            None => ConstantSpeedDelay::default(),
        };
        let ap_position = scene.access_point.position;
        let cell_radius = scene
            .clients
            .iter()
            .map(|c| distance(&c.position, &ap_position))
            .fold(0.0, f64::max);
        let cell_propagation_delay = delay_model.delay(cell_radius);

        let mut channel = PropagationChannel::new(Box::new(scene.path_loss.clone()), Box::new(delay_model));
        let new_antenna = || DirectionalAntenna::new(AntennaMode::Omni, scene.antenna.beamwidth_degrees, scene.antenna.max_gain_db);

        let mut stations = Vec::with_capacity(scene.clients.len() + 1);
        let ap_id = scene.access_point.station_id;
        stations.push(Station {
            id: ap_id,
            handle: channel.register_station(ap_id),
            position: ap_position,
            antenna: new_antenna()?,
            phy: SimplePhy::new(ap_id, scene.phy.clone()),
            mac: MacRole::AccessPoint(Box::new(AccessPointMac::new(
                ap_id,
                config.clone(),
                handshake,
                cell_propagation_delay,
            ))),
            traffic: None,
        });

        for client in &scene.clients {
            let setup = ClientSetup {
                access_point: ap_id,
                access_point_position: ap_position,
                cell_propagation_delay,
                initial_orientation: client.initial_orientation_degrees,
            };
            let traffic = TrafficSource::new(scene.traffic.clone()).map_err(BuildError::Traffic)?;
            stations.push(Station {
                id: client.station_id,
                handle: channel.register_station(client.station_id),
                position: client.position,
                antenna: new_antenna()?,
                phy: SimplePhy::new(client.station_id, scene.phy.clone()),
                mac: MacRole::Client(Box::new(ClientMac::new(client.station_id, setup, config.clone(), handshake))),
                traffic: Some(traffic),
            });
        }

        info!(
            "Network built: access point {} and {} clients, cell radius {:.3} m ({}), {}-way handshake",
            ap_id,
            scene.clients.len(),
            cell_radius,
            cell_propagation_delay,
            handshake.ways()
        );

        Ok(Network {
            stations,
            scheduler: Scheduler::new(),
            channel,
            trace,
            rng: StdRng::seed_from_u64(config.seed),
            frame_ids: FrameIdAllocator::default(),
            end: SimTime::from_millis(config.duration_ms),
            started: false,
            counters: NetworkCounters::default(),
        })
    }

    pub fn now(&self) -> SimTime {
        self.scheduler.now()
    }

    pub fn end_time(&self) -> SimTime {
        self.end
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn station(&self, id: StationId) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn trace(&self) -> &SimulationContext {
        &self.trace
    }

    pub fn trace_mut(&mut self) -> &mut SimulationContext {
        &mut self.trace
    }

    pub fn counters(&self) -> NetworkCounters {
        self.counters
    }

    /// Start every MAC and schedule the first packet of every traffic source.
    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        // Every antenna must be configured before the first frame is propagated
        for index in 0..self.stations.len() {
            self.call_mac(PhyHandle(index), |mac, ctx| mac.start(ctx));
        }
        for index in 0..self.stations.len() {
            let handle = PhyHandle(index);
            self.launch_outgoing(handle);
            if let Some(first) = self.stations[index].traffic.as_ref().map(|t| t.first_arrival()) {
                self.scheduler.schedule(first, Event::TrafficArrival { station: handle });
            }
        }
    }

    /// Run until the configured end time.
    pub fn run(&mut self) {
        let end = self.end;
        self.run_until(end);
    }

    /// Process every event due at or before `until`, then park the clock there.
    pub fn run_until(&mut self, until: SimTime) {
        self.start();
        while let Some(at) = self.scheduler.peek_deadline() {
            if at > until {
                break;
            }
            let Some(fired) = self.scheduler.pop_next() else {
                break;
            };
            self.handle_event(fired.handle, fired.event);
        }
        self.scheduler.advance_to(until);
        debug!(
            "Run paused at {}: {} events pending, {} frames sent, {} decoded, {} lost",
            self.scheduler.now(),
            self.scheduler.pending_count(),
            self.counters.sent_frames,
            self.counters.decoded_frames,
            self.counters.lost_frames
        );
    }

    fn handle_event(&mut self, handle: TimerHandle, event: Event) {
        let now = self.scheduler.now();
        match event {
            Event::Mac { station, timer } => {
                self.with_mac(station, |mac, ctx| mac.on_timer_fired(ctx, handle, timer));
            }
            Event::ReceiveStart(delivery) => {
                self.channel.receive_packet(&mut self.scheduler, &delivery);
                let Some(receiver) = self.stations.get_mut(delivery.receiver.0) else {
                    warn!("Delivery to unknown phy {:?}", delivery.receiver);
                    return;
                };
                receiver
                    .phy
                    .on_receive_start(now, &delivery.frame, delivery.duration, delivery.rx_power_dbm);
                self.with_mac(delivery.receiver, |mac, ctx| mac.on_receive_start(ctx, &delivery.frame));
            }
            Event::ReceiveEnd(delivery) => {
                self.channel.receive_packet_done(&delivery);
                let Some(receiver) = self.stations.get_mut(delivery.receiver.0) else {
                    warn!("Delivery to unknown phy {:?}", delivery.receiver);
                    return;
                };
                let decoded = receiver.phy.on_receive_complete(now, &delivery.frame);
                if decoded {
                    self.counters.decoded_frames += 1;
                } else {
                    self.counters.lost_frames += 1;
                }
                self.with_mac(delivery.receiver, |mac, ctx| mac.on_frame_received(ctx, &delivery.frame, decoded));
            }
            Event::TransmitDone { station, uid } => {
                let Some(sender) = self.stations.get_mut(station.0) else {
                    warn!("Transmit completion for unknown phy {:?}", station);
                    return;
                };
                if !sender.phy.on_transmit_complete(now, uid) {
                    warn!("[{}] PHY completion for uid {} does not match the frame on air", sender.id, uid);
                }
                self.with_mac(station, |mac, ctx| mac.on_transmit_complete(ctx, uid));
            }
            Event::TrafficArrival { station } => {
                let Some(source) = self.stations.get_mut(station.0).and_then(|s| s.traffic.as_mut()) else {
                    warn!("Traffic arrival for phy {:?} without a source", station);
                    return;
                };
                let payload = source.payload_bytes();
                let gap = source.next_gap(&mut self.rng);
                self.scheduler.schedule(gap, Event::TrafficArrival { station });

                self.counters.offered_packets += 1;
                let mut queued = false;
                self.with_mac(station, |mac, ctx| queued = mac.enqueue(ctx, payload));
                if queued {
                    self.counters.queued_packets += 1;
                }
            }
        }
    }

    /// Call into one station's MAC, then put whatever its PHY accepted on the channel.
    fn with_mac<F>(&mut self, handle: PhyHandle, f: F)
    where
        F: FnOnce(&mut MacRole, &mut MacContext<'_>),
    {
        self.call_mac(handle, f);
        self.launch_outgoing(handle);
    }

    /// Call into one station's MAC with a freshly assembled context.
    fn call_mac<F>(&mut self, handle: PhyHandle, f: F)
    where
        F: FnOnce(&mut MacRole, &mut MacContext<'_>),
    {
        let Some(station) = self.stations.get_mut(handle.0) else {
            warn!("No station behind phy {:?}", handle);
            return;
        };
        let Station {
            id,
            position,
            antenna,
            phy,
            mac,
            ..
        } = station;
        let mut ctx = MacContext {
            station: *id,
            handle,
            position,
            antenna,
            phy,
            scheduler: &mut self.scheduler,
            rng: &mut self.rng,
            frame_ids: &mut self.frame_ids,
            trace: &mut self.trace,
        };
        f(mac, &mut ctx);
    }

    fn launch_outgoing(&mut self, handle: PhyHandle) {
        let outgoing = match self.stations.get_mut(handle.0) {
            Some(station) => station.phy.take_outgoing(),
            None => return,
        };
        for transmission in outgoing {
            self.counters.sent_frames += 1;
            self.channel
                .send_packet(&mut self.scheduler, &self.stations, handle, transmission, &mut self.rng);
        }
    }

    /// Per-station digest of the run so far.
    pub fn summary(&self) -> RunSummary {
        let stations = self
            .stations
            .iter()
            .map(|s| {
                let stats = self.trace.stats(s.id).cloned().unwrap_or_default();
                let role = match &s.mac {
                    MacRole::Client(c) => StationRole::Client {
                        queued: c.queue_len(),
                        generated: s.traffic.as_ref().map(|t| t.generated()).unwrap_or(0),
                    },
                    MacRole::AccessPoint(ap) => StationRole::AccessPoint {
                        delivered: ap.delivered(),
                        duplicates: ap.duplicates(),
                    },
                };
                StationSummary {
                    id: s.id,
                    role,
                    delivered: stats.delivered,
                    discarded: stats.discarded,
                    collisions: stats.collisions,
                    discoveries: stats.discoveries,
                    rediscoveries: stats.rediscoveries,
                    average_throughput_bps: stats.average_throughput_bps(),
                }
            })
            .collect();
        RunSummary {
            simulated: self.scheduler.now().saturating_since(SimTime::ZERO),
            counters: self.counters,
            stations,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StationRole {
    AccessPoint { delivered: u64, duplicates: u64 },
    Client { queued: usize, generated: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StationSummary {
    pub id: StationId,
    pub role: StationRole,
    pub delivered: u32,
    pub discarded: u32,
    pub collisions: u32,
    pub discoveries: u32,
    pub rediscoveries: u32,
    pub average_throughput_bps: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub simulated: SimDuration,
    pub counters: NetworkCounters,
    pub stations: Vec<StationSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::scene::{AccessPointSpec, AntennaParameters, ClientSpec};
    use crate::simulation::mac::client::ClientState;
    use crate::simulation::phy::tests::test_params;
    use crate::simulation::signal_calculations::PathLossParameters;
    use crate::simulation::traffic::{ArrivalProcess, TrafficParameters};

    fn scene(clients: Vec<ClientSpec>) -> Scene {
        Scene {
            antenna: AntennaParameters {
                beamwidth_degrees: 12.0,
                max_gain_db: 24.57,
            },
            phy: test_params(),
            path_loss: PathLossParameters::FreeSpace {
                central_frequency_hz: 287.28e9,
            },
            propagation_speed_m_per_s: None,
            access_point: AccessPointSpec {
                station_id: 0,
                position: Position::ORIGIN,
            },
            clients,
            traffic: TrafficParameters {
                payload_bytes: 15_000,
                mean_inter_arrival_us: 5.0,
                arrival: ArrivalProcess::Constant,
                start_offset_us: 0.0,
            },
        }
    }

    /// Client due east of the access point, its first discovery step facing it.
    fn aligned_client(id: StationId) -> ClientSpec {
        ClientSpec {
            station_id: id,
            position: Position::new(5.0, 0.0, 0.0),
            initial_orientation_degrees: Some(168.0),
        }
    }

    fn config(ways: u8) -> SimulationConfig {
        SimulationConfig {
            handshake_ways: ways,
            duration_ms: 1,
            ..SimulationConfig::default()
        }
    }

    fn client_of(network: &Network, id: StationId) -> &ClientMac {
        network.station(id).and_then(|s| s.mac.as_client()).unwrap()
    }

    #[test]
    fn aligned_client_completes_three_way_exchanges() {
        let mut network = Network::from_scene(&scene(vec![aligned_client(1)]), &config(3), SimulationContext::in_memory()).unwrap();
        network.run_until(SimTime::from_nanos(900));

        assert_ne!(client_of(&network, 1).state(), ClientState::ApDiscovery);
        assert_eq!(network.trace().discoveries().len(), 1);
        let results = network.trace().results();
        assert_eq!(results.len(), 1, "{:?}", results);
        assert!(results[0].success);
        assert_eq!(results[0].payload_bytes, 14_995);
        // CTA, RTS, CTS, DATA and ACK all decoded at their addressee
        let ap = network.station(0).and_then(|s| s.mac.as_access_point()).unwrap();
        assert_eq!(ap.delivered(), 1);
        assert!(network.counters().decoded_frames >= 5);

        network.run();
        let stats = network.trace().stats(1).cloned().unwrap_or_default();
        assert!(stats.delivered > 1);
        assert!(stats.average_throughput_bps() > 0.0);
        assert!(network.trace().results().iter().all(|r| r.success));
    }

    #[test]
    fn aligned_client_completes_one_way_exchanges() {
        let mut network = Network::from_scene(&scene(vec![aligned_client(1)]), &config(1), SimulationContext::in_memory()).unwrap();
        network.run_until(SimTime::from_nanos(900));

        let results = network.trace().results();
        assert_eq!(results.len(), 1, "{:?}", results);
        assert!(results[0].success);
        let ap = network.station(0).and_then(|s| s.mac.as_access_point()).unwrap();
        assert_eq!(ap.delivered(), 1);
    }

    #[test]
    fn misaligned_client_decodes_nothing() {
        let client = ClientSpec {
            station_id: 1,
            position: Position::new(5.0, 0.0, 0.0),
            initial_orientation_degrees: Some(0.0),
        };
        let mut network = Network::from_scene(&scene(vec![client]), &config(3), SimulationContext::in_memory()).unwrap();
        network.run_until(SimTime::from_nanos(500));

        assert_eq!(network.counters().decoded_frames, 0);
        assert!(network.counters().lost_frames >= 1);
        assert_eq!(client_of(&network, 1).state(), ClientState::ApDiscovery);
        assert!(network.trace().discoveries().is_empty());
    }

    #[test]
    fn misaligned_client_eventually_discovers_the_access_point() {
        let client = ClientSpec {
            station_id: 1,
            position: Position::new(5.0, 0.0, 0.0),
            initial_orientation_degrees: Some(0.0),
        };
        let cfg = SimulationConfig {
            duration_ms: 5,
            ..config(3)
        };
        let mut network = Network::from_scene(&scene(vec![client]), &cfg, SimulationContext::in_memory()).unwrap();
        network.run();

        let discoveries = network.trace().discoveries();
        assert_eq!(discoveries.len(), 1);
        // The access point lies due west of the client
        assert!((discoveries[0].angle_degrees - 180.0).abs() <= 12.0, "{:?}", discoveries[0]);
        assert!(network.trace().results().iter().any(|r| r.success));
    }

    fn client_at_bearing(id: StationId, bearing_degrees: f64) -> ClientSpec {
        let (sin, cos) = bearing_degrees.to_radians().sin_cos();
        ClientSpec {
            station_id: id,
            position: Position::new(5.0 * cos, 5.0 * sin, 0.0),
            initial_orientation_degrees: Some(0.0),
        }
    }

    fn successes(network: &Network, id: StationId) -> usize {
        network.trace().results().iter().filter(|r| r.station == id && r.success).count()
    }

    #[test]
    fn clients_around_the_cell_all_discover_and_share_a_sector() {
        // 1 and 2 sit in the same access point sector and contend for it
        let clients = vec![
            client_at_bearing(1, 48.0),
            client_at_bearing(2, 52.0),
            client_at_bearing(3, 156.0),
            client_at_bearing(4, 336.0),
        ];
        let cfg = SimulationConfig {
            duration_ms: 3,
            ..config(3)
        };
        let mut network = Network::from_scene(&scene(clients), &cfg, SimulationContext::in_memory()).unwrap();
        network.run();

        for id in 1..=4 {
            let found: Vec<_> = network.trace().discoveries().iter().filter(|d| d.station == id).collect();
            assert_eq!(found.len(), 1, "station {}: {:?}", id, found);
            assert!(found[0].at <= SimTime::from_millis(2), "station {}: {:?}", id, found[0]);
            assert_ne!(client_of(&network, id).state(), ClientState::ApDiscovery);
        }
        assert!(successes(&network, 3) >= 1);
        assert!(successes(&network, 4) >= 1);
        assert!(successes(&network, 1) + successes(&network, 2) >= 1);

        let total: usize = (1..=4).map(|id| successes(&network, id)).sum();
        let ap = network.station(0).and_then(|s| s.mac.as_access_point()).unwrap();
        assert!(ap.delivered() as usize >= total);
        assert!(network.trace().rediscoveries().is_empty());
    }

    #[test]
    fn dummy_sweep_reports_lead_to_an_assigned_sector() {
        let cfg = SimulationConfig {
            dummy_cta_every: Some(2),
            sector_feedback: true,
            ..config(3)
        };
        let mut network = Network::from_scene(&scene(vec![aligned_client(1)]), &cfg, SimulationContext::in_memory()).unwrap();

        // First sweep is a normal one
        network.run_until(SimTime::from_micros(100));
        assert_eq!(client_of(&network, 1).assigned_sector(), None);
        assert_eq!(successes(&network, 1), 1);

        // The second sweep is dummy: the sector report is answered with feedback
        network.run_until(SimTime::from_micros(150));
        assert_eq!(client_of(&network, 1).assigned_sector(), Some(0));
        assert_eq!(successes(&network, 1), 1);

        network.run();
        assert_eq!(client_of(&network, 1).assigned_sector(), Some(0));
        assert!(successes(&network, 1) >= 3);
        assert!(network.trace().rediscoveries().is_empty());
    }

    #[test]
    fn build_rejects_unsupported_handshake() {
        let mut cfg = config(3);
        cfg.handshake_ways = 2;
        let err = Network::from_scene(&scene(vec![aligned_client(1)]), &cfg, SimulationContext::in_memory());
        assert!(matches!(err, Err(BuildError::Config(ConfigError::UnsupportedHandshake(2)))));
    }

    #[test]
    fn same_seed_same_results() {
        let clients = || vec![aligned_client(1), aligned_client(2)];
        let mut a = Network::from_scene(&scene(clients()), &config(3), SimulationContext::in_memory()).unwrap();
        let mut b = Network::from_scene(&scene(clients()), &config(3), SimulationContext::in_memory()).unwrap();
        a.run_until(SimTime::from_nanos(200_000));
        b.run_until(SimTime::from_nanos(200_000));
        assert_eq!(a.trace().results(), b.trace().results());
        assert_eq!(a.counters(), b.counters());
    }
}
