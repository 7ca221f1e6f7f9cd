use anyhow::Context;
use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use log::{LevelFilter, info};
use std::path::PathBuf;

mod common;
mod control;
mod simulation;

use common::scene::load_scene;
use control::config::SimulationConfig;
use simulation::network::{Network, RunSummary, StationRole};
use simulation::trace::SimulationContext;

/// Discrete-event simulator of a directional-antenna MAC: one access point
/// sweeping its sectors, clients discovering it and contending with a 1-way or
/// 3-way handshake.
#[derive(Parser)]
#[command(name = "directional-mac-simulator")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scene file (JSON)
    scene: String,

    /// Protocol configuration (TOML); defaults to config.toml next to the scene
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Result file; overrides the configured one
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Random seed; overrides the configured one
    #[arg(long)]
    seed: Option<u64>,

    /// More log output (-v debug for every module, -vv trace for the simulator)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let (global, own) = match verbose {
        0 => (LevelFilter::Info, LevelFilter::Debug),
        1 => (LevelFilter::Debug, LevelFilter::Debug),
        _ => (LevelFilter::Debug, LevelFilter::Trace),
    };
    Builder::new()
        .filter_level(global)
        .filter(Some("directional_mac_simulator"), own)
        .parse_default_env()
        .init();
}

/// Result file name used when neither the command line nor the config names one.
fn default_output_name(config: &SimulationConfig, clients: usize, mean_inter_arrival_us: f64) -> PathBuf {
    PathBuf::from(format!(
        "result_{}way_{}n_{}us_{}.txt",
        config.handshake_ways, clients, mean_inter_arrival_us, config.seed
    ))
}

fn print_summary(summary: &RunSummary) {
    println!("Simulated {} ({})", summary.simulated, Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!(
        "Frames: {} sent, {} decoded, {} lost; packets: {} offered, {} queued",
        summary.counters.sent_frames,
        summary.counters.decoded_frames,
        summary.counters.lost_frames,
        summary.counters.offered_packets,
        summary.counters.queued_packets
    );
    for station in &summary.stations {
        match station.role {
            StationRole::AccessPoint { delivered, duplicates } => {
                println!("  AP {:>5}: {} delivered, {} duplicates", station.id, delivered, duplicates);
            }
            StationRole::Client { queued, generated } => {
                println!(
                    "  STA {:>4}: {} sent, {} discarded, {} timeouts, {} left of {} generated, {:.3} Gbit/s avg",
                    station.id,
                    station.delivered,
                    station.discarded,
                    station.collisions,
                    queued,
                    generated,
                    station.average_throughput_bps / 1e9
                );
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("Starting up");

    let scene = load_scene(&cli.scene).with_context(|| format!("Failed to load scene {}", cli.scene))?;

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| SimulationConfig::config_path_from_scene(&cli.scene));
    let mut config = if config_path.exists() {
        SimulationConfig::load(&config_path).with_context(|| format!("Failed to load config {}", config_path.display()))?
    } else {
        info!("No config at {}, using defaults", config_path.display());
        SimulationConfig::default()
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }

    let output = cli
        .output
        .clone()
        .or_else(|| config.output_file.as_ref().map(PathBuf::from))
        .unwrap_or_else(|| default_output_name(&config, scene.clients.len(), scene.traffic.mean_inter_arrival_us));
    let trace = SimulationContext::with_files(&output).with_context(|| format!("Failed to open result file {}", output.display()))?;

    let mut network = Network::from_scene(&scene, &config, trace).context("Failed to build the network")?;
    network.run();
    network
        .trace_mut()
        .flush()
        .with_context(|| format!("Failed to write results to {}", output.display()))?;

    print_summary(&network.summary());
    Ok(())
}
