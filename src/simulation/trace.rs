//! Result records and per-station trace sinks.
//!
//! Every terminal outcome of a queued packet produces exactly one
//! [`ResultRecord`]. Records are kept in memory and, when a sink is attached,
//! appended to it as one tab-separated line:
//!
//! ```text
//! station \t payload_bytes \t delay_ns \t success(0/1) \t discard(0/1)
//! ```
//!
//! Discovery and rediscovery events have their own optional sinks. Write
//! failures are logged and do not stop the simulation; `flush` reports them
//! at the end of a run.

use log::{error, info};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::time::{SimDuration, SimTime};
use super::types::StationId;

#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub station: StationId,
    pub payload_bytes: u32,
    pub delay: SimDuration,
    pub success: bool,
    pub discard: bool,
}

impl fmt::Display for ResultRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}",
            self.station,
            self.payload_bytes,
            self.delay.as_nanos(),
            self.success as u8,
            self.discard as u8
        )
    }
}

/// First alignment with the access point. Later ones, after a link loss or a
/// relocation, are reported as [`RediscoveryRecord`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryRecord {
    pub station: StationId,
    pub rounds: u32,
    pub angle_degrees: f64,
    pub at: SimTime,
}

impl fmt::Display for DiscoveryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}", self.station, self.rounds, self.angle_degrees, self.at.as_nanos())
    }
}

/// Time between a link loss and the next beacon.
#[derive(Debug, Clone, PartialEq)]
pub struct RediscoveryRecord {
    pub station: StationId,
    pub latency: SimDuration,
}

impl fmt::Display for RediscoveryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.station, self.latency.as_nanos())
    }
}

/// Running counters for one station.
#[derive(Debug, Clone, Default)]
pub struct StationStats {
    pub delivered: u32,
    pub discarded: u32,
    /// Handshake timeouts (CTS or ACK) observed.
    pub collisions: u32,
    pub discoveries: u32,
    pub rediscoveries: u32,
    throughput_sum_bps: f64,
    throughput_samples: u32,
}

impl StationStats {
    /// Mean of the per-packet throughput samples, in bit/s.
    pub fn average_throughput_bps(&self) -> f64 {
        if self.throughput_samples == 0 {
            0.0
        } else {
            self.throughput_sum_bps / self.throughput_samples as f64
        }
    }
}

/// Trace state for one simulation run, handed to protocol code explicitly.
#[derive(Default)]
pub struct SimulationContext {
    results: Vec<ResultRecord>,
    discoveries: Vec<DiscoveryRecord>,
    rediscoveries: Vec<RediscoveryRecord>,
    stats: BTreeMap<StationId, StationStats>,
    results_sink: Option<Box<dyn Write>>,
    discovery_sink: Option<Box<dyn Write>>,
    rediscovery_sink: Option<Box<dyn Write>>,
    write_failed: bool,
}

fn open_append(path: &Path) -> io::Result<Box<dyn Write>> {
    let file: File = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(Box::new(BufWriter::new(file)))
}

/// Path of a companion trace file: `prefix` + result file name, in the same directory.
pub fn companion_path(results_path: &Path, prefix: &str) -> PathBuf {
    let name = results_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    results_path.with_file_name(format!("{}{}", prefix, name))
}

impl SimulationContext {
    /// Context that keeps records in memory only.
    pub fn in_memory() -> Self {
        SimulationContext::default()
    }

    /// Context appending results to `results_path` and discovery traces to companion files.
    pub fn with_files(results_path: &Path) -> io::Result<Self> {
        let mut ctx = SimulationContext::default();
        ctx.results_sink = Some(open_append(results_path)?);
        ctx.discovery_sink = Some(open_append(&companion_path(results_path, "DiscoveryTime_"))?);
        ctx.rediscovery_sink = Some(open_append(&companion_path(results_path, "ReDiscoveryTime_"))?);
        info!("Writing results to {}", results_path.display());
        Ok(ctx)
    }

    /// Attach an arbitrary writer as the result sink.
    pub fn with_results_writer(writer: Box<dyn Write>) -> Self {
        SimulationContext {
            results_sink: Some(writer),
            ..SimulationContext::default()
        }
    }

    fn write_line(sink: &mut Option<Box<dyn Write>>, failed: &mut bool, line: &dyn fmt::Display) {
        if let Some(w) = sink.as_mut() {
            if let Err(e) = writeln!(w, "{}", line) {
                if !*failed {
                    error!("Trace write failed: {}", e);
                }
                *failed = true;
            }
        }
    }

    fn stats_mut(&mut self, station: StationId) -> &mut StationStats {
        self.stats.entry(station).or_default()
    }

    pub fn record_result(&mut self, record: ResultRecord) {
        let stats = self.stats_mut(record.station);
        if record.success {
            stats.delivered += 1;
        }
        if record.discard {
            stats.discarded += 1;
        }
        Self::write_line(&mut self.results_sink, &mut self.write_failed, &record);
        self.results.push(record);
    }

    pub fn record_discovery(&mut self, record: DiscoveryRecord) {
        self.stats_mut(record.station).discoveries += 1;
        Self::write_line(&mut self.discovery_sink, &mut self.write_failed, &record);
        self.discoveries.push(record);
    }

    pub fn record_rediscovery(&mut self, record: RediscoveryRecord) {
        self.stats_mut(record.station).rediscoveries += 1;
        Self::write_line(&mut self.rediscovery_sink, &mut self.write_failed, &record);
        self.rediscoveries.push(record);
    }

    pub fn record_collision(&mut self, station: StationId) {
        self.stats_mut(station).collisions += 1;
    }

    pub fn record_throughput(&mut self, station: StationId, bps: f64) {
        let stats = self.stats_mut(station);
        stats.throughput_sum_bps += bps;
        stats.throughput_samples += 1;
    }

    pub fn results(&self) -> &[ResultRecord] {
        &self.results
    }

    pub fn discoveries(&self) -> &[DiscoveryRecord] {
        &self.discoveries
    }

    pub fn rediscoveries(&self) -> &[RediscoveryRecord] {
        &self.rediscoveries
    }

    pub fn stats(&self, station: StationId) -> Option<&StationStats> {
        self.stats.get(&station)
    }

    pub fn all_stats(&self) -> impl Iterator<Item = (&StationId, &StationStats)> {
        self.stats.iter()
    }

    /// Flush every attached sink, reporting the first failure seen during the run.
    pub fn flush(&mut self) -> io::Result<()> {
        for sink in [&mut self.results_sink, &mut self.discovery_sink, &mut self.rediscovery_sink] {
            if let Some(w) = sink.as_mut() {
                w.flush()?;
            }
        }
        if self.write_failed {
            return Err(io::Error::other("one or more trace lines could not be written"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn result_line_format() {
        let rec = ResultRecord {
            station: 4,
            payload_bytes: 58_947,
            delay: SimDuration::from_picos(1_000_400),
            success: true,
            discard: false,
        };
        assert_eq!(rec.to_string(), "4\t58947\t1000\t1\t0");
    }

    #[test]
    fn records_are_written_and_counted() {
        let buffer = SharedBuffer::default();
        let mut ctx = SimulationContext::with_results_writer(Box::new(buffer.clone()));
        ctx.record_result(ResultRecord {
            station: 1,
            payload_bytes: 100,
            delay: SimDuration::ZERO,
            success: false,
            discard: true,
        });
        ctx.record_throughput(1, 10.0);
        ctx.record_throughput(1, 30.0);
        ctx.flush().unwrap();

        assert_eq!(String::from_utf8(buffer.0.borrow().clone()).unwrap(), "1\t100\t0\t0\t1\n");
        let stats = ctx.stats(1).unwrap();
        assert_eq!(stats.discarded, 1);
        assert_eq!(stats.delivered, 0);
        assert_eq!(stats.average_throughput_bps(), 20.0);
    }

    #[test]
    fn discovery_lines_use_tab_layout() {
        let d = DiscoveryRecord {
            station: 2,
            rounds: 3,
            angle_degrees: 36.0,
            at: SimTime::from_nanos(1_500),
        };
        assert_eq!(d.to_string(), "2\t3\t36\t1500");
        let r = RediscoveryRecord {
            station: 2,
            latency: SimDuration::from_micros(2),
        };
        assert_eq!(r.to_string(), "2\t2000");
    }

    #[test]
    fn companion_files_share_directory() {
        let p = companion_path(Path::new("/tmp/out/result_3way.txt"), "DiscoveryTime_");
        assert_eq!(p, PathBuf::from("/tmp/out/DiscoveryTime_result_3way.txt"));
    }
}
