//! Client transmit queue bookkeeping and duplicate detection.

use std::collections::HashMap;

use crate::simulation::frame::FRAME_OVERHEAD_BYTES;
use crate::simulation::scheduler::TimerHandle;
use crate::simulation::time::SimTime;
use crate::simulation::types::StationId;

/// One packet waiting for its handshake to complete.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub sequence: u16,
    /// Payload plus MAC header, in bytes.
    pub size_bytes: u32,
    pub enqueued_at: SimTime,
    pub retry: u16,
    /// Beacons still to skip before contending again.
    pub backoff_life: u32,
}

impl QueueEntry {
    /// Payload reported in result records: entry size minus the per-frame overhead.
    pub fn reported_payload_bytes(&self) -> u32 {
        self.size_bytes.saturating_sub(FRAME_OVERHEAD_BYTES)
    }
}

/// A pending ACK timeout for a transmitted DATA frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AckWait {
    pub sequence: u16,
    pub timer: TimerHandle,
}

/// Last sequence number seen per source, for filtering retransmitted frames.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last_seen: HashMap<StationId, u16>,
}

impl SequenceTracker {
    /// Returns `false` if `sequence` repeats the last one seen from `source`.
    /// The first frame from a source is always new.
    pub fn is_new(&mut self, source: StationId, sequence: u16) -> bool {
        match self.last_seen.insert(source, sequence) {
            Some(previous) => previous != sequence,
            None => true,
        }
    }
}
