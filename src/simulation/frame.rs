//! MAC frames exchanged between stations.

use super::time::SimDuration;
use super::types::StationId;

/// MAC header carried by every frame, in bytes.
pub const MAC_HEADER_BYTES: u32 = 48;
/// Physical-layer preamble and header, in bytes.
pub const PHY_OVERHEAD_BYTES: u32 = 5;
/// Total per-frame overhead subtracted from a queue entry size to recover its payload.
pub const FRAME_OVERHEAD_BYTES: u32 = MAC_HEADER_BYTES + PHY_OVERHEAD_BYTES;

/// CTA flag: regular sector announcement.
pub const CTA_FLAG_NORMAL: u8 = 0;
/// CTA flag: dummy beacon soliciting a sector report from every listener.
pub const CTA_FLAG_DUMMY: u8 = 1;
/// CTA flag: feedback telling one client which sector it was heard in.
pub const CTA_FLAG_FEEDBACK: u8 = 2;
/// RTS flag marking the unsolicited answer to a dummy beacon.
pub const RTS_FLAG_SECTOR_REPORT: u8 = 1;

/// Range of CTS flag values interpreted as a modulation-and-coding hint.
pub const MCS_HINT_RANGE: std::ops::RangeInclusive<u8> = 10..=14;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Sector announcement (beacon) from the access point.
    Cta,
    Rts,
    Cts,
    Data,
    Ack,
}

impl FrameKind {
    /// Over-the-air size of a control frame of this kind, in bytes (header plus PHY overhead).
    pub fn control_size_bytes(self) -> u32 {
        let body = match self {
            FrameKind::Cta => 8,
            FrameKind::Rts => 4,
            FrameKind::Cts => 4,
            FrameKind::Ack => 2,
            FrameKind::Data => 0,
        };
        MAC_HEADER_BYTES + PHY_OVERHEAD_BYTES + body
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Address {
    Station(StationId),
    Broadcast,
}

impl Address {
    pub fn is(&self, station: StationId) -> bool {
        matches!(self, Address::Station(id) if *id == station)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MacFrame {
    /// Unique per transmitted frame, used to match transmit completions.
    pub uid: u64,
    pub kind: FrameKind,
    pub source: StationId,
    pub destination: Address,
    pub sequence: u16,
    pub retry: u16,
    pub flags: u8,
    /// Announcement handshake variant (1 or 3) carried by CTA frames.
    pub ways: u8,
    /// Sector index, meaningful in CTA frames.
    pub sector: u16,
    /// Time the receiver of a CTS has to wait before sending DATA.
    pub duration: SimDuration,
    /// Modulation-and-coding index a DATA frame was sent with, 0 for the default rate.
    pub mcs: u8,
    /// MAC frame size: payload plus MAC header for DATA, header plus body for control frames.
    pub size_bytes: u32,
}

impl MacFrame {
    pub fn control(uid: u64, kind: FrameKind, source: StationId, destination: Address) -> Self {
        MacFrame {
            uid,
            kind,
            source,
            destination,
            sequence: 0,
            retry: 0,
            flags: 0,
            ways: 0,
            sector: 0,
            duration: SimDuration::ZERO,
            mcs: 0,
            size_bytes: kind.control_size_bytes() - PHY_OVERHEAD_BYTES,
        }
    }

    pub fn data(uid: u64, source: StationId, destination: StationId, sequence: u16, payload_bytes: u32) -> Self {
        MacFrame {
            uid,
            kind: FrameKind::Data,
            source,
            destination: Address::Station(destination),
            sequence,
            retry: 0,
            flags: 0,
            ways: 0,
            sector: 0,
            duration: SimDuration::ZERO,
            mcs: 0,
            size_bytes: payload_bytes + MAC_HEADER_BYTES,
        }
    }

    /// Bytes on air including PHY overhead.
    pub fn air_bytes(&self) -> u32 {
        self.size_bytes + PHY_OVERHEAD_BYTES
    }

    pub fn is_for(&self, station: StationId) -> bool {
        self.destination.is(station)
    }
}

/// Hands out frame uids unique within one simulation run.
#[derive(Debug, Default)]
pub struct FrameIdAllocator {
    next: u64,
}

impl FrameIdAllocator {
    pub fn next_uid(&mut self) -> u64 {
        self.next += 1;
        self.next
    }
}
