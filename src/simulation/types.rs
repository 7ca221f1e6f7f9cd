//! Core identifiers and the event vocabulary of the simulation loop.

use super::channel::Delivery;
use super::mac::MacTimer;

/// Station identifier as written in the scene file.
pub type StationId = u32;

/// Index of a station's physical layer in the channel roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PhyHandle(pub usize);

/// Everything that can sit in the scheduler queue.
#[derive(Debug)]
pub enum Event {
    /// A MAC-owned timer expired.
    Mac { station: PhyHandle, timer: MacTimer },
    /// The first bit of a frame reaches a receiver.
    ReceiveStart(Delivery),
    /// The last bit of a frame has been received.
    ReceiveEnd(Delivery),
    /// The sender finished putting a frame on air.
    TransmitDone { station: PhyHandle, uid: u64 },
    /// The traffic source of a station produces the next packet.
    TrafficArrival { station: PhyHandle },
}
