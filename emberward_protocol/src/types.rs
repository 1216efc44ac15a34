// Core identity types for the multiplayer protocol.
//
// These are lightweight newtypes shared by the relay (`emberward_relay`) and
// the per-peer synchronization session (`emberward_sync`). The string-backed
// ids mirror what flows on the wire:
// - `PeerId`:    transport identity assigned by the relay at handshake.
// - `RoomId`:    opaque identifier of a paired match.
// - `NetworkId`: globally-unique entity id, `{peer}-{counter}`.
//
// `NetworkIdAllocator` lets each peer issue entity ids without any
// coordination: embedding the peer identity makes collisions between
// independently-allocating peers impossible, and the monotonic counter makes
// reuse within one peer impossible.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport identity of a connected peer, assigned by the relay.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a room pairing exactly two peers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Globally-unique identifier for a synchronized entity (tower or enemy).
///
/// Format: `{peer}-{counter}`. Once issued for an entity the id is never
/// reused, even after that entity's destruction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId(pub String);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shared wave counter value. The authoritative copy lives with slot one;
/// slot two only ever adopts broadcast values.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct WaveNumber(pub u32);

impl fmt::Display for WaveNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Participant slot within a room, assigned at pairing and stable for the
/// match. Slot one holds wave authority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    /// Whether this slot may advance the shared wave counter.
    pub fn has_wave_authority(self) -> bool {
        matches!(self, Slot::One)
    }
}

/// Per-peer allocator of entity ids. No central coordination: uniqueness
/// falls out of the peer identity prefix plus the monotonic counter.
#[derive(Clone, Debug)]
pub struct NetworkIdAllocator {
    peer: PeerId,
    next: u64,
}

impl NetworkIdAllocator {
    pub fn new(peer: PeerId) -> Self {
        Self { peer, next: 1 }
    }

    /// Issue a fresh id. Ids are never reissued by this allocator.
    pub fn allocate(&mut self) -> NetworkId {
        let id = NetworkId(format!("{}-{}", self.peer.0, self.next));
        self.next += 1;
        id
    }
}
