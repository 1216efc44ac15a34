// emberward_protocol — wire protocol for multiplayer relay communication.
//
// This crate defines the message types, framing, and serialization used by
// the pairing relay (`emberward_relay`) and game peers to communicate over
// TCP. It is shared between both sides and has no dependency on the sync or
// game crates.
//
// Module overview:
// - `types.rs`:    Core ID types — `PeerId`, `RoomId`, `NetworkId`,
//                  `WaveNumber`, `Slot`, plus the per-peer
//                  `NetworkIdAllocator`.
// - `message.rs`:  Client-to-relay and relay-to-client message enums, plus
//                  the room-scoped `RoomEvent` catalogue and `EnemyState`.
// - `framing.rs`:  Length-delimited framing over any `Read`/`Write` stream:
//                  4-byte big-endian length prefix, then JSON payload.
//
// Design decisions:
// - **JSON serialization.** Human-readable on the wire, trivially debuggable
//   with a packet capture. Binary framing can be swapped in later if
//   bandwidth matters.
// - **Typed room events.** The relay forwards `RoomEvent`s without inspecting
//   them, but both endpoints validate the full schema via serde. A payload
//   that fails to deserialize is dropped with no state change.
// - **No async runtime.** Uses `std::io::Read`/`Write` for framing,
//   compatible with both blocking TCP streams and buffered wrappers.

pub mod framing;
pub mod message;
pub mod types;

pub use framing::{MAX_MESSAGE_SIZE, read_message, write_message};
pub use message::{ClientMessage, EnemyState, PROTOCOL_VERSION, RoomEvent, ServerMessage};
pub use types::{NetworkId, NetworkIdAllocator, PeerId, RoomId, Slot, WaveNumber};
