// emberward_relay — multiplayer pairing relay for Emberward.
//
// The relay is a thin message broker: it accepts TCP connections from game
// peers, pairs queued peers into two-player rooms, and forwards room events
// verbatim between the two members of a room. It never runs game logic —
// wave timing, entity state, and match resolution all live on the peers.
//
// Module overview:
// - `lobby.rs`:   Lobby state — peer roster, the single waiting slot, room
//                 pairing, fan-out, defeat/disconnect teardown. The core
//                 data structure that `server.rs` drives.
// - `server.rs`:  TCP listener, reader threads (one per peer), and the main
//                 event loop. Uses `std::net` with a thread-per-reader
//                 architecture and an `mpsc` channel to funnel events into
//                 the single-threaded `Lobby`.
// - `client.rs`:  `NetClient`, the peer-side connection: Hello handshake,
//                 background reader thread, non-blocking `poll()`.
//
// Dependencies: `emberward_protocol` (shared message types and framing).
// No dependency on the sync crate.
//
// The relay can run as a standalone binary (`main.rs`) or be embedded in a
// test or game process via the library API (`start_relay`).

pub mod client;
pub mod lobby;
pub mod server;

pub use client::NetClient;
pub use server::start_relay;
