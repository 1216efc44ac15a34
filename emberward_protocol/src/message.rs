// Protocol messages for peer-relay communication.
//
// Three enums define the full protocol vocabulary:
// - `ClientMessage`: sent by game peers to the relay.
// - `ServerMessage`: sent by the relay to game peers.
// - `RoomEvent`:     room-scoped game events, carried inside the other two
//                    and forwarded verbatim to the opposing room member.
//
// The relay inspects nothing beyond the envelope: a `ClientMessage::Room` is
// fanned out as a `ServerMessage::Room` tagged with the sender, unchanged.
// Every `RoomEvent` payload is a fixed schema validated by serde on receipt;
// a message that fails to deserialize is dropped without any state change.
//
// Positions on the wire (`TowerBuild`, `EnemyState`) are relative to the
// *owner's* play-area origin, never absolute screen coordinates, so the
// receiver can re-project them into its own opponent area.

use serde::{Deserialize, Serialize};

use crate::types::{NetworkId, PeerId, RoomId, Slot, WaveNumber};

/// Protocol version carried in the `Hello` handshake.
pub const PROTOCOL_VERSION: u32 = 1;

/// One enemy row in a periodic state snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyState {
    pub id: NetworkId,
    /// Position relative to the owner's play-area origin.
    pub x: f32,
    pub y: f32,
    /// Remaining health as a fraction of maximum, in `[0, 1]`.
    pub health_percent: f32,
    /// Progress along the owner's path, in `[0, 1]`.
    pub path_progress: f32,
    pub is_boss: bool,
}

/// Room-scoped game events. Sent by a peer, relayed verbatim to the other
/// room member. Every handler on the receiving side tolerates duplicates and
/// reordering: creates are idempotent, removes of absent ids are no-ops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RoomEvent {
    /// The wave authority (slot one) has begun a new wave.
    WaveStart { wave: WaveNumber },
    /// A tower was built. `level` above 1 means the mirror should be
    /// fast-forwarded through that many upgrade steps (crafted towers).
    TowerBuild {
        tower_id: NetworkId,
        tower_kind: String,
        x: f32,
        y: f32,
        level: Option<u32>,
        owner: PeerId,
    },
    /// An existing tower gained a level.
    TowerUpgrade { tower_id: NetworkId },
    /// A tower was removed; the id's registry entry is released.
    TowerRemove { tower_id: NetworkId },
    /// The sender's remaining life total.
    LifeUpdate { lives: u32 },
    /// A locally-owned enemy entered the field.
    EnemySpawn {
        enemy_id: NetworkId,
        wave: WaveNumber,
        is_boss: bool,
        emoji: String,
        owner: PeerId,
    },
    /// A locally-owned enemy was killed.
    EnemyDied { enemy_id: NetworkId },
    /// A locally-owned enemy reached the path end.
    EnemyEscaped { enemy_id: NetworkId },
    /// Periodic advisory batch of the sender's active owned enemies. Used
    /// only to correct existing ghosts, never to create them.
    Snapshot {
        owner: PeerId,
        timestamp_ms: u64,
        enemies: Vec<EnemyState>,
    },
    /// The sender's life total hit zero; the match is over.
    PlayerDefeated,
}

/// Messages sent by a peer to the relay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Handshake. Must be the first message on a connection.
    Hello {
        protocol_version: u32,
        player_name: String,
    },
    /// Enter the pairing pool.
    Queue,
    /// A room-scoped event to fan out to the other room member.
    Room { room: RoomId, event: RoomEvent },
    /// Leaving gracefully.
    Goodbye,
}

/// Messages sent by the relay to a peer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Handshake accepted; this is the peer's transport identity.
    Welcome { peer_id: PeerId },
    /// Handshake rejected.
    Rejected { reason: String },
    /// Queued, no opponent available yet.
    Waiting,
    /// Paired. Slot assignment is arbitrary but stable for the match.
    MatchStart {
        room: RoomId,
        slot: Slot,
        opponent: PeerId,
    },
    /// The other room member's transport dropped. Terminal: the room is gone.
    OpponentDisconnected,
    /// A room event from the other room member, forwarded verbatim.
    Room { from: PeerId, event: RoomEvent },
}
