// Collaborator seams between the sync layer and the rest of the game.
//
// The sync session never touches rendering or combat directly. It drives two
// narrow traits:
// - `MirrorView`: the read-only display of the opponent's field (ghost
//   enemies and mirror towers). Mirrors are visual; they never fight, take
//   damage locally, or cost lives.
// - `LocalField`: the local game field the session queries for snapshots and
//   instructs to spawn wave enemies.
//
// The game supplies real implementations; tests supply recording doubles.

use emberward_protocol::message::EnemyState;
use emberward_protocol::types::{NetworkId, WaveNumber};

use crate::types::Vec2;

/// What kind of entity a mirror represents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorKind {
    Enemy,
    Tower,
}

/// Visual treatment when a mirror is destroyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MirrorFade {
    /// Killed: death effect.
    Dead,
    /// Reached the path end: escape effect.
    Escaped,
    /// Teardown: no effect, just disappear.
    Silent,
}

/// Presentation hints carried alongside a mirror creation.
#[derive(Clone, Debug, Default)]
pub struct MirrorHints {
    pub emoji: Option<String>,
    pub is_boss: bool,
    pub tower_kind: Option<String>,
}

/// Display of the opponent's field. Positions are absolute screen
/// coordinates, already projected through `ArenaLayout`.
pub trait MirrorView {
    fn create_mirror(&mut self, kind: MirrorKind, id: &NetworkId, pos: Vec2, hints: &MirrorHints);
    fn set_mirror_position(&mut self, id: &NetworkId, pos: Vec2);
    fn set_mirror_health(&mut self, id: &NetworkId, fraction: f32);
    fn upgrade_mirror(&mut self, id: &NetworkId, level: u32);
    fn destroy_mirror(&mut self, id: &NetworkId, fade: MirrorFade);
}

/// The local game field, as seen by the sync session.
pub trait LocalField {
    /// All currently active locally-owned enemies, in absolute local
    /// coordinates. The session converts to wire coordinates itself.
    fn active_owned_enemies(&self) -> Vec<EnemyState>;

    /// Spawn a wave enemy under the given network id. Returns the emoji
    /// chosen for it, which travels with the `EnemySpawn` broadcast so both
    /// clients render the same creature.
    fn spawn_enemy(&mut self, id: &NetworkId, wave: WaveNumber, is_boss: bool) -> String;
}
