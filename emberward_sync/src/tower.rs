// Tower registries: locally owned towers and mirrors of the opponent's.
//
// Towers never interact across the match boundary, so mirroring is purely
// visual: a build creates a mirror tower in the opponent display area, an
// upgrade bumps its level, a remove deletes it. Positions travel in wire
// coordinates (owner-relative) and re-project through `ArenaLayout`.
//
// A `TowerBuild` carrying a level above 1 fast-forwards the mirror through
// the missing upgrade steps. Crafting uses this: the crafted tower inherits
// the lowest level among its parts and arrives on the opponent's screen as a
// remove of each part followed by a single leveled build.
//
// Remote handlers tolerate duplicates and unknown ids: a repeated build
// changes nothing (except a level fast-forward), an upgrade or remove of an
// unknown id is a no-op.

use std::collections::BTreeMap;

use emberward_protocol::message::RoomEvent;
use emberward_protocol::types::{NetworkId, PeerId};

use crate::types::{ArenaLayout, Vec2};
use crate::view::{MirrorFade, MirrorHints, MirrorKind, MirrorView};

/// A tower on our own field, tracked for upgrade/remove/craft bookkeeping.
#[derive(Clone, Debug)]
pub struct OwnedTower {
    pub id: NetworkId,
    pub kind: String,
    pub pos: Vec2,
    pub level: u32,
}

#[derive(Clone, Debug)]
struct MirrorTower {
    kind: String,
    level: u32,
}

/// Both tower registries of one match.
#[derive(Debug, Default)]
pub struct TowerSync {
    owned: BTreeMap<NetworkId, OwnedTower>,
    mirrors: BTreeMap<NetworkId, MirrorTower>,
}

impl TowerSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a locally built tower and produce its broadcast event.
    /// `pos` is absolute local coordinates; the event carries wire
    /// coordinates. A level of 1 travels as `None`.
    pub fn register_build(
        &mut self,
        id: NetworkId,
        kind: &str,
        pos: Vec2,
        level: u32,
        layout: &ArenaLayout,
        owner: &PeerId,
    ) -> RoomEvent {
        self.owned.insert(
            id.clone(),
            OwnedTower {
                id: id.clone(),
                kind: kind.to_string(),
                pos,
                level,
            },
        );

        let wire = layout.to_own_relative(pos);
        RoomEvent::TowerBuild {
            tower_id: id,
            tower_kind: kind.to_string(),
            x: wire.x,
            y: wire.y,
            level: (level > 1).then_some(level),
            owner: owner.clone(),
        }
    }

    /// Bump a locally owned tower's level and produce the broadcast event.
    /// Unknown ids yield `None`.
    pub fn register_upgrade(&mut self, id: &NetworkId) -> Option<RoomEvent> {
        let tower = self.owned.get_mut(id)?;
        tower.level += 1;
        Some(RoomEvent::TowerUpgrade {
            tower_id: id.clone(),
        })
    }

    /// Remove a locally owned tower and produce the broadcast event.
    /// Unknown ids yield `None`.
    pub fn register_remove(&mut self, id: &NetworkId) -> Option<RoomEvent> {
        self.owned.remove(id)?;
        Some(RoomEvent::TowerRemove {
            tower_id: id.clone(),
        })
    }

    pub fn owned(&self, id: &NetworkId) -> Option<&OwnedTower> {
        self.owned.get(id)
    }

    pub fn owned_count(&self) -> usize {
        self.owned.len()
    }

    /// Create (or fast-forward) a mirror tower from a remote build.
    pub fn apply_remote_build(
        &mut self,
        id: &NetworkId,
        kind: &str,
        wire_pos: Vec2,
        level: Option<u32>,
        layout: &ArenaLayout,
        view: &mut dyn MirrorView,
    ) {
        let level = level.unwrap_or(1).max(1);

        if let Some(mirror) = self.mirrors.get_mut(id) {
            // Duplicate build. Honor a higher level in case the upgrade
            // events went missing.
            if level > mirror.level {
                mirror.level = level;
                view.upgrade_mirror(id, level);
            }
            return;
        }

        self.mirrors.insert(
            id.clone(),
            MirrorTower {
                kind: kind.to_string(),
                level,
            },
        );

        let hints = MirrorHints {
            emoji: None,
            is_boss: false,
            tower_kind: Some(kind.to_string()),
        };
        view.create_mirror(
            MirrorKind::Tower,
            id,
            layout.to_opponent_absolute(wire_pos),
            &hints,
        );
        if level > 1 {
            view.upgrade_mirror(id, level);
        }
    }

    /// Bump a mirror tower's level. Unknown ids are a no-op.
    pub fn apply_remote_upgrade(&mut self, id: &NetworkId, view: &mut dyn MirrorView) {
        if let Some(mirror) = self.mirrors.get_mut(id) {
            mirror.level += 1;
            view.upgrade_mirror(id, mirror.level);
        }
    }

    /// Delete a mirror tower. Unknown ids are a no-op.
    pub fn apply_remote_remove(&mut self, id: &NetworkId, view: &mut dyn MirrorView) {
        if self.mirrors.remove(id).is_some() {
            view.destroy_mirror(id, MirrorFade::Silent);
        }
    }

    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    pub fn mirror_kind(&self, id: &NetworkId) -> Option<&str> {
        self.mirrors.get(id).map(|m| m.kind.as_str())
    }

    pub fn mirror_level(&self, id: &NetworkId) -> Option<u32> {
        self.mirrors.get(id).map(|m| m.level)
    }

    /// Drop every mirror without any effect. Match teardown.
    pub fn clear_mirrors(&mut self, view: &mut dyn MirrorView) {
        let ids: Vec<NetworkId> = self.mirrors.keys().cloned().collect();
        for id in ids {
            if self.mirrors.remove(&id).is_some() {
                view.destroy_mirror(&id, MirrorFade::Silent);
            }
        }
    }
}
