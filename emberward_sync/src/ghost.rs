// Ghost enemies: the visual mirror of the opponent's wave.
//
// A ghost is created by an explicit `EnemySpawn` event and destroyed by an
// explicit `EnemyDied`/`EnemyEscaped` event or by being absent from a
// snapshot. Between snapshots it moves on its own:
// - **Fresh** (recent snapshot data): interpolate toward the last reported
//   position. The lerp factor scales with the frame delta, clamped so a slow
//   frame never teleports and a fast frame never stalls.
// - **Stale** (no data past the staleness threshold): dead-reckon along the
//   opponent display path at the wave's nominal speed until fresh data
//   arrives or the path ends.
//
// Snapshots are advisory: they correct existing ghosts and implicitly remove
// ghosts the owner no longer reports, but never create one. A spawn event
// arriving after its enemy already died would otherwise leave a permanent
// orphan.
//
// All removal paths funnel through `remove`, which yields the ghost only on
// the first call per id. Whichever of the explicit event or the snapshot
// sweep runs first plays the terminal visual; the loser is a no-op.

use std::collections::BTreeMap;

use emberward_protocol::message::EnemyState;
use emberward_protocol::types::{NetworkId, WaveNumber};

use crate::config::SyncConfig;
use crate::types::{ArenaLayout, Vec2};
use crate::view::{MirrorFade, MirrorHints, MirrorKind, MirrorView};

/// One mirrored enemy in the opponent display area. Positions are absolute
/// screen coordinates.
#[derive(Clone, Debug)]
pub struct GhostEnemy {
    pub id: NetworkId,
    pub wave: WaveNumber,
    pub is_boss: bool,
    pub pos: Vec2,
    /// Last reported position, the interpolation target.
    pub target: Vec2,
    /// Next waypoint on the opponent display path, for dead reckoning.
    pub next_waypoint: usize,
    pub health_fraction: f32,
    pub last_sync_ms: u64,
}

/// Registry of all live ghosts, keyed by network id.
#[derive(Debug, Default)]
pub struct GhostBook {
    ghosts: BTreeMap<NetworkId, GhostEnemy>,
}

impl GhostBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ghost at the start of the opponent display path. A second
    /// spawn for a live id changes nothing.
    pub fn spawn(
        &mut self,
        id: &NetworkId,
        wave: WaveNumber,
        is_boss: bool,
        emoji: &str,
        layout: &ArenaLayout,
        now_ms: u64,
        view: &mut dyn MirrorView,
    ) {
        if self.ghosts.contains_key(id) {
            return;
        }
        let start = layout
            .opponent_path
            .first()
            .copied()
            .unwrap_or(layout.opponent_origin);

        self.ghosts.insert(
            id.clone(),
            GhostEnemy {
                id: id.clone(),
                wave,
                is_boss,
                pos: start,
                target: start,
                next_waypoint: 1.min(layout.opponent_path.len()),
                health_fraction: 1.0,
                last_sync_ms: now_ms,
            },
        );

        let hints = MirrorHints {
            emoji: Some(emoji.to_string()),
            is_boss,
            tower_kind: None,
        };
        view.create_mirror(MirrorKind::Enemy, id, start, &hints);
    }

    /// Take a ghost out of the registry. Yields it only on the first call
    /// for an id; later calls are no-ops.
    pub fn remove(&mut self, id: &NetworkId) -> Option<GhostEnemy> {
        self.ghosts.remove(id)
    }

    /// Apply a snapshot: retarget and re-health the ghosts it reports,
    /// remove the ghosts it omits. Rows for unknown ids are ignored.
    pub fn apply_snapshot(
        &mut self,
        enemies: &[EnemyState],
        layout: &ArenaLayout,
        now_ms: u64,
        view: &mut dyn MirrorView,
    ) {
        for row in enemies {
            let Some(ghost) = self.ghosts.get_mut(&row.id) else {
                continue;
            };
            ghost.target = layout.to_opponent_absolute(Vec2::new(row.x, row.y));
            ghost.health_fraction = row.health_percent.clamp(0.0, 1.0);
            ghost.next_waypoint = waypoint_for_progress(row.path_progress, &layout.opponent_path);
            ghost.last_sync_ms = now_ms;
            view.set_mirror_health(&row.id, ghost.health_fraction);
        }

        // The owner stopped reporting these: the enemy is gone on its field.
        let absent: Vec<NetworkId> = self
            .ghosts
            .keys()
            .filter(|id| !enemies.iter().any(|row| &&row.id == id))
            .cloned()
            .collect();
        for id in absent {
            if self.remove(&id).is_some() {
                view.destroy_mirror(&id, MirrorFade::Dead);
            }
        }
    }

    /// Move every ghost one frame. Fresh ghosts interpolate, stale ghosts
    /// dead-reckon; a stale ghost that walks off the path end fades out as
    /// escaped.
    pub fn advance_all(
        &mut self,
        now_ms: u64,
        delta_ms: u64,
        config: &SyncConfig,
        layout: &ArenaLayout,
        view: &mut dyn MirrorView,
    ) {
        let mut escaped = Vec::new();

        for ghost in self.ghosts.values_mut() {
            let stale = now_ms.saturating_sub(ghost.last_sync_ms) > config.ghost_stale_after_ms;
            if !stale {
                let t = (delta_ms as f32 / config.lerp_window_ms)
                    .clamp(config.lerp_min, config.lerp_max);
                ghost.pos = ghost.pos.lerp(ghost.target, t);
                view.set_mirror_position(&ghost.id, ghost.pos);
            } else {
                let speed =
                    config.ghost_base_speed + config.ghost_speed_per_wave * ghost.wave.0 as f32;
                let mut remaining = speed * delta_ms as f32 / 1000.0;

                loop {
                    let Some(&waypoint) = layout.opponent_path.get(ghost.next_waypoint) else {
                        escaped.push(ghost.id.clone());
                        break;
                    };
                    let (pos, reached) = ghost.pos.step_toward(waypoint, remaining);
                    remaining -= ghost.pos.distance(pos);
                    ghost.pos = pos;
                    if !reached {
                        break;
                    }
                    ghost.next_waypoint += 1;
                }
                view.set_mirror_position(&ghost.id, ghost.pos);
            }
        }

        for id in escaped {
            if self.remove(&id).is_some() {
                view.destroy_mirror(&id, MirrorFade::Escaped);
            }
        }
    }

    /// Drop every ghost without any terminal effect. Match teardown.
    pub fn clear(&mut self, view: &mut dyn MirrorView) {
        let ids: Vec<NetworkId> = self.ghosts.keys().cloned().collect();
        for id in ids {
            if self.remove(&id).is_some() {
                view.destroy_mirror(&id, MirrorFade::Silent);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    pub fn contains(&self, id: &NetworkId) -> bool {
        self.ghosts.contains_key(id)
    }

    pub fn get(&self, id: &NetworkId) -> Option<&GhostEnemy> {
        self.ghosts.get(id)
    }
}

/// Map a path progress fraction onto the index of the next waypoint ahead.
fn waypoint_for_progress(progress: f32, path: &[Vec2]) -> usize {
    if path.len() < 2 {
        return path.len();
    }
    let segments = (path.len() - 1) as f32;
    let passed = (progress.clamp(0.0, 1.0) * segments).floor() as usize;
    (passed + 1).min(path.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::testing::RecordingView;

    fn layout() -> ArenaLayout {
        ArenaLayout {
            own_origin: Vec2::new(0.0, 0.0),
            opponent_origin: Vec2::new(1000.0, 0.0),
            own_path: vec![Vec2::new(0.0, 100.0), Vec2::new(500.0, 100.0)],
            opponent_path: vec![
                Vec2::new(1000.0, 100.0),
                Vec2::new(1200.0, 100.0),
                Vec2::new(1200.0, 300.0),
            ],
        }
    }

    fn enemy_row(id: &str, x: f32, y: f32, health: f32, progress: f32) -> EnemyState {
        EnemyState {
            id: NetworkId(id.into()),
            x,
            y,
            health_percent: health,
            path_progress: progress,
            is_boss: false,
        }
    }

    #[test]
    fn spawn_is_idempotent() {
        let layout = layout();
        let mut view = RecordingView::new();
        let mut book = GhostBook::new();
        let id = NetworkId("peer-2-1".into());

        book.spawn(&id, WaveNumber(1), false, "👾", &layout, 0, &mut view);
        book.spawn(&id, WaveNumber(1), false, "👾", &layout, 5, &mut view);

        assert_eq!(book.len(), 1);
        assert_eq!(view.created_count(&id), 1);
        assert_eq!(book.get(&id).unwrap().pos, Vec2::new(1000.0, 100.0));
    }

    #[test]
    fn fresh_ghost_lerps_toward_snapshot_target() {
        let layout = layout();
        let mut view = RecordingView::new();
        let mut book = GhostBook::new();
        let id = NetworkId("peer-2-1".into());

        book.spawn(&id, WaveNumber(1), false, "👾", &layout, 0, &mut view);
        // Owner reports the enemy at relative (100, 100) → absolute (1100, 100).
        book.apply_snapshot(
            &[enemy_row("peer-2-1", 100.0, 100.0, 0.6, 0.2)],
            &layout,
            100,
            &mut view,
        );

        // 16ms frame: 16/160 = 0.1, clamped up to the 0.2 floor.
        book.advance_all(116, 16, &SyncConfig::default(), &layout, &mut view);
        let ghost = book.get(&id).unwrap();
        assert!((ghost.pos.x - 1020.0).abs() < 1e-3);
        assert_eq!(ghost.health_fraction, 0.6);
        assert_eq!(view.healths[&id], 0.6);

        // 500ms frame: 500/160 > 0.55, clamped down.
        book.advance_all(216, 500, &SyncConfig::default(), &layout, &mut view);
        let ghost = book.get(&id).unwrap();
        let expected = 1020.0 + (1100.0 - 1020.0) * 0.55;
        assert!((ghost.pos.x - expected).abs() < 1e-2);
    }

    #[test]
    fn snapshot_health_is_clamped() {
        let layout = layout();
        let mut view = RecordingView::new();
        let mut book = GhostBook::new();
        let id = NetworkId("peer-2-1".into());

        book.spawn(&id, WaveNumber(1), false, "👾", &layout, 0, &mut view);
        book.apply_snapshot(
            &[enemy_row("peer-2-1", 0.0, 100.0, 1.7, 0.0)],
            &layout,
            50,
            &mut view,
        );
        assert_eq!(book.get(&id).unwrap().health_fraction, 1.0);

        book.apply_snapshot(
            &[enemy_row("peer-2-1", 0.0, 100.0, -0.4, 0.0)],
            &layout,
            100,
            &mut view,
        );
        assert_eq!(book.get(&id).unwrap().health_fraction, 0.0);
    }

    #[test]
    fn snapshot_never_creates_ghosts() {
        let layout = layout();
        let mut view = RecordingView::new();
        let mut book = GhostBook::new();

        book.apply_snapshot(
            &[enemy_row("peer-2-9", 50.0, 100.0, 1.0, 0.0)],
            &layout,
            0,
            &mut view,
        );
        assert!(book.is_empty());
        assert!(view.created.is_empty());
    }

    #[test]
    fn ghost_absent_from_snapshot_is_removed_as_dead() {
        let layout = layout();
        let mut view = RecordingView::new();
        let mut book = GhostBook::new();
        let kept = NetworkId("peer-2-1".into());
        let gone = NetworkId("peer-2-2".into());

        book.spawn(&kept, WaveNumber(1), false, "👾", &layout, 0, &mut view);
        book.spawn(&gone, WaveNumber(1), false, "👾", &layout, 0, &mut view);

        book.apply_snapshot(
            &[enemy_row("peer-2-1", 10.0, 100.0, 1.0, 0.0)],
            &layout,
            100,
            &mut view,
        );

        assert!(book.contains(&kept));
        assert!(!book.contains(&gone));
        assert_eq!(view.destroyed, vec![(gone.clone(), MirrorFade::Dead)]);

        // The explicit death arriving afterwards is a no-op.
        assert!(book.remove(&gone).is_none());
    }

    #[test]
    fn stale_ghost_dead_reckons_along_path() {
        let layout = layout();
        let config = SyncConfig::default();
        let mut view = RecordingView::new();
        let mut book = GhostBook::new();
        let id = NetworkId("peer-2-1".into());

        book.spawn(&id, WaveNumber(0), false, "👾", &layout, 0, &mut view);

        // Well past the staleness threshold; wave 0 speed is 50 px/s.
        book.advance_all(1_000, 1_000, &config, &layout, &mut view);
        let ghost = book.get(&id).unwrap();
        assert!((ghost.pos.x - 1050.0).abs() < 1e-3);
        assert_eq!(ghost.pos.y, 100.0);

        // Crossing a waypoint carries leftover distance onto the next leg.
        book.advance_all(5_000, 4_000, &config, &layout, &mut view);
        let ghost = book.get(&id).unwrap();
        assert!((ghost.pos.x - 1200.0).abs() < 1e-3);
        assert!((ghost.pos.y - 150.0).abs() < 1e-3);
    }

    #[test]
    fn stale_ghost_escapes_at_path_end() {
        let layout = layout();
        let config = SyncConfig::default();
        let mut view = RecordingView::new();
        let mut book = GhostBook::new();
        let id = NetworkId("peer-2-1".into());

        book.spawn(&id, WaveNumber(0), false, "👾", &layout, 0, &mut view);

        // Path length is 400 px; 20 seconds at 50 px/s overshoots it.
        book.advance_all(30_000, 20_000, &config, &layout, &mut view);
        assert!(book.is_empty());
        assert_eq!(view.destroyed, vec![(id, MirrorFade::Escaped)]);
    }

    #[test]
    fn fresh_data_rescues_a_stale_ghost() {
        let layout = layout();
        let config = SyncConfig::default();
        let mut view = RecordingView::new();
        let mut book = GhostBook::new();
        let id = NetworkId("peer-2-1".into());

        book.spawn(&id, WaveNumber(0), false, "👾", &layout, 0, &mut view);
        book.advance_all(1_000, 1_000, &config, &layout, &mut view);

        // A new snapshot re-freshens the ghost; it lerps again instead of
        // walking the path.
        book.apply_snapshot(
            &[enemy_row("peer-2-1", 60.0, 100.0, 0.9, 0.1)],
            &layout,
            1_100,
            &mut view,
        );
        book.advance_all(1_116, 16, &config, &layout, &mut view);
        let ghost = book.get(&id).unwrap();
        let expected = 1050.0 + (1060.0 - 1050.0) * 0.2;
        assert!((ghost.pos.x - expected).abs() < 1e-3);
    }

    #[test]
    fn clear_is_silent() {
        let layout = layout();
        let mut view = RecordingView::new();
        let mut book = GhostBook::new();
        let a = NetworkId("peer-2-1".into());
        let b = NetworkId("peer-2-2".into());

        book.spawn(&a, WaveNumber(1), false, "👾", &layout, 0, &mut view);
        book.spawn(&b, WaveNumber(1), true, "👹", &layout, 0, &mut view);
        book.clear(&mut view);

        assert!(book.is_empty());
        assert_eq!(view.destroyed.len(), 2);
        assert!(
            view.destroyed
                .iter()
                .all(|(_, fade)| *fade == MirrorFade::Silent)
        );
    }

    #[test]
    fn progress_maps_onto_the_next_waypoint() {
        let path = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(200.0, 0.0),
        ];
        assert_eq!(waypoint_for_progress(0.0, &path), 1);
        assert_eq!(waypoint_for_progress(0.4, &path), 1);
        assert_eq!(waypoint_for_progress(0.6, &path), 2);
        assert_eq!(waypoint_for_progress(1.0, &path), 2);
        assert_eq!(waypoint_for_progress(0.5, &[]), 0);
    }
}
