// The per-peer synchronization session.
//
// `SyncSession` owns every piece of match-scoped state: the wave counter,
// the task queue, the ghost registry, both tower registries, the life
// totals, and the terminal outcome. Nothing lives in ambient globals, so a
// rematch constructs a fresh session and cannot inherit stale entities or
// timers from the previous match.
//
// All mutation happens through methods called from the game's main loop —
// no internal locking. The session is clock-free: the host passes `now_ms`
// and `delta_ms` into `tick`, which makes wave timing and snapshot pacing
// testable without sleeping.
//
// Data flow per frame:
// 1. The host drains `NetClient::poll()` and feeds each message to
//    `handle_server_message`.
// 2. The host calls `tick`, which fires due tasks (wave starts, spawns),
//    advances ghosts, and paces snapshot broadcasts.
// 3. The host drains `drain_outbox` and sends each event to the relay.
//
// Match termination is resolved exactly once. The first terminal trigger
// (local defeat, opponent defeat, opponent disconnect) wins; every later
// trigger is a no-op against the `ended` flag. Teardown cancels all pending
// tasks and silently clears ghosts and mirror towers.

use std::fmt;

use emberward_protocol::message::{EnemyState, RoomEvent, ServerMessage};
use emberward_protocol::types::{NetworkId, NetworkIdAllocator, PeerId, WaveNumber};

use crate::config::SyncConfig;
use crate::ghost::GhostBook;
use crate::timer::{TaskKind, TaskQueue};
use crate::tower::TowerSync;
use crate::types::{ArenaLayout, MatchInfo, MatchOutcome, Vec2, VictoryReason};
use crate::view::{LocalField, MirrorFade, MirrorView};
use crate::wave::WaveAuthority;

/// Why a player action was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionError {
    /// The match has already been resolved.
    MatchOver,
    /// The id does not name a locally owned tower.
    UnknownTower(NetworkId),
    /// The tower's next level has not been unlocked by wave progress yet.
    UpgradeGated { unlock_wave: WaveNumber },
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::MatchOver => write!(f, "match is over"),
            ActionError::UnknownTower(id) => write!(f, "unknown tower: {id}"),
            ActionError::UpgradeGated { unlock_wave } => {
                write!(f, "upgrade locked until wave {unlock_wave}")
            }
        }
    }
}

/// Synchronization state of one match, from `MatchStart` to resolution.
pub struct SyncSession {
    config: SyncConfig,
    layout: ArenaLayout,
    info: MatchInfo,

    allocator: NetworkIdAllocator,
    tasks: TaskQueue,
    waves: WaveAuthority,
    ghosts: GhostBook,
    towers: TowerSync,

    lives: u32,
    opponent_lives: u32,
    ended: bool,
    outcome: Option<MatchOutcome>,

    outbox: Vec<RoomEvent>,
    last_snapshot_ms: u64,
    last_snapshot_empty: bool,
}

impl SyncSession {
    /// Start a session at `now_ms`. The slot-one peer schedules the first
    /// wave; the slot-two peer waits for `WaveStart` broadcasts.
    pub fn new(
        info: MatchInfo,
        layout: ArenaLayout,
        config: SyncConfig,
        seed: u64,
        now_ms: u64,
    ) -> Self {
        let mut tasks = TaskQueue::new();
        if info.slot.has_wave_authority() {
            tasks.schedule(now_ms + config.first_wave_delay_ms, TaskKind::StartWave);
        }

        Self {
            allocator: NetworkIdAllocator::new(info.local.clone()),
            waves: WaveAuthority::new(seed),
            ghosts: GhostBook::new(),
            towers: TowerSync::new(),
            lives: config.starting_lives,
            opponent_lives: config.starting_lives,
            ended: false,
            outcome: None,
            outbox: Vec::new(),
            last_snapshot_ms: now_ms,
            last_snapshot_empty: false,
            tasks,
            config,
            layout,
            info,
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Feed one relay message into the session.
    pub fn handle_server_message(
        &mut self,
        msg: ServerMessage,
        now_ms: u64,
        view: &mut dyn MirrorView,
    ) {
        match msg {
            ServerMessage::Room { from, event } => {
                self.handle_room_event(&from, event, now_ms, view);
            }
            ServerMessage::OpponentDisconnected => {
                self.end_match(
                    MatchOutcome::Victory(VictoryReason::OpponentDisconnected),
                    view,
                );
            }
            // Pairing-phase messages; the session exists only after MatchStart.
            ServerMessage::Welcome { .. }
            | ServerMessage::Rejected { .. }
            | ServerMessage::Waiting
            | ServerMessage::MatchStart { .. } => {}
        }
    }

    /// Apply one room event. Events from ourselves (a relay echo would be a
    /// bug, but harmless) and events after resolution are dropped.
    pub fn handle_room_event(
        &mut self,
        from: &PeerId,
        event: RoomEvent,
        now_ms: u64,
        view: &mut dyn MirrorView,
    ) {
        if self.ended || from == &self.info.local {
            return;
        }

        match event {
            RoomEvent::WaveStart { wave } => {
                self.waves.adopt(wave);
                self.schedule_wave_spawns(wave, now_ms);
            }
            RoomEvent::TowerBuild {
                tower_id,
                tower_kind,
                x,
                y,
                level,
                owner: _,
            } => {
                self.towers.apply_remote_build(
                    &tower_id,
                    &tower_kind,
                    Vec2::new(x, y),
                    level,
                    &self.layout,
                    view,
                );
            }
            RoomEvent::TowerUpgrade { tower_id } => {
                self.towers.apply_remote_upgrade(&tower_id, view);
            }
            RoomEvent::TowerRemove { tower_id } => {
                self.towers.apply_remote_remove(&tower_id, view);
            }
            RoomEvent::LifeUpdate { lives } => {
                // The mirror only ever goes down. A reordered stale update
                // must not resurrect a life.
                if lives < self.opponent_lives {
                    self.opponent_lives = lives;
                }
            }
            RoomEvent::EnemySpawn {
                enemy_id,
                wave,
                is_boss,
                emoji,
                owner: _,
            } => {
                self.ghosts
                    .spawn(&enemy_id, wave, is_boss, &emoji, &self.layout, now_ms, view);
            }
            RoomEvent::EnemyDied { enemy_id } => {
                if self.ghosts.remove(&enemy_id).is_some() {
                    view.destroy_mirror(&enemy_id, MirrorFade::Dead);
                }
            }
            RoomEvent::EnemyEscaped { enemy_id } => {
                if self.ghosts.remove(&enemy_id).is_some() {
                    view.destroy_mirror(&enemy_id, MirrorFade::Escaped);
                }
            }
            RoomEvent::Snapshot {
                owner: _,
                timestamp_ms: _,
                enemies,
            } => {
                self.ghosts
                    .apply_snapshot(&enemies, &self.layout, now_ms, view);
            }
            RoomEvent::PlayerDefeated => {
                self.end_match(MatchOutcome::Victory(VictoryReason::OpponentDefeated), view);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Frame advance
    // -----------------------------------------------------------------------

    /// Advance one frame: fire due tasks, move ghosts, pace snapshots.
    pub fn tick(
        &mut self,
        now_ms: u64,
        delta_ms: u64,
        view: &mut dyn MirrorView,
        field: &mut dyn LocalField,
    ) {
        if self.ended {
            return;
        }

        while let Some(task) = self.tasks.pop_ready(now_ms) {
            match task.kind {
                TaskKind::StartWave => self.run_wave(now_ms),
                TaskKind::SpawnEnemy { wave, is_boss } => {
                    self.spawn_local_enemy(wave, is_boss, field);
                }
            }
        }

        self.ghosts
            .advance_all(now_ms, delta_ms, &self.config, &self.layout, view);

        if now_ms.saturating_sub(self.last_snapshot_ms) >= self.config.snapshot_interval_ms {
            self.broadcast_snapshot(now_ms, field);
        }
    }

    /// Authority side: advance the counter, announce the wave, schedule its
    /// spawns and the next wave.
    fn run_wave(&mut self, now_ms: u64) {
        let wave = self.waves.advance();
        self.outbox.push(RoomEvent::WaveStart { wave });

        let next_delay = self.schedule_wave_spawns(wave, now_ms);
        self.tasks
            .schedule(now_ms + next_delay, TaskKind::StartWave);
    }

    /// Queue every spawn of `wave` relative to `now_ms`. Returns the delay
    /// to the next wave (used by the authority only).
    fn schedule_wave_spawns(&mut self, wave: WaveNumber, now_ms: u64) -> u64 {
        let plan = self.waves.plan(wave, &self.config);
        for offset in &plan.spawn_offsets_ms {
            self.tasks.schedule(
                now_ms + offset,
                TaskKind::SpawnEnemy {
                    wave,
                    is_boss: plan.is_boss_wave,
                },
            );
        }
        plan.next_wave_delay_ms
    }

    fn spawn_local_enemy(&mut self, wave: WaveNumber, is_boss: bool, field: &mut dyn LocalField) {
        let enemy_id = self.allocator.allocate();
        let emoji = field.spawn_enemy(&enemy_id, wave, is_boss);
        self.outbox.push(RoomEvent::EnemySpawn {
            enemy_id,
            wave,
            is_boss,
            emoji,
            owner: self.info.local.clone(),
        });
    }

    fn broadcast_snapshot(&mut self, now_ms: u64, field: &dyn LocalField) {
        let enemies: Vec<EnemyState> = field
            .active_owned_enemies()
            .into_iter()
            .map(|mut row| {
                let wire = self.layout.to_own_relative(Vec2::new(row.x, row.y));
                row.x = wire.x;
                row.y = wire.y;
                row
            })
            .collect();

        // One trailing empty snapshot clears the opponent's ghosts; after
        // that there is nothing left to report until an enemy spawns.
        let empty = enemies.is_empty();
        if !(empty && self.last_snapshot_empty) {
            self.outbox.push(RoomEvent::Snapshot {
                owner: self.info.local.clone(),
                timestamp_ms: now_ms,
                enemies,
            });
        }
        self.last_snapshot_empty = empty;
        self.last_snapshot_ms = now_ms;
    }

    // -----------------------------------------------------------------------
    // Player actions
    // -----------------------------------------------------------------------

    /// Build a tower at `pos` (absolute local coordinates). The game has
    /// already validated placement; the session only registers and
    /// broadcasts it.
    pub fn build_tower(&mut self, kind: &str, pos: Vec2) -> Result<NetworkId, ActionError> {
        self.push_build(kind, pos, 1)
    }

    /// Upgrade a tower. Level N unlocks at wave `N * upgrade_gate_waves`.
    /// Returns the new level.
    pub fn upgrade_tower(&mut self, id: &NetworkId) -> Result<u32, ActionError> {
        if self.ended {
            return Err(ActionError::MatchOver);
        }
        let level = self
            .towers
            .owned(id)
            .ok_or_else(|| ActionError::UnknownTower(id.clone()))?
            .level;

        let unlock_wave = WaveNumber(level * self.config.upgrade_gate_waves);
        if self.waves.current() < unlock_wave {
            return Err(ActionError::UpgradeGated { unlock_wave });
        }

        if let Some(event) = self.towers.register_upgrade(id) {
            self.outbox.push(event);
        }
        Ok(level + 1)
    }

    /// Remove a tower and release its id.
    pub fn remove_tower(&mut self, id: &NetworkId) -> Result<(), ActionError> {
        if self.ended {
            return Err(ActionError::MatchOver);
        }
        let event = self
            .towers
            .register_remove(id)
            .ok_or_else(|| ActionError::UnknownTower(id.clone()))?;
        self.outbox.push(event);
        Ok(())
    }

    /// Combine owned towers into a new one. The parts are removed and the
    /// crafted tower inherits the lowest level among them, traveling as a
    /// single leveled build.
    pub fn craft_towers(
        &mut self,
        parts: &[NetworkId],
        kind: &str,
        pos: Vec2,
    ) -> Result<NetworkId, ActionError> {
        if self.ended {
            return Err(ActionError::MatchOver);
        }

        let mut inherited = 1;
        for part in parts {
            let tower = self
                .towers
                .owned(part)
                .ok_or_else(|| ActionError::UnknownTower(part.clone()))?;
            inherited = if part == &parts[0] {
                tower.level
            } else {
                inherited.min(tower.level)
            };
        }

        for part in parts {
            if let Some(event) = self.towers.register_remove(part) {
                self.outbox.push(event);
            }
        }
        self.push_build(kind, pos, inherited)
    }

    fn push_build(&mut self, kind: &str, pos: Vec2, level: u32) -> Result<NetworkId, ActionError> {
        if self.ended {
            return Err(ActionError::MatchOver);
        }
        let id = self.allocator.allocate();
        let event =
            self.towers
                .register_build(id.clone(), kind, pos, level, &self.layout, &self.info.local);
        self.outbox.push(event);
        Ok(id)
    }

    /// A locally-owned enemy was killed by our towers.
    pub fn on_local_enemy_died(&mut self, id: &NetworkId) {
        if self.ended {
            return;
        }
        self.outbox.push(RoomEvent::EnemyDied {
            enemy_id: id.clone(),
        });
    }

    /// A locally-owned enemy reached the path end: announce it and pay a
    /// life.
    pub fn on_local_enemy_escaped(&mut self, id: &NetworkId, view: &mut dyn MirrorView) {
        if self.ended {
            return;
        }
        self.outbox.push(RoomEvent::EnemyEscaped {
            enemy_id: id.clone(),
        });
        self.lose_lives(1, view);
    }

    /// Deduct lives and broadcast the new total. Hitting zero announces the
    /// defeat and resolves the match.
    pub fn lose_lives(&mut self, amount: u32, view: &mut dyn MirrorView) {
        if self.ended {
            return;
        }
        self.lives = self.lives.saturating_sub(amount);
        self.outbox
            .push(RoomEvent::LifeUpdate { lives: self.lives });
        if self.lives == 0 {
            self.outbox.push(RoomEvent::PlayerDefeated);
            self.end_match(MatchOutcome::Defeat, view);
        }
    }

    /// Resolve the match. Only the first call takes effect: the outcome is
    /// pinned, every pending task is cancelled, and all mirrors disappear
    /// without effects.
    pub fn end_match(&mut self, outcome: MatchOutcome, view: &mut dyn MirrorView) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.outcome = Some(outcome);
        self.tasks.clear();
        self.ghosts.clear(view);
        self.towers.clear_mirrors(view);
    }

    // -----------------------------------------------------------------------
    // Outbound + accessors
    // -----------------------------------------------------------------------

    /// Take every pending broadcast. The host sends them to the relay in
    /// order.
    pub fn drain_outbox(&mut self) -> Vec<RoomEvent> {
        std::mem::take(&mut self.outbox)
    }

    pub fn info(&self) -> &MatchInfo {
        &self.info
    }

    pub fn wave(&self) -> WaveNumber {
        self.waves.current()
    }

    pub fn lives(&self) -> u32 {
        self.lives
    }

    pub fn opponent_lives(&self) -> u32 {
        self.opponent_lives
    }

    pub fn match_ended(&self) -> bool {
        self.ended
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    pub fn ghost_count(&self) -> usize {
        self.ghosts.len()
    }

    pub fn mirror_tower_count(&self) -> usize {
        self.towers.mirror_count()
    }

    pub fn owned_tower_count(&self) -> usize {
        self.towers.owned_count()
    }
}
