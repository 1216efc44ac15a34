// Tunable synchronization and wave-cadence parameters.
//
// All timing and balance numbers the sync layer uses live here. The session
// reads from the config rather than using magic numbers, so both clients of
// a match must run identical configs for the shared wave plan to line up.
//
// The defaults are the reference tuning the game ships with.

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// How often a snapshot of our active enemies is broadcast.
    pub snapshot_interval_ms: u64,
    /// A ghost with no snapshot data for this long switches from
    /// interpolation to dead reckoning.
    pub ghost_stale_after_ms: u64,
    /// Divisor turning the frame delta into a lerp factor.
    pub lerp_window_ms: f32,
    /// Lower clamp on the per-frame lerp factor.
    pub lerp_min: f32,
    /// Upper clamp on the per-frame lerp factor.
    pub lerp_max: f32,
    /// Dead-reckoning speed at wave 0, pixels per second.
    pub ghost_base_speed: f32,
    /// Dead-reckoning speed gained per wave number.
    pub ghost_speed_per_wave: f32,

    /// Delay from match start to the first wave.
    pub first_wave_delay_ms: u64,
    /// Every Nth wave is a boss wave.
    pub boss_wave_interval: u32,
    /// Enemy count of a normal wave before block bonuses.
    pub base_enemy_count: u32,
    /// Per-block random bonus bounds, inclusive.
    pub block_bonus_min: u32,
    pub block_bonus_max: u32,
    /// Spawn interval of the first block of waves.
    pub base_spawn_interval_ms: u64,
    /// Spawn interval reduction per completed block.
    pub spawn_interval_step_ms: u64,
    /// Spawn interval floor.
    pub min_spawn_interval_ms: u64,
    /// Delay before the single boss spawns on a boss wave.
    pub boss_spawn_delay_ms: u64,
    /// Delay from a boss wave's start to the next wave.
    pub boss_next_wave_delay_ms: u64,
    /// Breather added after a normal wave's spawns before the next wave.
    pub wave_cooldown_ms: u64,

    /// Life total at match start.
    pub starting_lives: u32,
    /// Tower level N unlocks for upgrade at wave N * this.
    pub upgrade_gate_waves: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_ms: 150,
            ghost_stale_after_ms: 360,
            lerp_window_ms: 160.0,
            lerp_min: 0.2,
            lerp_max: 0.55,
            ghost_base_speed: 50.0,
            ghost_speed_per_wave: 2.0,

            first_wave_delay_ms: 10_000,
            boss_wave_interval: 10,
            base_enemy_count: 20,
            block_bonus_min: 3,
            block_bonus_max: 7,
            base_spawn_interval_ms: 1_000,
            spawn_interval_step_ms: 100,
            min_spawn_interval_ms: 400,
            boss_spawn_delay_ms: 2_000,
            boss_next_wave_delay_ms: 32_000,
            wave_cooldown_ms: 10_000,

            starting_lives: 2,
            upgrade_gate_waves: 5,
        }
    }
}
