// Wave numbering and spawn planning.
//
// The shared wave counter has exactly one writer per match: the peer in slot
// one. It advances the counter, broadcasts `WaveStart`, and both peers then
// spawn the wave locally from the same plan. The slot-two peer only ever
// `adopt`s broadcast values.
//
// Wave composition:
// - Every `boss_wave_interval`th wave is a boss wave: one boss, delayed
//   spawn, long fixed delay to the next wave.
// - Normal waves grow by a random bonus per completed block of
//   `boss_wave_interval` waves. The bonus is rolled once per block and
//   memoized, so a wave replans identically within a session. Spawns are
//   evenly spaced and speed up as blocks complete.
//
// Randomness comes from a SplitMix64 stream over `(seed, block)`. No OS
// entropy: the roll depends only on session-visible state.

use std::collections::BTreeMap;

use emberward_protocol::types::WaveNumber;

use crate::config::SyncConfig;

/// How one wave is spawned locally, and when the next one starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpawnPlan {
    pub wave: WaveNumber,
    pub is_boss_wave: bool,
    /// Spawn times as offsets from the wave start. One entry per enemy.
    pub spawn_offsets_ms: Vec<u64>,
    /// Delay from the wave start to the next wave (authority only).
    pub next_wave_delay_ms: u64,
}

impl SpawnPlan {
    pub fn enemy_count(&self) -> usize {
        self.spawn_offsets_ms.len()
    }
}

/// The wave counter plus the memoized per-block bonus rolls.
#[derive(Debug)]
pub struct WaveAuthority {
    current: WaveNumber,
    seed: u64,
    block_bonuses: BTreeMap<u32, u32>,
}

impl WaveAuthority {
    pub fn new(seed: u64) -> Self {
        Self {
            current: WaveNumber(0),
            seed,
            block_bonuses: BTreeMap::new(),
        }
    }

    pub fn current(&self) -> WaveNumber {
        self.current
    }

    /// Advance to the next wave. Authority side only.
    pub fn advance(&mut self) -> WaveNumber {
        self.current = WaveNumber(self.current.0 + 1);
        self.current
    }

    /// Overwrite the counter with a broadcast value, regardless of what it
    /// was before.
    pub fn adopt(&mut self, wave: WaveNumber) {
        self.current = wave;
    }

    /// Build the spawn plan for `wave`.
    pub fn plan(&mut self, wave: WaveNumber, config: &SyncConfig) -> SpawnPlan {
        let is_boss_wave = wave.0 > 0 && wave.0 % config.boss_wave_interval == 0;
        if is_boss_wave {
            return SpawnPlan {
                wave,
                is_boss_wave: true,
                spawn_offsets_ms: vec![config.boss_spawn_delay_ms],
                next_wave_delay_ms: config.boss_next_wave_delay_ms,
            };
        }

        let blocks = wave.0.saturating_sub(1) / config.boss_wave_interval;
        let mut count = config.base_enemy_count;
        for block in 1..=blocks {
            count += self.block_bonus(block, config);
        }

        let interval = config
            .base_spawn_interval_ms
            .saturating_sub(config.spawn_interval_step_ms * u64::from(blocks))
            .max(config.min_spawn_interval_ms);

        let spawn_offsets_ms = (0..u64::from(count)).map(|i| i * interval).collect();
        let next_wave_delay_ms = u64::from(count) * interval + config.wave_cooldown_ms;

        SpawnPlan {
            wave,
            is_boss_wave: false,
            spawn_offsets_ms,
            next_wave_delay_ms,
        }
    }

    /// Memoized random bonus for one completed block, in
    /// `[block_bonus_min, block_bonus_max]`.
    fn block_bonus(&mut self, block: u32, config: &SyncConfig) -> u32 {
        let seed = self.seed;
        *self.block_bonuses.entry(block).or_insert_with(|| {
            let mut state = seed ^ u64::from(block);
            let roll = splitmix64(&mut state);
            let span = config.block_bonus_max - config.block_bonus_min + 1;
            config.block_bonus_min + (roll % u64::from(span)) as u32
        })
    }
}

/// SplitMix64 step: advances `state` and returns the mixed value.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
