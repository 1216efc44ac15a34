// emberward_sync — per-peer match synchronization for Emberward.
//
// This crate contains all multiplayer state logic for one client: wave
// authority, entity identity, ghost mirroring, tower mirroring, lives, and
// match termination. It has zero rendering or socket dependencies and can
// be tested headless.
//
// Module overview:
// - `session.rs`: Top-level SyncSession — event dispatch, tick loop, outbox.
// - `wave.rs`:    Wave counter + deterministic spawn planning.
// - `ghost.rs`:   Ghost enemies — snapshot correction + dead reckoning.
// - `tower.rs`:   Owned-tower and mirror-tower registries.
// - `timer.rs`:   TaskQueue (priority queue) for deferred wave/spawn work.
// - `view.rs`:    MirrorView / LocalField — the seams to the actual game.
// - `config.rs`:  SyncConfig — all tunable pacing and wave parameters.
// - `types.rs`:   Vec2, ArenaLayout, MatchInfo, MatchOutcome.
//
// The companion crate `emberward_relay` moves `RoomEvent`s between the two
// peers; nothing here touches a socket. The session is also clock-free: the
// host passes `now_ms`/`delta_ms` into `tick`, so timing behavior is a pure
// function of its inputs.
//
// **Critical constraint: self-healing state.** Every remote event may arrive
// duplicated, late, or not at all. Handlers are idempotent, the opponent
// life mirror only decreases, and periodic snapshots reconcile ghosts that
// drifted. Use `BTreeMap` for ordered collections.

pub mod config;
pub mod ghost;
pub mod session;
pub mod timer;
pub mod tower;
pub mod types;
pub mod view;
pub mod wave;

pub use config::SyncConfig;
pub use session::{ActionError, SyncSession};
pub use types::{ArenaLayout, MatchInfo, MatchOutcome, Vec2, VictoryReason};
pub use view::{LocalField, MirrorFade, MirrorHints, MirrorKind, MirrorView};
