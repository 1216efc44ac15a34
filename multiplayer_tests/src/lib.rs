// Test-only game client for multiplayer integration tests.
//
// Wraps the real `NetClient` (from `emberward_relay::client`) and a real
// `SyncSession` (from `emberward_sync::session`) to provide a synchronous,
// test-friendly API for exercising the full multiplayer pipeline:
// connect → queue → match → event → relay fan-out → session → mirrors.
//
// The only test-specific code here is the synchronous polling wrappers
// (blocking loops around `NetClient::poll()`) and the recording doubles
// standing in for the renderer and the combat field. All networking and
// session logic uses the same code paths as the real game.
//
// See also: `tests/full_pipeline.rs` for the integration test scenarios.

use std::collections::BTreeMap;
use std::thread;
use std::time::{Duration, Instant};

use emberward_protocol::message::{EnemyState, ServerMessage};
use emberward_protocol::types::{NetworkId, PeerId, Slot, WaveNumber};
use emberward_relay::client::NetClient;
use emberward_sync::session::SyncSession;
use emberward_sync::types::{ArenaLayout, MatchInfo, Vec2};
use emberward_sync::view::{LocalField, MirrorFade, MirrorHints, MirrorKind, MirrorView};
use emberward_sync::SyncConfig;

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll attempts.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Recording stand-in for the opponent display. Every mirror mutation the
/// session makes is captured for assertions.
#[derive(Default)]
pub struct RecordingView {
    pub created: Vec<(MirrorKind, NetworkId)>,
    pub destroyed: Vec<(NetworkId, MirrorFade)>,
    pub positions: BTreeMap<NetworkId, Vec2>,
    pub healths: BTreeMap<NetworkId, f32>,
    pub upgrades: Vec<(NetworkId, u32)>,
}

impl RecordingView {
    pub fn destroyed_count(&self, id: &NetworkId) -> usize {
        self.destroyed.iter().filter(|(i, _)| i == id).count()
    }
}

impl MirrorView for RecordingView {
    fn create_mirror(&mut self, kind: MirrorKind, id: &NetworkId, pos: Vec2, _hints: &MirrorHints) {
        self.created.push((kind, id.clone()));
        self.positions.insert(id.clone(), pos);
    }

    fn set_mirror_position(&mut self, id: &NetworkId, pos: Vec2) {
        self.positions.insert(id.clone(), pos);
    }

    fn set_mirror_health(&mut self, id: &NetworkId, fraction: f32) {
        self.healths.insert(id.clone(), fraction);
    }

    fn upgrade_mirror(&mut self, id: &NetworkId, level: u32) {
        self.upgrades.push((id.clone(), level));
    }

    fn destroy_mirror(&mut self, id: &NetworkId, fade: MirrorFade) {
        self.destroyed.push((id.clone(), fade));
        self.positions.remove(id);
        self.healths.remove(id);
    }
}

/// Recording stand-in for the local combat field. Spawned enemies become
/// `active` rows reported in snapshots until the test mutates or removes
/// them.
#[derive(Default)]
pub struct TestField {
    pub spawned: Vec<(NetworkId, WaveNumber, bool)>,
    pub active: Vec<EnemyState>,
}

impl LocalField for TestField {
    fn active_owned_enemies(&self) -> Vec<EnemyState> {
        self.active.clone()
    }

    fn spawn_enemy(&mut self, id: &NetworkId, wave: WaveNumber, is_boss: bool) -> String {
        self.spawned.push((id.clone(), wave, is_boss));
        self.active.push(EnemyState {
            id: id.clone(),
            x: 0.0,
            y: 100.0,
            health_percent: 1.0,
            path_progress: 0.0,
            is_boss,
        });
        if is_boss { "👹".into() } else { "👾".into() }
    }
}

/// Both play areas side by side: own field at the origin, opponent display
/// shifted 1000px right. Paths run left to right.
pub fn test_layout() -> ArenaLayout {
    ArenaLayout {
        own_origin: Vec2::new(0.0, 0.0),
        opponent_origin: Vec2::new(1000.0, 0.0),
        own_path: vec![Vec2::new(0.0, 100.0), Vec2::new(500.0, 100.0)],
        opponent_path: vec![Vec2::new(1000.0, 100.0), Vec2::new(1500.0, 100.0)],
    }
}

/// A test game client wrapping a real NetClient and SyncSession.
///
/// The session clock is driven manually via `advance`, so wave timing and
/// snapshot pacing in tests never depend on wall-clock sleeps.
pub struct TestPeer {
    client: NetClient,
    pub session: Option<SyncSession>,
    pub view: RecordingView,
    pub field: TestField,
    now_ms: u64,
}

impl TestPeer {
    /// Connect to a relay server and perform the Hello handshake.
    pub fn connect(addr: std::net::SocketAddr, name: &str) -> Self {
        let client =
            NetClient::connect(&addr.to_string(), name).expect("TestPeer::connect failed");
        Self {
            client,
            session: None,
            view: RecordingView::default(),
            field: TestField::default(),
            now_ms: 0,
        }
    }

    pub fn peer_id(&self) -> PeerId {
        self.client.peer_id().clone()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Ask the relay for an opponent.
    pub fn queue(&mut self) {
        self.client.send_queue().expect("send_queue failed");
    }

    /// Blocking poll until MatchStart, then construct the session. Returns
    /// the assigned slot.
    pub fn poll_until_match_start(&mut self, seed: u64) -> Slot {
        let start = Instant::now();
        loop {
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for MatchStart"
            );
            for msg in self.client.poll() {
                if let ServerMessage::MatchStart {
                    room,
                    slot,
                    opponent,
                } = msg
                {
                    let info = MatchInfo {
                        room,
                        slot,
                        local: self.client.peer_id().clone(),
                        opponent,
                    };
                    self.session = Some(SyncSession::new(
                        info,
                        test_layout(),
                        SyncConfig::default(),
                        seed,
                        self.now_ms,
                    ));
                    return slot;
                }
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Non-blocking: feed every pending relay message into the session and
    /// flush whatever the session wants to broadcast.
    pub fn pump(&mut self) {
        for msg in self.client.poll() {
            if let Some(session) = self.session.as_mut() {
                session.handle_server_message(msg, self.now_ms, &mut self.view);
            }
        }
        self.flush();
    }

    /// Advance the session clock by `delta_ms` and run one frame.
    pub fn advance(&mut self, delta_ms: u64) {
        self.now_ms += delta_ms;
        if let Some(session) = self.session.as_mut() {
            session.tick(self.now_ms, delta_ms, &mut self.view, &mut self.field);
        }
        self.flush();
    }

    /// Blocking pump until `pred` holds. Panics after the poll timeout.
    pub fn pump_until(&mut self, what: &str, pred: impl Fn(&TestPeer) -> bool) {
        let start = Instant::now();
        loop {
            self.pump();
            if pred(self) {
                return;
            }
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for: {what}"
            );
            thread::sleep(POLL_INTERVAL);
        }
    }

    pub fn session(&self) -> &SyncSession {
        self.session.as_ref().expect("session not initialized")
    }

    /// Build a tower through the real action path and flush the broadcast.
    pub fn build_tower(&mut self, kind: &str, pos: Vec2) -> NetworkId {
        let id = self
            .session
            .as_mut()
            .expect("session not initialized")
            .build_tower(kind, pos)
            .expect("build_tower failed");
        self.flush();
        id
    }

    /// Report a local enemy kill and flush the broadcast.
    pub fn kill_enemy(&mut self, id: &NetworkId) {
        self.session
            .as_mut()
            .expect("session not initialized")
            .on_local_enemy_died(id);
        self.flush();
    }

    /// Report a local enemy escape (costs a life) and flush the broadcasts.
    pub fn escape_enemy(&mut self, id: &NetworkId) {
        let session = self.session.as_mut().expect("session not initialized");
        session.on_local_enemy_escaped(id, &mut self.view);
        self.flush();
    }

    /// Send Goodbye and close the connection.
    pub fn disconnect(&mut self) {
        self.client.disconnect();
    }

    fn flush(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let room = session.info().room.clone();
        for event in session.drain_outbox() {
            self.client
                .send_room_event(&room, event)
                .expect("send_room_event failed");
        }
    }
}
