// Geometry and match-identity types for the sync layer.
//
// `ArenaLayout` is the coordinate bridge between the wire and the screen.
// Every position on the wire is relative to its *owner's* play-area origin;
// the receiver re-projects into its own opponent display area. This keeps
// the protocol independent of screen resolution and of how each client
// arranges the two play areas.

use serde::{Deserialize, Serialize};

use emberward_protocol::types::{PeerId, RoomId, Slot};

/// 2D position in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Linear interpolation toward `target` by factor `t` in `[0, 1]`.
    pub fn lerp(self, target: Vec2, t: f32) -> Vec2 {
        Vec2 {
            x: self.x + (target.x - self.x) * t,
            y: self.y + (target.y - self.y) * t,
        }
    }

    /// Move up to `max_step` toward `target`. Returns the new position and
    /// whether the target was reached this step.
    pub fn step_toward(self, target: Vec2, max_step: f32) -> (Vec2, bool) {
        let dist = self.distance(target);
        if dist <= max_step {
            (target, true)
        } else {
            let t = max_step / dist;
            (self.lerp(target, t), false)
        }
    }
}

/// Screen-space layout of the two play areas on this client.
///
/// `own_path` and `opponent_path` are waypoint lists in absolute screen
/// coordinates. Wire positions convert through the two origins.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArenaLayout {
    pub own_origin: Vec2,
    pub opponent_origin: Vec2,
    pub own_path: Vec<Vec2>,
    pub opponent_path: Vec<Vec2>,
}

impl ArenaLayout {
    /// Project an absolute position in our own play area into wire
    /// coordinates (relative to our origin).
    pub fn to_own_relative(&self, p: Vec2) -> Vec2 {
        Vec2 {
            x: p.x - self.own_origin.x,
            y: p.y - self.own_origin.y,
        }
    }

    /// Project a wire position owned by the opponent into our opponent
    /// display area.
    pub fn to_opponent_absolute(&self, p: Vec2) -> Vec2 {
        Vec2 {
            x: self.opponent_origin.x + p.x,
            y: self.opponent_origin.y + p.y,
        }
    }
}

/// Identity of an active match, fixed at pairing.
#[derive(Clone, Debug)]
pub struct MatchInfo {
    pub room: RoomId,
    pub slot: Slot,
    pub local: PeerId,
    pub opponent: PeerId,
}

/// Why the local player won.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VictoryReason {
    OpponentDefeated,
    OpponentDisconnected,
}

/// Terminal result of a match, set exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MatchOutcome {
    Victory(VictoryReason),
    Defeat,
}
