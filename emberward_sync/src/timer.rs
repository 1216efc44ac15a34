// Session-scoped task scheduling.
//
// Wave starts and enemy spawns fire at future timestamps. Instead of ad hoc
// timers, all deferred work goes through one `TaskQueue`: a priority queue
// ordered by `(fire_at_ms, sequence)`, drained by the session's `tick`.
//
// Because the queue is owned by the session, `clear()` cancels everything at
// once — match teardown leaves no timer that could fire into a dead match.
//
// The `(fire_at_ms, sequence)` key gives a total order: tasks scheduled for
// the same millisecond fire in scheduling order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use emberward_protocol::types::WaveNumber;

/// What should happen when a task fires.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// Begin the next wave (authority only).
    StartWave,
    /// Spawn one local enemy belonging to `wave`.
    SpawnEnemy { wave: WaveNumber, is_boss: bool },
}

/// A task scheduled for a future timestamp.
#[derive(Clone, Debug)]
pub struct ScheduledTask {
    /// Session-clock timestamp at which this task should fire.
    pub fire_at_ms: u64,
    /// Tiebreaker within a timestamp. Lower values fire first.
    pub sequence: u64,
    pub kind: TaskKind,
}

// We want a min-heap: lowest (fire_at_ms, sequence) fires first.
// Rust's BinaryHeap is a max-heap, so we reverse the ordering.
impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at_ms == other.fire_at_ms && self.sequence == other.sequence
    }
}

impl Eq for ScheduledTask {}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse: smallest (fire_at_ms, sequence) should be "greatest".
        other
            .fire_at_ms
            .cmp(&self.fire_at_ms)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Priority queue of scheduled tasks. Wraps a `BinaryHeap` with reversed
/// ordering to give us a min-heap (earliest timestamp fires first).
#[derive(Debug, Default)]
pub struct TaskQueue {
    heap: BinaryHeap<ScheduledTask>,
    /// Monotonic counter for ordering within a timestamp.
    next_sequence: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a task at the given timestamp.
    pub fn schedule(&mut self, fire_at_ms: u64, kind: TaskKind) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(ScheduledTask {
            fire_at_ms,
            sequence,
            kind,
        });
    }

    /// Pop the next task if it is due at or before `now_ms`.
    pub fn pop_ready(&mut self, now_ms: u64) -> Option<ScheduledTask> {
        if self.heap.peek().is_some_and(|t| t.fire_at_ms <= now_ms) {
            self.heap.pop()
        } else {
            None
        }
    }

    /// Cancel every pending task.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
