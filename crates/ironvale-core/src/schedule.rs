//! Deadline-ordered delayed actions.
//!
//! Work that has to happen "later" (despawning a dead summon, starting the
//! next run of a repeated activity, periodic autosave) is queued here with
//! an absolute timestamp and executed by the shard once the clock passes
//! it. Actions with equal deadlines run in insertion order.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// Something to do at a deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduledAction {
    /// Remove the entity from the shard.
    Despawn(EntityId),
    /// Start the next run of an activity.
    RepeatActivity {
        /// The crafting player.
        entity: EntityId,
        /// Recipe name.
        recipe: String,
        /// Runs left after this one.
        repeat: u32,
    },
    /// Save every online player.
    Autosave,
}

#[derive(Debug, Clone)]
struct Scheduled {
    at: f64,
    sequence: u64,
    action: ScheduledAction,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .total_cmp(&other.at)
            .then(self.sequence.cmp(&other.sequence))
    }
}

/// Min-heap of pending actions.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_sequence: u64,
}

impl Scheduler {
    /// Creates an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `action` to run once the clock reaches `at`.
    pub fn schedule(&mut self, at: f64, action: ScheduledAction) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(Reverse(Scheduled {
            at,
            sequence,
            action,
        }));
    }

    /// Removes and returns every action due at `now`, earliest first.
    pub fn pop_due(&mut self, now: f64) -> Vec<ScheduledAction> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|Reverse(next)| next.at <= now) {
            if let Some(Reverse(next)) = self.heap.pop() {
                due.push(next.action);
            }
        }
        due
    }

    /// Deadline of the earliest pending action.
    #[must_use]
    pub fn next_deadline(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(next)| next.at)
    }

    /// Drops every pending action for `entity`.
    pub fn cancel_for(&mut self, entity: EntityId) {
        self.heap.retain(|Reverse(scheduled)| match &scheduled.action {
            ScheduledAction::Despawn(id) => *id != entity,
            ScheduledAction::RepeatActivity { entity: id, .. } => *id != entity,
            ScheduledAction::Autosave => true,
        });
    }

    /// Returns the number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
