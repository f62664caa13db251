//! Everything an entity update may touch besides the entity itself.
//!
//! A [`TickContext`] is built by the shard once per phase and handed down
//! to state machines, intent handlers and the combat resolver. Its fields
//! are public so callers can borrow several of them at once (for example
//! the arena mutably while rolling the random generator).

use std::sync::Arc;

use glam::Vec2;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::arena::Arena;
use crate::catalog::Catalog;
use crate::config::SimConfig;
use crate::entity::{Entity, EntityId};
use crate::loot::LootSpawner;
use crate::movement::NavArea;
use crate::output::{Audience, Notification, Outbox};
use crate::schedule::Scheduler;
use crate::zone::Zones;

/// Per-tick view of the shard.
pub struct TickContext<'a> {
    /// Shard clock in seconds.
    pub now: f64,
    /// Seconds since the previous tick.
    pub dt: f32,
    /// Tick number.
    pub tick: u64,
    /// Gameplay tuning.
    pub config: &'a SimConfig,
    /// Templates.
    pub catalog: &'a Catalog,
    /// Safe zones, PvP zones and spawn points.
    pub zones: &'a Zones,
    /// Walkable area.
    pub nav: &'a Arc<NavArea>,
    /// Every entity except the one being updated.
    pub arena: &'a mut Arena,
    /// The shard's only source of randomness.
    pub rng: &'a mut ChaCha8Rng,
    /// Delayed actions.
    pub scheduler: &'a mut Scheduler,
    /// World item drops.
    pub spawner: &'a mut dyn LootSpawner,
    /// Broadcast queue.
    pub outbox: &'a mut Outbox,
}

impl TickContext<'_> {
    /// Queues a notification for everyone observing `source`.
    pub fn emit(&mut self, source: EntityId, notification: Notification) {
        self.outbox.push(source, Audience::Observers, notification);
    }

    /// Queues an info message for the owner of `source`.
    pub fn info(&mut self, source: EntityId, message: impl Into<String>) {
        self.outbox.info(source, message);
    }

    /// Returns true with probability `chance`. Never true for `chance <= 0`.
    pub fn roll(&mut self, chance: f32) -> bool {
        self.rng.gen::<f32>() < chance
    }

    /// Returns true with probability `1 / denominator`.
    pub fn one_in(&mut self, denominator: u32) -> bool {
        self.rng.gen_range(0..denominator.max(1)) == 0
    }

    /// Position of `id`, resolving `me` to itself since it is not in the
    /// arena while it is being updated.
    #[must_use]
    pub fn position_of(&self, me: &Entity, id: EntityId) -> Option<Vec2> {
        if id == me.id() {
            Some(me.position())
        } else {
            self.arena.get(id).map(Entity::position)
        }
    }
}
