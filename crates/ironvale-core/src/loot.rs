//! Death-triggered gold and item generation.
//!
//! The core never owns dropped world objects. It rolls what a corpse drops
//! and hands every item to a [`LootSpawner`], which places it in the world
//! and returns an opaque handle.

use glam::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::item::Item;

/// Opaque reference to a world object created by a [`LootSpawner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LootHandle(u64);

impl LootHandle {
    /// Wraps a raw handle value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw handle value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// World-object spawner for dropped items.
pub trait LootSpawner: Send {
    /// Places `amount` of `item` at `position`.
    fn spawn_dropped_item(&mut self, item: &Item, amount: u32, position: Vec2) -> LootHandle;
}

/// One item spawned by a [`RecordingSpawner`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroppedItem {
    /// Handle returned to the caller.
    pub handle: LootHandle,
    /// Item template name.
    pub item: String,
    /// Stack size.
    pub amount: u32,
    /// Durability of the dropped instance.
    pub durability: u32,
    /// World position.
    pub position: Vec2,
}

/// In-memory spawner that records every drop.
#[derive(Debug, Clone, Default)]
pub struct RecordingSpawner {
    next: u64,
    drops: Vec<DroppedItem>,
}

impl RecordingSpawner {
    /// Everything spawned so far.
    #[must_use]
    pub fn drops(&self) -> &[DroppedItem] {
        &self.drops
    }

    /// Removes and returns everything spawned so far.
    pub fn take_drops(&mut self) -> Vec<DroppedItem> {
        std::mem::take(&mut self.drops)
    }
}

impl LootSpawner for RecordingSpawner {
    fn spawn_dropped_item(&mut self, item: &Item, amount: u32, position: Vec2) -> LootHandle {
        let handle = LootHandle::new(self.next);
        self.next += 1;
        self.drops.push(DroppedItem {
            handle,
            item: item.name().to_string(),
            amount,
            durability: item.durability,
            position,
        });
        handle
    }
}

/// One possible item drop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LootDrop {
    /// Item template name.
    pub item: String,
    /// Chance in `[0, 1]`.
    pub probability: f32,
    /// Stack size when dropped.
    #[serde(default = "default_amount")]
    pub amount: u32,
}

fn default_amount() -> u32 {
    1
}

/// What a monster may drop on death.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootTable {
    /// Minimum gold.
    pub gold_min: u64,
    /// Maximum gold, inclusive.
    pub gold_max: u64,
    /// Independent item rolls.
    pub drops: Vec<LootDrop>,
}

impl LootTable {
    /// Rolls gold in `[gold_min, gold_max]`.
    pub fn roll_gold<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        if self.gold_max <= self.gold_min {
            return self.gold_min;
        }
        rng.gen_range(self.gold_min..=self.gold_max)
    }

    /// Rolls every drop once, in table order.
    pub fn roll_items<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<&LootDrop> {
        let mut dropped = Vec::new();
        for drop in &self.drops {
            if rng.gen::<f32>() < drop.probability {
                dropped.push(drop);
            }
        }
        dropped
    }
}
