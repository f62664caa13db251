//! Notifications emitted by the simulation.
//!
//! Nothing in the core talks to clients directly. Every observable change
//! is pushed into the shard's [`Outbox`] as a [`Broadcast`] and the host
//! drains the queue once per tick.
//!
//! # Ordering
//!
//! Each broadcast carries the tick it was emitted in and a sequence number
//! that increases monotonically within that tick. Entities are updated in
//! id order, so the drained queue is identical for identical inputs.
//!
//! # Example
//!
//! ```
//! use ironvale_core::output::{Audience, Notification, Outbox};
//! use ironvale_core::entity::{EntityId, EntityState};
//!
//! let mut outbox = Outbox::new();
//! outbox.push(
//!     EntityId::new(1),
//!     Audience::Observers,
//!     Notification::StateChanged {
//!         from: EntityState::Idle,
//!         to: EntityState::Moving,
//!     },
//! );
//!
//! let drained = outbox.drain();
//! assert_eq!(drained.len(), 1);
//! assert_eq!(drained[0].sequence(), 0);
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::entity::{DirtyFlags, Entity, EntityId, EntityState};
use crate::loot::LootHandle;

// =============================================================================
// Notifications
// =============================================================================

/// How a hit landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DamageKind {
    /// Regular hit.
    Normal,
    /// Fully blocked, no damage.
    Block,
    /// Critical hit, double damage.
    Crit,
}

impl fmt::Display for DamageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "Normal"),
            Self::Block => write!(f, "Block"),
            Self::Crit => write!(f, "Crit"),
        }
    }
}

/// Current values of the fields that changed since the last flush.
///
/// All values are present; `changed` says which ones the receiver has not
/// seen yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Fields that changed.
    pub changed: DirtyFlags,
    /// Position.
    pub position: Vec2,
    /// Facing.
    pub look_direction: Vec2,
    /// FSM state.
    pub state: EntityState,
    /// Current health.
    pub health: i32,
    /// Maximum health.
    pub max_health: i32,
    /// Current mana.
    pub mana: i32,
    /// Maximum mana.
    pub max_mana: i32,
    /// Level.
    pub level: u32,
    /// Gold.
    pub gold: u64,
    /// Target.
    pub target: Option<EntityId>,
    /// Visibility.
    pub visible: bool,
}

impl EntitySnapshot {
    /// Captures `entity` with `changed` as the dirty set.
    #[must_use]
    pub fn capture(entity: &Entity, changed: DirtyFlags) -> Self {
        Self {
            changed,
            position: entity.transform.position,
            look_direction: entity.transform.look_direction,
            state: entity.state(),
            health: entity.health(),
            max_health: entity.max_health(),
            mana: entity.mana(),
            max_mana: entity.max_mana(),
            level: entity.level,
            gold: entity.gold,
            target: entity.target,
            visible: entity.is_visible(),
        }
    }
}

/// Something observable that happened to an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Notification {
    /// The FSM moved to another state.
    StateChanged {
        /// Previous state.
        from: EntityState,
        /// New state.
        to: EntityState,
    },
    /// A cast began.
    CastStarted {
        /// Skill name.
        skill: String,
        /// Target at cast start.
        target: Option<EntityId>,
        /// Seconds until completion.
        cast_time: f32,
    },
    /// A cast completed and its effect was applied.
    CastFinished {
        /// Skill name.
        skill: String,
    },
    /// A cast was aborted.
    CastCancelled {
        /// Skill name.
        skill: String,
    },
    /// The entity was hit.
    DamageReceived {
        /// Who dealt the damage.
        attacker: EntityId,
        /// Health lost.
        amount: i32,
        /// How the hit landed.
        kind: DamageKind,
    },
    /// The entity was healed.
    Healed {
        /// Who healed.
        source: EntityId,
        /// Health restored.
        health: i32,
        /// Mana restored.
        mana: i32,
    },
    /// The entity was teleported. Must be delivered reliably.
    Warped {
        /// New position.
        position: Vec2,
    },
    /// The server wants the owning client to walk somewhere.
    NavigateRequested {
        /// Where to go.
        destination: Vec2,
        /// Stop this far short of the destination.
        stopping_distance: f32,
    },
    /// The entity died.
    Died {
        /// Last aggressor.
        killer: Option<EntityId>,
    },
    /// The entity came back to life.
    Respawned {
        /// Respawn position.
        position: Vec2,
    },
    /// An item was dropped into the world.
    LootDropped {
        /// Item template name.
        item: String,
        /// Stack size.
        amount: u32,
        /// World handle.
        handle: LootHandle,
        /// Drop position.
        position: Vec2,
    },
    /// The entity gained a level.
    LevelUp {
        /// New level.
        level: u32,
    },
    /// A trade exchange went through.
    TradeCompleted {
        /// Trade partner.
        partner: EntityId,
    },
    /// A trade was aborted.
    TradeCancelled,
    /// An activity run ended.
    ActivityFinished {
        /// Recipe name.
        recipe: String,
        /// The result item was produced.
        success: bool,
    },
    /// Free-form message for the owning client only.
    Info {
        /// Message text.
        message: String,
    },
    /// Changed fields of the entity.
    Snapshot(EntitySnapshot),
}

/// Who receives a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Audience {
    /// Every player observing the source, including the source itself.
    Observers,
    /// Only the owning client of the source.
    Owner,
}

// =============================================================================
// Envelope
// =============================================================================

/// A notification plus delivery metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    /// Tick when this broadcast was emitted
    tick: u64,
    /// Sequence number within the tick
    sequence: u32,
    /// Entity the notification is about
    source: EntityId,
    /// Receivers
    audience: Audience,
    /// Payload
    notification: Notification,
}

impl Broadcast {
    /// Returns the tick when this broadcast was emitted.
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Returns the sequence number within the tick.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Returns the entity the notification is about.
    #[must_use]
    pub const fn source(&self) -> EntityId {
        self.source
    }

    /// Returns the receivers.
    #[must_use]
    pub const fn audience(&self) -> Audience {
        self.audience
    }

    /// Returns the payload.
    #[must_use]
    pub const fn notification(&self) -> &Notification {
        &self.notification
    }

    /// Consumes the envelope and returns the payload.
    #[must_use]
    pub fn into_notification(self) -> Notification {
        self.notification
    }
}

/// Ordered broadcast queue of a shard.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    tick: u64,
    next_sequence: u32,
    queue: Vec<Broadcast>,
}

impl Outbox {
    /// Creates an empty outbox at tick 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new tick. Sequence numbers restart at zero.
    pub fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
        self.next_sequence = 0;
    }

    /// Queues a notification about `source`.
    pub fn push(&mut self, source: EntityId, audience: Audience, notification: Notification) {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);
        self.queue.push(Broadcast {
            tick: self.tick,
            sequence,
            source,
            audience,
            notification,
        });
    }

    /// Queues an owner-only info message.
    pub fn info(&mut self, source: EntityId, message: impl Into<String>) {
        self.push(
            source,
            Audience::Owner,
            Notification::Info {
                message: message.into(),
            },
        );
    }

    /// Queued broadcasts, oldest first.
    #[must_use]
    pub fn pending(&self) -> &[Broadcast] {
        &self.queue
    }

    /// Removes and returns everything queued so far.
    pub fn drain(&mut self) -> Vec<Broadcast> {
        std::mem::take(&mut self.queue)
    }

    /// Returns the number of queued broadcasts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod outbox_tests {
        use super::*;

        #[test]
        fn sequence_restarts_each_tick() {
            let mut outbox = Outbox::new();
            outbox.begin_tick(4);
            outbox.info(EntityId::new(1), "a");
            outbox.info(EntityId::new(1), "b");
            outbox.begin_tick(5);
            outbox.info(EntityId::new(2), "c");

            let drained = outbox.drain();
            let keys: Vec<_> = drained.iter().map(|b| (b.tick(), b.sequence())).collect();
            assert_eq!(keys, vec![(4, 0), (4, 1), (5, 0)]);
            assert!(outbox.is_empty());
        }

        #[test]
        fn info_is_owner_only() {
            let mut outbox = Outbox::new();
            outbox.info(EntityId::new(7), "not enough mana");
            let broadcast = &outbox.pending()[0];
            assert_eq!(broadcast.audience(), Audience::Owner);
            assert_eq!(broadcast.source(), EntityId::new(7));
            assert!(matches!(
                broadcast.notification(),
                Notification::Info { message } if message == "not enough mana"
            ));
        }
    }

    mod serialization_tests {
        use super::*;

        #[test]
        fn damage_notification_json() {
            let notification = Notification::DamageReceived {
                attacker: EntityId::new(3),
                amount: 12,
                kind: DamageKind::Crit,
            };
            let json = serde_json::to_string(&notification).unwrap();
            assert_eq!(
                json,
                r#"{"DamageReceived":{"attacker":3,"amount":12,"kind":"Crit"}}"#
            );
            let back: Notification = serde_json::from_str(&json).unwrap();
            assert_eq!(back, notification);
        }
    }
}
