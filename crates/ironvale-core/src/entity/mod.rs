//! Entity module: the shared container for players, monsters and NPCs.
//!
//! This module provides the core entity types:
//! - [`EntityId`]: Unique identifier for entities
//! - [`EntityKind`]: Player, monster or NPC
//! - [`EntityInner`]: Kind-specific component storage
//! - [`Entity`]: Everything every kind has in common
//!
//! # Architecture
//!
//! An entity owns its skills, buffs, inventory and equipment by value.
//! Movement is a composed [`Locomotion`] component that is handed the
//! entity's [`Transform`] on every call. Other entities are referenced by
//! id only and must be looked up (and checked for liveness) on every use.
//!
//! Derived stats are never stored. They are recomputed from the base
//! curves and the entity's [`BonusSource`]s on every read.
//!
//! # Example
//!
//! ```
//! use ironvale_core::entity::{Entity, EntityInner, EntityKind};
//! use ironvale_core::stats::BaseStats;
//! use glam::Vec2;
//!
//! let npc = Entity::npc_at("Merchant", Vec2::new(3.0, 4.0), BaseStats::default());
//!
//! assert_eq!(npc.kind(), EntityKind::Npc);
//! assert_eq!(npc.health(), npc.max_health());
//! ```

pub mod components;
mod spawn;
mod state;

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::item::{Equipment, Inventory};
use crate::movement::{Locomotion, Movement, NavArea, PathAgent, Transform};
use crate::skill::{Buffs, Skills};
use crate::stats::{sum_float, sum_int, BaseStats, BonusSource};
use crate::zone::Rect;

pub use components::{
    ActivityProgress, ActivityRequest, Attribute, Attributes, EntityInner, MonsterComponents,
    PlayerComponents, Trade, TradeStatus,
};
pub use state::EntityState;

/// Unique identifier for an entity.
///
/// `EntityId` is a newtype wrapper around `u64` that provides type safety and
/// a clear semantic meaning. Entity IDs are immutable once assigned and must
/// be unique within an arena.
///
/// # Ordering
///
/// Entity IDs are ordered by their numeric value, which is used to ensure
/// deterministic iteration order across all entities.
///
/// # Example
///
/// ```
/// use ironvale_core::entity::EntityId;
///
/// let id1 = EntityId::new(1);
/// let id2 = EntityId::new(2);
///
/// assert!(id1 < id2);
/// assert_eq!(id1.as_u64(), 1);
/// ```
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Creates a new `EntityId` from a raw `u64` value.
    ///
    /// # Arguments
    ///
    /// * `id` - The raw identifier value
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` value of this identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl From<EntityId> for u64 {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

/// Entity kind, used to pick the state machine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Client-controlled character.
    Player,
    /// AI-controlled creature, including player summons.
    Monster,
    /// Stationary non-combatant.
    Npc,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Player => write!(f, "Player"),
            Self::Monster => write!(f, "Monster"),
            Self::Npc => write!(f, "Npc"),
        }
    }
}

impl EntityInner {
    /// Returns the corresponding [`EntityKind`].
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::Player(_) => EntityKind::Player,
            Self::Monster(_) => EntityKind::Monster,
            Self::Npc => EntityKind::Npc,
        }
    }
}

bitflags! {
    /// Fields changed since the last broadcast.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct DirtyFlags: u32 {
        /// Current or maximum health.
        const HEALTH = 1 << 0;
        /// Current or maximum mana.
        const MANA = 1 << 1;
        /// FSM state.
        const STATE = 1 << 2;
        /// Level.
        const LEVEL = 1 << 3;
        /// Gold.
        const GOLD = 1 << 4;
        /// Target.
        const TARGET = 1 << 5;
        /// Hidden or shown.
        const VISIBILITY = 1 << 6;
        /// Teleported. Sent reliably.
        const WARPED = 1 << 7;
        /// Skill levels, casts or cooldowns.
        const SKILLS = 1 << 8;
        /// Buff list.
        const BUFFS = 1 << 9;
        /// Inventory slots.
        const INVENTORY = 1 << 10;
        /// Equipment slots.
        const EQUIPMENT = 1 << 11;
        /// Experience or skill experience.
        const EXPERIENCE = 1 << 12;
    }
}

struct NoBonus;

impl BonusSource for NoBonus {}

/// A simulated entity.
///
/// # Invariants
///
/// - `0 <= health <= max_health()` and `0 <= mana <= max_mana()` after
///   every mutation made through this type.
/// - The FSM state is written only by the entity's own update.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    id: EntityId,
    /// Display name. Unique for players.
    pub name: String,
    /// Position and facing.
    pub transform: Transform,
    state: EntityState,
    health: i32,
    mana: i32,
    health_carry: f32,
    mana_carry: f32,
    /// Current level.
    pub level: u32,
    /// Highest reachable level.
    pub max_level: u32,
    /// Carried gold. Monsters carry their loot gold here.
    pub gold: u64,
    /// Current target. Validated on every use.
    pub target: Option<EntityId>,
    /// Stunned until this timestamp.
    pub stun_end: f64,
    /// Timestamp of the last damage dealt or received.
    pub last_combat: f64,
    visible: bool,
    /// Ignores all damage.
    pub invincible: bool,
    /// Last entity that damaged this one.
    pub last_aggressor: Option<EntityId>,
    /// Standing inside a safe zone.
    pub in_safe_zone: bool,
    /// Standing inside a PvP zone.
    pub in_pvp_zone: bool,
    /// Number of players observing this entity.
    pub observers: u32,
    /// Level curves.
    pub base: BaseStats,
    /// Known skills.
    pub skills: Skills,
    /// Active buffs.
    pub buffs: Buffs,
    /// Movement component.
    pub movement: Locomotion,
    /// Carried items.
    pub inventory: Inventory,
    /// Worn items.
    pub equipment: Equipment,
    /// Kind-specific components.
    pub inner: EntityInner,
    /// Fields changed since the last broadcast.
    pub dirty: DirtyFlags,
}

impl Entity {
    /// Creates an entity with full pools. The id is assigned on spawn.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name
    /// * `transform` - Starting position and facing
    /// * `base` - Level curves
    /// * `level` - Starting level
    /// * `movement` - Movement component
    /// * `inner` - Kind-specific components
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        transform: Transform,
        base: BaseStats,
        level: u32,
        movement: Locomotion,
        inner: EntityInner,
    ) -> Self {
        let mut entity = Self {
            id: EntityId::new(0),
            name: name.into(),
            transform,
            state: EntityState::Idle,
            health: 0,
            mana: 0,
            health_carry: 0.0,
            mana_carry: 0.0,
            level: level.max(1),
            max_level: level.max(1),
            gold: 0,
            target: None,
            stun_end: 0.0,
            last_combat: f64::NEG_INFINITY,
            visible: true,
            invincible: false,
            last_aggressor: None,
            in_safe_zone: false,
            in_pvp_zone: false,
            observers: 0,
            base,
            skills: Skills::default(),
            buffs: Buffs::default(),
            movement,
            inventory: Inventory::new(0),
            equipment: Equipment::default(),
            inner,
            dirty: DirtyFlags::all().difference(DirtyFlags::WARPED),
        };
        entity.health = entity.max_health();
        entity.mana = entity.max_mana();
        entity
    }

    /// Creates an NPC standing at `position` on an unbounded area.
    #[must_use]
    pub fn npc_at(name: impl Into<String>, position: Vec2, base: BaseStats) -> Self {
        let nav = NavArea::open(Rect::from_corners(
            Vec2::splat(f32::MIN),
            Vec2::splat(f32::MAX),
        ));
        let movement = Locomotion::Path(PathAgent::new(Arc::new(nav), 0.0, 0));
        Self::new(
            name,
            Transform::at(position),
            base,
            1,
            movement,
            EntityInner::Npc,
        )
    }

    // =========================================================================
    // Identity
    // =========================================================================

    /// Returns the entity's unique identifier.
    #[must_use]
    pub const fn id(&self) -> EntityId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    /// Returns the entity's kind.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        self.inner.kind()
    }

    /// Returns the current position.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        self.transform.position
    }

    /// Player components, if this is a player.
    #[must_use]
    pub const fn as_player(&self) -> Option<&PlayerComponents> {
        match &self.inner {
            EntityInner::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Player components, mutable.
    pub fn as_player_mut(&mut self) -> Option<&mut PlayerComponents> {
        match &mut self.inner {
            EntityInner::Player(player) => Some(player),
            _ => None,
        }
    }

    /// Monster components, if this is a monster.
    #[must_use]
    pub const fn as_monster(&self) -> Option<&MonsterComponents> {
        match &self.inner {
            EntityInner::Monster(monster) => Some(monster),
            _ => None,
        }
    }

    /// Monster components, mutable.
    pub fn as_monster_mut(&mut self) -> Option<&mut MonsterComponents> {
        match &mut self.inner {
            EntityInner::Monster(monster) => Some(monster),
            _ => None,
        }
    }

    /// Returns `true` if this entity is a player.
    #[must_use]
    pub const fn is_player(&self) -> bool {
        matches!(self.inner, EntityInner::Player(_))
    }

    /// Returns `true` if this entity is a monster.
    #[must_use]
    pub const fn is_monster(&self) -> bool {
        matches!(self.inner, EntityInner::Monster(_))
    }

    /// Returns `true` if this entity is an NPC.
    #[must_use]
    pub const fn is_npc(&self) -> bool {
        matches!(self.inner, EntityInner::Npc)
    }

    /// Summoning player, for summons.
    #[must_use]
    pub fn owner(&self) -> Option<EntityId> {
        self.as_monster().and_then(|m| m.owner)
    }

    // =========================================================================
    // State
    // =========================================================================

    /// Current FSM state.
    #[must_use]
    pub const fn state(&self) -> EntityState {
        self.state
    }

    /// Stores the next FSM state. Returns true if it changed.
    pub(crate) fn set_state(&mut self, state: EntityState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        self.dirty |= DirtyFlags::STATE;
        true
    }

    /// Returns `true` while health is above zero.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Returns `true` while the stun has not run out.
    #[must_use]
    pub fn is_stunned(&self, now: f64) -> bool {
        self.stun_end > now
    }

    /// Returns `true` unless hidden.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Updated only while observed or hidden. Hidden entities are never
    /// observed but their respawn timers must keep running.
    #[must_use]
    pub const fn is_worth_updating(&self) -> bool {
        self.observers > 0 || !self.visible
    }

    /// Removes the entity from everyone's view without destroying it.
    pub fn hide(&mut self) {
        if self.visible {
            self.visible = false;
            self.dirty |= DirtyFlags::VISIBILITY;
        }
    }

    /// Makes a hidden entity visible again.
    pub fn show(&mut self) {
        if !self.visible {
            self.visible = true;
            self.dirty |= DirtyFlags::VISIBILITY;
        }
    }

    // =========================================================================
    // Pools
    // =========================================================================

    /// Current health.
    #[must_use]
    pub const fn health(&self) -> i32 {
        self.health
    }

    /// Current mana.
    #[must_use]
    pub const fn mana(&self) -> i32 {
        self.mana
    }

    /// Sets health, clamped to `[0, max_health]`.
    pub fn set_health(&mut self, value: i32) {
        let clamped = value.clamp(0, self.max_health());
        if clamped != self.health {
            self.health = clamped;
            self.dirty |= DirtyFlags::HEALTH;
        }
    }

    /// Sets mana, clamped to `[0, max_mana]`.
    pub fn set_mana(&mut self, value: i32) {
        let clamped = value.clamp(0, self.max_mana());
        if clamped != self.mana {
            self.mana = clamped;
            self.dirty |= DirtyFlags::MANA;
        }
    }

    /// Re-clamps both pools after a maximum went down.
    pub fn clamp_pools(&mut self) {
        self.set_health(self.health);
        self.set_mana(self.mana);
    }

    /// Restores both pools to `fraction` of their maximum.
    pub fn revive(&mut self, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.set_health(scaled(self.max_health(), fraction).max(1));
        self.set_mana(scaled(self.max_mana(), fraction));
    }

    /// Regenerates pools over `dt` seconds while alive.
    ///
    /// Fractional points carry over between ticks so low recovery rates
    /// still take effect at high tick rates.
    pub fn recover(&mut self, dt: f32) {
        if !self.is_alive() {
            self.health_carry = 0.0;
            self.mana_carry = 0.0;
            return;
        }
        let (health, carry) = whole_points(self.health_carry + self.base.health_recovery * dt);
        self.health_carry = carry;
        if health != 0 {
            self.set_health(self.health.saturating_add(health));
        }
        let (mana, carry) = whole_points(self.mana_carry + self.base.mana_recovery * dt);
        self.mana_carry = carry;
        if mana != 0 {
            self.set_mana(self.mana.saturating_add(mana));
        }
    }

    // =========================================================================
    // Derived stats
    // =========================================================================

    fn bonus_sources(&self) -> [&dyn BonusSource; 4] {
        let attributes: &dyn BonusSource = match &self.inner {
            EntityInner::Player(player) => &player.attributes,
            _ => &NoBonus,
        };
        [&self.equipment, &self.skills, &self.buffs, attributes]
    }

    /// Maximum health, at least 1.
    #[must_use]
    pub fn max_health(&self) -> i32 {
        sum_int(
            self.base.health.get(self.level),
            &self.bonus_sources(),
            |s| s.health_bonus(),
        )
        .max(1)
    }

    /// Maximum mana.
    #[must_use]
    pub fn max_mana(&self) -> i32 {
        sum_int(self.base.mana.get(self.level), &self.bonus_sources(), |s| {
            s.mana_bonus()
        })
        .max(0)
    }

    /// Damage added to every offensive skill.
    #[must_use]
    pub fn damage(&self) -> i32 {
        sum_int(self.base.damage.get(self.level), &self.bonus_sources(), |s| {
            s.damage_bonus()
        })
        .max(0)
    }

    /// Flat damage reduction.
    #[must_use]
    pub fn defense(&self) -> i32 {
        sum_int(
            self.base.defense.get(self.level),
            &self.bonus_sources(),
            |s| s.defense_bonus(),
        )
        .max(0)
    }

    /// Chance to block a hit completely, in `[0, 1]`.
    #[must_use]
    pub fn block_chance(&self) -> f32 {
        sum_float(
            self.base.block_chance.get(self.level),
            &self.bonus_sources(),
            |s| s.block_chance_bonus(),
        )
        .clamp(0.0, 1.0)
    }

    /// Chance to double a hit, in `[0, 1]`.
    #[must_use]
    pub fn critical_chance(&self) -> f32 {
        sum_float(
            self.base.critical_chance.get(self.level),
            &self.bonus_sources(),
            |s| s.critical_chance_bonus(),
        )
        .clamp(0.0, 1.0)
    }

    /// Movement speed in meters per second.
    #[must_use]
    pub fn speed(&self) -> f32 {
        sum_float(self.base.speed.get(self.level), &self.bonus_sources(), |s| {
            s.speed_bonus()
        })
        .max(0.0)
    }

    // =========================================================================
    // Relations
    // =========================================================================

    /// Returns `true` if this entity may damage `other`.
    ///
    /// Both must be alive, `other` must be visible and neither may stand in
    /// a safe zone. Wild monsters fight players and their summons; players
    /// and summons fight wild monsters; player-versus-player (summons
    /// included) needs both sides inside a PvP zone. NPCs never fight.
    #[must_use]
    pub fn can_attack(&self, other: &Self) -> bool {
        if !self.is_alive()
            || !other.is_alive()
            || !other.visible
            || self.id == other.id
            || self.in_safe_zone
            || other.in_safe_zone
        {
            return false;
        }
        let pvp = self.in_pvp_zone && other.in_pvp_zone;
        match (&self.inner, &other.inner) {
            (EntityInner::Npc, _) | (_, EntityInner::Npc) => false,
            (EntityInner::Player(_), EntityInner::Player(_)) => pvp,
            (EntityInner::Monster(monster), EntityInner::Player(_)) => match monster.owner {
                None => true,
                Some(owner) => owner != other.id && pvp,
            },
            (EntityInner::Player(_), EntityInner::Monster(monster)) => match monster.owner {
                None => true,
                Some(owner) => owner != self.id && pvp,
            },
            (EntityInner::Monster(a), EntityInner::Monster(b)) => match (a.owner, b.owner) {
                (None, None) => false,
                (None, Some(_)) | (Some(_), None) => true,
                (Some(x), Some(y)) => x != y && pvp,
            },
        }
    }

    /// Returns `true` if this entity may heal or buff `other`.
    #[must_use]
    pub fn can_support(&self, other: &Self) -> bool {
        other.is_alive() && other.visible && !other.is_npc() && !self.can_attack(other)
    }

    /// Reacts to being attacked by `attacker`.
    ///
    /// Monsters acquire the attacker as target if they have none. A monster
    /// already fighting switches only if the attacker is clearly closer
    /// than the current target: nearer than `hysteresis` times the current
    /// target's distance. `current_target_position` is `None` if the
    /// current target no longer exists.
    ///
    /// Returns the summon the aggro should be forwarded to, for players.
    pub fn on_aggro(
        &mut self,
        attacker: &Self,
        current_target_position: Option<Vec2>,
        hysteresis: f32,
    ) -> Option<EntityId> {
        match &self.inner {
            EntityInner::Player(player) => player.summon,
            EntityInner::Npc => None,
            EntityInner::Monster(_) => {
                if !self.can_attack(attacker) {
                    return None;
                }
                let switch = match (self.target, current_target_position) {
                    (None, _) | (Some(_), None) => true,
                    (Some(current), Some(current_position)) => {
                        current != attacker.id
                            && self.position().distance(attacker.position())
                                < self.position().distance(current_position) * hysteresis
                    }
                };
                if switch && self.target != Some(attacker.id) {
                    self.target = Some(attacker.id);
                    self.dirty |= DirtyFlags::TARGET;
                }
                None
            }
        }
    }

    /// Clears the target.
    pub fn clear_target(&mut self) {
        if self.target.take().is_some() {
            self.dirty |= DirtyFlags::TARGET;
        }
    }

    /// Sets the target.
    pub fn set_target(&mut self, target: Option<EntityId>) {
        if self.target != target {
            self.target = target;
            self.dirty |= DirtyFlags::TARGET;
        }
    }

    /// Teleports to `position` through the movement component. Observers
    /// receive a reliable warp.
    pub fn warp(&mut self, position: Vec2) {
        self.movement.warp(&mut self.transform, position);
        self.dirty |= DirtyFlags::WARPED;
    }

    /// Moves along the current route and refreshes speed from stats.
    pub fn advance_movement(&mut self, dt: f32) {
        let speed = self.speed();
        self.movement.set_speed(speed);
        self.movement.advance(&mut self.transform, dt);
    }

    /// Marks every field dirty so the next flush sends a full snapshot.
    pub fn mark_all_dirty(&mut self) {
        self.dirty = DirtyFlags::all();
    }
}

fn scaled(value: i32, fraction: f32) -> i32 {
    // bounded by value
    #[allow(clippy::cast_possible_truncation)]
    let result = (f64::from(value) * f64::from(fraction)).round() as i32;
    result
}

fn whole_points(amount: f32) -> (i32, f32) {
    let whole = amount.trunc();
    // recovery per tick is far below i32::MAX
    #[allow(clippy::cast_possible_truncation)]
    let points = whole as i32;
    (points, amount - whole)
}

// =============================================================================
// Tests
// =============================================================================
