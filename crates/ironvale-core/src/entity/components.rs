//! Kind-specific component structs.
//!
//! Everything shared by all entities lives on [`Entity`](super::Entity).
//! The structs here hold what only one kind needs.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::EntityId;
use crate::loot::LootTable;
use crate::stats::{BonusSource, ExponentialInt};

// =============================================================================
// Player
// =============================================================================

/// Spendable attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Attribute {
    /// Raises maximum health.
    Strength,
    /// Raises maximum mana.
    Intelligence,
}

/// Attribute points of a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attributes {
    /// Points spent on strength.
    pub strength: u32,
    /// Points spent on intelligence.
    pub intelligence: u32,
    /// Unspent points.
    pub free_points: u32,
    /// Maximum health per strength point.
    #[serde(skip)]
    pub health_per_point: i32,
    /// Maximum mana per intelligence point.
    #[serde(skip)]
    pub mana_per_point: i32,
}

impl Attributes {
    /// Spends one free point. Returns false if none are left.
    pub fn increase(&mut self, attribute: Attribute) -> bool {
        if self.free_points == 0 {
            return false;
        }
        self.free_points -= 1;
        match attribute {
            Attribute::Strength => self.strength += 1,
            Attribute::Intelligence => self.intelligence += 1,
        }
        true
    }
}

impl BonusSource for Attributes {
    fn health_bonus(&self) -> i32 {
        i32::try_from(self.strength)
            .unwrap_or(i32::MAX)
            .saturating_mul(self.health_per_point)
    }

    fn mana_bonus(&self) -> i32 {
        i32::try_from(self.intelligence)
            .unwrap_or(i32::MAX)
            .saturating_mul(self.mana_per_point)
    }
}

/// Progress of a trade offer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeStatus {
    /// The offer can still change.
    #[default]
    Open,
    /// The offer is final.
    Locked,
    /// The exchange is accepted.
    Accepted,
}

/// Trade bookkeeping of one player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trade {
    /// Outgoing trade request.
    pub request: Option<EntityId>,
    /// Trade partner once both players requested each other.
    pub partner: Option<EntityId>,
    /// Offered gold.
    pub offer_gold: u64,
    /// Offered inventory slots.
    pub offer_slots: Vec<usize>,
    /// Offer status.
    pub status: TradeStatus,
}

impl Trade {
    /// Forgets the partner and the offer. Keeps nothing.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// A queued activity start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityRequest {
    /// Recipe name.
    pub recipe: String,
    /// Additional runs after this one.
    pub repeat: u32,
}

/// A running activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityProgress {
    /// Recipe name.
    pub recipe: String,
    /// Completion timestamp.
    pub end: f64,
    /// Additional runs after this one.
    pub repeat: u32,
}

/// Player-only state.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerComponents {
    /// Class template name.
    pub class: String,
    /// Experience towards the next level.
    pub experience: u64,
    /// Experience spendable on skills.
    pub skill_experience: u64,
    /// Experience needed per level.
    pub experience_curve: ExponentialInt,
    /// Attribute points.
    pub attributes: Attributes,
    /// Respawn location chosen by the player.
    pub respawn_point: Option<Vec2>,
    /// Skill the client asked to use.
    pub requested_skill: Option<usize>,
    /// Skill queued while another one was casting.
    pub next_skill: Option<usize>,
    /// The client asked to stop whatever it is doing.
    pub cancel_requested: bool,
    /// The client asked to respawn.
    pub respawn_requested: bool,
    /// Trade bookkeeping.
    pub trade: Trade,
    /// Activity waiting to start.
    pub activity_request: Option<ActivityRequest>,
    /// Running activity.
    pub activity: Option<ActivityProgress>,
    /// Summoned companion.
    pub summon: Option<EntityId>,
}

impl PlayerComponents {
    /// Fresh state for a new character of `class`.
    #[must_use]
    pub fn new(class: impl Into<String>, experience_curve: ExponentialInt) -> Self {
        Self {
            class: class.into(),
            experience: 0,
            skill_experience: 0,
            experience_curve,
            attributes: Attributes::default(),
            respawn_point: None,
            requested_skill: None,
            next_skill: None,
            cancel_requested: false,
            respawn_requested: false,
            trade: Trade::default(),
            activity_request: None,
            activity: None,
            summon: None,
        }
    }
}

// =============================================================================
// Monster
// =============================================================================

/// Monster-only state.
#[derive(Debug, Clone, PartialEq)]
pub struct MonsterComponents {
    /// Monster template name.
    pub template: String,
    /// Spawn and leash point. Follows the owner for summons.
    pub home: Vec2,
    /// Summoning player.
    pub owner: Option<EntityId>,
    /// Give up on targets further than this from home.
    pub follow_distance: f32,
    /// Random walk radius around home.
    pub move_distance: f32,
    /// Random walk chance per second.
    pub move_probability: f32,
    /// Seconds the corpse stays visible.
    pub death_time: f64,
    /// Seconds from hiding to respawning.
    pub respawn_time: f64,
    /// Respawns instead of being despawned.
    pub respawn: bool,
    /// Timestamp at which the corpse is hidden.
    pub death_end: f64,
    /// Timestamp at which the monster respawns.
    pub respawn_end: f64,
    /// Drops.
    pub loot: LootTable,
    /// Experience for the killer.
    pub reward_experience: u64,
    /// Skill experience for the killer.
    pub reward_skill_experience: u64,
    /// Last skill used, for round-robin selection.
    pub last_skill: Option<usize>,
    /// Skill picked for the next attack.
    pub requested_skill: Option<usize>,
    /// A despawn is already scheduled.
    pub despawn_scheduled: bool,
}

impl MonsterComponents {
    /// True for monsters summoned by a player.
    #[must_use]
    pub const fn is_summon(&self) -> bool {
        self.owner.is_some()
    }
}

/// Kind-specific storage.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityInner {
    /// Player components.
    Player(PlayerComponents),
    /// Monster components.
    Monster(MonsterComponents),
    /// Stationary NPCs carry no extra state.
    Npc,
}
