//! Client intents.
//!
//! Clients never change the simulation directly. Their requests arrive as
//! typed [`Intent`]s, are queued per entity and applied at the start of the
//! next tick. Applying an intent validates it and sets a request flag or
//! performs a small, self-contained change (equipping, spending a point).
//! Anything that changes the FSM state is left to the entity's own state
//! machine, which re-checks everything on its next step.
//!
//! A rejected intent returns an [`IntentError`]; the shard turns it into an
//! owner-only info message.

use std::collections::{BTreeMap, VecDeque};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::TickContext;
use crate::entity::{ActivityRequest, Attribute, DirtyFlags, Entity, EntityId, EntityState};
use crate::error::IntentError;
use crate::experience::upgrade_skill;
use crate::item::{EquipmentSlot, Item, ItemKind, ItemSlot};
use crate::movement::{MovePermission, ReportOutcome};
use crate::resolver::heal;
use crate::skill::cast::summon;
use crate::trade;

/// A request from the owning client of an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Intent {
    /// Client-side position report.
    ReportPosition {
        /// Reported position.
        position: Vec2,
        /// Reported facing.
        look_direction: Vec2,
    },
    /// Cast a skill by index, or queue it after the current cast.
    UseSkill {
        /// Skill index.
        index: usize,
    },
    /// Select or clear the target.
    SetTarget {
        /// New target.
        target: Option<EntityId>,
    },
    /// Abort whatever the player is doing.
    CancelAction,
    /// Come back to life.
    Respawn,
    /// Respawn at the current position from now on.
    SetRespawnPoint,
    /// Ask another player to trade.
    TradeRequest {
        /// The other player.
        target: EntityId,
    },
    /// Change the own offer.
    TradeOffer {
        /// Offered gold.
        gold: u64,
        /// Offered inventory slots.
        slots: Vec<usize>,
    },
    /// Finalize the own offer.
    TradeLock,
    /// Accept the exchange.
    TradeAccept,
    /// Abort the trade.
    TradeCancel,
    /// Start a crafting, cooking or blacksmithing recipe.
    StartActivity {
        /// Recipe name.
        recipe: String,
        /// Additional runs after the first.
        #[serde(default)]
        repeat: u32,
    },
    /// Wear the item in an inventory slot.
    Equip {
        /// Inventory slot.
        slot: usize,
    },
    /// Move a worn item back to the inventory.
    Unequip {
        /// Equipment category.
        slot: EquipmentSlot,
    },
    /// Spend skill experience on a skill level.
    UpgradeSkill {
        /// Skill index.
        index: usize,
    },
    /// Spend a free attribute point.
    IncreaseAttribute {
        /// Attribute to raise.
        attribute: Attribute,
    },
    /// Take the gold from a corpse.
    LootGold {
        /// The dead monster.
        corpse: EntityId,
    },
    /// Use the item in an inventory slot.
    UseItem {
        /// Inventory slot.
        slot: usize,
    },
}

// =============================================================================
// Queue
// =============================================================================

/// Bounded per-entity intent queue, drained in entity id order.
#[derive(Debug, Clone)]
pub struct IntentQueue {
    pending: BTreeMap<EntityId, VecDeque<Intent>>,
    capacity: usize,
}

impl IntentQueue {
    /// Creates a queue holding at most `capacity` intents per entity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            pending: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Queues an intent for `entity`.
    ///
    /// # Errors
    ///
    /// [`IntentError::QueueFull`] if the entity already has `capacity`
    /// intents pending. The intent is dropped.
    pub fn push(&mut self, entity: EntityId, intent: Intent) -> Result<(), IntentError> {
        let queue = self.pending.entry(entity).or_default();
        if queue.len() >= self.capacity {
            return Err(IntentError::QueueFull);
        }
        queue.push_back(intent);
        Ok(())
    }

    /// Removes everything queued, ordered by entity id and then by arrival.
    pub fn drain(&mut self) -> Vec<(EntityId, Vec<Intent>)> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(id, queue)| (id, queue.into()))
            .collect()
    }

    /// Drops everything queued for `entity`.
    pub fn remove(&mut self, entity: EntityId) {
        self.pending.remove(&entity);
    }

    /// Total number of queued intents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.values().map(VecDeque::len).sum()
    }

    /// True if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.values().all(VecDeque::is_empty)
    }
}

// =============================================================================
// Application
// =============================================================================

/// Applies one intent to `entity`.
///
/// # Errors
///
/// The reason the intent was rejected. Nothing changed in that case.
pub fn apply(entity: &mut Entity, intent: Intent, ctx: &mut TickContext<'_>) -> Result<(), IntentError> {
    if !entity.is_player() {
        return Err(IntentError::InvalidTarget);
    }
    match intent {
        Intent::ReportPosition {
            position,
            look_direction,
        } => report_position(entity, position, look_direction, ctx.now),
        Intent::UseSkill { index } => use_skill(entity, index),
        Intent::SetTarget { target } => set_target(entity, target, ctx),
        Intent::CancelAction => {
            with_player(entity, |p| p.cancel_requested = true);
            Ok(())
        }
        Intent::Respawn => {
            require_state(entity, &[EntityState::Dead])?;
            with_player(entity, |p| p.respawn_requested = true);
            Ok(())
        }
        Intent::SetRespawnPoint => {
            require_alive(entity)?;
            let position = entity.position();
            with_player(entity, |p| p.respawn_point = Some(position));
            Ok(())
        }
        Intent::TradeRequest { target } => trade::request(entity, target, ctx),
        Intent::TradeOffer { gold, slots } => trade::offer(entity, gold, slots),
        Intent::TradeLock => trade::lock(entity),
        Intent::TradeAccept => trade::accept(entity, ctx),
        Intent::TradeCancel => {
            trade::cancel(entity, ctx);
            Ok(())
        }
        Intent::StartActivity { recipe, repeat } => {
            require_state(entity, &[EntityState::Idle, EntityState::Moving])?;
            ctx.catalog.recipe(&recipe)?;
            with_player(entity, |p| p.activity_request = Some(ActivityRequest { recipe, repeat }));
            Ok(())
        }
        Intent::Equip { slot } => equip(entity, slot),
        Intent::Unequip { slot } => unequip(entity, slot),
        Intent::UpgradeSkill { index } => {
            require_alive(entity)?;
            upgrade_skill(entity, index).map(|level| {
                debug!(entity = %entity.id(), skill = index, level, "skill upgraded");
            })
        }
        Intent::IncreaseAttribute { attribute } => increase_attribute(entity, attribute),
        Intent::LootGold { corpse } => loot_gold(entity, corpse, ctx),
        Intent::UseItem { slot } => use_item(entity, slot, ctx),
    }
}

fn with_player(entity: &mut Entity, f: impl FnOnce(&mut crate::entity::PlayerComponents)) {
    if let Some(player) = entity.as_player_mut() {
        f(player);
    }
}

fn require_alive(entity: &Entity) -> Result<(), IntentError> {
    if entity.is_alive() {
        Ok(())
    } else {
        Err(IntentError::InvalidState(entity.state()))
    }
}

fn require_state(entity: &Entity, allowed: &[EntityState]) -> Result<(), IntentError> {
    if allowed.contains(&entity.state()) {
        Ok(())
    } else {
        Err(IntentError::InvalidState(entity.state()))
    }
}

/// Inventory and equipment may only change while the player is free.
fn require_free_hands(entity: &Entity) -> Result<(), IntentError> {
    require_state(
        entity,
        &[EntityState::Idle, EntityState::Moving, EntityState::Casting],
    )
}

fn report_position(entity: &mut Entity, position: Vec2, look_direction: Vec2, now: f64) -> Result<(), IntentError> {
    // The FSM has not run yet this tick, so the stored state may be stale.
    let permission = match entity.state() {
        _ if !entity.is_alive() || entity.is_stunned(now) => MovePermission::Denied,
        EntityState::Idle | EntityState::Moving => MovePermission::Allowed,
        EntityState::Casting => {
            let allow = entity
                .skills
                .current_skill()
                .map_or(true, |skill| skill.template().allow_movement);
            if allow {
                MovePermission::Allowed
            } else {
                MovePermission::HoldSilently
            }
        }
        _ => MovePermission::Denied,
    };
    let Some(agent) = entity.movement.as_rubberband_mut() else {
        return Err(IntentError::InvalidTarget);
    };
    let outcome = agent.report(&mut entity.transform, position, look_direction, now, permission);
    if let ReportOutcome::Corrected(corrected) = outcome {
        debug!(entity = %entity.id(), ?position, ?corrected, "position corrected");
        entity.dirty |= DirtyFlags::WARPED;
    }
    Ok(())
}

fn use_skill(entity: &mut Entity, index: usize) -> Result<(), IntentError> {
    require_alive(entity)?;
    if entity.skills.get(index).is_none() {
        return Err(IntentError::InvalidIndex(index));
    }
    let casting = entity.state() == EntityState::Casting;
    with_player(entity, |p| {
        if casting {
            p.next_skill = Some(index);
        } else {
            p.requested_skill = Some(index);
        }
    });
    Ok(())
}

fn set_target(entity: &mut Entity, target: Option<EntityId>, ctx: &TickContext<'_>) -> Result<(), IntentError> {
    if let Some(id) = target {
        if id != entity.id() && !ctx.arena.contains(id) {
            return Err(IntentError::UnknownEntity(id));
        }
    }
    entity.set_target(target);
    Ok(())
}

fn equip(entity: &mut Entity, index: usize) -> Result<(), IntentError> {
    require_alive(entity)?;
    require_free_hands(entity)?;
    let slot = entity
        .inventory
        .slot(index)
        .filter(|slot| !slot.is_empty())
        .ok_or(IntentError::InvalidIndex(index))?;
    let (Some(item), amount) = (slot.item.clone(), slot.amount) else {
        return Err(IntentError::InvalidIndex(index));
    };
    let Some(category) = item.template().equipment_slot() else {
        return Err(IntentError::InvalidTarget);
    };
    let worn = entity.equipment.get(category).item.clone();
    if let Some(worn) = &worn {
        if amount > 1 && !entity.inventory.can_add(worn, 1) {
            return Err(IntentError::Insufficient("inventory space"));
        }
    }

    if let Some(slot) = entity.inventory.slot_mut(index) {
        slot.decrease(1);
    }
    if let Ok(Some(previous)) = entity.equipment.equip(item) {
        match entity.inventory.slot_mut(index) {
            Some(slot) if slot.is_empty() => *slot = ItemSlot::new(previous, 1),
            _ => {
                entity.inventory.add(&previous, 1);
            }
        }
    }
    entity.dirty |= DirtyFlags::INVENTORY | DirtyFlags::EQUIPMENT;
    entity.clamp_pools();
    Ok(())
}

fn unequip(entity: &mut Entity, category: EquipmentSlot) -> Result<(), IntentError> {
    require_alive(entity)?;
    require_free_hands(entity)?;
    let worn = entity
        .equipment
        .get(category)
        .item
        .clone()
        .ok_or(IntentError::InvalidTarget)?;
    if !entity.inventory.can_add(&worn, 1) {
        return Err(IntentError::Insufficient("inventory space"));
    }
    if let Some(item) = entity.equipment.unequip(category) {
        entity.inventory.add(&item, 1);
    }
    entity.dirty |= DirtyFlags::INVENTORY | DirtyFlags::EQUIPMENT;
    entity.clamp_pools();
    Ok(())
}

fn increase_attribute(entity: &mut Entity, attribute: Attribute) -> Result<(), IntentError> {
    let increased = entity
        .as_player_mut()
        .is_some_and(|p| p.attributes.increase(attribute));
    if !increased {
        return Err(IntentError::Insufficient("attribute points"));
    }
    entity.dirty |= DirtyFlags::HEALTH | DirtyFlags::MANA;
    Ok(())
}

fn loot_gold(entity: &mut Entity, corpse: EntityId, ctx: &mut TickContext<'_>) -> Result<(), IntentError> {
    require_alive(entity)?;
    let position = entity.position();
    let range = ctx.config.interaction_range;
    let other = ctx
        .arena
        .get_mut(corpse)
        .filter(|other| other.is_monster() && !other.is_alive())
        .ok_or(IntentError::InvalidTarget)?;
    if position.distance(other.position()) > range {
        return Err(IntentError::OutOfRange);
    }
    if other.gold == 0 {
        return Err(IntentError::Insufficient("gold"));
    }
    let gold = std::mem::take(&mut other.gold);
    other.dirty |= DirtyFlags::GOLD;
    entity.gold = entity.gold.saturating_add(gold);
    entity.dirty |= DirtyFlags::GOLD;
    debug!(entity = %entity.id(), %corpse, gold, "looted gold");
    Ok(())
}

fn use_item(entity: &mut Entity, index: usize, ctx: &mut TickContext<'_>) -> Result<(), IntentError> {
    require_alive(entity)?;
    require_free_hands(entity)?;
    let item: Item = entity
        .inventory
        .slot(index)
        .filter(|slot| !slot.is_empty())
        .and_then(|slot| slot.item.clone())
        .ok_or(IntentError::InvalidIndex(index))?;
    match &item.template().kind {
        ItemKind::Consumable { health, mana } => {
            let me = entity.id();
            if let Some(slot) = entity.inventory.slot_mut(index) {
                slot.decrease(1);
            }
            entity.dirty |= DirtyFlags::INVENTORY;
            heal(entity, me, *health, *mana, ctx.outbox);
            Ok(())
        }
        ItemKind::Equipment { .. } => equip(entity, index),
        ItemKind::Summon { monster } => {
            let id = summon(entity, monster, item.summoned_level, ctx).ok_or(IntentError::InvalidTarget)?;
            if item.summoned_health > 0 {
                if let Some(companion) = ctx.arena.get_mut(id) {
                    companion.set_health(item.summoned_health);
                }
            }
            Ok(())
        }
        ItemKind::Material => Err(IntentError::InvalidTarget),
    }
}

// =============================================================================
// Tests
// =============================================================================
