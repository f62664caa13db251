//! Player-to-player trading.
//!
//! # Protocol
//!
//! 1. Both players send a trade request naming each other. The second
//!    request links them as partners and both enter TRADING on their next
//!    update.
//! 2. Each side offers gold and inventory slots while its offer is open.
//! 3. Each side locks its offer. Once both are locked each side accepts.
//! 4. When both have accepted, whichever player updates first performs the
//!    exchange for both. The exchange is validated as a whole first; if
//!    anything is missing the trade is cancelled and nothing moves.
//!
//! Any cancel, death, stun or partner loss aborts the trade for both.

use tracing::debug;

use crate::context::TickContext;
use crate::entity::{DirtyFlags, Entity, EntityId, EntityState, TradeStatus};
use crate::error::IntentError;
use crate::item::{Inventory, Item, ItemSlot};
use crate::output::Notification;

fn trading_partner(entity: &Entity) -> Result<EntityId, IntentError> {
    entity
        .as_player()
        .and_then(|p| p.trade.partner)
        .ok_or(IntentError::InvalidState(entity.state()))
}

/// Asks `target` to trade. Links both players if `target` already asked.
///
/// # Errors
///
/// The requester must be an idle player and `target` a living player
/// within interaction range.
pub fn request(entity: &mut Entity, target: EntityId, ctx: &mut TickContext<'_>) -> Result<(), IntentError> {
    let me = entity.id();
    if !matches!(entity.state(), EntityState::Idle | EntityState::Moving) {
        return Err(IntentError::InvalidState(entity.state()));
    }
    let other = ctx
        .arena
        .get_mut(target)
        .filter(|other| other.is_player() && other.id() != me)
        .ok_or(IntentError::InvalidTarget)?;
    if !other.is_alive() || other.state().is_busy() {
        return Err(IntentError::InvalidTarget);
    }
    if entity.position().distance(other.position()) > ctx.config.interaction_range {
        return Err(IntentError::OutOfRange);
    }

    let mutual = other
        .as_player()
        .is_some_and(|p| p.trade.request == Some(me) && p.trade.partner.is_none());
    if mutual {
        if let Some(partner) = other.as_player_mut() {
            partner.trade.partner = Some(me);
        }
    }
    let player = entity.as_player_mut().ok_or(IntentError::InvalidTarget)?;
    player.trade.request = Some(target);
    if mutual {
        player.trade.partner = Some(target);
        debug!(a = %me, b = %target, "trade linked");
    }
    Ok(())
}

/// Replaces the offer with `gold` and the inventory `slots`.
///
/// # Errors
///
/// The player must be trading with an open offer, own the gold and every
/// slot must hold an item. Slots may not repeat.
pub fn offer(entity: &mut Entity, gold: u64, slots: Vec<usize>) -> Result<(), IntentError> {
    trading_partner(entity)?;
    if gold > entity.gold {
        return Err(IntentError::Insufficient("gold"));
    }
    for (i, slot) in slots.iter().enumerate() {
        if entity.inventory.slot(*slot).map_or(true, ItemSlot::is_empty) || slots[..i].contains(slot) {
            return Err(IntentError::InvalidIndex(*slot));
        }
    }
    let state = entity.state();
    let player = entity.as_player_mut().ok_or(IntentError::InvalidTarget)?;
    if player.trade.status != TradeStatus::Open {
        return Err(IntentError::InvalidState(state));
    }
    player.trade.offer_gold = gold;
    player.trade.offer_slots = slots;
    Ok(())
}

/// Makes the offer final.
///
/// # Errors
///
/// The player must be trading with an open offer.
pub fn lock(entity: &mut Entity) -> Result<(), IntentError> {
    trading_partner(entity)?;
    let state = entity.state();
    let player = entity.as_player_mut().ok_or(IntentError::InvalidTarget)?;
    if player.trade.status != TradeStatus::Open {
        return Err(IntentError::InvalidState(state));
    }
    player.trade.status = TradeStatus::Locked;
    Ok(())
}

/// Accepts the exchange. Both offers must be locked.
///
/// # Errors
///
/// The player must be trading, with its own offer locked and the
/// partner's offer locked or accepted.
pub fn accept(entity: &mut Entity, ctx: &TickContext<'_>) -> Result<(), IntentError> {
    let partner = trading_partner(entity)?;
    let partner_status = ctx
        .arena
        .get(partner)
        .and_then(Entity::as_player)
        .map(|p| p.trade.status)
        .ok_or(IntentError::InvalidTarget)?;
    let state = entity.state();
    let player = entity.as_player_mut().ok_or(IntentError::InvalidTarget)?;
    if player.trade.status != TradeStatus::Locked || partner_status == TradeStatus::Open {
        return Err(IntentError::InvalidState(state));
    }
    player.trade.status = TradeStatus::Accepted;
    Ok(())
}

/// True while the partner still exists, lives and is linked back.
#[must_use]
pub fn partner_valid(entity: &Entity, ctx: &TickContext<'_>) -> bool {
    let Some(partner) = entity.as_player().and_then(|p| p.trade.partner) else {
        return false;
    };
    ctx.arena.get(partner).is_some_and(|other| {
        other.is_alive()
            && other.as_player().and_then(|p| p.trade.partner) == Some(entity.id())
    })
}

/// True if both sides accepted.
#[must_use]
pub fn both_accepted(entity: &Entity, ctx: &TickContext<'_>) -> bool {
    let Some(player) = entity.as_player() else {
        return false;
    };
    player.trade.status == TradeStatus::Accepted
        && player
            .trade
            .partner
            .and_then(|id| ctx.arena.get(id))
            .and_then(Entity::as_player)
            .is_some_and(|p| p.trade.status == TradeStatus::Accepted)
}

fn offered_items(entity: &Entity) -> Option<Vec<(Item, u32)>> {
    let player = entity.as_player()?;
    player
        .trade
        .offer_slots
        .iter()
        .map(|index| {
            let slot = entity.inventory.slot(*index)?;
            slot.item.clone().filter(|_| slot.amount > 0).map(|item| (item, slot.amount))
        })
        .collect()
}

fn remove_offered(entity: &mut Entity) {
    let slots = entity
        .as_player()
        .map(|p| p.trade.offer_slots.clone())
        .unwrap_or_default();
    for index in slots {
        if let Some(slot) = entity.inventory.slot_mut(index) {
            slot.take();
        }
    }
}

fn place(inventory: &mut Inventory, items: Vec<(Item, u32)>) {
    for (item, amount) in items {
        let free = (0..inventory.slots().len()).find(|i| inventory.slot(*i).is_some_and(ItemSlot::is_empty));
        if let Some(slot) = free.and_then(|i| inventory.slot_mut(i)) {
            *slot = ItemSlot::new(item, amount);
        }
    }
}

/// Swaps both offers.
///
/// Validated as a whole first: both sides still own the offered gold and
/// items and have a free slot for every incoming item. On failure the
/// trade is cancelled for both.
///
/// # Returns
///
/// True if the exchange went through.
pub fn exchange(entity: &mut Entity, ctx: &mut TickContext<'_>) -> bool {
    let me = entity.id();
    let Ok(partner_id) = trading_partner(entity) else {
        return false;
    };
    let Some(partner) = ctx.arena.get_mut(partner_id) else {
        cancel(entity, ctx);
        return false;
    };

    let my_gold = entity.as_player().map_or(0, |p| p.trade.offer_gold);
    let their_gold = partner.as_player().map_or(0, |p| p.trade.offer_gold);
    let mine = offered_items(entity);
    let theirs = offered_items(partner);
    let valid = match (&mine, &theirs) {
        (Some(mine), Some(theirs)) => {
            entity.gold >= my_gold
                && partner.gold >= their_gold
                && entity.inventory.free_slots() >= theirs.len()
                && partner.inventory.free_slots() >= mine.len()
        }
        _ => false,
    };
    let (Some(mine), Some(theirs), true) = (mine, theirs, valid) else {
        debug!(a = %me, b = %partner_id, "trade exchange invalid");
        cancel(entity, ctx);
        return false;
    };

    remove_offered(entity);
    remove_offered(partner);
    place(&mut entity.inventory, theirs);
    place(&mut partner.inventory, mine);
    entity.gold = entity.gold - my_gold + their_gold;
    partner.gold = partner.gold - their_gold + my_gold;

    for side in [&mut *entity, &mut *partner] {
        if let Some(player) = side.as_player_mut() {
            player.trade.clear();
        }
        side.dirty |= DirtyFlags::INVENTORY | DirtyFlags::GOLD;
    }
    debug!(a = %me, b = %partner_id, "trade completed");
    ctx.emit(me, Notification::TradeCompleted { partner: partner_id });
    ctx.emit(partner_id, Notification::TradeCompleted { partner: me });
    true
}

/// Aborts the trade for both sides.
pub fn cancel(entity: &mut Entity, ctx: &mut TickContext<'_>) {
    let me = entity.id();
    let Some(player) = entity.as_player_mut() else {
        return;
    };
    let partner = player.trade.partner;
    let was_trading = partner.is_some();
    player.trade.clear();

    if let Some(partner_id) = partner {
        if let Some(other) = ctx.arena.get_mut(partner_id) {
            if let Some(p) = other.as_player_mut() {
                if p.trade.partner == Some(me) {
                    p.trade.clear();
                    ctx.emit(partner_id, Notification::TradeCancelled);
                }
            }
        }
    }
    if was_trading {
        debug!(entity = %me, "trade cancelled");
        ctx.emit(me, Notification::TradeCancelled);
    }
}
