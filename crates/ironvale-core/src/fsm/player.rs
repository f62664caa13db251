//! Player state machine.
//!
//! Players are driven by their client. Intents only set request flags
//! (requested skill, cancel, respawn, trade partner, activity request) and
//! the machine below turns them into transitions. Movement itself comes
//! from position reports, so "moving" means the rubberband agent saw
//! velocity recently.

use tracing::debug;

use crate::activity;
use crate::context::TickContext;
use crate::entity::{Entity, EntityState};
use crate::experience::lose_on_death;
use crate::movement::Movement;
use crate::output::Notification;
use crate::skill::cast::{
    cancel_cast, cast_check_distance, cast_check_self, cast_check_target, cast_finished,
    cast_target_lost, finish_cast, start_cast,
};
use crate::trade;

use super::{event_died, event_move_end, event_stunned, on_death};

pub(super) fn update(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    let next = match entity.state() {
        EntityState::Idle => idle(entity, ctx),
        EntityState::Moving => moving(entity, ctx),
        EntityState::Casting => casting(entity, ctx),
        EntityState::Stunned => stunned(entity, ctx),
        EntityState::Dead => dead(entity, ctx),
        EntityState::Trading => trading(entity, ctx),
        state @ (EntityState::Crafting | EntityState::Cooking | EntityState::Blacksmithing) => {
            producing(entity, state, ctx)
        }
    };
    if let Some(player) = entity.as_player_mut() {
        player.cancel_requested = false;
        player.respawn_requested = false;
    }
    next
}

// =============================================================================
// Events
// =============================================================================

fn event_move_start(entity: &Entity) -> bool {
    entity.movement.is_moving()
}

fn event_cancel_action(entity: &Entity) -> bool {
    entity.as_player().is_some_and(|p| p.cancel_requested)
}

fn event_respawn(entity: &Entity) -> bool {
    entity.as_player().is_some_and(|p| p.respawn_requested)
}

fn event_trade_started(entity: &Entity) -> bool {
    entity.as_player().is_some_and(|p| p.trade.partner.is_some())
}

fn requested_skill(entity: &Entity) -> Option<usize> {
    entity.as_player().and_then(|p| p.requested_skill)
}

fn set_requested_skill(entity: &mut Entity, index: Option<usize>) {
    if let Some(player) = entity.as_player_mut() {
        player.requested_skill = index;
    }
}

/// The target was despawned or hidden. Dead but visible targets stay
/// selected so their corpse can be looted.
fn event_target_disappeared(entity: &Entity, ctx: &TickContext<'_>) -> bool {
    entity.target.is_some_and(|id| {
        id != entity.id() && ctx.arena.get(id).map_or(true, |target| !target.is_visible())
    })
}

// =============================================================================
// Shared transitions
// =============================================================================

/// Enters TRADING or an activity state if one was requested.
fn start_busy(entity: &mut Entity, ctx: &mut TickContext<'_>) -> Option<EntityState> {
    if event_trade_started(entity) {
        entity.movement.reset();
        return Some(EntityState::Trading);
    }
    let request = entity.as_player_mut().and_then(|p| p.activity_request.take())?;
    match activity::start(entity, request, ctx) {
        Ok(state) => {
            entity.movement.reset();
            Some(state)
        }
        Err(err) => {
            ctx.info(entity.id(), err.to_string());
            Some(EntityState::Idle)
        }
    }
}

fn not_casting(entity: &Entity) -> EntityState {
    if entity.movement.is_moving() {
        EntityState::Moving
    } else {
        EntityState::Idle
    }
}

/// Tries the requested skill: cast it if everything checks out, walk
/// towards the target if it is out of range, drop it otherwise.
fn use_requested_skill(entity: &mut Entity, index: usize, ctx: &mut TickContext<'_>, stop_first: bool) -> EntityState {
    if let Err(err) = cast_check_self(entity, index, ctx.now, true) {
        debug!(entity = %entity.id(), skill = index, %err, "requested skill rejected");
        ctx.info(entity.id(), err.to_string());
        set_requested_skill(entity, None);
        return not_casting(entity);
    }
    let check = cast_check_target(entity, ctx.arena, index);
    if !check.valid {
        ctx.info(entity.id(), "invalid target");
        set_requested_skill(entity, None);
        return not_casting(entity);
    }

    let distance = cast_check_distance(entity, ctx.arena, index, check.target);
    if distance.in_range {
        if stop_first {
            entity.movement.reset();
        }
        set_requested_skill(entity, None);
        return match start_cast(entity, index, ctx) {
            Ok(()) => EntityState::Casting,
            Err(err) => {
                ctx.info(entity.id(), err.to_string());
                not_casting(entity)
            }
        };
    }

    let stop = entity
        .skills
        .get(index)
        .map_or(0.0, |skill| skill.cast_range() * ctx.config.attack_to_move_range_ratio);
    let from = entity.position();
    entity.movement.navigate(from, distance.destination, stop);
    EntityState::Moving
}

// =============================================================================
// States
// =============================================================================

fn idle(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    if event_died(entity) {
        on_player_death(entity, ctx);
        return EntityState::Dead;
    }
    if event_stunned(entity, ctx.now) {
        entity.movement.reset();
        return EntityState::Stunned;
    }
    if event_cancel_action(entity) {
        entity.clear_target();
        set_requested_skill(entity, None);
        return EntityState::Idle;
    }
    if let Some(state) = start_busy(entity, ctx) {
        return state;
    }
    if event_move_start(entity) {
        cancel_cast(entity, ctx);
        return EntityState::Moving;
    }
    if let Some(index) = requested_skill(entity) {
        return use_requested_skill(entity, index, ctx, true);
    }
    if event_target_disappeared(entity, ctx) {
        entity.clear_target();
    }
    EntityState::Idle
}

fn moving(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    if event_died(entity) {
        entity.movement.reset();
        on_player_death(entity, ctx);
        return EntityState::Dead;
    }
    if event_stunned(entity, ctx.now) {
        entity.movement.reset();
        return EntityState::Stunned;
    }
    if event_cancel_action(entity) {
        entity.movement.reset();
        set_requested_skill(entity, None);
        return EntityState::Idle;
    }
    if let Some(state) = start_busy(entity, ctx) {
        return state;
    }
    if let Some(index) = requested_skill(entity) {
        return use_requested_skill(entity, index, ctx, false);
    }
    if event_target_disappeared(entity, ctx) {
        entity.clear_target();
    }
    if event_move_end(entity) {
        return EntityState::Idle;
    }
    EntityState::Moving
}

/// Moving while casting is left to the client and the report permission
/// check, so a move start never interrupts a cast.
fn casting(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    if event_died(entity) {
        on_player_death(entity, ctx);
        return EntityState::Dead;
    }
    if event_stunned(entity, ctx.now) {
        cancel_cast(entity, ctx);
        entity.movement.reset();
        return EntityState::Stunned;
    }
    if event_cancel_action(entity) {
        cancel_cast(entity, ctx);
        if let Some(player) = entity.as_player_mut() {
            player.next_skill = None;
        }
        return EntityState::Idle;
    }
    if cast_target_lost(entity, ctx.arena) {
        cancel_cast(entity, ctx);
        return EntityState::Idle;
    }
    if cast_finished(entity, ctx.now) {
        finish_cast(entity, ctx);
        if let Some(player) = entity.as_player_mut() {
            if let Some(next) = player.next_skill.take() {
                player.requested_skill = Some(next);
            }
        }
        return EntityState::Idle;
    }
    EntityState::Casting
}

fn stunned(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    if event_died(entity) {
        on_player_death(entity, ctx);
        return EntityState::Dead;
    }
    if event_stunned(entity, ctx.now) {
        return EntityState::Stunned;
    }
    EntityState::Idle
}

fn dead(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    if !event_respawn(entity) {
        return EntityState::Dead;
    }
    let position = entity
        .as_player()
        .and_then(|p| p.respawn_point)
        .or_else(|| ctx.zones.nearest_spawn(entity.position()))
        .unwrap_or_else(|| entity.position());
    let position = entity.movement.nearest_valid_destination(position);
    entity.warp(position);
    entity.revive(ctx.config.revive_health_fraction);
    entity.stun_end = 0.0;
    entity.last_aggressor = None;
    debug!(entity = %entity.id(), ?position, "respawned");
    ctx.emit(entity.id(), Notification::Respawned { position });
    EntityState::Idle
}

fn trading(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    if event_died(entity) {
        on_player_death(entity, ctx);
        return EntityState::Dead;
    }
    if event_stunned(entity, ctx.now) {
        trade::cancel(entity, ctx);
        return EntityState::Stunned;
    }
    if event_cancel_action(entity) || !trade::partner_valid(entity, ctx) {
        trade::cancel(entity, ctx);
        return EntityState::Idle;
    }
    if trade::both_accepted(entity, ctx) {
        trade::exchange(entity, ctx);
        return EntityState::Idle;
    }
    EntityState::Trading
}

fn producing(entity: &mut Entity, state: EntityState, ctx: &mut TickContext<'_>) -> EntityState {
    if event_died(entity) {
        on_player_death(entity, ctx);
        return EntityState::Dead;
    }
    if event_stunned(entity, ctx.now) {
        activity::abort(entity, ctx);
        return EntityState::Stunned;
    }
    if event_cancel_action(entity) {
        activity::abort(entity, ctx);
        return EntityState::Idle;
    }
    if entity.as_player().map_or(true, |p| p.activity.is_none()) {
        return EntityState::Idle;
    }
    if activity::is_finished(entity, ctx.now) {
        activity::finish(entity, ctx);
        return EntityState::Idle;
    }
    state
}

/// Death handling: drop every pending action and take the experience
/// penalty.
fn on_player_death(entity: &mut Entity, ctx: &mut TickContext<'_>) {
    on_death(entity, ctx);
    trade::cancel(entity, ctx);
    activity::abort(entity, ctx);
    if let Some(player) = entity.as_player_mut() {
        player.requested_skill = None;
        player.next_skill = None;
    }
    lose_on_death(entity, ctx.config);
}

// =============================================================================
// Tests
// =============================================================================
