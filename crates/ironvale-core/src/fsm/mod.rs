//! Per-kind finite state machines.
//!
//! Every tick each updated entity runs exactly one step of the state
//! machine for its kind. A step checks a fixed list of events in priority
//! order; the first one that fires decides the next state. Death is always
//! checked first, so an entity whose health dropped to zero during the tick
//! is DEAD after its next step no matter what else is pending.
//!
//! # Architecture
//!
//! ```text
//! Simulation::step()
//!   └─ for id in arena (sorted):
//!        entity = arena.take(id)
//!        entity.update_server(&mut ctx)   // this module
//!        arena.restore(entity)
//! ```
//!
//! The state is only ever written here, through [`Entity::update_server`].
//! Intents and other entities set request flags or modify pools; the state
//! machine turns those into transitions on the owner's next step.

mod monster;
mod npc;
mod player;

use tracing::debug;

use crate::context::TickContext;
use crate::entity::{Entity, EntityKind, EntityState};
use crate::movement::Movement;
use crate::output::Notification;
use crate::skill::cast::cancel_cast;

impl Entity {
    /// Runs one state machine step and stores the resulting state.
    ///
    /// # Returns
    ///
    /// The new state.
    pub fn update_server(&mut self, ctx: &mut TickContext<'_>) -> EntityState {
        let from = self.state();
        let next = match self.kind() {
            EntityKind::Player => player::update(self, ctx),
            EntityKind::Monster => monster::update(self, ctx),
            EntityKind::Npc => npc::update(self),
        };
        if self.set_state(next) {
            debug!(entity = %self.id(), %from, to = %next, "state changed");
            ctx.emit(self.id(), Notification::StateChanged { from, to: next });
        }
        next
    }
}

// =============================================================================
// Shared events
// =============================================================================

fn event_died(entity: &Entity) -> bool {
    !entity.is_alive()
}

fn event_stunned(entity: &Entity, now: f64) -> bool {
    entity.is_stunned(now)
}

fn event_move_end(entity: &Entity) -> bool {
    !entity.movement.is_moving()
}

/// The target was set but is gone, dead or hidden.
fn event_target_died(entity: &Entity, ctx: &TickContext<'_>) -> bool {
    match entity.target {
        None => false,
        Some(id) if id == entity.id() => !entity.is_alive(),
        Some(id) => ctx
            .arena
            .get(id)
            .map_or(true, |target| !target.is_alive() || !target.is_visible()),
    }
}

/// Death handling shared by every kind: forget the target, drop the cast,
/// purge buffs, stop moving and tell observers.
fn on_death(entity: &mut Entity, ctx: &mut TickContext<'_>) {
    entity.clear_target();
    cancel_cast(entity, ctx);
    if entity.buffs.on_death() > 0 {
        entity.dirty |= crate::entity::DirtyFlags::BUFFS;
        entity.clamp_pools();
    }
    entity.movement.reset();
    debug!(entity = %entity.id(), killer = ?entity.last_aggressor, "died");
    ctx.emit(
        entity.id(),
        Notification::Died {
            killer: entity.last_aggressor,
        },
    );
}
