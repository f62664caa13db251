//! Timed production activities: crafting, cooking and blacksmithing.
//!
//! All three work the same way. Starting checks the ingredients and the
//! room for the result; the player then stays in the matching busy state
//! until the recipe's duration is up. Completion consumes the ingredients
//! and rolls the success probability. A repeat count queues the next run
//! through the scheduler.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::Catalog;
use crate::context::TickContext;
use crate::entity::{ActivityProgress, ActivityRequest, DirtyFlags, Entity, EntityState};
use crate::error::IntentError;
use crate::item::Item;
use crate::output::Notification;
use crate::schedule::ScheduledAction;

/// Which busy state a recipe puts the player in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActivityKind {
    /// General crafting.
    Crafting,
    /// Cooking food.
    Cooking,
    /// Forging equipment.
    Blacksmithing,
}

impl ActivityKind {
    /// The busy state for this kind.
    #[must_use]
    pub const fn state(self) -> EntityState {
        match self {
            Self::Crafting => EntityState::Crafting,
            Self::Cooking => EntityState::Cooking,
            Self::Blacksmithing => EntityState::Blacksmithing,
        }
    }
}

/// An item consumed by a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    /// Item template name.
    pub item: String,
    /// Amount consumed.
    pub amount: u32,
}

fn one() -> u32 {
    1
}

fn certain() -> f32 {
    1.0
}

/// Static definition of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeTemplate {
    /// Unique name.
    pub name: String,
    /// Activity kind.
    pub kind: ActivityKind,
    /// Consumed items.
    pub ingredients: Vec<Ingredient>,
    /// Produced item template name.
    pub result: String,
    /// Produced amount.
    #[serde(default = "one")]
    pub result_amount: u32,
    /// Seconds per run.
    pub duration: f64,
    /// Chance that a run produces the result.
    #[serde(default = "certain")]
    pub probability: f32,
}

/// Checks that `entity` carries every ingredient and has room for the
/// result.
///
/// # Errors
///
/// [`IntentError::Insufficient`] naming what is missing, or
/// [`IntentError::Catalog`] if the result item is unknown.
pub fn can_start(entity: &Entity, recipe: &RecipeTemplate, catalog: &Catalog) -> Result<(), IntentError> {
    for ingredient in &recipe.ingredients {
        if entity.inventory.count(&ingredient.item) < ingredient.amount {
            return Err(IntentError::Insufficient("ingredients"));
        }
    }
    let result = Item::new(Arc::clone(catalog.item(&recipe.result)?));
    if !entity.inventory.can_add(&result, recipe.result_amount) {
        return Err(IntentError::Insufficient("inventory space"));
    }
    Ok(())
}

/// Starts a run of the requested recipe.
///
/// # Returns
///
/// The busy state the player enters.
///
/// # Errors
///
/// Unknown recipe or any [`can_start`] failure.
pub fn start(entity: &mut Entity, request: ActivityRequest, ctx: &TickContext<'_>) -> Result<EntityState, IntentError> {
    let recipe = ctx.catalog.recipe(&request.recipe)?;
    can_start(entity, recipe, ctx.catalog)?;
    let end = ctx.now + recipe.duration.max(0.0);
    let state = recipe.kind.state();
    let player = entity.as_player_mut().ok_or(IntentError::InvalidTarget)?;
    player.activity = Some(ActivityProgress {
        recipe: request.recipe,
        end,
        repeat: request.repeat,
    });
    Ok(state)
}

/// True once the running activity's duration is up.
#[must_use]
pub fn is_finished(entity: &Entity, now: f64) -> bool {
    entity
        .as_player()
        .and_then(|p| p.activity.as_ref())
        .is_some_and(|activity| now >= activity.end)
}

/// Completes the running activity.
///
/// Ingredients are consumed whether or not the success roll passes. If
/// ingredients or space went missing in the meantime nothing is consumed
/// and the run counts as failed. Remaining repeats are scheduled.
///
/// # Returns
///
/// True if the result was produced.
pub fn finish(entity: &mut Entity, ctx: &mut TickContext<'_>) -> bool {
    let Some(activity) = entity.as_player_mut().and_then(|p| p.activity.take()) else {
        return false;
    };
    let id = entity.id();
    let Ok(recipe) = ctx.catalog.recipe(&activity.recipe).map(Arc::clone) else {
        return false;
    };

    let success = match can_start(entity, &recipe, ctx.catalog) {
        Ok(()) => {
            for ingredient in &recipe.ingredients {
                entity.inventory.remove(&ingredient.item, ingredient.amount);
            }
            let success = ctx.roll(recipe.probability);
            if success {
                if let Ok(template) = ctx.catalog.item(&recipe.result) {
                    entity
                        .inventory
                        .add(&Item::new(Arc::clone(template)), recipe.result_amount);
                }
            }
            entity.dirty |= DirtyFlags::INVENTORY;
            success
        }
        Err(err) => {
            ctx.info(id, err.to_string());
            false
        }
    };

    debug!(entity = %id, recipe = %recipe.name, success, "activity finished");
    ctx.emit(
        id,
        Notification::ActivityFinished {
            recipe: recipe.name.clone(),
            success,
        },
    );
    if activity.repeat > 0 {
        ctx.scheduler.schedule(
            ctx.now,
            ScheduledAction::RepeatActivity {
                entity: id,
                recipe: activity.recipe,
                repeat: activity.repeat - 1,
            },
        );
    }
    success
}

/// Drops the running activity and any queued repeat.
pub fn abort(entity: &mut Entity, ctx: &mut TickContext<'_>) {
    let id = entity.id();
    if let Some(player) = entity.as_player_mut() {
        if player.activity.take().is_some() {
            debug!(entity = %id, "activity aborted");
        }
        player.activity_request = None;
    }
    ctx.scheduler.cancel_for(id);
}
