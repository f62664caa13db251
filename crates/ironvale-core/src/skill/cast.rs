//! The cast protocol: checks, start, finish and cancel.
//!
//! The three checks are pure. Both state machines and the intent layer call
//! them as often as they like; only [`start_cast`], [`finish_cast`] and
//! [`cancel_cast`] mutate anything.
//!
//! # Cast Lifecycle
//!
//! 1. `start_cast` consumes the required item, sets the cast end and marks
//!    the skill as current.
//! 2. The owner's state machine waits in CASTING until the cast end.
//! 3. `finish_cast` re-validates, applies the effect, deducts mana and
//!    starts the cooldown. The current skill is cleared either way.

use std::sync::Arc;

use glam::Vec2;
use tracing::{debug, warn};

use crate::arena::Arena;
use crate::context::TickContext;
use crate::entity::{DirtyFlags, Entity, EntityId};
use crate::error::IntentError;
use crate::movement::Movement;
use crate::output::Notification;
use crate::resolver::{deal_damage_at, heal};

use super::{Buff, SkillEffect};

/// Outcome of [`cast_check_target`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetCheck {
    /// The skill can be cast at `target`.
    pub valid: bool,
    /// Target after correction. Heals and buffs fall back to the caster.
    pub target: Option<EntityId>,
}

/// Outcome of [`cast_check_distance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceCheck {
    /// The target is within cast range.
    pub in_range: bool,
    /// Where to walk to get in range.
    pub destination: Vec2,
}

/// Checks everything about a cast that depends on the caster alone.
///
/// Checked in order: the skill exists, is learned, the caster is alive, the
/// skill is not passive, mana suffices, the required item is carried and,
/// if `check_ready`, the cooldown is over.
///
/// # Errors
///
/// The first failing condition.
pub fn cast_check_self(
    entity: &Entity,
    index: usize,
    now: f64,
    check_ready: bool,
) -> Result<(), IntentError> {
    check_self(entity, index, now, check_ready, true)
}

fn check_self(
    entity: &Entity,
    index: usize,
    now: f64,
    check_ready: bool,
    check_items: bool,
) -> Result<(), IntentError> {
    let skill = entity
        .skills
        .get(index)
        .ok_or(IntentError::InvalidIndex(index))?;
    if !skill.is_learned() {
        return Err(IntentError::NotLearned);
    }
    if !entity.is_alive() {
        return Err(IntentError::InvalidState(entity.state()));
    }
    if matches!(skill.template().effect, SkillEffect::Passive { .. }) {
        return Err(IntentError::PassiveSkill);
    }
    if entity.mana() < skill.mana_cost() {
        return Err(IntentError::Insufficient("mana"));
    }
    if check_items {
        if let Some(required) = &skill.template().requires_item {
            if entity.inventory.count(&required.item) < required.amount {
                return Err(IntentError::Insufficient("items"));
            }
        }
    }
    if check_ready && !skill.is_ready(now) {
        return Err(IntentError::Cooldown);
    }
    Ok(())
}

/// Checks the caster's current target against skill `index`.
///
/// Damage needs an attackable target. Heals and buffs use the target if it
/// can be supported and fall back to the caster otherwise. Area, passive
/// and summon skills need no target.
#[must_use]
pub fn cast_check_target(entity: &Entity, arena: &Arena, index: usize) -> TargetCheck {
    let invalid = TargetCheck {
        valid: false,
        target: entity.target,
    };
    let Some(skill) = entity.skills.get(index) else {
        return invalid;
    };
    let effect = &skill.template().effect;
    if effect.is_self_centered() {
        return TargetCheck {
            valid: true,
            target: entity.target,
        };
    }
    let other = entity
        .target
        .filter(|id| *id != entity.id())
        .and_then(|id| arena.get(id));
    match effect {
        SkillEffect::TargetDamage { .. } => match other {
            Some(other) if entity.can_attack(other) => TargetCheck {
                valid: true,
                target: Some(other.id()),
            },
            _ => invalid,
        },
        SkillEffect::TargetHeal { .. } | SkillEffect::TargetBuff { .. } => match other {
            Some(other) if entity.can_support(other) => TargetCheck {
                valid: true,
                target: Some(other.id()),
            },
            _ => TargetCheck {
                valid: entity.is_alive(),
                target: Some(entity.id()),
            },
        },
        _ => invalid,
    }
}

/// Checks whether `target` is within range of skill `index`.
///
/// Self-centered skills and self-targets are always in range at the
/// caster's own position.
#[must_use]
pub fn cast_check_distance(
    entity: &Entity,
    arena: &Arena,
    index: usize,
    target: Option<EntityId>,
) -> DistanceCheck {
    let here = DistanceCheck {
        in_range: true,
        destination: entity.position(),
    };
    let Some(skill) = entity.skills.get(index) else {
        return DistanceCheck {
            in_range: false,
            ..here
        };
    };
    if skill.template().effect.is_self_centered() {
        return here;
    }
    match target {
        Some(id) if id == entity.id() => here,
        Some(id) => match arena.get(id) {
            Some(other) => {
                let destination = other.position();
                DistanceCheck {
                    in_range: entity.position().distance(destination) <= skill.cast_range(),
                    destination,
                }
            }
            None => DistanceCheck {
                in_range: false,
                ..here
            },
        },
        None => DistanceCheck {
            in_range: false,
            ..here
        },
    }
}

/// Starts casting skill `index`.
///
/// # Errors
///
/// Any [`cast_check_self`] failure. Nothing is consumed in that case.
pub fn start_cast(entity: &mut Entity, index: usize, ctx: &mut TickContext<'_>) -> Result<(), IntentError> {
    check_self(entity, index, ctx.now, true, true)?;

    let Some(skill) = entity.skills.get(index) else {
        return Err(IntentError::InvalidIndex(index));
    };
    let template = Arc::clone(skill.template());
    let cast_time = skill.cast_time();

    if let Some(required) = &template.requires_item {
        if !entity.inventory.remove(&required.item, required.amount) {
            return Err(IntentError::Insufficient("items"));
        }
        entity.dirty |= DirtyFlags::INVENTORY;
    }

    if let Some(skill) = entity.skills.get_mut(index) {
        skill.cast_end = ctx.now + f64::from(cast_time);
    }
    entity.skills.set_current(Some(index));
    entity.dirty |= DirtyFlags::SKILLS;

    if let Some(point) = entity
        .target
        .filter(|id| *id != entity.id())
        .and_then(|id| ctx.arena.get(id))
        .map(Entity::position)
    {
        entity.transform.look_at(point);
    }

    debug!(entity = %entity.id(), skill = %template.name, cast_time, "cast started");
    ctx.emit(
        entity.id(),
        Notification::CastStarted {
            skill: template.name.clone(),
            target: entity.target,
            cast_time,
        },
    );
    Ok(())
}

/// True once the current cast's time is up.
#[must_use]
pub fn cast_finished(entity: &Entity, now: f64) -> bool {
    entity
        .skills
        .current_skill()
        .is_some_and(|skill| skill.cast_time_remaining(now) <= 0.0)
}

/// True if the current skill is flagged to abort on target loss and its
/// target is gone or dead.
#[must_use]
pub fn cast_target_lost(entity: &Entity, arena: &Arena) -> bool {
    let Some(skill) = entity.skills.current_skill() else {
        return false;
    };
    if !skill.template().cancel_cast_if_target_died || skill.template().effect.is_self_centered() {
        return false;
    }
    match entity.target {
        None => true,
        Some(id) if id == entity.id() => !entity.is_alive(),
        Some(id) => arena
            .get(id)
            .map_or(true, |other| !other.is_alive() || !other.is_visible()),
    }
}

/// Completes the current cast.
///
/// Returns true if the effect was applied. The current skill is cleared
/// in every case.
pub fn finish_cast(entity: &mut Entity, ctx: &mut TickContext<'_>) -> bool {
    let Some(index) = entity.skills.current() else {
        return false;
    };
    let Some(skill) = entity.skills.get(index) else {
        entity.skills.set_current(None);
        return false;
    };
    let name = skill.name().to_owned();
    let mana_cost = skill.mana_cost();
    let cooldown = skill.cooldown();

    let check = cast_check_target(entity, ctx.arena, index);
    if let Err(err) = check_self(entity, index, ctx.now, false, false) {
        debug!(entity = %entity.id(), skill = %name, %err, "cast failed on finish");
        entity.skills.set_current(None);
        ctx.emit(entity.id(), Notification::CastCancelled { skill: name });
        return false;
    }
    if !check.valid {
        debug!(entity = %entity.id(), skill = %name, "cast target lost on finish");
        entity.skills.set_current(None);
        ctx.emit(entity.id(), Notification::CastCancelled { skill: name });
        return false;
    }

    apply_effect(entity, index, check.target, ctx);

    entity.set_mana(entity.mana() - mana_cost);
    if let Some(skill) = entity.skills.get_mut(index) {
        skill.cooldown_end = ctx.now + f64::from(cooldown);
    }
    entity.skills.set_current(None);
    entity.dirty |= DirtyFlags::SKILLS;
    train_passive(entity, index, ctx);

    ctx.emit(entity.id(), Notification::CastFinished { skill: name });
    true
}

/// Aborts the current cast, if any.
pub fn cancel_cast(entity: &mut Entity, ctx: &mut TickContext<'_>) {
    let Some(index) = entity.skills.current() else {
        return;
    };
    let name = entity.skills.get_mut(index).map(|skill| {
        skill.cast_end = ctx.now;
        skill.name().to_owned()
    });
    entity.skills.set_current(None);
    entity.dirty |= DirtyFlags::SKILLS;
    if let Some(skill) = name {
        debug!(entity = %entity.id(), %skill, "cast cancelled");
        ctx.emit(entity.id(), Notification::CastCancelled { skill });
    }
}

/// One-in-N chance for the trained passive to gain a level.
fn train_passive(entity: &mut Entity, index: usize, ctx: &mut TickContext<'_>) {
    let Some(trained) = entity
        .skills
        .get(index)
        .and_then(|skill| skill.template().trains.clone())
    else {
        return;
    };
    let Some(passive_index) = entity.skills.index_of(&trained) else {
        warn!(entity = %entity.id(), skill = %trained, "trained skill not known");
        return;
    };
    let eligible = entity
        .skills
        .get(passive_index)
        .is_some_and(|p| p.is_learned() && p.level < p.template().max_level);
    let denominator = ctx.config.skill_training_denominator;
    if eligible && ctx.one_in(denominator) {
        if let Some(passive) = entity.skills.get_mut(passive_index) {
            passive.level += 1;
            let level = passive.level;
            entity.dirty |= DirtyFlags::SKILLS;
            ctx.info(entity.id(), format!("{trained} improved to level {level}"));
        }
    }
}

fn apply_effect(entity: &mut Entity, index: usize, target: Option<EntityId>, ctx: &mut TickContext<'_>) {
    let Some(skill) = entity.skills.get(index) else {
        return;
    };
    let level = skill.level;
    let effect = skill.template().effect.clone();
    let me = entity.id();

    match effect {
        SkillEffect::TargetDamage {
            damage,
            stun_chance,
            stun_time,
        } => {
            if let Some(victim) = target.filter(|id| *id != me) {
                let amount = entity.damage().saturating_add(damage.get(level));
                deal_damage_at(
                    entity,
                    victim,
                    amount,
                    stun_chance.get(level),
                    stun_time.get(level),
                    ctx,
                );
            }
        }
        SkillEffect::AreaDamage {
            damage,
            radius,
            stun_chance,
            stun_time,
        } => {
            let amount = entity.damage().saturating_add(damage.get(level));
            let victims: Vec<EntityId> = ctx
                .arena
                .query_radius(entity.position(), radius.get(level))
                .into_iter()
                .filter(|id| *id != me)
                .filter(|id| ctx.arena.get(*id).is_some_and(|other| entity.can_attack(other)))
                .collect();
            for victim in victims {
                deal_damage_at(
                    entity,
                    victim,
                    amount,
                    stun_chance.get(level),
                    stun_time.get(level),
                    ctx,
                );
            }
        }
        SkillEffect::TargetHeal { health, mana } => {
            let (health, mana) = (health.get(level), mana.get(level));
            match target.filter(|id| *id != me) {
                Some(id) => {
                    if let Some(other) = ctx.arena.get_mut(id) {
                        heal(other, me, health, mana, ctx.outbox);
                    }
                }
                None => {
                    heal(entity, me, health, mana, ctx.outbox);
                }
            }
        }
        SkillEffect::AreaHeal {
            health,
            mana,
            radius,
        } => {
            let (health, mana) = (health.get(level), mana.get(level));
            heal(entity, me, health, mana, ctx.outbox);
            for id in supportable_around(entity, radius.get(level), ctx.arena) {
                if let Some(other) = ctx.arena.get_mut(id) {
                    heal(other, me, health, mana, ctx.outbox);
                }
            }
        }
        SkillEffect::TargetBuff { buff } => {
            let Ok(template) = ctx.catalog.buff(&buff) else {
                warn!(entity = %me, %buff, "unknown buff");
                return;
            };
            let buff = Buff::new(Arc::clone(template), level, ctx.now);
            match target.filter(|id| *id != me) {
                Some(id) => {
                    if let Some(other) = ctx.arena.get_mut(id) {
                        other.buffs.add_or_refresh(buff);
                        other.dirty |= DirtyFlags::BUFFS;
                    }
                }
                None => {
                    entity.buffs.add_or_refresh(buff);
                    entity.dirty |= DirtyFlags::BUFFS;
                }
            }
        }
        SkillEffect::AreaBuff { buff, radius } => {
            let Ok(template) = ctx.catalog.buff(&buff) else {
                warn!(entity = %me, %buff, "unknown buff");
                return;
            };
            let buff = Buff::new(Arc::clone(template), level, ctx.now);
            entity.buffs.add_or_refresh(buff.clone());
            entity.dirty |= DirtyFlags::BUFFS;
            for id in supportable_around(entity, radius.get(level), ctx.arena) {
                if let Some(other) = ctx.arena.get_mut(id) {
                    other.buffs.add_or_refresh(buff.clone());
                    other.dirty |= DirtyFlags::BUFFS;
                }
            }
        }
        SkillEffect::Passive { .. } => {}
        SkillEffect::Summon { monster } => {
            summon(entity, &monster, level, ctx);
        }
    }
}

fn supportable_around(entity: &Entity, radius: f32, arena: &Arena) -> Vec<EntityId> {
    arena
        .query_radius(entity.position(), radius)
        .into_iter()
        .filter(|id| *id != entity.id())
        .filter(|id| arena.get(*id).is_some_and(|other| entity.can_support(other)))
        .collect()
}

/// Replaces the caster's summon with a fresh one next to it.
///
/// # Returns
///
/// The companion's id, or `None` if the caster is not a player or the
/// monster cannot be built.
pub(crate) fn summon(entity: &mut Entity, monster: &str, level: u32, ctx: &mut TickContext<'_>) -> Option<EntityId> {
    let Some(player) = entity.as_player() else {
        debug!(entity = %entity.id(), "only players can summon");
        return None;
    };
    let previous = player.summon;
    let template = match ctx.catalog.monster(monster) {
        Ok(template) => Arc::clone(template),
        Err(err) => {
            warn!(entity = %entity.id(), %err, "summon failed");
            return None;
        }
    };

    if let Some(old) = previous {
        ctx.scheduler.cancel_for(old);
        ctx.arena.despawn(old);
    }

    let position = entity
        .movement
        .nearest_valid_destination(entity.position() + Vec2::X);
    let companion = match Entity::summon(
        &template,
        entity.id(),
        level,
        ctx.catalog,
        ctx.nav,
        ctx.config,
        position,
    ) {
        Ok(companion) => companion,
        Err(err) => {
            warn!(entity = %entity.id(), %err, "summon failed");
            return None;
        }
    };
    let id = ctx.arena.spawn(companion);
    if let Some(player) = entity.as_player_mut() {
        player.summon = Some(id);
    }
    debug!(owner = %entity.id(), summon = %id, "summoned");
    Some(id)
}

// =============================================================================
// Tests
// =============================================================================
