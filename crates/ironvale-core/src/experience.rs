//! Experience, levels and skill upgrades.
//!
//! Players gain experience from kills (scaled by the level difference to
//! the victim) and lose a fraction of the current requirement on death.
//! Skill experience is a separate currency spent on skill levels.

use tracing::debug;

use crate::config::SimConfig;
use crate::entity::{DirtyFlags, Entity};
use crate::error::IntentError;
use crate::output::{Audience, Notification, Outbox};

/// Scales a kill reward by the level difference between victim and
/// receiver.
///
/// Each level the victim is above the receiver adds
/// `experience_per_level_difference` to the multiplier, each level below
/// removes it. The difference is clamped to `max_level_difference` and the
/// reward never goes negative.
#[must_use]
pub fn balanced_reward(amount: u64, receiver_level: u32, victim_level: u32, config: &SimConfig) -> u64 {
    let max = config.max_level_difference.max(0);
    let difference = i64::from(victim_level) - i64::from(receiver_level);
    // clamped to a small range
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let difference = difference.clamp(-i64::from(max), i64::from(max)) as f32;
    let multiplier = (1.0 + difference * config.experience_per_level_difference).max(0.0);
    // rewards are far below f64 precision limits
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let scaled = (amount as f64 * f64::from(multiplier)).round() as u64;
    scaled
}

/// Adds experience, levelling up as often as it suffices.
///
/// Every level grants `attribute_points_per_level` attribute points. At
/// the maximum level experience is capped at the current requirement.
///
/// # Returns
///
/// Number of levels gained.
pub fn gain_experience(entity: &mut Entity, amount: u64, config: &SimConfig, outbox: &mut Outbox) -> u32 {
    let id = entity.id();
    let max_level = entity.max_level;
    let mut level = entity.level;
    let Some(player) = entity.as_player_mut() else {
        return 0;
    };
    if amount == 0 {
        return 0;
    }
    player.experience = player.experience.saturating_add(amount);

    let mut gained = 0;
    while level < max_level {
        let required = player.experience_curve.get(level);
        if player.experience < required {
            break;
        }
        player.experience -= required;
        player.attributes.free_points = player
            .attributes
            .free_points
            .saturating_add(config.attribute_points_per_level);
        level += 1;
        gained += 1;
        outbox.push(id, Audience::Observers, Notification::LevelUp { level });
    }
    if level >= max_level {
        player.experience = player.experience.min(player.experience_curve.get(level));
    }

    entity.level = level;
    entity.dirty |= DirtyFlags::EXPERIENCE;
    if gained > 0 {
        debug!(entity = %id, level, "level up");
        entity.dirty |= DirtyFlags::LEVEL | DirtyFlags::HEALTH | DirtyFlags::MANA;
    }
    gained
}

/// Adds skill experience.
pub fn gain_skill_experience(entity: &mut Entity, amount: u64) {
    if let Some(player) = entity.as_player_mut() {
        if amount > 0 {
            player.skill_experience = player.skill_experience.saturating_add(amount);
            entity.dirty |= DirtyFlags::EXPERIENCE;
        }
    }
}

/// Removes the death penalty: a fraction of the current level's
/// requirement, never below zero.
pub fn lose_on_death(entity: &mut Entity, config: &SimConfig) {
    let level = entity.level;
    let Some(player) = entity.as_player_mut() else {
        return;
    };
    // penalty is a fraction of a u64 requirement
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    let loss = (player.experience_curve.get(level) as f64
        * f64::from(config.death_experience_loss.clamp(0.0, 1.0))) as u64;
    player.experience = player.experience.saturating_sub(loss);
    entity.dirty |= DirtyFlags::EXPERIENCE;
}

/// Spends skill experience on the next level of skill `index`.
///
/// # Errors
///
/// - [`IntentError::InvalidIndex`] if there is no such skill
/// - [`IntentError::MaxLevel`] if the skill cannot go higher
/// - [`IntentError::Insufficient`] if the player level or skill experience
///   is too low
pub fn upgrade_skill(entity: &mut Entity, index: usize) -> Result<u32, IntentError> {
    let level = entity.level;
    let skill = entity
        .skills
        .get(index)
        .ok_or(IntentError::InvalidIndex(index))?;
    if skill.level >= skill.template().max_level {
        return Err(IntentError::MaxLevel);
    }
    let next = skill.level + 1;
    let required_level = skill.template().required_level.get(next);
    if i64::from(level) < i64::from(required_level) {
        return Err(IntentError::Insufficient("level"));
    }
    let cost = u64::try_from(skill.template().required_skill_experience.get(next)).unwrap_or(0);

    let player = entity
        .as_player_mut()
        .ok_or(IntentError::InvalidTarget)?;
    if player.skill_experience < cost {
        return Err(IntentError::Insufficient("skill experience"));
    }
    player.skill_experience -= cost;

    if let Some(skill) = entity.skills.get_mut(index) {
        skill.level = next;
    }
    entity.dirty |= DirtyFlags::SKILLS | DirtyFlags::EXPERIENCE;
    Ok(next)
}
