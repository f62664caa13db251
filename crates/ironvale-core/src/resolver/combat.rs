//! Damage and healing.
//!
//! All randomness is drawn from the shard generator in a fixed order
//! (block, critical, durability wear, stun) so a replay with the same seed
//! lands exactly the same hits.
//!
//! # Death Handling
//!
//! Health is clamped at zero and nothing else happens here. The victim's
//! own state machine notices the death on its next update and runs the
//! death logic.

use std::sync::Arc;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::context::TickContext;
use crate::entity::{DirtyFlags, Entity, EntityId};
use crate::item::{EquipmentSlot, Item, ItemKind};
use crate::output::{Audience, Notification, Outbox};

pub use crate::output::DamageKind;

/// Result of one hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageOutcome {
    /// Health removed from the victim.
    pub amount: i32,
    /// How the hit landed.
    pub kind: DamageKind,
    /// The hit stunned the victim.
    pub stunned: bool,
}

/// Lets `attacker` hit the entity `victim`.
///
/// # Processing Order
///
/// 1. Invincible victims ignore the hit entirely.
/// 2. Block roll: the hit does nothing, but still counts as aggression.
/// 3. Damage is `amount - defense`, at least 1, doubled on a critical roll.
/// 4. The victim's armor may wear and the victim may be stunned.
/// 5. The victim reacts with aggro and both sides enter combat.
///
/// # Returns
///
/// `None` if the victim does not exist or is invincible.
pub fn deal_damage_at(
    attacker: &mut Entity,
    victim: EntityId,
    amount: i32,
    stun_chance: f32,
    stun_time: f32,
    ctx: &mut TickContext<'_>,
) -> Option<DamageOutcome> {
    let current_target_position = {
        let victim_entity = ctx.arena.get(victim)?;
        victim_entity
            .target
            .and_then(|target| ctx.position_of(attacker, target))
    };
    let now = ctx.now;
    let critical_chance = attacker.critical_chance();

    let victim_entity = ctx.arena.get_mut(victim)?;
    if victim_entity.invincible {
        return None;
    }

    let outcome = if ctx.rng.gen::<f32>() < victim_entity.block_chance() {
        DamageOutcome {
            amount: 0,
            kind: DamageKind::Block,
            stunned: false,
        }
    } else {
        let mut dealt = amount.saturating_sub(victim_entity.defense()).max(1);
        let mut kind = DamageKind::Normal;
        if ctx.rng.gen::<f32>() < critical_chance {
            dealt = dealt.saturating_mul(2);
            kind = DamageKind::Crit;
        }
        victim_entity.set_health(victim_entity.health().saturating_sub(dealt));

        wear_equipment(
            victim_entity,
            ctx.catalog,
            ctx.rng,
            ctx.config.durability_wear_denominator,
        );

        let mut stunned = false;
        if stun_chance > 0.0 && ctx.rng.gen::<f32>() < stun_chance {
            victim_entity.stun_end = victim_entity.stun_end.max(now + f64::from(stun_time));
            stunned = true;
        }
        DamageOutcome {
            amount: dealt,
            kind,
            stunned,
        }
    };

    victim_entity.last_aggressor = Some(attacker.id());
    victim_entity.last_combat = now;
    let forward = victim_entity.on_aggro(
        attacker,
        current_target_position,
        ctx.config.aggro_hysteresis,
    );
    attacker.last_combat = now;

    if let Some(summon) = forward {
        forward_aggro(attacker, summon, ctx);
    }

    debug!(
        attacker = %attacker.id(),
        victim = %victim,
        amount = outcome.amount,
        kind = %outcome.kind,
        "damage dealt"
    );
    ctx.emit(
        victim,
        Notification::DamageReceived {
            attacker: attacker.id(),
            amount: outcome.amount,
            kind: outcome.kind,
        },
    );
    Some(outcome)
}

fn forward_aggro(attacker: &Entity, summon: EntityId, ctx: &mut TickContext<'_>) {
    let summon_target_position = ctx
        .arena
        .get(summon)
        .and_then(|s| s.target)
        .and_then(|target| ctx.position_of(attacker, target));
    if let Some(summon_entity) = ctx.arena.get_mut(summon) {
        summon_entity.on_aggro(
            attacker,
            summon_target_position,
            ctx.config.aggro_hysteresis,
        );
    }
}

/// One-in-`denominator` chance to take one durability point off a random
/// worn armor piece. A piece reaching zero is swapped for its damaged
/// version if it has one.
fn wear_equipment(victim: &mut Entity, catalog: &Catalog, rng: &mut ChaCha8Rng, denominator: u32) {
    if rng.gen_range(0..denominator.max(1)) != 0 {
        return;
    }
    let candidates: Vec<EquipmentSlot> = victim.equipment.wearable_slots().collect();
    if candidates.is_empty() {
        return;
    }
    let slot = candidates[rng.gen_range(0..candidates.len())];
    let entry = victim.equipment.get_mut(slot);
    let Some(item) = entry.item.as_mut() else {
        return;
    };
    item.durability = item.durability.saturating_sub(1);
    if item.durability == 0 {
        let damaged = match &item.template().kind {
            ItemKind::Equipment {
                damaged_version: Some(name),
                ..
            } => Some(name.clone()),
            _ => None,
        };
        if let Some(name) = damaged {
            match catalog.item(&name) {
                Ok(template) => *item = Item::new(Arc::clone(template)),
                Err(err) => warn!(%err, "damaged item version missing"),
            }
        }
    }
    victim.dirty |= DirtyFlags::EQUIPMENT;
    victim.clamp_pools();
}

/// Restores health and mana of a living entity.
///
/// # Returns
///
/// The amounts actually restored.
pub fn heal(
    target: &mut Entity,
    source: EntityId,
    health: i32,
    mana: i32,
    outbox: &mut Outbox,
) -> (i32, i32) {
    if !target.is_alive() {
        return (0, 0);
    }
    let before = (target.health(), target.mana());
    target.set_health(target.health().saturating_add(health.max(0)));
    target.set_mana(target.mana().saturating_add(mana.max(0)));
    let restored = (target.health() - before.0, target.mana() - before.1);
    if restored != (0, 0) {
        outbox.push(
            target.id(),
            Audience::Observers,
            Notification::Healed {
                source,
                health: restored.0,
                mana: restored.1,
            },
        );
    }
    restored
}

// =============================================================================
// Tests
// =============================================================================
