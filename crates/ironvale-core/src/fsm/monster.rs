//! Monster and summon AI.
//!
//! Wild monsters wander around their home, chase whoever damaged them and
//! cast their skills round-robin. Summons use the same machine with the
//! owner's position as home, so they trail behind the player.

use std::f32::consts::TAU;
use std::sync::Arc;

use glam::Vec2;
use rand::Rng;
use tracing::{debug, warn};

use crate::context::TickContext;
use crate::entity::{DirtyFlags, Entity, EntityKind, EntityState};
use crate::experience::{balanced_reward, gain_experience, gain_skill_experience};
use crate::item::Item;
use crate::movement::Movement;
use crate::output::Notification;
use crate::schedule::ScheduledAction;
use crate::skill::cast::{
    cancel_cast, cast_check_distance, cast_check_self, cast_check_target, cast_finished,
    cast_target_lost, finish_cast, start_cast,
};

use super::{event_died, event_move_end, event_stunned, event_target_died, on_death};

/// Path destinations closer than this to the target are not recomputed.
const REPATH_DISTANCE: f32 = 0.5;

pub(super) fn update(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    follow_owner(entity, ctx);
    match entity.state() {
        EntityState::Idle => idle(entity, ctx),
        EntityState::Moving => moving(entity, ctx),
        EntityState::Casting => casting(entity, ctx),
        EntityState::Stunned => stunned(entity, ctx),
        EntityState::Dead => dead(entity, ctx),
        other => {
            warn!(entity = %entity.id(), state = %other, "monster in player state");
            EntityState::Idle
        }
    }
}

// =============================================================================
// Events
// =============================================================================

fn home(entity: &Entity) -> Vec2 {
    entity.as_monster().map_or(entity.position(), |m| m.home)
}

fn is_summon(entity: &Entity) -> bool {
    entity.owner().is_some()
}

fn requested_skill(entity: &Entity) -> Option<usize> {
    entity.as_monster().and_then(|m| m.requested_skill)
}

fn set_requested_skill(entity: &mut Entity, index: Option<usize>) {
    if let Some(monster) = entity.as_monster_mut() {
        monster.requested_skill = index;
    }
}

/// Summons treat the owner's position as home. A summon whose owner is
/// gone removes itself.
fn follow_owner(entity: &mut Entity, ctx: &mut TickContext<'_>) {
    let Some(owner) = entity.owner() else {
        return;
    };
    let owner_position = ctx.arena.get(owner).map(Entity::position);
    let id = entity.id();
    let Some(monster) = entity.as_monster_mut() else {
        return;
    };
    match owner_position {
        Some(position) => monster.home = position,
        None if !monster.despawn_scheduled => {
            debug!(entity = %id, %owner, "owner gone, despawning summon");
            monster.despawn_scheduled = true;
            ctx.scheduler.schedule(ctx.now, ScheduledAction::Despawn(id));
        }
        None => {}
    }
}

/// The target has strayed further than `follow_distance` from home.
fn event_target_too_far_to_follow(entity: &Entity, ctx: &TickContext<'_>) -> bool {
    let Some(monster) = entity.as_monster() else {
        return false;
    };
    entity
        .target
        .and_then(|id| ctx.arena.get(id))
        .is_some_and(|target| target.position().distance(monster.home) > monster.follow_distance)
}

fn event_target_too_far_to_attack(entity: &Entity, ctx: &TickContext<'_>) -> bool {
    let Some(index) = requested_skill(entity) else {
        return false;
    };
    entity.target.is_some()
        && !cast_check_distance(entity, ctx.arena, index, entity.target).in_range
}

/// Wild monsters refuse to fight into a safe zone.
fn event_target_entered_safe_zone(entity: &Entity, ctx: &TickContext<'_>) -> bool {
    if is_summon(entity) {
        return false;
    }
    entity
        .target
        .and_then(|id| ctx.arena.get(id))
        .is_some_and(|target| target.in_safe_zone)
}

fn event_aggro(entity: &Entity, ctx: &TickContext<'_>) -> bool {
    entity
        .target
        .and_then(|id| ctx.arena.get(id))
        .is_some_and(|target| target.is_alive() && target.is_visible())
}

fn event_summon_too_far_from_owner(entity: &Entity) -> bool {
    entity.as_monster().is_some_and(|m| {
        m.owner.is_some() && entity.position().distance(m.home) > m.move_distance
    })
}

fn event_move_random(entity: &Entity, ctx: &mut TickContext<'_>) -> bool {
    if is_summon(entity) {
        return false;
    }
    let Some(probability) = entity.as_monster().map(|m| m.move_probability) else {
        return false;
    };
    ctx.rng.gen::<f32>() < probability * ctx.dt
}

/// Next castable skill after the last one cast, wrapping around.
fn next_skill(entity: &Entity, now: f64) -> Option<usize> {
    let count = entity.skills.len();
    if count == 0 {
        return None;
    }
    let start = entity
        .as_monster()
        .and_then(|m| m.last_skill)
        .map_or(0, |last| last + 1);
    (0..count)
        .map(|offset| (start + offset) % count)
        .find(|index| cast_check_self(entity, *index, now, true).is_ok())
}

fn stopping_distance(entity: &Entity, index: usize, ratio: f32) -> f32 {
    entity
        .skills
        .get(index)
        .map_or(0.0, |skill| skill.cast_range() * ratio)
}

// =============================================================================
// Transitions
// =============================================================================

fn navigate_home(entity: &mut Entity, stopping_distance: f32) -> EntityState {
    let home = home(entity);
    let from = entity.position();
    if entity.movement.navigate(from, home, stopping_distance) && entity.movement.is_moving() {
        EntityState::Moving
    } else {
        EntityState::Idle
    }
}

/// Walks towards the target so that the requested skill gets in range.
fn chase(entity: &mut Entity, ctx: &TickContext<'_>) -> EntityState {
    let Some(index) = requested_skill(entity) else {
        return EntityState::Idle;
    };
    let check = cast_check_distance(entity, ctx.arena, index, entity.target);
    let stop = stopping_distance(entity, index, ctx.config.attack_to_move_range_ratio);
    let from = entity.position();
    if entity.movement.navigate(from, check.destination, stop) && entity.movement.is_moving() {
        EntityState::Moving
    } else {
        EntityState::Idle
    }
}

/// Death inside a safe zone: wild monsters give up and vanish without
/// rewards, then respawn on their normal timer.
fn die_in_safe_zone(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    on_death(entity, ctx);
    entity.set_health(0);
    let now = ctx.now;
    if let Some(monster) = entity.as_monster_mut() {
        monster.requested_skill = None;
        monster.death_end = now;
        monster.respawn_end = now + monster.respawn_time;
    }
    EntityState::Dead
}

fn idle(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    if event_died(entity) {
        on_monster_death(entity, ctx);
        return EntityState::Dead;
    }
    if event_stunned(entity, ctx.now) {
        entity.movement.reset();
        return EntityState::Stunned;
    }
    if event_target_died(entity, ctx) {
        entity.clear_target();
        set_requested_skill(entity, None);
        return EntityState::Idle;
    }
    if event_target_too_far_to_follow(entity, ctx) {
        entity.clear_target();
        set_requested_skill(entity, None);
        return navigate_home(entity, 0.0);
    }
    if event_target_too_far_to_attack(entity, ctx) {
        return chase(entity, ctx);
    }
    if event_target_entered_safe_zone(entity, ctx) {
        return die_in_safe_zone(entity, ctx);
    }
    if let Some(index) = requested_skill(entity) {
        let ready = cast_check_self(entity, index, ctx.now, true).is_ok();
        let check = cast_check_target(entity, ctx.arena, index);
        if ready
            && check.valid
            && cast_check_distance(entity, ctx.arena, index, check.target).in_range
            && start_cast(entity, index, ctx).is_ok()
        {
            return EntityState::Casting;
        }
        set_requested_skill(entity, None);
        return EntityState::Idle;
    }
    if event_aggro(entity, ctx) {
        if let Some(index) = next_skill(entity, ctx.now) {
            set_requested_skill(entity, Some(index));
        }
        return EntityState::Idle;
    }
    if event_summon_too_far_from_owner(entity) {
        let stop = entity.as_monster().map_or(0.0, |m| m.move_distance * 0.5);
        return navigate_home(entity, stop);
    }
    if event_move_random(entity, ctx) {
        let (home, range) = entity
            .as_monster()
            .map_or((entity.position(), 0.0), |m| (m.home, m.move_distance));
        let angle = ctx.rng.gen_range(0.0..TAU);
        let distance = ctx.rng.gen_range(0.0..=range.max(0.0));
        let destination = entity
            .movement
            .nearest_valid_destination(home + Vec2::from_angle(angle) * distance);
        let from = entity.position();
        if entity.movement.navigate(from, destination, 0.0) && entity.movement.is_moving() {
            return EntityState::Moving;
        }
    }
    EntityState::Idle
}

fn moving(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    if event_died(entity) {
        on_monster_death(entity, ctx);
        return EntityState::Dead;
    }
    if event_stunned(entity, ctx.now) {
        entity.movement.reset();
        return EntityState::Stunned;
    }
    if event_move_end(entity) {
        return EntityState::Idle;
    }
    if event_target_died(entity, ctx) {
        entity.clear_target();
        set_requested_skill(entity, None);
        entity.movement.reset();
        return EntityState::Idle;
    }
    if event_target_too_far_to_follow(entity, ctx) {
        entity.clear_target();
        set_requested_skill(entity, None);
        return navigate_home(entity, 0.0);
    }
    if event_target_too_far_to_attack(entity, ctx) {
        let target_position = entity
            .target
            .and_then(|id| ctx.arena.get(id))
            .map(Entity::position);
        let stale = match (entity.movement.as_path().and_then(|p| p.destination()), target_position) {
            (Some(destination), Some(target)) => destination.distance(target) > REPATH_DISTANCE,
            _ => true,
        };
        if stale {
            return chase(entity, ctx);
        }
        return EntityState::Moving;
    }
    if event_target_entered_safe_zone(entity, ctx) {
        return die_in_safe_zone(entity, ctx);
    }
    if event_aggro(entity, ctx) {
        if requested_skill(entity).is_none() {
            if let Some(index) = next_skill(entity, ctx.now) {
                set_requested_skill(entity, Some(index));
            }
        }
        if let Some(index) = requested_skill(entity) {
            if cast_check_distance(entity, ctx.arena, index, entity.target).in_range {
                entity.movement.reset();
                return EntityState::Idle;
            }
        }
    }
    EntityState::Moving
}

fn casting(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    if let Some(point) = entity
        .target
        .filter(|id| *id != entity.id())
        .and_then(|id| ctx.arena.get(id))
        .map(Entity::position)
    {
        entity.transform.look_at(point);
    }

    if event_died(entity) {
        on_monster_death(entity, ctx);
        return EntityState::Dead;
    }
    if event_stunned(entity, ctx.now) {
        cancel_cast(entity, ctx);
        entity.movement.reset();
        return EntityState::Stunned;
    }
    if cast_target_lost(entity, ctx.arena) {
        cancel_cast(entity, ctx);
        set_requested_skill(entity, None);
        return EntityState::Idle;
    }
    if cast_finished(entity, ctx.now) {
        let index = entity.skills.current();
        finish_cast(entity, ctx);
        if event_target_died(entity, ctx) {
            entity.clear_target();
        }
        if let Some(monster) = entity.as_monster_mut() {
            if index.is_some() {
                monster.last_skill = index;
            }
            monster.requested_skill = None;
        }
        return EntityState::Idle;
    }
    EntityState::Casting
}

fn stunned(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    if event_died(entity) {
        on_monster_death(entity, ctx);
        return EntityState::Dead;
    }
    if event_stunned(entity, ctx.now) {
        return EntityState::Stunned;
    }
    EntityState::Idle
}

fn dead(entity: &mut Entity, ctx: &mut TickContext<'_>) -> EntityState {
    let now = ctx.now;
    let Some((respawn, respawn_end, death_end, scheduled, home)) = entity
        .as_monster()
        .map(|m| (m.respawn, m.respawn_end, m.death_end, m.despawn_scheduled, m.home))
    else {
        return EntityState::Dead;
    };

    if respawn && !is_summon(entity) && now >= respawn_end {
        entity.gold = 0;
        entity.dirty |= DirtyFlags::GOLD;
        entity.show();
        entity.warp(home);
        entity.revive(1.0);
        entity.clear_target();
        entity.last_aggressor = None;
        entity.stun_end = 0.0;
        if let Some(monster) = entity.as_monster_mut() {
            monster.requested_skill = None;
            monster.last_skill = None;
        }
        debug!(entity = %entity.id(), position = ?home, "respawned");
        ctx.emit(entity.id(), Notification::Respawned { position: home });
        return EntityState::Idle;
    }

    if entity.is_visible() && now >= death_end {
        entity.hide();
        if !(respawn && !is_summon(entity)) && !scheduled {
            if let Some(monster) = entity.as_monster_mut() {
                monster.despawn_scheduled = true;
            }
            ctx.scheduler
                .schedule(now, ScheduledAction::Despawn(entity.id()));
        }
    }
    EntityState::Dead
}

// =============================================================================
// Death
// =============================================================================

/// Death handling: timers, rewards for the killer and loot.
fn on_monster_death(entity: &mut Entity, ctx: &mut TickContext<'_>) {
    on_death(entity, ctx);
    let now = ctx.now;
    let id = entity.id();
    let position = entity.position();
    let victim_level = entity.level;
    let Some(monster) = entity.as_monster_mut() else {
        return;
    };
    monster.requested_skill = None;
    monster.death_end = now + monster.death_time;
    monster.respawn_end = monster.death_end + monster.respawn_time;
    let (reward_experience, reward_skill_experience) =
        (monster.reward_experience, monster.reward_skill_experience);
    let owner = monster.owner;
    let loot = monster.loot.clone();

    // a summon's kills reward its owner
    let receiver = entity.last_aggressor.map(|aggressor| {
        ctx.arena
            .get(aggressor)
            .and_then(Entity::owner)
            .unwrap_or(aggressor)
    });
    if let Some(receiver) = receiver {
        if let Some(player) = ctx
            .arena
            .get_mut(receiver)
            .filter(|other| other.kind() == EntityKind::Player)
        {
            let experience = balanced_reward(reward_experience, player.level, victim_level, ctx.config);
            let skill_experience =
                balanced_reward(reward_skill_experience, player.level, victim_level, ctx.config);
            gain_experience(player, experience, ctx.config, ctx.outbox);
            gain_skill_experience(player, skill_experience);
            debug!(entity = %id, %receiver, experience, skill_experience, "kill rewarded");
        }
    }

    let gold = loot.roll_gold(&mut *ctx.rng);
    if gold > 0 {
        entity.gold = entity.gold.saturating_add(gold);
        entity.dirty |= DirtyFlags::GOLD;
    }
    for drop in loot.roll_items(&mut *ctx.rng) {
        let template = match ctx.catalog.item(&drop.item) {
            Ok(template) => template,
            Err(err) => {
                warn!(entity = %id, %err, "loot item missing");
                continue;
            }
        };
        let item = Item::new(Arc::clone(template));
        let handle = ctx.spawner.spawn_dropped_item(&item, drop.amount, position);
        ctx.emit(
            id,
            Notification::LootDropped {
                item: drop.item.clone(),
                amount: drop.amount,
                handle,
                position,
            },
        );
    }

    if let Some(owner) = owner {
        if let Some(player) = ctx.arena.get_mut(owner).and_then(Entity::as_player_mut) {
            if player.summon == Some(id) {
                player.summon = None;
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::item::{ItemKind, ItemTemplate};
    use crate::loot::{LootDrop, LootTable};
    use crate::skill::{Skill, SkillEffect, SkillTemplate, Skills};
    use crate::stats::{BaseStats, LinearFloat, LinearInt};
    use crate::tests::helpers::{monster_entity, player_entity, TestShard};

    fn bite() -> Skill {
        let template = SkillTemplate {
            cast_time: LinearFloat::constant(0.5),
            cooldown: LinearFloat::constant(1.0),
            cast_range: LinearFloat::constant(2.0),
            ..SkillTemplate::new(
                "Bite",
                SkillEffect::TargetDamage {
                    damage: LinearInt::constant(5),
                    stun_chance: LinearFloat::constant(0.0),
                    stun_time: LinearFloat::constant(0.0),
                },
            )
        };
        Skill::new(Arc::new(template), 1)
    }

    fn wolf(shard: &TestShard) -> Entity {
        let mut wolf = monster_entity(shard, BaseStats::default());
        wolf.skills = Skills::new(vec![bite()]);
        if let Some(monster) = wolf.as_monster_mut() {
            monster.move_probability = 0.0;
        }
        wolf
    }

    fn step(shard: &mut TestShard, id: crate::entity::EntityId) -> EntityState {
        let mut entity = shard.arena.take(id).unwrap();
        let state = shard.with_ctx(|ctx| entity.update_server(ctx));
        shard.arena.restore(entity);
        state
    }

    mod combat_tests {
        use super::*;

        #[test]
        fn aggro_picks_skill_then_casts() {
            let mut shard = TestShard::new(3);
            let player = shard.arena.spawn(player_entity(&shard, BaseStats::default()));
            let mut monster = wolf(&shard);
            monster.warp(Vec2::new(1.0, 0.0));
            monster.target = Some(player);
            let id = shard.arena.spawn(monster);

            assert_eq!(step(&mut shard, id), EntityState::Idle);
            assert_eq!(
                shard.arena.get(id).unwrap().as_monster().unwrap().requested_skill,
                Some(0)
            );
            assert_eq!(step(&mut shard, id), EntityState::Casting);
        }

        #[test]
        fn out_of_range_target_is_chased() {
            let mut shard = TestShard::new(3);
            let mut target = player_entity(&shard, BaseStats::default());
            target.warp(Vec2::new(10.0, 0.0));
            let player = shard.arena.spawn(target);
            let mut monster = wolf(&shard);
            monster.target = Some(player);
            let id = shard.arena.spawn(monster);

            step(&mut shard, id);
            assert_eq!(step(&mut shard, id), EntityState::Moving);
            assert!(shard.arena.get(id).unwrap().movement.is_moving());
        }

        #[test]
        fn finished_cast_records_last_skill() {
            let mut shard = TestShard::new(3);
            let player = shard.arena.spawn(player_entity(&shard, BaseStats::default()));
            let mut monster = wolf(&shard);
            monster.warp(Vec2::new(1.0, 0.0));
            monster.target = Some(player);
            let id = shard.arena.spawn(monster);

            step(&mut shard, id);
            step(&mut shard, id);
            shard.now += 1.0;
            assert_eq!(step(&mut shard, id), EntityState::Idle);
            let monster = shard.arena.get(id).unwrap().as_monster().unwrap();
            assert_eq!(monster.last_skill, Some(0));
            assert_eq!(monster.requested_skill, None);
            let victim = shard.arena.get(player).unwrap();
            assert!(victim.health() < victim.max_health());
        }

        #[test]
        fn stun_interrupts_cast() {
            let mut shard = TestShard::new(3);
            let player = shard.arena.spawn(player_entity(&shard, BaseStats::default()));
            let mut monster = wolf(&shard);
            monster.warp(Vec2::new(1.0, 0.0));
            monster.target = Some(player);
            let id = shard.arena.spawn(monster);

            step(&mut shard, id);
            step(&mut shard, id);
            shard.arena.get_mut(id).unwrap().stun_end = shard.now + 2.0;
            assert_eq!(step(&mut shard, id), EntityState::Stunned);
            assert!(shard.arena.get(id).unwrap().skills.current().is_none());
        }

        #[test]
        fn leaves_target_beyond_follow_distance() {
            let mut shard = TestShard::new(3);
            let mut target = player_entity(&shard, BaseStats::default());
            target.warp(Vec2::new(26.0, 0.0));
            let player = shard.arena.spawn(target);
            let mut monster = wolf(&shard);
            monster.warp(Vec2::new(5.0, 0.0));
            monster.target = Some(player);
            let id = shard.arena.spawn(monster);

            assert_eq!(step(&mut shard, id), EntityState::Moving);
            let monster = shard.arena.get(id).unwrap();
            assert_eq!(monster.target, None);
            assert_eq!(
                monster.movement.as_path().and_then(|p| p.destination()),
                Some(Vec2::ZERO)
            );
        }

        #[test]
        fn monster_at_home_drops_target_beyond_follow_distance() {
            let mut shard = TestShard::new(3);
            let mut target = player_entity(&shard, BaseStats::default());
            target.warp(Vec2::new(26.0, 0.0));
            let player = shard.arena.spawn(target);
            let mut monster = wolf(&shard);
            monster.target = Some(player);
            let id = shard.arena.spawn(monster);

            for _ in 0..3 {
                step(&mut shard, id);
            }
            let monster = shard.arena.get(id).unwrap();
            assert_eq!(monster.target, None);
            assert_ne!(
                monster.movement.as_path().and_then(|p| p.destination()),
                Some(Vec2::new(26.0, 0.0))
            );
        }

        #[test]
        fn keeps_chasing_target_near_home_while_far_from_home() {
            let mut shard = TestShard::new(3);
            let mut target = player_entity(&shard, BaseStats::default());
            target.warp(Vec2::new(10.0, 0.0));
            let player = shard.arena.spawn(target);
            let mut monster = wolf(&shard);
            monster.warp(Vec2::new(-25.0, 0.0));
            monster.target = Some(player);
            let id = shard.arena.spawn(monster);

            step(&mut shard, id);
            assert_eq!(shard.arena.get(id).unwrap().target, Some(player));
        }
    }

    mod death_tests {
        use super::*;

        #[test]
        fn death_rewards_killer_and_drops_loot() {
            let mut shard = TestShard::new(5);
            shard.catalog.insert_item(ItemTemplate {
                name: "Pelt".into(),
                max_stack: 10,
                kind: ItemKind::Material,
            });
            let player = shard.arena.spawn(player_entity(&shard, BaseStats::default()));
            let mut monster = wolf(&shard);
            if let Some(m) = monster.as_monster_mut() {
                m.reward_experience = 10;
                m.loot = LootTable {
                    gold_min: 3,
                    gold_max: 3,
                    drops: vec![LootDrop {
                        item: "Pelt".into(),
                        probability: 1.0,
                        amount: 2,
                    }],
                };
            }
            monster.last_aggressor = Some(player);
            monster.set_health(0);
            let id = shard.arena.spawn(monster);

            assert_eq!(step(&mut shard, id), EntityState::Dead);
            assert_eq!(shard.arena.get(id).unwrap().gold, 3);
            assert_eq!(shard.spawner.drops().len(), 1);
            assert_eq!(shard.arena.get(player).unwrap().as_player().unwrap().experience, 10);
        }

        #[test]
        fn respawns_at_home_after_timers() {
            let mut shard = TestShard::new(5);
            let mut monster = wolf(&shard);
            if let Some(m) = monster.as_monster_mut() {
                m.death_time = 2.0;
                m.respawn_time = 3.0;
            }
            monster.warp(Vec2::new(4.0, 0.0));
            monster.set_health(0);
            let id = shard.arena.spawn(monster);

            step(&mut shard, id);
            shard.now += 2.0;
            assert_eq!(step(&mut shard, id), EntityState::Dead);
            assert!(!shard.arena.get(id).unwrap().is_visible());
            shard.now += 3.0;
            assert_eq!(step(&mut shard, id), EntityState::Idle);
            let monster = shard.arena.get(id).unwrap();
            assert!(monster.is_visible());
            assert_eq!(monster.health(), monster.max_health());
            assert_eq!(monster.position(), Vec2::ZERO);
            assert!(shard.scheduler.is_empty());
        }

        #[test]
        fn non_respawning_monster_is_despawned() {
            let mut shard = TestShard::new(5);
            let mut monster = wolf(&shard);
            if let Some(m) = monster.as_monster_mut() {
                m.respawn = false;
                m.death_time = 1.0;
            }
            monster.set_health(0);
            let id = shard.arena.spawn(monster);

            step(&mut shard, id);
            shard.now += 1.0;
            step(&mut shard, id);
            assert_eq!(
                shard.scheduler.pop_due(shard.now),
                vec![ScheduledAction::Despawn(id)]
            );
        }

        #[test]
        fn safe_zone_target_kills_wild_monster() {
            let mut shard = TestShard::new(5);
            let mut target = player_entity(&shard, BaseStats::default());
            target.in_safe_zone = true;
            let player = shard.arena.spawn(target);
            let mut monster = wolf(&shard);
            monster.warp(Vec2::new(1.0, 0.0));
            monster.target = Some(player);
            monster.last_aggressor = Some(player);
            let id = shard.arena.spawn(monster);

            assert_eq!(step(&mut shard, id), EntityState::Dead);
            assert_eq!(
                shard.arena.get(player).unwrap().as_player().unwrap().experience,
                0
            );
        }
    }
}
