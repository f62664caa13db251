//! Determinism verification tests.
//!
//! These tests verify that a shard produces identical broadcasts when:
//! - Started with the same seed
//! - Given identical intents
//!
//! The property tests below pin the combat invariants every tick relies on.

use glam::Vec2;
use proptest::prelude::*;

use super::helpers::{monster_entity, player_entity, punch, test_simulation, TestShard};
use crate::entity::EntityState;
use crate::intent::Intent;
use crate::output::Broadcast;
use crate::resolver::{deal_damage_at, heal};
use crate::simulation::{Simulation, World};
use crate::skill::cast::{cast_check_distance, cast_check_self, cast_check_target};
use crate::skill::Skills;
use crate::stats::{BaseStats, LinearFloat, LinearInt};
use crate::zone::Zones;

// =============================================================================
// Scripted Run
// =============================================================================

/// A player fighting two wolves with random crits and loot.
fn skirmish(seed: u64) -> Simulation {
    let mut sim = test_simulation(seed, Zones::default());
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    let first = sim.spawn_monster("Wolf", Vec2::new(2.0, 0.0)).unwrap();
    sim.spawn_monster("Wolf", Vec2::new(-6.0, 3.0)).unwrap();
    if let Some(entity) = sim.arena_mut().get_mut(player) {
        entity.base.critical_chance = LinearFloat::constant(0.3);
    }
    sim.submit(player, Intent::SetTarget { target: Some(first) }).unwrap();
    sim
}

fn run(sim: &mut Simulation, ticks: usize) -> Vec<Broadcast> {
    let player = sim
        .arena()
        .find_player("Ayla")
        .expect("player online");
    let mut all = Vec::new();
    for _ in 0..ticks {
        if sim.arena().get(player).is_some_and(|p| p.state() == EntityState::Idle) {
            sim.submit(player, Intent::UseSkill { index: 0 }).unwrap();
        }
        all.extend(sim.step());
    }
    all
}

#[test]
fn same_seed_same_broadcasts() {
    let mut a = skirmish(42);
    let mut b = skirmish(42);
    let first = run(&mut a, 600);
    let second = run(&mut b, 600);
    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert_eq!(a.now(), b.now());
}

#[test]
fn same_seed_same_final_state() {
    let mut a = skirmish(7);
    let mut b = skirmish(7);
    run(&mut a, 450);
    run(&mut b, 450);
    let left: Vec<(EntityState, i32, Vec2, u64)> = a
        .arena()
        .entities_sorted()
        .map(|e| (e.state(), e.health(), e.position(), e.gold))
        .collect();
    let right: Vec<(EntityState, i32, Vec2, u64)> = b
        .arena()
        .entities_sorted()
        .map(|e| (e.state(), e.health(), e.position(), e.gold))
        .collect();
    assert_eq!(left, right);
}

#[test]
fn parallel_world_matches_sequential_shards() {
    let mut world = World::new();
    for seed in [1, 2, 3] {
        world.add_shard(skirmish(seed));
    }
    let mut sequential: Vec<Simulation> = [1, 2, 3].into_iter().map(skirmish).collect();

    for _ in 0..120 {
        let parallel = world.step();
        let expected: Vec<Vec<Broadcast>> = sequential.iter_mut().map(Simulation::step).collect();
        assert_eq!(parallel, expected);
    }
}

#[test]
fn broadcast_sequence_restarts_each_tick() {
    let mut sim = skirmish(9);
    for _ in 0..30 {
        let broadcasts = sim.step();
        for (i, broadcast) in broadcasts.iter().enumerate() {
            assert_eq!(broadcast.sequence(), u32::try_from(i).unwrap());
            assert_eq!(broadcast.tick(), sim.tick() - 1);
        }
    }
}

// =============================================================================
// Properties
// =============================================================================

fn stats(defense: i32, block: f32, crit: f32) -> BaseStats {
    BaseStats {
        defense: LinearInt::constant(defense),
        block_chance: LinearFloat::constant(block),
        critical_chance: LinearFloat::constant(crit),
        ..BaseStats::default()
    }
}

proptest! {
    #[test]
    fn health_stays_in_bounds(
        seed in any::<u64>(),
        hits in prop::collection::vec((-50i32..500, any::<bool>()), 1..40),
    ) {
        let mut shard = TestShard::new(seed);
        let mut attacker = player_entity(&shard, stats(0, 0.0, 0.5));
        let victim = shard.arena.spawn(monster_entity(&shard, stats(3, 0.2, 0.0)));
        for (amount, is_heal) in hits {
            if is_heal {
                let target = shard.arena.get_mut(victim).unwrap();
                heal(target, attacker.id(), amount, amount, &mut shard.outbox);
            } else {
                shard.with_ctx(|ctx| deal_damage_at(&mut attacker, victim, amount, 0.0, 0.0, ctx));
            }
            let entity = shard.arena.get(victim).unwrap();
            prop_assert!(entity.health() >= 0);
            prop_assert!(entity.health() <= entity.max_health());
            prop_assert!(entity.mana() >= 0);
            prop_assert!(entity.mana() <= entity.max_mana());
        }
    }

    #[test]
    fn damage_is_at_least_one(
        seed in any::<u64>(),
        amount in -100i32..1_000,
        defense in 0i32..2_000,
    ) {
        let mut shard = TestShard::new(seed);
        let mut attacker = player_entity(&shard, stats(0, 0.0, 0.0));
        let victim = shard.arena.spawn(monster_entity(&shard, stats(defense, 0.0, 0.0)));
        let outcome = shard
            .with_ctx(|ctx| deal_damage_at(&mut attacker, victim, amount, 0.0, 0.0, ctx))
            .unwrap();
        prop_assert!(outcome.amount >= 1);
    }

    #[test]
    fn zero_block_chance_never_blocks(seed in any::<u64>(), amount in 1i32..200) {
        let mut shard = TestShard::new(seed);
        let mut attacker = player_entity(&shard, stats(0, 0.0, 0.0));
        let victim = shard.arena.spawn(monster_entity(&shard, stats(0, 0.0, 0.0)));
        let outcome = shard
            .with_ctx(|ctx| deal_damage_at(&mut attacker, victim, amount, 0.0, 0.0, ctx))
            .unwrap();
        prop_assert_ne!(outcome.kind, crate::resolver::DamageKind::Block);
    }

    #[test]
    fn stun_end_never_moves_backwards(
        seed in any::<u64>(),
        stuns in prop::collection::vec((0.0f64..5.0, 0.0f32..4.0), 1..20),
    ) {
        let mut shard = TestShard::new(seed);
        let mut attacker = player_entity(&shard, stats(0, 0.0, 0.0));
        let victim = shard.arena.spawn(monster_entity(&shard, stats(0, 0.0, 0.0)));
        let mut previous = shard.arena.get(victim).unwrap().stun_end;
        for (advance, stun_time) in stuns {
            shard.now += advance;
            shard.with_ctx(|ctx| deal_damage_at(&mut attacker, victim, 1, 1.0, stun_time, ctx));
            let stun_end = shard.arena.get(victim).unwrap().stun_end;
            prop_assert!(stun_end >= previous);
            prop_assert!(stun_end >= shard.now + f64::from(stun_time) - 1e-9);
            previous = stun_end;
        }
    }

    #[test]
    fn cast_checks_are_idempotent(
        mana in 0i32..100,
        distance in 0.0f32..10.0,
        cooldown_end in 0.0f64..3.0,
        now in 0.0f64..3.0,
    ) {
        let mut shard = TestShard::new(1);
        let victim = shard.arena.spawn(monster_entity(&shard, BaseStats::default()));
        shard.arena.get_mut(victim).unwrap().warp(Vec2::new(distance, 0.0));
        let mut caster = player_entity(&shard, BaseStats::default());
        caster.skills = Skills::new(vec![punch()]);
        caster.skills.get_mut(0).unwrap().cooldown_end = cooldown_end;
        caster.set_mana(mana);
        caster.target = Some(victim);
        let before = caster.clone();

        let self_check = cast_check_self(&caster, 0, now, true);
        let target_check = cast_check_target(&caster, &shard.arena, 0);
        let distance_check = cast_check_distance(&caster, &shard.arena, 0, target_check.target);

        prop_assert_eq!(&self_check, &cast_check_self(&caster, 0, now, true));
        prop_assert_eq!(target_check, cast_check_target(&caster, &shard.arena, 0));
        prop_assert_eq!(
            distance_check,
            cast_check_distance(&caster, &shard.arena, 0, target_check.target)
        );
        prop_assert_eq!(caster.health(), before.health());
        prop_assert_eq!(caster.mana(), before.mana());
        prop_assert_eq!(caster.state(), before.state());
        prop_assert_eq!(caster.skills.current(), before.skills.current());
    }
}
