//! Integration tests for the shard pipeline.
//!
//! The first group pins the combat and state machine scenarios on a bare
//! test shard. The rest drive a full [`Simulation`] through intents and
//! check the broadcasts that come out.

use std::sync::Arc;

use glam::Vec2;

use super::helpers::{monster_entity, player_entity, test_simulation, TestShard};
use crate::entity::{EntityId, EntityState};
use crate::intent::Intent;
use crate::item::{EquipmentSlot, Inventory, Item};
use crate::output::{Audience, Broadcast, Notification};
use crate::persistence::JsonFileStore;
use crate::resolver::deal_damage_at;
use crate::simulation::Simulation;
use crate::skill::{Buff, BuffTemplate};
use crate::stats::{BaseStats, BonusCurves, LinearFloat, LinearInt};
use crate::zone::{Rect, Zones};

fn plain_stats(defense: i32) -> BaseStats {
    BaseStats {
        defense: LinearInt::constant(defense),
        block_chance: LinearFloat::constant(0.0),
        critical_chance: LinearFloat::constant(0.0),
        ..BaseStats::default()
    }
}

fn update(shard: &mut TestShard, id: EntityId) -> EntityState {
    let mut entity = shard.arena.take(id).unwrap();
    let state = shard.with_ctx(|ctx| entity.update_server(ctx));
    shard.arena.restore(entity);
    state
}

fn slot_of(inventory: &Inventory, name: &str) -> usize {
    inventory
        .slots()
        .iter()
        .position(|slot| slot.item.as_ref().is_some_and(|item| item.name() == name))
        .unwrap()
}

fn state_of(sim: &Simulation, id: EntityId) -> EntityState {
    sim.arena().get(id).unwrap().state()
}

fn from(broadcasts: &[Broadcast], source: EntityId) -> Vec<&Notification> {
    broadcasts
        .iter()
        .filter(|b| b.source() == source)
        .map(Broadcast::notification)
        .collect()
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn scenario_a_defense_is_subtracted() {
    let mut shard = TestShard::new(1);
    let mut attacker = player_entity(&shard, plain_stats(0));
    let victim = shard.arena.spawn(monster_entity(&shard, plain_stats(4)));
    let before = shard.arena.get(victim).unwrap().health();

    let outcome = shard
        .with_ctx(|ctx| deal_damage_at(&mut attacker, victim, 10, 0.0, 0.0, ctx))
        .unwrap();

    assert_eq!(outcome.amount, 6);
    assert_eq!(shard.arena.get(victim).unwrap().health(), before - 6);
}

#[test]
fn scenario_b_damage_floor() {
    let mut shard = TestShard::new(1);
    let mut attacker = player_entity(&shard, plain_stats(0));
    let victim = shard.arena.spawn(monster_entity(&shard, plain_stats(50)));

    let outcome = shard
        .with_ctx(|ctx| deal_damage_at(&mut attacker, victim, 10, 0.0, 0.0, ctx))
        .unwrap();

    assert_eq!(outcome.amount, 1);
}

#[test]
fn scenario_c_monster_returns_home() {
    let mut shard = TestShard::new(3);
    let mut target = player_entity(&shard, BaseStats::default());
    target.warp(Vec2::new(26.0, 0.0));
    let player = shard.arena.spawn(target);
    let mut monster = monster_entity(&shard, BaseStats::default());
    monster.warp(Vec2::new(5.0, 0.0));
    monster.target = Some(player);
    let id = shard.arena.spawn(monster);

    assert_eq!(update(&mut shard, id), EntityState::Moving);
    let monster = shard.arena.get(id).unwrap();
    assert_eq!(monster.target, None);
    assert_eq!(monster.movement.as_path().unwrap().destination(), Some(Vec2::ZERO));
}

#[test]
fn scenario_d_casting_ignores_movement() {
    let mut sim = test_simulation(4, Zones::default());
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    let wolf = sim.spawn_monster("Wolf", Vec2::new(2.0, 0.0)).unwrap();

    sim.submit(player, Intent::SetTarget { target: Some(wolf) }).unwrap();
    sim.submit(player, Intent::UseSkill { index: 0 }).unwrap();
    sim.step();
    assert_eq!(state_of(&sim, player), EntityState::Casting);

    sim.submit(
        player,
        Intent::ReportPosition {
            position: Vec2::new(1.0, 0.0),
            look_direction: Vec2::X,
        },
    )
    .unwrap();
    sim.step();

    let entity = sim.arena().get(player).unwrap();
    assert_eq!(entity.state(), EntityState::Casting);
    assert_eq!(entity.position(), Vec2::ZERO);
    assert!(entity.skills.current().is_some());
}

#[test]
fn report_from_freshly_killed_player_is_rejected() {
    let mut sim = test_simulation(4, Zones::default());
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    sim.step();
    sim.arena_mut().get_mut(player).unwrap().set_health(0);
    assert_eq!(state_of(&sim, player), EntityState::Idle);

    sim.submit(
        player,
        Intent::ReportPosition {
            position: Vec2::new(0.5, 0.0),
            look_direction: Vec2::X,
        },
    )
    .unwrap();
    sim.step();

    let entity = sim.arena().get(player).unwrap();
    assert_eq!(entity.state(), EntityState::Dead);
    assert_eq!(entity.position(), Vec2::ZERO);
}

#[test]
fn hidden_monster_is_dropped_as_target() {
    let mut sim = test_simulation(4, Zones::default());
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    let wolf = sim.spawn_monster("Wolf", Vec2::new(2.0, 0.0)).unwrap();
    sim.submit(player, Intent::SetTarget { target: Some(wolf) }).unwrap();
    sim.step();
    assert_eq!(sim.arena().get(player).unwrap().target, Some(wolf));

    sim.arena_mut().get_mut(wolf).unwrap().hide();
    for _ in 0..5 {
        sim.step();
    }
    assert_eq!(sim.arena().get(player).unwrap().target, None);
}

#[test]
fn scenario_e_death_wins_over_everything() {
    let mut shard = TestShard::new(5);
    let mut player = player_entity(&shard, BaseStats::default());
    player.stun_end = 10.0;
    if let Some(p) = player.as_player_mut() {
        p.cancel_requested = true;
        p.requested_skill = Some(0);
    }
    player.set_health(0);
    let id = shard.arena.spawn(player);

    assert_eq!(update(&mut shard, id), EntityState::Dead);
}

#[test]
fn scenario_f_expired_buff_stops_contributing() {
    let mut sim = test_simulation(6, Zones::default());
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    let fortify = Arc::new(BuffTemplate {
        name: "Fortify".into(),
        duration: LinearFloat::constant(0.0),
        bonuses: BonusCurves {
            health: LinearInt::constant(50),
            ..BonusCurves::default()
        },
        remain_after_death: false,
    });

    let entity = sim.arena_mut().get_mut(player).unwrap();
    let base = entity.max_health();
    entity.buffs.add_or_refresh(Buff::with_end(fortify, 1, 0.0));
    assert_eq!(entity.max_health(), base + 50);

    sim.step();

    let entity = sim.arena().get(player).unwrap();
    assert!(entity.buffs.is_empty());
    assert_eq!(entity.max_health(), base);
    assert!(entity.health() <= entity.max_health());
}

// =============================================================================
// Full Flows
// =============================================================================

#[test]
fn player_kills_wolf_and_loots_gold() {
    let mut sim = test_simulation(7, Zones::default());
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    let wolf = sim.spawn_monster("Wolf", Vec2::new(2.0, 0.0)).unwrap();
    sim.submit(player, Intent::SetTarget { target: Some(wolf) }).unwrap();

    let mut died = false;
    let mut hits = 0;
    for _ in 0..900 {
        if state_of(&sim, player) == EntityState::Idle {
            sim.submit(player, Intent::UseSkill { index: 0 }).unwrap();
        }
        let broadcasts = sim.step();
        hits += from(&broadcasts, wolf)
            .iter()
            .filter(|n| matches!(n, Notification::DamageReceived { attacker, .. } if *attacker == player))
            .count();
        died |= from(&broadcasts, wolf)
            .iter()
            .any(|n| matches!(n, Notification::Died { killer: Some(k) } if *k == player));
        if died {
            break;
        }
    }
    assert!(died, "wolf survived after {hits} hits");
    assert!(hits >= 2);

    let hero = sim.arena().get(player).unwrap();
    let progress = hero.as_player().unwrap();
    assert!(progress.experience > 0 || hero.level > 1);
    assert!(progress.skill_experience > 0);

    let corpse_gold = sim.arena().get(wolf).unwrap().gold;
    assert!((1..=5).contains(&corpse_gold));
    let gold_before = sim.arena().get(player).unwrap().gold;
    sim.submit(player, Intent::LootGold { corpse: wolf }).unwrap();
    sim.step();
    assert_eq!(sim.arena().get(player).unwrap().gold, gold_before + corpse_gold);
    assert_eq!(sim.arena().get(wolf).unwrap().gold, 0);
}

#[test]
fn rejected_intent_informs_owner_only() {
    let mut sim = test_simulation(8, Zones::default());
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    sim.step();

    sim.submit(player, Intent::UseSkill { index: 9 }).unwrap();
    let broadcasts = sim.step();

    let info: Vec<&Broadcast> = broadcasts
        .iter()
        .filter(|b| matches!(b.notification(), Notification::Info { .. }))
        .collect();
    assert_eq!(info.len(), 1);
    assert_eq!(info[0].source(), player);
    assert_eq!(info[0].audience(), Audience::Owner);
    assert_eq!(state_of(&sim, player), EntityState::Idle);
}

#[test]
fn dead_player_respawns_at_nearest_spawn_point() {
    let zones = Zones {
        spawn_points: vec![Vec2::new(-50.0, -50.0), Vec2::new(10.0, 10.0)],
        ..Zones::default()
    };
    let mut sim = test_simulation(9, zones);
    let player = sim.create_player("Ayla", "Knight", Vec2::new(3.0, 3.0)).unwrap();
    sim.arena_mut().get_mut(player).unwrap().set_health(0);

    let broadcasts = sim.step();
    assert_eq!(state_of(&sim, player), EntityState::Dead);
    assert!(from(&broadcasts, player)
        .iter()
        .any(|n| matches!(n, Notification::Died { .. })));

    sim.submit(player, Intent::Respawn).unwrap();
    let broadcasts = sim.step();
    let entity = sim.arena().get(player).unwrap();
    assert_eq!(entity.state(), EntityState::Idle);
    assert_eq!(entity.position(), Vec2::new(10.0, 10.0));
    assert!(entity.is_alive());
    assert!(from(&broadcasts, player)
        .iter()
        .any(|n| matches!(n, Notification::Warped { position } if *position == Vec2::new(10.0, 10.0))));
}

#[test]
fn chosen_respawn_point_beats_spawn_points() {
    let zones = Zones {
        spawn_points: vec![Vec2::new(10.0, 10.0)],
        ..Zones::default()
    };
    let mut sim = test_simulation(9, zones);
    let player = sim.create_player("Ayla", "Knight", Vec2::new(-20.0, 5.0)).unwrap();
    sim.submit(player, Intent::SetRespawnPoint).unwrap();
    sim.step();

    sim.arena_mut().get_mut(player).unwrap().set_health(0);
    sim.step();
    sim.submit(player, Intent::Respawn).unwrap();
    sim.step();
    assert_eq!(sim.arena().get(player).unwrap().position(), Vec2::new(-20.0, 5.0));
}

#[test]
fn trade_through_intents() {
    let mut sim = test_simulation(10, Zones::default());
    let a = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    let b = sim.create_player("Brann", "Knight", Vec2::new(1.0, 0.0)).unwrap();

    sim.submit(a, Intent::TradeRequest { target: b }).unwrap();
    sim.submit(b, Intent::TradeRequest { target: a }).unwrap();
    sim.step();
    assert_eq!(state_of(&sim, a), EntityState::Trading);
    assert_eq!(state_of(&sim, b), EntityState::Trading);

    // slot 0 holds the class's starting potions
    sim.submit(a, Intent::TradeOffer { gold: 0, slots: vec![0] }).unwrap();
    sim.submit(b, Intent::TradeOffer { gold: 7, slots: vec![] }).unwrap();
    sim.submit(a, Intent::TradeLock).unwrap();
    sim.submit(b, Intent::TradeLock).unwrap();
    sim.step();
    sim.submit(a, Intent::TradeAccept).unwrap();
    sim.submit(b, Intent::TradeAccept).unwrap();
    let broadcasts = sim.step();

    assert!(from(&broadcasts, a)
        .iter()
        .any(|n| matches!(n, Notification::TradeCompleted { partner } if *partner == b)));
    sim.step();
    let ayla = sim.arena().get(a).unwrap();
    let brann = sim.arena().get(b).unwrap();
    assert_eq!(ayla.gold, 17);
    assert_eq!(brann.gold, 3);
    assert_eq!(ayla.inventory.count("Potion"), 0);
    assert_eq!(brann.inventory.count("Potion"), 4);
    assert_eq!(ayla.state(), EntityState::Idle);
    assert_eq!(brann.state(), EntityState::Idle);
}

#[test]
fn cooking_repeats_until_done() {
    let mut sim = test_simulation(11, Zones::default());
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    let meat = Item::new(Arc::clone(sim.catalog().item("Meat").unwrap()));
    sim.arena_mut().get_mut(player).unwrap().inventory.add(&meat, 4);

    sim.submit(
        player,
        Intent::StartActivity {
            recipe: "Stew".into(),
            repeat: 1,
        },
    )
    .unwrap();
    sim.step();
    assert_eq!(state_of(&sim, player), EntityState::Cooking);

    let mut finished = 0;
    for _ in 0..400 {
        finished += sim
            .step()
            .iter()
            .filter(|b| matches!(b.notification(), Notification::ActivityFinished { success: true, .. }))
            .count();
    }
    let entity = sim.arena().get(player).unwrap();
    assert_eq!(finished, 2);
    assert_eq!(entity.inventory.count("Meat"), 0);
    assert_eq!(entity.inventory.count("Stew"), 2);
    assert_eq!(entity.state(), EntityState::Idle);
}

#[test]
fn equip_from_inventory_and_back() {
    let mut sim = test_simulation(12, Zones::default());
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    let helmet = Item::new(Arc::clone(sim.catalog().item("Iron Helmet").unwrap()));
    let entity = sim.arena_mut().get_mut(player).unwrap();
    entity.inventory.add(&helmet, 1);
    let base = entity.max_health();
    let slot = slot_of(&entity.inventory, "Iron Helmet");

    sim.submit(player, Intent::Equip { slot }).unwrap();
    sim.step();
    assert_eq!(sim.arena().get(player).unwrap().max_health(), base + 20);

    sim.submit(
        player,
        Intent::Unequip {
            slot: EquipmentSlot::Head,
        },
    )
    .unwrap();
    sim.step();
    let entity = sim.arena().get(player).unwrap();
    assert_eq!(entity.max_health(), base);
    assert_eq!(entity.inventory.count("Iron Helmet"), 1);
}

#[test]
fn safe_zone_shields_players() {
    let zones = Zones {
        safe: vec![Rect::from_corners(Vec2::new(-5.0, -5.0), Vec2::new(5.0, 5.0))],
        ..Zones::default()
    };
    let mut sim = test_simulation(13, zones);
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    let wolf = sim.spawn_monster("Wolf", Vec2::new(6.0, 0.0)).unwrap();
    sim.arena_mut().get_mut(wolf).unwrap().target = Some(player);

    for _ in 0..5 {
        sim.step();
    }
    let entity = sim.arena().get(player).unwrap();
    assert_eq!(entity.health(), entity.max_health());
    assert!(entity.in_safe_zone);
    assert_eq!(state_of(&sim, wolf), EntityState::Dead);
}

#[test]
fn session_survives_json_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = JsonFileStore::open(dir.path()).unwrap();
    let mut sim = test_simulation(14, Zones::default()).with_store(Box::new(store));
    let player = sim.create_player("Ayla", "Knight", Vec2::new(4.0, 4.0)).unwrap();
    sim.arena_mut().get_mut(player).unwrap().gold = 250;
    sim.step();
    sim.logout(player).unwrap();
    assert!(sim.arena().is_empty());

    let store = JsonFileStore::open(dir.path()).unwrap();
    let mut fresh = test_simulation(15, Zones::default()).with_store(Box::new(store));
    let again = fresh.login("Ayla").unwrap();
    let entity = fresh.arena().get(again).unwrap();
    assert_eq!(entity.gold, 250);
    assert_eq!(entity.position(), Vec2::new(4.0, 4.0));
    assert_eq!(entity.inventory.count("Potion"), 2);
}

#[test]
fn summon_follows_owner_offline() {
    let mut sim = test_simulation(16, Zones::default());
    let player = sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
    let whistle = Item::new(Arc::clone(sim.catalog().item("Wolf Whistle").unwrap()));
    let entity = sim.arena_mut().get_mut(player).unwrap();
    entity.inventory.add(&whistle, 1);
    let slot = slot_of(&entity.inventory, "Wolf Whistle");

    sim.submit(player, Intent::UseItem { slot }).unwrap();
    sim.step();
    let summon = sim
        .arena()
        .get(player)
        .unwrap()
        .as_player()
        .unwrap()
        .summon
        .expect("summon spawned");
    assert_eq!(sim.arena().get(summon).unwrap().owner(), Some(player));

    sim.logout(player).unwrap();
    assert!(sim.arena().get(summon).is_none());
}
