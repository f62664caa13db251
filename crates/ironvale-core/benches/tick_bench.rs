use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::Vec2;
use ironvale_core::catalog::Catalog;
use ironvale_core::config::SimConfig;
use ironvale_core::intent::Intent;
use ironvale_core::movement::NavArea;
use ironvale_core::simulation::{Simulation, World};
use ironvale_core::zone::{Rect, Zones};

const CATALOG: &str = r#"{
    "items": [
        { "name": "Bone", "max_stack": 50, "kind": { "type": "material" } }
    ],
    "skills": [
        {
            "name": "Slash",
            "cast_time": { "base": 0.5 },
            "cooldown": { "base": 1.0 },
            "cast_range": { "base": 3.0 },
            "learn_default": true,
            "effect": { "type": "target_damage", "damage": { "base": 12 } }
        },
        {
            "name": "Bite",
            "cast_time": { "base": 0.5 },
            "cooldown": { "base": 1.5 },
            "cast_range": { "base": 2.0 },
            "effect": { "type": "target_damage", "damage": { "base": 4 } }
        }
    ],
    "monsters": [
        {
            "name": "Wolf",
            "skills": ["Bite"],
            "loot": { "gold_min": 1, "gold_max": 5, "drops": [ { "item": "Bone", "probability": 0.5 } ] },
            "death_time": 2.0,
            "respawn_time": 2.0
        }
    ],
    "classes": [
        { "name": "Knight", "skills": ["Slash"] }
    ]
}"#;

/// A shard with `players` players, each surrounded by four wolves.
fn populated_shard(seed: u64, players: usize) -> Simulation {
    let catalog = Arc::new(Catalog::from_json_str(CATALOG).unwrap());
    let nav = Arc::new(NavArea::open(Rect::from_corners(
        Vec2::splat(-500.0),
        Vec2::splat(500.0),
    )));
    let mut sim = Simulation::new(seed, SimConfig::default(), catalog, Zones::default(), nav);

    for i in 0..players {
        // grid positions, exact for small counts
        #[allow(clippy::cast_precision_loss)]
        let center = Vec2::new((i % 10) as f32 * 60.0 - 270.0, (i / 10) as f32 * 60.0 - 270.0);
        let player = sim
            .create_player(&format!("Player{i}"), "Knight", center)
            .unwrap();
        let mut first = None;
        for offset in [Vec2::X, Vec2::NEG_X, Vec2::Y, Vec2::NEG_Y] {
            let wolf = sim.spawn_monster("Wolf", center + offset * 8.0).unwrap();
            first.get_or_insert(wolf);
        }
        sim.submit(player, Intent::SetTarget { target: first }).unwrap();
    }
    sim
}

fn bench_shard_tick(c: &mut Criterion) {
    let mut sim = populated_shard(42, 50);
    let players: Vec<_> = sim
        .arena()
        .entities_sorted()
        .filter(|e| e.is_player())
        .map(|e| e.id())
        .collect();

    c.bench_function("shard_tick_50_players", |b| {
        b.iter(|| {
            for id in &players {
                let _ = sim.submit(*id, Intent::UseSkill { index: 0 });
            }
            black_box(sim.step())
        })
    });
}

fn bench_idle_shard(c: &mut Criterion) {
    let mut sim = populated_shard(7, 10);
    // let the wolves settle
    for _ in 0..30 {
        sim.step();
    }

    c.bench_function("shard_tick_idle", |b| b.iter(|| black_box(sim.step())));
}

fn bench_world_step(c: &mut Criterion) {
    let mut world = World::new();
    for seed in 0..8 {
        world.add_shard(populated_shard(seed, 20));
    }

    c.bench_function("world_step_8_shards", |b| b.iter(|| black_box(world.step())));
}

criterion_group!(benches, bench_shard_tick, bench_idle_shard, bench_world_step);
criterion_main!(benches);
