//! Test helper functions for setting up shards and entities.
//!
//! [`TestShard`] owns every piece a [`TickContext`] borrows, so unit tests
//! can drive a single entity update or intent without a full
//! [`Simulation`](crate::simulation::Simulation).

use std::sync::Arc;

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::arena::Arena;
use crate::catalog::Catalog;
use crate::config::SimConfig;
use crate::context::TickContext;
use crate::entity::{Entity, EntityInner, MonsterComponents, PlayerComponents};
use crate::item::Inventory;
use crate::loot::{LootTable, RecordingSpawner};
use crate::movement::{Locomotion, NavArea, PathAgent, RubberbandAgent, Transform};
use crate::output::Outbox;
use crate::schedule::Scheduler;
use crate::simulation::Simulation;
use crate::skill::{Skill, SkillEffect, SkillTemplate};
use crate::stats::{BaseStats, ExponentialInt, LinearFloat, LinearInt};
use crate::zone::{Rect, Zones};

// =============================================================================
// Shard Setup
// =============================================================================

/// Everything a tick context borrows, owned by the test.
pub struct TestShard {
    pub config: SimConfig,
    pub catalog: Catalog,
    pub zones: Zones,
    pub nav: Arc<NavArea>,
    pub arena: Arena,
    pub rng: ChaCha8Rng,
    pub scheduler: Scheduler,
    pub spawner: RecordingSpawner,
    pub outbox: Outbox,
    pub now: f64,
    pub dt: f32,
    pub tick: u64,
}

impl TestShard {
    /// Creates a shard on the open test area with the sample catalog.
    pub fn new(seed: u64) -> Self {
        let config = SimConfig::default();
        Self {
            dt: config.tick_interval(),
            config,
            catalog: sample_catalog(),
            zones: Zones::default(),
            nav: test_nav(),
            arena: Arena::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            scheduler: Scheduler::new(),
            spawner: RecordingSpawner::default(),
            outbox: Outbox::new(),
            now: 0.0,
            tick: 0,
        }
    }

    /// Runs `f` with a context borrowing this shard.
    pub fn with_ctx<R>(&mut self, f: impl FnOnce(&mut TickContext<'_>) -> R) -> R {
        let mut ctx = TickContext {
            now: self.now,
            dt: self.dt,
            tick: self.tick,
            config: &self.config,
            catalog: &self.catalog,
            zones: &self.zones,
            nav: &self.nav,
            arena: &mut self.arena,
            rng: &mut self.rng,
            scheduler: &mut self.scheduler,
            spawner: &mut self.spawner,
            outbox: &mut self.outbox,
        };
        f(&mut ctx)
    }
}

/// Open walkable square from (-100, -100) to (100, 100).
pub fn test_nav() -> Arc<NavArea> {
    Arc::new(NavArea::open(Rect::from_corners(
        Vec2::splat(-100.0),
        Vec2::splat(100.0),
    )))
}

/// Creates a full simulation over the sample catalog.
pub fn test_simulation(seed: u64, zones: Zones) -> Simulation {
    Simulation::new(
        seed,
        SimConfig::default(),
        Arc::new(sample_catalog()),
        zones,
        test_nav(),
    )
}

// =============================================================================
// Entity Factories
// =============================================================================

/// A level-1 player at the origin without skills or equipment.
pub fn player_entity(shard: &TestShard, base: BaseStats) -> Entity {
    let mut components = PlayerComponents::new(
        "Knight",
        ExponentialInt {
            multiplier: 100.0,
            base: 2.0,
        },
    );
    components.attributes.health_per_point = shard.config.health_per_strength;
    components.attributes.mana_per_point = shard.config.mana_per_intelligence;

    let movement = Locomotion::Rubberband(RubberbandAgent::new(
        Arc::clone(&shard.nav),
        base.speed.get(1),
        shard.config.rubberband_send_interval,
        shard.config.rubberband_tolerance_factor,
    ));
    let mut entity = Entity::new(
        "Hero",
        Transform::at(Vec2::ZERO),
        base,
        1,
        movement,
        EntityInner::Player(components),
    );
    entity.max_level = 10;
    entity.inventory = Inventory::new(8);
    entity
}

/// A wild level-1 monster at home on the origin.
pub fn monster_entity(shard: &TestShard, base: BaseStats) -> Entity {
    let components = MonsterComponents {
        template: "Wolf".into(),
        home: Vec2::ZERO,
        owner: None,
        follow_distance: 20.0,
        move_distance: 5.0,
        move_probability: 0.0,
        death_time: 30.0,
        respawn_time: 10.0,
        respawn: true,
        death_end: 0.0,
        respawn_end: 0.0,
        loot: LootTable::default(),
        reward_experience: 0,
        reward_skill_experience: 0,
        last_skill: None,
        requested_skill: None,
        despawn_scheduled: false,
    };
    let movement = Locomotion::Path(PathAgent::new(
        Arc::clone(&shard.nav),
        base.speed.get(1),
        shard.config.max_path_iterations,
    ));
    Entity::new(
        "Wolf",
        Transform::at(Vec2::ZERO),
        base,
        1,
        movement,
        EntityInner::Monster(components),
    )
}

/// An instant melee attack learned at level 1.
pub fn punch() -> Skill {
    let template = SkillTemplate {
        cast_range: LinearFloat::constant(2.0),
        ..SkillTemplate::new(
            "Punch",
            SkillEffect::TargetDamage {
                damage: LinearInt::constant(5),
                stun_chance: LinearFloat::constant(0.0),
                stun_time: LinearFloat::constant(0.0),
            },
        )
    };
    Skill::new(Arc::new(template), 1)
}

// =============================================================================
// Catalog
// =============================================================================

const SAMPLE_CATALOG: &str = r#"{
    "items": [
        { "name": "Bone", "max_stack": 50, "kind": { "type": "material" } },
        { "name": "Meat", "max_stack": 20, "kind": { "type": "material" } },
        { "name": "Stew", "max_stack": 20, "kind": { "type": "consumable", "health": 40 } },
        { "name": "Potion", "max_stack": 10, "kind": { "type": "consumable", "health": 30 } },
        {
            "name": "Wooden Sword",
            "max_stack": 1,
            "kind": {
                "type": "equipment",
                "slot": "Weapon",
                "bonuses": { "damage": 3 },
                "max_durability": 50
            }
        },
        {
            "name": "Iron Helmet",
            "max_stack": 1,
            "kind": {
                "type": "equipment",
                "slot": "Head",
                "bonuses": { "health": 20, "defense": 2 },
                "max_durability": 80
            }
        },
        { "name": "Wolf Whistle", "max_stack": 1, "kind": { "type": "summon", "monster": "Wolf" } }
    ],
    "buffs": [
        { "name": "Haste", "duration": { "base": 10.0 }, "bonuses": { "speed": { "base": 2.0 } } }
    ],
    "skills": [
        {
            "name": "Slash",
            "cast_time": { "base": 0.5 },
            "cooldown": { "base": 1.0 },
            "cast_range": { "base": 3.0 },
            "learn_default": true,
            "effect": { "type": "target_damage", "damage": { "base": 12, "per_level": 3 } }
        },
        {
            "name": "Sprint",
            "cooldown": { "base": 20.0 },
            "mana_cost": { "base": 10 },
            "max_level": 3,
            "required_level": { "base": 1, "per_level": 2 },
            "required_skill_experience": { "base": 5, "per_level": 5 },
            "effect": { "type": "target_buff", "buff": "Haste" }
        },
        {
            "name": "Bite",
            "cast_time": { "base": 0.5 },
            "cooldown": { "base": 1.5 },
            "cast_range": { "base": 2.0 },
            "effect": { "type": "target_damage", "damage": { "base": 4, "per_level": 1 } }
        }
    ],
    "monsters": [
        {
            "name": "Wolf",
            "skills": ["Bite"],
            "stats": {
                "health": { "base": 60, "per_level": 10 },
                "damage": { "base": 4, "per_level": 1 },
                "speed": { "base": 4.0 }
            },
            "loot": {
                "gold_min": 1,
                "gold_max": 5,
                "drops": [ { "item": "Bone", "probability": 0.5 }, { "item": "Meat", "probability": 0.8 } ]
            },
            "reward_experience": { "base": 25, "per_level": 5 },
            "reward_skill_experience": { "base": 5 },
            "move_probability": 0.0
        }
    ],
    "classes": [
        {
            "name": "Knight",
            "stats": {
                "health": { "base": 150, "per_level": 15 },
                "mana": { "base": 40, "per_level": 4 },
                "damage": { "base": 8, "per_level": 2 },
                "defense": { "base": 3, "per_level": 1 },
                "speed": { "base": 5.0 }
            },
            "skills": ["Slash", "Sprint"],
            "experience_curve": { "multiplier": 100.0, "base": 1.5 },
            "max_level": 20,
            "inventory_size": 8,
            "start_items": [ { "item": "Potion", "amount": 2 } ],
            "start_equipment": ["Wooden Sword"],
            "start_gold": 10
        }
    ],
    "recipes": [
        {
            "name": "Stew",
            "kind": "Cooking",
            "ingredients": [ { "item": "Meat", "amount": 2 } ],
            "result": "Stew",
            "duration": 3.0
        }
    ]
}"#;

/// A small catalog with one class, one monster and a cooking recipe.
pub fn sample_catalog() -> Catalog {
    Catalog::from_json_str(SAMPLE_CATALOG).unwrap()
}
