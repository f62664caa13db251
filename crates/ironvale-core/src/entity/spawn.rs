//! Building entities from catalog templates.

use std::sync::Arc;

use glam::Vec2;
use tracing::warn;

use super::{Entity, EntityId, EntityInner, MonsterComponents, PlayerComponents};
use crate::catalog::{Catalog, MonsterTemplate};
use crate::config::SimConfig;
use crate::error::CatalogError;
use crate::item::{Inventory, Item};
use crate::movement::{Locomotion, NavArea, PathAgent, RubberbandAgent, Transform};
use crate::skill::{Skill, Skills};
use crate::stats::BaseStats;

impl Entity {
    /// Creates a fresh level-1 character of class `class`.
    ///
    /// Start items that do not fit into the inventory and start equipment
    /// that cannot be worn are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the class or one of its skills or items
    /// is unknown.
    pub fn player(
        name: impl Into<String>,
        class: &str,
        catalog: &Catalog,
        nav: &Arc<NavArea>,
        config: &SimConfig,
        position: Vec2,
    ) -> Result<Self, CatalogError> {
        let template = Arc::clone(catalog.class(class)?);

        let mut skills = Vec::with_capacity(template.skills.len());
        for skill_name in &template.skills {
            let skill = catalog.skill(skill_name)?;
            let level = u32::from(skill.learn_default);
            skills.push(Skill::new(Arc::clone(skill), level));
        }

        let mut components = PlayerComponents::new(&template.name, template.experience_curve);
        components.attributes.health_per_point = config.health_per_strength;
        components.attributes.mana_per_point = config.mana_per_intelligence;

        let movement = Locomotion::Rubberband(RubberbandAgent::new(
            Arc::clone(nav),
            template.stats.speed.get(1),
            config.rubberband_send_interval,
            config.rubberband_tolerance_factor,
        ));
        let mut entity = Self::new(
            name,
            Transform::at(position),
            template.stats,
            1,
            movement,
            EntityInner::Player(components),
        );
        entity.max_level = template.max_level.max(1);
        entity.gold = template.start_gold;
        entity.skills = Skills::new(skills);
        entity.inventory = Inventory::new(template.inventory_size);

        for grant in &template.start_items {
            let item = Item::new(Arc::clone(catalog.item(&grant.item)?));
            if !entity.inventory.add(&item, grant.amount) {
                warn!(player = %entity.name, item = %grant.item, "start item does not fit");
            }
        }
        for item_name in &template.start_equipment {
            let item = Item::new(Arc::clone(catalog.item(item_name)?));
            if let Err(item) = entity.equipment.equip(item) {
                warn!(player = %entity.name, item = %item.name(), "start equipment is not wearable");
            }
        }
        entity.revive(1.0);
        Ok(entity)
    }

    /// Creates a wild monster from `template` with `position` as home.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if one of the monster's skills is unknown.
    pub fn monster(
        template: &MonsterTemplate,
        catalog: &Catalog,
        nav: &Arc<NavArea>,
        config: &SimConfig,
        position: Vec2,
    ) -> Result<Self, CatalogError> {
        let level = template.level.max(1);
        let mut skills = Vec::with_capacity(template.skills.len());
        for skill_name in &template.skills {
            skills.push(Skill::new(Arc::clone(catalog.skill(skill_name)?), 1));
        }

        let components = MonsterComponents {
            template: template.name.clone(),
            home: position,
            owner: None,
            follow_distance: template.follow_distance,
            move_distance: template.move_distance,
            move_probability: template.move_probability,
            death_time: template.death_time,
            respawn_time: template.respawn_time,
            respawn: template.respawn,
            death_end: 0.0,
            respawn_end: 0.0,
            loot: template.loot.clone(),
            reward_experience: non_negative(template.reward_experience.get(level)),
            reward_skill_experience: non_negative(template.reward_skill_experience.get(level)),
            last_skill: None,
            requested_skill: None,
            despawn_scheduled: false,
        };
        let movement = Locomotion::Path(PathAgent::new(
            Arc::clone(nav),
            template.stats.speed.get(level),
            config.max_path_iterations,
        ));
        let mut entity = Self::new(
            &template.name,
            Transform::at(position),
            template.stats,
            level,
            movement,
            EntityInner::Monster(components),
        );
        entity.max_level = level;
        entity.skills = Skills::new(skills);
        Ok(entity)
    }

    /// Creates a companion owned by `owner`. Summons never respawn and
    /// carry no loot.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if one of the monster's skills is unknown.
    pub fn summon(
        template: &MonsterTemplate,
        owner: EntityId,
        level: u32,
        catalog: &Catalog,
        nav: &Arc<NavArea>,
        config: &SimConfig,
        position: Vec2,
    ) -> Result<Self, CatalogError> {
        let mut entity = Self::monster(template, catalog, nav, config, position)?;
        entity.level = level.max(1);
        entity.max_level = entity.level;
        if let Some(monster) = entity.as_monster_mut() {
            monster.owner = Some(owner);
            monster.respawn = false;
            monster.move_probability = 0.0;
            monster.loot = crate::loot::LootTable::default();
            monster.reward_experience = 0;
            monster.reward_skill_experience = 0;
        }
        entity.revive(1.0);
        Ok(entity)
    }

    /// Creates a stationary NPC.
    #[must_use]
    pub fn npc(name: impl Into<String>, base: BaseStats, nav: &Arc<NavArea>, position: Vec2) -> Self {
        let movement = Locomotion::Path(PathAgent::new(Arc::clone(nav), 0.0, 0));
        Self::new(
            name,
            Transform::at(position),
            base,
            1,
            movement,
            EntityInner::Npc,
        )
    }
}

fn non_negative(value: i32) -> u64 {
    u64::try_from(value).unwrap_or(0)
}
