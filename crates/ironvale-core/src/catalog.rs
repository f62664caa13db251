//! Template registry.
//!
//! The catalog replaces global template dictionaries: it is built once per
//! process, validated, wrapped in an `Arc` and handed to every shard. All
//! lookups go through it, so an unknown name is an explicit
//! [`CatalogError`] instead of a null reference.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::activity::RecipeTemplate;
use crate::error::{CatalogError, ConfigError};
use crate::item::{ItemKind, ItemTemplate};
use crate::loot::LootTable;
use crate::skill::{BuffTemplate, SkillEffect, SkillTemplate};
use crate::stats::{BaseStats, ExponentialInt, LinearInt};

/// Static definition of a monster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    /// Unique name.
    pub name: String,
    /// Spawn level.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Base stat curves.
    #[serde(default)]
    pub stats: BaseStats,
    /// Skill names, all learned at level 1. The first one is the default
    /// attack.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Drops on death.
    #[serde(default)]
    pub loot: LootTable,
    /// Experience rewarded to the killer, per monster level.
    #[serde(default)]
    pub reward_experience: LinearInt,
    /// Skill experience rewarded to the killer, per monster level.
    #[serde(default)]
    pub reward_skill_experience: LinearInt,
    /// Give up on targets further than this from home.
    #[serde(default = "default_follow_distance")]
    pub follow_distance: f32,
    /// Random walk radius around home.
    #[serde(default = "default_move_distance")]
    pub move_distance: f32,
    /// Random walk chance per second.
    #[serde(default = "default_move_probability")]
    pub move_probability: f32,
    /// Seconds the corpse stays visible.
    #[serde(default = "default_death_time")]
    pub death_time: f64,
    /// Seconds from hiding the corpse to respawning.
    #[serde(default = "default_respawn_time")]
    pub respawn_time: f64,
    /// Respawn at home after death. Otherwise the monster is despawned.
    #[serde(default = "default_true")]
    pub respawn: bool,
}

fn default_level() -> u32 {
    1
}

fn default_follow_distance() -> f32 {
    20.0
}

fn default_move_distance() -> f32 {
    10.0
}

fn default_move_probability() -> f32 {
    0.1
}

fn default_death_time() -> f64 {
    30.0
}

fn default_respawn_time() -> f64 {
    10.0
}

fn default_true() -> bool {
    true
}

/// A starting item stack for a class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemGrant {
    /// Item template name.
    pub item: String,
    /// Stack size.
    #[serde(default = "default_grant_amount")]
    pub amount: u32,
}

fn default_grant_amount() -> u32 {
    1
}

/// Static definition of a player class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassTemplate {
    /// Unique name.
    pub name: String,
    /// Base stat curves.
    #[serde(default)]
    pub stats: BaseStats,
    /// Skills the class can learn, in hotbar order.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Experience needed per level.
    #[serde(default)]
    pub experience_curve: ExponentialInt,
    /// Level cap.
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    /// Number of inventory slots.
    #[serde(default = "default_inventory_size")]
    pub inventory_size: usize,
    /// Items in a new character's inventory.
    #[serde(default)]
    pub start_items: Vec<ItemGrant>,
    /// Items worn by a new character.
    #[serde(default)]
    pub start_equipment: Vec<String>,
    /// Gold of a new character.
    #[serde(default)]
    pub start_gold: u64,
}

fn default_max_level() -> u32 {
    60
}

fn default_inventory_size() -> usize {
    30
}

/// On-disk layout of a catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogFile {
    /// Item templates.
    pub items: Vec<ItemTemplate>,
    /// Skill templates.
    pub skills: Vec<SkillTemplate>,
    /// Buff templates.
    pub buffs: Vec<BuffTemplate>,
    /// Monster templates.
    pub monsters: Vec<MonsterTemplate>,
    /// Player classes.
    pub classes: Vec<ClassTemplate>,
    /// Activity recipes.
    pub recipes: Vec<RecipeTemplate>,
}

/// Registry of every template a shard can reference, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: BTreeMap<String, Arc<ItemTemplate>>,
    skills: BTreeMap<String, Arc<SkillTemplate>>,
    buffs: BTreeMap<String, Arc<BuffTemplate>>,
    monsters: BTreeMap<String, Arc<MonsterTemplate>>,
    classes: BTreeMap<String, Arc<ClassTemplate>>,
    recipes: BTreeMap<String, Arc<RecipeTemplate>>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a catalog.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Catalog`] for the first dangling reference.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let catalog = Self::from_file(file);
        catalog.validate()?;
        Ok(catalog)
    }

    /// Builds a catalog without validating references.
    #[must_use]
    pub fn from_file(file: CatalogFile) -> Self {
        let mut catalog = Self::new();
        for item in file.items {
            catalog.insert_item(item);
        }
        for skill in file.skills {
            catalog.insert_skill(skill);
        }
        for buff in file.buffs {
            catalog.insert_buff(buff);
        }
        for monster in file.monsters {
            catalog.insert_monster(monster);
        }
        for class in file.classes {
            catalog.insert_class(class);
        }
        for recipe in file.recipes {
            catalog.insert_recipe(recipe);
        }
        catalog
    }

    /// Adds or replaces an item template.
    pub fn insert_item(&mut self, template: ItemTemplate) -> Arc<ItemTemplate> {
        let template = Arc::new(template);
        self.items.insert(template.name.clone(), Arc::clone(&template));
        template
    }

    /// Adds or replaces a skill template.
    pub fn insert_skill(&mut self, template: SkillTemplate) -> Arc<SkillTemplate> {
        let template = Arc::new(template);
        self.skills.insert(template.name.clone(), Arc::clone(&template));
        template
    }

    /// Adds or replaces a buff template.
    pub fn insert_buff(&mut self, template: BuffTemplate) -> Arc<BuffTemplate> {
        let template = Arc::new(template);
        self.buffs.insert(template.name.clone(), Arc::clone(&template));
        template
    }

    /// Adds or replaces a monster template.
    pub fn insert_monster(&mut self, template: MonsterTemplate) -> Arc<MonsterTemplate> {
        let template = Arc::new(template);
        self.monsters
            .insert(template.name.clone(), Arc::clone(&template));
        template
    }

    /// Adds or replaces a class template.
    pub fn insert_class(&mut self, template: ClassTemplate) -> Arc<ClassTemplate> {
        let template = Arc::new(template);
        self.classes
            .insert(template.name.clone(), Arc::clone(&template));
        template
    }

    /// Adds or replaces a recipe.
    pub fn insert_recipe(&mut self, template: RecipeTemplate) -> Arc<RecipeTemplate> {
        let template = Arc::new(template);
        self.recipes
            .insert(template.name.clone(), Arc::clone(&template));
        template
    }

    /// Looks up an item template.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownItem`] if no template has this name.
    pub fn item(&self, name: &str) -> Result<&Arc<ItemTemplate>, CatalogError> {
        self.items
            .get(name)
            .ok_or_else(|| CatalogError::UnknownItem(name.to_string()))
    }

    /// Looks up a skill template.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownSkill`] if no template has this name.
    pub fn skill(&self, name: &str) -> Result<&Arc<SkillTemplate>, CatalogError> {
        self.skills
            .get(name)
            .ok_or_else(|| CatalogError::UnknownSkill(name.to_string()))
    }

    /// Looks up a buff template.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownBuff`] if no template has this name.
    pub fn buff(&self, name: &str) -> Result<&Arc<BuffTemplate>, CatalogError> {
        self.buffs
            .get(name)
            .ok_or_else(|| CatalogError::UnknownBuff(name.to_string()))
    }

    /// Looks up a monster template.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownMonster`] if no template has this name.
    pub fn monster(&self, name: &str) -> Result<&Arc<MonsterTemplate>, CatalogError> {
        self.monsters
            .get(name)
            .ok_or_else(|| CatalogError::UnknownMonster(name.to_string()))
    }

    /// Looks up a class template.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownClass`] if no template has this name.
    pub fn class(&self, name: &str) -> Result<&Arc<ClassTemplate>, CatalogError> {
        self.classes
            .get(name)
            .ok_or_else(|| CatalogError::UnknownClass(name.to_string()))
    }

    /// Looks up a recipe.
    ///
    /// # Errors
    ///
    /// [`CatalogError::UnknownRecipe`] if no recipe has this name.
    pub fn recipe(&self, name: &str) -> Result<&Arc<RecipeTemplate>, CatalogError> {
        self.recipes
            .get(name)
            .ok_or_else(|| CatalogError::UnknownRecipe(name.to_string()))
    }

    /// Checks that every name referenced by a template resolves.
    ///
    /// # Errors
    ///
    /// Returns the first dangling reference, visiting templates in name
    /// order.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for item in self.items.values() {
            match &item.kind {
                ItemKind::Equipment {
                    damaged_version: Some(name),
                    ..
                } => {
                    self.item(name)?;
                }
                ItemKind::Summon { monster } => {
                    self.monster(monster)?;
                }
                _ => {}
            }
        }
        for skill in self.skills.values() {
            match &skill.effect {
                SkillEffect::TargetBuff { buff } | SkillEffect::AreaBuff { buff, .. } => {
                    self.buff(buff)?;
                }
                SkillEffect::Summon { monster } => {
                    self.monster(monster)?;
                }
                _ => {}
            }
            if let Some(required) = &skill.requires_item {
                self.item(&required.item)?;
            }
            if let Some(trained) = &skill.trains {
                self.skill(trained)?;
            }
        }
        for monster in self.monsters.values() {
            for skill in &monster.skills {
                self.skill(skill)?;
            }
            for drop in &monster.loot.drops {
                self.item(&drop.item)?;
            }
        }
        for class in self.classes.values() {
            for skill in &class.skills {
                self.skill(skill)?;
            }
            for grant in &class.start_items {
                self.item(&grant.item)?;
            }
            for item in &class.start_equipment {
                self.item(item)?;
            }
        }
        for recipe in self.recipes.values() {
            for ingredient in &recipe.ingredients {
                self.item(&ingredient.item)?;
            }
            self.item(&recipe.result)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "items": [
            { "name": "Bone", "max_stack": 50, "kind": { "type": "material" } }
        ],
        "buffs": [
            { "name": "Haste", "duration": { "base": 10.0 } }
        ],
        "skills": [
            {
                "name": "Bite",
                "cast_range": { "base": 2.0 },
                "effect": { "type": "target_damage", "damage": { "base": 5 } }
            },
            {
                "name": "Rush",
                "effect": { "type": "target_buff", "buff": "Haste" }
            }
        ],
        "monsters": [
            {
                "name": "Wolf",
                "skills": ["Bite"],
                "loot": { "drops": [ { "item": "Bone", "probability": 0.5 } ] }
            }
        ]
    }"#;

    #[test]
    fn parses_and_resolves() {
        let catalog = Catalog::from_json_str(CATALOG).unwrap();
        let wolf = catalog.monster("Wolf").unwrap();
        assert_eq!(wolf.level, 1);
        assert!((wolf.follow_distance - 20.0).abs() < f32::EPSILON);
        assert!(wolf.respawn);
        assert_eq!(catalog.item("Bone").unwrap().max_stack, 50);
        assert!(catalog.skill("Rush").is_ok());
    }

    #[test]
    fn unknown_lookup_is_an_error() {
        let catalog = Catalog::new();
        assert_eq!(
            catalog.recipe("Stew").unwrap_err(),
            CatalogError::UnknownRecipe("Stew".into())
        );
    }

    #[test]
    fn dangling_buff_reference_is_rejected() {
        let json = r#"{
            "skills": [
                { "name": "Rush", "effect": { "type": "target_buff", "buff": "Haste" } }
            ]
        }"#;
        let err = Catalog::from_json_str(json).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Catalog(CatalogError::UnknownBuff(ref name)) if name == "Haste"
        ));
    }

    #[test]
    fn insert_replaces_by_name() {
        let mut catalog = Catalog::new();
        catalog.insert_item(ItemTemplate {
            name: "Bone".into(),
            max_stack: 1,
            kind: ItemKind::Material,
        });
        catalog.insert_item(ItemTemplate {
            name: "Bone".into(),
            max_stack: 9,
            kind: ItemKind::Material,
        });
        assert_eq!(catalog.item("Bone").unwrap().max_stack, 9);
    }
}
