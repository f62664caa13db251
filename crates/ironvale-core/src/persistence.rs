//! Character persistence.
//!
//! A [`CharacterRecord`] is the serializable snapshot of a player: progress,
//! pools, position, skills, buffs, inventory and equipment. Templates are
//! stored by name and resolved against the [`Catalog`] on login; anything
//! the catalog no longer knows is skipped with a warning so old saves keep
//! loading after content changes.
//!
//! Storage goes through the [`CharacterStore`] trait. [`MemoryStore`] keeps
//! records in memory, [`JsonFileStore`] writes one JSON file per character.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::catalog::Catalog;
use crate::config::SimConfig;
use crate::entity::Entity;
use crate::error::PersistenceError;
use crate::item::{EquipmentSlot, Item, ItemSlot};
use crate::movement::NavArea;
use crate::skill::Buff;

// =============================================================================
// Records
// =============================================================================

/// A stored item instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRecord {
    /// Item template name.
    pub name: String,
    /// Stack size.
    pub amount: u32,
    /// Remaining durability.
    #[serde(default)]
    pub durability: u32,
    /// Summoned companion level.
    #[serde(default)]
    pub summoned_level: u32,
    /// Summoned companion health.
    #[serde(default)]
    pub summoned_health: i32,
}

impl ItemRecord {
    fn capture(slot: &ItemSlot) -> Option<Self> {
        let item = slot.item.as_ref().filter(|_| slot.amount > 0)?;
        Some(Self {
            name: item.name().to_owned(),
            amount: slot.amount,
            durability: item.durability,
            summoned_level: item.summoned_level,
            summoned_health: item.summoned_health,
        })
    }

    fn restore(&self, catalog: &Catalog) -> Option<ItemSlot> {
        let template = match catalog.item(&self.name) {
            Ok(template) => template,
            Err(err) => {
                warn!(%err, "skipping stored item");
                return None;
            }
        };
        let mut item = Item::new(Arc::clone(template));
        item.durability = self.durability.min(template.max_durability());
        item.summoned_level = self.summoned_level.max(1);
        item.summoned_health = self.summoned_health;
        Some(ItemSlot::new(item, self.amount.min(template.max_stack.max(1))))
    }
}

/// A stored skill level and cooldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRecord {
    /// Skill template name.
    pub name: String,
    /// Learned level.
    pub level: u32,
    /// Seconds of cooldown left when saved.
    #[serde(default)]
    pub cooldown: f64,
}

/// A stored buff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffRecord {
    /// Buff template name.
    pub name: String,
    /// Buff level.
    pub level: u32,
    /// Seconds left when saved.
    pub remaining: f64,
}

/// Serializable snapshot of a player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterRecord {
    /// Unique character name.
    pub name: String,
    /// Class template name.
    pub class: String,
    /// Level.
    pub level: u32,
    /// Experience towards the next level.
    pub experience: u64,
    /// Unspent skill experience.
    pub skill_experience: u64,
    /// Gold.
    pub gold: u64,
    /// Current health.
    pub health: i32,
    /// Current mana.
    pub mana: i32,
    /// Position.
    pub position: Vec2,
    /// Chosen respawn point.
    #[serde(default)]
    pub respawn_point: Option<Vec2>,
    /// Points spent on strength.
    #[serde(default)]
    pub strength: u32,
    /// Points spent on intelligence.
    #[serde(default)]
    pub intelligence: u32,
    /// Unspent attribute points.
    #[serde(default)]
    pub free_points: u32,
    /// Skills by name.
    #[serde(default)]
    pub skills: Vec<SkillRecord>,
    /// Active buffs.
    #[serde(default)]
    pub buffs: Vec<BuffRecord>,
    /// Inventory slots in order, `None` for empty slots.
    #[serde(default)]
    pub inventory: Vec<Option<ItemRecord>>,
    /// Worn items by category.
    #[serde(default)]
    pub equipment: BTreeMap<EquipmentSlot, ItemRecord>,
}

impl CharacterRecord {
    /// Snapshots a player. Returns `None` for monsters and NPCs.
    #[must_use]
    pub fn capture(entity: &Entity, now: f64) -> Option<Self> {
        let player = entity.as_player()?;
        Some(Self {
            name: entity.name.clone(),
            class: player.class.clone(),
            level: entity.level,
            experience: player.experience,
            skill_experience: player.skill_experience,
            gold: entity.gold,
            health: entity.health(),
            mana: entity.mana(),
            position: entity.position(),
            respawn_point: player.respawn_point,
            strength: player.attributes.strength,
            intelligence: player.attributes.intelligence,
            free_points: player.attributes.free_points,
            skills: entity
                .skills
                .iter()
                .map(|skill| SkillRecord {
                    name: skill.name().to_owned(),
                    level: skill.level,
                    cooldown: skill.cooldown_remaining(now),
                })
                .collect(),
            buffs: entity
                .buffs
                .iter()
                .map(|buff| BuffRecord {
                    name: buff.name().to_owned(),
                    level: buff.level,
                    remaining: buff.remaining(now),
                })
                .collect(),
            inventory: entity.inventory.slots().iter().map(ItemRecord::capture).collect(),
            equipment: EquipmentSlot::ALL
                .into_iter()
                .filter_map(|slot| ItemRecord::capture(entity.equipment.get(slot)).map(|r| (slot, r)))
                .collect(),
        })
    }

    /// Builds a player from this record.
    ///
    /// The character starts from a fresh instance of its class, then the
    /// stored progress is applied on top. Unknown skills, buffs and items
    /// are skipped with a warning.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::Catalog`] if the class is unknown.
    pub fn restore(
        &self,
        catalog: &Catalog,
        nav: &Arc<NavArea>,
        config: &SimConfig,
        now: f64,
    ) -> Result<Entity, PersistenceError> {
        let mut entity = Entity::player(&self.name, &self.class, catalog, nav, config, self.position)?;
        entity.level = self.level.clamp(1, entity.max_level);
        entity.gold = self.gold;
        if let Some(player) = entity.as_player_mut() {
            player.experience = self.experience;
            player.skill_experience = self.skill_experience;
            player.respawn_point = self.respawn_point;
            player.attributes.strength = self.strength;
            player.attributes.intelligence = self.intelligence;
            player.attributes.free_points = self.free_points;
        }

        for stored in &self.skills {
            let Some(index) = entity.skills.index_of(&stored.name) else {
                warn!(player = %self.name, skill = %stored.name, "skipping stored skill");
                continue;
            };
            if let Some(skill) = entity.skills.get_mut(index) {
                skill.level = stored.level.min(skill.template().max_level);
                skill.cooldown_end = now + stored.cooldown.max(0.0);
            }
        }

        for stored in &self.buffs {
            match catalog.buff(&stored.name) {
                Ok(template) => entity.buffs.add_or_refresh(Buff::with_end(
                    Arc::clone(template),
                    stored.level,
                    now + stored.remaining.max(0.0),
                )),
                Err(err) => warn!(player = %self.name, %err, "skipping stored buff"),
            }
        }

        // inventory size comes from the class, not the save
        let dropped = self
            .inventory
            .iter()
            .skip(entity.inventory.slots().len())
            .filter(|stored| stored.is_some())
            .count();
        if dropped > 0 {
            warn!(player = %self.name, dropped, "stored items beyond inventory size");
        }
        for (index, stored) in self.inventory.iter().enumerate() {
            let restored = stored
                .as_ref()
                .and_then(|record| record.restore(catalog))
                .unwrap_or_default();
            if let Some(slot) = entity.inventory.slot_mut(index) {
                *slot = restored;
            }
        }
        for slot in EquipmentSlot::ALL {
            *entity.equipment.get_mut(slot) = self
                .equipment
                .get(&slot)
                .and_then(|record| record.restore(catalog))
                .filter(|restored| {
                    restored
                        .item
                        .as_ref()
                        .and_then(|item| item.template().equipment_slot())
                        == Some(slot)
                })
                .unwrap_or_default();
        }

        entity.set_health(self.health);
        entity.set_mana(self.mana);
        entity.mark_all_dirty();
        debug!(player = %self.name, level = entity.level, "character restored");
        Ok(entity)
    }
}

// =============================================================================
// Stores
// =============================================================================

/// Where characters are saved.
pub trait CharacterStore: Send {
    /// Loads a character by name. `Ok(None)` if it was never saved.
    ///
    /// # Errors
    ///
    /// Storage or decoding failure.
    fn load(&self, name: &str) -> Result<Option<CharacterRecord>, PersistenceError>;

    /// Saves a character, replacing any previous record.
    ///
    /// # Errors
    ///
    /// Storage or encoding failure.
    fn save(&mut self, record: &CharacterRecord) -> Result<(), PersistenceError>;
}

/// In-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: BTreeMap<String, CharacterRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored characters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing was saved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl CharacterStore for MemoryStore {
    fn load(&self, name: &str) -> Result<Option<CharacterRecord>, PersistenceError> {
        Ok(self.records.get(name).cloned())
    }

    fn save(&mut self, record: &CharacterRecord) -> Result<(), PersistenceError> {
        self.records.insert(record.name.clone(), record.clone());
        Ok(())
    }
}

/// One pretty-printed JSON file per character, named `<name>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    directory: PathBuf,
}

impl JsonFileStore {
    /// Opens a store in `directory`, creating it if needed.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::Io`] if the directory cannot be created.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    /// The store's directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path(&self, name: &str) -> Result<PathBuf, PersistenceError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(PersistenceError::InvalidName(name.to_owned()));
        }
        Ok(self.directory.join(format!("{name}.json")))
    }
}

impl CharacterStore for JsonFileStore {
    fn load(&self, name: &str) -> Result<Option<CharacterRecord>, PersistenceError> {
        let path = self.path(name)?;
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Writes to a temporary file first and renames it over the old record,
    /// so a crash never leaves a truncated save behind.
    fn save(&mut self, record: &CharacterRecord) -> Result<(), PersistenceError> {
        let path = self.path(&record.name)?;
        let json = serde_json::to_string_pretty(record)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
