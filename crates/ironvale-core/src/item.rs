//! Items, inventory and equipment.
//!
//! An [`Item`] is a dynamic instance of an [`ItemTemplate`]: it holds a
//! shared handle to the template plus the fields that differ per instance
//! (durability, summon sub-state). Two items are equal only if the template
//! hash and every dynamic field match, so a worn sword never stacks with a
//! fresh one.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::stats::{total_float, total_int, BonusSource, StatBonuses};

/// Equipment slot categories, in storage order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EquipmentSlot {
    /// Main hand weapon.
    Weapon,
    /// Head armor.
    Head,
    /// Chest armor.
    Chest,
    /// Leg armor.
    Legs,
    /// Foot armor.
    Feet,
    /// Off hand shield.
    Shield,
}

impl EquipmentSlot {
    /// All slots in storage order.
    pub const ALL: [Self; 6] = [
        Self::Weapon,
        Self::Head,
        Self::Chest,
        Self::Legs,
        Self::Feet,
        Self::Shield,
    ];

    /// Index into [`Equipment`] storage.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Weapon => 0,
            Self::Head => 1,
            Self::Chest => 2,
            Self::Legs => 3,
            Self::Feet => 4,
            Self::Shield => 5,
        }
    }
}

/// What an item does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    /// Crafting material, quest item, ammunition.
    Material,
    /// Restores health and mana when used.
    Consumable {
        /// Health restored.
        #[serde(default)]
        health: i32,
        /// Mana restored.
        #[serde(default)]
        mana: i32,
    },
    /// Wearable item.
    Equipment {
        /// Slot the item occupies.
        slot: EquipmentSlot,
        /// Bonuses while worn and not broken.
        #[serde(default)]
        bonuses: StatBonuses,
        /// Durability of a fresh item, 0 means the item never wears.
        #[serde(default)]
        max_durability: u32,
        /// Never loses durability.
        #[serde(default)]
        indestructible: bool,
        /// Template substituted when durability reaches zero.
        #[serde(default)]
        damaged_version: Option<String>,
    },
    /// Scroll or egg that summons a monster companion.
    Summon {
        /// Monster template to summon.
        monster: String,
    },
}

/// Static definition of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    /// Unique name.
    pub name: String,
    /// Maximum amount per inventory slot.
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
    /// Behavior.
    pub kind: ItemKind,
}

fn default_max_stack() -> u32 {
    1
}

impl ItemTemplate {
    /// Stable hash of the template name.
    ///
    /// FNV-1a, so the value is identical across processes and platforms.
    #[must_use]
    pub fn hash_code(&self) -> u64 {
        name_hash(&self.name)
    }

    /// Slot this item is worn in, if wearable.
    #[must_use]
    pub fn equipment_slot(&self) -> Option<EquipmentSlot> {
        match &self.kind {
            ItemKind::Equipment { slot, .. } => Some(*slot),
            _ => None,
        }
    }

    /// Durability of a fresh instance.
    #[must_use]
    pub fn max_durability(&self) -> u32 {
        match &self.kind {
            ItemKind::Equipment { max_durability, .. } => *max_durability,
            _ => 0,
        }
    }
}

/// FNV-1a over the UTF-8 bytes of `name`.
#[must_use]
pub fn name_hash(name: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    let mut hash = OFFSET;
    for byte in name.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A dynamic item instance.
#[derive(Clone)]
pub struct Item {
    template: Arc<ItemTemplate>,
    hash: u64,
    /// Remaining durability. Only meaningful for equipment with durability.
    pub durability: u32,
    /// Level of the summoned companion stored in this item.
    pub summoned_level: u32,
    /// Health of the summoned companion stored in this item.
    pub summoned_health: i32,
}

impl Item {
    /// Creates a fresh instance with full durability.
    #[must_use]
    pub fn new(template: Arc<ItemTemplate>) -> Self {
        let durability = template.max_durability();
        let hash = template.hash_code();
        Self {
            template,
            hash,
            durability,
            summoned_level: 1,
            summoned_health: 0,
        }
    }

    /// Shared template handle.
    #[must_use]
    pub fn template(&self) -> &Arc<ItemTemplate> {
        &self.template
    }

    /// Template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// Template hash.
    #[must_use]
    pub const fn hash_code(&self) -> u64 {
        self.hash
    }

    /// True if the item has durability and it ran out.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.template.max_durability() > 0 && self.durability == 0
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.durability == other.durability
            && self.summoned_level == other.summoned_level
            && self.summoned_health == other.summoned_health
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
        self.durability.hash(state);
        self.summoned_level.hash(state);
        self.summoned_health.hash(state);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("name", &self.template.name)
            .field("durability", &self.durability)
            .finish_non_exhaustive()
    }
}

/// An item plus a stack amount. Amount 0 means the slot is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSlot {
    /// The item, `None` when empty.
    pub item: Option<Item>,
    /// Stack size.
    pub amount: u32,
}

impl ItemSlot {
    /// A filled slot.
    #[must_use]
    pub fn new(item: Item, amount: u32) -> Self {
        Self {
            item: Some(item),
            amount,
        }
    }

    /// True if no item is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amount == 0 || self.item.is_none()
    }

    /// Removes up to `amount` and returns how many were removed.
    pub fn decrease(&mut self, amount: u32) -> u32 {
        let removed = amount.min(self.amount);
        self.amount -= removed;
        if self.amount == 0 {
            self.item = None;
        }
        removed
    }

    /// Adds up to the stack limit and returns how many were added.
    pub fn increase(&mut self, amount: u32) -> u32 {
        let Some(item) = &self.item else {
            return 0;
        };
        let space = item.template().max_stack.saturating_sub(self.amount);
        let added = amount.min(space);
        self.amount += added;
        added
    }

    /// Takes the content, leaving the slot empty.
    pub fn take(&mut self) -> Option<(Item, u32)> {
        let amount = std::mem::take(&mut self.amount);
        self.item.take().filter(|_| amount > 0).map(|item| (item, amount))
    }
}

/// Fixed-size bag of item slots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    slots: Vec<ItemSlot>,
}

impl Inventory {
    /// Creates an inventory with `size` empty slots.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            slots: vec![ItemSlot::default(); size],
        }
    }

    /// Read access to all slots.
    #[must_use]
    pub fn slots(&self) -> &[ItemSlot] {
        &self.slots
    }

    /// A single slot.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&ItemSlot> {
        self.slots.get(index)
    }

    /// A single slot, mutable.
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut ItemSlot> {
        self.slots.get_mut(index)
    }

    /// Number of empty slots.
    #[must_use]
    pub fn free_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_empty()).count()
    }

    /// Total amount of items with the given template name.
    #[must_use]
    pub fn count(&self, name: &str) -> u32 {
        let mut total = 0u32;
        for slot in &self.slots {
            if let Some(item) = &slot.item {
                if item.name() == name {
                    total = total.saturating_add(slot.amount);
                }
            }
        }
        total
    }

    /// True if `amount` of `item` fits into existing stacks and free slots.
    #[must_use]
    pub fn can_add(&self, item: &Item, amount: u32) -> bool {
        let max_stack = item.template().max_stack.max(1);
        let mut remaining = amount;
        for slot in &self.slots {
            if remaining == 0 {
                break;
            }
            match &slot.item {
                Some(existing) if slot.amount > 0 => {
                    if existing == item {
                        remaining = remaining.saturating_sub(max_stack.saturating_sub(slot.amount));
                    }
                }
                _ => remaining = remaining.saturating_sub(max_stack),
            }
        }
        remaining == 0
    }

    /// Adds items, stacking onto equal items first.
    ///
    /// Nothing is added unless everything fits.
    pub fn add(&mut self, item: &Item, amount: u32) -> bool {
        if !self.can_add(item, amount) {
            return false;
        }
        let mut remaining = amount;
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if slot.item.as_ref() == Some(item) && slot.amount > 0 {
                remaining -= slot.increase(remaining);
            }
        }
        let max_stack = item.template().max_stack.max(1);
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if slot.is_empty() {
                let placed = remaining.min(max_stack);
                *slot = ItemSlot::new(item.clone(), placed);
                remaining -= placed;
            }
        }
        true
    }

    /// Removes `amount` items with the template name.
    ///
    /// Nothing is removed unless the inventory holds enough.
    pub fn remove(&mut self, name: &str, amount: u32) -> bool {
        if self.count(name) < amount {
            return false;
        }
        let mut remaining = amount;
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if slot.item.as_ref().is_some_and(|i| i.name() == name) {
                remaining -= slot.decrease(remaining);
            }
        }
        true
    }
}

/// Worn items, one per [`EquipmentSlot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equipment {
    slots: [ItemSlot; 6],
}

impl Default for Equipment {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| ItemSlot::default()),
        }
    }
}

impl Equipment {
    /// The slot for a category.
    #[must_use]
    pub fn get(&self, slot: EquipmentSlot) -> &ItemSlot {
        &self.slots[slot.index()]
    }

    /// The slot for a category, mutable.
    pub fn get_mut(&mut self, slot: EquipmentSlot) -> &mut ItemSlot {
        &mut self.slots[slot.index()]
    }

    /// All slots in [`EquipmentSlot::ALL`] order.
    #[must_use]
    pub fn slots(&self) -> &[ItemSlot] {
        &self.slots
    }

    /// Puts an item into its slot and returns what was worn before.
    ///
    /// Returns the item unchanged as `Err` if it is not wearable.
    pub fn equip(&mut self, item: Item) -> Result<Option<Item>, Item> {
        let Some(slot) = item.template().equipment_slot() else {
            return Err(item);
        };
        let previous = self.slots[slot.index()].take().map(|(item, _)| item);
        self.slots[slot.index()] = ItemSlot::new(item, 1);
        Ok(previous)
    }

    /// Removes the item worn in `slot`.
    pub fn unequip(&mut self, slot: EquipmentSlot) -> Option<Item> {
        self.slots[slot.index()].take().map(|(item, _)| item)
    }

    /// Slots whose items can lose durability (armor only, not broken, not
    /// indestructible).
    pub fn wearable_slots(&self) -> impl Iterator<Item = EquipmentSlot> + '_ {
        EquipmentSlot::ALL.into_iter().filter(|slot| {
            *slot != EquipmentSlot::Weapon
                && self.slots[slot.index()].item.as_ref().is_some_and(|item| {
                    matches!(
                        &item.template().kind,
                        ItemKind::Equipment { max_durability, indestructible: false, .. }
                            if *max_durability > 0
                    ) && item.durability > 0
                })
        })
    }

    fn bonuses(&self) -> impl Iterator<Item = &StatBonuses> + '_ {
        self.slots.iter().filter_map(|slot| {
            let item = slot.item.as_ref()?;
            if slot.amount == 0 || item.is_broken() {
                return None;
            }
            match &item.template().kind {
                ItemKind::Equipment { bonuses, .. } => Some(bonuses),
                _ => None,
            }
        })
    }
}

impl BonusSource for Equipment {
    fn health_bonus(&self) -> i32 {
        total_int(self.bonuses(), |b| b.health)
    }

    fn mana_bonus(&self) -> i32 {
        total_int(self.bonuses(), |b| b.mana)
    }

    fn damage_bonus(&self) -> i32 {
        total_int(self.bonuses(), |b| b.damage)
    }

    fn defense_bonus(&self) -> i32 {
        total_int(self.bonuses(), |b| b.defense)
    }

    fn block_chance_bonus(&self) -> f32 {
        total_float(self.bonuses(), |b| b.block_chance)
    }

    fn critical_chance_bonus(&self) -> f32 {
        total_float(self.bonuses(), |b| b.critical_chance)
    }

    fn speed_bonus(&self) -> f32 {
        total_float(self.bonuses(), |b| b.speed)
    }
}
