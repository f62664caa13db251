//! Timed stat modifiers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::stats::{total_float, total_int, BonusCurves, BonusSource, LinearFloat, StatBonuses};

/// Static definition of a buff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffTemplate {
    /// Unique name. Buffs with the same name refresh instead of stacking.
    pub name: String,
    /// Duration in seconds per level.
    pub duration: LinearFloat,
    /// Bonuses per level.
    #[serde(default)]
    pub bonuses: BonusCurves,
    /// Survives the owner's death.
    #[serde(default)]
    pub remain_after_death: bool,
}

/// An active buff on an entity.
///
/// Bonuses are evaluated once when the buff is applied and cached, so a
/// level-up of the caster does not retroactively change running buffs.
#[derive(Debug, Clone, PartialEq)]
pub struct Buff {
    template: Arc<BuffTemplate>,
    /// Level the buff was cast at.
    pub level: u32,
    /// Timestamp at which the buff expires.
    pub buff_end: f64,
    bonuses: StatBonuses,
}

impl Buff {
    /// Creates a buff starting at `now`.
    #[must_use]
    pub fn new(template: Arc<BuffTemplate>, level: u32, now: f64) -> Self {
        let duration = f64::from(template.duration.get(level).max(0.0));
        Self::with_end(template, level, now + duration)
    }

    /// Creates a buff with an explicit end time, used when restoring saves.
    #[must_use]
    pub fn with_end(template: Arc<BuffTemplate>, level: u32, buff_end: f64) -> Self {
        let bonuses = template.bonuses.at(level);
        Self {
            template,
            level,
            buff_end,
            bonuses,
        }
    }

    /// Template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// Shared template handle.
    #[must_use]
    pub fn template(&self) -> &Arc<BuffTemplate> {
        &self.template
    }

    /// Seconds left, never negative.
    #[must_use]
    pub fn remaining(&self, now: f64) -> f64 {
        (self.buff_end - now).max(0.0)
    }

    /// Cached bonuses.
    #[must_use]
    pub const fn bonuses(&self) -> &StatBonuses {
        &self.bonuses
    }
}

/// All active buffs of one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Buffs {
    list: Vec<Buff>,
}

impl Buffs {
    /// Adds a buff or replaces the running one with the same name.
    pub fn add_or_refresh(&mut self, buff: Buff) {
        if let Some(existing) = self.list.iter_mut().find(|b| b.name() == buff.name()) {
            *existing = buff;
        } else {
            self.list.push(buff);
        }
    }

    /// Removes every buff with no time left and returns how many went.
    pub fn cleanup(&mut self, now: f64) -> usize {
        let before = self.list.len();
        self.list.retain(|buff| buff.remaining(now) > 0.0);
        before - self.list.len()
    }

    /// Purges buffs that do not survive death.
    pub fn on_death(&mut self) -> usize {
        let before = self.list.len();
        self.list.retain(|buff| buff.template.remain_after_death);
        before - self.list.len()
    }

    /// Looks up a running buff by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Buff> {
        self.list.iter().find(|b| b.name() == name)
    }

    /// Iterates over running buffs.
    pub fn iter(&self) -> impl Iterator<Item = &Buff> + '_ {
        self.list.iter()
    }

    /// Number of running buffs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True if no buff is running.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }
}

impl BonusSource for Buffs {
    fn health_bonus(&self) -> i32 {
        total_int(self.list.iter().map(|b| &b.bonuses), |b| b.health)
    }

    fn mana_bonus(&self) -> i32 {
        total_int(self.list.iter().map(|b| &b.bonuses), |b| b.mana)
    }

    fn damage_bonus(&self) -> i32 {
        total_int(self.list.iter().map(|b| &b.bonuses), |b| b.damage)
    }

    fn defense_bonus(&self) -> i32 {
        total_int(self.list.iter().map(|b| &b.bonuses), |b| b.defense)
    }

    fn block_chance_bonus(&self) -> f32 {
        total_float(self.list.iter().map(|b| &b.bonuses), |b| b.block_chance)
    }

    fn critical_chance_bonus(&self) -> f32 {
        total_float(self.list.iter().map(|b| &b.bonuses), |b| b.critical_chance)
    }

    fn speed_bonus(&self) -> f32 {
        total_float(self.list.iter().map(|b| &b.bonuses), |b| b.speed)
    }
}
