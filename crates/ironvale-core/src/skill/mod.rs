//! Skill templates, learned skill instances and the buff stack.
//!
//! A [`SkillTemplate`] is static catalog data. Every entity owns a [`Skills`]
//! collection with one [`Skill`] per template it knows about; level 0 means
//! the skill is known but not learned yet.
//!
//! The cast protocol itself (checks, start, finish, cancel) lives in
//! [`cast`] because it needs the whole tick context.

pub mod buff;
pub mod cast;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::stats::{
    total_float, total_int, BonusCurves, BonusSource, LinearFloat, LinearInt, StatBonuses,
};

pub use buff::{Buff, BuffTemplate, Buffs};
pub use cast::{DistanceCheck, TargetCheck};

/// What a skill does when its cast finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkillEffect {
    /// Damages the target.
    TargetDamage {
        /// Damage added to the caster's damage.
        damage: LinearInt,
        /// Chance to stun.
        #[serde(default)]
        stun_chance: LinearFloat,
        /// Stun duration in seconds.
        #[serde(default)]
        stun_time: LinearFloat,
    },
    /// Damages every attackable entity around the caster.
    AreaDamage {
        /// Damage added to the caster's damage.
        damage: LinearInt,
        /// Radius around the caster.
        radius: LinearFloat,
        /// Chance to stun.
        #[serde(default)]
        stun_chance: LinearFloat,
        /// Stun duration in seconds.
        #[serde(default)]
        stun_time: LinearFloat,
    },
    /// Heals the target, or the caster if there is no friendly target.
    TargetHeal {
        /// Health restored.
        #[serde(default)]
        health: LinearInt,
        /// Mana restored.
        #[serde(default)]
        mana: LinearInt,
    },
    /// Heals the caster and every friendly entity around it.
    AreaHeal {
        /// Health restored.
        #[serde(default)]
        health: LinearInt,
        /// Mana restored.
        #[serde(default)]
        mana: LinearInt,
        /// Radius around the caster.
        radius: LinearFloat,
    },
    /// Applies a buff to the target, or the caster if there is no friendly
    /// target.
    TargetBuff {
        /// Buff template name.
        buff: String,
    },
    /// Applies a buff to the caster and every friendly entity around it.
    AreaBuff {
        /// Buff template name.
        buff: String,
        /// Radius around the caster.
        radius: LinearFloat,
    },
    /// Never cast. Grants bonuses while learned.
    Passive {
        /// Bonuses per skill level.
        #[serde(default)]
        bonuses: BonusCurves,
    },
    /// Summons a companion monster.
    Summon {
        /// Monster template name.
        monster: String,
    },
}

impl SkillEffect {
    /// True for effects that need no target and are always in range.
    #[must_use]
    pub const fn is_self_centered(&self) -> bool {
        matches!(
            self,
            Self::AreaDamage { .. }
                | Self::AreaHeal { .. }
                | Self::AreaBuff { .. }
                | Self::Passive { .. }
                | Self::Summon { .. }
        )
    }
}

/// Item consumed when a cast starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredItem {
    /// Item template name.
    pub item: String,
    /// Amount consumed per cast.
    #[serde(default = "default_amount")]
    pub amount: u32,
}

fn default_amount() -> u32 {
    1
}

fn default_max_level() -> u32 {
    1
}

/// Static definition of a skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillTemplate {
    /// Unique name.
    pub name: String,
    /// Cast time in seconds.
    #[serde(default)]
    pub cast_time: LinearFloat,
    /// Cooldown in seconds, starting when the cast finishes.
    #[serde(default)]
    pub cooldown: LinearFloat,
    /// Mana deducted when the cast finishes.
    #[serde(default)]
    pub mana_cost: LinearInt,
    /// Maximum distance to the target.
    #[serde(default)]
    pub cast_range: LinearFloat,
    /// Effect applied on finish.
    pub effect: SkillEffect,
    /// Abort the cast if the target dies or disappears.
    #[serde(default)]
    pub cancel_cast_if_target_died: bool,
    /// The caster may keep moving while casting.
    #[serde(default)]
    pub allow_movement: bool,
    /// Item consumed when the cast starts.
    #[serde(default)]
    pub requires_item: Option<RequiredItem>,
    /// Passive skill that may gain a level whenever this skill is cast.
    #[serde(default)]
    pub trains: Option<String>,
    /// Highest learnable level.
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    /// Player level needed for each skill level.
    #[serde(default)]
    pub required_level: LinearInt,
    /// Skill experience spent for each skill level.
    #[serde(default)]
    pub required_skill_experience: LinearInt,
    /// Learned at level 1 on character creation.
    #[serde(default)]
    pub learn_default: bool,
}

impl SkillTemplate {
    /// Creates a level-1 template with the given effect and no costs.
    #[must_use]
    pub fn new(name: impl Into<String>, effect: SkillEffect) -> Self {
        Self {
            name: name.into(),
            cast_time: LinearFloat::default(),
            cooldown: LinearFloat::default(),
            mana_cost: LinearInt::default(),
            cast_range: LinearFloat::default(),
            effect,
            cancel_cast_if_target_died: false,
            allow_movement: false,
            requires_item: None,
            trains: None,
            max_level: 1,
            required_level: LinearInt::default(),
            required_skill_experience: LinearInt::default(),
            learn_default: false,
        }
    }
}

/// A skill known by one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Skill {
    template: Arc<SkillTemplate>,
    /// Learned level, 0 means not learned.
    pub level: u32,
    /// Timestamp at which the running cast completes.
    pub cast_end: f64,
    /// Timestamp at which the skill can be cast again.
    pub cooldown_end: f64,
}

impl Skill {
    /// Creates an instance at `level` with no cast or cooldown running.
    #[must_use]
    pub fn new(template: Arc<SkillTemplate>, level: u32) -> Self {
        Self {
            template,
            level,
            cast_end: 0.0,
            cooldown_end: 0.0,
        }
    }

    /// Template name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.template.name
    }

    /// Shared template handle.
    #[must_use]
    pub fn template(&self) -> &Arc<SkillTemplate> {
        &self.template
    }

    /// True once the skill has at least one level.
    #[must_use]
    pub const fn is_learned(&self) -> bool {
        self.level > 0
    }

    /// True if the cooldown is over.
    #[must_use]
    pub fn is_ready(&self, now: f64) -> bool {
        now >= self.cooldown_end
    }

    /// Cast time at the current level.
    #[must_use]
    pub fn cast_time(&self) -> f32 {
        self.template.cast_time.get(self.level).max(0.0)
    }

    /// Cooldown at the current level.
    #[must_use]
    pub fn cooldown(&self) -> f32 {
        self.template.cooldown.get(self.level).max(0.0)
    }

    /// Mana cost at the current level.
    #[must_use]
    pub fn mana_cost(&self) -> i32 {
        self.template.mana_cost.get(self.level).max(0)
    }

    /// Cast range at the current level.
    #[must_use]
    pub fn cast_range(&self) -> f32 {
        self.template.cast_range.get(self.level).max(0.0)
    }

    /// Seconds until the running cast completes.
    #[must_use]
    pub fn cast_time_remaining(&self, now: f64) -> f64 {
        (self.cast_end - now).max(0.0)
    }

    /// Seconds until the skill is ready again.
    #[must_use]
    pub fn cooldown_remaining(&self, now: f64) -> f64 {
        (self.cooldown_end - now).max(0.0)
    }
}

/// All skills of one entity plus the index of the one being cast.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Skills {
    list: Vec<Skill>,
    current: Option<usize>,
}

impl Skills {
    /// Wraps a list of skills. Nothing is casting.
    #[must_use]
    pub fn new(list: Vec<Skill>) -> Self {
        Self {
            list,
            current: None,
        }
    }

    /// Index of the skill being cast.
    #[must_use]
    pub const fn current(&self) -> Option<usize> {
        self.current
    }

    /// The skill being cast.
    #[must_use]
    pub fn current_skill(&self) -> Option<&Skill> {
        self.current.and_then(|i| self.list.get(i))
    }

    pub(crate) fn set_current(&mut self, index: Option<usize>) {
        self.current = index.filter(|i| *i < self.list.len());
    }

    /// A skill by index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Skill> {
        self.list.get(index)
    }

    /// A skill by index, mutable.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Skill> {
        self.list.get_mut(index)
    }

    /// Index of the skill with the given template name.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.list.iter().position(|s| s.name() == name)
    }

    /// Iterates over all skills.
    pub fn iter(&self) -> impl Iterator<Item = &Skill> + '_ {
        self.list.iter()
    }

    /// Number of skills.
    #[must_use]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    /// True if the entity knows no skills.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    fn passive_bonuses(&self) -> impl Iterator<Item = StatBonuses> + '_ {
        self.list.iter().filter_map(|skill| match &skill.template.effect {
            SkillEffect::Passive { bonuses } if skill.is_learned() => Some(bonuses.at(skill.level)),
            _ => None,
        })
    }
}

impl BonusSource for Skills {
    fn health_bonus(&self) -> i32 {
        total_int(self.passive_bonuses(), |b| b.health)
    }

    fn mana_bonus(&self) -> i32 {
        total_int(self.passive_bonuses(), |b| b.mana)
    }

    fn damage_bonus(&self) -> i32 {
        total_int(self.passive_bonuses(), |b| b.damage)
    }

    fn defense_bonus(&self) -> i32 {
        total_int(self.passive_bonuses(), |b| b.defense)
    }

    fn block_chance_bonus(&self) -> f32 {
        total_float(self.passive_bonuses(), |b| b.block_chance)
    }

    fn critical_chance_bonus(&self) -> f32 {
        total_float(self.passive_bonuses(), |b| b.critical_chance)
    }

    fn speed_bonus(&self) -> f32 {
        total_float(self.passive_bonuses(), |b| b.speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fireball() -> Arc<SkillTemplate> {
        Arc::new(SkillTemplate {
            cast_time: LinearFloat::new(2.0, -0.5),
            cooldown: LinearFloat::constant(3.0),
            mana_cost: LinearInt::new(10, 5),
            cast_range: LinearFloat::constant(12.0),
            max_level: 3,
            ..SkillTemplate::new(
                "Fireball",
                SkillEffect::TargetDamage {
                    damage: LinearInt::new(20, 5),
                    stun_chance: LinearFloat::default(),
                    stun_time: LinearFloat::default(),
                },
            )
        })
    }

    fn toughness() -> Arc<SkillTemplate> {
        Arc::new(SkillTemplate::new(
            "Toughness",
            SkillEffect::Passive {
                bonuses: BonusCurves {
                    defense: LinearInt::new(2, 2),
                    ..BonusCurves::default()
                },
            },
        ))
    }

    mod skill_tests {
        use super::*;

        #[test]
        fn level_scaled_values() {
            let skill = Skill::new(fireball(), 3);
            assert!((skill.cast_time() - 1.0).abs() < f32::EPSILON);
            assert_eq!(skill.mana_cost(), 20);
        }

        #[test]
        fn readiness_follows_cooldown() {
            let mut skill = Skill::new(fireball(), 1);
            skill.cooldown_end = 5.0;
            assert!(!skill.is_ready(4.9));
            assert!(skill.is_ready(5.0));
            assert!((skill.cooldown_remaining(4.0) - 1.0).abs() < 1e-9);
        }

        #[test]
        fn self_centered_effects() {
            assert!(!fireball().effect.is_self_centered());
            assert!(toughness().effect.is_self_centered());
        }
    }

    mod skills_tests {
        use super::*;

        #[test]
        fn only_learned_passives_contribute() {
            let mut skills = Skills::new(vec![Skill::new(fireball(), 1), Skill::new(toughness(), 0)]);
            assert_eq!(skills.defense_bonus(), 0);
            skills.get_mut(1).unwrap().level = 2;
            assert_eq!(skills.defense_bonus(), 4);
        }

        #[test]
        fn current_index_is_bounded() {
            let mut skills = Skills::new(vec![Skill::new(fireball(), 1)]);
            skills.set_current(Some(3));
            assert_eq!(skills.current(), None);
            skills.set_current(Some(0));
            assert_eq!(skills.current_skill().unwrap().name(), "Fireball");
        }

        #[test]
        fn effect_json_shape() {
            let json = r#"{ "type": "target_buff", "buff": "Haste" }"#;
            let effect: SkillEffect = serde_json::from_str(json).unwrap();
            assert_eq!(effect, SkillEffect::TargetBuff { buff: "Haste".into() });
        }
    }
}
