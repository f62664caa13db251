//! Level-scaled attributes and bonus aggregation.
//!
//! Base values come from pure level curves. Everything an entity carries
//! that modifies a stat (equipment, passive skills, buffs, attributes)
//! implements [`BonusSource`], and the derived stat is
//! `curve.get(level) + sum of bonuses`.
//!
//! Derived stats are recomputed on every read. The sum is a plain loop over
//! a fixed array of sources and never allocates.

use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

/// Integer curve growing linearly with level.
///
/// `get(level) = base + per_level * (level - 1)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearInt {
    /// Value at level 1.
    pub base: i32,
    /// Increase per additional level.
    #[serde(default)]
    pub per_level: i32,
}

impl LinearInt {
    /// Creates a curve.
    #[must_use]
    pub const fn new(base: i32, per_level: i32) -> Self {
        Self { base, per_level }
    }

    /// A curve that ignores level.
    #[must_use]
    pub const fn constant(value: i32) -> Self {
        Self::new(value, 0)
    }

    /// Evaluates the curve. Level 0 evaluates like level 1.
    #[must_use]
    pub fn get(&self, level: u32) -> i32 {
        let steps = i32::try_from(level.saturating_sub(1)).unwrap_or(i32::MAX);
        self.base.saturating_add(self.per_level.saturating_mul(steps))
    }
}

/// Float curve growing linearly with level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearFloat {
    /// Value at level 1.
    pub base: f32,
    /// Increase per additional level.
    #[serde(default)]
    pub per_level: f32,
}

impl LinearFloat {
    /// Creates a curve.
    #[must_use]
    pub const fn new(base: f32, per_level: f32) -> Self {
        Self { base, per_level }
    }

    /// A curve that ignores level.
    #[must_use]
    pub const fn constant(value: f32) -> Self {
        Self::new(value, 0.0)
    }

    /// Evaluates the curve. Level 0 evaluates like level 1.
    #[must_use]
    pub fn get(&self, level: u32) -> f32 {
        #[allow(clippy::cast_precision_loss)]
        let steps = level.saturating_sub(1) as f32;
        self.base + self.per_level * steps
    }
}

/// Integer curve growing exponentially with level.
///
/// `get(level) = multiplier * base^(level - 1)`, used for experience
/// requirements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExponentialInt {
    /// Value at level 1.
    pub multiplier: f64,
    /// Growth factor per level.
    pub base: f64,
}

impl Default for ExponentialInt {
    fn default() -> Self {
        Self {
            multiplier: 100.0,
            base: 1.1,
        }
    }
}

impl ExponentialInt {
    /// Evaluates the curve, saturating at `u64::MAX`.
    #[must_use]
    pub fn get(&self, level: u32) -> u64 {
        let exponent = i32::try_from(level.saturating_sub(1)).unwrap_or(i32::MAX);
        let value = self.multiplier * self.base.powi(exponent);
        if value.is_finite() && value > 0.0 {
            // saturating float -> int conversion
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let value = value as u64;
            value
        } else if value.is_sign_positive() {
            u64::MAX
        } else {
            0
        }
    }
}

/// Flat bonuses contributed by one source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatBonuses {
    /// Maximum health.
    pub health: i32,
    /// Maximum mana.
    pub mana: i32,
    /// Damage.
    pub damage: i32,
    /// Defense.
    pub defense: i32,
    /// Block chance in `[0, 1]` units.
    pub block_chance: f32,
    /// Critical chance in `[0, 1]` units.
    pub critical_chance: f32,
    /// Movement speed in meters per second.
    pub speed: f32,
}

impl StatBonuses {
    /// Component-wise sum.
    #[must_use]
    pub fn plus(self, other: Self) -> Self {
        Self {
            health: self.health.saturating_add(other.health),
            mana: self.mana.saturating_add(other.mana),
            damage: self.damage.saturating_add(other.damage),
            defense: self.defense.saturating_add(other.defense),
            block_chance: self.block_chance + other.block_chance,
            critical_chance: self.critical_chance + other.critical_chance,
            speed: self.speed + other.speed,
        }
    }
}

/// Level curves for every bonus a template can grant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BonusCurves {
    /// Maximum health.
    pub health: LinearInt,
    /// Maximum mana.
    pub mana: LinearInt,
    /// Damage.
    pub damage: LinearInt,
    /// Defense.
    pub defense: LinearInt,
    /// Block chance.
    pub block_chance: LinearFloat,
    /// Critical chance.
    pub critical_chance: LinearFloat,
    /// Movement speed.
    pub speed: LinearFloat,
}

impl BonusCurves {
    /// Evaluates all curves at `level`.
    #[must_use]
    pub fn at(&self, level: u32) -> StatBonuses {
        StatBonuses {
            health: self.health.get(level),
            mana: self.mana.get(level),
            damage: self.damage.get(level),
            defense: self.defense.get(level),
            block_chance: self.block_chance.get(level),
            critical_chance: self.critical_chance.get(level),
            speed: self.speed.get(level),
        }
    }
}

/// Base curves of an entity kind, class or monster template.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseStats {
    /// Maximum health.
    pub health: LinearInt,
    /// Maximum mana.
    pub mana: LinearInt,
    /// Damage.
    pub damage: LinearInt,
    /// Defense.
    pub defense: LinearInt,
    /// Block chance.
    pub block_chance: LinearFloat,
    /// Critical chance.
    pub critical_chance: LinearFloat,
    /// Movement speed.
    pub speed: LinearFloat,
    /// Health recovered per second while alive.
    pub health_recovery: f32,
    /// Mana recovered per second while alive.
    pub mana_recovery: f32,
}

impl Default for BaseStats {
    fn default() -> Self {
        Self {
            health: LinearInt::new(100, 10),
            mana: LinearInt::new(50, 5),
            damage: LinearInt::new(10, 1),
            defense: LinearInt::new(2, 1),
            block_chance: LinearFloat::constant(0.0),
            critical_chance: LinearFloat::constant(0.0),
            speed: LinearFloat::constant(5.0),
            health_recovery: 0.0,
            mana_recovery: 0.0,
        }
    }
}

/// A component that modifies derived stats.
///
/// Every method defaults to no bonus so implementors only override what
/// they contribute.
pub trait BonusSource {
    /// Maximum health bonus.
    fn health_bonus(&self) -> i32 {
        0
    }

    /// Maximum mana bonus.
    fn mana_bonus(&self) -> i32 {
        0
    }

    /// Damage bonus.
    fn damage_bonus(&self) -> i32 {
        0
    }

    /// Defense bonus.
    fn defense_bonus(&self) -> i32 {
        0
    }

    /// Block chance bonus.
    fn block_chance_bonus(&self) -> f32 {
        0.0
    }

    /// Critical chance bonus.
    fn critical_chance_bonus(&self) -> f32 {
        0.0
    }

    /// Speed bonus.
    fn speed_bonus(&self) -> f32 {
        0.0
    }
}

impl BonusSource for StatBonuses {
    fn health_bonus(&self) -> i32 {
        self.health
    }

    fn mana_bonus(&self) -> i32 {
        self.mana
    }

    fn damage_bonus(&self) -> i32 {
        self.damage
    }

    fn defense_bonus(&self) -> i32 {
        self.defense
    }

    fn block_chance_bonus(&self) -> f32 {
        self.block_chance
    }

    fn critical_chance_bonus(&self) -> f32 {
        self.critical_chance
    }

    fn speed_bonus(&self) -> f32 {
        self.speed
    }
}

/// Sums an integer stat over all sources.
pub(crate) fn sum_int(
    base: i32,
    sources: &[&dyn BonusSource],
    bonus: fn(&dyn BonusSource) -> i32,
) -> i32 {
    let mut total = base;
    for source in sources {
        total = total.saturating_add(bonus(*source));
    }
    total
}

/// Sums a float stat over all sources.
pub(crate) fn sum_float(
    base: f32,
    sources: &[&dyn BonusSource],
    bonus: fn(&dyn BonusSource) -> f32,
) -> f32 {
    let mut total = base;
    for source in sources {
        total += bonus(*source);
    }
    total
}

/// Sums an integer field over a set of bonuses, saturating.
pub(crate) fn total_int<B: Borrow<StatBonuses>>(
    bonuses: impl IntoIterator<Item = B>,
    field: fn(&StatBonuses) -> i32,
) -> i32 {
    let mut total: i32 = 0;
    for bonus in bonuses {
        total = total.saturating_add(field(bonus.borrow()));
    }
    total
}

/// Sums a float field over a set of bonuses.
pub(crate) fn total_float<B: Borrow<StatBonuses>>(
    bonuses: impl IntoIterator<Item = B>,
    field: fn(&StatBonuses) -> f32,
) -> f32 {
    let mut total = 0.0;
    for bonus in bonuses {
        total += field(bonus.borrow());
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    mod curve_tests {
        use super::*;

        #[test]
        fn linear_int_scales_with_level() {
            let curve = LinearInt::new(100, 10);
            assert_eq!(curve.get(1), 100);
            assert_eq!(curve.get(5), 140);
        }

        #[test]
        fn linear_int_level_zero_is_level_one() {
            let curve = LinearInt::new(7, 3);
            assert_eq!(curve.get(0), curve.get(1));
        }

        #[test]
        fn linear_float_scales_with_level() {
            let curve = LinearFloat::new(1.0, 0.5);
            assert!((curve.get(3) - 2.0).abs() < f32::EPSILON);
        }

        #[test]
        fn exponential_grows() {
            let curve = ExponentialInt {
                multiplier: 100.0,
                base: 2.0,
            };
            assert_eq!(curve.get(1), 100);
            assert_eq!(curve.get(4), 800);
        }

        #[test]
        fn exponential_saturates() {
            let curve = ExponentialInt {
                multiplier: 1.0,
                base: 1.0e10,
            };
            assert_eq!(curve.get(200), u64::MAX);
        }

        #[test]
        fn bonus_curves_evaluate_all_fields() {
            let curves = BonusCurves {
                damage: LinearInt::new(2, 2),
                speed: LinearFloat::constant(0.5),
                ..BonusCurves::default()
            };
            let bonuses = curves.at(3);
            assert_eq!(bonuses.damage, 6);
            assert!((bonuses.speed - 0.5).abs() < f32::EPSILON);
            assert_eq!(bonuses.health, 0);
        }
    }

    mod aggregation_tests {
        use super::*;

        struct Ring;

        impl BonusSource for Ring {
            fn damage_bonus(&self) -> i32 {
                5
            }
        }

        #[test]
        fn sums_every_source() {
            let buff = StatBonuses {
                damage: 3,
                critical_chance: 0.1,
                ..StatBonuses::default()
            };
            let sources: [&dyn BonusSource; 2] = [&Ring, &buff];
            assert_eq!(sum_int(10, &sources, |s| s.damage_bonus()), 18);
            let crit = sum_float(0.05, &sources, |s| s.critical_chance_bonus());
            assert!((crit - 0.15).abs() < 1e-6);
        }

        #[test]
        fn totals_saturate_instead_of_overflowing() {
            let big = StatBonuses {
                defense: i32::MAX,
                ..StatBonuses::default()
            };
            assert_eq!(total_int([big, big], |b| b.defense), i32::MAX);
            assert_eq!(total_int(Vec::<StatBonuses>::new(), |b| b.defense), 0);
        }

        #[test]
        fn plus_is_component_wise() {
            let a = StatBonuses {
                health: 10,
                speed: 1.0,
                ..StatBonuses::default()
            };
            let b = StatBonuses {
                health: 5,
                defense: 2,
                ..StatBonuses::default()
            };
            let sum = a.plus(b);
            assert_eq!(sum.health, 15);
            assert_eq!(sum.defense, 2);
            assert!((sum.speed - 1.0).abs() < f32::EPSILON);
        }
    }
}
