//! Gameplay tuning for a shard.
//!
//! Every hardcoded ratio and random denominator lives here so that tuning
//! never requires touching state machine code. Defaults match the values
//! the game shipped with.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tuning constants and timing parameters for one shard.
///
/// # Example
///
/// ```
/// use ironvale_core::config::SimConfig;
///
/// let config = SimConfig::from_json_str(r#"{ "tick_rate": 30 }"#).unwrap();
/// assert_eq!(config.tick_rate, 30);
/// assert!((config.aggro_hysteresis - 0.8).abs() < f32::EPSILON);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Radius in which players observe other entities.
    pub interest_radius: f32,
    /// Interval at which clients report their position, in seconds.
    pub rubberband_send_interval: f32,
    /// Reported positions further than `factor * speed` from the server
    /// position are rejected and warped back.
    pub rubberband_tolerance_factor: f32,
    /// A new aggressor replaces the current target only if it is closer than
    /// `hysteresis * current distance`.
    pub aggro_hysteresis: f32,
    /// Stopping distance when closing in on a target, as a fraction of the
    /// skill's cast range.
    pub attack_to_move_range_ratio: f32,
    /// One hit in `n` wears a random equipped armor piece.
    pub durability_wear_denominator: u32,
    /// One finished cast in `n` trains the linked passive skill.
    pub skill_training_denominator: u32,
    /// Health and mana fraction restored on player respawn.
    pub revive_health_fraction: f32,
    /// Seconds after the last combat action before a player may log out.
    pub logout_combat_delay: f64,
    /// Seconds between periodic saves of all online players.
    pub autosave_interval: f64,
    /// Experience rewards are scaled by at most this many levels.
    pub max_level_difference: i32,
    /// Reward multiplier change per level of difference.
    pub experience_per_level_difference: f32,
    /// Fraction of the current level's experience lost on death.
    pub death_experience_loss: f32,
    /// Maximum distance for looting and trading.
    pub interaction_range: f32,
    /// Attribute points granted per level gained.
    pub attribute_points_per_level: u32,
    /// Maximum health granted per point of strength.
    pub health_per_strength: i32,
    /// Maximum mana granted per point of intelligence.
    pub mana_per_intelligence: i32,
    /// Maximum number of queued intents per entity.
    pub max_pending_intents: usize,
    /// A* search iteration cap for server-driven agents.
    pub max_path_iterations: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_rate: 30,
            interest_radius: 40.0,
            rubberband_send_interval: 0.1,
            rubberband_tolerance_factor: 2.0,
            aggro_hysteresis: 0.8,
            attack_to_move_range_ratio: 0.8,
            durability_wear_denominator: 8,
            skill_training_denominator: 16,
            revive_health_fraction: 0.5,
            logout_combat_delay: 5.0,
            autosave_interval: 60.0,
            max_level_difference: 20,
            experience_per_level_difference: 0.1,
            death_experience_loss: 0.05,
            interaction_range: 4.0,
            attribute_points_per_level: 1,
            health_per_strength: 10,
            mana_per_intelligence: 10,
            max_pending_intents: 64,
            max_path_iterations: 512,
        }
    }
}

impl SimConfig {
    /// Parses a config from JSON. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] if a value fails [`SimConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns the first offending field as [`ConfigError::Invalid`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(invalid("tick_rate", "must be positive"));
        }
        if self.rubberband_send_interval <= 0.0 {
            return Err(invalid("rubberband_send_interval", "must be positive"));
        }
        if self.rubberband_tolerance_factor <= 0.0 {
            return Err(invalid("rubberband_tolerance_factor", "must be positive"));
        }
        for (field, value) in [
            ("aggro_hysteresis", self.aggro_hysteresis),
            ("attack_to_move_range_ratio", self.attack_to_move_range_ratio),
            ("revive_health_fraction", self.revive_health_fraction),
            ("death_experience_loss", self.death_experience_loss),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be within [0, 1]"));
            }
        }
        if self.durability_wear_denominator == 0 {
            return Err(invalid("durability_wear_denominator", "must be at least 1"));
        }
        if self.skill_training_denominator == 0 {
            return Err(invalid("skill_training_denominator", "must be at least 1"));
        }
        if self.max_pending_intents == 0 {
            return Err(invalid("max_pending_intents", "must be at least 1"));
        }
        Ok(())
    }

    /// Length of one tick in seconds.
    #[must_use]
    pub fn tick_interval(&self) -> f32 {
        // tick_rate is validated to be small and positive
        #[allow(clippy::cast_precision_loss)]
        let rate = self.tick_rate as f32;
        1.0 / rate
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
