//! Error types for the simulation core.
//!
//! Nothing in here is fatal to a shard. Every error is recovered locally:
//! rejected intents become local-only info messages, missing references
//! abort the operation with a warning, and persistence failures drop the
//! affected session.

use thiserror::Error;

use crate::entity::{EntityId, EntityState};

/// Errors raised while parsing or validating configuration and catalogs.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is outside its allowed range.
    #[error("invalid value for `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// A template references another template that does not exist.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors raised when a template lookup fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    /// Unknown item template.
    #[error("unknown item `{0}`")]
    UnknownItem(String),
    /// Unknown skill template.
    #[error("unknown skill `{0}`")]
    UnknownSkill(String),
    /// Unknown buff template.
    #[error("unknown buff `{0}`")]
    UnknownBuff(String),
    /// Unknown monster template.
    #[error("unknown monster `{0}`")]
    UnknownMonster(String),
    /// Unknown player class.
    #[error("unknown class `{0}`")]
    UnknownClass(String),
    /// Unknown recipe.
    #[error("unknown recipe `{0}`")]
    UnknownRecipe(String),
}

/// Reasons an intent was rejected.
///
/// Rejections are never shown to other clients. The shard turns them into an
/// owner-only info notification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntentError {
    /// The addressed entity does not exist (anymore).
    #[error("entity {0} not found")]
    UnknownEntity(EntityId),
    /// The intent is not allowed in the entity's current state.
    #[error("not allowed while {0}")]
    InvalidState(EntityState),
    /// A slot or skill index is out of bounds.
    #[error("invalid index {0}")]
    InvalidIndex(usize),
    /// Not enough gold, mana, items, points or inventory space.
    #[error("not enough {0}")]
    Insufficient(&'static str),
    /// The other entity is too far away.
    #[error("target out of range")]
    OutOfRange,
    /// The referenced target is not valid for this intent.
    #[error("invalid target")]
    InvalidTarget,
    /// A template reference failed to resolve.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    /// The per-entity intent queue is full.
    #[error("too many pending intents")]
    QueueFull,
    /// The skill has no level yet.
    #[error("skill not learned")]
    NotLearned,
    /// Passive skills only grant bonuses.
    #[error("passive skills cannot be cast")]
    PassiveSkill,
    /// The skill is not ready yet.
    #[error("skill is on cooldown")]
    Cooldown,
    /// The skill cannot be upgraded further.
    #[error("skill is at its maximum level")]
    MaxLevel,
    /// Combat happened too recently.
    #[error("cannot log out while in combat")]
    InCombat,
}

/// Errors raised by a [`CharacterStore`](crate::persistence::CharacterStore).
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Underlying I/O failure.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    /// The stored record could not be (de)serialized.
    #[error("record encoding failed: {0}")]
    Serde(#[from] serde_json::Error),
    /// The name is not a valid storage key.
    #[error("invalid character name `{0}`")]
    InvalidName(String),
    /// No record exists for the name.
    #[error("no character named `{0}`")]
    NotFound(String),
    /// The record references a class that no longer exists.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_error_messages() {
        assert_eq!(
            IntentError::InvalidState(EntityState::Dead).to_string(),
            "not allowed while DEAD"
        );
        assert_eq!(
            IntentError::Insufficient("mana").to_string(),
            "not enough mana"
        );
    }

    #[test]
    fn catalog_error_converts_into_config_error() {
        let err: ConfigError = CatalogError::UnknownBuff("Haste".into()).into();
        assert_eq!(err.to_string(), "unknown buff `Haste`");
    }
}
