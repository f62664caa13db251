//! The closed set of states an entity's state machine can be in.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-tick state of an entity.
///
/// Monsters and NPCs only ever use the first five variants. The busy states
/// are player-only and structurally identical: entering one cancels any cast
/// and rejects movement until the activity completes or is aborted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityState {
    /// Standing around, waiting for events.
    #[default]
    Idle,
    /// Walking towards a destination.
    Moving,
    /// Committed to a skill until its cast time elapses.
    Casting,
    /// Unable to act until the stun ends.
    Stunned,
    /// Zero health. Waiting for respawn.
    Dead,
    /// Exchanging items with another player.
    Trading,
    /// Working on a crafting recipe.
    Crafting,
    /// Working on a cooking recipe.
    Cooking,
    /// Working on a blacksmithing recipe.
    Blacksmithing,
}

impl EntityState {
    /// True for the player-only activity states.
    #[must_use]
    pub const fn is_busy(self) -> bool {
        matches!(
            self,
            Self::Trading | Self::Crafting | Self::Cooking | Self::Blacksmithing
        )
    }

    /// Upper-case name, as shown to clients.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Moving => "MOVING",
            Self::Casting => "CASTING",
            Self::Stunned => "STUNNED",
            Self::Dead => "DEAD",
            Self::Trading => "TRADING",
            Self::Crafting => "CRAFTING",
            Self::Cooking => "COOKING",
            Self::Blacksmithing => "BLACKSMITHING",
        }
    }
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn busy_states() {
        assert!(EntityState::Trading.is_busy());
        assert!(EntityState::Blacksmithing.is_busy());
        assert!(!EntityState::Casting.is_busy());
        assert!(!EntityState::Dead.is_busy());
    }

    #[test]
    fn display_is_upper_case() {
        assert_eq!(EntityState::Moving.to_string(), "MOVING");
        assert_eq!(EntityState::default(), EntityState::Idle);
    }
}
