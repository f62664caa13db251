//! NPCs never fight, move or die.

use crate::entity::{Entity, EntityState};

pub(super) fn update(_entity: &mut Entity) -> EntityState {
    EntityState::Idle
}
