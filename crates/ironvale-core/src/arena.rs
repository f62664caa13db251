//! Arena module: the entity table of one shard.
//!
//! The Arena is the container for all entities of a shard. It provides:
//! - Entity storage with deterministic iteration order (`BTreeMap`)
//! - Spatial indexing for proximity queries
//! - Entity lifecycle management (spawn/despawn)
//! - Take/restore for single-writer updates
//!
//! # Single Writer
//!
//! During the update loop an entity is [`take`](Arena::take)n out of the
//! table, mutated with exclusive ownership, and
//! [`restore`](Arena::restore)d afterwards. While it is out, every other
//! entity is reachable through the arena (to apply damage, heal, or read
//! a target position) but the entity itself is not; code acting on behalf
//! of the taken entity must resolve its own id to itself. The spatial
//! index keeps the entity's last position while it is out, so area
//! queries still see it.
//!
//! # Spatial Index Synchronization
//!
//! The spatial index is NOT automatically synchronized when entity
//! positions change through `get_mut()`. Call `update_spatial(id)`
//! afterwards. `spawn`, `despawn` and `restore` update the index.
//!
//! # Example
//!
//! ```
//! use ironvale_core::arena::Arena;
//! use ironvale_core::entity::Entity;
//! use ironvale_core::stats::BaseStats;
//! use glam::Vec2;
//!
//! let mut arena = Arena::new();
//! let id = arena.spawn(Entity::npc_at("Merchant", Vec2::new(100.0, 200.0), BaseStats::default()));
//!
//! let nearby = arena.spatial().query_radius(Vec2::new(100.0, 200.0), 50.0);
//! assert!(nearby.contains(&id));
//! ```

use std::collections::{BTreeMap, HashMap};

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId};

// =============================================================================
// Spatial Index
// =============================================================================

/// Simple spatial index for proximity queries.
///
/// # Note on `HashMap` Usage
///
/// `HashMap` is acceptable here because we only query by known entity IDs or
/// perform full scans for radius queries, and radius query results are
/// sorted before they are returned.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpatialIndex {
    /// Entity positions indexed by ID.
    positions: HashMap<EntityId, Vec2>,
}

impl SpatialIndex {
    /// Creates a new empty spatial index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            positions: HashMap::new(),
        }
    }

    /// Inserts or updates an entity's position in the index.
    pub fn insert(&mut self, id: EntityId, pos: Vec2) {
        self.positions.insert(id, pos);
    }

    /// Removes an entity from the spatial index.
    pub fn remove(&mut self, id: EntityId) {
        self.positions.remove(&id);
    }

    /// Returns the position of an entity, if known.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<Vec2> {
        self.positions.get(&id).copied()
    }

    /// Queries for entities within a radius of a center point.
    ///
    /// Returns entity IDs in a deterministic order (sorted by ID). The
    /// boundary is inclusive.
    #[must_use]
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        let radius_sq = radius * radius;
        let mut results: Vec<EntityId> = self
            .positions
            .iter()
            .filter(|(_, pos)| center.distance_squared(**pos) <= radius_sq)
            .map(|(id, _)| *id)
            .collect();
        results.sort_unstable();
        results
    }

    /// Returns the number of entities in the spatial index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns true if the spatial index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Entity table of one shard.
///
/// # Determinism
///
/// Entity IDs are assigned monotonically starting at 1 and entities are
/// stored in a `BTreeMap`, so iteration always visits them in spawn order.
#[derive(Debug, Clone, Default)]
pub struct Arena {
    /// Monotonically increasing entity ID counter.
    next_id: u64,
    /// Entity storage with deterministic iteration order.
    entities: BTreeMap<EntityId, Entity>,
    /// Spatial index for proximity queries.
    spatial: SpatialIndex,
}

impl Arena {
    /// Creates a new empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entities: BTreeMap::new(),
            spatial: SpatialIndex::new(),
        }
    }

    /// Spawns an entity, assigning it a fresh id.
    ///
    /// # Returns
    ///
    /// The unique ID assigned to the new entity.
    pub fn spawn(&mut self, mut entity: Entity) -> EntityId {
        let id = EntityId::new(self.next_id.max(1));
        self.next_id = id.as_u64() + 1;
        entity.set_id(id);
        self.spatial.insert(id, entity.position());
        self.entities.insert(id, entity);
        id
    }

    /// Removes an entity from the arena and the spatial index.
    ///
    /// # Returns
    ///
    /// The removed entity, if it existed.
    pub fn despawn(&mut self, id: EntityId) -> Option<Entity> {
        self.spatial.remove(id);
        self.entities.remove(&id)
    }

    /// Takes an entity out for an exclusive update. Its spatial entry stays.
    pub fn take(&mut self, id: EntityId) -> Option<Entity> {
        self.entities.remove(&id)
    }

    /// Puts a taken entity back and syncs its spatial entry.
    pub fn restore(&mut self, entity: Entity) {
        let id = entity.id();
        self.spatial.insert(id, entity.position());
        self.entities.insert(id, entity);
    }

    /// Returns a reference to an entity by ID.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Returns a mutable reference to an entity by ID.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Returns true if the entity is in the table.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Snapshot of all ids in deterministic (sorted) order.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities.keys().copied().collect()
    }

    /// Returns an iterator over entities in deterministic (sorted by ID) order.
    pub fn entities_sorted(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.entities.values()
    }

    /// Returns an iterator over mutable entities in deterministic order.
    pub fn entities_sorted_mut(&mut self) -> impl Iterator<Item = &mut Entity> + '_ {
        self.entities.values_mut()
    }

    /// Finds a player by name.
    #[must_use]
    pub fn find_player(&self, name: &str) -> Option<EntityId> {
        self.entities
            .values()
            .find(|e| e.is_player() && e.name == name)
            .map(Entity::id)
    }

    /// Returns the number of entities in the arena.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the arena has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns a reference to the spatial index.
    #[must_use]
    pub fn spatial(&self) -> &SpatialIndex {
        &self.spatial
    }

    /// Entities within `radius` of `center`, sorted by id.
    #[must_use]
    pub fn query_radius(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        self.spatial.query_radius(center, radius)
    }

    /// Updates the spatial index for an entity.
    ///
    /// Call this after modifying an entity's position to keep the spatial
    /// index in sync.
    pub fn update_spatial(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get(&id) {
            self.spatial.insert(id, entity.position());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::BaseStats;

    fn npc(x: f32) -> Entity {
        Entity::npc_at("Npc", Vec2::new(x, 0.0), BaseStats::default())
    }

    mod spatial_index_tests {
        use super::*;

        #[test]
        fn insert_and_get() {
            let mut index = SpatialIndex::new();
            let id = EntityId::new(1);
            index.insert(id, Vec2::new(100.0, 200.0));
            index.insert(id, Vec2::new(300.0, 400.0));
            assert_eq!(index.get(id), Some(Vec2::new(300.0, 400.0)));
            assert_eq!(index.len(), 1);
        }

        #[test]
        fn query_radius_returns_sorted_results() {
            let mut index = SpatialIndex::new();
            index.insert(EntityId::new(5), Vec2::new(10.0, 0.0));
            index.insert(EntityId::new(2), Vec2::new(20.0, 0.0));
            index.insert(EntityId::new(8), Vec2::new(30.0, 0.0));
            index.insert(EntityId::new(1), Vec2::new(300.0, 0.0));

            let results = index.query_radius(Vec2::ZERO, 100.0);
            assert_eq!(
                results,
                vec![EntityId::new(2), EntityId::new(5), EntityId::new(8)]
            );
        }

        #[test]
        fn query_radius_boundary_case() {
            let mut index = SpatialIndex::new();
            index.insert(EntityId::new(1), Vec2::new(100.0, 0.0));
            assert!(index.query_radius(Vec2::ZERO, 100.0).contains(&EntityId::new(1)));
        }

        #[test]
        fn remove_deletes_entry() {
            let mut index = SpatialIndex::new();
            index.insert(EntityId::new(1), Vec2::ZERO);
            index.remove(EntityId::new(1));
            index.remove(EntityId::new(999));
            assert!(index.is_empty());
        }
    }

    mod arena_tests {
        use super::*;

        #[test]
        fn spawn_assigns_sequential_ids_from_one() {
            let mut arena = Arena::new();
            let a = arena.spawn(npc(0.0));
            let b = arena.spawn(npc(1.0));
            assert_eq!(a, EntityId::new(1));
            assert_eq!(b, EntityId::new(2));
            assert_eq!(arena.get(a).map(Entity::id), Some(a));
            assert_eq!(arena.ids(), vec![a, b]);
        }

        #[test]
        fn despawn_removes_from_index() {
            let mut arena = Arena::new();
            let id = arena.spawn(npc(0.0));
            assert!(arena.despawn(id).is_some());
            assert!(arena.spatial().get(id).is_none());
            assert!(arena.despawn(id).is_none());
        }

        #[test]
        fn take_keeps_spatial_entry() {
            let mut arena = Arena::new();
            let id = arena.spawn(npc(0.0));
            let mut entity = arena.take(id).unwrap();
            assert!(!arena.contains(id));
            assert_eq!(arena.query_radius(Vec2::ZERO, 1.0), vec![id]);

            entity.transform.position = Vec2::new(50.0, 0.0);
            arena.restore(entity);
            assert!(arena.contains(id));
            assert_eq!(arena.spatial().get(id), Some(Vec2::new(50.0, 0.0)));
        }

        #[test]
        fn update_spatial_after_get_mut() {
            let mut arena = Arena::new();
            let id = arena.spawn(npc(0.0));
            if let Some(entity) = arena.get_mut(id) {
                entity.transform.position = Vec2::new(500.0, 500.0);
            }
            assert_eq!(arena.spatial().get(id), Some(Vec2::ZERO));
            arena.update_spatial(id);
            assert_eq!(arena.spatial().get(id), Some(Vec2::new(500.0, 500.0)));
        }

        #[test]
        fn iteration_is_sorted() {
            let mut arena = Arena::new();
            for x in 0..5 {
                arena.spawn(npc(x as f32));
            }
            let ids: Vec<_> = arena.entities_sorted().map(Entity::id).collect();
            let mut sorted = ids.clone();
            sorted.sort();
            assert_eq!(ids, sorted);
        }
    }
}
