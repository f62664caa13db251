//! The shard tick loop.
//!
//! A [`Simulation`] owns one shard: its entities, clock, random generator,
//! scheduler, intent queue and broadcast queue. Everything inside a shard
//! runs on one thread in a fixed order:
//!
//! 1. **CLOCK**: Advance the clock by one tick interval.
//! 2. **INTENTS**: Apply queued client intents, ordered by entity id.
//! 3. **INTEREST**: Refresh zone flags and observer counts.
//! 4. **UPDATE**: For every worth-updating entity in id order: advance
//!    movement, recover pools, drop expired buffs, run the state machine.
//! 5. **SCHEDULE**: Run scheduled actions whose deadline passed.
//! 6. **FLUSH**: Turn dirty fields into snapshot broadcasts.
//!
//! # Determinism
//!
//! Entities live in a `BTreeMap`, intents are drained in id order and all
//! randomness comes from one `ChaCha8Rng` seeded from the shard seed, so the
//! same seed and the same intents always produce the same broadcasts.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use glam::Vec2;
//! use ironvale_core::catalog::Catalog;
//! use ironvale_core::config::SimConfig;
//! use ironvale_core::movement::NavArea;
//! use ironvale_core::simulation::Simulation;
//! use ironvale_core::stats::BaseStats;
//! use ironvale_core::zone::{Rect, Zones};
//!
//! let nav = Arc::new(NavArea::open(Rect::from_corners(Vec2::ZERO, Vec2::splat(100.0))));
//! let mut sim = Simulation::new(42, SimConfig::default(), Arc::new(Catalog::new()), Zones::default(), nav);
//! sim.spawn_npc("Merchant", BaseStats::default(), Vec2::new(10.0, 10.0));
//!
//! for _ in 0..10 {
//!     sim.step();
//! }
//!
//! assert_eq!(sim.tick(), 10);
//! ```

use std::fmt;
use std::sync::Arc;

use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, error, info, warn};

use crate::activity;
use crate::arena::Arena;
use crate::catalog::Catalog;
use crate::config::SimConfig;
use crate::context::TickContext;
use crate::entity::{ActivityRequest, DirtyFlags, Entity, EntityId, EntityState};
use crate::error::{CatalogError, IntentError, PersistenceError};
use crate::intent::{self, Intent, IntentQueue};
use crate::loot::{LootSpawner, RecordingSpawner};
use crate::movement::NavArea;
use crate::output::{Audience, Broadcast, EntitySnapshot, Notification, Outbox};
use crate::persistence::{CharacterRecord, CharacterStore, MemoryStore};
use crate::schedule::{ScheduledAction, Scheduler};
use crate::stats::BaseStats;
use crate::trade;
use crate::zone::Zones;

// =============================================================================
// Simulation
// =============================================================================

/// One shard of the world.
pub struct Simulation {
    /// Seed of the random generator.
    seed: u64,
    /// Gameplay tuning.
    config: SimConfig,
    /// Templates, shared between shards.
    catalog: Arc<Catalog>,
    /// Safe zones, PvP zones and spawn points.
    zones: Zones,
    /// Walkable area.
    nav: Arc<NavArea>,
    /// Entity table.
    arena: Arena,
    /// The shard's only source of randomness.
    rng: ChaCha8Rng,
    /// Delayed actions.
    scheduler: Scheduler,
    /// Pending client intents.
    intents: IntentQueue,
    /// World item drops.
    spawner: Box<dyn LootSpawner>,
    /// Character storage.
    store: Box<dyn CharacterStore>,
    /// Broadcast queue.
    outbox: Outbox,
    /// Shard clock in seconds.
    now: f64,
    /// Completed ticks.
    tick: u64,
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("seed", &self.seed)
            .field("tick", &self.tick)
            .field("now", &self.now)
            .field("entities", &self.arena.entity_count())
            .field("scheduled", &self.scheduler.len())
            .field("intents", &self.intents.len())
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Creates an empty shard.
    ///
    /// Drops are recorded in memory and characters are stored in memory
    /// until [`with_spawner`](Self::with_spawner) and
    /// [`with_store`](Self::with_store) replace them.
    ///
    /// # Arguments
    ///
    /// * `seed` - Seed of the shard's random generator
    /// * `config` - Gameplay tuning
    /// * `catalog` - Templates
    /// * `zones` - Safe zones, PvP zones and spawn points
    /// * `nav` - Walkable area
    #[must_use]
    pub fn new(seed: u64, config: SimConfig, catalog: Arc<Catalog>, zones: Zones, nav: Arc<NavArea>) -> Self {
        let mut scheduler = Scheduler::new();
        if config.autosave_interval > 0.0 {
            scheduler.schedule(config.autosave_interval, ScheduledAction::Autosave);
        }
        Self {
            seed,
            intents: IntentQueue::new(config.max_pending_intents),
            config,
            catalog,
            zones,
            nav,
            arena: Arena::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            scheduler,
            spawner: Box::new(RecordingSpawner::default()),
            store: Box::new(MemoryStore::new()),
            outbox: Outbox::new(),
            now: 0.0,
            tick: 0,
        }
    }

    /// Replaces the loot spawner.
    #[must_use]
    pub fn with_spawner(mut self, spawner: Box<dyn LootSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Replaces the character store.
    #[must_use]
    pub fn with_store(mut self, store: Box<dyn CharacterStore>) -> Self {
        self.store = store;
        self
    }

    // =========================================================================
    // Spawning and sessions
    // =========================================================================

    /// Adds a prepared entity.
    pub fn spawn(&mut self, entity: Entity) -> EntityId {
        let id = self.arena.spawn(entity);
        debug!(entity = %id, "spawned");
        id
    }

    /// Spawns a wild monster from a catalog template.
    ///
    /// # Errors
    ///
    /// [`CatalogError`] if the template or one of its skills is unknown.
    pub fn spawn_monster(&mut self, template: &str, position: Vec2) -> Result<EntityId, CatalogError> {
        let template = Arc::clone(self.catalog.monster(template)?);
        let position = self.nav.nearest_walkable(position);
        let monster = Entity::monster(&template, &self.catalog, &self.nav, &self.config, position)?;
        Ok(self.spawn(monster))
    }

    /// Spawns a stationary NPC.
    pub fn spawn_npc(&mut self, name: &str, base: BaseStats, position: Vec2) -> EntityId {
        let npc = Entity::npc(name, base, &self.nav, position);
        self.spawn(npc)
    }

    /// Creates a new character, saves it and brings it online.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::InvalidName`] if a character with that name is
    /// online or stored, a catalog error for an unknown class, or a storage
    /// failure.
    pub fn create_player(&mut self, name: &str, class: &str, position: Vec2) -> Result<EntityId, PersistenceError> {
        if self.arena.find_player(name).is_some() || self.store.load(name)?.is_some() {
            return Err(PersistenceError::InvalidName(name.to_owned()));
        }
        let position = self.nav.nearest_walkable(position);
        let player = Entity::player(name, class, &self.catalog, &self.nav, &self.config, position)?;
        if let Some(record) = CharacterRecord::capture(&player, self.now) {
            self.store.save(&record)?;
        }
        let id = self.spawn(player);
        info!(player = name, entity = %id, "character created");
        Ok(id)
    }

    /// Loads a stored character and brings it online. Logging in twice
    /// returns the existing entity.
    ///
    /// # Errors
    ///
    /// [`PersistenceError::NotFound`] if nothing is stored under `name`,
    /// or any load failure.
    pub fn login(&mut self, name: &str) -> Result<EntityId, PersistenceError> {
        if let Some(id) = self.arena.find_player(name) {
            return Ok(id);
        }
        let record = self
            .store
            .load(name)?
            .ok_or_else(|| PersistenceError::NotFound(name.to_owned()))?;
        let player = record.restore(&self.catalog, &self.nav, &self.config, self.now)?;
        let id = self.spawn(player);
        info!(player = name, entity = %id, "logged in");
        Ok(id)
    }

    /// Saves a player and takes it offline.
    ///
    /// A save failure is logged and the session is dropped anyway.
    ///
    /// # Errors
    ///
    /// - [`IntentError::UnknownEntity`] if `id` is not an online player
    /// - [`IntentError::InCombat`] if the player was in combat less than
    ///   `logout_combat_delay` seconds ago
    pub fn logout(&mut self, id: EntityId) -> Result<(), IntentError> {
        let player = self
            .arena
            .get(id)
            .filter(|entity| entity.is_player())
            .ok_or(IntentError::UnknownEntity(id))?;
        if self.now - player.last_combat < self.config.logout_combat_delay {
            return Err(IntentError::InCombat);
        }
        self.save(id);
        self.drop_session(id);
        Ok(())
    }

    /// Queues an intent for the next tick.
    ///
    /// # Errors
    ///
    /// [`IntentError::UnknownEntity`] if `id` is not an online player,
    /// [`IntentError::QueueFull`] if too many intents are pending.
    pub fn submit(&mut self, id: EntityId, intent: Intent) -> Result<(), IntentError> {
        if !self.arena.get(id).is_some_and(Entity::is_player) {
            return Err(IntentError::UnknownEntity(id));
        }
        self.intents.push(id, intent)
    }

    /// Saves every online player. Players whose save fails are dropped.
    pub fn save_all(&mut self) {
        let players: Vec<EntityId> = self
            .arena
            .entities_sorted()
            .filter(|entity| entity.is_player())
            .map(Entity::id)
            .collect();
        let mut saved = 0;
        for id in players {
            if self.save(id) {
                saved += 1;
            } else {
                self.drop_session(id);
            }
        }
        debug!(saved, "autosave");
    }

    fn save(&mut self, id: EntityId) -> bool {
        let Some(record) = self
            .arena
            .get(id)
            .and_then(|entity| CharacterRecord::capture(entity, self.now))
        else {
            return false;
        };
        match self.store.save(&record) {
            Ok(()) => true,
            Err(err) => {
                error!(player = %record.name, %err, "save failed");
                false
            }
        }
    }

    /// Removes a player, its trade, its activity and its summon.
    fn drop_session(&mut self, id: EntityId) {
        let Some(mut player) = self.arena.take(id) else {
            return;
        };
        self.with_context(|ctx| {
            trade::cancel(&mut player, ctx);
            activity::abort(&mut player, ctx);
        });
        if let Some(summon) = player.as_player().and_then(|p| p.summon) {
            self.scheduler.cancel_for(summon);
            self.arena.despawn(summon);
        }
        self.arena.restore(player);
        self.arena.despawn(id);
        self.intents.remove(id);
        self.scheduler.cancel_for(id);
        info!(entity = %id, "session closed");
    }

    // =========================================================================
    // Tick
    // =========================================================================

    /// Runs one tick and returns everything broadcast during it.
    pub fn step(&mut self) -> Vec<Broadcast> {
        self.outbox.begin_tick(self.tick);
        self.now += f64::from(self.config.tick_interval());

        self.apply_intents();
        self.refresh_interest();
        self.update_entities();
        self.run_scheduled();
        self.flush();

        self.tick += 1;
        self.outbox.drain()
    }

    fn with_context<R>(&mut self, f: impl FnOnce(&mut TickContext<'_>) -> R) -> R {
        let mut ctx = TickContext {
            now: self.now,
            dt: self.config.tick_interval(),
            tick: self.tick,
            config: &self.config,
            catalog: &self.catalog,
            zones: &self.zones,
            nav: &self.nav,
            arena: &mut self.arena,
            rng: &mut self.rng,
            scheduler: &mut self.scheduler,
            spawner: self.spawner.as_mut(),
            outbox: &mut self.outbox,
        };
        f(&mut ctx)
    }

    fn apply_intents(&mut self) {
        let pending = self.intents.drain();
        self.with_context(|ctx| {
            for (id, intents) in pending {
                let Some(mut entity) = ctx.arena.take(id) else {
                    continue;
                };
                for intent in intents {
                    if let Err(err) = intent::apply(&mut entity, intent, ctx) {
                        debug!(entity = %id, %err, "intent rejected");
                        ctx.info(id, err.to_string());
                    }
                }
                ctx.arena.restore(entity);
            }
        });
    }

    /// Zone flags for everyone, observer counts from visible players.
    fn refresh_interest(&mut self) {
        for entity in self.arena.entities_sorted_mut() {
            let position = entity.position();
            entity.in_safe_zone = self.zones.is_safe(position);
            entity.in_pvp_zone = self.zones.is_pvp(position);
            entity.observers = 0;
        }
        let viewers: Vec<Vec2> = self
            .arena
            .entities_sorted()
            .filter(|entity| entity.is_player() && entity.is_visible())
            .map(Entity::position)
            .collect();
        for viewer in viewers {
            for id in self.arena.query_radius(viewer, self.config.interest_radius) {
                if let Some(entity) = self.arena.get_mut(id) {
                    entity.observers += 1;
                }
            }
        }
    }

    fn update_entities(&mut self) {
        let ids = self.arena.ids();
        self.with_context(|ctx| {
            for id in ids {
                let Some(mut entity) = ctx.arena.take(id) else {
                    continue;
                };
                if entity.is_worth_updating() {
                    entity.advance_movement(ctx.dt);
                    entity.recover(ctx.dt);
                    if entity.buffs.cleanup(ctx.now) > 0 {
                        entity.dirty |= DirtyFlags::BUFFS;
                        entity.clamp_pools();
                    }
                    entity.update_server(ctx);
                }
                ctx.arena.restore(entity);
            }
        });
    }

    fn run_scheduled(&mut self) {
        for action in self.scheduler.pop_due(self.now) {
            match action {
                ScheduledAction::Despawn(id) => {
                    if self.arena.get(id).is_some_and(Entity::is_player) {
                        warn!(entity = %id, "refusing to despawn a player");
                        continue;
                    }
                    self.arena.despawn(id);
                    self.intents.remove(id);
                    debug!(entity = %id, "despawned");
                }
                ScheduledAction::RepeatActivity { entity, recipe, repeat } => {
                    let Some(player) = self
                        .arena
                        .get_mut(entity)
                        .filter(|e| e.is_alive() && e.state() == EntityState::Idle)
                        .and_then(Entity::as_player_mut)
                    else {
                        continue;
                    };
                    player.activity_request = Some(ActivityRequest { recipe, repeat });
                }
                ScheduledAction::Autosave => {
                    self.save_all();
                    self.scheduler
                        .schedule(self.now + self.config.autosave_interval, ScheduledAction::Autosave);
                }
            }
        }
    }

    fn flush(&mut self) {
        for entity in self.arena.entities_sorted_mut() {
            let id = entity.id();
            if let Some((destination, stopping_distance)) = entity
                .movement
                .as_rubberband_mut()
                .and_then(|agent| agent.take_navigate_request())
            {
                self.outbox.push(
                    id,
                    Audience::Owner,
                    Notification::NavigateRequested {
                        destination,
                        stopping_distance,
                    },
                );
            }
            let changed = std::mem::take(&mut entity.dirty);
            if changed.is_empty() {
                continue;
            }
            if changed.contains(DirtyFlags::WARPED) {
                self.outbox.push(
                    id,
                    Audience::Observers,
                    Notification::Warped {
                        position: entity.position(),
                    },
                );
            }
            self.outbox.push(
                id,
                Audience::Observers,
                Notification::Snapshot(EntitySnapshot::capture(entity, changed)),
            );
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The entity table.
    #[must_use]
    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// The entity table, mutable. For setup between steps.
    pub fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    /// Gameplay tuning.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Templates.
    #[must_use]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Zones.
    #[must_use]
    pub fn zones(&self) -> &Zones {
        &self.zones
    }

    /// Character storage.
    #[must_use]
    pub fn store(&self) -> &dyn CharacterStore {
        self.store.as_ref()
    }

    /// Delayed actions.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Number of intents waiting for the next tick.
    #[must_use]
    pub fn pending_intents(&self) -> usize {
        self.intents.len()
    }

    /// Shard clock in seconds.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Number of completed ticks.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Seed of the random generator.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

// =============================================================================
// World
// =============================================================================

/// Independent shards stepped in parallel.
///
/// Shards never share mutable state, so each tick runs every shard on the
/// rayon pool and collects the broadcasts in shard order.
#[derive(Debug, Default)]
pub struct World {
    shards: Vec<Simulation>,
}

impl World {
    /// Creates a world without shards.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a shard and returns its index.
    pub fn add_shard(&mut self, shard: Simulation) -> usize {
        self.shards.push(shard);
        self.shards.len() - 1
    }

    /// A shard by index.
    #[must_use]
    pub fn shard(&self, index: usize) -> Option<&Simulation> {
        self.shards.get(index)
    }

    /// A shard by index, mutable.
    pub fn shard_mut(&mut self, index: usize) -> Option<&mut Simulation> {
        self.shards.get_mut(index)
    }

    /// Number of shards.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    /// True if there are no shards.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shards.is_empty()
    }

    /// Steps every shard once, in parallel.
    ///
    /// # Returns
    ///
    /// The broadcasts of each shard, indexed like the shards.
    pub fn step(&mut self) -> Vec<Vec<Broadcast>> {
        self.shards.par_iter_mut().map(Simulation::step).collect()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::helpers::{sample_catalog, test_nav};

    fn shard(seed: u64) -> Simulation {
        Simulation::new(
            seed,
            SimConfig::default(),
            Arc::new(sample_catalog()),
            Zones::default(),
            test_nav(),
        )
    }

    mod tick_tests {
        use super::*;

        #[test]
        fn step_advances_clock_and_tick() {
            let mut sim = shard(1);
            sim.step();
            sim.step();
            assert_eq!(sim.tick(), 2);
            assert!((sim.now() - 2.0 / 30.0).abs() < 1e-6);
        }

        #[test]
        fn first_flush_sends_full_snapshot() {
            let mut sim = shard(1);
            let npc = sim.spawn_npc("Merchant", BaseStats::default(), Vec2::new(5.0, 5.0));
            let broadcasts = sim.step();
            let snapshot = broadcasts
                .iter()
                .find(|b| b.source() == npc)
                .map(Broadcast::notification);
            assert!(matches!(snapshot, Some(Notification::Snapshot(_))));
            assert!(sim.step().iter().all(|b| b.source() != npc));
        }

        #[test]
        fn flush_clears_dirty_flags() {
            let mut sim = shard(1);
            let npc = sim.spawn_npc("Merchant", BaseStats::default(), Vec2::new(5.0, 5.0));
            assert!(!sim.arena().get(npc).unwrap().dirty.is_empty());
            sim.step();
            assert_eq!(sim.arena().get(npc).unwrap().dirty, DirtyFlags::default());
        }

        #[test]
        fn unobserved_monsters_are_not_updated() {
            let mut sim = shard(1);
            let wolf = sim.spawn_monster("Wolf", Vec2::new(50.0, 50.0)).unwrap();
            sim.arena_mut().get_mut(wolf).unwrap().set_health(0);
            sim.step();
            assert_eq!(sim.arena().get(wolf).unwrap().state(), EntityState::Idle);

            sim.create_player("Ayla", "Knight", Vec2::new(45.0, 50.0)).unwrap();
            sim.step();
            assert_eq!(sim.arena().get(wolf).unwrap().state(), EntityState::Dead);
        }
    }

    mod session_tests {
        use super::*;

        #[test]
        fn logout_saves_and_login_restores() {
            let mut sim = shard(1);
            let id = sim.create_player("Ayla", "Knight", Vec2::new(10.0, 10.0)).unwrap();
            sim.arena_mut().get_mut(id).unwrap().gold = 99;
            sim.step();
            sim.logout(id).unwrap();
            assert!(sim.arena().get(id).is_none());
            assert_eq!(sim.store().load("Ayla").unwrap().unwrap().gold, 99);

            let again = sim.login("Ayla").unwrap();
            assert_ne!(again, id);
            assert_eq!(sim.arena().get(again).unwrap().gold, 99);
        }

        #[test]
        fn logout_blocked_in_combat() {
            let mut sim = shard(1);
            let id = sim.create_player("Ayla", "Knight", Vec2::new(10.0, 10.0)).unwrap();
            sim.step();
            let now = sim.now();
            sim.arena_mut().get_mut(id).unwrap().last_combat = now;
            assert_eq!(sim.logout(id), Err(IntentError::InCombat));
        }

        #[test]
        fn duplicate_names_rejected() {
            let mut sim = shard(1);
            sim.create_player("Ayla", "Knight", Vec2::ZERO).unwrap();
            assert!(matches!(
                sim.create_player("Ayla", "Knight", Vec2::ZERO),
                Err(PersistenceError::InvalidName(_))
            ));
            assert!(matches!(sim.login("Nobody"), Err(PersistenceError::NotFound(_))));
        }

        #[test]
        fn submit_rejects_non_players() {
            let mut sim = shard(1);
            let npc = sim.spawn_npc("Merchant", BaseStats::default(), Vec2::ZERO);
            assert_eq!(
                sim.submit(npc, Intent::CancelAction),
                Err(IntentError::UnknownEntity(npc))
            );
        }
    }

    mod world_tests {
        use super::*;

        #[test]
        fn shards_step_independently() {
            let mut world = World::new();
            world.add_shard(shard(1));
            world.add_shard(shard(2));
            let broadcasts = world.step();
            assert_eq!(broadcasts.len(), 2);
            assert_eq!(world.shard(0).unwrap().tick(), 1);
            assert_eq!(world.shard(1).unwrap().tick(), 1);
        }
    }
}
