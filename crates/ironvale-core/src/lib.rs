//! # Ironvale Core
//!
//! Server-authoritative entity simulation for Ironvale.
//!
//! This crate owns everything that happens inside a world shard: players,
//! monsters and NPCs, their state machines, combat, loot, progression,
//! trading, crafting and persistence. Networking, rendering and the client
//! are outside the crate; they talk to it through [`intent::Intent`] values
//! in and [`output::Broadcast`] values out.
//!
//! ## Architecture
//!
//! - **Entities** ([`entity`]): one struct with shared fields and a
//!   per-kind payload for players, monsters and NPCs
//! - **State machines** (`fsm`): one update per tick per observed entity
//! - **Skills** ([`skill`]): cast checks, cast lifecycle and effects
//! - **Resolvers** ([`resolver`]): damage and healing applied to victims
//! - **Shards** ([`simulation`]): a deterministic single-threaded tick loop;
//!   independent shards run in parallel in a [`simulation::World`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ironvale_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(seed, config, catalog, zones, nav);
//! let player = sim.login("Ayla")?;
//! sim.submit(player, Intent::UseSkill { index: 0 })?;
//! for broadcast in sim.step() {
//!     network.send(broadcast);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod activity;
pub mod arena;
pub mod catalog;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod experience;
mod fsm;
pub mod intent;
pub mod item;
pub mod loot;
pub mod movement;
pub mod output;
pub mod persistence;
pub mod resolver;
pub mod schedule;
pub mod simulation;
pub mod skill;
pub mod stats;
pub mod trade;
pub mod zone;

pub use arena::Arena;
pub use entity::{Entity, EntityId, EntityKind, EntityState};
pub use simulation::{Simulation, World};

#[cfg(test)]
mod tests;
