//! Crate-level tests.
//!
//! - `helpers.rs`: Test shard, entity factories and the sample catalog
//! - `integration.rs`: Full simulation flows driven through intents
//! - `determinism.rs`: Same seed, same output; property tests on combat

mod determinism;
pub mod helpers;
mod integration;
