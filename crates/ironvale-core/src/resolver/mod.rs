//! Resolver module: where skill effects become state mutations.
//!
//! Skills decide *what* should happen to whom; the functions here apply it
//! to the victim stored in the arena. They are the only place where one
//! entity's health is lowered by another.
//!
//! # Invariants
//!
//! - Every random draw goes through the shard generator in a fixed order,
//!   so resolution is deterministic for a given seed and update order.
//! - Health and mana stay within `[0, max]` after every resolution.
//! - Dying is not handled here. The victim's state machine observes
//!   `health == 0` on its own next update.
//!
//! # Available Functions
//!
//! - [`deal_damage_at`]: block, defense, critical, wear, stun and aggro
//! - [`heal`]: capped health and mana restoration

mod combat;

pub use combat::{deal_damage_at, heal, DamageKind, DamageOutcome};
