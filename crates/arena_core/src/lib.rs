//! # Arena Core
//!
//! Deterministic combat simulation core for the arena autobattler.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! This separation enables:
//! - Headless batch runs and balance testing
//! - Round replays from a serialized snapshot
//! - Determinism testing via state hashes
//!
//! ## Crate Structure
//!
//! - [`simulation`] - Tick loop and public API
//! - [`lifecycle`] - Round start/end, soft death and restoration
//! - [`state_machine`] - Per-unit states and the combat AI loop
//! - [`targeting`], [`damage`], [`mana`] - The attack pipeline
//! - [`abilities`] - Ability catalogue
//! - [`synergy`] - Trait counting and bonuses
//! - [`events`] - Death bus and presentation notifications
//! - [`data`] - Tuning and unit templates
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod abilities;
pub mod board;
pub mod context;
pub mod damage;
pub mod data;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod mana;
pub mod math;
pub mod scheduler;
pub mod simulation;
pub mod state_machine;
pub mod synergy;
pub mod targeting;
pub mod unit;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::abilities::{AbilityDescription, AbilityKind};
    pub use crate::board::{Board, GridBoard};
    pub use crate::data::{SimulationConfig, UnitTemplate};
    pub use crate::error::{ArenaError, ConfigError, Result};
    pub use crate::events::{DeathEvent, PresentationEvent};
    pub use crate::lifecycle::{RoundOutcome, RoundPhase, RoundReport};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::simulation::{Simulation, TickEvents};
    pub use crate::synergy::{TraitId, TraitStatus};
    pub use crate::unit::{Team, TileId, Unit, UnitId, UnitState};
}
