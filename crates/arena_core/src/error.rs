//! Error types for the combat simulation.
//!
//! Runtime combat never fails: invalid targets, double deaths and stale
//! continuations are recovered locally. These errors cover API misuse by the
//! collaborators (board, shop, loader) and configuration problems.

use thiserror::Error;

use crate::unit::{UnitId, UnitState};

/// Result type alias using [`ArenaError`].
pub type Result<T> = std::result::Result<T, ArenaError>;

/// Top-level error type for simulation operations.
#[derive(Debug, Error)]
pub enum ArenaError {
    /// Invalid unit identifier.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// The requested tile does not exist on the board.
    #[error("Tile {0} is outside the board")]
    InvalidTile(u32),

    /// The requested tile already holds another live unit.
    #[error("Tile {tile} is already occupied by unit {occupant}")]
    TileOccupied {
        /// Tile that was requested.
        tile: u32,
        /// Unit currently on that tile.
        occupant: UnitId,
    },

    /// A state transition was requested that the unit cannot make right now.
    #[error("Unit {unit} cannot move from {from:?} to {to:?}: {reason}")]
    InvalidTransition {
        /// Unit that was asked to transition.
        unit: UnitId,
        /// Current state.
        from: UnitState,
        /// Requested state.
        to: UnitState,
        /// Human-readable reason.
        reason: &'static str,
    },

    /// A round operation was issued in the wrong phase.
    #[error("Invalid round phase: {0}")]
    InvalidPhase(String),

    /// Configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invalid simulation state (serialization failures and similar).
    #[error("Invalid simulation state: {0}")]
    InvalidState(String),
}

/// Configuration validation failure.
///
/// Collects every problem found so a malformed file is reported once, at load
/// time, instead of surfacing as per-tick faults.
#[derive(Debug, Error)]
#[error("Invalid configuration ({} problem(s)): {}", .problems.len(), .problems.join("; "))]
pub struct ConfigError {
    /// Individual validation problems.
    pub problems: Vec<String>,
}

impl ConfigError {
    /// Create a configuration error from a list of problems.
    #[must_use]
    pub fn new(problems: Vec<String>) -> Self {
        Self { problems }
    }
}
