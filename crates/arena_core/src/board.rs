//! Board collaborator: tile positions and tile occupancy.
//!
//! The simulation never owns the board. Operations that move units on or off
//! tiles take a `&mut dyn Board` so the same simulation state can be driven by
//! a rendered board, the headless runner or a test grid.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, Result};
use crate::math::{Fixed, Vec2Fixed};
use crate::unit::{TileId, UnitId};

/// Tile bookkeeping the simulation relies on.
///
/// Implementations must keep at most one unit per tile.
pub trait Board {
    /// World position of a tile center, or `None` if the tile does not exist.
    fn tile_position(&self, tile: TileId) -> Option<Vec2Fixed>;

    /// Record `unit` as the occupant of `tile`.
    fn assign_to_tile(&mut self, tile: TileId, unit: UnitId) -> Result<()>;

    /// Remove whatever unit occupies `tile`.
    fn clear_tile(&mut self, tile: TileId);

    /// Unit currently on `tile`.
    fn occupant(&self, tile: TileId) -> Option<UnitId>;
}

/// Rectangular board with unit-sized tiles numbered in row-major order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridBoard {
    /// Board width in tiles.
    width: u32,
    /// Board height in tiles.
    height: u32,
    /// Occupied tiles.
    occupants: BTreeMap<TileId, UnitId>,
}

impl GridBoard {
    /// Create an empty board.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "GridBoard width must be positive");
        assert!(height > 0, "GridBoard height must be positive");
        Self {
            width,
            height,
            occupants: BTreeMap::new(),
        }
    }

    /// Board width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Board height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Tile id at grid coordinates, if in bounds.
    #[must_use]
    pub fn tile_at(&self, x: u32, y: u32) -> Option<TileId> {
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    /// Grid coordinates of a tile, if it exists.
    #[must_use]
    pub fn coordinates(&self, tile: TileId) -> Option<(u32, u32)> {
        if tile < self.width * self.height {
            Some((tile % self.width, tile / self.width))
        } else {
            None
        }
    }

    /// Number of occupied tiles.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.occupants.len()
    }
}

impl Default for GridBoard {
    /// An 8 x 8 board, four rows per side.
    fn default() -> Self {
        Self::new(8, 8)
    }
}

impl Board for GridBoard {
    fn tile_position(&self, tile: TileId) -> Option<Vec2Fixed> {
        let (x, y) = self.coordinates(tile)?;
        let half = Fixed::ONE / Fixed::from_num(2);
        Some(Vec2Fixed::new(
            Fixed::from_num(x) + half,
            Fixed::from_num(y) + half,
        ))
    }

    fn assign_to_tile(&mut self, tile: TileId, unit: UnitId) -> Result<()> {
        if self.coordinates(tile).is_none() {
            return Err(ArenaError::InvalidTile(tile));
        }
        match self.occupants.get(&tile) {
            Some(&occupant) if occupant != unit => {
                Err(ArenaError::TileOccupied { tile, occupant })
            }
            _ => {
                self.occupants.insert(tile, unit);
                Ok(())
            }
        }
    }

    fn clear_tile(&mut self, tile: TileId) {
        self.occupants.remove(&tile);
    }

    fn occupant(&self, tile: TileId) -> Option<UnitId> {
        self.occupants.get(&tile).copied()
    }
}
