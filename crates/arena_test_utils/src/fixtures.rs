//! Test fixtures and helpers.
//!
//! Unit templates with round numbers and a small [`Arena`] wrapper that
//! keeps a simulation and its board together for scenario tests.

use arena_core::abilities::AbilityKind;
use arena_core::board::{Board, GridBoard};
use arena_core::data::{SimulationConfig, UnitTemplate};
use arena_core::error::Result;
use arena_core::lifecycle::{RoundOutcome, RoundReport};
use arena_core::simulation::Simulation;
use arena_core::synergy::TraitId;
use arena_core::unit::{Team, UnitId};
use fixed::types::I32F32;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Sturdy melee unit with no ability.
#[must_use]
pub fn brawler(name: &str) -> UnitTemplate {
    UnitTemplate::new(name, 600, 50).with_armor(20)
}

/// Fragile ranged unit with no ability.
#[must_use]
pub fn archer(name: &str) -> UnitTemplate {
    UnitTemplate::new(name, 400, 45).with_range(fixed(4))
}

/// Melee unit carrying `ability` behind a 50 mana bar.
#[must_use]
pub fn caster(name: &str, ability: AbilityKind) -> UnitTemplate {
    UnitTemplate::new(name, 500, 40).with_ability(ability, 50)
}

/// Brawler tagged with a single trait.
#[must_use]
pub fn tagged(name: &str, trait_id: TraitId) -> UnitTemplate {
    brawler(name).with_trait(trait_id)
}

/// Parse a list of templates from RON.
///
/// # Panics
///
/// Panics if the source is not a valid template list.
#[must_use]
pub fn templates_from_ron(source: &str) -> Vec<UnitTemplate> {
    match ron::from_str(source) {
        Ok(templates) => templates,
        Err(e) => panic!("invalid template RON: {e}"),
    }
}

/// A simulation plus the board it plays on.
#[derive(Debug, Clone)]
pub struct Arena {
    /// The simulation under test.
    pub sim: Simulation,
    /// Its board.
    pub board: GridBoard,
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Arena {
    /// Empty arena with default tuning on an 8 x 8 board.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sim: Simulation::new(),
            board: GridBoard::default(),
        }
    }

    /// Empty arena with custom tuning.
    ///
    /// # Panics
    ///
    /// Panics if the configuration is invalid.
    #[must_use]
    pub fn with_config(config: SimulationConfig) -> Self {
        match Simulation::with_config(config) {
            Ok(sim) => Self {
                sim,
                board: GridBoard::default(),
            },
            Err(e) => panic!("invalid test config: {e}"),
        }
    }

    /// Register a unit on the bench.
    pub fn bench(&mut self, template: &UnitTemplate, team: Team) -> UnitId {
        self.sim.register_unit(template, team)
    }

    /// Register a unit and place it on grid cell `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if the cell is off the board or taken.
    pub fn deploy(&mut self, template: &UnitTemplate, team: Team, (x, y): (u32, u32)) -> UnitId {
        let id = self.sim.register_unit(template, team);
        let Some(tile) = self.board.tile_at(x, y) else {
            panic!("cell ({x}, {y}) is off the board");
        };
        if let Err(e) = self.sim.place_unit(&mut self.board, id, tile) {
            panic!("could not place unit {id}: {e}");
        }
        id
    }

    /// Start a round.
    ///
    /// # Errors
    ///
    /// Fails if a round is already running.
    pub fn start(&mut self) -> Result<()> {
        self.sim.start_round()
    }

    /// Tick until the round is decided or `limit` ticks pass.
    pub fn run_until_outcome(&mut self, limit: u32) -> Option<RoundOutcome> {
        for _ in 0..limit {
            if let Some(outcome) = self.sim.tick().outcome {
                return Some(outcome);
            }
        }
        None
    }

    /// Tick `n` times.
    pub fn advance(&mut self, n: u32) {
        for _ in 0..n {
            self.sim.tick();
        }
    }

    /// End the running round.
    ///
    /// # Errors
    ///
    /// Fails outside combat.
    pub fn finish(&mut self) -> Result<RoundReport> {
        self.sim.end_round(&mut self.board)
    }

    /// Unit currently on grid cell `(x, y)`.
    #[must_use]
    pub fn occupant(&self, x: u32, y: u32) -> Option<UnitId> {
        self.board.tile_at(x, y).and_then(|t| self.board.occupant(t))
    }
}

/// Four-versus-four line-up used by determinism and bench tests.
#[must_use]
pub fn skirmish() -> Arena {
    let mut arena = Arena::new();
    arena.deploy(&tagged("warden", TraitId::Guardian), Team::Player, (2, 0));
    arena.deploy(&tagged("bulwark", TraitId::Guardian), Team::Player, (3, 0));
    arena.deploy(&caster("sage", AbilityKind::Fortify), Team::Player, (4, 0));
    arena.deploy(&archer("longbow"), Team::Player, (5, 1));

    arena.deploy(&tagged("ravager", TraitId::Berserker), Team::Enemy, (2, 7));
    arena.deploy(&tagged("butcher", TraitId::Berserker), Team::Enemy, (3, 7));
    arena.deploy(&caster("seer", AbilityKind::NeedleVolley), Team::Enemy, (4, 7));
    arena.deploy(&archer("crossbow"), Team::Enemy, (5, 6));
    arena
}
