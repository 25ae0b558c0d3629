//! Scenario loading and configuration.
//!
//! A scenario is a RON file describing a board, the units on each side and
//! how many rounds to play. Tuning can be overridden inline or by pointing
//! at a separate config file.
//!
//! ```ron
//! Scenario(
//!     name: "duel",
//!     rounds: 2,
//!     units: [
//!         (team: Player, tile: Some((3, 1)), template: (
//!             name: "knight", health: 600, attack_damage: 50,
//!             attack_speed: 4294967296, attack_range: 4294967296,
//!             move_speed: 8589934592,
//!         )),
//!     ],
//! )
//! ```

use std::path::{Path, PathBuf};

use arena_core::board::GridBoard;
use arena_core::data::{SimulationConfig, UnitTemplate};
use arena_core::error::{ArenaError, ConfigError};
use arena_core::simulation::Simulation;
use arena_core::unit::Team;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// Tuning override is invalid.
    #[error("Invalid scenario config: {0}")]
    Config(#[from] ConfigError),
    /// The simulation rejected the setup.
    #[error("Scenario setup failed: {0}")]
    Setup(#[from] ArenaError),
    /// Grid cell outside the board.
    #[error("Unit '{name}' placed off the board at ({x}, {y})")]
    OffBoard {
        /// Unit type name.
        name: String,
        /// Column.
        x: u32,
        /// Row.
        y: u32,
    },
}

/// One unit on the starting board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitPlacement {
    /// Side.
    pub team: Team,
    /// Grid cell `(x, y)`. `None` leaves the unit on the bench.
    #[serde(default)]
    pub tile: Option<(u32, u32)>,
    /// Star level to upgrade to before the first round.
    #[serde(default = "default_star")]
    pub star: u8,
    /// Unit definition.
    pub template: UnitTemplate,
}

fn default_star() -> u8 {
    1
}

fn default_rounds() -> u32 {
    1
}

fn default_round_ticks() -> u32 {
    2_400
}

fn default_board() -> (u32, u32) {
    (8, 8)
}

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Inline tuning override.
    #[serde(default)]
    pub config: Option<SimulationConfig>,
    /// Tuning file, relative to the scenario file. Ignored when `config` is set.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    /// Board size in tiles.
    #[serde(default = "default_board")]
    pub board: (u32, u32),
    /// Rounds to play.
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    /// Tick limit per round. A round that hits it ends without an outcome.
    #[serde(default = "default_round_ticks")]
    pub max_ticks_per_round: u32,
    /// Starting units.
    #[serde(default)]
    pub units: Vec<UnitPlacement>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: "Default Duel".to_string(),
            description: "Two units per side".to_string(),
            config: None,
            config_path: None,
            board: default_board(),
            rounds: default_rounds(),
            max_ticks_per_round: default_round_ticks(),
            units: Vec::new(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a RON file.
    ///
    /// A relative `config_path` is resolved against the scenario's directory
    /// and loaded into `config`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        let mut scenario = Self::from_ron_str(&contents)?;

        if scenario.config.is_none() {
            if let Some(config_path) = &scenario.config_path {
                let resolved = match path.parent() {
                    Some(dir) if config_path.is_relative() => dir.join(config_path),
                    _ => config_path.clone(),
                };
                debug!("Loading scenario config from {}", resolved.display());
                scenario.config = Some(load_config(&resolved)?);
            }
        }
        Ok(scenario)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Effective tuning.
    #[must_use]
    pub fn effective_config(&self) -> SimulationConfig {
        self.config.clone().unwrap_or_default()
    }

    /// Build the simulation and board in the planning phase.
    pub fn build(&self) -> Result<(Simulation, GridBoard), ScenarioError> {
        let mut sim = Simulation::with_config(self.effective_config())?;
        let (width, height) = self.board;
        if width == 0 || height == 0 {
            return Err(ScenarioError::OffBoard {
                name: "<board>".to_string(),
                x: width,
                y: height,
            });
        }
        let mut board = GridBoard::new(width, height);

        self.deploy(&mut sim, &mut board, Team::Player)?;
        self.deploy_enemies(&mut sim, &mut board)?;
        Ok((sim, board))
    }

    /// Register and place the enemy wave.
    ///
    /// Enemies are destroyed at round end, so every round after the first
    /// calls this again.
    pub fn deploy_enemies(
        &self,
        sim: &mut Simulation,
        board: &mut GridBoard,
    ) -> Result<(), ScenarioError> {
        self.deploy(sim, board, Team::Enemy)
    }

    fn deploy(
        &self,
        sim: &mut Simulation,
        board: &mut GridBoard,
        team: Team,
    ) -> Result<(), ScenarioError> {
        for placement in self.units.iter().filter(|p| p.team == team) {
            let id = sim.register_unit(&placement.template, team);
            for _ in 1..placement.star {
                sim.upgrade_star(id)?;
            }
            if let Some((x, y)) = placement.tile {
                let tile = board.tile_at(x, y).ok_or_else(|| ScenarioError::OffBoard {
                    name: placement.template.name.clone(),
                    x,
                    y,
                })?;
                sim.place_unit(board, id, tile)?;
            }
        }
        Ok(())
    }
}

/// Load and validate a [`SimulationConfig`] from a RON file.
pub fn load_config(path: &Path) -> Result<SimulationConfig, ScenarioError> {
    if !path.exists() {
        return Err(ScenarioError::FileNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(SimulationConfig::from_ron(&contents)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const DUEL: &str = r#"
        Scenario(
            name: "duel",
            rounds: 2,
            units: [
                (team: Player, tile: Some((3, 1)), template: (
                    name: "knight", health: 600, attack_damage: 50,
                    attack_speed: 4294967296, attack_range: 4294967296,
                    move_speed: 8589934592, armor: 20,
                )),
                (team: Enemy, tile: Some((3, 6)), star: 2, template: (
                    name: "raider", health: 500, attack_damage: 40,
                    attack_speed: 4294967296, attack_range: 4294967296,
                    move_speed: 8589934592,
                )),
            ],
        )
    "#;

    #[test]
    fn test_default_scenario() {
        let scenario = Scenario::default();
        assert_eq!(scenario.board, (8, 8));
        assert_eq!(scenario.rounds, 1);
        assert!(scenario.units.is_empty());
    }

    #[test]
    fn test_parse_and_build() {
        let scenario = Scenario::from_ron_str(DUEL).unwrap();
        assert_eq!(scenario.name, "duel");
        assert_eq!(scenario.rounds, 2);
        assert_eq!(scenario.max_ticks_per_round, 2_400);

        let (sim, board) = scenario.build().unwrap();
        assert_eq!(sim.units().len(), 2);
        assert_eq!(board.occupied_count(), 2);
        let raider = sim.units().iter().find(|(_, u)| u.name == "raider").unwrap().1;
        assert_eq!(raider.star, 2);
    }

    #[test]
    fn test_off_board_placement_is_rejected() {
        let mut scenario = Scenario::from_ron_str(DUEL).unwrap();
        scenario.units[0].tile = Some((9, 9));
        assert!(matches!(scenario.build(), Err(ScenarioError::OffBoard { .. })));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Scenario::load("/nonexistent/scenario.ron");
        assert!(matches!(result, Err(ScenarioError::FileNotFound(_))));
    }

    #[test]
    fn test_load_with_config_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = std::fs::File::create(dir.path().join("fast.ron")).unwrap();
        writeln!(config, "(tick_rate: 30)").unwrap();

        let source = DUEL.replace("rounds: 2,", "rounds: 2, config_path: Some(\"fast.ron\"),");
        let path = dir.path().join("duel.ron");
        std::fs::write(&path, source).unwrap();

        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.effective_config().tick_rate, 30);
    }

    #[test]
    fn test_invalid_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ron");
        std::fs::write(&path, "(tick_rate: 0)").unwrap();
        assert!(matches!(load_config(&path), Err(ScenarioError::Config(_))));
    }
}
