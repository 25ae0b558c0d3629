//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a combat round produces
//! identical results given identical line-ups.
//!
//! # Testing Strategy
//!
//! Round replays and balance batches only mean something if the same
//! board always plays out the same way. Sources of non-determinism include:
//!
//! - **Floating-point math**: We use fixed-point arithmetic via
//!   [`arena_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Units update in sorted ID order and
//!   every keyed collection in the core is a `BTreeMap`.
//!
//! - **Wall-clock time**: The tick length comes from the config, never
//!   from a frame delta.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual subsystems (damage, mana, traits)
//! 2. **Property tests**: Random rosters must still play out identically
//! 3. **Parallel tests**: N copies of a round on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use arena_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic round).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of parallel simulation runs.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash from each simulation.
    pub hashes: Vec<u64>,
    /// Number of ticks each simulation ran.
    pub ticks: u64,
    /// Number of simulations run.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Check if all simulations produced identical results.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Assert all simulations matched.
    ///
    /// # Panics
    ///
    /// Panics if simulations produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel simulations diverged!\n\
                 Simulations: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use arena_test_utils::determinism::verify_determinism;
/// use arena_test_utils::fixtures::skirmish;
///
/// let result = verify_determinism(
///     3,
///     100,
///     || {
///         let mut arena = skirmish();
///         arena.start().unwrap();
///         arena.sim
///     },
///     |sim| { sim.tick(); },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a [`Simulation`] twice from the same setup and compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run N simulations on N scoped threads and collect final hashes.
///
/// Catches non-determinism that only shows up under thread scheduling or
/// memory layout differences.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> ParallelSimResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| match h.join() {
                Ok(hash) => hash,
                Err(_) => panic!("simulation thread panicked"),
            })
            .collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// Compare two runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs agree, `Some(tick)` for the first tick whose
/// state hashes differ (0 means the setups already differ).
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Verify that a serialization round-trip preserves state exactly, and that
/// the restored copy keeps playing identically.
pub fn verify_serialization_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    let mut sim = setup_fn();

    for _ in 0..num_ticks {
        sim.tick();
    }

    let Ok(bytes) = sim.serialize() else {
        return false;
    };
    let Ok(mut restored) = Simulation::deserialize(&bytes) else {
        return false;
    };

    if sim.state_hash() != restored.state_hash() {
        return false;
    }

    for _ in 0..num_ticks {
        sim.tick();
        restored.tick();
    }

    sim.state_hash() == restored.state_hash()
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for combat inputs.
pub mod strategies {
    use arena_core::abilities::AbilityKind;
    use arena_core::data::UnitTemplate;
    use arena_core::math::Fixed;
    use arena_core::synergy::TraitId;
    use proptest::prelude::*;

    /// Armor values, including ones far past the mitigation clamp.
    pub fn arb_armor() -> impl Strategy<Value = u32> {
        0u32..=400
    }

    /// Raw damage per hit.
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        0u32..=2_000
    }

    /// Unit health pools.
    pub fn arb_health() -> impl Strategy<Value = u32> {
        50u32..=3_000
    }

    /// A sequence of mana gains.
    pub fn arb_mana_gains(max_len: usize) -> impl Strategy<Value = Vec<u32>> {
        prop::collection::vec(0u32..=60, 1..max_len)
    }

    /// Any trait.
    pub fn arb_trait() -> impl Strategy<Value = TraitId> {
        prop_oneof![
            Just(TraitId::Guardian),
            Just(TraitId::Titan),
            Just(TraitId::Berserker),
            Just(TraitId::Warlord),
            Just(TraitId::Reaper),
            Just(TraitId::Packbond),
        ]
    }

    /// Any ability.
    pub fn arb_ability() -> impl Strategy<Value = AbilityKind> {
        prop_oneof![
            Just(AbilityKind::AlternatingStrike),
            Just(AbilityKind::TwinShot),
            Just(AbilityKind::Fortify),
            Just(AbilityKind::SoulBinder),
            Just(AbilityKind::NeedleVolley),
            Just(AbilityKind::Reap),
            Just(AbilityKind::Leap),
        ]
    }

    /// Attack range: melee or a short ranged reach.
    pub fn arb_attack_range() -> impl Strategy<Value = Fixed> {
        prop_oneof![Just(1i32), 2i32..=5].prop_map(Fixed::from_num)
    }

    /// A unit template with random stats, traits and ability.
    pub fn arb_template() -> impl Strategy<Value = UnitTemplate> {
        (
            arb_health(),
            10u32..=120,
            0u32..=80,
            arb_attack_range(),
            prop::collection::vec(arb_trait(), 0..3),
            prop::option::of((arb_ability(), 30u32..=120)),
        )
            .prop_map(|(health, damage, armor, range, traits, ability)| {
                let mut template = UnitTemplate::new("generated", health, damage)
                    .with_armor(armor)
                    .with_range(range);
                for trait_id in traits {
                    if !template.has_trait(trait_id) {
                        template = template.with_trait(trait_id);
                    }
                }
                if let Some((kind, mana)) = ability {
                    template = template.with_ability(kind, mana);
                }
                template
            })
    }

    /// A roster of up to `max_units` templates.
    pub fn arb_roster(max_units: usize) -> impl Strategy<Value = Vec<UnitTemplate>> {
        prop::collection::vec(arb_template(), 1..=max_units)
    }
}
