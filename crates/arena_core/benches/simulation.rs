//! Simulation benchmarks for arena_core.
//!
//! Run with: `cargo bench -p arena_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use arena_core::board::GridBoard;
use arena_core::data::UnitTemplate;
use arena_core::math::Fixed;
use arena_core::simulation::Simulation;
use arena_core::synergy::TraitId;
use arena_core::unit::Team;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

/// Eight units per side facing each other across the board.
fn full_board() -> Simulation {
    let mut sim = Simulation::new();
    let mut board = GridBoard::default();
    let traits = [
        TraitId::Guardian,
        TraitId::Titan,
        TraitId::Berserker,
        TraitId::Warlord,
    ];
    for x in 0..8u32 {
        let trait_id = traits[(x % 4) as usize];
        let player = UnitTemplate::new(format!("ally{x}"), 700, 45)
            .with_armor(20)
            .with_trait(trait_id);
        let enemy = UnitTemplate::new(format!("foe{x}"), 650, 50)
            .with_range(Fixed::from_num(if x % 2 == 0 { 1 } else { 4 }))
            .with_trait(trait_id);

        let a = sim.register_unit(&player, Team::Player);
        let b = sim.register_unit(&enemy, Team::Enemy);
        let (front, back) = (x, 7 * 8 + x);
        let _ = sim.place_unit(&mut board, a, front);
        let _ = sim.place_unit(&mut board, b, back);
    }
    let _ = sim.start_round();
    sim
}

/// Runs simulation benchmarks for the arena_core crate.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("tick_16_units", |b| {
        b.iter_batched(
            full_board,
            |mut sim| {
                black_box(sim.tick());
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("round_to_outcome", |b| {
        b.iter_batched(
            full_board,
            |mut sim| {
                for _ in 0..2_000 {
                    if sim.tick().outcome.is_some() {
                        break;
                    }
                }
                black_box(sim.state_hash())
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("state_hash", |b| {
        let sim = full_board();
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
