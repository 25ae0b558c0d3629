//! Round-level combat scenarios driven through the public simulation API.

use arena_core::abilities::AbilityKind;
use arena_core::board::Board;
use arena_core::data::UnitTemplate;
use arena_core::damage::DamageOutcome;
use arena_core::lifecycle::{RoundOutcome, RoundPhase};
use arena_core::mana::ManaOutcome;
use arena_core::math::Fixed;
use arena_core::synergy::TraitId;
use arena_core::unit::{Team, UnitState};
use arena_test_utils::fixtures::{brawler, fixed, tagged, Arena};

#[test]
fn forty_damage_three_times_kills_once() {
    let mut arena = Arena::new();
    let a = arena.deploy(&UnitTemplate::new("squire", 100, 10), Team::Player, (3, 0));
    let b = arena.deploy(&brawler("raider"), Team::Enemy, (3, 7));
    arena.start().unwrap();

    let mut seen = Vec::new();
    for _ in 0..3 {
        arena.sim.apply_damage(Some(b), a, fixed(40));
        seen.push(arena.sim.get_unit(a).unwrap().stats.current_health);
    }

    assert_eq!(seen, vec![fixed(60), fixed(20), Fixed::ZERO]);
    assert!(!arena.sim.get_unit(a).unwrap().is_alive);
    assert_eq!(arena.sim.death_history().len(), 1);
    assert_eq!(arena.sim.death_history()[0].killer, Some(b));
    assert_eq!(arena.sim.find_target(b), None);
    assert!(arena.sim.targetable_ids(Team::Player).is_empty());

    // Overkill on a corpse changes nothing.
    assert_eq!(arena.sim.apply_damage(Some(b), a, fixed(40)), DamageOutcome::Ignored);
    assert_eq!(arena.sim.death_history().len(), 1);
}

#[test]
fn restored_unit_dies_again_with_a_new_event() {
    let mut arena = Arena::new();
    let a = arena.deploy(&UnitTemplate::new("squire", 100, 10), Team::Player, (3, 0));
    let b = arena.deploy(&brawler("raider"), Team::Enemy, (3, 7));
    arena.start().unwrap();

    arena.sim.apply_damage(Some(b), a, fixed(500));
    assert!(arena.sim.restore_from_combat(a).unwrap());
    // The finished life's delivery record is dropped.
    assert_eq!(arena.sim.context().bus().delivered_len(), 0);
    // A second restore of a living unit is a no-op.
    assert!(!arena.sim.restore_from_combat(a).unwrap());

    let unit = arena.sim.get_unit(a).unwrap();
    assert!(unit.is_alive);
    assert_eq!(unit.stats.current_health, fixed(100));
    assert_eq!(unit.state, UnitState::Combat);

    arena.sim.apply_damage(Some(b), a, fixed(500));
    let history = arena.sim.death_history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].unit, history[1].unit);
    assert_ne!(history[0].life, history[1].life);
    assert_eq!(arena.sim.context().bus().delivered_len(), 1);
}

#[test]
fn round_end_restores_survivors_and_keeps_permanent_gains() {
    let mut arena = Arena::new();
    let sage = arena.deploy(
        &UnitTemplate::new("sage", 800, 40).with_ability(AbilityKind::Fortify, 30),
        Team::Player,
        (3, 1),
    );
    let dummy = arena.deploy(&UnitTemplate::new("dummy", 1_500, 0), Team::Enemy, (3, 6));
    let home = arena.sim.get_unit(sage).unwrap().tile;
    arena.start().unwrap();

    assert_eq!(arena.run_until_outcome(10_000), Some(RoundOutcome::Victory));
    let moved = arena.sim.get_unit(sage).unwrap().position;
    let report = arena.finish().unwrap();

    assert_eq!(report.outcome, Some(RoundOutcome::Victory));
    assert!(report.survivors.contains(&sage));
    assert!(arena.sim.get_unit(dummy).is_none());
    assert_eq!(arena.sim.phase(), RoundPhase::Planning);

    let unit = arena.sim.get_unit(sage).unwrap();
    assert_eq!(unit.state, UnitState::BoardIdle);
    assert_eq!(unit.tile, home);
    assert_ne!(unit.position, moved);
    assert_eq!(arena.occupant(3, 1), Some(sage));
    assert_eq!(unit.stats.current_mana, 0);
    assert!(unit.stats.permanent_bonus_health > Fixed::ZERO);
    assert_eq!(unit.stats.current_health, unit.stats.max_health());
    assert_eq!(
        unit.stats.max_health(),
        fixed(800) + unit.stats.permanent_bonus_health
    );
}

#[test]
fn round_end_refills_starting_mana() {
    let mut arena = Arena::new();
    let mut template = UnitTemplate::new("sage", 800, 40).with_ability(AbilityKind::Fortify, 50);
    template.starting_mana = 20;
    let sage = arena.deploy(&template, Team::Player, (3, 1));
    arena.deploy(&UnitTemplate::new("dummy", 5_000, 0), Team::Enemy, (3, 6));
    assert_eq!(arena.sim.get_unit(sage).unwrap().stats.current_mana, 20);

    arena.start().unwrap();
    assert_eq!(arena.sim.gain_mana(sage, 5), ManaOutcome::Gained);
    assert_eq!(arena.sim.get_unit(sage).unwrap().stats.current_mana, 25);
    arena.finish().unwrap();

    assert_eq!(arena.sim.get_unit(sage).unwrap().stats.current_mana, 20);
}

#[test]
fn fallen_player_unit_comes_back_next_round() {
    let mut arena = Arena::new();
    let squire = arena.deploy(&UnitTemplate::new("squire", 100, 1), Team::Player, (2, 0));
    let knight = arena.deploy(&brawler("knight"), Team::Player, (5, 0));
    let raider = arena.deploy(&brawler("raider"), Team::Enemy, (3, 7));
    arena.start().unwrap();

    arena.sim.apply_damage(Some(raider), squire, fixed(1_000));
    arena.advance(100);
    let report = arena.finish().unwrap();

    assert!(report.revived.contains(&squire));
    let unit = arena.sim.get_unit(squire).unwrap();
    assert!(unit.is_alive);
    assert!(!unit.hidden);
    assert_eq!(unit.stats.current_health, fixed(100));
    assert_eq!(arena.occupant(2, 0), Some(squire));
    assert_eq!(arena.occupant(5, 0), Some(knight));
}

#[test]
fn star_upgrade_scales_health_and_damage() {
    let mut arena = Arena::new();
    let id = arena.bench(&UnitTemplate::new("lancer", 555, 47), Team::Player);

    assert!(arena.sim.upgrade_star(id).unwrap());
    let unit = arena.sim.get_unit(id).unwrap();
    assert_eq!(unit.star, 2);
    assert_eq!(unit.stats.max_health(), fixed(999));
    assert_eq!(unit.stats.attack_damage, fixed(85));
    assert_eq!(unit.stats.current_health, fixed(999));
}

#[test]
fn star_upgrade_scales_earned_and_trait_health() {
    let mut arena = Arena::new();
    let sage = arena.deploy(
        &UnitTemplate::new("sage", 800, 40)
            .with_ability(AbilityKind::Fortify, 30)
            .with_trait(TraitId::Titan),
        Team::Player,
        (3, 1),
    );
    arena.deploy(&tagged("colossus", TraitId::Titan), Team::Player, (4, 1));
    arena.deploy(&UnitTemplate::new("dummy", 5_000, 0), Team::Enemy, (3, 6));
    arena.start().unwrap();
    assert_eq!(arena.sim.gain_mana(sage, 30), ManaOutcome::Cast);
    arena.finish().unwrap();
    arena.advance(1);

    let before = arena.sim.get_unit(sage).unwrap().clone();
    let titan = before.modifiers[&TraitId::Titan].applied_health;
    // 15% of 800 at the first Titan tier.
    assert_eq!(titan, fixed(120));
    let earned = before.stats.permanent_bonus_health - titan;
    assert!(earned > Fixed::ZERO);

    assert!(arena.sim.upgrade_star(sage).unwrap());
    let multiplier = arena.sim.config().combat.star_multiplier;
    let unit = arena.sim.get_unit(sage).unwrap();
    assert_eq!(unit.stats.base_max_health, fixed(1440));
    assert_eq!(unit.modifiers[&TraitId::Titan].applied_health, fixed(216));
    assert_eq!(
        unit.stats.max_health(),
        fixed(1440) + fixed(216) + (earned * multiplier).round()
    );
    assert_eq!(unit.stats.current_health, unit.stats.max_health());

    // Each portion rounds on its own, so the total lands within a point or two.
    let expected = (before.stats.max_health() * multiplier).round();
    assert!((unit.stats.max_health() - expected).abs() <= fixed(2));
}

#[test]
fn five_duplicates_count_once() {
    let mut arena = Arena::new();
    for x in 0..5 {
        arena.deploy(&tagged("knight", TraitId::Guardian), Team::Player, (x, 0));
    }

    let summary = arena.sim.trait_summary(Team::Player);
    let guardian = summary
        .iter()
        .find(|s| s.trait_id == TraitId::Guardian)
        .unwrap();
    assert_eq!(guardian.count, 1);
    assert_eq!(guardian.tier, 0);
    assert_eq!((guardian.met, guardian.next), (0, 2));
}

#[test]
fn distinct_units_reach_the_top_tier() {
    let mut arena = Arena::new();
    let names = ["a", "b", "c", "d", "e"];
    for (x, name) in names.iter().enumerate() {
        arena.deploy(&tagged(name, TraitId::Guardian), Team::Player, (x as u32, 0));
    }

    let summary = arena.sim.trait_summary(Team::Player);
    let guardian = summary
        .iter()
        .find(|s| s.trait_id == TraitId::Guardian)
        .unwrap();
    assert_eq!(guardian.count, 5);
    assert_eq!((guardian.met, guardian.next), (4, 0));
}

#[test]
fn lopsided_round_ends_in_defeat() {
    let mut arena = Arena::new();
    arena.deploy(&UnitTemplate::new("squire", 100, 5), Team::Player, (3, 1));
    arena.deploy(&UnitTemplate::new("ogre", 3_000, 120).with_armor(60), Team::Enemy, (3, 6));
    arena.start().unwrap();

    assert_eq!(arena.run_until_outcome(10_000), Some(RoundOutcome::Defeat));
    let report = arena.finish().unwrap();
    assert!(report.survivors.is_empty());
    assert_eq!(arena.sim.lifecycle().round(), 2);
}

#[test]
fn benched_unit_is_ignored_by_combat() {
    let mut arena = Arena::new();
    let reserve = arena.bench(&brawler("reserve"), Team::Player);
    arena.deploy(&brawler("knight"), Team::Player, (3, 1));
    let raider = arena.deploy(&brawler("raider"), Team::Enemy, (3, 6));
    arena.start().unwrap();
    arena.advance(50);

    assert_eq!(arena.sim.apply_damage(Some(raider), reserve, fixed(50)), DamageOutcome::Ignored);
    let unit = arena.sim.get_unit(reserve).unwrap();
    assert_eq!(unit.state, UnitState::Bench);
    assert_eq!(unit.stats.current_health, fixed(600));
    assert!(unit.tile.is_none());
}

#[test]
fn removing_a_unit_frees_its_tile() {
    let mut arena = Arena::new();
    let id = arena.deploy(&brawler("knight"), Team::Player, (4, 2));
    let tile = arena.board.tile_at(4, 2).unwrap();

    let removed = arena.sim.unregister_unit(&mut arena.board, id).unwrap();
    assert_eq!(removed.id, id);
    assert_eq!(arena.board.occupant(tile), None);
    assert!(arena.sim.get_unit(id).is_none());
}
