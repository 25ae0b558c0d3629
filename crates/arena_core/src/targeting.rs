//! Target selection and area queries over the opposing roster.
//!
//! Every query walks the roster in registration order and only replaces its
//! best candidate on a strictly better score, so ties go to the unit found
//! first.

use crate::context::SimulationContext;
use crate::math::{percent, Fixed, Vec2Fixed};
use crate::unit::{Team, UnitId};

/// Pick the attack target for `seeker`.
///
/// Minimizes `distance - bias` over living, non-benched enemies, where the
/// bias applies to configured priority unit types. Returns `None` when no
/// enemy is eligible.
#[must_use]
pub fn find_target(ctx: &SimulationContext, seeker: UnitId) -> Option<UnitId> {
    let unit = ctx.unit(seeker)?;
    let origin = unit.position;
    let combat = &ctx.config.combat;

    let mut best: Option<(UnitId, Fixed)> = None;
    for id in ctx.rosters.ids(unit.team.opponent()) {
        let Some(candidate) = ctx.unit(id) else {
            continue;
        };
        if !candidate.is_targetable() {
            continue;
        }
        let mut score = origin.distance(candidate.position);
        if combat.priority_types.iter().any(|t| *t == candidate.name) {
            score -= combat.priority_bias;
        }
        if best.map_or(true, |(_, s)| score < s) {
            best = Some((id, score));
        }
    }
    best.map(|(id, _)| id)
}

/// Whether `target` is a living, non-benched member of the team opposing
/// `seeker_team`.
#[must_use]
pub fn is_valid_target(ctx: &SimulationContext, seeker_team: Team, target: UnitId) -> bool {
    ctx.unit(target)
        .is_some_and(|t| t.team != seeker_team && t.is_targetable())
}

/// The `count` eligible members of `team` nearest to `origin`, nearest first.
#[must_use]
pub fn nearest(ctx: &SimulationContext, team: Team, origin: Vec2Fixed, count: usize) -> Vec<UnitId> {
    let mut candidates: Vec<(UnitId, Fixed)> = ctx
        .targetable_ids(team)
        .into_iter()
        .filter_map(|id| ctx.unit(id).map(|u| (id, origin.distance_squared(u.position))))
        .collect();
    // Stable sort keeps roster order among equal distances.
    candidates.sort_by(|a, b| a.1.cmp(&b.1));
    candidates.into_iter().take(count).map(|(id, _)| id).collect()
}

/// The eligible member of `team` with the highest current health.
#[must_use]
pub fn highest_health(ctx: &SimulationContext, team: Team) -> Option<UnitId> {
    let mut best: Option<(UnitId, Fixed)> = None;
    for id in ctx.targetable_ids(team) {
        let Some(unit) = ctx.unit(id) else {
            continue;
        };
        let health = unit.stats.current_health;
        if best.map_or(true, |(_, h)| health > h) {
            best = Some((id, health));
        }
    }
    best.map(|(id, _)| id)
}

/// Position of the member of `team` with the most other members within
/// `radius`.
#[must_use]
pub fn densest_cluster(ctx: &SimulationContext, team: Team, radius: Fixed) -> Option<Vec2Fixed> {
    let positions: Vec<Vec2Fixed> = ctx
        .targetable_ids(team)
        .into_iter()
        .filter_map(|id| ctx.unit(id).map(|u| u.position))
        .collect();
    let radius_sq = radius * radius;

    let mut best: Option<(Vec2Fixed, usize)> = None;
    for (i, center) in positions.iter().enumerate() {
        let neighbours = positions
            .iter()
            .enumerate()
            .filter(|(j, other)| *j != i && center.distance_squared(**other) <= radius_sq)
            .count();
        if best.map_or(true, |(_, n)| neighbours > n) {
            best = Some((*center, neighbours));
        }
    }
    best.map(|(center, _)| center)
}

/// Eligible members of `team` within `radius` of `center`.
#[must_use]
pub fn within_radius(
    ctx: &SimulationContext,
    team: Team,
    center: Vec2Fixed,
    radius: Fixed,
) -> Vec<UnitId> {
    let radius_sq = radius * radius;
    ctx.targetable_ids(team)
        .into_iter()
        .filter(|&id| {
            ctx.unit(id)
                .is_some_and(|u| center.distance_squared(u.position) <= radius_sq)
        })
        .collect()
}

/// Eligible members of `team` inside a cone.
///
/// The cone starts at `origin`, opens along `direction`, reaches `range` and
/// admits units whose direction from the origin has a cosine of at least
/// `min_alignment_pct` percent with `direction`.
#[must_use]
pub fn within_cone(
    ctx: &SimulationContext,
    team: Team,
    origin: Vec2Fixed,
    direction: Vec2Fixed,
    range: Fixed,
    min_alignment_pct: u32,
) -> Vec<UnitId> {
    let axis = direction.normalize();
    if axis.is_zero() {
        return Vec::new();
    }
    let min_alignment = percent(min_alignment_pct);
    let range_sq = range * range;

    ctx.targetable_ids(team)
        .into_iter()
        .filter(|&id| {
            let Some(unit) = ctx.unit(id) else {
                return false;
            };
            let offset = unit.position - origin;
            if offset.dot(offset) > range_sq {
                return false;
            }
            // A unit standing on the origin is always hit.
            offset.is_zero() || offset.normalize().dot(axis) >= min_alignment
        })
        .collect()
}
