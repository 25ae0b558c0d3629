//! Death broadcast and presentation notifications.
//!
//! The [`DeathEventBus`] is owned by the simulation context. Subscribers are
//! plain data (owner + kind), registered and removed explicitly, and invoked
//! synchronously in registration order by the damage pipeline.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed};
use crate::unit::{Team, UnitId};

/// A unit died.
///
/// Published at most once per unit per life. Carries the final state
/// subscribers need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeathEvent {
    /// Unit that died.
    pub unit: UnitId,
    /// Life that ended.
    pub life: u32,
    /// Tick of death.
    pub tick: u64,
    /// Side of the fallen unit.
    pub team: Team,
    /// Max health at the moment of death.
    #[serde(with = "fixed_serde")]
    pub max_health: Fixed,
    /// Unit that dealt the killing blow, if known.
    pub killer: Option<UnitId>,
}

/// Subscription handle.
pub type SubscriptionId = u64;

/// Reaction a subscriber performs on death.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeathReaction {
    /// Soul binder caster gains a soul.
    SoulHarvest,
    /// Packbond modifier shares the fallen ally's health.
    DeathShare,
}

/// A registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Handle returned by [`DeathEventBus::subscribe`].
    pub id: SubscriptionId,
    /// Unit whose state the reaction updates.
    pub owner: UnitId,
    /// Reaction to run.
    pub reaction: DeathReaction,
}

/// Exactly-once death broadcast.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeathEventBus {
    next_id: SubscriptionId,
    subscriptions: Vec<Subscription>,
    delivered: BTreeSet<(UnitId, u32)>,
    history: Vec<DeathEvent>,
}

impl DeathEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Delivery follows registration order.
    pub fn subscribe(&mut self, owner: UnitId, reaction: DeathReaction) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.push(Subscription {
            id,
            owner,
            reaction,
        });
        id
    }

    /// Remove one subscription. Returns whether it existed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        before != self.subscriptions.len()
    }

    /// Remove every subscription owned by `owner`.
    pub fn unsubscribe_owner(&mut self, owner: UnitId) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.owner != owner);
        before - self.subscriptions.len()
    }

    /// Record a death and return the subscribers to notify.
    ///
    /// Returns `None` if this `(unit, life)` was already published.
    pub fn publish(&mut self, event: DeathEvent) -> Option<Vec<Subscription>> {
        if !self.delivered.insert((event.unit, event.life)) {
            return None;
        }
        self.history.push(event);
        Some(self.subscriptions.clone())
    }

    /// Whether a subscription is still registered.
    #[must_use]
    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.subscriptions.iter().any(|s| s.id == id)
    }

    /// Current subscriptions in delivery order.
    #[must_use]
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    /// Deaths published since the history was last cleared.
    #[must_use]
    pub fn history(&self) -> &[DeathEvent] {
        &self.history
    }

    /// Number of recorded deaths of `unit`.
    #[must_use]
    pub fn deaths_of(&self, unit: UnitId) -> usize {
        self.history.iter().filter(|e| e.unit == unit).count()
    }

    /// Clear the history (round start). Delivery records are kept.
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Drop delivery records of `unit` older than `life`.
    ///
    /// Called when a unit is restored; the old life can no longer die.
    pub fn retire_lives_before(&mut self, unit: UnitId, life: u32) {
        self.delivered.retain(|&(id, l)| id != unit || l >= life);
    }

    /// Number of `(unit, life)` delivery records held.
    #[must_use]
    pub fn delivered_len(&self) -> usize {
        self.delivered.len()
    }

    /// Forget a unit that left the simulation.
    pub fn forget(&mut self, unit: UnitId) {
        self.unsubscribe_owner(unit);
        self.delivered.retain(|(id, _)| *id != unit);
    }
}

/// One-way notification for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationEvent {
    /// Health changed.
    HealthChanged {
        /// Unit.
        unit: UnitId,
        /// New current health.
        #[serde(with = "fixed_serde")]
        current: Fixed,
        /// Max health.
        #[serde(with = "fixed_serde")]
        max: Fixed,
    },
    /// Mana changed.
    ManaChanged {
        /// Unit.
        unit: UnitId,
        /// New mana.
        current: u32,
        /// Mana needed to cast.
        max: u32,
    },
    /// Damage landed after mitigation.
    DamageDealt {
        /// Source, if any.
        source: Option<UnitId>,
        /// Target.
        target: UnitId,
        /// Mitigated amount.
        #[serde(with = "fixed_serde")]
        amount: Fixed,
    },
    /// An ability was cast.
    AbilityCast {
        /// Caster.
        unit: UnitId,
        /// Ability name.
        ability: String,
        /// Target snapshot at cast time.
        target: Option<UnitId>,
    },
    /// A unit died.
    Death {
        /// Unit.
        unit: UnitId,
        /// Life that ended.
        life: u32,
    },
    /// A unit entered the simulation mid-round.
    Spawned {
        /// New unit.
        unit: UnitId,
        /// Summoner, if any.
        summoner: Option<UnitId>,
    },
    /// A fallen unit was brought back.
    Restored {
        /// Unit.
        unit: UnitId,
        /// New life.
        life: u32,
    },
    /// A fallen unit's death hold ended.
    Hidden {
        /// Unit.
        unit: UnitId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn death(unit: UnitId, life: u32) -> DeathEvent {
        DeathEvent {
            unit,
            life,
            tick: 4,
            team: Team::Player,
            max_health: Fixed::from_num(100),
            killer: None,
        }
    }

    #[test]
    fn test_publish_once_per_life() {
        let mut bus = DeathEventBus::new();
        assert!(bus.publish(death(1, 0)).is_some());
        assert!(bus.publish(death(1, 0)).is_none());
        assert!(bus.publish(death(1, 1)).is_some());
        assert_eq!(bus.deaths_of(1), 2);
    }

    #[test]
    fn test_retired_lives_are_pruned() {
        let mut bus = DeathEventBus::new();
        bus.publish(death(1, 0));
        bus.publish(death(2, 0));
        bus.publish(death(1, 1));
        assert_eq!(bus.delivered_len(), 3);

        bus.retire_lives_before(1, 2);
        assert_eq!(bus.delivered_len(), 1);
        // History is untouched.
        assert_eq!(bus.deaths_of(1), 2);
        assert!(bus.publish(death(1, 2)).is_some());
    }

    #[test]
    fn test_subscribers_in_registration_order() {
        let mut bus = DeathEventBus::new();
        let first = bus.subscribe(5, DeathReaction::DeathShare);
        let second = bus.subscribe(3, DeathReaction::SoulHarvest);

        let delivered = bus.publish(death(9, 0)).unwrap();
        let ids: Vec<SubscriptionId> = delivered.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut bus = DeathEventBus::new();
        let id = bus.subscribe(5, DeathReaction::DeathShare);
        bus.subscribe(5, DeathReaction::SoulHarvest);
        bus.subscribe(6, DeathReaction::SoulHarvest);

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert!(!bus.is_subscribed(id));
        assert_eq!(bus.unsubscribe_owner(5), 1);
        assert_eq!(bus.subscriptions().len(), 1);
    }

    #[test]
    fn test_clear_history_keeps_delivery_records() {
        let mut bus = DeathEventBus::new();
        bus.publish(death(1, 0));
        bus.clear_history();
        assert!(bus.history().is_empty());
        assert!(bus.publish(death(1, 0)).is_none());
    }
}
