//! Scheduled continuations.
//!
//! Multi-step abilities, scripted leaps and death holds resume on a later
//! tick. Each entry is owned by a unit and stamped with the owner's life, so
//! cancelling by owner or outliving a life invalidates it.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::unit::UnitId;

/// Work resumed by a scheduled entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Continuation {
    /// End a cast that has no further steps.
    FinishCast,
    /// Second twin shot hit.
    TwinShotHit {
        /// Damage of the hit.
        #[serde(with = "fixed_serde")]
        damage: Fixed,
    },
    /// Twin shot area finisher. Ends the cast.
    AreaBlast {
        /// Damage to every enemy in the blast.
        #[serde(with = "fixed_serde")]
        damage: Fixed,
    },
    /// Leap landing and slam. Ends the cast.
    LeapLand {
        /// Landing point.
        destination: Vec2Fixed,
        /// Slam damage.
        #[serde(with = "fixed_serde")]
        damage: Fixed,
    },
    /// Hide a soft-dead player unit once the death hold expires.
    HideFallen,
    /// Remove a dead enemy or summon.
    Despawn,
}

/// One pending continuation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scheduled {
    /// Tick at which the entry becomes due.
    pub resume_tick: u64,
    /// Insertion order, breaks ties between entries due on the same tick.
    pub seq: u64,
    /// Unit that owns the entry.
    pub owner: UnitId,
    /// Owner's life when the entry was scheduled.
    pub life: u32,
    /// Work to resume.
    pub action: Continuation,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.resume_tick == other.resume_tick && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; reverse so the earliest (tick, seq) pops first.
        match other.resume_tick.cmp(&self.resume_tick) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of continuations ordered by `(resume_tick, seq)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    heap: BinaryHeap<Scheduled>,
    next_seq: u64,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` for `owner` at `resume_tick`.
    pub fn schedule(&mut self, resume_tick: u64, owner: UnitId, life: u32, action: Continuation) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled {
            resume_tick,
            seq,
            owner,
            life,
            action,
        });
    }

    /// Remove and return every entry due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: u64) -> Vec<Scheduled> {
        let mut due = Vec::new();
        while self.heap.peek().is_some_and(|s| s.resume_tick <= now) {
            if let Some(entry) = self.heap.pop() {
                due.push(entry);
            }
        }
        due
    }

    /// Drop every entry owned by `owner`. Returns how many were removed.
    pub fn cancel_owner(&mut self, owner: UnitId) -> usize {
        let before = self.heap.len();
        self.heap.retain(|s| s.owner != owner);
        before - self.heap.len()
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Number of entries owned by `owner`.
    #[must_use]
    pub fn pending_for(&self, owner: UnitId) -> usize {
        self.heap.iter().filter(|s| s.owner == owner).count()
    }

    /// Whether `owner` has a pending entry matching `predicate`.
    pub fn has_pending(&self, owner: UnitId, predicate: impl Fn(&Continuation) -> bool) -> bool {
        self.heap
            .iter()
            .any(|s| s.owner == owner && predicate(&s.action))
    }

    /// Total pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
