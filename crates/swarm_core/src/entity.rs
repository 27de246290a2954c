//! Enemy and lesser-enemy entity state.
//!
//! Entities are plain data plus the clamped mutations the spec allows on
//! them. Anything that touches more than one entity — splitting, merging,
//! repositioning — lives in the engines and the population manager, not
//! here.

use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::element::{Element, ElementCounts};
use crate::math::{fixed_serde, Fixed, Vec2Fixed};
use crate::merge::MergeState;

/// Unique identifier for entities (enemies and lesser enemies share one
/// id space).
pub type EntityId = u64;

/// Health component for damageable entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Current health points.
    pub current: u32,
    /// Maximum health points.
    pub max: u32,
}

impl Health {
    /// Create new health component at full health.
    #[must_use]
    pub const fn new(max: u32) -> Self {
        Self { current: max, max }
    }

    /// Check if the entity is out of health.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.current == 0
    }

    /// Apply damage, returning actual damage dealt.
    pub fn apply_damage(&mut self, amount: u32) -> u32 {
        let actual = amount.min(self.current);
        self.current -= actual;
        actual
    }

    /// Heal the entity, returning actual amount healed.
    pub fn apply_heal(&mut self, amount: u32) -> u32 {
        let headroom = self.max.saturating_sub(self.current);
        let actual = amount.min(headroom);
        self.current += actual;
        actual
    }

    /// True when current health is at or below half of maximum; the
    /// threshold at which combat raises a split request.
    #[must_use]
    pub const fn is_below_split_threshold(&self) -> bool {
        self.current <= self.max / 2
    }
}

/// Result of a counts mutation, consumed by the population manager to emit
/// UI events and kill emptied enemies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CountsOutcome {
    /// Elements whose count changed, with their new values, in ordinal order.
    pub changed: Vec<(Element, u32)>,
    /// New dominant element, present only when dominance changed.
    pub new_dominant: Option<Option<Element>>,
    /// The mutation left the enemy with no units at all.
    pub emptied: bool,
}

/// A full elemental enemy.
///
/// Owns its counts, health, position, and optional movement target. The
/// dominant element is cached so sprite/attack-pattern selection never
/// rescans the counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    /// Unique identifier.
    pub id: EntityId,
    /// Insertion order, used for stable tie-breaks in sorts.
    pub spawn_seq: u64,
    counts: ElementCounts,
    dominant: Option<Element>,
    /// Health state.
    pub health: Health,
    /// World position.
    pub position: Vec2Fixed,
    /// Desired movement target; `Some` iff the entity is targeting.
    pub target: Option<Vec2Fixed>,
    /// Visual scale factor; shrinks on split, grows back on merge.
    #[serde(with = "fixed_serde")]
    pub scale: Fixed,
    /// Merge pairing state.
    pub merge_state: MergeState,
    pending_split: bool,
    pending_merge: bool,
    killed: bool,
}

impl Enemy {
    /// Create a new enemy with full health for its counts.
    #[must_use]
    pub fn new(
        id: EntityId,
        spawn_seq: u64,
        counts: ElementCounts,
        position: Vec2Fixed,
        config: &CoreConfig,
    ) -> Self {
        Self {
            id,
            spawn_seq,
            counts,
            dominant: counts.dominant(),
            health: Health::new(config.max_health_for_total(counts.total())),
            position,
            target: None,
            scale: Fixed::ONE,
            merge_state: MergeState::Free,
            pending_split: false,
            pending_merge: false,
            killed: false,
        }
    }

    /// The enemy's elemental counts.
    #[must_use]
    pub const fn counts(&self) -> &ElementCounts {
        &self.counts
    }

    /// Cached dominant element.
    #[must_use]
    pub const fn dominant(&self) -> Option<Element> {
        self.dominant
    }

    /// Total elemental units.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.counts.total()
    }

    /// True once the enemy has been killed and awaits reaping.
    #[must_use]
    pub const fn is_killed(&self) -> bool {
        self.killed
    }

    /// True while the enemy has a movement target.
    #[must_use]
    pub const fn is_targeting(&self) -> bool {
        self.target.is_some()
    }

    /// Mark the enemy killed. Idempotent.
    pub fn kill(&mut self) {
        self.killed = true;
    }

    /// Replace the elemental counts wholesale.
    ///
    /// Recomputes the dominant element and reports which counts changed.
    /// Emptying the counts kills the enemy as a side effect; the caller
    /// reaps it and emits the death notification.
    pub fn set_counts(&mut self, new_counts: ElementCounts) -> CountsOutcome {
        if self.killed {
            tracing::warn!(id = self.id, "set_counts on killed enemy ignored");
            return CountsOutcome::default();
        }

        let changed: Vec<(Element, u32)> = Element::ALL
            .iter()
            .filter(|&&element| self.counts.get(element) != new_counts.get(element))
            .map(|&element| (element, new_counts.get(element)))
            .collect();

        self.counts = new_counts;

        let dominant = self.counts.dominant();
        let new_dominant = (dominant != self.dominant).then_some(dominant);
        self.dominant = dominant;

        let emptied = self.counts.is_empty();
        if emptied {
            self.killed = true;
        }

        CountsOutcome {
            changed,
            new_dominant,
            emptied,
        }
    }

    /// Add units to one element.
    pub fn add_to_element(&mut self, element: Element, amount: u32) -> CountsOutcome {
        if self.killed {
            tracing::warn!(id = self.id, "add_to_element on killed enemy ignored");
            return CountsOutcome::default();
        }
        let mut counts = self.counts;
        counts.add(element, amount);
        self.set_counts(counts)
    }

    /// Remove units from one element, clamping at zero.
    pub fn subtract_from_element(&mut self, element: Element, amount: u32) -> CountsOutcome {
        if self.killed {
            tracing::warn!(id = self.id, "subtract_from_element on killed enemy ignored");
            return CountsOutcome::default();
        }
        let mut counts = self.counts;
        counts.subtract(element, amount);
        self.set_counts(counts)
    }

    /// Arm a split request.
    ///
    /// Returns `true` only the first time until the engine re-arms the
    /// trigger, so repeated collision callbacks in one tick cannot
    /// double-fire a split.
    pub fn request_split(&mut self) -> bool {
        if self.killed {
            tracing::warn!(id = self.id, "split request on killed enemy ignored");
            return false;
        }
        if self.pending_split {
            return false;
        }
        self.pending_split = true;
        true
    }

    /// Re-arm the split trigger after the engine processed the request.
    pub fn rearm_split(&mut self) {
        self.pending_split = false;
    }

    /// Arm a merge request. Same idempotence contract as
    /// [`request_split`](Self::request_split).
    pub fn request_merge(&mut self) -> bool {
        if self.killed {
            tracing::warn!(id = self.id, "merge request on killed enemy ignored");
            return false;
        }
        if self.pending_merge {
            return false;
        }
        self.pending_merge = true;
        true
    }

    /// Re-arm the merge trigger after the engine processed the request.
    pub fn rearm_merge(&mut self) {
        self.pending_merge = false;
    }
}

/// A lesser enemy: a single-element, unsplittable, non-mergeable unit
/// spawned as split/merge remainder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LesserEnemy {
    /// Unique identifier.
    pub id: EntityId,
    /// The single element this unit carries.
    pub element: Element,
    /// Health state.
    pub health: Health,
    /// World position.
    pub position: Vec2Fixed,
    killed: bool,
}

impl LesserEnemy {
    /// Create a new lesser enemy at full health.
    #[must_use]
    pub fn new(id: EntityId, element: Element, position: Vec2Fixed, config: &CoreConfig) -> Self {
        Self {
            id,
            element,
            health: Health::new(config.lesser_base_health),
            position,
            killed: false,
        }
    }

    /// True once killed and awaiting reaping.
    #[must_use]
    pub const fn is_killed(&self) -> bool {
        self.killed
    }

    /// Mark the lesser enemy killed. Idempotent.
    pub fn kill(&mut self) {
        self.killed = true;
    }
}
