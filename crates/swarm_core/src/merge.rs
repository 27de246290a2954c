//! The merge engine.
//!
//! Merging is a multi-step protocol, not an instant operation: two enemies
//! that request a merge are paired off a waiting list, sent to the midpoint
//! between them, and combined only when the watched member of the pair
//! reports arrival. Either party dying before the rendezvous cancels the
//! pair; the survivor is silently released.
//!
//! State machine per enemy:
//!
//! ```text
//! Free -> Waiting -> Rendezvous -> Free (merged or cancelled)
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::entity::{CountsOutcome, Enemy, EntityId};
use crate::math::Vec2Fixed;

/// Merge-protocol state carried by each enemy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MergeState {
    /// Not participating in a merge.
    #[default]
    Free,
    /// On the waiting list, unpaired.
    Waiting,
    /// Paired and converging on the shared midpoint.
    Rendezvous {
        /// The other member of the pair.
        partner: EntityId,
        /// Whether this entity carries the one-shot arrival watch; the merge
        /// fires when the watcher arrives, wherever its partner is.
        watcher: bool,
    },
}

/// A pair dispatched from the waiting list toward a shared midpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairFormed {
    /// Earlier requester of the pair.
    pub first: EntityId,
    /// Later requester; carries the arrival watch.
    pub second: EntityId,
    /// Rendezvous point both entities target.
    pub midpoint: Vec2Fixed,
}

/// A completed merge.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRecord {
    /// Entity that absorbed the pair.
    pub survivor: EntityId,
    /// Entity that was absorbed and killed.
    pub absorbed: EntityId,
    /// Count changes applied to the survivor, for UI notification.
    pub survivor_counts: CountsOutcome,
}

/// What an arrival notification meant to the merge engine.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrivalOutcome {
    /// Plain movement arrival; the entity was not a watched rendezvous
    /// member. The caller clears the movement target.
    Movement,
    /// The unwatched member of a pair reached the midpoint first; it holds
    /// position (and its target, which identifies the pair) until the
    /// watcher arrives.
    PartnerHolding,
    /// The watcher arrived and the pair combined.
    Merged(MergeRecord),
    /// The watcher arrived but its partner was gone; the pair is cancelled
    /// and the watcher released.
    Cancelled {
        /// The entity released back to [`MergeState::Free`].
        released: EntityId,
    },
}

/// Pairing engine owning the merge waiting list.
///
/// All entity state lives in the population's enemy map; the engine holds
/// only the ordered list of unpaired requesters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeEngine {
    waiting: Vec<EntityId>,
}

impl MergeEngine {
    /// Create an engine with an empty waiting list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids currently waiting for a partner, in arrival order.
    #[must_use]
    pub fn waiting(&self) -> &[EntityId] {
        &self.waiting
    }

    /// Handle a merge request for `id`.
    ///
    /// A request from an entity already waiting or already paired is ignored
    /// (the protocol is idempotent). When the request makes the list even,
    /// the two entries pair immediately: both get the midpoint as movement
    /// target and the later requester carries the arrival watch.
    pub fn request(
        &mut self,
        id: EntityId,
        enemies: &mut HashMap<EntityId, Enemy>,
    ) -> Option<PairFormed> {
        let Some(enemy) = enemies.get(&id) else {
            tracing::warn!(id, "merge request for unknown enemy ignored");
            return None;
        };

        if enemy.merge_state != MergeState::Free || self.waiting.contains(&id) {
            tracing::debug!(id, "duplicate merge request ignored");
            return None;
        }

        self.waiting.push(id);
        if let Some(enemy) = enemies.get_mut(&id) {
            enemy.merge_state = MergeState::Waiting;
        }

        if self.waiting.len() % 2 != 0 {
            return None;
        }

        let second = self.waiting.pop().expect("list has two entries");
        let first = self.waiting.pop().expect("list has two entries");

        let first_pos = enemies.get(&first).map(|e| e.position)?;
        let second_pos = enemies.get(&second).map(|e| e.position)?;
        let midpoint = first_pos.midpoint(second_pos);

        if let Some(enemy) = enemies.get_mut(&first) {
            enemy.merge_state = MergeState::Rendezvous {
                partner: second,
                watcher: false,
            };
            enemy.target = Some(midpoint);
        }
        if let Some(enemy) = enemies.get_mut(&second) {
            enemy.merge_state = MergeState::Rendezvous {
                partner: first,
                watcher: true,
            };
            enemy.target = Some(midpoint);
        }

        Some(PairFormed {
            first,
            second,
            midpoint,
        })
    }

    /// Handle an arrival notification for `id`.
    ///
    /// Only the watched member of a rendezvous resolves a merge; any other
    /// arrival is reported back as plain movement (or a partner holding at
    /// the midpoint).
    pub fn on_arrival(
        &mut self,
        id: EntityId,
        enemies: &mut HashMap<EntityId, Enemy>,
        config: &CoreConfig,
    ) -> ArrivalOutcome {
        let Some(enemy) = enemies.get(&id) else {
            tracing::warn!(id, "arrival for unknown enemy ignored");
            return ArrivalOutcome::Movement;
        };

        let MergeState::Rendezvous { partner, watcher } = enemy.merge_state else {
            return ArrivalOutcome::Movement;
        };

        if !watcher {
            return ArrivalOutcome::PartnerHolding;
        }

        // The partner is identified by carrying the same rendezvous target.
        let my_target = enemy.target;
        let partner_alive = enemies
            .get(&partner)
            .is_some_and(|p| !p.is_killed() && p.target == my_target);

        if !partner_alive {
            tracing::warn!(id, partner, "merge partner lost before rendezvous, cancelling");
            if let Some(enemy) = enemies.get_mut(&id) {
                enemy.merge_state = MergeState::Free;
                enemy.target = None;
                enemy.rearm_merge();
            }
            // A partner that still points back at us is stranded mid-protocol;
            // release it as well.
            if let Some(p) = enemies.get_mut(&partner) {
                if matches!(p.merge_state, MergeState::Rendezvous { partner: back, .. } if back == id)
                {
                    p.merge_state = MergeState::Free;
                    p.target = None;
                    p.rearm_merge();
                }
            }
            return ArrivalOutcome::Cancelled { released: id };
        }

        self.resolve(id, partner, enemies, config)
    }

    /// Combine a rendezvoused pair. The strictly larger elemental total
    /// survives; on a tie the triggering (watcher) entity does.
    fn resolve(
        &mut self,
        watcher_id: EntityId,
        partner_id: EntityId,
        enemies: &mut HashMap<EntityId, Enemy>,
        config: &CoreConfig,
    ) -> ArrivalOutcome {
        let watcher_total = enemies.get(&watcher_id).map_or(0, Enemy::total);
        let partner_total = enemies.get(&partner_id).map_or(0, Enemy::total);

        let (survivor_id, absorbed_id) = if partner_total > watcher_total {
            (partner_id, watcher_id)
        } else {
            (watcher_id, partner_id)
        };

        let Some(absorbed) = enemies.get(&absorbed_id) else {
            return ArrivalOutcome::Movement;
        };
        let absorbed_counts = *absorbed.counts();
        let absorbed_health = absorbed.health;

        let Some(survivor) = enemies.get_mut(&survivor_id) else {
            return ArrivalOutcome::Movement;
        };

        let mut combined = *survivor.counts();
        for (element, count) in absorbed_counts.iter() {
            combined.add(element, count);
        }
        let survivor_counts = survivor.set_counts(combined);

        // Health is summed, not recomputed, so a wounded pair stays wounded.
        survivor.health.max += absorbed_health.max;
        survivor.health.current += absorbed_health.current;
        survivor.scale = survivor.scale * config.merge_scale_factor;
        survivor.merge_state = MergeState::Free;
        survivor.target = None;
        survivor.rearm_merge();

        if let Some(absorbed) = enemies.get_mut(&absorbed_id) {
            absorbed.kill();
        }

        ArrivalOutcome::Merged(MergeRecord {
            survivor: survivor_id,
            absorbed: absorbed_id,
            survivor_counts,
        })
    }

    /// Unwind merge bookkeeping for a dying enemy.
    ///
    /// Removes it from the waiting list; if it was mid-rendezvous, the
    /// partner (when still alive) is released back to [`MergeState::Free`]
    /// with its watch disconnected. Returns the released partner, if any.
    pub fn cancel_for_death(
        &mut self,
        id: EntityId,
        enemies: &mut HashMap<EntityId, Enemy>,
    ) -> Option<EntityId> {
        self.waiting.retain(|&waiting_id| waiting_id != id);

        let state = enemies.get(&id).map(|e| e.merge_state)?;
        let MergeState::Rendezvous { partner, .. } = state else {
            return None;
        };

        let released = enemies.get_mut(&partner).map(|p| {
            p.merge_state = MergeState::Free;
            p.target = None;
            p.rearm_merge();
            partner
        });
        if released.is_some() {
            tracing::debug!(id, partner, "pending merge cancelled by death");
        }
        released
    }
}
