//! The population manager and wave lifecycle.
//!
//! One `PopulationManager` owns every live enemy and lesser enemy, the merge
//! engine, the deferred request queue, and the wave state machine. It is the
//! single injection point for the game loop: collaborators feed it damage
//! and arrival notifications, and consume the typed event stream it returns.
//!
//! # Tick model
//!
//! The manager is single-threaded and cooperative. Split requests, merge
//! requests, and arrival notifications are never applied inside the
//! callback that raised them; they are queued and drained exactly once per
//! tick, in a fixed order:
//!
//! 1. advance the wave timer
//! 2. maintenance cadence: auto-merge policy, then reposition
//! 3. drain the deferred queue (requests enqueued during the drain wait
//!    for the next tick)
//! 4. reap killed entities
//! 5. wave-completion check
//!
//! This keeps "killed then re-added in the same tick" deterministic and
//! makes re-entrant double-processing impossible without per-entity guard
//! flags beyond the request triggers themselves.
//!
//! # Error handling
//!
//! Nothing in the tick path returns an error. Malformed wave segments, stale
//! requests, and degenerate splits all degrade locally with a `tracing`
//! warning; the worst outcome is a smaller-than-intended population.
//! [`CoreError`] is reserved for hard API misuse (wrong lifecycle state,
//! unknown ids on the explicit despawn path, snapshot codec failures).

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::config::CoreConfig;
use crate::element::{Element, ElementCounts};
use crate::entity::{CountsOutcome, Enemy, EntityId, LesserEnemy};
use crate::error::{CoreError, Result};
use crate::math::{Fixed, Vec2Fixed};
use crate::merge::{ArrivalOutcome, MergeEngine};
use crate::split::{plan_split, DaughterOutcome, MotherOutcome};
use crate::wave;

/// Wave lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WaveState {
    /// No wave loaded.
    #[default]
    Idle,
    /// Entities spawned but frozen in preview.
    Loaded,
    /// Entities live, timer running.
    InProgress,
    /// Field cleared; ready for the next wave.
    Complete,
}

/// A deferred request, applied at the drain point of the tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Request {
    Split(EntityId),
    Merge(EntityId),
    Arrival(EntityId),
}

/// Notifications for rendering/audio/UI collaborators.
///
/// The stream is owned by the manager and returned from every mutating
/// entry point; no core logic depends on a consumer acknowledging any of
/// these.
#[derive(Debug, Clone, PartialEq)]
pub enum PopulationEvent {
    /// A full enemy entered the field.
    EnemySpawned {
        /// New entity id.
        id: EntityId,
        /// Its elemental counts.
        counts: ElementCounts,
        /// Spawn position.
        position: Vec2Fixed,
    },
    /// A lesser enemy entered the field.
    LesserSpawned {
        /// New entity id.
        id: EntityId,
        /// Its single element.
        element: Element,
        /// Spawn position.
        position: Vec2Fixed,
    },
    /// An enemy left the field.
    EnemyKilled {
        /// Removed entity id.
        id: EntityId,
    },
    /// A lesser enemy left the field.
    LesserKilled {
        /// Removed entity id.
        id: EntityId,
    },
    /// One element's count changed on an enemy.
    ElementChanged {
        /// Affected enemy.
        id: EntityId,
        /// Element whose count changed.
        element: Element,
        /// New count.
        count: u32,
    },
    /// An enemy's dominant element changed (sprite/attack-pattern cue).
    DominantChanged {
        /// Affected enemy.
        id: EntityId,
        /// New dominant element, if any remains.
        dominant: Option<Element>,
    },
    /// An entity's health changed.
    HealthChanged {
        /// Affected entity.
        id: EntityId,
        /// Current health.
        current: u32,
        /// Maximum health.
        max: u32,
    },
    /// A split resolved.
    SplitCompleted {
        /// The enemy that split.
        mother: EntityId,
        /// Daughter enemy, when one full enemy spawned.
        daughter: Option<EntityId>,
    },
    /// Two enemies were paired and sent to their midpoint.
    MergePaired {
        /// Earlier requester.
        first: EntityId,
        /// Later requester (carries the arrival watch).
        second: EntityId,
        /// Shared rendezvous target.
        midpoint: Vec2Fixed,
    },
    /// A rendezvoused pair combined.
    MergeCompleted {
        /// Surviving enemy.
        survivor: EntityId,
        /// Absorbed enemy (killed).
        absorbed: EntityId,
    },
    /// A pending merge was abandoned.
    MergeCancelled {
        /// The entity released back to free state.
        released: EntityId,
    },
    /// A new wave index was loaded.
    WaveNumberChanged {
        /// The wave index.
        wave: u32,
    },
    /// The wave lifecycle advanced.
    WaveStateChanged {
        /// New state.
        state: WaveState,
    },
    /// Live population changed relative to the spawned wave.
    WaveProgressChanged {
        /// Entities still on the field.
        live: usize,
        /// Entities the wave spawned.
        initial: usize,
    },
    /// The field was cleared; collaborators should clear projectile state.
    WaveCompleted {
        /// The finished wave index.
        wave: u32,
    },
}

/// Wave bookkeeping carried by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
struct WaveStatus {
    state: WaveState,
    index: u32,
    elapsed_ticks: u32,
    encoding: String,
    initial_population: usize,
    last_reported_live: usize,
}

/// Owner of the live population and everything that happens to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationManager {
    config: CoreConfig,
    enemies: HashMap<EntityId, Enemy>,
    lessers: HashMap<EntityId, LesserEnemy>,
    next_id: EntityId,
    next_seq: u64,
    merge: MergeEngine,
    deferred: VecDeque<Request>,
    wave: WaveStatus,
    tick_count: u64,
}

impl PopulationManager {
    /// Create an empty manager in the `Idle` state.
    #[must_use]
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            enemies: HashMap::new(),
            lessers: HashMap::new(),
            next_id: 1,
            next_seq: 0,
            merge: MergeEngine::new(),
            deferred: VecDeque::new(),
            wave: WaveStatus::default(),
            tick_count: 0,
        }
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &CoreConfig {
        &self.config
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Current wave lifecycle state.
    #[must_use]
    pub const fn wave_state(&self) -> WaveState {
        self.wave.state
    }

    /// Index of the loaded wave.
    #[must_use]
    pub const fn wave_index(&self) -> u32 {
        self.wave.index
    }

    /// Ticks elapsed since the wave started.
    #[must_use]
    pub const fn elapsed_ticks(&self) -> u32 {
        self.wave.elapsed_ticks
    }

    /// The encoding the current wave was spawned from (replay/debugging).
    #[must_use]
    pub fn wave_encoding(&self) -> &str {
        &self.wave.encoding
    }

    /// Number of live full enemies.
    #[must_use]
    pub fn live_enemy_count(&self) -> usize {
        self.enemies.len()
    }

    /// Number of live lesser enemies.
    #[must_use]
    pub fn live_lesser_count(&self) -> usize {
        self.lessers.len()
    }

    /// Total elemental units across the whole live population.
    ///
    /// Splits and merges conserve this; only explicit kills change it.
    #[must_use]
    pub fn live_total_units(&self) -> u64 {
        let enemy_units: u64 = self.enemies.values().map(|e| u64::from(e.total())).sum();
        enemy_units + self.lessers.len() as u64
    }

    /// Look up a live enemy.
    #[must_use]
    pub fn enemy(&self, id: EntityId) -> Option<&Enemy> {
        self.enemies.get(&id)
    }

    /// Look up a live lesser enemy.
    #[must_use]
    pub fn lesser(&self, id: EntityId) -> Option<&LesserEnemy> {
        self.lessers.get(&id)
    }

    /// Enemy ids in ascending order, for deterministic iteration.
    #[must_use]
    pub fn sorted_enemy_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.enemies.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Lesser-enemy ids in ascending order.
    #[must_use]
    pub fn sorted_lesser_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.lessers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Serialize the live enemy population back to the wave encoding format,
    /// in spawn order.
    #[must_use]
    pub fn encode_alive(&self) -> String {
        let mut live: Vec<&Enemy> = self.enemies.values().collect();
        live.sort_by_key(|enemy| enemy.spawn_seq);
        wave::encode_wave(live.into_iter().map(Enemy::counts))
    }

    /// Movement workload for the movement collaborator: every targeting
    /// enemy with its current position and desired target.
    #[must_use]
    pub fn movement_targets(&self) -> Vec<(EntityId, Vec2Fixed, Vec2Fixed)> {
        let mut targets: Vec<_> = self
            .enemies
            .values()
            .filter(|enemy| !enemy.is_killed())
            .filter_map(|enemy| enemy.target.map(|t| (enemy.id, enemy.position, t)))
            .collect();
        targets.sort_unstable_by_key(|&(id, _, _)| id);
        targets
    }

    /// Position writeback from the movement collaborator.
    pub fn set_position(&mut self, id: EntityId, position: Vec2Fixed) {
        if let Some(enemy) = self.enemies.get_mut(&id) {
            enemy.position = position;
        } else if let Some(lesser) = self.lessers.get_mut(&id) {
            lesser.position = position;
        } else {
            tracing::warn!(id, "position update for unknown entity ignored");
        }
    }

    // ========================================================================
    // Wave lifecycle
    // ========================================================================

    /// Load a wave from its encoding: spawn the population frozen and lay it
    /// out in preview (entities snap straight to their slots).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidWaveState`] unless the manager is `Idle`
    /// or `Complete`.
    pub fn load_wave(&mut self, wave_index: u32, encoding: &str) -> Result<Vec<PopulationEvent>> {
        match self.wave.state {
            WaveState::Idle | WaveState::Complete => {}
            state => {
                return Err(CoreError::InvalidWaveState(format!(
                    "cannot load a wave while {state:?}"
                )))
            }
        }

        self.enemies.clear();
        self.lessers.clear();
        self.merge = MergeEngine::new();
        self.deferred.clear();

        let mut events = vec![PopulationEvent::WaveNumberChanged { wave: wave_index }];

        let center = self.config.spawn_min.midpoint(self.config.spawn_max);
        for counts in wave::decode_wave(encoding) {
            if counts.is_empty() {
                tracing::warn!(wave_index, "skipping empty enemy segment");
                continue;
            }
            let _ = self.spawn_enemy_at(counts, center, &mut events);
        }

        self.wave = WaveStatus {
            state: WaveState::Loaded,
            index: wave_index,
            elapsed_ticks: 0,
            encoding: encoding.to_owned(),
            initial_population: self.enemies.len(),
            last_reported_live: self.enemies.len(),
        };
        events.push(PopulationEvent::WaveStateChanged {
            state: WaveState::Loaded,
        });

        self.reposition(true);
        Ok(events)
    }

    /// Load the deterministically generated population for `wave_index`.
    ///
    /// # Errors
    ///
    /// Same as [`load_wave`](Self::load_wave).
    pub fn load_generated(&mut self, wave_index: u32) -> Result<Vec<PopulationEvent>> {
        self.load_wave(wave_index, &wave::generate(wave_index))
    }

    /// Unfreeze the loaded wave and start its timer.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidWaveState`] unless a wave is `Loaded`.
    pub fn start_wave(&mut self) -> Result<Vec<PopulationEvent>> {
        if self.wave.state != WaveState::Loaded {
            return Err(CoreError::InvalidWaveState(format!(
                "cannot start a wave while {:?}",
                self.wave.state
            )));
        }
        self.wave.state = WaveState::InProgress;
        self.wave.elapsed_ticks = 0;
        Ok(vec![PopulationEvent::WaveStateChanged {
            state: WaveState::InProgress,
        }])
    }

    /// Advance the simulation by one tick. No-op unless a wave is in
    /// progress (loaded populations stay frozen).
    pub fn tick(&mut self) -> Vec<PopulationEvent> {
        if self.wave.state != WaveState::InProgress {
            return Vec::new();
        }

        self.tick_count += 1;
        self.wave.elapsed_ticks += 1;

        let mut events = Vec::new();

        if self.wave.elapsed_ticks % self.config.maintenance_interval == 0 {
            self.auto_merge();
            self.reposition(false);
        }

        self.drain_deferred(&mut events);
        self.reap(&mut events);
        self.check_completion(&mut events);

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::debug!(tick = self.tick_count, state_hash = hash, "population state hash");
        }

        events
    }

    // ========================================================================
    // Collaborator entry points
    // ========================================================================

    /// Arrival notification from the movement collaborator. Deferred to the
    /// tick's drain point like every other request.
    pub fn notify_arrival(&mut self, id: EntityId) {
        self.deferred.push_back(Request::Arrival(id));
    }

    /// Damage delivery from the combat collaborator.
    ///
    /// Adjusts health immediately and raises the follow-up the spec asks
    /// for: a split request at or below half health, a kill at zero. The
    /// elemental tag is bookkeeping only — multipliers are applied by the
    /// combat layer before this call.
    pub fn apply_damage(
        &mut self,
        id: EntityId,
        amount: u32,
        element: Option<Element>,
    ) -> Vec<PopulationEvent> {
        let mut events = Vec::new();

        if let Some(enemy) = self.enemies.get_mut(&id) {
            let _ = enemy.health.apply_damage(amount);
            events.push(PopulationEvent::HealthChanged {
                id,
                current: enemy.health.current,
                max: enemy.health.max,
            });
            if enemy.health.is_depleted() {
                enemy.kill();
            } else if enemy.health.is_below_split_threshold() && enemy.request_split() {
                self.deferred.push_back(Request::Split(id));
            }
        } else if let Some(lesser) = self.lessers.get_mut(&id) {
            let _ = lesser.health.apply_damage(amount);
            events.push(PopulationEvent::HealthChanged {
                id,
                current: lesser.health.current,
                max: lesser.health.max,
            });
            if lesser.health.is_depleted() {
                lesser.kill();
            }
        } else {
            tracing::warn!(id, ?element, "damage for unknown entity ignored");
        }

        events
    }

    /// Healing delivery from the combat collaborator.
    pub fn apply_heal(&mut self, id: EntityId, amount: u32) -> Vec<PopulationEvent> {
        let health = if let Some(enemy) = self.enemies.get_mut(&id) {
            let _ = enemy.health.apply_heal(amount);
            Some(enemy.health)
        } else if let Some(lesser) = self.lessers.get_mut(&id) {
            let _ = lesser.health.apply_heal(amount);
            Some(lesser.health)
        } else {
            tracing::warn!(id, "heal for unknown entity ignored");
            None
        };

        health
            .map(|h| {
                vec![PopulationEvent::HealthChanged {
                    id,
                    current: h.current,
                    max: h.max,
                }]
            })
            .unwrap_or_default()
    }

    /// Raise a split request for an enemy. Idempotent until processed.
    pub fn request_split(&mut self, id: EntityId) {
        if let Some(enemy) = self.enemies.get_mut(&id) {
            if enemy.request_split() {
                self.deferred.push_back(Request::Split(id));
            }
        } else {
            tracing::warn!(id, "split request for unknown enemy ignored");
        }
    }

    /// Raise a merge request for an enemy. Idempotent until processed.
    pub fn request_merge(&mut self, id: EntityId) {
        if let Some(enemy) = self.enemies.get_mut(&id) {
            if enemy.request_merge() {
                self.deferred.push_back(Request::Merge(id));
            }
        } else {
            tracing::warn!(id, "merge request for unknown enemy ignored");
        }
    }

    /// Explicitly remove an entity (deliberate despawn, not a bookkeeping
    /// casualty). Pending merges involving it are cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::EntityNotFound`] when no live entity has the id.
    pub fn despawn(&mut self, id: EntityId) -> Result<Vec<PopulationEvent>> {
        let mut events = Vec::new();

        if self.enemies.contains_key(&id) {
            if let Some(released) = self.merge.cancel_for_death(id, &mut self.enemies) {
                events.push(PopulationEvent::MergeCancelled { released });
            }
            let _ = self.enemies.remove(&id);
            events.push(PopulationEvent::EnemyKilled { id });
        } else if self.lessers.remove(&id).is_some() {
            events.push(PopulationEvent::LesserKilled { id });
        } else {
            return Err(CoreError::EntityNotFound(id));
        }

        self.report_progress(&mut events);
        Ok(events)
    }

    /// Despawn every live lesser enemy (the off-field sweep collaborators
    /// trigger when units drift out of play).
    pub fn clear_lessers(&mut self) -> Vec<PopulationEvent> {
        let mut ids: Vec<_> = self.lessers.keys().copied().collect();
        ids.sort_unstable();

        let mut events = Vec::new();
        for id in ids {
            let _ = self.lessers.remove(&id);
            events.push(PopulationEvent::LesserKilled { id });
        }
        if !events.is_empty() {
            self.report_progress(&mut events);
        }
        events
    }

    /// Spawn a full enemy directly (scenario setup and tests).
    ///
    /// Empty counts are rejected with a warning: an enemy with no units is
    /// not a live enemy.
    pub fn spawn_enemy(
        &mut self,
        counts: ElementCounts,
        position: Vec2Fixed,
    ) -> Option<(EntityId, Vec<PopulationEvent>)> {
        if counts.is_empty() {
            tracing::warn!("refusing to spawn an enemy with no elemental units");
            return None;
        }
        let mut events = Vec::new();
        let id = self.spawn_enemy_at(counts, position, &mut events);
        Some((id, events))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn allocate_id(&mut self) -> (EntityId, u64) {
        let id = self.next_id;
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        (id, seq)
    }

    fn spawn_enemy_at(
        &mut self,
        counts: ElementCounts,
        position: Vec2Fixed,
        events: &mut Vec<PopulationEvent>,
    ) -> EntityId {
        let (id, seq) = self.allocate_id();
        let enemy = Enemy::new(id, seq, counts, position, &self.config);
        let _ = self.enemies.insert(id, enemy);
        events.push(PopulationEvent::EnemySpawned {
            id,
            counts,
            position,
        });
        id
    }

    fn spawn_lesser_at(
        &mut self,
        element: Element,
        position: Vec2Fixed,
        events: &mut Vec<PopulationEvent>,
    ) -> EntityId {
        let (id, _) = self.allocate_id();
        let lesser = LesserEnemy::new(id, element, position, &self.config);
        let _ = self.lessers.insert(id, lesser);
        events.push(PopulationEvent::LesserSpawned {
            id,
            element,
            position,
        });
        id
    }

    fn push_counts_events(
        id: EntityId,
        outcome: &CountsOutcome,
        events: &mut Vec<PopulationEvent>,
    ) {
        for &(element, count) in &outcome.changed {
            events.push(PopulationEvent::ElementChanged { id, element, count });
        }
        if let Some(dominant) = outcome.new_dominant {
            events.push(PopulationEvent::DominantChanged { id, dominant });
        }
    }

    /// Drain the deferred queue. Requests enqueued while draining (e.g. by a
    /// split raising further work) are left for the next tick, so the queue
    /// is consumed exactly once per tick.
    fn drain_deferred(&mut self, events: &mut Vec<PopulationEvent>) {
        let batch: Vec<Request> = self.deferred.drain(..).collect();
        for request in batch {
            match request {
                Request::Split(id) => self.process_split(id, events),
                Request::Merge(id) => {
                    if let Some(pair) = self.merge.request(id, &mut self.enemies) {
                        events.push(PopulationEvent::MergePaired {
                            first: pair.first,
                            second: pair.second,
                            midpoint: pair.midpoint,
                        });
                    }
                }
                Request::Arrival(id) => self.process_arrival(id, events),
            }
        }
    }

    fn process_split(&mut self, id: EntityId, events: &mut Vec<PopulationEvent>) {
        let Some(mother) = self.enemies.get(&id) else {
            tracing::debug!(id, "split request for despawned enemy dropped");
            return;
        };
        if mother.is_killed() {
            tracing::debug!(id, "split request for killed enemy dropped");
            return;
        }

        let mother_position = mother.position;
        let Some(plan) = plan_split(mother, &self.config) else {
            if let Some(enemy) = self.enemies.get_mut(&id) {
                enemy.rearm_split();
            }
            return;
        };

        // A splitting enemy abandons any merge it was part of; the partner
        // must not be left converging on a stale midpoint.
        if let Some(released) = self.merge.cancel_for_death(id, &mut self.enemies) {
            events.push(PopulationEvent::MergeCancelled { released });
        }
        if let Some(enemy) = self.enemies.get_mut(&id) {
            enemy.merge_state = crate::merge::MergeState::Free;
            enemy.rearm_merge();
            enemy.target = None;
        }

        for &(element, position) in &plan.remnants {
            let _ = self.spawn_lesser_at(element, position, events);
        }

        let mut daughter_id = None;
        match plan.daughter {
            DaughterOutcome::None => {}
            DaughterOutcome::Lesser { element, position } => {
                let _ = self.spawn_lesser_at(element, position, events);
            }
            DaughterOutcome::Full {
                counts,
                health,
                scale,
            } => {
                let new_id = self.spawn_enemy_at(counts, mother_position, events);
                if let Some(daughter) = self.enemies.get_mut(&new_id) {
                    daughter.health = health;
                    daughter.scale = scale;
                }
                events.push(PopulationEvent::HealthChanged {
                    id: new_id,
                    current: health.current,
                    max: health.max,
                });
                daughter_id = Some(new_id);
            }
        }

        match plan.mother {
            MotherOutcome::Killed => {
                if let Some(enemy) = self.enemies.get_mut(&id) {
                    let outcome = enemy.set_counts(ElementCounts::new());
                    Self::push_counts_events(id, &outcome, events);
                }
            }
            MotherOutcome::Demoted(element) => {
                let _ = self.spawn_lesser_at(element, mother_position, events);
                if let Some(enemy) = self.enemies.get_mut(&id) {
                    let outcome = enemy.set_counts(ElementCounts::new());
                    Self::push_counts_events(id, &outcome, events);
                }
            }
            MotherOutcome::Survives {
                counts,
                health,
                scale,
            } => {
                if let Some(enemy) = self.enemies.get_mut(&id) {
                    let outcome = enemy.set_counts(counts);
                    enemy.health = health;
                    enemy.scale = scale;
                    enemy.rearm_split();
                    Self::push_counts_events(id, &outcome, events);
                    events.push(PopulationEvent::HealthChanged {
                        id,
                        current: health.current,
                        max: health.max,
                    });
                }
            }
        }

        if let Some((mother_target, daughter_target)) = plan.separation {
            if let Some(enemy) = self.enemies.get_mut(&id) {
                enemy.target = Some(mother_target);
            }
            if let Some(new_id) = daughter_id {
                if let Some(daughter) = self.enemies.get_mut(&new_id) {
                    daughter.target = Some(daughter_target);
                }
            }
        }

        events.push(PopulationEvent::SplitCompleted {
            mother: id,
            daughter: daughter_id,
        });
    }

    fn process_arrival(&mut self, id: EntityId, events: &mut Vec<PopulationEvent>) {
        if !self.enemies.contains_key(&id) {
            // Lesser enemies never carry movement targets.
            tracing::debug!(id, "arrival for non-enemy entity dropped");
            return;
        }

        match self.merge.on_arrival(id, &mut self.enemies, &self.config) {
            ArrivalOutcome::Movement => {
                if let Some(enemy) = self.enemies.get_mut(&id) {
                    enemy.target = None;
                }
            }
            ArrivalOutcome::PartnerHolding => {}
            ArrivalOutcome::Merged(record) => {
                Self::push_counts_events(record.survivor, &record.survivor_counts, events);
                if let Some(survivor) = self.enemies.get(&record.survivor) {
                    events.push(PopulationEvent::HealthChanged {
                        id: record.survivor,
                        current: survivor.health.current,
                        max: survivor.health.max,
                    });
                }
                events.push(PopulationEvent::MergeCompleted {
                    survivor: record.survivor,
                    absorbed: record.absorbed,
                });
            }
            ArrivalOutcome::Cancelled { released } => {
                events.push(PopulationEvent::MergeCancelled { released });
            }
        }
    }

    /// Remove everything marked killed, unwinding merge bookkeeping first.
    fn reap(&mut self, events: &mut Vec<PopulationEvent>) {
        let mut dead_enemies: Vec<EntityId> = self
            .enemies
            .values()
            .filter(|enemy| enemy.is_killed())
            .map(|enemy| enemy.id)
            .collect();
        dead_enemies.sort_unstable();

        for id in dead_enemies {
            if let Some(released) = self.merge.cancel_for_death(id, &mut self.enemies) {
                events.push(PopulationEvent::MergeCancelled { released });
            }
            let _ = self.enemies.remove(&id);
            events.push(PopulationEvent::EnemyKilled { id });
        }

        let mut dead_lessers: Vec<EntityId> = self
            .lessers
            .values()
            .filter(|lesser| lesser.is_killed())
            .map(|lesser| lesser.id)
            .collect();
        dead_lessers.sort_unstable();

        for id in dead_lessers {
            let _ = self.lessers.remove(&id);
            events.push(PopulationEvent::LesserKilled { id });
        }

        self.report_progress(events);
    }

    fn report_progress(&mut self, events: &mut Vec<PopulationEvent>) {
        let live = self.enemies.len() + self.lessers.len();
        if live != self.wave.last_reported_live {
            self.wave.last_reported_live = live;
            events.push(PopulationEvent::WaveProgressChanged {
                live,
                initial: self.wave.initial_population,
            });
        }
    }

    fn check_completion(&mut self, events: &mut Vec<PopulationEvent>) {
        if self.wave.state != WaveState::InProgress {
            return;
        }
        if self.wave.elapsed_ticks <= self.config.settle_buffer {
            return;
        }
        if !self.enemies.is_empty() || !self.lessers.is_empty() {
            return;
        }

        self.wave.state = WaveState::Complete;
        events.push(PopulationEvent::WaveStateChanged {
            state: WaveState::Complete,
        });
        events.push(PopulationEvent::WaveCompleted {
            wave: self.wave.index,
        });
    }

    /// When the population exceeds the configured ceiling, pair the smallest
    /// enemies together: request merges for everything beyond the ceiling-th
    /// largest, plus the ceiling-th itself when the ceiling is odd so the
    /// requests pair up cleanly.
    fn auto_merge(&mut self) {
        let ceiling = self.config.auto_merge_ceiling;
        if self.enemies.len() <= ceiling {
            return;
        }

        let mut ranked: Vec<(EntityId, u32, u64)> = self
            .enemies
            .values()
            .filter(|enemy| !enemy.is_killed())
            .map(|enemy| (enemy.id, enemy.total(), enemy.spawn_seq))
            .collect();
        // Stable descending sort by total; insertion order breaks ties.
        ranked.sort_by_key(|&(_, _, seq)| seq);
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        tracing::debug!(
            live = ranked.len(),
            ceiling,
            "auto-merge ceiling exceeded, pairing smallest enemies"
        );

        for &(id, _, _) in ranked.iter().skip(ceiling) {
            self.request_merge(id);
        }
        if ceiling % 2 == 1 {
            if let Some(&(id, _, _)) = ranked.get(ceiling - 1) {
                self.request_merge(id);
            }
        }
    }

    /// Lay the non-targeting population out on the 2-column spawn grid.
    ///
    /// Entities are stable-sorted by vertical position so the layout never
    /// swaps two enemies past each other, then each is assigned its own row
    /// at spacing `height / (count + 1)`, alternating between columns at
    /// 25% and 75% of the rectangle width. In preview mode entities snap to
    /// their slot; otherwise the slot becomes a movement target.
    fn reposition(&mut self, preview: bool) {
        let mut layout: Vec<(EntityId, Vec2Fixed, u64)> = self
            .enemies
            .values()
            .filter(|enemy| !enemy.is_killed() && !enemy.is_targeting())
            .map(|enemy| (enemy.id, enemy.position, enemy.spawn_seq))
            .collect();
        if layout.is_empty() {
            return;
        }

        layout.sort_by_key(|&(_, _, seq)| seq);
        layout.sort_by(|a, b| a.1.y.cmp(&b.1.y));

        let count = layout.len() as i32;
        let spacing = self.config.spawn_height() / Fixed::from_num(count + 1);
        let quarter = self.config.spawn_width() / Fixed::from_num(4);

        for (row, &(id, _, _)) in layout.iter().enumerate() {
            let column_factor = if row % 2 == 0 { 1 } else { 3 };
            let slot = Vec2Fixed::new(
                self.config.spawn_min.x + quarter * Fixed::from_num(column_factor),
                self.config.spawn_min.y + spacing * Fixed::from_num(row as i32 + 1),
            );

            if let Some(enemy) = self.enemies.get_mut(&id) {
                if preview {
                    enemy.position = slot;
                } else if enemy.position != slot {
                    enemy.target = Some(slot);
                }
            }
        }
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Calculate a hash of the full population state.
    ///
    /// Two managers fed identical command sequences produce identical
    /// hashes; used by determinism tests and divergence checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick_count.hash(&mut hasher);
        self.wave.index.hash(&mut hasher);
        self.wave.elapsed_ticks.hash(&mut hasher);
        self.wave.state.hash(&mut hasher);

        let ids = self.sorted_enemy_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(enemy) = self.enemies.get(&id) {
                id.hash(&mut hasher);
                for (_, count) in enemy.counts().iter() {
                    count.hash(&mut hasher);
                }
                enemy.health.current.hash(&mut hasher);
                enemy.health.max.hash(&mut hasher);
                enemy.position.x.to_bits().hash(&mut hasher);
                enemy.position.y.to_bits().hash(&mut hasher);
                enemy.scale.to_bits().hash(&mut hasher);
                if let Some(target) = enemy.target {
                    target.x.to_bits().hash(&mut hasher);
                    target.y.to_bits().hash(&mut hasher);
                }
            }
        }

        let mut lesser_ids: Vec<_> = self.lessers.keys().copied().collect();
        lesser_ids.sort_unstable();
        lesser_ids.len().hash(&mut hasher);
        for id in lesser_ids {
            if let Some(lesser) = self.lessers.get(&id) {
                id.hash(&mut hasher);
                lesser.element.ordinal().hash(&mut hasher);
                lesser.health.current.hash(&mut hasher);
                lesser.position.x.to_bits().hash(&mut hasher);
                lesser.position.y.to_bits().hash(&mut hasher);
            }
        }

        self.merge.waiting().hash(&mut hasher);

        hasher.finish()
    }

    /// Serialize the manager for replay or save-state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Snapshot`] if encoding fails.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).map_err(|e| CoreError::Snapshot {
            action: "serialize",
            message: e.to_string(),
        })
    }

    /// Restore a manager from a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Snapshot`] if decoding fails.
    pub fn restore(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data).map_err(|e| CoreError::Snapshot {
            action: "deserialize",
            message: e.to_string(),
        })
    }
}

impl Default for PopulationManager {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}
