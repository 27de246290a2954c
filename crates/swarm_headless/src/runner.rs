//! Wave runner: owns the population manager and stands in for its
//! collaborators.
//!
//! The movement collaborator converges each targeting enemy on its target a
//! fixed step per tick and reports arrival once within tolerance; the combat
//! collaborator sprays flat volleys of damage on a cadence. Neither does
//! anything a real physics or weapons layer would not.

use std::result::Result;

use serde::Serialize;
use thiserror::Error;

use swarm_core::prelude::*;

/// Errors surfaced by a headless run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The population core rejected a lifecycle call.
    #[error("population core error: {0}")]
    Core(#[from] CoreError),
    /// The wave did not clear within the tick budget.
    #[error("wave {wave} still live after {ticks} ticks")]
    Stalled {
        /// Wave that stalled.
        wave: u32,
        /// Budget that was exhausted.
        ticks: u32,
    },
}

/// Knobs for the scripted collaborators.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Abort threshold per wave.
    pub max_ticks_per_wave: u32,
    /// World units each targeting enemy moves per tick.
    pub move_step: Fixed,
    /// Flat damage per volley against every live entity.
    pub volley_damage: u32,
    /// Ticks between volleys.
    pub volley_interval: u32,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_ticks_per_wave: 20_000,
            move_step: Fixed::from_num(30),
            volley_damage: 40,
            volley_interval: 3,
        }
    }
}

/// Per-wave report printed by the binary.
#[derive(Debug, Clone, Serialize)]
pub struct WaveSummary {
    /// Wave index.
    pub wave: u32,
    /// Encoding the wave was spawned from.
    pub encoding: String,
    /// Enemies spawned at load.
    pub spawned: usize,
    /// Ticks until the field cleared.
    pub ticks: u32,
    /// Splits resolved during the wave.
    pub splits: u32,
    /// Merges completed during the wave.
    pub merges: u32,
    /// Merges cancelled before rendezvous.
    pub merges_cancelled: u32,
    /// Largest concurrent enemy count observed.
    pub peak_enemies: usize,
    /// Lesser enemies spawned as split/merge remainder.
    pub lessers_spawned: u32,
}

/// Drives one `PopulationManager` through consecutive waves.
pub struct WaveRunner {
    manager: PopulationManager,
    config: RunnerConfig,
}

impl WaveRunner {
    /// Create a runner around a fresh population manager.
    #[must_use]
    pub fn new(core_config: CoreConfig, config: RunnerConfig) -> Self {
        Self {
            manager: PopulationManager::new(core_config),
            config,
        }
    }

    /// Load, start, and clear one generated wave, returning its summary.
    pub fn run_wave(&mut self, wave_index: u32) -> Result<WaveSummary, RunError> {
        let load_events = self.manager.load_generated(wave_index)?;
        let spawned = load_events
            .iter()
            .filter(|event| matches!(event, PopulationEvent::EnemySpawned { .. }))
            .count();
        let _ = self.manager.start_wave()?;

        let mut summary = WaveSummary {
            wave: wave_index,
            encoding: self.manager.wave_encoding().to_owned(),
            spawned,
            ticks: 0,
            splits: 0,
            merges: 0,
            merges_cancelled: 0,
            peak_enemies: spawned,
            lessers_spawned: 0,
        };

        for tick in 0..self.config.max_ticks_per_wave {
            if tick % self.config.volley_interval == 0 {
                self.fire_volley();
            }

            let events = self.manager.tick();
            self.drive_movement();

            summary.ticks = tick + 1;
            summary.peak_enemies = summary.peak_enemies.max(self.manager.live_enemy_count());

            let mut completed = false;
            for event in &events {
                match event {
                    PopulationEvent::SplitCompleted { .. } => summary.splits += 1,
                    PopulationEvent::MergeCompleted { .. } => summary.merges += 1,
                    PopulationEvent::MergeCancelled { .. } => summary.merges_cancelled += 1,
                    PopulationEvent::LesserSpawned { .. } => summary.lessers_spawned += 1,
                    PopulationEvent::WaveCompleted { .. } => completed = true,
                    _ => {}
                }
            }

            if completed {
                tracing::info!(
                    wave = wave_index,
                    ticks = summary.ticks,
                    splits = summary.splits,
                    merges = summary.merges,
                    "wave cleared"
                );
                return Ok(summary);
            }
        }

        Err(RunError::Stalled {
            wave: wave_index,
            ticks: self.config.max_ticks_per_wave,
        })
    }

    /// Movement collaborator: fixed-step convergence with one arrival
    /// notification per reached target. Snaps when the step covers the
    /// remaining distance so entities never orbit their targets.
    fn drive_movement(&mut self) {
        let step = self.config.move_step;
        let tolerance = self.manager.config().arrival_tolerance;
        for (id, position, target) in self.manager.movement_targets() {
            let dist_sq = position.distance_squared(target);
            if dist_sq <= (tolerance * tolerance).max(step * step) {
                self.manager.set_position(id, target);
                self.manager.notify_arrival(id);
            } else {
                let dir = (target - position).normalize();
                self.manager.set_position(id, position + dir.scaled(step));
            }
        }
    }

    /// Combat collaborator: flat volley against everything on the field,
    /// scaled by elemental effectiveness against each target's identity.
    fn fire_volley(&mut self) {
        let attacker = Element::Fire;
        let base = self.config.volley_damage;

        for id in self.manager.sorted_enemy_ids() {
            let Some(defender) = self.manager.enemy(id).and_then(Enemy::dominant) else {
                continue;
            };
            let amount = scale_damage(base, attacker, defender);
            let _ = self.manager.apply_damage(id, amount, Some(attacker));
        }
        for id in self.manager.sorted_lesser_ids() {
            let Some(defender) = self.manager.lesser(id).map(|l| l.element) else {
                continue;
            };
            let amount = scale_damage(base, attacker, defender);
            let _ = self.manager.apply_damage(id, amount, Some(attacker));
        }
    }
}

/// Apply the elemental multiplier the combat layer owns.
fn scale_damage(base: u32, attacker: Element, defender: Element) -> u32 {
    let scaled = Fixed::from_num(base) * attacker.effectiveness_vs(defender);
    scaled.to_num::<u32>().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_damage_applies_counter_bonus() {
        // Water counters Fire
        assert_eq!(scale_damage(40, Element::Water, Element::Fire), 60);
        assert_eq!(scale_damage(40, Element::Fire, Element::Water), 20);
        assert_eq!(scale_damage(40, Element::Fire, Element::Earth), 40);
    }

    #[test]
    fn test_runner_clears_first_waves() {
        let mut runner = WaveRunner::new(CoreConfig::default(), RunnerConfig::default());
        for wave in 1..=3 {
            let summary = runner.run_wave(wave).expect("wave clears");
            assert!(summary.ticks > 0);
            assert!(summary.spawned > 0);
        }
    }
}
