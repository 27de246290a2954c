//! Property tests for the bookkeeping invariants.
//!
//! The load-bearing one: elemental units are conserved. No sequence of
//! splits and merges may create or destroy a unit — units only leave the
//! field through damage kills and explicit despawns, neither of which these
//! scenarios perform.

use proptest::prelude::*;

use swarm_core::prelude::*;
use swarm_core::wave;

/// Drive every targeting enemy straight to its target and deliver the
/// arrival notification, standing in for the movement collaborator.
fn snap_movement(manager: &mut PopulationManager) {
    for (id, _, target) in manager.movement_targets() {
        manager.set_position(id, target);
        manager.notify_arrival(id);
    }
}

fn spawn_population(manager: &mut PopulationManager, populations: &[ElementCounts]) -> Vec<EntityId> {
    populations
        .iter()
        .filter(|counts| !counts.is_empty())
        .map(|&counts| {
            manager
                .spawn_enemy(counts, Vec2Fixed::ZERO)
                .expect("non-empty counts spawn")
                .0
        })
        .collect()
}

fn counts_strategy() -> impl Strategy<Value = ElementCounts> {
    proptest::array::uniform5(0u32..40).prop_map(ElementCounts::from_array)
}

proptest! {
    #[test]
    fn decode_encode_round_trips(slots in proptest::array::uniform5(0u32..100_000)) {
        let counts = ElementCounts::from_array(slots);
        prop_assert_eq!(ElementCounts::decode(&counts.encode()), counts);
    }

    #[test]
    fn wave_generation_is_reproducible(wave_index in 0u32..500) {
        prop_assert_eq!(wave::generate(wave_index), wave::generate(wave_index));
    }

    #[test]
    fn dominant_is_deterministic(slots in proptest::array::uniform5(0u32..50)) {
        let counts = ElementCounts::from_array(slots);
        prop_assert_eq!(counts.dominant(), counts.dominant());
        if let Some(dominant) = counts.dominant() {
            // nothing holds strictly more units than the dominant element
            for (element, count) in counts.iter() {
                prop_assert!(count <= counts.get(dominant), "{element} exceeds dominant");
            }
        } else {
            prop_assert!(counts.is_empty());
        }
    }

    /// Arbitrary interleavings of splits, merges, and ticks never change the
    /// total number of elemental units on the field.
    #[test]
    fn splits_and_merges_conserve_units(
        populations in proptest::collection::vec(counts_strategy(), 1..5),
        script in proptest::collection::vec((0u8..2, 0usize..8), 0..12),
    ) {
        let mut manager = PopulationManager::new(CoreConfig {
            // keep the policy quiet so only the scripted actions run
            auto_merge_ceiling: 1000,
            maintenance_interval: 1000,
            settle_buffer: 10_000,
            ..CoreConfig::default()
        });
        let _ = manager.load_wave(1, "").expect("load empty wave");
        let _ = manager.start_wave().expect("start");
        let _ = spawn_population(&mut manager, &populations);

        let total_before = manager.live_total_units();
        prop_assume!(total_before > 0);

        for (action, pick) in script {
            let ids = manager.sorted_enemy_ids();
            if let Some(&id) = ids.get(pick % ids.len().max(1)) {
                match action {
                    0 => manager.request_split(id),
                    _ => manager.request_merge(id),
                }
            }
            let _ = manager.tick();
            snap_movement(&mut manager);
            let _ = manager.tick();

            prop_assert_eq!(
                manager.live_total_units(),
                total_before,
                "units drifted after action {} on pick {}",
                action,
                pick
            );
        }
    }
}
