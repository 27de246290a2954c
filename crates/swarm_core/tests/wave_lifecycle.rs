//! End-to-end wave runs against scripted collaborators.
//!
//! The movement collaborator here converges entities on their targets a
//! fixed step per tick and reports arrival within tolerance; combat is a
//! scripted damage drip. Together they exercise the full lifecycle:
//! Idle -> Loaded -> InProgress -> Complete, including the split and merge
//! traffic a real fight produces.

use swarm_core::prelude::*;

/// Fixed-step movement toward each target, with arrival reporting. When the
/// step covers the remaining distance the entity snaps onto the target, so
/// it can never oscillate around it.
fn drive_movement(manager: &mut PopulationManager, step: Fixed) {
    let tolerance = manager.config().arrival_tolerance;
    for (id, position, target) in manager.movement_targets() {
        let dist_sq = position.distance_squared(target);
        if dist_sq <= (tolerance * tolerance).max(step * step) {
            manager.set_position(id, target);
            manager.notify_arrival(id);
        } else {
            let dir = (target - position).normalize();
            manager.set_position(id, position + dir.scaled(step));
        }
    }
}

/// Hit every live entity for a flat amount, the way a bullet spray would.
fn spray_damage(manager: &mut PopulationManager, amount: u32) {
    let mut ids = manager.sorted_enemy_ids();
    ids.extend(manager.sorted_lesser_ids());
    for id in ids {
        let _ = manager.apply_damage(id, amount, Some(Element::Fire));
    }
}

#[test]
fn wave_runs_to_completion_under_fire() {
    let mut manager = PopulationManager::new(CoreConfig::default());
    let _ = manager.load_generated(3).expect("load");
    assert_eq!(manager.wave_state(), WaveState::Loaded);
    let _ = manager.start_wave().expect("start");

    let mut completed = false;
    for _ in 0..5_000 {
        spray_damage(&mut manager, 60);
        let events = manager.tick();
        drive_movement(&mut manager, Fixed::from_num(40));
        if events
            .iter()
            .any(|event| matches!(event, PopulationEvent::WaveCompleted { .. }))
        {
            completed = true;
            break;
        }
    }

    assert!(completed, "wave never cleared");
    assert_eq!(manager.wave_state(), WaveState::Complete);
    assert_eq!(manager.live_enemy_count(), 0);
    assert_eq!(manager.live_lesser_count(), 0);
}

#[test]
fn identical_runs_stay_in_lockstep() {
    let run = |ticks: u32| {
        let mut manager = PopulationManager::new(CoreConfig::default());
        let _ = manager.load_generated(5).expect("load");
        let _ = manager.start_wave().expect("start");

        for tick in 0..ticks {
            if tick % 7 == 0 {
                if let Some(&id) = manager.sorted_enemy_ids().first() {
                    let _ = manager.apply_damage(id, 90, Some(Element::Metal));
                }
            }
            let _ = manager.tick();
            drive_movement(&mut manager, Fixed::from_num(25));
        }
        manager
    };

    let a = run(300);
    let b = run(300);
    assert_eq!(a.state_hash(), b.state_hash());
    assert_eq!(a.encode_alive(), b.encode_alive());
}

#[test]
fn snapshot_restores_mid_fight() {
    let mut manager = PopulationManager::new(CoreConfig::default());
    let _ = manager.load_generated(4).expect("load");
    let _ = manager.start_wave().expect("start");

    for _ in 0..50 {
        if let Some(&id) = manager.sorted_enemy_ids().first() {
            let _ = manager.apply_damage(id, 120, None);
        }
        let _ = manager.tick();
        drive_movement(&mut manager, Fixed::from_num(25));
    }

    let bytes = manager.snapshot().expect("snapshot");
    let mut restored = PopulationManager::restore(&bytes).expect("restore");
    assert_eq!(manager.state_hash(), restored.state_hash());

    // both copies keep evolving identically
    for _ in 0..20 {
        let _ = manager.tick();
        let _ = restored.tick();
        drive_movement(&mut manager, Fixed::from_num(25));
        drive_movement(&mut restored, Fixed::from_num(25));
    }
    assert_eq!(manager.state_hash(), restored.state_hash());
}

#[test]
fn generated_wave_matches_its_replay_encoding() {
    let mut manager = PopulationManager::new(CoreConfig::default());
    let _ = manager.load_generated(7).expect("load");
    assert_eq!(manager.encode_alive(), manager.wave_encoding());
}
