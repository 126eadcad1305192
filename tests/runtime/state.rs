use super::helpers::*;

use bevy::prelude::*;
use bevy_embers::prelude::*;
use bevy_embers::state::{ParticleState, ParticleStateBuffer, StateStore};

#[test]
fn initial_ages_are_staggered_by_rate() {
    let store = StateStore::allocate(6, 0.5, Vec3::ZERO, 0, 0);
    let ages: Vec<f32> = store.current().iter().map(|s| s.age).collect();
    assert_eq!(ages, vec![0.0, -0.5, -1.0, -1.5, -2.0, -2.5]);
}

#[test]
fn zero_rate_spawns_everything_at_once() {
    let store = StateStore::allocate(4, 0.0, Vec3::ZERO, 0, 0);
    assert!(store.current().iter().all(|s| s.age == 0.0));
}

#[test]
fn spawn_origins_stay_inside_bounds() {
    let bounds = Vec3::new(2.0, 0.0, 5.0);
    let store = StateStore::allocate(256, 1.0, bounds, 3, 0);
    for state in store.current() {
        let origin = state.origin();
        assert!(origin.abs().cmple(bounds).all(), "{origin} outside {bounds}");
    }
    assert!(store.current().iter().any(|s| s.origin[0] < 0.0));
    assert!(store.current().iter().any(|s| s.origin[0] > 0.0));
}

#[test]
fn allocation_is_seeded() {
    let a = StateStore::allocate(32, 1.0, Vec3::ONE, 11, 0);
    let b = StateStore::allocate(32, 1.0, Vec3::ONE, 11, 0);
    let c = StateStore::allocate(32, 1.0, Vec3::ONE, 12, 0);
    let d = StateStore::allocate(32, 1.0, Vec3::ONE, 11, 1);

    assert_eq!(a, b);
    assert_ne!(a.particle_noise(), c.particle_noise());
    assert_ne!(a.particle_noise(), d.particle_noise());
    assert!(a.particle_noise().iter().all(|n| (0.0..1.0).contains(n)));
}

#[test]
fn the_last_written_buffer_is_always_current() {
    let mut buffer = ParticleStateBuffer::new(vec![ParticleState::default(); 3]);

    for frame in 1..=5 {
        let before = buffer.current_index();
        buffer.advance(|src, dst| {
            for (s, d) in src.iter().zip(dst.iter_mut()) {
                d.age = s.age + 1.0;
            }
        });
        assert_ne!(buffer.current_index(), before);
        assert!(buffer.current().iter().all(|s| s.age == frame as f32));
    }
}

#[test]
fn cpu_reset_restores_the_initial_snapshot() {
    let mut emitter = new_emitter(basic_loop_settings());
    let initial = emitter.store().initial().to_vec();

    advance(&mut emitter, 0.5, 7);
    assert_ne!(emitter.states(), initial.as_slice());

    emitter.reset();
    assert_eq!(emitter.states(), initial.as_slice());
}

#[test]
fn accelerated_reset_matches_one_zero_length_step() {
    let settings = EmitterSettings {
        mode: SimulationMode::Accelerated,
        spawn_bounds: Vec3::splat(1.0),
        ..basic_loop_settings()
    };
    let mut emitter = new_emitter(settings.clone());
    advance(&mut emitter, 0.5, 5);
    emitter.reset();

    let mut fresh = new_emitter(settings);
    fresh.add_time(0.0).unwrap();

    assert_eq!(emitter.mode(), SimulationMode::Accelerated);
    assert_eq!(emitter.states(), fresh.states());
}

#[test]
fn reset_restarts_the_one_shot_timer() {
    let mut emitter = new_emitter(EmitterSettings {
        one_shot: true,
        ..basic_loop_settings()
    });
    let interval = emitter.emission_interval();

    advance(&mut emitter, 0.5, 4);
    emitter.reset();

    assert_eq!(emitter.end_time(), emitter.time() + interval);
    assert!(!emitter.is_finished());
}
