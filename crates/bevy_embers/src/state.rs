use bevy::prelude::*;
use bytemuck::{Pod, Zeroable};

use crate::formula::{
    STREAM_PARTICLE_NOISE, STREAM_SPAWN_JITTER, generation_seed, rnd3, unit_noise,
};

/// Per-particle simulation record.
///
/// Laid out as one `Rgba32Float` texel: origin in `rgb`, age in `a`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct ParticleState {
    /// Spawn origin in world space.
    pub origin: [f32; 3],
    /// Time since the last spawn; negative while waiting to spawn.
    pub age: f32,
}

impl ParticleState {
    /// Spawn origin as a vector.
    pub fn origin(&self) -> Vec3 {
        Vec3::from_array(self.origin)
    }
}

/// Two full copies of the particle states.
///
/// Exactly one buffer is current at any time. Writers only ever fill the stale buffer
/// and the designation flips once the write has completed, so a reader holding
/// [`current`](Self::current) never sees a partially written frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleStateBuffer {
    buffers: [Vec<ParticleState>; 2],
    current: usize,
}

impl ParticleStateBuffer {
    /// Creates a buffer pair whose current side holds `initial`.
    pub fn new(initial: Vec<ParticleState>) -> Self {
        let stale = initial.clone();
        Self {
            buffers: [initial, stale],
            current: 0,
        }
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    /// Returns `true` if no particles are allocated.
    pub fn is_empty(&self) -> bool {
        self.buffers[0].is_empty()
    }

    /// The most recently completed states.
    pub fn current(&self) -> &[ParticleState] {
        &self.buffers[self.current]
    }

    /// Index (`0` or `1`) of the current buffer.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Runs `write` from the current buffer into the stale one, then swaps.
    pub fn advance(&mut self, write: impl FnOnce(&[ParticleState], &mut [ParticleState])) {
        let [a, b] = &mut self.buffers;
        let (src, dst) = if self.current == 0 { (a, b) } else { (b, a) };
        write(src, dst);
        self.swap();
    }

    /// Runs `write` from an external source into the stale buffer, then swaps.
    pub fn advance_from(
        &mut self,
        source: &[ParticleState],
        write: impl FnOnce(&[ParticleState], &mut [ParticleState]),
    ) {
        write(source, &mut self.buffers[1 - self.current]);
        self.swap();
    }

    /// Flips the current and stale designation.
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }

    /// Replaces the current states in place.
    pub fn overwrite_current(&mut self, states: &[ParticleState]) {
        self.buffers[self.current].copy_from_slice(states);
    }
}

/// Simulation state of one emitter: the double buffer, the snapshot it started from
/// and the fixed per-particle noise.
#[derive(Debug, Clone, PartialEq)]
pub struct StateStore {
    buffer: ParticleStateBuffer,
    initial: Vec<ParticleState>,
    particle_noise: Vec<f32>,
}

impl StateStore {
    /// Allocates `num_particles` states.
    ///
    /// Particle `i` starts at `age = -(rate * i)` with an origin jittered uniformly in
    /// `spawn_bounds * [-1, 1]`. `generation` is mixed into the seed so a reallocation
    /// draws new random values.
    pub fn allocate(
        num_particles: u32,
        rate: f32,
        spawn_bounds: Vec3,
        seed: u32,
        generation: u32,
    ) -> Self {
        let seed = generation_seed(seed, generation);

        let initial: Vec<ParticleState> = (0..num_particles)
            .map(|i| {
                let jitter = rnd3(unit_noise(seed, i, STREAM_SPAWN_JITTER)) * 2.0 - 1.0;
                ParticleState {
                    origin: (spawn_bounds * jitter).to_array(),
                    age: -(rate * i as f32),
                }
            })
            .collect();

        let particle_noise = (0..num_particles)
            .map(|i| unit_noise(seed, i, STREAM_PARTICLE_NOISE))
            .collect();

        Self {
            buffer: ParticleStateBuffer::new(initial.clone()),
            initial,
            particle_noise,
        }
    }

    /// The double buffer.
    pub fn buffer(&self) -> &ParticleStateBuffer {
        &self.buffer
    }

    /// Mutable access to the double buffer.
    pub fn buffer_mut(&mut self) -> &mut ParticleStateBuffer {
        &mut self.buffer
    }

    /// The most recently completed states.
    pub fn current(&self) -> &[ParticleState] {
        self.buffer.current()
    }

    /// The states as allocated, before any step.
    pub fn initial(&self) -> &[ParticleState] {
        &self.initial
    }

    /// Fixed random value per particle, in `[0, 1)`.
    pub fn particle_noise(&self) -> &[f32] {
        &self.particle_noise
    }

    /// Number of particles.
    pub fn len(&self) -> usize {
        self.initial.len()
    }

    /// Returns `true` if no particles are allocated.
    pub fn is_empty(&self) -> bool {
        self.initial.is_empty()
    }

    /// Copies the initial snapshot over the current states.
    pub fn restore_initial(&mut self) {
        self.buffer.overwrite_current(&self.initial);
    }

    /// Splits the store into the pieces one processor pass needs.
    pub(crate) fn split_mut(&mut self) -> (&mut ParticleStateBuffer, &[ParticleState], &[f32]) {
        (&mut self.buffer, &self.initial, &self.particle_noise)
    }
}
