//! Pure per-particle math shared by the accelerated processor and the CPU emulation.
//!
//! Both execution paths call these functions with identical inputs, so a particle's
//! trajectory never depends on which path advanced it.

use std::f32::consts::FRAC_PI_2;

use bevy::prelude::*;

use crate::asset::SortMode;
use crate::state::ParticleState;

/// Hash stream for per-particle speed noise.
pub const STREAM_PARTICLE_NOISE: u32 = 0x5eed_0001;
/// Hash stream for the initial spawn jitter.
pub const STREAM_SPAWN_JITTER: u32 = 0x5eed_0002;
/// Hash stream for the random fraction stored next to the particle id.
pub const STREAM_VERTEX_RANDOM: u32 = 0x5eed_0003;

/// PCG output permutation of a 32-bit input.
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Deterministic value in `[0, 1)` for a `(seed, index, stream)` triple.
pub fn unit_noise(seed: u32, index: u32, stream: u32) -> f32 {
    let hash = pcg_hash(seed ^ pcg_hash(index.wrapping_add(pcg_hash(stream))));
    // top 24 bits, so the result is exact in f32 and never reaches 1.0
    (hash >> 8) as f32 / 16_777_216.0
}

/// Mixes a reallocation counter into an emitter seed.
pub fn generation_seed(seed: u32, generation: u32) -> u32 {
    seed ^ generation.wrapping_mul(0x9e37_79b9)
}

/// Spreads one random value into three decorrelated axes: `(r, fract(10r), fract(100r))`.
pub fn rnd3(r: f32) -> Vec3 {
    Vec3::new(r, (r * 10.0).fract(), (r * 100.0).fract())
}

/// Frame-local speed noise from a polynomial mix of index, stored state and time.
///
/// Saturated to `[0, 1]`.
pub fn frame_noise(index: u32, state: &ParticleState, time: f32) -> f32 {
    let [x, y, z] = state.origin;
    let mixed = index as f32 * (state.age + x + y + z + time + 1.0) * 1000.0;
    let mixed = (mixed % 13.0) * (mixed % 123.0);
    (0.1 + (mixed % 0.01) * 100.0).clamp(0.0, 1.0)
}

/// Inputs of one simulation step, identical for every particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepParams {
    /// Elapsed time of this step.
    pub dt: f32,
    /// Accumulated emitter time after this step.
    pub time: f32,
    /// Particle lifetime.
    pub lifetime: f32,
    /// Delay between consecutive spawns.
    pub rate: f32,
    /// Per-frame speed randomization.
    pub speed_div: f32,
    /// Per-particle speed randomization.
    pub constant_speed_div: f32,
    /// One-shot emitters never wrap.
    pub one_shot: bool,
    /// World-space emitter position.
    pub emitter_position: Vec3,
    /// Half extents of the spawn volume.
    pub spawn_bounds: Vec3,
}

/// `age = -rate + (age - lifetime)`, carrying the overflow into the next life.
pub fn wrap_age(age: f32, lifetime: f32, rate: f32) -> f32 {
    -rate + (age - lifetime)
}

/// Advances one particle by one step.
///
/// `particle_noise` is the particle's fixed random value, used both for the respawn
/// position and the constant speed factor.
pub fn advance_particle(
    index: u32,
    input: &ParticleState,
    particle_noise: f32,
    params: &StepParams,
) -> ParticleState {
    let mut out = *input;

    if out.age <= 0.0 {
        let jitter = rnd3(particle_noise) * 2.0 - 1.0;
        out.origin = (params.emitter_position + params.spawn_bounds * jitter).to_array();
    }

    let noise = frame_noise(index, input, params.time);
    let frame_speed = lerp(1.0 - params.speed_div, 1.0, noise);
    let particle_speed = lerp(1.0 - params.constant_speed_div, 1.0, particle_noise);
    out.age += params.dt * frame_speed * particle_speed;

    if !params.one_shot && out.age >= params.lifetime {
        out.age = wrap_age(out.age, params.lifetime, params.rate);
    }

    out
}

/// `a + (b - a) * t`, the interpolation every curve lookup uses.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Componentwise [`lerp`].
pub fn lerp3(a: Vec3, b: Vec3, t: Vec3) -> Vec3 {
    a + (b - a) * t
}

/// `lerp(v, lerp(v, -v, rnd), divergence)` per axis.
pub fn diverge(value: Vec3, divergence: Vec3, rnd: Vec3) -> Vec3 {
    lerp3(value, lerp3(value, -value, rnd), divergence)
}

/// Curve values at one normalized life, angle already in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LifeSample {
    /// Offset in emitter space.
    pub local_offset: Vec3,
    /// Divergence of the local offset.
    pub local_offset_divergence: Vec3,
    /// Offset in world space.
    pub world_offset: Vec3,
    /// Divergence of the world offset.
    pub world_offset_divergence: Vec3,
    /// Rotation in radians.
    pub angle: f32,
    /// Uniform scale.
    pub scale: f32,
    /// Angle divergence.
    pub angle_divergence: f32,
    /// Scale divergence.
    pub scale_divergence: f32,
    /// Alpha divergence.
    pub alpha_divergence: f32,
}

/// A lookup of every position-affecting curve at a normalized life.
///
/// Implemented by the full-precision quantized channels (CPU path) and by the packed
/// channel buffers (accelerated path).
pub trait LifeCurves {
    /// Samples every channel at `life`, clamped to `[0, 1]`.
    fn sample(&self, life: f32) -> LifeSample;
}

/// Camera-centered wrapping box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrapBox {
    /// Half size per axis.
    pub bounds: Vec3,
    /// Box center, usually the camera position.
    pub center: Vec3,
}

/// Wraps `position` into `center ± bounds` with a floored modulo, so the seam is
/// symmetric around the center. Positions already inside the box are unchanged.
pub fn wrap_position(position: Vec3, wrap: &WrapBox) -> Vec3 {
    let size = wrap.bounds * 2.0;
    let p = position - wrap.center + wrap.bounds;
    let floored = p - size * (p / size).floor();
    floored - wrap.bounds + wrap.center
}

/// Per-emitter inputs of the vertex stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexParams {
    /// Particle lifetime.
    pub lifetime: f32,
    /// Number of curve samples.
    pub precision: usize,
    /// Streak length, in curve samples.
    pub stretch: f32,
    /// One-shot particles past their lifetime are hidden.
    pub one_shot: bool,
    /// Rotation applied to local offsets (upper 3x3 of the emitter transform).
    pub rotation: Mat3,
    /// Spatial wrapping, if enabled.
    pub wrap: Option<WrapBox>,
    /// Draw order.
    pub sort: SortMode,
    /// World-space camera position used by [`SortMode::Distance`].
    pub camera_position: Vec3,
}

/// Resolved per-particle values of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ParticleFrame {
    /// Hidden particles collapse to the origin.
    pub enabled: bool,
    /// Normalized life at the leading position.
    pub life: f32,
    /// Leading world position.
    pub position: Vec3,
    /// Position `stretch / precision` earlier in life; equals `position` without stretch.
    pub trailing: Vec3,
    /// Rotation in radians.
    pub angle: f32,
    /// Uniform scale.
    pub scale: f32,
    /// Additive alpha offset.
    pub alpha_jitter: f32,
    /// Draw-order key, ascending.
    pub sort_key: f32,
}

impl ParticleFrame {
    /// The degenerate frame of a hidden particle.
    pub const DISABLED: Self = Self {
        enabled: false,
        life: 0.0,
        position: Vec3::ZERO,
        trailing: Vec3::ZERO,
        angle: 0.0,
        scale: 0.0,
        alpha_jitter: 0.0,
        sort_key: 0.0,
    };

    /// World position of a template corner whose local Y is `corner_y`.
    ///
    /// Corners at `y = -1` stay on the leading position, corners at `y = 1` move to the
    /// trailing one.
    pub fn corner_position(&self, corner_y: f32) -> Vec3 {
        let t = corner_y * 0.5 + 0.5;
        lerp3(self.position, self.trailing, Vec3::splat(t))
    }
}

/// Normalized life of an age: `max(age, 0) / lifetime`.
pub fn normalized_life(age: f32, lifetime: f32) -> f32 {
    age.max(0.0) / lifetime
}

fn particle_position<C: LifeCurves>(
    origin: Vec3,
    life: f32,
    rnd: f32,
    curves: &C,
    rotation: &Mat3,
) -> Vec3 {
    let sample = curves.sample(life);
    let spread = rnd3(rnd);
    let local = diverge(sample.local_offset, sample.local_offset_divergence, spread);
    let world = diverge(sample.world_offset, sample.world_offset_divergence, spread);
    origin + *rotation * local + world
}

/// Sort key of a resolved particle.
///
/// [`SortMode::Distance`] dots the position with the camera *position*, not its
/// forward axis.
pub fn sort_key(mode: SortMode, position: Vec3, life: f32, camera_position: Vec3) -> f32 {
    match mode {
        SortMode::None => 0.0,
        SortMode::Distance => position.dot(camera_position),
        SortMode::NewerFirst => life,
        SortMode::OlderFirst => -life,
    }
}

/// Resolves one particle for drawing.
///
/// `rnd` is the random fraction decoded from the particle's id field.
pub fn evaluate_particle<C: LifeCurves>(
    state: &ParticleState,
    rnd: f32,
    curves: &C,
    params: &VertexParams,
) -> ParticleFrame {
    let life = normalized_life(state.age, params.lifetime);
    if state.age < 0.0 || (params.one_shot && life > 1.0) {
        return ParticleFrame::DISABLED;
    }

    let origin = state.origin();
    let mut position = particle_position(origin, life, rnd, curves, &params.rotation);
    let mut trailing = if params.stretch > 0.0 {
        let past = (life - params.stretch / params.precision as f32).max(0.0);
        particle_position(origin, past, rnd, curves, &params.rotation)
    } else {
        position
    };

    if let Some(wrap) = &params.wrap {
        let wrapped = wrap_position(position, wrap);
        trailing += wrapped - position;
        position = wrapped;
    }

    let sample = curves.sample(life);
    ParticleFrame {
        enabled: true,
        life,
        position,
        trailing,
        angle: lerp(sample.angle, sample.angle + FRAC_PI_2 * rnd, sample.angle_divergence),
        scale: lerp(sample.scale, sample.scale * rnd, sample.scale_divergence),
        alpha_jitter: sample.alpha_divergence * ((rnd * 1000.0).fract() * 2.0 - 1.0),
        sort_key: sort_key(params.sort, position, life, params.camera_position),
    }
}

/// Packs a particle index and its random fraction into one float.
///
/// The result always floors back to `index`, even when `index + rnd` would round up.
pub fn encode_id(index: u32, rnd: f32) -> f32 {
    let ceiling = f32::from_bits((index as f32 + 1.0).to_bits() - 1);
    (index as f32 + rnd).min(ceiling)
}

/// Splits a packed `id + rnd` field into the particle index and its random fraction.
pub fn decode_id(field: f32) -> (u32, f32) {
    (field.floor() as u32, field.fract())
}
