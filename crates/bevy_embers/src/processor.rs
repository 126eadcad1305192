//! The accelerated path, modelled as a processor that runs one program per texel of
//! the state texture.

use crate::formula::{StepParams, advance_particle};
use crate::state::ParticleState;

/// A program executed once per output texel.
pub trait TexelProgram {
    /// Computes output texel `index` from the matching input texel.
    fn texel(&self, index: u32, input: &ParticleState) -> ParticleState;
}

/// Runs `program` over every texel of `input`, writing into `output`.
///
/// Synchronous: the pass has fully completed when this returns. `output` must not
/// alias the buffer being read, which [`ParticleStateBuffer`](crate::state::ParticleStateBuffer)
/// guarantees by construction.
pub fn draw_pass<P: TexelProgram>(program: &P, input: &[ParticleState], output: &mut [ParticleState]) {
    for (index, (src, dst)) in input.iter().zip(output.iter_mut()).enumerate() {
        *dst = program.texel(index as u32, src);
    }
}

/// The state update program.
pub struct UpdateProgram<'a> {
    /// Step inputs shared by every particle.
    pub params: StepParams,
    /// Fixed per-particle noise, bound as a lookup texture.
    pub particle_noise: &'a [f32],
}

impl TexelProgram for UpdateProgram<'_> {
    fn texel(&self, index: u32, input: &ParticleState) -> ParticleState {
        let noise = self.particle_noise[index as usize];
        advance_particle(index, input, noise, &self.params)
    }
}
