//! CPU reproduction of the per-texel update and per-vertex transform.

use bevy::prelude::*;

use crate::asset::SortMode;
use crate::formula::{
    LifeCurves, StepParams, VertexParams, advance_particle, decode_id, evaluate_particle,
};
use crate::mesh::{ParticleGeometry, VertexRecord, write_particle_block};
use crate::sort::ParticleSorter;
use crate::state::{ParticleState, ParticleStateBuffer};

/// Advances every particle with an explicit loop, then swaps the buffers.
pub fn step_states(buffer: &mut ParticleStateBuffer, particle_noise: &[f32], params: &StepParams) {
    buffer.advance(|src, dst| {
        for (index, (input, output)) in src.iter().zip(dst.iter_mut()).enumerate() {
            *output = advance_particle(index as u32, input, particle_noise[index], params);
        }
    });
}

/// Resolves every particle into its vertex block and collects the sort keys.
///
/// `target` holds one block of `corners.len()` vertices per particle, in emission order.
pub fn resolve_particles<C: LifeCurves>(
    states: &[ParticleState],
    id_fields: &[f32],
    corners: &[Vec3],
    curves: &C,
    params: &VertexParams,
    target: &mut [VertexRecord],
    keys: &mut Vec<f32>,
) {
    keys.clear();
    let blocks = target.chunks_exact_mut(corners.len());
    for ((state, &id_field), block) in states.iter().zip(id_fields).zip(blocks) {
        let (_, rnd) = decode_id(id_field);
        let frame = evaluate_particle(state, rnd, curves, params);
        keys.push(frame.sort_key);
        write_particle_block(block, &frame, id_field, corners);
    }
}

/// Scratch buffers of the CPU path, owned by one emitter.
#[derive(Debug, Clone, Default)]
pub struct CpuEmulator {
    keys: Vec<f32>,
    staging: Vec<VertexRecord>,
    sorter: ParticleSorter,
}

impl CpuEmulator {
    /// Writes the resolved vertices of `states` into `geometry`, sorted when `params`
    /// requests it.
    pub fn write_vertices<C: LifeCurves>(
        &mut self,
        states: &[ParticleState],
        curves: &C,
        params: &VertexParams,
        geometry: &mut ParticleGeometry,
    ) {
        let (corners, id_fields, vertices) = geometry.split_mut();

        if params.sort == SortMode::None {
            resolve_particles(states, id_fields, corners, curves, params, vertices, &mut self.keys);
            return;
        }

        self.staging.resize(vertices.len(), VertexRecord::default());
        resolve_particles(
            states,
            id_fields,
            corners,
            curves,
            params,
            &mut self.staging,
            &mut self.keys,
        );
        self.sorter
            .sort_blocks(&self.keys, &self.staging, vertices, corners.len());
    }

    /// Sort keys of the last resolved frame, in emission order.
    pub fn keys(&self) -> &[f32] {
        &self.keys
    }
}
