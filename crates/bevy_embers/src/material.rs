use bevy::prelude::*;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::lighting::LightCube;

bitflags! {
    /// Program variant the renderer must compile for an emitter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ParticleShaderKey: u32 {
        /// Vertices arrive fully resolved from the CPU emulation.
        const CPU = 1 << 0;
        /// The light cube is bound.
        const LIGHTING = 1 << 1;
        /// A normal map is bound.
        const NORMAL_MAP = 1 << 2;
        /// Half-lambert diffuse term.
        const HALF_LAMBERT = 1 << 3;
        /// Corners are blended towards the trailing position.
        const STRETCH = 1 << 4;
        /// Depth-based soft edges; only set while a depth target is bound.
        const SOFT = 1 << 5;
        /// The particle template is not the default quad.
        const MESH = 1 << 6;
        /// Output is sRGB encoded.
        const SRGB = 1 << 7;
        /// Positions wrap around the camera.
        const WRAP = 1 << 8;
    }
}

/// Uniforms handed to the particle material.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialParameters {
    /// Streak length in curve samples.
    pub stretch: f32,
    /// Inverse scale applied to the 8-bit color texture.
    pub color_mult: f32,
    /// Number of particles.
    pub num_particles: u32,
    /// Particle lifetime.
    pub lifetime: f32,
    /// `1 / precision`.
    pub graph_sample_size: f32,
    /// `precision`.
    pub graph_num_samples: u32,
    /// Wrapping half size, when wrapping is active.
    pub wrap_bounds: Option<Vec3>,
    /// Soft-particle distance, when a depth target is bound.
    pub softening: Option<f32>,
    /// Baked lighting, when lighting is enabled.
    pub light_cube: Option<LightCube>,
    /// Particles write into the depth buffer.
    pub depth_write: bool,
}
