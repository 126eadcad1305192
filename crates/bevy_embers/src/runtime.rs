use bevy::color::ColorToComponents;
use bevy::prelude::*;

use crate::asset::{EmitterAsset, EmitterSettings, SimulationMode};
use crate::emitter::{Emitter, EmitterError};
use crate::lighting::{DirectionalLightSample, SceneLighting};

/// Spawns a simulated emitter from an [`EmitterAsset`].
#[derive(Component)]
#[require(Transform, Visibility)]
pub struct ParticleEmitter3D {
    /// The emitter definition.
    pub handle: Handle<EmitterAsset>,
}

/// Live simulation state of a [`ParticleEmitter3D`], inserted once its asset loads.
#[derive(Component)]
pub struct EmitterRuntime {
    /// The emitter.
    pub emitter: Emitter,
    /// Paused emitters are not advanced.
    pub paused: bool,
    /// The last error reported by [`Emitter::add_time`], cleared on success.
    pub last_error: Option<EmitterError>,
}

impl EmitterRuntime {
    /// Wraps a freshly built emitter.
    pub fn new(emitter: Emitter) -> Self {
        Self {
            emitter,
            paused: false,
            last_error: None,
        }
    }

    /// Stops advancing the emitter.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Resumes advancing the emitter.
    pub fn resume(&mut self) {
        self.paused = false;
    }

    /// Flips between paused and running.
    pub fn toggle(&mut self) {
        self.paused = !self.paused;
    }

    /// Restores the emitter's initial state.
    pub fn restart(&mut self) {
        self.emitter.reset();
    }
}

/// Inserted instead of [`EmitterRuntime`] when the emitter could not be built.
///
/// Setup is retried once the asset's settings differ from the ones that failed.
#[derive(Component, Debug)]
pub struct EmitterSetupError {
    /// Why the build failed.
    pub error: EmitterError,
    /// The settings the build failed with.
    pub settings: EmitterSettings,
}

/// Marks the camera emitters sort, wrap and soften against.
#[derive(Component, Debug, Clone, Default)]
pub struct ParticleCameraTarget {
    /// Depth texture for soft particles.
    pub depth_target: Option<Handle<Image>>,
}

/// Scene lighting for lit emitters.
///
/// Lit emitters fail to advance while this resource is absent. The directional list is
/// refreshed every frame from [`DirectionalLight`] entities.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct ParticleLighting {
    /// Ambient color.
    pub ambient: Color,
    /// Directional lights, in query order.
    pub directional: Vec<DirectionalLightSample>,
}

impl ParticleLighting {
    /// Converts to the emitter-side representation.
    pub fn scene(&self) -> SceneLighting {
        SceneLighting {
            ambient: self.ambient.to_linear().to_vec3(),
            directional: self.directional.clone(),
        }
    }
}

/// Links a particle mesh entity to its emitter.
#[derive(Component)]
pub struct EmitterMeshEntity {
    /// The emitter entity.
    pub emitter_entity: Entity,
}

/// The mesh an emitter's geometry is written into.
#[derive(Component)]
pub struct EmitterMesh {
    /// Mesh asset.
    pub handle: Handle<Mesh>,
    pub(crate) generation: u32,
    pub(crate) revision: u32,
    pub(crate) mode: SimulationMode,
}

/// Baked lookup and state textures of an emitter.
#[derive(Component)]
pub struct EmitterTextureHandles {
    /// `internal0..2`, accelerated mode only.
    pub channels: Option<[Handle<Image>; 3]>,
    /// `internal3`.
    pub color: Handle<Image>,
    /// Current states, accelerated mode only.
    pub state: Option<Handle<Image>>,
}
