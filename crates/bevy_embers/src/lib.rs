#![deny(missing_docs)]
//! **Embers** is a particle emitter for the [Bevy game engine](https://bevyengine.org/)
//! that runs either as an accelerated per-texel pass or as an exact CPU emulation.
//!
//! # Getting started
//!
//! Add [`EmbersPlugin`] to your app:
//!
//! ```no_run
//! use bevy::prelude::*;
//! use bevy_embers::prelude::*;
//!
//! fn main() {
//!     App::new()
//!         .add_plugins((DefaultPlugins, EmbersPlugin))
//!         .run();
//! }
//! ```
//!
//! ## Spawning an emitter
//!
//! Emitters are described by an [`EmitterAsset`], usually loaded from a RON file:
//!
//! ```
//! use bevy::prelude::*;
//! use bevy_embers::prelude::*;
//!
//! fn setup(mut commands: Commands, asset_server: Res<AssetServer>) {
//!     commands.spawn(ParticleEmitter3D {
//!         handle: asset_server.load("snow.ember.ron"),
//!     });
//! }
//! ```
//!
//! Sorting and wrapping are relative to the camera marked with
//! [`ParticleCameraTarget`]. Lit emitters need a [`ParticleLighting`] resource.
//!
//! ## Using an emitter directly
//!
//! [`Emitter`] does not depend on the ECS and can be advanced by hand:
//!
//! ```
//! use bevy_embers::prelude::*;
//!
//! let settings = EmitterSettings {
//!     num_particles: 64,
//!     mode: SimulationMode::Cpu,
//!     ..Default::default()
//! };
//! let mut emitter = Emitter::new(settings, ProcessorCaps::default()).unwrap();
//! emitter.add_time(1.0 / 60.0).unwrap();
//! assert_eq!(emitter.states().len(), 64);
//! ```
//!
//! # Execution paths
//!
//! - [Accelerated](SimulationMode::Accelerated): curves are baked into float
//!   [textures](textures) and every particle is advanced by the [`processor`] pass.
//! - [CPU](SimulationMode::Cpu): the same formulas run in [`emulation`] and the
//!   resolved vertices are written into the particle [`Mesh`](bevy::prelude::Mesh).
//!   Sorting always uses this path.

/// Emitter asset definitions, curves and the RON loader.
pub mod asset;
/// The emitter and its configuration errors.
pub mod emitter;
pub mod emulation;
pub mod formula;
/// Lighting cube baking.
pub mod lighting;
/// Uniforms and program variants handed to the renderer.
pub mod material;
/// Particle geometry and vertex layout.
pub mod mesh;
/// Convenience re-exports.
pub mod prelude;
pub mod processor;
/// ECS components and resources.
pub mod runtime;
/// Back-to-front and age ordering.
pub mod sort;
pub mod spawning;
/// Double-buffered particle state.
pub mod state;
/// Curve quantization, channel packing and texture baking.
pub mod textures;

use bevy::prelude::*;

use asset::EmitterAssetLoader;
use spawning::{
    advance_emitters, cleanup_emitters, collect_directional_lights, setup_emitters,
    sync_emitter_bindings, sync_emitter_settings, sync_emitter_transforms, sync_particle_meshes,
};

/// Plugin that simulates [`ParticleEmitter3D`] entities.
///
/// Registers the asset loader and the [`ProcessorCaps`] resource, then builds, binds,
/// advances and uploads every emitter once per frame in `Update`.
pub struct EmbersPlugin;

impl Plugin for EmbersPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<EmitterAsset>()
            .init_asset_loader::<EmitterAssetLoader>();

        app.init_resource::<ProcessorCaps>();

        app.add_systems(
            Update,
            (
                setup_emitters,
                sync_emitter_settings,
                sync_emitter_transforms,
                collect_directional_lights,
                sync_emitter_bindings,
                advance_emitters,
                sync_particle_meshes,
                cleanup_emitters,
            )
                .chain(),
        );
    }
}

pub use asset::{
    Curve, CurveKey, CurveSet, CurveType, EmitterAsset, EmitterSettings, ParticleTemplate,
    SimulationMode, SortMode,
};
pub use emitter::{Emitter, EmitterCamera, EmitterError, ProcessorCaps};
pub use lighting::{DirectionalLightSample, LightCube, SceneLighting};
pub use material::{MaterialParameters, ParticleShaderKey};
pub use runtime::{
    EmitterMeshEntity, EmitterRuntime, EmitterSetupError, ParticleCameraTarget,
    ParticleEmitter3D, ParticleLighting,
};
