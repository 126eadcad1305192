//! Systems that drive [`Emitter`]s from ECS components.

use bevy::color::ColorToComponents;
use bevy::prelude::*;

use crate::asset::EmitterAsset;
use crate::emitter::{Emitter, EmitterCamera, ProcessorCaps};
use crate::lighting::DirectionalLightSample;
use crate::runtime::{
    EmitterMesh, EmitterMeshEntity, EmitterRuntime, EmitterSetupError, EmitterTextureHandles,
    ParticleCameraTarget, ParticleEmitter3D, ParticleLighting,
};
use crate::textures::create_state_texture;

/// Refreshes the directional list of [`ParticleLighting`], if the app inserted it.
pub fn collect_directional_lights(
    lighting: Option<ResMut<ParticleLighting>>,
    lights: Query<(&DirectionalLight, &GlobalTransform)>,
) {
    let Some(mut lighting) = lighting else {
        return;
    };

    let directional: Vec<DirectionalLightSample> = lights
        .iter()
        .map(|(light, transform)| DirectionalLightSample {
            direction: transform.back().as_vec3(),
            color: light.color.to_linear().to_vec3(),
        })
        .collect();

    if lighting.directional != directional {
        lighting.directional = directional;
    }
}

/// Builds the emitter, its particle mesh and its textures once the asset is loaded.
pub fn setup_emitters(
    mut commands: Commands,
    query: Query<
        (Entity, &ParticleEmitter3D),
        (Without<EmitterRuntime>, Without<EmitterSetupError>),
    >,
    assets: Res<Assets<EmitterAsset>>,
    caps: Res<ProcessorCaps>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut images: ResMut<Assets<Image>>,
) {
    for (entity, particle_emitter) in query.iter() {
        let Some(asset) = assets.get(&particle_emitter.handle) else {
            continue;
        };

        let emitter = match Emitter::new(asset.settings.clone(), *caps) {
            Ok(emitter) => emitter,
            Err(err) => {
                error!("failed to build emitter '{}': {err}", asset.name);
                commands.entity(entity).insert(EmitterSetupError {
                    error: err,
                    settings: asset.settings.clone(),
                });
                continue;
            }
        };

        let mesh_handle = meshes.add(emitter.geometry().to_mesh());
        let textures = add_textures(&emitter, &mut images);

        commands.entity(entity).insert((
            EmitterMesh {
                handle: mesh_handle.clone(),
                generation: emitter.generation(),
                revision: emitter.revision(),
                mode: emitter.mode(),
            },
            textures,
            EmitterRuntime::new(emitter),
        ));

        commands.spawn((
            Mesh3d(mesh_handle),
            Transform::default(),
            Visibility::default(),
            EmitterMeshEntity {
                emitter_entity: entity,
            },
        ));
    }
}

/// Re-applies asset settings to running emitters and retries failed setups.
pub fn sync_emitter_settings(
    mut commands: Commands,
    assets: Res<Assets<EmitterAsset>>,
    mut emitters: Query<(Entity, &ParticleEmitter3D, &mut EmitterRuntime)>,
    failed: Query<(Entity, &ParticleEmitter3D, &EmitterSetupError)>,
) {
    if !assets.is_changed() {
        return;
    }

    for (entity, particle_emitter, mut runtime) in emitters.iter_mut() {
        let Some(asset) = assets.get(&particle_emitter.handle) else {
            continue;
        };
        if runtime.emitter.settings() == &asset.settings {
            continue;
        }
        if let Err(err) = runtime.emitter.set_settings(asset.settings.clone()) {
            error!("emitter {entity} rejected new settings: {err}");
        }
    }

    for (entity, particle_emitter, setup_error) in failed.iter() {
        let retry = assets
            .get(&particle_emitter.handle)
            .is_some_and(|asset| asset.settings != setup_error.settings);
        if retry {
            commands.entity(entity).remove::<EmitterSetupError>();
        }
    }
}

/// Copies each emitter's world transform into its simulation.
pub fn sync_emitter_transforms(mut emitters: Query<(&GlobalTransform, &mut EmitterRuntime)>) {
    for (transform, mut runtime) in emitters.iter_mut() {
        runtime.emitter.set_transform(Mat4::from(transform.affine()));
    }
}

/// Binds the particle camera and the scene lighting.
pub fn sync_emitter_bindings(
    cameras: Query<(&GlobalTransform, &ParticleCameraTarget)>,
    lighting: Option<Res<ParticleLighting>>,
    mut emitters: Query<&mut EmitterRuntime>,
) {
    let camera = cameras.iter().next().map(|(transform, target)| EmitterCamera {
        position: transform.translation(),
        depth_target: target.depth_target.clone(),
    });
    let scene = lighting.map(|lighting| lighting.scene());

    for mut runtime in emitters.iter_mut() {
        runtime.emitter.set_camera(camera.clone());
        runtime.emitter.set_scene_lighting(scene.clone());
    }
}

/// Advances every running emitter by the frame delta.
pub fn advance_emitters(time: Res<Time>, mut emitters: Query<(Entity, &mut EmitterRuntime)>) {
    let dt = time.delta_secs();

    for (entity, mut runtime) in emitters.iter_mut() {
        if runtime.paused {
            continue;
        }

        match runtime.emitter.add_time(dt) {
            Ok(()) => runtime.last_error = None,
            Err(err) => {
                if runtime.last_error.as_ref() != Some(&err) {
                    error!("emitter {entity} stopped: {err}");
                }
                runtime.last_error = Some(err);
            }
        }
    }
}

/// Writes emitter output into the mesh and image assets.
///
/// Reallocation or a mode switch replaces the mesh; a rebuild rebakes the lookup
/// textures. Otherwise CPU emitters rewrite their vertices and accelerated emitters
/// their state texture.
pub fn sync_particle_meshes(
    mut emitters: Query<(
        Entity,
        &EmitterRuntime,
        &mut EmitterMesh,
        &mut EmitterTextureHandles,
    )>,
    mut mesh_entities: Query<(&EmitterMeshEntity, &mut Mesh3d)>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut images: ResMut<Assets<Image>>,
) {
    for (entity, runtime, mut emitter_mesh, mut textures) in emitters.iter_mut() {
        let emitter = &runtime.emitter;

        if emitter_mesh.generation != emitter.generation() || emitter_mesh.mode != emitter.mode() {
            let handle = meshes.add(emitter.geometry().to_mesh());
            for (mesh_entity, mut mesh3d) in mesh_entities.iter_mut() {
                if mesh_entity.emitter_entity == entity {
                    mesh3d.0 = handle.clone();
                }
            }
            *emitter_mesh = EmitterMesh {
                handle,
                generation: emitter.generation(),
                revision: emitter.revision(),
                mode: emitter.mode(),
            };
            *textures = add_textures(emitter, &mut images);
            continue;
        }

        if emitter_mesh.revision != emitter.revision() {
            *textures = add_textures(emitter, &mut images);
            emitter_mesh.revision = emitter.revision();
        }

        if let Some(state) = textures.state.as_ref() {
            if let Some(image) = images.get_mut(state) {
                *image = create_state_texture(emitter.states());
            }
        } else if let Some(mesh) = meshes.get_mut(&emitter_mesh.handle) {
            emitter.geometry().write_mesh(mesh);
        }
    }
}

/// Despawns particle meshes and drops runtime state of removed emitters.
pub fn cleanup_emitters(
    mut commands: Commands,
    mut removed: RemovedComponents<ParticleEmitter3D>,
    mesh_entities: Query<(Entity, &EmitterMeshEntity)>,
) {
    for removed_emitter in removed.read() {
        for (mesh_entity, emitter_mesh) in mesh_entities.iter() {
            if emitter_mesh.emitter_entity == removed_emitter {
                commands.entity(mesh_entity).despawn();
            }
        }

        if let Ok(mut entity) = commands.get_entity(removed_emitter) {
            entity.remove::<(
                EmitterRuntime,
                EmitterMesh,
                EmitterTextureHandles,
                EmitterSetupError,
            )>();
        }
    }
}

fn add_textures(emitter: &Emitter, images: &mut Assets<Image>) -> EmitterTextureHandles {
    let baked = emitter.bake_textures();
    EmitterTextureHandles {
        channels: baked.channels.map(|channels| channels.map(|image| images.add(image))),
        color: images.add(baked.color),
        state: baked.state.map(|image| images.add(image)),
    }
}
