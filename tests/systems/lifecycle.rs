use super::helpers::*;

use bevy::prelude::*;
use bevy_embers::prelude::*;
use bevy_embers::runtime::{EmitterMesh, EmitterMeshEntity, EmitterTextureHandles};

fn mesh_entity_count(app: &mut App) -> usize {
    app.world_mut()
        .query::<&EmitterMeshEntity>()
        .iter(app.world())
        .len()
}

#[test]
fn removing_the_emitter_component_cleans_up() {
    let (mut app, _, entity) = setup_loaded_emitter("minimal_emitter.ron");
    assert_eq!(mesh_entity_count(&mut app), 1);

    app.world_mut()
        .entity_mut(entity)
        .remove::<ParticleEmitter3D>();
    advance_frames(&mut app, 2);

    assert_eq!(mesh_entity_count(&mut app), 0);
    let world = app.world();
    assert!(world.get::<EmitterRuntime>(entity).is_none());
    assert!(world.get::<EmitterMesh>(entity).is_none());
    assert!(world.get::<EmitterTextureHandles>(entity).is_none());
}

#[test]
fn despawning_the_emitter_despawns_its_mesh() {
    let (mut app, _, entity) = setup_loaded_emitter("cpu_emitter.ron");
    assert_eq!(mesh_entity_count(&mut app), 1);

    app.world_mut().entity_mut(entity).despawn();
    advance_frames(&mut app, 2);

    assert_eq!(mesh_entity_count(&mut app), 0);
}

#[test]
fn cleanup_only_touches_the_removed_emitter() {
    let (mut app, first) = setup_emitter(basic_loop_settings());
    let handle = add_emitter_asset(&mut app, basic_loop_settings());
    let second = spawn_emitter(&mut app, handle);
    advance_frames(&mut app, 2);
    assert_eq!(mesh_entity_count(&mut app), 2);

    app.world_mut().entity_mut(first).despawn();
    advance_frames(&mut app, 2);

    assert_eq!(mesh_entity_count(&mut app), 1);
    assert!(app.world().get::<EmitterRuntime>(second).is_some());
}

#[test]
fn malformed_template_marks_setup_error() {
    let mut app = create_minimal_app();
    let handle = load_fixture(&mut app, "malformed_template.ron");
    let entity = spawn_emitter(&mut app, handle.clone());
    assert!(run_until_loaded(&mut app, &handle, 100));
    advance_frames(&mut app, 3);

    let setup_error = app
        .world()
        .get::<EmitterSetupError>(entity)
        .expect("setup error should be recorded");
    assert!(matches!(
        setup_error.error,
        EmitterError::MalformedTemplate(_)
    ));
    assert!(app.world().get::<EmitterRuntime>(entity).is_none());
    assert_eq!(mesh_entity_count(&mut app), 0);
}

#[test]
fn fixed_template_retries_setup() {
    let mut app = create_minimal_app();
    let handle = load_fixture(&mut app, "malformed_template.ron");
    let entity = spawn_emitter(&mut app, handle.clone());
    assert!(run_until_loaded(&mut app, &handle, 100));
    advance_frames(&mut app, 3);
    assert!(app.world().get::<EmitterSetupError>(entity).is_some());

    app.world_mut()
        .resource_mut::<Assets<EmitterAsset>>()
        .get_mut(&handle)
        .expect("asset should exist")
        .settings
        .template = ParticleTemplate::Quad;
    advance_frames(&mut app, 3);

    assert!(app.world().get::<EmitterSetupError>(entity).is_none());
    assert_eq!(runtime(&app, entity).emitter.geometry().num_particles(), 2);
    assert_eq!(mesh_entity_count(&mut app), 1);
}
