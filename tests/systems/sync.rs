use super::helpers::*;

use bevy::prelude::*;
use bevy_embers::prelude::*;
use bevy_embers::runtime::{EmitterMesh, EmitterMeshEntity, EmitterTextureHandles};

fn edit_settings(app: &mut App, handle: &Handle<EmitterAsset>, edit: impl FnOnce(&mut EmitterSettings)) {
    let mut assets = app.world_mut().resource_mut::<Assets<EmitterAsset>>();
    let asset = assets.get_mut(handle).expect("asset should exist");
    edit(&mut asset.settings);
}

fn mesh_entity_handle(app: &mut App, emitter: Entity) -> Handle<Mesh> {
    app.world_mut()
        .query::<(&EmitterMeshEntity, &Mesh3d)>()
        .iter(app.world())
        .find(|(link, _)| link.emitter_entity == emitter)
        .map(|(_, mesh3d)| mesh3d.0.clone())
        .expect("emitter should have a mesh entity")
}

#[test]
fn particle_count_change_replaces_the_mesh() {
    let (mut app, handle, entity) = setup_loaded_emitter("minimal_emitter.ron");
    let old_mesh = app.world().get::<EmitterMesh>(entity).unwrap().handle.clone();

    edit_settings(&mut app, &handle, |settings| settings.num_particles = 9);
    advance_frames(&mut app, 2);

    let runtime = runtime(&app, entity);
    assert_eq!(runtime.emitter.settings().num_particles, 9);
    assert_eq!(runtime.emitter.generation(), 1);
    assert_eq!(runtime.emitter.states().len(), 9);

    let new_mesh = app.world().get::<EmitterMesh>(entity).unwrap().handle.clone();
    assert_ne!(new_mesh, old_mesh);
    assert_eq!(mesh_entity_handle(&mut app, entity), new_mesh);

    let meshes = app.world().resource::<Assets<Mesh>>();
    assert_eq!(meshes.get(&new_mesh).map(Mesh::count_vertices), Some(9 * 4));
}

#[test]
fn curve_change_rebakes_textures_only() {
    let (mut app, handle, entity) = setup_loaded_emitter("minimal_emitter.ron");
    let old_mesh = app.world().get::<EmitterMesh>(entity).unwrap().handle.clone();
    let old_color = app
        .world()
        .get::<EmitterTextureHandles>(entity)
        .unwrap()
        .color
        .clone();

    edit_settings(&mut app, &handle, |settings| {
        settings.color = CurveSet::constant(Vec3::new(4.0, 2.0, 1.0));
    });
    advance_frames(&mut app, 2);

    let runtime = runtime(&app, entity);
    assert_eq!(runtime.emitter.generation(), 0);
    assert_eq!(runtime.emitter.revision(), 1);
    assert!(runtime.emitter.color_mult() >= 4.0);

    assert_eq!(app.world().get::<EmitterMesh>(entity).unwrap().handle, old_mesh);
    let new_color = &app.world().get::<EmitterTextureHandles>(entity).unwrap().color;
    assert_ne!(new_color, &old_color);
}

#[test]
fn invalid_settings_keep_the_emitter_running() {
    let (mut app, handle, entity) = setup_loaded_emitter("minimal_emitter.ron");

    edit_settings(&mut app, &handle, |settings| {
        settings.template = ParticleTemplate::Custom {
            positions: vec![[0.0; 3]],
            indices: vec![0, 0],
        };
    });
    let before = runtime(&app, entity).emitter.time();
    advance_frames(&mut app, 2);

    let runtime = runtime(&app, entity);
    assert_eq!(runtime.emitter.settings().template, ParticleTemplate::Quad);
    assert!(runtime.emitter.time() > before);
}

#[test]
fn switching_to_cpu_mode_replaces_textures() {
    let (mut app, handle, entity) = setup_loaded_emitter("minimal_emitter.ron");
    assert!(
        app.world()
            .get::<EmitterTextureHandles>(entity)
            .unwrap()
            .state
            .is_some()
    );

    edit_settings(&mut app, &handle, |settings| settings.mode = SimulationMode::Cpu);
    advance_frames(&mut app, 2);

    assert_eq!(runtime(&app, entity).emitter.mode(), SimulationMode::Cpu);
    let textures = app.world().get::<EmitterTextureHandles>(entity).unwrap();
    assert!(textures.state.is_none());
    assert!(textures.channels.is_none());
}

#[test]
fn cpu_vertices_are_written_into_the_mesh() {
    let (mut app, _, entity) = setup_loaded_emitter("cpu_emitter.ron");
    advance_frames(&mut app, 4);

    let mesh_handle = app.world().get::<EmitterMesh>(entity).unwrap().handle.clone();
    let expected: Vec<[f32; 4]> = runtime(&app, entity)
        .emitter
        .geometry()
        .vertices()
        .iter()
        .map(|v| v.position_life)
        .collect();

    let meshes = app.world().resource::<Assets<Mesh>>();
    let mesh = meshes.get(&mesh_handle).unwrap();
    let attribute = mesh
        .attribute(bevy_embers::mesh::ATTRIBUTE_POSITION_LIFE)
        .expect("position attribute");
    match attribute {
        bevy::mesh::VertexAttributeValues::Float32x4(values) => assert_eq!(values, &expected),
        other => panic!("unexpected attribute format {other:?}"),
    }
    assert!(expected.iter().any(|p| *p != [0.0; 4]));
}

#[test]
fn emitter_transform_moves_spawn_position() {
    let (mut app, entity) = setup_emitter(basic_loop_settings());
    app.world_mut()
        .entity_mut(entity)
        .insert(GlobalTransform::from_translation(Vec3::new(5.0, 0.0, -2.0)));
    advance_frames(&mut app, 3);

    let runtime = runtime(&app, entity);
    let spawned: Vec<Vec3> = runtime
        .emitter
        .states()
        .iter()
        .filter(|s| s.age > 0.0)
        .map(|s| s.origin())
        .collect();
    assert!(!spawned.is_empty());
    assert!(spawned.iter().all(|&o| o == Vec3::new(5.0, 0.0, -2.0)));
}

#[test]
fn camera_binding_follows_the_target_camera() {
    let (mut app, _, entity) = setup_loaded_emitter("snow.ember.ron");
    let camera = spawn_camera(&mut app, Vec3::new(0.0, 2.0, 10.0));
    advance_frames(&mut app, 1);
    assert_eq!(runtime(&app, entity).last_error, None);

    app.world_mut().entity_mut(camera).despawn();
    advance_frames(&mut app, 1);
    assert_eq!(
        runtime(&app, entity).last_error,
        Some(EmitterError::MissingCamera)
    );
}

#[test]
fn directional_lights_are_collected() {
    let mut app = create_minimal_app();
    app.insert_resource(ParticleLighting::default());
    app.world_mut().spawn((
        DirectionalLight {
            color: Color::srgb(1.0, 0.0, 0.0),
            ..default()
        },
        GlobalTransform::from(
            Transform::from_xyz(0.0, 10.0, 0.0).looking_at(Vec3::ZERO, Vec3::Z),
        ),
    ));
    advance_frames(&mut app, 1);

    let lighting = app.world().resource::<ParticleLighting>();
    assert_eq!(lighting.directional.len(), 1);
    let light = lighting.directional[0];
    assert_vec3_near(light.direction, Vec3::Y, 1e-5);
    assert_vec3_near(light.color, Vec3::new(1.0, 0.0, 0.0), 1e-5);
}

#[test]
fn lit_emitter_uses_collected_lights() {
    let (mut app, _, entity) = setup_loaded_emitter("lit_emitter.ron");
    app.insert_resource(ParticleLighting {
        ambient: Color::BLACK,
        directional: vec![],
    });
    app.world_mut().spawn((
        DirectionalLight::default(),
        GlobalTransform::from(
            Transform::from_xyz(0.0, 10.0, 0.0).looking_at(Vec3::ZERO, Vec3::Z),
        ),
    ));
    advance_frames(&mut app, 2);

    let runtime = runtime(&app, entity);
    assert_eq!(runtime.last_error, None);
    let cube = runtime.emitter.light_cube();
    assert_vec3_near(cube.faces[3], Vec3::ONE, 1e-5);
    assert_vec3_near(cube.faces[2], Vec3::ZERO, 1e-5);
}
