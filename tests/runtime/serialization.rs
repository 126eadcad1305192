use bevy::prelude::*;
use bevy_embers::asset::versioning::{
    VersionStatus, can_auto_upgrade, current_format_version, validate_version,
};
use bevy_embers::prelude::*;

fn roundtrip_ron<T: serde::Serialize + serde::de::DeserializeOwned>(value: &T) -> T {
    let serialized = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default()).unwrap();
    ron::from_str(&serialized).unwrap()
}

#[test]
fn curve_roundtrip() {
    let curve = Curve::new([(0.0, 1.0), (0.4, -2.0), (1.0, 3.5)]).with_type(CurveType::Spline);
    assert_eq!(roundtrip_ron(&curve), curve);
}

#[test]
fn curve_set_roundtrip() {
    let set = CurveSet::new(
        Curve::constant(1.0),
        Curve::new([(0.0, 0.0), (1.0, 2.0)]).with_type(CurveType::Step),
        Curve::default(),
    );
    assert_eq!(roundtrip_ron(&set), set);
}

#[test]
fn template_roundtrip() {
    for template in [
        ParticleTemplate::Quad,
        ParticleTemplate::Cuboid {
            half_size: Vec3::new(1.0, 2.0, 3.0),
        },
        ParticleTemplate::Sphere { radius: 0.25 },
        ParticleTemplate::Custom {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            indices: vec![0, 1, 2],
        },
    ] {
        assert_eq!(roundtrip_ron(&template), template);
    }
}

#[test]
fn settings_roundtrip() {
    let settings = EmitterSettings {
        num_particles: 128,
        rate: 0.05,
        lifetime: 3.0,
        spawn_bounds: Vec3::new(4.0, 0.0, 4.0),
        wrap: true,
        wrap_bounds: Some(Vec3::splat(10.0)),
        sort: SortMode::Distance,
        mode: SimulationMode::Cpu,
        lighting: true,
        half_lambert: true,
        stretch: 1.5,
        depth_softening: 0.3,
        template: ParticleTemplate::Sphere { radius: 0.5 },
        gamma_correct: false,
        depth_write: true,
        seed: 77,
        color: CurveSet::constant(Vec3::new(2.0, 1.0, 0.5)),
        angle: Curve::new([(0.0, 0.0), (1.0, 360.0)]),
        alpha_divergence: Curve::constant(0.3),
        ..default()
    };
    assert_eq!(roundtrip_ron(&settings), settings);
}

#[test]
fn defaults_are_omitted() {
    let serialized = ron::ser::to_string(&EmitterSettings::default()).unwrap();
    for field in [
        "num_particles",
        "spawn_bounds",
        "wrap_bounds",
        "precision",
        "one_shot",
        "sort",
        "mode",
        "template",
        "gamma_correct",
        "depth_write",
        "local_offset",
        "angle_divergence",
    ] {
        assert!(
            !serialized.contains(field),
            "default field {field} was serialized: {serialized}"
        );
    }
    assert!(serialized.contains("lifetime"));
}

#[test]
fn missing_fields_take_defaults() {
    let settings: EmitterSettings = ron::from_str("(num_particles: 8, sort: NewerFirst)").unwrap();
    assert_eq!(
        settings,
        EmitterSettings {
            num_particles: 8,
            sort: SortMode::NewerFirst,
            ..default()
        }
    );
}

#[test]
fn asset_without_settings_is_default() {
    let asset: EmitterAsset =
        ron::from_str(r#"(embers_version: "0.1", name: "Empty")"#).unwrap();
    assert_eq!(asset.name, "Empty");
    assert_eq!(asset.version(), "0.1");
    assert_eq!(asset.settings, EmitterSettings::default());
}

#[test]
fn new_assets_carry_the_current_version() {
    let asset = EmitterAsset::new("Sparks", EmitterSettings::default());
    assert_eq!(asset.version(), current_format_version());

    let restored: EmitterAsset = roundtrip_ron(&asset);
    assert_eq!(restored.version(), current_format_version());
    assert_eq!(restored.name, "Sparks");
}

#[test]
fn version_statuses() {
    assert_eq!(current_format_version(), "0.1");
    assert_eq!(validate_version("0.1"), VersionStatus::Current);
    assert_eq!(validate_version("0.0"), VersionStatus::Unknown);
    assert_eq!(validate_version("9.9"), VersionStatus::Unknown);
    assert_eq!(validate_version(""), VersionStatus::Unknown);
}

#[test]
fn auto_upgrade_needs_two_known_versions() {
    assert!(!can_auto_upgrade("0.1", "0.1"));
    assert!(!can_auto_upgrade("0.0", "0.1"));
    assert!(!can_auto_upgrade("0.1", "9.9"));
}

#[test]
fn current_assets_are_left_untouched() {
    let mut asset: EmitterAsset =
        ron::from_str(r#"(embers_version: "0.1", name: "Sparks")"#).unwrap();
    assert_eq!(asset.try_upgrade_version(), VersionStatus::Current);
    assert_eq!(asset.version(), "0.1");
}

#[test]
fn unknown_assets_keep_their_version() {
    let mut asset: EmitterAsset =
        ron::from_str(r#"(embers_version: "2.0", name: "Future")"#).unwrap();
    assert_eq!(asset.try_upgrade_version(), VersionStatus::Unknown);
    assert_eq!(asset.version(), "2.0");
}
