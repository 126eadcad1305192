mod curve;
pub(crate) mod serde_helpers;
/// Emitter file format version tracking.
pub mod versioning;

pub use curve::{Curve, CurveKey, CurveSet, CurveType};

use bevy::{
    asset::{AssetLoader, LoadContext, io::Reader},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use serde_helpers::*;
use versioning::{VersionStatus, current_format_version};

/// Asset loader for [`EmitterAsset`] files in RON format.
#[derive(Default, TypePath)]
pub struct EmitterAssetLoader;

/// Errors that can occur when loading an [`EmitterAsset`].
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EmitterAssetLoaderError {
    /// An I/O error occurred while reading the asset file.
    #[error("Could not load emitter: {0}")]
    Io(#[from] std::io::Error),
    /// The file contained invalid RON.
    #[error("Could not parse RON: {0}")]
    Ron(#[from] ron::error::SpannedError),
    /// The file has a version this crate does not know, likely written by a newer release.
    #[error("Unknown embers_version. You may need a newer version of bevy_embers.")]
    UnknownVersion,
    /// The file predates a breaking format change.
    #[error(
        "Emitter version \"{found}\" is incompatible with current version \"{current}\". Manual migration is required."
    )]
    IncompatibleVersion {
        /// The version found in the file.
        found: String,
        /// The current format version.
        current: String,
    },
}

impl AssetLoader for EmitterAssetLoader {
    type Asset = EmitterAsset;
    type Settings = ();
    type Error = EmitterAssetLoaderError;

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &(),
        load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        let mut asset = ron::de::from_bytes::<EmitterAsset>(&bytes)?;

        match asset.try_upgrade_version() {
            VersionStatus::Current => {}
            VersionStatus::Outdated { found, current } => {
                let path = load_context.path();
                warn!(
                    "{path:?}: loaded emitter with embers_version \"{found}\", current is \"{current}\""
                );
            }
            VersionStatus::Incompatible { found, current } => {
                return Err(EmitterAssetLoaderError::IncompatibleVersion {
                    found,
                    current: current.to_string(),
                });
            }
            VersionStatus::Unknown => {
                return Err(EmitterAssetLoaderError::UnknownVersion);
            }
        }

        asset.settings.sort_curve_keys();
        Ok(asset)
    }

    fn extensions(&self) -> &[&str] {
        &["ron"]
    }
}

/// Order in which particles are drawn in CPU mode.
///
/// Any mode other than [`SortMode::None`] forces the emitter into
/// [`SimulationMode::Cpu`], since only the CPU path can reorder vertex data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Reflect)]
pub enum SortMode {
    /// Particles are drawn in emission order.
    #[default]
    None,
    /// Ascending dot product of the particle position with the camera *position*.
    ///
    /// This is not a true view-depth sort: the key is `dot(position, camera_position)`,
    /// not a projection onto the camera's forward axis.
    Distance,
    /// Youngest particles first (ascending normalized life).
    NewerFirst,
    /// Oldest particles first (descending normalized life).
    OlderFirst,
}

/// Which execution path advances the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Reflect)]
pub enum SimulationMode {
    /// State lives in float textures and is advanced by a per-texel processor pass;
    /// the renderer evaluates curves from the packed channel textures.
    #[default]
    Accelerated,
    /// State lives in plain arrays and every vertex is resolved on the CPU.
    Cpu,
}

/// Geometry instanced once per particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default, Reflect)]
pub enum ParticleTemplate {
    /// A camera-facing quad with corners at `(±1, ±1)`.
    #[default]
    Quad,
    /// An axis-aligned box.
    Cuboid {
        /// Half extents of the box.
        half_size: Vec3,
    },
    /// A UV sphere.
    Sphere {
        /// Sphere radius.
        radius: f32,
    },
    /// Arbitrary triangle-list corners.
    Custom {
        /// Corner positions.
        positions: Vec<[f32; 3]>,
        /// Triangle-list indices into `positions`.
        indices: Vec<u32>,
    },
}

fn default_num_particles() -> u32 {
    1
}

fn default_rate() -> f32 {
    1.0
}

fn default_lifetime() -> f32 {
    50.0
}

fn default_smoothness() -> f32 {
    4.0
}

fn default_precision() -> u32 {
    32
}

fn default_max_emission_time() -> f32 {
    15.0
}

fn default_one() -> Curve {
    Curve::constant(1.0)
}

fn default_one_set() -> CurveSet {
    CurveSet::constant(Vec3::ONE)
}

fn is_default_num_particles(value: &u32) -> bool {
    *value == default_num_particles()
}

fn is_default_precision(value: &u32) -> bool {
    *value == default_precision()
}

/// Flat set of named emitter parameters.
///
/// Every field has a documented default and can be overridden independently. Curve
/// fields are quantized when the emitter is built; editing them on a live emitter
/// requires [`Emitter::set_settings`](crate::Emitter::set_settings), which rebuilds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
pub struct EmitterSettings {
    /// Number of particles allocated. Defaults to `1`.
    #[serde(
        default = "default_num_particles",
        skip_serializing_if = "is_default_num_particles"
    )]
    pub num_particles: u32,
    /// Delay between consecutive particle spawns, in seconds. Defaults to `1.0`.
    #[serde(default = "default_rate")]
    pub rate: f32,
    /// Particle lifetime in seconds. Defaults to `50.0`.
    #[serde(default = "default_lifetime")]
    pub lifetime: f32,
    /// Half extents of the spawn volume around the emitter. Defaults to [`Vec3::ZERO`].
    #[serde(default, skip_serializing_if = "is_zero_vec3")]
    pub spawn_bounds: Vec3,
    /// Wraps particles into a camera-centered box of size `2 * wrap_bounds`.
    ///
    /// Has no effect unless [`wrap_bounds`](Self::wrap_bounds) is set. Defaults to `false`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub wrap: bool,
    /// Half size of the wrapping box. Defaults to `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wrap_bounds: Option<Vec3>,
    /// Blur radius, in samples, applied to every quantized curve. Defaults to `4.0`.
    ///
    /// Rounded to the nearest whole sample, so values below `0.5` disable the blur.
    #[serde(default = "default_smoothness")]
    pub smoothness: f32,
    /// Number of samples each curve is quantized into. Clamped to at least `2`.
    /// Defaults to `32`.
    #[serde(
        default = "default_precision",
        skip_serializing_if = "is_default_precision"
    )]
    pub precision: u32,
    /// Spawn the population once and never recycle it. Defaults to `false`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub one_shot: bool,
    /// Per-frame randomization of simulation speed, `0..=1`. Defaults to `0.0`.
    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub speed_div: f32,
    /// Per-particle randomization of simulation speed, constant over a particle's life.
    /// Defaults to `0.0`.
    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub constant_speed_div: f32,
    /// Draw order. Anything but [`SortMode::None`] forces CPU mode. Defaults to `None`.
    #[serde(default, skip_serializing_if = "is_default")]
    pub sort: SortMode,
    /// Preferred execution path. Defaults to [`SimulationMode::Accelerated`].
    #[serde(default, skip_serializing_if = "is_default")]
    pub mode: SimulationMode,
    /// Bakes ambient and directional lights into a light cube every frame. Requires
    /// scene lighting to be bound. Defaults to `false`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub lighting: bool,
    /// Use half-lambert shading for lit particles. Defaults to `false`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub half_lambert: bool,
    /// Whether a normal map is bound for lit particles. Defaults to `false`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub normal_map: bool,
    /// Motion-blur streak length, in curve samples. Defaults to `0.0`.
    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub stretch: f32,
    /// Soft-particle fade distance. Needs a camera depth target; silently disabled
    /// without one. Defaults to `0.0`.
    #[serde(default, skip_serializing_if = "is_zero_f32")]
    pub depth_softening: f32,
    /// Upper bound, in seconds, for one-shot completion. Defaults to `15.0`.
    #[serde(default = "default_max_emission_time")]
    pub max_emission_time: f32,
    /// Geometry instanced per particle. Defaults to [`ParticleTemplate::Quad`].
    #[serde(default, skip_serializing_if = "is_default")]
    pub template: ParticleTemplate,
    /// Output sRGB-encoded color. Defaults to `true`.
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub gamma_correct: bool,
    /// Particles write into the depth buffer. Defaults to `false`.
    #[serde(default, skip_serializing_if = "is_false")]
    pub depth_write: bool,
    /// Seed for spawn jitter and per-particle random factors. Defaults to `0`.
    #[serde(default)]
    pub seed: u32,

    /// Offset in emitter space over life. Defaults to zero.
    #[serde(default, skip_serializing_if = "is_default")]
    pub local_offset: CurveSet,
    /// Offset in world space over life. Defaults to zero.
    #[serde(default, skip_serializing_if = "is_default")]
    pub world_offset: CurveSet,
    /// Color over life. Values above `1.0` are allowed. Defaults to white.
    #[serde(default = "default_one_set")]
    pub color: CurveSet,
    /// Per-axis divergence of the local offset, `0..=1`. Defaults to zero.
    #[serde(default, skip_serializing_if = "is_default")]
    pub local_offset_divergence: CurveSet,
    /// Per-axis divergence of the world offset, `0..=1`. Defaults to zero.
    #[serde(default, skip_serializing_if = "is_default")]
    pub world_offset_divergence: CurveSet,
    /// Rotation over life, in degrees. Defaults to `0`.
    #[serde(default, skip_serializing_if = "is_default")]
    pub angle: Curve,
    /// Scale over life. Defaults to `1`.
    #[serde(default = "default_one")]
    pub scale: Curve,
    /// Opacity over life. Defaults to `1`.
    #[serde(default = "default_one")]
    pub alpha: Curve,
    /// Scale divergence, `0..=1`. Defaults to `0`.
    #[serde(default, skip_serializing_if = "is_default")]
    pub scale_divergence: Curve,
    /// Angle divergence, `0..=1`. Defaults to `0`.
    #[serde(default, skip_serializing_if = "is_default")]
    pub angle_divergence: Curve,
    /// Alpha divergence, `0..=1`. Defaults to `0`.
    #[serde(default, skip_serializing_if = "is_default")]
    pub alpha_divergence: Curve,
}

fn default_true() -> bool {
    true
}

impl Default for EmitterSettings {
    fn default() -> Self {
        Self {
            num_particles: default_num_particles(),
            rate: default_rate(),
            lifetime: default_lifetime(),
            spawn_bounds: Vec3::ZERO,
            wrap: false,
            wrap_bounds: None,
            smoothness: default_smoothness(),
            precision: default_precision(),
            one_shot: false,
            speed_div: 0.0,
            constant_speed_div: 0.0,
            sort: SortMode::None,
            mode: SimulationMode::Accelerated,
            lighting: false,
            half_lambert: false,
            normal_map: false,
            stretch: 0.0,
            depth_softening: 0.0,
            max_emission_time: default_max_emission_time(),
            template: ParticleTemplate::Quad,
            gamma_correct: true,
            depth_write: false,
            seed: 0,
            local_offset: CurveSet::default(),
            world_offset: CurveSet::default(),
            color: default_one_set(),
            local_offset_divergence: CurveSet::default(),
            world_offset_divergence: CurveSet::default(),
            angle: Curve::default(),
            scale: default_one(),
            alpha: default_one(),
            scale_divergence: Curve::default(),
            angle_divergence: Curve::default(),
            alpha_divergence: Curve::default(),
        }
    }
}

impl EmitterSettings {
    /// Effective quantization precision.
    pub fn precision(&self) -> usize {
        self.precision.max(2) as usize
    }

    /// Wrap bounds, if wrapping is both enabled and configured.
    pub fn active_wrap_bounds(&self) -> Option<Vec3> {
        self.wrap.then_some(self.wrap_bounds).flatten()
    }

    /// Sorts the keys of every curve by time.
    pub fn sort_curve_keys(&mut self) {
        for set in [
            &mut self.local_offset,
            &mut self.world_offset,
            &mut self.color,
            &mut self.local_offset_divergence,
            &mut self.world_offset_divergence,
        ] {
            set.sort_keys();
        }
        for curve in [
            &mut self.angle,
            &mut self.scale,
            &mut self.alpha,
            &mut self.scale_divergence,
            &mut self.angle_divergence,
            &mut self.alpha_divergence,
        ] {
            curve.sort_keys();
        }
    }
}

/// An emitter definition, loadable from RON files.
///
/// Reference it from a [`ParticleEmitter3D`](crate::ParticleEmitter3D) component to
/// simulate it.
#[derive(Asset, TypePath, Debug, Clone, Serialize, Deserialize)]
pub struct EmitterAsset {
    embers_version: String,
    /// Display name.
    pub name: String,
    /// Emitter parameters.
    #[serde(default)]
    pub settings: EmitterSettings,
}

impl EmitterAsset {
    /// Creates an asset stamped with the current format version.
    pub fn new(name: impl Into<String>, settings: EmitterSettings) -> Self {
        Self {
            embers_version: current_format_version().to_string(),
            name: name.into(),
            settings,
        }
    }

    /// The format version this asset was written with.
    pub fn version(&self) -> &str {
        &self.embers_version
    }

    /// Validates `embers_version`, upgrading it in place when the upgrade is compatible.
    ///
    /// Returns the status found before any upgrade.
    pub fn try_upgrade_version(&mut self) -> VersionStatus {
        let status = versioning::validate_version(&self.embers_version);
        if matches!(status, VersionStatus::Outdated { .. }) {
            self.embers_version = current_format_version().to_string();
        }
        status
    }
}
