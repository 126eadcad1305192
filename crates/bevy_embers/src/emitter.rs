use bevy::prelude::*;
use thiserror::Error;

use crate::asset::{EmitterSettings, ParticleTemplate, SimulationMode, SortMode};
use crate::emulation::{CpuEmulator, resolve_particles, step_states};
use crate::formula::{StepParams, VertexParams, WrapBox};
use crate::lighting::{LightCube, SceneLighting};
use crate::material::{MaterialParameters, ParticleShaderKey};
use crate::mesh::{ParticleGeometry, TemplateMesh, VertexRecord};
use crate::processor::{UpdateProgram, draw_pass};
use crate::state::{ParticleState, StateStore};
use crate::textures::{
    EmitterChannels, EmitterTextures, PackedChannels, create_byte_texture, create_float_texture,
    create_state_texture,
    pack::{ChannelLayout, ChannelPairing, PackedChannelBuffer},
};

/// Fatal configuration errors of an emitter.
#[non_exhaustive]
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EmitterError {
    /// Lighting is enabled but no scene lighting is bound.
    #[error("Lighting is enabled but no scene lighting is bound to the emitter")]
    MissingScene,
    /// Sorting is enabled but no camera is bound.
    #[error("Sorting is enabled but no camera is bound to the emitter")]
    MissingCamera,
    /// A packed buffer was decoded with a pairing it was not built with.
    #[error("Packed buffer holds {found:?}, expected {expected:?}")]
    PackedPairing {
        /// Pairing the decoder expects.
        expected: ChannelPairing,
        /// Pairing the buffer was built with.
        found: ChannelPairing,
    },
    /// A pairing was packed with a constructor for a different texel layout.
    #[error("{pairing:?} cannot be packed as {layout:?}")]
    PackedLayout {
        /// The requested pairing.
        pairing: ChannelPairing,
        /// Layout of the constructor used.
        layout: ChannelLayout,
    },
    /// Channels of a packed buffer disagree in length or width.
    #[error("Packed channel holds {found} samples of {channels} channels, expected {expected} samples")]
    PackedLength {
        /// Expected sample count.
        expected: usize,
        /// Sample count found.
        found: usize,
        /// Channel count found.
        channels: usize,
    },
    /// The particle template cannot be instanced.
    #[error("Malformed particle template: {0}")]
    MalformedTemplate(String),
}

/// Capabilities of the processor running the accelerated path.
#[derive(Resource, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorCaps {
    /// Float textures can be rendered to and sampled.
    pub float_textures: bool,
    /// Textures the vertex stage can sample.
    pub max_vertex_textures: u32,
}

impl ProcessorCaps {
    /// Vertex-stage textures the accelerated path binds.
    pub const REQUIRED_VERTEX_TEXTURES: u32 = 4;

    /// A processor without acceleration support.
    pub const CPU_ONLY: Self = Self {
        float_textures: false,
        max_vertex_textures: 0,
    };

    /// Returns `true` if the accelerated path can run.
    pub fn supports_acceleration(&self) -> bool {
        self.float_textures && self.max_vertex_textures >= Self::REQUIRED_VERTEX_TEXTURES
    }
}

impl Default for ProcessorCaps {
    fn default() -> Self {
        Self {
            float_textures: true,
            max_vertex_textures: 16,
        }
    }
}

/// The camera an emitter sorts, wraps and softens against.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmitterCamera {
    /// World-space position.
    pub position: Vec3,
    /// Depth texture for soft particles, bound externally.
    pub depth_target: Option<Handle<Image>>,
}

/// Called once when a one-shot emitter completes.
pub type FinishedCallback = Box<dyn FnMut() + Send + Sync>;

/// Execution path an emitter will use for `settings` on a processor with `caps`.
///
/// Sorting and missing acceleration both force [`SimulationMode::Cpu`].
pub fn resolve_mode(settings: &EmitterSettings, caps: &ProcessorCaps) -> SimulationMode {
    if settings.mode == SimulationMode::Cpu
        || settings.sort != SortMode::None
        || !caps.supports_acceleration()
    {
        SimulationMode::Cpu
    } else {
        SimulationMode::Accelerated
    }
}

/// A particle emitter: quantized curves, simulation state and draw buffers.
///
/// Advanced once per frame with [`add_time`](Self::add_time). Every method takes the
/// emitter by reference, so an update always runs to completion before anything else
/// can observe or mutate it.
pub struct Emitter {
    settings: EmitterSettings,
    caps: ProcessorCaps,
    mode: SimulationMode,
    channels: EmitterChannels,
    packed: PackedChannels,
    color: PackedChannelBuffer,
    color_mult: f32,
    store: StateStore,
    geometry: ParticleGeometry,
    emulator: CpuEmulator,
    generation: u32,
    revision: u32,
    transform: Mat4,
    camera: Option<EmitterCamera>,
    scene: Option<SceneLighting>,
    light_cube: LightCube,
    time: f32,
    end_time: f32,
    finished: bool,
    on_finished: Option<FinishedCallback>,
    softening_reported: bool,
}

/// Everything derived from the curve settings, built before any field is replaced.
struct Derived {
    template: TemplateMesh,
    channels: EmitterChannels,
    packed: PackedChannels,
    color: PackedChannelBuffer,
    color_mult: f32,
}

impl Derived {
    fn build(settings: &EmitterSettings) -> Result<Self, EmitterError> {
        let template = TemplateMesh::from_template(&settings.template)?;
        let channels = EmitterChannels::quantize(settings);
        let packed = channels.pack()?;
        let (color, color_mult) = channels.pack_color()?;
        Ok(Self {
            template,
            channels,
            packed,
            color,
            color_mult,
        })
    }
}

impl Emitter {
    /// Builds an emitter, quantizing curves and allocating state and geometry.
    pub fn new(settings: EmitterSettings, caps: ProcessorCaps) -> Result<Self, EmitterError> {
        let derived = Derived::build(&settings)?;
        let mode = resolve_mode(&settings, &caps);
        log_mode(&settings, &caps, mode);

        let store = allocate_store(&settings, 0);
        let geometry =
            ParticleGeometry::allocate(settings.num_particles, derived.template, settings.seed, 0);

        let mut emitter = Self {
            settings,
            caps,
            mode,
            channels: derived.channels,
            packed: derived.packed,
            color: derived.color,
            color_mult: derived.color_mult,
            store,
            geometry,
            emulator: CpuEmulator::default(),
            generation: 0,
            revision: 0,
            transform: Mat4::IDENTITY,
            camera: None,
            scene: None,
            light_cube: LightCube::default(),
            time: 0.0,
            end_time: 0.0,
            finished: false,
            on_finished: None,
            softening_reported: false,
        };
        emitter.reset_time();
        Ok(emitter)
    }

    /// Replaces the settings and rebuilds. On error the previous settings stay active.
    pub fn set_settings(&mut self, settings: EmitterSettings) -> Result<(), EmitterError> {
        let previous = std::mem::replace(&mut self.settings, settings);
        if let Err(err) = self.rebuild() {
            self.settings = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Re-quantizes every curve and repacks the channel buffers.
    ///
    /// State and geometry are reallocated, with fresh random values, only when the
    /// particle count or the template topology changed.
    pub fn rebuild(&mut self) -> Result<(), EmitterError> {
        let derived = Derived::build(&self.settings)?;

        let reallocate = self.settings.num_particles as usize != self.geometry.num_particles()
            || derived.template != *self.geometry.template();
        if reallocate {
            self.generation = self.generation.wrapping_add(1);
            self.store = allocate_store(&self.settings, self.generation);
            self.geometry = ParticleGeometry::allocate(
                self.settings.num_particles,
                derived.template,
                self.settings.seed,
                self.generation,
            );
            debug!(
                "reallocated {} particles (generation {})",
                self.settings.num_particles, self.generation
            );
        }

        self.revision = self.revision.wrapping_add(1);
        self.channels = derived.channels;
        self.packed = derived.packed;
        self.color = derived.color;
        self.color_mult = derived.color_mult;

        let mode = resolve_mode(&self.settings, &self.caps);
        if mode != self.mode {
            log_mode(&self.settings, &self.caps, mode);
            self.geometry.reset_vertices();
            self.mode = mode;
        }
        Ok(())
    }

    /// Sets the emitter's world transform.
    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Binds or unbinds the camera.
    pub fn set_camera(&mut self, camera: Option<EmitterCamera>) {
        self.camera = camera;
    }

    /// Binds or unbinds the scene lighting.
    pub fn set_scene_lighting(&mut self, scene: Option<SceneLighting>) {
        self.scene = scene;
    }

    /// Registers the one-shot completion callback, replacing any previous one.
    pub fn on_finished(&mut self, callback: impl FnMut() + Send + Sync + 'static) {
        self.on_finished = Some(Box::new(callback));
    }

    /// Advances the simulation by `dt` seconds.
    ///
    /// Configuration errors are reported before any state is touched.
    pub fn add_time(&mut self, dt: f32) -> Result<(), EmitterError> {
        let light_cube = if self.settings.lighting {
            Some(LightCube::try_from_scene(self.scene.as_ref())?)
        } else {
            None
        };
        let sorting = self.mode == SimulationMode::Cpu && self.settings.sort != SortMode::None;
        if sorting && self.camera.is_none() {
            return Err(EmitterError::MissingCamera);
        }

        if let Some(cube) = light_cube {
            self.light_cube = cube;
        }

        self.time += dt;
        let params = self.step_params(dt);

        match self.mode {
            SimulationMode::Accelerated => {
                let (buffer, _, particle_noise) = self.store.split_mut();
                let program = UpdateProgram {
                    params,
                    particle_noise,
                };
                buffer.advance(|input, output| draw_pass(&program, input, output));
            }
            SimulationMode::Cpu => {
                let (buffer, _, particle_noise) = self.store.split_mut();
                step_states(buffer, particle_noise, &params);

                let vertex_params = self.vertex_params();
                self.emulator.write_vertices(
                    self.store.current(),
                    &self.channels,
                    &vertex_params,
                    &mut self.geometry,
                );
            }
        }

        self.report_softening();
        self.check_finished();
        Ok(())
    }

    /// Restores the allocation-time state and restarts the one-shot timer.
    ///
    /// In accelerated mode the snapshot is run through one zero-length update pass,
    /// exactly like a freshly spawned system.
    pub fn reset(&mut self) {
        match self.mode {
            SimulationMode::Cpu => self.store.restore_initial(),
            SimulationMode::Accelerated => {
                let params = self.step_params(0.0);
                let (buffer, initial, particle_noise) = self.store.split_mut();
                let program = UpdateProgram {
                    params,
                    particle_noise,
                };
                buffer.advance_from(initial, |input, output| draw_pass(&program, input, output));
            }
        }
        self.reset_time();
    }

    /// Restarts the one-shot timer from the current time.
    pub fn reset_time(&mut self) {
        self.end_time = self.time + self.emission_interval();
        self.finished = false;
    }

    /// Seconds a one-shot emitter runs before completing.
    ///
    /// `rate * num_particles + lifetime + lifetime / (1 - constant_speed_div)`, capped by
    /// `max_emission_time`.
    pub fn emission_interval(&self) -> f32 {
        let s = &self.settings;
        let slowest = s.lifetime / (1.0 - s.constant_speed_div);
        (s.rate * s.num_particles as f32 + s.lifetime + slowest).min(s.max_emission_time)
    }

    /// Vertices as the accelerated renderer resolves them from the packed textures.
    ///
    /// Fails if a packed buffer was built with the wrong pairing.
    pub fn accelerated_vertices(&self) -> Result<Vec<VertexRecord>, EmitterError> {
        self.packed.validate()?;
        let mut vertices = vec![VertexRecord::default(); self.geometry.vertices().len()];
        let mut keys = Vec::with_capacity(self.store.len());
        let params = VertexParams {
            sort: SortMode::None,
            ..self.vertex_params()
        };
        resolve_particles(
            self.store.current(),
            self.geometry.id_fields(),
            &self.geometry.template().positions,
            &self.packed,
            &params,
            &mut vertices,
            &mut keys,
        );
        Ok(vertices)
    }

    /// Bakes the lookup textures and, in accelerated mode, the current state texture.
    pub fn bake_textures(&self) -> EmitterTextures {
        let accelerated = self.mode == SimulationMode::Accelerated;
        EmitterTextures {
            channels: accelerated.then(|| {
                [
                    create_float_texture(self.packed.internal0.texels()),
                    create_float_texture(self.packed.internal1.texels()),
                    create_float_texture(self.packed.internal2.texels()),
                ]
            }),
            color: create_byte_texture(&self.color.to_rgba8(self.color_mult)),
            state: accelerated.then(|| create_state_texture(self.store.current())),
        }
    }

    /// Uniforms for the particle material.
    pub fn material_parameters(&self) -> MaterialParameters {
        let precision = self.settings.precision();
        MaterialParameters {
            stretch: self.settings.stretch,
            color_mult: self.color_mult,
            num_particles: self.settings.num_particles,
            lifetime: self.settings.lifetime,
            graph_sample_size: 1.0 / precision as f32,
            graph_num_samples: precision as u32,
            wrap_bounds: self.settings.active_wrap_bounds(),
            softening: self.softening(),
            light_cube: self.settings.lighting.then_some(self.light_cube),
            depth_write: self.settings.depth_write,
        }
    }

    /// Program variant for the current settings and bindings.
    pub fn shader_key(&self) -> ParticleShaderKey {
        let s = &self.settings;
        let mut key = ParticleShaderKey::empty();
        key.set(ParticleShaderKey::CPU, self.mode == SimulationMode::Cpu);
        key.set(ParticleShaderKey::LIGHTING, s.lighting);
        key.set(ParticleShaderKey::NORMAL_MAP, s.lighting && s.normal_map);
        key.set(ParticleShaderKey::HALF_LAMBERT, s.lighting && s.half_lambert);
        key.set(ParticleShaderKey::STRETCH, s.stretch > 0.0);
        key.set(ParticleShaderKey::SOFT, self.softening().is_some());
        key.set(ParticleShaderKey::MESH, s.template != ParticleTemplate::Quad);
        key.set(ParticleShaderKey::SRGB, s.gamma_correct);
        key.set(ParticleShaderKey::WRAP, s.active_wrap_bounds().is_some());
        key
    }

    /// Soft-particle distance, only while a depth target is bound.
    pub fn softening(&self) -> Option<f32> {
        let has_depth = self
            .camera
            .as_ref()
            .is_some_and(|camera| camera.depth_target.is_some());
        (self.settings.depth_softening > 0.0 && has_depth).then_some(self.settings.depth_softening)
    }

    /// The active settings.
    pub fn settings(&self) -> &EmitterSettings {
        &self.settings
    }

    /// The execution path in use.
    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    /// Most recently completed particle states.
    pub fn states(&self) -> &[ParticleState] {
        self.store.current()
    }

    /// The simulation state store.
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Draw buffers.
    pub fn geometry(&self) -> &ParticleGeometry {
        &self.geometry
    }

    /// Quantized curves.
    pub fn channels(&self) -> &EmitterChannels {
        &self.channels
    }

    /// Packed float lookup buffers.
    pub fn packed_channels(&self) -> &PackedChannels {
        &self.packed
    }

    /// Packed color and alpha.
    pub fn color_channels(&self) -> &PackedChannelBuffer {
        &self.color
    }

    /// `max(1, brightest color sample)`.
    pub fn color_mult(&self) -> f32 {
        self.color_mult
    }

    /// Light cube of the last update.
    pub fn light_cube(&self) -> &LightCube {
        &self.light_cube
    }

    /// Sort keys of the last CPU update, in emission order.
    pub fn sort_keys(&self) -> &[f32] {
        self.emulator.keys()
    }

    /// Accumulated simulated time.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Time at which a one-shot emitter completes.
    pub fn end_time(&self) -> f32 {
        self.end_time
    }

    /// Returns `true` once a one-shot emitter has completed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of reallocations so far.
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of successful rebuilds so far; bumps whenever the lookup textures change.
    pub fn revision(&self) -> u32 {
        self.revision
    }

    fn step_params(&self, dt: f32) -> StepParams {
        let s = &self.settings;
        StepParams {
            dt,
            time: self.time,
            lifetime: s.lifetime,
            rate: s.rate,
            speed_div: s.speed_div,
            constant_speed_div: s.constant_speed_div,
            one_shot: s.one_shot,
            emitter_position: self.transform.w_axis.truncate(),
            spawn_bounds: s.spawn_bounds,
        }
    }

    fn vertex_params(&self) -> VertexParams {
        let camera_position = self
            .camera
            .as_ref()
            .map(|camera| camera.position)
            .unwrap_or(Vec3::ZERO);
        VertexParams {
            lifetime: self.settings.lifetime,
            precision: self.settings.precision(),
            stretch: self.settings.stretch,
            one_shot: self.settings.one_shot,
            rotation: Mat3::from_mat4(self.transform),
            wrap: self.settings.active_wrap_bounds().map(|bounds| WrapBox {
                bounds,
                center: camera_position,
            }),
            sort: self.settings.sort,
            camera_position,
        }
    }

    fn report_softening(&mut self) {
        if self.settings.depth_softening > 0.0
            && self.softening().is_none()
            && !self.softening_reported
        {
            debug!("depth softening requested without a depth target, skipping");
            self.softening_reported = true;
        }
    }

    fn check_finished(&mut self) {
        if !self.settings.one_shot || self.finished || self.time < self.end_time {
            return;
        }
        self.finished = true;
        if let Some(callback) = self.on_finished.as_mut() {
            callback();
        }
    }
}

fn allocate_store(settings: &EmitterSettings, generation: u32) -> StateStore {
    StateStore::allocate(
        settings.num_particles,
        settings.rate,
        settings.spawn_bounds,
        settings.seed,
        generation,
    )
}

fn log_mode(settings: &EmitterSettings, caps: &ProcessorCaps, mode: SimulationMode) {
    if settings.mode != SimulationMode::Accelerated || mode != SimulationMode::Cpu {
        return;
    }
    if !caps.supports_acceleration() {
        warn!("float textures or vertex texture units unavailable, falling back to CPU particles");
    } else {
        debug!("sort mode {:?} requires CPU particles", settings.sort);
    }
}
