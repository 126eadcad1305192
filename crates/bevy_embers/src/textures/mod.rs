/// Three-scalars-in-one-float packing and the packed channel buffers.
pub mod pack;
/// Curve sampling at a fixed precision.
pub mod quantize;

use bevy::{
    prelude::*,
    render::render_resource::{Extent3d, TextureDimension, TextureFormat, TextureUsages},
};

use crate::asset::EmitterSettings;
use crate::emitter::EmitterError;
use crate::formula::{LifeCurves, LifeSample};
use crate::state::ParticleState;
use pack::{ChannelPairing, PackedChannelBuffer};
use quantize::{QuantizedCurve, quantize};

/// Every emitter curve quantized at the emitter's precision.
///
/// Angles are converted from degrees to radians once, right after quantization.
/// Read-only after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EmitterChannels {
    /// Local offset, 3 channels.
    pub local_offset: QuantizedCurve,
    /// World offset, 3 channels.
    pub world_offset: QuantizedCurve,
    /// Color, 3 channels.
    pub color: QuantizedCurve,
    /// Local offset divergence, 3 channels.
    pub local_offset_divergence: QuantizedCurve,
    /// World offset divergence, 3 channels.
    pub world_offset_divergence: QuantizedCurve,
    /// Angle in radians.
    pub angle: QuantizedCurve,
    /// Scale.
    pub scale: QuantizedCurve,
    /// Alpha.
    pub alpha: QuantizedCurve,
    /// Scale divergence.
    pub scale_divergence: QuantizedCurve,
    /// Angle divergence.
    pub angle_divergence: QuantizedCurve,
    /// Alpha divergence.
    pub alpha_divergence: QuantizedCurve,
}

impl EmitterChannels {
    /// Quantizes every curve of `settings`.
    pub fn quantize(settings: &EmitterSettings) -> Self {
        let precision = settings.precision();
        let smoothness = settings.smoothness;

        let mut angle = quantize(&settings.angle, precision, smoothness);
        angle.scale(std::f32::consts::PI / 180.0);

        Self {
            local_offset: quantize(&settings.local_offset, precision, smoothness),
            world_offset: quantize(&settings.world_offset, precision, smoothness),
            color: quantize(&settings.color, precision, smoothness),
            local_offset_divergence: quantize(
                &settings.local_offset_divergence,
                precision,
                smoothness,
            ),
            world_offset_divergence: quantize(
                &settings.world_offset_divergence,
                precision,
                smoothness,
            ),
            angle,
            scale: quantize(&settings.scale, precision, smoothness),
            alpha: quantize(&settings.alpha, precision, smoothness),
            scale_divergence: quantize(&settings.scale_divergence, precision, smoothness),
            angle_divergence: quantize(&settings.angle_divergence, precision, smoothness),
            alpha_divergence: quantize(&settings.alpha_divergence, precision, smoothness),
        }
    }

    /// Number of samples per curve.
    pub fn precision(&self) -> usize {
        self.scale.len()
    }

    /// Packs the position-affecting channels into the three float textures.
    pub fn pack(&self) -> Result<PackedChannels, EmitterError> {
        Ok(PackedChannels {
            internal0: PackedChannelBuffer::vec3_plus_3_scalars(
                ChannelPairing::LocalOffsetAndDivergences,
                &self.local_offset,
                &self.scale_divergence,
                &self.angle_divergence,
                &self.alpha_divergence,
            )?,
            internal1: PackedChannelBuffer::vec3_plus_vec3(
                ChannelPairing::WorldOffsetAndLocalDivergence,
                &self.world_offset,
                &self.local_offset_divergence,
            )?,
            internal2: PackedChannelBuffer::two_scalars_plus_vec3(
                ChannelPairing::AngleScaleAndWorldDivergence,
                &self.angle,
                &self.scale,
                &self.world_offset_divergence,
            )?,
        })
    }

    /// Packs color and alpha, returning the buffer and its `color_mult`.
    pub fn pack_color(&self) -> Result<(PackedChannelBuffer, f32), EmitterError> {
        PackedChannelBuffer::rgba(&self.color, &self.alpha)
    }
}

impl LifeCurves for EmitterChannels {
    fn sample(&self, life: f32) -> LifeSample {
        LifeSample {
            local_offset: self.local_offset.tex1d_vec3(life),
            local_offset_divergence: self.local_offset_divergence.tex1d_vec3(life),
            world_offset: self.world_offset.tex1d_vec3(life),
            world_offset_divergence: self.world_offset_divergence.tex1d_vec3(life),
            angle: self.angle.tex1d(life, 0),
            scale: self.scale.tex1d(life, 0),
            angle_divergence: self.angle_divergence.tex1d(life, 0),
            scale_divergence: self.scale_divergence.tex1d(life, 0),
            alpha_divergence: self.alpha_divergence.tex1d(life, 0),
        }
    }
}

/// The three float lookup textures of the accelerated path.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedChannels {
    /// Local offset + (scale, angle, alpha) divergence.
    pub internal0: PackedChannelBuffer,
    /// World offset + local offset divergence.
    pub internal1: PackedChannelBuffer,
    /// Angle and scale + world offset divergence.
    pub internal2: PackedChannelBuffer,
}

impl PackedChannels {
    /// Fails unless every buffer carries the pairing its slot is decoded with.
    pub fn validate(&self) -> Result<(), EmitterError> {
        self.internal0
            .expect_pairing(ChannelPairing::LocalOffsetAndDivergences)?;
        self.internal1
            .expect_pairing(ChannelPairing::WorldOffsetAndLocalDivergence)?;
        self.internal2
            .expect_pairing(ChannelPairing::AngleScaleAndWorldDivergence)
    }
}

impl LifeCurves for PackedChannels {
    fn sample(&self, life: f32) -> LifeSample {
        let t0 = self.internal0.sample(life);
        let t1 = self.internal1.sample(life);
        let t2 = self.internal2.sample(life);
        LifeSample {
            local_offset: t0.vector,
            local_offset_divergence: t1.scalars,
            world_offset: t1.vector,
            world_offset_divergence: t2.vector,
            angle: t2.scalars.x,
            scale: t2.scalars.y,
            scale_divergence: t0.scalars.x,
            angle_divergence: t0.scalars.y,
            alpha_divergence: t0.scalars.z,
        }
    }
}

fn texture_usages() -> TextureUsages {
    TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST | TextureUsages::COPY_SRC
}

/// Bakes float texels into a `width x 1` `Rgba32Float` image.
pub fn create_float_texture(texels: &[[f32; 4]]) -> Image {
    let mut image = Image::new(
        Extent3d {
            width: texels.len() as u32,
            height: 1,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        bytemuck::cast_slice(texels).to_vec(),
        TextureFormat::Rgba32Float,
        default(),
    );
    image.texture_descriptor.usage = texture_usages();
    image
}

/// Bakes byte texels into a `width x 1` `Rgba8Unorm` image.
pub fn create_byte_texture(texels: &[[u8; 4]]) -> Image {
    let mut image = Image::new(
        Extent3d {
            width: texels.len() as u32,
            height: 1,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        texels.concat(),
        TextureFormat::Rgba8Unorm,
        default(),
    );
    image.texture_descriptor.usage = texture_usages();
    image
}

/// Bakes particle states into a `num_particles x 1` `Rgba32Float` image.
pub fn create_state_texture(states: &[ParticleState]) -> Image {
    create_float_texture(bytemuck::cast_slice(states))
}

/// Images handed to the renderer.
///
/// The float textures only exist in accelerated mode; color is always 8-bit.
#[derive(Debug, Clone)]
pub struct EmitterTextures {
    /// `internal0..2`, accelerated mode only.
    pub channels: Option<[Image; 3]>,
    /// `internal3`, color and alpha divided by `color_mult`.
    pub color: Image,
    /// Current particle states, accelerated mode only.
    pub state: Option<Image>,
}
