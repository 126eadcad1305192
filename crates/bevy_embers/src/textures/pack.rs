use bevy::prelude::*;

use super::quantize::QuantizedCurve;
use crate::emitter::EmitterError;
use crate::formula::lerp3;

/// `2^24`, the denominator that moves three packed bytes into the fraction of a float.
const PACK_SCALE: f32 = 16_777_216.0;

fn to_byte(value: f32) -> u8 {
    // truncating and saturating, so inputs in [0, 1) map onto 0..=254
    (value * 255.0) as u8
}

/// Three normalized scalars stored as bytes in the low 24 bits of an integer.
///
/// Packing is lossy to 8 bits per component. Inputs are expected in `[0, 1)`;
/// anything outside saturates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Packed3(u32);

impl Packed3 {
    /// Packs three normalized scalars.
    pub fn new(a: f32, b: f32, c: f32) -> Self {
        Self::from_bytes([to_byte(a), to_byte(b), to_byte(c)])
    }

    /// Packs three raw bytes.
    pub fn from_bytes([a, b, c]: [u8; 3]) -> Self {
        Self((a as u32) << 16 | (b as u32) << 8 | c as u32)
    }

    /// The packed bytes, most significant first.
    pub fn bytes(self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }

    /// Decodes the three scalars.
    pub fn unpack(self) -> [f32; 3] {
        self.bytes().map(|b| b as f32 / 255.0)
    }

    /// Converts to the float carried through a texture channel, in `[0, 1)`.
    ///
    /// Exact: every 24-bit integer is representable in an `f32` mantissa.
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / PACK_SCALE
    }

    /// Recovers the packed bytes from a texture channel value.
    pub fn from_f32(value: f32) -> Self {
        Self(((value * PACK_SCALE) as u32) & 0x00ff_ffff)
    }
}

/// `((a*255) << 16 | (b*255) << 8 | (c*255)) / 2^24`.
pub fn pack3(a: f32, b: f32, c: f32) -> f32 {
    Packed3::new(a, b, c).to_f32()
}

/// Inverse of [`pack3`], accurate to `1/255`.
pub fn unpack3(value: f32) -> [f32; 3] {
    Packed3::from_f32(value).unpack()
}

/// Shape of a packed 4-component texel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    /// `xyz` = vector, `w` = three packed scalars.
    Vec3Packed3,
    /// `x`, `y` = scalars, `z` unused, `w` = packed vector.
    TwoScalarsPacked3,
    /// `rgb` = color, `a` = alpha.
    Rgba,
}

/// Which emitter channels were packed into a buffer.
///
/// A buffer must be decoded with the pairing it was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPairing {
    /// Local offset + (scale, angle, alpha) divergence.
    LocalOffsetAndDivergences,
    /// World offset + local offset divergence.
    WorldOffsetAndLocalDivergence,
    /// Angle and scale + world offset divergence.
    AngleScaleAndWorldDivergence,
    /// Color + alpha.
    ColorAlpha,
}

impl ChannelPairing {
    /// Texel layout used by this pairing.
    pub fn layout(self) -> ChannelLayout {
        match self {
            Self::LocalOffsetAndDivergences | Self::WorldOffsetAndLocalDivergence => {
                ChannelLayout::Vec3Packed3
            }
            Self::AngleScaleAndWorldDivergence => ChannelLayout::TwoScalarsPacked3,
            Self::ColorAlpha => ChannelLayout::Rgba,
        }
    }
}

/// One packed 4-component texel per quantized sample index.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedChannelBuffer {
    pairing: ChannelPairing,
    texels: Vec<[f32; 4]>,
}

fn expect_channels(curve: &QuantizedCurve, channels: usize, len: usize) -> Result<(), EmitterError> {
    if curve.channels() != channels || curve.len() != len {
        return Err(EmitterError::PackedLength {
            expected: len,
            found: curve.len(),
            channels: curve.channels(),
        });
    }
    Ok(())
}

fn expect_layout(pairing: ChannelPairing, layout: ChannelLayout) -> Result<(), EmitterError> {
    if pairing.layout() != layout {
        return Err(EmitterError::PackedLayout { pairing, layout });
    }
    Ok(())
}

impl PackedChannelBuffer {
    /// `xyz` = `vector`, `w` = `pack3(a, b, c)`.
    pub fn vec3_plus_3_scalars(
        pairing: ChannelPairing,
        vector: &QuantizedCurve,
        a: &QuantizedCurve,
        b: &QuantizedCurve,
        c: &QuantizedCurve,
    ) -> Result<Self, EmitterError> {
        expect_layout(pairing, ChannelLayout::Vec3Packed3)?;
        let len = vector.len();
        expect_channels(vector, 3, len)?;
        for scalar in [a, b, c] {
            expect_channels(scalar, 1, len)?;
        }

        let texels = (0..len)
            .map(|i| {
                let v = vector.vec3(i);
                [v.x, v.y, v.z, pack3(a.get(i, 0), b.get(i, 0), c.get(i, 0))]
            })
            .collect();
        Ok(Self { pairing, texels })
    }

    /// `xyz` = `vector`, `w` = the three channels of `packed` run through [`pack3`].
    pub fn vec3_plus_vec3(
        pairing: ChannelPairing,
        vector: &QuantizedCurve,
        packed: &QuantizedCurve,
    ) -> Result<Self, EmitterError> {
        expect_layout(pairing, ChannelLayout::Vec3Packed3)?;
        let len = vector.len();
        expect_channels(vector, 3, len)?;
        expect_channels(packed, 3, len)?;

        let texels = (0..len)
            .map(|i| {
                let v = vector.vec3(i);
                let p = packed.vec3(i);
                [v.x, v.y, v.z, pack3(p.x, p.y, p.z)]
            })
            .collect();
        Ok(Self { pairing, texels })
    }

    /// `x` = `a`, `y` = `b`, `z` = `0`, `w` = `pack3` of `vector`.
    pub fn two_scalars_plus_vec3(
        pairing: ChannelPairing,
        a: &QuantizedCurve,
        b: &QuantizedCurve,
        vector: &QuantizedCurve,
    ) -> Result<Self, EmitterError> {
        expect_layout(pairing, ChannelLayout::TwoScalarsPacked3)?;
        let len = a.len();
        expect_channels(a, 1, len)?;
        expect_channels(b, 1, len)?;
        expect_channels(vector, 3, len)?;

        let texels = (0..len)
            .map(|i| {
                let v = vector.vec3(i);
                [a.get(i, 0), b.get(i, 0), 0.0, pack3(v.x, v.y, v.z)]
            })
            .collect();
        Ok(Self { pairing, texels })
    }

    /// `rgb` = `color`, `a` = `alpha`, unscaled.
    ///
    /// Returns the buffer and `color_mult = max(1, max color sample)`, the factor the
    /// 8-bit upload divides by (see [`to_rgba8`](Self::to_rgba8)).
    pub fn rgba(
        color: &QuantizedCurve,
        alpha: &QuantizedCurve,
    ) -> Result<(Self, f32), EmitterError> {
        let len = color.len();
        expect_channels(color, 3, len)?;
        expect_channels(alpha, 1, len)?;

        let color_mult = color.max_value().max(1.0);
        let texels = (0..len)
            .map(|i| {
                let c = color.vec3(i);
                [c.x, c.y, c.z, alpha.get(i, 0)]
            })
            .collect();
        Ok((
            Self {
                pairing: ChannelPairing::ColorAlpha,
                texels,
            },
            color_mult,
        ))
    }

    /// The pairing this buffer was built with.
    pub fn pairing(&self) -> ChannelPairing {
        self.pairing
    }

    /// Number of texels (the quantization precision).
    pub fn len(&self) -> usize {
        self.texels.len()
    }

    /// Returns `true` if the buffer holds no texels.
    pub fn is_empty(&self) -> bool {
        self.texels.is_empty()
    }

    /// Raw texels, ready for an `Rgba32Float` upload.
    pub fn texels(&self) -> &[[f32; 4]] {
        &self.texels
    }

    /// Texels scaled by `1 / color_mult` and quantized to bytes for an `Rgba8Unorm` upload.
    pub fn to_rgba8(&self, color_mult: f32) -> Vec<[u8; 4]> {
        let scale = 1.0 / color_mult;
        self.texels
            .iter()
            .map(|texel| texel.map(|v| (v * scale * 255.0) as u8))
            .collect()
    }

    /// Fails unless the buffer was built with `pairing`.
    pub fn expect_pairing(&self, pairing: ChannelPairing) -> Result<(), EmitterError> {
        if self.pairing != pairing {
            return Err(EmitterError::PackedPairing {
                expected: pairing,
                found: self.pairing,
            });
        }
        Ok(())
    }

    /// Decodes and interpolates the texel at `u` in `[0, 1]`.
    ///
    /// Packed components are unpacked on both neighbouring texels before interpolating,
    /// since interpolating the packed float itself would mix bytes.
    pub fn sample(&self, u: f32) -> DecodedTexel {
        let last = self.texels.len().saturating_sub(1);
        let u = u.clamp(0.0, 1.0) * last as f32;
        let a = self.decode(u.floor() as usize);
        let b = self.decode(u.ceil() as usize);
        a.lerp(b, u.fract())
    }

    fn decode(&self, index: usize) -> DecodedTexel {
        let [x, y, z, w] = self.texels[index];
        match self.pairing.layout() {
            ChannelLayout::Vec3Packed3 => DecodedTexel {
                vector: Vec3::new(x, y, z),
                scalars: Vec3::from_array(unpack3(w)),
            },
            ChannelLayout::TwoScalarsPacked3 => DecodedTexel {
                vector: Vec3::from_array(unpack3(w)),
                scalars: Vec3::new(x, y, 0.0),
            },
            ChannelLayout::Rgba => DecodedTexel {
                vector: Vec3::new(x, y, z),
                scalars: Vec3::new(w, 0.0, 0.0),
            },
        }
    }
}

/// A decoded texel: the full-precision or packed vector and up to three scalars.
///
/// For [`ChannelLayout::TwoScalarsPacked3`] the vector is the packed one and the
/// scalars are `(x, y, 0)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodedTexel {
    /// Vector channel.
    pub vector: Vec3,
    /// Scalar channels.
    pub scalars: Vec3,
}

impl DecodedTexel {
    fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            vector: lerp3(self.vector, other.vector, Vec3::splat(t)),
            scalars: lerp3(self.scalars, other.scalars, Vec3::splat(t)),
        }
    }
}

/// Decodes an 8-bit color texel back to linear values using the recorded `color_mult`.
pub fn decode_rgba8(texel: [u8; 4], color_mult: f32) -> Vec4 {
    Vec4::from_array(texel.map(|b| b as f32 / 255.0 * color_mult))
}
