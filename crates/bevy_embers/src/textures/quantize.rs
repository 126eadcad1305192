use bevy::prelude::*;

use crate::asset::{Curve, CurveSet};
use crate::formula::lerp;

/// A curve that can be sampled into interleaved channels.
pub trait CurveSource {
    /// Number of interleaved channels per sample.
    const CHANNELS: usize;

    /// Writes the value at `time` into `out`, which is `CHANNELS` long.
    fn write_value(&self, time: f32, out: &mut [f32]);
}

impl CurveSource for Curve {
    const CHANNELS: usize = 1;

    fn write_value(&self, time: f32, out: &mut [f32]) {
        out[0] = self.value(time);
    }
}

impl CurveSource for CurveSet {
    const CHANNELS: usize = 3;

    fn write_value(&self, time: f32, out: &mut [f32]) {
        out.copy_from_slice(&self.value(time).to_array());
    }
}

/// A curve pre-sampled at `precision` evenly spaced points of `[0, 1]`.
///
/// The sample count never depends on the number of keys of the source curve.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantizedCurve {
    channels: usize,
    samples: Vec<f32>,
}

impl QuantizedCurve {
    /// Wraps already interleaved samples.
    ///
    /// `samples.len()` must be a multiple of `channels`.
    pub fn from_samples(channels: usize, samples: Vec<f32>) -> Self {
        debug_assert!(channels > 0 && samples.len() % channels == 0);
        Self { channels, samples }
    }

    /// Number of samples (the quantization precision).
    pub fn len(&self) -> usize {
        self.samples.len() / self.channels
    }

    /// Returns `true` if the curve holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The raw interleaved samples.
    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    /// Channel `channel` of sample `index`.
    pub fn get(&self, index: usize, channel: usize) -> f32 {
        self.samples[index * self.channels + channel]
    }

    /// Sample `index` of a three-channel curve.
    pub fn vec3(&self, index: usize) -> Vec3 {
        Vec3::new(self.get(index, 0), self.get(index, 1), self.get(index, 2))
    }

    /// Largest value across all samples and channels.
    pub fn max_value(&self) -> f32 {
        self.samples.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    /// Scales every sample, e.g. to convert degrees to radians.
    pub fn scale(&mut self, factor: f32) {
        self.samples.iter_mut().for_each(|s| *s *= factor);
    }

    /// Linearly interpolates channel `channel` between the two samples nearest to `u`.
    ///
    /// `u` is clamped to `[0, 1]`.
    pub fn tex1d(&self, u: f32, channel: usize) -> f32 {
        let u = u.clamp(0.0, 1.0) * (self.len() - 1) as f32;
        let a = self.get(u.floor() as usize, channel);
        let b = self.get(u.ceil() as usize, channel);
        lerp(a, b, u.fract())
    }

    /// [`tex1d`](Self::tex1d) over all three channels.
    pub fn tex1d_vec3(&self, u: f32) -> Vec3 {
        Vec3::new(self.tex1d(u, 0), self.tex1d(u, 1), self.tex1d(u, 2))
    }
}

/// Samples `curve` at `i / (precision - 1)` for every `i` and blurs the result.
///
/// `precision` is clamped to at least `2`. `smoothness` is the radius, in samples, of a
/// symmetric box filter, rounded to the nearest whole sample; below `0.5` nothing is
/// blurred. Non-finite curve values are not
/// sanitized and propagate into the output.
pub fn quantize<C: CurveSource>(curve: &C, precision: usize, smoothness: f32) -> QuantizedCurve {
    let precision = precision.max(2);
    let channels = C::CHANNELS;
    let step = 1.0 / (precision - 1) as f32;

    let mut samples = vec![0.0; precision * channels];
    for (i, out) in samples.chunks_exact_mut(channels).enumerate() {
        curve.write_value(i as f32 * step, out);
    }

    let radius = smoothness.max(0.0).round() as usize;
    if radius > 0 {
        samples = box_blur(&samples, channels, radius);
    }

    QuantizedCurve { channels, samples }
}

// edge samples are clamped, so a constant curve stays constant
fn box_blur(samples: &[f32], channels: usize, radius: usize) -> Vec<f32> {
    let count = samples.len() / channels;
    let window = (2 * radius + 1) as f32;
    let mut blurred = vec![0.0; samples.len()];

    for i in 0..count {
        for c in 0..channels {
            let mut sum = 0.0;
            for offset in 0..=2 * radius {
                let j = (i + offset).saturating_sub(radius).min(count - 1);
                sum += samples[j * channels + c];
            }
            blurred[i * channels + c] = sum / window;
        }
    }

    blurred
}
