use bevy::math::FloatExt;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::serde_helpers::*;

/// Interpolation used between two neighbouring curve keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Reflect)]
pub enum CurveType {
    /// Straight line between keys.
    Linear,
    /// Ease in and out of every key.
    #[default]
    SmoothStep,
    /// Cardinal spline through the keys, shaped by [`Curve::tension`].
    Spline,
    /// Holds the left key's value until the next key.
    Step,
}

/// A single `(time, value)` key of a [`Curve`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
pub struct CurveKey {
    /// Normalized particle life in `[0, 1]`.
    pub time: f32,
    /// Value of the curve at [`time`](Self::time).
    pub value: f32,
}

impl CurveKey {
    /// Creates a key.
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value }
    }
}

fn default_tension() -> f32 {
    0.5
}

fn is_default_tension(value: &f32) -> bool {
    *value == default_tension()
}

/// A continuous mapping from normalized particle life to a scalar value.
///
/// Keys are kept sorted by time. Before the first key and after the last key the curve
/// holds the boundary value. A curve without keys evaluates to `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
pub struct Curve {
    /// Interpolation between keys. Defaults to [`CurveType::SmoothStep`].
    #[serde(default, skip_serializing_if = "is_default")]
    pub curve_type: CurveType,
    /// Tangent scale for [`CurveType::Spline`]; `0.5` gives a Catmull-Rom spline.
    #[serde(default = "default_tension", skip_serializing_if = "is_default_tension")]
    pub tension: f32,
    /// Keys sorted by time.
    pub keys: Vec<CurveKey>,
}

impl Default for Curve {
    fn default() -> Self {
        Self::constant(0.0)
    }
}

impl Curve {
    /// Creates a curve from `(time, value)` pairs, sorting them by time.
    pub fn new(keys: impl IntoIterator<Item = (f32, f32)>) -> Self {
        let mut curve = Self {
            curve_type: CurveType::default(),
            tension: default_tension(),
            keys: keys.into_iter().map(|(t, v)| CurveKey::new(t, v)).collect(),
        };
        curve.sort_keys();
        curve
    }

    /// A curve that evaluates to `value` everywhere.
    pub fn constant(value: f32) -> Self {
        Self::new([(0.0, value), (1.0, value)])
    }

    /// Returns the curve with a different interpolation type.
    pub fn with_type(mut self, curve_type: CurveType) -> Self {
        self.curve_type = curve_type;
        self
    }

    /// Inserts a key, keeping keys ordered by time.
    pub fn add(&mut self, time: f32, value: f32) {
        let index = self.keys.partition_point(|k| k.time <= time);
        self.keys.insert(index, CurveKey::new(time, value));
    }

    /// Restores time ordering after the keys were edited directly or deserialized.
    pub fn sort_keys(&mut self) {
        self.keys.sort_by(|a, b| a.time.total_cmp(&b.time));
    }

    /// Evaluates the curve at `time`.
    pub fn value(&self, time: f32) -> f32 {
        let keys = &self.keys;
        let (Some(first), Some(last)) = (keys.first(), keys.last()) else {
            return 0.0;
        };
        if keys.len() == 1 || time <= first.time {
            return first.value;
        }
        if time >= last.time {
            return last.value;
        }

        let right = keys
            .partition_point(|k| k.time <= time)
            .clamp(1, keys.len() - 1);
        let left = right - 1;
        let (k1, k2) = (keys[left], keys[right]);

        let span = k2.time - k1.time;
        let s = if span > 0.0 {
            (time - k1.time) / span
        } else {
            0.0
        };

        match self.curve_type {
            CurveType::Linear => k1.value.lerp(k2.value, s),
            CurveType::SmoothStep => k1.value.lerp(k2.value, s * s * (3.0 - 2.0 * s)),
            CurveType::Step => k1.value,
            CurveType::Spline => {
                let k0 = keys[left.saturating_sub(1)];
                let k3 = keys[(right + 1).min(keys.len() - 1)];
                let scale = 2.0 * self.tension;
                let m1 = tangent(k0, k2, span) * scale;
                let m2 = tangent(k1, k3, span) * scale;
                hermite(k1.value, m1, k2.value, m2, s)
            }
        }
    }
}

fn tangent(prev: CurveKey, next: CurveKey, span: f32) -> f32 {
    let dt = next.time - prev.time;
    if dt > 0.0 {
        (next.value - prev.value) / dt * span
    } else {
        0.0
    }
}

fn hermite(p1: f32, m1: f32, p2: f32, m2: f32, s: f32) -> f32 {
    let s2 = s * s;
    let s3 = s2 * s;
    (2.0 * s3 - 3.0 * s2 + 1.0) * p1
        + (s3 - 2.0 * s2 + s) * m1
        + (-2.0 * s3 + 3.0 * s2) * p2
        + (s3 - s2) * m2
}

/// Three [`Curve`]s evaluated together as a vector (offsets, divergences, color).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Reflect)]
pub struct CurveSet {
    /// The x, y and z (or r, g and b) channels.
    pub curves: [Curve; 3],
}

impl Default for CurveSet {
    fn default() -> Self {
        Self::constant(Vec3::ZERO)
    }
}

impl CurveSet {
    /// Creates a set from its three channels.
    pub fn new(x: Curve, y: Curve, z: Curve) -> Self {
        Self { curves: [x, y, z] }
    }

    /// A set that evaluates to `value` everywhere.
    pub fn constant(value: Vec3) -> Self {
        Self::new(
            Curve::constant(value.x),
            Curve::constant(value.y),
            Curve::constant(value.z),
        )
    }

    /// Applies the same interpolation type to every channel.
    pub fn with_type(self, curve_type: CurveType) -> Self {
        let [x, y, z] = self.curves;
        Self::new(
            x.with_type(curve_type),
            y.with_type(curve_type),
            z.with_type(curve_type),
        )
    }

    /// Restores time ordering of every channel.
    pub fn sort_keys(&mut self) {
        self.curves.iter_mut().for_each(Curve::sort_keys);
    }

    /// Evaluates all three channels at `time`.
    pub fn value(&self, time: f32) -> Vec3 {
        Vec3::new(
            self.curves[0].value(time),
            self.curves[1].value(time),
            self.curves[2].value(time),
        )
    }
}
