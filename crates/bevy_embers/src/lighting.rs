use bevy::prelude::*;

use crate::emitter::EmitterError;

/// Cube face directions, in face order: `-X, +X, -Y, +Y, -Z, +Z`.
pub const CUBE_DIRECTIONS: [Vec3; 6] = [
    Vec3::NEG_X,
    Vec3::X,
    Vec3::NEG_Y,
    Vec3::Y,
    Vec3::NEG_Z,
    Vec3::Z,
];

/// One directional light as seen by the emitter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLightSample {
    /// Unit direction pointing towards the light; a face facing it receives full
    /// intensity.
    pub direction: Vec3,
    /// Linear color.
    pub color: Vec3,
}

/// Ambient color plus an ordered list of directional lights.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneLighting {
    /// Linear ambient color.
    pub ambient: Vec3,
    /// Directional lights in registration order.
    pub directional: Vec<DirectionalLightSample>,
}

/// Ambient and directional lighting reduced to six axis-aligned colors.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightCube {
    /// Face colors, ordered like [`CUBE_DIRECTIONS`].
    pub faces: [Vec3; 6],
}

impl LightCube {
    /// Bakes `scene`: each face starts at the ambient color and gains
    /// `color * max(0, dot(face, light))` per directional light.
    pub fn from_scene(scene: &SceneLighting) -> Self {
        let faces = CUBE_DIRECTIONS.map(|face| {
            scene
                .directional
                .iter()
                .fold(scene.ambient, |acc, light| {
                    acc + light.color * face.dot(light.direction.normalize_or_zero()).max(0.0)
                })
        });
        Self { faces }
    }

    /// Bakes `scene`, failing when none is bound.
    pub fn try_from_scene(scene: Option<&SceneLighting>) -> Result<Self, EmitterError> {
        scene.map(Self::from_scene).ok_or(EmitterError::MissingScene)
    }

    /// Light arriving at a surface with `normal`, blended from the three facing faces
    /// with squared-normal weights.
    pub fn irradiance(&self, normal: Vec3) -> Vec3 {
        let n = normal.normalize_or_zero();
        let weights = n * n;
        let x = if n.x < 0.0 { self.faces[0] } else { self.faces[1] };
        let y = if n.y < 0.0 { self.faces[2] } else { self.faces[3] };
        let z = if n.z < 0.0 { self.faces[4] } else { self.faces[5] };
        x * weights.x + y * weights.y + z * weights.z
    }
}
