use bevy::{
    asset::RenderAssetUsages,
    mesh::{
        Indices, MeshVertexAttribute, MeshVertexAttributeId, PrimitiveTopology,
        VertexAttributeValues,
    },
    prelude::*,
    render::render_resource::VertexFormat,
};
use bytemuck::{Pod, Zeroable};

use crate::asset::ParticleTemplate;
use crate::emitter::EmitterError;
use crate::formula::{
    ParticleFrame, STREAM_VERTEX_RANDOM, encode_id, generation_seed, unit_noise,
};

/// Resolved world position (`xyz`) and normalized life (`w`). Zero in accelerated mode.
pub const ATTRIBUTE_POSITION_LIFE: MeshVertexAttribute =
    MeshVertexAttribute::new("Particle_PositionLife", 988_540_917, VertexFormat::Float32x4);

/// Angle, scale, alpha jitter and the packed `id + rnd` field.
pub const ATTRIBUTE_ANGLE_SCALE_ALPHA_ID: MeshVertexAttribute = MeshVertexAttribute::new(
    "Particle_AngleScaleAlphaId",
    988_540_918,
    VertexFormat::Float32x4,
);

/// Template corner in particle space.
pub const ATTRIBUTE_CORNER: MeshVertexAttribute =
    MeshVertexAttribute::new("Particle_Corner", 988_540_919, VertexFormat::Float32x4);

/// One vertex of one particle: 12 floats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct VertexRecord {
    /// World position and normalized life.
    pub position_life: [f32; 4],
    /// Angle, scale, alpha jitter, `id + rnd`.
    pub angle_scale_alpha_id: [f32; 4],
    /// Template corner, `w` unused.
    pub corner: [f32; 4],
}

impl VertexRecord {
    fn static_corner(corner: Vec3, id_field: f32) -> Self {
        Self {
            position_life: [0.0; 4],
            angle_scale_alpha_id: [0.0, 0.0, 0.0, id_field],
            corner: corner.extend(0.0).to_array(),
        }
    }

    /// The packed `id + rnd` field.
    pub fn id_field(&self) -> f32 {
        self.angle_scale_alpha_id[3]
    }

    /// World position of this vertex.
    pub fn position(&self) -> Vec3 {
        Vec4::from_array(self.position_life).truncate()
    }
}

/// Per-particle geometry: corner positions and a triangle list.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateMesh {
    /// Corner positions.
    pub positions: Vec<Vec3>,
    /// Triangle-list indices into `positions`.
    pub indices: Vec<u32>,
}

impl TemplateMesh {
    /// The camera-facing quad.
    pub fn quad() -> Self {
        Self {
            positions: vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            indices: vec![0, 1, 2, 0, 2, 3],
        }
    }

    /// Builds the template geometry for `template`.
    pub fn from_template(template: &ParticleTemplate) -> Result<Self, EmitterError> {
        let mesh = match template {
            ParticleTemplate::Quad => return Ok(Self::quad()),
            ParticleTemplate::Custom { positions, indices } => {
                return Self::custom(positions, indices);
            }
            ParticleTemplate::Sphere { radius } => Mesh::from(Sphere::new(*radius)),
            ParticleTemplate::Cuboid { half_size } => Mesh::from(Cuboid::new(
                half_size.x * 2.0,
                half_size.y * 2.0,
                half_size.z * 2.0,
            )),
        };
        Self::from_mesh(&mesh)
    }

    fn custom(positions: &[[f32; 3]], indices: &[u32]) -> Result<Self, EmitterError> {
        if positions.is_empty() {
            return Err(EmitterError::MalformedTemplate(
                "template has no corners".to_string(),
            ));
        }
        if indices.len() % 3 != 0 {
            return Err(EmitterError::MalformedTemplate(format!(
                "{} indices do not form a triangle list",
                indices.len()
            )));
        }
        if let Some(bad) = indices.iter().find(|&&i| i as usize >= positions.len()) {
            return Err(EmitterError::MalformedTemplate(format!(
                "index {bad} out of range for {} corners",
                positions.len()
            )));
        }
        Ok(Self {
            positions: positions.iter().copied().map(Vec3::from_array).collect(),
            indices: indices.to_vec(),
        })
    }

    fn from_mesh(mesh: &Mesh) -> Result<Self, EmitterError> {
        let positions = extract_float32x3(mesh, Mesh::ATTRIBUTE_POSITION).unwrap_or_default();
        let indices: Vec<u32> = mesh
            .indices()
            .map(|indices| indices.iter().map(|i| i as u32).collect())
            .unwrap_or_else(|| (0..positions.len() as u32).collect());
        Self::custom(&positions, &indices)
    }

    /// Corners per particle.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Indices per particle.
    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// The vertex and index buffers handed to the renderer.
///
/// The index buffer and the corner/id fields are static; per-frame attributes are
/// rewritten by the CPU emulation. Reallocating regenerates every random fraction.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleGeometry {
    template: TemplateMesh,
    indices: Vec<u32>,
    id_fields: Vec<f32>,
    vertices: Vec<VertexRecord>,
}

impl ParticleGeometry {
    /// Builds the buffers for `num_particles` copies of `template`.
    pub fn allocate(num_particles: u32, template: TemplateMesh, seed: u32, generation: u32) -> Self {
        let seed = generation_seed(seed, generation);
        let verts = template.vertex_count();

        let id_fields: Vec<f32> = (0..num_particles)
            .map(|i| encode_id(i, unit_noise(seed, i, STREAM_VERTEX_RANDOM)))
            .collect();

        let mut indices = Vec::with_capacity(num_particles as usize * template.index_count());
        for particle in 0..num_particles {
            let base = particle * verts as u32;
            indices.extend(template.indices.iter().map(|&i| base + i));
        }

        let mut geometry = Self {
            vertices: vec![VertexRecord::default(); num_particles as usize * verts],
            template,
            indices,
            id_fields,
        };
        geometry.reset_vertices();
        geometry
    }

    /// Rewrites every vertex with only its static corner and id.
    pub fn reset_vertices(&mut self) {
        let verts = self.vertices_per_particle();
        for (block, &id_field) in self.vertices.chunks_exact_mut(verts).zip(&self.id_fields) {
            for (vertex, &corner) in block.iter_mut().zip(&self.template.positions) {
                *vertex = VertexRecord::static_corner(corner, id_field);
            }
        }
    }

    /// The per-particle template.
    pub fn template(&self) -> &TemplateMesh {
        &self.template
    }

    /// Number of particles.
    pub fn num_particles(&self) -> usize {
        self.id_fields.len()
    }

    /// Vertices per particle.
    pub fn vertices_per_particle(&self) -> usize {
        self.template.vertex_count()
    }

    /// Indices per particle.
    pub fn indices_per_particle(&self) -> usize {
        self.template.index_count()
    }

    /// `num_particles * indices_per_particle`.
    pub fn draw_count(&self) -> usize {
        self.indices.len()
    }

    /// The static index buffer.
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// The vertex buffer.
    pub fn vertices(&self) -> &[VertexRecord] {
        &self.vertices
    }

    /// Packed `id + rnd` field of every particle.
    pub fn id_fields(&self) -> &[f32] {
        &self.id_fields
    }

    /// Corners, id fields and the mutable vertex buffer, borrowed together.
    pub(crate) fn split_mut(&mut self) -> (&[Vec3], &[f32], &mut [VertexRecord]) {
        (&self.template.positions, &self.id_fields, &mut self.vertices)
    }

    /// Vertices of particle `index`.
    pub fn particle_vertices(&self, index: usize) -> &[VertexRecord] {
        let verts = self.vertices_per_particle();
        &self.vertices[index * verts..(index + 1) * verts]
    }

    /// Builds a renderable [`Mesh`].
    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = Mesh::new(
            PrimitiveTopology::TriangleList,
            RenderAssetUsages::default(),
        );
        self.write_mesh(&mut mesh);
        mesh.insert_indices(Indices::U32(self.indices.clone()));
        mesh
    }

    /// Replaces the vertex attributes of `mesh` with the current vertex buffer.
    pub fn write_mesh(&self, mesh: &mut Mesh) {
        let corners: Vec<[f32; 3]> = self
            .vertices
            .iter()
            .map(|v| [v.corner[0], v.corner[1], v.corner[2]])
            .collect();
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, corners);
        mesh.insert_attribute(
            ATTRIBUTE_POSITION_LIFE,
            self.vertices.iter().map(|v| v.position_life).collect::<Vec<_>>(),
        );
        mesh.insert_attribute(
            ATTRIBUTE_ANGLE_SCALE_ALPHA_ID,
            self.vertices
                .iter()
                .map(|v| v.angle_scale_alpha_id)
                .collect::<Vec<_>>(),
        );
        mesh.insert_attribute(
            ATTRIBUTE_CORNER,
            self.vertices.iter().map(|v| v.corner).collect::<Vec<_>>(),
        );
    }
}

/// Writes one particle's resolved frame into its vertex block.
///
/// Disabled particles collapse every corner to the origin.
pub fn write_particle_block(
    block: &mut [VertexRecord],
    frame: &ParticleFrame,
    id_field: f32,
    corners: &[Vec3],
) {
    for (vertex, &corner) in block.iter_mut().zip(corners) {
        *vertex = if frame.enabled {
            VertexRecord {
                position_life: frame.corner_position(corner.y).extend(frame.life).to_array(),
                angle_scale_alpha_id: [frame.angle, frame.scale, frame.alpha_jitter, id_field],
                corner: corner.extend(0.0).to_array(),
            }
        } else {
            VertexRecord {
                position_life: [0.0; 4],
                angle_scale_alpha_id: [0.0, 0.0, 0.0, id_field],
                corner: [0.0; 4],
            }
        };
    }
}

fn extract_float32x3(
    mesh: &Mesh,
    attribute: impl Into<MeshVertexAttributeId>,
) -> Option<Vec<[f32; 3]>> {
    mesh.attribute(attribute).and_then(|attr| match attr {
        VertexAttributeValues::Float32x3(v) => Some(v.clone()),
        _ => None,
    })
}
