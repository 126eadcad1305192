use crate::mesh::VertexRecord;

/// Reorders CPU-path vertex blocks by a per-particle key.
///
/// Keeps its scratch order between frames, so sorting does not allocate once the
/// particle count is stable.
#[derive(Debug, Clone, Default)]
pub struct ParticleSorter {
    order: Vec<u32>,
}

impl ParticleSorter {
    /// Stable ascending order of particle indices by `keys`.
    ///
    /// Equal keys keep their emission order, so equal-depth particles never swap
    /// between frames.
    pub fn sort(&mut self, keys: &[f32]) -> &[u32] {
        self.order.clear();
        self.order.extend(0..keys.len() as u32);
        self.order
            .sort_by(|&a, &b| keys[a as usize].total_cmp(&keys[b as usize]));
        &self.order
    }

    /// Copies every `block`-sized run of `source` into `target` in key order.
    pub fn sort_blocks(
        &mut self,
        keys: &[f32],
        source: &[VertexRecord],
        target: &mut [VertexRecord],
        block: usize,
    ) {
        let order = self.sort(keys);
        for (dst, &particle) in target.chunks_exact_mut(block).zip(order) {
            let start = particle as usize * block;
            dst.copy_from_slice(&source[start..start + block]);
        }
    }
}
