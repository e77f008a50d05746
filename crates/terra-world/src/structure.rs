//! Voxel structures stamped into terrain after generation.

use terra_voxel::{ChannelKind, ChunkCoord, ChunkDims, MaterialId, VoxelBuffer, chunk_origin, occupancy_density};

/// Inclusive world-voxel box.
pub type VoxelBox = ((i64, i64, i64), (i64, i64, i64));

/// Something that writes voxels into every chunk it overlaps.
pub trait VoxelStructure: Send + Sync {
    /// Inclusive world-voxel bounds of everything the structure writes.
    fn bounds(&self) -> VoxelBox;

    /// Writes the part inside `coord` into `buffer`. Returns the number of
    /// voxels written. Applying twice must give the same result as once.
    fn apply(&self, coord: ChunkCoord, buffer: &mut VoxelBuffer) -> usize;

    /// Returns `true` if the structure overlaps the chunk.
    fn intersects(&self, coord: ChunkCoord, dims: ChunkDims) -> bool {
        let (min, max) = self.bounds();
        let (ox, oy, oz) = chunk_origin(coord, dims);
        let overlaps = |lo: i64, hi: i64, origin: i64, size: usize| lo < origin + size as i64 && hi >= origin;
        overlaps(min.0, max.0, ox, dims.x) && overlaps(min.1, max.1, oy, dims.y) && overlaps(min.2, max.2, oz, dims.z)
    }
}

/// A list of absolute voxel edits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlockStructure {
    blocks: Vec<((i64, i64, i64), MaterialId)>,
    bounds: Option<VoxelBox>,
}

impl BlockStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets one voxel. Later edits to the same voxel win.
    pub fn add_block(&mut self, position: (i64, i64, i64), material: MaterialId) {
        self.blocks.push((position, material));
        self.bounds = Some(match self.bounds {
            None => (position, position),
            Some((min, max)) => (
                (min.0.min(position.0), min.1.min(position.1), min.2.min(position.2)),
                (max.0.max(position.0), max.1.max(position.1), max.2.max(position.2)),
            ),
        });
    }

    pub fn with_block(mut self, position: (i64, i64, i64), material: MaterialId) -> Self {
        self.add_block(position, material);
        self
    }

    /// Fills the inclusive box `min..=max`.
    pub fn with_box(mut self, min: (i64, i64, i64), max: (i64, i64, i64), material: MaterialId) -> Self {
        for z in min.2..=max.2 {
            for y in min.1..=max.1 {
                for x in min.0..=max.0 {
                    self.add_block((x, y, z), material);
                }
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl VoxelStructure for BlockStructure {
    fn bounds(&self) -> VoxelBox {
        // An empty structure gets an inverted box that overlaps nothing.
        self.bounds.unwrap_or(((0, 0, 0), (-1, -1, -1)))
    }

    fn apply(&self, coord: ChunkCoord, buffer: &mut VoxelBuffer) -> usize {
        let dims = buffer.dims();
        let (ox, oy, oz) = chunk_origin(coord, dims);
        let mut written = 0;
        for &((x, y, z), material) in &self.blocks {
            let (lx, ly, lz) = (x - ox, y - oy, z - oz);
            let inside = |v: i64, size: usize| (0..size as i64).contains(&v);
            if !(inside(lx, dims.x) && inside(ly, dims.y) && inside(lz, dims.z)) {
                continue;
            }
            let index = dims.index(lx as usize, ly as usize, lz as usize);
            buffer.set_material_at(index, material);
            if buffer.has(ChannelKind::Density) {
                buffer.set_density_at(index, occupancy_density(material));
            }
            written += 1;
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_track_blocks() {
        let s = BlockStructure::new()
            .with_block((3, 4, 5), MaterialId(1))
            .with_block((-2, 10, 0), MaterialId(1));
        assert_eq!(s.bounds(), ((-2, 4, 0), (3, 10, 5)));
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_intersection_spans_chunk_borders() {
        let dims = ChunkDims::cubic(16);
        let s = BlockStructure::new().with_box((14, 0, 0), (17, 1, 1), MaterialId(1));
        assert!(s.intersects(ChunkCoord::new(0, 0, 0), dims));
        assert!(s.intersects(ChunkCoord::new(1, 0, 0), dims));
        assert!(!s.intersects(ChunkCoord::new(2, 0, 0), dims));
        assert!(!s.intersects(ChunkCoord::new(-1, 0, 0), dims));
        assert!(!BlockStructure::new().intersects(ChunkCoord::new(0, 0, 0), dims));
    }

    #[test]
    fn test_apply_writes_only_the_local_part() {
        let dims = ChunkDims::cubic(16);
        let s = BlockStructure::new().with_box((14, 0, 0), (17, 0, 0), MaterialId(4));

        let mut left = VoxelBuffer::new(dims);
        assert_eq!(s.apply(ChunkCoord::new(0, 0, 0), &mut left), 2);
        assert_eq!(left.material(15, 0, 0), MaterialId(4));

        let mut right = VoxelBuffer::new(dims);
        assert_eq!(s.apply(ChunkCoord::new(1, 0, 0), &mut right), 2);
        assert_eq!(right.material(1, 0, 0), MaterialId(4));
        assert_eq!(right.material(2, 0, 0), MaterialId::EMPTY);

        // Idempotent.
        let before = right.clone();
        s.apply(ChunkCoord::new(1, 0, 0), &mut right);
        assert_eq!(before, right);
    }
}
