//! Cross-chunk voxel access for meshing.
//!
//! [`ChunkNeighborhood`] holds the centre chunk and up to 26 surrounding
//! chunks as shared, immutable snapshots, so a worker thread can mesh
//! without holding any lock. Local coordinates may step one chunk outside
//! the centre along any axis; lookups resolve into the right neighbour.

use std::sync::Arc;

use terra_voxel::{
    ChunkDims, CornerDirection, EdgeDirection, FaceDirection, LightColor, MaterialId, VoxelBuffer,
};

/// What a lookup into a missing neighbour returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BoundaryPolicy {
    /// Missing neighbours read as empty space, so boundary faces are shown.
    #[default]
    Empty,
    /// Missing neighbours repeat the centre's own boundary voxel, so an
    /// isosurface ends cleanly at the chunk edge instead of closing off.
    Duplicate,
}

/// Centre chunk plus neighbour snapshots.
#[derive(Clone, Debug)]
pub struct ChunkNeighborhood {
    dims: ChunkDims,
    center: Arc<VoxelBuffer>,
    /// Slot `(dx + 1) + 3 (dy + 1) + 9 (dz + 1)`; slot 13 stays empty.
    slots: [Option<Arc<VoxelBuffer>>; 27],
    policy: BoundaryPolicy,
}

fn slot_index(dx: i32, dy: i32, dz: i32) -> usize {
    ((dx + 1) + 3 * (dy + 1) + 9 * (dz + 1)) as usize
}

impl ChunkNeighborhood {
    /// Neighbourhood with no neighbours loaded.
    pub fn new(center: Arc<VoxelBuffer>, policy: BoundaryPolicy) -> Self {
        let dims = center.dims();
        Self {
            dims,
            center,
            slots: Default::default(),
            policy,
        }
    }

    /// Installs the neighbour at chunk offset `(dx, dy, dz)`, each in
    /// `-1..=1`. Offsets out of range, the centre itself, and buffers with
    /// different dimensions are ignored.
    pub fn set_neighbor(&mut self, dx: i32, dy: i32, dz: i32, buffer: Arc<VoxelBuffer>) {
        let in_range = (-1..=1).contains(&dx) && (-1..=1).contains(&dy) && (-1..=1).contains(&dz);
        if !in_range || (dx, dy, dz) == (0, 0, 0) {
            return;
        }
        if buffer.dims() != self.dims {
            tracing::warn!(
                dx,
                dy,
                dz,
                "neighbour dimensions {:?} differ from {:?}; ignored",
                buffer.dims(),
                self.dims
            );
            return;
        }
        self.slots[slot_index(dx, dy, dz)] = Some(buffer);
    }

    /// Builder-style [`Self::set_neighbor`].
    pub fn with_neighbor(mut self, dx: i32, dy: i32, dz: i32, buffer: Arc<VoxelBuffer>) -> Self {
        self.set_neighbor(dx, dy, dz, buffer);
        self
    }

    /// Installs a face-adjacent neighbour.
    pub fn set_face_neighbor(&mut self, dir: FaceDirection, buffer: Arc<VoxelBuffer>) {
        let (dx, dy, dz) = dir.delta();
        self.set_neighbor(dx, dy, dz, buffer);
    }

    /// Installs an edge-adjacent neighbour.
    pub fn set_edge_neighbor(&mut self, dir: EdgeDirection, buffer: Arc<VoxelBuffer>) {
        let (dx, dy, dz) = dir.delta();
        self.set_neighbor(dx, dy, dz, buffer);
    }

    /// Installs a corner-adjacent neighbour.
    pub fn set_corner_neighbor(&mut self, dir: CornerDirection, buffer: Arc<VoxelBuffer>) {
        let (dx, dy, dz) = dir.delta();
        self.set_neighbor(dx, dy, dz, buffer);
    }

    /// The centre chunk.
    pub fn center(&self) -> &VoxelBuffer {
        &self.center
    }

    /// Shared handle to the centre chunk.
    pub fn center_arc(&self) -> &Arc<VoxelBuffer> {
        &self.center
    }

    /// Shared dimensions.
    pub fn dims(&self) -> ChunkDims {
        self.dims
    }

    /// Missing-neighbour policy.
    pub fn policy(&self) -> BoundaryPolicy {
        self.policy
    }

    /// Returns `true` if the face neighbour in `dir` is loaded.
    pub fn has_face_neighbor(&self, dir: FaceDirection) -> bool {
        let (dx, dy, dz) = dir.delta();
        self.slots[slot_index(dx, dy, dz)].is_some()
    }

    /// Number of loaded neighbours (centre excluded).
    pub fn neighbor_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Resolves a local coordinate to a buffer and linear index.
    fn locate(&self, x: i32, y: i32, z: i32) -> Option<(&VoxelBuffer, usize)> {
        let size = self.dims.as_array();
        let pos = [x, y, z];
        let mut chunk = [0i32; 3];
        let mut local = [0usize; 3];
        for axis in 0..3 {
            let n = size[axis] as i32;
            chunk[axis] = pos[axis].div_euclid(n);
            local[axis] = pos[axis].rem_euclid(n) as usize;
        }

        let neighbor = if chunk == [0, 0, 0] {
            Some(self.center.as_ref())
        } else if chunk.iter().all(|c| (-1..=1).contains(c)) {
            self.slots[slot_index(chunk[0], chunk[1], chunk[2])].as_deref()
        } else {
            None
        };
        match (neighbor, self.policy) {
            (Some(buffer), _) => Some((buffer, self.dims.index(local[0], local[1], local[2]))),
            (None, BoundaryPolicy::Empty) => None,
            (None, BoundaryPolicy::Duplicate) => {
                let clamp = |v: i32, n: usize| v.clamp(0, n as i32 - 1) as usize;
                let index = self.dims.index(
                    clamp(x, size[0]),
                    clamp(y, size[1]),
                    clamp(z, size[2]),
                );
                Some((self.center(), index))
            }
        }
    }

    /// Material at a local coordinate.
    pub fn get_material(&self, x: i32, y: i32, z: i32) -> MaterialId {
        self.locate(x, y, z)
            .map_or(MaterialId::EMPTY, |(b, i)| b.material_at(i))
    }

    /// Density at a local coordinate; missing neighbours under the empty
    /// policy read as `-1.0`.
    pub fn get_density(&self, x: i32, y: i32, z: i32) -> f32 {
        self.locate(x, y, z).map_or(-1.0, |(b, i)| b.density_at(i))
    }

    /// Baked light at a local coordinate; missing neighbours read as full
    /// light.
    pub fn get_light(&self, x: i32, y: i32, z: i32) -> LightColor {
        self.locate(x, y, z)
            .map_or(LightColor::WHITE, |(b, i)| b.light_at(i))
    }

    /// Liquid fill level at a local coordinate.
    pub fn get_liquid_level(&self, x: i32, y: i32, z: i32) -> u8 {
        match self.locate(x, y, z) {
            Some((b, i)) => {
                let (lx, ly, lz) = self.dims.delinearize(i);
                b.liquid_level(lx, ly, lz)
            }
            None => u8::MAX,
        }
    }

    /// Combined baked and random occlusion at a local coordinate.
    pub fn get_ao(&self, x: i32, y: i32, z: i32) -> u8 {
        match self.locate(x, y, z) {
            Some((b, i)) => {
                let (lx, ly, lz) = self.dims.delinearize(i);
                b.total_ao(lx, ly, lz)
            }
            None => 0,
        }
    }
}
