//! Chunk-grid coordinates, world bounds and chunk dimensions.
//!
//! Chunks are identified by an integer coordinate on the chunk grid. Voxels
//! inside a chunk are addressed by local `(x, y, z)` with x varying fastest
//! in linear storage.

use serde::{Deserialize, Serialize};

use crate::direction::FaceDirection;
use crate::error::VoxelError;

/// Identifies a chunk's position on the chunk grid.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ChunkCoord {
    /// Chunk-grid X coordinate.
    pub x: i32,
    /// Chunk-grid Y coordinate.
    pub y: i32,
    /// Chunk-grid Z coordinate.
    pub z: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the coordinate offset by `(dx, dy, dz)`.
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    /// Returns the face-adjacent neighbor in `direction`.
    pub fn neighbor(self, direction: FaceDirection) -> Self {
        let (dx, dy, dz) = direction.delta();
        self.offset(dx, dy, dz)
    }

    /// The six face-adjacent neighbors, in [`FaceDirection::ALL`] order.
    pub fn face_neighbors(self) -> [ChunkCoord; 6] {
        FaceDirection::ALL.map(|dir| self.neighbor(dir))
    }

    /// Squared Euclidean distance on the chunk grid.
    pub fn distance_sq(self, other: ChunkCoord) -> u64 {
        let dx = (self.x as i64 - other.x as i64).unsigned_abs();
        let dy = (self.y as i64 - other.y as i64).unsigned_abs();
        let dz = (self.z as i64 - other.z as i64).unsigned_abs();
        dx * dx + dy * dy + dz * dz
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Inclusive box of chunk coordinates the world is allowed to populate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldBounds {
    /// Minimum chunk coordinate (inclusive).
    pub min: ChunkCoord,
    /// Maximum chunk coordinate (inclusive).
    pub max: ChunkCoord,
}

impl WorldBounds {
    /// Creates bounds from two inclusive corners.
    pub fn new(min: ChunkCoord, max: ChunkCoord) -> Self {
        Self { min, max }
    }

    /// Bounds covering every representable coordinate.
    pub fn unbounded() -> Self {
        Self {
            min: ChunkCoord::new(i32::MIN, i32::MIN, i32::MIN),
            max: ChunkCoord::new(i32::MAX, i32::MAX, i32::MAX),
        }
    }

    /// Returns `true` if `coord` lies inside the bounds.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        (self.min.x..=self.max.x).contains(&coord.x)
            && (self.min.y..=self.max.y).contains(&coord.y)
            && (self.min.z..=self.max.z).contains(&coord.z)
    }
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self::unbounded()
    }
}

/// Voxel dimensions of every chunk in a world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkDims {
    /// Voxels along X.
    pub x: usize,
    /// Voxels along Y.
    pub y: usize,
    /// Voxels along Z.
    pub z: usize,
}

impl ChunkDims {
    /// Creates validated dimensions. Every axis needs at least two voxels so
    /// that isosurface cells exist.
    pub fn new(x: usize, y: usize, z: usize) -> Result<Self, VoxelError> {
        if x < 2 || y < 2 || z < 2 {
            return Err(VoxelError::InvalidDimensions(x, y, z));
        }
        Ok(Self { x, y, z })
    }

    /// Cubic dimensions `n × n × n`. `n` is clamped to at least 2.
    pub const fn cubic(n: usize) -> Self {
        let n = if n < 2 { 2 } else { n };
        Self { x: n, y: n, z: n }
    }

    /// Dimensions as an array indexed by axis.
    pub fn as_array(&self) -> [usize; 3] {
        [self.x, self.y, self.z]
    }

    /// Total number of voxels.
    pub fn volume(&self) -> usize {
        self.x * self.y * self.z
    }

    /// Returns `true` if the local coordinate is inside the chunk.
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.x
            && (y as usize) < self.y
            && (z as usize) < self.z
    }

    /// Linear index of a local coordinate (x fastest, then y, then z).
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.x + z * self.x * self.y
    }

    /// Inverse of [`Self::index`].
    pub fn delinearize(&self, index: usize) -> (usize, usize, usize) {
        let x = index % self.x;
        let y = (index / self.x) % self.y;
        let z = index / (self.x * self.y);
        (x, y, z)
    }
}

impl Default for ChunkDims {
    fn default() -> Self {
        Self::cubic(16)
    }
}

/// Splits a world voxel position into its chunk coordinate and local offset.
///
/// Uses floor division so negative positions map into the chunk below.
pub fn world_to_chunk(world: (i64, i64, i64), dims: ChunkDims) -> (ChunkCoord, (usize, usize, usize)) {
    let split = |value: i64, size: usize| {
        let size = size as i64;
        (value.div_euclid(size) as i32, value.rem_euclid(size) as usize)
    };
    let (cx, lx) = split(world.0, dims.x);
    let (cy, ly) = split(world.1, dims.y);
    let (cz, lz) = split(world.2, dims.z);
    (ChunkCoord::new(cx, cy, cz), (lx, ly, lz))
}

/// World voxel position of a chunk's `(0, 0, 0)` voxel.
pub fn chunk_origin(coord: ChunkCoord, dims: ChunkDims) -> (i64, i64, i64) {
    (
        coord.x as i64 * dims.x as i64,
        coord.y as i64 * dims.y as i64,
        coord.z as i64 * dims.z as i64,
    )
}
