//! Voxel data model: chunk coordinates, directions, material ids and the
//! channelled per-chunk [`VoxelBuffer`].

pub mod buffer;
pub mod coords;
pub mod direction;
pub mod error;
pub mod serial;
pub mod voxel;

pub use buffer::{Channel, ChannelKind, VoxelBuffer, occupancy_density};
pub use coords::{ChunkCoord, ChunkDims, WorldBounds, chunk_origin, world_to_chunk};
pub use direction::{CornerDirection, EdgeDirection, FaceDirection};
pub use error::VoxelError;
pub use voxel::{LightColor, MaterialId, VoxelCategory};
