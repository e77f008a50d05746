//! Deterministic surface decorations.
//!
//! Every chunk draws from its own RNG derived from the world seed and the
//! chunk coordinate, so prop placement is identical across runs and
//! independent of which worker thread generated the chunk.

use rand::Rng;
use serde::{Deserialize, Serialize};
use terra_library::MaterialLibrary;
use terra_voxel::{ChunkCoord, MaterialId, VoxelBuffer, VoxelCategory, chunk_origin};

use crate::seed::chunk_rng;

/// RNG stream used for prop placement.
const PROP_STREAM: u64 = 1;

/// Prop placement settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropConfig {
    /// Run the prop job after meshing.
    pub enabled: bool,
    /// Chance that an exposed surface column receives a prop.
    pub density: f32,
    /// Number of prop variants to choose from.
    pub variants: u32,
}

impl Default for PropConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            density: 0.05,
            variants: 4,
        }
    }
}

/// One placed decoration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropInstance {
    /// World voxel the prop occupies, directly above its surface voxel.
    pub position: [i64; 3],
    /// Variant index in `0..variants`.
    pub variant: u32,
    /// Yaw in radians.
    pub rotation: f32,
    /// Material of the voxel the prop stands on.
    pub surface_material: MaterialId,
}

/// Places props on the exposed solid tops of `buffer`.
///
/// A column qualifies when its highest solid voxel has an empty voxel above
/// it inside the chunk. Columns are visited in a fixed order and each one
/// consumes the same number of random draws, so results depend only on the
/// seed, the coordinate and the voxel data.
pub fn place_props(
    buffer: &VoxelBuffer,
    library: &MaterialLibrary,
    coord: ChunkCoord,
    world_seed: u64,
    config: &PropConfig,
) -> Vec<PropInstance> {
    let dims = buffer.dims();
    let origin = chunk_origin(coord, dims);
    let mut rng = chunk_rng(world_seed, coord, PROP_STREAM);
    let variants = config.variants.max(1);
    let mut props = Vec::new();

    for z in 0..dims.z {
        for x in 0..dims.x {
            let roll: f32 = rng.random();
            let variant = rng.random_range(0..variants);
            let rotation = rng.random_range(0.0..std::f32::consts::TAU);

            let Some(top) = surface_height(buffer, library, x, z) else {
                continue;
            };
            if roll >= config.density {
                continue;
            }
            props.push(PropInstance {
                position: [
                    origin.0 + x as i64,
                    origin.1 + top as i64 + 1,
                    origin.2 + z as i64,
                ],
                variant,
                rotation,
                surface_material: buffer.material(x, top, z),
            });
        }
    }
    props
}

/// Highest solid voxel of a column that has empty space above it.
fn surface_height(buffer: &VoxelBuffer, library: &MaterialLibrary, x: usize, z: usize) -> Option<usize> {
    let dims = buffer.dims();
    (0..dims.y - 1).rev().find(|&y| {
        library.category(buffer.material(x, y, z)) == VoxelCategory::Solid
            && buffer.material(x, y + 1, z).is_empty()
    })
}
