//! Face culling: decides which voxel faces need geometry.

use terra_library::MaterialLibrary;
use terra_voxel::{FaceDirection, MaterialId, VoxelCategory};

use crate::neighborhood::ChunkNeighborhood;

/// Returns `true` if a face between the current voxel and its neighbour is
/// visible from the current voxel's side.
///
/// - Solid faces show against empty space and liquid, and against a
///   different transparent material. Two voxels of the same material hide
///   their shared face.
/// - Liquid faces show against empty space only.
pub fn face_visible(
    self_cat: VoxelCategory,
    self_mat: MaterialId,
    neighbor_cat: VoxelCategory,
    neighbor_mat: MaterialId,
    neighbor_transparent: bool,
) -> bool {
    match (self_cat, neighbor_cat) {
        (VoxelCategory::Empty, _) => false,
        (_, VoxelCategory::Empty) => true,
        (VoxelCategory::Solid, VoxelCategory::Liquid) => true,
        (VoxelCategory::Solid, VoxelCategory::Solid) => {
            neighbor_transparent && neighbor_mat != self_mat
        }
        (VoxelCategory::Liquid, _) => false,
    }
}

/// Visibility of the face of voxel `(x, y, z)` pointing along `dir`.
pub fn is_face_exposed(
    neighborhood: &ChunkNeighborhood,
    library: &MaterialLibrary,
    (x, y, z): (i32, i32, i32),
    dir: FaceDirection,
) -> bool {
    let mat = neighborhood.get_material(x, y, z);
    let (nx, ny, nz) = dir.offset(x, y, z);
    let neighbor = neighborhood.get_material(nx, ny, nz);
    face_visible(
        culling_category(library, mat),
        mat,
        library.category(neighbor),
        neighbor,
        library.is_transparent(neighbor),
    )
}

/// Category of the voxel itself during culling. Unregistered non-empty ids
/// cull like opaque solids; meshers count their faces as skipped.
pub fn culling_category(library: &MaterialLibrary, mat: MaterialId) -> VoxelCategory {
    match library.material(mat) {
        Some(def) => def.category(),
        None if mat.is_empty() => VoxelCategory::Empty,
        None => VoxelCategory::Solid,
    }
}

/// Returns `true` if a voxel blocks light for occlusion purposes.
pub fn is_occluder(library: &MaterialLibrary, mat: MaterialId) -> bool {
    library.category(mat) == VoxelCategory::Solid && !library.is_transparent(mat)
}

/// Counts visible faces in the centre chunk for voxels of `category`.
pub fn count_visible_faces(
    neighborhood: &ChunkNeighborhood,
    library: &MaterialLibrary,
    category: VoxelCategory,
) -> u32 {
    let dims = neighborhood.dims();
    let mut count = 0;
    for z in 0..dims.z as i32 {
        for y in 0..dims.y as i32 {
            for x in 0..dims.x as i32 {
                if culling_category(library, neighborhood.get_material(x, y, z)) != category {
                    continue;
                }
                for dir in FaceDirection::ALL {
                    if is_face_exposed(neighborhood, library, (x, y, z), dir) {
                        count += 1;
                    }
                }
            }
        }
    }
    count
}
