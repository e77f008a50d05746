//! Per-vertex voxel ambient occlusion.
//!
//! Each face vertex checks the two side voxels and the diagonal corner
//! voxel in front of the face and maps them to an occlusion level 0–3.

use terra_library::MaterialLibrary;
use terra_voxel::FaceDirection;

use crate::neighborhood::ChunkNeighborhood;
use crate::visibility::is_occluder;

/// Neighbour offsets for one vertex's occlusion sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAoOffsets {
    /// First side neighbour.
    pub side1: (i32, i32, i32),
    /// Second side neighbour.
    pub side2: (i32, i32, i32),
    /// Diagonal corner neighbour.
    pub corner: (i32, i32, i32),
}

/// Occlusion level of one vertex: 0 = exposed, 3 = fully occluded.
pub fn vertex_ao(side1: bool, side2: bool, corner: bool) -> u8 {
    if side1 && side2 {
        3
    } else {
        side1 as u8 + side2 as u8 + corner as u8
    }
}

/// `true` if the quad should be split along the other diagonal so that
/// occlusion interpolates without a visible crease.
pub fn should_flip_ao_diagonal(ao: [u8; 4]) -> bool {
    ao[0] + ao[2] > ao[1] + ao[3]
}

/// Offsets for the four vertices of a face, in the quad corner order
/// `(u, v)`, `(u+1, v)`, `(u+1, v+1)`, `(u, v+1)`.
pub fn face_ao_offsets(direction: FaceDirection) -> [VertexAoOffsets; 4] {
    let (_, u_axis, v_axis) = direction.sweep_axes();
    let (nx, ny, nz) = direction.delta();
    let normal = [nx, ny, nz];
    let step = |base: [i32; 3], axis: usize, s: i32| {
        let mut out = base;
        out[axis] += s;
        out
    };
    let tuple = |a: [i32; 3]| (a[0], a[1], a[2]);

    [(-1, -1), (1, -1), (1, 1), (-1, 1)].map(|(su, sv)| {
        let side1 = step(normal, u_axis, su);
        let side2 = step(normal, v_axis, sv);
        let corner = step(side1, v_axis, sv);
        VertexAoOffsets {
            side1: tuple(side1),
            side2: tuple(side2),
            corner: tuple(corner),
        }
    })
}

/// Occlusion levels of the four vertices of the face of `(x, y, z)`
/// pointing along `direction`.
pub fn compute_face_ao(
    neighborhood: &ChunkNeighborhood,
    library: &MaterialLibrary,
    (x, y, z): (i32, i32, i32),
    direction: FaceDirection,
) -> [u8; 4] {
    let solid = |(dx, dy, dz): (i32, i32, i32)| {
        is_occluder(library, neighborhood.get_material(x + dx, y + dy, z + dz))
    };
    face_ao_offsets(direction).map(|o| vertex_ao(solid(o.side1), solid(o.side2), solid(o.corner)))
}
