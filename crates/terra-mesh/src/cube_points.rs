//! Corner points of a single voxel cube, used by the cubic meshers.
//!
//! Point index bits are `x | y << 1 | z << 2`, so `P101` is the corner at
//! `(1, 0, 1)`.

use glam::Vec3;
use terra_library::MaterialLibrary;
use terra_voxel::FaceDirection;

use crate::ambient_occlusion::compute_face_ao;
use crate::neighborhood::ChunkNeighborhood;
use crate::visibility::is_face_exposed;

pub const P000: usize = 0;
pub const P100: usize = 1;
pub const P010: usize = 2;
pub const P110: usize = 3;
pub const P001: usize = 4;
pub const P101: usize = 5;
pub const P011: usize = 6;
pub const P111: usize = 7;

/// Unit offset of a corner point.
pub fn corner_offset(point: usize) -> Vec3 {
    Vec3::new(
        (point & 1) as f32,
        ((point >> 1) & 1) as f32,
        ((point >> 2) & 1) as f32,
    )
}

/// The eight corners of one voxel with face visibility and occlusion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CubePoints {
    points: [Vec3; 8],
    visible: [bool; 6],
    face_ao: [[u8; 4]; 6],
}

impl Default for CubePoints {
    fn default() -> Self {
        Self {
            points: std::array::from_fn(corner_offset),
            visible: [false; 6],
            face_ao: [[0; 4]; 6],
        }
    }
}

impl CubePoints {
    /// Computes corners for voxel `(x, y, z)`.
    ///
    /// With `smooth`, each corner is pulled toward the cube centre by how far
    /// the density averaged over the eight voxels sharing it lies below
    /// `isolevel`, up to half the cube. Buried corners stay in place while
    /// exposed corners of outcrops round off.
    pub fn setup(
        neighborhood: &ChunkNeighborhood,
        library: &MaterialLibrary,
        (x, y, z): (i32, i32, i32),
        smooth: bool,
        isolevel: f32,
    ) -> Self {
        let mut cube = Self::default();

        if smooth {
            let center = Vec3::splat(0.5);
            for (point, position) in cube.points.iter_mut().enumerate() {
                let (bx, by, bz) = (
                    (point & 1) as i32,
                    ((point >> 1) & 1) as i32,
                    ((point >> 2) & 1) as i32,
                );
                let mut sum = 0.0;
                for dz in 0..2 {
                    for dy in 0..2 {
                        for dx in 0..2 {
                            sum += neighborhood.get_density(
                                x + bx - 1 + dx,
                                y + by - 1 + dy,
                                z + bz - 1 + dz,
                            );
                        }
                    }
                }
                let density = sum / 8.0;
                let t = ((isolevel - density) * 0.5).clamp(0.0, 0.5);
                *position = position.lerp(center, t);
            }
        }

        for dir in FaceDirection::ALL {
            let exposed = is_face_exposed(neighborhood, library, (x, y, z), dir);
            cube.visible[dir.index()] = exposed;
            if exposed {
                cube.face_ao[dir.index()] = compute_face_ao(neighborhood, library, (x, y, z), dir);
            }
        }
        cube
    }

    /// Corner position relative to the voxel's minimum corner.
    pub fn point(&self, index: usize) -> Vec3 {
        self.points[index]
    }

    /// All corner positions.
    pub fn points(&self) -> &[Vec3; 8] {
        &self.points
    }

    /// Returns `true` if the face needs geometry.
    pub fn is_face_visible(&self, face: FaceDirection) -> bool {
        self.visible[face.index()]
    }

    /// Vertex occlusion of a visible face, in [`Self::face_points`] order.
    pub fn face_ao(&self, face: FaceDirection) -> [u8; 4] {
        self.face_ao[face.index()]
    }

    /// Point indices of a face in the order `(u, v)`, `(u+1, v)`,
    /// `(u+1, v+1)`, `(u, v+1)` along the face's sweep axes.
    pub fn face_points(face: FaceDirection) -> [usize; 4] {
        let (layer_axis, u_axis, v_axis) = face.sweep_axes();
        [(0, 0), (1, 0), (1, 1), (0, 1)].map(|(cu, cv)| {
            let mut bits = [0usize; 3];
            bits[layer_axis] = usize::from(face.is_positive());
            bits[u_axis] = cu;
            bits[v_axis] = cv;
            bits[0] | bits[1] << 1 | bits[2] << 2
        })
    }

    /// Unit texture directions `(u, v)` of a face.
    pub fn face_uv_direction(face: FaceDirection) -> (Vec3, Vec3) {
        let (_, u_axis, v_axis) = face.sweep_axes();
        let unit = |axis: usize| {
            let mut v = Vec3::ZERO;
            v[axis] = 1.0;
            v
        };
        (unit(u_axis), unit(v_axis))
    }
}
