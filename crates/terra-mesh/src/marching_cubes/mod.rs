//! Marching cubes isosurface extraction.
//!
//! Density is sampled at voxel centres. Cells span the samples of voxels
//! `i` and `i + 1` on every axis, so the cells of one chunk start at its
//! first voxel centre and end at the first voxel centre of the next chunk;
//! neighbouring chunks tile without gaps or overlap. Cells that reach past
//! the chunk read neighbour densities through the [`ChunkNeighborhood`].
//!
//! [`ChunkNeighborhood`]: crate::neighborhood::ChunkNeighborhood

pub mod tables;

use glam::Vec3;
use terra_library::SurfaceRef;
use terra_voxel::{FaceDirection, MaterialId};

use crate::mesh_data::MeshVertex;
use crate::mesher::{MeshInput, bake_color};
use crate::surface_tool::SurfaceTool;

pub use tables::{case_triangles, edge_corners, edge_mask};

/// A surface vertex on a cell edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeVertex {
    /// Cell edge, 0–11.
    pub edge: u8,
    /// Interpolation factor from the edge's first corner to its second.
    pub t: f32,
    /// Interpolated position.
    pub position: Vec3,
}

/// Case index of a cell: bit `c` set when corner `c` is above `isolevel`.
pub fn cell_case(densities: &[f32; 8], isolevel: f32) -> u8 {
    densities
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d > isolevel)
        .fold(0u8, |case, (c, _)| case | 1 << c)
}

/// Triangulates one cell. Vertices are placed on each crossed edge where
/// the linearly interpolated density equals `isolevel`.
pub fn polygonise_cell(
    densities: &[f32; 8],
    positions: &[Vec3; 8],
    isolevel: f32,
) -> Vec<[EdgeVertex; 3]> {
    let case = cell_case(densities, isolevel);
    case_triangles(case)
        .iter()
        .map(|tri| {
            tri.map(|edge| {
                let (a, b) = edge_corners(edge);
                let (da, db) = (densities[a as usize], densities[b as usize]);
                let t = ((isolevel - da) / (db - da)).clamp(0.0, 1.0);
                EdgeVertex {
                    edge,
                    t,
                    position: positions[a as usize].lerp(positions[b as usize], t),
                }
            })
        })
        .collect()
}

fn corner_offset(c: usize) -> (i32, i32, i32) {
    ((c & 1) as i32, ((c >> 1) & 1) as i32, ((c >> 2) & 1) as i32)
}

/// Face direction closest to `normal`.
fn dominant_face(normal: Vec3) -> FaceDirection {
    let abs = normal.abs();
    let axis = if abs.x >= abs.y && abs.x >= abs.z {
        0
    } else if abs.y >= abs.z {
        1
    } else {
        2
    };
    let positive = normal[axis] >= 0.0;
    FaceDirection::ALL
        .into_iter()
        .find(|f| f.axis() == axis && f.is_positive() == positive)
        .unwrap_or(FaceDirection::PosY)
}

/// Planar texture coordinates of `p` projected along `face`'s axis.
fn planar_uv(face: FaceDirection, p: Vec3) -> [f32; 2] {
    let (_, u_axis, v_axis) = face.sweep_axes();
    [p[u_axis], p[v_axis]]
}

/// Samples covering voxel coordinates `-1..=size + 1` on each axis, enough
/// for cell corners and central differences.
struct SampleGrid {
    extent: [usize; 3],
    density: Vec<f32>,
}

impl SampleGrid {
    fn index(&self, x: i32, y: i32, z: i32) -> usize {
        (x + 1) as usize
            + (y + 1) as usize * self.extent[0]
            + (z + 1) as usize * self.extent[0] * self.extent[1]
    }

    fn density(&self, x: i32, y: i32, z: i32) -> f32 {
        self.density[self.index(x, y, z)]
    }

    /// Surface normal at a sample: the negated density gradient.
    fn normal(&self, x: i32, y: i32, z: i32) -> Vec3 {
        let gradient = Vec3::new(
            self.density(x + 1, y, z) - self.density(x - 1, y, z),
            self.density(x, y + 1, z) - self.density(x, y - 1, z),
            self.density(x, y, z + 1) - self.density(x, y, z - 1),
        ) * 0.5;
        -gradient
    }
}

pub(crate) fn mesh(input: &MeshInput<'_>, tool: &mut SurfaceTool) {
    let n = input.neighborhood;
    let library = input.library;
    let [sx, sy, sz] = n.dims().as_array().map(|v| v as i32);

    let extent = [sx as usize + 3, sy as usize + 3, sz as usize + 3];
    let mut grid = SampleGrid {
        extent,
        density: vec![0.0; extent[0] * extent[1] * extent[2]],
    };
    for z in -1..=sz + 1 {
        for y in -1..=sy + 1 {
            for x in -1..=sx + 1 {
                let index = grid.index(x, y, z);
                grid.density[index] = n.get_density(x, y, z);
            }
        }
    }

    let iso = input.isolevel;
    for cz in 0..sz {
        for cy in 0..sy {
            for cx in 0..sx {
                let corners: [(i32, i32, i32); 8] = std::array::from_fn(|c| {
                    let (dx, dy, dz) = corner_offset(c);
                    (cx + dx, cy + dy, cz + dz)
                });
                let densities = corners.map(|(x, y, z)| grid.density(x, y, z));
                if densities.iter().any(|d| !d.is_finite()) {
                    tool.invalid_cell();
                    continue;
                }
                let case = cell_case(&densities, iso);
                if case == 0 || case == u8::MAX {
                    continue;
                }

                // Lowest solid corner that carries a material.
                let material = (0..8)
                    .filter(|&c| densities[c] > iso)
                    .map(|c| {
                        let (x, y, z) = corners[c];
                        n.get_material(x, y, z)
                    })
                    .find(|m| !m.is_empty());
                let Some(material) = material else {
                    tool.invalid_cell();
                    continue;
                };
                let Ok(surface) = library.get_surface_for_material(material) else {
                    tool.skip_face();
                    continue;
                };
                emit_cell(input, tool, &grid, &surface, material, corners, &densities);
            }
        }
    }
}

fn emit_cell(
    input: &MeshInput<'_>,
    tool: &mut SurfaceTool,
    grid: &SampleGrid,
    surface: &SurfaceRef,
    material: MaterialId,
    corners: [(i32, i32, i32); 8],
    densities: &[f32; 8],
) {
    let n = input.neighborhood;
    let iso = input.isolevel;
    let positions =
        corners.map(|(x, y, z)| Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5));
    let cell_min = positions[0];
    let tint = input
        .library
        .material(material)
        .map_or([1.0; 4], |def| def.color);

    for tri in polygonise_cell(densities, &positions, iso) {
        let [p0, p1, p2] = tri.map(|v| v.position);
        let geometric = (p1 - p0).cross(p2 - p0).try_normalize().unwrap_or(Vec3::Y);
        let face = dominant_face(geometric);

        let vertices = tri.map(|v| {
            let (a, b) = edge_corners(v.edge);
            let (a, b) = (a as usize, b as usize);
            let (ca, cb) = (corners[a], corners[b]);
            let normal = grid
                .normal(ca.0, ca.1, ca.2)
                .lerp(grid.normal(cb.0, cb.1, cb.2), v.t)
                .try_normalize()
                .unwrap_or(geometric);

            let (ex, ey, ez) = if densities[a] > iso { cb } else { ca };
            let light = n.get_light(ex, ey, ez);

            let uv = if surface.repeats_uv() {
                planar_uv(face, v.position)
            } else {
                surface.map_uv(face, planar_uv(face, v.position - cell_min), 1.0, 1.0)
            };

            MeshVertex {
                position: (v.position * input.voxel_scale).to_array(),
                normal: normal.to_array(),
                uv,
                color: bake_color(tint, light, 0, 0, &input.flags),
                material: material.0 as u32,
                layer: surface.layer(face),
            }
        });
        tool.add_triangle(surface, vertices);
    }
}
