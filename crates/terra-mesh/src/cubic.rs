//! Cube meshers built on [`CubePoints`]: the plain `Default` mesher and the
//! density-smoothed `Cubic` mesher. Both emit one quad per visible face with
//! baked vertex colours; neither merges faces. The smoothed mesher leaves
//! normals to the surface tool.

use glam::Vec3;
use terra_voxel::{FaceDirection, VoxelCategory};

use crate::ambient_occlusion::should_flip_ao_diagonal;
use crate::cube_points::CubePoints;
use crate::mesh_data::MeshVertex;
use crate::mesher::{MeshInput, bake_color};
use crate::surface_tool::SurfaceTool;
use crate::visibility::culling_category;

const FACE_UVS: [[f32; 2]; 4] = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

pub(crate) fn mesh(input: &MeshInput<'_>, tool: &mut SurfaceTool, smooth: bool) {
    let n = input.neighborhood;
    let library = input.library;
    let dims = n.dims();

    for z in 0..dims.z as i32 {
        for y in 0..dims.y as i32 {
            for x in 0..dims.x as i32 {
                let mat = n.get_material(x, y, z);
                if culling_category(library, mat) != VoxelCategory::Solid {
                    continue;
                }
                let cube = CubePoints::setup(n, library, (x, y, z), smooth, input.isolevel);
                let Ok(surface) = library.get_surface_for_material(mat) else {
                    for dir in FaceDirection::ALL {
                        if cube.is_face_visible(dir) {
                            tool.skip_face();
                        }
                    }
                    continue;
                };
                let tint = library.material(mat).map_or([1.0; 4], |def| def.color);
                let origin = Vec3::new(x as f32, y as f32, z as f32);

                for dir in FaceDirection::ALL {
                    if !cube.is_face_visible(dir) {
                        continue;
                    }
                    tool.record_faces(1);

                    let (nx, ny, nz) = dir.offset(x, y, z);
                    let light = n.get_light(nx, ny, nz);
                    let voxel_ao = if input.flags.use_ao { n.get_ao(x, y, z) } else { 0 };
                    let ao = if input.flags.use_ao {
                        cube.face_ao(dir)
                    } else {
                        [0; 4]
                    };
                    let points = CubePoints::face_points(dir).map(|p| origin + cube.point(p));
                    let face_normal = Vec3::from(dir.normal());
                    // Smoothed faces are bent; their normals come from the
                    // committed triangles.
                    let normal = if smooth { Vec3::ZERO } else { face_normal };

                    let corners: [MeshVertex; 4] = std::array::from_fn(|i| MeshVertex {
                        position: (points[i] * input.voxel_scale).to_array(),
                        normal: normal.to_array(),
                        uv: surface.map_uv(dir, FACE_UVS[i], 1.0, 1.0),
                        color: bake_color(tint, light, ao[i], voxel_ao, &input.flags),
                        material: mat.0 as u32,
                        layer: surface.layer(dir),
                    });
                    tool.add_quad(&surface, corners, face_normal, should_flip_ao_diagonal(ao));
                }
            }
        }
    }
}
