//! Blocky meshing: one quad per visible voxel face.
//!
//! The solid pass optionally greedy-merges faces whose material, light and
//! occlusion all match. Merging is only used for surfaces whose textures
//! repeat across a quad; atlased surfaces get unit quads. The liquid pass
//! never merges and lowers the top of each liquid column to its fill level.

use glam::Vec3;
use terra_library::SurfaceRef;
use terra_voxel::{FaceDirection, LightColor, MaterialId, VoxelCategory};

use crate::ambient_occlusion::{compute_face_ao, should_flip_ao_diagonal};
use crate::greedy::{FaceQuad, axes_to_xyz, greedy_merge};
use crate::mesh_data::MeshVertex;
use crate::mesher::{MeshInput, bake_color};
use crate::surface_tool::SurfaceTool;
use crate::visibility::{culling_category, face_visible};

/// Per-face shading attributes; faces merge only when these are equal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceAttrs {
    /// Voxel material.
    pub material: MaterialId,
    /// Vertex occlusion levels, 0–3 each.
    pub ao: [u8; 4],
    /// Light of the voxel in front of the face.
    pub light: LightColor,
    /// Baked per-voxel occlusion.
    pub voxel_ao: u8,
}

impl FaceAttrs {
    /// Packs into a merge key: material (16 bits), vertex AO (4 × 2 bits),
    /// light (24 bits), voxel AO (8 bits).
    pub fn pack(&self) -> u64 {
        let ao = self
            .ao
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, &a)| acc | (((a & 3) as u64) << (2 * i)));
        let [r, g, b] = self.light.0;
        self.material.0 as u64
            | ao << 16
            | (r as u64) << 24
            | (g as u64) << 32
            | (b as u64) << 40
            | (self.voxel_ao as u64) << 48
    }

    /// Inverse of [`Self::pack`].
    pub fn unpack(key: u64) -> Self {
        let ao_bits = (key >> 16) & 0xFF;
        Self {
            material: MaterialId((key & 0xFFFF) as u16),
            ao: [0, 1, 2, 3].map(|i| ((ao_bits >> (2 * i)) & 3) as u8),
            light: LightColor([
                ((key >> 24) & 0xFF) as u8,
                ((key >> 32) & 0xFF) as u8,
                ((key >> 40) & 0xFF) as u8,
            ]),
            voxel_ao: ((key >> 48) & 0xFF) as u8,
        }
    }
}

/// Solid pass.
pub(crate) fn mesh_solid(input: &MeshInput<'_>, tool: &mut SurfaceTool) {
    mesh_category(input, tool, VoxelCategory::Solid);
}

/// Liquid pass.
pub(crate) fn mesh_liquid(input: &MeshInput<'_>, tool: &mut SurfaceTool) {
    mesh_category(input, tool, VoxelCategory::Liquid);
}

fn mesh_category(input: &MeshInput<'_>, tool: &mut SurfaceTool, target: VoxelCategory) {
    let n = input.neighborhood;
    let library = input.library;
    let dims = n.dims();
    let mut mergeable: Vec<FaceQuad> = Vec::new();

    for z in 0..dims.z as i32 {
        for y in 0..dims.y as i32 {
            for x in 0..dims.x as i32 {
                let mat = n.get_material(x, y, z);
                let category = culling_category(library, mat);
                if category != target {
                    continue;
                }
                let surface = library.get_surface_for_material(mat).ok();

                for dir in FaceDirection::ALL {
                    let (nx, ny, nz) = dir.offset(x, y, z);
                    let neighbor = n.get_material(nx, ny, nz);
                    let visible = face_visible(
                        category,
                        mat,
                        library.category(neighbor),
                        neighbor,
                        library.is_transparent(neighbor),
                    );
                    if !visible {
                        continue;
                    }
                    let Some(surface) = surface else {
                        tool.skip_face();
                        continue;
                    };
                    tool.record_faces(1);

                    let attrs = FaceAttrs {
                        material: mat,
                        ao: if input.flags.use_ao {
                            compute_face_ao(n, library, (x, y, z), dir)
                        } else {
                            [0; 4]
                        },
                        light: if input.flags.use_lighting {
                            n.get_light(nx, ny, nz)
                        } else {
                            LightColor::WHITE
                        },
                        voxel_ao: if input.flags.use_ao {
                            n.get_ao(x, y, z)
                        } else {
                            0
                        },
                    };

                    let (layer_axis, u_axis, v_axis) = dir.sweep_axes();
                    let pos = [x as usize, y as usize, z as usize];
                    let quad = FaceQuad::unit(
                        dir,
                        pos[layer_axis],
                        pos[u_axis],
                        pos[v_axis],
                        attrs.pack(),
                    );

                    if target == VoxelCategory::Liquid {
                        let top = liquid_top(input, (x, y, z), mat);
                        emit_quad(input, tool, &surface, &quad, &attrs, top);
                    } else if input.flags.greedy && surface.repeats_uv() {
                        mergeable.push(quad);
                    } else {
                        emit_quad(input, tool, &surface, &quad, &attrs, None);
                    }
                }
            }
        }
    }

    for quad in greedy_merge(&mergeable) {
        let attrs = FaceAttrs::unpack(quad.key);
        if let Ok(surface) = library.get_surface_for_material(attrs.material) {
            emit_quad(input, tool, &surface, &quad, &attrs, None);
        }
    }
}

/// Height of the liquid surface in voxel units, or `None` when liquid of
/// the same material continues above.
fn liquid_top(input: &MeshInput<'_>, (x, y, z): (i32, i32, i32), mat: MaterialId) -> Option<f32> {
    let n = input.neighborhood;
    if n.get_material(x, y + 1, z) == mat {
        return None;
    }
    Some(y as f32 + n.get_liquid_level(x, y, z) as f32 / 255.0)
}

/// Writes one (possibly merged) face. `top` caps vertex heights in voxel
/// units.
fn emit_quad(
    input: &MeshInput<'_>,
    tool: &mut SurfaceTool,
    surface: &SurfaceRef,
    quad: &FaceQuad,
    attrs: &FaceAttrs,
    top: Option<f32>,
) {
    let dir = quad.direction;
    let (layer_axis, u_axis, v_axis) = dir.sweep_axes();
    let plane = quad.layer + usize::from(dir.is_positive());
    let (w, h) = (quad.w as f32, quad.h as f32);
    let tint = input
        .library
        .material(attrs.material)
        .map_or([1.0; 4], |def| def.color);
    let normal = dir.normal();
    let layer = surface.layer(dir);

    let spans = [(0, 0), (quad.w, 0), (quad.w, quad.h), (0, quad.h)];
    let corners: [MeshVertex; 4] = std::array::from_fn(|i| {
        let (du, dv) = spans[i];
        let (x, y, z) = axes_to_xyz(layer_axis, u_axis, v_axis, plane, quad.u + du, quad.v + dv);
        let mut position = Vec3::new(x as f32, y as f32, z as f32);
        if let Some(top) = top {
            position.y = position.y.min(top);
        }
        let uv = [du as f32, dv as f32];
        MeshVertex {
            position: (position * input.voxel_scale).to_array(),
            normal,
            uv: surface.map_uv(dir, uv, w, h),
            color: bake_color(tint, attrs.light, attrs.ao[i], attrs.voxel_ao, &input.flags),
            material: attrs.material.0 as u32,
            layer,
        }
    });

    tool.add_quad(
        surface,
        corners,
        Vec3::from(normal),
        should_flip_ao_diagonal(attrs.ao),
    );
}
