//! Render surfaces and the per-material handles meshers resolve.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use terra_voxel::{FaceDirection, MaterialId};

use crate::atlas::{TextureArray, TextureAtlas, UvRect};

/// How a library groups materials into surfaces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LibraryKind {
    /// One surface per material.
    #[default]
    Simple,
    /// One atlased surface per render group.
    Merger,
    /// One surface per render group backed by a texture array; vertices
    /// carry the array layer.
    MergerPcm,
}

/// Texture storage of a surface.
#[derive(Clone, Debug)]
pub enum SurfaceTexture {
    /// Grid atlas; UVs are remapped into tile rectangles.
    Atlas(TextureAtlas),
    /// Texture array; UVs stay in tile space and repeat.
    Array(TextureArray),
}

/// One draw-call group.
#[derive(Clone, Debug)]
pub struct Surface {
    /// Position in [`MaterialLibrary::surfaces`](crate::MaterialLibrary::surfaces).
    pub index: usize,
    /// Group name (material name for simple libraries).
    pub name: String,
    /// Materials rendered by this surface, ascending.
    pub materials: Vec<MaterialId>,
    /// Any member is transparent.
    pub transparent: bool,
    /// Any member is liquid.
    pub liquid: bool,
    /// Packed textures.
    pub texture: SurfaceTexture,
}

impl Surface {
    /// Atlas image, for atlased surfaces.
    pub fn atlas_image(&self) -> Option<&RgbaImage> {
        match &self.texture {
            SurfaceTexture::Atlas(atlas) => Some(atlas.image()),
            SurfaceTexture::Array(_) => None,
        }
    }

    /// Array layers, for texture-array surfaces.
    pub fn texture_layers(&self) -> Option<&[RgbaImage]> {
        match &self.texture {
            SurfaceTexture::Array(array) => Some(&array.layers),
            SurfaceTexture::Atlas(_) => None,
        }
    }
}

/// Texture placement of one material face.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceMapping {
    /// Atlas rectangle ([`UvRect::FULL`] for arrays).
    pub rect: UvRect,
    /// Array layer (0 for atlases).
    pub layer: u32,
}

/// Resolved surface handle for one material.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceRef {
    /// Surface index.
    pub surface: usize,
    /// Material this handle was resolved for.
    pub material: MaterialId,
    pub(crate) faces: [FaceMapping; 6],
    pub(crate) repeats_uv: bool,
}

impl SurfaceRef {
    /// Atlas rectangle for `face`.
    pub fn uv_rect(&self, face: FaceDirection) -> UvRect {
        self.faces[face.index()].rect
    }

    /// Texture array layer for `face`.
    pub fn layer(&self, face: FaceDirection) -> u32 {
        self.faces[face.index()].layer
    }

    /// `true` when UVs outside `[0, 1]` tile correctly, which is what makes
    /// merged quads spanning several voxels safe.
    pub fn repeats_uv(&self) -> bool {
        self.repeats_uv
    }

    /// Maps a face-local UV spanning `w × h` voxels to the final UV.
    pub fn map_uv(&self, face: FaceDirection, uv: [f32; 2], w: f32, h: f32) -> [f32; 2] {
        if self.repeats_uv {
            uv
        } else {
            self.uv_rect(face).transform_uv_scaled(uv, w, h)
        }
    }
}
