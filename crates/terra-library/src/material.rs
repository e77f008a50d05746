//! Material definitions and the RON manifest they are loaded from.

use serde::{Deserialize, Serialize};
use terra_voxel::{FaceDirection, MaterialId, VoxelCategory};

// ---------------------------------------------------------------------------
// FaceTextures
// ---------------------------------------------------------------------------

/// Which texture each face of a voxel uses.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceTextures {
    /// All six faces use the same texture.
    Uniform {
        /// Texture name.
        texture: String,
    },
    /// Top, side and bottom are distinct.
    TopSideBottom {
        /// Texture for the +Y face.
        top: String,
        /// Texture for the ±X and ±Z faces.
        side: String,
        /// Texture for the −Y face.
        bottom: String,
    },
    /// Every face has its own texture.
    PerFace {
        /// +X face.
        pos_x: String,
        /// −X face.
        neg_x: String,
        /// +Y face.
        pos_y: String,
        /// −Y face.
        neg_y: String,
        /// +Z face.
        pos_z: String,
        /// −Z face.
        neg_z: String,
    },
}

impl FaceTextures {
    /// Shorthand for [`FaceTextures::Uniform`].
    pub fn uniform(texture: impl Into<String>) -> Self {
        Self::Uniform {
            texture: texture.into(),
        }
    }

    /// Texture name used by `face`.
    pub fn texture_for(&self, face: FaceDirection) -> &str {
        match self {
            Self::Uniform { texture } => texture,
            Self::TopSideBottom { top, side, bottom } => match face {
                FaceDirection::PosY => top,
                FaceDirection::NegY => bottom,
                _ => side,
            },
            Self::PerFace {
                pos_x,
                neg_x,
                pos_y,
                neg_y,
                pos_z,
                neg_z,
            } => match face {
                FaceDirection::PosX => pos_x,
                FaceDirection::NegX => neg_x,
                FaceDirection::PosY => pos_y,
                FaceDirection::NegY => neg_y,
                FaceDirection::PosZ => pos_z,
                FaceDirection::NegZ => neg_z,
            },
        }
    }

    /// Distinct texture names in [`FaceDirection::ALL`] order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::with_capacity(6);
        for face in FaceDirection::ALL {
            let name = self.texture_for(face);
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

// ---------------------------------------------------------------------------
// MaterialDef
// ---------------------------------------------------------------------------

/// A registered voxel material.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaterialDef {
    /// Id stored in voxel buffers. Must not be 0.
    pub id: MaterialId,
    /// Unique human-readable name.
    pub name: String,
    /// Face texture assignment.
    pub textures: FaceTextures,
    /// Rendered with alpha; neighbours stay visible through it.
    pub transparent: bool,
    /// Meshed by the liquid pass instead of the solid pass.
    pub liquid: bool,
    /// Block light emitted by this material, 0–15.
    pub light_emission: u8,
    /// Explicit merge group for merging libraries.
    pub render_group: Option<String>,
    /// Linear RGBA tint baked into vertex colours.
    pub color: [f32; 4],
}

impl MaterialDef {
    /// Opaque solid material with a single texture.
    pub fn solid(id: u16, name: &str, texture: &str) -> Self {
        Self {
            id: MaterialId(id),
            name: name.to_string(),
            textures: FaceTextures::uniform(texture),
            transparent: false,
            liquid: false,
            light_emission: 0,
            render_group: None,
            color: [1.0; 4],
        }
    }

    /// Transparent liquid material with a single texture.
    pub fn liquid(id: u16, name: &str, texture: &str) -> Self {
        Self {
            transparent: true,
            liquid: true,
            ..Self::solid(id, name, texture)
        }
    }

    /// Builder-style: marks the material transparent.
    pub fn with_transparency(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Builder-style: sets the emitted block light.
    pub fn with_emission(mut self, light: u8) -> Self {
        self.light_emission = light.min(15);
        self
    }

    /// Builder-style: sets an explicit merge group.
    pub fn with_render_group(mut self, group: &str) -> Self {
        self.render_group = Some(group.to_string());
        self
    }

    /// Builder-style: sets the face textures.
    pub fn with_textures(mut self, textures: FaceTextures) -> Self {
        self.textures = textures;
        self
    }

    /// Physical category used by face culling.
    pub fn category(&self) -> VoxelCategory {
        if self.liquid {
            VoxelCategory::Liquid
        } else {
            VoxelCategory::Solid
        }
    }

    /// Merge group name: the explicit `render_group`, otherwise derived
    /// from the liquid and transparent flags.
    pub fn group_key(&self) -> &str {
        match &self.render_group {
            Some(group) => group,
            None if self.liquid => "liquid",
            None if self.transparent => "transparent",
            None => "opaque",
        }
    }
}

// ---------------------------------------------------------------------------
// RON manifest
// ---------------------------------------------------------------------------

/// Top-level RON manifest: `(materials: [ ... ])`.
#[derive(Debug, Deserialize)]
pub struct MaterialManifest {
    /// Material entries.
    pub materials: Vec<MaterialEntry>,
}

/// A single material entry in the RON manifest.
#[derive(Debug, Deserialize)]
pub struct MaterialEntry {
    /// Voxel material id.
    pub id: u16,
    /// Unique name.
    pub name: String,
    /// Face texture assignment.
    pub textures: FaceTextures,
    /// Transparency flag.
    #[serde(default)]
    pub transparent: bool,
    /// Liquid flag.
    #[serde(default)]
    pub liquid: bool,
    /// Emitted block light.
    #[serde(default)]
    pub light_emission: u8,
    /// Explicit merge group.
    #[serde(default)]
    pub render_group: Option<String>,
    /// RGBA tint.
    #[serde(default = "white")]
    pub color: (f32, f32, f32, f32),
}

fn white() -> (f32, f32, f32, f32) {
    (1.0, 1.0, 1.0, 1.0)
}

impl From<MaterialEntry> for MaterialDef {
    fn from(entry: MaterialEntry) -> Self {
        Self {
            id: MaterialId(entry.id),
            name: entry.name,
            textures: entry.textures,
            transparent: entry.transparent || entry.liquid,
            liquid: entry.liquid,
            light_emission: entry.light_emission.min(15),
            render_group: entry.render_group,
            color: [entry.color.0, entry.color.1, entry.color.2, entry.color.3],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_side_bottom_lookup() {
        let tex = FaceTextures::TopSideBottom {
            top: "grass_top".into(),
            side: "grass_side".into(),
            bottom: "dirt".into(),
        };
        assert_eq!(tex.texture_for(FaceDirection::PosY), "grass_top");
        assert_eq!(tex.texture_for(FaceDirection::NegY), "dirt");
        assert_eq!(tex.texture_for(FaceDirection::NegZ), "grass_side");
        assert_eq!(tex.names(), vec!["grass_side", "grass_top", "dirt"]);
    }

    #[test]
    fn test_group_key_derivation() {
        assert_eq!(MaterialDef::solid(1, "stone", "stone").group_key(), "opaque");
        assert_eq!(MaterialDef::liquid(2, "water", "water").group_key(), "liquid");
        let glass = MaterialDef::solid(3, "glass", "glass").with_transparency(true);
        assert_eq!(glass.group_key(), "transparent");
        assert_eq!(glass.with_render_group("foliage").group_key(), "foliage");
    }

    #[test]
    fn test_category_follows_liquid_flag() {
        assert_eq!(MaterialDef::solid(1, "a", "a").category(), VoxelCategory::Solid);
        assert_eq!(MaterialDef::liquid(1, "a", "a").category(), VoxelCategory::Liquid);
    }

    #[test]
    fn test_manifest_entry_defaults() {
        let manifest: MaterialManifest = ron::from_str(
            r#"(materials: [
                (id: 4, name: "lava", textures: Uniform(texture: "lava.png"), liquid: true, light_emission: 40),
            ])"#,
        )
        .unwrap();
        let def = MaterialDef::from(manifest.materials.into_iter().next().unwrap());
        assert_eq!(def.id, MaterialId(4));
        assert!(def.transparent);
        assert_eq!(def.light_emission, 15);
        assert_eq!(def.color, [1.0; 4]);
    }
}
