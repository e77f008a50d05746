//! Per-voxel value types.

use serde::{Deserialize, Serialize};

/// Material identifier stored in every voxel. `MaterialId(0)` is empty space.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MaterialId(pub u16);

impl MaterialId {
    /// Empty space.
    pub const EMPTY: MaterialId = MaterialId(0);

    /// Returns `true` for empty space.
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Coarse physical category used for face culling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoxelCategory {
    /// Nothing to render.
    Empty,
    /// Opaque or transparent solid block.
    Solid,
    /// Liquid block, meshed by the liquid pass.
    Liquid,
}

/// Baked RGB light of a voxel, 0–255 per channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightColor(pub [u8; 3]);

impl LightColor {
    /// No light.
    pub const BLACK: LightColor = LightColor([0, 0, 0]);
    /// Full white light.
    pub const WHITE: LightColor = LightColor([255, 255, 255]);

    /// Channel-wise saturating sum.
    pub fn saturating_add(self, other: LightColor) -> LightColor {
        LightColor([
            self.0[0].saturating_add(other.0[0]),
            self.0[1].saturating_add(other.0[1]),
            self.0[2].saturating_add(other.0[2]),
        ])
    }

    /// Channel-wise maximum.
    pub fn max(self, other: LightColor) -> LightColor {
        LightColor([
            self.0[0].max(other.0[0]),
            self.0[1].max(other.0[1]),
            self.0[2].max(other.0[2]),
        ])
    }

    /// Normalized `[r, g, b]` in `0.0..=1.0`.
    pub fn to_f32(self) -> [f32; 3] {
        self.0.map(|c| c as f32 / 255.0)
    }
}
