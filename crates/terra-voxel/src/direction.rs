//! Cardinal directions for voxel geometry: face (6), edge (12), and corner (8).

use serde::{Deserialize, Serialize};

/// Direction a voxel face points. Opposite faces have discriminants that
/// differ only in the lowest bit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum FaceDirection {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

impl FaceDirection {
    pub const ALL: [FaceDirection; 6] = [
        Self::PosX,
        Self::NegX,
        Self::PosY,
        Self::NegY,
        Self::PosZ,
        Self::NegZ,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// `(normal_axis, u_axis, v_axis)` with 0=X, 1=Y, 2=Z. Greedy merging
    /// sweeps slices along the normal axis and grows rectangles along u
    /// before v.
    pub fn sweep_axes(self) -> (usize, usize, usize) {
        match self.axis() {
            0 => (0, 2, 1),
            1 => (1, 0, 2),
            _ => (2, 0, 1),
        }
    }

    /// Axis the face is perpendicular to.
    pub fn axis(self) -> usize {
        self as usize / 2
    }

    pub fn is_positive(self) -> bool {
        (self as u8) & 1 == 0
    }

    pub fn normal(self) -> [f32; 3] {
        let (dx, dy, dz) = self.delta();
        [dx as f32, dy as f32, dz as f32]
    }

    /// Unit step out of the face.
    pub fn delta(self) -> (i32, i32, i32) {
        let mut step = [0; 3];
        step[self.axis()] = if self.is_positive() { 1 } else { -1 };
        (step[0], step[1], step[2])
    }

    /// Voxel across this face from `(x, y, z)`.
    pub fn offset(self, x: i32, y: i32, z: i32) -> (i32, i32, i32) {
        let (dx, dy, dz) = self.delta();
        (x + dx, y + dy, z + dz)
    }

    pub fn opposite(self) -> Self {
        Self::ALL[self.index() ^ 1]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// One of 12 edge-adjacent directions (two axes out of bounds).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EdgeDirection {
    /// +X +Y edge.
    PosXPosY = 0,
    /// +X −Y edge.
    PosXNegY = 1,
    /// +X +Z edge.
    PosXPosZ = 2,
    /// +X −Z edge.
    PosXNegZ = 3,
    /// −X +Y edge.
    NegXPosY = 4,
    /// −X −Y edge.
    NegXNegY = 5,
    /// −X +Z edge.
    NegXPosZ = 6,
    /// −X −Z edge.
    NegXNegZ = 7,
    /// +Y +Z edge.
    PosYPosZ = 8,
    /// +Y −Z edge.
    PosYNegZ = 9,
    /// −Y +Z edge.
    NegYPosZ = 10,
    /// −Y −Z edge.
    NegYNegZ = 11,
}

impl EdgeDirection {
    /// All 12 edge directions.
    pub const ALL: [EdgeDirection; 12] = [
        Self::PosXPosY,
        Self::PosXNegY,
        Self::PosXPosZ,
        Self::PosXNegZ,
        Self::NegXPosY,
        Self::NegXNegY,
        Self::NegXPosZ,
        Self::NegXNegZ,
        Self::PosYPosZ,
        Self::PosYNegZ,
        Self::NegYPosZ,
        Self::NegYNegZ,
    ];

    /// Chunk offset of the neighbor across this edge.
    pub fn delta(self) -> (i32, i32, i32) {
        match self {
            Self::PosXPosY => (1, 1, 0),
            Self::PosXNegY => (1, -1, 0),
            Self::PosXPosZ => (1, 0, 1),
            Self::PosXNegZ => (1, 0, -1),
            Self::NegXPosY => (-1, 1, 0),
            Self::NegXNegY => (-1, -1, 0),
            Self::NegXPosZ => (-1, 0, 1),
            Self::NegXNegZ => (-1, 0, -1),
            Self::PosYPosZ => (0, 1, 1),
            Self::PosYNegZ => (0, 1, -1),
            Self::NegYPosZ => (0, -1, 1),
            Self::NegYNegZ => (0, -1, -1),
        }
    }

    /// Returns the direction index (0–11).
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One of 8 corner-adjacent directions (all three axes out of bounds).
///
/// The discriminant encodes the positive axes as bits: x=1, y=2, z=4.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CornerDirection {
    /// −X −Y −Z corner.
    NegXNegYNegZ = 0,
    /// +X −Y −Z corner.
    PosXNegYNegZ = 1,
    /// −X +Y −Z corner.
    NegXPosYNegZ = 2,
    /// +X +Y −Z corner.
    PosXPosYNegZ = 3,
    /// −X −Y +Z corner.
    NegXNegYPosZ = 4,
    /// +X −Y +Z corner.
    PosXNegYPosZ = 5,
    /// −X +Y +Z corner.
    NegXPosYPosZ = 6,
    /// +X +Y +Z corner.
    PosXPosYPosZ = 7,
}

impl CornerDirection {
    /// All 8 corner directions.
    pub const ALL: [CornerDirection; 8] = [
        Self::NegXNegYNegZ,
        Self::PosXNegYNegZ,
        Self::NegXPosYNegZ,
        Self::PosXPosYNegZ,
        Self::NegXNegYPosZ,
        Self::PosXNegYPosZ,
        Self::NegXPosYPosZ,
        Self::PosXPosYPosZ,
    ];

    /// Chunk offset of the neighbor across this corner.
    pub fn delta(self) -> (i32, i32, i32) {
        let bits = self as u8;
        let axis = |bit: u8| if bits & bit != 0 { 1 } else { -1 };
        (axis(1), axis(2), axis(4))
    }

    /// Returns the direction index (0–7).
    pub fn index(self) -> usize {
        self as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_delta_follows_axis_and_sign() {
        assert_eq!(FaceDirection::PosY.delta(), (0, 1, 0));
        assert_eq!(FaceDirection::NegZ.offset(3, 4, 0), (3, 4, -1));
        for dir in FaceDirection::ALL {
            let d = dir.delta();
            let step = [d.0, d.1, d.2];
            let expected = if dir.is_positive() { 1 } else { -1 };
            assert_eq!(step[dir.axis()], expected, "{dir:?}");
            assert_eq!(step.iter().map(|c| c.abs()).sum::<i32>(), 1);
        }
    }

    #[test]
    fn test_opposite_is_involution() {
        for dir in FaceDirection::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            assert_ne!(dir.opposite(), dir);
            assert_eq!(dir.opposite().axis(), dir.axis());
        }
    }

    #[test]
    fn test_from_u8_round_trips_discriminant() {
        for dir in FaceDirection::ALL {
            assert_eq!(FaceDirection::from_u8(dir as u8), Some(dir));
        }
        assert!(FaceDirection::from_u8(6).is_none());
    }

    #[test]
    fn test_sweep_axes_cover_all_three_axes() {
        for dir in FaceDirection::ALL {
            let (l, u, v) = dir.sweep_axes();
            let mut axes = [l, u, v];
            axes.sort_unstable();
            assert_eq!(axes, [0, 1, 2]);
        }
    }

    #[test]
    fn test_corner_delta_matches_bits() {
        assert_eq!(CornerDirection::NegXNegYNegZ.delta(), (-1, -1, -1));
        assert_eq!(CornerDirection::PosXNegYPosZ.delta(), (1, -1, 1));
        assert_eq!(CornerDirection::PosXPosYPosZ.delta(), (1, 1, 1));
    }

    #[test]
    fn test_edge_deltas_have_two_nonzero_axes() {
        for edge in EdgeDirection::ALL {
            let (x, y, z) = edge.delta();
            let nonzero = [x, y, z].iter().filter(|c| **c != 0).count();
            assert_eq!(nonzero, 2, "{edge:?}");
        }
    }
}
