//! Mesher selection and the shared meshing contract.
//!
//! Every mesher is a pure function of a [`ChunkNeighborhood`] snapshot and a
//! [`MaterialLibrary`]: no state survives between calls, so any worker
//! thread can run one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use terra_library::MaterialLibrary;
use terra_voxel::LightColor;

use crate::mesh_data::MeshData;
use crate::neighborhood::{BoundaryPolicy, ChunkNeighborhood};
use crate::surface_tool::{MergeMode, SurfaceTool};
use crate::{blocky, cubic, marching_cubes};

/// Errors produced by a mesh pass.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    /// The centre chunk's voxel data is malformed (bad channel length or
    /// non-finite density).
    #[error("mesher data invalid: {reason}")]
    MesherDataInvalid {
        /// What the validation found.
        reason: String,
    },

    /// A mesher name did not parse.
    #[error("unknown mesher '{0}' (expected blocky, marching_cubes, cubic or default)")]
    UnknownMesher(String),
}

/// Mesher selection exposed through configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MesherKind {
    /// One quad per visible face, optionally greedy-merged.
    #[default]
    Blocky,
    /// Smooth isosurface over the density field.
    MarchingCubes,
    /// Per-voxel cubes with corners pulled in by density.
    Cubic,
    /// Plain per-voxel cubes.
    Default,
}

impl fmt::Display for MesherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MesherKind::Blocky => "blocky",
            MesherKind::MarchingCubes => "marching_cubes",
            MesherKind::Cubic => "cubic",
            MesherKind::Default => "default",
        };
        f.write_str(name)
    }
}

impl FromStr for MesherKind {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "blocky" => Ok(MesherKind::Blocky),
            "marching_cubes" | "marchingcubes" | "mc" => Ok(MesherKind::MarchingCubes),
            "cubic" => Ok(MesherKind::Cubic),
            "default" => Ok(MesherKind::Default),
            _ => Err(MeshError::UnknownMesher(s.to_string())),
        }
    }
}

/// Optional mesh features.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildFlags {
    /// Bake the light channel into vertex colours.
    pub use_lighting: bool,
    /// Bake per-vertex and per-voxel ambient occlusion.
    pub use_ao: bool,
    /// Merge coplanar faces in the blocky mesher.
    pub greedy: bool,
    /// How much one level of vertex occlusion darkens (0–1).
    pub ao_strength: f32,
}

impl Default for BuildFlags {
    fn default() -> Self {
        Self {
            use_lighting: true,
            use_ao: true,
            greedy: true,
            ao_strength: 0.25,
        }
    }
}

/// Everything a mesh pass reads.
#[derive(Clone, Copy, Debug)]
pub struct MeshInput<'a> {
    /// Centre chunk and neighbour snapshots.
    pub neighborhood: &'a ChunkNeighborhood,
    /// Material resolution.
    pub library: &'a MaterialLibrary,
    /// World units per voxel.
    pub voxel_scale: f32,
    /// Isosurface threshold; density above it is solid.
    pub isolevel: f32,
    /// Feature switches.
    pub flags: BuildFlags,
}

impl<'a> MeshInput<'a> {
    /// Input with unit scale, isolevel 0 and default flags.
    pub fn new(neighborhood: &'a ChunkNeighborhood, library: &'a MaterialLibrary) -> Self {
        Self {
            neighborhood,
            library,
            voxel_scale: 1.0,
            isolevel: 0.0,
            flags: BuildFlags::default(),
        }
    }

    /// Builder-style: sets the voxel scale.
    pub fn with_scale(mut self, voxel_scale: f32) -> Self {
        self.voxel_scale = voxel_scale;
        self
    }

    /// Builder-style: sets the isolevel.
    pub fn with_isolevel(mut self, isolevel: f32) -> Self {
        self.isolevel = isolevel;
        self
    }

    /// Builder-style: sets the flags.
    pub fn with_flags(mut self, flags: BuildFlags) -> Self {
        self.flags = flags;
        self
    }
}

/// A concrete meshing strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mesher {
    /// Solid voxel faces.
    Blocky,
    /// Liquid voxel faces, tops lowered by the liquid level.
    LiquidBlocky,
    /// Isosurface extraction.
    MarchingCubes,
    /// Smoothed cubes.
    Cubic,
    /// Plain cubes with baked colours.
    Default,
}

impl Mesher {
    /// Primary mesher for a configured kind.
    pub fn from_kind(kind: MesherKind) -> Self {
        match kind {
            MesherKind::Blocky => Mesher::Blocky,
            MesherKind::MarchingCubes => Mesher::MarchingCubes,
            MesherKind::Cubic => Mesher::Cubic,
            MesherKind::Default => Mesher::Default,
        }
    }

    /// Second pass for liquid voxels, if this mesher leaves them out.
    /// The isosurface covers liquids through their density already.
    pub fn liquid_pass(self) -> Option<Mesher> {
        match self {
            Mesher::Blocky | Mesher::Cubic | Mesher::Default => Some(Mesher::LiquidBlocky),
            Mesher::LiquidBlocky | Mesher::MarchingCubes => None,
        }
    }

    /// Boundary policy the neighbourhood should be built with.
    pub fn boundary_policy(self) -> BoundaryPolicy {
        match self {
            Mesher::MarchingCubes => BoundaryPolicy::Duplicate,
            _ => BoundaryPolicy::Empty,
        }
    }

    /// Whether neighbouring cells emit shared vertices that should be
    /// welded after the pass.
    pub fn welds_vertices(self) -> bool {
        matches!(self, Mesher::MarchingCubes)
    }

    /// Whether the pass writes its own vertex normals. Passes that don't
    /// get them from [`SurfaceTool::generate_normals`].
    pub fn emits_normals(self) -> bool {
        !matches!(self, Mesher::Cubic)
    }

    /// Meshes the centre chunk into a fresh [`MeshData`].
    pub fn mesh(self, input: &MeshInput<'_>) -> Result<MeshData, MeshError> {
        let mut tool = SurfaceTool::new(MergeMode::for_library(input.library.kind()));
        self.mesh_into(input, &mut tool)?;
        Ok(tool.commit())
    }

    /// Meshes the centre chunk into an existing tool, so several passes can
    /// share one output.
    pub fn mesh_into(self, input: &MeshInput<'_>, tool: &mut SurfaceTool) -> Result<(), MeshError> {
        input
            .neighborhood
            .center()
            .validate()
            .map_err(|e| MeshError::MesherDataInvalid {
                reason: e.to_string(),
            })?;

        match self {
            Mesher::Blocky => blocky::mesh_solid(input, tool),
            Mesher::LiquidBlocky => blocky::mesh_liquid(input, tool),
            Mesher::MarchingCubes => marching_cubes::mesh(input, tool),
            Mesher::Cubic => cubic::mesh(input, tool, true),
            Mesher::Default => cubic::mesh(input, tool, false),
        }
        if self.welds_vertices() {
            tool.remove_doubles();
        }
        if !self.emits_normals() {
            tool.generate_normals();
        }
        tracing::trace!(mesher = ?self, stats = ?tool.stats(), "mesh pass done");
        Ok(())
    }
}

/// Vertex colour from material tint, light and occlusion.
pub fn bake_color(
    tint: [f32; 4],
    light: LightColor,
    vertex_ao: u8,
    voxel_ao: u8,
    flags: &BuildFlags,
) -> [f32; 4] {
    let light = if flags.use_lighting {
        light.to_f32()
    } else {
        [1.0; 3]
    };
    let shade = if flags.use_ao {
        let vertex = 1.0 - flags.ao_strength * (vertex_ao.min(3) as f32 / 3.0);
        let voxel = 1.0 - voxel_ao as f32 / 255.0;
        (vertex * voxel).clamp(0.0, 1.0)
    } else {
        1.0
    };
    [
        tint[0] * light[0] * shade,
        tint[1] * light[1] * shade,
        tint[2] * light[2] * shade,
        tint[3],
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use terra_library::{LibraryKind, MaterialDef, MemoryTextures};
    use terra_voxel::{ChunkDims, MaterialId, VoxelBuffer};

    fn library() -> MaterialLibrary {
        let mut lib = MaterialLibrary::new(LibraryKind::Simple);
        lib.register(MaterialDef::solid(1, "stone", "stone")).unwrap();
        let tile = image::RgbaImage::from_pixel(16, 16, image::Rgba([90, 90, 90, 255]));
        lib.finalize(Arc::new(MemoryTextures::new().with("stone", tile)))
            .unwrap();
        lib
    }

    #[test]
    fn test_kind_parse_and_display() {
        for kind in [
            MesherKind::Blocky,
            MesherKind::MarchingCubes,
            MesherKind::Cubic,
            MesherKind::Default,
        ] {
            assert_eq!(kind.to_string().parse::<MesherKind>().unwrap(), kind);
        }
        assert_eq!("Marching-Cubes".parse::<MesherKind>().unwrap(), MesherKind::MarchingCubes);
        assert!(matches!(
            "voxelizer".parse::<MesherKind>(),
            Err(MeshError::UnknownMesher(_))
        ));
    }

    #[test]
    fn test_post_pass_selection() {
        assert!(Mesher::MarchingCubes.welds_vertices());
        assert!(!Mesher::Blocky.welds_vertices());
        assert!(!Mesher::Cubic.emits_normals());
        assert!(Mesher::Default.emits_normals());
    }

    #[test]
    fn test_liquid_pass_selection() {
        assert_eq!(Mesher::Blocky.liquid_pass(), Some(Mesher::LiquidBlocky));
        assert_eq!(Mesher::MarchingCubes.liquid_pass(), None);
        assert_eq!(Mesher::LiquidBlocky.liquid_pass(), None);
    }

    #[test]
    fn test_non_finite_density_is_invalid() {
        let lib = library();
        let mut buffer = VoxelBuffer::new(ChunkDims::cubic(4));
        buffer.set_density(1, 1, 1, f32::NAN).unwrap();
        let n = ChunkNeighborhood::new(Arc::new(buffer), BoundaryPolicy::Duplicate);
        for mesher in [Mesher::MarchingCubes, Mesher::Blocky, Mesher::Cubic] {
            let err = mesher.mesh(&MeshInput::new(&n, &lib)).unwrap_err();
            assert!(matches!(err, MeshError::MesherDataInvalid { .. }));
        }
    }

    #[test]
    fn test_every_mesher_handles_empty_chunk() {
        let lib = library();
        let n = ChunkNeighborhood::new(
            Arc::new(VoxelBuffer::new(ChunkDims::cubic(4))),
            BoundaryPolicy::Empty,
        );
        for mesher in [
            Mesher::Blocky,
            Mesher::LiquidBlocky,
            Mesher::MarchingCubes,
            Mesher::Cubic,
            Mesher::Default,
        ] {
            let data = mesher.mesh(&MeshInput::new(&n, &lib)).unwrap();
            assert!(data.is_empty(), "{mesher:?}");
        }
    }

    #[test]
    fn test_single_voxel_all_cubic_meshers_emit_six_faces() {
        let lib = library();
        let mut buffer = VoxelBuffer::new(ChunkDims::cubic(4));
        buffer.set_material(1, 1, 1, MaterialId(1)).unwrap();
        let n = ChunkNeighborhood::new(Arc::new(buffer), BoundaryPolicy::Empty);
        for mesher in [Mesher::Blocky, Mesher::Cubic, Mesher::Default] {
            let data = mesher.mesh(&MeshInput::new(&n, &lib)).unwrap();
            assert_eq!(data.stats.faces, 6, "{mesher:?}");
            assert_eq!(data.triangle_count(), 12, "{mesher:?}");
        }
    }

    #[test]
    fn test_bake_color_darkens_with_occlusion() {
        let flags = BuildFlags::default();
        let open = bake_color([1.0; 4], LightColor::WHITE, 0, 0, &flags);
        let closed = bake_color([1.0; 4], LightColor::WHITE, 3, 0, &flags);
        assert_eq!(open, [1.0; 4]);
        assert!(closed[0] < open[0]);
        assert_eq!(closed[3], 1.0);

        let flat = BuildFlags {
            use_lighting: false,
            use_ao: false,
            ..flags
        };
        assert_eq!(bake_color([0.5; 4], LightColor::BLACK, 3, 200, &flat), [0.5; 4]);
    }
}
