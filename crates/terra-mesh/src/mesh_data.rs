//! Mesh output: vertices and indices partitioned per render surface.

use terra_voxel::MaterialId;

/// A single mesh vertex, laid out for direct upload.
///
/// Layout (56 bytes): position, normal, uv, linear RGBA colour, material id,
/// texture-array layer.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    /// Position in chunk-local world units.
    pub position: [f32; 3],
    /// Unit normal.
    pub normal: [f32; 3],
    /// Texture coordinates.
    pub uv: [f32; 2],
    /// Baked light and occlusion colour.
    pub color: [f32; 4],
    /// Voxel material id.
    pub material: u32,
    /// Texture array layer (0 for atlased surfaces).
    pub layer: u32,
}

static_assertions::assert_eq_size!(MeshVertex, [u8; 56]);

/// Geometry for one render surface.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceMesh {
    /// Library surface index.
    pub surface: usize,
    /// Material, when the surface holds a single material's geometry.
    pub material: Option<MaterialId>,
    /// Vertex buffer.
    pub vertices: Vec<MeshVertex>,
    /// Triangle list indices.
    pub indices: Vec<u32>,
}

impl SurfaceMesh {
    /// Number of triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Counters collected while meshing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshStats {
    /// Unit voxel faces found visible.
    pub faces: u32,
    /// Quads written (fewer than `faces` after greedy merging).
    pub quads: u32,
    /// Triangles written.
    pub triangles: u32,
    /// Faces dropped because their material is not registered.
    pub skipped_faces: u32,
    /// Isosurface cells dropped for invalid input.
    pub invalid_cells: u32,
}

/// Complete mesh of one chunk.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    /// One entry per surface, ordered by surface index.
    pub surfaces: Vec<SurfaceMesh>,
    /// Meshing counters.
    pub stats: MeshStats,
}

impl MeshData {
    /// Returns `true` if no geometry was produced.
    pub fn is_empty(&self) -> bool {
        self.surfaces.iter().all(|s| s.indices.is_empty())
    }

    /// Total vertices across surfaces.
    pub fn vertex_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.vertices.len()).sum()
    }

    /// Total indices across surfaces.
    pub fn index_count(&self) -> usize {
        self.surfaces.iter().map(|s| s.indices.len()).sum()
    }

    /// Total triangles across surfaces.
    pub fn triangle_count(&self) -> usize {
        self.index_count() / 3
    }

    /// First surface mesh rendering into `surface_index`.
    pub fn surface(&self, surface_index: usize) -> Option<&SurfaceMesh> {
        self.surfaces.iter().find(|s| s.surface == surface_index)
    }

    /// Every vertex, surface by surface.
    pub fn vertices(&self) -> impl Iterator<Item = &MeshVertex> {
        self.surfaces.iter().flat_map(|s| s.vertices.iter())
    }

    /// Raw vertex bytes of the `i`-th surface mesh.
    pub fn vertex_bytes(&self, i: usize) -> &[u8] {
        self.surfaces
            .get(i)
            .map_or(&[][..], |s| bytemuck::cast_slice(&s.vertices))
    }

    /// Raw index bytes of the `i`-th surface mesh.
    pub fn index_bytes(&self, i: usize) -> &[u8] {
        self.surfaces
            .get(i)
            .map_or(&[][..], |s| bytemuck::cast_slice(&s.indices))
    }
}
