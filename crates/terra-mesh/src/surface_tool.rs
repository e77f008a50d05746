//! Geometry accumulator that groups triangles into render surfaces.
//!
//! In [`MergeMode::Simple`] every material gets its own [`SurfaceMesh`];
//! in [`MergeMode::Merger`] all materials sharing a library surface are
//! written into one buffer so a merged surface costs one draw call.

use std::collections::BTreeMap;

use glam::Vec3;
use rustc_hash::FxHashMap;
use terra_library::{LibraryKind, SurfaceRef};
use terra_voxel::MaterialId;

use crate::mesh_data::{MeshData, MeshStats, MeshVertex, SurfaceMesh};

/// How output buffers are keyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MergeMode {
    /// One buffer per material.
    Simple,
    /// One buffer per library surface.
    Merger,
}

impl MergeMode {
    /// Mode matching a library's grouping.
    pub fn for_library(kind: LibraryKind) -> Self {
        match kind {
            LibraryKind::Simple => Self::Simple,
            LibraryKind::Merger | LibraryKind::MergerPcm => Self::Merger,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct SurfaceKey {
    surface: usize,
    material: Option<MaterialId>,
}

/// Accumulates quads and triangles, then commits them as [`MeshData`].
#[derive(Debug)]
pub struct SurfaceTool {
    mode: MergeMode,
    surfaces: BTreeMap<SurfaceKey, SurfaceMesh>,
    stats: MeshStats,
}

impl SurfaceTool {
    /// Creates an empty tool.
    pub fn new(mode: MergeMode) -> Self {
        Self {
            mode,
            surfaces: BTreeMap::new(),
            stats: MeshStats::default(),
        }
    }

    /// Output keying mode.
    pub fn mode(&self) -> MergeMode {
        self.mode
    }

    fn target(&mut self, surface: &SurfaceRef) -> &mut SurfaceMesh {
        let material = match self.mode {
            MergeMode::Simple => Some(surface.material),
            MergeMode::Merger => None,
        };
        let key = SurfaceKey {
            surface: surface.surface,
            material,
        };
        self.surfaces.entry(key).or_insert_with(|| SurfaceMesh {
            surface: surface.surface,
            material,
            vertices: Vec::new(),
            indices: Vec::new(),
        })
    }

    /// Adds a quad. `corners` go around the quad; the winding is fixed up
    /// so the front face points along `normal`. `flip_diagonal` splits the
    /// quad along corners 1–3 instead of 0–2.
    pub fn add_quad(
        &mut self,
        surface: &SurfaceRef,
        corners: [MeshVertex; 4],
        normal: Vec3,
        flip_diagonal: bool,
    ) {
        let p = corners.map(|c| Vec3::from(c.position));
        let facing = (p[1] - p[0]).cross(p[2] - p[0]).dot(normal);
        let ordered = if facing < 0.0 {
            [corners[0], corners[3], corners[2], corners[1]]
        } else {
            corners
        };

        let mesh = self.target(surface);
        let base = mesh.vertices.len() as u32;
        mesh.vertices.extend_from_slice(&ordered);
        if flip_diagonal {
            mesh.indices
                .extend_from_slice(&[base + 1, base + 2, base + 3, base + 1, base + 3, base]);
        } else {
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        self.stats.quads += 1;
        self.stats.triangles += 2;
    }

    /// Adds a triangle with its vertices already in front-facing order.
    pub fn add_triangle(&mut self, surface: &SurfaceRef, corners: [MeshVertex; 3]) {
        let mesh = self.target(surface);
        let base = mesh.vertices.len() as u32;
        mesh.vertices.extend_from_slice(&corners);
        mesh.indices.extend_from_slice(&[base, base + 1, base + 2]);
        self.stats.triangles += 1;
    }

    /// Counts `n` unit faces found visible.
    pub fn record_faces(&mut self, n: u32) {
        self.stats.faces += n;
    }

    /// Counts a face dropped for an unresolvable material.
    pub fn skip_face(&mut self) {
        self.stats.skipped_faces += 1;
    }

    /// Counts an isosurface cell dropped for invalid input.
    pub fn invalid_cell(&mut self) {
        self.stats.invalid_cells += 1;
    }

    /// Counters so far.
    pub fn stats(&self) -> MeshStats {
        self.stats
    }

    /// Welds bit-identical vertices within each surface and drops the
    /// triangles that collapse.
    pub fn remove_doubles(&mut self) {
        let mut triangles = 0u32;
        for mesh in self.surfaces.values_mut() {
            let mut seen: FxHashMap<[u32; 14], u32> = FxHashMap::default();
            let mut vertices = Vec::with_capacity(mesh.vertices.len());
            let mut remap = Vec::with_capacity(mesh.vertices.len());
            for v in &mesh.vertices {
                let key: [u32; 14] = bytemuck::cast(*v);
                let idx = *seen.entry(key).or_insert_with(|| {
                    vertices.push(*v);
                    vertices.len() as u32 - 1
                });
                remap.push(idx);
            }

            let mut indices = Vec::with_capacity(mesh.indices.len());
            for tri in mesh.indices.chunks_exact(3) {
                let [a, b, c] = [
                    remap[tri[0] as usize],
                    remap[tri[1] as usize],
                    remap[tri[2] as usize],
                ];
                if a != b && b != c && a != c {
                    indices.extend_from_slice(&[a, b, c]);
                }
            }
            triangles += (indices.len() / 3) as u32;
            mesh.vertices = vertices;
            mesh.indices = indices;
        }
        self.stats.triangles = triangles;
    }

    /// Recomputes vertex normals as the area-weighted sum of adjacent
    /// triangle normals.
    pub fn generate_normals(&mut self) {
        for mesh in self.surfaces.values_mut() {
            let mut sums = vec![Vec3::ZERO; mesh.vertices.len()];
            for tri in mesh.indices.chunks_exact(3) {
                let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
                let pa = Vec3::from(mesh.vertices[a].position);
                let pb = Vec3::from(mesh.vertices[b].position);
                let pc = Vec3::from(mesh.vertices[c].position);
                // Unnormalized cross product: length is twice the area.
                let n = (pb - pa).cross(pc - pa);
                sums[a] += n;
                sums[b] += n;
                sums[c] += n;
            }
            for (v, n) in mesh.vertices.iter_mut().zip(sums) {
                if let Some(n) = n.try_normalize() {
                    v.normal = n.to_array();
                }
            }
        }
    }

    /// Finishes accumulation. Surfaces are ordered by surface index, then
    /// material.
    pub fn commit(self) -> MeshData {
        MeshData {
            surfaces: self
                .surfaces
                .into_values()
                .filter(|s| !s.indices.is_empty())
                .collect(),
            stats: self.stats,
        }
    }
}
