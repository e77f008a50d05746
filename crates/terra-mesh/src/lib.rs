//! Voxel meshing: blocky, cubic and marching cubes meshers over chunk
//! neighbourhood snapshots, with per-surface output through [`SurfaceTool`].

pub mod ambient_occlusion;
pub mod blocky;
pub mod cube_points;
pub mod cubic;
pub mod greedy;
pub mod marching_cubes;
pub mod mesh_data;
pub mod mesher;
pub mod neighborhood;
pub mod surface_tool;
pub mod visibility;

pub use ambient_occlusion::{compute_face_ao, should_flip_ao_diagonal, vertex_ao};
pub use blocky::FaceAttrs;
pub use cube_points::CubePoints;
pub use greedy::{FaceQuad, greedy_merge};
pub use marching_cubes::{EdgeVertex, case_triangles, cell_case, edge_corners, polygonise_cell};
pub use mesh_data::{MeshData, MeshStats, MeshVertex, SurfaceMesh};
pub use mesher::{BuildFlags, MeshError, MeshInput, Mesher, MesherKind, bake_color};
pub use neighborhood::{BoundaryPolicy, ChunkNeighborhood};
pub use surface_tool::{MergeMode, SurfaceTool};
pub use visibility::{count_visible_faces, culling_category, face_visible, is_face_exposed};
