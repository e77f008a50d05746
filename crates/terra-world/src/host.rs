//! Interfaces the host engine implements to receive chunk meshes.

use glam::{Mat4, Vec3};
use terra_mesh::MeshData;
use terra_voxel::ChunkCoord;

/// Host-side identifier for an uploaded chunk mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderHandle(pub u64);

/// Accepts finished meshes for rendering.
pub trait RenderSink {
    /// Uploads `mesh` placed by `transform` and returns its handle.
    fn submit_mesh(&mut self, transform: Mat4, mesh: &MeshData) -> RenderHandle;

    /// Releases a handle returned by [`Self::submit_mesh`].
    fn release(&mut self, handle: RenderHandle);
}

/// Scene graph attachment point for chunk nodes.
pub trait SceneAttachment {
    fn activate(&mut self, coord: ChunkCoord, handle: RenderHandle);
    fn deactivate(&mut self, coord: ChunkCoord, handle: RenderHandle);
}

/// A host providing both the render sink and the scene attachment.
pub trait ChunkHost: RenderSink + SceneAttachment {}

impl<T: RenderSink + SceneAttachment> ChunkHost for T {}

/// Host that accepts everything and renders nothing.
#[derive(Debug, Default)]
pub struct NullHost {
    next: u64,
}

impl RenderSink for NullHost {
    fn submit_mesh(&mut self, _transform: Mat4, _mesh: &MeshData) -> RenderHandle {
        self.next += 1;
        RenderHandle(self.next)
    }

    fn release(&mut self, _handle: RenderHandle) {}
}

impl SceneAttachment for NullHost {
    fn activate(&mut self, _coord: ChunkCoord, _handle: RenderHandle) {}
    fn deactivate(&mut self, _coord: ChunkCoord, _handle: RenderHandle) {}
}

/// Translation placing a chunk's local mesh at its world origin.
pub fn chunk_transform(origin: (i64, i64, i64), voxel_scale: f32) -> Mat4 {
    Mat4::from_translation(Vec3::new(origin.0 as f32, origin.1 as f32, origin.2 as f32) * voxel_scale)
}
