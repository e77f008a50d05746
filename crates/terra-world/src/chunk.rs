//! Chunk records and their lock-protected slots.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use terra_mesh::MeshData;
use terra_voxel::{ChunkCoord, ChunkDims, VoxelBuffer};

use crate::error::JobError;
use crate::host::RenderHandle;
use crate::job::{JobKind, JobKindSet};
use crate::props::PropInstance;

/// Lifecycle of a chunk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChunkState {
    /// Slot reserved; terrain not started.
    #[default]
    Empty,
    /// Terrain job running.
    Generating,
    /// Voxel data installed; no current mesh yet.
    Generated,
    /// Mesh job running for the first time.
    Meshing,
    /// Mesh installed and current.
    Ready,
    /// Edited or failed; the mesh (if any) is out of date.
    Dirty,
    /// Being removed from the world.
    Unloading,
}

/// One chunk of the world.
#[derive(Debug)]
pub struct Chunk {
    pub coord: ChunkCoord,
    pub state: ChunkState,
    pub voxels: Arc<VoxelBuffer>,
    pub mesh: Option<Arc<MeshData>>,
    pub props: Vec<PropInstance>,
    /// Bumped on every voxel change; write-backs computed from an older
    /// version are discarded.
    pub version: u64,
    /// Kinds whose results are installed for the current data.
    pub completed: JobKindSet,
    pub last_error: Option<JobError>,
    pub regen_attempts: u8,
    pub render_handle: Option<RenderHandle>,
}

impl Chunk {
    pub fn new(coord: ChunkCoord, dims: ChunkDims) -> Self {
        Self {
            coord,
            state: ChunkState::Empty,
            voxels: Arc::new(VoxelBuffer::new(dims)),
            mesh: None,
            props: Vec::new(),
            version: 0,
            completed: JobKindSet::EMPTY,
            last_error: None,
            regen_attempts: 0,
            render_handle: None,
        }
    }

    /// Returns `true` once terrain data is installed.
    pub fn has_terrain(&self) -> bool {
        self.completed.contains(JobKind::Terrain)
    }

    /// Snapshot for diagnostics.
    pub fn report(&self, queued_jobs: usize) -> ChunkReport {
        let stats = self.mesh.as_ref().map(|m| m.stats).unwrap_or_default();
        ChunkReport {
            coord: self.coord,
            state: self.state,
            version: self.version,
            non_empty_voxels: self.voxels.count_non_empty(),
            mesh_vertices: self.mesh.as_ref().map_or(0, |m| m.vertex_count()),
            mesh_triangles: self.mesh.as_ref().map_or(0, |m| m.triangle_count()),
            mesh_surfaces: self.mesh.as_ref().map_or(0, |m| m.surfaces.len()),
            skipped_faces: stats.skipped_faces,
            invalid_cells: stats.invalid_cells,
            props: self.props.len(),
            completed: self.completed,
            queued_jobs,
            last_error: self.last_error.as_ref().map(ToString::to_string),
            regen_attempts: self.regen_attempts,
            active: self.render_handle.is_some(),
        }
    }
}

/// Read-only view of a chunk for tools and tests.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkReport {
    pub coord: ChunkCoord,
    pub state: ChunkState,
    pub version: u64,
    pub non_empty_voxels: usize,
    pub mesh_vertices: usize,
    pub mesh_triangles: usize,
    pub mesh_surfaces: usize,
    pub skipped_faces: u32,
    pub invalid_cells: u32,
    pub props: usize,
    pub completed: JobKindSet,
    /// Jobs queued, waiting or running for this chunk.
    pub queued_jobs: usize,
    pub last_error: Option<String>,
    pub regen_attempts: u8,
    /// A mesh has been handed to the host.
    pub active: bool,
}

/// Shared storage for one chunk: the data under a mutex plus a liveness
/// flag cleared when the chunk leaves the world.
#[derive(Debug)]
pub struct ChunkSlot {
    chunk: Mutex<Chunk>,
    live: AtomicBool,
}

impl ChunkSlot {
    pub fn new(chunk: Chunk) -> Self {
        Self {
            chunk: Mutex::new(chunk),
            live: AtomicBool::new(true),
        }
    }

    /// Locks the chunk. A poisoned lock is recovered: every write-back is a
    /// single assignment, so the data is never half-written.
    pub fn lock(&self) -> MutexGuard<'_, Chunk> {
        self.chunk.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Marks the slot dead. Takes the lock so no write-back is mid-flight.
    pub fn kill(&self) {
        let mut chunk = self.lock();
        chunk.state = ChunkState::Unloading;
        self.live.store(false, Ordering::Release);
    }
}
