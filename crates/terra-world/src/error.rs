//! Error types for jobs, the scheduler and the world.

use terra_library::LibraryError;
use terra_mesh::MeshError;
use terra_voxel::{ChunkCoord, VoxelError};
use thiserror::Error;

use crate::job::JobKind;

/// Why a job did not complete.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum JobError {
    /// The chunk was unloaded; the job must not write back.
    #[error("job cancelled")]
    Cancelled,

    /// A job was submitted for a chunk where one of its dependency kinds is
    /// neither done nor scheduled. Indicates a scheduling bug.
    #[error("{kind:?} job for chunk {coord} depends on {missing:?}, which is neither done nor scheduled")]
    DependencyMissing {
        coord: ChunkCoord,
        kind: JobKind,
        missing: JobKind,
    },

    /// A dependency of this job failed, so it can never run.
    #[error("{kind:?} job aborted: dependency {failed:?} did not complete")]
    DependencyFailed { kind: JobKind, failed: JobKind },

    /// The world has no level generator.
    #[error("no level generator configured")]
    GeneratorMissing,

    /// The mesher rejected the chunk's voxel data.
    #[error("mesher data invalid: {0}")]
    MesherDataInvalid(String),

    /// The chunk's voxel data changed while the job ran.
    #[error("chunk data changed while the job ran")]
    Stale,

    /// The target chunk is no longer in the world.
    #[error("chunk {0} is no longer loaded")]
    ChunkGone(ChunkCoord),

    /// The job panicked on its worker thread.
    #[error("job panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Voxel(#[from] VoxelError),
}

impl JobError {
    /// Returns `true` for outcomes that are expected and only suppress the
    /// write-back.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, JobError::Cancelled | JobError::Stale | JobError::ChunkGone(_))
    }
}

impl From<MeshError> for JobError {
    fn from(err: MeshError) -> Self {
        match err {
            MeshError::MesherDataInvalid { reason } => JobError::MesherDataInvalid(reason),
            other => JobError::MesherDataInvalid(other.to_string()),
        }
    }
}

/// Errors from the job scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A worker thread could not be spawned.
    #[error("failed to spawn job worker: {0}")]
    Spawn(#[from] std::io::Error),

    /// The scheduler has been shut down.
    #[error("scheduler is shut down")]
    ShutDown,

    /// The submission was rejected.
    #[error(transparent)]
    Rejected(#[from] JobError),
}

/// Errors returned by [`crate::World`] operations.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The chunk coordinate lies outside the configured world bounds.
    #[error("chunk {0} is outside the world bounds")]
    OutOfBounds(ChunkCoord),

    /// The chunk is not loaded, or its terrain is not generated yet.
    #[error("chunk {0} is not loaded")]
    ChunkNotLoaded(ChunkCoord),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Voxel(#[from] VoxelError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
