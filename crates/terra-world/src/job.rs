//! Job kinds, statuses and the task contract run by the scheduler.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use terra_voxel::ChunkCoord;

use crate::error::JobError;

/// Identifier handed out by [`crate::JobScheduler::submit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The per-chunk pipeline stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobKind {
    /// Fills the voxel buffer from the level generator and structures.
    Terrain,
    /// Computes light and occlusion channels.
    Light,
    /// Runs the configured mesher.
    Mesh,
    /// Places surface decorations.
    Prop,
}

impl JobKind {
    pub const ALL: [JobKind; 4] = [JobKind::Terrain, JobKind::Light, JobKind::Mesh, JobKind::Prop];

    /// Tie-break among jobs at the same distance; lower runs first.
    pub fn priority(self) -> u8 {
        self as u8
    }

    /// Kinds that must be done for the same chunk before this one starts.
    pub fn default_dependencies(self) -> &'static [JobKind] {
        match self {
            JobKind::Terrain => &[],
            JobKind::Light => &[JobKind::Terrain],
            JobKind::Mesh => &[JobKind::Light],
            JobKind::Prop => &[JobKind::Mesh],
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Lifecycle of a single job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Cancelled,
    Failed,
}

/// Small set of [`JobKind`]s.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKindSet(u8);

impl JobKindSet {
    pub const EMPTY: JobKindSet = JobKindSet(0);

    pub fn from_kinds(kinds: &[JobKind]) -> Self {
        kinds.iter().fold(Self::EMPTY, |set, &k| set.with(k))
    }

    pub fn with(mut self, kind: JobKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn insert(&mut self, kind: JobKind) {
        self.0 |= kind.bit();
    }

    pub fn remove(&mut self, kind: JobKind) {
        self.0 &= !kind.bit();
    }

    pub fn contains(self, kind: JobKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Returns `true` if every kind in `other` is in `self`.
    pub fn contains_all(self, other: JobKindSet) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn union(self, other: JobKindSet) -> Self {
        JobKindSet(self.0 | other.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = JobKind> {
        JobKind::ALL.into_iter().filter(move |&k| self.contains(k))
    }
}

impl fmt::Debug for JobKindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<JobKind> for JobKindSet {
    fn from_iter<I: IntoIterator<Item = JobKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, |set, k| set.with(k))
    }
}

/// What a running task can see about itself.
#[derive(Clone, Debug)]
pub struct JobContext {
    pub id: JobId,
    pub coord: ChunkCoord,
    pub kind: JobKind,
    cancelled: Arc<AtomicBool>,
}

impl JobContext {
    pub fn new(id: JobId, coord: ChunkCoord, kind: JobKind, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            id,
            coord,
            kind,
            cancelled,
        }
    }

    /// Returns `true` once the chunk has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once the chunk has been cancelled.
    pub fn check_cancelled(&self) -> Result<(), JobError> {
        if self.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A unit of per-chunk work executed on a worker thread.
///
/// Tasks read shared state, compute off-lock, and write back under the
/// target chunk's lock after re-checking cancellation.
pub trait JobTask: Send {
    fn run(&self, ctx: &JobContext) -> Result<(), JobError>;
}

impl<F> JobTask for F
where
    F: Fn(&JobContext) -> Result<(), JobError> + Send,
{
    fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        self(ctx)
    }
}

/// Result of one job, reported by [`crate::JobScheduler::drain`].
#[derive(Clone, Debug, PartialEq)]
pub struct JobOutcome {
    pub id: JobId,
    pub coord: ChunkCoord,
    pub kind: JobKind,
    pub status: JobStatus,
    pub error: Option<JobError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_set_operations() {
        let mut set = JobKindSet::from_kinds(&[JobKind::Terrain, JobKind::Mesh]);
        assert!(set.contains(JobKind::Terrain));
        assert!(!set.contains(JobKind::Light));
        assert_eq!(set.len(), 2);
        set.remove(JobKind::Terrain);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![JobKind::Mesh]);
        assert!(set.union(JobKindSet::EMPTY.with(JobKind::Prop)).contains_all(set));
        set.clear();
        assert!(set.is_empty());
    }

    #[test]
    fn test_default_dependencies_form_a_chain() {
        assert!(JobKind::Terrain.default_dependencies().is_empty());
        for pair in JobKind::ALL.windows(2) {
            assert_eq!(pair[1].default_dependencies(), &[pair[0]]);
            assert!(pair[0].priority() < pair[1].priority());
        }
    }

    #[test]
    fn test_context_cancellation() {
        let flag = Arc::new(AtomicBool::new(false));
        let ctx = JobContext::new(JobId(1), ChunkCoord::new(0, 0, 0), JobKind::Light, flag.clone());
        assert!(ctx.check_cancelled().is_ok());
        flag.store(true, Ordering::Release);
        assert_eq!(ctx.check_cancelled(), Err(JobError::Cancelled));
    }

    #[test]
    fn test_closures_are_tasks() {
        let task: Box<dyn JobTask> = Box::new(|ctx: &JobContext| -> Result<(), JobError> {
            assert_eq!(ctx.kind, JobKind::Prop);
            Ok(())
        });
        let ctx = JobContext::new(
            JobId(7),
            ChunkCoord::new(1, 2, 3),
            JobKind::Prop,
            Arc::new(AtomicBool::new(false)),
        );
        assert!(task.run(&ctx).is_ok());
    }
}
