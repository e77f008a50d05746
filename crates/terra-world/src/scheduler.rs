//! Per-chunk job scheduler with dependencies, priorities and cooperative
//! cancellation.
//!
//! The scheduler itself lives on the coordinating thread. Ready jobs wait in
//! a min-heap keyed by `(distance_sq, kind priority, insertion sequence)`;
//! [`JobScheduler::pump`] hands them to a pool of named worker threads over
//! crossbeam channels and [`JobScheduler::drain`] collects what finished.
//! Jobs whose dependencies are not yet done for their chunk sit in a
//! per-chunk waiting list until a completion releases them.

use std::any::Any;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use rustc_hash::{FxHashMap, FxHashSet};
use terra_voxel::ChunkCoord;

use crate::error::{JobError, SchedulerError};
use crate::job::{JobContext, JobId, JobKind, JobKindSet, JobOutcome, JobStatus, JobTask};

/// Worker pool sizing and dispatch limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Worker threads; 0 derives the count from the CPU count.
    pub worker_threads: usize,
    /// Jobs allowed on workers at once.
    pub max_in_flight: usize,
    /// Jobs dispatched by a single [`JobScheduler::pump`].
    pub max_jobs_per_pump: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_in_flight: 64,
            max_jobs_per_pump: 64,
        }
    }
}

/// Worker count leaving one core for the coordinating thread.
pub fn default_worker_count() -> usize {
    (num_cpus::get().max(2) - 1).max(1)
}

type QueueKey = Reverse<(u64, u8, u64, JobId)>;

struct PendingJob {
    id: JobId,
    coord: ChunkCoord,
    kind: JobKind,
    distance_sq: u64,
    seq: u64,
    deps: JobKindSet,
    task: Box<dyn JobTask>,
}

impl PendingJob {
    fn key(&self) -> QueueKey {
        Reverse((self.distance_sq, self.kind.priority(), self.seq, self.id))
    }
}

struct Dispatch {
    ctx: JobContext,
    task: Box<dyn JobTask>,
}

struct Completion {
    id: JobId,
    coord: ChunkCoord,
    kind: JobKind,
    result: Result<(), JobError>,
    cancelled: bool,
}

/// Bookkeeping for one chunk coordinate.
#[derive(Default)]
struct ChunkJobs {
    done: JobKindSet,
    /// Kinds with a job in the ready heap or the waiting list.
    queued: JobKindSet,
    queued_ids: [Option<JobId>; 4],
    running: JobKindSet,
    cancel: Arc<AtomicBool>,
    cancelled: bool,
}

impl ChunkJobs {
    fn scheduled(&self) -> JobKindSet {
        self.done.union(self.queued).union(self.running)
    }

    fn deps_satisfied(&self, deps: JobKindSet) -> bool {
        deps.iter()
            .all(|k| self.done.contains(k) && !self.queued.contains(k) && !self.running.contains(k))
    }

    fn unqueue(&mut self, kind: JobKind) {
        self.queued.remove(kind);
        self.queued_ids[kind as usize] = None;
    }
}

/// Dependency-aware job scheduler backed by a worker pool.
pub struct JobScheduler {
    config: SchedulerConfig,
    task_tx: Option<Sender<Dispatch>>,
    done_rx: Receiver<Completion>,
    workers: Vec<JoinHandle<()>>,

    ready: BinaryHeap<QueueKey>,
    ready_jobs: FxHashMap<JobId, PendingJob>,
    waiting: FxHashMap<ChunkCoord, Vec<PendingJob>>,
    chunks: FxHashMap<ChunkCoord, ChunkJobs>,
    /// Coordinates whose mesh jobs are held back.
    closed_gates: FxHashSet<ChunkCoord>,
    outcomes: Vec<JobOutcome>,

    in_flight: usize,
    next_id: u64,
    next_seq: u64,
}

impl JobScheduler {
    /// Spawns the worker pool.
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        let threads = if config.worker_threads == 0 {
            default_worker_count()
        } else {
            config.worker_threads
        };
        let (task_tx, task_rx) = unbounded::<Dispatch>();
        let (done_tx, done_rx) = unbounded::<Completion>();

        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads {
            let rx = task_rx.clone();
            let tx = done_tx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("terra-job-worker-{i}"))
                .spawn(move || worker_loop(rx, tx))?;
            workers.push(handle);
        }
        tracing::debug!(threads, max_in_flight = config.max_in_flight, "job scheduler started");

        Ok(Self {
            config,
            task_tx: Some(task_tx),
            done_rx,
            workers,
            ready: BinaryHeap::new(),
            ready_jobs: FxHashMap::default(),
            waiting: FxHashMap::default(),
            chunks: FxHashMap::default(),
            closed_gates: FxHashSet::default(),
            outcomes: Vec::new(),
            in_flight: 0,
            next_id: 0,
            next_seq: 0,
        })
    }

    /// Scheduler with a CPU-derived worker count.
    pub fn with_defaults() -> Result<Self, SchedulerError> {
        Self::new(SchedulerConfig::default())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Queues `task` as the `kind` job of `coord`.
    ///
    /// Every dependency kind must be done, queued or running for the same
    /// chunk; otherwise the submission is rejected with
    /// [`JobError::DependencyMissing`]. A job of the same kind that is still
    /// queued absorbs the submission and its id is returned.
    pub fn submit(
        &mut self,
        coord: ChunkCoord,
        kind: JobKind,
        distance_sq: u64,
        dependencies: &[JobKind],
        task: Box<dyn JobTask>,
    ) -> Result<JobId, SchedulerError> {
        if self.task_tx.is_none() {
            return Err(SchedulerError::ShutDown);
        }

        let entry = self.chunks.entry(coord).or_default();
        if entry.cancelled {
            // A cancelled chunk requested again starts over with a fresh
            // flag; jobs still running keep the old one.
            *entry = ChunkJobs {
                running: entry.running,
                ..ChunkJobs::default()
            };
        }

        let deps = JobKindSet::from_kinds(dependencies);
        let scheduled = entry.scheduled();
        if let Some(missing) = deps.iter().find(|&d| !scheduled.contains(d)) {
            tracing::error!(%coord, ?kind, ?missing, "scheduler invariant violated: dependency missing");
            return Err(JobError::DependencyMissing {
                coord,
                kind,
                missing,
            }
            .into());
        }

        if let Some(id) = entry.queued_ids[kind as usize] {
            return Ok(id);
        }

        self.next_id += 1;
        self.next_seq += 1;
        let id = JobId(self.next_id);
        entry.queued.insert(kind);
        entry.queued_ids[kind as usize] = Some(id);
        let ready_now = entry.deps_satisfied(deps);

        // Ready jobs that depend on this kind must wait for the new run.
        let demoted: Vec<JobId> = self
            .ready_jobs
            .values()
            .filter(|j| j.coord == coord && j.deps.contains(kind))
            .map(|j| j.id)
            .collect();
        for demoted_id in demoted {
            if let Some(job) = self.ready_jobs.remove(&demoted_id) {
                self.waiting.entry(coord).or_default().push(job);
            }
        }

        let job = PendingJob {
            id,
            coord,
            kind,
            distance_sq,
            seq: self.next_seq,
            deps,
            task,
        };
        if ready_now {
            self.ready.push(job.key());
            self.ready_jobs.insert(id, job);
        } else {
            self.waiting.entry(coord).or_default().push(job);
        }
        tracing::trace!(%coord, ?kind, %id, ready = ready_now, "job queued");
        Ok(id)
    }

    /// Dispatches ready jobs to the workers. Returns how many were sent.
    ///
    /// Jobs whose kind is already running for their chunk, and mesh jobs
    /// behind a closed neighbour gate, stay queued.
    pub fn pump(&mut self) -> usize {
        let Some(tx) = self.task_tx.as_ref() else {
            return 0;
        };
        let mut held = Vec::new();
        let mut dispatched = 0;

        while self.in_flight < self.config.max_in_flight && dispatched < self.config.max_jobs_per_pump {
            let Some(key) = self.ready.pop() else {
                break;
            };
            let Reverse((_, _, _, id)) = key;
            let Some(job) = self.ready_jobs.get(&id) else {
                continue;
            };
            let Some(entry) = self.chunks.get_mut(&job.coord) else {
                self.ready_jobs.remove(&id);
                continue;
            };
            let gated = job.kind == JobKind::Mesh && self.closed_gates.contains(&job.coord);
            if entry.running.contains(job.kind) || gated {
                held.push(key);
                continue;
            }
            let Some(job) = self.ready_jobs.remove(&id) else {
                continue;
            };

            entry.unqueue(job.kind);
            entry.running.insert(job.kind);
            let ctx = JobContext::new(job.id, job.coord, job.kind, Arc::clone(&entry.cancel));
            tracing::trace!(coord = %job.coord, kind = ?job.kind, id = %job.id, "job dispatched");

            if tx.send(Dispatch { ctx, task: job.task }).is_err() {
                entry.running.remove(job.kind);
                tracing::error!(coord = %job.coord, kind = ?job.kind, "job workers are gone");
                self.outcomes.push(JobOutcome {
                    id: job.id,
                    coord: job.coord,
                    kind: job.kind,
                    status: JobStatus::Failed,
                    error: Some(JobError::Panicked("job workers are gone".into())),
                });
                continue;
            }
            self.in_flight += 1;
            dispatched += 1;
        }
        self.ready.extend(held);
        dispatched
    }

    /// Collects finished jobs, releasing their dependents. Also returns
    /// outcomes buffered by [`Self::cancel`] and [`Self::wait_for`].
    pub fn drain(&mut self) -> Vec<JobOutcome> {
        while let Ok(completion) = self.done_rx.try_recv() {
            self.complete(completion);
        }
        std::mem::take(&mut self.outcomes)
    }

    /// Blocks until no job of `coord` is running. Outcomes of other chunks
    /// received meanwhile are kept for the next [`Self::drain`].
    pub fn wait_for(&mut self, coord: ChunkCoord) {
        while self
            .chunks
            .get(&coord)
            .is_some_and(|entry| !entry.running.is_empty())
        {
            match self.done_rx.recv() {
                Ok(completion) => self.complete(completion),
                Err(_) => break,
            }
        }
    }

    /// Cancels every job of `coord`: queued and waiting jobs are dropped as
    /// cancelled outcomes, running jobs see the cancellation flag. Returns
    /// the number of dropped jobs.
    pub fn cancel(&mut self, coord: ChunkCoord) -> usize {
        let Some(entry) = self.chunks.get_mut(&coord) else {
            return 0;
        };
        entry.cancel.store(true, Ordering::Release);
        entry.cancelled = true;
        entry.queued.clear();
        entry.queued_ids = [None; 4];

        let ready_ids: Vec<JobId> = self
            .ready_jobs
            .values()
            .filter(|j| j.coord == coord)
            .map(|j| j.id)
            .collect();
        let mut dropped: Vec<PendingJob> = ready_ids
            .iter()
            .filter_map(|id| self.ready_jobs.remove(id))
            .collect();
        dropped.extend(self.waiting.remove(&coord).unwrap_or_default());
        dropped.sort_by_key(|j| j.seq);

        for job in &dropped {
            self.outcomes.push(JobOutcome {
                id: job.id,
                coord,
                kind: job.kind,
                status: JobStatus::Cancelled,
                error: Some(JobError::Cancelled),
            });
        }
        if entry.running.is_empty() {
            self.chunks.remove(&coord);
        }
        self.closed_gates.remove(&coord);
        tracing::debug!(%coord, dropped = dropped.len(), "jobs cancelled");
        dropped.len()
    }

    /// Opens or closes the neighbour gate for `coord`'s mesh job.
    pub fn set_neighbor_gate(&mut self, coord: ChunkCoord, ready: bool) {
        if ready {
            self.closed_gates.remove(&coord);
        } else {
            self.closed_gates.insert(coord);
        }
    }

    /// Coordinates with a queued job of `kind`.
    pub fn coords_with_queued(&self, kind: JobKind) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self
            .chunks
            .iter()
            .filter(|(_, e)| e.queued.contains(kind))
            .map(|(c, _)| *c)
            .collect();
        coords.sort_unstable();
        coords
    }

    /// Jobs ready to dispatch.
    pub fn queued_len(&self) -> usize {
        self.ready_jobs.len()
    }

    /// Jobs waiting on dependencies.
    pub fn waiting_len(&self) -> usize {
        self.waiting.values().map(Vec::len).sum()
    }

    /// Jobs on workers.
    pub fn running_len(&self) -> usize {
        self.in_flight
    }

    /// Returns `true` if nothing is queued, waiting or running.
    pub fn is_idle(&self) -> bool {
        self.ready_jobs.is_empty() && self.waiting_len() == 0 && self.in_flight == 0
    }

    /// Queued, waiting and running jobs of one chunk.
    pub fn queue_depth(&self, coord: ChunkCoord) -> usize {
        let ready = self.ready_jobs.values().filter(|j| j.coord == coord).count();
        let waiting = self.waiting.get(&coord).map_or(0, Vec::len);
        let running = self.chunks.get(&coord).map_or(0, |e| e.running.len());
        ready + waiting + running
    }

    /// Kinds that have completed for `coord`.
    pub fn completed_kinds(&self, coord: ChunkCoord) -> JobKindSet {
        self.chunks.get(&coord).map_or(JobKindSet::EMPTY, |e| e.done)
    }

    /// Kinds queued, waiting or running for `coord`.
    pub fn pending_kinds(&self, coord: ChunkCoord) -> JobKindSet {
        self.chunks
            .get(&coord)
            .map_or(JobKindSet::EMPTY, |e| e.queued.union(e.running))
    }

    /// Stops accepting work, lets the workers finish what they hold and
    /// joins them.
    pub fn shutdown(&mut self) {
        if self.task_tx.take().is_none() {
            return;
        }
        self.ready.clear();
        self.ready_jobs.clear();
        self.waiting.clear();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        tracing::debug!("job scheduler stopped");
    }

    fn complete(&mut self, completion: Completion) {
        let Completion {
            id,
            coord,
            kind,
            result,
            cancelled,
        } = completion;
        self.in_flight = self.in_flight.saturating_sub(1);

        let (status, error) = match result {
            _ if cancelled => (JobStatus::Cancelled, Some(JobError::Cancelled)),
            Ok(()) => (JobStatus::Done, None),
            Err(err) if err.is_cancellation() => (JobStatus::Cancelled, Some(err)),
            Err(err) => (JobStatus::Failed, Some(err)),
        };
        match status {
            JobStatus::Failed => {
                tracing::warn!(%coord, ?kind, %id, error = ?error, "job failed");
            }
            _ => tracing::trace!(%coord, ?kind, %id, ?status, "job completed"),
        }

        if let Some(entry) = self.chunks.get_mut(&coord) {
            entry.running.remove(kind);
            // Only the latest run of a kind counts towards its dependents.
            if status == JobStatus::Done {
                entry.done.insert(kind);
            } else {
                entry.done.remove(kind);
            }
        }
        self.outcomes.push(JobOutcome {
            id,
            coord,
            kind,
            status,
            error,
        });
        self.settle(coord);
    }

    /// Moves waiting jobs of `coord` whose dependencies are now done to the
    /// ready heap and fails those whose dependencies can no longer run.
    fn settle(&mut self, coord: ChunkCoord) {
        let Some(entry) = self.chunks.get_mut(&coord) else {
            return;
        };
        if entry.cancelled {
            if entry.running.is_empty() {
                self.chunks.remove(&coord);
                self.waiting.remove(&coord);
            }
            return;
        }
        let Some(mut waiting) = self.waiting.remove(&coord) else {
            return;
        };

        loop {
            let mut changed = false;
            let mut still_waiting = Vec::with_capacity(waiting.len());
            for job in waiting {
                if entry.deps_satisfied(job.deps) {
                    self.ready.push(job.key());
                    self.ready_jobs.insert(job.id, job);
                    changed = true;
                } else if let Some(failed) = job.deps.iter().find(|&d| !entry.scheduled().contains(d)) {
                    entry.unqueue(job.kind);
                    entry.done.remove(job.kind);
                    tracing::warn!(%coord, kind = ?job.kind, ?failed, "job aborted after dependency failure");
                    self.outcomes.push(JobOutcome {
                        id: job.id,
                        coord,
                        kind: job.kind,
                        status: JobStatus::Failed,
                        error: Some(JobError::DependencyFailed {
                            kind: job.kind,
                            failed,
                        }),
                    });
                    changed = true;
                } else {
                    still_waiting.push(job);
                }
            }
            waiting = still_waiting;
            if !changed || waiting.is_empty() {
                break;
            }
        }
        if !waiting.is_empty() {
            self.waiting.insert(coord, waiting);
        }
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(rx: Receiver<Dispatch>, tx: Sender<Completion>) {
    while let Ok(Dispatch { ctx, task }) = rx.recv() {
        let result = if ctx.is_cancelled() {
            Err(JobError::Cancelled)
        } else {
            match panic::catch_unwind(AssertUnwindSafe(|| task.run(&ctx))) {
                Ok(result) => result,
                Err(payload) => Err(JobError::Panicked(panic_message(payload.as_ref()))),
            }
        };
        let completion = Completion {
            id: ctx.id,
            coord: ctx.coord,
            kind: ctx.kind,
            cancelled: ctx.is_cancelled(),
            result,
        };
        if tx.send(completion).is_err() {
            break;
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn scheduler(workers: usize) -> JobScheduler {
        JobScheduler::new(SchedulerConfig {
            worker_threads: workers,
            max_in_flight: 16,
            max_jobs_per_pump: 16,
        })
        .unwrap()
    }

    fn run_until_idle(sched: &mut JobScheduler) -> Vec<JobOutcome> {
        let deadline = Instant::now() + Duration::from_secs(10);
        let mut outcomes = Vec::new();
        loop {
            sched.pump();
            outcomes.extend(sched.drain());
            if sched.is_idle() {
                outcomes.extend(sched.drain());
                return outcomes;
            }
            assert!(Instant::now() < deadline, "timed out waiting for jobs");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    type Log = Arc<Mutex<Vec<(ChunkCoord, JobKind)>>>;

    fn logging_task(log: &Log, coord: ChunkCoord, kind: JobKind, sleep_us: u64) -> Box<dyn JobTask> {
        let log = Arc::clone(log);
        Box::new(move |ctx: &JobContext| -> Result<(), JobError> {
            std::thread::sleep(Duration::from_micros(sleep_us));
            ctx.check_cancelled()?;
            log.lock().unwrap().push((coord, kind));
            Ok(())
        })
    }

    // -----------------------------------------------------------------------
    // Ordering
    // -----------------------------------------------------------------------

    #[test]
    fn test_dependency_chain_runs_in_order() {
        let mut sched = scheduler(4);
        let log: Log = Arc::default();
        let c = ChunkCoord::new(0, 0, 0);
        sched
            .submit(c, JobKind::Terrain, 0, &[], logging_task(&log, c, JobKind::Terrain, 300))
            .unwrap();
        sched
            .submit(c, JobKind::Light, 0, &[JobKind::Terrain], logging_task(&log, c, JobKind::Light, 0))
            .unwrap();
        sched
            .submit(c, JobKind::Prop, 0, &[JobKind::Light], logging_task(&log, c, JobKind::Prop, 0))
            .unwrap();
        assert_eq!(sched.queued_len(), 1);
        assert_eq!(sched.waiting_len(), 2);

        let outcomes = run_until_idle(&mut sched);
        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.status == JobStatus::Done));
        let kinds: Vec<JobKind> = log.lock().unwrap().iter().map(|(_, k)| *k).collect();
        assert_eq!(kinds, vec![JobKind::Terrain, JobKind::Light, JobKind::Prop]);
        assert!(sched.completed_kinds(c).contains(JobKind::Prop));
    }

    #[test]
    fn test_dag_order_holds_under_random_interleavings() {
        for seed in 0..12u64 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut sched = scheduler(4);
            let log: Log = Arc::default();
            let coords: Vec<ChunkCoord> = (0..8).map(|i| ChunkCoord::new(i, 0, 0)).collect();
            let chain = [
                (JobKind::Terrain, &[][..]),
                (JobKind::Light, &[JobKind::Terrain][..]),
                (JobKind::Prop, &[JobKind::Light][..]),
            ];
            let mut next = vec![0usize; coords.len()];
            while next.iter().any(|&n| n < chain.len()) {
                let i = rng.random_range(0..coords.len());
                if next[i] == chain.len() {
                    continue;
                }
                let (kind, deps) = chain[next[i]];
                let sleep = rng.random_range(0..400);
                let distance = rng.random_range(0..10);
                sched
                    .submit(coords[i], kind, distance, deps, logging_task(&log, coords[i], kind, sleep))
                    .unwrap();
                next[i] += 1;
                if rng.random_bool(0.3) {
                    sched.pump();
                }
            }
            let outcomes = run_until_idle(&mut sched);
            assert_eq!(outcomes.len(), coords.len() * 3, "seed {seed}");

            let log = log.lock().unwrap();
            for &c in &coords {
                let order: Vec<JobKind> = log.iter().filter(|(lc, _)| *lc == c).map(|(_, k)| *k).collect();
                assert_eq!(order, vec![JobKind::Terrain, JobKind::Light, JobKind::Prop], "seed {seed}");
            }
        }
    }

    #[test]
    fn test_priority_is_distance_then_kind_then_insertion() {
        let mut sched = JobScheduler::new(SchedulerConfig {
            worker_threads: 1,
            max_in_flight: 1,
            max_jobs_per_pump: 1,
        })
        .unwrap();
        let log: Log = Arc::default();
        let far = ChunkCoord::new(5, 0, 0);
        let near_a = ChunkCoord::new(1, 0, 0);
        let near_b = ChunkCoord::new(0, 1, 0);
        sched.submit(far, JobKind::Terrain, 25, &[], logging_task(&log, far, JobKind::Terrain, 0)).unwrap();
        sched.submit(near_a, JobKind::Prop, 1, &[], logging_task(&log, near_a, JobKind::Prop, 0)).unwrap();
        sched.submit(near_b, JobKind::Terrain, 1, &[], logging_task(&log, near_b, JobKind::Terrain, 0)).unwrap();
        sched.submit(near_a, JobKind::Terrain, 1, &[], logging_task(&log, near_a, JobKind::Terrain, 0)).unwrap();

        run_until_idle(&mut sched);
        let order = log.lock().unwrap().clone();
        assert_eq!(
            order,
            vec![
                (near_b, JobKind::Terrain),
                (near_a, JobKind::Terrain),
                (near_a, JobKind::Prop),
                (far, JobKind::Terrain),
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Submission rules
    // -----------------------------------------------------------------------

    #[test]
    fn test_missing_dependency_is_rejected() {
        let mut sched = scheduler(1);
        let log: Log = Arc::default();
        let c = ChunkCoord::new(2, 0, 0);
        let err = sched
            .submit(c, JobKind::Light, 0, &[JobKind::Terrain], logging_task(&log, c, JobKind::Light, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            SchedulerError::Rejected(JobError::DependencyMissing {
                kind: JobKind::Light,
                missing: JobKind::Terrain,
                ..
            })
        ));
        assert!(sched.is_idle());
    }

    #[test]
    fn test_queued_job_of_same_kind_is_coalesced() {
        let mut sched = scheduler(1);
        let log: Log = Arc::default();
        let c = ChunkCoord::new(0, 0, 0);
        let a = sched.submit(c, JobKind::Terrain, 0, &[], logging_task(&log, c, JobKind::Terrain, 0)).unwrap();
        let b = sched.submit(c, JobKind::Terrain, 0, &[], logging_task(&log, c, JobKind::Terrain, 0)).unwrap();
        assert_eq!(a, b);
        let outcomes = run_until_idle(&mut sched);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_resubmitted_dependency_delays_ready_dependent() {
        let mut sched = scheduler(2);
        let log: Log = Arc::default();
        let c = ChunkCoord::new(0, 0, 0);
        sched.submit(c, JobKind::Terrain, 0, &[], logging_task(&log, c, JobKind::Terrain, 0)).unwrap();
        run_until_idle(&mut sched);

        sched.submit(c, JobKind::Mesh, 0, &[JobKind::Terrain], logging_task(&log, c, JobKind::Mesh, 0)).unwrap();
        assert_eq!(sched.queued_len(), 1);
        sched.submit(c, JobKind::Terrain, 0, &[], logging_task(&log, c, JobKind::Terrain, 200)).unwrap();
        assert_eq!(sched.queued_len(), 1);
        assert_eq!(sched.waiting_len(), 1);

        run_until_idle(&mut sched);
        let kinds: Vec<JobKind> = log.lock().unwrap().iter().map(|(_, k)| *k).collect();
        assert_eq!(kinds, vec![JobKind::Terrain, JobKind::Terrain, JobKind::Mesh]);
    }

    // -----------------------------------------------------------------------
    // Failure and cancellation
    // -----------------------------------------------------------------------

    #[test]
    fn test_failure_aborts_dependents() {
        let mut sched = scheduler(2);
        let log: Log = Arc::default();
        let c = ChunkCoord::new(0, 0, 0);
        sched
            .submit(c, JobKind::Terrain, 0, &[], Box::new(|_: &JobContext| -> Result<(), JobError> {
                Err(JobError::GeneratorMissing)
            }))
            .unwrap();
        sched.submit(c, JobKind::Light, 0, &[JobKind::Terrain], logging_task(&log, c, JobKind::Light, 0)).unwrap();
        sched.submit(c, JobKind::Mesh, 0, &[JobKind::Light], logging_task(&log, c, JobKind::Mesh, 0)).unwrap();

        let outcomes = run_until_idle(&mut sched);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].status, JobStatus::Failed);
        assert_eq!(outcomes[0].error, Some(JobError::GeneratorMissing));
        assert!(outcomes[1..].iter().all(|o| o.status == JobStatus::Failed));
        assert!(matches!(
            outcomes[2].error,
            Some(JobError::DependencyFailed { kind: JobKind::Mesh, .. })
        ));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_rerun_aborts_dependents_of_earlier_success() {
        let mut sched = scheduler(2);
        let log: Log = Arc::default();
        let c = ChunkCoord::new(0, 0, 0);
        sched.submit(c, JobKind::Terrain, 0, &[], logging_task(&log, c, JobKind::Terrain, 0)).unwrap();
        sched.submit(c, JobKind::Light, 0, &[JobKind::Terrain], logging_task(&log, c, JobKind::Light, 0)).unwrap();
        run_until_idle(&mut sched);
        assert!(sched.completed_kinds(c).contains(JobKind::Light));

        sched
            .submit(c, JobKind::Terrain, 0, &[], Box::new(|_: &JobContext| -> Result<(), JobError> {
                Err(JobError::GeneratorMissing)
            }))
            .unwrap();
        sched.submit(c, JobKind::Light, 0, &[JobKind::Terrain], logging_task(&log, c, JobKind::Light, 0)).unwrap();
        sched.submit(c, JobKind::Mesh, 0, &[JobKind::Light], logging_task(&log, c, JobKind::Mesh, 0)).unwrap();

        let outcomes = run_until_idle(&mut sched);
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].kind, JobKind::Terrain);
        assert_eq!(outcomes[0].error, Some(JobError::GeneratorMissing));
        for outcome in &outcomes[1..] {
            assert_eq!(outcome.status, JobStatus::Failed);
            assert!(matches!(outcome.error, Some(JobError::DependencyFailed { .. })));
        }
        assert_eq!(*log.lock().unwrap(), vec![(c, JobKind::Terrain), (c, JobKind::Light)]);
        let done = sched.completed_kinds(c);
        assert!(!done.contains(JobKind::Terrain));
        assert!(!done.contains(JobKind::Light));
    }

    #[test]
    fn test_panicking_task_is_reported() {
        let mut sched = scheduler(1);
        let c = ChunkCoord::new(0, 0, 0);
        sched
            .submit(c, JobKind::Terrain, 0, &[], Box::new(|_: &JobContext| -> Result<(), JobError> {
                panic!("boom")
            }))
            .unwrap();
        let outcomes = run_until_idle(&mut sched);
        assert_eq!(outcomes[0].status, JobStatus::Failed);
        assert_eq!(outcomes[0].error, Some(JobError::Panicked("boom".into())));

        // The worker survives.
        let log: Log = Arc::default();
        sched.submit(c, JobKind::Light, 0, &[], logging_task(&log, c, JobKind::Light, 0)).unwrap();
        run_until_idle(&mut sched);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_cancel_drops_queued_and_flags_running() {
        let mut sched = scheduler(1);
        let log: Log = Arc::default();
        let c = ChunkCoord::new(0, 0, 0);
        let started = Arc::new(AtomicBool::new(false));
        let started_in_task = Arc::clone(&started);
        sched
            .submit(c, JobKind::Terrain, 0, &[], Box::new(move |ctx: &JobContext| -> Result<(), JobError> {
                started_in_task.store(true, Ordering::Release);
                let deadline = Instant::now() + Duration::from_secs(5);
                while !ctx.is_cancelled() && Instant::now() < deadline {
                    std::thread::sleep(Duration::from_micros(100));
                }
                ctx.check_cancelled()
            }))
            .unwrap();
        sched.submit(c, JobKind::Light, 0, &[JobKind::Terrain], logging_task(&log, c, JobKind::Light, 0)).unwrap();
        sched.pump();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !started.load(Ordering::Acquire) {
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(sched.cancel(c), 1);
        sched.wait_for(c);
        assert_eq!(sched.queue_depth(c), 0);
        let outcomes = sched.drain();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.status == JobStatus::Cancelled));
        assert!(sched.is_idle());
        assert!(log.lock().unwrap().is_empty());

        // Requesting the chunk again starts from scratch.
        sched.submit(c, JobKind::Terrain, 0, &[], logging_task(&log, c, JobKind::Terrain, 0)).unwrap();
        run_until_idle(&mut sched);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_neighbor_gate_holds_mesh_jobs() {
        let mut sched = scheduler(1);
        let log: Log = Arc::default();
        let c = ChunkCoord::new(0, 0, 0);
        sched.set_neighbor_gate(c, false);
        sched.submit(c, JobKind::Mesh, 0, &[], logging_task(&log, c, JobKind::Mesh, 0)).unwrap();
        sched.submit(c, JobKind::Terrain, 0, &[], logging_task(&log, c, JobKind::Terrain, 0)).unwrap();
        assert_eq!(sched.coords_with_queued(JobKind::Mesh), vec![c]);

        let deadline = Instant::now() + Duration::from_secs(5);
        while log.lock().unwrap().is_empty() {
            sched.pump();
            sched.drain();
            assert!(Instant::now() < deadline);
            std::thread::sleep(Duration::from_millis(1));
        }
        sched.pump();
        assert_eq!(sched.queued_len(), 1);
        assert_eq!(log.lock().unwrap().len(), 1);

        sched.set_neighbor_gate(c, true);
        run_until_idle(&mut sched);
        assert_eq!(log.lock().unwrap().last(), Some(&(c, JobKind::Mesh)));
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut sched = scheduler(2);
        assert_eq!(sched.worker_count(), 2);
        sched.shutdown();
        assert_eq!(sched.worker_count(), 0);
        let result = sched.submit(
            ChunkCoord::default(),
            JobKind::Terrain,
            0,
            &[],
            Box::new(|_: &JobContext| -> Result<(), JobError> { Ok(()) }),
        );
        assert!(matches!(result, Err(SchedulerError::ShutDown)));
    }
}
