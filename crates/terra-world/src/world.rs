//! The world: chunk map, pipeline dispatch, streaming and introspection.
//!
//! A [`World`] lives on one coordinating thread. It reserves chunk slots,
//! submits the Terrain → Light → Mesh → Prop pipeline for each chunk to the
//! [`JobScheduler`], and on every [`World::update`] turns job outcomes into
//! state changes and host calls. Workers only ever touch a chunk through its
//! [`ChunkSlot`].

use std::sync::atomic::Ordering;
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use glam::Vec3;
use rustc_hash::FxHashSet;
use terra_library::{LibraryError, MaterialLibrary};
use terra_mesh::{MeshData, MesherKind};
use terra_voxel::{
    ChannelKind, ChunkCoord, ChunkDims, MaterialId, WorldBounds, chunk_origin, occupancy_density, world_to_chunk,
};

use crate::chunk::{Chunk, ChunkReport, ChunkSlot, ChunkState};
use crate::error::{JobError, SchedulerError, WorldError};
use crate::generator::LevelGenerator;
use crate::host::{ChunkHost, NullHost, RenderHandle, chunk_transform};
use crate::job::{JobKind, JobKindSet, JobOutcome, JobStatus};
use crate::lighting::{LightId, LightingConfig, WorldLight};
use crate::props::{PropConfig, PropInstance};
use crate::scheduler::{JobScheduler, SchedulerConfig};
use crate::streaming::{ChunkStreamer, StreamingConfig};
use crate::structure::VoxelStructure;
use crate::tasks::{WorldShared, make_task};

/// Automatic terrain regenerations after invalid mesher input.
const MAX_REGEN_ATTEMPTS: u8 = 1;

/// Runtime world configuration.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldConfig {
    pub chunk_dims: ChunkDims,
    /// World units per voxel.
    pub voxel_scale: f32,
    pub bounds: WorldBounds,
    pub mesher: MesherKind,
    /// Run the liquid pass after meshers that leave liquids out.
    pub liquid_mesher: bool,
    pub isolevel: f32,
    pub greedy: bool,
    pub seed: u64,
    /// Remesh loaded neighbours when a chunk's terrain arrives or a border
    /// voxel is edited.
    pub remesh_neighbors: bool,
    pub lighting: LightingConfig,
    pub props: PropConfig,
    pub scheduler: SchedulerConfig,
    pub streaming: StreamingConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            chunk_dims: ChunkDims::cubic(16),
            voxel_scale: 1.0,
            bounds: WorldBounds::unbounded(),
            mesher: MesherKind::Blocky,
            liquid_mesher: true,
            isolevel: 0.0,
            greedy: true,
            seed: 0,
            remesh_neighbors: true,
            lighting: LightingConfig::default(),
            props: PropConfig::default(),
            scheduler: SchedulerConfig::default(),
            streaming: StreamingConfig::default(),
        }
    }
}

/// Something that happened during an update.
#[derive(Clone, Debug, PartialEq)]
pub enum WorldEvent {
    /// Terrain installed.
    ChunkGenerated(ChunkCoord),
    /// Mesh installed and handed to the host. Empty meshes get no handle.
    ChunkReady {
        coord: ChunkCoord,
        handle: Option<RenderHandle>,
    },
    PropsPlaced {
        coord: ChunkCoord,
        count: usize,
    },
    /// A job failed; the chunk is dirty.
    ChunkDirty {
        coord: ChunkCoord,
        error: JobError,
    },
    /// Terrain is being regenerated after invalid mesher input.
    RegenerationRequested(ChunkCoord),
    ChunkUnloaded(ChunkCoord),
}

/// Counters for diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldStats {
    pub loaded: usize,
    pub generating: usize,
    pub ready: usize,
    pub dirty: usize,
    pub queued_jobs: usize,
    pub waiting_jobs: usize,
    pub running_jobs: usize,
    pub cancelled_writebacks: u64,
    pub stale_writebacks: u64,
    pub failures: u64,
}

/// A chunked voxel world.
pub struct World {
    shared: Arc<WorldShared>,
    scheduler: JobScheduler,
    host: Box<dyn ChunkHost>,
    streamer: ChunkStreamer,
    viewer: ChunkCoord,
    next_light: u64,
    failures: u64,
    /// Outcomes collected outside `update`, applied on the next one.
    backlog: Vec<JobOutcome>,
    events: Vec<WorldEvent>,
}

impl World {
    /// Creates a world. The library must be finalized; without a generator
    /// every terrain job fails and chunks end up dirty.
    pub fn new(
        config: WorldConfig,
        library: MaterialLibrary,
        generator: Option<Arc<dyn LevelGenerator>>,
    ) -> Result<Self, WorldError> {
        if !library.is_finalized() {
            return Err(LibraryError::NotFinalized.into());
        }
        let scheduler = JobScheduler::new(config.scheduler.clone())?;
        let streamer = ChunkStreamer::new(config.streaming.clone());
        tracing::info!(
            dims = ?config.chunk_dims,
            mesher = %config.mesher,
            library = ?library.kind(),
            surfaces = library.surface_count(),
            workers = scheduler.worker_count(),
            generator = generator.as_ref().map_or("none", |g| g.name()),
            "world created"
        );
        Ok(Self {
            shared: Arc::new(WorldShared::new(config, library, generator)),
            scheduler,
            host: Box::new(NullHost::default()),
            streamer,
            viewer: ChunkCoord::default(),
            next_light: 0,
            failures: 0,
            backlog: Vec::new(),
            events: Vec::new(),
        })
    }

    /// Replaces the host that receives meshes.
    pub fn with_host(mut self, host: impl ChunkHost + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn config(&self) -> &WorldConfig {
        &self.shared.config
    }

    pub fn library(&self) -> Arc<MaterialLibrary> {
        self.shared.library()
    }

    /// Chunk the viewer was last placed in.
    pub fn viewer(&self) -> ChunkCoord {
        self.viewer
    }

    // -- lifecycle --

    /// Reserves the chunk at `coord` and queues its pipeline. Returns the
    /// current state if the chunk already exists.
    pub fn request_chunk(&mut self, coord: ChunkCoord) -> Result<ChunkState, WorldError> {
        if !self.shared.config.bounds.contains(coord) {
            tracing::debug!(%coord, "chunk request outside world bounds");
            return Err(WorldError::OutOfBounds(coord));
        }
        if let Some(slot) = self.shared.slot(coord) {
            return Ok(slot.lock().state);
        }
        let slot = Arc::new(ChunkSlot::new(Chunk::new(coord, self.shared.config.chunk_dims)));
        self.shared.chunks.insert(coord, Arc::clone(&slot));
        tracing::debug!(%coord, "chunk requested");

        let kinds = self.pipeline_from(JobKind::Terrain);
        self.submit_kinds(coord, &slot, &kinds)?;
        Ok(ChunkState::Empty)
    }

    /// Cancels the chunk's jobs, waits for running ones to observe the
    /// cancellation, then removes the chunk and releases its mesh.
    pub fn unload_chunk(&mut self, coord: ChunkCoord) -> Result<(), WorldError> {
        let slot = self.shared.slot(coord).ok_or(WorldError::ChunkNotLoaded(coord))?;
        let dropped = self.scheduler.cancel(coord);
        slot.kill();
        self.scheduler.wait_for(coord);
        self.shared.chunks.remove(&coord);

        self.backlog.extend(self.scheduler.drain());
        self.backlog.retain(|outcome| outcome.coord != coord);

        let handle = slot.lock().render_handle.take();
        if let Some(handle) = handle {
            self.host.deactivate(coord, handle);
            self.host.release(handle);
        }
        self.events.push(WorldEvent::ChunkUnloaded(coord));
        tracing::debug!(%coord, dropped, "chunk unloaded");
        Ok(())
    }

    /// Current state of a chunk, without triggering generation.
    pub fn get_chunk(&self, coord: ChunkCoord) -> Option<ChunkReport> {
        self.chunk_report(coord).ok()
    }

    /// Dispatches queued jobs and applies finished ones.
    pub fn update(&mut self) -> Vec<WorldEvent> {
        self.refresh_mesh_gates();
        self.scheduler.pump();

        let mut outcomes = std::mem::take(&mut self.backlog);
        outcomes.extend(self.scheduler.drain());
        for outcome in outcomes {
            self.apply_outcome(outcome);
        }

        self.refresh_mesh_gates();
        self.scheduler.pump();
        std::mem::take(&mut self.events)
    }

    /// Updates until no job is queued, waiting or running.
    pub fn flush(&mut self) -> Vec<WorldEvent> {
        let mut events = Vec::new();
        loop {
            events.extend(self.update());
            if self.scheduler.is_idle() && self.backlog.is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        events
    }

    /// Moves the viewer to `position` (world units), streams chunks in and
    /// out around it, then updates.
    pub fn update_viewer(&mut self, position: Vec3) -> Vec<WorldEvent> {
        let viewer = self.chunk_at_world_position(position);
        if viewer != self.viewer {
            tracing::trace!(from = %self.viewer, to = %viewer, "viewer moved");
            self.viewer = viewer;
        }
        let loaded: FxHashSet<ChunkCoord> = self.shared.chunks.iter().map(|entry| *entry.key()).collect();
        let plan = self.streamer.tick(viewer, &loaded, &self.shared.config.bounds);
        for coord in plan.unloads {
            if let Err(err) = self.unload_chunk(coord) {
                tracing::warn!(%coord, %err, "streaming unload failed");
            }
        }
        for coord in plan.loads {
            if let Err(err) = self.request_chunk(coord) {
                tracing::warn!(%coord, %err, "streaming load failed");
            }
        }
        self.update()
    }

    /// Re-runs the whole pipeline of a chunk, resetting its retry budget.
    pub fn retry_chunk(&mut self, coord: ChunkCoord) -> Result<(), WorldError> {
        let slot = self.shared.slot(coord).ok_or(WorldError::ChunkNotLoaded(coord))?;
        {
            let mut chunk = slot.lock();
            chunk.regen_attempts = 0;
            chunk.last_error = None;
        }
        tracing::debug!(%coord, "chunk retry requested");
        let kinds = self.pipeline_from(JobKind::Terrain);
        self.submit_kinds(coord, &slot, &kinds)
    }

    // -- voxel access --

    /// Chunk containing a world-space position.
    pub fn chunk_at_world_position(&self, position: Vec3) -> ChunkCoord {
        let voxel = (position / self.shared.config.voxel_scale).floor();
        let (coord, _) = world_to_chunk(
            (voxel.x as i64, voxel.y as i64, voxel.z as i64),
            self.shared.config.chunk_dims,
        );
        coord
    }

    /// Material at a world voxel of a loaded chunk.
    pub fn get_voxel_at(&self, world: (i64, i64, i64)) -> Result<MaterialId, WorldError> {
        let (coord, (x, y, z)) = self.locate(world)?;
        let slot = self.shared.slot(coord).ok_or(WorldError::ChunkNotLoaded(coord))?;
        Ok(slot.lock().voxels.material(x, y, z))
    }

    /// Sets one voxel and re-runs Light → Mesh (→ Prop) for its chunk.
    pub fn set_voxel_at(&mut self, world: (i64, i64, i64), material: MaterialId) -> Result<(), WorldError> {
        let (coord, (x, y, z)) = self.locate(world)?;
        let slot = self.shared.slot(coord).ok_or(WorldError::ChunkNotLoaded(coord))?;
        {
            let mut chunk = slot.lock();
            if !chunk.has_terrain() {
                return Err(WorldError::ChunkNotLoaded(coord));
            }
            if chunk.voxels.material(x, y, z) == material {
                return Ok(());
            }
            let mut voxels = (*chunk.voxels).clone();
            voxels.set_material(x, y, z, material)?;
            if voxels.has(ChannelKind::Density) {
                voxels.set_density(x, y, z, occupancy_density(material))?;
            }
            chunk.voxels = Arc::new(voxels);
            mark_edited(&mut chunk);
        }
        tracing::trace!(%coord, ?world, ?material, "voxel edited");

        let kinds = self.pipeline_from(JobKind::Light);
        self.submit_kinds(coord, &slot, &kinds)?;
        if self.shared.config.remesh_neighbors {
            for neighbor in border_neighbors(coord, (x, y, z), self.shared.config.chunk_dims) {
                self.request_remesh(neighbor);
            }
        }
        Ok(())
    }

    fn locate(&self, world: (i64, i64, i64)) -> Result<(ChunkCoord, (usize, usize, usize)), WorldError> {
        let (coord, local) = world_to_chunk(world, self.shared.config.chunk_dims);
        if !self.shared.config.bounds.contains(coord) {
            return Err(WorldError::OutOfBounds(coord));
        }
        Ok((coord, local))
    }

    // -- structures, lights, library --

    /// Registers a structure. It is stamped into loaded chunks now and into
    /// every intersecting chunk generated later. Returns how many loaded
    /// chunks changed.
    pub fn add_structure(&mut self, structure: Arc<dyn VoxelStructure>) -> Result<usize, WorldError> {
        self.shared
            .structures
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&structure));

        let dims = self.shared.config.chunk_dims;
        let targets = self.loaded_slots(|coord| structure.intersects(coord, dims));
        let kinds = self.pipeline_from(JobKind::Light);
        let mut changed = 0;
        for (coord, slot) in targets {
            let edited = {
                let mut chunk = slot.lock();
                if !chunk.has_terrain() {
                    // The terrain job stamps it on write-back.
                    continue;
                }
                let mut voxels = (*chunk.voxels).clone();
                structure.apply(coord, &mut voxels);
                let edited = voxels.materials_dump() != chunk.voxels.materials_dump();
                if edited {
                    chunk.voxels = Arc::new(voxels);
                    mark_edited(&mut chunk);
                }
                edited
            };
            if edited {
                changed += 1;
                self.submit_kinds(coord, &slot, &kinds)?;
            }
        }
        tracing::debug!(bounds = ?structure.bounds(), changed, "structure added");
        Ok(changed)
    }

    /// Adds a baked point light and relights the chunks it reaches.
    pub fn add_light(&mut self, light: WorldLight) -> Result<LightId, WorldError> {
        self.next_light += 1;
        let id = LightId(self.next_light);
        self.shared
            .lights
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, light));
        let dims = self.shared.config.chunk_dims;
        self.relight(|coord| light.reaches(coord, dims), &[JobKind::Light, JobKind::Mesh])?;
        Ok(id)
    }

    /// Removes a light. Returns `false` if the id is unknown.
    pub fn remove_light(&mut self, id: LightId) -> Result<bool, WorldError> {
        let removed = {
            let mut lights = self.shared.lights.write().unwrap_or_else(PoisonError::into_inner);
            let index = lights.iter().position(|(light_id, _)| *light_id == id);
            index.map(|i| lights.remove(i).1)
        };
        let Some(light) = removed else {
            return Ok(false);
        };
        let dims = self.shared.config.chunk_dims;
        self.relight(|coord| light.reaches(coord, dims), &[JobKind::Light, JobKind::Mesh])?;
        Ok(true)
    }

    /// Edits a copy of the material library, swaps it in, and re-runs
    /// Light → Mesh (→ Prop) on every generated chunk. Jobs already running
    /// keep the library they started with. Returns the number of chunks
    /// requeued.
    pub fn update_library<F>(&mut self, edit: F) -> Result<usize, WorldError>
    where
        F: FnOnce(&mut MaterialLibrary) -> Result<(), LibraryError>,
    {
        let mut library = (*self.shared.library()).clone();
        edit(&mut library)?;
        if !library.is_finalized() {
            return Err(LibraryError::NotFinalized.into());
        }
        tracing::info!(
            materials = library.material_count(),
            surfaces = library.surface_count(),
            "material library updated"
        );
        self.shared.set_library(library);
        let kinds = self.pipeline_from(JobKind::Light);
        self.relight(|_| true, &kinds)
    }

    // -- introspection --

    pub fn chunk_report(&self, coord: ChunkCoord) -> Result<ChunkReport, WorldError> {
        let slot = self.shared.slot(coord).ok_or(WorldError::ChunkNotLoaded(coord))?;
        let report = slot.lock().report(self.scheduler.queue_depth(coord));
        Ok(report)
    }

    /// Flat material array of a chunk, x fastest.
    pub fn voxel_dump(&self, coord: ChunkCoord) -> Result<Vec<u16>, WorldError> {
        let slot = self.shared.slot(coord).ok_or(WorldError::ChunkNotLoaded(coord))?;
        let voxels = Arc::clone(&slot.lock().voxels);
        Ok(voxels.materials_dump())
    }

    pub fn chunk_mesh(&self, coord: ChunkCoord) -> Option<Arc<MeshData>> {
        self.shared.slot(coord).and_then(|slot| slot.lock().mesh.clone())
    }

    pub fn chunk_props(&self, coord: ChunkCoord) -> Vec<PropInstance> {
        self.shared
            .slot(coord)
            .map(|slot| slot.lock().props.clone())
            .unwrap_or_default()
    }

    /// Loaded chunk coordinates in ascending order.
    pub fn loaded_chunks(&self) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> = self.shared.chunks.iter().map(|entry| *entry.key()).collect();
        coords.sort_unstable();
        coords
    }

    /// Jobs queued, waiting or running across all chunks.
    pub fn job_queue_depth(&self) -> usize {
        self.scheduler.queued_len() + self.scheduler.waiting_len() + self.scheduler.running_len()
    }

    pub fn stats(&self) -> WorldStats {
        let mut stats = WorldStats {
            queued_jobs: self.scheduler.queued_len(),
            waiting_jobs: self.scheduler.waiting_len(),
            running_jobs: self.scheduler.running_len(),
            cancelled_writebacks: self.shared.cancelled_writebacks.load(Ordering::Relaxed),
            stale_writebacks: self.shared.stale_writebacks.load(Ordering::Relaxed),
            failures: self.failures,
            ..Default::default()
        };
        for (_, slot) in self.loaded_slots(|_| true) {
            stats.loaded += 1;
            match slot.lock().state {
                ChunkState::Empty | ChunkState::Generating => stats.generating += 1,
                ChunkState::Ready => stats.ready += 1,
                ChunkState::Dirty => stats.dirty += 1,
                ChunkState::Generated | ChunkState::Meshing | ChunkState::Unloading => {}
            }
        }
        stats
    }

    // -- internals --

    /// Pipeline stages from `first` onward.
    fn pipeline_from(&self, first: JobKind) -> Vec<JobKind> {
        JobKind::ALL
            .into_iter()
            .filter(|kind| kind.priority() >= first.priority())
            .filter(|kind| *kind != JobKind::Prop || self.shared.config.props.enabled)
            .collect()
    }

    fn submit_kinds(&mut self, coord: ChunkCoord, slot: &Arc<ChunkSlot>, kinds: &[JobKind]) -> Result<(), WorldError> {
        let distance_sq = coord.distance_sq(self.viewer);
        for &kind in kinds {
            let task = make_task(kind, &self.shared, slot);
            if let Err(err) = self
                .scheduler
                .submit(coord, kind, distance_sq, kind.default_dependencies(), task)
            {
                self.abort_chunk(coord, slot, &err);
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// A rejected submission means the chunk's bookkeeping is broken: drop
    /// every job it still has and leave it dirty.
    fn abort_chunk(&mut self, coord: ChunkCoord, slot: &ChunkSlot, err: &SchedulerError) {
        let SchedulerError::Rejected(error) = err else {
            return;
        };
        self.failures += 1;
        self.scheduler.cancel(coord);
        {
            let mut chunk = slot.lock();
            chunk.state = ChunkState::Dirty;
            chunk.last_error = Some(error.clone());
        }
        self.events.push(WorldEvent::ChunkDirty {
            coord,
            error: error.clone(),
        });
    }

    /// Queues a remesh of a loaded chunk whose light is done or coming.
    fn request_remesh(&mut self, coord: ChunkCoord) {
        let Some(slot) = self.shared.slot(coord) else {
            return;
        };
        let known = self
            .scheduler
            .completed_kinds(coord)
            .union(self.scheduler.pending_kinds(coord));
        if !known.contains(JobKind::Light) || !known.contains(JobKind::Mesh) {
            return;
        }
        if let Err(err) = self.submit_kinds(coord, &slot, &[JobKind::Mesh]) {
            tracing::warn!(%coord, %err, "neighbour remesh rejected");
        }
    }

    /// Queues `kinds` for every generated chunk matching `filter`.
    fn relight(&mut self, filter: impl Fn(ChunkCoord) -> bool, kinds: &[JobKind]) -> Result<usize, WorldError> {
        let mut count = 0;
        for (coord, slot) in self.loaded_slots(filter) {
            if !slot.lock().has_terrain() {
                continue;
            }
            self.submit_kinds(coord, &slot, kinds)?;
            count += 1;
        }
        Ok(count)
    }

    /// Loaded slots matching `filter`, ascending by coordinate. The map's
    /// shard locks are released before returning.
    fn loaded_slots(&self, filter: impl Fn(ChunkCoord) -> bool) -> Vec<(ChunkCoord, Arc<ChunkSlot>)> {
        let mut slots: Vec<(ChunkCoord, Arc<ChunkSlot>)> = self
            .shared
            .chunks
            .iter()
            .filter(|entry| filter(*entry.key()))
            .map(|entry| (*entry.key(), Arc::clone(entry.value())))
            .collect();
        slots.sort_unstable_by_key(|(coord, _)| *coord);
        slots
    }

    /// Closes the gate of every queued mesh job whose loaded neighbours
    /// still have terrain or light pending.
    fn refresh_mesh_gates(&mut self) {
        for coord in self.scheduler.coords_with_queued(JobKind::Mesh) {
            let ready = neighbor_offsets().all(|(dx, dy, dz)| {
                let neighbor = coord.offset(dx, dy, dz);
                if !self.shared.chunks.contains_key(&neighbor) {
                    return true;
                }
                let pending = self.scheduler.pending_kinds(neighbor);
                !pending.contains(JobKind::Terrain) && !pending.contains(JobKind::Light)
            });
            self.scheduler.set_neighbor_gate(coord, ready);
        }
    }

    fn apply_outcome(&mut self, outcome: JobOutcome) {
        let JobOutcome {
            id,
            coord,
            kind,
            status,
            error,
        } = outcome;
        let Some(slot) = self.shared.slot(coord) else {
            return;
        };
        match status {
            JobStatus::Done => match kind {
                JobKind::Terrain => {
                    self.events.push(WorldEvent::ChunkGenerated(coord));
                    if self.shared.config.remesh_neighbors {
                        for neighbor in coord.face_neighbors() {
                            self.request_remesh(neighbor);
                        }
                    }
                }
                JobKind::Light => {}
                JobKind::Mesh => self.activate(coord, &slot),
                JobKind::Prop => {
                    let count = slot.lock().props.len();
                    self.events.push(WorldEvent::PropsPlaced { coord, count });
                }
            },
            JobStatus::Failed => {
                let error = error.unwrap_or_else(|| JobError::Panicked(format!("job {id} failed without an error")));
                self.handle_failure(coord, &slot, error);
            }
            JobStatus::Cancelled => {
                tracing::trace!(%coord, ?kind, %id, ?error, "job cancelled");
            }
            JobStatus::Queued | JobStatus::Running => {}
        }
    }

    /// Hands the chunk's current mesh to the host, replacing any previous one.
    fn activate(&mut self, coord: ChunkCoord, slot: &ChunkSlot) {
        let (mesh, previous) = {
            let mut chunk = slot.lock();
            (chunk.mesh.clone(), chunk.render_handle.take())
        };
        if let Some(previous) = previous {
            self.host.deactivate(coord, previous);
            self.host.release(previous);
        }
        let Some(mesh) = mesh else {
            return;
        };
        let handle = (!mesh.is_empty()).then(|| {
            let config = &self.shared.config;
            let transform = chunk_transform(chunk_origin(coord, config.chunk_dims), config.voxel_scale);
            let handle = self.host.submit_mesh(transform, &mesh);
            self.host.activate(coord, handle);
            handle
        });
        slot.lock().render_handle = handle;
        self.events.push(WorldEvent::ChunkReady { coord, handle });
    }

    fn handle_failure(&mut self, coord: ChunkCoord, slot: &Arc<ChunkSlot>, error: JobError) {
        self.failures += 1;
        let invalid_data = matches!(error, JobError::MesherDataInvalid(_));
        let regenerate = {
            let mut chunk = slot.lock();
            chunk.state = ChunkState::Dirty;
            // Keep the root cause rather than the knock-on failures.
            if chunk.last_error.is_none() || !matches!(error, JobError::DependencyFailed { .. }) {
                chunk.last_error = Some(error.clone());
            }
            let regenerate = invalid_data && chunk.regen_attempts < MAX_REGEN_ATTEMPTS;
            if regenerate {
                chunk.regen_attempts += 1;
            }
            regenerate
        };
        self.events.push(WorldEvent::ChunkDirty { coord, error });

        if regenerate {
            tracing::warn!(%coord, "invalid mesher input; regenerating terrain");
            self.events.push(WorldEvent::RegenerationRequested(coord));
            let kinds = self.pipeline_from(JobKind::Terrain);
            if let Err(err) = self.submit_kinds(coord, slot, &kinds) {
                tracing::warn!(%coord, %err, "terrain regeneration rejected");
            }
        } else if invalid_data {
            tracing::warn!(%coord, "invalid mesher input after regeneration; chunk left dirty");
        }
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("config", &self.shared.config)
            .field("loaded", &self.shared.chunks.len())
            .field("viewer", &self.viewer)
            .finish_non_exhaustive()
    }
}

/// Bumps the version and forgets every stage after terrain.
fn mark_edited(chunk: &mut Chunk) {
    chunk.version += 1;
    chunk.completed = JobKindSet::EMPTY.with(JobKind::Terrain);
    if chunk.mesh.is_some() {
        chunk.state = ChunkState::Dirty;
    }
}

/// The 26 neighbour offsets.
fn neighbor_offsets() -> impl Iterator<Item = (i32, i32, i32)> {
    (-1..=1)
        .flat_map(|dz| (-1..=1).flat_map(move |dy| (-1..=1).map(move |dx| (dx, dy, dz))))
        .filter(|&offset| offset != (0, 0, 0))
}

/// Chunks sharing a face, edge or corner with the voxel at `local`.
fn border_neighbors(coord: ChunkCoord, local: (usize, usize, usize), dims: ChunkDims) -> Vec<ChunkCoord> {
    let axis = |v: usize, size: usize| -> &'static [i32] {
        match (v == 0, v + 1 == size) {
            (true, true) => &[-1, 0, 1],
            (true, false) => &[-1, 0],
            (false, true) => &[0, 1],
            (false, false) => &[0],
        }
    };
    let mut neighbors = Vec::new();
    for &dz in axis(local.2, dims.z) {
        for &dy in axis(local.1, dims.y) {
            for &dx in axis(local.0, dims.x) {
                if (dx, dy, dz) != (0, 0, 0) {
                    neighbors.push(coord.offset(dx, dy, dz));
                }
            }
        }
    }
    neighbors
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Instant;

    use glam::Mat4;
    use terra_library::{LibraryKind, MaterialDef, MemoryTextures};
    use terra_voxel::{LightColor, VoxelBuffer};

    use super::*;
    use crate::generator::FlatLevelGenerator;
    use crate::host::{RenderSink, SceneAttachment};
    use crate::structure::BlockStructure;

    fn library() -> MaterialLibrary {
        let mut lib = MaterialLibrary::new(LibraryKind::Simple);
        lib.register(MaterialDef::solid(1, "stone", "stone")).unwrap();
        let tile = image::RgbaImage::from_pixel(4, 4, image::Rgba([120, 120, 120, 255]));
        lib.finalize(Arc::new(MemoryTextures::new().with("stone", tile)))
            .unwrap();
        lib
    }

    fn config() -> WorldConfig {
        WorldConfig {
            chunk_dims: ChunkDims::cubic(8),
            props: PropConfig {
                density: 1.0,
                ..Default::default()
            },
            scheduler: SchedulerConfig {
                worker_threads: 3,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn flat_world(config: WorldConfig) -> World {
        let generator = Arc::new(FlatLevelGenerator::uniform(4, MaterialId(1)));
        World::new(config, library(), Some(generator)).unwrap()
    }

    fn position(events: &[WorldEvent], wanted: impl Fn(&WorldEvent) -> bool) -> Option<usize> {
        events.iter().position(wanted)
    }

    /// Writes one stone voxel whose position encodes the chunk coordinate.
    struct MarkerGenerator;

    impl LevelGenerator for MarkerGenerator {
        fn generate(&self, coord: ChunkCoord, _dims: ChunkDims, buffer: &mut VoxelBuffer) -> Result<(), JobError> {
            let x = coord.x.rem_euclid(8) as usize;
            let z = coord.z.rem_euclid(8) as usize;
            buffer.set_material(x, 0, z, MaterialId(1))?;
            Ok(())
        }
    }

    /// Blocks until released so a terrain job is reliably in flight.
    struct GatedGenerator {
        started: Arc<AtomicBool>,
        release: Arc<AtomicBool>,
    }

    impl LevelGenerator for GatedGenerator {
        fn generate(&self, _coord: ChunkCoord, dims: ChunkDims, buffer: &mut VoxelBuffer) -> Result<(), JobError> {
            self.started.store(true, Ordering::Release);
            while !self.release.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(1));
            }
            buffer.channel_fill((0, 0, 0), (dims.x, 2, dims.z), MaterialId(1));
            Ok(())
        }
    }

    /// Ground whose density field is corrupt.
    struct CorruptGenerator;

    impl LevelGenerator for CorruptGenerator {
        fn generate(&self, _coord: ChunkCoord, dims: ChunkDims, buffer: &mut VoxelBuffer) -> Result<(), JobError> {
            buffer.channel_fill((0, 0, 0), (dims.x, 2, dims.z), MaterialId(1));
            buffer.set_density(0, 0, 0, f32::NAN)?;
            Ok(())
        }
    }

    /// Generates flat ground once, then fails every later run.
    #[derive(Default)]
    struct OneShotGenerator {
        runs: AtomicUsize,
    }

    impl LevelGenerator for OneShotGenerator {
        fn generate(&self, _coord: ChunkCoord, dims: ChunkDims, buffer: &mut VoxelBuffer) -> Result<(), JobError> {
            if self.runs.fetch_add(1, Ordering::SeqCst) > 0 {
                return Err(JobError::GeneratorMissing);
            }
            buffer.channel_fill((0, 0, 0), (dims.x, 2, dims.z), MaterialId(1));
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct HostLog {
        submitted: Vec<RenderHandle>,
        active: Vec<(ChunkCoord, RenderHandle)>,
        released: Vec<RenderHandle>,
    }

    #[derive(Clone, Default)]
    struct RecordingHost {
        log: Arc<Mutex<HostLog>>,
    }

    impl RenderSink for RecordingHost {
        fn submit_mesh(&mut self, _transform: Mat4, _mesh: &MeshData) -> RenderHandle {
            let mut log = self.log.lock().unwrap();
            let handle = RenderHandle(log.submitted.len() as u64 + 1);
            log.submitted.push(handle);
            handle
        }

        fn release(&mut self, handle: RenderHandle) {
            self.log.lock().unwrap().released.push(handle);
        }
    }

    impl SceneAttachment for RecordingHost {
        fn activate(&mut self, coord: ChunkCoord, handle: RenderHandle) {
            self.log.lock().unwrap().active.push((coord, handle));
        }

        fn deactivate(&mut self, coord: ChunkCoord, handle: RenderHandle) {
            self.log.lock().unwrap().active.retain(|entry| *entry != (coord, handle));
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[test]
    fn test_request_runs_pipeline_to_ready() {
        let mut world = flat_world(config());
        let coord = ChunkCoord::default();
        assert_eq!(world.request_chunk(coord).unwrap(), ChunkState::Empty);
        let events = world.flush();

        let report = world.chunk_report(coord).unwrap();
        assert_eq!(report.state, ChunkState::Ready);
        assert!(report.completed.contains_all(JobKindSet::from_kinds(&JobKind::ALL)));
        assert_eq!(report.non_empty_voxels, 8 * 8 * 4);
        assert!(report.mesh_triangles > 0);
        assert_eq!(report.props, 64);
        assert_eq!(report.queued_jobs, 0);
        assert!(report.active);
        assert!(report.last_error.is_none());

        let generated = position(&events, |e| *e == WorldEvent::ChunkGenerated(coord)).unwrap();
        let ready = position(&events, |e| matches!(e, WorldEvent::ChunkReady { coord: c, handle: Some(_) } if *c == coord))
            .unwrap();
        let props = position(&events, |e| *e == WorldEvent::PropsPlaced { coord, count: 64 }).unwrap();
        assert!(generated < ready && ready < props);
    }

    #[test]
    fn test_request_reserves_slot_once() {
        let mut world = flat_world(config());
        let coord = ChunkCoord::new(1, 0, 0);
        world.request_chunk(coord).unwrap();
        world.request_chunk(coord).unwrap();
        assert_eq!(world.loaded_chunks(), vec![coord]);
        assert_eq!(world.job_queue_depth(), 4);
        assert_eq!(world.chunk_report(coord).unwrap().queued_jobs, 4);
        world.flush();
        assert_eq!(world.request_chunk(coord).unwrap(), ChunkState::Ready);
    }

    #[test]
    fn test_out_of_bounds_is_rejected() {
        let mut world = flat_world(WorldConfig {
            bounds: WorldBounds::new(ChunkCoord::new(-1, -1, -1), ChunkCoord::new(1, 1, 1)),
            ..config()
        });
        let coord = ChunkCoord::new(2, 0, 0);
        assert!(matches!(world.request_chunk(coord), Err(WorldError::OutOfBounds(c)) if c == coord));
        assert!(world.get_chunk(coord).is_none());
        assert!(matches!(world.get_voxel_at((100, 0, 0)), Err(WorldError::OutOfBounds(_))));
    }

    #[test]
    fn test_get_chunk_does_not_generate() {
        let mut world = flat_world(config());
        assert!(world.get_chunk(ChunkCoord::default()).is_none());
        world.flush();
        assert!(world.loaded_chunks().is_empty());
    }

    #[test]
    fn test_unfinalized_library_is_rejected() {
        let lib = MaterialLibrary::new(LibraryKind::Simple);
        let result = World::new(config(), lib, None);
        assert!(matches!(result, Err(WorldError::Library(LibraryError::NotFinalized))));
    }

    #[test]
    fn test_concurrent_chunks_do_not_alias() {
        let mut world = World::new(config(), library(), Some(Arc::new(MarkerGenerator))).unwrap();
        let coords: Vec<ChunkCoord> = (-2..=2)
            .flat_map(|x| (-2..=2).map(move |z| ChunkCoord::new(x, 0, z)))
            .collect();
        for &coord in &coords {
            world.request_chunk(coord).unwrap();
        }
        world.flush();

        let dims = ChunkDims::cubic(8);
        for &coord in &coords {
            let dump = world.voxel_dump(coord).unwrap();
            let expected = dims.index(coord.x.rem_euclid(8) as usize, 0, coord.z.rem_euclid(8) as usize);
            let set: Vec<usize> = dump
                .iter()
                .enumerate()
                .filter(|(_, m)| **m != 0)
                .map(|(i, _)| i)
                .collect();
            assert_eq!(set, vec![expected], "chunk {coord}");
            assert_eq!(world.chunk_report(coord).unwrap().state, ChunkState::Ready);
        }
    }

    #[test]
    fn test_unload_during_generation_leaves_no_slot() {
        let started = Arc::new(AtomicBool::new(false));
        let release = Arc::new(AtomicBool::new(false));
        let generator = GatedGenerator {
            started: Arc::clone(&started),
            release: Arc::clone(&release),
        };
        let mut world = World::new(config(), library(), Some(Arc::new(generator))).unwrap();
        let coord = ChunkCoord::new(0, 0, 3);
        world.request_chunk(coord).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !started.load(Ordering::Acquire) {
            assert!(Instant::now() < deadline, "terrain job never started");
            world.update();
            std::thread::sleep(Duration::from_millis(1));
        }

        let releaser = {
            let release = Arc::clone(&release);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                release.store(true, Ordering::Release);
            })
        };
        world.unload_chunk(coord).unwrap();
        releaser.join().unwrap();

        assert!(world.get_chunk(coord).is_none());
        assert!(world.loaded_chunks().is_empty());
        assert!(matches!(world.voxel_dump(coord), Err(WorldError::ChunkNotLoaded(_))));
        let events = world.flush();
        assert!(events.contains(&WorldEvent::ChunkUnloaded(coord)));
        assert!(!events.iter().any(|e| matches!(e, WorldEvent::ChunkGenerated(_))));
        assert_eq!(world.stats().loaded, 0);

        // The coordinate can be requested again.
        world.request_chunk(coord).unwrap();
        world.flush();
        assert_eq!(world.chunk_report(coord).unwrap().state, ChunkState::Ready);
    }

    #[test]
    fn test_unload_unknown_chunk_fails() {
        let mut world = flat_world(config());
        assert!(matches!(
            world.unload_chunk(ChunkCoord::default()),
            Err(WorldError::ChunkNotLoaded(_))
        ));
    }

    #[test]
    fn test_host_receives_and_releases_meshes() {
        let host = RecordingHost::default();
        let log = Arc::clone(&host.log);
        let mut world = flat_world(config()).with_host(host);
        let coord = ChunkCoord::default();
        world.request_chunk(coord).unwrap();
        world.flush();
        {
            let log = log.lock().unwrap();
            assert_eq!(log.submitted.len(), 1);
            assert_eq!(log.active, vec![(coord, log.submitted[0])]);
        }

        world.unload_chunk(coord).unwrap();
        let log = log.lock().unwrap();
        assert!(log.active.is_empty());
        assert_eq!(log.released, log.submitted);
    }

    #[test]
    fn test_empty_chunk_gets_no_handle() {
        let mut world = flat_world(config());
        let coord = ChunkCoord::new(0, 3, 0);
        world.request_chunk(coord).unwrap();
        let events = world.flush();
        assert!(events.contains(&WorldEvent::ChunkReady { coord, handle: None }));
        assert!(!world.chunk_report(coord).unwrap().active);
    }

    // -----------------------------------------------------------------------
    // Failures
    // -----------------------------------------------------------------------

    #[test]
    fn test_missing_generator_marks_dirty() {
        let mut world = World::new(config(), library(), None).unwrap();
        let coord = ChunkCoord::default();
        world.request_chunk(coord).unwrap();
        let events = world.flush();

        let report = world.chunk_report(coord).unwrap();
        assert_eq!(report.state, ChunkState::Dirty);
        assert_eq!(report.last_error.as_deref(), Some("no level generator configured"));
        assert!(events.contains(&WorldEvent::ChunkDirty {
            coord,
            error: JobError::GeneratorMissing
        }));
        assert!(world.stats().failures >= 1);
        assert_eq!(world.stats().dirty, 1);
    }

    #[test]
    fn test_invalid_mesher_data_regenerates_once() {
        let mut world = World::new(config(), library(), Some(Arc::new(CorruptGenerator))).unwrap();
        let coord = ChunkCoord::default();
        world.request_chunk(coord).unwrap();
        let events = world.flush();

        let regenerations = events
            .iter()
            .filter(|e| **e == WorldEvent::RegenerationRequested(coord))
            .count();
        assert_eq!(regenerations, 1);

        let report = world.chunk_report(coord).unwrap();
        assert_eq!(report.state, ChunkState::Dirty);
        assert_eq!(report.regen_attempts, 1);
        assert!(report.last_error.unwrap().contains("mesher data invalid"));
        assert!(world.chunk_mesh(coord).is_none());

        // A manual retry gets a fresh budget.
        world.retry_chunk(coord).unwrap();
        let events = world.flush();
        assert!(events.contains(&WorldEvent::RegenerationRequested(coord)));
    }

    #[test]
    fn test_failed_retry_keeps_chunk_dirty() {
        let generator = Arc::new(OneShotGenerator::default());
        let mut world = World::new(config(), library(), Some(generator)).unwrap();
        let coord = ChunkCoord::default();
        world.request_chunk(coord).unwrap();
        world.flush();
        assert_eq!(world.chunk_report(coord).unwrap().state, ChunkState::Ready);

        world.retry_chunk(coord).unwrap();
        let events = world.flush();
        assert!(!events.iter().any(|e| matches!(e, WorldEvent::ChunkReady { .. })));
        let report = world.chunk_report(coord).unwrap();
        assert_eq!(report.state, ChunkState::Dirty);
        assert_eq!(report.last_error.as_deref(), Some("no level generator configured"));
    }

    // -----------------------------------------------------------------------
    // Edits
    // -----------------------------------------------------------------------

    #[test]
    fn test_edit_remeshes_chunk() {
        let mut world = flat_world(config());
        let coord = ChunkCoord::default();
        world.request_chunk(coord).unwrap();
        world.flush();
        let before = world.chunk_report(coord).unwrap();

        world.set_voxel_at((3, 4, 3), MaterialId(1)).unwrap();
        let dirty = world.chunk_report(coord).unwrap();
        assert_eq!(dirty.state, ChunkState::Dirty);
        assert_eq!(dirty.version, before.version + 1);

        world.flush();
        let after = world.chunk_report(coord).unwrap();
        assert_eq!(after.state, ChunkState::Ready);
        assert_eq!(after.non_empty_voxels, before.non_empty_voxels + 1);
        assert_eq!(world.get_voxel_at((3, 4, 3)).unwrap(), MaterialId(1));
        // The prop on that column moved up with the surface.
        assert!(world.chunk_props(coord).iter().any(|p| p.position == [3, 5, 3]));
    }

    #[test]
    fn test_edit_requires_generated_chunk() {
        let mut world = flat_world(config());
        assert!(matches!(
            world.set_voxel_at((0, 0, 0), MaterialId(1)),
            Err(WorldError::ChunkNotLoaded(_))
        ));
    }

    #[test]
    fn test_border_edit_remeshes_neighbour() {
        let host = RecordingHost::default();
        let log = Arc::clone(&host.log);
        let mut world = flat_world(config()).with_host(host);
        world.request_chunk(ChunkCoord::new(0, 0, 0)).unwrap();
        world.request_chunk(ChunkCoord::new(1, 0, 0)).unwrap();
        world.flush();
        let submitted = log.lock().unwrap().submitted.len();

        world.set_voxel_at((7, 2, 3), MaterialId::EMPTY).unwrap();
        let events = world.flush();
        assert!(events.iter().any(|e| matches!(e,
            WorldEvent::ChunkReady { coord, .. } if *coord == ChunkCoord::new(1, 0, 0))));
        assert!(log.lock().unwrap().submitted.len() >= submitted + 2);
    }

    #[test]
    fn test_chunk_at_world_position_uses_scale() {
        let world = flat_world(WorldConfig {
            voxel_scale: 0.5,
            ..config()
        });
        assert_eq!(world.chunk_at_world_position(Vec3::new(3.9, 0.0, 0.0)), ChunkCoord::new(0, 0, 0));
        assert_eq!(world.chunk_at_world_position(Vec3::new(4.0, 0.0, 0.0)), ChunkCoord::new(1, 0, 0));
        assert_eq!(world.chunk_at_world_position(Vec3::new(-0.1, 0.0, 0.0)), ChunkCoord::new(-1, 0, 0));
    }

    #[test]
    fn test_border_neighbors() {
        let dims = ChunkDims::cubic(8);
        let origin = ChunkCoord::default();
        assert!(border_neighbors(origin, (3, 3, 3), dims).is_empty());
        assert_eq!(border_neighbors(origin, (7, 3, 3), dims), vec![ChunkCoord::new(1, 0, 0)]);
        assert_eq!(border_neighbors(origin, (0, 0, 0), dims).len(), 7);
        assert_eq!(neighbor_offsets().count(), 26);
    }

    // -----------------------------------------------------------------------
    // Structures, lights, library
    // -----------------------------------------------------------------------

    #[test]
    fn test_structures_reach_loaded_and_future_chunks() {
        let mut world = flat_world(config());
        world.request_chunk(ChunkCoord::new(0, 0, 0)).unwrap();
        world.flush();

        let wall = BlockStructure::new().with_box((5, 4, 2), (10, 5, 2), MaterialId(1));
        assert_eq!(world.add_structure(Arc::new(wall)).unwrap(), 1);
        world.flush();
        assert_eq!(world.get_voxel_at((6, 5, 2)).unwrap(), MaterialId(1));
        assert_eq!(world.chunk_report(ChunkCoord::default()).unwrap().state, ChunkState::Ready);

        world.request_chunk(ChunkCoord::new(1, 0, 0)).unwrap();
        world.flush();
        assert_eq!(world.get_voxel_at((10, 5, 2)).unwrap(), MaterialId(1));
        assert_eq!(world.get_voxel_at((11, 5, 2)).unwrap(), MaterialId::EMPTY);
    }

    #[test]
    fn test_lights_requeue_reached_chunks() {
        let mut world = flat_world(config());
        world.request_chunk(ChunkCoord::new(0, 0, 0)).unwrap();
        world.request_chunk(ChunkCoord::new(5, 0, 0)).unwrap();
        world.flush();

        let light = WorldLight {
            position: Vec3::new(4.0, 6.0, 4.0),
            color: LightColor([255, 128, 0]),
            size: 3.0,
        };
        let id = world.add_light(light).unwrap();
        assert_eq!(world.chunk_report(ChunkCoord::new(0, 0, 0)).unwrap().queued_jobs, 2);
        assert_eq!(world.chunk_report(ChunkCoord::new(5, 0, 0)).unwrap().queued_jobs, 0);
        world.flush();
        assert_eq!(world.chunk_report(ChunkCoord::default()).unwrap().state, ChunkState::Ready);

        assert!(world.remove_light(id).unwrap());
        assert!(!world.remove_light(id).unwrap());
        world.flush();
    }

    #[test]
    fn test_library_update_requeues_generated_chunks() {
        let mut world = flat_world(config());
        world.request_chunk(ChunkCoord::default()).unwrap();
        world.flush();

        let requeued = world
            .update_library(|lib| lib.register(MaterialDef::solid(2, "glow", "stone").with_emission(12)))
            .unwrap();
        assert_eq!(requeued, 1);
        assert_eq!(world.library().material_count(), 2);
        world.flush();

        world.set_voxel_at((2, 4, 2), MaterialId(2)).unwrap();
        world.flush();
        assert_eq!(world.chunk_report(ChunkCoord::default()).unwrap().state, ChunkState::Ready);
    }

    // -----------------------------------------------------------------------
    // Meshing and streaming
    // -----------------------------------------------------------------------

    #[test]
    fn test_marching_cubes_flat_ground_faces_up() {
        let config = WorldConfig {
            chunk_dims: ChunkDims::cubic(16),
            mesher: MesherKind::MarchingCubes,
            ..config()
        };
        let generator = Arc::new(FlatLevelGenerator::uniform(8, MaterialId(1)));
        let mut world = World::new(config, library(), Some(generator)).unwrap();
        world.request_chunk(ChunkCoord::default()).unwrap();
        world.flush();

        let mesh = world.chunk_mesh(ChunkCoord::default()).unwrap();
        assert_eq!(mesh.triangle_count(), 512);
        // Each cell's two triangles share their diagonal once welded.
        assert!(mesh.vertex_count() <= 4 * 256);
        for v in mesh.vertices() {
            assert!((v.position[1] - 8.0).abs() < 1e-5);
            assert!(v.normal[1] > 0.9);
        }
    }

    #[test]
    fn test_neighbour_arrival_hides_shared_faces() {
        let mut world = flat_world(WorldConfig {
            greedy: false,
            ..config()
        });
        world.request_chunk(ChunkCoord::new(0, 0, 0)).unwrap();
        world.flush();
        let alone = world.chunk_report(ChunkCoord::default()).unwrap().mesh_triangles;

        world.request_chunk(ChunkCoord::new(1, 0, 0)).unwrap();
        world.flush();
        let joined = world.chunk_report(ChunkCoord::default()).unwrap().mesh_triangles;
        // The +x wall (8 × 4 faces, two triangles each) is gone.
        assert_eq!(alone - joined, 8 * 4 * 2);
    }

    #[test]
    fn test_streaming_follows_viewer() {
        let mut world = flat_world(WorldConfig {
            streaming: StreamingConfig {
                load_radius: 1,
                unload_radius: 2,
                loads_per_tick: 100,
                unloads_per_tick: 100,
            },
            ..config()
        });
        world.update_viewer(Vec3::new(4.0, 4.0, 4.0));
        world.flush();
        assert_eq!(world.stats().loaded, 7);
        assert_eq!(world.stats().ready, 7);

        world.update_viewer(Vec3::new(84.0, 4.0, 4.0));
        world.flush();
        let loaded = world.loaded_chunks();
        assert_eq!(loaded.len(), 7);
        assert!(loaded.contains(&ChunkCoord::new(10, 0, 0)));
        assert!(!loaded.contains(&ChunkCoord::default()));
        assert_eq!(world.viewer(), ChunkCoord::new(10, 0, 0));
    }
}
