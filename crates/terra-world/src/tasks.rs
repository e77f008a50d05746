//! The four pipeline tasks and the world state they share.
//!
//! Every task follows the same shape: snapshot what it needs from its chunk
//! (and the shared world) under short locks, compute without any lock held,
//! then write the result back under the chunk's lock. The write-back is
//! refused if the chunk left the world, the job was cancelled, or the voxel
//! data changed since the snapshot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use terra_library::MaterialLibrary;
use terra_mesh::{BuildFlags, ChunkNeighborhood, MergeMode, MeshInput, Mesher, SurfaceTool};
use terra_voxel::{ChunkCoord, VoxelBuffer};

use crate::chunk::{Chunk, ChunkSlot, ChunkState};
use crate::error::JobError;
use crate::generator::LevelGenerator;
use crate::job::{JobContext, JobKind, JobKindSet, JobTask};
use crate::lighting::{LightId, WorldLight, light_chunk};
use crate::props::place_props;
use crate::structure::VoxelStructure;
use crate::world::WorldConfig;

/// State shared between the world and its worker threads.
pub(crate) struct WorldShared {
    pub config: WorldConfig,
    pub chunks: DashMap<ChunkCoord, Arc<ChunkSlot>>,
    pub library: RwLock<Arc<MaterialLibrary>>,
    pub generator: Option<Arc<dyn LevelGenerator>>,
    pub structures: RwLock<Vec<Arc<dyn VoxelStructure>>>,
    pub lights: RwLock<Vec<(LightId, WorldLight)>>,
    /// Write-backs refused because the chunk was unloaded or cancelled.
    pub cancelled_writebacks: AtomicU64,
    /// Write-backs refused because the voxel data changed underneath.
    pub stale_writebacks: AtomicU64,
}

impl WorldShared {
    pub fn new(config: WorldConfig, library: MaterialLibrary, generator: Option<Arc<dyn LevelGenerator>>) -> Self {
        Self {
            config,
            chunks: DashMap::new(),
            library: RwLock::new(Arc::new(library)),
            generator,
            structures: RwLock::new(Vec::new()),
            lights: RwLock::new(Vec::new()),
            cancelled_writebacks: AtomicU64::new(0),
            stale_writebacks: AtomicU64::new(0),
        }
    }

    pub fn library(&self) -> Arc<MaterialLibrary> {
        Arc::clone(&self.library.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn set_library(&self, library: MaterialLibrary) {
        *self.library.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(library);
    }

    pub fn structures(&self) -> Vec<Arc<dyn VoxelStructure>> {
        self.structures
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lights(&self) -> Vec<(LightId, WorldLight)> {
        self.lights.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// The slot at `coord`, without holding the map's shard lock.
    pub fn slot(&self, coord: ChunkCoord) -> Option<Arc<ChunkSlot>> {
        self.chunks.get(&coord).map(|entry| Arc::clone(entry.value()))
    }

    /// Voxel data and version of a live chunk.
    fn snapshot(&self, ctx: &JobContext, slot: &ChunkSlot) -> Result<(Arc<VoxelBuffer>, u64), JobError> {
        let chunk = slot.lock();
        if !slot.is_live() {
            return Err(JobError::ChunkGone(ctx.coord));
        }
        ctx.check_cancelled()?;
        Ok((Arc::clone(&chunk.voxels), chunk.version))
    }

    /// Runs `install` under the chunk lock if the chunk is still live, the
    /// job was not cancelled and, when `version` is given, the data is
    /// unchanged since the snapshot.
    fn write_back<R>(
        &self,
        ctx: &JobContext,
        slot: &ChunkSlot,
        version: Option<u64>,
        install: impl FnOnce(&mut Chunk) -> R,
    ) -> Result<R, JobError> {
        let mut chunk = slot.lock();
        if !slot.is_live() || ctx.is_cancelled() {
            self.cancelled_writebacks.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(coord = %ctx.coord, kind = ?ctx.kind, "cancelled write-back suppressed");
            return Err(if slot.is_live() {
                JobError::Cancelled
            } else {
                JobError::ChunkGone(ctx.coord)
            });
        }
        if let Some(version) = version
            && chunk.version != version
        {
            self.stale_writebacks.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(coord = %ctx.coord, kind = ?ctx.kind, "stale write-back discarded");
            return Err(JobError::Stale);
        }
        Ok(install(&mut chunk))
    }
}

/// Builds the task for one pipeline stage.
pub(crate) fn make_task(kind: JobKind, shared: &Arc<WorldShared>, slot: &Arc<ChunkSlot>) -> Box<dyn JobTask> {
    let shared = Arc::clone(shared);
    let slot = Arc::clone(slot);
    match kind {
        JobKind::Terrain => Box::new(TerrainTask { shared, slot }),
        JobKind::Light => Box::new(LightTask { shared, slot }),
        JobKind::Mesh => Box::new(MeshTask { shared, slot }),
        JobKind::Prop => Box::new(PropTask { shared, slot }),
    }
}

// ---------------------------------------------------------------------------
// Terrain
// ---------------------------------------------------------------------------

/// Generates voxel data and stamps structures into it.
pub(crate) struct TerrainTask {
    shared: Arc<WorldShared>,
    slot: Arc<ChunkSlot>,
}

impl JobTask for TerrainTask {
    fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        let shared = &self.shared;
        let generator = shared.generator.clone().ok_or(JobError::GeneratorMissing)?;

        let version = shared.write_back(ctx, &self.slot, None, |chunk| {
            if !chunk.has_terrain() {
                chunk.state = ChunkState::Generating;
            }
            chunk.version
        })?;

        let dims = shared.config.chunk_dims;
        let mut buffer = VoxelBuffer::new(dims);
        generator.generate(ctx.coord, dims, &mut buffer)?;
        ctx.check_cancelled()?;

        let structures = shared.structures();
        for structure in structures.iter().filter(|s| s.intersects(ctx.coord, dims)) {
            structure.apply(ctx.coord, &mut buffer);
        }
        let applied = structures.len();

        shared.write_back(ctx, &self.slot, Some(version), |chunk| {
            // Structures registered while this job ran.
            for structure in shared
                .structures()
                .iter()
                .skip(applied)
                .filter(|s| s.intersects(ctx.coord, dims))
            {
                structure.apply(ctx.coord, &mut buffer);
            }
            buffer.compress();
            chunk.voxels = Arc::new(buffer);
            chunk.version += 1;
            chunk.completed = JobKindSet::EMPTY.with(JobKind::Terrain);
            chunk.state = ChunkState::Generated;
            chunk.props.clear();
        })?;
        tracing::trace!(coord = %ctx.coord, generator = generator.name(), "terrain installed");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Light
// ---------------------------------------------------------------------------

/// Recomputes light and occlusion channels.
pub(crate) struct LightTask {
    shared: Arc<WorldShared>,
    slot: Arc<ChunkSlot>,
}

impl JobTask for LightTask {
    fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        let shared = &self.shared;
        let (voxels, version) = shared.snapshot(ctx, &self.slot)?;
        let library = shared.library();
        let dims = shared.config.chunk_dims;
        let lights: Vec<WorldLight> = shared
            .lights()
            .into_iter()
            .map(|(_, light)| light)
            .filter(|light| light.reaches(ctx.coord, dims))
            .collect();

        let lit = light_chunk(
            &voxels,
            &library,
            ctx.coord,
            &lights,
            &shared.config.lighting,
            shared.config.seed,
        );
        ctx.check_cancelled()?;

        shared.write_back(ctx, &self.slot, Some(version), |chunk| {
            chunk.voxels = Arc::new(lit);
            chunk.completed.insert(JobKind::Light);
        })
    }
}

// ---------------------------------------------------------------------------
// Mesh
// ---------------------------------------------------------------------------

/// Meshes the chunk against snapshots of its loaded neighbours.
pub(crate) struct MeshTask {
    shared: Arc<WorldShared>,
    slot: Arc<ChunkSlot>,
}

impl MeshTask {
    fn neighborhood(&self, center: Arc<VoxelBuffer>, coord: ChunkCoord, mesher: Mesher) -> ChunkNeighborhood {
        let mut neighborhood = ChunkNeighborhood::new(center, mesher.boundary_policy());
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if (dx, dy, dz) == (0, 0, 0) {
                        continue;
                    }
                    let Some(slot) = self.shared.slot(coord.offset(dx, dy, dz)) else {
                        continue;
                    };
                    let chunk = slot.lock();
                    if slot.is_live() && chunk.has_terrain() {
                        neighborhood.set_neighbor(dx, dy, dz, Arc::clone(&chunk.voxels));
                    }
                }
            }
        }
        neighborhood
    }
}

impl JobTask for MeshTask {
    fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        let shared = &self.shared;
        let config = &shared.config;

        let (center, version) = shared.write_back(ctx, &self.slot, None, |chunk| {
            if chunk.state == ChunkState::Generated {
                chunk.state = ChunkState::Meshing;
            }
            (Arc::clone(&chunk.voxels), chunk.version)
        })?;

        let mesher = Mesher::from_kind(config.mesher);
        let neighborhood = self.neighborhood(center, ctx.coord, mesher);
        let library = shared.library();
        let flags = BuildFlags {
            use_lighting: config.lighting.enabled,
            use_ao: config.lighting.enabled && config.lighting.ambient_occlusion,
            greedy: config.greedy,
            ao_strength: config.lighting.ao_strength,
        };
        let input = MeshInput::new(&neighborhood, &library)
            .with_scale(config.voxel_scale)
            .with_isolevel(config.isolevel)
            .with_flags(flags);

        let mut tool = SurfaceTool::new(MergeMode::for_library(library.kind()));
        let passes = [Some(mesher), mesher.liquid_pass().filter(|_| config.liquid_mesher)];
        for pass in passes.into_iter().flatten() {
            pass.mesh_into(&input, &mut tool).map_err(|err| {
                tracing::warn!(coord = %ctx.coord, mesher = ?pass, %err, "mesher data invalid");
                JobError::from(err)
            })?;
        }
        let mesh = tool.commit();
        ctx.check_cancelled()?;

        shared.write_back(ctx, &self.slot, Some(version), |chunk| {
            tracing::trace!(
                coord = %ctx.coord,
                vertices = mesh.vertex_count(),
                surfaces = mesh.surfaces.len(),
                "mesh installed"
            );
            chunk.mesh = Some(Arc::new(mesh));
            chunk.completed.insert(JobKind::Mesh);
            chunk.state = ChunkState::Ready;
            chunk.last_error = None;
            chunk.regen_attempts = 0;
        })
    }
}

// ---------------------------------------------------------------------------
// Props
// ---------------------------------------------------------------------------

/// Places decorations on the meshed surface.
pub(crate) struct PropTask {
    shared: Arc<WorldShared>,
    slot: Arc<ChunkSlot>,
}

impl JobTask for PropTask {
    fn run(&self, ctx: &JobContext) -> Result<(), JobError> {
        let shared = &self.shared;
        let (voxels, version) = shared.snapshot(ctx, &self.slot)?;
        let library = shared.library();
        let props = place_props(&voxels, &library, ctx.coord, shared.config.seed, &shared.config.props);
        ctx.check_cancelled()?;

        shared.write_back(ctx, &self.slot, Some(version), |chunk| {
            chunk.props = props;
            chunk.completed.insert(JobKind::Prop);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::generator::FlatLevelGenerator;
    use crate::job::JobId;
    use terra_library::{LibraryKind, MaterialDef, MemoryTextures};
    use terra_voxel::{ChunkDims, MaterialId};

    fn library() -> MaterialLibrary {
        let mut lib = MaterialLibrary::new(LibraryKind::Simple);
        lib.register(MaterialDef::solid(1, "stone", "stone")).unwrap();
        let tile = image::RgbaImage::from_pixel(4, 4, image::Rgba([90, 90, 90, 255]));
        lib.finalize(Arc::new(MemoryTextures::new().with("stone", tile)))
            .unwrap();
        lib
    }

    fn shared(generator: Option<Arc<dyn LevelGenerator>>) -> Arc<WorldShared> {
        let config = WorldConfig {
            chunk_dims: ChunkDims::cubic(8),
            ..Default::default()
        };
        Arc::new(WorldShared::new(config, library(), generator))
    }

    fn insert(shared: &WorldShared, coord: ChunkCoord) -> Arc<ChunkSlot> {
        let slot = Arc::new(ChunkSlot::new(Chunk::new(coord, shared.config.chunk_dims)));
        shared.chunks.insert(coord, Arc::clone(&slot));
        slot
    }

    fn ctx(coord: ChunkCoord, kind: JobKind) -> (JobContext, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (JobContext::new(JobId(1), coord, kind, Arc::clone(&flag)), flag)
    }

    fn run(kind: JobKind, shared: &Arc<WorldShared>, slot: &Arc<ChunkSlot>) -> Result<(), JobError> {
        let (ctx, _) = ctx(slot.lock().coord, kind);
        make_task(kind, shared, slot).run(&ctx)
    }

    #[test]
    fn test_pipeline_installs_each_stage() {
        let shared = shared(Some(Arc::new(FlatLevelGenerator::uniform(4, MaterialId(1)))));
        let slot = insert(&shared, ChunkCoord::default());

        run(JobKind::Terrain, &shared, &slot).unwrap();
        assert_eq!(slot.lock().state, ChunkState::Generated);
        assert_eq!(slot.lock().version, 1);

        run(JobKind::Light, &shared, &slot).unwrap();
        assert!(slot.lock().voxels.has(terra_voxel::ChannelKind::Light));

        run(JobKind::Mesh, &shared, &slot).unwrap();
        {
            let chunk = slot.lock();
            assert_eq!(chunk.state, ChunkState::Ready);
            assert!(!chunk.mesh.as_ref().unwrap().is_empty());
        }

        run(JobKind::Prop, &shared, &slot).unwrap();
        let chunk = slot.lock();
        assert!(chunk.completed.contains_all(JobKindSet::from_kinds(&JobKind::ALL)));
    }

    #[test]
    fn test_missing_generator_fails() {
        let shared = shared(None);
        let slot = insert(&shared, ChunkCoord::default());
        assert_eq!(run(JobKind::Terrain, &shared, &slot), Err(JobError::GeneratorMissing));
        assert_eq!(slot.lock().state, ChunkState::Empty);
    }

    #[test]
    fn test_dead_slot_refuses_write_back() {
        let shared = shared(Some(Arc::new(FlatLevelGenerator::uniform(4, MaterialId(1)))));
        let coord = ChunkCoord::new(2, 0, 0);
        let slot = insert(&shared, coord);
        slot.kill();
        assert_eq!(run(JobKind::Terrain, &shared, &slot), Err(JobError::ChunkGone(coord)));
        assert_eq!(slot.lock().voxels.count_non_empty(), 0);
        assert_eq!(shared.cancelled_writebacks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_cancelled_job_does_not_write() {
        let shared = shared(Some(Arc::new(FlatLevelGenerator::uniform(4, MaterialId(1)))));
        let slot = insert(&shared, ChunkCoord::default());
        let (ctx, flag) = ctx(ChunkCoord::default(), JobKind::Terrain);
        flag.store(true, Ordering::Release);
        let result = make_task(JobKind::Terrain, &shared, &slot).run(&ctx);
        assert_eq!(result, Err(JobError::Cancelled));
        assert!(!slot.lock().has_terrain());
    }

    #[test]
    fn test_version_change_makes_write_back_stale() {
        let shared = shared(Some(Arc::new(FlatLevelGenerator::uniform(4, MaterialId(1)))));
        let slot = insert(&shared, ChunkCoord::default());
        run(JobKind::Terrain, &shared, &slot).unwrap();

        let (ctx, _) = ctx(ChunkCoord::default(), JobKind::Light);
        let (_, version) = shared.snapshot(&ctx, &slot).unwrap();
        slot.lock().version += 1;
        let result = shared.write_back(&ctx, &slot, Some(version), |_| ());
        assert_eq!(result, Err(JobError::Stale));
        assert_eq!(shared.stale_writebacks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_invalid_density_fails_mesh() {
        let shared = shared(Some(Arc::new(FlatLevelGenerator::uniform(4, MaterialId(1)))));
        let slot = insert(&shared, ChunkCoord::default());
        run(JobKind::Terrain, &shared, &slot).unwrap();
        {
            let mut chunk = slot.lock();
            let mut voxels = (*chunk.voxels).clone();
            voxels.set_density(1, 1, 1, f32::NAN).unwrap();
            chunk.voxels = Arc::new(voxels);
        }
        let result = run(JobKind::Mesh, &shared, &slot);
        assert!(matches!(result, Err(JobError::MesherDataInvalid(_))));
        assert!(slot.lock().mesh.is_none());
    }
}
