//! Headless simulation: a viewer walking across the world while chunks
//! stream in and out around it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{Mat4, Vec3};
use terra_config::Config;
use terra_library::LibraryError;
use terra_mesh::MeshData;
use terra_voxel::{ChunkCoord, VoxelError};
use terra_world::{
    RenderHandle, RenderSink, SceneAttachment, World, WorldError, WorldEvent, WorldLight, WorldStats,
};

use crate::setup::{build_generator, build_library, world_config};

/// Ticks between progress log lines.
const LOG_EVERY: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error(transparent)]
    Voxel(#[from] VoxelError),
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    World(#[from] WorldError),
}

/// Counters shared between the host and the simulation loop.
#[derive(Debug, Default)]
pub struct HostCounters {
    pub submitted: AtomicUsize,
    pub released: AtomicUsize,
    pub active: AtomicUsize,
    pub triangles: AtomicUsize,
}

/// Host that only counts what it is given.
#[derive(Debug, Default)]
pub struct CountingHost {
    counters: Arc<HostCounters>,
    next: u64,
}

impl CountingHost {
    pub fn new(counters: Arc<HostCounters>) -> Self {
        Self { counters, next: 0 }
    }
}

impl RenderSink for CountingHost {
    fn submit_mesh(&mut self, _transform: Mat4, mesh: &MeshData) -> RenderHandle {
        self.next += 1;
        self.counters.submitted.fetch_add(1, Ordering::Relaxed);
        self.counters
            .triangles
            .fetch_add(mesh.triangle_count(), Ordering::Relaxed);
        RenderHandle(self.next)
    }

    fn release(&mut self, _handle: RenderHandle) {
        self.counters.released.fetch_add(1, Ordering::Relaxed);
    }
}

impl SceneAttachment for CountingHost {
    fn activate(&mut self, _coord: ChunkCoord, _handle: RenderHandle) {
        self.counters.active.fetch_add(1, Ordering::Relaxed);
    }

    fn deactivate(&mut self, _coord: ChunkCoord, _handle: RenderHandle) {
        self.counters.active.fetch_sub(1, Ordering::Relaxed);
    }
}

/// What a run produced.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Summary {
    pub ticks: u32,
    pub generated: usize,
    pub meshed: usize,
    pub unloaded: usize,
    pub failed: usize,
    pub meshes_submitted: usize,
    pub meshes_released: usize,
    pub meshes_active: usize,
    /// Triangles across every submitted mesh.
    pub triangles: usize,
    pub stats: WorldStats,
}

/// Builds a world from `config` and walks a viewer along +x for `ticks`
/// ticks, then lets outstanding work finish.
pub fn run(config: &Config, ticks: u32) -> Result<Summary, DemoError> {
    let world_config = world_config(config)?;
    let library = build_library(&config.library)?;
    let generator = build_generator(&config.world);
    let counters = Arc::new(HostCounters::default());

    let scale = world_config.voxel_scale;
    let chunk_width = world_config.chunk_dims.x as f32 * scale;
    let eye_height = (config.world.floor_height as f32 + 2.0) * scale;
    let mut world =
        World::new(world_config, library, Some(generator))?.with_host(CountingHost::new(Arc::clone(&counters)));

    // A lamp hovering over the start so the light bake has work.
    world.add_light(WorldLight {
        position: Vec3::new(0.0, eye_height + 4.0 * scale, 0.0),
        color: terra_voxel::LightColor([255, 200, 120]),
        size: 6.0 * scale,
    })?;

    let mut summary = Summary {
        ticks,
        ..Default::default()
    };
    for tick in 0..ticks {
        let viewer = Vec3::new(tick as f32 * chunk_width / 4.0, eye_height, 0.0);
        let mut events = world.update_viewer(viewer);
        events.extend(world.update());
        tally(&mut summary, &events);

        if tick % LOG_EVERY == 0 {
            let stats = world.stats();
            tracing::info!(
                tick,
                viewer = %world.viewer(),
                loaded = stats.loaded,
                ready = stats.ready,
                queued = world.job_queue_depth(),
                "tick"
            );
        }
    }

    let events = world.flush();
    tally(&mut summary, &events);
    summary.stats = world.stats();
    summary.meshes_submitted = counters.submitted.load(Ordering::Relaxed);
    summary.meshes_released = counters.released.load(Ordering::Relaxed);
    summary.meshes_active = counters.active.load(Ordering::Relaxed);
    summary.triangles = counters.triangles.load(Ordering::Relaxed);
    Ok(summary)
}

fn tally(summary: &mut Summary, events: &[WorldEvent]) {
    for event in events {
        match event {
            WorldEvent::ChunkGenerated(_) => summary.generated += 1,
            WorldEvent::ChunkReady { .. } => summary.meshed += 1,
            WorldEvent::ChunkUnloaded(_) => summary.unloaded += 1,
            WorldEvent::ChunkDirty { coord, error } => {
                summary.failed += 1;
                tracing::warn!(%coord, %error, "chunk failed");
            }
            WorldEvent::PropsPlaced { .. } | WorldEvent::RegenerationRequested(_) => {}
        }
    }
}
