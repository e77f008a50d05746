//! Chunked voxel world: a dependency-aware job scheduler running terrain,
//! light, mesh and prop jobs per chunk on a worker pool, view-distance
//! streaming, and the [`World`] that ties them to a host renderer.

mod tasks;

pub mod chunk;
pub mod error;
pub mod generator;
pub mod host;
pub mod job;
pub mod lighting;
pub mod props;
pub mod scheduler;
pub mod seed;
pub mod streaming;
pub mod structure;
pub mod world;

pub use chunk::{Chunk, ChunkReport, ChunkSlot, ChunkState};
pub use error::{JobError, SchedulerError, WorldError};
pub use generator::{FlatLayer, FlatLevelGenerator, HeightmapParams, LevelGenerator, NoiseLevelGenerator, NoisePalette};
pub use host::{ChunkHost, NullHost, RenderHandle, RenderSink, SceneAttachment, chunk_transform};
pub use job::{JobContext, JobId, JobKind, JobKindSet, JobOutcome, JobStatus, JobTask};
pub use lighting::{LightId, LightingConfig, MAX_LIGHT_LEVEL, WorldLight, level_to_channel, light_chunk};
pub use props::{PropConfig, PropInstance, place_props};
pub use scheduler::{JobScheduler, SchedulerConfig, default_worker_count};
pub use seed::{chunk_rng, derive_chunk_seed};
pub use streaming::{ChunkStreamer, LoadQueue, StreamPlan, StreamingConfig};
pub use structure::{BlockStructure, VoxelBox, VoxelStructure};
pub use world::{World, WorldConfig, WorldEvent, WorldStats};
