//! Turns a loaded [`Config`] into the pieces a [`terra_world::World`] needs.

use std::sync::Arc;

use terra_config::{Config, GeneratorChoice, LibraryChoice, LibrarySettings, MesherChoice, WorldSettings};
use terra_library::{
    AtlasConfig, DirectoryTextures, FaceTextures, LibraryError, LibraryKind, MaterialDef, MaterialLibrary,
    MemoryTextures, checkerboard,
};
use terra_mesh::MesherKind;
use terra_voxel::{ChunkCoord, ChunkDims, MaterialId, VoxelError, WorldBounds};
use terra_world::{
    FlatLayer, FlatLevelGenerator, LevelGenerator, LightingConfig, NoiseLevelGenerator, NoisePalette, PropConfig,
    SchedulerConfig, StreamingConfig, WorldConfig,
};

pub const STONE: MaterialId = MaterialId(1);
pub const DIRT: MaterialId = MaterialId(2);
pub const GRASS: MaterialId = MaterialId(3);
pub const WATER: MaterialId = MaterialId(4);
pub const LAMP: MaterialId = MaterialId(5);

/// Runtime world configuration from the file configuration.
pub fn world_config(config: &Config) -> Result<WorldConfig, VoxelError> {
    let world = &config.world;
    let (x, y, z) = world.chunk_size;
    let (min, max) = (world.bounds_min, world.bounds_max);
    Ok(WorldConfig {
        chunk_dims: ChunkDims::new(x, y, z)?,
        voxel_scale: world.voxel_scale,
        bounds: WorldBounds::new(ChunkCoord::new(min.0, min.1, min.2), ChunkCoord::new(max.0, max.1, max.2)),
        mesher: mesher_kind(world.mesher),
        liquid_mesher: world.liquid_mesher,
        isolevel: world.isolevel,
        greedy: world.greedy_meshing,
        seed: world.seed,
        remesh_neighbors: world.remesh_neighbors,
        lighting: LightingConfig {
            enabled: config.lighting.enabled,
            ambient_occlusion: config.lighting.ambient_occlusion,
            random_ao: config.lighting.random_ao,
            bake_lights: config.lighting.bake_lights,
            sunlight: config.lighting.sunlight,
            ao_strength: config.lighting.ao_strength,
        },
        props: PropConfig::default(),
        scheduler: SchedulerConfig {
            worker_threads: config.jobs.worker_threads,
            max_in_flight: config.jobs.max_in_flight,
            max_jobs_per_pump: config.jobs.max_jobs_per_tick,
        },
        streaming: StreamingConfig {
            load_radius: config.streaming.load_radius,
            unload_radius: config.streaming.unload_radius,
            loads_per_tick: config.streaming.loads_per_tick,
            unloads_per_tick: config.streaming.unloads_per_tick,
        },
    })
}

fn mesher_kind(choice: MesherChoice) -> MesherKind {
    match choice {
        MesherChoice::Blocky => MesherKind::Blocky,
        MesherChoice::MarchingCubes => MesherKind::MarchingCubes,
        MesherChoice::Cubic => MesherKind::Cubic,
        MesherChoice::Default => MesherKind::Default,
    }
}

fn library_kind(choice: LibraryChoice) -> LibraryKind {
    match choice {
        LibraryChoice::Simple => LibraryKind::Simple,
        LibraryChoice::Merger => LibraryKind::Merger,
        LibraryChoice::MergerPcm => LibraryKind::MergerPcm,
    }
}

/// Finalized material library: the configured manifest with textures from
/// `texture_dir`, or the built-in set with generated textures.
pub fn build_library(settings: &LibrarySettings) -> Result<MaterialLibrary, LibraryError> {
    let kind = library_kind(settings.kind);
    let atlas = AtlasConfig {
        atlas_size: settings.atlas_size,
        tile_size: settings.tile_size,
    };
    atlas.validate()?;

    if let Some(manifest) = &settings.manifest {
        let mut library = MaterialLibrary::from_manifest_path(kind, atlas, manifest)?;
        library.finalize(Arc::new(DirectoryTextures::new(&settings.texture_dir, settings.tile_size)))?;
        tracing::info!(manifest = %manifest.display(), "material manifest loaded");
        return Ok(library);
    }

    let mut library = MaterialLibrary::with_atlas_config(kind, atlas);
    for def in builtin_materials() {
        library.register(def)?;
    }
    library.finalize(Arc::new(builtin_textures(settings.tile_size)))?;
    Ok(library)
}

fn builtin_materials() -> Vec<MaterialDef> {
    vec![
        MaterialDef::solid(STONE.0, "stone", "stone"),
        MaterialDef::solid(DIRT.0, "dirt", "dirt"),
        MaterialDef::solid(GRASS.0, "grass", "grass_side").with_textures(FaceTextures::TopSideBottom {
            top: "grass_top".to_string(),
            side: "grass_side".to_string(),
            bottom: "dirt".to_string(),
        }),
        MaterialDef::liquid(WATER.0, "water", "water"),
        MaterialDef::solid(LAMP.0, "lamp", "lamp").with_emission(14),
    ]
}

fn builtin_textures(size: u32) -> MemoryTextures {
    [
        ("stone", [120, 120, 120, 255], [100, 100, 100, 255]),
        ("dirt", [121, 85, 58, 255], [101, 67, 45, 255]),
        ("grass_top", [86, 160, 60, 255], [70, 140, 50, 255]),
        ("grass_side", [110, 120, 60, 255], [121, 85, 58, 255]),
        ("water", [40, 90, 200, 160], [50, 110, 220, 160]),
        ("lamp", [250, 230, 150, 255], [255, 245, 200, 255]),
    ]
    .into_iter()
    .fold(MemoryTextures::new(), |textures, (name, a, b)| {
        textures.with(name, checkerboard(size, a, b))
    })
}

/// Level generator selected by the world settings.
pub fn build_generator(world: &WorldSettings) -> Arc<dyn LevelGenerator> {
    match world.generator {
        GeneratorChoice::Flat => Arc::new(FlatLevelGenerator::new(
            world.floor_height,
            vec![
                FlatLayer {
                    material: GRASS,
                    thickness: 1,
                },
                FlatLayer {
                    material: DIRT,
                    thickness: 3,
                },
                FlatLayer {
                    material: STONE,
                    thickness: 1,
                },
            ],
        )),
        GeneratorChoice::Noise => Arc::new(
            NoiseLevelGenerator::with_seed(world.seed, world.floor_height as f64)
                .with_palette(NoisePalette {
                    surface: GRASS,
                    subsurface: DIRT,
                    deep: STONE,
                    liquid: Some(WATER),
                })
                .with_sea_level(world.floor_height - 2),
        ),
    }
}
