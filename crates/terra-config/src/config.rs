//! Configuration structs with sensible defaults and RON persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// World layout and meshing.
    pub world: WorldSettings,
    /// View-distance streaming.
    pub streaming: StreamingSettings,
    /// Worker pool.
    pub jobs: JobsConfig,
    /// Light and occlusion baking.
    pub lighting: LightingSettings,
    /// Material library.
    pub library: LibrarySettings,
    /// Debug/development settings.
    pub debug: DebugConfig,
}

/// Mesher used for terrain chunks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum MesherChoice {
    #[default]
    Blocky,
    MarchingCubes,
    Cubic,
    Default,
}

/// How materials are grouped into surfaces.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
pub enum LibraryChoice {
    /// One surface per material.
    #[default]
    Simple,
    /// One atlas surface per render group.
    Merger,
    /// One texture-array surface per render group.
    MergerPcm,
}

/// Terrain source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum GeneratorChoice {
    Flat,
    #[default]
    Noise,
}

/// World configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldSettings {
    /// Voxels per chunk along each axis.
    pub chunk_size: (usize, usize, usize),
    /// World units per voxel.
    pub voxel_scale: f32,
    /// Smallest loadable chunk coordinate (inclusive).
    pub bounds_min: (i32, i32, i32),
    /// Largest loadable chunk coordinate (inclusive).
    pub bounds_max: (i32, i32, i32),
    pub mesher: MesherChoice,
    /// Run the liquid mesher after the terrain mesher.
    pub liquid_mesher: bool,
    /// Density threshold for isosurface meshers.
    pub isolevel: f32,
    pub greedy_meshing: bool,
    pub seed: u64,
    pub generator: GeneratorChoice,
    /// Ground height for the flat generator, base height for noise.
    pub floor_height: i64,
    /// Remesh neighbouring chunks when a chunk's border changes.
    pub remesh_neighbors: bool,
}

/// Streaming configuration, in chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StreamingSettings {
    pub load_radius: u32,
    /// Must exceed `load_radius`.
    pub unload_radius: u32,
    pub loads_per_tick: u32,
    pub unloads_per_tick: u32,
}

/// Worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JobsConfig {
    /// Worker threads (0 = derive from the CPU count).
    pub worker_threads: usize,
    /// Jobs allowed on workers at once.
    pub max_in_flight: usize,
    /// Jobs dispatched per update.
    pub max_jobs_per_tick: usize,
}

/// Lighting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightingSettings {
    pub enabled: bool,
    pub ambient_occlusion: bool,
    pub random_ao: bool,
    /// Bake point lights into the light channel.
    pub bake_lights: bool,
    pub sunlight: bool,
    /// Darkening applied by ambient occlusion (0.0 - 1.0).
    pub ao_strength: f32,
}

/// Material library configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LibrarySettings {
    pub kind: LibraryChoice,
    /// RON material manifest; built-in materials are used when unset.
    pub manifest: Option<PathBuf>,
    /// Directory the manifest's texture names resolve against.
    pub texture_dir: PathBuf,
    /// Edge length of one texture tile in pixels.
    pub tile_size: u32,
    /// Edge length of one atlas page in pixels.
    pub atlas_size: u32,
}

/// Debug/development configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level override (e.g., "debug", "info", "warn").
    pub log_level: String,
}

// --- Default implementations ---

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            chunk_size: (16, 16, 16),
            voxel_scale: 1.0,
            bounds_min: (-64, -4, -64),
            bounds_max: (64, 4, 64),
            mesher: MesherChoice::Blocky,
            liquid_mesher: true,
            isolevel: 0.0,
            greedy_meshing: true,
            seed: 0,
            generator: GeneratorChoice::Noise,
            floor_height: 8,
            remesh_neighbors: true,
        }
    }
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            load_radius: 6,
            unload_radius: 8,
            loads_per_tick: 16,
            unloads_per_tick: 16,
        }
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            max_in_flight: 64,
            max_jobs_per_tick: 64,
        }
    }
}

impl Default for LightingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ambient_occlusion: true,
            random_ao: true,
            bake_lights: true,
            sunlight: true,
            ao_strength: 0.25,
        }
    }
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            kind: LibraryChoice::Simple,
            manifest: None,
            texture_dir: PathBuf::from("textures"),
            tile_size: 16,
            atlas_size: 256,
        }
    }
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Platform config directory for the engine, `./terra` if none exists.
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join("terra"))
        .unwrap_or_else(|| PathBuf::from("terra"))
}

// --- Load / Save / Reload ---

impl Config {
    /// Load config from the given directory, or create a default config file.
    pub fn load_or_create(config_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = config_dir.join("config.ron");

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
            let config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;
            log::info!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Config::default();
            config.save(config_dir)?;
            log::info!("Created default config at {}", config_path.display());
            Ok(config)
        }
    }

    /// Save config to the given directory as `config.ron`.
    pub fn save(&self, config_dir: &Path) -> Result<(), ConfigError> {
        std::fs::create_dir_all(config_dir).map_err(ConfigError::WriteError)?;

        let config_path = config_dir.join("config.ron");
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(3)
            .separate_tuple_members(true)
            .enumerate_arrays(false);

        let serialized = ron::ser::to_string_pretty(self, pretty).map_err(ConfigError::SerializeError)?;

        std::fs::write(&config_path, serialized).map_err(ConfigError::WriteError)?;
        Ok(())
    }

    /// Hot-reload: returns `Some(new_config)` if the file changed, `None` otherwise.
    pub fn reload(&self, config_dir: &Path) -> Result<Option<Self>, ConfigError> {
        let config_path = config_dir.join("config.ron");
        let contents = std::fs::read_to_string(&config_path).map_err(ConfigError::ReadError)?;
        let new_config: Config = ron::from_str(&contents).map_err(ConfigError::ParseError)?;

        if &new_config != self {
            log::info!("Config reloaded with changes");
            Ok(Some(new_config))
        } else {
            Ok(None)
        }
    }

    /// Checks settings that deserialize fine but cannot run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (load, unload) = (self.streaming.load_radius, self.streaming.unload_radius);
        if unload <= load {
            return Err(ConfigError::InvalidRadii { load, unload });
        }
        Ok(())
    }
}
