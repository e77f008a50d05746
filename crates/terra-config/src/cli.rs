//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, LibraryChoice, MesherChoice};

/// Terrain engine command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "terra", about = "Chunked voxel terrain engine")]
pub struct CliArgs {
    /// Terrain mesher.
    #[arg(long, value_enum)]
    pub mesher: Option<MesherChoice>,

    /// Material library layout.
    #[arg(long, value_enum)]
    pub library: Option<LibraryChoice>,

    /// Load radius in chunks.
    #[arg(long)]
    pub load_radius: Option<u32>,

    /// Unload radius in chunks.
    #[arg(long)]
    pub unload_radius: Option<u32>,

    /// Worker threads (0 = one per core, minus one).
    #[arg(long)]
    pub workers: Option<usize>,

    /// World seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of viewer ticks to simulate.
    #[arg(long, default_value_t = 120)]
    pub ticks: u32,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(mesher) = args.mesher {
            self.world.mesher = mesher;
        }
        if let Some(kind) = args.library {
            self.library.kind = kind;
        }
        if let Some(r) = args.load_radius {
            self.streaming.load_radius = r;
        }
        if let Some(r) = args.unload_radius {
            self.streaming.unload_radius = r;
        }
        if let Some(workers) = args.workers {
            self.jobs.worker_threads = workers;
        }
        if let Some(seed) = args.seed {
            self.world.seed = seed;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            mesher: Some(MesherChoice::MarchingCubes),
            seed: Some(99),
            load_radius: Some(2),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.world.mesher, MesherChoice::MarchingCubes);
        assert_eq!(config.world.seed, 99);
        assert_eq!(config.streaming.load_radius, 2);
        // Non-overridden fields retain defaults
        assert_eq!(config.streaming.unload_radius, 8);
        assert_eq!(config.library.kind, LibraryChoice::Simple);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::try_parse_from([
            "terra",
            "--mesher",
            "marching-cubes",
            "--library",
            "merger-pcm",
            "--workers",
            "3",
            "--ticks",
            "10",
        ])
        .unwrap();
        assert_eq!(args.mesher, Some(MesherChoice::MarchingCubes));
        assert_eq!(args.library, Some(LibraryChoice::MergerPcm));
        assert_eq!(args.workers, Some(3));
        assert_eq!(args.ticks, 10);
    }
}
