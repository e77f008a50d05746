//! Configuration for the terrain engine.
//!
//! Settings persist to disk as `config.ron`, every section falls back to its
//! defaults when missing, and command-line arguments override what was
//! loaded.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    Config, DebugConfig, GeneratorChoice, JobsConfig, LibraryChoice, LibrarySettings, LightingSettings, MesherChoice,
    StreamingSettings, WorldSettings, default_config_dir,
};
pub use error::ConfigError;
