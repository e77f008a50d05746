//! Headless terrain demo.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p terra-demo -- --mesher marching-cubes --ticks 200`.

mod setup;
mod sim;

use std::process::ExitCode;

use clap::Parser;
use terra_config::{CliArgs, Config, default_config_dir};
use tracing::info;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(default_config_dir);

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    terra_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));

    if let Err(err) = config.validate() {
        tracing::error!(%err, "invalid configuration");
        return ExitCode::FAILURE;
    }

    info!(
        mesher = ?config.world.mesher,
        library = ?config.library.kind,
        seed = config.world.seed,
        ticks = args.ticks,
        "starting terrain demo"
    );
    match sim::run(&config, args.ticks) {
        Ok(summary) => {
            info!(
                ticks = summary.ticks,
                generated = summary.generated,
                meshed = summary.meshed,
                unloaded = summary.unloaded,
                failed = summary.failed,
                meshes = summary.meshes_submitted,
                released = summary.meshes_released,
                active = summary.meshes_active,
                triangles = summary.triangles,
                cancelled_writebacks = summary.stats.cancelled_writebacks,
                stale_writebacks = summary.stats.stale_writebacks,
                "demo finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(%err, "demo failed");
            ExitCode::FAILURE
        }
    }
}
