//! Structured logging for the terrain engine.
//!
//! Installs a `tracing` subscriber with console output (uptime timer, thread
//! names so job workers are identifiable) and, in debug builds, a JSON file
//! log for post-mortem analysis. The level comes from `RUST_LOG` when set,
//! otherwise from the configuration's `debug.log_level`.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use terra_config::Config;
use tracing::Subscriber;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// File written by the JSON layer inside the log directory.
pub const LOG_FILE_NAME: &str = "terra.log";

const DEFAULT_FILTER: &str = "info,terra_world=info";

/// Initialize the global tracing subscriber.
///
/// * `log_dir` - directory for the JSON log file (debug builds only)
/// * `debug_build` - enables the file layer
/// * `config` - supplies the log level when `RUST_LOG` is unset
///
/// ```no_run
/// use terra_log::init_logging;
///
/// init_logging(Some(std::path::Path::new("./logs")), true, None);
/// ```
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, config: Option<&Config>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry().with(env_filter).with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = File::create(log_dir.join(LOG_FILE_NAME))
    {
        subscriber.with(json_file_layer(log_file)).init();
        return;
    }

    subscriber.init();
}

/// Filter directives for `config`, falling back to the default filter.
pub fn filter_directives(config: Option<&Config>) -> String {
    match config {
        Some(config) if !config.debug.log_level.trim().is_empty() => config.debug.log_level.clone(),
        _ => DEFAULT_FILTER.to_string(),
    }
}

/// The default `EnvFilter`: `info` everywhere.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}

/// One JSON object per event, without ANSI codes.
pub fn json_file_layer<S>(file: File) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_timer(fmt::time::uptime())
        .json()
}
