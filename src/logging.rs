//! Logging
//!
//! Everything is logged through `tracing` into one append-only file so the
//! console stays free for the report. `RUST_LOG` takes precedence over the
//! configured level.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingSettings;
use crate::utils::error::{AppError, AppResult};
use crate::utils::paths::ensure_parent_dir;

/// Filter from `RUST_LOG`, or from `level` when the variable is unset.
pub fn build_filter(level: &str) -> AppResult<EnvFilter> {
    filter_from(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref(), level)
}

/// Filter from the `RUST_LOG` value `env` when it parses, else from `level`.
fn filter_from(env: Option<&str>, level: &str) -> AppResult<EnvFilter> {
    if let Some(directives) = env.filter(|d| !d.trim().is_empty()) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return Ok(filter);
        }
    }
    EnvFilter::try_new(level)
        .map_err(|e| AppError::config(format!("Invalid log level '{}': {}", level, e)))
}

/// Install the global subscriber writing to `settings.file`.
///
/// Returns the absolute path of the log file.
pub fn init_logging(settings: &LoggingSettings) -> AppResult<PathBuf> {
    let path = absolute(&settings.file)?;
    ensure_parent_dir(&path)?;
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true),
        )
        .with(build_filter(&settings.level)?)
        .try_init()
        .map_err(|e| AppError::internal(format!("Logging already initialized: {}", e)))?;

    tracing::info!("Research Proposal System - logging initialized");
    tracing::debug!(log_file = %path.display(), "log file");
    Ok(path)
}

fn absolute(path: &Path) -> AppResult<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
