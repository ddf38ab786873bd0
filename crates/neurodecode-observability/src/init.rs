// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Installs a console subscriber (text or JSON) and, with the
//! `file-logging` feature, a per-run JSON log file with retention cleanup.

use anyhow::{Context, Result};
use neurodecode_config::{LogFormat, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

#[cfg(feature = "file-logging")]
use std::path::{Path, PathBuf};

use crate::cli::CrateDebugFlags;

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Keeps background log writers alive; logs are flushed on drop
#[derive(Default)]
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    #[cfg(feature = "file-logging")]
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Directory of the current run's log files, if file logging is active
    #[cfg(feature = "file-logging")]
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Build the filter used by every layer
///
/// Debug flags take precedence; otherwise `RUST_LOG`, then the configured level.
pub fn build_env_filter(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> EnvFilter {
    if debug_flags.any_enabled() {
        return EnvFilter::new(debug_flags.to_filter_string(&config.level));
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

fn console_layer(config: &LoggingConfig, filter: EnvFilter) -> BoxedLayer {
    match config.format {
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_filter(filter)
            .boxed(),
    }
}

/// Initialize console logging
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_logging(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = build_env_filter(debug_flags, config);

    Registry::default()
        .with(vec![console_layer(config, filter)])
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    Ok(LoggingGuard::default())
}

/// Initialize console logging plus a combined JSON log under `log_dir`
///
/// Creates a timestamped folder structure:
/// ```text
/// ./logs/
///   └── run_20250101_120000/
///       └── neurodecode.log
/// ```
///
/// # Arguments
/// * `log_dir` - Base directory for logs (default: `./logs`)
/// * `retention_runs` - Keep N most recent runs (default: 10)
#[cfg(feature = "file-logging")]
pub fn init_file_logging(
    debug_flags: &CrateDebugFlags,
    config: &LoggingConfig,
    log_dir: Option<PathBuf>,
    retention_runs: Option<usize>,
) -> Result<LoggingGuard> {
    let base_log_dir = log_dir.unwrap_or_else(|| PathBuf::from("./logs"));

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let run_folder = base_log_dir.join(format!("run_{}", timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;

    cleanup_old_runs(&base_log_dir, &run_folder, retention_runs.unwrap_or(10))?;

    let appender = tracing_appender::rolling::daily(&run_folder, "neurodecode.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(build_env_filter(debug_flags, config))
        .boxed();

    let console = console_layer(config, build_env_filter(debug_flags, config));

    Registry::default()
        .with(vec![console, file_layer])
        .try_init()
        .context("Failed to install global tracing subscriber")?;

    Ok(LoggingGuard {
        _file_guards: vec![guard],
        log_dir: Some(run_folder),
    })
}

/// Remove the oldest `run_*` folders so that at most `retention_runs` remain
///
/// Folder names sort chronologically, so lexical order is age order.
#[cfg(feature = "file-logging")]
fn cleanup_old_runs(base_log_dir: &Path, current: &Path, retention_runs: usize) -> Result<()> {
    let mut runs: Vec<PathBuf> = std::fs::read_dir(base_log_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_dir()
                && path != current
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with("run_"))
                    .unwrap_or(false)
        })
        .collect();
    runs.sort();

    // The current run counts towards the limit
    let keep = retention_runs.saturating_sub(1);
    if runs.len() > keep {
        let excess = runs.len() - keep;
        for path in runs.iter().take(excess) {
            if let Err(e) = std::fs::remove_dir_all(path) {
                tracing::warn!("Failed to remove old log directory {}: {}", path.display(), e);
            }
        }
    }

    Ok(())
}
