// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cross-validated decoding of one recording session.
//!
//! Loads `neurodecode.toml` (or `--config`), reads a JSON session file,
//! decodes it and logs a summary. With `--output` the per-sample estimates
//! and summaries are written as JSON.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser};
use neurodecode::config::{load_config, LoggingConfig};
use neurodecode::engine::{DecodingOrchestrator, DecodingSession};
#[cfg(feature = "file-logging")]
use neurodecode::observability::init_file_logging;
use neurodecode::observability::{debug_flags_help, init_logging, parse_debug_flags, LoggingGuard};
use neurodecode::session::{DecodingReport, SessionFile};
use tracing::{info, warn};

/// Cross-validated Bayesian decoding of one recording session
#[derive(Parser, Debug)]
#[command(name = "run_decoding", version, long_about = None)]
struct Args {
    /// JSON session file (variables, spike counts, optional labels)
    #[arg(long)]
    session: PathBuf,

    /// Configuration file (default: neurodecode.toml in the working directory or a parent)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the decoding report as JSON
    #[arg(long)]
    output: Option<PathBuf>,

    /// Phase bins for the error-by-phase profile
    #[arg(long, value_name = "N", default_value_t = 8)]
    phase_bins: usize,

    /// Samples either side of each event for the event-triggered error
    #[arg(long = "event-window", value_name = "N", default_value_t = 10)]
    event_half_window: usize,

    /// Per-run JSON log folder (file-logging builds only)
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Configuration override, e.g. `--set folds=10`.
    /// Keys: window_s, folds, parallel_folds, silent_population, min_spikes,
    /// min_speed, min_occupancy_s, log_level
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_override)]
    overrides: Vec<(String, String)>,
}

fn parse_override(raw: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

/// Parse everything except `--debug-*`, which `parse_debug_flags` reads itself
fn parse_args<I>(raw: I) -> std::result::Result<Args, clap::Error>
where
    I: IntoIterator<Item = String>,
{
    let kept = raw.into_iter().filter(|arg| !arg.starts_with("--debug-"));
    let matches = Args::command()
        .after_help(debug_flags_help())
        .try_get_matches_from(kept)?;
    Args::from_arg_matches(&matches)
}

#[cfg(feature = "file-logging")]
fn start_logging(config: &LoggingConfig, log_dir: Option<PathBuf>) -> Result<LoggingGuard> {
    let flags = parse_debug_flags();
    match log_dir {
        Some(dir) => init_file_logging(&flags, config, Some(dir), None),
        None => init_logging(&flags, config),
    }
}

#[cfg(not(feature = "file-logging"))]
fn start_logging(config: &LoggingConfig, log_dir: Option<PathBuf>) -> Result<LoggingGuard> {
    let guard = init_logging(&parse_debug_flags(), config)?;
    if log_dir.is_some() {
        warn!("--log-dir ignored: built without the file-logging feature");
    }
    Ok(guard)
}

fn run(args: Args) -> Result<()> {
    let overrides: HashMap<String, String> = args.overrides.iter().cloned().collect();
    let config = load_config(args.config.as_deref(), Some(&overrides))
        .context("Failed to load configuration")?;
    let _guard = start_logging(&config.logging, args.log_dir.clone())?;

    let raw = fs::read_to_string(&args.session)
        .with_context(|| format!("Failed to read session file {}", args.session.display()))?;
    let session_file = SessionFile::from_json(&raw)?;
    let behavior = session_file.behavior()?;
    let counts = session_file.spike_count_array()?;
    info!(
        samples = behavior.len(),
        cells = counts.ncols(),
        session = %args.session.display(),
        "Loaded session"
    );

    let orchestrator = DecodingOrchestrator::new(config)?;
    let result = orchestrator.run(&DecodingSession {
        behavior: &behavior,
        spike_counts: counts.view(),
        training_range: session_file.training_range(),
    })?;

    let mut report = DecodingReport::from_result(&result);
    if let Some(phases) = &session_file.phases {
        report = report.with_error_by_phase(&result, phases, args.phase_bins)?;
    }
    if let Some(events) = &session_file.events {
        report = report.with_error_around_events(&result, events, args.event_half_window);
    }

    match report.median_error {
        Some(error) => info!(
            decoded = report.decoded,
            cells = report.cells.len(),
            median_error = error,
            accuracy = ?report.accuracy,
            "Decoding summary"
        ),
        None => warn!(cells = report.cells.len(), "No sample could be decoded"),
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        info!(path = %path.display(), "Wrote decoding report");
    }

    Ok(())
}

fn main() {
    let args = parse_args(env::args()).unwrap_or_else(|e| e.exit());
    if let Err(e) = run(args) {
        eprintln!("run_decoding failed: {e:#}");
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(args: &[&str]) -> Vec<String> {
        std::iter::once("run_decoding")
            .chain(args.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults_and_overrides() {
        let args = parse_args(argv(&[
            "--session",
            "s.json",
            "--set",
            "folds = 10",
            "--debug-neurodecode-engine",
        ]))
        .unwrap();
        assert_eq!(args.session, PathBuf::from("s.json"));
        assert_eq!(args.phase_bins, 8);
        assert_eq!(args.event_half_window, 10);
        assert_eq!(args.overrides, vec![("folds".to_string(), "10".to_string())]);
    }

    #[test]
    fn test_bad_count_names_the_flag() {
        let err = parse_args(argv(&["--session", "s.json", "--phase-bins", "eight"])).unwrap_err();
        assert!(err.to_string().contains("--phase-bins"), "{err}");

        let err = parse_args(argv(&["--session", "s.json", "--event-window", "many"])).unwrap_err();
        assert!(err.to_string().contains("--event-window"), "{err}");
    }

    #[test]
    fn test_malformed_override_rejected() {
        let err = parse_args(argv(&["--session", "s.json", "--set", "folds"])).unwrap_err();
        assert!(err.to_string().contains("key=value"), "{err}");
    }
}
