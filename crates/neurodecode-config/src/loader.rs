// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{validate_config, ConfigError, ConfigResult, NeurodecodeConfig, SilentPopulation};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "neurodecode.toml";

/// Find the neurodecode configuration file
///
/// Search order:
/// 1. `NEURODECODE_CONFIG_PATH` environment variable
/// 2. Current working directory: `./neurodecode.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("NEURODECODE_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by NEURODECODE_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();

    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    if let Some(path) = search_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet NEURODECODE_CONFIG_PATH to specify a custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Returns
///
/// Validated `NeurodecodeConfig` with all overrides applied
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NeurodecodeConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config = parse_config(&content)?;

    apply_environment_overrides(&mut config);

    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    validate_config(&config)?;

    Ok(config)
}

/// Parse a TOML document without applying any overrides
pub fn parse_config(content: &str) -> ConfigResult<NeurodecodeConfig> {
    Ok(toml::from_str(content)?)
}

fn parse_flag(value: &str) -> bool {
    let lowered = value.to_lowercase();
    lowered == "true" || lowered == "1" || lowered == "yes"
}

fn parse_silent_population(value: &str) -> Option<SilentPopulation> {
    match value.to_lowercase().as_str() {
        "undefined" => Some(SilentPopulation::Undefined),
        "keep_posterior" => Some(SilentPopulation::KeepPosterior),
        _ => None,
    }
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `NEURODECODE_WINDOW_S` -> `decoding.window_duration_s`
/// - `NEURODECODE_FOLDS` -> `decoding.folds`
/// - `NEURODECODE_PARALLEL_FOLDS` -> `decoding.parallel_folds`
/// - `NEURODECODE_SILENT_POPULATION` -> `decoding.silent_population`
/// - `NEURODECODE_MIN_SPIKES` -> `selection.min_spikes`
/// - `NEURODECODE_MIN_SPEED` -> `selection.min_speed`
/// - `NEURODECODE_MIN_OCCUPANCY_S` -> `rate_map.min_occupancy_s`
/// - `NEURODECODE_LOG_LEVEL` -> `logging.level`
///
/// Values that fail to parse are ignored.
pub fn apply_environment_overrides(config: &mut NeurodecodeConfig) {
    if let Ok(value) = env::var("NEURODECODE_WINDOW_S") {
        if let Ok(window) = value.parse::<f64>() {
            config.decoding.window_duration_s = window;
        }
    }
    if let Ok(value) = env::var("NEURODECODE_FOLDS") {
        if let Ok(folds) = value.parse::<usize>() {
            config.decoding.folds = folds;
        }
    }
    if let Ok(value) = env::var("NEURODECODE_PARALLEL_FOLDS") {
        config.decoding.parallel_folds = parse_flag(&value);
    }
    if let Ok(value) = env::var("NEURODECODE_SILENT_POPULATION") {
        if let Some(policy) = parse_silent_population(&value) {
            config.decoding.silent_population = policy;
        }
    }

    if let Ok(value) = env::var("NEURODECODE_MIN_SPIKES") {
        if let Ok(min_spikes) = value.parse::<f64>() {
            config.selection.min_spikes = min_spikes;
        }
    }
    if let Ok(value) = env::var("NEURODECODE_MIN_SPEED") {
        if let Ok(min_speed) = value.parse::<f64>() {
            config.selection.min_speed = min_speed;
        }
    }

    if let Ok(value) = env::var("NEURODECODE_MIN_OCCUPANCY_S") {
        if let Ok(occupancy) = value.parse::<f64>() {
            config.rate_map.min_occupancy_s = occupancy;
        }
    }

    if let Ok(value) = env::var("NEURODECODE_LOG_LEVEL") {
        config.logging.level = value;
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - HashMap of CLI arguments (e.g., `{"folds": "10", "window_s": "0.5"}`)
pub fn apply_cli_overrides(config: &mut NeurodecodeConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("window_s") {
        if let Ok(window) = value.parse::<f64>() {
            config.decoding.window_duration_s = window;
        }
    }
    if let Some(value) = cli_args.get("folds") {
        if let Ok(folds) = value.parse::<usize>() {
            config.decoding.folds = folds;
        }
    }
    if let Some(value) = cli_args.get("parallel_folds") {
        config.decoding.parallel_folds = parse_flag(value);
    }
    if let Some(value) = cli_args.get("silent_population") {
        if let Some(policy) = parse_silent_population(value) {
            config.decoding.silent_population = policy;
        }
    }
    if let Some(value) = cli_args.get("min_spikes") {
        if let Ok(min_spikes) = value.parse::<f64>() {
            config.selection.min_spikes = min_spikes;
        }
    }
    if let Some(value) = cli_args.get("min_speed") {
        if let Ok(min_speed) = value.parse::<f64>() {
            config.selection.min_speed = min_speed;
        }
    }
    if let Some(value) = cli_args.get("min_occupancy_s") {
        if let Ok(occupancy) = value.parse::<f64>() {
            config.rate_map.min_occupancy_s = occupancy;
        }
    }
    if let Some(value) = cli_args.get("log_level") {
        config.logging.level = value.clone();
    }
}
