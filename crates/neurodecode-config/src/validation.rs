// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! This module provides validation logic to ensure configuration values are
//! consistent and within valid ranges before any decoding run starts.

use crate::{ConfigError, ConfigResult, NeurodecodeConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    InvalidFoldCount { folds: usize },
    NonPositive { field: String, value: f64 },
    InvalidBinEdges { dimension: usize, reason: String },
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFoldCount { folds } => {
                write!(f, "decoding.folds = {} must be at least 2", folds)
            }
            Self::NonPositive { field, value } => {
                write!(f, "{} = {} must be strictly positive", field, value)
            }
            Self::InvalidBinEdges { dimension, reason } => {
                write!(f, "decoding.bin_edges[{}]: {}", dimension, reason)
            }
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Fold count (k >= 2)
/// - Strictly positive window, sample period and rate floor
/// - Bin-edge sequences (>= 2 finite, strictly increasing edges)
/// - Periodic flags and prior length consistent with the bin grid
/// - Non-negative thresholds and smoothing width
/// - A finite speed threshold
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation found
pub fn validate_config(config: &NeurodecodeConfig) -> ConfigResult<()> {
    let errors = collect_validation_errors(config);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

/// Run every check and return the violations without failing fast
pub fn collect_validation_errors(config: &NeurodecodeConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    validate_decoding_scalars(config, &mut errors);
    validate_bin_edges(config, &mut errors);
    validate_grid_consistency(config, &mut errors);
    validate_thresholds(config, &mut errors);

    errors
}

fn validate_decoding_scalars(config: &NeurodecodeConfig, errors: &mut Vec<ConfigValidationError>) {
    let decoding = &config.decoding;

    if decoding.folds < 2 {
        errors.push(ConfigValidationError::InvalidFoldCount {
            folds: decoding.folds,
        });
    }

    let positives = [
        ("decoding.window_duration_s", decoding.window_duration_s),
        ("decoding.sample_period_s", decoding.sample_period_s),
        ("decoding.rate_floor", decoding.rate_floor),
    ];
    for (field, value) in positives {
        // NaN fails this comparison too
        if !(value > 0.0 && value.is_finite()) {
            errors.push(ConfigValidationError::NonPositive {
                field: field.to_string(),
                value,
            });
        }
    }
}

fn validate_bin_edges(config: &NeurodecodeConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.decoding.bin_edges.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "decoding.bin_edges".to_string(),
        });
        return;
    }

    for (dimension, edges) in config.decoding.bin_edges.iter().enumerate() {
        if edges.len() < 2 {
            errors.push(ConfigValidationError::InvalidBinEdges {
                dimension,
                reason: format!("needs at least 2 edges, got {}", edges.len()),
            });
            continue;
        }
        if edges.iter().any(|e| !e.is_finite()) {
            errors.push(ConfigValidationError::InvalidBinEdges {
                dimension,
                reason: "edges must be finite".to_string(),
            });
            continue;
        }
        if edges.windows(2).any(|pair| pair[1] <= pair[0]) {
            errors.push(ConfigValidationError::InvalidBinEdges {
                dimension,
                reason: "edges must be strictly increasing".to_string(),
            });
        }
    }
}

fn validate_grid_consistency(config: &NeurodecodeConfig, errors: &mut Vec<ConfigValidationError>) {
    let decoding = &config.decoding;

    if !decoding.periodic.is_empty() && decoding.periodic.len() != decoding.dimensions() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "decoding.periodic".to_string(),
            reason: format!(
                "has {} entries for {} decoded dimensions",
                decoding.periodic.len(),
                decoding.dimensions()
            ),
        });
    }

    if let Some(prior) = &decoding.prior {
        let bins = decoding.bin_count();
        if prior.len() != bins {
            errors.push(ConfigValidationError::InvalidValue {
                field: "decoding.prior".to_string(),
                reason: format!("has {} weights for {} bins", prior.len(), bins),
            });
        }
        if prior.iter().any(|w| *w < 0.0 || w.is_infinite()) {
            errors.push(ConfigValidationError::InvalidValue {
                field: "decoding.prior".to_string(),
                reason: "weights must be finite and non-negative".to_string(),
            });
        }
    }
}

fn validate_thresholds(config: &NeurodecodeConfig, errors: &mut Vec<ConfigValidationError>) {
    let checks = [
        ("selection.min_spikes", config.selection.min_spikes),
        ("rate_map.min_occupancy_s", config.rate_map.min_occupancy_s),
        (
            "rate_map.smoothing_sigma_bins",
            config.rate_map.smoothing_sigma_bins,
        ),
    ];
    for (field, value) in checks {
        if !(value >= 0.0 && value.is_finite()) {
            errors.push(ConfigValidationError::InvalidValue {
                field: field.to_string(),
                reason: format!("{} must be finite and non-negative", value),
            });
        }
    }

    // Any finite speed threshold is usable; negative ones accept every sample
    let min_speed = config.selection.min_speed;
    if !min_speed.is_finite() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "selection.min_speed".to_string(),
            reason: format!("{} must be finite", min_speed),
        });
    }
}
