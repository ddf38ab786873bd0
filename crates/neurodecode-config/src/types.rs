// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `neurodecode.toml`.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NeurodecodeConfig {
    pub decoding: DecodingConfig,
    pub selection: SelectionConfig,
    pub rate_map: RateMapConfig,
    pub logging: LoggingConfig,
}

/// What to report for a sample in which no cell fired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SilentPopulation {
    /// Force both point estimates to undefined
    #[default]
    Undefined,
    /// Report the (flat) posterior's estimates as computed
    KeepPosterior,
}

/// Bayesian decoder and cross-validation parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DecodingConfig {
    /// Window over which spike counts were accumulated (seconds)
    pub window_duration_s: f64,
    /// Spacing between consecutive samples (seconds)
    pub sample_period_s: f64,
    /// Number of cross-validation folds over the training range
    pub folds: usize,
    /// Additive floor applied to every rate before the likelihood
    pub rate_floor: f64,
    pub silent_population: SilentPopulation,
    /// Run cross-validation folds on the rayon pool
    pub parallel_folds: bool,
    /// Optional prior weight per flattened bin (uniform when absent)
    pub prior: Option<Vec<f64>>,
    /// Bin-edge sequence per decoded dimension
    pub bin_edges: Vec<Vec<f64>>,
    /// Per-dimension periodic flag (e.g. oscillatory phase). Empty = none.
    pub periodic: Vec<bool>,
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            window_duration_s: 0.25,
            sample_period_s: 0.02,
            folds: 5,
            rate_floor: 1e-10,
            silent_population: SilentPopulation::Undefined,
            parallel_folds: true,
            prior: None,
            bin_edges: vec![vec![0.0, 25.0, 50.0, 75.0, 100.0]],
            periodic: Vec::new(),
        }
    }
}

impl DecodingConfig {
    /// Number of decoded dimensions
    pub fn dimensions(&self) -> usize {
        self.bin_edges.len()
    }

    /// Number of flattened bins implied by the edge sequences
    pub fn bin_count(&self) -> usize {
        self.bin_edges
            .iter()
            .map(|edges| edges.len().saturating_sub(1))
            .product()
    }
}

/// Behavioural sample and cell eligibility filters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Minimum total spike count a cell needs in the training selection
    pub min_spikes: f64,
    /// Accepted condition labels (empty accepts every label)
    pub conditions: Vec<i32>,
    /// Accepted direction labels (empty accepts every label)
    pub directions: Vec<i32>,
    /// Minimum running speed (inclusive)
    pub min_speed: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_spikes: 10.0,
            conditions: Vec::new(),
            directions: Vec::new(),
            min_speed: 0.0,
        }
    }
}

impl SelectionConfig {
    pub fn accepts_condition(&self, label: i32) -> bool {
        self.conditions.is_empty() || self.conditions.contains(&label)
    }

    pub fn accepts_direction(&self, label: i32) -> bool {
        self.directions.is_empty() || self.directions.contains(&label)
    }
}

/// Rate-map estimation parameters
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateMapConfig {
    /// Occupancy (seconds) below which a bin is treated as undefined
    pub min_occupancy_s: f64,
    /// Gaussian smoothing width in bins (0 disables smoothing)
    pub smoothing_sigma_bins: f64,
}

impl Default for RateMapConfig {
    fn default() -> Self {
        Self {
            min_occupancy_s: 0.0,
            smoothing_sigma_bins: 1.0,
        }
    }
}

/// Console log format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bin_count() {
        let config = DecodingConfig::default();
        assert_eq!(config.dimensions(), 1);
        assert_eq!(config.bin_count(), 4);
    }

    #[test]
    fn test_two_dimensional_bin_count() {
        let config = DecodingConfig {
            bin_edges: vec![vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 10.0, 20.0]],
            ..Default::default()
        };
        assert_eq!(config.bin_count(), 6);
    }

    #[test]
    fn test_empty_label_sets_accept_everything() {
        let selection = SelectionConfig::default();
        assert!(selection.accepts_condition(7));
        assert!(selection.accepts_direction(-1));

        let selection = SelectionConfig {
            directions: vec![1],
            ..Default::default()
        };
        assert!(selection.accepts_direction(1));
        assert!(!selection.accepts_direction(-1));
    }

    #[test]
    fn test_silent_population_serde_names() {
        let json = serde_json::to_string(&SilentPopulation::KeepPosterior).unwrap();
        assert_eq!(json, "\"keep_posterior\"");
    }
}
