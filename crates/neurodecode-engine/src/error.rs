// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for decoding operations
//!
//! Only precondition violations are errors. Degenerate data (silent
//! windows, unvisited bins, inactive populations) is reported through
//! `None` entries in the results instead.

use neurodecode_config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Cell count mismatch: rate maps have {rate_map_cells} cells, spike counts have {spike_count_cells}")]
    CellCountMismatch {
        rate_map_cells: usize,
        spike_count_cells: usize,
    },

    #[error("Sample count mismatch for {what}: expected {expected}, got {actual}")]
    SampleCountMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Bin count mismatch: rate maps have {rate_map_bins} bins, grid has {grid_bins}")]
    BinCountMismatch { rate_map_bins: usize, grid_bins: usize },

    #[error("Invalid fold count: k = {folds} for {samples} samples (need 2 <= k <= n)")]
    InvalidFoldCount { folds: usize, samples: usize },

    #[error("Invalid bin edges for dimension {dimension}: {reason}")]
    InvalidBinEdges { dimension: usize, reason: String },

    #[error("Invalid prior: {0}")]
    InvalidPrior(String),

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Configuration rejected: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
