// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurodecode engine
//!
//! Bayesian maximum-a-posteriori decoding of a behavioural variable from
//! binned spike counts:
//! - Discretised state space with periodic dimensions (`grid`)
//! - Rate-map estimation behind a provider trait (`rate_map`)
//! - Deterministic k-fold partitioning (`partition`)
//! - Poisson posterior with log-domain accumulation (`bayes`)
//! - Cross-validated session decoding (`orchestrator`)
//! - Phase- and event-conditioned averages (`conditioning`)
//!
//! ## Architecture
//! - ndarray storage, rows are samples
//! - Folds and posterior rows run on the rayon pool
//! - Undefined values are carried as masks and `Option`, never as errors

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod bayes;
pub mod conditioning;
pub mod confusion;
pub mod error;
pub mod grid;
pub mod orchestrator;
pub mod partition;
pub mod rate_map;
pub mod selection;

// Re-export key types
pub use bayes::{BayesianDecoder, DecoderSettings, Posterior, SampleEstimate, DEFAULT_RATE_FLOOR};
pub use conditioning::{
    decode_event_windows, event_triggered_average, phase_binned_average, EventAverage,
    EventWindows, PhaseProfile,
};
pub use confusion::ConfusionMatrix;
pub use error::{DecodeError, Result};
pub use grid::BinGrid;
pub use orchestrator::{
    run_decoding, DecodeSource, DecodingOrchestrator, DecodingResult, DecodingSession,
};
pub use partition::{partition, partition_indices, Fold};
pub use rate_map::{estimate_rate_maps, RateMapInputs, RateMapProvider, RateMaps, SmoothedHistogram};
pub use selection::{select_cells, select_samples, BehaviorSeries, SampleSelection};
