// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # neurodecode
//!
//! Bayesian decoding of a behavioural variable (position, head direction,
//! oscillatory phase) from simultaneously recorded spike trains, with rate
//! maps trained on cross-validation folds.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! neurodecode = "0.1"  # Default: full
//! ```
//!
//! ## Feature Flags
//!
//! - **`full`** (default): All components
//! - **`config`**: TOML configuration with environment and CLI overrides
//! - **`observability`**: Logging initialisation and debug flags
//! - **`engine`**: Rate maps, partitioning, decoder, orchestrator
//! - **`file-logging`**: Per-run JSON log files for the command-line tool
//!
//! ## Usage
//!
//! ```rust,no_run
//! use neurodecode::prelude::*;
//! use ndarray::Array2;
//!
//! let config = load_config(None, None)?;
//! let behavior = BehaviorSeries::from_variables(Array2::zeros((1_000, 1)));
//! let counts = Array2::<f64>::zeros((1_000, 40));
//!
//! let result = run_decoding(
//!     &config,
//!     &DecodingSession {
//!         behavior: &behavior,
//!         spike_counts: counts.view(),
//!         training_range: 0..800,
//!     },
//! )?;
//! println!("median error: {:?}", result.median_error());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: neurodecode-config                         │
//! │  (Decoding, selection, rate-map and logging sections)   │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Algorithms: neurodecode-engine                         │
//! │  (Rate maps, k-fold partition, Bayesian decoder)        │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Tools: run_decoding + neurodecode-observability        │
//! │  (JSON sessions, logging)                               │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

// Re-export foundation
#[cfg(feature = "config")]
pub use neurodecode_config as config;

// Re-export infrastructure
#[cfg(feature = "observability")]
pub use neurodecode_observability as observability;

// Re-export algorithms
#[cfg(feature = "engine")]
pub use neurodecode_engine as engine;

#[cfg(feature = "engine")]
pub mod session;

/// Prelude - commonly used types and functions
pub mod prelude {
    #[cfg(feature = "config")]
    pub use crate::config::{load_config, NeurodecodeConfig, SilentPopulation};

    #[cfg(feature = "engine")]
    pub use crate::engine::{
        run_decoding, BayesianDecoder, BehaviorSeries, BinGrid, DecodeSource, DecodingOrchestrator,
        DecodingResult, DecodingSession, RateMaps, SampleEstimate,
    };

    #[cfg(feature = "engine")]
    pub use crate::session::{DecodingReport, SessionFile};

    #[cfg(feature = "observability")]
    pub use crate::observability::{init_logging, parse_debug_flags};
}
