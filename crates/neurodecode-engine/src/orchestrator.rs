// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decoding orchestrator
//!
//! Ties selection, rate-map estimation, cross-validation and the Bayesian
//! decoder together for one recording session:
//!
//! 1. select eligible samples and cells from the training range
//! 2. decode samples outside the training range with maps built from all
//!    eligible training samples
//! 3. decode each training fold's test samples with maps built from the
//!    remaining folds
//! 4. measure per-sample error and a confusion table over the training range
//!
//! Folds are independent and may run on the rayon pool. Every fold's output
//! is written back by fold index, so parallel and sequential runs produce
//! identical results.

use std::ops::Range;

use ndarray::{ArrayView2, Axis};
use neurodecode_config::{validate_config, NeurodecodeConfig};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::bayes::{BayesianDecoder, SampleEstimate};
use crate::confusion::ConfusionMatrix;
use crate::error::{DecodeError, Result};
use crate::grid::BinGrid;
use crate::partition::{partition_indices, Fold};
use crate::rate_map::{estimate_rate_maps, RateMapInputs, RateMapProvider, SmoothedHistogram};
use crate::selection::{select_cells, select_samples, BehaviorSeries};

/// Where a sample's estimate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "fold", rename_all = "snake_case")]
pub enum DecodeSource {
    /// Held out in the given fold
    CrossValidated(usize),
    /// Outside the training range, decoded with all training samples
    FullTraining,
    /// Inside the training range but not selected
    NotDecoded,
}

/// One session's inputs
#[derive(Debug, Clone)]
pub struct DecodingSession<'a> {
    pub behavior: &'a BehaviorSeries,
    /// Spike counts, time × cells
    pub spike_counts: ArrayView2<'a, f64>,
    /// Samples eligible for map training and cross-validation
    pub training_range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodingResult {
    pub estimates: Vec<Option<SampleEstimate>>,
    pub sources: Vec<DecodeSource>,
    /// Discretised true value per sample
    pub true_bins: Vec<Option<usize>>,
    /// Distance from the argmax bin centre to the true value
    pub errors: Vec<Option<f64>>,
    /// Cross-validated decoding over the training range
    pub confusion: ConfusionMatrix,
    /// Recorded cells that passed the spike threshold
    pub cells: Vec<usize>,
    pub folds: Vec<Fold>,
    pub training_range: Range<usize>,
}

impl DecodingResult {
    fn undecoded(bins: usize, true_bins: Vec<Option<usize>>, training_range: Range<usize>) -> Self {
        let samples = true_bins.len();
        Self {
            estimates: vec![None; samples],
            sources: vec![DecodeSource::NotDecoded; samples],
            true_bins,
            errors: vec![None; samples],
            confusion: ConfusionMatrix::from_pairs(bins, std::iter::empty()),
            cells: Vec::new(),
            folds: Vec::new(),
            training_range,
        }
    }

    fn place(
        &mut self,
        samples: &[usize],
        estimates: Vec<Option<SampleEstimate>>,
        source: DecodeSource,
        grid: &BinGrid,
        behavior: &BehaviorSeries,
    ) {
        for (&t, estimate) in samples.iter().zip(estimates) {
            self.errors[t] = estimate
                .as_ref()
                .and_then(|e| grid.distance(e.argmax, &behavior.variables.row(t).to_vec()));
            self.estimates[t] = estimate;
            self.sources[t] = source;
        }
    }

    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }

    /// Samples with a defined estimate
    pub fn decoded_count(&self) -> usize {
        self.estimates.iter().filter(|e| e.is_some()).count()
    }

    /// Argmax centre coordinate along one dimension, per sample
    pub fn argmax_trace(&self, dimension: usize) -> Vec<Option<f64>> {
        self.estimates
            .iter()
            .map(|e| e.as_ref().and_then(|e| e.argmax_center.get(dimension).copied()))
            .collect()
    }

    /// Median of the defined per-sample errors
    pub fn median_error(&self) -> Option<f64> {
        median(self.errors.iter().flatten().copied())
    }

    /// Median error over the cross-validated training samples only
    pub fn cross_validated_median_error(&self) -> Option<f64> {
        median(
            self.errors
                .iter()
                .zip(&self.sources)
                .filter(|(_, source)| matches!(source, DecodeSource::CrossValidated(_)))
                .filter_map(|(error, _)| *error),
        )
    }

    pub fn accuracy(&self) -> Option<f64> {
        self.confusion.accuracy()
    }
}

fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut values: Vec<f64> = values.filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        0.5 * (values[mid - 1] + values[mid])
    } else {
        values[mid]
    })
}

/// Runs cross-validated decoding under one validated configuration
#[derive(Debug, Clone)]
pub struct DecodingOrchestrator<P = SmoothedHistogram> {
    config: NeurodecodeConfig,
    grid: BinGrid,
    provider: P,
}

impl DecodingOrchestrator<SmoothedHistogram> {
    /// Orchestrator using the Gaussian-smoothed histogram rate maps
    pub fn new(config: NeurodecodeConfig) -> Result<Self> {
        let provider = SmoothedHistogram::new(config.rate_map.smoothing_sigma_bins);
        Self::with_provider(config, provider)
    }
}

impl<P: RateMapProvider> DecodingOrchestrator<P> {
    pub fn with_provider(config: NeurodecodeConfig, provider: P) -> Result<Self> {
        validate_config(&config)?;
        let grid = BinGrid::from_config(&config.decoding)?;
        Ok(Self {
            config,
            grid,
            provider,
        })
    }

    pub fn config(&self) -> &NeurodecodeConfig {
        &self.config
    }

    pub fn grid(&self) -> &BinGrid {
        &self.grid
    }

    /// Decode a session
    ///
    /// # Errors
    /// Misaligned inputs, a training range outside the recording, or fewer
    /// eligible training samples than folds. A session where no cell passes
    /// the spike threshold is not an error; every estimate is `None`.
    pub fn run(&self, session: &DecodingSession<'_>) -> Result<DecodingResult> {
        let behavior = session.behavior;
        let counts = session.spike_counts;
        let samples = behavior.len();
        let range = session.training_range.clone();

        if counts.nrows() != samples {
            return Err(DecodeError::SampleCountMismatch {
                what: "spike count rows",
                expected: samples,
                actual: counts.nrows(),
            });
        }
        if range.start > range.end || range.end > samples {
            return Err(DecodeError::InvalidParameter {
                name: "training_range",
                reason: format!("{:?} is not within 0..{}", range, samples),
            });
        }

        let decoding = &self.config.decoding;
        let span = info_span!(
            "decoding_run",
            samples,
            recorded_cells = counts.ncols(),
            folds = decoding.folds
        );
        let _enter = span.enter();

        let selection = select_samples(behavior, &self.grid, &self.config.selection)?;
        let training = selection.eligible_in(range.clone());
        let cells = select_cells(counts, &training, self.config.selection.min_spikes);
        debug!(
            training_samples = training.len(),
            cells = cells.len(),
            "Selected decoding inputs"
        );

        let mut result = DecodingResult::undecoded(self.grid.len(), selection.bins.clone(), range.clone());
        if cells.is_empty() {
            warn!(
                min_spikes = self.config.selection.min_spikes,
                "No cell reaches the spike threshold, nothing decoded"
            );
            return Ok(result);
        }

        let folds = partition_indices(&training, decoding.folds)?;
        let decoder = BayesianDecoder::from_config(decoding);
        let inputs = RateMapInputs {
            grid: &self.grid,
            bins: &selection.bins,
            counts,
            window_duration_s: decoding.window_duration_s,
            sample_period_s: decoding.sample_period_s,
            min_occupancy_s: self.config.rate_map.min_occupancy_s,
        };
        let cell_counts = counts.select(Axis(1), &cells);

        let outside: Vec<usize> = (0..range.start).chain(range.end..samples).collect();
        if !outside.is_empty() {
            let maps = estimate_rate_maps(&self.provider, &inputs, &cells, &training);
            let estimates = decoder.decode(
                &maps,
                cell_counts.select(Axis(0), &outside).view(),
                &self.grid,
            )?;
            result.place(&outside, estimates, DecodeSource::FullTraining, &self.grid, behavior);
        }

        let run_fold = |(index, fold): (usize, &Fold)| -> Result<(usize, Vec<Option<SampleEstimate>>)> {
            let maps = estimate_rate_maps(&self.provider, &inputs, &cells, &fold.train);
            let estimates = decoder.decode(
                &maps,
                cell_counts.select(Axis(0), &fold.test).view(),
                &self.grid,
            )?;
            debug!(fold = index, test_samples = fold.test.len(), "Decoded fold");
            Ok((index, estimates))
        };
        let fold_outputs = if decoding.parallel_folds {
            folds
                .par_iter()
                .enumerate()
                .map(&run_fold)
                .collect::<Result<Vec<_>>>()?
        } else {
            folds
                .iter()
                .enumerate()
                .map(&run_fold)
                .collect::<Result<Vec<_>>>()?
        };
        for (index, estimates) in fold_outputs {
            result.place(
                &folds[index].test,
                estimates,
                DecodeSource::CrossValidated(index),
                &self.grid,
                behavior,
            );
        }

        let pairs = range.clone().filter_map(|t| {
            match (&result.sources[t], result.true_bins[t], &result.estimates[t]) {
                (DecodeSource::CrossValidated(_), Some(true_bin), Some(estimate)) => {
                    Some((true_bin, estimate.argmax))
                }
                _ => None,
            }
        });
        result.confusion = ConfusionMatrix::from_pairs(self.grid.len(), pairs.collect::<Vec<_>>());
        result.cells = cells;
        result.folds = folds;

        info!(
            decoded = result.decoded_count(),
            median_error = ?result.median_error(),
            accuracy = ?result.accuracy(),
            "Decoding finished"
        );
        Ok(result)
    }
}

/// Validate `config` and decode `session` with smoothed-histogram maps
pub fn run_decoding(config: &NeurodecodeConfig, session: &DecodingSession<'_>) -> Result<DecodingResult> {
    DecodingOrchestrator::new(config.clone())?.run(session)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, array};

    fn config(edges: Vec<f64>, folds: usize) -> NeurodecodeConfig {
        let mut config = NeurodecodeConfig::default();
        config.decoding.bin_edges = vec![edges];
        config.decoding.folds = folds;
        config.decoding.window_duration_s = 1.0;
        config.decoding.sample_period_s = 1.0;
        config.selection.min_spikes = 1.0;
        config.rate_map.smoothing_sigma_bins = 0.0;
        config
    }

    #[test]
    fn test_median() {
        assert_eq!(median([3.0, 1.0, 2.0].into_iter()), Some(2.0));
        assert_eq!(median([4.0, 1.0, 2.0, 3.0].into_iter()), Some(2.5));
        assert_eq!(median(std::iter::empty()), None);
    }

    #[test]
    fn test_rejects_misaligned_inputs() {
        let behavior = BehaviorSeries::from_variables(array![[0.5], [1.5]]);
        let counts = Array2::<f64>::ones((3, 1));
        let orchestrator = DecodingOrchestrator::new(config(vec![0.0, 1.0, 2.0], 2)).unwrap();
        let session = DecodingSession {
            behavior: &behavior,
            spike_counts: counts.view(),
            training_range: 0..2,
        };
        assert!(matches!(
            orchestrator.run(&session),
            Err(DecodeError::SampleCountMismatch { .. })
        ));

        let counts = Array2::<f64>::ones((2, 1));
        let session = DecodingSession {
            behavior: &behavior,
            spike_counts: counts.view(),
            training_range: 0..5,
        };
        assert!(matches!(
            orchestrator.run(&session),
            Err(DecodeError::InvalidParameter { name: "training_range", .. })
        ));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let mut bad = config(vec![0.0, 1.0], 2);
        bad.decoding.folds = 1;
        assert!(matches!(
            DecodingOrchestrator::new(bad),
            Err(DecodeError::Config(_))
        ));
    }

    #[test]
    fn test_no_eligible_cells_decodes_nothing() {
        let behavior = BehaviorSeries::from_variables(array![[0.5], [1.5], [0.5], [1.5]]);
        let counts = Array2::<f64>::zeros((4, 2));
        let result = run_decoding(
            &config(vec![0.0, 1.0, 2.0], 2),
            &DecodingSession {
                behavior: &behavior,
                spike_counts: counts.view(),
                training_range: 0..4,
            },
        )
        .unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result.decoded_count(), 0);
        assert!(result.sources.iter().all(|s| *s == DecodeSource::NotDecoded));
        assert_eq!(result.accuracy(), None);
        assert!(result.cells.is_empty());
    }

    #[test]
    fn test_too_few_training_samples_for_folds() {
        let behavior = BehaviorSeries::from_variables(array![[0.5], [1.5], [0.5]]);
        let counts = Array2::<f64>::ones((3, 1));
        let result = run_decoding(
            &config(vec![0.0, 1.0, 2.0], 5),
            &DecodingSession {
                behavior: &behavior,
                spike_counts: counts.view(),
                training_range: 0..3,
            },
        );
        assert!(matches!(
            result,
            Err(DecodeError::InvalidFoldCount { folds: 5, samples: 3 })
        ));
    }

    #[test]
    fn test_sources_and_errors_cover_every_sample() {
        // Two place cells on a two-bin track, training on the first 8 samples
        let positions: Vec<f64> = (0..12).map(|t| if t % 2 == 0 { 0.5 } else { 1.5 }).collect();
        let variables = Array2::from_shape_vec((12, 1), positions).unwrap();
        let counts = Array2::from_shape_fn((12, 2), |(t, cell)| {
            if (t % 2 == 0) == (cell == 0) { 4.0 } else { 0.0 }
        });
        let behavior = BehaviorSeries::from_variables(variables);
        let result = run_decoding(
            &config(vec![0.0, 1.0, 2.0], 4),
            &DecodingSession {
                behavior: &behavior,
                spike_counts: counts.view(),
                training_range: 0..8,
            },
        )
        .unwrap();

        for t in 0..8 {
            assert_eq!(result.sources[t], DecodeSource::CrossValidated(t / 2));
        }
        for t in 8..12 {
            assert_eq!(result.sources[t], DecodeSource::FullTraining);
        }
        assert_eq!(result.decoded_count(), 12);
        assert!(result.errors.iter().all(|e| *e == Some(0.0)));
        assert_eq!(result.median_error(), Some(0.0));
        assert_eq!(result.cross_validated_median_error(), Some(0.0));
        assert_eq!(result.accuracy(), Some(1.0));
        assert_eq!(result.cells, vec![0, 1]);
        assert_eq!(result.argmax_trace(0)[1], Some(1.5));
    }

    #[test]
    fn test_extreme_smoothing_width_still_decodes() {
        let behavior = BehaviorSeries::from_variables(array![[0.5], [1.5], [0.5], [1.5]]);
        let counts = array![[3.0, 0.0], [0.0, 3.0], [3.0, 0.0], [0.0, 3.0]];
        let mut wide = config(vec![0.0, 1.0, 2.0], 2);
        wide.rate_map.smoothing_sigma_bins = 1e17;
        let result = run_decoding(
            &wide,
            &DecodingSession {
                behavior: &behavior,
                spike_counts: counts.view(),
                training_range: 0..4,
            },
        )
        .unwrap();
        // Fully smeared maps are flat, so every sample ties onto bin 0
        assert_eq!(result.decoded_count(), 4);
        assert!(result.estimates.iter().flatten().all(|e| e.argmax == 0));
    }

    #[test]
    fn test_held_out_fold_never_sees_its_own_samples() {
        // Bin 2 is visited only by fold 0's test block and by one later sample
        let positions: Vec<f64> = (0..13)
            .map(|t| match t {
                0..=3 | 12 => 2.5,
                t if t % 2 == 0 => 0.5,
                _ => 1.5,
            })
            .collect();
        let variables = Array2::from_shape_vec((13, 1), positions.clone()).unwrap();
        let counts = Array2::from_shape_fn((13, 3), |(t, cell)| {
            if positions[t] as usize == cell { 4.0 } else { 0.0 }
        });
        let behavior = BehaviorSeries::from_variables(variables);
        let result = run_decoding(
            &config(vec![0.0, 1.0, 2.0, 3.0], 3),
            &DecodingSession {
                behavior: &behavior,
                spike_counts: counts.view(),
                training_range: 0..12,
            },
        )
        .unwrap();

        assert_eq!(result.folds[0].test, vec![0, 1, 2, 3]);
        assert_eq!(result.cells, vec![0, 1, 2]);
        for t in 0..4 {
            assert_eq!(result.sources[t], DecodeSource::CrossValidated(0));
            let estimate = result.estimates[t].as_ref().unwrap();
            assert_ne!(estimate.argmax, 2, "sample {} decoded from its own fold", t);
            assert!(result.errors[t].unwrap() >= 1.0);
        }
        // Later folds train on fold 0 and decode their own samples exactly
        for t in 4..12 {
            assert_eq!(result.errors[t], Some(0.0));
        }
        assert_eq!(result.sources[12], DecodeSource::FullTraining);
        assert_eq!(result.estimates[12].as_ref().unwrap().argmax, 2);
        assert_eq!(result.errors[12], Some(0.0));
    }
}
