// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bayesian population decoder
//!
//! For a sample `t` with spike counts `n_c` over a window `tau`, the
//! posterior over bin `b` under independent Poisson firing is
//!
//! ```text
//! P(b | n) ∝ prior(b) · exp(-tau · Σ_c r_c(b)) · Π_c r_c(b)^n_c
//! ```
//!
//! It is accumulated in the log domain as a fold over cells into one
//! (time × bins) array, so peak memory never holds a (time × bins × cells)
//! tensor and the per-cell terms can be summed in any grouping. Each row is
//! then shifted by its maximum, exponentiated and normalised over the
//! defined bins.
//!
//! Undefined values are carried by masks:
//! - a bin is undefined if any cell's rate there is undefined or the prior
//!   weight is NaN; it never receives posterior mass
//! - a row is undefined if it has no defined bin with non-zero mass

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis, Zip};
use neurodecode_config::{DecodingConfig, SilentPopulation};
use serde::Serialize;

use crate::error::{DecodeError, Result};
use crate::grid::BinGrid;
use crate::rate_map::RateMaps;

/// Floor added to every rate before taking its logarithm
pub const DEFAULT_RATE_FLOOR: f64 = 1e-10;

/// Immutable decoder parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecoderSettings {
    /// Window the spike counts were accumulated over (seconds)
    pub window_duration_s: f64,
    pub rate_floor: f64,
    pub silent_population: SilentPopulation,
}

impl DecoderSettings {
    pub fn new(window_duration_s: f64) -> Self {
        Self {
            window_duration_s,
            rate_floor: DEFAULT_RATE_FLOOR,
            silent_population: SilentPopulation::Undefined,
        }
    }

    pub fn from_config(config: &DecodingConfig) -> Self {
        Self {
            window_duration_s: config.window_duration_s,
            rate_floor: config.rate_floor,
            silent_population: config.silent_population,
        }
    }

    fn validate(&self) -> Result<()> {
        if !(self.window_duration_s > 0.0 && self.window_duration_s.is_finite()) {
            return Err(DecodeError::InvalidParameter {
                name: "window_duration_s",
                reason: format!("{} is not a positive duration", self.window_duration_s),
            });
        }
        if !(self.rate_floor > 0.0 && self.rate_floor.is_finite()) {
            return Err(DecodeError::InvalidParameter {
                name: "rate_floor",
                reason: format!("{} is not a positive floor", self.rate_floor),
            });
        }
        Ok(())
    }
}

/// Normalised posterior, time × flattened bins
#[derive(Debug, Clone, PartialEq)]
pub struct Posterior {
    /// Undefined entries hold 0.0
    probabilities: Array2<f64>,
    bin_defined: Array1<bool>,
    row_defined: Array1<bool>,
    total_spikes: Array1<f64>,
}

impl Posterior {
    pub fn sample_count(&self) -> usize {
        self.probabilities.nrows()
    }

    pub fn bin_count(&self) -> usize {
        self.probabilities.ncols()
    }

    pub fn probability(&self, sample: usize, bin: usize) -> Option<f64> {
        if self.row_defined[sample] && self.bin_defined[bin] {
            Some(self.probabilities[[sample, bin]])
        } else {
            None
        }
    }

    /// Posterior row, or `None` if the whole row is undefined
    pub fn row(&self, sample: usize) -> Option<ArrayView1<'_, f64>> {
        if self.row_defined[sample] {
            Some(self.probabilities.row(sample))
        } else {
            None
        }
    }

    pub fn probabilities(&self) -> ArrayView2<'_, f64> {
        self.probabilities.view()
    }

    pub fn bin_defined(&self) -> ArrayView1<'_, bool> {
        self.bin_defined.view()
    }

    pub fn row_defined(&self) -> ArrayView1<'_, bool> {
        self.row_defined.view()
    }

    /// Spikes summed over all cells for a sample
    pub fn total_spikes(&self, sample: usize) -> f64 {
        self.total_spikes[sample]
    }

    /// Most probable defined bin; ties go to the lowest flat index
    pub fn argmax(&self, sample: usize) -> Option<usize> {
        let row = self.row(sample)?;
        let mut best: Option<(usize, f64)> = None;
        for (bin, &p) in row.iter().enumerate() {
            if !self.bin_defined[bin] {
                continue;
            }
            match best {
                Some((_, best_p)) if p <= best_p => {}
                _ => best = Some((bin, p)),
            }
        }
        best.map(|(bin, _)| bin)
    }

    /// Probability-weighted mean of bin-centre coordinates
    pub fn expectation(&self, sample: usize, grid: &BinGrid) -> Option<Vec<f64>> {
        let row = self.row(sample)?;
        let mut mean = vec![0.0; grid.dimensions()];
        for (bin, &p) in row.iter().enumerate() {
            if !self.bin_defined[bin] || p == 0.0 {
                continue;
            }
            for (acc, c) in mean.iter_mut().zip(grid.center_of(bin)) {
                *acc += p * c;
            }
        }
        Some(mean)
    }

    /// Point estimates for every sample under a silent-population policy
    pub fn estimates(&self, grid: &BinGrid, policy: SilentPopulation) -> Vec<Option<SampleEstimate>> {
        (0..self.sample_count())
            .map(|sample| {
                if policy == SilentPopulation::Undefined && self.total_spikes[sample] <= 0.0 {
                    return None;
                }
                let argmax = self.argmax(sample)?;
                let expectation = self.expectation(sample, grid)?;
                Some(SampleEstimate {
                    argmax,
                    argmax_index: grid.unravel(argmax),
                    argmax_center: grid.center_of(argmax),
                    expectation,
                })
            })
            .collect()
    }
}

/// Point estimates for one decoded sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleEstimate {
    /// Flat bin of the posterior maximum
    pub argmax: usize,
    /// Per-dimension bin index of the maximum
    pub argmax_index: Vec<usize>,
    /// Centre coordinates of the maximum's bin
    pub argmax_center: Vec<f64>,
    /// Posterior mean of the bin-centre coordinates
    pub expectation: Vec<f64>,
}

/// Bayesian decoder with fixed settings and an optional prior
#[derive(Debug, Clone, PartialEq)]
pub struct BayesianDecoder {
    settings: DecoderSettings,
    prior: Option<Array1<f64>>,
}

impl BayesianDecoder {
    pub fn new(settings: DecoderSettings) -> Self {
        Self {
            settings,
            prior: None,
        }
    }

    /// Prior weight per flattened bin; NaN marks a bin as undefined
    pub fn with_prior(mut self, prior: Array1<f64>) -> Self {
        self.prior = Some(prior);
        self
    }

    pub fn from_config(config: &DecodingConfig) -> Self {
        let decoder = Self::new(DecoderSettings::from_config(config));
        match &config.prior {
            Some(prior) => decoder.with_prior(Array1::from_vec(prior.clone())),
            None => decoder,
        }
    }

    pub fn settings(&self) -> &DecoderSettings {
        &self.settings
    }

    fn validate_inputs(&self, rate_maps: &RateMaps, counts: &ArrayView2<f64>) -> Result<()> {
        self.settings.validate()?;

        if counts.ncols() != rate_maps.cell_count() {
            return Err(DecodeError::CellCountMismatch {
                rate_map_cells: rate_maps.cell_count(),
                spike_count_cells: counts.ncols(),
            });
        }
        if let Some(bad) = counts.iter().find(|n| !(n.is_finite() && **n >= 0.0)) {
            return Err(DecodeError::InvalidParameter {
                name: "spike_counts",
                reason: format!("counts must be finite and non-negative, found {}", bad),
            });
        }
        if let Some(prior) = &self.prior {
            if prior.len() != rate_maps.bin_count() {
                return Err(DecodeError::InvalidPrior(format!(
                    "{} weights for {} bins",
                    prior.len(),
                    rate_maps.bin_count()
                )));
            }
            if prior.iter().any(|w| *w < 0.0 || w.is_infinite()) {
                return Err(DecodeError::InvalidPrior(
                    "weights must be finite and non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Compute the normalised posterior for every sample of `counts`
    ///
    /// `counts` is time × cells, in the same cell order as `rate_maps`.
    pub fn posterior(&self, rate_maps: &RateMaps, counts: ArrayView2<f64>) -> Result<Posterior> {
        self.validate_inputs(rate_maps, &counts)?;

        let samples = counts.nrows();
        let bins = rate_maps.bin_count();
        let floor = self.settings.rate_floor;
        let tau = self.settings.window_duration_s;

        let mut bin_defined = rate_maps.bin_defined();
        let log_prior = match &self.prior {
            Some(prior) => {
                Zip::from(&mut bin_defined)
                    .and(prior)
                    .for_each(|ok, w| *ok = *ok && !w.is_nan());
                prior.mapv(f64::ln)
            }
            None => Array1::zeros(bins),
        };

        // exp(-tau Σ_c r_c(b)) enters every row identically
        let floored = rate_maps.rates().mapv(|r| r + floor);
        let expected = floored.sum_axis(Axis(0)) * tau;
        let row_offset = &log_prior - &expected;

        let initial = Array2::from_shape_fn((samples, bins), |(_, bin)| row_offset[bin]);

        let mut log_posterior = floored.rows().into_iter().zip(counts.columns()).fold(
            initial,
            |mut acc, (cell_rates, cell_counts)| {
                let log_rate = cell_rates.mapv(f64::ln);
                Zip::from(&mut acc)
                    .and_broadcast(&cell_counts.insert_axis(Axis(1)))
                    .and_broadcast(&log_rate.insert_axis(Axis(0)))
                    .for_each(|a, &n, &lr| {
                        if n > 0.0 {
                            *a += n * lr;
                        }
                    });
                acc
            },
        );

        let mut row_defined = Array1::from_elem(samples, false);
        Zip::from(log_posterior.rows_mut())
            .and(&mut row_defined)
            .par_for_each(|row, defined| {
                *defined = normalize_row(row, &bin_defined);
            });

        Ok(Posterior {
            probabilities: log_posterior,
            bin_defined,
            row_defined,
            total_spikes: counts.sum_axis(Axis(1)),
        })
    }

    /// Decode every sample of `counts` into point estimates
    ///
    /// Entries are `None` for silent samples (unless the policy keeps them)
    /// and for samples whose posterior is undefined.
    pub fn decode(
        &self,
        rate_maps: &RateMaps,
        counts: ArrayView2<f64>,
        grid: &BinGrid,
    ) -> Result<Vec<Option<SampleEstimate>>> {
        if grid.len() != rate_maps.bin_count() {
            return Err(DecodeError::BinCountMismatch {
                rate_map_bins: rate_maps.bin_count(),
                grid_bins: grid.len(),
            });
        }
        let posterior = self.posterior(rate_maps, counts)?;
        Ok(posterior.estimates(grid, self.settings.silent_population))
    }
}

/// Turn one row of log-posterior values into probabilities in place
///
/// Returns false (and zeroes the row) when no defined bin carries mass.
fn normalize_row(mut row: ArrayViewMut1<f64>, bin_defined: &Array1<bool>) -> bool {
    let max = row
        .iter()
        .zip(bin_defined.iter())
        .filter_map(|(&v, &ok)| if ok { Some(v) } else { None })
        .fold(f64::NEG_INFINITY, f64::max);

    if !max.is_finite() {
        row.fill(0.0);
        return false;
    }

    let mut total = 0.0;
    for (value, &ok) in row.iter_mut().zip(bin_defined.iter()) {
        *value = if ok { (*value - max).exp() } else { 0.0 };
        total += *value;
    }
    row.mapv_inplace(|p| p / total);
    true
}
