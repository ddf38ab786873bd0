// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Decoding accuracy table
//!
//! Rows are decoded bins, columns true bins. Each column with at least one
//! sample is normalised to sum to 1, giving the distribution of decoded
//! bins conditional on the true bin. Columns without samples are undefined.

use ndarray::{Array1, Array2, ArrayView1, Axis};

#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    counts: Array2<f64>,
    probabilities: Array2<f64>,
    column_defined: Array1<bool>,
}

impl ConfusionMatrix {
    /// Build from `(true_bin, decoded_bin)` pairs over `bins` flat bins
    ///
    /// Pairs referring to bins outside the grid are ignored.
    pub fn from_pairs<I>(bins: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (usize, usize)>,
    {
        let mut counts = Array2::<f64>::zeros((bins, bins));
        for (true_bin, decoded_bin) in pairs {
            if true_bin < bins && decoded_bin < bins {
                counts[[decoded_bin, true_bin]] += 1.0;
            }
        }

        let totals = counts.sum_axis(Axis(0));
        let column_defined = totals.mapv(|total| total > 0.0);
        let mut probabilities = counts.clone();
        for (mut column, &total) in probabilities.columns_mut().into_iter().zip(totals.iter()) {
            if total > 0.0 {
                column /= total;
            }
        }

        Self {
            counts,
            probabilities,
            column_defined,
        }
    }

    pub fn bin_count(&self) -> usize {
        self.counts.nrows()
    }

    /// Raw pair counts, decoded × true
    pub fn counts(&self) -> &Array2<f64> {
        &self.counts
    }

    /// Column-normalised table; undefined columns hold zeros
    pub fn probabilities(&self) -> &Array2<f64> {
        &self.probabilities
    }

    pub fn column_defined(&self, true_bin: usize) -> bool {
        self.column_defined[true_bin]
    }

    /// Distribution of decoded bins given a true bin
    pub fn conditional(&self, true_bin: usize) -> Option<ArrayView1<'_, f64>> {
        if self.column_defined[true_bin] {
            Some(self.probabilities.column(true_bin))
        } else {
            None
        }
    }

    pub fn probability(&self, decoded_bin: usize, true_bin: usize) -> Option<f64> {
        self.conditional(true_bin).map(|column| column[decoded_bin])
    }

    /// Mean diagonal over defined columns
    pub fn accuracy(&self) -> Option<f64> {
        let (sum, n) = (0..self.bin_count())
            .filter(|&bin| self.column_defined[bin])
            .fold((0.0, 0usize), |(sum, n), bin| {
                (sum + self.probabilities[[bin, bin]], n + 1)
            });
        if n == 0 {
            None
        } else {
            Some(sum / n as f64)
        }
    }
}
