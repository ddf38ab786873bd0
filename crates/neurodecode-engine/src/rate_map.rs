// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Rate maps (tuning curves)
//!
//! `RateMaps` stores one mean firing rate per cell and bin together with a
//! validity mask, so an unvisited bin is never mistaken for a silent one.
//! Maps are estimated through the `RateMapProvider` seam: the provider turns
//! (bin, weight) samples into a smoothed map, and `estimate_rate_maps`
//! divides smoothed spike sums by smoothed occupancy.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rayon::prelude::*;

use crate::error::{DecodeError, Result};
use crate::grid::BinGrid;

/// Firing-rate maps, cells × flattened bins, in events per second
#[derive(Debug, Clone, PartialEq)]
pub struct RateMaps {
    rates: Array2<f64>,
    defined: Array2<bool>,
}

impl RateMaps {
    /// Build from explicit rates and validity mask
    ///
    /// Entries outside the mask are stored as 0.0. Defined rates must be
    /// finite and non-negative.
    pub fn new(mut rates: Array2<f64>, defined: Array2<bool>) -> Result<Self> {
        if rates.dim() != defined.dim() {
            return Err(DecodeError::InvalidParameter {
                name: "defined",
                reason: format!(
                    "mask shape {:?} differs from rate shape {:?}",
                    defined.dim(),
                    rates.dim()
                ),
            });
        }
        let mut invalid = None;
        ndarray::Zip::from(&mut rates)
            .and(&defined)
            .for_each(|rate, &ok| {
                if !ok {
                    *rate = 0.0;
                } else if !(rate.is_finite() && *rate >= 0.0) {
                    invalid = Some(*rate);
                }
            });
        if let Some(rate) = invalid {
            return Err(DecodeError::InvalidParameter {
                name: "rates",
                reason: format!("defined rates must be finite and non-negative, found {}", rate),
            });
        }
        Ok(Self { rates, defined })
    }

    /// Build from rates where NaN marks an undefined bin
    pub fn from_rates(rates: Array2<f64>) -> Result<Self> {
        let defined = rates.mapv(|r| !r.is_nan());
        Self::new(rates, defined)
    }

    /// A map set with no cells over `bins` bins
    pub fn empty(bins: usize) -> Self {
        Self {
            rates: Array2::zeros((0, bins)),
            defined: Array2::from_elem((0, bins), true),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.rates.nrows()
    }

    pub fn bin_count(&self) -> usize {
        self.rates.ncols()
    }

    /// Raw rate array; undefined entries hold 0.0
    pub fn rates(&self) -> ArrayView2<'_, f64> {
        self.rates.view()
    }

    pub fn defined(&self) -> ArrayView2<'_, bool> {
        self.defined.view()
    }

    pub fn rate(&self, cell: usize, bin: usize) -> Option<f64> {
        if self.defined[[cell, bin]] {
            Some(self.rates[[cell, bin]])
        } else {
            None
        }
    }

    /// Rates of one cell over every bin
    pub fn cell(&self, cell: usize) -> ArrayView1<'_, f64> {
        self.rates.row(cell)
    }

    /// A bin is usable only if every cell has a defined rate there
    pub fn bin_defined(&self) -> Array1<bool> {
        self.defined
            .map_axis(Axis(0), |column| column.iter().all(|&ok| ok))
    }
}

/// Builds a (smoothed) map over a bin grid from weighted samples
///
/// `bins[i]` is the flat bin of sample `i` and `weights[i]` its weight; the
/// result has one entry per flat bin of `grid`.
pub trait RateMapProvider: Sync {
    fn build_map(&self, bins: &[usize], weights: ArrayView1<f64>, grid: &BinGrid) -> Array1<f64>;
}

/// Weighted histogram followed by a separable Gaussian filter
///
/// The kernel is truncated at 4 sigma and never reaches further than the
/// axis itself. Periodic dimensions fold the kernel onto the circle; at
/// open edges the truncated kernel is renormalised.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothedHistogram {
    /// Kernel width in bins; 0 disables smoothing
    pub sigma_bins: f64,
}

/// Smoothing weights for one axis
#[derive(Debug, Clone, PartialEq)]
enum AxisKernel {
    /// Weights for offsets `-radius..=radius`
    Open { weights: Vec<f64>, radius: usize },
    /// Weight per offset modulo the axis length
    Folded(Vec<f64>),
}

impl SmoothedHistogram {
    pub fn new(sigma_bins: f64) -> Self {
        Self { sigma_bins }
    }

    fn weight(&self, offset: f64) -> f64 {
        let x = offset / self.sigma_bins;
        (-0.5 * x * x).exp()
    }

    fn axis_kernel(&self, n: usize, periodic: bool) -> Option<AxisKernel> {
        if !(self.sigma_bins > 0.0) || n == 0 {
            return None;
        }
        let reach = (4.0 * self.sigma_bins).ceil();

        if periodic {
            // From one full period upward the folded Gaussian is flat to 1e-8
            if self.sigma_bins >= n as f64 {
                return Some(AxisKernel::Folded(vec![1.0; n]));
            }
            let radius = reach as isize;
            let mut folded = vec![0.0; n];
            for k in -radius..=radius {
                folded[k.rem_euclid(n as isize) as usize] += self.weight(k as f64);
            }
            return Some(AxisKernel::Folded(folded));
        }

        let radius = reach.min((n - 1) as f64) as usize;
        let weights = (0..=2 * radius)
            .map(|k| self.weight(k as f64 - radius as f64))
            .collect();
        Some(AxisKernel::Open { weights, radius })
    }
}

impl RateMapProvider for SmoothedHistogram {
    fn build_map(&self, bins: &[usize], weights: ArrayView1<f64>, grid: &BinGrid) -> Array1<f64> {
        let mut histogram = vec![0.0; grid.len()];
        for (&bin, &weight) in bins.iter().zip(weights.iter()) {
            if bin < histogram.len() {
                histogram[bin] += weight;
            }
        }

        for axis in 0..grid.dimensions() {
            if let Some(kernel) = self.axis_kernel(grid.shape()[axis], grid.is_periodic(axis)) {
                histogram = smooth_axis(&histogram, grid, axis, &kernel);
            }
        }

        Array1::from_vec(histogram)
    }
}

fn smooth_axis(values: &[f64], grid: &BinGrid, axis: usize, kernel: &AxisKernel) -> Vec<f64> {
    let shape = grid.shape();
    let n = shape[axis];
    let stride: usize = shape[axis + 1..].iter().product();

    (0..values.len())
        .map(|flat| {
            let i = (flat / stride) % n;
            let base = flat - i * stride;
            let mut sum = 0.0;
            let mut weight_sum = 0.0;
            match kernel {
                AxisKernel::Open { weights, radius } => {
                    for j in i.saturating_sub(*radius)..=(i + radius).min(n - 1) {
                        let w = weights[j + radius - i];
                        sum += w * values[base + j * stride];
                        weight_sum += w;
                    }
                }
                AxisKernel::Folded(weights) => {
                    for (offset, &w) in weights.iter().enumerate() {
                        sum += w * values[base + ((i + offset) % n) * stride];
                        weight_sum += w;
                    }
                }
            }
            sum / weight_sum
        })
        .collect()
}

/// Inputs to rate-map estimation that stay fixed across folds
#[derive(Debug, Clone, Copy)]
pub struct RateMapInputs<'a> {
    pub grid: &'a BinGrid,
    /// Flat bin per sample (`None` for samples outside the grid)
    pub bins: &'a [Option<usize>],
    /// Spike counts, time × all recorded cells
    pub counts: ArrayView2<'a, f64>,
    /// Window the counts were accumulated over (seconds)
    pub window_duration_s: f64,
    /// Spacing between samples (seconds)
    pub sample_period_s: f64,
    /// Occupancy below which a bin is undefined (seconds)
    pub min_occupancy_s: f64,
}

/// Estimate rate maps for `cells` from the samples listed in `samples`
///
/// Rate = smoothed spike sum / (smoothed sample count × window duration).
/// Bins with zero occupancy, or occupancy below the threshold, are
/// undefined for every cell.
pub fn estimate_rate_maps<P: RateMapProvider + ?Sized>(
    provider: &P,
    inputs: &RateMapInputs<'_>,
    cells: &[usize],
    samples: &[usize],
) -> RateMaps {
    let grid = inputs.grid;
    let (sample_indices, sample_bins): (Vec<usize>, Vec<usize>) = samples
        .iter()
        .filter_map(|&s| inputs.bins[s].map(|bin| (s, bin)))
        .unzip();

    let ones = Array1::<f64>::ones(sample_bins.len());
    let occupancy = provider.build_map(&sample_bins, ones.view(), grid);
    let bin_ok: Vec<bool> = occupancy
        .iter()
        .map(|&occ| {
            let seconds = occ * inputs.sample_period_s;
            occ > 0.0 && seconds >= inputs.min_occupancy_s
        })
        .collect();

    let cell_maps: Vec<Array1<f64>> = cells
        .par_iter()
        .map(|&cell| {
            let weights: Array1<f64> = sample_indices
                .iter()
                .map(|&s| inputs.counts[[s, cell]])
                .collect();
            let spikes = provider.build_map(&sample_bins, weights.view(), grid);
            Array1::from_shape_fn(grid.len(), |bin| {
                if bin_ok[bin] {
                    (spikes[bin] / (occupancy[bin] * inputs.window_duration_s)).max(0.0)
                } else {
                    0.0
                }
            })
        })
        .collect();

    let mut rates = Array2::zeros((cells.len(), grid.len()));
    for (mut row, map) in rates.rows_mut().into_iter().zip(&cell_maps) {
        row.assign(map);
    }
    let defined = Array2::from_shape_fn((cells.len(), grid.len()), |(_, bin)| bin_ok[bin]);

    RateMaps { rates, defined }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_nan_marks_undefined() {
        let maps = RateMaps::from_rates(array![[1.0, f64::NAN], [2.0, 3.0]]).unwrap();
        assert_eq!(maps.rate(0, 1), None);
        assert_eq!(maps.rate(1, 1), Some(3.0));
        assert_eq!(maps.rates()[[0, 1]], 0.0);
        assert_eq!(maps.bin_defined(), array![true, false]);
    }

    #[test]
    fn test_rejects_negative_rates() {
        assert!(RateMaps::from_rates(array![[1.0, -2.0]]).is_err());
        assert!(RateMaps::new(array![[1.0]], array![[true, true]]).is_err());
    }

    #[test]
    fn test_unsmoothed_histogram_sums_weights() {
        let grid = BinGrid::uniform_1d(0.0, 4.0, 4, false).unwrap();
        let provider = SmoothedHistogram::new(0.0);
        let map = provider.build_map(&[0, 0, 3], array![1.0, 2.0, 5.0].view(), &grid);
        assert_eq!(map, array![3.0, 0.0, 0.0, 5.0]);
    }

    #[test]
    fn test_smoothing_preserves_mass_on_periodic_axis() {
        let grid = BinGrid::uniform_1d(0.0, 1.0, 10, true).unwrap();
        let provider = SmoothedHistogram::new(1.5);
        let map = provider.build_map(&[0], array![4.0].view(), &grid);
        assert!((map.sum() - 4.0).abs() < 1e-9);
        // Wraps onto the far end
        assert!((map[1] - map[9]).abs() < 1e-12);
        assert!(map[0] > map[1]);
    }

    #[test]
    fn test_wide_kernel_is_bounded_by_axis_length() {
        let open = BinGrid::uniform_1d(0.0, 2.0, 2, false).unwrap();
        let provider = SmoothedHistogram::new(1e17);
        let map = provider.build_map(&[0], array![2.0].view(), &open);
        assert_eq!(map, array![1.0, 1.0]);

        let ring = BinGrid::uniform_1d(0.0, 1.0, 5, true).unwrap();
        let map = provider.build_map(&[3], array![5.0].view(), &ring);
        assert!(map.iter().all(|&v| (v - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_folded_kernel_wraps_more_than_once() {
        // Radius 4 on a 3-bin ring folds every offset back onto the axis
        let ring = BinGrid::uniform_1d(0.0, 1.0, 3, true).unwrap();
        let provider = SmoothedHistogram::new(1.0);
        let map = provider.build_map(&[0], array![3.0].view(), &ring);
        assert!((map.sum() - 3.0).abs() < 1e-9);
        assert!((map[1] - map[2]).abs() < 1e-12);
        assert!(map[0] > map[1]);
    }

    #[test]
    fn test_smoothing_two_dimensional_spreads_along_both_axes() {
        let grid = BinGrid::new(
            vec![vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 2.0, 3.0]],
            Vec::new(),
        )
        .unwrap();
        let provider = SmoothedHistogram::new(0.8);
        let center = grid.flat_index(&[1, 1]).unwrap();
        let map = provider.build_map(&[center], array![1.0].view(), &grid);
        let right = grid.flat_index(&[1, 2]).unwrap();
        let down = grid.flat_index(&[2, 1]).unwrap();
        assert!(map[right] > 0.0);
        assert!((map[right] - map[down]).abs() < 1e-12);
        assert!(map[center] > map[right]);
    }

    #[test]
    fn test_estimate_rate_maps_divides_by_occupancy() {
        let grid = BinGrid::uniform_1d(0.0, 3.0, 3, false).unwrap();
        let bins = vec![Some(0), Some(0), Some(1), None, Some(1)];
        // two cells; counts per 0.5 s window
        let counts = array![[1.0, 0.0], [3.0, 0.0], [0.0, 2.0], [9.0, 9.0], [0.0, 4.0]];
        let inputs = RateMapInputs {
            grid: &grid,
            bins: &bins,
            counts: counts.view(),
            window_duration_s: 0.5,
            sample_period_s: 0.1,
            min_occupancy_s: 0.0,
        };
        let maps = estimate_rate_maps(&SmoothedHistogram::new(0.0), &inputs, &[0, 1], &[0, 1, 2, 3, 4]);

        assert_eq!(maps.cell_count(), 2);
        // cell 0, bin 0: mean 2 spikes per 0.5 s window -> 4 Hz
        assert_eq!(maps.rate(0, 0), Some(4.0));
        assert_eq!(maps.rate(1, 1), Some(6.0));
        // bin 2 never visited; sample 3 has no bin and is ignored
        assert_eq!(maps.rate(0, 2), None);
        assert_eq!(maps.rate(1, 2), None);
    }

    #[test]
    fn test_occupancy_threshold_discards_bins() {
        let grid = BinGrid::uniform_1d(0.0, 2.0, 2, false).unwrap();
        let bins = vec![Some(0), Some(0), Some(0), Some(1)];
        let counts = array![[1.0], [1.0], [1.0], [1.0]];
        let inputs = RateMapInputs {
            grid: &grid,
            bins: &bins,
            counts: counts.view(),
            window_duration_s: 1.0,
            sample_period_s: 0.1,
            min_occupancy_s: 0.2,
        };
        let maps = estimate_rate_maps(&SmoothedHistogram::new(0.0), &inputs, &[0], &[0, 1, 2, 3]);
        assert_eq!(maps.rate(0, 0), Some(1.0));
        assert_eq!(maps.rate(0, 1), None);
    }
}
