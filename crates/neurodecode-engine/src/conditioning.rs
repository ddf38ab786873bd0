// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Phase- and event-conditioned views of decoding output
//!
//! These consume per-sample traces keyed by sample index (decoding error,
//! decoded coordinate) and average them against an oscillatory phase or
//! around discrete events. `decode_event_windows` reuses the Bayesian
//! decoder on the samples surrounding each event.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use ndarray::{ArrayView2, Axis};
use serde::Serialize;

use crate::bayes::{BayesianDecoder, SampleEstimate};
use crate::error::{DecodeError, Result};
use crate::grid::BinGrid;
use crate::rate_map::RateMaps;

/// Trace averaged in equal phase bins over `[0, 2π)`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseProfile {
    pub bin_centers: Vec<f64>,
    pub mean: Vec<Option<f64>>,
    pub counts: Vec<usize>,
}

/// Trace averaged at fixed lags around events
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventAverage {
    pub lags: Vec<isize>,
    pub mean: Vec<Option<f64>>,
    pub counts: Vec<usize>,
}

/// Decoded estimates around each event, events × offsets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventWindows {
    pub offsets: Vec<isize>,
    pub estimates: Vec<Vec<Option<SampleEstimate>>>,
}

impl EventWindows {
    /// Mean argmax-centre coordinate per offset, across events
    pub fn mean_argmax(&self, dimension: usize) -> Vec<Option<f64>> {
        (0..self.offsets.len())
            .map(|column| {
                let mut acc = MeanAccumulator::default();
                for row in &self.estimates {
                    if let Some(estimate) = &row[column] {
                        acc.push(estimate.argmax_center.get(dimension).copied());
                    }
                }
                acc.mean()
            })
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct MeanAccumulator {
    sum: f64,
    count: usize,
}

impl MeanAccumulator {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Average `values` in `n_bins` equal phase bins
///
/// Phases are wrapped onto `[0, 2π)`. Samples with an undefined value or a
/// non-finite phase are skipped.
pub fn phase_binned_average(values: &[Option<f64>], phases: &[f64], n_bins: usize) -> Result<PhaseProfile> {
    if n_bins == 0 {
        return Err(DecodeError::InvalidParameter {
            name: "n_bins",
            reason: "at least one phase bin is required".to_string(),
        });
    }
    if phases.len() != values.len() {
        return Err(DecodeError::SampleCountMismatch {
            what: "phases",
            expected: values.len(),
            actual: phases.len(),
        });
    }

    let width = TAU / n_bins as f64;
    let mut bins = vec![MeanAccumulator::default(); n_bins];
    for (&value, &phase) in values.iter().zip(phases) {
        if !phase.is_finite() {
            continue;
        }
        let bin = ((phase.rem_euclid(TAU) / width) as usize).min(n_bins - 1);
        bins[bin].push(value);
    }

    Ok(PhaseProfile {
        bin_centers: (0..n_bins).map(|i| (i as f64 + 0.5) * width).collect(),
        mean: bins.iter().map(MeanAccumulator::mean).collect(),
        counts: bins.iter().map(|b| b.count).collect(),
    })
}

/// Average `values` at lags `-before..=after` around each event index
pub fn event_triggered_average(
    values: &[Option<f64>],
    events: &[usize],
    before: usize,
    after: usize,
) -> EventAverage {
    let lags: Vec<isize> = (-(before as isize)..=after as isize).collect();
    let mut acc = vec![MeanAccumulator::default(); lags.len()];
    for &event in events {
        for (slot, &lag) in acc.iter_mut().zip(&lags) {
            if let Some(t) = shifted(event, lag, values.len()) {
                slot.push(values[t]);
            }
        }
    }

    EventAverage {
        mean: acc.iter().map(MeanAccumulator::mean).collect(),
        counts: acc.iter().map(|a| a.count).collect(),
        lags,
    }
}

fn shifted(event: usize, offset: isize, len: usize) -> Option<usize> {
    event.checked_add_signed(offset).filter(|&t| t < len)
}

/// Decode the samples at `event + offset` for every event and offset
///
/// `counts` is time × cells in the cell order of `rate_maps`. Each distinct
/// sample is decoded once; positions outside the recording are `None`.
pub fn decode_event_windows(
    decoder: &BayesianDecoder,
    rate_maps: &RateMaps,
    counts: ArrayView2<f64>,
    grid: &BinGrid,
    events: &[usize],
    offsets: &[isize],
) -> Result<EventWindows> {
    let len = counts.nrows();
    let mut positions: BTreeMap<usize, usize> = BTreeMap::new();
    for &event in events {
        for &offset in offsets {
            if let Some(t) = shifted(event, offset, len) {
                positions.insert(t, 0);
            }
        }
    }
    let samples: Vec<usize> = positions.keys().copied().collect();
    for (slot, position) in positions.values_mut().enumerate() {
        *position = slot;
    }

    let decoded = decoder.decode(rate_maps, counts.select(Axis(0), &samples).view(), grid)?;
    let estimates = events
        .iter()
        .map(|&event| {
            offsets
                .iter()
                .map(|&offset| {
                    shifted(event, offset, len)
                        .and_then(|t| positions.get(&t))
                        .and_then(|&slot| decoded[slot].clone())
                })
                .collect()
        })
        .collect();

    Ok(EventWindows {
        offsets: offsets.to_vec(),
        estimates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bayes::DecoderSettings;
    use ndarray::array;
    use std::f64::consts::PI;

    #[test]
    fn test_phase_bins_wrap_and_skip_undefined() {
        let values = [Some(1.0), Some(3.0), Some(10.0), None, Some(5.0)];
        let phases = [0.1, 0.2 + TAU, PI + 0.1, 0.3, -0.1];
        let profile = phase_binned_average(&values, &phases, 2).unwrap();

        assert_eq!(profile.counts, vec![2, 2]);
        assert_eq!(profile.mean[0], Some(2.0));
        // -0.1 wraps into the upper half
        assert_eq!(profile.mean[1], Some(7.5));
        assert!((profile.bin_centers[0] - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_phase_bin_is_undefined() {
        let profile = phase_binned_average(&[Some(1.0)], &[0.0], 4).unwrap();
        assert_eq!(profile.mean, vec![Some(1.0), None, None, None]);
        assert!(phase_binned_average(&[Some(1.0)], &[0.0], 0).is_err());
        assert!(phase_binned_average(&[Some(1.0)], &[], 2).is_err());
    }

    #[test]
    fn test_event_average_counts_only_inside_trace() {
        let values = [Some(0.0), Some(1.0), Some(2.0), None, Some(4.0)];
        let average = event_triggered_average(&values, &[0, 4], 1, 1);

        assert_eq!(average.lags, vec![-1, 0, 1]);
        // lag -1: only event 4 contributes, and values[3] is undefined
        assert_eq!(average.counts, vec![0, 2, 1]);
        assert_eq!(average.mean, vec![None, Some(2.0), Some(1.0)]);
    }

    #[test]
    fn test_decode_event_windows_table() {
        let grid = BinGrid::uniform_1d(0.0, 2.0, 2, false).unwrap();
        let maps = RateMaps::from_rates(array![[8.0, 0.5], [0.5, 8.0]]).unwrap();
        let decoder = BayesianDecoder::new(DecoderSettings::new(1.0));
        let counts = array![[6.0, 0.0], [0.0, 6.0], [6.0, 0.0], [0.0, 6.0]];

        let windows =
            decode_event_windows(&decoder, &maps, counts.view(), &grid, &[1, 3], &[-1, 0, 1]).unwrap();
        assert_eq!(windows.estimates.len(), 2);

        let argmax = |e: &Option<SampleEstimate>| e.as_ref().map(|e| e.argmax);
        assert_eq!(
            windows.estimates[0].iter().map(argmax).collect::<Vec<_>>(),
            vec![Some(0), Some(1), Some(0)]
        );
        assert_eq!(
            windows.estimates[1].iter().map(argmax).collect::<Vec<_>>(),
            vec![Some(0), Some(1), None]
        );
        assert_eq!(windows.mean_argmax(0), vec![Some(0.5), Some(1.5), Some(0.5)]);
    }
}
