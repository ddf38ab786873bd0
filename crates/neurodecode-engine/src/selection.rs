// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Sample and cell eligibility
//!
//! A sample is eligible when its condition and direction labels are
//! accepted, its speed reaches the threshold, and its independent variable
//! falls inside the bin grid. A cell is eligible when it fires at least
//! `min_spikes` over the eligible training samples.

use ndarray::{Array2, ArrayView2};
use neurodecode_config::SelectionConfig;

use crate::error::{DecodeError, Result};
use crate::grid::BinGrid;

/// Behavioural time series aligned 1:1 with the spike-count rows
#[derive(Debug, Clone, PartialEq)]
pub struct BehaviorSeries {
    /// Independent variable(s), time × decoded dimensions
    pub variables: Array2<f64>,
    pub condition: Vec<i32>,
    pub direction: Vec<i32>,
    pub speed: Vec<f64>,
}

impl BehaviorSeries {
    pub fn new(
        variables: Array2<f64>,
        condition: Vec<i32>,
        direction: Vec<i32>,
        speed: Vec<f64>,
    ) -> Result<Self> {
        let samples = variables.nrows();
        for (what, len) in [
            ("condition labels", condition.len()),
            ("direction labels", direction.len()),
            ("speed", speed.len()),
        ] {
            if len != samples {
                return Err(DecodeError::SampleCountMismatch {
                    what,
                    expected: samples,
                    actual: len,
                });
            }
        }
        Ok(Self {
            variables,
            condition,
            direction,
            speed,
        })
    }

    /// Series with a single condition and direction label and zero speed
    pub fn from_variables(variables: Array2<f64>) -> Self {
        let samples = variables.nrows();
        Self {
            variables,
            condition: vec![0; samples],
            direction: vec![0; samples],
            speed: vec![0.0; samples],
        }
    }

    pub fn len(&self) -> usize {
        self.variables.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-sample eligibility and discretised true bin
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSelection {
    pub eligible: Vec<bool>,
    /// Flat bin of the independent variable (`None` outside the grid)
    pub bins: Vec<Option<usize>>,
}

impl SampleSelection {
    /// Eligible samples inside `range`, ascending
    pub fn eligible_in(&self, range: std::ops::Range<usize>) -> Vec<usize> {
        range.filter(|&t| self.eligible[t]).collect()
    }
}

pub fn select_samples(
    behavior: &BehaviorSeries,
    grid: &BinGrid,
    selection: &SelectionConfig,
) -> Result<SampleSelection> {
    let bins = grid.discretize_samples(behavior.variables.view())?;
    let eligible = (0..behavior.len())
        .map(|t| {
            bins[t].is_some()
                && selection.accepts_condition(behavior.condition[t])
                && selection.accepts_direction(behavior.direction[t])
                && behavior.speed[t] >= selection.min_speed
        })
        .collect();
    Ok(SampleSelection { eligible, bins })
}

/// Cells whose spike total over `samples` reaches `min_spikes`
pub fn select_cells(counts: ArrayView2<f64>, samples: &[usize], min_spikes: f64) -> Vec<usize> {
    (0..counts.ncols())
        .filter(|&cell| {
            let total: f64 = samples.iter().map(|&t| counts[[t, cell]]).sum();
            total >= min_spikes
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_label_lengths_checked() {
        let result = BehaviorSeries::new(array![[0.0], [1.0]], vec![0, 0], vec![1], vec![0.0, 0.0]);
        assert!(matches!(
            result,
            Err(DecodeError::SampleCountMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_select_samples_applies_every_filter() {
        let grid = BinGrid::uniform_1d(0.0, 10.0, 5, false).unwrap();
        let behavior = BehaviorSeries::new(
            array![[1.0], [2.0], [3.0], [4.0], [f64::NAN], [11.0]],
            vec![1, 2, 1, 1, 1, 1],
            vec![1, 1, -1, 1, 1, 1],
            vec![5.0, 5.0, 5.0, 0.5, 5.0, 5.0],
        )
        .unwrap();
        let selection = SelectionConfig {
            min_spikes: 0.0,
            conditions: vec![1],
            directions: vec![1],
            min_speed: 1.0,
        };
        let selected = select_samples(&behavior, &grid, &selection).unwrap();
        assert_eq!(
            selected.eligible,
            vec![true, false, false, false, false, false]
        );
        assert_eq!(selected.bins, vec![Some(0), Some(1), Some(1), Some(2), None, None]);
        assert_eq!(selected.eligible_in(1..6), Vec::<usize>::new());
    }

    #[test]
    fn test_select_cells_counts_only_listed_samples() {
        let counts = array![[5.0, 0.0, 1.0], [5.0, 1.0, 1.0], [0.0, 30.0, 1.0]];
        assert_eq!(select_cells(counts.view(), &[0, 1], 2.0), vec![0, 2]);
        assert_eq!(select_cells(counts.view(), &[], 1.0), Vec::<usize>::new());
    }
}
