// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! JSON session input and decoding report output
//!
//! A session file carries one recording's behavioural arrays and binned
//! spike counts as nested JSON arrays (rows are samples). The report is the
//! per-sample output of a decoding run plus its summaries.

use std::ops::Range;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::engine::{
    event_triggered_average, phase_binned_average, BehaviorSeries, DecodeError, DecodeSource,
    DecodingResult, EventAverage, PhaseProfile, SampleEstimate,
};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Failed to parse session JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Ragged {what}: row {row} has {actual} columns, expected {expected}")]
    Ragged {
        what: &'static str,
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// One recording session as stored on disk
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SessionFile {
    /// Independent variable(s), time × dimensions
    pub variables: Vec<Vec<f64>>,
    /// Binned spike counts, time × cells
    pub spike_counts: Vec<Vec<f64>>,
    #[serde(default)]
    pub condition: Option<Vec<i32>>,
    #[serde(default)]
    pub direction: Option<Vec<i32>>,
    #[serde(default)]
    pub speed: Option<Vec<f64>>,
    /// Half-open `[start, end)` training range; the whole session if absent
    #[serde(default)]
    pub training_range: Option<[usize; 2]>,
    /// Oscillatory phase per sample (radians)
    #[serde(default)]
    pub phases: Option<Vec<f64>>,
    /// Sample indices of detected events
    #[serde(default)]
    pub events: Option<Vec<usize>>,
}

impl SessionFile {
    pub fn from_json(content: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn sample_count(&self) -> usize {
        self.variables.len()
    }

    pub fn training_range(&self) -> Range<usize> {
        match self.training_range {
            Some([start, end]) => start..end,
            None => 0..self.sample_count(),
        }
    }

    pub fn behavior(&self) -> Result<BehaviorSeries, SessionError> {
        let variables = to_array("variables", &self.variables)?;
        let samples = variables.nrows();
        Ok(BehaviorSeries::new(
            variables,
            self.condition.clone().unwrap_or_else(|| vec![0; samples]),
            self.direction.clone().unwrap_or_else(|| vec![0; samples]),
            self.speed.clone().unwrap_or_else(|| vec![0.0; samples]),
        )?)
    }

    pub fn spike_count_array(&self) -> Result<Array2<f64>, SessionError> {
        to_array("spike_counts", &self.spike_counts)
    }
}

fn to_array(what: &'static str, rows: &[Vec<f64>]) -> Result<Array2<f64>, SessionError> {
    let width = rows.first().map_or(0, Vec::len);
    let mut flat = Vec::with_capacity(rows.len() * width);
    for (row, values) in rows.iter().enumerate() {
        if values.len() != width {
            return Err(SessionError::Ragged {
                what,
                row,
                expected: width,
                actual: values.len(),
            });
        }
        flat.extend_from_slice(values);
    }
    Array2::from_shape_vec((rows.len(), width), flat).map_err(|_| SessionError::Ragged {
        what,
        row: 0,
        expected: width,
        actual: width,
    })
}

/// Output row for one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleReport {
    pub index: usize,
    pub source: DecodeSource,
    pub true_bin: Option<usize>,
    pub estimate: Option<SampleEstimate>,
    pub error: Option<f64>,
}

/// Serializable summary of a decoding run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodingReport {
    pub cells: Vec<usize>,
    pub folds: usize,
    pub decoded: usize,
    pub median_error: Option<f64>,
    pub cross_validated_median_error: Option<f64>,
    pub accuracy: Option<f64>,
    /// Column-normalised confusion table, decoded × true
    pub confusion: Vec<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_by_phase: Option<PhaseProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_around_events: Option<EventAverage>,
    pub samples: Vec<SampleReport>,
}

impl DecodingReport {
    pub fn from_result(result: &DecodingResult) -> Self {
        let samples = (0..result.len())
            .map(|index| SampleReport {
                index,
                source: result.sources[index],
                true_bin: result.true_bins[index],
                estimate: result.estimates[index].clone(),
                error: result.errors[index],
            })
            .collect();

        Self {
            cells: result.cells.clone(),
            folds: result.folds.len(),
            decoded: result.decoded_count(),
            median_error: result.median_error(),
            cross_validated_median_error: result.cross_validated_median_error(),
            accuracy: result.accuracy(),
            confusion: result
                .confusion
                .probabilities()
                .rows()
                .into_iter()
                .map(|row| row.to_vec())
                .collect(),
            error_by_phase: None,
            error_around_events: None,
            samples,
        }
    }

    /// Attach the decoding error averaged in phase bins
    pub fn with_error_by_phase(
        mut self,
        result: &DecodingResult,
        phases: &[f64],
        n_bins: usize,
    ) -> Result<Self, SessionError> {
        self.error_by_phase = Some(phase_binned_average(&result.errors, phases, n_bins)?);
        Ok(self)
    }

    /// Attach the decoding error averaged around events
    pub fn with_error_around_events(
        mut self,
        result: &DecodingResult,
        events: &[usize],
        half_window: usize,
    ) -> Self {
        self.error_around_events = Some(event_triggered_average(
            &result.errors,
            events,
            half_window,
            half_window,
        ));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_arrays() {
        let session = SessionFile::from_json(
            r#"{"variables": [[1.0], [2.0], [3.0]], "spike_counts": [[0, 1], [2, 0], [1, 1]]}"#,
        )
        .unwrap();
        assert_eq!(session.training_range(), 0..3);

        let behavior = session.behavior().unwrap();
        assert_eq!(behavior.len(), 3);
        assert_eq!(behavior.direction, vec![0, 0, 0]);
        assert_eq!(session.spike_count_array().unwrap().dim(), (3, 2));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let session = SessionFile::from_json(
            r#"{"variables": [[1.0], [2.0]], "spike_counts": [[0, 1], [2]], "training_range": [0, 1]}"#,
        )
        .unwrap();
        assert_eq!(session.training_range(), 0..1);
        assert!(matches!(
            session.spike_count_array(),
            Err(SessionError::Ragged { row: 1, .. })
        ));
    }

    #[test]
    fn test_mismatched_labels_rejected() {
        let session = SessionFile::from_json(
            r#"{"variables": [[1.0], [2.0]], "spike_counts": [[0], [2]], "speed": [1.0]}"#,
        )
        .unwrap();
        assert!(matches!(session.behavior(), Err(SessionError::Decode(_))));
    }
}
