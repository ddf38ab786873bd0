// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Discretised state space
//!
//! A `BinGrid` is the product of one edge sequence per decoded dimension.
//! Bins are flattened row-major (last dimension fastest), which is the
//! layout every rate map and posterior row uses.

use ndarray::ArrayView2;
use neurodecode_config::DecodingConfig;

use crate::error::{DecodeError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct BinGrid {
    edges: Vec<Vec<f64>>,
    periodic: Vec<bool>,
    shape: Vec<usize>,
}

impl BinGrid {
    /// Build a grid from per-dimension edge sequences
    ///
    /// `periodic` is either empty (no periodic dimension) or has one flag per
    /// dimension. A periodic dimension wraps with period `last - first`.
    pub fn new(edges: Vec<Vec<f64>>, periodic: Vec<bool>) -> Result<Self> {
        if edges.is_empty() {
            return Err(DecodeError::InvalidBinEdges {
                dimension: 0,
                reason: "no decoded dimension given".to_string(),
            });
        }
        for (dimension, dim_edges) in edges.iter().enumerate() {
            if dim_edges.len() < 2 {
                return Err(DecodeError::InvalidBinEdges {
                    dimension,
                    reason: format!("needs at least 2 edges, got {}", dim_edges.len()),
                });
            }
            if dim_edges.iter().any(|e| !e.is_finite()) {
                return Err(DecodeError::InvalidBinEdges {
                    dimension,
                    reason: "edges must be finite".to_string(),
                });
            }
            if dim_edges.windows(2).any(|pair| pair[1] <= pair[0]) {
                return Err(DecodeError::InvalidBinEdges {
                    dimension,
                    reason: "edges must be strictly increasing".to_string(),
                });
            }
        }

        let periodic = if periodic.is_empty() {
            vec![false; edges.len()]
        } else if periodic.len() == edges.len() {
            periodic
        } else {
            return Err(DecodeError::InvalidParameter {
                name: "periodic",
                reason: format!(
                    "{} flags for {} dimensions",
                    periodic.len(),
                    edges.len()
                ),
            });
        };

        let shape = edges.iter().map(|e| e.len() - 1).collect();
        Ok(Self {
            edges,
            periodic,
            shape,
        })
    }

    pub fn from_config(config: &DecodingConfig) -> Result<Self> {
        Self::new(config.bin_edges.clone(), config.periodic.clone())
    }

    /// Evenly spaced 1D grid over `[start, end]`
    pub fn uniform_1d(start: f64, end: f64, bins: usize, periodic: bool) -> Result<Self> {
        if bins == 0 {
            return Err(DecodeError::InvalidBinEdges {
                dimension: 0,
                reason: "zero bins requested".to_string(),
            });
        }
        let step = (end - start) / bins as f64;
        let edges = (0..=bins).map(|i| start + step * i as f64).collect();
        Self::new(vec![edges], vec![periodic])
    }

    pub fn dimensions(&self) -> usize {
        self.edges.len()
    }

    /// Bins per dimension
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Total number of flattened bins
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn edges(&self, dimension: usize) -> &[f64] {
        &self.edges[dimension]
    }

    pub fn is_periodic(&self, dimension: usize) -> bool {
        self.periodic[dimension]
    }

    /// Wrap period of a periodic dimension
    pub fn period(&self, dimension: usize) -> Option<f64> {
        if !self.periodic[dimension] {
            return None;
        }
        let edges = &self.edges[dimension];
        Some(edges[edges.len() - 1] - edges[0])
    }

    /// Row-major flat index of a per-dimension bin index
    pub fn flat_index(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut flat = 0;
        for (&i, &n) in index.iter().zip(&self.shape) {
            if i >= n {
                return None;
            }
            flat = flat * n + i;
        }
        Some(flat)
    }

    /// Per-dimension bin index of a flat index
    pub fn unravel(&self, flat: usize) -> Vec<usize> {
        let mut index = vec![0; self.shape.len()];
        let mut rest = flat;
        for (slot, &n) in index.iter_mut().zip(&self.shape).rev() {
            *slot = rest % n;
            rest /= n;
        }
        index
    }

    /// Bin holding `value` along one dimension
    ///
    /// Bin `i` covers `[edges[i], edges[i + 1])`; the last bin also includes
    /// its right edge. Non-finite and out-of-range values have no bin.
    pub fn bin_of(&self, dimension: usize, value: f64) -> Option<usize> {
        let edges = &self.edges[dimension];
        if !value.is_finite() || value < edges[0] || value > edges[edges.len() - 1] {
            return None;
        }
        let bins = edges.len() - 1;
        let above = edges.partition_point(|e| *e <= value);
        Some((above - 1).min(bins - 1))
    }

    /// Flat bin holding a point (one coordinate per dimension)
    pub fn discretize(&self, values: &[f64]) -> Option<usize> {
        if values.len() != self.dimensions() {
            return None;
        }
        let mut flat = 0;
        for (dimension, (&value, &n)) in values.iter().zip(&self.shape).enumerate() {
            flat = flat * n + self.bin_of(dimension, value)?;
        }
        Some(flat)
    }

    /// Discretise every row of a (time × dimensions) array
    pub fn discretize_samples(&self, variables: ArrayView2<f64>) -> Result<Vec<Option<usize>>> {
        if variables.ncols() != self.dimensions() {
            return Err(DecodeError::SampleCountMismatch {
                what: "independent-variable dimensions",
                expected: self.dimensions(),
                actual: variables.ncols(),
            });
        }
        Ok(variables
            .rows()
            .into_iter()
            .map(|row| match row.as_slice() {
                Some(values) => self.discretize(values),
                None => self.discretize(&row.to_vec()),
            })
            .collect())
    }

    /// Bin centres along one dimension
    pub fn centers(&self, dimension: usize) -> Vec<f64> {
        self.edges[dimension]
            .windows(2)
            .map(|pair| 0.5 * (pair[0] + pair[1]))
            .collect()
    }

    /// Centre coordinates of a flat bin
    pub fn center_of(&self, flat: usize) -> Vec<f64> {
        self.unravel(flat)
            .into_iter()
            .enumerate()
            .map(|(dimension, i)| {
                let edges = &self.edges[dimension];
                0.5 * (edges[i] + edges[i + 1])
            })
            .collect()
    }

    /// Euclidean distance between a bin centre and a point
    ///
    /// Periodic dimensions use the shorter way around.
    pub fn distance(&self, flat: usize, values: &[f64]) -> Option<f64> {
        if values.len() != self.dimensions() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let center = self.center_of(flat);
        let squared: f64 = center
            .iter()
            .zip(values)
            .enumerate()
            .map(|(dimension, (&c, &v))| {
                let d = self.axis_difference(dimension, c, v);
                d * d
            })
            .sum();
        Some(squared.sqrt())
    }

    /// Signed difference `b - a` along one dimension, wrapped if periodic
    pub fn axis_difference(&self, dimension: usize, a: f64, b: f64) -> f64 {
        let d = b - a;
        match self.period(dimension) {
            Some(period) => {
                let wrapped = d.rem_euclid(period);
                if wrapped > 0.5 * period {
                    wrapped - period
                } else {
                    wrapped
                }
            }
            None => d,
        }
    }
}
