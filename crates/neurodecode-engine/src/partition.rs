// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! k-fold cross-validation partitioner
//!
//! Test sets are contiguous blocks of `[0, n)` whose sizes differ by at most
//! one (the first `n % k` folds take the extra index). The split depends
//! only on `n` and `k`, so repeated runs report identical errors.
//!
//! Spike counts are usually smoothed over a window before partitioning, so
//! samples adjacent to a block boundary share spikes across the train/test
//! split. This is a known approximation; the partition only guarantees
//! index disjointness.

use serde::Serialize;

use crate::error::{DecodeError, Result};

/// One train/test split
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fold {
    /// Ascending indices the map is trained on
    pub train: Vec<usize>,
    /// Ascending indices held out for decoding
    pub test: Vec<usize>,
}

/// Split `[0, n)` into `k` folds
///
/// # Errors
/// `InvalidFoldCount` unless `2 <= k <= n`.
pub fn partition(n: usize, k: usize) -> Result<Vec<Fold>> {
    if k < 2 || k > n {
        return Err(DecodeError::InvalidFoldCount {
            folds: k,
            samples: n,
        });
    }

    let base = n / k;
    let extra = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < extra);
        let end = start + size;
        folds.push(Fold {
            train: (0..start).chain(end..n).collect(),
            test: (start..end).collect(),
        });
        start = end;
    }

    Ok(folds)
}

/// Partition an arbitrary ascending list of sample indices
///
/// Positions are split with [`partition`] and mapped back through `indices`.
pub fn partition_indices(indices: &[usize], k: usize) -> Result<Vec<Fold>> {
    Ok(partition(indices.len(), k)?
        .into_iter()
        .map(|fold| Fold {
            train: fold.train.iter().map(|&p| indices[p]).collect(),
            test: fold.test.iter().map(|&p| indices[p]).collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid_partition(n: usize, k: usize) {
        let folds = partition(n, k).unwrap();
        assert_eq!(folds.len(), k);

        let mut seen = vec![0usize; n];
        for fold in &folds {
            for &i in &fold.test {
                seen[i] += 1;
            }
            let complement: Vec<usize> = (0..n).filter(|i| !fold.test.contains(i)).collect();
            assert_eq!(fold.train, complement);
        }
        assert!(seen.iter().all(|&count| count == 1), "n={} k={}", n, k);
    }

    #[test]
    fn test_ten_samples_five_folds() {
        let folds = partition(10, 5).unwrap();
        assert_eq!(folds.len(), 5);
        for (i, fold) in folds.iter().enumerate() {
            assert_eq!(fold.test, vec![2 * i, 2 * i + 1]);
            assert_eq!(fold.train.len(), 8);
        }
        assert_valid_partition(10, 5);
    }

    #[test]
    fn test_uneven_sizes_differ_by_at_most_one() {
        let folds = partition(11, 3).unwrap();
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert_eq!(sizes, vec![4, 4, 3]);
    }

    #[test]
    fn test_covers_range_exactly_once() {
        for n in 2..30 {
            for k in 2..=n {
                assert_valid_partition(n, k);
            }
        }
    }

    #[test]
    fn test_invalid_fold_counts() {
        assert!(matches!(
            partition(10, 1),
            Err(DecodeError::InvalidFoldCount { folds: 1, samples: 10 })
        ));
        assert!(partition(3, 4).is_err());
        assert!(partition(0, 2).is_err());
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(partition(17, 4).unwrap(), partition(17, 4).unwrap());
    }

    #[test]
    fn test_partition_indices_maps_back() {
        let folds = partition_indices(&[3, 5, 8, 13], 2).unwrap();
        assert_eq!(folds[0].test, vec![3, 5]);
        assert_eq!(folds[0].train, vec![8, 13]);
        assert_eq!(folds[1].test, vec![8, 13]);
    }
}
