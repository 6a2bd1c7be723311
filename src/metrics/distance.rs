// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Nearest-neighbour distance metrics between point sets
//!
//! Everything here is brute force: the pairwise matrix costs O(|A|·|B|) in
//! time and memory. Point sets of a few hundred predicted points against
//! ~16k ground-truth points are fine; much larger sets need a spatial index.

use crate::error::{EvalError, Result};
use nalgebra::{DMatrix, Point3};
use serde::{Deserialize, Serialize};

#[inline]
pub(crate) fn squared_distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm_squared()
}

/// Squared Euclidean distance between every pair, shape |A|×|B|
pub fn pairwise_squared_distance(a: &[Point3<f64>], b: &[Point3<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(a.len(), b.len(), |i, j| squared_distance(&a[i], &b[j]))
}

/// Reject tolerances that are not finite and strictly positive
pub fn validate_tolerance(tau: f64) -> Result<()> {
    if tau.is_finite() && tau > 0.0 {
        Ok(())
    } else {
        Err(EvalError::InvalidTolerance { tau })
    }
}

/// Validate a tolerance list: each valid, none repeated
pub fn validate_tolerances(taus: &[f64]) -> Result<()> {
    for (i, &tau) in taus.iter().enumerate() {
        validate_tolerance(tau)?;
        if taus[..i].contains(&tau) {
            return Err(EvalError::DuplicateTolerance { tau });
        }
    }
    Ok(())
}

/// Squared distance from each point to its nearest neighbour in the other set
#[derive(Debug, Clone, PartialEq)]
pub struct NearestDistances {
    pub a_to_b: Vec<f64>,
    pub b_to_a: Vec<f64>,
}

impl NearestDistances {
    /// Row and column minima of a pairwise squared distance matrix
    pub fn from_matrix(matrix: &DMatrix<f64>) -> Result<Self> {
        if matrix.nrows() == 0 || matrix.ncols() == 0 {
            return Err(empty_input());
        }

        let a_to_b = (0..matrix.nrows())
            .map(|i| matrix.row(i).iter().copied().fold(f64::INFINITY, f64::min))
            .collect();
        let b_to_a = (0..matrix.ncols())
            .map(|j| matrix.column(j).iter().copied().fold(f64::INFINITY, f64::min))
            .collect();

        Ok(Self { a_to_b, b_to_a })
    }

    /// Streaming computation without materializing the pairwise matrix
    pub fn compute(a: &[Point3<f64>], b: &[Point3<f64>]) -> Result<Self> {
        if a.is_empty() || b.is_empty() {
            return Err(empty_input());
        }

        let mut a_to_b = vec![f64::INFINITY; a.len()];
        let mut b_to_a = vec![f64::INFINITY; b.len()];

        for (i, pa) in a.iter().enumerate() {
            for (j, pb) in b.iter().enumerate() {
                let d = squared_distance(pa, pb);
                a_to_b[i] = a_to_b[i].min(d);
                b_to_a[j] = b_to_a[j].min(d);
            }
        }

        Ok(Self { a_to_b, b_to_a })
    }

    /// Sum of the two one-directional mean squared nearest distances
    pub fn chamfer(&self) -> f64 {
        mean(&self.a_to_b) + mean(&self.b_to_a)
    }

    /// Precision/recall/F-score at tolerance `tau` on unsquared distances
    pub fn threshold_score(&self, tau: f64) -> Result<ThresholdScore> {
        validate_tolerance(tau)?;
        let precision = fraction_within(&self.a_to_b, tau);
        let recall = fraction_within(&self.b_to_a, tau);
        Ok(ThresholdScore::new(precision, recall))
    }
}

/// Threshold-based matching scores
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdScore {
    pub precision: f64,
    pub recall: f64,
    pub fscore: f64,
}

impl ThresholdScore {
    pub fn new(precision: f64, recall: f64) -> Self {
        let denom = precision + recall;
        let fscore = if denom == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / denom
        };
        Self {
            precision,
            recall,
            fscore,
        }
    }
}

/// Symmetric Chamfer distance; inputs are used as given (no normalization)
pub fn chamfer_distance(a: &[Point3<f64>], b: &[Point3<f64>]) -> Result<f64> {
    Ok(NearestDistances::compute(a, b)?.chamfer())
}

/// Fraction of A within `tau` of B (precision) and of B within `tau` of A (recall)
pub fn threshold_score(a: &[Point3<f64>], b: &[Point3<f64>], tau: f64) -> Result<ThresholdScore> {
    validate_tolerance(tau)?;
    NearestDistances::compute(a, b)?.threshold_score(tau)
}

fn fraction_within(squared: &[f64], tau: f64) -> f64 {
    let hits = squared.iter().filter(|d| d.sqrt() < tau).count();
    hits as f64 / squared.len() as f64
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn empty_input() -> EvalError {
    EvalError::DegenerateInput {
        reason: "cannot compare an empty point set".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pts(rows: &[[f64; 3]]) -> Vec<Point3<f64>> {
        rows.iter().map(|r| Point3::new(r[0], r[1], r[2])).collect()
    }

    #[test]
    fn test_pairwise_matrix_shape_and_values() {
        let a = pts(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let b = pts(&[[0.0, 2.0, 0.0], [0.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);
        let m = pairwise_squared_distance(&a, &b);
        assert_eq!(m.shape(), (2, 3));
        assert_relative_eq!(m[(0, 0)], 4.0);
        assert_relative_eq!(m[(1, 0)], 5.0);
        assert_relative_eq!(m[(1, 2)], 4.0);
    }

    #[test]
    fn test_matrix_and_streaming_agree() {
        let a = pts(&[[0.1, 0.2, 0.3], [-0.4, 0.5, 0.0], [0.9, -0.1, 0.2]]);
        let b = pts(&[[0.0, 0.0, 0.0], [0.5, 0.5, 0.5], [-0.3, 0.3, -0.3], [1.0, 0.0, 0.0]]);
        let from_matrix =
            NearestDistances::from_matrix(&pairwise_squared_distance(&a, &b)).unwrap();
        let streamed = NearestDistances::compute(&a, &b).unwrap();
        assert_eq!(from_matrix, streamed);
    }

    #[test]
    fn test_chamfer_sums_both_directions() {
        let a = pts(&[[0.0, 0.0, 0.0]]);
        let b = pts(&[[1.0, 0.0, 0.0], [3.0, 0.0, 0.0]]);
        // a->b: 1.0 ; b->a: (1 + 9) / 2 = 5.0
        assert_relative_eq!(chamfer_distance(&a, &b).unwrap(), 6.0);
    }

    #[test]
    fn test_fscore_zero_when_nothing_matches() {
        let a = pts(&[[0.0, 0.0, 0.0]]);
        let b = pts(&[[5.0, 0.0, 0.0]]);
        let score = threshold_score(&a, &b, 0.1).unwrap();
        assert_eq!(score.precision, 0.0);
        assert_eq!(score.recall, 0.0);
        assert_eq!(score.fscore, 0.0);
    }

    #[test]
    fn test_threshold_is_strict() {
        let a = pts(&[[0.0, 0.0, 0.0]]);
        let b = pts(&[[0.5, 0.0, 0.0]]);
        assert_eq!(threshold_score(&a, &b, 0.5).unwrap().precision, 0.0);
        assert_eq!(threshold_score(&a, &b, 0.5001).unwrap().precision, 1.0);
    }

    #[test]
    fn test_invalid_tolerances() {
        let a = pts(&[[0.0, 0.0, 0.0]]);
        for tau in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                threshold_score(&a, &a, tau),
                Err(EvalError::InvalidTolerance { .. })
            ));
        }
    }

    #[test]
    fn test_duplicate_tolerances_rejected() {
        assert!(validate_tolerances(&[0.05, 0.1]).is_ok());
        assert!(matches!(
            validate_tolerances(&[0.05, 0.1, 0.05]),
            Err(EvalError::DuplicateTolerance { .. })
        ));
    }

    #[test]
    fn test_empty_sets_rejected() {
        let a = pts(&[[0.0, 0.0, 0.0]]);
        assert!(matches!(
            chamfer_distance(&a, &[]),
            Err(EvalError::DegenerateInput { .. })
        ));
    }
}
