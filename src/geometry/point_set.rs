// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Point sets and scale/position normalization

use crate::error::{EvalError, Result};
use nalgebra::{Point3, Vector3};

/// Unordered collection of 3D points (N×3)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointSet {
    points: Vec<Point3<f64>>,
}

impl PointSet {
    pub fn new(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    pub fn from_rows(rows: &[[f64; 3]]) -> Self {
        rows.iter().map(|r| Point3::new(r[0], r[1], r[2])).collect()
    }

    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Mean of all points, `None` when empty
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }
        let sum = self
            .points
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords);
        Some(Point3::from(sum / self.points.len() as f64))
    }

    /// Center on the centroid and scale so the farthest point has norm 1.
    ///
    /// Returns a new set; `self` is left untouched.
    pub fn normalize(&self) -> Result<NormalizedPointSet> {
        let centroid = self.centroid().ok_or_else(|| EvalError::DegenerateInput {
            reason: "point set is empty".to_string(),
        })?;

        let centered: Vec<Vector3<f64>> = self.points.iter().map(|p| p - centroid).collect();
        let scale = centered.iter().map(|v| v.norm()).fold(0.0_f64, f64::max);

        if !scale.is_finite() || scale <= 0.0 {
            return Err(EvalError::DegenerateInput {
                reason: format!(
                    "{} point(s) with zero or non-finite extent (max norm {})",
                    self.points.len(),
                    scale
                ),
            });
        }

        Ok(NormalizedPointSet {
            points: centered.into_iter().map(|v| Point3::from(v / scale)).collect(),
            centroid,
            scale,
        })
    }
}

impl FromIterator<Point3<f64>> for PointSet {
    fn from_iter<I: IntoIterator<Item = Point3<f64>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Point set centered at the origin with maximum point norm 1
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPointSet {
    points: Vec<Point3<f64>>,
    centroid: Point3<f64>,
    scale: f64,
}

impl NormalizedPointSet {
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Centroid of the source set before normalization
    pub fn centroid(&self) -> Point3<f64> {
        self.centroid
    }

    /// Divisor applied after centering
    pub fn scale(&self) -> f64 {
        self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_normalize_centers_and_scales() {
        let set = PointSet::from_rows(&[[1.0, 1.0, 1.0], [3.0, 1.0, 1.0], [2.0, 4.0, 1.0]]);
        let normalized = set.normalize().unwrap();

        let mean = normalized
            .points()
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords)
            / normalized.len() as f64;
        assert_relative_eq!(mean.norm(), 0.0, epsilon = 1e-12);

        let max_norm = normalized
            .points()
            .iter()
            .map(|p| p.coords.norm())
            .fold(0.0, f64::max);
        assert_relative_eq!(max_norm, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_does_not_mutate_source() {
        let set = PointSet::from_rows(&[[10.0, 0.0, 0.0], [12.0, 0.0, 0.0]]);
        let before = set.clone();
        let _ = set.normalize().unwrap();
        assert_eq!(set, before);
    }

    #[test]
    fn test_normalize_empty_is_degenerate() {
        let err = PointSet::default().normalize().unwrap_err();
        assert!(matches!(err, EvalError::DegenerateInput { .. }));
    }

    #[test]
    fn test_normalize_coincident_is_degenerate() {
        let set = PointSet::from_rows(&[[2.0, 2.0, 2.0]; 4]);
        let err = set.normalize().unwrap_err();
        assert!(matches!(err, EvalError::DegenerateInput { .. }));
    }
}
