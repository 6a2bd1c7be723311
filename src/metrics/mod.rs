// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometric metric engine: Chamfer distance and threshold F-score

pub mod context;
pub mod distance;

pub use context::{ComputeContext, ContextError, DeviceUsed, ParallelContext, SequentialContext};
pub use distance::{
    chamfer_distance, pairwise_squared_distance, threshold_score, validate_tolerance,
    validate_tolerances, NearestDistances, ThresholdScore,
};

use crate::error::{EvalError, Result};
use crate::geometry::{NormalizedPointSet, PointSet};
use serde::{Deserialize, Serialize};

/// Default memory budget for the primary context's pairwise matrix (1 GiB)
pub const DEFAULT_MEMORY_BUDGET_BYTES: usize = 1 << 30;

/// Metrics for one (prediction, ground truth, tau) comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub chamfer_distance: f64,
    pub precision: f64,
    pub recall: f64,
    pub fscore: f64,
    pub device_used: DeviceUsed,
}

/// Computes metrics on a primary context with a one-shot fallback
pub struct MetricEngine {
    primary: Box<dyn ComputeContext>,
    fallback: Box<dyn ComputeContext>,
}

impl MetricEngine {
    pub fn new(primary: Box<dyn ComputeContext>, fallback: Box<dyn ComputeContext>) -> Self {
        Self { primary, fallback }
    }

    /// Parallel primary context bounded by `bytes`, sequential fallback
    pub fn with_memory_budget(bytes: usize) -> Self {
        Self::new(
            Box::new(ParallelContext::new(bytes)),
            Box::new(SequentialContext),
        )
    }

    /// Normalize both sets, then score them at `tau`
    pub fn evaluate(
        &self,
        predicted: &PointSet,
        ground_truth: &PointSet,
        tau: f64,
    ) -> Result<EvaluationMetrics> {
        validate_tolerance(tau)?;
        let predicted = predicted.normalize()?;
        let ground_truth = ground_truth.normalize()?;
        self.evaluate_normalized(&predicted, &ground_truth, tau)
    }

    /// Score already-normalized sets at `tau`
    pub fn evaluate_normalized(
        &self,
        predicted: &NormalizedPointSet,
        ground_truth: &NormalizedPointSet,
        tau: f64,
    ) -> Result<EvaluationMetrics> {
        validate_tolerance(tau)?;
        let (nearest, device_used) = self.nearest(predicted, ground_truth)?;
        let score = nearest.threshold_score(tau)?;

        Ok(EvaluationMetrics {
            chamfer_distance: nearest.chamfer(),
            precision: score.precision,
            recall: score.recall,
            fscore: score.fscore,
            device_used,
        })
    }

    /// Score already-normalized sets at every tolerance in `taus`.
    ///
    /// The nearest-neighbour pass runs once and is thresholded per tolerance,
    /// so every returned entry carries the same `device_used`.
    pub fn evaluate_normalized_all(
        &self,
        predicted: &NormalizedPointSet,
        ground_truth: &NormalizedPointSet,
        taus: &[f64],
    ) -> Result<Vec<EvaluationMetrics>> {
        validate_tolerances(taus)?;
        let (nearest, device_used) = self.nearest(predicted, ground_truth)?;
        let chamfer_distance = nearest.chamfer();

        taus.iter()
            .map(|&tau| {
                let score = nearest.threshold_score(tau)?;
                Ok(EvaluationMetrics {
                    chamfer_distance,
                    precision: score.precision,
                    recall: score.recall,
                    fscore: score.fscore,
                    device_used,
                })
            })
            .collect()
    }

    fn nearest(
        &self,
        predicted: &NormalizedPointSet,
        ground_truth: &NormalizedPointSet,
    ) -> Result<(NearestDistances, DeviceUsed)> {
        let (a, b) = (predicted.points(), ground_truth.points());

        let primary_err = match self.primary.nearest(a, b) {
            Ok(nearest) => return Ok((nearest, self.primary.device())),
            Err(ContextError::Input(reason)) => return Err(EvalError::DegenerateInput { reason }),
            Err(e) => e,
        };

        log::warn!(
            "{} context failed ({}), retrying on {} context",
            self.primary.device(),
            primary_err,
            self.fallback.device()
        );

        match self.fallback.nearest(a, b) {
            Ok(nearest) => Ok((nearest, self.fallback.device())),
            Err(ContextError::Input(reason)) => Err(EvalError::DegenerateInput { reason }),
            Err(fallback_err) => Err(EvalError::AccelerationContextFailure {
                primary: primary_err.to_string(),
                fallback: fallback_err.to_string(),
            }),
        }
    }
}

impl Default for MetricEngine {
    fn default() -> Self {
        Self::with_memory_budget(DEFAULT_MEMORY_BUDGET_BYTES)
    }
}
