// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Pointbench
//!
//! Robustness evaluation for single-image 3D reconstruction. Source images are
//! degraded with controlled blur, sensor noise and exposure changes, handed to
//! a reconstruction backend, and the resulting point clouds are scored against
//! ground truth with Chamfer distance and threshold precision/recall/F-score.

pub mod error;
pub mod evaluation;
pub mod gateway;
pub mod geometry;
pub mod io;
pub mod metrics;

pub use error::{EvalError, Result};
pub use evaluation::{DistortionConfig, ResultTree, Sweep, SweepConfig};
pub use geometry::{NormalizedPointSet, PointSet};
pub use metrics::{DeviceUsed, EvaluationMetrics, MetricEngine};

/// Score a predicted point set against ground truth at one tolerance
pub fn evaluate(predicted: &PointSet, ground_truth: &PointSet, tau: f64) -> Result<EvaluationMetrics> {
    MetricEngine::default().evaluate(predicted, ground_truth, tau)
}
