// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Execution contexts for nearest-neighbour computation
//!
//! The primary context materializes the pairwise matrix and fills it with
//! rayon. The fallback context streams over the point pairs on the calling
//! thread and never allocates the matrix. Both produce bit-identical output.

use super::distance::{squared_distance, NearestDistances};
use nalgebra::{DMatrix, Point3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which context produced a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceUsed {
    Primary,
    Fallback,
}

impl fmt::Display for DeviceUsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceUsed::Primary => write!(f, "primary"),
            DeviceUsed::Fallback => write!(f, "fallback"),
        }
    }
}

/// Failure specific to one execution context
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("pairwise matrix {rows}x{cols} needs {required} bytes, budget is {budget} bytes")]
    BudgetExceeded {
        rows: usize,
        cols: usize,
        required: usize,
        budget: usize,
    },

    #[error("allocation of {bytes} bytes failed")]
    AllocationFailed { bytes: usize },

    #[error("context unavailable: {0}")]
    Unavailable(String),

    /// Input rejected before any context-specific work
    #[error("{0}")]
    Input(String),
}

/// A place where nearest-neighbour distances can be computed
pub trait ComputeContext: Send + Sync {
    fn device(&self) -> DeviceUsed;

    fn nearest(
        &self,
        a: &[Point3<f64>],
        b: &[Point3<f64>],
    ) -> Result<NearestDistances, ContextError>;
}

/// Data-parallel context with a bounded pairwise matrix
pub struct ParallelContext {
    memory_budget_bytes: usize,
}

impl ParallelContext {
    pub fn new(memory_budget_bytes: usize) -> Self {
        Self {
            memory_budget_bytes,
        }
    }

    pub fn memory_budget_bytes(&self) -> usize {
        self.memory_budget_bytes
    }

    fn pairwise(&self, a: &[Point3<f64>], b: &[Point3<f64>]) -> Result<DMatrix<f64>, ContextError> {
        let (rows, cols) = (a.len(), b.len());
        let cells = rows
            .checked_mul(cols)
            .ok_or(ContextError::AllocationFailed { bytes: usize::MAX })?;
        let required = cells.saturating_mul(std::mem::size_of::<f64>());

        if required > self.memory_budget_bytes {
            return Err(ContextError::BudgetExceeded {
                rows,
                cols,
                required,
                budget: self.memory_budget_bytes,
            });
        }

        let mut data: Vec<f64> = Vec::new();
        data.try_reserve_exact(cells)
            .map_err(|_| ContextError::AllocationFailed { bytes: required })?;
        data.resize(cells, 0.0);

        // Column-major: column j holds the distances from every a to b[j]
        data.par_chunks_mut(rows)
            .zip(b.par_iter())
            .for_each(|(column, pb)| {
                for (cell, pa) in column.iter_mut().zip(a) {
                    *cell = squared_distance(pa, pb);
                }
            });

        Ok(DMatrix::from_vec(rows, cols, data))
    }
}

impl ComputeContext for ParallelContext {
    fn device(&self) -> DeviceUsed {
        DeviceUsed::Primary
    }

    fn nearest(
        &self,
        a: &[Point3<f64>],
        b: &[Point3<f64>],
    ) -> Result<NearestDistances, ContextError> {
        if a.is_empty() || b.is_empty() {
            return Err(ContextError::Input(
                "cannot compare an empty point set".to_string(),
            ));
        }

        let matrix = self.pairwise(a, b)?;

        let a_to_b = (0..matrix.nrows())
            .into_par_iter()
            .map(|i| matrix.row(i).iter().copied().fold(f64::INFINITY, f64::min))
            .collect();
        let b_to_a = (0..matrix.ncols())
            .into_par_iter()
            .map(|j| matrix.column(j).iter().copied().fold(f64::INFINITY, f64::min))
            .collect();

        Ok(NearestDistances { a_to_b, b_to_a })
    }
}

/// Single-threaded streaming context, always available
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialContext;

impl ComputeContext for SequentialContext {
    fn device(&self) -> DeviceUsed {
        DeviceUsed::Fallback
    }

    fn nearest(
        &self,
        a: &[Point3<f64>],
        b: &[Point3<f64>],
    ) -> Result<NearestDistances, ContextError> {
        NearestDistances::compute(a, b).map_err(|e| ContextError::Input(e.to_string()))
    }
}
