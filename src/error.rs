// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error taxonomy for the evaluation engine

use crate::evaluation::DistortionConfig;
use crate::io::PlyError;
use std::path::PathBuf;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors raised by the metric engine, gateways and sweep orchestrator
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Point set is empty or has zero spatial extent
    #[error("degenerate point set: {reason}")]
    DegenerateInput { reason: String },

    /// Tolerance must be finite and strictly positive
    #[error("invalid tolerance tau={tau}: must be finite and > 0")]
    InvalidTolerance { tau: f64 },

    /// The same tolerance was requested twice for one distortion
    #[error("duplicate tolerance tau={tau}")]
    DuplicateTolerance { tau: f64 },

    /// Distortion parameters outside their valid ranges
    #[error("invalid distortion {config}: {reason}")]
    InvalidDistortion {
        config: DistortionConfig,
        reason: String,
    },

    /// Two distortions in one sweep would share reconstruction artifacts
    #[error("distortions {first} and {second} share artifact key {key}")]
    ArtifactKeyCollision {
        first: DistortionConfig,
        second: DistortionConfig,
        key: String,
    },

    /// Reconstruction produced no usable output for one (image, distortion) unit
    #[error("reconstruction failed for object {object_id}, image {image_idx}, {distortion}: {reason}")]
    ReconstructionFailure {
        object_id: String,
        image_idx: usize,
        distortion: DistortionConfig,
        reason: String,
    },

    /// Persisted reconstruction artifact missing during re-evaluation
    #[error("artifact not found for object {object_id}, image {image_idx}, {distortion}: {}", path.display())]
    ArtifactNotFound {
        object_id: String,
        image_idx: usize,
        distortion: DistortionConfig,
        path: PathBuf,
    },

    /// Both execution contexts failed for one metric computation
    #[error("metric computation failed on primary ({primary}) and fallback ({fallback}) contexts")]
    AccelerationContextFailure { primary: String, fallback: String },

    /// Object referenced by a result document is absent from the relations
    #[error("object {object_id} not present in group {group} of the relation file")]
    UnknownObject { group: String, object_id: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error on {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("image error on {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("point cloud error on {}: {source}", path.display())]
    Ply {
        path: PathBuf,
        #[source]
        source: PlyError,
    },
}

impl EvalError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn image(path: impl Into<PathBuf>, source: image::ImageError) -> Self {
        Self::Image {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn ply(path: impl Into<PathBuf>, source: PlyError) -> Self {
        Self::Ply {
            path: path.into(),
            source,
        }
    }
}
