// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Hierarchical result schema: group → object → image → distortion → tau

use crate::error::{EvalError, Result};
use crate::metrics::EvaluationMetrics;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Image degradation parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistortionConfig {
    /// Gaussian blur standard deviation in pixels
    pub blur: f64,
    /// Standard deviation of additive Gaussian noise, 8-bit intensity units
    pub noise: f64,
    /// Multiplicative brightness factor
    pub exposure: f64,
}

impl DistortionConfig {
    pub const IDENTITY: Self = Self {
        blur: 0.0,
        noise: 0.0,
        exposure: 1.0,
    };

    pub fn new(blur: f64, noise: f64, exposure: f64) -> Self {
        Self {
            blur,
            noise,
            exposure,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    pub fn validate(&self) -> Result<()> {
        let reason = if !(self.blur.is_finite() && self.blur >= 0.0) {
            "blur must be finite and >= 0"
        } else if !(self.noise.is_finite() && self.noise >= 0.0) {
            "noise must be finite and >= 0"
        } else if !(self.exposure.is_finite() && self.exposure > 0.0) {
            "exposure must be finite and > 0"
        } else {
            return Ok(());
        };

        Err(EvalError::InvalidDistortion {
            config: *self,
            reason: reason.to_string(),
        })
    }

    /// Canonical fixed-precision key, stable across `0` vs `0.0` spellings.
    ///
    /// Adding `0.0` folds `-0.0` into `0.0`. Configs closer than the key
    /// precision share a key; [`validate_distortions`] rejects such lists.
    pub fn artifact_key(&self) -> String {
        format!(
            "blur{:.3}_noise{:.3}_exp{:.3}",
            self.blur + 0.0,
            self.noise + 0.0,
            self.exposure + 0.0
        )
    }

    /// File name of the reconstruction artifact for one image under this config
    pub fn artifact_file_name(&self, image_idx: usize) -> String {
        format!("img{}_{}.ply", image_idx, self.artifact_key())
    }
}

/// Validate every config and require a distinct artifact key for each one
pub fn validate_distortions(distortions: &[DistortionConfig]) -> Result<()> {
    let mut seen: BTreeMap<String, DistortionConfig> = BTreeMap::new();
    for distortion in distortions {
        distortion.validate()?;
        let key = distortion.artifact_key();
        if let Some(first) = seen.get(&key) {
            return Err(EvalError::ArtifactKeyCollision {
                first: *first,
                second: *distortion,
                key,
            });
        }
        seen.insert(key, *distortion);
    }
    Ok(())
}

impl fmt::Display for DistortionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blur={} noise={} exposure={}",
            self.blur, self.noise, self.exposure
        )
    }
}

/// Metrics at a single tolerance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub tau: f64,
    pub metrics: EvaluationMetrics,
}

/// All tolerances evaluated for one distortion of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistortionRecord {
    pub distortion: DistortionConfig,
    pub distorted_image: PathBuf,
    pub evaluations: Vec<EvaluationRecord>,
}

/// All distortions applied to one source image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub image_idx: usize,
    pub original_image: PathBuf,
    pub distortions: Vec<DistortionRecord>,
}

/// Sweep output for one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectResult {
    pub object_id: String,
    pub images: Vec<ImageRecord>,
}

impl ObjectResult {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            images: Vec::new(),
        }
    }

    /// Number of (image, distortion) units with recorded evaluations
    pub fn unit_count(&self) -> usize {
        self.images.iter().map(|img| img.distortions.len()).sum()
    }
}

/// group name → object id → result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultTree {
    groups: BTreeMap<String, BTreeMap<String, ObjectResult>>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an object's result under `group`
    pub fn insert(&mut self, group: impl Into<String>, result: ObjectResult) {
        self.groups
            .entry(group.into())
            .or_default()
            .insert(result.object_id.clone(), result);
    }

    pub fn get(&self, group: &str, object_id: &str) -> Option<&ObjectResult> {
        self.groups.get(group)?.get(object_id)
    }

    pub fn contains(&self, group: &str, object_id: &str) -> bool {
        self.get(group, object_id).is_some()
    }

    /// Make sure a group key exists even before its first object completes
    pub fn ensure_group(&mut self, group: impl Into<String>) {
        self.groups.entry(group.into()).or_default();
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// (group, object) pairs in sorted order
    pub fn objects(&self) -> impl Iterator<Item = (&str, &ObjectResult)> {
        self.groups.iter().flat_map(|(group, objects)| {
            objects.values().map(move |result| (group.as_str(), result))
        })
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = (&str, &mut ObjectResult)> {
        self.groups.iter_mut().flat_map(|(group, objects)| {
            objects
                .values_mut()
                .map(move |result| (group.as_str(), result))
        })
    }

    /// Total number of objects across all groups
    pub fn len(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
