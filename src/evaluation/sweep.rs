// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Sweep orchestrator: images × distortions × tolerances for one object

use super::dataset::select_images;
use super::schema::{
    validate_distortions, DistortionConfig, DistortionRecord, EvaluationRecord, ImageRecord,
    ObjectResult,
};
use crate::error::{EvalError, Result};
use crate::gateway::{load_rgb, save_rgb, Distorter, Reconstructor};
use crate::geometry::NormalizedPointSet;
use crate::io::read_ply;
use crate::metrics::{validate_tolerances, MetricEngine};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Per-object sweep parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SweepSettings {
    /// Evaluated in this order for every image
    pub distortions: Vec<DistortionConfig>,
    /// Evaluated in this order for every distortion
    pub taus: Vec<f64>,
    pub images_per_object: usize,
    /// Keep the distorted images instead of removing them after each unit
    pub keep_intermediate: bool,
    pub output_root: PathBuf,
}

/// Deterministic location of the reconstruction for one unit
pub fn artifact_path(
    root: &Path,
    object_id: &str,
    image_idx: usize,
    distortion: &DistortionConfig,
) -> PathBuf {
    root.join(object_id)
        .join(distortion.artifact_file_name(image_idx))
}

/// Scratch directory holding distorted images for one distortion
pub fn working_dir(root: &Path, object_id: &str, distortion: &DistortionConfig) -> PathBuf {
    root.join(object_id).join(distortion.artifact_key())
}

/// An (image, distortion) unit that produced no record
#[derive(Debug)]
pub struct UnitFailure {
    pub object_id: String,
    pub image_idx: usize,
    pub distortion: DistortionConfig,
    /// Set when the failure happened while scoring a specific tolerance
    pub tau: Option<f64>,
    pub error: EvalError,
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "object {} image {} ({})",
            self.object_id, self.image_idx, self.distortion
        )?;
        if let Some(tau) = self.tau {
            write!(f, " tau={}", tau)?;
        }
        write!(f, ": {}", self.error)
    }
}

/// Result of sweeping one object
#[derive(Debug)]
pub struct SweepOutcome {
    /// Records for every unit that completed
    pub result: ObjectResult,
    /// Units that were dropped, with their coordinates
    pub failures: Vec<UnitFailure>,
}

impl SweepOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives distortion → reconstruction → scoring for one object at a time
pub struct Sweep<'a> {
    settings: SweepSettings,
    engine: &'a MetricEngine,
    distorter: &'a dyn Distorter,
    reconstructor: &'a dyn Reconstructor,
}

impl<'a> Sweep<'a> {
    pub fn new(
        settings: SweepSettings,
        engine: &'a MetricEngine,
        distorter: &'a dyn Distorter,
        reconstructor: &'a dyn Reconstructor,
    ) -> Result<Self> {
        validate_tolerances(&settings.taus)?;
        validate_distortions(&settings.distortions)?;

        Ok(Self {
            settings,
            engine,
            distorter,
            reconstructor,
        })
    }

    pub fn settings(&self) -> &SweepSettings {
        &self.settings
    }

    /// Sweep one object.
    ///
    /// Errors here are object-level (unreadable or degenerate ground truth,
    /// unreadable image directory). Failures of single units are collected
    /// in [`SweepOutcome::failures`] and leave no record behind.
    pub fn run_object(
        &self,
        object_id: &str,
        image_dir: &Path,
        ground_truth_path: &Path,
    ) -> Result<SweepOutcome> {
        let ground_truth = read_ply(ground_truth_path)
            .map_err(|e| EvalError::ply(ground_truth_path, e))?
            .normalize()?;

        let images = select_images(image_dir, self.settings.images_per_object)?;
        if images.is_empty() {
            log::warn!("no images found for {} in {}", object_id, image_dir.display());
        }

        let object_dir = self.settings.output_root.join(object_id);
        std::fs::create_dir_all(&object_dir).map_err(|e| EvalError::io(&object_dir, e))?;

        let mut result = ObjectResult::new(object_id);
        let mut failures = Vec::new();

        for (image_idx, image_path) in images.iter().enumerate() {
            let mut record = ImageRecord {
                image_idx,
                original_image: image_path.clone(),
                distortions: Vec::new(),
            };

            for distortion in &self.settings.distortions {
                log::info!("{} image {}: {}", object_id, image_idx, distortion);

                let unit = self.run_unit(object_id, image_idx, image_path, distortion, &ground_truth);
                self.cleanup(object_id, distortion);

                match unit {
                    Ok(distortion_record) => record.distortions.push(distortion_record),
                    Err((tau, error)) => {
                        let failure = UnitFailure {
                            object_id: object_id.to_string(),
                            image_idx,
                            distortion: *distortion,
                            tau,
                            error,
                        };
                        log::error!("{}", failure);
                        failures.push(failure);
                    }
                }
            }

            result.images.push(record);
        }

        Ok(SweepOutcome { result, failures })
    }

    fn run_unit(
        &self,
        object_id: &str,
        image_idx: usize,
        image_path: &Path,
        distortion: &DistortionConfig,
        ground_truth: &NormalizedPointSet,
    ) -> std::result::Result<DistortionRecord, (Option<f64>, EvalError)> {
        let root = &self.settings.output_root;
        let distorted_image =
            working_dir(root, object_id, distortion).join(format!("img_{}.png", image_idx));

        let source = load_rgb(image_path).map_err(|e| (None, e))?;
        let distorted = self
            .distorter
            .distort(&source, distortion)
            .map_err(|e| (None, e))?;
        save_rgb(&distorted, &distorted_image).map_err(|e| (None, e))?;

        let artifact = artifact_path(root, object_id, image_idx, distortion);
        let start = Instant::now();
        let predicted = self
            .reconstructor
            .reconstruct(&distorted_image, &artifact)
            .map_err(|e| {
                (
                    None,
                    EvalError::ReconstructionFailure {
                        object_id: object_id.to_string(),
                        image_idx,
                        distortion: *distortion,
                        reason: e.to_string(),
                    },
                )
            })?;
        log::debug!(
            "reconstructed {} points in {:.2}s -> {}",
            predicted.len(),
            start.elapsed().as_secs_f64(),
            artifact.display()
        );

        let predicted = predicted.normalize().map_err(|e| (None, e))?;
        let evaluations = score_all(self.engine, &predicted, ground_truth, &self.settings.taus)
            .map_err(|e| (failed_tau(&e), e))?;

        Ok(DistortionRecord {
            distortion: *distortion,
            distorted_image,
            evaluations,
        })
    }

    fn cleanup(&self, object_id: &str, distortion: &DistortionConfig) {
        let dir = working_dir(&self.settings.output_root, object_id, distortion);
        if self.settings.keep_intermediate {
            log::debug!("keeping distorted images in {}", dir.display());
        } else if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                log::warn!("failed to remove {}: {}", dir.display(), e);
            }
        }
    }
}

/// One evaluation record per tolerance, in tolerance order
pub(crate) fn score_all(
    engine: &MetricEngine,
    predicted: &NormalizedPointSet,
    ground_truth: &NormalizedPointSet,
    taus: &[f64],
) -> Result<Vec<EvaluationRecord>> {
    let metrics = engine.evaluate_normalized_all(predicted, ground_truth, taus)?;
    Ok(taus
        .iter()
        .zip(metrics)
        .map(|(&tau, metrics)| EvaluationRecord { tau, metrics })
        .collect())
}

/// Tolerance a scoring error refers to, if any
fn failed_tau(error: &EvalError) -> Option<f64> {
    match error {
        EvalError::InvalidTolerance { tau } | EvalError::DuplicateTolerance { tau } => Some(*tau),
        _ => None,
    }
}
