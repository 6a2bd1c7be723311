// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Re-scoring persisted reconstructions at new tolerances

use super::dataset::ObjectRelations;
use super::schema::{DistortionConfig, DistortionRecord, ResultTree};
use super::sweep::{artifact_path, score_all};
use crate::error::{EvalError, Result};
use crate::geometry::NormalizedPointSet;
use crate::io::read_ply;
use crate::metrics::{validate_tolerances, MetricEngine};
use std::path::Path;

/// A distortion whose evaluations were left as they were
#[derive(Debug)]
pub struct SkippedDistortion {
    pub group: String,
    pub object_id: String,
    pub image_idx: usize,
    pub distortion: DistortionConfig,
    pub error: EvalError,
}

/// An object whose records were left as they were
#[derive(Debug)]
pub struct SkippedObject {
    pub group: String,
    pub object_id: String,
    pub error: EvalError,
}

/// What a re-evaluation pass touched
#[derive(Debug, Default)]
pub struct ReevaluationReport {
    /// Distortion records whose evaluations were replaced
    pub rescored: usize,
    pub skipped_distortions: Vec<SkippedDistortion>,
    pub skipped_objects: Vec<SkippedObject>,
}

impl ReevaluationReport {
    pub fn is_complete(&self) -> bool {
        self.skipped_distortions.is_empty() && self.skipped_objects.is_empty()
    }
}

/// Replace every distortion's evaluations with fresh ones at `taus`.
///
/// Artifacts are located at `artifact_root/<object_id>/<artifact file name>`
/// using the stored `image_idx` and `distortion`. Distortions whose artifact
/// is missing or unusable keep their previous evaluations and are listed in
/// the report. The input tree is not modified.
pub fn reevaluate(
    tree: &ResultTree,
    taus: &[f64],
    artifact_root: &Path,
    relations: &ObjectRelations,
    engine: &MetricEngine,
) -> Result<(ResultTree, ReevaluationReport)> {
    validate_tolerances(taus)?;

    let mut updated = tree.clone();
    let mut report = ReevaluationReport::default();

    for (group, object) in updated.objects_mut() {
        let object_id = object.object_id.clone();
        let ground_truth = match load_ground_truth(relations, group, &object_id) {
            Ok(gt) => gt,
            Err(error) => {
                log::warn!("skipping {}/{}: {}", group, object_id, error);
                report.skipped_objects.push(SkippedObject {
                    group: group.to_string(),
                    object_id,
                    error,
                });
                continue;
            }
        };

        for image in &mut object.images {
            let image_idx = image.image_idx;
            for record in &mut image.distortions {
                match rescore(record, &object_id, image_idx, &ground_truth, taus, artifact_root, engine) {
                    Ok(()) => report.rescored += 1,
                    Err(error) => {
                        log::warn!(
                            "{}/{} image {} ({}) not re-evaluated: {}",
                            group,
                            object_id,
                            image_idx,
                            record.distortion,
                            error
                        );
                        report.skipped_distortions.push(SkippedDistortion {
                            group: group.to_string(),
                            object_id: object_id.clone(),
                            image_idx,
                            distortion: record.distortion,
                            error,
                        });
                    }
                }
            }
        }
    }

    log::info!(
        "re-evaluated {} distortion record(s), skipped {} record(s) and {} object(s)",
        report.rescored,
        report.skipped_distortions.len(),
        report.skipped_objects.len()
    );

    Ok((updated, report))
}

fn load_ground_truth(
    relations: &ObjectRelations,
    group: &str,
    object_id: &str,
) -> Result<NormalizedPointSet> {
    let entry = relations
        .get(group, object_id)
        .ok_or_else(|| EvalError::UnknownObject {
            group: group.to_string(),
            object_id: object_id.to_string(),
        })?;

    read_ply(&entry.point_cloud)
        .map_err(|e| EvalError::ply(&entry.point_cloud, e))?
        .normalize()
}

fn rescore(
    record: &mut DistortionRecord,
    object_id: &str,
    image_idx: usize,
    ground_truth: &NormalizedPointSet,
    taus: &[f64],
    artifact_root: &Path,
    engine: &MetricEngine,
) -> Result<()> {
    let path = artifact_path(artifact_root, object_id, image_idx, &record.distortion);
    if !path.is_file() {
        return Err(EvalError::ArtifactNotFound {
            object_id: object_id.to_string(),
            image_idx,
            distortion: record.distortion,
            path,
        });
    }

    let predicted = read_ply(&path)
        .map_err(|e| EvalError::ply(&path, e))?
        .normalize()?;
    let evaluations = score_all(engine, &predicted, ground_truth, taus)?;

    // Replace, never merge
    record.evaluations = evaluations;
    Ok(())
}
