// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Flat CSV export of a result document for statistics tools

use super::schema::ResultTree;
use crate::error::{EvalError, Result};
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Categorical bucket of a distortion parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    None,
    Low,
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::None => write!(f, "none"),
            Level::Low => write!(f, "low"),
            Level::High => write!(f, "high"),
        }
    }
}

pub fn blur_level(blur: f64) -> Level {
    bucket(blur, 0.0, 5.0)
}

pub fn noise_level(noise: f64) -> Level {
    bucket(noise, 0.0, 100.0)
}

pub fn exposure_level(exposure: f64) -> Level {
    bucket(exposure, 1.0, 4.0)
}

fn bucket(value: f64, identity: f64, low_max: f64) -> Level {
    if value == identity {
        Level::None
    } else if value <= low_max {
        Level::Low
    } else {
        Level::High
    }
}

/// One row per (object, image, distortion)
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub group: String,
    pub object_id: String,
    pub image_idx: usize,
    pub blur: Level,
    pub exposure: Level,
    pub noise: Level,
    pub chamfer_distance: f64,
    /// Aligned with the tau columns; `None` where that tau was not evaluated
    pub fscores: Vec<Option<f64>>,
}

/// Every distinct tau in the document, ascending
pub fn distinct_taus(tree: &ResultTree) -> Vec<f64> {
    let mut taus: Vec<f64> = tree
        .objects()
        .flat_map(|(_, object)| &object.images)
        .flat_map(|image| &image.distortions)
        .flat_map(|distortion| &distortion.evaluations)
        .map(|evaluation| evaluation.tau)
        .collect();
    taus.sort_by(f64::total_cmp);
    taus.dedup();
    taus
}

/// Tau columns and rows; distortions without evaluations are left out
pub fn export_rows(tree: &ResultTree) -> (Vec<f64>, Vec<ExportRow>) {
    let taus = distinct_taus(tree);
    let mut rows = Vec::new();

    for (group, object) in tree.objects() {
        for image in &object.images {
            for record in &image.distortions {
                let Some(first) = record.evaluations.first() else {
                    continue;
                };

                let fscores = taus
                    .iter()
                    .map(|tau| {
                        record
                            .evaluations
                            .iter()
                            .find(|e| e.tau == *tau)
                            .map(|e| e.metrics.fscore)
                    })
                    .collect();

                rows.push(ExportRow {
                    group: group.to_string(),
                    object_id: object.object_id.clone(),
                    image_idx: image.image_idx,
                    blur: blur_level(record.distortion.blur),
                    exposure: exposure_level(record.distortion.exposure),
                    noise: noise_level(record.distortion.noise),
                    chamfer_distance: first.metrics.chamfer_distance,
                    fscores,
                });
            }
        }
    }

    (taus, rows)
}

/// Write the CSV table to `writer`, returning the number of data rows
pub fn write_csv<W: Write>(tree: &ResultTree, writer: W) -> csv::Result<usize> {
    let (taus, rows) = export_rows(tree);
    let mut csv = csv::Writer::from_writer(writer);

    let mut header: Vec<String> = [
        "group",
        "object",
        "image",
        "blurLevel",
        "exposureLevel",
        "noiseLevel",
        "chamferDistance",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    header.extend(taus.iter().map(|tau| format!("F{}", tau)));
    csv.write_record(&header)?;

    for row in &rows {
        let mut record = vec![
            row.group.clone(),
            row.object_id.clone(),
            row.image_idx.to_string(),
            row.blur.to_string(),
            row.exposure.to_string(),
            row.noise.to_string(),
            row.chamfer_distance.to_string(),
        ];
        record.extend(
            row.fscores
                .iter()
                .map(|f| f.map(|v| v.to_string()).unwrap_or_default()),
        );
        csv.write_record(&record)?;
    }

    csv.flush()?;
    Ok(rows.len())
}

/// Write the CSV table to `path`
pub fn export_csv(tree: &ResultTree, path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path).map_err(|e| EvalError::io(path, e))?;
    write_csv(tree, file).map_err(|source| EvalError::Csv {
        path: path.to_path_buf(),
        source,
    })
}
