// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Object relation loading and deterministic image selection

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ground truth and image directory of one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    pub point_cloud: PathBuf,
    pub images: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    point_cloud: Option<PathBuf>,
    images: Option<PathBuf>,
}

/// group name → object id → entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectRelations {
    groups: BTreeMap<String, BTreeMap<String, ObjectEntry>>,
}

impl ObjectRelations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the relation file; entries missing a field are skipped
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| EvalError::io(path, e))?;
        let raw: BTreeMap<String, BTreeMap<String, RawEntry>> =
            serde_json::from_reader(std::io::BufReader::new(file))
                .map_err(|e| EvalError::json(path, e))?;

        let mut relations = Self::new();
        for (group, objects) in raw {
            for (object_id, entry) in objects {
                match (entry.point_cloud, entry.images) {
                    (Some(point_cloud), Some(images)) => relations.insert(
                        group.clone(),
                        object_id,
                        ObjectEntry {
                            point_cloud,
                            images,
                        },
                    ),
                    _ => log::warn!("missing fields for {}/{}, skipping", group, object_id),
                }
            }
        }
        Ok(relations)
    }

    pub fn insert(&mut self, group: impl Into<String>, object_id: impl Into<String>, entry: ObjectEntry) {
        self.groups
            .entry(group.into())
            .or_default()
            .insert(object_id.into(), entry);
    }

    pub fn get(&self, group: &str, object_id: &str) -> Option<&ObjectEntry> {
        self.groups.get(group)?.get(object_id)
    }

    /// Groups with their objects, both in sorted order
    pub fn groups(&self) -> impl Iterator<Item = (&str, &BTreeMap<String, ObjectEntry>)> {
        self.groups.iter().map(|(g, objects)| (g.as_str(), objects))
    }

    pub fn object_count(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }
}

/// First `count` `.png` files directly inside `dir`, sorted by file name
pub fn select_images(dir: &Path, count: usize) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| EvalError::io(dir, e.into()))?;
        let path = entry.path();
        let is_png = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
        if entry.file_type().is_file() && is_png {
            images.push(path.to_path_buf());
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    images.truncate(count);
    Ok(images)
}
