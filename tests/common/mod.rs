// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Shared fixtures: tiny image datasets and a scripted reconstructor

#![allow(dead_code)]

use image::{Rgb, RgbImage};
use pointbench::evaluation::{ObjectEntry, ObjectRelations, SweepSettings};
use pointbench::gateway::{ReconstructionError, Reconstructor};
use pointbench::io::write_ply;
use pointbench::{DistortionConfig, PointSet};
use std::cell::Cell;
use std::path::{Path, PathBuf};

pub fn cube_corners() -> PointSet {
    let mut rows = Vec::new();
    for x in [0.0, 1.0] {
        for y in [0.0, 1.0] {
            for z in [0.0, 1.0] {
                rows.push([x, y, z]);
            }
        }
    }
    PointSet::from_rows(&rows)
}

/// Write a ground-truth cloud and `images` small PNGs for one object
pub fn create_object(root: &Path, object_id: &str, images: usize) -> ObjectEntry {
    let image_dir = root.join("images").join(object_id);
    std::fs::create_dir_all(&image_dir).unwrap();

    for i in 0..images {
        let img = RgbImage::from_fn(16, 16, |x, y| Rgb([(x * 16) as u8, (y * 16) as u8, (i * 40) as u8]));
        img.save(image_dir.join(format!("r_{:03}.png", i))).unwrap();
    }
    std::fs::write(image_dir.join("notes.txt"), "not an image").unwrap();

    let point_cloud = root.join("gt").join(format!("{}.ply", object_id));
    write_ply(&point_cloud, &cube_corners()).unwrap();

    ObjectEntry {
        point_cloud,
        images: image_dir,
    }
}

pub fn settings(output_root: &Path, distortions: Vec<DistortionConfig>, taus: Vec<f64>) -> SweepSettings {
    SweepSettings {
        distortions,
        taus,
        images_per_object: 1,
        keep_intermediate: false,
        output_root: output_root.to_path_buf(),
    }
}

/// Two groups: `apple` with two objects, `banana` with one
pub fn relations(root: &Path) -> ObjectRelations {
    let mut relations = ObjectRelations::new();
    relations.insert("apple", "apple_001", create_object(root, "apple_001", 2));
    relations.insert("apple", "apple_002", create_object(root, "apple_002", 2));
    relations.insert("banana", "banana_001", create_object(root, "banana_001", 2));
    relations
}

/// Returns the ground-truth cube, failing for images whose path contains `fail_on`
pub struct ScriptedReconstructor {
    pub fail_on: Option<String>,
}

impl ScriptedReconstructor {
    pub fn perfect() -> Self {
        Self { fail_on: None }
    }

    pub fn failing_on(key: &str) -> Self {
        Self {
            fail_on: Some(key.to_string()),
        }
    }
}

impl Reconstructor for ScriptedReconstructor {
    fn reconstruct(&self, image: &Path, artifact: &Path) -> Result<PointSet, ReconstructionError> {
        assert!(image.is_file(), "distorted image must exist during reconstruction");

        if let Some(key) = &self.fail_on {
            if image.to_string_lossy().contains(key.as_str()) {
                return Err(ReconstructionError::MissingOutput(PathBuf::from(artifact)));
            }
        }

        let cloud = cube_corners();
        write_ply(artifact, &cloud).map_err(|source| ReconstructionError::Persist {
            path: artifact.to_path_buf(),
            source,
        })?;
        Ok(cloud)
    }
}

/// Writes a different cloud for every call: the (1, 1, 1) corner of the cube
/// moves further along x with each reconstruction
pub struct DisplacingReconstructor {
    calls: Cell<usize>,
}

impl DisplacingReconstructor {
    pub fn new() -> Self {
        Self { calls: Cell::new(0) }
    }
}

impl Reconstructor for DisplacingReconstructor {
    fn reconstruct(&self, _image: &Path, artifact: &Path) -> Result<PointSet, ReconstructionError> {
        let call = self.calls.get() + 1;
        self.calls.set(call);

        let mut points = cube_corners().points().to_vec();
        if let Some(corner) = points.iter_mut().find(|p| p.x == 1.0 && p.y == 1.0 && p.z == 1.0) {
            corner.x += 0.1 * call as f64;
        }
        let cloud = PointSet::new(points);

        write_ply(artifact, &cloud).map_err(|source| ReconstructionError::Persist {
            path: artifact.to_path_buf(),
            source,
        })?;
        Ok(cloud)
    }
}
