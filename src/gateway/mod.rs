// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boundaries to the external collaborators: image distortion and
//! reconstruction backends

pub mod distort;
pub mod reconstruct;

pub use distort::ImageDistorter;
pub use reconstruct::{CommandReconstructor, ReconstructionError, SyntheticReconstructor};

use crate::error::{EvalError, Result};
use crate::evaluation::DistortionConfig;
use crate::geometry::PointSet;
use image::RgbImage;
use std::path::Path;

/// Image perturbation. Implementations must be pure: same input, same output.
pub trait Distorter {
    fn distort(&self, image: &RgbImage, config: &DistortionConfig) -> Result<RgbImage>;
}

/// Black-box image → point cloud reconstruction.
///
/// The returned points must also be persisted at `artifact`. An
/// implementation that produced no output must return an error rather than
/// an empty set.
pub trait Reconstructor {
    fn reconstruct(
        &self,
        image: &Path,
        artifact: &Path,
    ) -> std::result::Result<PointSet, ReconstructionError>;
}

/// Load an image as 8-bit RGB
pub fn load_rgb(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)
        .map_err(|e| EvalError::image(path, e))?
        .to_rgb8())
}

/// Save an RGB image, creating parent directories
pub fn save_rgb(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| EvalError::io(parent, e))?;
    }
    image.save(path).map_err(|e| EvalError::image(path, e))
}
