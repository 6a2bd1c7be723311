// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Blur, exposure and sensor-noise degradation of RGB images

use super::Distorter;
use crate::error::{EvalError, Result};
use crate::evaluation::DistortionConfig;
use image::{imageops, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Normal;

/// Applies blur, then exposure, then additive Gaussian noise
#[derive(Debug, Clone, Copy)]
pub struct ImageDistorter {
    seed: u64,
}

impl ImageDistorter {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn noise_rng(&self, config: &DistortionConfig) -> StdRng {
        StdRng::seed_from_u64(self.seed ^ config.noise.to_bits().rotate_left(17))
    }
}

impl Default for ImageDistorter {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Distorter for ImageDistorter {
    fn distort(&self, image: &RgbImage, config: &DistortionConfig) -> Result<RgbImage> {
        config.validate()?;

        let mut out = if config.blur > 0.0 {
            imageops::blur(image, config.blur as f32)
        } else {
            image.clone()
        };

        if config.exposure != 1.0 {
            for value in out.iter_mut() {
                *value = (*value as f64 * config.exposure).round().clamp(0.0, 255.0) as u8;
            }
        }

        if config.noise > 0.0 {
            let normal = Normal::new(0.0, config.noise).map_err(|e| {
                EvalError::InvalidDistortion {
                    config: *config,
                    reason: e.to_string(),
                }
            })?;
            let mut rng = self.noise_rng(config);
            for value in out.iter_mut() {
                let noisy: f64 = *value as f64 + rng.sample(normal);
                // Truncate after clamping, as an 8-bit cast would
                *value = noisy.clamp(0.0, 255.0) as u8;
            }
        }

        Ok(out)
    }
}
