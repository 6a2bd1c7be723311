// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Sweep configuration: TOML file, environment overrides, defaults

use super::schema::{validate_distortions, DistortionConfig};
use super::sweep::SweepSettings;
use crate::gateway::{CommandReconstructor, Reconstructor, SyntheticReconstructor};
use crate::metrics::validate_tolerances;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "pointbench.toml";

/// Which reconstruction backend to drive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconstructorConfig {
    /// Random points, for dry runs of the pipeline
    Synthetic { points: usize, seed: u64 },
    /// External program; `{input}`/`{output}` are substituted in `args`
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl ReconstructorConfig {
    pub fn build(&self) -> Box<dyn Reconstructor> {
        match self {
            ReconstructorConfig::Synthetic { points, seed } => {
                Box::new(SyntheticReconstructor::new(*points, *seed))
            }
            ReconstructorConfig::Command { program, args } => {
                Box::new(CommandReconstructor::new(program.clone(), args.clone()))
            }
        }
    }
}

impl Default for ReconstructorConfig {
    fn default() -> Self {
        ReconstructorConfig::Synthetic {
            points: 512,
            seed: 0,
        }
    }
}

/// Full configuration of a sweep run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Relation file: group → object → {point_cloud, images}
    pub relations_path: PathBuf,
    /// Root for reconstruction artifacts and distorted images
    pub output_root: PathBuf,
    /// Result document; timestamped under `output_root` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_path: Option<PathBuf>,
    /// Tolerances, in evaluation order
    pub taus: Vec<f64>,
    /// Objects taken from the start of each group, 0 for all
    pub objects_per_group: usize,
    /// Images taken from each object's directory
    pub images_per_object: usize,
    /// Keep distorted images after reconstruction
    pub keep_distorted: bool,
    /// Prepend the undistorted configuration unless it already leads the list
    pub prepend_baseline: bool,
    /// Skip objects already present in an existing result document
    pub resume: bool,
    /// Memory budget for the primary metric context
    pub memory_budget_mb: usize,
    /// Seed of the sensor-noise generator
    pub noise_seed: u64,
    /// Distortions, in evaluation order
    pub distortions: Vec<DistortionConfig>,
    pub reconstructor: ReconstructorConfig,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            relations_path: PathBuf::from("datasets/object_relations.json"),
            output_root: PathBuf::from("outputs"),
            results_path: None,
            taus: vec![0.05, 0.075, 0.1],
            objects_per_group: 1,
            images_per_object: 1,
            keep_distorted: false,
            prepend_baseline: false,
            resume: true,
            memory_budget_mb: 1024,
            noise_seed: 0,
            distortions: vec![
                DistortionConfig::new(0.0, 0.0, 1.0),
                DistortionConfig::new(4.0, 0.0, 1.0),
                DistortionConfig::new(10.0, 0.0, 1.0),
                DistortionConfig::new(0.0, 60.0, 1.0),
                DistortionConfig::new(0.0, 150.0, 1.0),
                DistortionConfig::new(0.0, 0.0, 2.5),
                DistortionConfig::new(0.0, 0.0, 7.0),
            ],
            reconstructor: ReconstructorConfig::default(),
        }
    }
}

impl SweepConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: SweepConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load from `path` (or `pointbench.toml` if present) with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        if let Ok(relations) = std::env::var("POINTBENCH_RELATIONS") {
            config.relations_path = PathBuf::from(relations);
        }

        if let Ok(output_root) = std::env::var("POINTBENCH_OUTPUT_ROOT") {
            config.output_root = PathBuf::from(output_root);
        }

        if let Ok(results) = std::env::var("POINTBENCH_RESULTS") {
            config.results_path = Some(PathBuf::from(results));
        }

        if let Ok(budget) = std::env::var("POINTBENCH_MEMORY_BUDGET_MB") {
            config.memory_budget_mb = budget
                .parse()
                .with_context(|| format!("Invalid POINTBENCH_MEMORY_BUDGET_MB: {}", budget))?;
        }

        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Reject configurations that could only fail later
    pub fn validate(&self) -> Result<()> {
        if self.taus.is_empty() {
            bail!("At least one tolerance is required");
        }
        validate_tolerances(&self.taus)?;

        if self.distortions.is_empty() && !self.prepend_baseline {
            bail!("At least one distortion configuration is required");
        }
        validate_distortions(&self.resolved_distortions())?;

        if self.images_per_object == 0 {
            bail!("images_per_object must be at least 1");
        }
        Ok(())
    }

    /// Distortions in evaluation order, baseline first when requested
    pub fn resolved_distortions(&self) -> Vec<DistortionConfig> {
        let mut distortions = self.distortions.clone();
        let baseline_leads = distortions.first().is_some_and(DistortionConfig::is_identity);
        if self.prepend_baseline && !baseline_leads {
            distortions.insert(0, DistortionConfig::IDENTITY);
        }
        distortions
    }

    /// Configured result path, or a fresh timestamped one under `output_root`
    pub fn results_path(&self) -> PathBuf {
        self.results_path.clone().unwrap_or_else(|| {
            let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
            self.output_root
                .join(format!("pipeline_results_{}.json", timestamp))
        })
    }

    pub fn memory_budget_bytes(&self) -> usize {
        self.memory_budget_mb.saturating_mul(1024 * 1024)
    }

    /// Per-object parameters handed to the sweep orchestrator
    pub fn sweep_settings(&self) -> SweepSettings {
        SweepSettings {
            distortions: self.resolved_distortions(),
            taus: self.taus.clone(),
            images_per_object: self.images_per_object,
            keep_intermediate: self.keep_distorted,
            output_root: self.output_root.clone(),
        }
    }
}
