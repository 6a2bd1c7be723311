// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Evaluation harness: distortion sweeps, result documents, re-scoring

pub mod config;
pub mod dataset;
pub mod driver;
pub mod export;
pub mod reevaluate;
pub mod schema;
pub mod store;
pub mod sweep;

pub use config::{ReconstructorConfig, SweepConfig, DEFAULT_CONFIG_FILE};
pub use dataset::{select_images, ObjectEntry, ObjectRelations};
pub use driver::{Driver, ObjectEvent, ObjectFailure, ObjectStatus, RunSummary};
pub use export::{export_csv, write_csv, Level};
pub use reevaluate::{reevaluate, ReevaluationReport, SkippedDistortion, SkippedObject};
pub use schema::{
    validate_distortions, DistortionConfig, DistortionRecord, EvaluationRecord, ImageRecord,
    ObjectResult, ResultTree,
};
pub use store::{load_tree, save_tree, ResultStore};
pub use sweep::{artifact_path, working_dir, Sweep, SweepOutcome, SweepSettings, UnitFailure};
