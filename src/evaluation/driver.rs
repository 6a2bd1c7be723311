// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Run driver: sweeps every selected object and checkpoints after each one

use super::dataset::ObjectRelations;
use super::schema::ResultTree;
use super::store::ResultStore;
use super::sweep::{Sweep, UnitFailure};
use crate::error::{EvalError, Result};
use std::path::PathBuf;

/// An object whose sweep failed as a whole
#[derive(Debug)]
pub struct ObjectFailure {
    pub group: String,
    pub object_id: String,
    pub error: EvalError,
}

/// How a single object ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectStatus {
    /// Swept and persisted; `failed_units` units produced no record
    Completed { units: usize, failed_units: usize },
    /// Already present in the resumed document
    Resumed,
    Failed,
}

/// Progress notification emitted after each object
#[derive(Debug, Clone, Copy)]
pub struct ObjectEvent<'a> {
    pub group: &'a str,
    pub object_id: &'a str,
    /// 1-based position among the selected objects
    pub position: usize,
    pub total: usize,
    pub status: ObjectStatus,
}

/// Outcome of a whole run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub results_path: PathBuf,
    pub objects_completed: usize,
    pub objects_resumed: usize,
    pub units_evaluated: usize,
    pub object_failures: Vec<ObjectFailure>,
    pub unit_failures: Vec<UnitFailure>,
}

impl RunSummary {
    pub fn is_clean(&self) -> bool {
        self.object_failures.is_empty() && self.unit_failures.is_empty()
    }
}

/// Sweeps the first `objects_per_group` objects of every group
pub struct Driver<'a> {
    sweep: Sweep<'a>,
    store: ResultStore,
    objects_per_group: usize,
    resume: bool,
}

impl<'a> Driver<'a> {
    /// `objects_per_group == 0` selects every object
    pub fn new(sweep: Sweep<'a>, store: ResultStore, objects_per_group: usize, resume: bool) -> Self {
        Self {
            sweep,
            store,
            objects_per_group,
            resume,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    /// Number of objects `run` will visit for `relations`
    pub fn planned_objects(&self, relations: &ObjectRelations) -> usize {
        relations
            .groups()
            .map(|(_, objects)| self.limit(objects.len()))
            .sum()
    }

    fn limit(&self, available: usize) -> usize {
        if self.objects_per_group == 0 {
            available
        } else {
            available.min(self.objects_per_group)
        }
    }

    /// Sweep all selected objects.
    ///
    /// The document is rewritten after every completed object. Object-level
    /// failures are recorded and the run moves on; only a failure to persist
    /// the document aborts the run.
    pub fn run(
        &self,
        relations: &ObjectRelations,
        mut on_object: impl FnMut(&ObjectEvent<'_>),
    ) -> Result<RunSummary> {
        let mut tree = if self.resume {
            self.store.load_or_default()?
        } else {
            ResultTree::new()
        };

        let mut summary = RunSummary {
            results_path: self.store.path().to_path_buf(),
            ..RunSummary::default()
        };
        let total = self.planned_objects(relations);
        let mut position = 0;

        for (group, objects) in relations.groups() {
            tree.ensure_group(group);

            for (object_id, entry) in objects.iter().take(self.limit(objects.len())) {
                position += 1;

                let status = if self.resume && tree.contains(group, object_id) {
                    log::info!("{}/{} already in {}, skipping", group, object_id, self.store.path().display());
                    summary.objects_resumed += 1;
                    ObjectStatus::Resumed
                } else {
                    log::info!("processing object {}/{} ({}/{})", group, object_id, position, total);
                    match self.sweep.run_object(object_id, &entry.images, &entry.point_cloud) {
                        Ok(outcome) => {
                            let units = outcome.result.unit_count();
                            let failed_units = outcome.failures.len();
                            tree.insert(group, outcome.result);
                            self.store.save(&tree)?;
                            log::info!("saved results for {} -> {}", object_id, self.store.path().display());

                            summary.objects_completed += 1;
                            summary.units_evaluated += units;
                            summary.unit_failures.extend(outcome.failures);
                            ObjectStatus::Completed { units, failed_units }
                        }
                        Err(error) => {
                            log::error!("failed processing {}/{}: {}", group, object_id, error);
                            summary.object_failures.push(ObjectFailure {
                                group: group.to_string(),
                                object_id: object_id.clone(),
                                error,
                            });
                            ObjectStatus::Failed
                        }
                    }
                };

                on_object(&ObjectEvent {
                    group,
                    object_id,
                    position,
                    total,
                    status,
                });
            }
        }

        Ok(summary)
    }
}
