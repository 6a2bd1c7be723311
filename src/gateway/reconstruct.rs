// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Reconstruction backends

use super::Reconstructor;
use crate::geometry::PointSet;
use crate::io::{read_ply, write_ply, PlyError};
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// Why a reconstruction produced no usable output
#[derive(Debug, thiserror::Error)]
pub enum ReconstructionError {
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with status {status}")]
    ExitStatus { program: String, status: String },

    #[error("no point cloud written to {}", .0.display())]
    MissingOutput(PathBuf),

    #[error("unreadable point cloud {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: PlyError,
    },

    #[error("failed to create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to remove stale point cloud {}: {source}", path.display())]
    StaleArtifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to persist point cloud {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: PlyError,
    },
}

/// Placeholder backend producing uniform random points in [-0.5, 0.5]^3.
///
/// The generator is seeded from the image path so repeated runs over the
/// same inputs produce the same artifacts.
#[derive(Debug, Clone)]
pub struct SyntheticReconstructor {
    points: usize,
    seed: u64,
}

impl SyntheticReconstructor {
    pub fn new(points: usize, seed: u64) -> Self {
        Self { points, seed }
    }
}

impl Reconstructor for SyntheticReconstructor {
    fn reconstruct(&self, image: &Path, artifact: &Path) -> Result<PointSet, ReconstructionError> {
        let mut rng = StdRng::seed_from_u64(self.seed ^ path_seed(image));

        let cloud: PointSet = (0..self.points)
            .map(|_| {
                Point3::new(
                    rng.gen::<f64>() - 0.5,
                    rng.gen::<f64>() - 0.5,
                    rng.gen::<f64>() - 0.5,
                )
            })
            .collect();

        log::debug!(
            "synthetic reconstruction of {} -> {} ({} points)",
            image.display(),
            artifact.display(),
            cloud.len()
        );

        write_ply(artifact, &cloud).map_err(|source| ReconstructionError::Persist {
            path: artifact.to_path_buf(),
            source,
        })?;
        Ok(cloud)
    }
}

/// 64-bit FNV-1a over the path text
fn path_seed(path: &Path) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    path.to_string_lossy()
        .bytes()
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

/// External process backend.
///
/// `{input}` and `{output}` in the arguments are replaced by the image path
/// and the artifact path; the process must write a PLY file to `{output}`.
#[derive(Debug, Clone)]
pub struct CommandReconstructor {
    program: String,
    args: Vec<String>,
}

impl CommandReconstructor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand_args(&self, image: &Path, artifact: &Path) -> Vec<String> {
        let input = image.display().to_string();
        let output = artifact.display().to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

impl Reconstructor for CommandReconstructor {
    fn reconstruct(&self, image: &Path, artifact: &Path) -> Result<PointSet, ReconstructionError> {
        if let Some(parent) = artifact.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ReconstructionError::OutputDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        // A stale artifact must not pass for fresh output
        remove_stale(artifact)?;

        let start = Instant::now();
        let status = Command::new(&self.program)
            .args(self.expand_args(image, artifact))
            .status()
            .map_err(|source| ReconstructionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        log::debug!(
            "{} finished in {:.1}s with {}",
            self.program,
            start.elapsed().as_secs_f64(),
            status
        );

        if !status.success() {
            return Err(ReconstructionError::ExitStatus {
                program: self.program.clone(),
                status: status.to_string(),
            });
        }

        if !artifact.is_file() {
            return Err(ReconstructionError::MissingOutput(artifact.to_path_buf()));
        }

        read_ply(artifact).map_err(|source| ReconstructionError::Unreadable {
            path: artifact.to_path_buf(),
            source,
        })
    }
}

fn remove_stale(artifact: &Path) -> Result<(), ReconstructionError> {
    match std::fs::remove_file(artifact) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ReconstructionError::StaleArtifact {
            path: artifact.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_synthetic_is_deterministic_and_persisted() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("obj").join("img0.ply");
        let backend = SyntheticReconstructor::new(512, 3);

        let first = backend.reconstruct(Path::new("a.png"), &artifact).unwrap();
        let second = backend.reconstruct(Path::new("a.png"), &artifact).unwrap();

        assert_eq!(first.len(), 512);
        assert_eq!(first, second);
        assert_eq!(read_ply(&artifact).unwrap(), first);
        assert!(first
            .points()
            .iter()
            .all(|p| p.coords.iter().all(|c| (-0.5..0.5).contains(c))));
    }

    #[test]
    fn test_missing_program_fails_distinctly() {
        let temp = TempDir::new().unwrap();
        let backend = CommandReconstructor::new("pointbench-no-such-binary", vec![]);
        let err = backend
            .reconstruct(Path::new("a.png"), &temp.path().join("out.ply"))
            .unwrap_err();
        assert!(matches!(err, ReconstructionError::Spawn { .. }));
    }

    #[test]
    fn test_path_seed_is_fixed() {
        assert_eq!(path_seed(Path::new("")), 0xcbf2_9ce4_8422_2325);
        assert_eq!(path_seed(Path::new("a")), 0xaf63_dc4c_8601_ec8c);
        assert_ne!(path_seed(Path::new("img_0.png")), path_seed(Path::new("img_1.png")));
    }

    #[test]
    fn test_stale_artifact_removed() {
        let temp = TempDir::new().unwrap();
        let artifact = temp.path().join("out.ply");
        std::fs::write(&artifact, "stale").unwrap();

        remove_stale(&artifact).unwrap();
        assert!(!artifact.exists());
        remove_stale(&artifact).unwrap();
    }

    #[test]
    fn test_unremovable_artifact_fails_distinctly() {
        let temp = TempDir::new().unwrap();
        // A directory in place of the artifact cannot be removed as a file
        let artifact = temp.path().join("out.ply");
        std::fs::create_dir(&artifact).unwrap();

        let backend = CommandReconstructor::new("pointbench-no-such-binary", vec![]);
        let err = backend
            .reconstruct(Path::new("a.png"), &artifact)
            .unwrap_err();
        assert!(matches!(err, ReconstructionError::StaleArtifact { .. }));
    }

    #[test]
    fn test_output_dir_failure_is_not_spawn() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, "file, not a directory").unwrap();

        let backend = CommandReconstructor::new("pointbench-no-such-binary", vec![]);
        let err = backend
            .reconstruct(Path::new("a.png"), &blocker.join("out.ply"))
            .unwrap_err();
        assert!(matches!(err, ReconstructionError::OutputDir { .. }));
    }

    #[test]
    fn test_args_substitution() {
        let backend = CommandReconstructor::new(
            "run",
            vec!["--image={input}".to_string(), "{output}".to_string()],
        );
        let args = backend.expand_args(Path::new("in.png"), Path::new("out.ply"));
        assert_eq!(args, vec!["--image=in.png", "out.ply"]);
    }
}
