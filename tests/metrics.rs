// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Metric engine behaviour on small known point sets

use approx::assert_relative_eq;
use pointbench::metrics::{
    chamfer_distance, DeviceUsed, MetricEngine, ParallelContext, SequentialContext,
};
use pointbench::{EvalError, PointSet};

fn cube_corners() -> PointSet {
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

/// Cube corners with the (1, 1, 1) corner pushed 0.5 along x
fn displaced_cube() -> PointSet {
    let mut points: Vec<_> = cube_corners().points().to_vec();
    if let Some(p) = points.iter_mut().find(|p| p.x == 1.0 && p.y == 1.0 && p.z == 1.0) {
        p.x += 0.5;
    }
    PointSet::new(points)
}

#[test]
fn test_normalization_properties() {
    let normalized = displaced_cube().normalize().unwrap();

    let n = normalized.len() as f64;
    let mean = normalized
        .points()
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, p| acc + p.coords)
        / n;
    assert_relative_eq!(mean.norm(), 0.0, epsilon = 1e-12);

    let max_norm = normalized
        .points()
        .iter()
        .map(|p| p.coords.norm())
        .fold(0.0_f64, f64::max);
    assert_relative_eq!(max_norm, 1.0, epsilon = 1e-12);
}

#[test]
fn test_apple_scenario() {
    let engine = MetricEngine::default();
    let ground_truth = cube_corners();
    let predicted = displaced_cube();

    let loose = engine.evaluate(&predicted, &ground_truth, 10.0).unwrap();
    assert_eq!(loose.precision, 1.0);
    assert_eq!(loose.recall, 1.0);
    assert_eq!(loose.fscore, 1.0);
    assert_eq!(loose.device_used, DeviceUsed::Primary);

    let tight = engine.evaluate(&predicted, &ground_truth, 0.001).unwrap();
    assert!(tight.fscore < 1.0);
    assert!(tight.chamfer_distance > 0.0);
    assert_eq!(tight.chamfer_distance, loose.chamfer_distance);
}

#[test]
fn test_translation_and_scale_invariance() {
    let engine = MetricEngine::default();
    let ground_truth = cube_corners();
    let moved: PointSet = displaced_cube()
        .points()
        .iter()
        .map(|p| nalgebra::Point3::from(p.coords * 3.0 + nalgebra::Vector3::new(5.0, -2.0, 7.0)))
        .collect();

    let a = engine.evaluate(&displaced_cube(), &ground_truth, 0.25).unwrap();
    let b = engine.evaluate(&moved, &ground_truth, 0.25).unwrap();
    assert_relative_eq!(a.chamfer_distance, b.chamfer_distance, epsilon = 1e-12);
    assert_eq!(a.precision, b.precision);
    assert_eq!(a.recall, b.recall);
}

#[test]
fn test_chamfer_is_symmetric() {
    let a = displaced_cube().normalize().unwrap();
    let b = cube_corners().normalize().unwrap();
    let ab = chamfer_distance(a.points(), b.points()).unwrap();
    let ba = chamfer_distance(b.points(), a.points()).unwrap();
    assert_relative_eq!(ab, ba, epsilon = 1e-15);
}

#[test]
fn test_scores_bounded_and_monotonic_in_tau() {
    let engine = MetricEngine::default();
    let (predicted, ground_truth) = (displaced_cube(), cube_corners());

    let (mut precision, mut recall, mut fscore) = (0.0, 0.0, 0.0);
    for tau in [0.01, 0.05, 0.1, 0.2, 0.25, 0.3, 0.5, 1.0, 2.5] {
        let m = engine.evaluate(&predicted, &ground_truth, tau).unwrap();
        for value in [m.precision, m.recall, m.fscore] {
            assert!((0.0..=1.0).contains(&value));
        }
        assert!(m.precision >= precision, "precision dropped at tau={}", tau);
        assert!(m.recall >= recall, "recall dropped at tau={}", tau);
        assert!(m.fscore >= fscore, "fscore dropped at tau={}", tau);
        (precision, recall, fscore) = (m.precision, m.recall, m.fscore);
    }
    assert_eq!((precision, recall), (1.0, 1.0));
}

#[test]
fn test_contexts_agree() {
    let parallel = MetricEngine::new(
        Box::new(ParallelContext::new(1 << 20)),
        Box::new(SequentialContext),
    );
    // A zero budget forces every computation onto the fallback
    let sequential = MetricEngine::new(Box::new(ParallelContext::new(0)), Box::new(SequentialContext));

    let (predicted, ground_truth) = (displaced_cube(), cube_corners());
    let a = parallel.evaluate(&predicted, &ground_truth, 0.3).unwrap();
    let b = sequential.evaluate(&predicted, &ground_truth, 0.3).unwrap();

    assert_eq!(a.device_used, DeviceUsed::Primary);
    assert_eq!(b.device_used, DeviceUsed::Fallback);
    assert_eq!(a.chamfer_distance, b.chamfer_distance);
    assert_eq!(a.precision, b.precision);
    assert_eq!(a.recall, b.recall);
    assert_eq!(a.fscore, b.fscore);
}

#[test]
fn test_zero_tau_rejected() {
    let engine = MetricEngine::default();
    let err = engine
        .evaluate(&displaced_cube(), &cube_corners(), 0.0)
        .unwrap_err();
    assert!(matches!(err, EvalError::InvalidTolerance { .. }));
}

#[test]
fn test_empty_prediction_is_degenerate() {
    let engine = MetricEngine::default();
    let err = engine
        .evaluate(&PointSet::default(), &cube_corners(), 0.05)
        .unwrap_err();
    assert!(matches!(err, EvalError::DegenerateInput { .. }));
}

#[test]
fn test_single_point_is_degenerate() {
    let engine = MetricEngine::default();
    let single = PointSet::from_rows(&[[0.3, 0.3, 0.3]]);
    let err = engine.evaluate(&single, &cube_corners(), 0.05).unwrap_err();
    assert!(matches!(err, EvalError::DegenerateInput { .. }));
}
