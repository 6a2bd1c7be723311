// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Geometry module - point sets and normalization

mod point_set;

pub use point_set::{NormalizedPointSet, PointSet};
