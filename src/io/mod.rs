// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - point cloud files

mod ply;

pub use ply::{read_ply, read_ply_from, write_ply, write_ply_to, PlyError};
