// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O operations for media, signal data and sidecar files.

pub mod audio;
pub mod media;
pub mod serialization;
pub mod velocity;
