// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Data model: event marks, recordings and session state.

pub mod annotation;
pub mod history;
pub mod recording;
pub mod session;
