// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Motion-tracking velocity CSV loading.

use anyhow::{Context, Result};
use std::path::Path;

/// Velocity samples indexed by video frame, sorted by frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VelocitySeries {
    pub points: Vec<(u64, f64)>,
}

impl VelocitySeries {
    /// Load the `Frame` and `velocity` columns of a CSV file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open CSV file {}", path.display()))?;
        Self::from_reader(file).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Parse CSV data. Header names are matched case-insensitively, other
    /// columns are ignored and rows that do not parse are skipped.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers().context("Missing CSV header")?.clone();
        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
                .with_context(|| format!("CSV has no '{}' column", name))
        };
        let frame_col = column("Frame")?;
        let velocity_col = column("velocity")?;

        let mut points = Vec::new();
        let mut skipped = 0usize;
        for record in csv_reader.records() {
            let record = record.context("Failed to read CSV row")?;
            let frame = record
                .get(frame_col)
                .and_then(|f| f.parse::<f64>().ok())
                .filter(|f| *f >= 0.0)
                .map(|f| f as u64);
            let velocity = record
                .get(velocity_col)
                .and_then(|v| v.parse::<f64>().ok())
                .filter(|v| v.is_finite());
            match (frame, velocity) {
                (Some(frame), Some(velocity)) => points.push((frame, velocity)),
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            log::warn!("Skipped {} unparsable velocity row(s)", skipped);
        }

        points.sort_by_key(|(frame, _)| *frame);
        Ok(Self { points })
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points with frames in `[first, last]`.
    pub fn window(&self, first: u64, last: u64) -> &[(u64, f64)] {
        let start = self.points.partition_point(|(f, _)| *f < first);
        let end = self.points.partition_point(|(f, _)| *f <= last);
        &self.points[start..end.max(start)]
    }

    /// Velocity at `frame`, if that frame has a sample.
    pub fn at(&self, frame: u64) -> Option<f64> {
        self.points
            .binary_search_by_key(&frame, |(f, _)| *f)
            .ok()
            .map(|i| self.points[i].1)
    }

    /// Minimum and maximum velocity over the whole series.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.points.iter().fold(None, |acc, &(_, v)| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
