// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Geometric utility functions.
//!
//! This module provides the zoom crop computation, conversions between
//! display and frame pixel coordinates, and time/sample conversions.

/// A crop rectangle in frame pixels (`x2`/`y2` exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl CropRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x1: 0,
            y1: 0,
            x2: width,
            y2: height,
        }
    }

    /// Normalized (0.0 to 1.0) texture coordinates for this crop.
    pub fn to_uv(&self, width: u32, height: u32) -> ([f32; 2], [f32; 2]) {
        let w = width.max(1) as f32;
        let h = height.max(1) as f32;
        (
            [self.x1 as f32 / w, self.y1 as f32 / h],
            [self.x2 as f32 / w, self.y2 as f32 / h],
        )
    }
}

/// Compute the visible region of a `width` x `height` frame at `zoom`,
/// centred on `center` (frame pixels) and clamped to the frame.
pub fn zoom_crop(width: u32, height: u32, zoom: f32, center: Option<(u32, u32)>) -> CropRect {
    if zoom <= 1.0 || width == 0 || height == 0 {
        return CropRect::full(width, height);
    }

    let new_w = ((width as f32 / zoom) as u32).clamp(1, width);
    let new_h = ((height as f32 / zoom) as u32).clamp(1, height);
    let (cx, cy) = center.unwrap_or((width / 2, height / 2));

    // Shift rather than shrink at the edges
    let x1 = cx.saturating_sub(new_w / 2).min(width - new_w);
    let y1 = cy.saturating_sub(new_h / 2).min(height - new_h);

    CropRect {
        x1,
        y1,
        x2: x1 + new_w,
        y2: y1 + new_h,
    }
}

/// Map a position inside the display rectangle to frame pixel coordinates,
/// taking the current crop into account.
pub fn display_to_frame(rel_x: f32, rel_y: f32, crop: &CropRect) -> (u32, u32) {
    let rel_x = rel_x.clamp(0.0, 1.0);
    let rel_y = rel_y.clamp(0.0, 1.0);
    let x = crop.x1 as f32 + rel_x * (crop.x2 - crop.x1) as f32;
    let y = crop.y1 as f32 + rel_y * (crop.y2 - crop.y1) as f32;
    (x as u32, y as u32)
}

/// Fit an image of the given aspect ratio inside `available`, returning
/// the displayed size.
pub fn fit_size(image_w: f32, image_h: f32, avail_w: f32, avail_h: f32) -> (f32, f32) {
    if image_w <= 0.0 || image_h <= 0.0 || avail_w <= 0.0 || avail_h <= 0.0 {
        return (0.0, 0.0);
    }
    let img_aspect = image_w / image_h;
    let avail_aspect = avail_w / avail_h;
    if img_aspect > avail_aspect {
        // Image is wider - fit to width
        (avail_w, avail_w / img_aspect)
    } else {
        // Image is taller - fit to height
        (avail_h * img_aspect, avail_h)
    }
}

/// Audio sample index for a time in seconds.
pub fn time_to_sample(time: f64, sample_rate: u32) -> u64 {
    (time.max(0.0) * sample_rate as f64).round() as u64
}

/// Horizontal position (0.0 to 1.0) of `value` inside `[start, end)`, if visible.
pub fn position_in_window(value: f64, start: f64, end: f64) -> Option<f32> {
    if end <= start || value < start || value > end {
        return None;
    }
    Some(((value - start) / (end - start)) as f32)
}
