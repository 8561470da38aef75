// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Synchronized signal strips.
//!
//! Waveform, spectrogram and velocity views centred on the current
//! position, with a cursor line and markers for the set event slots.

use crate::io::{audio::AudioTrack, velocity::VelocitySeries};
use crate::models::annotation::EventMarks;
use crate::util::geometry::position_in_window;
use crate::util::signal::peak_envelope;

const STRIP_HEIGHT: f32 = 80.0;
const CURSOR_COLOR: egui::Color32 = egui::Color32::from_rgb(255, 80, 80);
const MARK_COLOR: egui::Color32 = egui::Color32::from_rgb(90, 200, 255);

/// Draw the audio waveform of `[start, end)` seconds.
pub fn waveform(
    ui: &mut egui::Ui,
    audio: &AudioTrack,
    (start, end): (f64, f64),
    cursor: f64,
    marks: &EventMarks,
) {
    let (rect, painter) = strip(ui, "Audio");
    let (samples, first_time) = audio.window(start, end);
    let rate = audio.sample_rate as f64;
    let span = end - start;

    // Columns outside the audio track (before 0 or past the end) stay empty
    let columns = rect.width().max(1.0) as usize;
    let offset_px = ((first_time - start) / span * rect.width() as f64) as f32;
    let covered_px = (samples.len() as f64 / rate / span * rect.width() as f64) as f32;
    let envelope = peak_envelope(samples, (covered_px as usize).min(columns));

    let mid = rect.center().y;
    let half = rect.height() / 2.0;
    let stroke = egui::Stroke::new(1.0, egui::Color32::from_rgb(120, 220, 120));
    for (i, (lo, hi)) in envelope.iter().enumerate() {
        let x = rect.min.x + offset_px + i as f32;
        painter.line_segment(
            [
                egui::pos2(x, mid - hi.clamp(-1.0, 1.0) * half),
                egui::pos2(x, mid - lo.clamp(-1.0, 1.0) * half),
            ],
            stroke,
        );
    }

    overlay(&painter, rect, (start, end), cursor, marks.iter().filter_map(|(n, m)| m.map(|m| (n, m.time))));
}

/// Draw a spectrogram texture covering `[start, end)` seconds.
pub fn spectrogram(
    ui: &mut egui::Ui,
    texture: &egui::TextureHandle,
    (start, end): (f64, f64),
    covered: (f64, f64),
    cursor: f64,
    marks: &EventMarks,
) {
    let (rect, painter) = strip(ui, "Spectrogram");
    let span = end - start;
    let x0 = rect.min.x + ((covered.0 - start) / span) as f32 * rect.width();
    let x1 = rect.min.x + ((covered.1 - start) / span) as f32 * rect.width();
    let image_rect = egui::Rect::from_x_y_ranges(x0..=x1, rect.y_range());
    painter.image(
        texture.id(),
        image_rect,
        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
        egui::Color32::WHITE,
    );

    overlay(&painter, rect, (start, end), cursor, marks.iter().filter_map(|(n, m)| m.map(|m| (n, m.time))));
}

/// Draw velocity over the frames `[first, last]`.
pub fn velocity(
    ui: &mut egui::Ui,
    series: &VelocitySeries,
    (first, last): (u64, u64),
    cursor: u64,
    marks: &EventMarks,
) {
    let (rect, painter) = strip(ui, "Velocity");
    let window = series.window(first, last);
    let (lo, hi) = series.range().unwrap_or((0.0, 1.0));
    let spread = if hi > lo { hi - lo } else { 1.0 };
    let span = (last - first).max(1) as f64;

    let points: Vec<egui::Pos2> = window
        .iter()
        .map(|&(frame, v)| {
            let x = rect.min.x + ((frame - first) as f64 / span) as f32 * rect.width();
            let y = rect.max.y - ((v - lo) / spread) as f32 * rect.height();
            egui::pos2(x, y)
        })
        .collect();
    if points.len() > 1 {
        painter.add(egui::Shape::line(
            points,
            egui::Stroke::new(1.5, egui::Color32::from_rgb(240, 190, 60)),
        ));
    }

    if let Some(v) = series.at(cursor) {
        painter.text(
            rect.right_top() + egui::vec2(-4.0, 2.0),
            egui::Align2::RIGHT_TOP,
            format!("{:.3}", v),
            egui::FontId::monospace(11.0),
            egui::Color32::from_gray(220),
        );
    }

    overlay(
        &painter,
        rect,
        (first as f64, last as f64),
        cursor as f64,
        marks.iter().filter_map(|(n, m)| m.map(|m| (n, m.frame as f64))),
    );
}

/// Allocate a strip with a label and a dark background.
fn strip(ui: &mut egui::Ui, label: &str) -> (egui::Rect, egui::Painter) {
    let width = ui.available_width();
    let (rect, _) = ui.allocate_exact_size(egui::vec2(width, STRIP_HEIGHT), egui::Sense::hover());
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 2.0, egui::Color32::from_gray(25));
    painter.text(
        rect.left_top() + egui::vec2(4.0, 2.0),
        egui::Align2::LEFT_TOP,
        label,
        egui::FontId::proportional(11.0),
        egui::Color32::from_gray(160),
    );
    (rect, painter)
}

/// Cursor line plus a labelled marker for each visible event.
fn overlay(
    painter: &egui::Painter,
    rect: egui::Rect,
    (start, end): (f64, f64),
    cursor: f64,
    events: impl Iterator<Item = (usize, f64)>,
) {
    for (number, at) in events {
        if let Some(rel) = position_in_window(at, start, end) {
            let x = rect.min.x + rel * rect.width();
            painter.vline(x, rect.y_range(), egui::Stroke::new(1.0, MARK_COLOR));
            painter.text(
                egui::pos2(x + 2.0, rect.max.y - 2.0),
                egui::Align2::LEFT_BOTTOM,
                format!("E{}", number),
                egui::FontId::monospace(10.0),
                MARK_COLOR,
            );
        }
    }
    if let Some(rel) = position_in_window(cursor, start, end) {
        let x = rect.min.x + rel * rect.width();
        painter.vline(x, rect.y_range(), egui::Stroke::new(1.5, CURSOR_COLOR));
    }
}
