// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Video canvas.
//!
//! Shows the current frame scaled to fit, cropped to the zoom region, and
//! reports mouse wheel zoom requests in frame pixel coordinates.

use crate::models::session::Zoom;
use crate::util::geometry::{display_to_frame, fit_size};

/// Result of canvas interaction.
pub enum CanvasAction {
    None,
    /// Wheel scrolled over the frame: direction and frame pixel under the cursor.
    Zoom(f32, (u32, u32)),
}

/// Display the current frame and handle mouse wheel zoom.
pub fn show(
    ui: &mut egui::Ui,
    texture: Option<&egui::TextureHandle>,
    frame_size: (u32, u32),
    zoom: &Zoom,
    loading_message: Option<&str>,
) -> CanvasAction {
    let mut action = CanvasAction::None;
    ui.style_mut().visuals.extreme_bg_color = egui::Color32::from_gray(40);

    let available_size = ui.available_size();

    egui::Frame::canvas(ui.style()).show(ui, |ui| {
        ui.set_min_size(available_size);

        if let Some(message) = loading_message {
            ui.centered_and_justified(|ui| {
                ui.vertical_centered(|ui| {
                    ui.add_space(20.0);
                    ui.spinner();
                    ui.add_space(10.0);
                    ui.label(
                        egui::RichText::new(message)
                            .size(16.0)
                            .color(egui::Color32::from_gray(200)),
                    );
                });
            });
            return;
        }

        let Some(texture) = texture else {
            ui.centered_and_justified(|ui| {
                ui.label(
                    egui::RichText::new("Decoding first frame...")
                        .color(egui::Color32::WHITE),
                );
            });
            return;
        };

        let (width, height) = frame_size;
        let available = ui.available_size();
        let (display_width, display_height) =
            fit_size(width as f32, height as f32, available.x, available.y);

        // Center the frame
        let x_offset = (available.x - display_width) / 2.0;
        let y_offset = (available.y - display_height) / 2.0;
        let image_rect = egui::Rect::from_min_size(
            ui.min_rect().min + egui::vec2(x_offset, y_offset),
            egui::vec2(display_width, display_height),
        );

        let crop = zoom.crop(width, height);
        let (uv_min, uv_max) = crop.to_uv(width, height);
        ui.painter().image(
            texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::pos2(uv_min[0], uv_min[1]), egui::pos2(uv_max[0], uv_max[1])),
            egui::Color32::WHITE,
        );

        let response = ui.allocate_rect(image_rect, egui::Sense::hover());
        if let Some(pos) = response.hover_pos() {
            let scroll = ui.input(|i| i.raw_scroll_delta.y);
            if scroll != 0.0 && display_width > 0.0 && display_height > 0.0 {
                let rel_x = (pos.x - image_rect.min.x) / display_width;
                let rel_y = (pos.y - image_rect.min.y) / display_height;
                action = CanvasAction::Zoom(scroll.signum(), display_to_frame(rel_x, rel_y, &crop));
            }
        }

        if zoom.level > 1.0 {
            ui.painter().text(
                image_rect.right_top() + egui::vec2(-8.0, 8.0),
                egui::Align2::RIGHT_TOP,
                format!("{:.1}x", zoom.level),
                egui::FontId::monospace(14.0),
                egui::Color32::YELLOW,
            );
        }
    });

    action
}
