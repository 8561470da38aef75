// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Toolbar with playback controls and key help.

use crate::models::session::Session;

/// Result of toolbar interaction.
pub enum ToolbarAction {
    None,
    TogglePause,
    ResetZoom,
    Next,
    Quit,
}

/// Display the toolbar for the active session.
pub fn show(ui: &mut egui::Ui, session: Option<&Session>, progress: (usize, usize)) -> ToolbarAction {
    let mut action = ToolbarAction::None;

    ui.horizontal(|ui| {
        ui.spacing_mut().item_spacing.x = 8.0;

        ui.label(format!("Recording {}/{}", progress.0, progress.1));
        ui.separator();

        let Some(session) = session else {
            ui.label(egui::RichText::new("Loading...").italics().weak());
            return;
        };

        let play_label = if session.paused { "▶ Play" } else { "⏸ Pause" };
        if ui.button(play_label).clicked() {
            action = ToolbarAction::TogglePause;
        }
        if ui
            .add_enabled(session.zoom.level > 1.0, egui::Button::new("Reset zoom"))
            .clicked()
        {
            action = ToolbarAction::ResetZoom;
        }
        if ui.button("Next ⏭").clicked() {
            action = ToolbarAction::Next;
        }
        if ui.button("Quit").clicked() {
            action = ToolbarAction::Quit;
        }

        ui.separator();
        ui.monospace(format!(
            "{} ({:.2}s)",
            session.position,
            session.current_time()
        ));
        if session.paused {
            ui.label(
                egui::RichText::new(format!("{} buffered", session.buffered_frames()))
                    .small()
                    .weak(),
            );
        }

        ui.separator();
        let help = if session.paused {
            "1-9 mark · Ctrl+digit restore · A/D step · C clear · Ctrl+Z undo · R reset zoom · N next · Esc quit"
        } else {
            "Space pause · 1-9 mark · Ctrl+digit restore · wheel zoom · N next · Esc quit"
        };
        ui.label(egui::RichText::new(help).italics().weak());
    });

    action
}
