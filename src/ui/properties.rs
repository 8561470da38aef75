// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Event slot panel.
//!
//! Lists every event slot with its new and stored mark, and offers the
//! same set/restore/clear actions as the keyboard.

use crate::models::{annotation::EventMark, session::Session};

/// Result of properties panel interaction.
pub enum PropertiesAction {
    None,
    Set(usize),
    Restore(usize),
    Clear,
    Undo,
    Redo,
}

fn describe(mark: Option<&EventMark>) -> String {
    match mark {
        Some(m) => match m.audio_sample {
            Some(sample) => format!("{} ({:.2}s) @{}", m.frame, m.time, sample),
            None => format!("{} ({:.2}s)", m.frame, m.time),
        },
        None => "-".to_string(),
    }
}

/// Display the slot table.
pub fn show(ui: &mut egui::Ui, session: &Session) -> PropertiesAction {
    let marks = &session.marks;
    let existing = &session.existing;
    let mut action = PropertiesAction::None;

    ui.heading("Events");
    ui.separator();

    egui::Grid::new("event_slots")
        .num_columns(4)
        .striped(true)
        .spacing([8.0, 4.0])
        .show(ui, |ui| {
            ui.strong("#");
            ui.strong("New");
            ui.strong("Existing");
            ui.label("");
            ui.end_row();

            for (number, mark) in marks.iter() {
                ui.label(format!("E{}", number));
                ui.monospace(describe(mark));
                let stored = existing.get(number);
                ui.monospace(describe(stored));
                ui.horizontal(|ui| {
                    if ui.small_button("Set").on_hover_text(format!("Key {}", number)).clicked() {
                        action = PropertiesAction::Set(number);
                    }
                    if ui
                        .add_enabled(stored.is_some(), egui::Button::new("Restore").small())
                        .on_hover_text(format!("Ctrl+{}", number))
                        .clicked()
                    {
                        action = PropertiesAction::Restore(number);
                    }
                });
                ui.end_row();
            }
        });

    ui.add_space(8.0);
    ui.horizontal(|ui| {
        if ui.button("Clear all (C)").clicked() {
            action = PropertiesAction::Clear;
        }
        if ui.add_enabled(session.can_undo(), egui::Button::new("Undo")).clicked() {
            action = PropertiesAction::Undo;
        }
        if ui.add_enabled(session.can_redo(), egui::Button::new("Redo")).clicked() {
            action = PropertiesAction::Redo;
        }
        if session.dirty {
            ui.label(egui::RichText::new("unsaved").italics().color(egui::Color32::YELLOW));
        }
    });

    action
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        assert_eq!(describe(None), "-");
        assert_eq!(describe(Some(&EventMark::new(12, 0.4))), "12 (0.40s)");
        assert_eq!(
            describe(Some(&EventMark::new(12, 0.4).with_sample_rate(1000))),
            "12 (0.40s) @400"
        );
    }
}
