// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Main application state and egui App implementation.
//!
//! The app walks through the discovered recordings one at a time. Media
//! for a recording is prepared on a background thread; once it arrives a
//! `Session` drives playback, input and marking until the user moves on,
//! at which point the marks are merged into the recording's sidecar.

use crate::config::Settings;
use crate::io::{
    audio::AudioTrack,
    media::{self, PreparedVideo, VideoSource},
    serialization,
    velocity::VelocitySeries,
};
use crate::models::{
    annotation::{EventMarks, SetOutcome},
    recording::Recording,
    session::{Scrub, Session},
};
use crate::ui::{canvas, properties, timeline, toolbar};
use crate::util::signal::Spectrogram;
use std::sync::mpsc::{channel, Receiver, TryRecvError};
use std::time::{Duration, Instant};

/// Columns of the spectrogram texture.
const SPECTROGRAM_COLUMNS: usize = 256;
/// Displayed dynamic range of the spectrogram.
const SPECTROGRAM_RANGE_DB: f32 = 80.0;

const DIGIT_KEYS: [egui::Key; 9] = [
    egui::Key::Num1,
    egui::Key::Num2,
    egui::Key::Num3,
    egui::Key::Num4,
    egui::Key::Num5,
    egui::Key::Num6,
    egui::Key::Num7,
    egui::Key::Num8,
    egui::Key::Num9,
];

/// Result of background recording preparation.
struct LoadedRecording {
    recording: Recording,
    info: media::VideoInfo,
    prepared: PreparedVideo,
    source: Box<dyn VideoSource>,
    audio: Option<AudioTrack>,
    velocity: Option<VelocitySeries>,
    existing: EventMarks,
}

/// Probe, normalize and open a recording's media.
///
/// Only the video is required; audio, velocity and sidecar problems are
/// logged and the recording loads without them.
fn load_recording(settings: &Settings, recording: Recording, channel: u16) -> anyhow::Result<LoadedRecording> {
    let probed = media::probe(&settings.ffprobe, &recording.video)?;
    let prepared = media::prepare(settings, &recording.video, &probed);
    // A transcoded file has its own stream properties
    let info = if media::needs_transcode(settings.transcode, &probed.codec) {
        media::probe(&settings.ffprobe, &prepared.path).unwrap_or(probed)
    } else {
        probed
    };
    let source = media::open_source(settings, &prepared.path, info)?;
    let info = source.info().clone();
    log::info!(
        "Opened {} ({}x{} @ {:.3} fps, {:?} frames)",
        recording.video.display(),
        info.width,
        info.height,
        info.fps,
        info.frame_count
    );

    let audio = recording.audio.as_deref().and_then(|path| {
        match AudioTrack::load(path, channel) {
            Ok(track) => {
                log::info!(
                    "Loaded audio {} (channel {}/{}, {} Hz, {:.1}s)",
                    path.display(),
                    track.channel,
                    track.channels,
                    track.sample_rate,
                    track.duration_secs()
                );
                Some(track)
            }
            Err(e) => {
                log::warn!("Continuing without audio: {:#}", e);
                None
            }
        }
    });

    let velocity = recording.velocity.as_deref().and_then(|path| {
        match VelocitySeries::load(path) {
            Ok(series) if series.is_empty() => {
                log::warn!("{} has no velocity samples", path.display());
                None
            }
            Ok(series) => Some(series),
            Err(e) => {
                log::warn!("Continuing without velocity: {:#}", e);
                None
            }
        }
    });

    let existing = match serialization::read_sidecar(&recording.sidecar) {
        Ok(sidecar) => serialization::existing_marks(&sidecar, settings.event_slots),
        Err(e) => {
            log::error!("Ignoring existing annotations: {:#}", e);
            EventMarks::new(settings.event_slots)
        }
    };

    Ok(LoadedRecording {
        recording,
        info,
        prepared,
        source,
        audio,
        velocity,
        existing,
    })
}

/// Spectrogram texture of the audio around one frame.
struct SpectrogramView {
    texture: egui::TextureHandle,
    position: u64,
    /// Seconds covered by the texture.
    covered: (f64, f64),
}

/// Main application state.
pub struct TimedApp {
    settings: Settings,
    /// Audio channel to display.
    channel: u16,
    recordings: Vec<Recording>,
    /// Index of the recording on screen (or loading).
    current: usize,

    session: Option<Session>,
    source: Option<Box<dyn VideoSource>>,
    /// Keeps a temporary transcode alive while it plays.
    prepared: Option<PreparedVideo>,
    audio: Option<AudioTrack>,
    velocity: Option<VelocitySeries>,

    frame_texture: Option<egui::TextureHandle>,
    texture_position: Option<u64>,
    spectrogram: Option<SpectrogramView>,

    /// Receiver for background recording loading
    loader: Option<Receiver<Result<LoadedRecording, String>>>,
    loading_message: Option<String>,

    last_tick: Instant,
    title: String,
    quitting: bool,
}

impl TimedApp {
    /// Create the app and start loading the first recording.
    pub fn new(settings: Settings, recordings: Vec<Recording>, channel: u16) -> Self {
        let mut app = Self {
            settings,
            channel,
            recordings,
            current: 0,
            session: None,
            source: None,
            prepared: None,
            audio: None,
            velocity: None,
            frame_texture: None,
            texture_position: None,
            spectrogram: None,
            loader: None,
            loading_message: None,
            last_tick: Instant::now(),
            title: String::new(),
            quitting: false,
        };
        app.start_loading();
        app
    }

    /// Load `self.current` on a background thread.
    fn start_loading(&mut self) {
        let Some(recording) = self.recordings.get(self.current).cloned() else {
            return;
        };
        let (sender, receiver) = channel();
        self.loader = Some(receiver);
        self.loading_message = Some(format!("Preparing {}...", recording.video_file_name()));

        let settings = self.settings.clone();
        let channel = self.channel;
        std::thread::spawn(move || {
            let name = recording.video.display().to_string();
            let result = load_recording(&settings, recording, channel)
                .map_err(|e| format!("Skipping {}: {:#}", name, e));
            let _ = sender.send(result);
        });
    }

    /// Check for a finished background load.
    fn poll_loader(&mut self) {
        let Some(ref receiver) = self.loader else {
            return;
        };
        let result = match receiver.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => Err("Loader thread stopped unexpectedly".to_string()),
        };
        self.loader = None;
        self.loading_message = None;

        match result {
            Ok(loaded) => {
                let sample_rate = loaded.audio.as_ref().map(|a| a.sample_rate);
                let session = Session::new(
                    loaded.recording,
                    loaded.info,
                    loaded.existing,
                    sample_rate,
                    self.settings.frame_buffer_len,
                );
                self.session = Some(session);
                self.source = Some(loaded.source);
                self.prepared = Some(loaded.prepared);
                self.audio = loaded.audio;
                self.velocity = loaded.velocity;
                self.last_tick = Instant::now();
                self.tick_playback(true);
            }
            Err(message) => {
                log::error!("{}", message);
                self.advance_recording();
            }
        }
    }

    /// Save the current recording's marks and release its media.
    fn finish_recording(&mut self) {
        if let Some(session) = self.session.take() {
            match session.save(self.audio.is_some()) {
                Ok(true) => log::info!(
                    "Annotations for {} updated in {}",
                    session.recording.video.display(),
                    session.recording.sidecar.display()
                ),
                Ok(false) => log::info!("No annotations made for {}", session.recording.video.display()),
                Err(e) => log::error!("Failed to save annotations: {:#}", e),
            }
        }

        self.source = None;
        if let Some(prepared) = self.prepared.take() {
            if prepared.is_temporary() {
                log::debug!("Removing temporary transcode {}", prepared.path.display());
            }
        }
        self.audio = None;
        self.velocity = None;
        self.frame_texture = None;
        self.texture_position = None;
        self.spectrogram = None;
    }

    /// Move to the next recording, or quit after the last one.
    fn advance_recording(&mut self) {
        self.current += 1;
        if self.current < self.recordings.len() {
            self.start_loading();
        } else {
            log::info!("All recordings done");
            self.quitting = true;
        }
    }

    /// Advance playback or scrubbing when the tick interval has elapsed.
    fn tick_playback(&mut self, force: bool) {
        let interval = Duration::from_millis(self.settings.playback_interval_ms);
        if !force && self.last_tick.elapsed() < interval {
            return;
        }
        self.last_tick = Instant::now();

        let (Some(session), Some(source)) = (self.session.as_mut(), self.source.as_mut()) else {
            return;
        };
        if session.paused && !force {
            return;
        }
        if let Err(e) = session.advance(&mut **source) {
            log::error!("Decoding failed: {:#}", e);
            session.paused = true;
        }
    }

    fn scrub(&mut self, direction: Scrub) {
        let interval = Duration::from_millis(self.settings.playback_interval_ms);
        if self.last_tick.elapsed() < interval {
            return;
        }
        self.last_tick = Instant::now();
        if let (Some(session), Some(source)) = (self.session.as_mut(), self.source.as_mut()) {
            if let Err(e) = session.step(&mut **source, direction) {
                log::error!("Decoding failed: {:#}", e);
            }
        }
    }

    fn set_event(&mut self, number: usize) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        match session.mark(number) {
            SetOutcome::Stored { cleared } => {
                log::info!("E{} set to frame {}", number, session.position);
                if cleared > 0 {
                    log::info!("Cleared {} later event(s) that came before E{}", cleared, number);
                }
            }
            SetOutcome::MissingPrevious => log::info!("Set E{} before E{}", number - 1, number),
            SetOutcome::BeforePrevious => {
                log::info!("E{} cannot come before E{}, cleared E{} onwards", number, number - 1, number)
            }
            SetOutcome::OutOfRange => {}
        }
    }

    fn restore_event(&mut self, number: usize) {
        if let Some(session) = self.session.as_mut() {
            if session.restore(number) {
                log::info!("E{} restored from existing annotations", number);
            }
        }
    }

    /// Keep the frame texture in sync with the session position.
    fn update_frame_texture(&mut self, ctx: &egui::Context) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        if self.texture_position == Some(session.position) && self.frame_texture.is_some() {
            return;
        }
        let Some(frame) = session.current_frame() else {
            return;
        };

        let size = [frame.width() as usize, frame.height() as usize];
        let color_image = egui::ColorImage::from_rgba_unmultiplied(size, frame.as_raw());
        match self.frame_texture {
            Some(ref mut texture) => texture.set(color_image, egui::TextureOptions::LINEAR),
            None => {
                self.frame_texture =
                    Some(ctx.load_texture("video_frame", color_image, egui::TextureOptions::LINEAR));
            }
        }
        self.texture_position = Some(session.position);
    }

    /// Recompute the spectrogram texture when the position changed.
    fn update_spectrogram(&mut self, ctx: &egui::Context) {
        let (Some(session), Some(audio)) = (self.session.as_ref(), self.audio.as_ref()) else {
            return;
        };
        if self.spectrogram.as_ref().map(|s| s.position) == Some(session.position) {
            return;
        }

        let (start, end) = audio_window(session.current_time(), self.settings.audio_window_secs);
        let (samples, first_time) = audio.window(start, end);
        let Some(spec) = Spectrogram::compute(samples, self.settings.spectrogram_fft, SPECTROGRAM_COLUMNS)
        else {
            self.spectrogram = None;
            return;
        };

        let covered = (
            first_time,
            first_time + samples.len() as f64 / audio.sample_rate as f64,
        );
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [spec.columns.len(), spec.bins],
            &spec.to_rgba(SPECTROGRAM_RANGE_DB),
        );
        match self.spectrogram {
            Some(ref mut view) => {
                view.texture.set(image, egui::TextureOptions::LINEAR);
                view.position = session.position;
                view.covered = covered;
            }
            None => {
                self.spectrogram = Some(SpectrogramView {
                    texture: ctx.load_texture("spectrogram", image, egui::TextureOptions::LINEAR),
                    position: session.position,
                    covered,
                });
            }
        }
    }

    /// Handle keyboard input for the active session.
    fn handle_keys(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) {
            self.quitting = true;
            return;
        }
        if self.session.is_none() {
            return;
        }

        let slots = self.settings.event_slots;
        match ctx.input(|i| slot_key(i, slots)) {
            Some(SlotKey::Restore(number)) => self.restore_event(number),
            Some(SlotKey::Set(number)) => self.set_event(number),
            None => {}
        }

        // Handle undo (Ctrl+Z)
        if ctx.input(|i| i.modifiers.command && i.key_pressed(egui::Key::Z) && !i.modifiers.shift) {
            if let Some(session) = self.session.as_mut() {
                if session.undo() {
                    log::info!("Undo");
                }
            }
        }

        // Handle redo (Ctrl+Shift+Z or Ctrl+Y)
        if ctx.input(|i| {
            (i.modifiers.command && i.modifiers.shift && i.key_pressed(egui::Key::Z))
                || (i.modifiers.command && i.key_pressed(egui::Key::Y))
        }) {
            if let Some(session) = self.session.as_mut() {
                if session.redo() {
                    log::info!("Redo");
                }
            }
        }

        let plain = |key: egui::Key| ctx.input(|i| !i.modifiers.command && i.key_pressed(key));

        if plain(egui::Key::Space) {
            if let Some(session) = self.session.as_mut() {
                session.toggle_pause();
            }
        }
        if plain(egui::Key::R) {
            if let Some(session) = self.session.as_mut() {
                session.zoom.reset();
            }
        }
        if plain(egui::Key::C) {
            if let Some(session) = self.session.as_mut() {
                session.clear_marks();
                log::info!("Cleared all events");
            }
        }
        if plain(egui::Key::N) {
            self.finish_recording();
            self.advance_recording();
            return;
        }

        let held = ctx.input(|i| {
            if i.key_down(egui::Key::A) || i.key_down(egui::Key::ArrowLeft) {
                Some(Scrub::Back)
            } else if i.key_down(egui::Key::D) || i.key_down(egui::Key::ArrowRight) {
                Some(Scrub::Forward)
            } else {
                None
            }
        });
        if let Some(direction) = held {
            if self.session.as_ref().is_some_and(|s| s.paused) {
                self.scrub(direction);
                ctx.request_repaint();
            }
        }
    }
}

/// Digit key action on an event slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotKey {
    Set(usize),
    /// Digit pressed with Ctrl (Cmd on macOS).
    Restore(usize),
}

/// Slot action of a digit pressed this frame, for the first `slots` digits.
fn slot_key(input: &egui::InputState, slots: usize) -> Option<SlotKey> {
    let number = DIGIT_KEYS
        .iter()
        .take(slots)
        .position(|k| input.key_pressed(*k))?
        + 1;
    Some(if input.modifiers.command {
        SlotKey::Restore(number)
    } else {
        SlotKey::Set(number)
    })
}

/// Audio window of `width` seconds centred on `time`.
fn audio_window(time: f64, width: f64) -> (f64, f64) {
    (time - width / 2.0, time + width / 2.0)
}

/// Frame window of `width` frames centred on `frame`.
fn frame_window(frame: u64, width: u64) -> (u64, u64) {
    let first = frame.saturating_sub(width / 2);
    (first, first + width)
}

impl eframe::App for TimedApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_loader();

        if ctx.input(|i| i.viewport().close_requested()) {
            self.finish_recording();
        }

        self.handle_keys(ctx);

        if self.quitting {
            self.finish_recording();
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        self.tick_playback(false);
        self.update_frame_texture(ctx);
        self.update_spectrogram(ctx);

        // Window title mirrors the current position and marks
        let title = match self.session {
            Some(ref session) => session.title(),
            None => "TIMED - Time Instant Marking for Experiment Data".to_string(),
        };
        if title != self.title {
            ctx.send_viewport_cmd(egui::ViewportCommand::Title(title.clone()));
            self.title = title;
        }

        // Toolbar
        let progress = (self.current + 1, self.recordings.len());
        let toolbar_action = egui::TopBottomPanel::top("toolbar")
            .show(ctx, |ui| toolbar::show(ui, self.session.as_ref(), progress))
            .inner;
        match toolbar_action {
            toolbar::ToolbarAction::TogglePause => {
                if let Some(session) = self.session.as_mut() {
                    session.toggle_pause();
                }
            }
            toolbar::ToolbarAction::ResetZoom => {
                if let Some(session) = self.session.as_mut() {
                    session.zoom.reset();
                }
            }
            toolbar::ToolbarAction::Next => {
                if self.session.is_some() {
                    self.finish_recording();
                    self.advance_recording();
                }
            }
            toolbar::ToolbarAction::Quit => self.quitting = true,
            toolbar::ToolbarAction::None => {}
        }

        // Event slots (right side)
        if let Some(ref session) = self.session {
            let properties_action = egui::SidePanel::right("properties")
                .default_width(300.0)
                .show(ctx, |ui| properties::show(ui, session))
                .inner;
            match properties_action {
                properties::PropertiesAction::Set(number) => self.set_event(number),
                properties::PropertiesAction::Restore(number) => self.restore_event(number),
                properties::PropertiesAction::Clear => {
                    if let Some(session) = self.session.as_mut() {
                        session.clear_marks();
                    }
                }
                properties::PropertiesAction::Undo => {
                    if let Some(session) = self.session.as_mut() {
                        session.undo();
                    }
                }
                properties::PropertiesAction::Redo => {
                    if let Some(session) = self.session.as_mut() {
                        session.redo();
                    }
                }
                properties::PropertiesAction::None => {}
            }
        }

        // Signal strips (bottom)
        if let Some(ref session) = self.session {
            if self.audio.is_some() || self.velocity.is_some() {
                egui::TopBottomPanel::bottom("timeline").show(ctx, |ui| {
                    let time = session.current_time();
                    let window = audio_window(time, self.settings.audio_window_secs);
                    if let Some(ref audio) = self.audio {
                        timeline::waveform(ui, audio, window, time, &session.marks);
                        if let Some(ref view) = self.spectrogram {
                            timeline::spectrogram(ui, &view.texture, window, view.covered, time, &session.marks);
                        }
                    }
                    if let Some(ref series) = self.velocity {
                        let frames = frame_window(session.position, self.settings.velocity_window_frames);
                        timeline::velocity(ui, series, frames, session.position, &session.marks);
                    }
                });
            }
        }

        // Video (center)
        let canvas_action = egui::CentralPanel::default()
            .show(ctx, |ui| match self.session {
                Some(ref session) => canvas::show(
                    ui,
                    self.frame_texture.as_ref(),
                    (session.info.width, session.info.height),
                    &session.zoom,
                    self.loading_message.as_deref(),
                ),
                None => canvas::show(
                    ui,
                    None,
                    (0, 0),
                    &Default::default(),
                    Some(self.loading_message.as_deref().unwrap_or("No recording")),
                ),
            })
            .inner;

        match canvas_action {
            canvas::CanvasAction::Zoom(direction, cursor) => {
                if let Some(session) = self.session.as_mut() {
                    session
                        .zoom
                        .scroll(direction, Some(cursor), self.settings.zoom_step, self.settings.max_zoom);
                }
            }
            canvas::CanvasAction::None => {}
        }

        // Keep ticking while playing or loading
        let playing = self.session.as_ref().is_some_and(|s| !s.paused);
        if self.loader.is_some() {
            ctx.request_repaint_after(Duration::from_millis(50));
        } else if playing {
            ctx.request_repaint_after(Duration::from_millis(self.settings.playback_interval_ms));
        }
    }
}
