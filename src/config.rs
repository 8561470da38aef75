// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Application settings.
//!
//! Settings are read from an optional YAML file. Every field has a default,
//! so an empty file (or no file at all) gives a working configuration.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How videos that are not H.264 are normalised before playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscodeMode {
    /// Replace the original file with the transcoded one.
    InPlace,
    /// Play a transcoded copy and delete it afterwards.
    Temporary,
    /// Play the file as it is.
    Off,
}

/// User-tunable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of event slots per recording (1 to 9, one digit key each).
    pub event_slots: usize,
    pub max_zoom: f32,
    pub zoom_step: f32,
    /// Delay between two played frames.
    pub playback_interval_ms: u64,
    /// Decoded frames kept for stepping backwards.
    pub frame_buffer_len: usize,
    /// Width of the audio strip, centred on the current time.
    pub audio_window_secs: f64,
    pub velocity_window_frames: u64,
    pub spectrogram_fft: usize,
    pub video_extensions: Vec<String>,
    pub transcode: TranscodeMode,
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            event_slots: 8,
            max_zoom: 5.0,
            zoom_step: 0.2,
            playback_interval_ms: 33,
            frame_buffer_len: 240,
            audio_window_secs: 2.0,
            velocity_window_frames: 150,
            spectrogram_fft: 512,
            video_extensions: vec!["mp4".to_string(), "webm".to_string()],
            transcode: TranscodeMode::InPlace,
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file and validate them.
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        let settings: Settings = serde_yaml::from_str(&yaml)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if !(1..=9).contains(&self.event_slots) {
            bail!("event_slots must be between 1 and 9, got {}", self.event_slots);
        }
        if self.max_zoom < 1.0 {
            bail!("max_zoom must be at least 1.0, got {}", self.max_zoom);
        }
        if self.zoom_step <= 0.0 {
            bail!("zoom_step must be positive, got {}", self.zoom_step);
        }
        if self.playback_interval_ms == 0 {
            bail!("playback_interval_ms must be positive");
        }
        if self.frame_buffer_len == 0 {
            bail!("frame_buffer_len must be positive");
        }
        if self.audio_window_secs <= 0.0 {
            bail!("audio_window_secs must be positive, got {}", self.audio_window_secs);
        }
        if !self.spectrogram_fft.is_power_of_two() || self.spectrogram_fft < 16 {
            bail!("spectrogram_fft must be a power of two >= 16, got {}", self.spectrogram_fft);
        }
        if self.video_extensions.is_empty() {
            bail!("video_extensions must not be empty");
        }
        Ok(())
    }

    /// Whether `path` has one of the configured video extensions.
    pub fn is_video_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| {
                self.video_extensions
                    .iter()
                    .any(|v| v.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let settings: Settings = serde_yaml::from_str("event_slots: 4\ntranscode: off\n").unwrap();
        assert_eq!(settings.event_slots, 4);
        assert_eq!(settings.transcode, TranscodeMode::Off);
        assert_eq!(settings.max_zoom, 5.0);
        assert_eq!(settings.video_extensions, vec!["mp4", "webm"]);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut settings = Settings::default();
        settings.event_slots = 10;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.spectrogram_fft = 500;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.max_zoom = 0.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_video_extension_match_is_case_insensitive() {
        let settings = Settings::default();
        assert!(settings.is_video_file(Path::new("/data/trial_CAM1.MP4")));
        assert!(settings.is_video_file(Path::new("clip.webm")));
        assert!(!settings.is_video_file(Path::new("clip.wav")));
        assert!(!settings.is_video_file(Path::new("noext")));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timed.yaml");
        std::fs::write(&path, "max_zoom: 3.0\nzoom_step: 0.5\n").unwrap();
        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.max_zoom, 3.0);
        assert_eq!(settings.zoom_step, 0.5);

        std::fs::write(&path, "event_slots: 0\n").unwrap();
        assert!(Settings::load(&path).is_err());
    }
}
