// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! WAV audio loading.
//!
//! Only one channel of a recording is kept; multi-channel files carry
//! different microphones, so channels are selected rather than mixed.

use anyhow::{bail, Context, Result};
use hound::{SampleFormat, WavReader};
use std::path::Path;

/// One channel of a WAV file, as normalized `f32` samples.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// Channel count of the source file.
    pub channels: u16,
    /// Which channel `samples` came from.
    pub channel: u16,
}

impl AudioTrack {
    /// Load `channel` of the WAV file at `path`.
    ///
    /// An out-of-range channel falls back to channel 0 with a warning.
    pub fn load(path: &Path, channel: u16) -> Result<Self> {
        let mut reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file {}", path.display()))?;

        let spec = reader.spec();
        let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .collect::<Result<Vec<f32>, _>>()
                .context("Failed to read float samples")?,
            (SampleFormat::Int, 8) => reader
                .samples::<i8>()
                .map(|s| s.map(|v| v as f32 / i8::MAX as f32))
                .collect::<Result<Vec<f32>, _>>()
                .context("Failed to read i8 samples")?,
            (SampleFormat::Int, 16) => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                .collect::<Result<Vec<f32>, _>>()
                .context("Failed to read i16 samples")?,
            (SampleFormat::Int, 24) => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8_388_608.0))
                .collect::<Result<Vec<f32>, _>>()
                .context("Failed to read i24 samples")?,
            (SampleFormat::Int, 32) => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
                .collect::<Result<Vec<f32>, _>>()
                .context("Failed to read i32 samples")?,
            (format, bits) => bail!("Unsupported WAV format: {:?} {} bit", format, bits),
        };

        let channels = spec.channels.max(1);
        let channel = if channel < channels {
            channel
        } else {
            log::warn!(
                "{} has {} channel(s), using channel 0 instead of {}",
                path.display(),
                channels,
                channel
            );
            0
        };

        let samples = interleaved
            .iter()
            .skip(channel as usize)
            .step_by(channels as usize)
            .copied()
            .collect();

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
            channels,
            channel,
        })
    }

    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate.max(1) as f64
    }

    /// Samples between `start` and `end` seconds, clipped to the track.
    ///
    /// Returns the slice and the time of its first sample.
    pub fn window(&self, start: f64, end: f64) -> (&[f32], f64) {
        let rate = self.sample_rate as f64;
        let len = self.samples.len();
        let first = ((start.max(0.0) * rate) as usize).min(len);
        let last = ((end.max(0.0) * rate) as usize).min(len).max(first);
        (&self.samples[first..last], first as f64 / rate.max(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, channels: u16, frames: &[[i16; 2]]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: 1000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for frame in frames {
            for &s in frame.iter().take(channels as usize) {
                writer.write_sample(s).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_selects_channel_of_stereo_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[[i16::MAX, 0], [0, i16::MAX], [i16::MAX, 0]]);

        let left = AudioTrack::load(&path, 0).unwrap();
        assert_eq!(left.channels, 2);
        assert_eq!(left.samples, vec![1.0, 0.0, 1.0]);

        let right = AudioTrack::load(&path, 1).unwrap();
        assert_eq!(right.channel, 1);
        assert_eq!(right.samples, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_out_of_range_channel_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, &[[i16::MAX, 0], [0, 0]]);

        let track = AudioTrack::load(&path, 3).unwrap();
        assert_eq!(track.channel, 0);
        assert_eq!(track.samples.len(), 2);
        assert_eq!(track.sample_rate, 1000);
        assert_eq!(track.duration_secs(), 0.002);
    }

    #[test]
    fn test_window_is_clipped() {
        let track = AudioTrack {
            samples: (0..1000).map(|i| i as f32).collect(),
            sample_rate: 100,
            channels: 1,
            channel: 0,
        };
        let (slice, start) = track.window(1.0, 2.0);
        assert_eq!(slice.len(), 100);
        assert_eq!(slice[0], 100.0);
        assert_eq!(start, 1.0);

        let (slice, start) = track.window(-1.0, 0.5);
        assert_eq!(slice.len(), 50);
        assert_eq!(start, 0.0);

        let (slice, _) = track.window(9.5, 12.0);
        assert_eq!(slice.len(), 50);

        let (slice, _) = track.window(20.0, 30.0);
        assert!(slice.is_empty());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(AudioTrack::load(Path::new("/no/such/file.wav"), 0).is_err());
    }
}
