// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Signal helpers for the audio overlay.
//!
//! Waveforms are reduced to one min/max pair per display column, and the
//! spectrogram is a short-time FFT over the visible window only.

use realfft::RealFftPlanner;

/// Min/max of the samples falling into each of `columns` buckets.
pub fn peak_envelope(samples: &[f32], columns: usize) -> Vec<(f32, f32)> {
    if samples.is_empty() || columns == 0 {
        return Vec::new();
    }
    (0..columns)
        .map(|col| {
            let start = col * samples.len() / columns;
            let end = ((col + 1) * samples.len() / columns).max(start + 1).min(samples.len());
            samples[start..end]
                .iter()
                .fold((f32::MAX, f32::MIN), |(lo, hi), &s| (lo.min(s), hi.max(s)))
        })
        .collect()
}

/// Magnitudes in dB, one column per time step, low frequencies first.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    pub columns: Vec<Vec<f32>>,
    pub bins: usize,
    pub max_db: f32,
}

impl Spectrogram {
    /// Compute a spectrogram of `samples` with `columns` evenly spaced frames.
    pub fn compute(samples: &[f32], fft_size: usize, columns: usize) -> Option<Self> {
        if samples.len() < fft_size || columns == 0 || fft_size < 2 {
            return None;
        }

        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let window = hann_window(fft_size);
        let mut input = fft.make_input_vec();
        let mut spectrum = fft.make_output_vec();

        let span = samples.len() - fft_size;
        let mut out = Vec::with_capacity(columns);
        let mut max_db = f32::MIN;

        for col in 0..columns {
            let start = if columns > 1 { col * span / (columns - 1) } else { 0 };
            for (dst, (s, w)) in input
                .iter_mut()
                .zip(samples[start..start + fft_size].iter().zip(&window))
            {
                *dst = s * w;
            }
            if fft.process(&mut input, &mut spectrum).is_err() {
                return None;
            }
            let column: Vec<f32> = spectrum
                .iter()
                .map(|c| 20.0 * (c.norm() + 1e-9).log10())
                .collect();
            max_db = column.iter().copied().fold(max_db, f32::max);
            out.push(column);
        }

        Some(Self {
            columns: out,
            bins: fft_size / 2 + 1,
            max_db,
        })
    }

    /// Render into RGBA pixels (`columns` wide, `bins` tall, highest frequency on top).
    pub fn to_rgba(&self, dynamic_range_db: f32) -> Vec<u8> {
        let width = self.columns.len();
        let mut pixels = vec![0u8; width * self.bins * 4];
        let floor = self.max_db - dynamic_range_db;
        for (x, column) in self.columns.iter().enumerate() {
            for (bin, &db) in column.iter().enumerate() {
                let y = self.bins - 1 - bin;
                let level = ((db - floor) / dynamic_range_db).clamp(0.0, 1.0);
                let [r, g, b] = heat_color(level);
                let i = (y * width + x) * 4;
                pixels[i..i + 4].copy_from_slice(&[r, g, b, 255]);
            }
        }
        pixels
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Black to red to yellow to white.
pub fn heat_color(level: f32) -> [u8; 3] {
    let l = level.clamp(0.0, 1.0) * 3.0;
    let r = l.min(1.0);
    let g = (l - 1.0).clamp(0.0, 1.0);
    let b = (l - 2.0).clamp(0.0, 1.0);
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}
