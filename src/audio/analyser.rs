//! Spectrum analysis node.
//!
//! Windowed FFT over the latest sample window with exponential smoothing of
//! bin magnitudes, reported as bytes on a fixed -100..-30 dB scale.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Magnitude (dB) mapped to byte 0.
const MIN_DECIBELS: f32 = -100.0;
/// Magnitude (dB) mapped to byte 255.
const MAX_DECIBELS: f32 = -30.0;

/// Stateful analyser with a planned FFT and smoothed magnitudes.
pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothing: f32,
    smoothed: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl Analyser {
    /// Creates an analyser for `window_size` samples (a power of two).
    pub fn new(window_size: usize, smoothing: f32) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(window_size);

        Self {
            fft,
            window: blackman_window(window_size),
            smoothing: smoothing.clamp(0.0, 1.0),
            smoothed: vec![0.0; window_size / 2],
            buffer: vec![Complex::new(0.0, 0.0); window_size],
        }
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Number of spectrum bins reported per frame.
    pub fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    /// Runs one analysis step over `samples` and returns the byte spectrum.
    ///
    /// Short input is zero padded at the front; long input uses its tail.
    pub fn process(&mut self, samples: &[f32]) -> Vec<u8> {
        let size = self.window.len();
        let tail = &samples[samples.len().saturating_sub(size)..];
        let pad = size - tail.len();

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = if i < pad { 0.0 } else { tail[i - pad] };
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        let scale = 1.0 / size as f32;
        let tau = self.smoothing;
        self.smoothed
            .iter_mut()
            .zip(self.buffer.iter())
            .map(|(previous, bin)| {
                *previous = tau * *previous + (1.0 - tau) * bin.norm() * scale;
                magnitude_to_byte(*previous)
            })
            .collect()
    }

    /// Forgets smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
    }
}

fn magnitude_to_byte(magnitude: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (db - MIN_DECIBELS) * 255.0 / (MAX_DECIBELS - MIN_DECIBELS);
    scaled.clamp(0.0, 255.0) as u8
}

fn blackman_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / n;
            A0 - A1 * phase.cos() + A2 * (2.0 * phase).cos()
        })
        .collect()
}
