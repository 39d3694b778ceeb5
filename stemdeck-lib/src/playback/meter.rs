//! Per-track level metering over the analysis tap.
//!
//! The analyser mirrors what a browser `AnalyserNode` reports from
//! `getByteFrequencyData`: Blackman-windowed real FFT, magnitudes
//! normalized by the FFT size, exponential smoothing across calls, then a
//! linear map of the decibel range onto `0..=255`.

use std::f32::consts::PI;
use std::sync::Arc;

use log::warn;
use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

pub struct Analyser {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    r2c: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
}

impl Analyser {
    /// # Arguments
    ///
    /// * `fft_size` - Power of two, at least 32. Other values are rounded up.
    /// * `smoothing` - Temporal smoothing in `[0, 1)`.
    /// * `min_decibels` / `max_decibels` - dB range mapped onto `0..=255`.
    pub fn new(fft_size: usize, smoothing: f32, min_decibels: f32, max_decibels: f32) -> Self {
        let fft_size = fft_size.max(32).next_power_of_two();
        let (min_decibels, max_decibels) = if min_decibels < max_decibels {
            (min_decibels, max_decibels)
        } else {
            warn!(
                "invalid analyser range {}..{}dB, using -100..-30dB",
                min_decibels, max_decibels
            );
            (-100.0, -30.0)
        };

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let spectrum = r2c.make_output_vec();

        Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 0.999),
            min_decibels,
            max_decibels,
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            r2c,
            input: vec![0.0; fft_size],
            spectrum,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Compute byte frequency data for the most recent `fft_size` samples.
    ///
    /// `samples` is read oldest-to-newest; shorter input is zero-padded at
    /// the front.
    pub fn byte_frequency_data(&mut self, samples: &[f32]) -> Vec<u8> {
        let n = self.fft_size;
        let take = samples.len().min(n);
        let pad = n - take;
        self.input[..pad].fill(0.0);
        for (i, sample) in samples[samples.len() - take..].iter().enumerate() {
            self.input[pad + i] = sample * self.window[pad + i];
        }

        if let Err(err) = self.r2c.process(&mut self.input, &mut self.spectrum) {
            warn!("analyser fft failed: {}", err);
            return vec![0; self.frequency_bin_count()];
        }

        let (smoothing, min_decibels) = (self.smoothing, self.min_decibels);
        let range = self.max_decibels - min_decibels;
        let scale = 1.0 / n as f32;
        self.smoothed
            .iter_mut()
            .zip(self.spectrum.iter())
            .map(|(previous, bin)| {
                let magnitude = bin.norm() * scale;
                *previous = smoothing * *previous + (1.0 - smoothing) * magnitude;
                let db = if *previous > 0.0 {
                    20.0 * previous.log10()
                } else {
                    f32::NEG_INFINITY
                };
                let scaled = 255.0 * (db - min_decibels) / range;
                scaled.clamp(0.0, 255.0) as u8
            })
            .collect()
    }

    /// Clear smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }
}

/// Root mean square of byte bins normalized to `[0, 1]`.
pub fn rms_level(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: f32 = bins
        .iter()
        .map(|b| {
            let v = *b as f32 / 255.0;
            v * v
        })
        .sum();
    (sum / bins.len() as f32).sqrt()
}

fn blackman_window(size: usize) -> Vec<f32> {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    (0..size)
        .map(|i| {
            let x = i as f32 / size as f32;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyser() -> Analyser {
        Analyser::new(256, 0.8, -100.0, -30.0)
    }

    fn sine(freq: f32, rate: f32, len: usize, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (2.0 * PI * freq * i as f32 / rate).sin())
            .collect()
    }

    #[test]
    fn silence_reads_zero() {
        let mut analyser = analyser();
        let bins = analyser.byte_frequency_data(&[0.0; 256]);
        assert_eq!(bins.len(), 128);
        assert!(bins.iter().all(|b| *b == 0));
        assert_eq!(rms_level(&bins), 0.0);
    }

    #[test]
    fn tone_raises_its_bin() {
        let mut analyser = analyser();
        // Bin 16 of a 256-point FFT at 44.1kHz.
        let tone = sine(16.0 * 44_100.0 / 256.0, 44_100.0, 256, 0.002);
        let mut bins = Vec::new();
        for _ in 0..20 {
            bins = analyser.byte_frequency_data(&tone);
        }
        let peak = bins
            .iter()
            .enumerate()
            .max_by_key(|(_, b)| **b)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 16);
        assert!(rms_level(&bins) > 0.0);
    }

    #[test]
    fn smoothing_lags_behind_the_signal() {
        let mut analyser = analyser();
        let tone = sine(2_000.0, 44_100.0, 256, 0.8);
        let first = rms_level(&analyser.byte_frequency_data(&tone));
        let mut settled = first;
        for _ in 0..30 {
            settled = rms_level(&analyser.byte_frequency_data(&tone));
        }
        assert!(settled > first);

        analyser.reset();
        assert_eq!(rms_level(&analyser.byte_frequency_data(&tone)), first);
    }

    #[test]
    fn rms_of_full_scale_bins_is_one() {
        assert!((rms_level(&[255; 8]) - 1.0).abs() < 1e-6);
        assert_eq!(rms_level(&[]), 0.0);
    }

    #[test]
    fn odd_sizes_round_up_to_power_of_two() {
        assert_eq!(Analyser::new(200, 0.8, -100.0, -30.0).fft_size(), 256);
        assert_eq!(Analyser::new(1, 0.8, -100.0, -30.0).fft_size(), 32);
    }
}
