//! Byte-domain analyser over the output tap, shaped like a browser `AnalyserNode`:
//! Blackman-windowed FFT, per-bin temporal smoothing, and decibels mapped onto
//! `0..=255` between `min_db` and `max_db`.

use crate::analyzer::AnalyserSnapshot;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

pub const FFT_SIZE: usize = 1024;
pub const SMOOTHING: f32 = 0.75;
pub const MIN_DB: f32 = -100.0;
pub const MAX_DB: f32 = -30.0;

pub struct AnalyserNode {
    sample_rate_hz: f32,
    ring: Vec<f32>,
    write_pos: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    fft_buf: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
    time_bytes: Vec<u8>,
    freq_bytes: Vec<u8>,
}

impl AnalyserNode {
    pub fn new(sample_rate_hz: u32) -> Self {
        let n = FFT_SIZE;
        let window = (0..n)
            .map(|i| {
                let x = i as f32 / n as f32;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        let mut planner = FftPlanner::<f32>::new();
        Self {
            sample_rate_hz: sample_rate_hz as f32,
            ring: vec![0.0; n],
            write_pos: 0,
            window,
            fft: planner.plan_fft_forward(n),
            fft_buf: vec![Complex { re: 0.0, im: 0.0 }; n],
            smoothed: vec![0.0; n / 2],
            time_bytes: vec![128; n],
            freq_bytes: vec![0; n / 2],
        }
    }

    pub fn push_samples(&mut self, samples: impl IntoIterator<Item = f32>) {
        let n = self.ring.len();
        for s in samples {
            self.ring[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % n;
        }
    }

    /// Recompute both byte buffers from the most recent `FFT_SIZE` samples.
    pub fn update(&mut self) {
        let n = self.ring.len();
        for i in 0..n {
            let s = self.ring[(self.write_pos + i) % n];
            self.time_bytes[i] = (128.0 * (1.0 + s)).clamp(0.0, 255.0) as u8;
            self.fft_buf[i] = Complex {
                re: s * self.window[i],
                im: 0.0,
            };
        }
        self.fft.process(&mut self.fft_buf);

        let range = MAX_DB - MIN_DB;
        for (k, (sm, byte)) in self.smoothed.iter_mut().zip(self.freq_bytes.iter_mut()).enumerate() {
            let mag = self.fft_buf[k].norm() / n as f32;
            *sm = SMOOTHING * *sm + (1.0 - SMOOTHING) * mag;
            let db = if *sm > 0.0 { 20.0 * sm.log10() } else { f32::NEG_INFINITY };
            *byte = (255.0 * (db - MIN_DB) / range).clamp(0.0, 255.0) as u8;
        }
    }

    pub fn snapshot(&self) -> AnalyserSnapshot<'_> {
        AnalyserSnapshot {
            time_domain: &self.time_bytes,
            frequency: &self.freq_bytes,
            sample_rate_hz: self.sample_rate_hz,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_reads_as_centered_time_and_empty_spectrum() {
        let mut a = AnalyserNode::new(48_000);
        a.push_samples(std::iter::repeat_n(0.0, FFT_SIZE));
        a.update();
        let snap = a.snapshot();
        assert!(snap.time_domain.iter().all(|&b| b == 128));
        assert!(snap.frequency.iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_lights_up_its_bin() {
        let sr = 48_000u32;
        let mut a = AnalyserNode::new(sr);
        let f = 187.5; // bin 4 at 1024 points
        for _ in 0..8 {
            a.push_samples((0..FFT_SIZE).map(|i| (2.0 * PI * f * i as f32 / sr as f32).sin() * 0.05));
            a.update();
        }
        let snap = a.snapshot();
        let peak = snap
            .frequency
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| **v)
            .map(|(i, _)| i);
        assert_eq!(peak, Some(4));
        assert!(snap.frequency[200] < snap.frequency[4]);
    }
}
