pub const BASS_HZ: (f32, f32) = (20.0, 250.0);
pub const MID_HZ: (f32, f32) = (250.0, 2000.0);
pub const TREBLE_HZ: (f32, f32) = (2000.0, 8000.0);
pub const VOCAL_HZ: (f32, f32) = (300.0, 3400.0);

/// Features derived fresh every frame. Band energies are normalized to `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSample {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub rms: f32,
    pub vocal: f32,
    pub bass_centroid_hz: f32,
    /// Peak/mean ratio over the whole spectrum; low values mean noisy, flat material.
    pub flatness: f32,
}

impl Default for FrameSample {
    fn default() -> Self {
        Self {
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            rms: 0.0,
            vocal: 0.0,
            bass_centroid_hz: 80.0,
            flatness: 2.0,
        }
    }
}

impl FrameSample {
    pub fn band_mean(&self) -> f32 {
        (self.bass + self.mid + self.treble) / 3.0
    }

    pub fn noise_factor(&self) -> f32 {
        ((1.6 - self.flatness) / 0.7).clamp(0.0, 1.0)
    }

    /// `value` relative to the band mean (or `value` itself when everything is silent).
    pub fn relative_to_mean(&self, value: f32) -> f32 {
        let mean = self.band_mean();
        if mean > 0.0 { value / mean } else { value }
    }
}

/// A non-blocking read of the latest analyser buffers.
///
/// `time_domain` holds unsigned bytes centred on 128; `frequency` holds magnitudes
/// mapped to `0..=255`, covering `0..sample_rate_hz / 2`.
#[derive(Debug, Clone, Copy)]
pub struct AnalyserSnapshot<'a> {
    pub time_domain: &'a [u8],
    pub frequency: &'a [u8],
    pub sample_rate_hz: f32,
}

pub struct SpectralAnalyzer {
    time: Vec<u8>,
    freq: Vec<u8>,
    rms: f32,
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralAnalyzer {
    pub fn new() -> Self {
        Self {
            time: Vec::new(),
            freq: Vec::new(),
            rms: 0.0,
        }
    }

    pub fn rms(&self) -> f32 {
        self.rms
    }

    pub fn analyze(&mut self, snapshot: Option<AnalyserSnapshot<'_>>) -> FrameSample {
        let Some(snap) = snapshot else {
            self.rms *= 0.96;
            return FrameSample {
                rms: self.rms,
                ..FrameSample::default()
            };
        };

        copy_resized(&mut self.time, snap.time_domain);
        copy_resized(&mut self.freq, snap.frequency);

        if self.time.is_empty() {
            self.rms *= 0.96;
        } else {
            let mut sum = 0.0f32;
            for &b in &self.time {
                let v = (b as f32 - 128.0) / 128.0;
                sum += v * v;
            }
            let rms = (sum / self.time.len() as f32).sqrt();
            self.rms = self.rms * 0.8 + rms * 0.2;
        }

        let mut sample = FrameSample {
            rms: self.rms,
            ..FrameSample::default()
        };
        if self.freq.is_empty() {
            return sample;
        }

        let nyquist = (snap.sample_rate_hz * 0.5).max(1.0);
        let data = &self.freq;

        let mut sum_all = 0.0f32;
        let mut peak_all = 0u8;
        for &v in data {
            sum_all += v as f32;
            peak_all = peak_all.max(v);
        }
        let mean_norm = sum_all / data.len().max(1) as f32 / 255.0;
        let peak_norm = peak_all as f32 / 255.0;
        sample.flatness = peak_norm / mean_norm.max(1e-6);

        sample.bass = range_average(data, nyquist, BASS_HZ);
        sample.mid = range_average(data, nyquist, MID_HZ);
        sample.treble = range_average(data, nyquist, TREBLE_HZ);
        sample.vocal = range_average(data, nyquist, VOCAL_HZ);
        sample.bass_centroid_hz = centroid(data, nyquist, BASS_HZ);
        sample
    }
}

fn copy_resized(dst: &mut Vec<u8>, src: &[u8]) {
    if dst.len() != src.len() {
        dst.resize(src.len(), 0);
    }
    dst.copy_from_slice(src);
}

fn bin_range(len: usize, nyquist: f32, (min_hz, max_hz): (f32, f32)) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let start = ((min_hz / nyquist) * len as f32).floor().max(0.0) as usize;
    let end = (((max_hz / nyquist) * len as f32).floor() as usize).min(len - 1);
    (end >= start).then_some((start, end))
}

fn range_average(data: &[u8], nyquist: f32, range: (f32, f32)) -> f32 {
    let Some((start, end)) = bin_range(data.len(), nyquist, range) else {
        return 0.0;
    };
    let sum: f32 = data[start..=end].iter().map(|&v| v as f32).sum();
    sum / (end - start + 1).max(1) as f32 / 255.0
}

fn centroid(data: &[u8], nyquist: f32, range: (f32, f32)) -> f32 {
    let fallback = (range.0 + range.1) * 0.5;
    let Some((start, end)) = bin_range(data.len(), nyquist, range) else {
        return fallback;
    };
    let len = data.len() as f32;
    let mut sum = 0.0f32;
    let mut weighted = 0.0f32;
    for (i, &mag) in data.iter().enumerate().take(end + 1).skip(start) {
        let hz = (i as f32 / len) * nyquist;
        sum += mag as f32;
        weighted += mag as f32 * hz;
    }
    if sum > 0.0 { weighted / sum } else { fallback }
}
