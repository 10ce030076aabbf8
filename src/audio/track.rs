use std::f32::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DemoTrack {
    pub sample_rate: u32,
    pub seconds: f32,
    pub bpm: f32,
    pub seed: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Intro,
    Groove,
    Breakdown,
    Outro,
}

impl DemoTrack {
    pub fn new(sample_rate: u32, seconds: f32, bpm: f32) -> Self {
        Self {
            sample_rate: sample_rate.clamp(8_000, 192_000),
            seconds: seconds.clamp(4.0, 3_600.0),
            bpm: bpm.clamp(40.0, 240.0),
            seed: 0x5eed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn frames(&self) -> usize {
        (self.seconds * self.sample_rate as f32).round() as usize
    }

    pub fn section_at(&self, t: f32) -> Section {
        let x = t / self.seconds;
        if x < 0.15 {
            Section::Intro
        } else if (0.45..0.60).contains(&x) {
            Section::Breakdown
        } else if x >= 0.88 {
            Section::Outro
        } else {
            Section::Groove
        }
    }

    /// Mono samples in `-1..=1`.
    pub fn render(&self) -> Vec<f32> {
        let sr = self.sample_rate as f32;
        let n = self.frames();
        let beat = 60.0 / self.bpm;
        let mut rng = fastrand::Rng::with_seed(self.seed);
        let roots = [55.0f32, 55.0, 43.65, 49.0];

        let mut out = Vec::with_capacity(n);
        let mut bass_phase = 0.0f32;
        for i in 0..n {
            let t = i as f32 / sr;
            let section = self.section_at(t);
            let beat_pos = t / beat;
            let in_beat = beat_pos.fract() * beat;
            let bar = (beat_pos / 4.0) as usize;
            let root = roots[bar % roots.len()];

            let pad = pad(t, root * 4.0);
            let mut v = match section {
                Section::Intro => pad * 0.55 * (t / (self.seconds * 0.15)).clamp(0.0, 1.0),
                Section::Breakdown => pad * 0.6 + lead(t, root * 8.0, beat_pos) * 0.18,
                Section::Groove | Section::Outro => {
                    let kick = kick(in_beat);
                    let off = (beat_pos + 0.5).fract() * beat;
                    let hat = (-off * 60.0).exp() * (rng.f32() * 2.0 - 1.0) * 0.16;
                    bass_phase += 2.0 * PI * root / sr;
                    let pump = 1.0 - (-in_beat * 9.0).exp();
                    let bass = bass_phase.sin() * 0.32 * pump;
                    kick * 0.9 + bass + hat + pad * 0.22
                }
            };
            if section == Section::Outro {
                let x = ((t / self.seconds - 0.88) / 0.12).clamp(0.0, 1.0);
                v *= (1.0 - x).powf(1.6);
            }
            out.push((v * 0.8).clamp(-1.0, 1.0));
        }
        out
    }
}

fn kick(t: f32) -> f32 {
    let f = 48.0 + 110.0 * (-t * 28.0).exp();
    (2.0 * PI * f * t).sin() * (-t * 7.5).exp()
}

fn pad(t: f32, f: f32) -> f32 {
    let a = (2.0 * PI * f * t).sin();
    let b = (2.0 * PI * f * 1.5 * t + 0.3 * (t * 0.4).sin()).sin();
    let c = (2.0 * PI * f * 2.0 * t).sin();
    (a * 0.5 + b * 0.3 + c * 0.15) * (0.8 + 0.2 * (t * 0.7).sin())
}

// Sung-range line that moves every beat.
fn lead(t: f32, f: f32, beat_pos: f32) -> f32 {
    let steps = [1.0f32, 1.122, 1.26, 1.498];
    let step = steps[(beat_pos as usize) % steps.len()];
    let vib = 1.0 + 0.006 * (2.0 * PI * 5.5 * t).sin();
    (2.0 * PI * f * step * vib * t).sin() * (1.0 - (-beat_pos.fract() * 12.0).exp())
}
