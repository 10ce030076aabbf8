use crate::analyzer::FrameSample;
use crate::rhythm::{RhythmOutput, RhythmState};
use crate::spring::PointerState;
use std::collections::VecDeque;
use std::f32::consts::PI;

pub const UI_SCALE: f32 = 1.7 * 1.2;
pub const SLIDER_DOMINANCE: f32 = 1.68;
pub const REFERENCE_HEIGHT: f32 = 56.0;
pub const PLUCK_CAPACITY: usize = 6;
/// Exponential time constant of a pluck's amplitude.
pub const PLUCK_DECAY_S: f32 = 0.9;

pub const GREY_TRACK: [u8; 3] = [156, 163, 175];
pub const WHITE: [u8; 3] = [255, 255, 255];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Band {
    Bass,
    Mid,
    Treble,
}

impl Band {
    pub const fn all() -> [Self; 3] {
        [Self::Bass, Self::Mid, Self::Treble]
    }

    pub fn index(self) -> usize {
        match self {
            Self::Bass => 0,
            Self::Mid => 1,
            Self::Treble => 2,
        }
    }

    pub fn color(self) -> [u8; 3] {
        match self {
            Self::Bass => [251, 191, 36],
            Self::Mid => [239, 68, 68],
            Self::Treble => [59, 130, 246],
        }
    }

    /// Vertical split direction: bass below, treble above.
    fn split_sign(self) -> f32 {
        match self {
            Self::Bass => -1.0,
            Self::Mid => 0.0,
            Self::Treble => 1.0,
        }
    }

    fn phase_offset(self) -> f32 {
        match self {
            Self::Bass => 0.0,
            Self::Mid => 0.28,
            Self::Treble => 0.56,
        }
    }

    fn base_width(self) -> f32 {
        match self {
            Self::Bass => 1.2 * UI_SCALE,
            Self::Mid => 1.0 * UI_SCALE,
            Self::Treble => 0.85 * UI_SCALE,
        }
    }

    // (sigma multiplier, amplitude multiplier) of the pointer wobble
    fn hover_shape(self) -> (f32, f32) {
        match self {
            Self::Bass => (1.25, 0.7),
            Self::Mid => (1.1, 0.55),
            Self::Treble => (0.95, 0.45),
        }
    }

    fn pluck_amp(self) -> f32 {
        match self {
            Self::Bass => 1.0,
            Self::Mid => 0.85,
            Self::Treble => 0.7,
        }
    }

    fn inflate(self) -> f32 {
        match self {
            Self::Bass => 0.4,
            Self::Mid => 0.35,
            Self::Treble => 0.3,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PluckEvent {
    pub x: f32,
    /// Engine clock time of the pluck, in seconds.
    pub at_s: f32,
    pub intensity: f32,
}

impl PluckEvent {
    pub fn decay(&self, now_s: f32) -> f32 {
        let age = (now_s - self.at_s).max(0.0);
        (-age / PLUCK_DECAY_S).exp()
    }
}

/// Most recent plucks, oldest first. Pushing past capacity evicts the oldest.
#[derive(Clone, Debug, Default)]
pub struct PluckBuffer {
    events: VecDeque<PluckEvent>,
}

impl PluckBuffer {
    pub fn push(&mut self, ev: PluckEvent) {
        self.events.push_back(PluckEvent {
            intensity: ev.intensity.clamp(0.0, 1.0),
            ..ev
        });
        while self.events.len() > PLUCK_CAPACITY {
            self.events.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PluckEvent> {
        self.events.iter()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandPhases {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

impl BandPhases {
    /// Advance by the signed flow rate; louder bands move faster.
    pub fn advance(&mut self, sample: &FrameSample, flow_rate: f32) {
        let rms = sample.rms;
        self.bass += (0.005 + sample.bass * 0.016 + rms * 0.008) * flow_rate;
        self.mid += (0.008 + sample.mid * 0.020 + rms * 0.009) * flow_rate;
        self.treble += (0.010 + sample.treble * 0.025 + rms * 0.010) * flow_rate;
    }

    pub fn get(&self, band: Band) -> f32 {
        match band {
            Band::Bass => self.bass,
            Band::Mid => self.mid,
            Band::Treble => self.treble,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BandPoint {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub t: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BandGeometry {
    pub band: Band,
    pub points: Vec<BandPoint>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IconGlyph {
    Play,
    Pause,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IconGeometry {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub pulse_scale: f32,
    pub glyph: IconGlyph,
    pub right: f32,
    pub bar_width: f32,
    pub bar_gap: f32,
    /// Vertical inset of the glyph inside its box, before pulse scaling.
    pub inset: f32,
}

impl Default for IconGeometry {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            w: 0.0,
            h: 0.0,
            pulse_scale: 1.0,
            glyph: IconGlyph::Play,
            right: 0.0,
            bar_width: 0.0,
            bar_gap: 0.0,
            inset: 0.0,
        }
    }
}

impl IconGeometry {
    pub fn contains(&self, x: f32, y: f32, margin: f32) -> bool {
        x >= self.x - margin
            && x <= self.x + self.w + margin
            && y >= self.y - margin
            && y <= self.y + self.h + margin
    }

    pub fn half_width(&self) -> f32 {
        self.w * 0.5
    }

    pub fn center_y(&self) -> f32 {
        self.y + self.h * 0.5
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldGeometry {
    pub width: f32,
    pub height: f32,
    pub mid_y: f32,
    pub track_height: f32,
    pub wave_end_x: f32,
    pub bands: [BandGeometry; 3],
    /// Back-to-front paint order; rotates so no band is always on top.
    pub draw_order: [Band; 3],
    pub icon: IconGeometry,
    /// `(start_x, end_x)` of the dim line beyond the icon.
    pub remainder: Option<(f32, f32)>,
    pub remainder_width: f32,
}

impl FieldGeometry {
    pub fn band(&self, band: Band) -> &BandGeometry {
        &self.bands[band.index()]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldLayout {
    pub scale: f32,
    pub points: usize,
}

impl Default for FieldLayout {
    fn default() -> Self {
        Self {
            scale: 1.0,
            points: (140.0 * UI_SCALE * SLIDER_DOMINANCE * 1.5).round() as usize,
        }
    }
}

impl FieldLayout {
    pub fn for_surface(width: usize, height: usize) -> Self {
        let reference = Self::default();
        Self {
            scale: (height as f32 / REFERENCE_HEIGHT).max(0.05),
            points: (width.saturating_mul(3)).clamp(48, reference.points),
        }
    }

    pub fn track_height(&self) -> f32 {
        UI_SCALE * (SLIDER_DOMINANCE * 0.55) * self.scale
    }

    fn icon_size(&self) -> f32 {
        18.0 * UI_SCALE * 0.75 * 1.5 * 0.7 * self.scale
    }

    fn bar(&self) -> f32 {
        (4.0 * UI_SCALE * 0.75).max(4.0) * self.scale
    }
}

pub struct FieldInputs<'a> {
    pub width: f32,
    pub height: f32,
    pub volume: f32,
    pub playing: bool,
    pub dragging: bool,
    pub now_s: f32,
    pub sample: &'a FrameSample,
    pub rhythm: &'a RhythmState,
    pub out: &'a RhythmOutput,
    pub pointer: &'a PointerState,
    pub phases: &'a BandPhases,
    pub plucks: &'a PluckBuffer,
}

/// Ramp that opens the split and amplitude between 3% and 10% volume.
pub fn volume_gate(volume: f32) -> f32 {
    smoothstep(0.03, 0.1, volume)
}

/// Normalized volume as drawn: clamped, with a dead zone at the very bottom.
pub fn effective_slider_volume(volume: f32) -> f32 {
    let v = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
    if v < 0.005 { 0.0 } else { v }
}

struct BandShape {
    cycles: f32,
    amp: f32,
    phase: f32,
}

pub fn update_icon_pulse(pulse: &mut f32, sample: &FrameSample) {
    let broad = 0.35 * sample.bass + 0.35 * sample.mid + 0.30 * sample.treble;
    let target = ((broad + sample.rms * 0.30) * 1.25).min(1.0);
    *pulse = *pulse * 0.82 + target * 0.18;
}

pub fn generate(layout: &FieldLayout, icon_pulse: f32, inp: &FieldInputs<'_>) -> FieldGeometry {
    let s = layout.scale;
    let width = inp.width.max(0.0);
    let span_w = width.max(1.0);
    let mid_y = (inp.height * 0.5).floor();
    let track_h = layout.track_height();
    let vol = effective_slider_volume(inp.volume);
    let vol_gate = volume_gate(vol);
    let sample = inp.sample;
    let rms = sample.rms;
    let st = inp.rhythm;

    let inactive_scale = 0.65 + st.activity * 0.35;
    let tighten = 0.64;
    let pause_amp = 1.0 - 0.35 * (1.0 - st.play_blend);
    let amp_common = pause_amp * (0.25 + 0.75 * vol_gate) * tighten * inactive_scale * s;
    let rot = (inp.now_s / 24.0).rem_euclid(1.0);

    let shapes = [
        BandShape {
            cycles: 0.58 + sample.bass * 0.55 + rms * 0.07 + rot * 0.15,
            amp: amp_common * 0.70 * (10.0 + sample.bass * 12.0 + rms * 9.0).min(24.0),
            phase: inp.phases.bass + Band::Bass.phase_offset(),
        },
        BandShape {
            cycles: 0.98 + sample.mid * 0.80 + rms * 0.09 + rot * 0.15,
            amp: amp_common * 0.68 * (8.0 + sample.mid * 9.0 + rms * 7.0).min(20.0),
            phase: inp.phases.mid + Band::Mid.phase_offset(),
        },
        BandShape {
            cycles: 1.68 + sample.treble * 1.10 + rms * 0.11 + rot * 0.15,
            amp: amp_common * 0.66 * (6.0 + sample.treble * 7.0 + rms * 6.0).min(16.0),
            phase: inp.phases.treble + Band::Treble.phase_offset(),
        },
    ];

    // Icon, flush against the volume point.
    let icon_size = layout.icon_size();
    let pulse_scale = if inp.playing {
        1.0 + 0.06 * 1.15 * icon_pulse + 0.16 * 1.15 * st.icon_beat_envelope
    } else {
        1.10
    };
    let half_h = icon_size * pulse_scale * 0.5;
    let wave_end_x = (vol * width).clamp(0.0, width);
    let bar_w = layout.bar();
    let gap = layout.bar();
    let (glyph, glyph_w) = if inp.playing {
        (IconGlyph::Pause, bar_w + gap + bar_w)
    } else {
        (IconGlyph::Play, bar_w + gap + bar_w - 3.0 * s)
    };
    let icon_right = wave_end_x + glyph_w * pulse_scale;
    let knob_y = mid_y.round() + 0.5;
    let icon = IconGeometry {
        x: wave_end_x,
        y: knob_y - half_h,
        w: icon_size * pulse_scale,
        h: half_h * 2.0,
        pulse_scale,
        glyph,
        right: icon_right,
        bar_width: bar_w,
        bar_gap: gap,
        inset: 3.0 * UI_SCALE * 0.75 * s,
    };

    let remainder_start = wave_end_x.max(icon_right);
    let remainder = (remainder_start < width).then_some((remainder_start, width));

    let ctx = BandCtx {
        layout,
        inp,
        span_w,
        mid_y,
        track_h,
        vol_gate,
        end_x: wave_end_x,
    };
    let bands = Band::all().map(|band| {
        let shape = &shapes[band.index()];
        BandGeometry {
            band,
            points: ctx.points(band, shape),
        }
    });

    let orders = [
        [Band::Bass, Band::Mid, Band::Treble],
        [Band::Mid, Band::Treble, Band::Bass],
        [Band::Treble, Band::Bass, Band::Mid],
    ];
    let order_idx = ((inp.now_s / 4.0).floor().max(0.0) as usize) % orders.len();

    FieldGeometry {
        width,
        height: inp.height,
        mid_y,
        track_height: track_h,
        wave_end_x,
        bands,
        draw_order: orders[order_idx],
        icon,
        remainder,
        remainder_width: (track_h * 0.65).max(1.0),
    }
}

struct BandCtx<'a, 'b> {
    layout: &'a FieldLayout,
    inp: &'a FieldInputs<'b>,
    span_w: f32,
    mid_y: f32,
    track_h: f32,
    vol_gate: f32,
    end_x: f32,
}

impl BandCtx<'_, '_> {
    fn points(&self, band: Band, shape: &BandShape) -> Vec<BandPoint> {
        let end_x = self.end_x;
        if end_x <= 0.0 {
            return Vec::new();
        }
        let n = self.layout.points.max(1);
        let s = self.layout.scale;
        let inp = self.inp;
        let w = self.span_w;
        let pointer = inp.pointer;
        let st = inp.rhythm;
        let tempo = inp.out.rhythm;
        let shift = if inp.dragging { 0.0 } else { pointer.spring_position * 0.5 * s };
        let span = end_x.max(1.0);
        let (sigma_mul, hover_amp_mul) = band.hover_shape();
        let hover_sigma = (36.0 * s).max(w * 0.36 * sigma_mul);
        let hover_level = pointer.interference.min(1.4);

        let pluck_speed = (36.0 + 340.0 * tempo) * s * (0.8 + 0.2 * st.play_blend);
        let pluck_sigma = (18.0 * s).max(w * (0.10 - 0.05 * tempo));
        let live_plucks: Vec<(PluckEvent, f32, f32)> = inp
            .plucks
            .iter()
            .filter_map(|p| {
                let age = (inp.now_s - p.at_s).max(0.0);
                let decay = p.decay(inp.now_s);
                let amp = band.pluck_amp() * p.intensity * (0.5 + 0.8 * tempo) * decay * s;
                (amp > 1e-4).then_some((*p, age, amp))
            })
            .collect();

        let vocal_split =
            1.0 + 0.63 * (st.vocal_envelope - 0.15).max(0.0) * (0.5 + 0.5 * st.play_blend);
        let split_px = if pointer.is_present() { 7.5 } else { 6.5 } * s;
        let y_sigma = (6.0 * s).max(self.track_h * 2.0);
        let inflate_sigma = (28.0 * s).max(w * 0.14);
        let base_w = band.base_width() * s;
        let min_w = self.track_h;

        let mut out = Vec::with_capacity(n + 1);
        for i in 0..=n {
            let x = (i as f32 / n as f32) * end_x;
            let pulled = (x + shift) / w;
            let wv = 2.0 * PI * (pulled * shape.cycles + shape.phase);
            let env_base = x / span;
            let arch = sin_pos(PI * env_base.min(1.0));
            let env = arch.powf(1.05);

            let mut ripple = 0.0f32;
            if let Some(px) = pointer.x {
                let dx = x - px;
                let g = (-(dx * dx) / (2.0 * hover_sigma * hover_sigma)).exp();
                let wobble = (2.0 * PI * (pulled * 1.2 + shape.phase * 0.18)).sin();
                ripple += wobble * 7.4 * s * g.powf(0.8) * hover_level * hover_amp_mul;
            }
            for (p, age, amp) in &live_plucks {
                let phase = (2.0 * PI * (age * (1.2 + 1.8 * tempo) + shape.phase * 0.15)).sin();
                for fx in [p.x - pluck_speed * age, p.x + pluck_speed * age] {
                    let d = x - fx;
                    let gf = (-(d * d) / (2.0 * pluck_sigma * pluck_sigma)).exp();
                    ripple += gf * amp * phase;
                }
            }

            // Split the bands apart except at the outer 5% of each end.
            let edge_gate = ((x / w - 0.05) / 0.90).clamp(0.0, 1.0);
            let center_w = sin_pos(PI * edge_gate);
            let split_env = arch.powf(1.8);
            let split = band.split_sign()
                * center_w.powf(1.15)
                * split_env
                * split_px
                * self.vol_gate
                * vocal_split;
            let y0 = self.mid_y + wv.sin() * shape.amp * env + split;

            let y_weight = match pointer.y {
                Some(py) => (-((y0 - py) * (y0 - py)) / (2.0 * y_sigma * y_sigma)).exp(),
                None => 1.0,
            };
            let end_gate = sin_pos(PI * (x / end_x.max(1.0)).min(1.0)).powi(3);

            let thickness = arch.powf(1.25);
            let inflate = match pointer.x {
                Some(px) => (-((x - px) * (x - px)) / (2.0 * inflate_sigma * inflate_sigma)).exp(),
                None => 0.0,
            };
            let lw = (min_w + (base_w - min_w) * thickness) * (1.0 + band.inflate() * inflate);

            out.push(BandPoint {
                x,
                y: y0 + ripple * y_weight * end_gate,
                width: lw,
                t: env_base,
            });
        }
        out
    }
}

// sin clamped at zero so fractional powers stay real at the span ends.
fn sin_pos(a: f32) -> f32 {
    a.sin().max(0.0)
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
