use crate::field::{Band, BandGeometry, smoothstep};
use crate::front::ColorFront;
use crate::spring::PointerState;

const TIP_LEN: f32 = 0.18 * 0.75;
const BASE_GREY: f32 = 215.0;
const PEAK_GREY: f32 = 248.0;

/// One stroked line segment with round caps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: (f32, f32),
    pub to: (f32, f32),
    pub width: f32,
    pub rgb: [u8; 3],
    pub alpha: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct ShadeParams<'a> {
    pub playing: bool,
    pub activity: f32,
    /// Post-gain volume actually heard, `0..=1`.
    pub effective_volume: f32,
    pub rms: f32,
    pub front: &'a ColorFront,
    pub pointer: &'a PointerState,
    pub surface_width: f32,
    pub track_height: f32,
}

impl ShadeParams<'_> {
    /// Saturation gate: full by 15% effective volume, never above the volume gate.
    pub fn saturation(&self) -> f32 {
        let vol = self.effective_volume.clamp(0.0, 1.0);
        let signal = (self.rms * 4.0).clamp(0.0, 1.0);
        let vol_sat = smoothstep(0.0, 0.15, vol);
        let sig_sat = smoothstep(0.10, 0.45, signal);
        vol_sat.max(sig_sat * vol_sat).clamp(0.0, 1.0)
    }

    fn glow_at(&self, x: f32, y: f32) -> f32 {
        let Some(px) = self.pointer.x else {
            return 0.0;
        };
        let dx = x - px;
        let sigma = (self.surface_width * 0.16).max(14.0);
        let gx = (-(dx * dx) / (2.0 * sigma * sigma)).exp();
        let gy = match self.pointer.y {
            Some(py) => {
                let sy = (self.track_height * 2.2).max(12.0);
                (-((y - py) * (y - py)) / (2.0 * sy * sy)).exp()
            }
            None => 1.0,
        };
        let prox = gx * gy * self.pointer.interference.min(4.2);
        prox.powf(1.10).min(1.0)
    }
}

fn band_lift(band: Band) -> f32 {
    match band {
        Band::Bass => 0.16,
        Band::Mid => 0.13,
        Band::Treble => 0.10,
    }
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

fn channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

pub fn shade_band(geom: &BandGeometry, p: &ShadeParams<'_>) -> Vec<Segment> {
    let pts = &geom.points;
    if pts.len() < 2 {
        return Vec::new();
    }
    let base = geom.band.color();
    let activity = p.activity.clamp(0.0, 1.0);
    let base_alpha = (0.35 + 0.65 * activity).max(0.2);
    let sat = p.saturation();
    let vol = p.effective_volume.clamp(0.0, 1.0);
    let paused_grey = mix(BASE_GREY, PEAK_GREY, 0.45).round();
    let min_while_playing = 0.8 * ((vol - 0.01) / 0.99).clamp(0.0, 1.0);
    let edge_whiten_base = 0.38 * 0.7;
    let quiet_boost = (1.0 - sat).max(0.0);

    let mut out = Vec::with_capacity(pts.len() - 1);
    for pair in pts.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let t = b.t;

        let left = 1.0 - smoothstep(0.02, TIP_LEN, t);
        let right = 1.0 - smoothstep(0.02, TIP_LEN, 1.0 - t);
        let tip_white = left.max(right);
        let edge_whiten = (tip_white * (edge_whiten_base + 0.16 * quiet_boost)).max(0.0);

        let spatial = p.front.gate_at(t);
        let lead = p.front.lead_gate_at(t);
        let mut color_mix = (sat * (1.0 - edge_whiten)).clamp(0.0, 1.0) * spatial;
        let min_mix = if p.playing { min_while_playing * (1.0 - tip_white) } else { 0.0 };
        color_mix = color_mix.max(0.18 * min_mix * lead);

        let glow = p.glow_at(b.x, b.y);
        let alpha = base_alpha * (1.0 + 0.24 * glow) * if p.playing { 1.0 } else { 0.6 };
        color_mix = (color_mix + band_lift(geom.band) * glow).min(1.0);

        let widen = (std::f32::consts::PI * t.clamp(0.0, 1.0)).sin().max(0.0).powf(0.6);
        let base_white = mix(255.0, paused_grey, 0.12 * widen).round();
        let rgb = [0, 1, 2].map(|i| {
            let tinted = mix(255.0, base[i] as f32, color_mix * 0.9).round();
            channel(mix(base_white, tinted, color_mix))
        });

        out.push(Segment {
            from: (a.x, a.y),
            to: (b.x, b.y),
            width: b.width,
            rgb,
            alpha: alpha.clamp(0.0, 1.0),
        });
    }
    out
}
