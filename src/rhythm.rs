//! Rhythm and flow-direction state machine.

use crate::analyzer::FrameSample;
use crate::tuning::RhythmTuning;

/// Longest frame step the simulation will integrate.
pub const MAX_DT: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    pub fn sign(self) -> f32 {
        match self {
            Self::Forward => 1.0,
            Self::Reverse => -1.0,
        }
    }
}

/// A play/pause transition observed between frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayEdge {
    Resumed,
    Paused,
}

/// Derived per-frame values that downstream stages read.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RhythmOutput {
    pub rhythm: f32,
    pub flow_rate: f32,
    pub bass_norm: f32,
    pub bass_delta: f32,
    pub beat_strength: f32,
    pub treble_dom: f32,
    pub noise_factor: f32,
    pub kicked: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RhythmState {
    pub reverse_build: f32,
    pub sticky_direction: Direction,
    pub flow_direction: f32,
    pub flow_rate: f32,
    pub beat_impulse: f32,
    pub energy_envelope: f32,
    pub energy_prev: f32,
    pub icon_beat_envelope: f32,
    pub vocal_envelope: f32,
    pub activity: f32,
    pub bass_norm_prev: f32,
    pub play_blend: f32,
    /// Seconds left in the post-resume stabilization window.
    pub resume_hold_s: f32,
    pub last_playing: Option<bool>,
    pub last: RhythmOutput,
}

impl Default for RhythmState {
    fn default() -> Self {
        Self {
            reverse_build: 0.0,
            sticky_direction: Direction::Forward,
            flow_direction: 1.0,
            flow_rate: 0.0,
            beat_impulse: 0.0,
            energy_envelope: 0.0,
            energy_prev: 0.0,
            icon_beat_envelope: 0.0,
            vocal_envelope: 0.0,
            activity: 0.0,
            bass_norm_prev: 0.0,
            play_blend: 0.0,
            resume_hold_s: 0.0,
            last_playing: None,
            last: RhythmOutput::default(),
        }
    }
}

impl RhythmState {
    /// Clears the per-song fields; direction and build carry over.
    pub fn reset_song(&mut self) {
        self.bass_norm_prev = 0.0;
        self.activity = 0.0;
    }
}

pub struct RhythmMachine {
    tuning: RhythmTuning,
}

impl RhythmMachine {
    pub fn new(tuning: RhythmTuning) -> Self {
        Self { tuning }
    }

    pub fn tuning(&self) -> &RhythmTuning {
        &self.tuning
    }

    /// Record the play flag and apply the direction bias of a transition, if any.
    pub fn observe_playing(&self, st: &mut RhythmState, playing: bool) -> Option<PlayEdge> {
        let Some(was) = st.last_playing else {
            st.last_playing = Some(playing);
            st.play_blend = if playing { 1.0 } else { 0.0 };
            return None;
        };
        st.last_playing = Some(playing);
        if was == playing {
            return None;
        }

        st.icon_beat_envelope = (st.icon_beat_envelope + 0.25).min(1.0);
        let mag = st.flow_direction.abs().max(0.3);
        if playing {
            st.resume_hold_s = self.tuning.resume_window_s;
            st.reverse_build = st.reverse_build.min(0.2);
            st.sticky_direction = Direction::Forward;
            st.flow_direction = mag.min(1.0);
            Some(PlayEdge::Resumed)
        } else {
            st.resume_hold_s = 0.0;
            st.reverse_build = st.reverse_build.max(0.9);
            st.sticky_direction = Direction::Reverse;
            st.flow_direction = -mag.min(1.0);
            Some(PlayEdge::Paused)
        }
    }

    /// Advance one frame. `interference` is the pointer glow level (hover slows the flow).
    ///
    /// With `dt == 0` no time passes and the state is left untouched.
    pub fn update(
        &self,
        st: &mut RhythmState,
        sample: &FrameSample,
        playing: bool,
        dt: f32,
        interference: f32,
    ) -> RhythmOutput {
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_DT) } else { 0.0 };
        if dt <= 0.0 {
            return st.last;
        }
        let tn = &self.tuning;

        let bass = sample.bass.max(0.0);
        let mid = sample.mid.max(0.0);
        let treble = sample.treble.max(0.0);
        let rms = sample.rms.max(0.0);

        let target_play = if playing { 1.0 } else { 0.0 };
        st.play_blend += (target_play - st.play_blend) * 0.015;

        let bass_norm = sample.relative_to_mean(bass);
        let bass_delta = (bass_norm - st.bass_norm_prev).max(0.0);
        let noise = sample.noise_factor();

        let heavy = bass_norm > 1.1 && bass_delta > 0.035;
        let normal = bass_norm > 0.65 && bass_delta > 0.02;
        let kicked = (heavy || normal) && st.activity > 0.04;
        if kicked {
            let add_core = if heavy { 1.0 } else { 0.65 };
            st.icon_beat_envelope = (st.icon_beat_envelope + add_core * (1.0 - 0.6 * noise)).min(1.0);
            let pull_core = if heavy { tn.heavy_kick_pull } else { tn.normal_kick_pull };
            let pull = pull_core * (1.0 - 0.5 * noise);
            st.beat_impulse = (st.beat_impulse + pull).min(1.0);
            st.reverse_build *= 1.0 - 0.25 * pull;
        }
        st.icon_beat_envelope *= 0.92;
        st.beat_impulse *= 0.92;

        // Intro/outro detection leans on bass.
        let energy_instant = (0.6 * bass + 0.3 * mid + 0.1 * treble + 0.25 * rms).clamp(0.0, 1.0);
        st.energy_envelope = st.energy_envelope * 0.9 + energy_instant * 0.1;
        let energy_slope = st.energy_envelope - st.energy_prev;
        st.energy_prev = st.energy_envelope;

        let vocal_dom = sample.relative_to_mean(sample.vocal.max(0.0));
        st.vocal_envelope = st.vocal_envelope * 0.85 + vocal_dom * 0.15;

        let target_activity = ((0.65 * bass + 0.35 * rms) * 4.5).min(1.0);
        st.activity = st.activity * 0.9 + target_activity * 0.1;

        let treble_dom = sample.relative_to_mean(treble);
        let v = st.vocal_envelope.clamp(0.0, 1.0);
        let weak = ((0.5 - v) / 0.5).max(0.0);
        let strong = ((v - 0.7) / 0.3).max(0.0);
        let vocal_factor = 1.0 - 0.20 * weak + 0.08 * strong;
        let rhythm_raw = (0.78 * bass + 0.25 * rms + 0.54 * bass_delta) * vocal_factor
            - 0.25 * (treble_dom - 0.3).max(0.0);
        let rhythm = rhythm_raw.clamp(0.0, 1.0);

        // Reverse-build accumulator.
        let want_reverse = !playing || rhythm < tn.low_thresh;
        let under = if playing {
            ((tn.low_thresh - rhythm) / tn.low_thresh).max(0.0)
        } else {
            1.0
        };
        let build_rate = tn.build_rate_base * (0.6 + 1.2 * under);
        let decay_boost = if playing && rhythm > tn.high_thresh { tn.decay_boost } else { 0.0 };
        let decay_rate = (tn.decay_base + decay_boost) * (1.0 + 0.5 * st.beat_impulse.clamp(0.0, 1.0));
        if want_reverse {
            st.reverse_build += build_rate * dt;
        } else {
            st.reverse_build -= decay_rate * dt;
        }
        st.reverse_build = st.reverse_build.clamp(0.0, 1.0);
        if !playing || (st.energy_envelope < 0.26 && energy_slope < -0.004) {
            let fade_boost = (0.26 - st.energy_envelope.max(0.0)) * 1.4;
            st.reverse_build = (st.reverse_build + fade_boost * dt).clamp(0.0, 1.0);
        }

        match st.sticky_direction {
            Direction::Forward if st.reverse_build > tn.sticky_enter => {
                st.sticky_direction = Direction::Reverse;
            }
            Direction::Reverse
                if st.reverse_build < tn.sticky_exit && (playing || rhythm > tn.low_thresh) =>
            {
                st.sticky_direction = Direction::Forward;
            }
            _ => {}
        }

        let vocal_pull = (st.vocal_envelope - 0.2).max(0.0) * 0.10;
        let raw_beat = st.beat_impulse.clamp(0.0, 1.0);
        let beat_gate = if playing && raw_beat > tn.beat_gate_min {
            (raw_beat - tn.beat_gate_min) / (1.0 - tn.beat_gate_min)
        } else {
            0.0
        };
        let beat_strength = beat_gate.powf(0.75) * (1.0 - 0.6 * noise);
        let impulse = beat_strength * 0.70 + vocal_pull * 0.8;

        let mut dir_wanted =
            0.55 * st.sticky_direction.sign() + 0.45 * (1.0 - 2.0 * st.reverse_build);
        let headroom = 1.0 - dir_wanted.abs();
        let toward = if dir_wanted < 0.0 { -1.0 } else { 1.0 };
        dir_wanted += toward * headroom * impulse.clamp(0.0, 1.0);
        if playing && st.resume_hold_s > 0.0 {
            dir_wanted = dir_wanted.max(tn.resume_floor);
        }
        st.resume_hold_s = (st.resume_hold_s - dt).max(0.0);
        let dir_wanted = dir_wanted.clamp(-1.0, 1.0);

        let ease = if dir_wanted > st.flow_direction {
            tn.dir_ease_rising
        } else {
            tn.dir_ease_falling
        };
        st.flow_direction = (st.flow_direction + (dir_wanted - st.flow_direction) * ease).clamp(-1.0, 1.0);
        let mut dir = st.flow_direction;

        // Speed: slow at low rhythm, fast at high rhythm.
        let tempo_scaled = rhythm.powf(1.5);
        let base_speed = if playing {
            0.24 + tempo_scaled * 0.90
        } else {
            0.12 + tempo_scaled * 0.42
        };
        let hover_slow = 1.0 - 0.3375 * interference.clamp(0.0, 1.0);
        let mut speed = base_speed * hover_slow.max(0.8);
        speed *= if playing { 0.38 + 0.62 * st.play_blend } else { 0.62 };

        // Never stall: keep a minimum absolute direction that grows with the build.
        let min_abs_dir = 0.08 + 0.38 * st.reverse_build;
        if dir.abs() < min_abs_dir {
            let prefer_reverse = !playing || st.reverse_build > 0.48 || rhythm < 0.16;
            dir = if prefer_reverse { -min_abs_dir } else { min_abs_dir };
            st.flow_direction = dir;
        }

        if dir < 0.0 {
            let reverse_extra = tn.reverse_extra_max * (1.0 - rhythm).max(0.0);
            let mut gain = (1.12 + 0.55 * st.reverse_build) * (1.0 + 0.6 * reverse_extra);
            gain *= tn.reverse_global_boost;
            let rev_vocal_bias = (st.vocal_envelope - 0.1).clamp(0.0, 1.0);
            gain *= 1.0 + 0.50 * rev_vocal_bias + 0.25 * treble_dom;
            let near_silent = rms < 0.06 || rhythm < 0.08;
            if !playing || near_silent {
                gain *= tn.reverse_paused_or_silent_boost;
            }
            speed *= gain;
            let cap = 1.15 * base_speed * (1.8 - 0.5 * rhythm);
            speed = speed.min(cap);
        }
        if dir > 0.0 {
            let silence = (1.0 - rhythm.max((rms * 6.0).min(1.0))).clamp(0.0, 1.0);
            speed *= 0.95 * (1.0 - 0.40 * silence);
            speed += 0.10 * beat_strength;
        }
        speed += 0.30 * beat_strength;
        if !playing || rhythm < 0.05 {
            let paused_mul = if playing { 1.0 } else { 1.35 };
            speed = (speed * paused_mul).max(0.26);
        }
        speed = speed.max(0.12);

        let target_rate = dir * speed;
        st.flow_rate += (target_rate - st.flow_rate) * tn.flow_rate_ease;
        st.bass_norm_prev = bass_norm;

        st.last = RhythmOutput {
            rhythm,
            flow_rate: st.flow_rate,
            bass_norm,
            bass_delta,
            beat_strength,
            treble_dom,
            noise_factor: noise,
            kicked,
        };
        st.last
    }
}
