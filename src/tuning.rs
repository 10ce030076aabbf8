use std::fmt;
use std::path::Path;

/// Thresholds, gains and easing rates for the rhythm/direction state machine.
///
/// The defaults were tuned by ear; treat them as opaque knobs. A tuning file can
/// override any field by name (`low_thresh = 0.2`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RhythmTuning {
    /// Rhythm below which reverse starts building.
    pub low_thresh: f32,
    pub high_thresh: f32,
    /// Reverse build-up rate (1/s) under low rhythm or pause.
    pub build_rate_base: f32,
    pub decay_base: f32,
    pub decay_boost: f32,
    pub beat_gate_min: f32,
    pub sticky_enter: f32,
    pub sticky_exit: f32,
    pub reverse_extra_max: f32,
    pub reverse_global_boost: f32,
    pub reverse_paused_or_silent_boost: f32,
    pub heavy_kick_pull: f32,
    pub normal_kick_pull: f32,
    pub dir_ease_rising: f32,
    pub dir_ease_falling: f32,
    pub flow_rate_ease: f32,
    /// Seconds after a resume during which the direction is floored.
    pub resume_window_s: f32,
    pub resume_floor: f32,
}

impl Default for RhythmTuning {
    fn default() -> Self {
        Self {
            low_thresh: 0.18,
            high_thresh: 0.26,
            build_rate_base: 1.45,
            decay_base: 0.28,
            decay_boost: 0.45,
            beat_gate_min: 0.08,
            sticky_enter: 0.16,
            sticky_exit: 0.10,
            reverse_extra_max: 1.6,
            reverse_global_boost: 2.0,
            reverse_paused_or_silent_boost: 2.6,
            heavy_kick_pull: 0.55,
            normal_kick_pull: 0.35,
            dir_ease_rising: 0.16,
            dir_ease_falling: 0.12,
            flow_rate_ease: 0.14,
            resume_window_s: 0.8,
            resume_floor: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuningError {
    Io(String),
    Parse { line: usize, message: String },
    Invalid(String),
}

impl fmt::Display for TuningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
            Self::Parse { line, message } => write!(f, "parse error at line {line}: {message}"),
            Self::Invalid(msg) => write!(f, "invalid tuning: {msg}"),
        }
    }
}

impl std::error::Error for TuningError {}

impl RhythmTuning {
    /// Load overrides from `path`. A missing path (or missing file) yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, TuningError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = match std::fs::read_to_string(path) {
            Ok(v) => v,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("tuning file {} not found; using defaults", path.display());
                return Ok(Self::default());
            }
            Err(err) => return Err(TuningError::Io(err.to_string())),
        };
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, TuningError> {
        let mut tuning = Self::default();
        for (line_idx, raw) in text.lines().enumerate() {
            let line_no = line_idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key_raw, value_raw)) = line.split_once('=') else {
                return Err(TuningError::Parse {
                    line: line_no,
                    message: "expected <key>=<value>".to_string(),
                });
            };
            let key = key_raw.trim();
            let value = value_raw.trim().parse::<f32>().ok().filter(|v| v.is_finite());
            let Some(value) = value else {
                return Err(TuningError::Parse {
                    line: line_no,
                    message: format!("{key} must be a finite number"),
                });
            };
            let Some(slot) = tuning.field_mut(key) else {
                log::warn!("tuning line {line_no}: unknown key `{key}` ignored");
                continue;
            };
            *slot = value;
        }
        tuning.validate()?;
        Ok(tuning)
    }

    fn field_mut(&mut self, key: &str) -> Option<&mut f32> {
        let slot = match key {
            "low_thresh" => &mut self.low_thresh,
            "high_thresh" => &mut self.high_thresh,
            "build_rate_base" => &mut self.build_rate_base,
            "decay_base" => &mut self.decay_base,
            "decay_boost" => &mut self.decay_boost,
            "beat_gate_min" => &mut self.beat_gate_min,
            "sticky_enter" => &mut self.sticky_enter,
            "sticky_exit" => &mut self.sticky_exit,
            "reverse_extra_max" => &mut self.reverse_extra_max,
            "reverse_global_boost" => &mut self.reverse_global_boost,
            "reverse_paused_or_silent_boost" => &mut self.reverse_paused_or_silent_boost,
            "heavy_kick_pull" => &mut self.heavy_kick_pull,
            "normal_kick_pull" => &mut self.normal_kick_pull,
            "dir_ease_rising" => &mut self.dir_ease_rising,
            "dir_ease_falling" => &mut self.dir_ease_falling,
            "flow_rate_ease" => &mut self.flow_rate_ease,
            "resume_window_s" => &mut self.resume_window_s,
            "resume_floor" => &mut self.resume_floor,
            _ => return None,
        };
        Some(slot)
    }

    fn validate(&self) -> Result<(), TuningError> {
        if !(0.0 < self.low_thresh && self.low_thresh <= 1.0) {
            return Err(TuningError::Invalid("low_thresh must be in (0, 1]".to_string()));
        }
        if self.sticky_exit >= self.sticky_enter {
            return Err(TuningError::Invalid(
                "sticky_exit must be below sticky_enter".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.beat_gate_min) {
            return Err(TuningError::Invalid("beat_gate_min must be in [0, 1)".to_string()));
        }
        for (name, ease) in [
            ("dir_ease_rising", self.dir_ease_rising),
            ("dir_ease_falling", self.dir_ease_falling),
            ("flow_rate_ease", self.flow_rate_ease),
        ] {
            if !(0.0..=1.0).contains(&ease) {
                return Err(TuningError::Invalid(format!("{name} must be in [0, 1]")));
            }
        }
        Ok(())
    }
}
