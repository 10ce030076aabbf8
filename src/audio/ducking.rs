use crate::audio::GainControl;
use crate::scrub::ScratchListener;
use std::sync::Arc;

const BEGIN_TAU_S: f32 = 0.02;
const UPDATE_TAU_S: f32 = 0.015;
const RESTORE_TAU_S: f32 = 0.05;

/// Ducks the main gain while the title bar is being scrubbed, harder on fast
/// drags, and restores the pre-scrub gain afterwards.
pub struct ScratchDucker {
    gain: Arc<GainControl>,
    before: Option<f32>,
}

impl ScratchDucker {
    pub fn new(gain: Arc<GainControl>) -> Self {
        Self { gain, before: None }
    }

    /// Gain remembered at scratch start, if a scratch is in progress.
    pub fn remembered(&self) -> Option<f32> {
        self.before
    }
}

impl ScratchListener for ScratchDucker {
    fn on_scratch_begin(&mut self, _was_playing: bool) {
        // The chosen volume, not the applied gain, which may still be recovering from the last scrub.
        let g = self.gain.volume();
        self.before.get_or_insert(g);
        self.gain.set_target((g * 0.15).max(0.04), BEGIN_TAU_S);
    }

    fn on_scratch_update(&mut self, speed: f32) {
        let duck = 0.12 + 0.20 * speed.clamp(0.0, 1.0);
        let base = self.before.unwrap_or_else(|| self.gain.volume());
        self.gain.set_target((base * duck).max(0.02), UPDATE_TAU_S);
    }

    fn on_scratch_end(&mut self, _resume: bool) {
        let restore = self.before.take().unwrap_or_else(|| self.gain.volume());
        self.gain.set_target(restore.clamp(0.0, 1.0), RESTORE_TAU_S);
    }
}
