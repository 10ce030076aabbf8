use crate::analyzer::{AnalyserSnapshot, FrameSample, SpectralAnalyzer};
use crate::field::{
    self, Band, BandPhases, FieldGeometry, FieldInputs, FieldLayout, IconGeometry, PluckBuffer, PluckEvent,
};
use crate::front::ColorFront;
use crate::rhythm::{MAX_DT, PlayEdge, RhythmMachine, RhythmOutput, RhythmState};
use crate::shade::{self, Segment, ShadeParams};
use crate::spring::{self, HoverSurface, PointerState};
use crate::tuning::RhythmTuning;

/// Pointer travel (reference px) that turns an icon press into a drag.
const ICON_DRAG_SLOP: f32 = 6.0;
const ICON_HIT_MARGIN: f32 = 3.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SliderAction {
    SetVolume(f32),
    TogglePlay,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SliderGesture {
    #[default]
    Idle,
    /// Pressed on the play/pause icon; a short tap toggles, a move past the slop drags.
    IconPressed { start: (f32, f32), dragging: bool },
    /// Volume drag with the icon centred under the pointer.
    Dragging,
}

impl SliderGesture {
    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging | Self::IconPressed { dragging: true, .. })
    }
}

#[derive(Clone, Debug, Default)]
pub struct EngineState {
    pub rhythm: RhythmState,
    pub pointer: PointerState,
    pub plucks: PluckBuffer,
    pub front: ColorFront,
    pub phases: BandPhases,
    pub gesture: SliderGesture,
    pub icon_pulse: f32,
    /// Engine clock, advanced only by `tick`.
    pub clock_s: f32,
    pub icon: IconGeometry,
}

#[derive(Clone, Copy, Debug)]
pub struct TickInput<'a> {
    pub snapshot: Option<AnalyserSnapshot<'a>>,
    pub playing: bool,
    /// Slider value, `0..=1`.
    pub volume: f32,
    /// Post-gain volume actually heard.
    pub effective_volume: f32,
}

#[derive(Clone, Debug)]
pub struct SliderFrame {
    pub geometry: FieldGeometry,
    pub strokes: Vec<(Band, Vec<Segment>)>,
    pub sample: FrameSample,
    pub rhythm: RhythmOutput,
    pub edge: Option<PlayEdge>,
    pub front: f32,
    pub interference: f32,
    pub playing: bool,
}

pub struct SliderEngine {
    analyzer: SpectralAnalyzer,
    machine: RhythmMachine,
    layout: FieldLayout,
    surface: HoverSurface,
    state: EngineState,
}

impl SliderEngine {
    pub fn new(tuning: RhythmTuning, width: usize, height: usize) -> Self {
        let layout = FieldLayout::for_surface(width, height);
        Self {
            analyzer: SpectralAnalyzer::new(),
            machine: RhythmMachine::new(tuning),
            surface: HoverSurface::new(width as f32, height as f32, layout.scale),
            layout,
            state: EngineState::default(),
        }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.layout = FieldLayout::for_surface(width, height);
        self.surface = HoverSurface::new(width as f32, height as f32, self.layout.scale);
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    pub fn surface(&self) -> &HoverSurface {
        &self.surface
    }

    pub fn tick(&mut self, dt: f32, input: &TickInput<'_>) -> SliderFrame {
        let dt = if dt.is_finite() { dt.clamp(0.0, MAX_DT) } else { 0.0 };
        let st = &mut self.state;
        st.clock_s += dt;
        st.pointer.step_spring(dt);

        let sample = self.analyzer.analyze(input.snapshot);

        let edge = self.machine.observe_playing(&mut st.rhythm, input.playing);
        if let Some(edge) = edge {
            log::debug!("slider: play edge {edge:?}");
            st.front.on_edge(edge);
        }
        let out = self.machine.update(
            &mut st.rhythm,
            &sample,
            input.playing,
            dt,
            st.pointer.interference,
        );
        if dt > 0.0 {
            st.front.advance(input.playing, out.flow_rate, dt);
            st.phases.advance(&sample, out.flow_rate);
            field::update_icon_pulse(&mut st.icon_pulse, &sample);
        }

        let geometry = field::generate(
            &self.layout,
            st.icon_pulse,
            &FieldInputs {
                width: self.surface.width,
                height: self.surface.height,
                volume: input.volume,
                playing: input.playing,
                dragging: st.gesture.is_dragging(),
                now_s: st.clock_s,
                sample: &sample,
                rhythm: &st.rhythm,
                out: &out,
                pointer: &st.pointer,
                phases: &st.phases,
                plucks: &st.plucks,
            },
        );
        st.icon = geometry.icon;

        let params = ShadeParams {
            playing: input.playing,
            activity: st.rhythm.activity,
            effective_volume: input.effective_volume,
            rms: sample.rms,
            front: &st.front,
            pointer: &st.pointer,
            surface_width: self.surface.width.max(1.0),
            track_height: geometry.track_height,
        };
        let strokes = geometry
            .draw_order
            .iter()
            .map(|&band| (band, shade::shade_band(geometry.band(band), &params)))
            .collect();

        let interference_used = st.pointer.interference;
        if dt > 0.0 {
            st.pointer.decay();
        }

        SliderFrame {
            geometry,
            strokes,
            sample,
            rhythm: out,
            edge,
            front: st.front.position(),
            interference: interference_used,
            playing: input.playing,
        }
    }

    /// Hover over (or near) the surface. Returns a volume change while dragging.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> Option<SliderAction> {
        spring::hover(&mut self.state.pointer, &self.surface, x, y);
        match self.state.gesture {
            SliderGesture::Idle => None,
            SliderGesture::IconPressed { start, dragging } => {
                let moved = (x - start.0).hypot(y - start.1);
                let dragging = dragging || moved > ICON_DRAG_SLOP * self.layout.scale;
                self.state.gesture = SliderGesture::IconPressed { start, dragging };
                dragging.then(|| self.drag_to(x.clamp(0.0, self.surface.width)))
            }
            SliderGesture::Dragging => Some(self.drag_to(x)),
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) -> Option<SliderAction> {
        let intensity = (0.6 + self.state.pointer.spring_position.abs() * 0.5).min(1.0);
        self.state.plucks.push(PluckEvent {
            x,
            at_s: self.state.clock_s,
            intensity,
        });

        let margin = ICON_HIT_MARGIN * self.layout.scale;
        if self.state.icon.w > 0.0 && self.state.icon.contains(x, y, margin) {
            self.state.gesture = SliderGesture::IconPressed {
                start: (x, y),
                dragging: false,
            };
            return None;
        }
        self.state.gesture = SliderGesture::Dragging;
        let width = self.surface.width.max(1.0);
        let v = self.volume_at(x);
        self.state.pointer.pin_spring((x / width).clamp(0.0, 1.0) * 2.0 - 1.0);
        Some(SliderAction::SetVolume(v))
    }

    pub fn pointer_up(&mut self) -> Option<SliderAction> {
        let gesture = std::mem::take(&mut self.state.gesture);
        match gesture {
            SliderGesture::IconPressed { dragging: false, .. } => Some(SliderAction::TogglePlay),
            _ => None,
        }
    }

    /// Drop the gesture without acting on it (the release was never seen).
    pub fn pointer_cancel(&mut self) {
        self.state.gesture = SliderGesture::Idle;
    }

    pub fn pointer_leave(&mut self) {
        self.state.pointer.leave();
    }

    pub fn song_changed(&mut self) {
        log::debug!("slider: song changed");
        self.state.phases = BandPhases::default();
        self.state.rhythm.reset_song();
    }

    fn volume_at(&self, x: f32) -> f32 {
        let width = self.surface.width.max(1.0);
        ((x - self.state.icon.half_width()) / width).clamp(0.0, 1.0)
    }

    fn drag_to(&mut self, x: f32) -> SliderAction {
        let v = self.volume_at(x);
        self.state.pointer.pin_spring(v * 2.0 - 1.0);
        SliderAction::SetVolume(v)
    }
}
