/// Interactive corridor margin beyond the visual bounds, in reference pixels.
pub const EDGE_BLEED: f32 = 48.0;
pub const INTERFERENCE_MAX: f32 = 1.2;

const STIFFNESS: f32 = 6.0;
const DAMPING: f32 = 4.0;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerState {
    pub x: Option<f32>,
    pub y: Option<f32>,
    /// Glow intensity near the pointer, `0..=INTERFERENCE_MAX`.
    pub interference: f32,
    pub spring_position: f32,
    pub spring_velocity: f32,
    pub prev_x: Option<f32>,
}

impl PointerState {
    pub fn is_present(&self) -> bool {
        self.x.is_some()
    }

    /// Integrate `a = -k·x - c·v` for one frame. Runs whether or not a pointer is present.
    pub fn step_spring(&mut self, dt: f32) {
        let ax = -STIFFNESS * self.spring_position - DAMPING * self.spring_velocity;
        self.spring_velocity += ax * dt;
        self.spring_position += self.spring_velocity * dt;
    }

    pub fn decay(&mut self) {
        self.interference = (self.interference * 0.93).clamp(0.0, INTERFERENCE_MAX);
    }

    pub fn pin_spring(&mut self, target: f32) {
        self.spring_position = target;
        self.spring_velocity = 0.0;
    }

    pub fn leave(&mut self) {
        self.x = None;
        self.y = None;
        self.spring_velocity += -self.spring_position * 0.8;
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoverSurface {
    pub width: f32,
    pub height: f32,
    /// Corridor extension past both ends, in surface pixels.
    pub bleed: f32,
}

impl HoverSurface {
    pub fn new(width: f32, height: f32, scale: f32) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
            bleed: (EDGE_BLEED * 2.4).max(24.0) * scale.max(0.0),
        }
    }

    /// Closeness of `(px, py)` to the corridor, `0` (far) to `1` (on it).
    pub fn proximity(&self, px: f32, py: f32) -> f32 {
        let clamped = px.clamp(-self.bleed, self.width + self.bleed);
        let dx = clamped - px;
        let ry = (py - self.height * 0.5).abs();
        let dist = (2.0 * dx).hypot(ry);
        let radius = ((self.width + self.bleed * 2.0) * 0.22 * 0.6).max(12.0);
        (1.0 - dist / radius).max(0.0)
    }
}

/// Hover update: interference, spring kicks and the magnet toward the pointer.
pub fn hover(pointer: &mut PointerState, surface: &HoverSurface, px: f32, py: f32) {
    if !px.is_finite() || !py.is_finite() {
        return;
    }
    pointer.x = Some(px);
    pointer.y = Some(py);

    let t1 = surface.proximity(px, py);
    let target = (t1 * 4.2).min(4.2);
    pointer.interference += (target - pointer.interference) * 0.30;
    pointer.interference = pointer.interference.clamp(0.0, INTERFERENCE_MAX);

    if let Some(prev) = pointer.prev_x {
        let dx = px - prev;
        let width = surface.width.max(1.0);
        let offset = (dx / width * 6.0).clamp(-0.12, 0.12);
        pointer.spring_velocity += (offset - pointer.spring_position) * 0.23;
        if dx.abs() > surface.width * 0.2 && pointer.spring_position != 0.0 {
            pointer.spring_velocity += -pointer.spring_position.signum() * 0.4;
        }
        let magnet = t1 * 0.25;
        pointer.spring_velocity += (magnet - pointer.spring_position) * 0.10;
    }
    pointer.prev_x = Some(px);
}
