use crate::rhythm::PlayEdge;

/// Width of the smoothstep transition, as a fraction of the strip.
pub const FRONT_SOFTNESS: f32 = 0.08;
const BASE_SPEED: f32 = 0.55;
const RETRACT_MUL: f32 = 6.125;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColorFront {
    position: f32,
}

impl ColorFront {
    pub fn new(position: f32) -> Self {
        Self {
            position: position.clamp(0.0, 1.0),
        }
    }

    pub fn position(&self) -> f32 {
        self.position
    }

    /// Restart the sweep from the boundary it leaves.
    pub fn on_edge(&mut self, edge: PlayEdge) {
        self.position = match edge {
            PlayEdge::Resumed => 0.02,
            PlayEdge::Paused => 0.98,
        };
    }

    pub fn advance(&mut self, playing: bool, flow_rate: f32, dt: f32) {
        let flow_mag = flow_rate.abs().min(2.0);
        let dt = dt.max(0.0);
        let mut speed_mul = BASE_SPEED * (1.0 + 0.8 * flow_mag);
        let dir = if playing { 1.0 } else { -1.0 };
        if !playing {
            speed_mul *= RETRACT_MUL;
        }
        let next = self.position + dir * flow_mag * dt * speed_mul;
        self.position = if next.is_finite() { next.clamp(0.0, 1.0) } else { self.position };
    }

    /// Strip coordinate (`0` left, `1` at the icon) of the transition center.
    fn edge_t(&self) -> f32 {
        1.0 - self.position
    }

    /// Color gate at strip coordinate `t`: `1` behind the front, `0` ahead of it.
    pub fn gate_at(&self, t: f32) -> f32 {
        window(t, self.edge_t(), FRONT_SOFTNESS)
    }

    /// Wider, softer gate that leads the front slightly.
    pub fn lead_gate_at(&self, t: f32) -> f32 {
        window(t, self.edge_t(), FRONT_SOFTNESS * 1.4)
    }
}

fn window(t: f32, center: f32, half_width: f32) -> f32 {
    let x = ((t - (center - half_width)) / (2.0 * half_width)).clamp(0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}
