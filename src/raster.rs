use crate::engine::SliderFrame;
use crate::field::{GREY_TRACK, IconGeometry, IconGlyph, WHITE};
use crate::shade::Segment;

pub const BACKGROUND: [u8; 3] = [11, 11, 14];

pub struct Canvas {
    w: usize,
    h: usize,
    rgba: Vec<u8>,
}

impl Canvas {
    pub fn new(w: usize, h: usize) -> Self {
        let mut c = Self {
            w: 0,
            h: 0,
            rgba: Vec::new(),
        };
        c.resize(w, h);
        c
    }

    pub fn resize(&mut self, w: usize, h: usize) {
        self.w = w;
        self.h = h;
        self.rgba.resize(w.saturating_mul(h).saturating_mul(4), 0);
    }

    pub fn width(&self) -> usize {
        self.w
    }

    pub fn height(&self) -> usize {
        self.h
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 3]> {
        if x >= self.w || y >= self.h {
            return None;
        }
        let i = (y * self.w + x) * 4;
        Some([self.rgba[i], self.rgba[i + 1], self.rgba[i + 2]])
    }

    pub fn clear(&mut self, rgb: [u8; 3]) {
        for px in self.rgba.chunks_exact_mut(4) {
            px[..3].copy_from_slice(&rgb);
            px[3] = 255;
        }
    }

    fn blend(&mut self, x: i64, y: i64, rgb: [u8; 3], alpha: f32) {
        if x < 0 || y < 0 || x as usize >= self.w || y as usize >= self.h {
            return;
        }
        let a = alpha.clamp(0.0, 1.0);
        if a <= 0.0 {
            return;
        }
        let i = (y as usize * self.w + x as usize) * 4;
        for c in 0..3 {
            let dst = self.rgba[i + c] as f32;
            self.rgba[i + c] = (dst + (rgb[c] as f32 - dst) * a).round() as u8;
        }
        self.rgba[i + 3] = 255;
    }

    /// Antialiased line with round caps. Lines thinner than a pixel are drawn one pixel wide.
    pub fn stroke(&mut self, seg: &Segment) {
        let r = (seg.width * 0.5).max(0.5);
        let (x0, y0) = seg.from;
        let (x1, y1) = seg.to;
        if !(x0.is_finite() && y0.is_finite() && x1.is_finite() && y1.is_finite()) {
            return;
        }
        let min_x = (x0.min(x1) - r - 1.0).floor() as i64;
        let max_x = (x0.max(x1) + r + 1.0).ceil() as i64;
        let min_y = (y0.min(y1) - r - 1.0).floor() as i64;
        let max_y = (y0.max(y1) + r + 1.0).ceil() as i64;
        let (dx, dy) = (x1 - x0, y1 - y0);
        let len2 = dx * dx + dy * dy;

        for py in min_y.max(0)..=max_y.min(self.h as i64 - 1) {
            for px in min_x.max(0)..=max_x.min(self.w as i64 - 1) {
                let cx = px as f32 + 0.5;
                let cy = py as f32 + 0.5;
                let t = if len2 > 0.0 {
                    (((cx - x0) * dx + (cy - y0) * dy) / len2).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let d = (cx - (x0 + dx * t)).hypot(cy - (y0 + dy * t));
                let coverage = (r + 0.5 - d).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend(px, py, seg.rgb, seg.alpha * coverage);
                }
            }
        }
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, rgb: [u8; 3], alpha: f32) {
        let x0 = x.round() as i64;
        let y0 = y.round() as i64;
        let x1 = (x + w.max(1.0)).round() as i64;
        let y1 = (y + h.max(1.0)).round() as i64;
        for py in y0..y1.max(y0 + 1) {
            for px in x0..x1.max(x0 + 1) {
                self.blend(px, py, rgb, alpha);
            }
        }
    }

    pub fn fill_triangle(&mut self, p: [(f32, f32); 3], rgb: [u8; 3], alpha: f32) {
        let min_x = p.iter().map(|v| v.0).fold(f32::INFINITY, f32::min).floor() as i64;
        let max_x = p.iter().map(|v| v.0).fold(f32::NEG_INFINITY, f32::max).ceil() as i64;
        let min_y = p.iter().map(|v| v.1).fold(f32::INFINITY, f32::min).floor() as i64;
        let max_y = p.iter().map(|v| v.1).fold(f32::NEG_INFINITY, f32::max).ceil() as i64;
        let edge = |a: (f32, f32), b: (f32, f32), c: (f32, f32)| (b.0 - a.0) * (c.1 - a.1) - (b.1 - a.1) * (c.0 - a.0);
        let area = edge(p[0], p[1], p[2]);
        if area.abs() < 1e-6 {
            return;
        }
        for py in min_y..=max_y {
            for px in min_x..=max_x {
                let c = (px as f32 + 0.5, py as f32 + 0.5);
                let w0 = edge(p[1], p[2], c) / area;
                let w1 = edge(p[2], p[0], c) / area;
                let w2 = edge(p[0], p[1], c) / area;
                if w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0 {
                    self.blend(px, py, rgb, alpha);
                }
            }
        }
    }

    pub fn paint(&mut self, frame: &SliderFrame) {
        self.clear(BACKGROUND);
        let geom = &frame.geometry;

        if let Some((start, end)) = geom.remainder {
            self.stroke(&Segment {
                from: (start, geom.mid_y),
                to: (end, geom.mid_y),
                width: geom.remainder_width,
                rgb: GREY_TRACK,
                alpha: 0.5,
            });
        }
        for (_, segments) in &frame.strokes {
            for seg in segments {
                self.stroke(seg);
            }
        }
        self.paint_icon(&geom.icon);
    }

    fn paint_icon(&mut self, icon: &IconGeometry) {
        if icon.w <= 0.0 || icon.h <= 0.0 {
            return;
        }
        let p = icon.pulse_scale;
        let cy = icon.center_y();
        let half_h = icon.h * 0.5;
        let inset = icon.inset * p;
        match icon.glyph {
            IconGlyph::Pause => {
                let bar = icon.bar_width * p;
                let gap = icon.bar_gap * p;
                let top = cy - half_h + inset;
                let h = icon.h - 2.0 * inset;
                self.fill_rect(icon.x, top, bar, h, WHITE, 1.0);
                self.fill_rect(icon.x + bar + gap, top, bar, h, WHITE, 1.0);
            }
            IconGlyph::Play => {
                let apex = (icon.right - icon.x).max(1.0);
                self.fill_triangle(
                    [
                        (icon.x, cy - half_h + inset),
                        (icon.x + apex, cy),
                        (icon.x, cy + half_h - inset),
                    ],
                    WHITE,
                    1.0,
                );
            }
        }
    }
}
