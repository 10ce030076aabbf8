use crate::render::{begin_frame, finish_frame, frame_fits, write_title_row, Frame, Renderer};
use std::io::Write;

pub struct BrailleRenderer {
    last_fg: Option<(u8, u8, u8)>,
    last_bg: Option<(u8, u8, u8)>,
}

impl Default for BrailleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl BrailleRenderer {
    pub fn new() -> Self {
        Self {
            last_fg: None,
            last_bg: None,
        }
    }
}

const DOT_BITS: [u8; 8] = [0x01, 0x08, 0x02, 0x10, 0x04, 0x20, 0x40, 0x80];

impl Renderer for BrailleRenderer {
    fn name(&self) -> &'static str {
        "braille"
    }

    fn cell_pixels(&self) -> (usize, usize) {
        (2, 4)
    }

    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        if !frame_fits(frame, self.cell_pixels()) {
            return Ok(());
        }
        let cols = frame.term_cols as usize;
        let w = frame.pixel_width;

        begin_frame(frame, out)?;
        write_title_row(frame, out)?;
        self.last_fg = None;
        self.last_bg = None;

        for row in 0..frame.visual_rows as usize {
            write!(out, "\x1b[{};1H", frame.visual_top as usize + row + 1)?;
            let base_y = row * 4;
            for col in 0..cols {
                let base_x = col * 2;

                let mut lum = [0u16; 8];
                let mut rgb = [(0u8, 0u8, 0u8); 8];
                for dy in 0..4usize {
                    for dx in 0..2usize {
                        let i = dy * 2 + dx;
                        let idx = ((base_y + dy) * w + base_x + dx) * 4;
                        let p = &frame.pixels_rgba[idx..idx + 3];
                        rgb[i] = (p[0], p[1], p[2]);
                        lum[i] = luma_u16(p[0], p[1], p[2]);
                    }
                }

                let (fgc, bgc, ch) = braille_cell(&rgb, &lum);
                if self.last_fg != Some(fgc) {
                    write!(out, "\x1b[38;2;{};{};{}m", fgc.0, fgc.1, fgc.2)?;
                    self.last_fg = Some(fgc);
                }
                if self.last_bg != Some(bgc) {
                    write!(out, "\x1b[48;2;{};{};{}m", bgc.0, bgc.1, bgc.2)?;
                    self.last_bg = Some(bgc);
                }
                write!(out, "{ch}")?;
            }
        }

        finish_frame(frame, out)
    }
}

/// Split the 2x4 block into "on" (brighter than the midpoint) and "off" dots.
fn braille_cell(rgb: &[(u8, u8, u8); 8], lum: &[u16; 8]) -> ((u8, u8, u8), (u8, u8, u8), char) {
    let min_l = lum.iter().copied().min().unwrap_or(0);
    let max_l = lum.iter().copied().max().unwrap_or(0);
    let thr = (min_l + max_l) / 2;

    let mut bits: u8 = 0;
    let mut on = [0u32; 4];
    let mut off = [0u32; 4];
    for i in 0..8usize {
        let (r, g, b) = rgb[i];
        let acc = if lum[i] > thr {
            bits |= DOT_BITS[i];
            &mut on
        } else {
            &mut off
        };
        acc[0] += r as u32;
        acc[1] += g as u32;
        acc[2] += b as u32;
        acc[3] += 1;
    }

    let avg = |a: &[u32; 4]| -> Option<(u8, u8, u8)> {
        (a[3] > 0).then(|| ((a[0] / a[3]) as u8, (a[1] / a[3]) as u8, (a[2] / a[3]) as u8))
    };
    if bits == 0 {
        let c = avg(&off).unwrap_or((0, 0, 0));
        return (c, c, ' ');
    }
    let fgc = avg(&on).unwrap_or((0, 0, 0));
    let bgc = avg(&off).unwrap_or(fgc);
    let ch = char::from_u32(0x2800 + bits as u32).unwrap_or(' ');
    (fgc, bgc, ch)
}

#[inline]
fn luma_u16(r: u8, g: u8, b: u8) -> u16 {
    // Approx Rec.709 luma using integer math (0..255).
    let y = (r as u32 * 54 + g as u32 * 183 + b as u32 * 19) >> 8;
    y as u16
}
