use crate::render::{begin_frame, finish_frame, frame_fits, write_title_row, Frame, Renderer};
use std::io::Write;

pub struct HalfBlockRenderer {
    last_fg: Option<(u8, u8, u8)>,
    last_bg: Option<(u8, u8, u8)>,
}

impl Default for HalfBlockRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HalfBlockRenderer {
    pub fn new() -> Self {
        Self {
            last_fg: None,
            last_bg: None,
        }
    }
}

impl Renderer for HalfBlockRenderer {
    fn name(&self) -> &'static str {
        "half-block"
    }

    fn cell_pixels(&self) -> (usize, usize) {
        (1, 2)
    }

    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
        if !frame_fits(frame, self.cell_pixels()) {
            // Internal mismatch (mid-resize); skip rather than index out of bounds.
            return Ok(());
        }
        let cols = frame.term_cols as usize;
        let w = frame.pixel_width;
        let px = frame.pixels_rgba;

        begin_frame(frame, out)?;
        write_title_row(frame, out)?;
        self.last_fg = None;
        self.last_bg = None;

        const HALF_BLOCK: char = '\u{2580}';

        for row in 0..frame.visual_rows as usize {
            write!(out, "\x1b[{};1H", frame.visual_top as usize + row + 1)?;
            let top_y = row * 2;
            let bot_y = top_y + 1;
            for x in 0..cols {
                let top_i = (top_y * w + x) * 4;
                let bot_i = (bot_y * w + x) * 4;
                let top = (px[top_i], px[top_i + 1], px[top_i + 2]);
                let bot = (px[bot_i], px[bot_i + 1], px[bot_i + 2]);

                if self.last_fg != Some(top) {
                    write!(out, "\x1b[38;2;{};{};{}m", top.0, top.1, top.2)?;
                    self.last_fg = Some(top);
                }
                if self.last_bg != Some(bot) {
                    write!(out, "\x1b[48;2;{};{};{}m", bot.0, bot.1, bot.2)?;
                    self.last_bg = Some(bot);
                }
                write!(out, "{HALF_BLOCK}")?;
            }
        }

        finish_frame(frame, out)
    }
}
