mod halfblock;
mod braille;

pub use halfblock::HalfBlockRenderer;
pub use braille::BrailleRenderer;

use crate::scrub::{TITLE_TEXT, TitleView};
use std::io::Write;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TitleCell {
    pub ch: char,
    pub fg: (u8, u8, u8),
}

impl TitleCell {
    pub const BLANK: Self = Self {
        ch: ' ',
        fg: (TITLE_TEXT[0], TITLE_TEXT[1], TITLE_TEXT[2]),
    };
}

/// One terminal frame: the title row, the slider pixels below it and the HUD.
pub struct Frame<'a> {
    pub term_cols: u16,
    pub term_rows: u16,
    pub title: &'a [TitleCell],
    /// Terminal rows above the pixel area.
    pub visual_top: u16,
    pub visual_rows: u16,
    pub pixel_width: usize,
    pub pixel_height: usize,
    pub pixels_rgba: &'a [u8],
    pub hud: &'a str,
    pub hud_rows: u16,
    pub overlay: Option<&'a str>,
    pub sync_updates: bool,
}

pub trait Renderer {
    fn name(&self) -> &'static str;
    /// Slider pixels per terminal cell, `(x, y)`.
    fn cell_pixels(&self) -> (usize, usize);
    fn render(&mut self, frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()>;
}

/// Lay out the title row: marquee text inside the seek window, progress overlay
/// over it, and `right` flush to the end of the row.
pub fn title_cells(view: &TitleView<'_>, cols: usize, cell_width: f32, right: &str) -> Vec<TitleCell> {
    let mut cells = vec![TitleCell::BLANK; cols];
    let layout = view.layout;
    let chars: Vec<char> = layout.loop_text.chars().collect();
    let cw = cell_width.max(1.0);
    let overlay = (view.overlay[0], view.overlay[1], view.overlay[2]);

    for (col, cell) in cells.iter_mut().enumerate() {
        let x0 = col as f32 * cw;
        let local = x0 - layout.pad_x;
        if local < 0.0 || local >= layout.window_width || chars.is_empty() {
            continue;
        }
        let idx = ((local + view.scroll_px) / cw).floor() as usize;
        let ch = if layout.overflow {
            chars[idx % chars.len()]
        } else {
            match chars.get(idx) {
                Some(&c) => c,
                None => continue,
            }
        };
        let filled = local + cw * 0.5 <= view.fill_px;
        cell.ch = ch;
        if filled {
            cell.fg = overlay;
        }
    }

    let right_len = right.chars().count();
    if right_len + 1 < cols {
        let start = cols - right_len - 1;
        for (cell, ch) in cells[start..].iter_mut().zip(right.chars()) {
            *cell = TitleCell { ch, ..TitleCell::BLANK };
        }
    }
    cells
}

pub(crate) fn begin_frame(frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
    if frame.sync_updates {
        out.write_all(b"\x1b[?2026h")?;
    }
    out.write_all(b"\x1b[H\x1b[0m")?;
    // Disable autowrap (DECAWM) while we paint full-width rows; some terminals will otherwise
    // wrap when the last column is written.
    out.write_all(b"\x1b[?7l")?;
    Ok(())
}

pub(crate) fn write_title_row(frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
    if frame.visual_top == 0 {
        return Ok(());
    }
    out.write_all(b"\x1b[1;1H\x1b[0m\x1b[2K\x1b[1m")?;
    let mut last_fg = None;
    for cell in frame.title.iter().take(frame.term_cols as usize) {
        if last_fg != Some(cell.fg) {
            write!(out, "\x1b[38;2;{};{};{}m", cell.fg.0, cell.fg.1, cell.fg.2)?;
            last_fg = Some(cell.fg);
        }
        write!(out, "{}", cell.ch)?;
    }
    out.write_all(b"\x1b[0m")?;
    Ok(())
}

pub(crate) fn finish_frame(frame: &Frame<'_>, out: &mut dyn Write) -> anyhow::Result<()> {
    let cols = frame.term_cols as usize;
    let first_hud_row = frame.visual_top as usize + frame.visual_rows as usize + 1;
    let mut hud_lines = frame.hud.lines();
    for i in 0..(frame.hud_rows as usize) {
        write!(out, "\x1b[{};1H\x1b[0m\x1b[2K", first_hud_row + i)?;
        if let Some(line) = hud_lines.next() {
            let clipped: String = line.chars().take(cols).collect();
            write!(out, "{clipped}")?;
        }
    }

    if let Some(text) = frame.overlay {
        draw_overlay_popup(out, frame.term_cols, frame.term_rows, text)?;
    }

    // Restore autowrap.
    out.write_all(b"\x1b[?7h")?;
    if frame.sync_updates {
        out.write_all(b"\x1b[?2026l")?;
    }
    out.flush()?;
    Ok(())
}

/// True when the pixel buffer matches the frame and the renderer's cell geometry.
pub(crate) fn frame_fits(frame: &Frame<'_>, cell: (usize, usize)) -> bool {
    let cols = frame.term_cols as usize;
    let rows = frame.visual_rows as usize;
    let (w, h) = (frame.pixel_width, frame.pixel_height);
    cols > 0
        && rows > 0
        && w == cols.saturating_mul(cell.0)
        && h == rows.saturating_mul(cell.1)
        && frame.pixels_rgba.len() >= w.saturating_mul(h).saturating_mul(4)
}

pub fn draw_overlay_popup(
    out: &mut dyn Write,
    term_cols: u16,
    term_rows: u16,
    text: &str,
) -> anyhow::Result<()> {
    if text.trim().is_empty() {
        return Ok(());
    }

    let cols = term_cols as usize;
    let rows = term_rows as usize;
    if cols < 8 || rows < 4 {
        return Ok(());
    }

    let max_inner_w = cols.saturating_sub(6).max(1);
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let chars: Vec<char> = raw.chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }
        for chunk in chars.chunks(max_inner_w) {
            lines.push(chunk.iter().collect());
        }
    }

    let inner_w = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(1, max_inner_w);
    let box_w = (inner_w + 4).min(cols.saturating_sub(2)).max(4);
    let inner_w = box_w.saturating_sub(4);
    let body_h = lines.len().min(rows.saturating_sub(3).max(1));
    let box_h = (body_h + 2).min(rows.saturating_sub(1)).max(3);

    let start_col = (cols.saturating_sub(box_w)) / 2 + 1;
    let start_row = (rows.saturating_sub(box_h)) / 2 + 1;

    let horiz = "-".repeat(box_w.saturating_sub(2));
    let blank = " ".repeat(inner_w);
    out.write_all(b"\x1b[0m\x1b[38;2;236;242;255m\x1b[48;2;10;14;24m")?;
    write!(out, "\x1b[{};{}H+{}+", start_row, start_col, horiz)?;
    for (i, line) in lines.iter().take(body_h).enumerate() {
        let row = start_row + 1 + i;
        write!(out, "\x1b[{};{}H| {} |", row, start_col, blank)?;
        if i == 0 {
            write!(
                out,
                "\x1b[{};{}H\x1b[1m\x1b[38;2;255;236;160m{}\x1b[22m\x1b[38;2;236;242;255m",
                row,
                start_col + 2,
                line
            )?;
        } else {
            write!(out, "\x1b[{};{}H{}", row, start_col + 2, line)?;
        }
    }
    write!(out, "\x1b[{};{}H+{}+", start_row + box_h - 1, start_col, horiz)?;
    out.write_all(b"\x1b[0m")?;
    Ok(())
}
