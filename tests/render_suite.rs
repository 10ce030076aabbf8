use sine_player::render::{title_cells, BrailleRenderer, Frame, HalfBlockRenderer, Renderer, TitleCell};
use sine_player::scrub::{MonospaceMeasure, TITLE_TEXT, TitleLayout, TitleView};

/// Build a solid-color RGBA pixel buffer.
fn solid_pixels(w: usize, h: usize, r: u8, g: u8, b: u8) -> Vec<u8> {
    let mut buf = vec![0u8; w * h * 4];
    for px in buf.chunks_exact_mut(4) {
        px[0] = r;
        px[1] = g;
        px[2] = b;
        px[3] = 255;
    }
    buf
}

/// Build a gradient pixel buffer (varies across x).
fn gradient_pixels(w: usize, h: usize) -> Vec<u8> {
    let mut buf = vec![0u8; w * h * 4];
    for y in 0..h {
        for x in 0..w {
            let i = (y * w + x) * 4;
            let t = (x as f32 / w.max(1) as f32 * 255.0) as u8;
            buf[i] = t;
            buf[i + 1] = 128;
            buf[i + 2] = 255 - t;
            buf[i + 3] = 255;
        }
    }
    buf
}

fn make_frame<'a>(
    cols: u16,
    visual_rows: u16,
    pw: usize,
    ph: usize,
    pixels: &'a [u8],
    title: &'a [TitleCell],
    sync: bool,
) -> Frame<'a> {
    Frame {
        term_cols: cols,
        term_rows: visual_rows + 2,
        title,
        visual_top: 1,
        visual_rows,
        pixel_width: pw,
        pixel_height: ph,
        pixels_rgba: pixels,
        hud: "Playing | Vol: 70%",
        hud_rows: 1,
        overlay: None,
        sync_updates: sync,
    }
}

fn title_row(cols: usize) -> Vec<TitleCell> {
    let layout = TitleLayout::measure(&MonospaceMeasure { cell_width: 8.0 }, "abcd", cols as f32 * 8.0, 8.0);
    let view = TitleView {
        layout: &layout,
        scroll_px: 0.0,
        fill_px: 16.0,
        overlay: [239, 68, 68],
    };
    title_cells(&view, cols, 8.0, "1:00 / 2:30")
}

// ── Title row ───────────────────────────────────────────────────────────────

#[test]
fn title_cells_place_text_overlay_and_clock() {
    let cells = title_row(20);
    assert_eq!(cells.len(), 20);
    let text: String = cells.iter().map(|c| c.ch).collect();
    assert_eq!(text, " abcd   1:00 / 2:30 ");

    let red = (239, 68, 68);
    let plain = (TITLE_TEXT[0], TITLE_TEXT[1], TITLE_TEXT[2]);
    assert_eq!(cells[1].fg, red);
    assert_eq!(cells[2].fg, red);
    assert_eq!(cells[3].fg, plain);
    assert_eq!(cells[10].fg, plain);
}

#[test]
fn title_cells_scroll_long_titles() {
    let title = "abcdefghijklmnopqrstuvwxyz0123";
    let layout = TitleLayout::measure(&MonospaceMeasure { cell_width: 8.0 }, title, 400.0, 8.0);
    let view = TitleView {
        layout: &layout,
        scroll_px: 16.0,
        fill_px: 0.0,
        overlay: [59, 130, 246],
    };
    let cells = title_cells(&view, 50, 8.0, "");
    assert_eq!(cells[1].ch, 'c');
    assert_eq!(cells[24].ch, 'z');
}

#[test]
fn title_cells_drop_the_clock_when_too_narrow() {
    let cells = title_row(8);
    let text: String = cells.iter().map(|c| c.ch).collect();
    assert!(!text.contains("2:30"));
}

// ── HalfBlock renderer ─────────────────────────────────────────────────────

#[test]
fn halfblock_renders_gradient_frame() {
    // Wide enough for the whole HUD line.
    let cols = 24u16;
    let rows = 4u16;
    let pw = cols as usize;
    let ph = (rows as usize) * 2;
    let pixels = gradient_pixels(pw, ph);
    let title = title_row(cols as usize);
    let frame = make_frame(cols, rows, pw, ph, &pixels, &title, true);
    let mut out = Vec::new();
    let mut renderer = HalfBlockRenderer::new();
    renderer.render(&frame, &mut out).unwrap();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("\x1b[?2026h"), "missing sync-begin");
    assert!(s.contains("\x1b[?2026l"), "missing sync-end");
    assert!(s.contains("\x1b[H"), "missing home cursor");
    assert!(s.contains("\x1b[?7l"), "missing autowrap-off");
    assert!(s.contains("\x1b[?7h"), "missing autowrap-on");
    // Should use upper-half-block character
    assert!(s.contains("\u{2580}"), "missing half-block char");
    // Should have both FG and BG colors
    assert!(s.contains("38;2;"), "missing FG escape");
    assert!(s.contains("48;2;"), "missing BG escape");
    // Title on row 1, pixels from row 2, HUD after them
    assert!(s.contains("\x1b[1;1H"), "missing title row");
    assert!(s.contains("\x1b[2;1H"), "pixels should start below the title");
    assert!(s.contains("\x1b[6;1H"), "missing HUD row");
    assert!(s.contains("Playing | Vol: 70%"), "HUD text missing");
}

#[test]
fn halfblock_name_and_cell() {
    let r = HalfBlockRenderer::new();
    assert_eq!(r.name(), "half-block");
    assert_eq!(r.cell_pixels(), (1, 2));
}

#[test]
fn halfblock_skips_dimension_mismatch() {
    // pixel_height should be visual_rows*2, but give visual_rows*1
    let pixels = solid_pixels(4, 4, 100, 100, 100);
    let title = title_row(4);
    let frame = make_frame(4, 4, 4, 4, &pixels, &title, false);
    let mut out = Vec::new();
    HalfBlockRenderer::new().render(&frame, &mut out).unwrap();
    assert!(out.is_empty(), "expected empty output for dimension mismatch");
}

#[test]
fn halfblock_resets_color_cache_each_frame() {
    let cols = 4u16;
    let rows = 2u16;
    let pw = 4;
    let ph = 4;
    let title = title_row(cols as usize);

    // Frame 1: red
    let pixels1 = solid_pixels(pw, ph, 255, 0, 0);
    let frame1 = make_frame(cols, rows, pw, ph, &pixels1, &title, false);
    let mut out1 = Vec::new();
    let mut renderer = HalfBlockRenderer::new();
    renderer.render(&frame1, &mut out1).unwrap();
    let s1 = String::from_utf8_lossy(&out1);
    assert!(s1.contains("38;2;255;0;0"), "first frame missing red FG");

    // Frame 2: blue - color cache should reset so new color is emitted
    let pixels2 = solid_pixels(pw, ph, 0, 0, 255);
    let frame2 = make_frame(cols, rows, pw, ph, &pixels2, &title, false);
    let mut out2 = Vec::new();
    renderer.render(&frame2, &mut out2).unwrap();
    let s2 = String::from_utf8_lossy(&out2);
    assert!(s2.contains("38;2;0;0;255"), "second frame missing blue FG");
}

// ── Braille renderer ────────────────────────────────────────────────────────

#[test]
fn braille_renders_gradient_frame() {
    let cols = 24u16;
    let rows = 3u16;
    let pw = (cols as usize) * 2;
    let ph = (rows as usize) * 4;
    let pixels = gradient_pixels(pw, ph);
    let title = title_row(cols as usize);
    let frame = make_frame(cols, rows, pw, ph, &pixels, &title, false);
    let mut out = Vec::new();
    let mut renderer = BrailleRenderer::new();
    renderer.render(&frame, &mut out).unwrap();
    let s = String::from_utf8_lossy(&out);
    // Braille characters are in U+2800..U+28FF range
    assert!(
        s.chars().any(|c| ('\u{2801}'..='\u{28FF}').contains(&c)),
        "no braille characters found"
    );
    assert!(s.contains("Playing | Vol: 70%"), "HUD text missing");
}

#[test]
fn hud_is_clipped_to_the_terminal_width() {
    let pixels = gradient_pixels(8, 8);
    let title = title_row(8);
    let frame = make_frame(8, 4, 8, 8, &pixels, &title, false);
    let mut out = Vec::new();
    HalfBlockRenderer::new().render(&frame, &mut out).unwrap();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("Playing "), "clipped HUD prefix missing");
    assert!(!s.contains("Vol"), "HUD ran past the last column");
}

#[test]
fn braille_solid_frame_is_blank_cells() {
    let pixels = solid_pixels(4, 4, 20, 20, 20);
    let title = title_row(2);
    let frame = make_frame(2, 1, 4, 4, &pixels, &title, false);
    let mut out = Vec::new();
    BrailleRenderer::new().render(&frame, &mut out).unwrap();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("48;2;20;20;20"));
    assert!(!s.chars().any(|c| ('\u{2801}'..='\u{28FF}').contains(&c)));
}

#[test]
fn braille_name_and_cell() {
    let r = BrailleRenderer::new();
    assert_eq!(r.name(), "braille");
    assert_eq!(r.cell_pixels(), (2, 4));
}

// ── Overlay rendering ───────────────────────────────────────────────────────

#[test]
fn halfblock_renders_overlay_popup() {
    let cols = 40u16;
    let rows = 20u16;
    let pixels = solid_pixels(cols as usize, rows as usize * 2, 50, 50, 50);
    let title = title_row(cols as usize);
    let mut frame = make_frame(cols, rows, cols as usize, rows as usize * 2, &pixels, &title, false);
    frame.overlay = Some("Test Overlay\nSecond line");
    let mut out = Vec::new();
    let mut renderer = HalfBlockRenderer::new();
    renderer.render(&frame, &mut out).unwrap();
    let s = String::from_utf8_lossy(&out);
    assert!(s.contains("Test Overlay"), "overlay text missing");
    assert!(s.contains("Second line"), "overlay body missing");
}
