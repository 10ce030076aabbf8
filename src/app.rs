use crate::audio::{DemoTrack, Player, ScratchDucker};
use crate::config::{Config, RendererMode};
use crate::engine::{SliderAction, SliderEngine, TickInput};
use crate::raster::Canvas;
use crate::render::{title_cells, BrailleRenderer, Frame, HalfBlockRenderer, Renderer};
use crate::rhythm::Direction;
use crate::scrub::{display_name, GlyphMeasure, MediaTransport, MonospaceMeasure, ScratchListener, ScrubEngine};
use crate::terminal::TerminalGuard;
use crate::tuning::RhythmTuning;
use anyhow::Context;
use crossterm::event::{
    self, Event, KeyCode, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use std::io::BufWriter;
use std::time::{Duration, Instant};

/// Surface pixels per title-row character.
const TITLE_CELL_PX: f32 = 8.0;
/// Terminal rows above the slider: the title bar.
const VISUAL_TOP: u16 = 1;
const VOLUME_STEP: f32 = 0.05;
const SEEK_STEP_S: f64 = 5.0;
const FALLBACK_TITLE: &str = "sine_player";

/// Which surface owns the pointer between press and release.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Capture {
    None,
    Title,
    Slider,
}

struct Session {
    player: Player,
    ducker: ScratchDucker,
    slider: SliderEngine,
    scrub: ScrubEngine<MonospaceMeasure>,
    canvas: Canvas,
    capture: Capture,
    cell: (usize, usize),
    tracks_loaded: u64,
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let tuning = RhythmTuning::load(cfg.tuning.as_deref())
        .with_context(|| format!("load rhythm tuning ({:?})", cfg.tuning))?;

    let mut player = Player::open(cfg.device.as_deref(), cfg.volume).context("open audio output")?;
    log::info!("playing through {}", player.device_name());

    let _term = TerminalGuard::new()?;
    let mut out = BufWriter::new(TerminalGuard::stdout());

    let mut renderer: Box<dyn Renderer> = match cfg.renderer {
        RendererMode::HalfBlock => Box::new(HalfBlockRenderer::new()),
        RendererMode::Braille => Box::new(BrailleRenderer::new()),
    };
    let cell = renderer.cell_pixels();

    let mut last_size = crossterm::terminal::size().context("get terminal size")?;
    if last_size.1 < 3 || last_size.0 < 8 {
        return Err(anyhow::anyhow!(
            "terminal too small (need at least 8x3, got {}x{})",
            last_size.0,
            last_size.1
        ));
    }

    let mut show_hud = true;
    let mut show_help = false;
    let mut hud_rows = hud_rows_for_size(last_size, show_hud);
    let (w, h) = pixel_size(last_size, hud_rows, cell);

    let first = demo_track(&cfg, &player, 0);
    player.load(&first).context("load demo track")?;
    player.play();

    let mut s = Session {
        ducker: ScratchDucker::new(player.gain()),
        slider: SliderEngine::new(tuning, w, h),
        scrub: ScrubEngine::new(
            MonospaceMeasure {
                cell_width: TITLE_CELL_PX,
            },
            last_size.0 as f32 * TITLE_CELL_PX,
            track_title(&cfg, 0),
        )
        .with_padding(TITLE_CELL_PX),
        canvas: Canvas::new(w, h),
        capture: Capture::None,
        cell,
        tracks_loaded: 1,
        player,
    };

    let start = Instant::now();
    let mut last_frame = start;
    let mut fps = FpsCounter::new();

    loop {
        let now = Instant::now();

        // Drain input events (non-blocking).
        while event::poll(Duration::from_millis(0))? {
            match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => {
                    let old_hud = show_hud;
                    let should_quit = handle_key(k.code, k.modifiers, &cfg, &mut s, &mut show_hud, &mut show_help)?;
                    if should_quit {
                        return Ok(());
                    }
                    if show_hud != old_hud {
                        hud_rows = hud_rows_for_size(last_size, show_hud);
                        resize_surfaces(&mut s, last_size, hud_rows);
                    }
                }
                Event::Mouse(m) => handle_mouse(m, &mut s),
                Event::FocusLost => {
                    release_capture(
                        &mut s.capture,
                        &mut s.scrub,
                        &mut s.slider,
                        &mut s.player,
                        &mut s.ducker,
                        true,
                    );
                    s.slider.pointer_leave();
                }
                Event::Resize(c, r) => {
                    last_size = (c, r);
                    hud_rows = hud_rows_for_size(last_size, show_hud);
                    resize_surfaces(&mut s, last_size, hud_rows);
                }
                _ => {}
            }
        }

        // Size check once per frame (resize events can be missed in some terminals).
        let sz = crossterm::terminal::size()?;
        if sz != last_size {
            last_size = sz;
            hud_rows = hud_rows_for_size(last_size, show_hud);
            resize_surfaces(&mut s, last_size, hud_rows);
        }

        let dt = now.duration_since(last_frame).as_secs_f32();
        last_frame = now;
        let t = now.duration_since(start).as_secs_f32();

        let playing = s.player.is_playing();
        let volume = s.player.volume();
        let effective_volume = s.player.effective_volume();
        let slider_frame = {
            let snapshot = s.player.analyse();
            s.slider.tick(
                dt,
                &TickInput {
                    snapshot: Some(snapshot),
                    playing,
                    volume,
                    effective_volume,
                },
            )
        };
        s.canvas.paint(&slider_frame);

        let (term_cols, term_rows) = last_size;
        let position = s.player.position();
        let duration = s.player.duration();
        let clock = format!("{} / {}", format_time(position), format_time(duration));
        let title = {
            let view = s.scrub.view(position, duration, t);
            title_cells(&view, term_cols as usize, TITLE_CELL_PX, &clock)
        };

        let hud = if show_hud {
            let rhythm = &s.slider.state().rhythm;
            build_wrapped_hud(
                term_cols as usize,
                &HudLine {
                    volume,
                    effective_volume,
                    playing,
                    direction: rhythm.sticky_direction,
                    flow_rate: slider_frame.rhythm.flow_rate,
                    beat: slider_frame.rhythm.beat_strength,
                    front: slider_frame.front,
                    fps: fps.fps(),
                    renderer: renderer.name(),
                },
            )
        } else {
            String::new()
        };

        let target_hud_rows = hud_rows_for_text(term_rows, show_hud, &hud);
        if target_hud_rows != hud_rows {
            hud_rows = target_hud_rows;
            resize_surfaces(&mut s, last_size, hud_rows);
            // The canvas no longer matches; the next frame repaints at the new size.
            continue;
        }
        let visual_rows = visual_rows_for(term_rows, hud_rows);

        let frame = Frame {
            term_cols,
            term_rows,
            title: &title,
            visual_top: VISUAL_TOP,
            visual_rows,
            pixel_width: s.canvas.width(),
            pixel_height: s.canvas.height(),
            pixels_rgba: s.canvas.pixels(),
            hud: &hud,
            hud_rows,
            overlay: show_help.then(help_popup_text),
            sync_updates: cfg.sync_updates,
        };
        renderer.render(&frame, &mut out)?;
        fps.tick();

        // Frame pacing.
        let target = cfg.frame_interval();
        let elapsed = now.elapsed();
        if elapsed < target {
            std::thread::sleep(target - elapsed);
        }
    }
}

fn handle_key(
    code: KeyCode,
    modifiers: KeyModifiers,
    cfg: &Config,
    s: &mut Session,
    show_hud: &mut bool,
    show_help: &mut bool,
) -> anyhow::Result<bool> {
    match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
        KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
        KeyCode::Char(' ') => s.player.toggle(),
        KeyCode::Up => s.player.set_volume(s.player.volume() + VOLUME_STEP),
        KeyCode::Down => s.player.set_volume(s.player.volume() - VOLUME_STEP),
        KeyCode::Left => {
            let to = (s.player.position() - SEEK_STEP_S).max(0.0);
            s.player.seek(to);
        }
        KeyCode::Right => {
            let to = s.player.position() + SEEK_STEP_S;
            s.player.seek(to);
        }
        KeyCode::Char('n') => next_track(cfg, s)?,
        KeyCode::Char('i') => *show_hud = !*show_hud,
        KeyCode::Char('?') | KeyCode::Char('h') | KeyCode::F(1) => *show_help = !*show_help,
        _ => {}
    }
    Ok(false)
}

fn handle_mouse(m: MouseEvent, s: &mut Session) {
    let title_x = (m.column as f32 + 0.5) * TITLE_CELL_PX;
    let (sx, sy) = slider_point(m.column, m.row, s.cell);

    match m.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if m.row < VISUAL_TOP {
                if s.scrub.pointer_down(title_x, &mut s.player, &mut s.ducker) {
                    s.capture = Capture::Title;
                }
            } else {
                s.capture = Capture::Slider;
                let action = s.slider.pointer_down(sx, sy);
                apply_action(&mut s.player, action);
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => match s.capture {
            Capture::Title => s.scrub.pointer_move(title_x, &mut s.player, &mut s.ducker),
            Capture::Slider | Capture::None => {
                let action = s.slider.pointer_move(sx, sy);
                apply_action(&mut s.player, action);
            }
        },
        MouseEventKind::Up(MouseButton::Left) => {
            let action = release_capture(
                &mut s.capture,
                &mut s.scrub,
                &mut s.slider,
                &mut s.player,
                &mut s.ducker,
                false,
            );
            apply_action(&mut s.player, action);
        }
        MouseEventKind::Moved => {
            s.slider.pointer_move(sx, sy);
        }
        _ => {}
    }
}

/// End whatever the pointer holds. A scrub always finishes (restoring the
/// ducked gain); a cancelled slider press never toggles playback.
fn release_capture<G: GlyphMeasure>(
    capture: &mut Capture,
    scrub: &mut ScrubEngine<G>,
    slider: &mut SliderEngine,
    media: &mut impl MediaTransport,
    listener: &mut impl ScratchListener,
    cancelled: bool,
) -> Option<SliderAction> {
    let action = match *capture {
        Capture::Title => {
            scrub.pointer_up(media, listener);
            None
        }
        Capture::Slider if cancelled => {
            slider.pointer_cancel();
            None
        }
        Capture::Slider => slider.pointer_up(),
        Capture::None => None,
    };
    *capture = Capture::None;
    action
}

fn apply_action(player: &mut Player, action: Option<SliderAction>) {
    match action {
        Some(SliderAction::SetVolume(v)) => player.set_volume(v),
        Some(SliderAction::TogglePlay) => player.toggle(),
        None => {}
    }
}

/// Centre of a terminal cell in slider pixel coordinates. Rows above the
/// slider map to negative `y`, which the hover field treats as outside.
fn slider_point(col: u16, row: u16, cell: (usize, usize)) -> (f32, f32) {
    let x = (col as f32 + 0.5) * cell.0 as f32;
    let y = (row as f32 - VISUAL_TOP as f32 + 0.5) * cell.1 as f32;
    (x, y)
}

fn next_track(cfg: &Config, s: &mut Session) -> anyhow::Result<()> {
    let k = s.tracks_loaded;
    let track = demo_track(cfg, &s.player, k);
    s.player.load(&track).context("load demo track")?;
    s.tracks_loaded += 1;
    s.slider.song_changed();
    s.scrub.title_changed(track_title(cfg, k));
    s.scrub.song_changed();
    log::info!("track {k}: {}", s.scrub.title());
    Ok(())
}

fn demo_track(cfg: &Config, player: &Player, k: u64) -> DemoTrack {
    DemoTrack::new(player.sample_rate_hz(), cfg.track_seconds, cfg.bpm).with_seed(0x5eed_0000 + k)
}

fn track_title(cfg: &Config, k: u64) -> String {
    match cfg.title.as_deref() {
        Some(name) if k == 0 => display_name(Some(name), FALLBACK_TITLE),
        _ => display_name(Some(&format!("demo_{:.0}bpm_{}.wav", cfg.bpm, k + 1)), FALLBACK_TITLE),
    }
}

fn resize_surfaces(s: &mut Session, size: (u16, u16), hud_rows: u16) {
    let (w, h) = pixel_size(size, hud_rows, s.cell);
    s.slider.resize(w, h);
    s.canvas.resize(w, h);
    s.scrub.resize(size.0 as f32 * TITLE_CELL_PX);
}

fn visual_rows_for(term_rows: u16, hud_rows: u16) -> u16 {
    term_rows.saturating_sub(VISUAL_TOP).saturating_sub(hud_rows).max(1)
}

fn pixel_size(size: (u16, u16), hud_rows: u16, cell: (usize, usize)) -> (usize, usize) {
    let visual_rows = visual_rows_for(size.1, hud_rows);
    (
        (size.0 as usize).saturating_mul(cell.0),
        (visual_rows as usize).saturating_mul(cell.1),
    )
}

fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "--:--".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn hud_rows_for_size(size: (u16, u16), show_hud: bool) -> u16 {
    if !show_hud {
        return 0;
    }
    let rows = size.1;
    if rows <= VISUAL_TOP + 1 {
        return 0;
    }
    (rows - VISUAL_TOP - 1).min(2)
}

fn hud_rows_for_text(term_rows: u16, show_hud: bool, hud: &str) -> u16 {
    if !show_hud {
        return 0;
    }
    let max_rows = term_rows.saturating_sub(VISUAL_TOP + 1);
    let wanted = hud.lines().count() as u16;
    wanted.min(max_rows)
}

struct HudLine<'a> {
    volume: f32,
    effective_volume: f32,
    playing: bool,
    direction: Direction,
    flow_rate: f32,
    beat: f32,
    front: f32,
    fps: f32,
    renderer: &'a str,
}

fn build_wrapped_hud(cols: usize, h: &HudLine<'_>) -> String {
    let logical_lines = vec![
        format!(
            "{} | Vol: {:>3.0}% (out {:>3.0}%) | Flow: {}{:>4.2} | Beat: {:>4.2} | Front: {:>4.2} | {} | FPS: {:>4.1}",
            if h.playing { "Playing" } else { "Paused" },
            h.volume * 100.0,
            h.effective_volume * 100.0,
            match h.direction {
                Direction::Forward => "+",
                Direction::Reverse => "-",
            },
            h.flow_rate,
            h.beat,
            h.front,
            h.renderer,
            h.fps,
        ),
        "Keys: space play/pause | up/down volume | left/right seek | n next track | i HUD | ? help | q quit".to_string(),
    ];

    wrap_hud_lines(cols, &logical_lines).join("\n")
}

fn wrap_hud_lines(cols: usize, lines: &[String]) -> Vec<String> {
    let width = cols.max(1);
    let mut out = Vec::new();
    for line in lines {
        out.extend(hard_wrap_line(line, width));
    }
    out
}

fn hard_wrap_line(line: &str, width: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }

    let mut out = Vec::new();
    let mut cur = String::new();
    let mut cur_len = 0usize;
    for ch in line.chars() {
        cur.push(ch);
        cur_len += 1;
        if cur_len >= width {
            out.push(cur);
            cur = String::new();
            cur_len = 0;
        }
    }
    if !cur.is_empty() {
        out.push(cur);
    }
    out
}

fn help_popup_text() -> &'static str {
    "sine_player\n\
space  play/pause\n\
click the icon  play/pause\n\
drag the waves  set volume\n\
drag the title  scrub through the track\n\
up/down  volume\n\
left/right  seek 5s\n\
n  next demo track\n\
i  show/hide HUD\n\
? or h or F1  toggle this help\n\
q or esc  quit"
}

struct FpsCounter {
    last: Instant,
    frames: u32,
    fps: f32,
}

impl FpsCounter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            frames: 0,
            fps: 0.0,
        }
    }

    fn tick(&mut self) {
        self.frames += 1;
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        if dt >= 0.5 {
            self.fps = (self.frames as f32) / dt;
            self.frames = 0;
            self.last = now;
        }
    }

    fn fps(&self) -> f32 {
        self.fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_wrap_splits_on_width() {
        assert_eq!(hard_wrap_line("abcdef", 4), vec!["abcd".to_string(), "ef".to_string()]);
        assert_eq!(hard_wrap_line("", 4), vec![String::new()]);
    }

    #[test]
    fn time_is_minutes_and_seconds() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(125.9), "2:05");
        assert_eq!(format_time(f64::NAN), "--:--");
    }

    #[test]
    fn slider_points_are_cell_centres_below_the_title() {
        assert_eq!(slider_point(0, 1, (1, 2)), (0.5, 1.0));
        assert_eq!(slider_point(3, 2, (2, 4)), (7.0, 6.0));
        let (_, y) = slider_point(0, 0, (1, 2));
        assert!(y < 0.0);
    }

    #[derive(Default)]
    struct Media {
        playing: bool,
        position: f64,
    }

    impl MediaTransport for Media {
        fn duration(&self) -> f64 {
            120.0
        }
        fn position(&self) -> f64 {
            self.position
        }
        fn seek(&mut self, seconds: f64) {
            self.position = seconds;
        }
        fn is_playing(&self) -> bool {
            self.playing
        }
        fn play(&mut self) {
            self.playing = true;
        }
        fn pause(&mut self) {
            self.playing = false;
        }
    }

    #[derive(Default)]
    struct Ends(Vec<bool>);

    impl ScratchListener for Ends {
        fn on_scratch_begin(&mut self, _was_playing: bool) {}
        fn on_scratch_update(&mut self, _speed: f32) {}
        fn on_scratch_end(&mut self, resume: bool) {
            self.0.push(resume);
        }
    }

    fn slider_with_icon() -> (SliderEngine, f32, f32) {
        let mut slider = SliderEngine::new(RhythmTuning::default(), 400, 56);
        let frame = slider.tick(
            1.0 / 60.0,
            &TickInput {
                snapshot: None,
                playing: true,
                volume: 0.5,
                effective_volume: 0.5,
            },
        );
        let icon = frame.geometry.icon;
        (slider, icon.x + 3.0, icon.center_y())
    }

    #[test]
    fn focus_loss_mid_scrub_ends_the_session() {
        let mut scrub = ScrubEngine::new(MonospaceMeasure { cell_width: 25.0 }, 200.0, "abcd").with_padding(10.0);
        let (mut slider, _, _) = slider_with_icon();
        let mut media = Media {
            playing: true,
            ..Media::default()
        };
        let mut ends = Ends::default();
        assert!(scrub.pointer_down(60.0, &mut media, &mut ends));
        let mut capture = Capture::Title;

        let action = release_capture(&mut capture, &mut scrub, &mut slider, &mut media, &mut ends, true);
        assert_eq!(action, None);
        assert_eq!(capture, Capture::None);
        assert!(!scrub.is_dragging());
        assert_eq!(ends.0, vec![true]);
        assert!(media.playing);

        // A second release finds nothing to end.
        release_capture(&mut capture, &mut scrub, &mut slider, &mut media, &mut ends, true);
        assert_eq!(ends.0.len(), 1);
    }

    #[test]
    fn cancelled_icon_press_does_not_toggle() {
        let mut scrub = ScrubEngine::new(MonospaceMeasure { cell_width: 8.0 }, 400.0, "abcd");
        let mut media = Media::default();
        let mut ends = Ends::default();

        let (mut slider, x, y) = slider_with_icon();
        assert_eq!(slider.pointer_down(x, y), None);
        let mut capture = Capture::Slider;
        let action = release_capture(&mut capture, &mut scrub, &mut slider, &mut media, &mut ends, true);
        assert_eq!(action, None);
        assert_eq!(capture, Capture::None);
        assert!(!slider.state().gesture.is_dragging());

        assert_eq!(slider.pointer_down(x, y), None);
        capture = Capture::Slider;
        let action = release_capture(&mut capture, &mut scrub, &mut slider, &mut media, &mut ends, false);
        assert_eq!(action, Some(SliderAction::TogglePlay));
        assert!(ends.0.is_empty());
    }

    #[test]
    fn pixel_size_leaves_room_for_title_and_hud() {
        assert_eq!(pixel_size((80, 24), 2, (1, 2)), (80, 42));
        assert_eq!(pixel_size((80, 24), 0, (2, 4)), (160, 92));
        assert_eq!(pixel_size((10, 2), 5, (1, 2)), (10, 2));
    }
}
