pub const VISIBLE_CHARS: usize = 24;
pub const MARQUEE_PX_PER_S: f32 = 48.0;
/// Seeks never land exactly on the end so the track does not finish mid-drag.
pub const END_EPSILON: f64 = 1e-4;
pub const DEFAULT_PAD_X: f32 = 2.0;
const FULL_SPEED_PX: f32 = 12.0;
/// Scratch speeds are scaled down to keep the ducked audio from breaking up.
const SPEED_FACTOR: f32 = 0.8;

pub const TITLE_TEXT: [u8; 3] = [71, 85, 105];
pub const OVERLAY_COLORS: [[u8; 3]; 3] = [[239, 68, 68], [251, 191, 36], [59, 130, 246]];

/// The playback side as the scrub surface sees it. Times are in seconds.
pub trait MediaTransport {
    fn duration(&self) -> f64;
    fn position(&self) -> f64;
    fn seek(&mut self, seconds: f64);
    fn is_playing(&self) -> bool;
    fn play(&mut self);
    fn pause(&mut self);
}

/// Receives scratch notifications, e.g. to duck the output while scrubbing.
pub trait ScratchListener {
    fn on_scratch_begin(&mut self, was_playing: bool);
    /// `speed` is in `0..=1`.
    fn on_scratch_update(&mut self, speed: f32);
    fn on_scratch_end(&mut self, resume: bool);
}

pub trait GlyphMeasure {
    fn measure(&self, text: &str) -> f32;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MonospaceMeasure {
    pub cell_width: f32,
}

impl GlyphMeasure for MonospaceMeasure {
    fn measure(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.cell_width
    }
}

/// Title shown for a loaded file: the name without its extension.
pub fn display_name(file_name: Option<&str>, fallback: &str) -> String {
    let Some(name) = file_name.map(str::trim).filter(|n| !n.is_empty()) else {
        return fallback.to_string();
    };
    let base = match name.rfind('.') {
        Some(dot) if dot + 1 < name.len() && !name[dot + 1..].contains('/') => &name[..dot],
        _ => name,
    };
    if base.is_empty() { fallback.to_string() } else { base.to_string() }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeekBounds {
    pub left: f32,
    pub right: f32,
    pub window_width: f32,
}

impl SeekBounds {
    pub fn new(left: f32, window_width: f32) -> Self {
        let window_width = window_width.max(1.0);
        Self {
            left,
            right: left + window_width,
            window_width,
        }
    }

    pub fn ratio_at(&self, x: f32) -> f32 {
        let clamped = x.clamp(self.left, self.right);
        ((clamped - self.left) / self.window_width).clamp(0.0, 1.0)
    }

    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }
}

/// Measured title: the visible window and, for long titles, the marquee loop.
#[derive(Clone, Debug, PartialEq)]
pub struct TitleLayout {
    pub pad_x: f32,
    pub window_width: f32,
    pub overflow: bool,
    pub loop_text: String,
    pub loop_width: f32,
}

impl TitleLayout {
    pub fn measure(measure: &impl GlyphMeasure, title: &str, surface_width: f32, pad_x: f32) -> Self {
        let max_w = (surface_width - pad_x * 2.0).max(1.0);
        let overflow = title.chars().count() > VISIBLE_CHARS;
        let head: String = title.chars().take(VISIBLE_CHARS).collect();
        let window_width = measure.measure(&head).max(1.0).min(max_w);
        let loop_text = if overflow {
            format!("{title}... {title}...")
        } else {
            title.to_string()
        };
        let loop_width = measure.measure(&loop_text).max(1.0);
        Self {
            pad_x,
            window_width,
            overflow,
            loop_text,
            loop_width,
        }
    }

    pub fn bounds(&self) -> SeekBounds {
        SeekBounds::new(self.pad_x, self.window_width)
    }

    pub fn scroll_px(&self, now_s: f32) -> f32 {
        if self.overflow {
            (now_s.max(0.0) * MARQUEE_PX_PER_S).rem_euclid(self.loop_width)
        } else {
            0.0
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrubSession {
    pub bounds: SeekBounds,
    pub locked_at_start: bool,
    pub locked_at_end: bool,
    pub last_x: f32,
    pub was_playing: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TitleView<'a> {
    pub layout: &'a TitleLayout,
    pub scroll_px: f32,
    /// Width of the progress overlay, measured from the window's left edge.
    pub fill_px: f32,
    pub overlay: [u8; 3],
}

pub struct ScrubEngine<G> {
    measure: G,
    surface_width: f32,
    pad_x: f32,
    title: String,
    layout: Option<TitleLayout>,
    session: Option<ScrubSession>,
    songs: usize,
}

impl<G: GlyphMeasure> ScrubEngine<G> {
    pub fn new(measure: G, surface_width: f32, title: impl Into<String>) -> Self {
        Self {
            measure,
            surface_width,
            pad_x: DEFAULT_PAD_X,
            title: title.into(),
            layout: None,
            session: None,
            songs: 0,
        }
    }

    pub fn with_padding(mut self, pad_x: f32) -> Self {
        self.pad_x = pad_x;
        self.layout = None;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn resize(&mut self, surface_width: f32) {
        self.surface_width = surface_width;
        self.layout = None;
    }

    pub fn title_changed(&mut self, title: impl Into<String>) {
        let title = title.into();
        if title != self.title {
            self.title = title;
            self.layout = None;
        }
    }

    pub fn song_changed(&mut self) {
        self.songs = self.songs.wrapping_add(1);
        self.layout = None;
    }

    pub fn overlay_color(&self) -> [u8; 3] {
        OVERLAY_COLORS[self.songs % OVERLAY_COLORS.len()]
    }

    pub fn layout(&mut self) -> &TitleLayout {
        let (measure, title, width, pad) = (&self.measure, &self.title, self.surface_width, self.pad_x);
        self.layout
            .get_or_insert_with(|| TitleLayout::measure(measure, title, width, pad))
    }

    pub fn bounds(&mut self) -> SeekBounds {
        self.layout().bounds()
    }

    pub fn session(&self) -> Option<&ScrubSession> {
        self.session.as_ref()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.is_some()
    }

    /// Start a drag if `x` lands inside the title window and the track has a length.
    pub fn pointer_down(
        &mut self,
        x: f32,
        media: &mut impl MediaTransport,
        listener: &mut impl ScratchListener,
    ) -> bool {
        let duration = media.duration();
        if !duration.is_finite() || duration <= 0.0 {
            return false;
        }
        let bounds = self.bounds();
        if !bounds.contains(x) {
            return false;
        }
        seek_ratio(media, bounds.ratio_at(x));
        let was_playing = media.is_playing();
        self.session = Some(ScrubSession {
            bounds,
            locked_at_start: false,
            locked_at_end: false,
            last_x: x.clamp(bounds.left, bounds.right),
            was_playing,
        });
        log::debug!("scrub: begin at {:.1}s (was playing: {was_playing})", media.position());
        listener.on_scratch_begin(was_playing);
        true
    }

    pub fn pointer_move(
        &mut self,
        x: f32,
        media: &mut impl MediaTransport,
        listener: &mut impl ScratchListener,
    ) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let b = session.bounds;
        if x <= b.left {
            session.locked_at_start = true;
            session.locked_at_end = false;
            session.last_x = b.left;
            media.seek(0.0);
            listener.on_scratch_update(0.0);
            return;
        }
        if x >= b.right {
            session.locked_at_start = false;
            session.locked_at_end = true;
            session.last_x = b.right;
            media.seek((media.duration() - END_EPSILON).max(0.0));
            listener.on_scratch_update(0.0);
            return;
        }
        session.locked_at_start = false;
        session.locked_at_end = false;
        seek_ratio(media, b.ratio_at(x));
        let dx = x - session.last_x;
        session.last_x = x;
        let speed = (dx.abs() / FULL_SPEED_PX).min(1.0);
        listener.on_scratch_update(speed * SPEED_FACTOR);
    }

    /// Finish the drag: re-seek from the last pointer position, then pause at
    /// the end lock or resume if playback was running when the drag began.
    pub fn pointer_up(&mut self, media: &mut impl MediaTransport, listener: &mut impl ScratchListener) {
        let Some(session) = self.session.take() else {
            return;
        };
        seek_ratio(media, session.bounds.ratio_at(session.last_x));
        let resume = !session.locked_at_end && session.was_playing;
        if session.locked_at_end {
            media.pause();
        } else if resume {
            media.play();
        }
        log::debug!(
            "scrub: end at {:.1}s (resume: {resume}, end lock: {})",
            media.position(),
            session.locked_at_end
        );
        listener.on_scratch_end(resume);
    }

    pub fn view(&mut self, position: f64, duration: f64, now_s: f32) -> TitleView<'_> {
        let overlay = self.overlay_color();
        let drag_x = self.session.map(|s| s.last_x);
        let layout = self.layout();
        let fill_px = match drag_x {
            Some(x) => (x - layout.pad_x).clamp(0.0, layout.window_width),
            None => {
                let pct = if duration > 0.0 && duration.is_finite() {
                    (position / duration).clamp(0.0, 1.0) as f32
                } else {
                    0.0
                };
                layout.window_width * pct
            }
        };
        TitleView {
            scroll_px: layout.scroll_px(now_s),
            fill_px,
            overlay,
            layout,
        }
    }
}

fn seek_ratio(media: &mut impl MediaTransport, ratio: f32) {
    let duration = media.duration();
    if !duration.is_finite() || duration <= 0.0 {
        return;
    }
    let target = (ratio as f64 * duration).clamp(0.0, (duration - END_EPSILON).max(0.0));
    media.seek(target);
}
