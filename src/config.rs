use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "sine_player", version, about = "Terminal audio player with an audio-reactive sine volume slider")]
pub struct Config {
    #[arg(long, value_enum, default_value_t = RendererMode::HalfBlock)]
    pub renderer: RendererMode,

    #[arg(long, default_value_t = 60)]
    pub fps: u32,

    #[arg(long, default_value_t = false)]
    pub list_devices: bool,

    /// Output device (case-insensitive substring match).
    #[arg(long)]
    pub device: Option<String>,

    /// Starting volume, 0..1.
    #[arg(long, default_value_t = 0.7)]
    pub volume: f32,

    /// File name shown in the title bar; the extension is dropped.
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, default_value_t = 124.0)]
    pub bpm: f32,

    #[arg(long, default_value_t = 150.0)]
    pub track_seconds: f32,

    /// `key=value` overrides for the rhythm tuning.
    #[arg(long)]
    pub tuning: Option<PathBuf>,

    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub sync_updates: bool,

    /// Write logs here instead of stderr (the terminal is in alternate-screen mode).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererMode {
    #[value(name = "half-block", alias = "halfblock", alias = "half_block", alias = "hb")]
    HalfBlock,
    #[value(alias = "hires", alias = "dots")]
    Braille,
}

impl Config {
    /// `RUST_LOG` still wins. Without a log file, stderr would draw over the alternate screen.
    pub fn default_log_filter(&self) -> &'static str {
        if self.log_file.is_some() { "warn" } else { "off" }
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.fps.clamp(10, 240) as f64)
    }
}
