use clap::Parser;
use sine_player::config::{Config, RendererMode};
use sine_player::tuning::{RhythmTuning, TuningError};
use std::time::Duration;

// ── Command line ────────────────────────────────────────────────────────────

#[test]
fn defaults_parse_without_arguments() {
    let cfg = Config::try_parse_from(["sine_player"]).expect("defaults should parse");
    assert_eq!(cfg.renderer, RendererMode::HalfBlock);
    assert_eq!(cfg.fps, 60);
    assert!((cfg.volume - 0.7).abs() < 1e-6);
    assert!(cfg.sync_updates);
    assert!(cfg.title.is_none());
    assert!(cfg.tuning.is_none());
}

#[test]
fn renderer_aliases_and_flags_parse() {
    let cfg = Config::try_parse_from([
        "sine_player",
        "--renderer",
        "hires",
        "--title",
        "Night Drive.flac",
        "--sync-updates",
        "false",
        "--bpm",
        "96",
    ])
    .expect("flags should parse");
    assert_eq!(cfg.renderer, RendererMode::Braille);
    assert_eq!(cfg.title.as_deref(), Some("Night Drive.flac"));
    assert!(!cfg.sync_updates);
    assert_eq!(cfg.bpm, 96.0);

    let hb = Config::try_parse_from(["sine_player", "--renderer", "hb"]).expect("alias should parse");
    assert_eq!(hb.renderer, RendererMode::HalfBlock);
}

#[test]
fn unknown_renderer_is_rejected() {
    assert!(Config::try_parse_from(["sine_player", "--renderer", "kitty"]).is_err());
}

#[test]
fn frame_interval_is_clamped() {
    let mut cfg = Config::try_parse_from(["sine_player"]).expect("defaults should parse");
    cfg.fps = 1;
    assert_eq!(cfg.frame_interval(), Duration::from_millis(100));
    cfg.fps = 10_000;
    assert!(cfg.frame_interval() >= Duration::from_secs_f64(1.0 / 240.0));
}

#[test]
fn logging_is_off_unless_a_log_file_is_given() {
    let cfg = Config::try_parse_from(["sine_player"]).expect("defaults should parse");
    assert_eq!(cfg.default_log_filter(), "off");
    let cfg = Config::try_parse_from(["sine_player", "--log-file", "/tmp/sine_player.log"])
        .expect("log file should parse");
    assert_eq!(cfg.default_log_filter(), "warn");
}

// ── Rhythm tuning ───────────────────────────────────────────────────────────

#[test]
fn tuning_overrides_named_fields() {
    let text = r#"
        # quieter material
        low_thresh = 0.22
        resume_floor=0.5

        unknown_knob = 3
    "#;
    let t = RhythmTuning::parse(text).expect("tuning should parse");
    assert_eq!(t.low_thresh, 0.22);
    assert_eq!(t.resume_floor, 0.5);
    assert_eq!(t.high_thresh, RhythmTuning::default().high_thresh);
}

#[test]
fn tuning_reports_the_bad_line() {
    let err = RhythmTuning::parse("low_thresh = 0.2\nnot a pair\n").expect_err("should fail");
    assert_eq!(
        err,
        TuningError::Parse {
            line: 2,
            message: "expected <key>=<value>".to_string()
        }
    );

    let err = RhythmTuning::parse("decay_base = fast").expect_err("should fail");
    assert!(matches!(err, TuningError::Parse { line: 1, .. }));
    let err = RhythmTuning::parse("decay_base = NaN").expect_err("should fail");
    assert!(matches!(err, TuningError::Parse { line: 1, .. }));
}

#[test]
fn tuning_rejects_inverted_hysteresis() {
    let err = RhythmTuning::parse("sticky_exit = 0.3").expect_err("exit above enter");
    assert!(matches!(err, TuningError::Invalid(_)));
    let err = RhythmTuning::parse("flow_rate_ease = 1.5").expect_err("ease above one");
    assert!(err.to_string().contains("flow_rate_ease"));
    let err = RhythmTuning::parse("low_thresh = 0").expect_err("zero threshold");
    assert!(matches!(err, TuningError::Invalid(_)));
}

#[test]
fn tuning_file_loads_or_falls_back() {
    assert_eq!(RhythmTuning::load(None), Ok(RhythmTuning::default()));

    let dir = std::env::temp_dir();
    let missing = dir.join(format!("sine_player_missing_{}.tuning", std::process::id()));
    assert_eq!(RhythmTuning::load(Some(&missing)), Ok(RhythmTuning::default()));

    let path = dir.join(format!("sine_player_tuning_{}.tuning", std::process::id()));
    std::fs::write(&path, "build_rate_base = 2.0\n").expect("write temp tuning");
    let loaded = RhythmTuning::load(Some(&path));
    let _ = std::fs::remove_file(&path);
    assert_eq!(loaded.map(|t| t.build_rate_base), Ok(2.0));
}
