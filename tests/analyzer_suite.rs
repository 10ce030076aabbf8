use sine_player::analyzer::{AnalyserSnapshot, FrameSample, SpectralAnalyzer};
use sine_player::audio::{AnalyserNode, DemoTrack, FFT_SIZE, Section};
use std::f32::consts::PI;

const SR: f32 = 48_000.0;

fn snapshot<'a>(time: &'a [u8], freq: &'a [u8]) -> AnalyserSnapshot<'a> {
    AnalyserSnapshot {
        time_domain: time,
        frequency: freq,
        sample_rate_hz: SR,
    }
}

// ── Features ────────────────────────────────────────────────────────────────

#[test]
fn missing_snapshot_decays_rms_only() {
    let mut a = SpectralAnalyzer::new();
    let loud: Vec<u8> = (0..1024).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
    let freq = vec![0u8; 512];
    let before = a.analyze(Some(snapshot(&loud, &freq))).rms;
    let s = a.analyze(None);
    assert!(s.rms < before && s.rms > 0.0);
    assert_eq!(s.bass, 0.0);
    assert_eq!(s.flatness, FrameSample::default().flatness);
}

#[test]
fn silence_reads_as_no_energy() {
    let mut a = SpectralAnalyzer::new();
    let time = vec![128u8; 1024];
    let freq = vec![0u8; 512];
    let s = a.analyze(Some(snapshot(&time, &freq)));
    assert_eq!(s.rms, 0.0);
    assert_eq!((s.bass, s.mid, s.treble, s.vocal), (0.0, 0.0, 0.0, 0.0));
}

#[test]
fn rms_converges_for_a_full_scale_signal() {
    let mut a = SpectralAnalyzer::new();
    let time: Vec<u8> = (0..1024).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect();
    let freq = vec![0u8; 512];
    let first = a.analyze(Some(snapshot(&time, &freq))).rms;
    assert!((first - 0.2).abs() < 0.01, "first {first}");
    for _ in 0..60 {
        a.analyze(Some(snapshot(&time, &freq)));
    }
    assert!(a.rms() > 0.98);
}

#[test]
fn bass_heavy_spectrum_lands_in_the_bass_band() {
    let mut a = SpectralAnalyzer::new();
    let time = vec![128u8; 1024];
    // 512 bins over 24 kHz: bins 0..=5 cover 20-250 Hz.
    let freq: Vec<u8> = (0..512).map(|i| if i <= 5 { 255 } else { 0 }).collect();
    let s = a.analyze(Some(snapshot(&time, &freq)));
    assert_eq!(s.bass, 1.0);
    assert!(s.mid < 0.05);
    assert_eq!(s.treble, 0.0);
    assert!((20.0..=250.0).contains(&s.bass_centroid_hz));
    assert!(s.flatness > 50.0);
    assert_eq!(s.noise_factor(), 0.0);
    assert!(s.relative_to_mean(s.bass) > 2.0);
}

#[test]
fn flat_spectrum_reads_as_noise() {
    let mut a = SpectralAnalyzer::new();
    let time = vec![128u8; 1024];
    let freq = vec![128u8; 512];
    let s = a.analyze(Some(snapshot(&time, &freq)));
    assert!((s.flatness - 1.0).abs() < 1e-4);
    assert!(s.noise_factor() > 0.8);
    assert!((s.bass - s.treble).abs() < 1e-6);
}

#[test]
fn relative_to_mean_passes_through_on_silence() {
    let s = FrameSample::default();
    assert_eq!(s.band_mean(), 0.0);
    assert_eq!(s.relative_to_mean(0.4), 0.4);
}

// ── Analyser node ───────────────────────────────────────────────────────────

#[test]
fn low_tone_shows_up_as_bass() {
    let mut node = AnalyserNode::new(SR as u32);
    for _ in 0..8 {
        node.push_samples((0..FFT_SIZE).map(|i| (2.0 * PI * 100.0 * i as f32 / SR).sin() * 0.05));
        node.update();
    }
    let mut a = SpectralAnalyzer::new();
    let s = a.analyze(Some(node.snapshot()));
    assert!(s.bass > s.treble + 0.3, "bass {} treble {}", s.bass, s.treble);
    assert!(s.rms > 0.0);
}

// ── Demo track ──────────────────────────────────────────────────────────────

#[test]
fn demo_track_parameters_are_clamped() {
    let t = DemoTrack::new(100, 1.0, 1_000.0);
    assert_eq!(t.sample_rate, 8_000);
    assert_eq!(t.seconds, 4.0);
    assert_eq!(t.bpm, 240.0);
}

#[test]
fn demo_track_has_every_section() {
    let t = DemoTrack::new(8_000, 100.0, 120.0);
    assert_eq!(t.section_at(0.0), Section::Intro);
    assert_eq!(t.section_at(30.0), Section::Groove);
    assert_eq!(t.section_at(50.0), Section::Breakdown);
    assert_eq!(t.section_at(95.0), Section::Outro);
}

#[test]
fn demo_track_renders_bounded_and_seeded() {
    let t = DemoTrack::new(8_000, 8.0, 120.0);
    let a = t.render();
    assert_eq!(a.len(), t.frames());
    assert_eq!(a.len(), 64_000);
    assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
    assert_eq!(a, t.render());
    assert_ne!(a, t.with_seed(99).render());

    let rms = |s: &[f32]| (s.iter().map(|v| v * v).sum::<f32>() / s.len() as f32).sqrt();
    let intro = rms(&a[..800]);
    let groove = rms(&a[16_000..24_000]);
    assert!(groove > intro, "groove {groove} intro {intro}");
}
