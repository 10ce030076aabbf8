mod analyser;
mod ducking;
mod track;

pub use analyser::{AnalyserNode, FFT_SIZE, MAX_DB, MIN_DB, SMOOTHING};
pub use ducking::ScratchDucker;
pub use track::{DemoTrack, Section};

use crate::analyzer::AnalyserSnapshot;
use crate::scrub::MediaTransport;
use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};
use ringbuf::HeapRb;
use ringbuf::traits::{Consumer as _, Producer as _, Split as _};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

const NO_SEEK: u64 = u64::MAX;
/// Time constant for plain volume changes, seconds.
pub const VOLUME_TAU_S: f32 = 0.015;

/// Main gain shared with the audio callback. Targets are approached
/// exponentially with a per-target time constant.
pub struct GainControl {
    volume: AtomicU32,
    target: AtomicU32,
    tau: AtomicU32,
    current: AtomicU32,
}

impl GainControl {
    pub fn new(volume: f32) -> Self {
        let v = volume.clamp(0.0, 1.0);
        Self {
            volume: AtomicU32::new(v.to_bits()),
            target: AtomicU32::new(v.to_bits()),
            tau: AtomicU32::new(VOLUME_TAU_S.to_bits()),
            current: AtomicU32::new(v.to_bits()),
        }
    }

    /// The listener's chosen volume.
    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, v: f32) {
        let v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
        self.volume.store(v.to_bits(), Ordering::Relaxed);
        self.set_target(v, VOLUME_TAU_S);
    }

    pub fn set_target(&self, gain: f32, tau_s: f32) {
        let gain = if gain.is_finite() { gain.clamp(0.0, 1.0) } else { 0.0 };
        self.tau.store(tau_s.max(1e-4).to_bits(), Ordering::Relaxed);
        self.target.store(gain.to_bits(), Ordering::Relaxed);
    }

    pub fn target(&self) -> f32 {
        f32::from_bits(self.target.load(Ordering::Relaxed))
    }

    /// Gain actually applied by the callback most recently.
    pub fn current(&self) -> f32 {
        f32::from_bits(self.current.load(Ordering::Relaxed))
    }

    /// Per-sample smoothing coefficient for the current time constant.
    fn coefficient(&self, sample_rate: f32) -> f32 {
        let tau = f32::from_bits(self.tau.load(Ordering::Relaxed));
        1.0 - (-1.0 / (tau * sample_rate)).exp()
    }

    fn publish(&self, gain: f32) {
        self.current.store(gain.to_bits(), Ordering::Relaxed);
    }
}

struct Transport {
    playing: AtomicBool,
    position: AtomicU64,
    seek_to: AtomicU64,
    length: AtomicU64,
}

pub fn list_output_devices() -> anyhow::Result<()> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .context("enumerate output devices")?;

    let mut out = io::stdout();
    writeln!(out, "Output devices:")?;
    for dev in devices {
        let name = dev.name().unwrap_or_else(|_| "<unknown>".to_string());
        writeln!(out, "  - {}", name)?;
    }
    Ok(())
}

fn select_output_device(host: &cpal::Host, device_query: Option<&str>) -> anyhow::Result<cpal::Device> {
    let devices = host
        .output_devices()
        .context("enumerate output devices")?
        .collect::<Vec<_>>();

    if let Some(want) = device_query.map(|s| s.to_lowercase()) {
        if let Some(dev) = devices.iter().find(|d| {
            d.name()
                .map(|n| n.to_lowercase().contains(&want))
                .unwrap_or(false)
        }) {
            return Ok(dev.clone());
        }
        return Err(anyhow!("no output device matching: {want}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("no default output device found"))
}

/// Callback-side state. Lives on the audio thread.
struct Voice {
    track: Arc<[f32]>,
    pos: usize,
    gain: f32,
    channels: usize,
    sample_rate: f32,
    transport: Arc<Transport>,
    gain_ctl: Arc<GainControl>,
    tracks: ringbuf::HeapCons<Arc<[f32]>>,
    retired: ringbuf::HeapProd<Arc<[f32]>>,
    tap: ringbuf::HeapProd<f32>,
}

impl Voice {
    fn fill<T: SizedSample + FromSample<f32>>(&mut self, data: &mut [T]) {
        if let Some(next) = self.tracks.try_pop() {
            // The old buffer is freed by `Player`, off the audio thread.
            let old = std::mem::replace(&mut self.track, next);
            let _ = self.retired.try_push(old);
            self.pos = 0;
        }
        let seek = self.transport.seek_to.swap(NO_SEEK, Ordering::AcqRel);
        if seek != NO_SEEK {
            self.pos = (seek as usize).min(self.track.len());
        }

        let playing = self.transport.playing.load(Ordering::Relaxed);
        let target = self.gain_ctl.target();
        let k = self.gain_ctl.coefficient(self.sample_rate);
        for frame in data.chunks_mut(self.channels) {
            let dry = if playing && self.pos < self.track.len() {
                let s = self.track[self.pos];
                self.pos += 1;
                s
            } else {
                0.0
            };
            self.gain += (target - self.gain) * k;
            let wet = dry * self.gain;
            let _ = self.tap.try_push(wet);
            let out = T::from_sample(wet);
            for s in frame.iter_mut() {
                *s = out;
            }
        }

        if playing && self.pos >= self.track.len() {
            self.transport.playing.store(false, Ordering::Relaxed);
        }
        self.transport.position.store(self.pos as u64, Ordering::Relaxed);
        self.gain_ctl.publish(self.gain);
    }
}

pub struct Player {
    stream: cpal::Stream,
    transport: Arc<Transport>,
    gain: Arc<GainControl>,
    tracks: ringbuf::HeapProd<Arc<[f32]>>,
    retired: ringbuf::HeapCons<Arc<[f32]>>,
    tap: ringbuf::HeapCons<f32>,
    analyser: AnalyserNode,
    sample_rate_hz: u32,
    device_name: String,
}

impl Player {
    pub fn open(device_query: Option<&str>, volume: f32) -> anyhow::Result<Self> {
        let host = cpal::default_host();
        let device = select_output_device(&host, device_query)?;
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        let supported = device
            .default_output_config()
            .context("get default output config")?;
        let sample_rate_hz = supported.sample_rate().0;
        let channels = (supported.channels() as usize).max(1);
        let config: cpal::StreamConfig = supported.clone().into();
        log::info!(
            "output device: {device_name} ({sample_rate_hz} Hz, {channels} ch, {:?})",
            supported.sample_format()
        );

        let (tap_prod, tap) = HeapRb::<f32>::new(sample_rate_hz as usize).split();
        let (tracks, tracks_cons) = HeapRb::<Arc<[f32]>>::new(2).split();
        let (retired_prod, retired) = HeapRb::<Arc<[f32]>>::new(4).split();

        let transport = Arc::new(Transport {
            playing: AtomicBool::new(false),
            position: AtomicU64::new(0),
            seek_to: AtomicU64::new(NO_SEEK),
            length: AtomicU64::new(0),
        });
        let gain = Arc::new(GainControl::new(volume));

        let mut voice = Voice {
            track: Arc::from(Vec::new()),
            pos: 0,
            gain: gain.current(),
            channels,
            sample_rate: sample_rate_hz as f32,
            transport: Arc::clone(&transport),
            gain_ctl: Arc::clone(&gain),
            tracks: tracks_cons,
            retired: retired_prod,
            tap: tap_prod,
        };

        let err_fn = |err| log::warn!("audio stream error: {err}");

        let stream = match supported.sample_format() {
            SampleFormat::F32 => device.build_output_stream(
                &config,
                move |data: &mut [f32], _| voice.fill(data),
                err_fn,
                None,
            )?,
            SampleFormat::I16 => device.build_output_stream(
                &config,
                move |data: &mut [i16], _| voice.fill(data),
                err_fn,
                None,
            )?,
            SampleFormat::U16 => device.build_output_stream(
                &config,
                move |data: &mut [u16], _| voice.fill(data),
                err_fn,
                None,
            )?,
            fmt => return Err(anyhow!("unsupported sample format: {fmt:?}")),
        };
        stream.play().context("start output stream")?;

        Ok(Self {
            stream,
            transport,
            gain,
            tracks,
            retired,
            tap,
            analyser: AnalyserNode::new(sample_rate_hz),
            sample_rate_hz,
            device_name,
        })
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn gain(&self) -> Arc<GainControl> {
        Arc::clone(&self.gain)
    }

    pub fn volume(&self) -> f32 {
        self.gain.volume()
    }

    pub fn set_volume(&self, v: f32) {
        self.gain.set_volume(v);
    }

    pub fn effective_volume(&self) -> f32 {
        self.gain.current()
    }

    /// Replace the current track and rewind. Playback state is kept.
    pub fn load(&mut self, track: &DemoTrack) -> anyhow::Result<()> {
        self.free_retired();
        let samples: Arc<[f32]> = track.render().into();
        let len = samples.len() as u64;
        self.tracks
            .try_push(samples)
            .map_err(|_| anyhow!("track queue full"))?;
        self.transport.length.store(len, Ordering::Relaxed);
        self.transport.position.store(0, Ordering::Relaxed);
        self.transport.seek_to.store(NO_SEEK, Ordering::Relaxed);
        log::debug!("loaded {:.1}s demo track at {} bpm", track.seconds, track.bpm);
        Ok(())
    }

    /// Drain the output tap and return this frame's analyser view.
    pub fn analyse(&mut self) -> AnalyserSnapshot<'_> {
        self.free_retired();
        self.analyser
            .push_samples(std::iter::from_fn(|| self.tap.try_pop()));
        self.analyser.update();
        self.analyser.snapshot()
    }

    fn free_retired(&mut self) {
        while self.retired.try_pop().is_some() {}
    }

    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }
}

impl MediaTransport for Player {
    fn duration(&self) -> f64 {
        self.transport.length.load(Ordering::Relaxed) as f64 / self.sample_rate_hz.max(1) as f64
    }

    fn position(&self) -> f64 {
        let pending = self.transport.seek_to.load(Ordering::Relaxed);
        let frames = if pending != NO_SEEK {
            pending
        } else {
            self.transport.position.load(Ordering::Relaxed)
        };
        frames as f64 / self.sample_rate_hz.max(1) as f64
    }

    fn seek(&mut self, seconds: f64) {
        let len = self.transport.length.load(Ordering::Relaxed);
        let frames = (seconds.max(0.0) * self.sample_rate_hz as f64) as u64;
        self.transport.seek_to.store(frames.min(len), Ordering::Release);
    }

    fn is_playing(&self) -> bool {
        self.transport.playing.load(Ordering::Relaxed)
    }

    fn play(&mut self) {
        let len = self.transport.length.load(Ordering::Relaxed);
        if len > 0 && self.transport.position.load(Ordering::Relaxed) >= len {
            self.transport.seek_to.store(0, Ordering::Release);
        }
        self.transport.playing.store(true, Ordering::Relaxed);
    }

    fn pause(&mut self) {
        self.transport.playing.store(false, Ordering::Relaxed);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.transport.playing.store(false, Ordering::Relaxed);
        let _ = self.stream.pause();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Consumer, Producer, Split};

    fn voice(track: Arc<[f32]>) -> (Voice, ringbuf::HeapProd<Arc<[f32]>>, ringbuf::HeapCons<Arc<[f32]>>) {
        let (tracks, tracks_cons) = HeapRb::<Arc<[f32]>>::new(2).split();
        let (retired_prod, retired) = HeapRb::<Arc<[f32]>>::new(4).split();
        let (tap, _tap_cons) = HeapRb::<f32>::new(64).split();
        let transport = Arc::new(Transport {
            playing: AtomicBool::new(true),
            position: AtomicU64::new(0),
            seek_to: AtomicU64::new(NO_SEEK),
            length: AtomicU64::new(track.len() as u64),
        });
        let v = Voice {
            track,
            pos: 0,
            gain: 1.0,
            channels: 1,
            sample_rate: 48_000.0,
            transport,
            gain_ctl: Arc::new(GainControl::new(1.0)),
            tracks: tracks_cons,
            retired: retired_prod,
            tap,
        };
        (v, tracks, retired)
    }

    #[test]
    fn swapped_out_track_is_handed_back() {
        let first: Arc<[f32]> = vec![0.25; 16].into();
        let (mut v, mut tracks, mut retired) = voice(Arc::clone(&first));
        let mut out = [0.0f32; 4];
        v.fill(&mut out);
        assert!(retired.try_pop().is_none());

        let second: Arc<[f32]> = vec![0.5; 16].into();
        assert!(tracks.try_push(Arc::clone(&second)).is_ok());
        v.fill(&mut out);

        let back = retired.try_pop().expect("old track returned");
        assert!(Arc::ptr_eq(&back, &first));
        assert!(Arc::ptr_eq(&v.track, &second));
        assert_eq!(v.pos, 4);
        assert_eq!(out, [0.5; 4]);
    }
}
