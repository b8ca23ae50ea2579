//! Real-time PCM playback thread.
//!
//! Triggers are fire-and-forget: [`AudioSink::play`] posts a command and
//! returns.  The playback thread owns the output stream and a [`Mixer`] that
//! sums every voice still sounding, so a new trigger overlaps whatever is
//! already playing.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use air_synth::{Pcm, SoundBank, SoundId};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;

// ════════════════════════════════════════════════════════════════════════════
// AudioSink: what the frame loop talks to
// ════════════════════════════════════════════════════════════════════════════

/// Fire-and-forget playback capability.
pub trait AudioSink {
    /// Start playing `sound`.  Must not block.
    fn play(&self, sound: SoundId);
}

// ════════════════════════════════════════════════════════════════════════════
// PlayerCommand: sent to the playback thread
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerCommand {
    /// Start a new voice for this sound.
    Play(SoundId),
    /// Terminate the thread.
    Quit,
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("no default audio output device")]
    NoDevice,

    #[error("querying output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("building output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),

    #[error("starting output stream: {0}")]
    Start(#[from] cpal::PlayStreamError),
}

// ════════════════════════════════════════════════════════════════════════════
// Mixer
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug)]
struct Voice {
    sound: SoundId,
    /// Read position in bank samples (fractional when resampling).
    pos:   f64,
}

/// Sums overlapping voices into interleaved output frames.
///
/// Clips are resampled from the bank rate to the device rate by linear
/// interpolation.  Each output frame carries the same mono mix on every
/// channel.
pub struct Mixer {
    bank:   Arc<SoundBank>,
    step:   f64,
    voices: Vec<Voice>,
}

impl Mixer {
    pub fn new(bank: Arc<SoundBank>, device_rate: u32) -> Self {
        let step = bank.sample_rate() as f64 / device_rate.max(1) as f64;
        Mixer { bank, step, voices: Vec::new() }
    }

    pub fn trigger(&mut self, sound: SoundId) {
        self.voices.push(Voice { sound, pos: 0.0 });
    }

    pub fn active_voices(&self) -> usize { self.voices.len() }

    /// Fill `out` (interleaved, `channels` per frame) with the next block.
    /// Voices that run out are dropped.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        out.fill(0.0);

        for voice in &mut self.voices {
            let pcm = self.bank.get(voice.sound);
            let end = pcm.len() as f64;
            for frame in out.chunks_mut(channels) {
                if voice.pos >= end { break; }
                let s = interpolate(pcm, voice.pos);
                for o in frame.iter_mut() { *o += s; }
                voice.pos += self.step;
            }
        }

        for o in out.iter_mut() {
            *o = o.clamp(-1.0, 1.0);
        }

        let bank = &self.bank;
        self.voices.retain(|v| v.pos < bank.get(v.sound).len() as f64);
    }
}

fn interpolate(pcm: &Pcm, pos: f64) -> f32 {
    let i    = pos as usize;
    let frac = (pos - i as f64) as f32;
    let a    = pcm.sample_f32(i);
    let b    = if i + 1 < pcm.len() { pcm.sample_f32(i + 1) } else { 0.0 };
    a + (b - a) * frac
}

// ════════════════════════════════════════════════════════════════════════════
// AudioOut: abstraction over cpal / null
// ════════════════════════════════════════════════════════════════════════════

trait AudioOut {
    fn start(&mut self, sound: SoundId);
}

// ── cpal backend ──────────────────────────────────────────────────────────

struct CpalOut {
    mixer:   Arc<Mutex<Mixer>>,
    _stream: cpal::Stream,
}

impl AudioOut for CpalOut {
    fn start(&mut self, sound: SoundId) {
        self.mixer.lock().trigger(sound);
    }
}

// ── null backend (used when no output device is available) ────────────────

struct NullOut;

impl AudioOut for NullOut {
    fn start(&mut self, sound: SoundId) {
        log::debug!("[player] (null output) {}", sound);
    }
}

// ════════════════════════════════════════════════════════════════════════════
// open_audio_output: default device, or null with a warning
// ════════════════════════════════════════════════════════════════════════════

fn open_audio_output(bank: &Arc<SoundBank>) -> Box<dyn AudioOut> {
    match open_cpal(bank) {
        Ok(out) => Box::new(out),
        Err(e)  => {
            log::warn!("[player] {}; using null output", e);
            Box::new(NullOut)
        }
    }
}

fn open_cpal(bank: &Arc<SoundBank>) -> Result<CpalOut, PlayerError> {
    let host   = cpal::default_host();
    let device = host.default_output_device().ok_or(PlayerError::NoDevice)?;
    let supported = device.default_output_config()?;
    let format    = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let channels  = config.channels as usize;

    log::info!(
        "[player] output: {} ({} Hz, {} ch, {:?})",
        device.name().unwrap_or_else(|_| "unknown device".to_string()),
        config.sample_rate.0, channels, format,
    );

    let mixer = Arc::new(Mutex::new(Mixer::new(Arc::clone(bank), config.sample_rate.0)));
    let err_fn = |e: cpal::StreamError| log::error!("[player] stream error: {}", e);

    let stream = match format {
        cpal::SampleFormat::F32 => {
            let mixer = Arc::clone(&mixer);
            device.build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.lock().render(data, channels);
                },
                err_fn,
                None,
            )?
        }
        cpal::SampleFormat::I16 => {
            let mixer = Arc::clone(&mixer);
            let mut scratch: Vec<f32> = Vec::new();
            device.build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    mixer.lock().render(&mut scratch, channels);
                    for (d, s) in data.iter_mut().zip(&scratch) {
                        *d = (s * i16::MAX as f32) as i16;
                    }
                },
                err_fn,
                None,
            )?
        }
        other => return Err(PlayerError::UnsupportedFormat(other)),
    };
    stream.play()?;

    Ok(CpalOut { mixer, _stream: stream })
}

// ════════════════════════════════════════════════════════════════════════════
// Player: the playback thread
// ════════════════════════════════════════════════════════════════════════════

/// Handle to the playback thread.
pub struct Player {
    pub cmd_tx: Sender<PlayerCommand>,
}

impl Player {
    /// Spawn the playback thread.  The output device is opened on that
    /// thread; if it can't be, triggers are accepted and discarded.
    pub fn spawn(bank: Arc<SoundBank>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<PlayerCommand>();
        thread::spawn(move || player_thread(bank, cmd_rx));
        Player { cmd_tx }
    }

    pub fn quit(&self) { let _ = self.cmd_tx.send(PlayerCommand::Quit); }
}

impl AudioSink for Player {
    fn play(&self, sound: SoundId) {
        if self.cmd_tx.send(PlayerCommand::Play(sound)).is_err() {
            log::warn!("[player] playback thread gone; dropped {}", sound);
        }
    }
}

fn player_thread(bank: Arc<SoundBank>, cmd_rx: Receiver<PlayerCommand>) {
    let mut out = open_audio_output(&bank);
    for cmd in cmd_rx {
        match cmd {
            PlayerCommand::Play(sound) => out.start(sound),
            PlayerCommand::Quit        => return,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    /// Every clip is `len` samples of the constant `value`, at 100 Hz.
    fn flat_bank(value: i16, len: usize) -> Arc<SoundBank> {
        let clips = SoundId::ALL.iter().map(|_| Pcm::new(100, vec![value; len])).collect();
        Arc::new(SoundBank::from_clips(100, clips).unwrap())
    }

    fn ramp_bank() -> Arc<SoundBank> {
        let ramp: Vec<i16> = (0..4).map(|i| i * 8192).collect();
        let clips = SoundId::ALL.iter().map(|_| Pcm::new(100, ramp.clone())).collect();
        Arc::new(SoundBank::from_clips(100, clips).unwrap())
    }

    #[test]
    fn idle_mixer_renders_silence() {
        let mut m = Mixer::new(flat_bank(1000, 10), 100);
        let mut out = [0.5f32; 8];
        m.render(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn voice_plays_on_every_channel_then_ends() {
        let mut m = Mixer::new(flat_bank(i16::MAX, 3), 100);
        m.trigger(SoundId::Drum);
        let mut out = [0.0f32; 10]; // 5 stereo frames
        m.render(&mut out, 2);
        assert_eq!(&out[..6], &[1.0f32; 6]);
        assert_eq!(&out[6..], &[0.0f32; 4]);
        assert_eq!(m.active_voices(), 0);
    }

    #[test]
    fn voice_spans_several_blocks() {
        let mut m = Mixer::new(flat_bank(i16::MAX, 5), 100);
        m.trigger(SoundId::Bass);
        let mut out = [0.0f32; 3];
        m.render(&mut out, 1);
        assert_eq!(m.active_voices(), 1);
        m.render(&mut out, 1);
        assert_eq!(out, [1.0f32, 1.0, 0.0]);
        assert_eq!(m.active_voices(), 0);
    }

    #[test]
    fn overlapping_voices_sum_and_clamp() {
        let half = i16::MAX / 2;
        let mut m = Mixer::new(flat_bank(half, 4), 100);
        m.trigger(SoundId::Drum);
        m.trigger(SoundId::Cymbal);
        let mut out = [0.0f32; 2];
        m.render(&mut out, 1);
        assert!((out[0] - 2.0 * half as f32 / i16::MAX as f32).abs() < 1e-4);

        let mut loud = Mixer::new(flat_bank(i16::MAX, 4), 100);
        for _ in 0..3 { loud.trigger(SoundId::Chorus); }
        loud.render(&mut out, 1);
        assert_eq!(out, [1.0f32, 1.0]);
    }

    #[test]
    fn upsampling_interpolates_between_samples() {
        // Bank at 100 Hz, device at 200 Hz: every other output is a midpoint.
        let mut m = Mixer::new(ramp_bank(), 200);
        m.trigger(SoundId::Guitar);
        let mut out = [0.0f32; 4];
        m.render(&mut out, 1);
        let unit = 8192.0 / i16::MAX as f32;
        let expected = [0.0, 0.5 * unit, unit, 1.5 * unit];
        for (o, e) in out.iter().zip(expected) {
            assert!((o - e).abs() < 1e-5, "{} vs {}", o, e);
        }
    }

    #[test]
    fn downsampling_skips_samples() {
        let mut m = Mixer::new(ramp_bank(), 50);
        m.trigger(SoundId::Guitar);
        let mut out = [0.0f32; 3];
        m.render(&mut out, 1);
        let unit = 8192.0 / i16::MAX as f32;
        assert!((out[1] - 2.0 * unit).abs() < 1e-5);
        assert_eq!(out[2], 0.0);
        assert_eq!(m.active_voices(), 0);
    }

    #[test]
    fn null_output_accepts_triggers() {
        let mut out = NullOut;
        out.start(SoundId::Chorus);
    }
}
