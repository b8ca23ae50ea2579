//! # air_synth
//!
//! Procedural generation of the AirBand sound bank.  Every sound is built
//! from closed-form recipes (sine partials, uniform noise, amplitude
//! envelopes), peak-normalised to 90% of full scale and quantised to 16-bit
//! signed mono PCM.
//!
//! | Sound | Recipe | Length |
//! |---|---|---|
//! | Drum   | white noise ±0.5 × e^(-5t)                          | 0.5 s |
//! | Cymbal | 4 partials 3–7.5 kHz @0.1 + noise ±0.3 × e^(-3t)     | 1.0 s |
//! | Guitar | 5 partials 196–440 Hz @0.15 × e^(-2t)                | 1.0 s |
//! | Bass   | 0.7·sin 60 Hz + 0.3·sin 120 Hz × e^(-t)              | 1.0 s |
//! | Chorus | C-major triad, each voice detuned ±2 Hz, 0.5 s fade  | 3.0 s |
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use air_synth::{SoundBank, SoundId, DEFAULT_SAMPLE_RATE};
//!
//! let bank = SoundBank::synthesize(DEFAULT_SAMPLE_RATE).unwrap();
//! assert_eq!(bank.get(SoundId::Chorus).len(), 3 * 44_100);
//! bank.write_dir("sounds").unwrap();
//! ```

use std::f64::consts::TAU;
use std::fmt;

use rand::Rng;

pub mod wav;
pub mod bank;

pub use bank::{BankError, SoundBank};
pub use wav::WavError;

/// Sample rate of the reference sound bank.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Fraction of full scale the loudest sample is normalised to.
pub const HEADROOM: f64 = 0.9;

/// Largest positive 16-bit sample value.
pub const FULL_SCALE: f64 = i16::MAX as f64;

// ════════════════════════════════════════════════════════════════════════════
// SoundId: the closed set of sounds
// ════════════════════════════════════════════════════════════════════════════

/// Identifier of one entry in the sound bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SoundId {
    Drum,
    Bass,
    Guitar,
    Cymbal,
    Chorus,
}

impl SoundId {
    /// Every sound, in bank order.
    pub const ALL: [SoundId; 5] = [
        SoundId::Drum,
        SoundId::Bass,
        SoundId::Guitar,
        SoundId::Cymbal,
        SoundId::Chorus,
    ];

    /// Number of sounds in the bank.
    pub const COUNT: usize = Self::ALL.len();

    /// Dense index into per-sound tables (`0..COUNT`).
    pub fn index(self) -> usize { self as usize }

    /// Lower-case name, also the stem of the persisted file.
    pub fn name(self) -> &'static str {
        match self {
            SoundId::Drum   => "drum",
            SoundId::Bass   => "bass",
            SoundId::Guitar => "guitar",
            SoundId::Cymbal => "cymbal",
            SoundId::Chorus => "chorus",
        }
    }

    /// File name inside a sound directory, e.g. `drum.wav`.
    pub fn file_name(self) -> String { format!("{}.wav", self.name()) }

    /// Length of the generated clip in seconds.
    pub fn duration_secs(self) -> f64 {
        match self {
            SoundId::Drum   => 0.5,
            SoundId::Chorus => 3.0,
            _               => 1.0,
        }
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SoundId::Drum   => "Drum",
            SoundId::Bass   => "Bass",
            SoundId::Guitar => "Guitar",
            SoundId::Cymbal => "Cymbal",
            SoundId::Chorus => "Chorus",
        };
        f.pad(s)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Pcm: a quantised mono clip
// ════════════════════════════════════════════════════════════════════════════

/// Mono 16-bit PCM clip at a fixed sample rate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pcm {
    pub sample_rate: u32,
    pub samples:     Vec<i16>,
}

impl Pcm {
    pub fn new(sample_rate: u32, samples: Vec<i16>) -> Self {
        Pcm { sample_rate, samples }
    }

    pub fn len(&self) -> usize { self.samples.len() }
    pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    /// Largest absolute sample value.
    pub fn peak(&self) -> u16 {
        self.samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 { return 0.0; }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Sample `i` as a float in [-1.0, 1.0].
    pub fn sample_f32(&self, i: usize) -> f32 {
        self.samples[i] as f32 / i16::MAX as f32
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SynthError
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
pub enum SynthError {
    #[error("sample rate must be positive")]
    ZeroSampleRate,
    #[error("{sound}: {duration_secs}s at {sample_rate} Hz yields no samples")]
    EmptyClip { sound: SoundId, duration_secs: f64, sample_rate: u32 },
    #[error("{0}: generated signal is silent and cannot be normalised")]
    Silent(SoundId),
}

// ════════════════════════════════════════════════════════════════════════════
// Synthesis
// ════════════════════════════════════════════════════════════════════════════

/// Synthesize `sound` at `sample_rate`, drawing noise from the thread RNG.
pub fn synthesize(sound: SoundId, sample_rate: u32) -> Result<Pcm, SynthError> {
    synthesize_with_rng(sound, sample_rate, &mut rand::thread_rng())
}

/// Synthesize `sound` with a caller-supplied noise source.
///
/// Only Drum and Cymbal draw from `rng`; the other recipes are fully
/// deterministic.
pub fn synthesize_with_rng<R: Rng>(
    sound:       SoundId,
    sample_rate: u32,
    rng:         &mut R,
) -> Result<Pcm, SynthError> {
    let raw = render(sound, sample_rate, rng)?;
    let samples = quantize(&raw).ok_or(SynthError::Silent(sound))?;
    Ok(Pcm::new(sample_rate, samples))
}

/// Render the un-normalised signal for `sound`.
pub fn render<R: Rng>(
    sound:       SoundId,
    sample_rate: u32,
    rng:         &mut R,
) -> Result<Vec<f64>, SynthError> {
    let n = sample_count(sound, sample_rate)?;
    let sr = sample_rate as f64;
    let t = |i: usize| i as f64 / sr;

    let signal: Vec<f64> = match sound {
        SoundId::Drum => (0..n)
            .map(|i| rng.gen_range(-0.5_f64..0.5) * (-5.0 * t(i)).exp())
            .collect(),

        SoundId::Cymbal => (0..n)
            .map(|i| {
                let ti    = t(i);
                let tone  = partials(&[3000.0, 4500.0, 6000.0, 7500.0], 0.1, ti);
                let noise = rng.gen_range(-0.3_f64..0.3);
                (tone + noise) * (-3.0 * ti).exp()
            })
            .collect(),

        SoundId::Guitar => (0..n)
            .map(|i| {
                let ti = t(i);
                partials(&[196.0, 247.0, 294.0, 370.0, 440.0], 0.15, ti) * (-2.0 * ti).exp()
            })
            .collect(),

        SoundId::Bass => (0..n)
            .map(|i| {
                let ti = t(i);
                let tone = 0.7 * (TAU * 60.0 * ti).sin() + 0.3 * (TAU * 120.0 * ti).sin();
                tone * (-ti).exp()
            })
            .collect(),

        SoundId::Chorus => {
            let mut out: Vec<f64> = (0..n)
                .map(|i| {
                    let ti = t(i);
                    [261.63, 329.63, 392.00].iter()
                        .map(|&f| {
                            0.2 * (TAU * f * ti).sin()
                                + 0.1 * (TAU * (f + 2.0) * ti).sin()
                                + 0.1 * (TAU * (f - 2.0) * ti).sin()
                        })
                        .sum::<f64>()
                })
                .collect();
            fade_out(&mut out, (sr * 0.5) as usize);
            out
        }
    };

    Ok(signal)
}

/// Number of samples for `sound` at `sample_rate`: `floor(rate × duration)`.
pub fn sample_count(sound: SoundId, sample_rate: u32) -> Result<usize, SynthError> {
    if sample_rate == 0 {
        return Err(SynthError::ZeroSampleRate);
    }
    let duration_secs = sound.duration_secs();
    let n = (sample_rate as f64 * duration_secs) as usize;
    if n == 0 {
        return Err(SynthError::EmptyClip { sound, duration_secs, sample_rate });
    }
    Ok(n)
}

/// Equal-amplitude sum of sines at `freqs`, evaluated at time `t`.
fn partials(freqs: &[f64], amplitude: f64, t: f64) -> f64 {
    freqs.iter().map(|&f| amplitude * (TAU * f * t).sin()).sum()
}

/// Linear ramp from 1 to 0 (both inclusive) over the last `len` samples.
fn fade_out(signal: &mut [f64], len: usize) {
    let len   = len.min(signal.len());
    let start = signal.len() - len;
    for (k, s) in signal[start..].iter_mut().enumerate() {
        let gain = if len > 1 { 1.0 - k as f64 / (len - 1) as f64 } else { 0.0 };
        *s *= gain;
    }
}

/// Peak-normalise to [`HEADROOM`] of full scale and truncate to `i16`.
///
/// Returns `None` when the signal has no finite non-zero peak.
pub fn quantize(signal: &[f64]) -> Option<Vec<i16>> {
    let peak = signal.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
    if peak == 0.0 || !peak.is_finite() {
        return None;
    }
    let scale = HEADROOM * FULL_SCALE / peak;
    Some(signal.iter().map(|&s| (s * scale) as i16).collect())
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
