//! The sound bank: one quantised clip per [`SoundId`], built once at startup
//! and shared read-only afterwards.
//!
//! A `SoundBank` can only be constructed complete: every constructor either
//! produces all five clips or fails, so [`SoundBank::get`] is total.

use std::path::{Path, PathBuf};

use rand::Rng;

use crate::wav::{self, WavError};
use crate::{synthesize_with_rng, Pcm, SoundId, SynthError};

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("synthesis failed: {0}")]
    Synth(#[from] SynthError),
    #[error("{}: {source}", .path.display())]
    File { path: PathBuf, source: WavError },
    #[error("{sound} is {found} Hz but the bank is {expected} Hz")]
    SampleRateMismatch { sound: SoundId, expected: u32, found: u32 },
    #[error("{0} has no samples")]
    Empty(SoundId),
    #[error("bank sample rate is 0 Hz")]
    ZeroSampleRate,
    #[error("expected {expected} clips, got {found}")]
    ClipCount { expected: usize, found: usize },
    #[error("cannot create {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: std::io::Error },
}

/// Immutable map from [`SoundId`] to its PCM clip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SoundBank {
    sample_rate: u32,
    clips:       [Pcm; SoundId::COUNT],
}

impl SoundBank {
    /// Synthesize every sound at `sample_rate` using the thread RNG.
    pub fn synthesize(sample_rate: u32) -> Result<Self, BankError> {
        Self::synthesize_with_rng(sample_rate, &mut rand::thread_rng())
    }

    /// Synthesize every sound, drawing noise from `rng`.
    pub fn synthesize_with_rng<R: Rng>(sample_rate: u32, rng: &mut R) -> Result<Self, BankError> {
        let mut clips = Vec::with_capacity(SoundId::COUNT);
        for sound in SoundId::ALL {
            let pcm = synthesize_with_rng(sound, sample_rate, rng)?;
            log::debug!("synthesized {} ({} samples, peak {})", sound, pcm.len(), pcm.peak());
            clips.push(pcm);
        }
        Self::from_clips(sample_rate, clips)
    }

    /// Load `<name>.wav` for every sound from `dir`.
    ///
    /// Any missing or malformed file is an error: a partial bank is never
    /// returned.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self, BankError> {
        let dir = dir.as_ref();
        let mut clips = Vec::with_capacity(SoundId::COUNT);
        for sound in SoundId::ALL {
            let path = dir.join(sound.file_name());
            let pcm = wav::read_file(&path)
                .map_err(|source| BankError::File { path: path.clone(), source })?;
            log::debug!("loaded {} from {}", sound, path.display());
            clips.push(pcm);
        }
        let sample_rate = clips[0].sample_rate;
        Self::from_clips(sample_rate, clips)
    }

    /// Write every clip as `<name>.wav` into `dir`, creating it if needed.
    pub fn write_dir<P: AsRef<Path>>(&self, dir: P) -> Result<(), BankError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)
            .map_err(|source| BankError::CreateDir { path: dir.to_path_buf(), source })?;
        for sound in SoundId::ALL {
            let path = dir.join(sound.file_name());
            wav::write_file(&path, self.get(sound))
                .map_err(|source| BankError::File { path: path.clone(), source })?;
            log::info!("wrote {}", path.display());
        }
        Ok(())
    }

    /// Load the bank from `dir` when every file is present; otherwise
    /// synthesize it at `sample_rate` and persist it there.
    pub fn load_or_synthesize<P: AsRef<Path>>(dir: P, sample_rate: u32) -> Result<Self, BankError> {
        let dir = dir.as_ref();
        if Self::is_complete_dir(dir) {
            log::info!("loading sound bank from {}", dir.display());
            let bank = Self::load_dir(dir)?;
            if bank.sample_rate != sample_rate {
                log::warn!(
                    "{} holds a {} Hz bank; requested {} Hz ignored (delete the files to regenerate)",
                    dir.display(), bank.sample_rate, sample_rate,
                );
            }
            return Ok(bank);
        }
        log::info!("sound bank incomplete in {}, synthesizing at {} Hz", dir.display(), sample_rate);
        let bank = Self::synthesize(sample_rate)?;
        bank.write_dir(dir)?;
        Ok(bank)
    }

    /// True when `dir` holds a file for every sound.
    pub fn is_complete_dir(dir: &Path) -> bool {
        SoundId::ALL.iter().all(|s| dir.join(s.file_name()).is_file())
    }

    pub fn get(&self, sound: SoundId) -> &Pcm { &self.clips[sound.index()] }

    pub fn sample_rate(&self) -> u32 { self.sample_rate }

    /// Assemble a bank from clips given in [`SoundId::ALL`] order.  Every
    /// clip must be non-empty and at `sample_rate`, which must be positive.
    pub fn from_clips(sample_rate: u32, clips: Vec<Pcm>) -> Result<Self, BankError> {
        if sample_rate == 0 {
            return Err(BankError::ZeroSampleRate);
        }
        let found = clips.len();
        let clips: [Pcm; SoundId::COUNT] = clips.try_into()
            .map_err(|_| BankError::ClipCount { expected: SoundId::COUNT, found })?;
        for (sound, pcm) in SoundId::ALL.iter().zip(&clips) {
            if pcm.sample_rate != sample_rate {
                return Err(BankError::SampleRateMismatch {
                    sound: *sound, expected: sample_rate, found: pcm.sample_rate,
                });
            }
            if pcm.is_empty() {
                return Err(BankError::Empty(*sound));
            }
        }
        Ok(SoundBank { sample_rate, clips })
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
