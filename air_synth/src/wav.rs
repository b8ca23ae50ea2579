//! 16-bit mono PCM WAV codec for the persisted sound bank.
//!
//! The writer emits the canonical 44-byte header (`RIFF`, `fmt `, `data`).
//! The reader walks RIFF chunks, skipping anything it does not need, and
//! accepts only the format the writer produces.

use std::io::Write;
use std::path::Path;

use crate::Pcm;

const PCM_FORMAT:      u16 = 1;
const CHANNELS:        u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN:     u16 = CHANNELS * BITS_PER_SAMPLE / 8;

/// Size of the header written by [`encode`].
pub const HEADER_LEN: usize = 44;

#[derive(Debug, thiserror::Error)]
pub enum WavError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a RIFF/WAVE file")]
    NotWave,
    #[error("missing `{0}` chunk")]
    MissingChunk(&'static str),
    #[error("truncated `{0}` chunk")]
    Truncated(&'static str),
    #[error("unsupported format: audio format {format}, {channels} channel(s), {bits} bits")]
    Unsupported { format: u16, channels: u16, bits: u16 },
    #[error("sample rate is 0 Hz")]
    ZeroSampleRate,
}

// ════════════════════════════════════════════════════════════════════════════
// Encoding
// ════════════════════════════════════════════════════════════════════════════

/// Serialise `pcm` to a `Vec<u8>` containing a complete WAV file.
pub fn encode(pcm: &Pcm) -> Vec<u8> {
    let data_len  = (pcm.samples.len() * BLOCK_ALIGN as usize) as u32;
    let byte_rate = pcm.sample_rate * BLOCK_ALIGN as u32;

    let mut out = Vec::with_capacity(HEADER_LEN + data_len as usize);

    // RIFF header: size excludes the 8-byte chunk preamble
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    // fmt
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&PCM_FORMAT.to_le_bytes());
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&pcm.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&BLOCK_ALIGN.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for s in &pcm.samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Encode `pcm` and write it to `path`.
pub fn write_file<P: AsRef<Path>>(path: P, pcm: &Pcm) -> Result<(), WavError> {
    let bytes = encode(pcm);
    let mut f = std::fs::File::create(path)?;
    f.write_all(&bytes)?;
    Ok(())
}

// ════════════════════════════════════════════════════════════════════════════
// Decoding
// ════════════════════════════════════════════════════════════════════════════

/// Parse a mono 16-bit PCM WAV file.
pub fn decode(bytes: &[u8]) -> Result<Pcm, WavError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WavError::NotWave);
    }

    let mut sample_rate = None;
    let mut samples     = None;
    let mut pos = 12;

    while pos + 8 <= bytes.len() {
        let id  = &bytes[pos..pos + 4];
        let len = read_u32(bytes, pos + 4) as usize;
        let body_start = pos + 8;
        let body_end   = body_start.checked_add(len).unwrap_or(usize::MAX);

        match id {
            b"fmt " => {
                if len < 16 || body_end > bytes.len() {
                    return Err(WavError::Truncated("fmt "));
                }
                let format   = read_u16(bytes, body_start);
                let channels = read_u16(bytes, body_start + 2);
                let rate     = read_u32(bytes, body_start + 4);
                let bits     = read_u16(bytes, body_start + 14);
                if format != PCM_FORMAT || channels != CHANNELS || bits != BITS_PER_SAMPLE {
                    return Err(WavError::Unsupported { format, channels, bits });
                }
                if rate == 0 {
                    return Err(WavError::ZeroSampleRate);
                }
                sample_rate = Some(rate);
            }
            b"data" => {
                if body_end > bytes.len() || len % 2 != 0 {
                    return Err(WavError::Truncated("data"));
                }
                samples = Some(
                    bytes[body_start..body_end]
                        .chunks_exact(2)
                        .map(|b| i16::from_le_bytes([b[0], b[1]]))
                        .collect::<Vec<_>>(),
                );
            }
            _ => {}
        }

        // Chunks are padded to an even length.
        pos = body_end.saturating_add(len & 1);
    }

    let sample_rate = sample_rate.ok_or(WavError::MissingChunk("fmt "))?;
    let samples     = samples.ok_or(WavError::MissingChunk("data"))?;
    Ok(Pcm::new(sample_rate, samples))
}

/// Read and decode the WAV file at `path`.
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<Pcm, WavError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

fn read_u16(b: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([b[at], b[at + 1]])
}

fn read_u32(b: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([b[at], b[at + 1], b[at + 2], b[at + 3]])
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
