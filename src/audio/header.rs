//! # WAV Container Header
//!
//! Decodes (and re-encodes) the fixed 44-byte RIFF/WAVE header that precedes the
//! PCM payload of an uploaded recording.
//!
//! ## Layout (all integers little-endian):
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | "RIFF" |
//! | 4 | 4 | overall size |
//! | 8 | 4 | "WAVE" |
//! | 12 | 4 | fmt chunk tag |
//! | 16 | 4 | fmt chunk size |
//! | 20 | 2 | encoding code |
//! | 22 | 2 | channels |
//! | 24 | 4 | sample rate |
//! | 28 | 4 | byte rate |
//! | 32 | 2 | block align |
//! | 34 | 2 | bits per sample |
//! | 36 | 4 | "data" |
//! | 40 | 4 | data size |
//!
//! Only the three tags are validated. The format fields are trusted as-is unless
//! the caller asks for `check_pcm_format`.

use crate::error::PipelineError;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

/// Size of the fixed header; the PCM payload starts right after it.
pub const HEADER_SIZE: usize = 44;

pub const RIFF_TAG: [u8; 4] = *b"RIFF";
pub const WAVE_TAG: [u8; 4] = *b"WAVE";
pub const DATA_TAG: [u8; 4] = *b"data";

/// Encoding code for uncompressed integer PCM.
pub const PCM_FORMAT: u16 = 1;

/// The decoded 44-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_tag: [u8; 4],
    pub riff_size: u32,
    pub wave_tag: [u8; 4],
    pub fmt_tag: [u8; 4],
    pub fmt_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_tag: [u8; 4],
    pub data_size: u32,
}

impl WavHeader {
    /// Header for a canonical mono 16-bit PCM file carrying `data_size` payload bytes.
    pub fn pcm_mono_16(sample_rate: u32, data_size: u32) -> Self {
        Self {
            riff_tag: RIFF_TAG,
            riff_size: data_size.saturating_add(36),
            wave_tag: WAVE_TAG,
            fmt_tag: *b"fmt ",
            fmt_size: 16,
            audio_format: PCM_FORMAT,
            channels: 1,
            sample_rate,
            byte_rate: sample_rate.saturating_mul(2),
            block_align: 2,
            bits_per_sample: 16,
            data_tag: DATA_TAG,
            data_size,
        }
    }

    /// Serialize every field back into its 44-byte wire form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];

        out[0..4].copy_from_slice(&self.riff_tag);
        LittleEndian::write_u32(&mut out[4..8], self.riff_size);
        out[8..12].copy_from_slice(&self.wave_tag);
        out[12..16].copy_from_slice(&self.fmt_tag);
        LittleEndian::write_u32(&mut out[16..20], self.fmt_size);
        LittleEndian::write_u16(&mut out[20..22], self.audio_format);
        LittleEndian::write_u16(&mut out[22..24], self.channels);
        LittleEndian::write_u32(&mut out[24..28], self.sample_rate);
        LittleEndian::write_u32(&mut out[28..32], self.byte_rate);
        LittleEndian::write_u16(&mut out[32..34], self.block_align);
        LittleEndian::write_u16(&mut out[34..36], self.bits_per_sample);
        out[36..40].copy_from_slice(&self.data_tag);
        LittleEndian::write_u32(&mut out[40..44], self.data_size);

        out
    }

    /// Reject anything that is not mono, 16-bit, integer PCM.
    ///
    /// Not part of `decode`: by default the service trusts these fields the same
    /// way browser recorders trust them.
    pub fn check_pcm_format(&self) -> Result<(), PipelineError> {
        if self.audio_format != PCM_FORMAT {
            return Err(PipelineError::UnsupportedFormat(format!(
                "encoding code {} (expected {})",
                self.audio_format, PCM_FORMAT
            )));
        }
        if self.channels != 1 {
            return Err(PipelineError::UnsupportedFormat(format!(
                "{} channels (expected mono)",
                self.channels
            )));
        }
        if self.bits_per_sample != 16 {
            return Err(PipelineError::UnsupportedFormat(format!(
                "{} bits per sample (expected 16)",
                self.bits_per_sample
            )));
        }
        Ok(())
    }
}

/// Decode and validate the header at the start of `raw`.
///
/// ## Errors:
/// - **TruncatedInput**: fewer than 44 bytes
/// - **InvalidContainer**: the RIFF, WAVE or data tag does not match exactly
pub fn decode(raw: &[u8]) -> Result<WavHeader, PipelineError> {
    if raw.len() < HEADER_SIZE {
        return Err(PipelineError::TruncatedInput {
            actual: raw.len(),
            required: HEADER_SIZE,
        });
    }

    let header = read_fields(&mut Cursor::new(&raw[..HEADER_SIZE])).map_err(|_| {
        PipelineError::TruncatedInput {
            actual: raw.len(),
            required: HEADER_SIZE,
        }
    })?;

    expect_tag("RIFF", header.riff_tag, RIFF_TAG)?;
    expect_tag("WAVE", header.wave_tag, WAVE_TAG)?;
    expect_tag("data", header.data_tag, DATA_TAG)?;

    Ok(header)
}

fn read_fields(r: &mut Cursor<&[u8]>) -> std::io::Result<WavHeader> {
    Ok(WavHeader {
        riff_tag: read_tag(r)?,
        riff_size: r.read_u32::<LittleEndian>()?,
        wave_tag: read_tag(r)?,
        fmt_tag: read_tag(r)?,
        fmt_size: r.read_u32::<LittleEndian>()?,
        audio_format: r.read_u16::<LittleEndian>()?,
        channels: r.read_u16::<LittleEndian>()?,
        sample_rate: r.read_u32::<LittleEndian>()?,
        byte_rate: r.read_u32::<LittleEndian>()?,
        block_align: r.read_u16::<LittleEndian>()?,
        bits_per_sample: r.read_u16::<LittleEndian>()?,
        data_tag: read_tag(r)?,
        data_size: r.read_u32::<LittleEndian>()?,
    })
}

fn read_tag(r: &mut Cursor<&[u8]>) -> std::io::Result<[u8; 4]> {
    let mut tag = [0u8; 4];
    r.read_exact(&mut tag)?;
    Ok(tag)
}

fn expect_tag(field: &'static str, found: [u8; 4], expected: [u8; 4]) -> Result<(), PipelineError> {
    if found == expected {
        return Ok(());
    }
    Err(PipelineError::InvalidContainer {
        field,
        expected: String::from_utf8_lossy(&expected).into_owned(),
        found: String::from_utf8_lossy(&found).into_owned(),
    })
}
