//! # PCM Sample Conversion
//!
//! Moves between raw little-endian bytes and 16-bit signed samples:
//! - **extract**: pull the payload that follows a WAV header into samples
//! - **encode**: write samples back out as a headerless byte stream

use crate::audio::header::{WavHeader, HEADER_SIZE};
use crate::error::PipelineError;
use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use std::io::Cursor;

/// Extract the PCM payload described by `header` from the uploaded bytes.
///
/// ## Behavior:
/// - The payload starts right after the 44-byte header; extension chunks between
///   `fmt ` and `data` are not supported
/// - `data_size / 2` samples are read; an odd trailing byte is dropped
/// - Bytes beyond `data_size` are ignored
///
/// ## Errors:
/// - **TruncatedPayload**: fewer than `data_size` bytes follow the header
pub fn extract(raw: &[u8], header: &WavHeader) -> Result<Vec<i16>, PipelineError> {
    let declared = header.data_size as usize;
    let available = raw.len().saturating_sub(HEADER_SIZE);
    if available < declared {
        return Err(PipelineError::TruncatedPayload { declared, available });
    }

    let payload = &raw[HEADER_SIZE..HEADER_SIZE + declared];
    let sample_count = declared / 2;
    let mut cursor = Cursor::new(payload);
    let mut samples = Vec::with_capacity(sample_count);

    for _ in 0..sample_count {
        let sample = cursor
            .read_i16::<LittleEndian>()
            .map_err(|_| PipelineError::TruncatedPayload { declared, available })?;
        samples.push(sample);
    }

    Ok(samples)
}

/// Serialize samples as consecutive little-endian 16-bit values.
///
/// The output is always exactly `2 * samples.len()` bytes.
pub fn encode(samples: &[i16]) -> Vec<u8> {
    let mut bytes = vec![0u8; samples.len() * 2];
    LittleEndian::write_i16_into(samples, &mut bytes);
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_with_payload(data_size: u32, payload: &[u8]) -> Vec<u8> {
        let mut raw = WavHeader::pcm_mono_16(16000, data_size).encode().to_vec();
        raw.extend_from_slice(payload);
        raw
    }

    #[test]
    fn test_extract_little_endian_samples() {
        let raw = wav_with_payload(6, &[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80]);
        let header = crate::audio::header::decode(&raw).unwrap();
        assert_eq!(extract(&raw, &header).unwrap(), vec![1, -1, i16::MIN]);
    }

    #[test]
    fn test_odd_data_size_drops_last_byte() {
        let raw = wav_with_payload(5, &[0x10, 0x00, 0x20, 0x00, 0x7F]);
        let header = crate::audio::header::decode(&raw).unwrap();
        assert_eq!(extract(&raw, &header).unwrap(), vec![16, 32]);
    }

    #[test]
    fn test_trailing_bytes_beyond_data_size_are_ignored() {
        let raw = wav_with_payload(2, &[0x05, 0x00, 0xAA, 0xBB]);
        let header = crate::audio::header::decode(&raw).unwrap();
        assert_eq!(extract(&raw, &header).unwrap(), vec![5]);
    }

    #[test]
    fn test_short_payload_is_rejected() {
        let raw = wav_with_payload(8, &[0x01, 0x00, 0x02]);
        let header = crate::audio::header::decode(&raw).unwrap();
        match extract(&raw, &header) {
            Err(PipelineError::TruncatedPayload { declared, available }) => {
                assert_eq!(declared, 8);
                assert_eq!(available, 3);
            }
            other => panic!("expected TruncatedPayload, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_layout() {
        assert_eq!(encode(&[1, -2, 256]), vec![0x01, 0x00, 0xFE, 0xFF, 0x00, 0x01]);
        assert!(encode(&[]).is_empty());
        assert_eq!(encode(&[i16::MIN, i16::MAX]), vec![0x00, 0x80, 0xFF, 0x7F]);
    }

    #[test]
    fn test_encode_then_read_back_is_lossless() {
        let samples = vec![0, 1, -1, 12345, -12345, i16::MAX, i16::MIN];
        let bytes = encode(&samples);
        assert_eq!(bytes.len(), samples.len() * 2);

        let mut cursor = Cursor::new(bytes.as_slice());
        let decoded: Vec<i16> = (0..samples.len())
            .map(|_| cursor.read_i16::<LittleEndian>().unwrap())
            .collect();
        assert_eq!(decoded, samples);
    }
}
