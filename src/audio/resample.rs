//! # Sample Rate Conversion
//!
//! Linear-interpolation resampler. Built for downsampling browser recordings
//! (44.1/48 kHz) to the 16 kHz the playback side expects, but the same formula
//! also upsamples.
//!
//! ## Algorithm:
//! ```text
//! ratio  = source_rate / target_rate
//! len'   = floor(len / ratio)
//! pos    = i * ratio
//! left   = floor(pos), right = min(left + 1, len - 1)
//! alpha  = pos - left
//! out[i] = round((1 - alpha) * in[left] + alpha * in[right])
//! ```
//!
//! Rounding is half away from zero (`f64::round`), and the float-to-int
//! conversion saturates at the `i16` bounds.
//!
//! The source rate comes straight from the uploaded header, so `len'` is checked
//! against a caller-supplied cap before the output buffer is allocated.

use crate::audio::padding::MAX_SAMPLES;
use crate::error::PipelineError;

/// Resample `samples` from `source_rate` to `target_rate` Hz, producing at most
/// `max_output_samples` samples.
///
/// ## Errors:
/// - **InvalidRate**: either rate is 0
/// - **OutputTooLarge**: the output would be longer than `max_output_samples`
///   (or than any addressable buffer)
pub fn resample(
    samples: &[i16],
    source_rate: u32,
    target_rate: u32,
    max_output_samples: usize,
) -> Result<Vec<i16>, PipelineError> {
    if source_rate == 0 || target_rate == 0 {
        return Err(PipelineError::InvalidRate { source_rate, target_rate });
    }
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let output_len = bounded_output_len(samples.len(), ratio, max_output_samples)?;
    let last = samples.len() - 1;

    let output = (0..output_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let left = (pos.floor() as usize).min(last);
            let right = (left + 1).min(last);
            let alpha = pos - left as f64;

            let value = (1.0 - alpha) * samples[left] as f64 + alpha * samples[right] as f64;
            value.round() as i16
        })
        .collect();

    Ok(output)
}

fn bounded_output_len(input_len: usize, ratio: f64, max_output_samples: usize) -> Result<usize, PipelineError> {
    let limit = max_output_samples.min(MAX_SAMPLES);
    let exact = (input_len as f64 / ratio).floor();

    if exact > limit as f64 {
        return Err(PipelineError::OutputTooLarge {
            samples: exact as u64,
            limit,
        });
    }
    Ok(exact as usize)
}
