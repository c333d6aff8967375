//! Silence padding around a sample sequence.

use crate::error::PipelineError;

/// Largest number of `i16` samples a single allocation can address.
pub(crate) const MAX_SAMPLES: usize = isize::MAX as usize / std::mem::size_of::<i16>();

/// Surround `samples` with `lead` zero samples before and `trail` after.
///
/// ## Errors:
/// - **SizeOverflow**: the padded length does not fit an addressable buffer
pub fn pad(samples: &[i16], lead: usize, trail: usize) -> Result<Vec<i16>, PipelineError> {
    let overflow = || PipelineError::SizeOverflow {
        lead,
        len: samples.len(),
        trail,
    };

    let total = lead
        .checked_add(samples.len())
        .and_then(|n| n.checked_add(trail))
        .filter(|&n| n <= MAX_SAMPLES)
        .ok_or_else(overflow)?;

    let mut padded = vec![0i16; total];
    padded[lead..lead + samples.len()].copy_from_slice(samples);
    Ok(padded)
}
