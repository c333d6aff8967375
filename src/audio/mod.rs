//! # Audio Processing Module
//!
//! Everything between "bytes of an uploaded WAV file" and "bytes sent to the player".
//!
//! ## Key Components:
//! - **header**: RIFF/WAVE header decoding and validation
//! - **samples**: PCM payload extraction and little-endian re-encoding
//! - **resample**: Linear-interpolation sample rate conversion
//! - **padding**: Leading/trailing silence
//! - **pipeline**: Runs the stages in order, persists and forwards the result
//!
//! ## Output Format:
//! - **Sample Rate**: 16kHz by default (`pipeline.target_sample_rate`)
//! - **Bit Depth**: 16-bit PCM
//! - **Channels**: Mono
//! - **Encoding**: Little-endian signed integers, no header

pub mod header;
pub mod padding;
pub mod pipeline;
pub mod resample;
pub mod samples;

pub use pipeline::IngestPipeline;
