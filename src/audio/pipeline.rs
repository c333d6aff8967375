//! # Ingest Pipeline
//!
//! Turns one uploaded WAV file into a padded 16 kHz PCM stream, stores it, and
//! forwards it to the playback endpoint.
//!
//! ## Stages:
//! ```text
//! Received -> HeaderParsed -> SamplesExtracted -> Resampled -> Padded
//!          -> Encoded -> Persisted -> Forwarded -> Done
//! ```
//! Any failing stage ends the request with a classified `PipelineError`; later
//! stages never run and nothing partial is returned.
//!
//! ## Shared Output File:
//! Every request overwrites the same file. Persist and forward run inside one
//! critical section so the file on disk always holds the bytes that were last
//! forwarded, even when uploads arrive concurrently.

use crate::audio::{header, padding, resample, samples};
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::forward::Forwarder;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Position of a request in the pipeline, reported in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Received,
    HeaderParsed,
    SamplesExtracted,
    Resampled,
    Padded,
    Encoded,
    Persisted,
    Forwarded,
    Done,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Received => "received",
            IngestStage::HeaderParsed => "header_parsed",
            IngestStage::SamplesExtracted => "samples_extracted",
            IngestStage::Resampled => "resampled",
            IngestStage::Padded => "padded",
            IngestStage::Encoded => "encoded",
            IngestStage::Persisted => "persisted",
            IngestStage::Forwarded => "forwarded",
            IngestStage::Done => "done",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing parameters, taken from `AppConfig` once at construction.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub target_sample_rate: u32,
    pub lead_silence_samples: usize,
    pub trail_silence_samples: usize,
    pub strict_format: bool,
    pub max_output_samples: usize,
    pub output_path: PathBuf,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            target_sample_rate: config.pipeline.target_sample_rate,
            lead_silence_samples: config.pipeline.lead_silence_samples,
            trail_silence_samples: config.pipeline.trail_silence_samples,
            strict_format: config.pipeline.strict_format,
            max_output_samples: config.limits.max_output_samples,
            output_path: config.output_path(),
        }
    }
}

/// Summary of a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub bytes_written: usize,
    pub source_sample_rate: u32,
    pub target_sample_rate: u32,
    pub source_samples: usize,
    pub resampled_samples: usize,
    pub padded_samples: usize,
    pub output_path: String,
}

/// Owns the processing settings, the forwarder, and the lock over the output file.
pub struct IngestPipeline {
    settings: PipelineSettings,
    forwarder: Arc<dyn Forwarder>,
    output_lock: Mutex<()>,
}

impl IngestPipeline {
    pub fn new(config: &AppConfig, forwarder: Arc<dyn Forwarder>) -> Self {
        Self::with_settings(PipelineSettings::from_config(config), forwarder)
    }

    pub fn with_settings(settings: PipelineSettings, forwarder: Arc<dyn Forwarder>) -> Self {
        Self {
            settings,
            forwarder,
            output_lock: Mutex::new(()),
        }
    }

    /// Run one upload through every stage.
    ///
    /// ## Returns:
    /// - **Ok(IngestReport)**: the buffer was written to disk and accepted downstream
    /// - **Err(PipelineError)**: the first stage that failed; a file that was already
    ///   persisted stays on disk when forwarding fails afterwards
    pub async fn ingest(&self, raw: &[u8]) -> Result<IngestReport, PipelineError> {
        let mut stage = IngestStage::Received;
        let result = self.run(raw, &mut stage).await;

        match &result {
            Ok(report) => info!(
                bytes_written = report.bytes_written,
                source_rate = report.source_sample_rate,
                padded_samples = report.padded_samples,
                "Ingest completed"
            ),
            Err(err) => warn!(
                failed_after = %stage,
                kind = err.kind(),
                error = %err,
                "Ingest failed"
            ),
        }

        result
    }

    async fn run(&self, raw: &[u8], stage: &mut IngestStage) -> Result<IngestReport, PipelineError> {
        if raw.is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let wav = header::decode(raw)?;
        if self.settings.strict_format {
            wav.check_pcm_format()?;
        }
        advance(stage, IngestStage::HeaderParsed);
        debug!(
            sample_rate = wav.sample_rate,
            channels = wav.channels,
            bits_per_sample = wav.bits_per_sample,
            data_size = wav.data_size,
            "Parsed WAV header"
        );

        let source = samples::extract(raw, &wav)?;
        advance(stage, IngestStage::SamplesExtracted);

        let resampled = resample::resample(
            &source,
            wav.sample_rate,
            self.settings.target_sample_rate,
            self.settings.max_output_samples,
        )?;
        advance(stage, IngestStage::Resampled);

        let padded = padding::pad(
            &resampled,
            self.settings.lead_silence_samples,
            self.settings.trail_silence_samples,
        )?;
        advance(stage, IngestStage::Padded);

        let encoded = samples::encode(&padded);
        advance(stage, IngestStage::Encoded);

        let bytes_written = encoded.len();
        let output_path = self.settings.output_path.display().to_string();

        {
            let _guard = self.output_lock.lock().await;

            tokio::fs::write(&self.settings.output_path, &encoded)
                .await
                .map_err(|source| PipelineError::PersistFailure {
                    path: output_path.clone(),
                    source,
                })?;
            advance(stage, IngestStage::Persisted);
            info!(path = %output_path, bytes = bytes_written, "Padded PCM data written");

            self.forwarder.forward(encoded).await?;
            advance(stage, IngestStage::Forwarded);
            info!(destination = self.forwarder.destination(), "Audio data forwarded");
        }

        advance(stage, IngestStage::Done);

        Ok(IngestReport {
            bytes_written,
            source_sample_rate: wav.sample_rate,
            target_sample_rate: self.settings.target_sample_rate,
            source_samples: source.len(),
            resampled_samples: resampled.len(),
            padded_samples: padded.len(),
            output_path,
        })
    }
}

fn advance(stage: &mut IngestStage, next: IngestStage) {
    debug!(from = %stage, to = %next, "Pipeline stage");
    *stage = next;
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_end_to_end_downsample_and_pad() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let pipeline = IngestPipeline::with_settings(settings_in(&dir), forwarder.clone());

        let raw = wav_bytes(32000, &[100, -100, 200, -200]);
        let report = pipeline.ingest(&raw).await.unwrap();

        assert_eq!(report.source_samples, 4);
        assert_eq!(report.resampled_samples, 2);
        assert_eq!(report.padded_samples, 32002);
        assert_eq!(report.bytes_written, 64004);

        let written = std::fs::read(dir.join("padded.pcm")).unwrap();
        assert_eq!(written.len(), 64004);
        let sample_at = |i: usize| i16::from_le_bytes([written[2 * i], written[2 * i + 1]]);
        assert_eq!(sample_at(8000), 100);
        assert_eq!(sample_at(8001), 200);
        let non_zero = (0..32002).filter(|&i| sample_at(i) != 0).count();
        assert_eq!(non_zero, 2);

        let bodies = forwarder.bodies.lock().unwrap();
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0], written);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_empty_upload_writes_and_forwards_nothing() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let pipeline = IngestPipeline::with_settings(settings_in(&dir), forwarder.clone());

        let err = pipeline.ingest(&[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptyInput));
        assert!(!dir.join("padded.pcm").exists());
        assert_eq!(forwarder.calls(), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_wrong_case_data_tag_is_invalid_container() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let pipeline = IngestPipeline::with_settings(settings_in(&dir), forwarder.clone());

        let mut raw = wav_bytes(16000, &[1, 2, 3]);
        raw[36..40].copy_from_slice(b"DATA");
        let err = pipeline.ingest(&raw).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_container");
        assert_eq!(forwarder.calls(), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_zero_source_rate_is_invalid_rate() {
        let dir = scratch_dir();
        let pipeline = IngestPipeline::with_settings(settings_in(&dir), RecordingForwarder::accepting());

        let raw = wav_bytes(0, &[1, 2]);
        let err = pipeline.ingest(&raw).await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRate { source_rate: 0, .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_one_hertz_header_is_refused_without_output() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let pipeline = IngestPipeline::with_settings(settings_in(&dir), forwarder.clone());

        // 1 MB of payload claiming 1 Hz would resample to 8e9 samples
        let raw = wav_bytes(1, &vec![0i16; 500_000]);
        let err = pipeline.ingest(&raw).await.unwrap_err();
        assert_eq!(err.kind(), "output_too_large");
        assert!(!dir.join("padded.pcm").exists());
        assert_eq!(forwarder.calls(), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_rejected_forward_keeps_persisted_file() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::answering(503);
        let pipeline = IngestPipeline::with_settings(settings_in(&dir), forwarder.clone());

        let raw = wav_bytes(16000, &[10, 20, 30]);
        let err = pipeline.ingest(&raw).await.unwrap_err();
        assert!(matches!(err, PipelineError::ForwardRejected { status: 503, .. }));
        assert_eq!(forwarder.calls(), 1);

        let written = std::fs::read(dir.join("padded.pcm")).unwrap();
        assert_eq!(written.len(), (8000 + 3 + 24000) * 2);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_unwritable_output_is_persist_failure() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let mut settings = settings_in(&dir);
        settings.output_path = dir.join("missing").join("padded.pcm");
        let pipeline = IngestPipeline::with_settings(settings, forwarder.clone());

        let raw = wav_bytes(16000, &[1]);
        let err = pipeline.ingest(&raw).await.unwrap_err();
        assert_eq!(err.kind(), "persist_failure");
        assert_eq!(forwarder.calls(), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_strict_format_rejects_stereo() {
        let dir = scratch_dir();
        let mut settings = settings_in(&dir);
        settings.strict_format = true;
        let pipeline = IngestPipeline::with_settings(settings, RecordingForwarder::accepting());

        let mut raw = wav_bytes(16000, &[1, 2]);
        raw[22..24].copy_from_slice(&2u16.to_le_bytes());
        let err = pipeline.ingest(&raw).await.unwrap_err();
        assert_eq!(err.kind(), "unsupported_format");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_later_upload_overwrites_output() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let pipeline = IngestPipeline::with_settings(settings_in(&dir), forwarder.clone());

        pipeline.ingest(&wav_bytes(16000, &[1; 100])).await.unwrap();
        pipeline.ingest(&wav_bytes(16000, &[2; 10])).await.unwrap();

        let written = std::fs::read(dir.join("padded.pcm")).unwrap();
        assert_eq!(written.len(), (8000 + 10 + 24000) * 2);
        assert_eq!(forwarder.bodies.lock().unwrap().last().unwrap(), &written);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
