//! # Configuration Management
//!
//! Loads the service configuration once at startup from multiple sources:
//! - Built-in defaults (the `Default` impl below)
//! - A configuration file (`config.toml`, `config.json`, ... - any format the `config` crate knows)
//! - Environment variables with the `APP_` prefix
//!
//! The resulting `AppConfig` is immutable for the lifetime of the process. It is handed
//! to the ingest pipeline and to the HTTP layer explicitly; nothing reads it from global state.
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT` environment variables (deployment platforms)
//! 2. Environment variables (APP_SERVER__PORT, APP_FORWARD__URL, etc.)
//! 3. Configuration file
//! 4. Default values

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main application configuration.
///
/// ## Why separate config structs:
/// Each group maps to one concern of the service: where we listen, where the
/// processed audio is stored, where it is forwarded, how it is processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub web: WebConfig,
    pub forward: ForwardConfig,
    pub pipeline: PipelineConfig,
    pub limits: LimitsConfig,
}

/// Server-specific configuration settings.
///
/// ## Common values:
/// - `host = "127.0.0.1"`: Only accept connections from localhost (development)
/// - `host = "0.0.0.0"`: Accept connections from any IP address (production)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Send permissive CORS headers so browser recorders on other origins can upload
    pub cors_permissive: bool,
}

/// Where the padded PCM artifact is written.
///
/// The file is overwritten on every successful upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub output_dir: String,
    pub output_file: String,
}

/// Static web assets (the browser recorder page).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub asset_dir: String,
    pub index_file: String,
}

/// Downstream playback endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardConfig {
    pub url: String,
    pub content_type: String,
    /// Request timeout for the outbound HTTP client; `None` waits indefinitely
    pub timeout_ms: Option<u64>,
}

/// Tunable constants of the resample and pad stages.
///
/// ## Defaults:
/// At 16 kHz, 8000 leading samples are 0.5 s of silence and 24000 trailing
/// samples are 1.5 s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub target_sample_rate: u32,
    pub lead_silence_samples: usize,
    pub trail_silence_samples: usize,
    /// Reject uploads that are not mono 16-bit integer PCM
    pub strict_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_upload_bytes: usize,
    /// Longest resampled sequence accepted, in samples at the target rate
    pub max_output_samples: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                cors_permissive: true,
            },
            storage: StorageConfig {
                output_dir: "./uploads".to_string(),
                output_file: "padded.pcm".to_string(),
            },
            web: WebConfig {
                asset_dir: "./www".to_string(),
                index_file: "index.html".to_string(),
            },
            forward: ForwardConfig {
                url: "http://127.0.0.1:5000/play_audio".to_string(),
                content_type: "application/octet-stream".to_string(),
                timeout_ms: None,
            },
            pipeline: PipelineConfig {
                target_sample_rate: 16000,
                lead_silence_samples: 8000,
                trail_silence_samples: 24000,
                strict_format: false,
            },
            limits: LimitsConfig {
                max_upload_bytes: 50 * 1024 * 1024, // 50MB
                max_output_samples: 16000 * 60 * 30, // 30 minutes at 16 kHz
            },
        }
    }
}

impl AppConfig {
    /// Load configuration in priority order, reading the file `file_name` (without extension).
    ///
    /// ## Environment Variable Examples:
    /// - `APP_SERVER__PORT=3000`: Override server port
    /// - `APP_FORWARD__URL=http://speaker:5000/play_audio`: Override forward destination
    /// - `APP_STORAGE__OUTPUT_DIR=/var/lib/relay`: Override output directory
    /// - `PORT=3000`: Special case for deployment platforms
    ///
    /// Nested keys use a double underscore so that field names containing a single
    /// underscore (`output_dir`, `target_sample_rate`) stay intact.
    pub fn load_from(file_name: &str) -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name(file_name).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// ## What this checks:
    /// - Server port is not 0
    /// - A forward destination is configured
    /// - The target sample rate is not 0 (the resampler would divide by it)
    /// - The upload and output limits are not 0
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.forward.url.trim().is_empty() {
            return Err(anyhow::anyhow!("Forward URL must be set"));
        }

        if self.pipeline.target_sample_rate == 0 {
            return Err(anyhow::anyhow!("Target sample rate must be greater than 0"));
        }

        if self.storage.output_file.trim().is_empty() {
            return Err(anyhow::anyhow!("Output file name must be set"));
        }

        if self.limits.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        if self.limits.max_output_samples == 0 {
            return Err(anyhow::anyhow!("Max output samples must be greater than 0"));
        }

        Ok(())
    }

    /// Full path of the overwritten output artifact.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.output_dir).join(&self.storage.output_file)
    }
}
