//! # Error Handling
//!
//! Two layers of errors live here:
//!
//! - **PipelineError**: the classified failures of the ingest pipeline. Every stage
//!   (header parsing, sample extraction, resampling, padding, persisting, forwarding)
//!   fails fast with exactly one of these kinds.
//! - **AppError**: what HTTP handlers return. It knows how to turn itself into an
//!   HTTP response with a JSON body, and wraps a `PipelineError` when an upload fails.
//!
//! ## Status Code Policy:
//! - Problems with what the client uploaded → 4xx
//! - Problems on our side (disk, downstream player, size limits of the process) → 5xx

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Classified failure of one ingest request.
///
/// ## Rust Concepts:
/// - **thiserror::Error**: derives `Display` and `std::error::Error` from the
///   `#[error(...)]` attributes, so each variant carries its own message
/// - **Struct-like variants**: extra context (sizes, tags, status codes) travels
///   with the error instead of being formatted into a string up front
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The upload contained no bytes at all
    #[error("uploaded file is empty")]
    EmptyInput,

    /// Fewer bytes than a complete container header
    #[error("input is {actual} bytes, a container header needs {required}")]
    TruncatedInput { actual: usize, required: usize },

    /// One of the RIFF / WAVE / data tags did not match
    #[error("invalid container: expected {field} tag {expected:?}, found {found:?}")]
    InvalidContainer {
        field: &'static str,
        expected: String,
        found: String,
    },

    /// The header announces more payload bytes than were uploaded
    #[error("payload truncated: header declares {declared} bytes, only {available} present")]
    TruncatedPayload { declared: usize, available: usize },

    #[error("invalid sample rate conversion {source_rate} Hz -> {target_rate} Hz")]
    InvalidRate { source_rate: u32, target_rate: u32 },

    /// The header's sample rate would make the resampled sequence too long
    #[error("resampled sequence of {samples} samples exceeds the limit of {limit}")]
    OutputTooLarge { samples: u64, limit: usize },

    #[error("padded sequence of {lead} + {len} + {trail} samples is not addressable")]
    SizeOverflow { lead: usize, len: usize, trail: usize },

    /// Only raised when strict format checking is enabled
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to persist output to {path}: {source}")]
    PersistFailure {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to reach forward destination {url}: {message}")]
    ForwardTransportFailure { url: String, message: String },

    #[error("forward destination {url} answered with status {status}")]
    ForwardRejected { url: String, status: u16 },
}

impl PipelineError {
    /// Stable machine-readable name used in JSON error bodies and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::EmptyInput => "empty_input",
            PipelineError::TruncatedInput { .. } => "truncated_input",
            PipelineError::InvalidContainer { .. } => "invalid_container",
            PipelineError::TruncatedPayload { .. } => "truncated_payload",
            PipelineError::InvalidRate { .. } => "invalid_rate",
            PipelineError::OutputTooLarge { .. } => "output_too_large",
            PipelineError::SizeOverflow { .. } => "size_overflow",
            PipelineError::UnsupportedFormat(_) => "unsupported_format",
            PipelineError::PersistFailure { .. } => "persist_failure",
            PipelineError::ForwardTransportFailure { .. } => "forward_transport_failure",
            PipelineError::ForwardRejected { .. } => "forward_rejected",
        }
    }

    /// HTTP status this failure is reported with.
    ///
    /// Anything derived from the uploaded bytes is the client's problem (400);
    /// storage, downstream and capacity failures are ours (500).
    pub fn status_code(&self) -> StatusCode {
        match self {
            PipelineError::EmptyInput
            | PipelineError::TruncatedInput { .. }
            | PipelineError::InvalidContainer { .. }
            | PipelineError::TruncatedPayload { .. }
            | PipelineError::InvalidRate { .. }
            | PipelineError::OutputTooLarge { .. }
            | PipelineError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            PipelineError::SizeOverflow { .. }
            | PipelineError::PersistFailure { .. }
            | PipelineError::ForwardTransportFailure { .. }
            | PipelineError::ForwardRejected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors returned by HTTP handlers.
///
/// ## Error Categories:
/// - **Internal**: Server-side problems (500)
/// - **BadRequest**: Malformed multipart bodies, missing form fields (400)
/// - **PayloadTooLarge**: Upload exceeds the configured limit (413)
/// - **Pipeline**: The upload was read but processing it failed; status depends on the kind
///
/// ## Usage Example:
/// ```rust
/// return Err(AppError::BadRequest("No audio file provided".to_string()));
/// ```
#[derive(Debug)]
pub enum AppError {
    /// Internal server errors
    Internal(String),

    /// Client sent an unusable request
    BadRequest(String),

    /// Upload is larger than `limits.max_upload_bytes`
    PayloadTooLarge { size: usize, limit: usize },

    /// A classified ingest failure
    Pipeline(PipelineError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::PayloadTooLarge { size, limit } => {
                write!(f, "Upload too large: {} bytes (max: {} bytes)", size, limit)
            }
            AppError::Pipeline(err) => write!(f, "Audio processing failed: {}", err),
        }
    }
}

/// Converts errors into HTTP responses.
///
/// ## JSON Response Format:
/// ```json
/// {
///   "error": {
///     "type": "invalid_container",
///     "message": "invalid container: expected data tag \"data\", found \"DATA\"",
///     "timestamp": "2025-01-01T12:00:00Z"
///   }
/// }
/// ```
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Pipeline(err) => err.status_code(),
        }
    }

    fn error_response(&self) -> HttpResponse {
        let (error_type, message) = match self {
            AppError::Internal(msg) => ("internal_error", msg.clone()),
            AppError::BadRequest(msg) => ("bad_request", msg.clone()),
            AppError::PayloadTooLarge { .. } => ("payload_too_large", self.to_string()),
            AppError::Pipeline(err) => (err.kind(), err.to_string()),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

/// `?` on a pipeline result inside a handler lands here.
impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;
