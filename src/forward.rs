//! # Downstream Delivery
//!
//! Sends the padded PCM stream to the playback endpoint. The pipeline only sees the
//! `Forwarder` trait, so tests can swap in a recording fake while production uses
//! `HttpForwarder` (a `reqwest` POST).

use crate::config::ForwardConfig;
use crate::error::PipelineError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, warn};

/// Something that accepts the final PCM buffer.
///
/// ## Contract:
/// - `Ok(())` only when the destination acknowledged with 200
/// - Transport problems → `ForwardTransportFailure`
/// - Any other status → `ForwardRejected`
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, body: Vec<u8>) -> Result<(), PipelineError>;

    /// Human-readable destination, used in logs and responses.
    fn destination(&self) -> &str;
}

/// POSTs the buffer to a configured URL.
pub struct HttpForwarder {
    client: reqwest::Client,
    url: String,
    content_type: String,
}

impl HttpForwarder {
    /// Build the client from configuration.
    ///
    /// The optional timeout is the only deadline applied to a forward; without it
    /// the request waits for the destination indefinitely.
    pub fn new(config: &ForwardConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = config.timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }

        Ok(Self {
            client: builder.build()?,
            url: config.url.clone(),
            content_type: config.content_type.clone(),
        })
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, body: Vec<u8>) -> Result<(), PipelineError> {
        debug!(url = %self.url, bytes = body.len(), "Forwarding PCM stream");

        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, self.content_type.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| PipelineError::ForwardTransportFailure {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        debug!(url = %self.url, status = status.as_u16(), "Forward response received");

        if status != StatusCode::OK {
            warn!(url = %self.url, status = status.as_u16(), "Forward destination rejected the stream");
            return Err(PipelineError::ForwardRejected {
                url: self.url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(())
    }

    fn destination(&self) -> &str {
        &self.url
    }
}
