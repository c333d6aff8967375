//! # Application State Management
//!
//! State shared by every HTTP request handler.
//!
//! ## What is shared:
//! - **config**: the startup configuration, read-only, so a plain `Arc` is enough
//! - **pipeline**: the ingest pipeline (it guards its own output file internally)
//! - **metrics**: counters updated by middleware and the upload handler, behind `Arc<RwLock<>>`
//!
//! ## Arc<RwLock<T>> Pattern
//! - **Arc**: every actix worker holds a reference to the same data
//! - **RwLock**: many readers (health checks) or one writer (a finished request) at a time

use crate::audio::IngestPipeline;
use crate::config::AppConfig;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub pipeline: Arc<IngestPipeline>,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests processed since server start
    pub request_count: u64,

    /// Requests that ended with a 4xx or 5xx status
    pub error_count: u64,

    /// Uploads that were persisted and accepted downstream
    pub uploads_succeeded: u64,

    /// Uploads rejected or failed at any pipeline stage
    pub uploads_failed: u64,

    /// Total PCM bytes delivered to the forward destination
    pub bytes_forwarded: u64,

    /// Failure counts keyed by pipeline error kind (e.g. "invalid_container")
    pub failures_by_kind: HashMap<String, u64>,

    /// Key: "METHOD /path"
    pub endpoint_metrics: HashMap<String, EndpointMetric>,
}

/// Performance metrics for one endpoint.
#[derive(Debug, Default, Clone)]
pub struct EndpointMetric {
    pub request_count: u64,
    pub total_duration_ms: u64,
    pub error_count: u64,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: IngestPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        }
    }

    /// Run `f` with exclusive access to the metrics.
    ///
    /// A poisoned lock only means another thread panicked mid-update; counters
    /// are still usable, so the guard is recovered instead of propagating the panic.
    fn with_metrics<R>(&self, f: impl FnOnce(&mut AppMetrics) -> R) -> R {
        let mut metrics = self.metrics.write().unwrap_or_else(|e| e.into_inner());
        f(&mut metrics)
    }

    pub fn increment_request_count(&self) {
        self.with_metrics(|m| m.request_count += 1);
    }

    pub fn increment_error_count(&self) {
        self.with_metrics(|m| m.error_count += 1);
    }

    pub fn record_endpoint_request(&self, endpoint: &str, duration_ms: u64, is_error: bool) {
        self.with_metrics(|m| {
            let metric = m.endpoint_metrics.entry(endpoint.to_string()).or_default();
            metric.request_count += 1;
            metric.total_duration_ms += duration_ms;
            if is_error {
                metric.error_count += 1;
            }
        });
    }

    pub fn record_upload_success(&self, bytes_forwarded: usize) {
        self.with_metrics(|m| {
            m.uploads_succeeded += 1;
            m.bytes_forwarded += bytes_forwarded as u64;
        });
    }

    pub fn record_upload_failure(&self, kind: &str) {
        self.with_metrics(|m| {
            m.uploads_failed += 1;
            *m.failures_by_kind.entry(kind.to_string()).or_default() += 1;
        });
    }

    /// Consistent copy of the metrics, so no lock is held while building a response.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl EndpointMetric {
    pub fn average_duration_ms(&self) -> f64 {
        if self.request_count > 0 {
            self.total_duration_ms as f64 / self.request_count as f64
        } else {
            0.0
        }
    }

    /// Fraction of failed requests, 0.0 to 1.0.
    pub fn error_rate(&self) -> f64 {
        if self.request_count > 0 {
            self.error_count as f64 / self.request_count as f64
        } else {
            0.0
        }
    }
}
