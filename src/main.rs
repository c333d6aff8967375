//! # Audio Relay Backend - Main Application Entry Point
//!
//! Receives WAV recordings from a browser page, converts them to padded 16 kHz
//! mono PCM, keeps a copy on disk, and forwards the stream to a playback service.
//!
//! ## Application Architecture:
//! - **cli**: Command-line flags (`--debug`, `--config`)
//! - **config**: Configuration (file + environment variables), fixed at startup
//! - **audio**: WAV decoding, resampling, padding and the ingest pipeline
//! - **forward**: HTTP delivery of the processed stream
//! - **state**: Shared state and metrics
//! - **health**: Health and metrics endpoints
//! - **middleware**: Request logging and metrics
//! - **handlers**: Upload and config endpoints
//! - **error**: Error types and HTTP error responses

mod audio;
mod cli;
mod config;
mod error;
mod forward;
mod handlers;
mod health;
mod middleware;
mod state;

use actix_cors::Cors;
use actix_files::Files;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::audio::IngestPipeline;
use crate::cli::Args;
use crate::config::AppConfig;
use crate::forward::HttpForwarder;
use crate::state::AppState;

/// Set by the signal handler task, polled by `wait_for_shutdown`.
static SHUTDOWN_SIGNAL: AtomicBool = AtomicBool::new(false);

/// ## Startup sequence:
/// 1. Parse flags and set up logging
/// 2. Load and validate configuration (once; it never changes afterwards)
/// 3. Build the forwarder and the ingest pipeline from that configuration
/// 4. Serve HTTP until SIGINT/SIGTERM, then stop gracefully
#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let args = Args::parse();
    init_tracing(args.default_log_filter())?;
    if args.debug {
        info!("Debug mode activated");
    }

    let config = AppConfig::load_from(&args.config)?;
    config.validate()?;

    info!("Starting {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    info!(
        forward_url = %config.forward.url,
        output_path = %config.output_path().display(),
        target_sample_rate = config.pipeline.target_sample_rate,
        "Configuration loaded"
    );

    std::fs::create_dir_all(&config.storage.output_dir)
        .with_context(|| format!("Failed to create output directory {}", config.storage.output_dir))?;
    if !Path::new(&config.web.asset_dir).is_dir() {
        warn!(asset_dir = %config.web.asset_dir, "Web asset directory not found, static files will 404");
    }

    let forwarder = HttpForwarder::new(&config.forward)?;
    let pipeline = IngestPipeline::new(&config, Arc::new(forwarder));
    let app_state = AppState::new(config.clone(), pipeline);
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    setup_signal_handlers();

    info!("Server started on http://{}", bind_addr);

    let server = HttpServer::new(move || {
        let cors = if app_state.config.server.cors_permissive {
            Cors::default()
                .allow_any_origin()
                .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                .allow_any_header()
                .max_age(3600)
        } else {
            Cors::default()
        };

        let web_config = &app_state.config.web;

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .service(handlers::upload_resource())
            .service(
                web::scope("/api/v1")
                    .route("/health", web::get().to(health::health_check))
                    .route("/metrics", web::get().to(health::detailed_metrics))
                    .route("/config", web::get().to(handlers::get_config)),
            )
            .route("/health", web::get().to(health::health_check))
            // Registered last: it matches every remaining path
            .service(Files::new("/", &web_config.asset_dir).index_file(web_config.index_file.clone()))
    })
    .bind(&bind_addr)?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging through `tracing`.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` (info, or debug with `--debug`).
fn init_tracing(default_filter: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Flip `SHUTDOWN_SIGNAL` on SIGTERM or SIGINT.
fn setup_signal_handlers() {
    tokio::spawn(async {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to install signal handlers: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }

        SHUTDOWN_SIGNAL.store(true, Ordering::SeqCst);
    });
}

async fn wait_for_shutdown() {
    while !SHUTDOWN_SIGNAL.load(Ordering::SeqCst) {
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
