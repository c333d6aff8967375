//! # Upload Handler
//!
//! `POST /upload` - accepts a recorded WAV file and runs it through the ingest pipeline.
//!
//! ## Request:
//! Multipart form data with an audio file field named "audio"
//!
//! ## Response:
//! ```json
//! {
//!   "status": "success",
//!   "message": "Audio uploaded, downsampled, padded, and sent successfully.",
//!   "bytes_written": 64004,
//!   "source_sample_rate": 48000,
//!   "target_sample_rate": 16000,
//!   "samples": { "source": 96000, "resampled": 32000, "padded": 64000 },
//!   "timestamp": "2025-01-01T12:00:00Z"
//! }
//! ```

use crate::{error::{AppError, AppResult}, state::AppState};
use actix_multipart::{Field, Multipart};
use actix_web::{web, HttpResponse, Resource};
use futures_util::stream::StreamExt;
use serde_json::json;
use tracing::{info, warn};

/// Name of the form field carrying the recording.
pub const AUDIO_FIELD: &str = "audio";

/// `/upload` accepts POST only; every other method gets 405.
pub fn upload_resource() -> Resource {
    web::resource("/upload")
        .route(web::post().to(upload_audio))
        .default_service(web::route().to(|| async {
            HttpResponse::MethodNotAllowed().body("Only POST method is allowed")
        }))
}

pub async fn upload_audio(
    state: web::Data<AppState>,
    payload: Multipart,
) -> AppResult<HttpResponse> {
    info!("Received a request to upload handler");

    let max_bytes = state.config.limits.max_upload_bytes;
    let audio_bytes = match read_audio_field(payload, max_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            state.record_upload_failure(upload_error_kind(&err));
            return Err(err);
        }
    };

    info!(size_bytes = audio_bytes.len(), "Audio file received");

    match state.pipeline.ingest(&audio_bytes).await {
        Ok(report) => {
            state.record_upload_success(report.bytes_written);

            Ok(HttpResponse::Ok().json(json!({
                "status": "success",
                "message": "Audio uploaded, downsampled, padded, and sent successfully.",
                "bytes_written": report.bytes_written,
                "source_sample_rate": report.source_sample_rate,
                "target_sample_rate": report.target_sample_rate,
                "samples": {
                    "source": report.source_samples,
                    "resampled": report.resampled_samples,
                    "padded": report.padded_samples
                },
                "timestamp": chrono::Utc::now().to_rfc3339()
            })))
        }
        Err(err) => {
            state.record_upload_failure(err.kind());
            Err(err.into())
        }
    }
}

/// Read the bytes of the "audio" part, draining (and ignoring) every other field.
///
/// ## Errors:
/// - **BadRequest**: malformed multipart body or no "audio" field
/// - **PayloadTooLarge**: the audio part grows past `max_bytes`
async fn read_audio_field(mut payload: Multipart, max_bytes: usize) -> Result<Vec<u8>, AppError> {
    let mut audio_data: Option<Vec<u8>> = None;

    while let Some(item) = payload.next().await {
        let mut field: Field = item.map_err(|e| AppError::BadRequest(format!("Multipart error: {}", e)))?;

        let is_audio = field
            .content_disposition()
            .and_then(|cd| cd.get_name())
            .map(|name| name == AUDIO_FIELD)
            .unwrap_or(false);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| AppError::BadRequest(format!("Chunk error: {}", e)))?;
            if !is_audio {
                continue;
            }
            if bytes.len() + chunk.len() > max_bytes {
                warn!(limit = max_bytes, "Upload exceeds size limit");
                return Err(AppError::PayloadTooLarge {
                    size: bytes.len() + chunk.len(),
                    limit: max_bytes,
                });
            }
            bytes.extend_from_slice(&chunk);
        }

        if is_audio && audio_data.is_none() {
            audio_data = Some(bytes);
        }
    }

    audio_data.ok_or_else(|| AppError::BadRequest("No audio file provided".to_string()))
}

fn upload_error_kind(err: &AppError) -> &'static str {
    match err {
        AppError::PayloadTooLarge { .. } => "payload_too_large",
        AppError::Pipeline(e) => e.kind(),
        _ => "bad_upload",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pipeline::testing::{scratch_dir, settings_in, wav_bytes, RecordingForwarder};
    use crate::audio::IngestPipeline;
    use crate::config::AppConfig;
    use actix_web::{http::StatusCode, test, App};

    const BOUNDARY: &str = "relay-test-boundary";

    fn multipart_body(field_name: &str, file: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"audio.wav\"\r\n",
                field_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: audio/wav\r\n\r\n");
        body.extend_from_slice(file);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn upload_request(field_name: &str, file: &[u8]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/upload")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body(field_name, file))
    }

    fn state_in(dir: &std::path::Path, forwarder: std::sync::Arc<RecordingForwarder>) -> AppState {
        let mut config = AppConfig::default();
        config.storage.output_dir = dir.display().to_string();
        let pipeline = IngestPipeline::with_settings(settings_in(dir), forwarder);
        AppState::new(config, pipeline)
    }

    #[actix_web::test]
    async fn test_upload_valid_wav() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let state = state_in(&dir, forwarder.clone());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/upload", web::post().to(upload_audio)),
        )
        .await;

        let wav = wav_bytes(32000, &[100, -100, 200, -200]);
        let resp = test::call_service(&app, upload_request("audio", &wav).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["bytes_written"], 64004);
        assert_eq!(body["samples"]["resampled"], 2);
        assert_eq!(forwarder.calls(), 1);
        assert_eq!(state.get_metrics_snapshot().uploads_succeeded, 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[actix_web::test]
    async fn test_upload_bad_container_is_client_error() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let state = state_in(&dir, forwarder.clone());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .route("/upload", web::post().to(upload_audio)),
        )
        .await;

        let mut wav = wav_bytes(16000, &[1, 2]);
        wav[36..40].copy_from_slice(b"DATA");
        let resp = test::call_service(&app, upload_request("audio", &wav).to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "invalid_container");
        assert_eq!(forwarder.calls(), 0);
        assert_eq!(
            state.get_metrics_snapshot().failures_by_kind.get("invalid_container"),
            Some(&1)
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[actix_web::test]
    async fn test_upload_without_audio_field() {
        let dir = scratch_dir();
        let state = state_in(&dir, RecordingForwarder::accepting());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/upload", web::post().to(upload_audio)),
        )
        .await;

        let resp = test::call_service(&app, upload_request("voice", b"RIFF").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[actix_web::test]
    async fn test_oversized_upload_is_payload_too_large() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let mut state = state_in(&dir, forwarder.clone());
        let mut config = (*state.config).clone();
        config.limits.max_upload_bytes = 64;
        state.config = std::sync::Arc::new(config);

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state.clone()))
                .service(upload_resource()),
        )
        .await;

        let wav = wav_bytes(16000, &[3; 100]);
        let resp = test::call_service(&app, upload_request("audio", &wav).to_request()).await;
        assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "payload_too_large");
        assert_eq!(forwarder.calls(), 0);
        assert_eq!(
            state.get_metrics_snapshot().failures_by_kind.get("payload_too_large"),
            Some(&1)
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[actix_web::test]
    async fn test_other_methods_are_not_allowed() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_in(&dir, forwarder.clone())))
                .service(upload_resource()),
        )
        .await;

        for req in [
            test::TestRequest::get().uri("/upload"),
            test::TestRequest::put().uri("/upload"),
            test::TestRequest::delete().uri("/upload"),
        ] {
            let resp = test::call_service(&app, req.to_request()).await;
            assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        }
        assert_eq!(forwarder.calls(), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[actix_web::test]
    async fn test_upload_resource_accepts_post() {
        let dir = scratch_dir();
        let forwarder = RecordingForwarder::accepting();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state_in(&dir, forwarder.clone())))
                .service(upload_resource()),
        )
        .await;

        let wav = wav_bytes(16000, &[1, 2, 3]);
        let resp = test::call_service(&app, upload_request("audio", &wav).to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(forwarder.calls(), 1);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[actix_web::test]
    async fn test_downstream_rejection_is_server_error() {
        let dir = scratch_dir();
        let state = state_in(&dir, RecordingForwarder::answering(404));
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/upload", web::post().to(upload_audio)),
        )
        .await;

        let wav = wav_bytes(16000, &[5; 16]);
        let resp = test::call_service(&app, upload_request("audio", &wav).to_request()).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["type"], "forward_rejected");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
