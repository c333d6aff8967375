use crate::{error::{AppError, AppResult}, state::AppState};
use actix_web::{web, HttpResponse};
use serde_json::json;

/// `GET /api/v1/config` - the configuration the process was started with.
///
/// Configuration is fixed at startup, so there is no matching update endpoint.
pub async fn get_config(state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let config = serde_json::to_value(state.config.as_ref())
        .map_err(|e| AppError::Internal(format!("Failed to serialize configuration: {}", e)))?;

    Ok(HttpResponse::Ok().json(json!({
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "config": config,
        "output_path": state.config.output_path().display().to_string()
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::pipeline::testing::RecordingForwarder;
    use crate::audio::IngestPipeline;
    use crate::config::AppConfig;
    use actix_web::{test, App};

    #[actix_web::test]
    async fn test_get_config_reports_pipeline_constants() {
        let config = AppConfig::default();
        let pipeline = IngestPipeline::new(&config, RecordingForwarder::accepting());
        let state = AppState::new(config, pipeline);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .route("/api/v1/config", web::get().to(get_config)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/v1/config").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["config"]["pipeline"]["target_sample_rate"], 16000);
        assert_eq!(body["config"]["pipeline"]["lead_silence_samples"], 8000);
        assert_eq!(body["config"]["storage"]["output_file"], "padded.pcm");
    }
}
