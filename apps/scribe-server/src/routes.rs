use crate::{handlers, ws, AppState};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
	let max_body = state.config.max_file_size_bytes();

	Router::new()
		.route("/api/v1/health", get(handlers::health))
		.route("/api/v1/capacity", get(handlers::capacity))
		.route("/api/v1/transcribe/batch", post(handlers::create_batch))
		.route("/api/v1/transcribe/batch/:job_id", get(handlers::batch_status))
		.route("/api/v1/transcribe/stream", get(ws::stream_transcription))
		.layer(DefaultBodyLimit::max(max_body))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::audio::FfmpegNormalizer;
	use crate::config::AppConfig;
	use crate::engine::WhisperCliEngine;
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use clap::Parser;
	use scribe_core::{TracingSink, TranscriptionService};
	use std::sync::Arc;
	use tower::ServiceExt;

	fn test_state(config: AppConfig) -> AppState {
		let normalizer = Arc::new(FfmpegNormalizer::new(config.ffmpeg_bin.clone()));
		let engine = Arc::new(WhisperCliEngine::new(config.whisper_bin.clone(), config.model_path.clone(), config.language.clone()));
		let service = Arc::new(TranscriptionService::new(&config.core, normalizer, engine, Arc::new(TracingSink)));
		AppState {
			service,
			config: Arc::new(config),
		}
	}

	async fn body_json(response: axum::response::Response) -> serde_json::Value {
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
		serde_json::from_slice(&bytes).unwrap()
	}

	#[tokio::test]
	async fn health_reports_unloaded_model() {
		let app = router(test_state(AppConfig::parse_from(["scribe-server"])));

		let response = app.oneshot(Request::get("/api/v1/health").body(Body::empty()).unwrap()).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let body = body_json(response).await;
		assert_eq!(body["status"], "healthy");
		assert_eq!(body["model_loaded"], false);
		assert_eq!(body["model_size"], "not_loaded");
	}

	#[tokio::test]
	async fn capacity_exposes_the_gate_snapshot() {
		let app = router(test_state(AppConfig::parse_from(["scribe-server", "--max-queue-size", "7"])));

		let response = app.oneshot(Request::get("/api/v1/capacity").body(Body::empty()).unwrap()).await.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let body = body_json(response).await;
		assert_eq!(body["active_jobs"], 0);
		assert_eq!(body["max_queue_size"], 7);
		assert_eq!(body["available_capacity"], 7);
		assert_eq!(body["at_capacity"], false);
	}

	#[tokio::test]
	async fn unknown_job_is_a_404() {
		let app = router(test_state(AppConfig::parse_from(["scribe-server"])));

		let response = app
			.oneshot(
				Request::get("/api/v1/transcribe/batch/550e8400-e29b-41d4-a716-446655440000")
					.body(Body::empty())
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::NOT_FOUND);

		let body = body_json(response).await;
		assert_eq!(body["error"]["code"], "JOB_NOT_FOUND");
	}

	#[tokio::test]
	async fn submissions_before_warm_up_are_rejected() {
		let app = router(test_state(AppConfig::parse_from(["scribe-server"])));

		let response = app
			.oneshot(Request::post("/api/v1/transcribe/batch").body(Body::from("RIFF....WAVE")).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

		let body = body_json(response).await;
		assert_eq!(body["error"]["code"], "NOT_READY");
	}

	#[tokio::test]
	async fn unrecognized_audio_is_a_415() {
		// Point the engine at an existing file so warm-up succeeds.
		let model = tempfile::NamedTempFile::new().unwrap();
		let state = test_state(AppConfig::parse_from([
			"scribe-server",
			"--model-path",
			model.path().to_str().unwrap(),
		]));
		state.service.initialize().await.unwrap();
		let app = router(state);

		let response = app
			.oneshot(Request::post("/api/v1/transcribe/batch").body(Body::from("not audio at all")).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

		let body = body_json(response).await;
		assert_eq!(body["error"]["code"], "UNSUPPORTED_FORMAT");
	}
}
