use crate::audio::detect_format;
use crate::error::ApiError;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use scribe_core::{CapacitySnapshot, JobStatus, ScribeError};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

#[derive(Serialize)]
pub struct HealthResponse {
	status: &'static str,
	model_loaded: bool,
	model_size: String,
}

#[derive(Serialize)]
pub struct BatchTranscribeResponse {
	job_id: Uuid,
	status: JobStatus,
}

#[derive(Serialize)]
pub struct BatchStatusResponse {
	job_id: Uuid,
	status: JobStatus,
	transcription: Option<String>,
	error: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
	let model_loaded = state.service.is_ready().await;
	Json(HealthResponse {
		status: "healthy",
		model_loaded,
		model_size: if model_loaded { state.config.model_name() } else { "not_loaded".to_string() },
	})
}

pub async fn capacity(State(state): State<AppState>) -> Json<CapacitySnapshot> {
	Json(state.service.capacity())
}

/// Accept a raw audio upload and submit it as a batch job.
///
/// The body is validated (size cap, magic bytes) before admission so a
/// rejected upload never consumes a capacity slot.
pub async fn create_batch(State(state): State<AppState>, body: Bytes) -> Result<Json<BatchTranscribeResponse>, ApiError> {
	if !state.service.is_ready().await {
		return Err(ScribeError::ModelNotReady.into());
	}

	if body.len() > state.config.max_file_size_bytes() {
		return Err(ApiError::FileTooLarge(state.config.max_file_size_mb));
	}

	let format = detect_format(&body).ok_or_else(|| ScribeError::UnsupportedFormat("supported formats: WAV, MP3, OGG, M4A".to_string()))?;

	tokio::fs::create_dir_all(&state.config.upload_dir).await?;
	let upload_path = state.config.upload_dir.join(format!("{}.{}", Uuid::new_v4(), format.extension()));
	tokio::fs::write(&upload_path, &body).await?;

	match state.service.transcribe_batch(upload_path.clone()).await {
		Ok(job_id) => {
			info!(job_id = %job_id, bytes = body.len(), "batch job submitted");
			Ok(Json(BatchTranscribeResponse {
				job_id,
				status: JobStatus::Pending,
			}))
		}
		Err(err) => {
			// The upload has no owner without a job record.
			let _ = tokio::fs::remove_file(&upload_path).await;
			Err(err.into())
		}
	}
}

pub async fn batch_status(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> Result<Json<BatchStatusResponse>, ApiError> {
	let job = state.service.get_job(job_id).await.ok_or(ScribeError::JobNotFound(job_id))?;
	Ok(Json(BatchStatusResponse {
		job_id: job.job_id,
		status: job.status,
		transcription: job.transcription,
		error: job.error_message,
	}))
}
