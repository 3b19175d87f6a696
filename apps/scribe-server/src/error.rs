use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use scribe_core::ScribeError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
	#[error(transparent)]
	Core(#[from] ScribeError),

	#[error("file size exceeds the {0} MB limit")]
	FileTooLarge(usize),

	#[error("failed to store uploaded audio: {0}")]
	UploadIo(#[from] std::io::Error),
}

#[derive(Serialize)]
struct ErrorDetail {
	code: &'static str,
	message: String,
	details: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
	error: ErrorDetail,
}

impl ApiError {
	const fn code_and_status(&self) -> (&'static str, StatusCode) {
		match self {
			Self::Core(err) => match err {
				ScribeError::JobNotFound(_) => ("JOB_NOT_FOUND", StatusCode::NOT_FOUND),
				ScribeError::AtCapacity { .. } => ("AT_CAPACITY", StatusCode::SERVICE_UNAVAILABLE),
				ScribeError::ModelNotReady => ("NOT_READY", StatusCode::SERVICE_UNAVAILABLE),
				ScribeError::UnsupportedFormat(_) => ("UNSUPPORTED_FORMAT", StatusCode::UNSUPPORTED_MEDIA_TYPE),
				ScribeError::ConversionFailed(_) => ("CONVERSION_FAILED", StatusCode::BAD_REQUEST),
				ScribeError::BufferOverflow { .. } => ("BUFFER_OVERFLOW", StatusCode::BAD_REQUEST),
				ScribeError::InferenceFailed(_) => ("INFERENCE_FAILED", StatusCode::INTERNAL_SERVER_ERROR),
				ScribeError::InvalidTransition { .. } | ScribeError::QueueClosed => ("INTERNAL_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
			},
			Self::FileTooLarge(_) => ("FILE_TOO_LARGE", StatusCode::PAYLOAD_TOO_LARGE),
			Self::UploadIo(_) => ("INTERNAL_ERROR", StatusCode::INTERNAL_SERVER_ERROR),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (code, status) = self.code_and_status();
		if status.is_server_error() {
			tracing::error!(code, error = %self, "request failed");
		}

		let body = ErrorBody {
			error: ErrorDetail {
				code,
				message: self.to_string(),
				details: None,
			},
		};
		(status, Json(body)).into_response()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use uuid::Uuid;

	#[test]
	fn recoverable_errors_map_to_client_statuses() {
		let (code, status) = ApiError::Core(ScribeError::JobNotFound(Uuid::new_v4())).code_and_status();
		assert_eq!((code, status), ("JOB_NOT_FOUND", StatusCode::NOT_FOUND));

		let (code, status) = ApiError::Core(ScribeError::AtCapacity { active: 4, queued: 100 }).code_and_status();
		assert_eq!((code, status), ("AT_CAPACITY", StatusCode::SERVICE_UNAVAILABLE));

		let (code, status) = ApiError::Core(ScribeError::UnsupportedFormat("webm".into())).code_and_status();
		assert_eq!((code, status), ("UNSUPPORTED_FORMAT", StatusCode::UNSUPPORTED_MEDIA_TYPE));

		let (_, status) = ApiError::FileTooLarge(500).code_and_status();
		assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
	}
}
