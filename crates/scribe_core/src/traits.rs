use crate::error::Result;
use crate::job::JobStatus;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

/// Prepares caller-supplied audio for the inference engine.
///
/// Implementations typically resample to whatever the engine expects and
/// write the result to a temporary location. The orchestrator owns the
/// normalized artifact and calls [`AudioNormalizer::cleanup`] once inference
/// is done with it, success or failure.
#[async_trait]
pub trait AudioNormalizer: Send + Sync {
	/// Produce an engine-consumable artifact from `source`.
	///
	/// Fails with `UnsupportedFormat` or `ConversionFailed`.
	async fn normalize(&self, source: &Path) -> Result<PathBuf>;

	/// Delete the artifact produced by [`AudioNormalizer::normalize`].
	async fn cleanup(&self, normalized: &Path) {
		if let Err(err) = tokio::fs::remove_file(normalized).await {
			warn!(path = %normalized.display(), error = %err, "failed to remove normalized audio");
		}
	}
}

/// Speech-to-text engine, stateless from the core's point of view.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
	/// Whether the model is loaded and transcription calls may be issued.
	async fn is_ready(&self) -> bool;

	/// Load the model. Must be idempotent; the service serializes callers.
	async fn warm_up(&self) -> Result<()>;

	/// Transcribe a normalized audio file.
	async fn transcribe_path(&self, audio: &Path) -> Result<String>;

	/// Transcribe raw buffered audio bytes (streaming path).
	async fn transcribe_raw(&self, audio: &[u8]) -> Result<String>;
}

/// A single job lifecycle transition, as observed by the registry.
#[derive(Debug, Clone)]
pub struct JobEvent {
	pub job_id: Uuid,
	pub old_status: JobStatus,
	pub new_status: JobStatus,
	pub timestamp: DateTime<Utc>,
	pub error: Option<String>,
}

/// Receives lifecycle events for observability.
///
/// Called while the registry's critical section is held, so implementations
/// must be fire-and-forget: no I/O, no locks that can wait.
pub trait LifecycleSink: Send + Sync {
	fn on_transition(&self, event: &JobEvent);
}

/// Default sink: structured tracing events.
#[derive(Debug, Default)]
pub struct TracingSink;

impl LifecycleSink for TracingSink {
	fn on_transition(&self, event: &JobEvent) {
		match &event.error {
			Some(error) => info!(
				job_id = %event.job_id,
				old_status = %event.old_status,
				new_status = %event.new_status,
				error = %error,
				"job status updated"
			),
			None => info!(
				job_id = %event.job_id,
				old_status = %event.old_status,
				new_status = %event.new_status,
				"job status updated"
			),
		}
	}
}
