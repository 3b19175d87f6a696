use crate::job::JobStatus;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by the orchestration core.
///
/// `JobNotFound`, `AtCapacity` and `BufferOverflow` are recoverable from the
/// caller's side. Collaborator failures (`UnsupportedFormat`,
/// `ConversionFailed`, `ModelNotReady`, `InferenceFailed`) are terminal for
/// the batch job they occur in.
#[derive(Debug, Error)]
pub enum ScribeError {
	#[error("job {0} not found")]
	JobNotFound(Uuid),

	#[error("server is at capacity ({active} active, {queued} queued), retry later")]
	AtCapacity { active: usize, queued: usize },

	#[error("appending {chunk} bytes to {buffered} buffered bytes would exceed the {max_bytes} byte stream limit")]
	BufferOverflow { buffered: usize, chunk: usize, max_bytes: usize },

	#[error("unsupported audio format: {0}")]
	UnsupportedFormat(String),

	#[error("audio conversion failed: {0}")]
	ConversionFailed(String),

	#[error("transcription model is not ready")]
	ModelNotReady,

	#[error("inference failed: {0}")]
	InferenceFailed(String),

	#[error("illegal job status transition {from} -> {to}")]
	InvalidTransition { from: JobStatus, to: JobStatus },

	#[error("worker queue is not accepting jobs")]
	QueueClosed,
}

pub type Result<T> = std::result::Result<T, ScribeError>;
