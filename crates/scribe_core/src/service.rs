use crate::capacity::{CapacityGate, CapacitySnapshot};
use crate::config::Config;
use crate::error::{Result, ScribeError};
use crate::job::{Job, JobStatus, JobStore};
use crate::pool::{JobHandler, WorkUnit, WorkerPool};
use crate::stream::StreamTranscriber;
use crate::traits::{AudioNormalizer, InferenceEngine, LifecycleSink};
use async_trait::async_trait;
use chrono::Duration;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Runs one admitted batch job end to end inside a worker slot.
///
/// Every failure is translated into a `Failed` status update; nothing
/// escapes into the pool. The active capacity slot is released by the
/// guard's drop, whatever path the job takes out of here.
struct BatchRunner {
	store: Arc<JobStore>,
	gate: Arc<CapacityGate>,
	normalizer: Arc<dyn AudioNormalizer>,
	engine: Arc<dyn InferenceEngine>,
}

impl BatchRunner {
	async fn set_terminal(&self, job_id: Uuid, status: JobStatus, transcription: Option<String>, error_message: Option<String>) {
		if let Err(err) = self.store.update_status(job_id, status, transcription, error_message).await {
			error!(job_id = %job_id, error = %err, "failed to record job outcome");
		}
	}
}

#[async_trait]
impl JobHandler for BatchRunner {
	async fn run(&self, unit: WorkUnit) {
		let _slot = self.gate.start();
		let job_id = unit.job_id;

		if let Err(err) = self.store.update_status(job_id, JobStatus::Processing, None, None).await {
			warn!(job_id = %job_id, error = %err, "job vanished before processing");
			return;
		}
		info!(job_id = %job_id, source = %unit.source_path.display(), "processing job");

		let normalized = match self.normalizer.normalize(&unit.source_path).await {
			Ok(path) => path,
			Err(err) => {
				self.set_terminal(job_id, JobStatus::Failed, None, Some(err.to_string())).await;
				return;
			}
		};

		let outcome = self.engine.transcribe_path(&normalized).await;
		self.normalizer.cleanup(&normalized).await;

		match outcome {
			Ok(text) => {
				info!(job_id = %job_id, transcription_length = text.len(), "job transcription completed");
				self.set_terminal(job_id, JobStatus::Completed, Some(text), None).await;
			}
			Err(err) => {
				self.set_terminal(job_id, JobStatus::Failed, None, Some(err.to_string())).await;
			}
		}
	}
}

/// Orchestrates batch and streaming transcription.
///
/// Batch: admission gate -> job registry -> worker pool -> collaborators.
/// Streaming: session-scoped buffers with threshold flushing. One instance
/// is constructed at process start and shared by reference; there is no
/// process-wide singleton.
pub struct TranscriptionService {
	store: Arc<JobStore>,
	gate: Arc<CapacityGate>,
	pool: WorkerPool,
	streams: StreamTranscriber,
	engine: Arc<dyn InferenceEngine>,
	init_lock: Mutex<()>,
}

impl TranscriptionService {
	/// Build the service and spawn its worker pool. Must be called from
	/// within a tokio runtime.
	#[must_use]
	pub fn new(config: &Config, normalizer: Arc<dyn AudioNormalizer>, engine: Arc<dyn InferenceEngine>, sink: Arc<dyn LifecycleSink>) -> Self {
		let store = Arc::new(JobStore::new(sink));
		let gate = Arc::new(CapacityGate::new(config.max_workers, config.max_queue_size));

		let runner = Arc::new(BatchRunner {
			store: Arc::clone(&store),
			gate: Arc::clone(&gate),
			normalizer,
			engine: Arc::clone(&engine),
		});
		let pool = WorkerPool::start(config.max_workers, config.max_queue_size, runner);

		let streams = StreamTranscriber::new(Arc::clone(&engine), config.stream_flush_threshold, config.stream_max_buffer);

		Self {
			store,
			gate,
			pool,
			streams,
			engine,
			init_lock: Mutex::new(()),
		}
	}

	/// Load the model if it is not loaded yet.
	///
	/// Single-flight: concurrent first calls serialize on the init lock and
	/// the losers observe readiness instead of loading twice.
	pub async fn initialize(&self) -> Result<()> {
		let _guard = self.init_lock.lock().await;
		if self.engine.is_ready().await {
			return Ok(());
		}
		info!("initializing transcription service");
		self.engine.warm_up().await?;
		info!("transcription service initialized");
		Ok(())
	}

	pub async fn is_ready(&self) -> bool {
		self.engine.is_ready().await
	}

	/// Admit and start a batch transcription job, returning its id without
	/// waiting for execution.
	///
	/// Rejected submissions leave no trace: admission happens before the
	/// job record is created.
	pub async fn transcribe_batch(&self, source_path: PathBuf) -> Result<Uuid> {
		if !self.engine.is_ready().await {
			return Err(ScribeError::ModelNotReady);
		}

		if !self.gate.try_admit() {
			let snapshot = self.gate.snapshot();
			warn!(active = snapshot.active_jobs, queued = snapshot.queued_jobs, "submission rejected, at capacity");
			return Err(ScribeError::AtCapacity {
				active: snapshot.active_jobs,
				queued: snapshot.queued_jobs,
			});
		}

		let job_id = self.store.create(source_path.clone()).await;

		if let Err(err) = self.pool.try_enqueue(WorkUnit { job_id, source_path }) {
			// Admission was reserved but the pool is gone; undo the
			// reservation and leave a terminal record behind.
			self.gate.cancel_admission();
			self.set_failed_on_enqueue(job_id, &err).await;
			return Err(err);
		}

		Ok(job_id)
	}

	async fn set_failed_on_enqueue(&self, job_id: Uuid, err: &ScribeError) {
		if let Err(update_err) = self.store.update_status(job_id, JobStatus::Failed, None, Some(err.to_string())).await {
			error!(job_id = %job_id, error = %update_err, "failed to mark unqueued job as failed");
		}
	}

	/// Snapshot of a batch job, if the registry still holds it.
	pub async fn get_job(&self, job_id: Uuid) -> Option<Job> {
		self.store.get(job_id).await
	}

	#[must_use]
	pub fn capacity(&self) -> CapacitySnapshot {
		self.gate.snapshot()
	}

	#[must_use]
	pub fn is_at_capacity(&self) -> bool {
		self.gate.is_full()
	}

	/// Remove terminal jobs older than `max_age`. Intended to be driven by
	/// an external periodic timer.
	pub async fn reap_older_than(&self, max_age: Duration) -> usize {
		self.store.reap_older_than(max_age).await
	}

	/// Buffer a streaming chunk for `session_id`, flushing at the threshold.
	pub async fn transcribe_stream_chunk(&self, session_id: &str, chunk: &[u8]) -> Result<Option<String>> {
		if !self.engine.is_ready().await {
			return Err(ScribeError::ModelNotReady);
		}
		self.streams.push_chunk(session_id, chunk).await
	}

	/// Flush whatever is buffered for `session_id` at session end.
	pub async fn finalize_stream(&self, session_id: &str) -> Result<String> {
		if !self.engine.is_ready().await {
			return Err(ScribeError::ModelNotReady);
		}
		self.streams.finalize(session_id).await
	}

	/// Discard a session's buffered audio.
	pub async fn reset_stream(&self, session_id: &str) {
		self.streams.reset(session_id).await;
	}

	/// Bytes currently buffered for a streaming session.
	pub async fn stream_buffer_size(&self, session_id: &str) -> usize {
		self.streams.buffered_bytes(session_id).await
	}
}
