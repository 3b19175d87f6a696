use crate::error::{Result, ScribeError};
use crate::traits::{JobEvent, LifecycleSink, TracingSink};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Lifecycle states of a batch transcription job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
	Pending,
	Processing,
	Completed,
	Failed,
}

impl JobStatus {
	#[must_use]
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}

	/// Legal forward transitions. `Pending -> Failed` covers jobs whose
	/// admitted work unit could never be handed to a worker (shutdown race).
	#[must_use]
	pub const fn can_transition_to(self, next: Self) -> bool {
		matches!(
			(self, next),
			(Self::Pending, Self::Processing) | (Self::Pending, Self::Failed) | (Self::Processing, Self::Completed) | (Self::Processing, Self::Failed)
		)
	}
}

impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Failed => "failed",
		};
		f.write_str(s)
	}
}

/// One batch transcription request and its lifecycle record.
///
/// `transcription` is set only in `Completed`, `error_message` only in
/// `Failed`, and `completed_at` exactly when a terminal state is reached.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
	pub job_id: Uuid,
	pub status: JobStatus,
	pub source_path: PathBuf,
	pub transcription: Option<String>,
	pub error_message: Option<String>,
	pub created_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
	fn new(source_path: PathBuf) -> Self {
		Self {
			job_id: Uuid::new_v4(),
			status: JobStatus::Pending,
			source_path,
			transcription: None,
			error_message: None,
			created_at: Utc::now(),
			completed_at: None,
		}
	}
}

/// Thread-safe, in-memory job registry.
///
/// A single `RwLock` serializes all writes, so updates to one job are
/// totally ordered and every `get` returns a consistent snapshot. No
/// collaborator call ever happens while the lock is held; the lifecycle
/// sink is required to be non-blocking.
pub struct JobStore {
	jobs: RwLock<HashMap<Uuid, Job>>,
	sink: Arc<dyn LifecycleSink>,
}

impl Default for JobStore {
	fn default() -> Self {
		Self::new(Arc::new(TracingSink))
	}
}

impl JobStore {
	#[must_use]
	pub fn new(sink: Arc<dyn LifecycleSink>) -> Self {
		Self {
			jobs: RwLock::new(HashMap::new()),
			sink,
		}
	}

	/// Insert a fresh `Pending` record and return its id. Never fails.
	pub async fn create(&self, source_path: PathBuf) -> Uuid {
		let job = Job::new(source_path);
		let job_id = job.job_id;
		self.jobs.write().await.insert(job_id, job);
		info!(job_id = %job_id, "job created");
		job_id
	}

	/// Atomically write a validated status transition.
	///
	/// The completion timestamp is set exactly once, on the first transition
	/// into a terminal state. Repeated terminal updates overwrite the result
	/// and error fields but keep the timestamp and emit no lifecycle event.
	pub async fn update_status(&self, job_id: Uuid, new_status: JobStatus, transcription: Option<String>, error_message: Option<String>) -> Result<()> {
		let mut jobs = self.jobs.write().await;
		let job = jobs.get_mut(&job_id).ok_or(ScribeError::JobNotFound(job_id))?;

		let old_status = job.status;
		let overwrite = old_status.is_terminal() && new_status.is_terminal();
		if !overwrite && !old_status.can_transition_to(new_status) {
			return Err(ScribeError::InvalidTransition {
				from: old_status,
				to: new_status,
			});
		}

		job.status = new_status;
		if transcription.is_some() {
			job.transcription = transcription;
		}
		if error_message.is_some() {
			job.error_message = error_message.clone();
		}
		if new_status.is_terminal() && job.completed_at.is_none() {
			job.completed_at = Some(Utc::now());
		}

		if !overwrite {
			self.sink.on_transition(&JobEvent {
				job_id,
				old_status,
				new_status,
				timestamp: Utc::now(),
				error: error_message,
			});
		}

		Ok(())
	}

	/// Snapshot of a job, if it exists.
	pub async fn get(&self, job_id: Uuid) -> Option<Job> {
		self.jobs.read().await.get(&job_id).cloned()
	}

	/// Remove terminal jobs whose completion precedes `now - max_age`.
	///
	/// Non-terminal jobs are never evicted, regardless of age. Returns the
	/// number of removed records.
	pub async fn reap_older_than(&self, max_age: Duration) -> usize {
		let cutoff = Utc::now() - max_age;
		let mut jobs = self.jobs.write().await;
		let before = jobs.len();
		jobs.retain(|_, job| !(job.status.is_terminal() && job.completed_at.is_some_and(|done| done < cutoff)));
		let removed = before - jobs.len();
		if removed > 0 {
			info!(removed, "reaped old jobs");
		}
		removed
	}

	#[cfg(test)]
	pub(crate) async fn backdate_completion(&self, job_id: Uuid, completed_at: DateTime<Utc>) {
		if let Some(job) = self.jobs.write().await.get_mut(&job_id) {
			job.completed_at = Some(completed_at);
		}
	}
}
