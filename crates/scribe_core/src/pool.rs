use crate::error::{Result, ScribeError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error};
use uuid::Uuid;

/// One admitted batch job, waiting for a worker slot.
#[derive(Debug, Clone)]
pub struct WorkUnit {
	pub job_id: Uuid,
	pub source_path: PathBuf,
}

/// Executes one work unit to completion. Implementations catch their own
/// failures and translate them into job status updates; `run` never
/// propagates an error into the pool.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
	async fn run(&self, unit: WorkUnit);
}

/// Fixed-size pool of worker tasks draining a bounded queue.
///
/// All workers share one receiver; the handle lock is held only while
/// waiting for the next unit, never while processing it, so up to
/// `workers` units run concurrently. Each unit executes in its own spawned
/// task that the worker joins, which keeps a panicking job from taking the
/// worker slot down with it.
pub struct WorkerPool {
	tx: mpsc::Sender<WorkUnit>,
}

impl WorkerPool {
	pub fn start<H: JobHandler>(workers: usize, queue_depth: usize, handler: Arc<H>) -> Self {
		let (tx, rx) = mpsc::channel::<WorkUnit>(queue_depth.max(1));
		let rx = Arc::new(Mutex::new(rx));

		for worker_id in 0..workers.max(1) {
			let rx = Arc::clone(&rx);
			let handler = Arc::clone(&handler);

			tokio::spawn(async move {
				loop {
					let unit = { rx.lock().await.recv().await };
					let Some(unit) = unit else {
						debug!(worker_id, "work queue closed, worker stopping");
						break;
					};

					let job_id = unit.job_id;
					let handler = Arc::clone(&handler);
					if let Err(err) = tokio::spawn(async move { handler.run(unit).await }).await {
						error!(worker_id, job_id = %job_id, error = %err, "job task panicked");
					}
				}
			});
		}

		Self { tx }
	}

	/// Hand an admitted unit to the pool without blocking.
	///
	/// The admission gate bounds in-flight units, so a full or closed queue
	/// here means the pool is shutting down underneath the caller.
	pub fn try_enqueue(&self, unit: WorkUnit) -> Result<()> {
		self.tx.try_send(unit).map_err(|_| ScribeError::QueueClosed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	struct CountingHandler {
		running: AtomicUsize,
		peak: AtomicUsize,
		done: AtomicUsize,
	}

	impl CountingHandler {
		fn new() -> Self {
			Self {
				running: AtomicUsize::new(0),
				peak: AtomicUsize::new(0),
				done: AtomicUsize::new(0),
			}
		}
	}

	async fn wait_for(count: &AtomicUsize, target: usize) {
		while count.load(Ordering::SeqCst) < target {
			tokio::time::sleep(Duration::from_millis(5)).await;
		}
	}

	#[async_trait]
	impl JobHandler for CountingHandler {
		async fn run(&self, _unit: WorkUnit) {
			let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
			self.peak.fetch_max(now, Ordering::SeqCst);
			tokio::time::sleep(Duration::from_millis(30)).await;
			self.running.fetch_sub(1, Ordering::SeqCst);
			self.done.fetch_add(1, Ordering::SeqCst);
		}
	}

	fn unit() -> WorkUnit {
		WorkUnit {
			job_id: Uuid::new_v4(),
			source_path: PathBuf::from("/tmp/audio.wav"),
		}
	}

	#[tokio::test]
	async fn concurrency_never_exceeds_worker_count() {
		let handler = Arc::new(CountingHandler::new());
		let pool = WorkerPool::start(2, 8, handler.clone());

		for _ in 0..6 {
			pool.try_enqueue(unit()).unwrap();
		}

		wait_for(&handler.done, 6).await;

		assert_eq!(handler.done.load(Ordering::SeqCst), 6);
		assert!(handler.peak.load(Ordering::SeqCst) <= 2);
	}

	struct PanickyHandler {
		done: AtomicUsize,
	}

	#[async_trait]
	impl JobHandler for PanickyHandler {
		async fn run(&self, unit: WorkUnit) {
			if unit.source_path.as_os_str() == "panic" {
				panic!("simulated job panic");
			}
			self.done.fetch_add(1, Ordering::SeqCst);
		}
	}

	#[tokio::test]
	async fn panicking_job_does_not_kill_the_worker() {
		let handler = Arc::new(PanickyHandler { done: AtomicUsize::new(0) });
		let pool = WorkerPool::start(1, 8, handler.clone());

		pool
			.try_enqueue(WorkUnit {
				job_id: Uuid::new_v4(),
				source_path: PathBuf::from("panic"),
			})
			.unwrap();
		pool.try_enqueue(unit()).unwrap();
		pool.try_enqueue(unit()).unwrap();

		wait_for(&handler.done, 2).await;
		assert_eq!(handler.done.load(Ordering::SeqCst), 2);
	}
}
