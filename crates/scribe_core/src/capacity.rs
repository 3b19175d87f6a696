use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Counts {
	active: usize,
	queued: usize,
}

/// Point-in-time view of the gate, suitable for a health/metrics endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapacitySnapshot {
	pub active_jobs: usize,
	pub queued_jobs: usize,
	pub max_workers: usize,
	pub max_queue_size: usize,
	pub available_capacity: usize,
	pub at_capacity: bool,
}

/// Bounded admission control for batch submissions.
///
/// Capacity is checked and reserved in one critical section at submission
/// time, so a burst of concurrent submissions can never overshoot the queue
/// bound. The active count is bounded by the worker pool size: a queued
/// reservation only becomes active through [`CapacityGate::start`], called
/// from one of `max_workers` worker slots.
pub struct CapacityGate {
	max_workers: usize,
	max_queue_size: usize,
	counts: Mutex<Counts>,
}

impl CapacityGate {
	#[must_use]
	pub fn new(max_workers: usize, max_queue_size: usize) -> Self {
		Self {
			max_workers,
			max_queue_size,
			counts: Mutex::new(Counts::default()),
		}
	}

	fn lock(&self) -> MutexGuard<'_, Counts> {
		self.counts.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Atomically reserve a queue slot. Returns `false`, with no side
	/// effects, when the queue bound is reached.
	pub fn try_admit(&self) -> bool {
		let mut counts = self.lock();
		if counts.queued >= self.max_queue_size {
			return false;
		}
		counts.queued += 1;
		true
	}

	/// Give back a reservation that never reached a worker.
	pub fn cancel_admission(&self) {
		let mut counts = self.lock();
		counts.queued = counts.queued.saturating_sub(1);
	}

	/// Move one admitted job from queued to active. Called exactly once per
	/// admitted job, immediately before it begins executing.
	pub fn on_start(&self) {
		let mut counts = self.lock();
		counts.queued = counts.queued.saturating_sub(1);
		counts.active += 1;
	}

	/// Release an active slot. Called exactly once per started job.
	pub fn on_finish(&self) {
		let mut counts = self.lock();
		counts.active = counts.active.saturating_sub(1);
	}

	/// [`CapacityGate::on_start`] paired with a guard whose drop releases
	/// the active slot, so the release happens on success, failure and
	/// panic alike.
	#[must_use]
	pub fn start(self: &Arc<Self>) -> ActiveSlot {
		self.on_start();
		ActiveSlot { gate: Arc::clone(self) }
	}

	pub fn is_full(&self) -> bool {
		self.lock().queued >= self.max_queue_size
	}

	#[must_use]
	pub fn snapshot(&self) -> CapacitySnapshot {
		let counts = self.lock();
		CapacitySnapshot {
			active_jobs: counts.active,
			queued_jobs: counts.queued,
			max_workers: self.max_workers,
			max_queue_size: self.max_queue_size,
			available_capacity: self.max_queue_size - counts.queued,
			at_capacity: counts.queued >= self.max_queue_size,
		}
	}
}

/// RAII handle for one active execution slot.
pub struct ActiveSlot {
	gate: Arc<CapacityGate>,
}

impl Drop for ActiveSlot {
	fn drop(&mut self) {
		self.gate.on_finish();
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn admission_respects_queue_bound() {
		let gate = CapacityGate::new(2, 1);

		assert!(gate.try_admit());
		assert!(!gate.try_admit());

		let snapshot = gate.snapshot();
		assert_eq!(snapshot.queued_jobs, 1);
		assert_eq!(snapshot.available_capacity, 0);
		assert!(snapshot.at_capacity);
	}

	#[test]
	fn start_and_finish_move_counters() {
		let gate = Arc::new(CapacityGate::new(2, 4));
		assert!(gate.try_admit());

		let slot = gate.start();
		let snapshot = gate.snapshot();
		assert_eq!(snapshot.queued_jobs, 0);
		assert_eq!(snapshot.active_jobs, 1);

		drop(slot);
		assert_eq!(gate.snapshot().active_jobs, 0);
	}

	#[test]
	fn slot_released_even_on_panic() {
		let gate = Arc::new(CapacityGate::new(1, 1));
		assert!(gate.try_admit());

		let gate_clone = Arc::clone(&gate);
		let result = std::panic::catch_unwind(move || {
			let _slot = gate_clone.start();
			panic!("job blew up");
		});
		assert!(result.is_err());
		assert_eq!(gate.snapshot().active_jobs, 0);
	}

	#[test]
	fn cancelled_admission_frees_the_slot() {
		let gate = CapacityGate::new(1, 1);
		assert!(gate.try_admit());
		assert!(gate.is_full());

		gate.cancel_admission();
		assert!(!gate.is_full());
		assert!(gate.try_admit());
	}

	#[test]
	fn rejected_admission_then_release_then_accept() {
		let gate = Arc::new(CapacityGate::new(1, 1));

		assert!(gate.try_admit());
		assert!(!gate.try_admit());

		let slot = gate.start();
		// Queue slot freed once the job starts; a new submission fits.
		assert!(gate.try_admit());
		drop(slot);
	}

	#[tokio::test]
	async fn concurrent_admission_never_overshoots() {
		let gate = Arc::new(CapacityGate::new(4, 16));

		let mut handles = Vec::new();
		for _ in 0..64 {
			let gate = Arc::clone(&gate);
			handles.push(tokio::spawn(async move { gate.try_admit() }));
		}

		let mut admitted = 0;
		for handle in handles {
			if handle.await.unwrap() {
				admitted += 1;
			}
		}

		assert_eq!(admitted, 16);
		let snapshot = gate.snapshot();
		assert_eq!(snapshot.queued_jobs, 16);
		assert!(snapshot.queued_jobs <= snapshot.max_queue_size);
	}
}
