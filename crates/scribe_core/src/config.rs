use clap::Args;

/// Orchestration settings, overridable from the environment.
#[derive(Args, Debug, Clone)]
pub struct Config {
	/// Maximum number of concurrent transcription workers
	#[arg(long, env = "MAX_CONCURRENT_WORKERS", default_value = "4")]
	pub max_workers: usize,

	/// Maximum number of jobs that can be queued
	#[arg(long, env = "MAX_QUEUE_SIZE", default_value = "100")]
	pub max_queue_size: usize,

	/// Maximum age of completed jobs before cleanup, in hours
	#[arg(long, env = "JOB_CLEANUP_MAX_AGE_HOURS", default_value = "24")]
	pub job_max_age_hours: u32,

	/// Minimum buffered bytes before a streaming transcription call
	#[arg(long, env = "STREAM_MIN_CHUNK_SIZE", default_value = "102400")]
	pub stream_flush_threshold: usize,

	/// Hard cap on buffered streaming audio, in bytes
	#[arg(long, env = "STREAM_MAX_BUFFER_SIZE", default_value = "10485760")]
	pub stream_max_buffer: usize,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			max_workers: 4,
			max_queue_size: 100,
			job_max_age_hours: 24,
			stream_flush_threshold: 100 * 1024,
			stream_max_buffer: 10 * 1024 * 1024,
		}
	}
}

impl Config {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		if self.max_workers < 1 {
			return Err("max_workers must be at least 1".to_string());
		}

		if self.max_queue_size < 1 {
			return Err("max_queue_size must be at least 1".to_string());
		}

		if self.job_max_age_hours < 1 {
			return Err("job_max_age_hours must be at least 1".to_string());
		}

		if self.stream_flush_threshold < 1 {
			return Err("stream_flush_threshold must be greater than 0".to_string());
		}

		if self.stream_max_buffer < self.stream_flush_threshold {
			return Err(format!(
				"stream_max_buffer ({}) must be >= stream_flush_threshold ({})",
				self.stream_max_buffer, self.stream_flush_threshold
			));
		}

		Ok(())
	}
}
