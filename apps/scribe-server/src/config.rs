use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "scribe-server")]
#[command(about = "Capacity-bounded audio transcription service", long_about = None)]
pub struct AppConfig {
	/// API host address
	#[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
	pub host: String,

	/// Port to expose the API
	#[arg(long, env = "API_PORT", default_value = "8000")]
	pub port: u16,

	/// Maximum audio upload size in megabytes
	#[arg(long, env = "MAX_FILE_SIZE_MB", default_value = "500")]
	pub max_file_size_mb: usize,

	/// Directory where uploaded audio waits for processing
	#[arg(long, env = "UPLOAD_DIR", default_value = "/tmp/scribe-uploads")]
	pub upload_dir: PathBuf,

	/// Path to the whisper model file
	#[arg(long, env = "WHISPER_MODEL_PATH", default_value = "models/ggml-base.bin")]
	pub model_path: PathBuf,

	/// Whisper CLI binary used for inference
	#[arg(long, env = "WHISPER_BIN", default_value = "whisper-cli")]
	pub whisper_bin: String,

	/// ffmpeg binary used for audio normalization
	#[arg(long, env = "FFMPEG_BIN", default_value = "ffmpeg")]
	pub ffmpeg_bin: String,

	/// Transcription language code
	#[arg(long, env = "TRANSCRIBE_LANGUAGE", default_value = "fa")]
	pub language: String,

	/// Seconds between job reaper sweeps
	#[arg(long, env = "JOB_REAP_INTERVAL_SECS", default_value = "3600")]
	pub reap_interval_secs: u64,

	/// Emit logs as JSON
	#[arg(long, env = "LOG_JSON")]
	pub log_json: bool,

	#[command(flatten)]
	pub core: scribe_core::Config,
}

impl AppConfig {
	/// Validate configuration values
	pub fn validate(&self) -> Result<(), String> {
		if self.max_file_size_mb < 1 {
			return Err("max_file_size_mb must be at least 1".to_string());
		}

		if self.reap_interval_secs == 0 {
			return Err("reap_interval_secs must be greater than 0".to_string());
		}

		self.core.validate()
	}

	pub const fn max_file_size_bytes(&self) -> usize {
		self.max_file_size_mb * 1024 * 1024
	}

	/// Model identifier reported by the health endpoint.
	pub fn model_name(&self) -> String {
		self
			.model_path
			.file_stem()
			.map_or_else(|| "unknown".to_string(), |stem| stem.to_string_lossy().into_owned())
	}
}
