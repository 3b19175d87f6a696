use async_trait::async_trait;
use scribe_core::{InferenceEngine, Result, ScribeError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;
use tracing::{error, info};
use uuid::Uuid;

/// Speech-to-text backed by a whisper.cpp style CLI.
///
/// Each transcription is one subprocess invocation; the engine itself holds
/// no audio state, which is what the streaming buffer layer relies on.
pub struct WhisperCliEngine {
	bin: String,
	model_path: PathBuf,
	language: String,
	ready: AtomicBool,
}

impl WhisperCliEngine {
	#[must_use]
	pub fn new(bin: String, model_path: PathBuf, language: String) -> Self {
		Self {
			bin,
			model_path,
			language,
			ready: AtomicBool::new(false),
		}
	}
}

#[async_trait]
impl InferenceEngine for WhisperCliEngine {
	async fn is_ready(&self) -> bool {
		self.ready.load(Ordering::SeqCst)
	}

	async fn warm_up(&self) -> Result<()> {
		match tokio::fs::metadata(&self.model_path).await {
			Ok(meta) if meta.is_file() => {
				self.ready.store(true, Ordering::SeqCst);
				info!(model = %self.model_path.display(), "whisper model available");
				Ok(())
			}
			_ => {
				error!(model = %self.model_path.display(), "whisper model file missing");
				Err(ScribeError::ModelNotReady)
			}
		}
	}

	async fn transcribe_path(&self, audio: &Path) -> Result<String> {
		if !self.ready.load(Ordering::SeqCst) {
			return Err(ScribeError::ModelNotReady);
		}

		let output = Command::new(&self.bin)
			.arg("-m")
			.arg(&self.model_path)
			.arg("-l")
			.arg(&self.language)
			.arg("-nt")
			.arg("-f")
			.arg(audio)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.output()
			.await
			.map_err(|err| ScribeError::InferenceFailed(format!("failed to launch {}: {err}", self.bin)))?;

		if !output.status.success() {
			return Err(ScribeError::InferenceFailed(String::from_utf8_lossy(&output.stderr).trim().to_string()));
		}

		Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
	}

	async fn transcribe_raw(&self, audio: &[u8]) -> Result<String> {
		let temp_path = std::env::temp_dir().join(format!("scribe-stream-{}.wav", Uuid::new_v4()));
		tokio::fs::write(&temp_path, audio)
			.await
			.map_err(|err| ScribeError::InferenceFailed(format!("failed to stage buffered audio: {err}")))?;

		let result = self.transcribe_path(&temp_path).await;

		if let Err(err) = tokio::fs::remove_file(&temp_path).await {
			tracing::warn!(path = %temp_path.display(), error = %err, "failed to remove staged audio");
		}

		result
	}
}
