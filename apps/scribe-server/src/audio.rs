use async_trait::async_trait;
use scribe_core::{AudioNormalizer, Result, ScribeError};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

/// Audio containers accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
	Wav,
	Mp3,
	Ogg,
	M4a,
}

impl AudioFormat {
	pub const fn extension(self) -> &'static str {
		match self {
			Self::Wav => "wav",
			Self::Mp3 => "mp3",
			Self::Ogg => "ogg",
			Self::M4a => "m4a",
		}
	}
}

/// Identify the container from its magic bytes. M4A carries `ftyp` at
/// offset 4; the rest sign the first bytes directly.
pub fn detect_format(header: &[u8]) -> Option<AudioFormat> {
	if header.starts_with(b"RIFF") {
		return Some(AudioFormat::Wav);
	}
	if header.starts_with(b"OggS") {
		return Some(AudioFormat::Ogg);
	}
	if header.starts_with(b"ID3") || header.starts_with(&[0xff, 0xfb]) || header.starts_with(&[0xff, 0xf3]) || header.starts_with(&[0xff, 0xf2]) {
		return Some(AudioFormat::Mp3);
	}
	if header.len() >= 8 && &header[4..8] == b"ftyp" {
		return Some(AudioFormat::M4a);
	}
	None
}

/// Resamples uploads to 16 kHz mono WAV by shelling out to ffmpeg.
pub struct FfmpegNormalizer {
	ffmpeg_bin: String,
	sample_rate: u32,
}

impl FfmpegNormalizer {
	#[must_use]
	pub fn new(ffmpeg_bin: String) -> Self {
		Self { ffmpeg_bin, sample_rate: 16_000 }
	}
}

fn stderr_tail(stderr: &[u8]) -> String {
	let text = String::from_utf8_lossy(stderr);
	let trimmed = text.trim();
	match trimmed.char_indices().nth_back(300) {
		Some((idx, _)) => trimmed[idx..].to_string(),
		None => trimmed.to_string(),
	}
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
	async fn normalize(&self, source: &Path) -> Result<PathBuf> {
		let output_path = std::env::temp_dir().join(format!("scribe-norm-{}.wav", Uuid::new_v4()));
		debug!(source = %source.display(), output = %output_path.display(), "normalizing audio");

		let output = Command::new(&self.ffmpeg_bin)
			.arg("-y")
			.arg("-i")
			.arg(source)
			.arg("-ar")
			.arg(self.sample_rate.to_string())
			.arg("-ac")
			.arg("1")
			.arg(&output_path)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.output()
			.await
			.map_err(|err| ScribeError::ConversionFailed(format!("failed to launch {}: {err}", self.ffmpeg_bin)))?;

		if !output.status.success() {
			let _ = tokio::fs::remove_file(&output_path).await;
			return Err(ScribeError::ConversionFailed(stderr_tail(&output.stderr)));
		}

		info!(source = %source.display(), "audio normalized");
		Ok(output_path)
	}
}
