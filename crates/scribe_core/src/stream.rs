use crate::error::{Result, ScribeError};
use crate::traits::InferenceEngine;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Accumulates raw audio chunks for one streaming session.
///
/// Append-only until drained; the hard cap is never exceeded, an append
/// that would cross it is rejected and leaves the buffer unchanged.
#[derive(Debug)]
pub struct StreamBuffer {
	chunks: Vec<Vec<u8>>,
	buffered: usize,
	hard_cap: usize,
}

impl StreamBuffer {
	#[must_use]
	pub fn new(hard_cap: usize) -> Self {
		Self {
			chunks: Vec::new(),
			buffered: 0,
			hard_cap,
		}
	}

	/// Append a chunk. Empty chunks are no-ops.
	pub fn append(&mut self, chunk: &[u8]) -> Result<()> {
		if chunk.is_empty() {
			return Ok(());
		}
		if self.buffered + chunk.len() > self.hard_cap {
			return Err(ScribeError::BufferOverflow {
				buffered: self.buffered,
				chunk: chunk.len(),
				max_bytes: self.hard_cap,
			});
		}
		self.buffered += chunk.len();
		self.chunks.push(chunk.to_vec());
		Ok(())
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.buffered
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.buffered == 0
	}

	/// One contiguous payload of everything buffered, leaving the buffer
	/// intact so a failed transcription can retry with the same data.
	#[must_use]
	pub fn payload(&self) -> Vec<u8> {
		self.chunks.concat()
	}

	pub fn clear(&mut self) {
		self.chunks.clear();
		self.buffered = 0;
	}
}

/// Session-scoped streaming transcription.
///
/// Each session id owns an independent buffer behind its own async mutex:
/// chunk delivery within a session is sequential (the transport serializes
/// it), while a slow inference call in one session never blocks another.
pub struct StreamTranscriber {
	engine: Arc<dyn InferenceEngine>,
	sessions: RwLock<HashMap<String, Arc<Mutex<StreamBuffer>>>>,
	flush_threshold: usize,
	hard_cap: usize,
}

impl StreamTranscriber {
	#[must_use]
	pub fn new(engine: Arc<dyn InferenceEngine>, flush_threshold: usize, hard_cap: usize) -> Self {
		Self {
			engine,
			sessions: RwLock::new(HashMap::new()),
			flush_threshold,
			hard_cap,
		}
	}

	async fn session(&self, session_id: &str) -> Arc<Mutex<StreamBuffer>> {
		if let Some(buffer) = self.sessions.read().await.get(session_id) {
			return Arc::clone(buffer);
		}
		let mut sessions = self.sessions.write().await;
		Arc::clone(
			sessions
				.entry(session_id.to_owned())
				.or_insert_with(|| Arc::new(Mutex::new(StreamBuffer::new(self.hard_cap)))),
		)
	}

	/// Append a chunk and opportunistically flush.
	///
	/// Returns `None` while the buffer is below the flush threshold. At or
	/// above it, invokes the engine once on the accumulated payload: on
	/// success the buffer is cleared and the partial text returned (an empty
	/// string is a valid "no speech" result); on failure the buffer is
	/// preserved so the caller can retry with the same audio.
	pub async fn push_chunk(&self, session_id: &str, chunk: &[u8]) -> Result<Option<String>> {
		let buffer = self.session(session_id).await;
		let mut buffer = buffer.lock().await;

		buffer.append(chunk)?;
		if buffer.len() < self.flush_threshold {
			debug!(session_id, buffered = buffer.len(), threshold = self.flush_threshold, "buffering audio chunk");
			return Ok(None);
		}

		info!(session_id, buffered = buffer.len(), "transcribing buffered audio");
		let text = self.engine.transcribe_raw(&buffer.payload()).await?;
		buffer.clear();
		Ok(Some(text))
	}

	/// Forced flush at session end, regardless of threshold.
	///
	/// An empty buffer returns an empty string without touching the engine.
	/// The buffer is cleared whether inference succeeds or not; there is no
	/// later retry window, so retaining the audio would only leak it. The
	/// session entry is dropped either way.
	pub async fn finalize(&self, session_id: &str) -> Result<String> {
		let buffer = self.session(session_id).await;
		let result = {
			let mut buffer = buffer.lock().await;
			if buffer.is_empty() {
				debug!(session_id, "no buffered audio to finalize");
				Ok(String::new())
			} else {
				info!(session_id, buffered = buffer.len(), "finalizing stream");
				let payload = buffer.payload();
				let result = self.engine.transcribe_raw(&payload).await;
				buffer.clear();
				result
			}
		};
		self.sessions.write().await.remove(session_id);
		result
	}

	/// Drop all buffered audio for an abandoned or restarted session.
	pub async fn reset(&self, session_id: &str) {
		if let Some(buffer) = self.sessions.write().await.remove(session_id) {
			let mut buffer = buffer.lock().await;
			debug!(session_id, discarded = buffer.len(), "stream buffer reset");
			buffer.clear();
		}
	}

	/// Bytes currently buffered for a session (0 for unknown sessions).
	pub async fn buffered_bytes(&self, session_id: &str) -> usize {
		match self.sessions.read().await.get(session_id) {
			Some(buffer) => buffer.lock().await.len(),
			None => 0,
		}
	}
}
