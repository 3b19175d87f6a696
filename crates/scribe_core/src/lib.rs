//! Orchestration core for a transcription service: a thread-safe job
//! registry, bounded admission, a fixed worker pool, and session-scoped
//! streaming buffers. Speech-to-text itself is a collaborator behind the
//! [`InferenceEngine`] trait; this crate owns scheduling and state.

pub mod capacity;
pub mod config;
pub mod error;
pub mod job;
pub mod pool;
pub mod service;
pub mod stream;
pub mod traits;

pub use capacity::{CapacityGate, CapacitySnapshot};
pub use config::Config;
pub use error::{Result, ScribeError};
pub use job::{Job, JobStatus, JobStore};
pub use pool::{JobHandler, WorkUnit, WorkerPool};
pub use service::TranscriptionService;
pub use stream::{StreamBuffer, StreamTranscriber};
pub use traits::{AudioNormalizer, InferenceEngine, JobEvent, LifecycleSink, TracingSink};
