mod audio;
mod config;
mod engine;
mod error;
mod handlers;
mod routes;
mod ws;

use crate::audio::FfmpegNormalizer;
use crate::config::AppConfig;
use crate::engine::WhisperCliEngine;
use anyhow::Result;
use clap::Parser;
use scribe_core::{TracingSink, TranscriptionService};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<TranscriptionService>,
	pub config: Arc<AppConfig>,
}

fn init_tracing(log_json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	if log_json {
		tracing_subscriber::fmt().with_env_filter(filter).json().flatten_event(true).init();
	} else {
		tracing_subscriber::fmt().with_env_filter(filter).init();
	}
}

async fn reap_loop(service: Arc<TranscriptionService>, every: Duration, max_age: chrono::Duration, cancel: CancellationToken) {
	let mut ticker = tokio::time::interval(every);
	// The immediate first tick would sweep an empty registry.
	ticker.tick().await;
	loop {
		tokio::select! {
			() = cancel.cancelled() => break,
			_ = ticker.tick() => {
				let removed = service.reap_older_than(max_age).await;
				if removed > 0 {
					info!(removed, "job reaper sweep");
				}
			}
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	dotenvy::dotenv().ok();
	let config = AppConfig::parse();
	config.validate().map_err(anyhow::Error::msg)?;
	init_tracing(config.log_json);

	let normalizer = Arc::new(FfmpegNormalizer::new(config.ffmpeg_bin.clone()));
	let engine = Arc::new(WhisperCliEngine::new(config.whisper_bin.clone(), config.model_path.clone(), config.language.clone()));
	let service = Arc::new(TranscriptionService::new(&config.core, normalizer, engine, Arc::new(TracingSink)));

	if let Err(err) = service.initialize().await {
		// Serve anyway; submissions get NOT_READY until the model shows up
		// and a later initialize succeeds.
		warn!(error = %err, "model warm-up failed");
	}

	let shutdown = CancellationToken::new();
	let reaper = tokio::spawn(reap_loop(
		Arc::clone(&service),
		Duration::from_secs(config.reap_interval_secs),
		chrono::Duration::hours(i64::from(config.core.job_max_age_hours)),
		shutdown.clone(),
	));

	let addr = format!("{}:{}", config.host, config.port);
	let state = AppState {
		service,
		config: Arc::new(config),
	};
	let app = routes::router(state);

	let listener = TcpListener::bind(&addr).await?;
	info!(addr = %listener.local_addr()?, "listening");
	axum::serve(listener, app)
		.with_graceful_shutdown(async {
			let _ = tokio::signal::ctrl_c().await;
		})
		.await?;

	shutdown.cancel();
	let _ = reaper.await;
	Ok(())
}
