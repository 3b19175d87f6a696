use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Serialize)]
struct StreamMessage {
	#[serde(rename = "type")]
	kind: &'static str,
	text: String,
	timestamp: f64,
}

pub async fn stream_transcription(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
	ws.on_upgrade(move |socket| handle_stream(socket, state))
}

/// One WebSocket connection is one streaming session.
///
/// Binary frames append to the session buffer; threshold crossings push
/// `partial` messages. An empty binary frame is the client's end-of-stream
/// marker: the session is finalized and the `final` message delivered
/// before the server closes. Closing the connection outright finalizes
/// too, with the `final` message best-effort. Per-chunk failures (overflow,
/// inference) are reported as `error` messages and leave the channel open
/// so the client decides whether to continue.
async fn handle_stream(mut socket: WebSocket, state: AppState) {
	let session_id = Uuid::new_v4().to_string();

	if !state.service.is_ready().await {
		let _ = send(&mut socket, "error", "transcription model is not ready".to_string()).await;
		let _ = socket.close().await;
		return;
	}

	info!(session_id, "streaming session opened");

	while let Some(message) = socket.recv().await {
		let Ok(message) = message else { break };
		match message {
			Message::Binary(chunk) => {
				if chunk.is_empty() {
					break;
				}
				match state.service.transcribe_stream_chunk(&session_id, &chunk).await {
					Ok(Some(text)) => {
						if send(&mut socket, "partial", text).await.is_err() {
							break;
						}
					}
					Ok(None) => {}
					Err(err) => {
						warn!(session_id, error = %err, "stream chunk failed");
						if send(&mut socket, "error", err.to_string()).await.is_err() {
							break;
						}
					}
				}
			}
			Message::Close(_) => break,
			Message::Text(_) | Message::Ping(_) | Message::Pong(_) => {}
		}
	}

	// End of stream, by marker or disconnect; flush what remains. Delivery
	// of the final message is best-effort once the peer is gone.
	match state.service.finalize_stream(&session_id).await {
		Ok(text) => {
			let _ = send(&mut socket, "final", text).await;
		}
		Err(err) => {
			warn!(session_id, error = %err, "stream finalization failed");
			let _ = send(&mut socket, "error", err.to_string()).await;
		}
	}
	let _ = socket.close().await;

	info!(session_id, "streaming session closed");
}

async fn send(socket: &mut WebSocket, kind: &'static str, text: String) -> Result<(), axum::Error> {
	let message = StreamMessage {
		kind,
		text,
		timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
	};
	let payload = serde_json::to_string(&message).unwrap_or_default();
	socket.send(Message::Text(payload)).await
}
