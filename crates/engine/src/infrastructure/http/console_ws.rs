//! WebSocket console subscription.
//!
//! Each connection registers with the fan-out hub and forwards framed chunks
//! until the session closes, the client goes away, or the subscriber falls
//! behind and the hub drops it. Keep-alive pings run on a 54 s cadence with
//! a 60 s read-idle deadline and a 10 s write deadline.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval_at, timeout, Instant};
use uuid::Uuid;

use simbench_domain::SessionId;
use simbench_shared::ConsoleMessage;

use crate::infrastructure::http::error::ApiError;
use crate::state::AppState;

const PING_INTERVAL: Duration = Duration::from_secs(54);
const READ_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn console_ws(
    ws: WebSocketUpgrade,
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let session_id = SessionId::from_uuid(id);
    // Refuse the upgrade for unknown sessions.
    state.sessions.get(session_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, session_id)))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, session_id: SessionId) {
    let (mut sink, mut stream) = socket.split();
    let (subscriber_id, mut frames) = state.console.subscribe(session_id).await;
    tracing::debug!(session_id = %session_id, subscriber_id = %subscriber_id, "console client connected");

    let mut ping = interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
    let mut last_read = Instant::now();

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(message) = frame else {
                    // Dropped by the hub (slow consumer) or hub shutdown.
                    break;
                };
                let Ok(json) = serde_json::to_string(&message) else {
                    continue;
                };
                match timeout(WRITE_TIMEOUT, sink.send(Message::Text(json.into()))).await {
                    Ok(Ok(())) => {
                        if matches!(message, ConsoleMessage::Closed { .. }) {
                            break;
                        }
                    }
                    _ => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        last_read = Instant::now();
                    }
                    Some(Err(_)) => break,
                }
            }
            _ = ping.tick() => {
                if last_read.elapsed() > READ_IDLE_TIMEOUT {
                    tracing::debug!(session_id = %session_id, "console client idle; dropping");
                    break;
                }
                match timeout(WRITE_TIMEOUT, sink.send(Message::Ping(Vec::new().into()))).await {
                    Ok(Ok(())) => {}
                    _ => break,
                }
            }
        }
    }

    state.console.unsubscribe(session_id, subscriber_id).await;
    tracing::debug!(session_id = %session_id, subscriber_id = %subscriber_id, "console client disconnected");
}
