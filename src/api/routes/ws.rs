//! WebSocket push channel.
//!
//! Each client receives lifecycle events as `{type, payload}` JSON frames
//! plus a `log:created` stream of the daemon's log lines. Slow clients lag
//! on their own broadcast receiver and lose the oldest frames; a failed
//! socket write closes the connection.

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::api::server::AppState;

/// Heartbeat ping interval.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// One frame on the push channel.
#[derive(Debug, Clone, Serialize)]
pub struct PushFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub payload: serde_json::Value,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/v1/ws", get(upgrade))
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.bus.subscribe();
    let mut logs = state.logs.subscribe();

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let frame = PushFrame {
                        frame_type: event.event.push_type(),
                        payload: event.payload,
                    };
                    if send_frame(&mut sender, &frame).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("push subscriber lagged, dropped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },

            log = logs.recv() => match log {
                Ok(log) => {
                    let frame = PushFrame {
                        frame_type: "log:created".to_string(),
                        payload: serde_json::Value::String(log.message),
                    };
                    if send_frame(&mut sender, &frame).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            },

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            message = receiver.next() => {
                match message {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(_)) => break,
                }
            }
        }
    }
}

async fn send_frame(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: &PushFrame,
) -> Result<(), ()> {
    let body = serde_json::to_string(frame).map_err(|_| ())?;
    sender.send(Message::Text(body.into())).await.map_err(|_| ())
}
