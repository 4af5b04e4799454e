use axum::{
    extract::{ws::{Message, WebSocket, WebSocketUpgrade}, State},
    http::HeaderMap,
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{interval, timeout, Duration};

use crate::{
    api::{require_user, AppState},
    constants::{WS_CLIENT_TIMEOUT_SECS, WS_HEARTBEAT_INTERVAL_SECS},
    error::Result,
};

fn connected_payload() -> String {
    serde_json::json!({
        "event": "connected",
        "message": "Connected to memory game events"
    })
    .to_string()
}

/// WebSocket handler for game push events
pub async fn handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Response> {
    let user_id = require_user(&headers)?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: String) {
    let (mut sender, mut receiver) = socket.split();
    let notifications = state.games.notifications().clone();
    let mut rx = notifications.register_connection(&user_id).await;

    let _ = sender.send(Message::Text(connected_payload().into())).await;

    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = interval(Duration::from_secs(WS_HEARTBEAT_INTERVAL_SECS));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
                result = rx.recv() => {
                    match result {
                        Ok(event) => {
                            let json = match serde_json::to_string(&event) {
                                Ok(json) => json,
                                Err(err) => {
                                    tracing::warn!("Cannot encode {} event: {}", event.name(), err);
                                    continue;
                                }
                            };
                            if sender.send(Message::Text(json.into())).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("WebSocket consumer lagged, {} events dropped", skipped);
                        }
                        Err(_) => break,
                    }
                }
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        loop {
            let next_msg = timeout(Duration::from_secs(WS_CLIENT_TIMEOUT_SECS), receiver.next()).await;
            let msg = match next_msg {
                Ok(Some(Ok(msg))) => msg,
                Ok(Some(Err(_))) | Ok(None) => break,
                Err(_) => {
                    tracing::info!("WebSocket client timeout");
                    break;
                }
            };

            match msg {
                Message::Close(_) => {
                    tracing::info!("Client disconnected");
                    break;
                }
                Message::Text(text) => {
                    tracing::debug!("Ignoring client message: {}", text.as_str());
                }
                _ => {}
            }
        }
    });

    let send_finished = tokio::select! {
        _ = &mut send_task => true,
        _ = &mut recv_task => false,
    };
    if send_finished {
        recv_task.abort();
    } else {
        send_task.abort();
        // the aborted task must drop its receiver before the idle check
        let _ = send_task.await;
    }

    notifications.unregister_connection(&user_id).await;
    tracing::info!("WebSocket connection closed for user: {}", user_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connected_payload_has_event() {
        let payload = connected_payload();
        assert!(payload.contains("\"event\":\"connected\""));
    }
}
