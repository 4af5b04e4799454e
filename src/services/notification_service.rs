use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::{constants::WS_CHANNEL_CAPACITY, models::PushEvent};

/// Per-user fan-out of push events to open websocket connections.
///
/// Delivery is at most once: events for a user with no live connection are
/// dropped, and nothing is acknowledged.
#[derive(Clone, Default)]
pub struct NotificationService {
    connections: Arc<RwLock<HashMap<String, broadcast::Sender<PushEvent>>>>,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn publish(&self, user_id: &str, event: PushEvent) {
        let connections = self.connections.read().await;
        match connections.get(user_id) {
            Some(sender) => {
                let event_name = event.name();
                if sender.send(event).is_err() {
                    tracing::debug!("No live receivers for {} ({})", user_id, event_name);
                }
            }
            None => {
                tracing::debug!(
                    "Dropping {} event for {}: not connected",
                    event.name(),
                    user_id
                );
            }
        }
    }

    pub async fn register_connection(&self, user_id: &str) -> broadcast::Receiver<PushEvent> {
        let mut connections = self.connections.write().await;
        if let Some(sender) = connections.get(user_id) {
            sender.subscribe()
        } else {
            let (tx, rx) = broadcast::channel(WS_CHANNEL_CAPACITY);
            connections.insert(user_id.to_string(), tx);
            rx
        }
    }

    /// Drops the user's channel once the last connection has gone away.
    pub async fn unregister_connection(&self, user_id: &str) {
        let mut connections = self.connections.write().await;
        let idle = connections
            .get(user_id)
            .map(|sender| sender.receiver_count() == 0)
            .unwrap_or(false);
        if idle {
            connections.remove(user_id);
        }
    }

    pub async fn connected_users(&self) -> usize {
        self.connections.read().await.len()
    }
}
