use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::error::NotificationError;
use crate::models::PushMessage;

pub type PushSender = broadcast::Sender<String>;
pub type PushReceiver = broadcast::Receiver<String>;

const CHANNEL_CAPACITY: usize = 100;

/// Per-user push channels. Every open socket of a user subscribes to the same channel.
#[derive(Clone, Default)]
pub struct RealtimeHub {
    channels: Arc<RwLock<HashMap<Uuid, PushSender>>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, user_id: Uuid) -> PushReceiver {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);

        debug!("User {} subscribed to push channel", user_id);
        sender.subscribe()
    }

    /// Drop the user's channel once no socket is listening anymore.
    pub async fn release(&self, user_id: Uuid) {
        let mut channels = self.channels.write().await;
        if let Some(sender) = channels.get(&user_id) {
            if sender.receiver_count() == 0 {
                channels.remove(&user_id);
                debug!("Removed push channel for user {}", user_id);
            }
        }
    }

    /// Returns whether at least one live socket received the message.
    pub async fn emit(&self, user_id: Uuid, event: &str, payload: Value) -> Result<bool, NotificationError> {
        let message = serde_json::to_string(&PushMessage {
            event: event.to_string(),
            payload,
            sent_at: Utc::now(),
        })?;

        let channels = self.channels.read().await;
        match channels.get(&user_id) {
            Some(sender) => match sender.send(message) {
                Ok(receivers) => Ok(receivers > 0),
                Err(_) => {
                    debug!("Push channel for user {} has no listeners", user_id);
                    Ok(false)
                }
            },
            None => Ok(false),
        }
    }

    pub async fn is_connected(&self, user_id: Uuid) -> bool {
        self.channels
            .read()
            .await
            .get(&user_id)
            .map(|sender| sender.receiver_count() > 0)
            .unwrap_or(false)
    }

    pub async fn connected_users(&self) -> Vec<Uuid> {
        self.channels
            .read()
            .await
            .iter()
            .filter(|(_, sender)| sender.receiver_count() > 0)
            .map(|(user_id, _)| *user_id)
            .collect()
    }
}
