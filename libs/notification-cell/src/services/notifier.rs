use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::NotificationError;
use crate::models::{DeliveryReport, Notification, DEFAULT_INBOX_LIMIT, NOTIFICATION_EVENT};
use crate::services::realtime::RealtimeHub;
use crate::services::store::NotificationStore;

/// Inbox persistence plus live push. The inbox row is the durable record; the push
/// only spares connected clients a refetch.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    hub: RealtimeHub,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, hub: RealtimeHub) -> Self {
        Self { store, hub }
    }

    pub fn hub(&self) -> &RealtimeHub {
        &self.hub
    }

    /// Never fails. Store or push problems are logged and reflected in the report only.
    #[instrument(skip(self, message, data), fields(user_id = %user_id))]
    pub async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        data: Option<Value>,
    ) -> DeliveryReport {
        let notification = Notification::new(user_id, title, message, data);

        let persisted = match self.store.insert(&notification).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist notification '{}' for {}: {}", title, user_id, e);
                false
            }
        };

        let pushed = match self
            .hub
            .emit(user_id, NOTIFICATION_EVENT, notification.push_payload())
            .await
        {
            Ok(delivered) => delivered,
            Err(e) => {
                warn!("Failed to push notification '{}' to {}: {}", title, user_id, e);
                false
            }
        };

        debug!("Notification '{}' persisted={} pushed={}", title, persisted, pushed);

        DeliveryReport {
            notification: persisted.then_some(notification),
            pushed,
        }
    }

    pub async fn inbox(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Notification>, NotificationError> {
        let limit = limit.unwrap_or(DEFAULT_INBOX_LIMIT).clamp(1, DEFAULT_INBOX_LIMIT);
        self.store.list_for_user(user_id, unread_only, limit).await
    }

    pub async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Notification, NotificationError> {
        self.store.mark_read(id, user_id).await
    }
}
