use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::error::NotificationError;
use crate::models::Notification;

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<(), NotificationError>;

    /// Newest first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, NotificationError>;

    /// Fails with `NotFound` when the notification does not belong to `user_id`.
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Notification, NotificationError>;
}

#[derive(Default)]
pub struct InMemoryNotificationStore {
    notifications: RwLock<Vec<Notification>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Notification> {
        self.notifications.read().await.clone()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.notifications.write().await.push(notification.clone());
        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, NotificationError> {
        let notifications = self.notifications.read().await;
        // Insertion order is creation order; walking backwards yields newest first
        Ok(notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Notification, NotificationError> {
        let mut notifications = self.notifications.write().await;
        let notification = notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or(NotificationError::NotFound)?;
        notification.read = true;
        Ok(notification.clone())
    }
}

pub struct SupabaseNotificationStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseNotificationStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn parse_rows(rows: Vec<Value>) -> Result<Vec<Notification>, NotificationError> {
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(NotificationError::from))
            .collect()
    }
}

#[async_trait]
impl NotificationStore for SupabaseNotificationStore {
    async fn insert(&self, notification: &Notification) -> Result<(), NotificationError> {
        debug!("Persisting notification {} for user {}", notification.id, notification.user_id);
        self.supabase
            .service_execute(
                Method::POST,
                "/rest/v1/notifications",
                Some(serde_json::to_value(notification)?),
            )
            .await
            .map_err(|e| NotificationError::Store(e.to_string()))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        limit: usize,
    ) -> Result<Vec<Notification>, NotificationError> {
        let mut path = format!(
            "/rest/v1/notifications?user_id=eq.{}&order=created_at.desc&limit={}",
            user_id, limit
        );
        if unread_only {
            path.push_str("&read=eq.false");
        }

        let rows: Vec<Value> = self
            .supabase
            .service_request(Method::GET, &path, None, false)
            .await
            .map_err(|e| NotificationError::Store(e.to_string()))?;

        Self::parse_rows(rows)
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Notification, NotificationError> {
        let path = format!("/rest/v1/notifications?id=eq.{}&user_id=eq.{}", id, user_id);
        let rows: Vec<Value> = self
            .supabase
            .service_request(Method::PATCH, &path, Some(json!({ "read": true })), true)
            .await
            .map_err(|e| NotificationError::Store(e.to_string()))?;

        Self::parse_rows(rows)?
            .into_iter()
            .next()
            .ok_or(NotificationError::NotFound)
    }
}
