use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Path, Query, State,
    },
    response::Response,
    Json,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Caller, User};
use shared_models::error::AppError;
use shared_utils::extractor::caller_from_token;

use crate::models::{InboxQuery, WebSocketQuery};
use crate::router::NotificationState;
use crate::services::RealtimeHub;

#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<Arc<NotificationState>>,
    Extension(user): Extension<User>,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;

    let notifications = state
        .notifications
        .inbox(caller.id, query.unread.unwrap_or(false), query.limit)
        .await?;

    Ok(Json(json!({
        "success": true,
        "notifications": notifications,
        "total": notifications.len()
    })))
}

#[axum::debug_handler]
pub async fn mark_notification_read(
    State(state): State<Arc<NotificationState>>,
    Extension(user): Extension<User>,
    Path(notification_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let notification = state.notifications.mark_read(notification_id, caller.id).await?;

    Ok(Json(json!({
        "success": true,
        "notification": notification
    })))
}

/// Browsers cannot set headers on a WebSocket upgrade, so the token travels as `?token=`.
pub async fn notifications_socket(
    State(state): State<Arc<NotificationState>>,
    Query(query): Query<WebSocketQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    let caller = caller_from_token(&query.token, &state.config)?;
    let hub = state.notifications.hub().clone();

    Ok(ws.on_upgrade(move |socket| stream_notifications(socket, hub, caller.id)))
}

async fn stream_notifications(socket: WebSocket, hub: RealtimeHub, user_id: Uuid) {
    info!("Push socket opened for user {}", user_id);

    let (mut sender, mut receiver) = socket.split();
    let mut updates = hub.subscribe(user_id).await;

    let mut send_task = tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(message) => {
                    if sender.send(Message::Text(message.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Missed pushes are still in the inbox
                    warn!("Push socket for {} lagged, skipped {} messages", user_id, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            if let Message::Close(_) = message {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {
            send_task.abort();
            // The receiver must be dropped before checking for listeners
            let _ = send_task.await;
        }
    }

    hub.release(user_id).await;
    debug!("Push socket closed for user {}", user_id);
}
