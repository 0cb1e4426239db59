use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers::{list_notifications, mark_notification_read, notifications_socket};
use crate::services::NotificationService;

pub struct NotificationState {
    pub config: Arc<AppConfig>,
    pub notifications: NotificationService,
}

pub fn notification_routes(state: Arc<NotificationState>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(list_notifications))
        .route("/{id}/read", post(mark_notification_read))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    let socket_routes = Router::new().route("/ws", get(notifications_socket));

    Router::new()
        .merge(protected_routes)
        .merge(socket_routes)
        .with_state(state)
}
