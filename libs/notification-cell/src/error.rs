use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Notification store error: {0}")]
    Store(String),

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<NotificationError> for AppError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound => AppError::NotFound("Notification not found".to_string()),
            NotificationError::Store(msg) => AppError::Database(msg),
            NotificationError::Email(msg) => AppError::ExternalService(msg),
            NotificationError::Serialization(e) => AppError::Internal(e.to_string()),
        }
    }
}
