use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Redis connection error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    PoolError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Appointment lookup failed: {0}")]
    ProbeError(String),

    #[error("Patient lookup failed: {0}")]
    DirectoryError(String),
}
