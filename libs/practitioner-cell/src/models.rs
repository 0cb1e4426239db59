use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::error::AppError;
use shared_utils::policy::PolicyDenial;

pub const DEFAULT_BLOCK_REASON: &str = "Blocked";

// ==============================================================================
// TIME BLOCKS
// ==============================================================================

/// A stretch of a practitioner's time that is unavailable for booking. Never edited in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimeBlock {
    pub id: Uuid,
    pub practitioner_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl TimeBlock {
    pub fn new(
        practitioner_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        reason: Option<String>,
        created_by: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            practitioner_id,
            start_time,
            end_time,
            reason: reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BLOCK_REASON.to_string()),
            created_by,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTimeBlockRequest {
    /// Defaults to the caller when the caller is a practitioner.
    pub practitioner_id: Option<Uuid>,
    pub start: String,
    pub end: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeBlockQuery {
    pub practitioner_id: Option<Uuid>,
    pub from: Option<String>,
    pub to: Option<String>,
}

// ==============================================================================
// ASSIGNMENT REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentStatus::Pending => write!(f, "pending"),
            AssignmentStatus::Approved => write!(f, "approved"),
            AssignmentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A patient asking to be placed with a practitioner. At most one pending per pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignmentRequest {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub message: String,
    pub status: AssignmentStatus,
    pub created_at: DateTime<Utc>,
}

impl AssignmentRequest {
    pub fn new(patient_id: Uuid, practitioner_id: Uuid, message: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            practitioner_id,
            message: message.unwrap_or_default(),
            status: AssignmentStatus::Pending,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssignmentRequest {
    pub practitioner_id: Uuid,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RejectAssignmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DirectAssignmentRequest {
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum PractitionerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(String),
}

impl From<PolicyDenial> for PractitionerError {
    fn from(denial: PolicyDenial) -> Self {
        PractitionerError::Forbidden(denial.to_string())
    }
}

impl From<anyhow::Error> for PractitionerError {
    fn from(err: anyhow::Error) -> Self {
        PractitionerError::Store(err.to_string())
    }
}

impl From<PractitionerError> for AppError {
    fn from(err: PractitionerError) -> Self {
        match err {
            PractitionerError::InvalidInput(msg) => AppError::ValidationError(msg),
            PractitionerError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            PractitionerError::Forbidden(msg) => AppError::Forbidden(msg),
            PractitionerError::InvalidState(msg) => AppError::BadRequest(msg),
            PractitionerError::Conflict(msg) => AppError::Conflict(msg),
            PractitionerError::Store(msg) => AppError::Database(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_block_reason_defaults() {
        let start = Utc::now();
        let block = TimeBlock::new(Uuid::new_v4(), start, start + Duration::hours(1), Some("  ".into()), Uuid::new_v4());
        assert_eq!(block.reason, DEFAULT_BLOCK_REASON);
    }

    #[test]
    fn test_error_mapping() {
        let err: AppError = PractitionerError::NotFound("Practitioner").into();
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Not Found: Practitioner not found");

        let err: AppError = PractitionerError::Conflict("pending".into()).into();
        assert_eq!(err.status_code(), axum::http::StatusCode::CONFLICT);
    }
}
