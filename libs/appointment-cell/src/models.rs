// libs/appointment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use practitioner_cell::PractitionerError;
use shared_models::directory::{Therapy, UserSummary};
use shared_models::error::AppError;
use shared_utils::policy::Ownership;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub therapy_id: Uuid,
    pub start_time: DateTime<Utc>,
    /// Always `start_time` plus the therapy duration.
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub progress: Vec<ProgressEntry>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(
        patient_id: Uuid,
        practitioner_id: Uuid,
        therapy_id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        notes: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            patient_id,
            practitioner_id,
            therapy_id,
            start_time,
            end_time,
            status: AppointmentStatus::Scheduled,
            progress: Vec::new(),
            notes,
            created_at: Utc::now(),
        }
    }

    pub fn ownership(&self) -> Ownership {
        Ownership::appointment(self.patient_id, self.practitioner_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Written once, when the session is completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEntry {
    pub author_id: Uuid,
    pub notes: String,
    #[serde(default)]
    pub metrics: Value,
    pub created_at: DateTime<Utc>,
}

/// An appointment with its parties and therapy resolved, as returned by GetById.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub patient: Option<UserSummary>,
    pub practitioner: Option<UserSummary>,
    pub therapy: Option<Therapy>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub therapy_id: Uuid,
    pub start_time: String,
    /// Falls back to the patient's assigned practitioner.
    pub practitioner_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityRequest {
    pub practitioner_id: Uuid,
    pub start_time: String,
    pub therapy_id: Option<Uuid>,
    pub duration_minutes: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityResponse {
    pub available: bool,
    pub message: String,
}

impl AvailabilityResponse {
    pub fn from_free(available: bool) -> Self {
        Self {
            available,
            message: if available { "Available" } else { "Not available" }.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_start_time: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub progress_notes: Option<String>,
    pub metrics: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleQuery {
    pub practitioner_id: Option<Uuid>,
    pub from: Option<String>,
    pub to: Option<String>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("No practitioner specified or assigned")]
    NoPractitionerAvailable,

    #[error("{0}")]
    InvalidRole(String),

    #[error("Practitioner not found")]
    InvalidTarget,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("Slot not available for selected practitioner")]
    SlotConflict,

    #[error("Store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for AppointmentError {
    fn from(err: anyhow::Error) -> Self {
        AppointmentError::Store(err.to_string())
    }
}

impl From<PractitionerError> for AppointmentError {
    fn from(err: PractitionerError) -> Self {
        match err {
            PractitionerError::InvalidInput(msg) => AppointmentError::InvalidInput(msg),
            PractitionerError::NotFound(what) => AppointmentError::NotFound(what),
            PractitionerError::Forbidden(msg) => AppointmentError::Forbidden(msg),
            other => AppointmentError::Store(other.to_string()),
        }
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        let message = err.to_string();
        match err {
            AppointmentError::InvalidInput(msg) => AppError::ValidationError(msg),
            AppointmentError::NotFound(_) | AppointmentError::InvalidTarget => AppError::NotFound(message),
            AppointmentError::NoPractitionerAvailable | AppointmentError::InvalidState(_) => {
                AppError::BadRequest(message)
            }
            AppointmentError::InvalidRole(_) | AppointmentError::Forbidden(_) => AppError::Forbidden(message),
            AppointmentError::SlotConflict => AppError::Conflict(message),
            AppointmentError::Store(msg) => AppError::Database(msg),
        }
    }
}
