use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const REMINDER_TITLE: &str = "Reminder";
pub const REMINDER_EMAIL_SUBJECT: &str = "Session reminder";

/// A single-shot reminder, due at `fire_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderJob {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub session_start: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ReminderJob {
    pub fn new(appointment_id: Uuid, patient_id: Uuid, session_start: DateTime<Utc>, fire_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id,
            patient_id,
            session_start,
            fire_at,
            created_at: Utc::now(),
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Reminder: please fast 2 hours before your session at {}",
            self.session_start.to_rfc3339()
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReminderOutcome {
    Delivered { persisted: bool, pushed: bool, emailed: bool },
    /// Cancelled, completed or deleted since the reminder was armed.
    AppointmentInactive,
    PatientMissing,
}

#[derive(Debug, Clone)]
pub struct ReminderWorkerConfig {
    pub worker_id: String,
    pub poll_interval_secs: u64,
    pub batch_size: usize,
}

impl Default for ReminderWorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: "reminder-worker".to_string(),
            poll_interval_secs: shared_config::DEFAULT_REMINDER_POLL_INTERVAL_SECS,
            batch_size: 50,
        }
    }
}
