// libs/appointment-cell/src/services/lifecycle.rs
use std::fmt;

use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Reschedule,
    Cancel,
    Complete,
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleAction::Reschedule => write!(f, "rescheduled"),
            LifecycleAction::Cancel => write!(f, "cancelled"),
            LifecycleAction::Complete => write!(f, "completed"),
        }
    }
}

/// `scheduled` is the only state with outgoing edges.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Returns the status the appointment ends up in.
    pub fn validate_transition(
        &self,
        current_status: AppointmentStatus,
        action: LifecycleAction,
    ) -> Result<AppointmentStatus, AppointmentError> {
        debug!("Validating {:?} from {}", action, current_status);

        if !self.get_valid_actions(current_status).contains(&action) {
            warn!("Invalid lifecycle action attempted: {:?} on {}", action, current_status);
            let message = match (current_status, action) {
                (AppointmentStatus::Completed, LifecycleAction::Complete) => "Already completed".to_string(),
                _ => format!("Only scheduled appointments can be {}", action),
            };
            return Err(AppointmentError::InvalidState(message));
        }

        Ok(match action {
            LifecycleAction::Reschedule => AppointmentStatus::Scheduled,
            LifecycleAction::Cancel => AppointmentStatus::Cancelled,
            LifecycleAction::Complete => AppointmentStatus::Completed,
        })
    }

    pub fn get_valid_actions(&self, current_status: AppointmentStatus) -> Vec<LifecycleAction> {
        match current_status {
            AppointmentStatus::Scheduled => vec![
                LifecycleAction::Reschedule,
                LifecycleAction::Cancel,
                LifecycleAction::Complete,
            ],
            // Terminal states
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
