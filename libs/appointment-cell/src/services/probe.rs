use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use reminder_cell::{AppointmentProbe, ReminderError};

use crate::models::AppointmentStatus;
use crate::services::store::AppointmentStore;

/// Answers the reminder worker from the appointment store. A missing appointment
/// counts as not scheduled.
pub struct StoreAppointmentProbe {
    store: Arc<dyn AppointmentStore>,
}

impl StoreAppointmentProbe {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AppointmentProbe for StoreAppointmentProbe {
    async fn is_scheduled(&self, appointment_id: Uuid) -> Result<bool, ReminderError> {
        let appointment = self
            .store
            .find_by_id(appointment_id)
            .await
            .map_err(|e| ReminderError::ProbeError(e.to_string()))?;

        Ok(matches!(appointment, Some(a) if a.status == AppointmentStatus::Scheduled))
    }
}
