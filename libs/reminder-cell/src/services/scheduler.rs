use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::error::ReminderError;
use crate::models::ReminderJob;
use crate::services::queue::ReminderQueue;

/// Arms one reminder per booking, `lead` before the session starts.
#[derive(Clone)]
pub struct ReminderScheduler {
    queue: Arc<dyn ReminderQueue>,
    lead: Duration,
}

impl ReminderScheduler {
    pub fn new(queue: Arc<dyn ReminderQueue>, lead: Duration) -> Self {
        Self { queue, lead }
    }

    pub fn from_config(queue: Arc<dyn ReminderQueue>, config: &AppConfig) -> Self {
        Self::new(queue, Duration::minutes(config.reminder_lead_minutes))
    }

    pub fn lead(&self) -> Duration {
        self.lead
    }

    /// `Ok(None)` when the reminder instant is already past; that is not an error.
    pub async fn arm(
        &self,
        appointment_id: Uuid,
        patient_id: Uuid,
        session_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<ReminderJob>, ReminderError> {
        let fire_at = session_start - self.lead;
        if fire_at <= now {
            debug!("Session {} starts too soon for a reminder", appointment_id);
            return Ok(None);
        }

        let job = ReminderJob::new(appointment_id, patient_id, session_start, fire_at);
        self.queue.schedule(&job).await?;

        info!("Reminder {} armed for appointment {} at {}", job.id, appointment_id, fire_at);
        Ok(Some(job))
    }
}
