use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tokio::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use notification_cell::{EmailMessage, EmailSender, NotificationService};
use shared_database::UserDirectory;

use crate::error::ReminderError;
use crate::models::{ReminderJob, ReminderOutcome, ReminderWorkerConfig, REMINDER_EMAIL_SUBJECT, REMINDER_TITLE};
use crate::services::queue::ReminderQueue;

/// Lets the worker ask whether an appointment is still worth reminding about.
#[async_trait]
pub trait AppointmentProbe: Send + Sync {
    async fn is_scheduled(&self, appointment_id: Uuid) -> Result<bool, ReminderError>;
}

pub struct ReminderWorker {
    config: ReminderWorkerConfig,
    queue: Arc<dyn ReminderQueue>,
    probe: Arc<dyn AppointmentProbe>,
    directory: Arc<dyn UserDirectory>,
    notifications: NotificationService,
    email: Arc<dyn EmailSender>,
    is_shutdown: RwLock<bool>,
}

impl ReminderWorker {
    pub fn new(
        config: ReminderWorkerConfig,
        queue: Arc<dyn ReminderQueue>,
        probe: Arc<dyn AppointmentProbe>,
        directory: Arc<dyn UserDirectory>,
        notifications: NotificationService,
        email: Arc<dyn EmailSender>,
    ) -> Self {
        Self {
            config,
            queue,
            probe,
            directory,
            notifications,
            email,
            is_shutdown: RwLock::new(false),
        }
    }

    /// Polls until [`shutdown`](Self::shutdown) is called.
    pub async fn start(&self) {
        info!("Starting reminder worker {}", self.config.worker_id);
        let poll_interval = Duration::from_secs(self.config.poll_interval_secs.max(1));

        loop {
            if *self.is_shutdown.read().await {
                debug!("Reminder worker {} received shutdown signal", self.config.worker_id);
                break;
            }

            match self.run_due(Utc::now()).await {
                Ok(0) => {}
                Ok(count) => debug!("Reminder worker handled {} jobs", count),
                Err(e) => error!("Reminder worker {} failed to claim jobs: {}", self.config.worker_id, e),
            }

            tokio::time::sleep(poll_interval).await;
        }

        info!("Reminder worker {} stopped", self.config.worker_id);
    }

    pub async fn shutdown(&self) {
        info!("Initiating shutdown for reminder worker {}", self.config.worker_id);
        *self.is_shutdown.write().await = true;
    }

    /// Claims and fires every reminder due at `now`. Returns how many jobs were claimed.
    /// A failing job is logged and dropped; reminders are never retried.
    pub async fn run_due(&self, now: DateTime<Utc>) -> Result<usize, ReminderError> {
        let jobs = self.queue.claim_due(now, self.config.batch_size).await?;
        let claimed = jobs.len();

        for job in jobs {
            if let Err(e) = self.process(&job).await {
                error!("Reminder {} for appointment {} failed: {}", job.id, job.appointment_id, e);
            }
        }

        Ok(claimed)
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, appointment_id = %job.appointment_id))]
    pub async fn process(&self, job: &ReminderJob) -> Result<ReminderOutcome, ReminderError> {
        if !self.probe.is_scheduled(job.appointment_id).await? {
            info!("Appointment {} is no longer scheduled, skipping reminder", job.appointment_id);
            return Ok(ReminderOutcome::AppointmentInactive);
        }

        let patient = match self
            .directory
            .find_by_id(job.patient_id)
            .await
            .map_err(|e| ReminderError::DirectoryError(e.to_string()))?
        {
            Some(patient) => patient,
            None => {
                warn!("Patient {} no longer exists, skipping reminder", job.patient_id);
                return Ok(ReminderOutcome::PatientMissing);
            }
        };

        let message = job.message();
        let report = self
            .notifications
            .notify(
                patient.id,
                REMINDER_TITLE,
                &message,
                Some(serde_json::json!({ "appointment_id": job.appointment_id })),
            )
            .await;

        let emailed = if patient.email.is_empty() {
            false
        } else {
            let email = EmailMessage {
                to: patient.email.clone(),
                subject: REMINDER_EMAIL_SUBJECT.to_string(),
                text: message,
            };
            match self.email.send(&email).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Reminder email to {} failed: {}", patient.email, e);
                    false
                }
            }
        };

        info!("Reminder delivered for appointment {}", job.appointment_id);
        Ok(ReminderOutcome::Delivered {
            persisted: report.persisted(),
            pushed: report.pushed,
            emailed,
        })
    }
}
