// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use notification_cell::NotificationService;
use practitioner_cell::TimelineLocks;
use reminder_cell::ReminderScheduler;
use shared_database::{TherapyCatalog, UserDirectory};
use shared_models::auth::{Caller, Role};
use shared_models::directory::{Therapy, UserRecord};
use shared_utils::policy::{authorize, Operation, Ownership, PolicyDenial};
use shared_utils::time::parse_iso_timestamp;

use crate::models::{
    Appointment, AppointmentDetails, AppointmentError, AvailabilityRequest, AvailabilityResponse,
    BookAppointmentRequest, CancelAppointmentRequest, CompleteAppointmentRequest, ProgressEntry,
    RescheduleAppointmentRequest, ScheduleQuery,
};
use crate::services::lifecycle::{AppointmentLifecycleService, LifecycleAction};
use crate::services::overlap::OverlapChecker;
use crate::services::store::AppointmentStore;

/// Longest window a single session may occupy.
pub const MAX_SESSION_MINUTES: i64 = 24 * 60;

/// The appointment lifecycle manager: the only writer of appointment state.
///
/// Every mutation validates input and authorization first, then takes the practitioner's
/// timeline lock, re-reads what it is about to change, runs the overlap check and writes.
/// Notifications and reminder arming happen after the lock is released and never fail
/// the operation.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn UserDirectory>,
    therapies: Arc<dyn TherapyCatalog>,
    checker: OverlapChecker,
    lifecycle: AppointmentLifecycleService,
    locks: TimelineLocks,
    notifications: NotificationService,
    reminders: ReminderScheduler,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn UserDirectory>,
        therapies: Arc<dyn TherapyCatalog>,
        checker: OverlapChecker,
        locks: TimelineLocks,
        notifications: NotificationService,
        reminders: ReminderScheduler,
    ) -> Self {
        Self {
            store,
            directory,
            therapies,
            checker,
            lifecycle: AppointmentLifecycleService::new(),
            locks,
            notifications,
            reminders,
        }
    }

    #[instrument(skip(self, request), fields(patient_id = %caller.id))]
    pub async fn book(
        &self,
        caller: &Caller,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        authorize(Operation::BookAppointment, caller, &Ownership::none())
            .map_err(|denial| AppointmentError::InvalidRole(denial.to_string()))?;

        let practitioner_id = match request.practitioner_id {
            Some(id) => id,
            None => self
                .directory
                .find_by_id(caller.id)
                .await?
                .and_then(|patient| patient.assigned_practitioner_id)
                .ok_or(AppointmentError::NoPractitionerAvailable)?,
        };

        let therapy = self.therapy(request.therapy_id).await?;
        let practitioner = self.practitioner(practitioner_id).await?;
        let start = parse_start(&request.start_time)?;
        let end = session_end(start, therapy.duration_minutes)?;

        let appointment = {
            let _guard = self.locks.acquire(practitioner.id).await;

            if !self.checker.is_free(practitioner.id, start, end, None).await? {
                warn!("Booking rejected, practitioner {} busy at {}", practitioner.id, start);
                return Err(AppointmentError::SlotConflict);
            }

            let appointment = Appointment::new(caller.id, practitioner.id, therapy.id, start, end, request.notes);
            self.store.insert(&appointment).await?;
            appointment
        };

        info!("Appointment {} booked with practitioner {} at {}", appointment.id, practitioner.id, start);

        let at = start.to_rfc3339();
        let data = json!({ "appointment_id": appointment.id });
        self.notifications
            .notify(
                appointment.patient_id,
                "Appointment scheduled",
                &format!("Your {} is scheduled at {}", therapy.name, at),
                Some(data.clone()),
            )
            .await;
        self.notifications
            .notify(
                appointment.practitioner_id,
                "New appointment",
                &format!("New appointment for {} at {}", therapy.name, at),
                Some(data),
            )
            .await;

        if let Err(e) = self
            .reminders
            .arm(appointment.id, appointment.patient_id, start, Utc::now())
            .await
        {
            warn!("Failed to arm reminder for appointment {}: {}", appointment.id, e);
        }

        Ok(appointment)
    }

    /// Mirrors the checks of [`book`](Self::book) without taking the lock or writing.
    pub async fn check_availability(
        &self,
        caller: &Caller,
        request: AvailabilityRequest,
    ) -> Result<AvailabilityResponse, AppointmentError> {
        authorize(Operation::CheckAvailability, caller, &Ownership::none())?;

        let practitioner = self.practitioner(request.practitioner_id).await?;

        let duration_minutes = match (request.therapy_id, request.duration_minutes) {
            (Some(therapy_id), _) => self.therapy(therapy_id).await?.duration_minutes,
            (None, Some(minutes)) if (1..=MAX_SESSION_MINUTES).contains(&minutes) => minutes,
            (None, Some(_)) => {
                return Err(AppointmentError::InvalidInput(format!(
                    "duration_minutes must be between 1 and {}",
                    MAX_SESSION_MINUTES
                )))
            }
            (None, None) => {
                return Err(AppointmentError::InvalidInput(
                    "therapy_id or duration_minutes required".to_string(),
                ))
            }
        };

        let start = parse_start(&request.start_time)?;
        let end = session_end(start, duration_minutes)?;

        let free = self.checker.is_free(practitioner.id, start, end, None).await?;
        debug!("Practitioner {} free at {}: {}", practitioner.id, start, free);

        Ok(AvailabilityResponse::from_free(free))
    }

    pub async fn get_by_id(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        authorize(Operation::ViewAppointment, caller, &appointment.ownership())?;

        let patient = self.directory.find_by_id(appointment.patient_id).await?;
        let practitioner = self.directory.find_by_id(appointment.practitioner_id).await?;
        let therapy = self.therapies.find_by_id(appointment.therapy_id).await?;

        Ok(AppointmentDetails {
            appointment,
            patient: patient.as_ref().map(UserRecord::summary),
            practitioner: practitioner.as_ref().map(UserRecord::summary),
            therapy,
        })
    }

    #[instrument(skip(self, request), fields(caller_id = %caller.id))]
    pub async fn reschedule(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id).await?;
        authorize(Operation::RescheduleAppointment, caller, &current.ownership())?;
        self.lifecycle.validate_transition(current.status, LifecycleAction::Reschedule)?;

        let new_start = parse_start(&request.new_start_time)?;
        let therapy = self.therapy(current.therapy_id).await?;
        let new_end = session_end(new_start, therapy.duration_minutes)?;

        let appointment = {
            let _guard = self.locks.acquire(current.practitioner_id).await;

            let mut appointment = self.load(appointment_id).await?;
            self.lifecycle.validate_transition(appointment.status, LifecycleAction::Reschedule)?;

            if !self
                .checker
                .is_free(appointment.practitioner_id, new_start, new_end, Some(appointment.id))
                .await?
            {
                warn!("Reschedule of {} rejected, slot at {} taken", appointment.id, new_start);
                return Err(AppointmentError::SlotConflict);
            }

            appointment.start_time = new_start;
            appointment.end_time = new_end;
            self.store.update(&appointment).await?;
            appointment
        };

        info!("Appointment {} moved to {}", appointment.id, new_start);

        // An already armed reminder keeps firing at its armed time
        let at = new_start.to_rfc3339();
        let data = json!({ "appointment_id": appointment.id });
        self.notifications
            .notify(
                appointment.patient_id,
                "Appointment rescheduled",
                &format!("Your appointment moved to {}", at),
                Some(data.clone()),
            )
            .await;
        self.notifications
            .notify(
                appointment.practitioner_id,
                "Appointment rescheduled",
                &format!("Appointment moved to {}", at),
                Some(data),
            )
            .await;

        Ok(appointment)
    }

    #[instrument(skip(self, request), fields(caller_id = %caller.id))]
    pub async fn cancel(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        request: CancelAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id).await?;
        authorize(Operation::CancelAppointment, caller, &current.ownership())?;
        self.lifecycle.validate_transition(current.status, LifecycleAction::Cancel)?;

        let appointment = {
            let _guard = self.locks.acquire(current.practitioner_id).await;

            let mut appointment = self.load(appointment_id).await?;
            appointment.status = self.lifecycle.validate_transition(appointment.status, LifecycleAction::Cancel)?;
            self.store.update(&appointment).await?;
            appointment
        };

        info!("Appointment {} cancelled by {}", appointment.id, caller.id);

        let at = appointment.start_time.to_rfc3339();
        let reason = request.reason.unwrap_or_default();
        let data = json!({ "appointment_id": appointment.id });
        self.notifications
            .notify(
                appointment.patient_id,
                "Appointment cancelled",
                format!("Your appointment on {} was cancelled. {}", at, reason).trim_end(),
                Some(data.clone()),
            )
            .await;
        self.notifications
            .notify(
                appointment.practitioner_id,
                "Appointment cancelled",
                format!("Appointment on {} was cancelled. {}", at, reason).trim_end(),
                Some(data),
            )
            .await;

        Ok(appointment)
    }

    #[instrument(skip(self, request), fields(caller_id = %caller.id))]
    pub async fn complete(
        &self,
        caller: &Caller,
        appointment_id: Uuid,
        request: CompleteAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.load(appointment_id).await?;
        authorize(Operation::CompleteAppointment, caller, &current.ownership())?;
        self.lifecycle.validate_transition(current.status, LifecycleAction::Complete)?;

        let appointment = {
            let _guard = self.locks.acquire(current.practitioner_id).await;

            let mut appointment = self.load(appointment_id).await?;
            appointment.status = self
                .lifecycle
                .validate_transition(appointment.status, LifecycleAction::Complete)?;
            appointment.progress.push(ProgressEntry {
                author_id: caller.id,
                notes: request.progress_notes.unwrap_or_default(),
                metrics: request.metrics.unwrap_or_else(|| json!({})),
                created_at: Utc::now(),
            });
            self.store.update(&appointment).await?;
            appointment
        };

        info!("Appointment {} completed by {}", appointment.id, caller.id);

        let therapy_name = match self.therapies.find_by_id(appointment.therapy_id).await {
            Ok(Some(therapy)) => therapy.name,
            _ => "session".to_string(),
        };
        self.notifications
            .notify(
                appointment.patient_id,
                "Session completed",
                &format!("Your session {} was marked complete.", therapy_name),
                Some(json!({ "appointment_id": appointment.id })),
            )
            .await;

        Ok(appointment)
    }

    /// A practitioner sees their own schedule; an admin must name the practitioner.
    pub async fn practitioner_schedule(
        &self,
        caller: &Caller,
        query: ScheduleQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let practitioner_id = match (query.practitioner_id, caller.role) {
            (Some(id), _) => id,
            (None, Role::Practitioner) => caller.id,
            (None, Role::Admin) => {
                return Err(AppointmentError::InvalidInput("practitioner_id is required".to_string()))
            }
            (None, Role::Patient) => Uuid::nil(),
        };
        authorize(Operation::ViewSchedule, caller, &Ownership::practitioner(practitioner_id))?;

        let from = parse_bound(query.from.as_deref(), "from")?;
        let to = parse_bound(query.to.as_deref(), "to")?;

        self.store.list_for_practitioner(practitioner_id, from, to).await
    }

    pub async fn patient_upcoming(
        &self,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        authorize(Operation::ListOwnAppointments, caller, &Ownership::none())?;
        self.store.list_upcoming_for_patient(caller.id, now).await
    }

    pub async fn patient_past(
        &self,
        caller: &Caller,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        authorize(Operation::ListOwnAppointments, caller, &Ownership::none())?;
        self.store.list_past_for_patient(caller.id, now).await
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .find_by_id(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound("Appointment"))
    }

    async fn therapy(&self, therapy_id: Uuid) -> Result<Therapy, AppointmentError> {
        self.therapies
            .find_by_id(therapy_id)
            .await?
            .ok_or(AppointmentError::NotFound("Therapy"))
    }

    async fn practitioner(&self, practitioner_id: Uuid) -> Result<UserRecord, AppointmentError> {
        match self.directory.find_by_id(practitioner_id).await? {
            Some(user) if user.role == Role::Practitioner => Ok(user),
            Some(_) => Err(AppointmentError::InvalidTarget),
            None => Err(AppointmentError::NotFound("Practitioner")),
        }
    }
}

impl From<PolicyDenial> for AppointmentError {
    fn from(denial: PolicyDenial) -> Self {
        AppointmentError::Forbidden(denial.to_string())
    }
}

fn parse_start(raw: &str) -> Result<DateTime<Utc>, AppointmentError> {
    parse_iso_timestamp(raw).ok_or_else(|| AppointmentError::InvalidInput(format!("Invalid start time '{}'", raw)))
}

/// `start + minutes`, rejecting durations outside `1..=MAX_SESSION_MINUTES` and out-of-range results.
fn session_end(start: DateTime<Utc>, minutes: i64) -> Result<DateTime<Utc>, AppointmentError> {
    if !(1..=MAX_SESSION_MINUTES).contains(&minutes) {
        return Err(AppointmentError::InvalidInput(format!(
            "Session length of {} minutes is out of range",
            minutes
        )));
    }

    Duration::try_minutes(minutes)
        .and_then(|duration| start.checked_add_signed(duration))
        .ok_or_else(|| AppointmentError::InvalidInput("Session end is out of range".to_string()))
}

fn parse_bound(raw: Option<&str>, name: &str) -> Result<Option<DateTime<Utc>>, AppointmentError> {
    raw.map(|value| {
        parse_iso_timestamp(value)
            .ok_or_else(|| AppointmentError::InvalidInput(format!("Invalid '{}' timestamp", name)))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    #[test]
    fn test_session_end_adds_minutes() {
        let start = Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(session_end(start, 90).unwrap(), Utc.with_ymd_and_hms(2030, 5, 1, 11, 30, 0).unwrap());
        assert_eq!(
            session_end(start, MAX_SESSION_MINUTES).unwrap(),
            Utc.with_ymd_and_hms(2030, 5, 2, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_session_end_rejects_out_of_range() {
        let start = Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap();
        assert_matches!(session_end(start, 0), Err(AppointmentError::InvalidInput(_)));
        assert_matches!(session_end(start, MAX_SESSION_MINUTES + 1), Err(AppointmentError::InvalidInput(_)));
        assert_matches!(session_end(start, i64::MAX), Err(AppointmentError::InvalidInput(_)));
        assert_matches!(session_end(DateTime::<Utc>::MAX_UTC, 60), Err(AppointmentError::InvalidInput(_)));
    }
}
