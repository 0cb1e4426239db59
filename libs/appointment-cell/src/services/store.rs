use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{SupabaseApiError, SupabaseClient};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};
use crate::services::overlap::intervals_overlap;

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Fails with `SlotConflict` when the store itself detects an overlapping scheduled row.
    async fn insert(&self, appointment: &Appointment) -> Result<(), AppointmentError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError>;

    /// Persists times, status and progress of an appointment that is still scheduled.
    /// Fails with `InvalidState` when the stored row has already left `scheduled`.
    async fn update(&self, appointment: &Appointment) -> Result<(), AppointmentError>;

    async fn find_overlapping_scheduled(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Any status, start within `[from, to]`, ascending by start.
    async fn list_for_practitioner(
        &self,
        practitioner_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Scheduled, starting at or after `now`, ascending.
    async fn list_upcoming_for_patient(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// Any status, ended before `now`, most recent first.
    async fn list_past_for_patient(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError>;
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Enforces the same no-overlap rule for scheduled rows as the database constraint.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<Appointment> {
        self.appointments.read().await.values().cloned().collect()
    }

    fn clashes(existing: &HashMap<Uuid, Appointment>, candidate: &Appointment) -> bool {
        candidate.status == AppointmentStatus::Scheduled
            && existing.values().any(|other| {
                other.id != candidate.id
                    && other.status == AppointmentStatus::Scheduled
                    && other.practitioner_id == candidate.practitioner_id
                    && intervals_overlap(candidate.start_time, candidate.end_time, other.start_time, other.end_time)
            })
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        let mut appointments = self.appointments.write().await;
        if Self::clashes(&appointments, appointment) {
            return Err(AppointmentError::SlotConflict);
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        Ok(self.appointments.read().await.get(&id).cloned())
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get(&appointment.id) {
            None => return Err(AppointmentError::NotFound("Appointment")),
            Some(stored) if stored.status != AppointmentStatus::Scheduled => {
                return Err(AppointmentError::InvalidState(format!("Appointment is already {}", stored.status)))
            }
            Some(_) => {}
        }
        if Self::clashes(&appointments, appointment) {
            return Err(AppointmentError::SlotConflict);
        }
        appointments.insert(appointment.id, appointment.clone());
        Ok(())
    }

    async fn find_overlapping_scheduled(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| {
                a.practitioner_id == practitioner_id
                    && a.status == AppointmentStatus::Scheduled
                    && Some(a.id) != exclude_appointment_id
                    && intervals_overlap(start, end, a.start_time, a.end_time)
            })
            .cloned()
            .collect())
    }

    async fn list_for_practitioner(
        &self,
        practitioner_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut appointments: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.practitioner_id == practitioner_id)
            .filter(|a| from.map_or(true, |from| a.start_time >= from))
            .filter(|a| to.map_or(true, |to| a.start_time <= to))
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.start_time);
        Ok(appointments)
    }

    async fn list_upcoming_for_patient(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut appointments: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.patient_id == patient_id && a.status == AppointmentStatus::Scheduled && a.start_time >= now)
            .cloned()
            .collect();
        appointments.sort_by_key(|a| a.start_time);
        Ok(appointments)
    }

    async fn list_past_for_patient(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut appointments: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.patient_id == patient_id && a.end_time < now)
            .cloned()
            .collect();
        appointments.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(appointments)
    }
}

// ==============================================================================
// SUPABASE STORE
// ==============================================================================

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let rows: Vec<Value> = self.supabase.service_request(Method::GET, path, None, false).await?;
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| AppointmentError::Store(format!("Failed to parse appointment: {}", e)))
            })
            .collect()
    }

    /// The exclusion constraint surfaces as HTTP 409.
    fn map_write_error(err: anyhow::Error) -> AppointmentError {
        if SupabaseApiError::status_of(&err) == Some(StatusCode::CONFLICT) {
            warn!("Appointment write rejected by exclusion constraint");
            AppointmentError::SlotConflict
        } else {
            AppointmentError::Store(err.to_string())
        }
    }
}

fn timestamp(ts: DateTime<Utc>) -> String {
    urlencoding::encode(&ts.to_rfc3339()).into_owned()
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        debug!("Inserting appointment {}", appointment.id);
        let body = serde_json::to_value(appointment).map_err(|e| AppointmentError::Store(e.to_string()))?;
        self.supabase
            .service_execute(Method::POST, "/rest/v1/appointments", Some(body))
            .await
            .map_err(Self::map_write_error)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Appointment>, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn update(&self, appointment: &Appointment) -> Result<(), AppointmentError> {
        debug!("Updating appointment {}", appointment.id);
        // Another instance may have cancelled or completed the row in the meantime
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.scheduled", appointment.id);
        let body = json!({
            "start_time": appointment.start_time,
            "end_time": appointment.end_time,
            "status": appointment.status,
            "progress": appointment.progress,
        });
        let updated: Vec<Value> = self
            .supabase
            .service_request(Method::PATCH, &path, Some(body), true)
            .await
            .map_err(Self::map_write_error)?;

        if updated.is_empty() {
            warn!("Appointment {} was no longer scheduled when updating", appointment.id);
            return Err(AppointmentError::InvalidState("Appointment is no longer scheduled".to_string()));
        }
        Ok(())
    }

    async fn find_overlapping_scheduled(
        &self,
        practitioner_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?practitioner_id=eq.{}&status=eq.scheduled&start_time=lt.{}&end_time=gt.{}",
            practitioner_id,
            timestamp(end),
            timestamp(start)
        );
        if let Some(exclude) = exclude_appointment_id {
            path.push_str(&format!("&id=neq.{}", exclude));
        }
        self.fetch(&path).await
    }

    async fn list_for_practitioner(
        &self,
        practitioner_id: Uuid,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path = format!(
            "/rest/v1/appointments?practitioner_id=eq.{}&order=start_time.asc",
            practitioner_id
        );
        if let Some(from) = from {
            path.push_str(&format!("&start_time=gte.{}", timestamp(from)));
        }
        if let Some(to) = to {
            path.push_str(&format!("&start_time=lte.{}", timestamp(to)));
        }
        self.fetch(&path).await
    }

    async fn list_upcoming_for_patient(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&status=eq.scheduled&start_time=gte.{}&order=start_time.asc",
            patient_id,
            timestamp(now)
        );
        self.fetch(&path).await
    }

    async fn list_past_for_patient(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&end_time=lt.{}&order=start_time.desc",
            patient_id,
            timestamp(now)
        );
        self.fetch(&path).await
    }
}
