use std::sync::Arc;

use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use notification_cell::NotificationService;
use shared_database::UserDirectory;
use shared_models::auth::{Caller, Role};
use shared_models::directory::UserRecord;
use shared_utils::policy::{authorize, Operation, Ownership};

use crate::models::{
    AssignmentRequest, AssignmentStatus, CreateAssignmentRequest, DirectAssignmentRequest,
    PractitionerError,
};
use crate::services::store::AssignmentStore;

pub struct AssignmentService {
    store: Arc<dyn AssignmentStore>,
    directory: Arc<dyn UserDirectory>,
    notifications: NotificationService,
}

impl AssignmentService {
    pub fn new(
        store: Arc<dyn AssignmentStore>,
        directory: Arc<dyn UserDirectory>,
        notifications: NotificationService,
    ) -> Self {
        Self { store, directory, notifications }
    }

    #[instrument(skip(self, request), fields(patient_id = %caller.id))]
    pub async fn request(
        &self,
        caller: &Caller,
        request: CreateAssignmentRequest,
    ) -> Result<AssignmentRequest, PractitionerError> {
        authorize(Operation::RequestAssignment, caller, &Ownership::none())?;

        let practitioner = self.user_with_role(request.practitioner_id, Role::Practitioner, "Practitioner").await?;
        let patient_name = self
            .directory
            .find_by_id(caller.id)
            .await?
            .map(|p| p.name)
            .unwrap_or_else(|| "A patient".to_string());

        let assignment = AssignmentRequest::new(caller.id, practitioner.id, request.message);
        self.store.insert(&assignment).await?;
        info!("Assignment request {} created for practitioner {}", assignment.id, practitioner.id);

        match self.directory.list_by_role(Role::Admin).await {
            Ok(admins) => {
                let message = format!("{} requested {}", patient_name, practitioner.name);
                for admin in admins {
                    self.notifications
                        .notify(
                            admin.id,
                            "Assignment request",
                            &message,
                            Some(json!({ "request_id": assignment.id })),
                        )
                        .await;
                }
            }
            Err(e) => warn!("Could not load admins to notify about request {}: {}", assignment.id, e),
        }

        Ok(assignment)
    }

    pub async fn list_pending(&self, caller: &Caller) -> Result<Vec<AssignmentRequest>, PractitionerError> {
        authorize(Operation::ReviewAssignment, caller, &Ownership::none())?;
        self.store.list_pending().await
    }

    #[instrument(skip(self), fields(admin_id = %caller.id))]
    pub async fn approve(&self, caller: &Caller, request_id: Uuid) -> Result<AssignmentRequest, PractitionerError> {
        authorize(Operation::ReviewAssignment, caller, &Ownership::none())?;
        let pending = self.pending_request(request_id).await?;

        let patient = self.user_with_role(pending.patient_id, Role::Patient, "Patient").await?;
        let practitioner = self.user_with_role(pending.practitioner_id, Role::Practitioner, "Practitioner").await?;

        let approved = self
            .store
            .resolve(request_id, AssignmentStatus::Approved)
            .await?
            .ok_or_else(not_pending)?;
        self.directory.set_assigned_practitioner(patient.id, practitioner.id).await?;
        info!("Patient {} assigned to practitioner {}", patient.id, practitioner.id);

        self.notifications
            .notify(
                patient.id,
                "Assignment approved",
                &format!("You are assigned to {}", practitioner.name),
                Some(json!({ "practitioner_id": practitioner.id })),
            )
            .await;
        self.notifications
            .notify(
                practitioner.id,
                "New patient assigned",
                &format!("{} has been assigned to you", patient.name),
                Some(json!({ "patient_id": patient.id })),
            )
            .await;

        Ok(approved)
    }

    #[instrument(skip(self, reason), fields(admin_id = %caller.id))]
    pub async fn reject(
        &self,
        caller: &Caller,
        request_id: Uuid,
        reason: Option<String>,
    ) -> Result<AssignmentRequest, PractitionerError> {
        authorize(Operation::ReviewAssignment, caller, &Ownership::none())?;
        let pending = self.pending_request(request_id).await?;

        let rejected = self
            .store
            .resolve(request_id, AssignmentStatus::Rejected)
            .await?
            .ok_or_else(not_pending)?;
        info!("Assignment request {} rejected", request_id);

        let practitioner_name = self
            .directory
            .find_by_id(pending.practitioner_id)
            .await
            .ok()
            .flatten()
            .map(|p| p.name)
            .unwrap_or_else(|| "the practitioner".to_string());
        let message = format!(
            "Your request to {} was rejected. {}",
            practitioner_name,
            reason.unwrap_or_default()
        );

        self.notifications
            .notify(
                pending.patient_id,
                "Assignment rejected",
                message.trim_end(),
                Some(json!({ "request_id": request_id })),
            )
            .await;

        Ok(rejected)
    }

    /// Admin shortcut that skips the request workflow.
    pub async fn assign_directly(
        &self,
        caller: &Caller,
        request: DirectAssignmentRequest,
    ) -> Result<(UserRecord, UserRecord), PractitionerError> {
        authorize(Operation::AssignDirectly, caller, &Ownership::none())?;

        let patient = self.user_with_role(request.patient_id, Role::Patient, "Patient").await?;
        let practitioner = self.user_with_role(request.practitioner_id, Role::Practitioner, "Practitioner").await?;

        self.directory.set_assigned_practitioner(patient.id, practitioner.id).await?;
        info!("Patient {} directly assigned to practitioner {}", patient.id, practitioner.id);

        Ok((patient, practitioner))
    }

    async fn pending_request(&self, request_id: Uuid) -> Result<AssignmentRequest, PractitionerError> {
        let request = self
            .store
            .find_by_id(request_id)
            .await?
            .ok_or(PractitionerError::NotFound("Assignment request"))?;

        if request.status != AssignmentStatus::Pending {
            return Err(not_pending());
        }
        Ok(request)
    }

    async fn user_with_role(
        &self,
        id: Uuid,
        role: Role,
        label: &'static str,
    ) -> Result<UserRecord, PractitionerError> {
        match self.directory.find_by_id(id).await? {
            Some(user) if user.role == role => Ok(user),
            _ => Err(PractitionerError::NotFound(label)),
        }
    }
}

fn not_pending() -> PractitionerError {
    PractitionerError::InvalidState("Request not pending".to_string())
}
