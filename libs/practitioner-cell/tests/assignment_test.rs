use std::sync::Arc;

use assert_matches::assert_matches;
use uuid::Uuid;

use notification_cell::{InMemoryNotificationStore, NotificationService, RealtimeHub};
use practitioner_cell::*;
use shared_database::{InMemoryUserDirectory, UserDirectory};
use shared_models::auth::{Caller, Role};
use shared_models::directory::UserRecord;

struct Fixture {
    service: AssignmentService,
    directory: Arc<InMemoryUserDirectory>,
    inbox: Arc<InMemoryNotificationStore>,
    admin: UserRecord,
    practitioner: UserRecord,
    patient: UserRecord,
}

fn fixture() -> Fixture {
    let admin = UserRecord::new("Admin", "admin@clinic.test", Role::Admin);
    let practitioner = UserRecord::new("Dr. Rao", "rao@clinic.test", Role::Practitioner);
    let patient = UserRecord::new("Asha", "asha@example.com", Role::Patient);
    let directory = Arc::new(InMemoryUserDirectory::with_users(vec![
        admin.clone(),
        practitioner.clone(),
        patient.clone(),
    ]));
    let inbox = Arc::new(InMemoryNotificationStore::new());
    let notifications = NotificationService::new(inbox.clone(), RealtimeHub::new());

    Fixture {
        service: AssignmentService::new(Arc::new(InMemoryAssignmentStore::new()), directory.clone(), notifications),
        directory,
        inbox,
        admin,
        practitioner,
        patient,
    }
}

fn as_caller(user: &UserRecord) -> Caller {
    Caller::new(user.id, user.role)
}

fn request_for(practitioner_id: Uuid) -> CreateAssignmentRequest {
    CreateAssignmentRequest {
        practitioner_id,
        message: Some("Recommended by a friend".to_string()),
    }
}

#[tokio::test]
async fn test_request_notifies_admins_and_rejects_duplicates() {
    let f = fixture();
    let patient = as_caller(&f.patient);

    let request = f.service.request(&patient, request_for(f.practitioner.id)).await.unwrap();
    assert_eq!(request.status, AssignmentStatus::Pending);

    let notes = f.inbox.all().await;
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].user_id, f.admin.id);
    assert_eq!(notes[0].message, "Asha requested Dr. Rao");

    let duplicate = f.service.request(&patient, request_for(f.practitioner.id)).await;
    assert_matches!(duplicate, Err(PractitionerError::Conflict(_)));
}

#[tokio::test]
async fn test_request_requires_patient_and_real_practitioner() {
    let f = fixture();

    let as_admin = f.service.request(&as_caller(&f.admin), request_for(f.practitioner.id)).await;
    assert_matches!(as_admin, Err(PractitionerError::Forbidden(_)));

    let unknown = f.service.request(&as_caller(&f.patient), request_for(Uuid::new_v4())).await;
    assert_matches!(unknown, Err(PractitionerError::NotFound("Practitioner")));

    let not_practitioner = f.service.request(&as_caller(&f.patient), request_for(f.admin.id)).await;
    assert_matches!(not_practitioner, Err(PractitionerError::NotFound("Practitioner")));
}

#[tokio::test]
async fn test_approve_assigns_and_notifies_both() {
    let f = fixture();
    let request = f.service.request(&as_caller(&f.patient), request_for(f.practitioner.id)).await.unwrap();
    let admin = as_caller(&f.admin);

    let approved = f.service.approve(&admin, request.id).await.unwrap();
    assert_eq!(approved.status, AssignmentStatus::Approved);

    let patient = f.directory.find_by_id(f.patient.id).await.unwrap().unwrap();
    assert_eq!(patient.assigned_practitioner_id, Some(f.practitioner.id));

    let notes = f.inbox.all().await;
    assert!(notes.iter().any(|n| n.user_id == f.patient.id && n.message == "You are assigned to Dr. Rao"));
    assert!(notes.iter().any(|n| n.user_id == f.practitioner.id && n.message == "Asha has been assigned to you"));

    let again = f.service.approve(&admin, request.id).await;
    assert_matches!(again, Err(PractitionerError::InvalidState(_)));
    assert!(f.service.list_pending(&admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reject_carries_reason() {
    let f = fixture();
    let request = f.service.request(&as_caller(&f.patient), request_for(f.practitioner.id)).await.unwrap();

    let rejected = f
        .service
        .reject(&as_caller(&f.admin), request.id, Some("Caseload full".to_string()))
        .await
        .unwrap();
    assert_eq!(rejected.status, AssignmentStatus::Rejected);

    let notes = f.inbox.all().await;
    assert!(notes
        .iter()
        .any(|n| n.user_id == f.patient.id && n.message == "Your request to Dr. Rao was rejected. Caseload full"));

    // A fresh request is allowed once the previous one is resolved
    f.service.request(&as_caller(&f.patient), request_for(f.practitioner.id)).await.unwrap();
}

#[tokio::test]
async fn test_review_is_admin_only() {
    let f = fixture();
    let request = f.service.request(&as_caller(&f.patient), request_for(f.practitioner.id)).await.unwrap();

    assert_matches!(
        f.service.approve(&as_caller(&f.practitioner), request.id).await,
        Err(PractitionerError::Forbidden(_))
    );
    assert_matches!(
        f.service.list_pending(&as_caller(&f.patient)).await,
        Err(PractitionerError::Forbidden(_))
    );
    assert_matches!(
        f.service.approve(&as_caller(&f.admin), Uuid::new_v4()).await,
        Err(PractitionerError::NotFound("Assignment request"))
    );
}

#[tokio::test]
async fn test_direct_assignment_checks_roles() {
    let f = fixture();
    let admin = as_caller(&f.admin);

    let swapped = f
        .service
        .assign_directly(
            &admin,
            DirectAssignmentRequest { patient_id: f.practitioner.id, practitioner_id: f.patient.id },
        )
        .await;
    assert_matches!(swapped, Err(PractitionerError::NotFound("Patient")));

    f.service
        .assign_directly(
            &admin,
            DirectAssignmentRequest { patient_id: f.patient.id, practitioner_id: f.practitioner.id },
        )
        .await
        .unwrap();

    let patient = f.directory.find_by_id(f.patient.id).await.unwrap().unwrap();
    assert_eq!(patient.assigned_practitioner_id, Some(f.practitioner.id));
}
