use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;

use practitioner_cell::*;
use shared_database::InMemoryUserDirectory;
use shared_models::auth::{Caller, Role};
use shared_models::directory::UserRecord;

struct Fixture {
    registry: TimeBlockRegistry,
    practitioner: UserRecord,
    other_practitioner: UserRecord,
    patient: UserRecord,
}

fn fixture() -> Fixture {
    let practitioner = UserRecord::new("Dr. Rao", "rao@clinic.test", Role::Practitioner);
    let other_practitioner = UserRecord::new("Dr. Iyer", "iyer@clinic.test", Role::Practitioner);
    let patient = UserRecord::new("Asha", "asha@example.com", Role::Patient);
    let directory = Arc::new(InMemoryUserDirectory::with_users(vec![
        practitioner.clone(),
        other_practitioner.clone(),
        patient.clone(),
    ]));

    Fixture {
        registry: TimeBlockRegistry::new(Arc::new(InMemoryTimeBlockStore::new()), directory, TimelineLocks::new()),
        practitioner,
        other_practitioner,
        patient,
    }
}

fn block_request(practitioner_id: Option<Uuid>, start: &str, end: &str) -> CreateTimeBlockRequest {
    CreateTimeBlockRequest {
        practitioner_id,
        start: start.to_string(),
        end: end.to_string(),
        reason: Some("Lunch".to_string()),
    }
}

#[tokio::test]
async fn test_practitioner_blocks_own_time() {
    let f = fixture();
    let caller = Caller::new(f.practitioner.id, Role::Practitioner);

    let block = f
        .registry
        .create(&caller, block_request(None, "2030-03-01T12:00:00Z", "2030-03-01T13:00:00Z"))
        .await
        .unwrap();

    assert_eq!(block.practitioner_id, f.practitioner.id);
    assert_eq!(block.created_by, f.practitioner.id);
    assert_eq!(block.reason, "Lunch");
    assert_eq!(block.start_time, Utc.with_ymd_and_hms(2030, 3, 1, 12, 0, 0).unwrap());
}

#[tokio::test]
async fn test_practitioner_cannot_block_someone_else() {
    let f = fixture();
    let caller = Caller::new(f.practitioner.id, Role::Practitioner);

    let result = f
        .registry
        .create(
            &caller,
            block_request(Some(f.other_practitioner.id), "2030-03-01T12:00:00Z", "2030-03-01T13:00:00Z"),
        )
        .await;

    assert_matches!(result, Err(PractitionerError::Forbidden(_)));
}

#[tokio::test]
async fn test_admin_blocks_any_practitioner_but_needs_target() {
    let f = fixture();
    let admin = Caller::new(Uuid::new_v4(), Role::Admin);

    let block = f
        .registry
        .create(
            &admin,
            block_request(Some(f.other_practitioner.id), "2030-03-01T12:00:00Z", "2030-03-01T13:00:00Z"),
        )
        .await
        .unwrap();
    assert_eq!(block.created_by, admin.id);

    let missing = f
        .registry
        .create(&admin, block_request(None, "2030-03-01T12:00:00Z", "2030-03-01T13:00:00Z"))
        .await;
    assert_matches!(missing, Err(PractitionerError::InvalidInput(_)));

    let not_a_practitioner = f
        .registry
        .create(&admin, block_request(Some(f.patient.id), "2030-03-01T12:00:00Z", "2030-03-01T13:00:00Z"))
        .await;
    assert_matches!(not_a_practitioner, Err(PractitionerError::NotFound("Practitioner")));
}

#[tokio::test]
async fn test_inverted_or_empty_window_is_invalid() {
    let f = fixture();
    let caller = Caller::new(f.practitioner.id, Role::Practitioner);

    let inverted = f
        .registry
        .create(&caller, block_request(None, "2030-03-01T13:00:00Z", "2030-03-01T12:00:00Z"))
        .await;
    assert_matches!(inverted, Err(PractitionerError::InvalidInput(_)));

    let empty = f
        .registry
        .create(&caller, block_request(None, "2030-03-01T12:00:00Z", "2030-03-01T12:00:00Z"))
        .await;
    assert_matches!(empty, Err(PractitionerError::InvalidInput(_)));

    let garbage = f.registry.create(&caller, block_request(None, "tomorrow", "2030-03-01T12:00:00Z")).await;
    assert_matches!(garbage, Err(PractitionerError::InvalidInput(_)));
}

#[tokio::test]
async fn test_list_filters_by_start_and_sorts() {
    let f = fixture();
    let caller = Caller::new(f.practitioner.id, Role::Practitioner);
    for (start, end) in [
        ("2030-03-03T09:00:00Z", "2030-03-03T10:00:00Z"),
        ("2030-03-01T09:00:00Z", "2030-03-01T10:00:00Z"),
        ("2030-03-05T09:00:00Z", "2030-03-05T10:00:00Z"),
    ] {
        f.registry.create(&caller, block_request(None, start, end)).await.unwrap();
    }

    let all = f.registry.list(&caller, TimeBlockQuery::default()).await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.windows(2).all(|w| w[0].start_time <= w[1].start_time));

    let patient = Caller::new(f.patient.id, Role::Patient);
    let ranged = f
        .registry
        .list(
            &patient,
            TimeBlockQuery {
                practitioner_id: Some(f.practitioner.id),
                from: Some("2030-03-01T09:00:00Z".to_string()),
                to: Some("2030-03-03T09:00:00Z".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(ranged.len(), 2);
}

#[tokio::test]
async fn test_delete_requires_owner_and_existing_block() {
    let f = fixture();
    let owner = Caller::new(f.practitioner.id, Role::Practitioner);
    let block = f
        .registry
        .create(&owner, block_request(None, "2030-03-01T12:00:00Z", "2030-03-01T13:00:00Z"))
        .await
        .unwrap();

    let stranger = Caller::new(f.other_practitioner.id, Role::Practitioner);
    assert_matches!(f.registry.delete(&stranger, block.id).await, Err(PractitionerError::Forbidden(_)));

    let patient = Caller::new(f.patient.id, Role::Patient);
    assert_matches!(f.registry.delete(&patient, block.id).await, Err(PractitionerError::Forbidden(_)));

    f.registry.delete(&owner, block.id).await.unwrap();
    assert_matches!(f.registry.delete(&owner, block.id).await, Err(PractitionerError::NotFound(_)));
}

#[tokio::test]
async fn test_overlapping_uses_half_open_windows() {
    let f = fixture();
    let owner = Caller::new(f.practitioner.id, Role::Practitioner);
    f.registry
        .create(&owner, block_request(None, "2030-03-01T12:00:00Z", "2030-03-01T13:00:00Z"))
        .await
        .unwrap();

    let noon = Utc.with_ymd_and_hms(2030, 3, 1, 12, 0, 0).unwrap();

    let touching_before = f.registry.overlapping(f.practitioner.id, noon - Duration::hours(1), noon).await.unwrap();
    assert!(touching_before.is_empty());

    let inside = f
        .registry
        .overlapping(f.practitioner.id, noon + Duration::minutes(30), noon + Duration::minutes(90))
        .await
        .unwrap();
    assert_eq!(inside.len(), 1);

    let other = f.registry.overlapping(f.other_practitioner.id, noon, noon + Duration::hours(1)).await.unwrap();
    assert!(other.is_empty());
}
