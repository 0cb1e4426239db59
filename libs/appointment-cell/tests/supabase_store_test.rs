use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::*;
use shared_database::SupabaseClient;
use shared_utils::test_utils::TestConfig;

fn store_for(mock_server: &MockServer) -> SupabaseAppointmentStore {
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    SupabaseAppointmentStore::new(Arc::new(SupabaseClient::new(&config)))
}

fn appointment_row(appointment: &Appointment) -> serde_json::Value {
    serde_json::to_value(appointment).unwrap()
}

#[tokio::test]
async fn test_exclusion_violation_maps_to_slot_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23P01",
            "message": "conflicting key value violates exclusion constraint \"appointments_no_overlap\""
        })))
        .mount(&mock_server)
        .await;

    let start = Utc::now() + Duration::days(3);
    let appointment = Appointment::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        start,
        start + Duration::hours(1),
        None,
    );

    let result = store_for(&mock_server).insert(&appointment).await;

    assert_matches!(result, Err(AppointmentError::SlotConflict));
}

#[tokio::test]
async fn test_other_failures_are_store_errors() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let result = store_for(&mock_server).find_by_id(Uuid::new_v4()).await;

    assert_matches!(result, Err(AppointmentError::Store(_)));
}

#[tokio::test]
async fn test_overlap_query_excludes_rescheduled_appointment() {
    let mock_server = MockServer::start().await;
    let practitioner_id = Uuid::new_v4();
    let moving = Uuid::new_v4();
    let start = Utc::now() + Duration::days(2);
    let end = start + Duration::hours(1);
    let neighbour = Appointment::new(Uuid::new_v4(), practitioner_id, Uuid::new_v4(), start, end, None);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("practitioner_id", format!("eq.{}", practitioner_id)))
        .and(query_param("status", "eq.scheduled"))
        .and(query_param("start_time", format!("lt.{}", end.to_rfc3339())))
        .and(query_param("end_time", format!("gt.{}", start.to_rfc3339())))
        .and(query_param("id", format!("neq.{}", moving)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(&neighbour)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let found = store_for(&mock_server)
        .find_overlapping_scheduled(practitioner_id, start, end, Some(moving))
        .await
        .unwrap();

    assert_eq!(found, vec![neighbour]);
}

#[tokio::test]
async fn test_find_by_id_returns_none_for_empty_result() {
    let mock_server = MockServer::start().await;
    let id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    assert!(store_for(&mock_server).find_by_id(id).await.unwrap().is_none());
}

fn scheduled_appointment() -> Appointment {
    let start = Utc::now() + Duration::days(2);
    Appointment::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), start, start + Duration::hours(1), None)
}

#[tokio::test]
async fn test_update_only_touches_scheduled_rows() {
    let mock_server = MockServer::start().await;
    let mut appointment = scheduled_appointment();
    appointment.status = AppointmentStatus::Cancelled;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment.id)))
        .and(query_param("status", "eq.scheduled"))
        .and(header("Prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(&appointment)])))
        .expect(1)
        .mount(&mock_server)
        .await;

    store_for(&mock_server).update(&appointment).await.unwrap();
}

#[tokio::test]
async fn test_update_of_row_resolved_elsewhere_is_invalid_state() {
    let mock_server = MockServer::start().await;
    let mut appointment = scheduled_appointment();
    appointment.status = AppointmentStatus::Completed;

    // The row was cancelled by another instance, so the status filter matches nothing
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = store_for(&mock_server).update(&appointment).await;

    assert_matches!(result, Err(AppointmentError::InvalidState(_)));
}

#[tokio::test]
async fn test_in_memory_update_refuses_terminal_rows() {
    let store = InMemoryAppointmentStore::new();
    let appointment = scheduled_appointment();
    store.insert(&appointment).await.unwrap();

    let mut cancelled = appointment.clone();
    cancelled.status = AppointmentStatus::Cancelled;
    store.update(&cancelled).await.unwrap();

    let mut completed = appointment;
    completed.status = AppointmentStatus::Completed;
    assert_matches!(store.update(&completed).await, Err(AppointmentError::InvalidState(_)));
    assert_matches!(
        store.update(&scheduled_appointment()).await,
        Err(AppointmentError::NotFound("Appointment"))
    );
}
