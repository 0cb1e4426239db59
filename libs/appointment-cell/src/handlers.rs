use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::{Caller, User};
use shared_models::error::AppError;

use crate::models::{
    AvailabilityRequest, BookAppointmentRequest, CancelAppointmentRequest,
    CompleteAppointmentRequest, RescheduleAppointmentRequest, ScheduleQuery,
};
use crate::router::AppointmentState;

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let caller = Caller::from_user(&user)?;
    let appointment = state.booking.book(&caller, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked"
        })),
    ))
}

#[axum::debug_handler]
pub async fn check_availability(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Json(request): Json<AvailabilityRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let availability = state.booking.check_availability(&caller, request).await?;

    Ok(Json(json!({
        "success": true,
        "available": availability.available,
        "message": availability.message
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let appointment = state.booking.get_by_id(&caller, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

// ==============================================================================
// LIFECYCLE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let appointment = state.booking.reschedule(&caller, appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Rescheduled"
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    request: Option<Json<CancelAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let appointment = state.booking.cancel(&caller, appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<Uuid>,
    request: Option<Json<CompleteAppointmentRequest>>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let appointment = state.booking.complete(&caller, appointment_id, request).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Session completed"
    })))
}

// ==============================================================================
// LISTING HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn practitioner_schedule(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let appointments = state.booking.practitioner_schedule(&caller, query).await?;
    debug!("Schedule listing for {} returned {} rows", caller.id, appointments.len());

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn patient_upcoming(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let appointments = state.booking.patient_upcoming(&caller, Utc::now()).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn patient_past(
    State(state): State<Arc<AppointmentState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let appointments = state.booking.patient_past(&caller, Utc::now()).await?;

    Ok(Json(json!({
        "success": true,
        "appointments": appointments,
        "total": appointments.len()
    })))
}
