use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Caller, User};
use shared_models::error::AppError;

use crate::models::{
    CreateAssignmentRequest, CreateTimeBlockRequest, DirectAssignmentRequest,
    RejectAssignmentRequest, TimeBlockQuery,
};
use crate::router::PractitionerState;

// ==============================================================================
// TIME BLOCK HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_time_block(
    State(state): State<Arc<PractitionerState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTimeBlockRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let block = state.blocks.create(&caller, request).await?;

    Ok(Json(json!({
        "success": true,
        "block": block,
        "message": "Time blocked"
    })))
}

#[axum::debug_handler]
pub async fn list_time_blocks(
    State(state): State<Arc<PractitionerState>>,
    Extension(user): Extension<User>,
    Query(query): Query<TimeBlockQuery>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let blocks = state.blocks.list(&caller, query).await?;

    Ok(Json(json!({
        "success": true,
        "blocks": blocks,
        "total": blocks.len()
    })))
}

#[axum::debug_handler]
pub async fn delete_time_block(
    State(state): State<Arc<PractitionerState>>,
    Extension(user): Extension<User>,
    Path(block_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let block = state.blocks.delete(&caller, block_id).await?;

    Ok(Json(json!({
        "success": true,
        "block": block,
        "message": "Removed"
    })))
}

// ==============================================================================
// ASSIGNMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn request_assignment(
    State(state): State<Arc<PractitionerState>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAssignmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let assignment = state.assignments.request(&caller, request).await?;

    Ok(Json(json!({
        "success": true,
        "request": assignment,
        "message": "Request created"
    })))
}

#[axum::debug_handler]
pub async fn list_pending_assignments(
    State(state): State<Arc<PractitionerState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let requests = state.assignments.list_pending(&caller).await?;

    Ok(Json(json!({
        "success": true,
        "requests": requests,
        "total": requests.len()
    })))
}

#[axum::debug_handler]
pub async fn approve_assignment(
    State(state): State<Arc<PractitionerState>>,
    Extension(user): Extension<User>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let assignment = state.assignments.approve(&caller, request_id).await?;

    Ok(Json(json!({
        "success": true,
        "request": assignment,
        "message": "Approved and assigned"
    })))
}

#[axum::debug_handler]
pub async fn reject_assignment(
    State(state): State<Arc<PractitionerState>>,
    Extension(user): Extension<User>,
    Path(request_id): Path<Uuid>,
    Json(request): Json<RejectAssignmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let assignment = state.assignments.reject(&caller, request_id, request.reason).await?;

    Ok(Json(json!({
        "success": true,
        "request": assignment,
        "message": "Request rejected"
    })))
}

#[axum::debug_handler]
pub async fn assign_directly(
    State(state): State<Arc<PractitionerState>>,
    Extension(user): Extension<User>,
    Json(request): Json<DirectAssignmentRequest>,
) -> Result<Json<Value>, AppError> {
    let caller = Caller::from_user(&user)?;
    let (patient, practitioner) = state.assignments.assign_directly(&caller, request).await?;

    Ok(Json(json!({
        "success": true,
        "patient_id": patient.id,
        "practitioner_id": practitioner.id,
        "message": "Assigned"
    })))
}
