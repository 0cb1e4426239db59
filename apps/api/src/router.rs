use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;

use appointment_cell::{appointment_routes, AppointmentState};
use notification_cell::{notification_routes, NotificationState};
use practitioner_cell::{assignment_routes, practitioner_routes, PractitionerState};

/// Per-cell state, assembled once at startup.
pub struct CellStates {
    pub appointments: Arc<AppointmentState>,
    pub practitioners: Arc<PractitionerState>,
    pub notifications: Arc<NotificationState>,
}

pub fn create_router(states: CellStates) -> Router {
    Router::new()
        .route("/", get(|| async { "Amae Clinic scheduling API is running!" }))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .nest("/appointments", appointment_routes(states.appointments))
        .nest("/practitioners", practitioner_routes(states.practitioners.clone()))
        .nest("/assignments", assignment_routes(states.practitioners))
        .nest("/notifications", notification_routes(states.notifications))
}
