use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::{AssignmentService, TimeBlockRegistry};

pub struct PractitionerState {
    pub config: Arc<AppConfig>,
    pub blocks: Arc<TimeBlockRegistry>,
    pub assignments: AssignmentService,
}

pub fn practitioner_routes(state: Arc<PractitionerState>) -> Router {
    Router::new()
        .route("/blocks", post(handlers::create_time_block).get(handlers::list_time_blocks))
        .route("/blocks/{block_id}", delete(handlers::delete_time_block))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}

pub fn assignment_routes(state: Arc<PractitionerState>) -> Router {
    Router::new()
        .route("/request", post(handlers::request_assignment))
        .route("/pending", get(handlers::list_pending_assignments))
        .route("/direct", post(handlers::assign_directly))
        .route("/{request_id}/approve", post(handlers::approve_assignment))
        .route("/{request_id}/reject", post(handlers::reject_assignment))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
