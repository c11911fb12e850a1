use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::{auth_middleware, require_patient};

use crate::handlers::*;

/// Mounted under `/api/patient`.
pub fn patient_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/scans", get(list_scans))
        .route("/scans/{scan_id}", get(get_scan))
        .route("/scans/{scan_id}/plan", get(get_scan_plan))
        .route("/plans", get(list_plans))
        .route("/search-criteria", post(update_search_criteria))
        .route("/appointments", get(list_appointments))
        .route("/reviews", post(create_review))
        .route("/complaints", post(create_complaint))
        .layer(middleware::from_fn(require_patient))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
