use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use shared_database::AppState;
use shared_utils::extractor::{auth_middleware, require_regulator};

use crate::handlers::*;

/// Mounted under `/api/regulator`.
pub fn regulator_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/statistics", get(get_statistics))
        .route("/disease-analytics", get(get_disease_analytics))
        .route("/clinics", get(list_clinics))
        .route("/clinics/{clinic_id}", get(get_clinic_details))
        .route("/complaints", get(list_complaints))
        .layer(middleware::from_fn(require_regulator))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
