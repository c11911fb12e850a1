use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::{auth_middleware, require_clinic, require_patient};

use crate::handlers::*;

/// Mounted under `/api/patient`.
pub fn patient_offer_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/plans/{plan_id}/offers", get(list_plan_offers))
        .route("/select-offer", post(select_offer))
        .layer(middleware::from_fn(require_patient))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

/// Mounted under `/api/clinic`.
pub fn clinic_offer_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/incoming-plans", get(incoming_plans))
        .route("/offers", post(submit_offer))
        .layer(middleware::from_fn(require_clinic))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
