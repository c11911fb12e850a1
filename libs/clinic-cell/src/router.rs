use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::{auth_middleware, require_clinic};

use crate::handlers::*;

/// Mounted under `/api/clinic`, next to the offer routes.
pub fn clinic_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/leads", get(list_leads))
        .route("/appointments", get(list_appointments))
        .route("/appointments/{appointment_id}", put(update_appointment))
        .route("/price-list", get(get_price_list).put(update_price_list))
        .route("/analytics", get(get_analytics))
        .layer(middleware::from_fn(require_clinic))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
