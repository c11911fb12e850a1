use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use analytics_cell::regulator_routes;
use auth_cell::auth_routes;
use clinic_cell::clinic_routes;
use offer_cell::{clinic_offer_routes, patient_offer_routes};
use patient_cell::patient_routes;
use shared_database::AppState;
use shared_models::auth::Role;
use shared_models::{
    AppointmentStatus, ComplaintStatus, OfferStatus, PlanStatus, PriceSegment, ScanStatus,
    Specialization,
};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `[{code, sort_order}]` in declaration order.
fn constant_list<T>(all: &[T], code: fn(&T) -> &'static str) -> Value {
    all.iter()
        .enumerate()
        .map(|(index, item)| json!({ "code": code(item), "sort_order": index + 1 }))
        .collect()
}

/// Lookup lists for client dropdowns. Public.
async fn constants() -> Json<Value> {
    Json(json!({
        "roles": constant_list(Role::ALL, Role::as_str),
        "specializations": constant_list(Specialization::ALL, Specialization::as_str),
        "treatment_statuses": constant_list(PlanStatus::ALL, PlanStatus::as_str),
        "offer_statuses": constant_list(OfferStatus::ALL, OfferStatus::as_str),
        "appointment_statuses": constant_list(AppointmentStatus::ALL, AppointmentStatus::as_str),
        "scan_statuses": constant_list(ScanStatus::ALL, ScanStatus::as_str),
        "complaint_statuses": constant_list(ComplaintStatus::ALL, ComplaintStatus::as_str),
        "price_segments": constant_list(PriceSegment::ALL, PriceSegment::as_str),
    }))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let patient = patient_routes(state.clone()).merge(patient_offer_routes(state.clone()));
    let clinic = clinic_routes(state.clone()).merge(clinic_offer_routes(state.clone()));

    Router::new()
        .route("/health", get(health))
        .route("/api/constants", get(constants))
        .nest("/api/auth", auth_routes(state.clone()))
        .nest("/api/patient", patient)
        .nest("/api/clinic", clinic)
        .nest("/api/regulator", regulator_routes(state))
}
