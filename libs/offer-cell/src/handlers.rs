use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_database::AppState;
use shared_models::error::AppError;
use shared_utils::extractor::{CurrentClinic, CurrentPatient};

use crate::models::{IncomingPlansQuery, SelectOfferRequest, SubmitOfferRequest};
use crate::services::OfferService;

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_plan_offers(
    State(state): State<Arc<AppState>>,
    CurrentPatient(patient): CurrentPatient,
    Path(plan_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = OfferService::new(&state);

    let offers = service.patient_offers_for_plan(patient.id, plan_id).await?;

    Ok(Json(json!({
        "offers": offers,
        "total": offers.len()
    })))
}

#[axum::debug_handler]
pub async fn select_offer(
    State(state): State<Arc<AppState>>,
    CurrentPatient(patient): CurrentPatient,
    Json(request): Json<SelectOfferRequest>,
) -> Result<Json<Value>, AppError> {
    let service = OfferService::new(&state);

    let accepted = service.accept_offer(request.offer_id, patient.id).await?;

    Ok(Json(json!({
        "message": "Offer selected successfully",
        "offer": accepted.offer,
        "treatment_plan_id": accepted.treatment_plan_id,
        "rejected_offers": accepted.rejected_offers,
        "appointment": accepted.appointment
    })))
}

// ==============================================================================
// CLINIC HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn incoming_plans(
    State(state): State<Arc<AppState>>,
    CurrentClinic(clinic): CurrentClinic,
    Query(query): Query<IncomingPlansQuery>,
) -> Result<Json<Value>, AppError> {
    let service = OfferService::new(&state);

    let plans = service.incoming_plans(clinic.id, query.status).await?;

    Ok(Json(json!({
        "plans": plans,
        "total": plans.len()
    })))
}

#[axum::debug_handler]
pub async fn submit_offer(
    State(state): State<Arc<AppState>>,
    CurrentClinic(clinic): CurrentClinic,
    Json(request): Json<SubmitOfferRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = OfferService::new(&state);

    let offer = service.submit_offer(&clinic, request).await?;

    Ok((StatusCode::CREATED, Json(json!(offer))))
}
