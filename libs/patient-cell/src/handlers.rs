use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_database::AppState;
use shared_models::error::AppError;
use shared_utils::extractor::CurrentPatient;

use crate::models::{CreateComplaintRequest, CreateReviewRequest, SearchCriteriaRequest};
use crate::services::{PatientService, ReviewService};

#[axum::debug_handler]
pub async fn list_scans(
    State(state): State<Arc<AppState>>,
    CurrentPatient(patient): CurrentPatient,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);

    let scans = service.scans(&patient).await?;

    Ok(Json(json!(scans)))
}

#[axum::debug_handler]
pub async fn get_scan(
    State(state): State<Arc<AppState>>,
    CurrentPatient(patient): CurrentPatient,
    Path(scan_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);

    let details = service.scan(&patient, scan_id).await?;

    Ok(Json(json!(details)))
}

#[axum::debug_handler]
pub async fn get_scan_plan(
    State(state): State<Arc<AppState>>,
    CurrentPatient(patient): CurrentPatient,
    Path(scan_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);

    let plan = service.plan_for_scan(&patient, scan_id).await?;

    Ok(Json(json!(plan)))
}

#[axum::debug_handler]
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    CurrentPatient(patient): CurrentPatient,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);

    let plans = service.plans(&patient).await?;

    Ok(Json(json!(plans)))
}

#[axum::debug_handler]
pub async fn update_search_criteria(
    State(state): State<Arc<AppState>>,
    CurrentPatient(patient): CurrentPatient,
    Json(request): Json<SearchCriteriaRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);

    let updated = service.update_search_criteria(&patient, request).await?;

    Ok(Json(json!({
        "message": "Search criteria updated successfully",
        "city": updated.city,
        "district": updated.district,
        "price_segment": updated.price_segment
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    CurrentPatient(patient): CurrentPatient,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&state);

    let appointments = service.appointments(&patient).await?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    CurrentPatient(patient): CurrentPatient,
    Json(request): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = ReviewService::new(&state);

    let created = service.create_review(&patient, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Review submitted successfully",
            "review": created.review,
            "clinic_rating": created.clinic_rating
        })),
    ))
}

#[axum::debug_handler]
pub async fn create_complaint(
    State(state): State<Arc<AppState>>,
    CurrentPatient(patient): CurrentPatient,
    Json(request): Json<CreateComplaintRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let service = PatientService::new(&state);

    let complaint = service.create_complaint(&patient, request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Complaint submitted successfully",
            "complaint": complaint
        })),
    ))
}
