use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use shared_database::{AppState, ClinicFilter};
use shared_models::error::AppError;
use shared_utils::extractor::CurrentRegulator;

use crate::models::{ClinicListQuery, ComplaintQuery, Period, PeriodQuery, StatisticsQuery};
use crate::services::RegulatorService;

#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    CurrentRegulator(_regulator): CurrentRegulator,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = RegulatorService::new(&state);

    let dashboard = service.dashboard(query.period()).await?;

    Ok(Json(json!(dashboard)))
}

#[axum::debug_handler]
pub async fn get_statistics(
    State(state): State<Arc<AppState>>,
    CurrentRegulator(_regulator): CurrentRegulator,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<Value>, AppError> {
    let service = RegulatorService::new(&state);

    let period = Period::parse(query.period.as_deref());
    let report = service.statistics(period, query.clinic_id).await?;

    Ok(Json(json!(report)))
}

#[axum::debug_handler]
pub async fn get_disease_analytics(
    State(state): State<Arc<AppState>>,
    CurrentRegulator(_regulator): CurrentRegulator,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = RegulatorService::new(&state);

    let analytics = service.disease_analytics(query.period()).await?;

    Ok(Json(json!(analytics)))
}

#[axum::debug_handler]
pub async fn list_clinics(
    State(state): State<Arc<AppState>>,
    CurrentRegulator(_regulator): CurrentRegulator,
    Query(query): Query<ClinicListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = RegulatorService::new(&state);

    let filter = ClinicFilter {
        city: query.city,
        district: query.district,
    };
    let clinics = service.clinics(&filter).await?;

    Ok(Json(json!(clinics)))
}

#[axum::debug_handler]
pub async fn get_clinic_details(
    State(state): State<Arc<AppState>>,
    CurrentRegulator(_regulator): CurrentRegulator,
    Path(clinic_id): Path<i64>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = RegulatorService::new(&state);

    let details = service.clinic_details(clinic_id, query.period()).await?;

    Ok(Json(json!(details)))
}

#[axum::debug_handler]
pub async fn list_complaints(
    State(state): State<Arc<AppState>>,
    CurrentRegulator(_regulator): CurrentRegulator,
    Query(query): Query<ComplaintQuery>,
) -> Result<Json<Value>, AppError> {
    let service = RegulatorService::new(&state);

    let complaints = service.complaints(query.status).await?;

    Ok(Json(json!(complaints)))
}
