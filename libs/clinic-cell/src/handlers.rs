use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use analytics_cell::PeriodQuery;
use shared_database::{AppState, PriceListInput};
use shared_models::error::AppError;
use shared_utils::extractor::CurrentClinic;

use crate::models::{AppointmentQuery, PriceListQuery, UpdateAppointmentRequest};
use crate::services::ClinicService;

#[axum::debug_handler]
pub async fn get_dashboard(
    State(state): State<Arc<AppState>>,
    CurrentClinic(clinic): CurrentClinic,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);

    let metrics = service.dashboard(&clinic, query.period()).await?;

    Ok(Json(json!(metrics)))
}

#[axum::debug_handler]
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    CurrentClinic(clinic): CurrentClinic,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);

    let leads = service.leads(&clinic).await?;

    Ok(Json(json!(leads)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    CurrentClinic(clinic): CurrentClinic,
    Query(query): Query<AppointmentQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);

    let appointments = service.appointments(&clinic, query.status).await?;

    Ok(Json(json!(appointments)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppState>>,
    CurrentClinic(clinic): CurrentClinic,
    Path(appointment_id): Path<i64>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);

    let appointment = service
        .update_appointment(&clinic, appointment_id, request)
        .await?;

    Ok(Json(json!({
        "message": "Appointment updated successfully",
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_price_list(
    State(state): State<Arc<AppState>>,
    CurrentClinic(clinic): CurrentClinic,
    Query(query): Query<PriceListQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);

    let items = service.price_list(&clinic, query.specialization).await?;

    Ok(Json(json!(items)))
}

#[axum::debug_handler]
pub async fn update_price_list(
    State(state): State<Arc<AppState>>,
    CurrentClinic(clinic): CurrentClinic,
    Json(items): Json<Vec<PriceListInput>>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);

    let saved = service.update_price_list(&clinic, items).await?;

    Ok(Json(json!({
        "message": "Price list updated successfully",
        "items": saved
    })))
}

#[axum::debug_handler]
pub async fn get_analytics(
    State(state): State<Arc<AppState>>,
    CurrentClinic(clinic): CurrentClinic,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Value>, AppError> {
    let service = ClinicService::new(&state);

    let analytics = service.analytics(&clinic, query.period()).await?;

    Ok(Json(json!(analytics)))
}
