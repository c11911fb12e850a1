// libs/clinic-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use analytics_cell::{AnalyticsError, Period};
use shared_database::DbError;
use shared_models::error::AppError;
use shared_models::{AppointmentStatus, Specialization};

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateAppointmentRequest {
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PriceListQuery {
    pub specialization: Option<Specialization>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub period: Period,
    /// Plans created across the marketplace in the period.
    pub new_plans: i64,
    /// Offers this clinic created in the period.
    pub offers_sent: i64,
    /// Accepted offers, all time.
    pub leads: i64,
    pub potential_revenue: i64,
    pub conversion_rate: String,
}

/// `leads / offers_sent` as a one-decimal percentage, `"0%"` without offers.
pub fn conversion_rate(leads: i64, offers_sent: i64) -> String {
    if offers_sent > 0 {
        format!("{:.1}%", leads as f64 / offers_sent as f64 * 100.0)
    } else {
        "0%".to_string()
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Appointment {0} not found")]
    AppointmentNotFound(i64),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<ClinicError> for AppError {
    fn from(err: ClinicError) -> Self {
        match err {
            ClinicError::AppointmentNotFound(_) => AppError::NotFound(err.to_string()),
            ClinicError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            ClinicError::ValidationError(msg) => AppError::ValidationError(msg),
            ClinicError::Analytics(analytics) => analytics.into(),
            ClinicError::Database(db) => db.into(),
        }
    }
}
