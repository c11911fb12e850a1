use serde::{Deserialize, Serialize};

use shared_database::{DbError, RatingSummary};
use shared_models::error::AppError;
use shared_models::{CtScan, PriceSegment, Review, TreatmentPlan};

#[derive(Debug, Clone, Serialize)]
pub struct ScanDetails {
    pub scan: CtScan,
    /// Present once AI processing has produced a plan.
    pub treatment_plan: Option<TreatmentPlan>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteriaRequest {
    pub city: Option<String>,
    pub district: Option<String>,
    pub price_segment: Option<PriceSegment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReviewRequest {
    pub clinic_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedReview {
    pub review: Review,
    pub clinic_rating: RatingSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateComplaintRequest {
    pub clinic_id: i64,
    pub subject: String,
    pub description: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Scan {0} not found")]
    ScanNotFound(i64),

    #[error("Treatment plan for scan {0} not found")]
    PlanNotFound(i64),

    #[error("Clinic {0} not found")]
    ClinicNotFound(i64),

    #[error("Rating must be between 1 and 5, got {0}")]
    InvalidRating(i32),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbError),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::ScanNotFound(_)
            | PatientError::PlanNotFound(_)
            | PatientError::ClinicNotFound(_) => AppError::NotFound(err.to_string()),
            PatientError::InvalidRating(_) => AppError::ValidationError(err.to_string()),
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::DatabaseError(db) => db.into(),
        }
    }
}
