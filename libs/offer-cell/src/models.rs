// libs/offer-cell/src/models.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::DbError;
use shared_models::error::AppError;
use shared_models::{Appointment, ClinicOffer, CostBreakdown, OfferStatus, PlanStatus};

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmitOfferRequest {
    pub treatment_plan_id: i64,
    #[serde(flatten)]
    pub costs: CostBreakdown,
    pub total_cost: i64,
    pub estimated_duration: Option<String>,
    #[serde(default)]
    pub installment_months: i32,
    pub warranty_details: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SelectOfferRequest {
    pub offer_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncomingPlansQuery {
    pub status: Option<PlanStatus>,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

/// Result of a committed offer acceptance.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedOffer {
    pub offer: ClinicOffer,
    pub treatment_plan_id: i64,
    pub rejected_offers: u64,
    pub appointment: Appointment,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum OfferError {
    #[error("Offer {0} not found")]
    OfferNotFound(i64),

    #[error("Treatment plan {0} not found")]
    PlanNotFound(i64),

    #[error("Clinic {clinic_id} already submitted an offer for treatment plan {plan_id}")]
    DuplicateOffer { clinic_id: i64, plan_id: i64 },

    #[error("An offer has already been selected for treatment plan {0}")]
    AlreadySelected(i64),

    #[error("Treatment plan cannot move from {from} to {to}")]
    InvalidTransition { from: PlanStatus, to: PlanStatus },

    #[error("Offer {id} is {status} and cannot be accepted")]
    NotAcceptable { id: i64, status: OfferStatus },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage failures inside the lifecycle are internal unless they are
/// uniqueness conflicts; a row vanishing mid-transaction is never a 404.
impl From<DbError> for OfferError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::UniqueViolation(what) => OfferError::Conflict(what),
            other => OfferError::Internal(other.to_string()),
        }
    }
}

impl From<OfferError> for AppError {
    fn from(err: OfferError) -> Self {
        match err {
            OfferError::OfferNotFound(_) | OfferError::PlanNotFound(_) => {
                AppError::NotFound(err.to_string())
            }
            OfferError::DuplicateOffer { .. }
            | OfferError::AlreadySelected(_)
            | OfferError::InvalidTransition { .. }
            | OfferError::NotAcceptable { .. }
            | OfferError::Conflict(_) => AppError::Conflict(err.to_string()),
            OfferError::ValidationError(msg) => AppError::ValidationError(msg),
            OfferError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
