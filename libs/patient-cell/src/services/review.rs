use std::sync::Arc;

use tracing::{debug, info};

use shared_database::{AppState, MarketplaceStore, NewReview};
use shared_models::Patient;

use crate::models::{CreateReviewRequest, CreatedReview, PatientError};

/// Stores reviews and keeps the clinic's rating equal to the mean of its
/// live reviews.
pub struct ReviewService {
    store: Arc<dyn MarketplaceStore>,
}

impl ReviewService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
        }
    }

    pub async fn create_review(
        &self,
        patient: &Patient,
        request: CreateReviewRequest,
    ) -> Result<CreatedReview, PatientError> {
        if !(1..=5).contains(&request.rating) {
            return Err(PatientError::InvalidRating(request.rating));
        }

        let mut tx = self.store.begin().await?;
        // Locked so concurrent reviews recompute the rating one after another.
        if !tx.clinic_for_update(request.clinic_id).await? {
            return Err(PatientError::ClinicNotFound(request.clinic_id));
        }

        let review = tx
            .insert_review(&NewReview {
                patient_id: patient.id,
                clinic_id: request.clinic_id,
                rating: request.rating,
                comment: request.comment,
                is_public: false,
            })
            .await?;
        let clinic_rating = tx.refresh_clinic_rating(request.clinic_id).await?;
        tx.commit().await?;

        debug!("Review {} stored", review.id);
        info!(
            "Clinic {} rating is now {:.2} over {} reviews",
            request.clinic_id, clinic_rating.rating, clinic_rating.review_count
        );
        Ok(CreatedReview {
            review,
            clinic_rating,
        })
    }
}
