// libs/offer-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use shared_models::{OfferStatus, PlanStatus};

use crate::models::OfferError;

/// Legal moves of a treatment plan and of the offers bidding on it.
///
/// ```text
/// generated --(offer submitted)--> offers_received
/// offers_received --(offer submitted)--> offers_received
/// offers_received --(offer selected)--> offer_selected
/// ```
///
/// `offers_requested` is declared but nothing enters it; it behaves like
/// `generated` when an offer arrives.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlanLifecycleService;

impl PlanLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_transition(&self, current: PlanStatus, next: PlanStatus) -> Result<(), OfferError> {
        debug!("Validating plan transition from {} to {}", current, next);

        if !self.get_valid_transitions(current).contains(&next) {
            warn!("Invalid plan transition attempted: {} -> {}", current, next);
            return Err(OfferError::InvalidTransition { from: current, to: next });
        }
        Ok(())
    }

    pub fn get_valid_transitions(&self, current: PlanStatus) -> Vec<PlanStatus> {
        match current {
            PlanStatus::Generated | PlanStatus::OffersRequested => vec![PlanStatus::OffersReceived],
            PlanStatus::OffersReceived => {
                vec![PlanStatus::OffersReceived, PlanStatus::OfferSelected]
            }
            // Terminal for this engine
            PlanStatus::OfferSelected => vec![],
        }
    }

    pub fn is_terminal(&self, status: PlanStatus) -> bool {
        self.get_valid_transitions(status).is_empty()
    }

    /// Whether a patient may still pick this offer.
    pub fn can_accept_offer(&self, status: OfferStatus) -> bool {
        status == OfferStatus::Sent
    }

    /// Whether patients get to see this offer at all.
    pub fn is_visible_to_patient(&self, status: OfferStatus) -> bool {
        status != OfferStatus::Pending
    }
}
