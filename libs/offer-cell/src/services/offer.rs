// libs/offer-cell/src/services/offer.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use shared_database::{AppState, MarketplaceStore, NewAppointment, NewClinicOffer};
use shared_models::{
    AppointmentStatus, Clinic, ClinicOffer, OfferStatus, PlanStatus, Specialization,
    TreatmentPlan,
};

use crate::models::{AcceptedOffer, OfferError, SubmitOfferRequest};
use crate::services::lifecycle::PlanLifecycleService;

const INITIAL_APPOINTMENT_NOTES: &str = "Initial consultation";

pub struct OfferService {
    store: Arc<dyn MarketplaceStore>,
    lifecycle: PlanLifecycleService,
    appointment_lead_days: i64,
}

impl OfferService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            lifecycle: PlanLifecycleService::new(),
            appointment_lead_days: state.config.appointment_lead_days,
        }
    }

    // ==============================================================================
    // CLINIC SIDE
    // ==============================================================================

    /// Records a clinic's bid and moves the plan to `offers_received`.
    ///
    /// The offer is created as `sent`. `total_cost` is stored as given; a
    /// mismatch with the per-specialization components is only logged.
    pub async fn submit_offer(
        &self,
        clinic: &Clinic,
        request: SubmitOfferRequest,
    ) -> Result<ClinicOffer, OfferError> {
        let plan_id = request.treatment_plan_id;
        debug!("Clinic {} submitting offer for plan {}", clinic.id, plan_id);

        validate_costs(&request)?;

        let mut tx = self.store.begin().await?;

        let plan = tx
            .plan_for_update(plan_id)
            .await?
            .ok_or(OfferError::PlanNotFound(plan_id))?;

        if tx.clinic_has_offer(plan_id, clinic.id).await? {
            warn!("Clinic {} already bid on plan {}", clinic.id, plan_id);
            return Err(OfferError::DuplicateOffer {
                clinic_id: clinic.id,
                plan_id,
            });
        }

        self.lifecycle
            .validate_transition(plan.status, PlanStatus::OffersReceived)?;

        let component_sum = request.costs.component_sum();
        if component_sum != request.total_cost {
            warn!(
                "Offer total {} differs from component sum {} (clinic {}, plan {})",
                request.total_cost, component_sum, clinic.id, plan_id
            );
        }

        let offer = tx
            .insert_offer(&NewClinicOffer {
                treatment_plan_id: plan_id,
                clinic_id: clinic.id,
                status: OfferStatus::Sent,
                costs: request.costs,
                total_cost: request.total_cost,
                estimated_duration: request.estimated_duration,
                installment_months: request.installment_months,
                warranty_details: request.warranty_details,
                notes: request.notes,
            })
            .await?;

        // Re-applied on every bid
        tx.set_plan_status(plan_id, PlanStatus::OffersReceived).await?;
        tx.commit().await?;

        info!(
            "Offer {} submitted by clinic {} for plan {} ({} -> {})",
            offer.id,
            clinic.id,
            plan_id,
            plan.status,
            PlanStatus::OffersReceived
        );
        Ok(offer)
    }

    /// Plans the clinic has not bid on yet, newest first.
    pub async fn incoming_plans(
        &self,
        clinic_id: i64,
        status: Option<PlanStatus>,
    ) -> Result<Vec<TreatmentPlan>, OfferError> {
        debug!("Listing incoming plans for clinic {}", clinic_id);
        Ok(self.store.incoming_plans(clinic_id, status).await?)
    }

    // ==============================================================================
    // PATIENT SIDE
    // ==============================================================================

    /// Offers a patient may see for a plan: never `pending`, cheapest first.
    pub async fn offers_for_plan(&self, plan_id: i64) -> Result<Vec<ClinicOffer>, OfferError> {
        let offers = self.store.visible_offers(plan_id).await?;
        Ok(offers
            .into_iter()
            .filter(|offer| self.lifecycle.is_visible_to_patient(offer.status))
            .collect())
    }

    /// Same as [`Self::offers_for_plan`], for a plan the patient owns.
    pub async fn patient_offers_for_plan(
        &self,
        patient_id: i64,
        plan_id: i64,
    ) -> Result<Vec<ClinicOffer>, OfferError> {
        match self.store.plan_by_id(plan_id).await? {
            Some(plan) if plan.patient_id == patient_id => self.offers_for_plan(plan_id).await,
            _ => Err(OfferError::PlanNotFound(plan_id)),
        }
    }

    /// Accepts one offer, rejects its competitors, closes the plan and books
    /// the initial appointment, all in one transaction.
    pub async fn accept_offer(
        &self,
        offer_id: i64,
        patient_id: i64,
    ) -> Result<AcceptedOffer, OfferError> {
        debug!("Patient {} accepting offer {}", patient_id, offer_id);

        let mut tx = self.store.begin().await?;

        let mut offer = match tx.offer_for_update(offer_id).await? {
            Some(offer) if self.lifecycle.is_visible_to_patient(offer.status) => offer,
            _ => return Err(OfferError::OfferNotFound(offer_id)),
        };
        let plan_id = offer.treatment_plan_id;

        let plan = tx.plan_for_update(plan_id).await?.ok_or_else(|| {
            error!("Offer {} references missing plan {}", offer_id, plan_id);
            OfferError::Internal(format!("treatment plan {plan_id} of offer {offer_id} is missing"))
        })?;

        if plan.patient_id != patient_id {
            warn!(
                "Patient {} tried to accept offer {} on plan {} they do not own",
                patient_id, offer_id, plan_id
            );
            return Err(OfferError::OfferNotFound(offer_id));
        }

        if plan.status == PlanStatus::OfferSelected {
            warn!("Plan {} already has a selected offer", plan_id);
            return Err(OfferError::AlreadySelected(plan_id));
        }
        self.lifecycle
            .validate_transition(plan.status, PlanStatus::OfferSelected)?;

        if !self.lifecycle.can_accept_offer(offer.status) {
            warn!("Offer {} is {} and cannot be accepted", offer_id, offer.status);
            return Err(OfferError::NotAcceptable {
                id: offer_id,
                status: offer.status,
            });
        }

        if !tx.clinic_exists(offer.clinic_id).await? {
            error!("Offer {} references missing clinic {}", offer_id, offer.clinic_id);
            return Err(OfferError::Internal(format!(
                "clinic {} of offer {offer_id} is missing",
                offer.clinic_id
            )));
        }

        tx.set_offer_status(offer_id, OfferStatus::Accepted).await?;
        let rejected_offers = tx.reject_competing_offers(plan_id, offer_id).await?;
        tx.set_plan_status(plan_id, PlanStatus::OfferSelected).await?;

        let appointment = tx
            .insert_appointment(&NewAppointment {
                patient_id: plan.patient_id,
                clinic_id: offer.clinic_id,
                treatment_plan_id: plan_id,
                clinic_offer_id: offer_id,
                appointment_date: Utc::now() + Duration::days(self.appointment_lead_days),
                specialization: None,
                status: AppointmentStatus::Scheduled,
                notes: Some(INITIAL_APPOINTMENT_NOTES.to_string()),
            })
            .await?;

        tx.commit().await?;

        info!(
            "Offer {} accepted for plan {}: {} competing offers rejected, appointment {} on {}",
            offer_id, plan_id, rejected_offers, appointment.id, appointment.appointment_date
        );

        offer.status = OfferStatus::Accepted;
        Ok(AcceptedOffer {
            offer,
            treatment_plan_id: plan_id,
            rejected_offers,
            appointment,
        })
    }
}

fn validate_costs(request: &SubmitOfferRequest) -> Result<(), OfferError> {
    if request.total_cost <= 0 {
        return Err(OfferError::ValidationError(
            "total_cost must be positive".to_string(),
        ));
    }
    if Specialization::ALL
        .iter()
        .any(|s| request.costs.cost_for(*s) < 0)
    {
        return Err(OfferError::ValidationError(
            "cost components cannot be negative".to_string(),
        ));
    }
    if request.installment_months < 0 {
        return Err(OfferError::ValidationError(
            "installment_months cannot be negative".to_string(),
        ));
    }
    Ok(())
}
