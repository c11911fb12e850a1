// libs/clinic-cell/src/services/clinic.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use analytics_cell::{ClinicAnalytics, Period, StatisticsService};
use shared_database::{AppState, MarketplaceStore, PriceListInput};
use shared_models::{
    Appointment, AppointmentStatus, Clinic, ClinicOffer, OfferStatus, PriceListItem,
    Specialization,
};

use crate::models::{conversion_rate, ClinicError, DashboardMetrics, UpdateAppointmentRequest};
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct ClinicService {
    store: Arc<dyn MarketplaceStore>,
    statistics: StatisticsService,
    lifecycle: AppointmentLifecycleService,
}

impl ClinicService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            statistics: StatisticsService::new(state),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub async fn dashboard(
        &self,
        clinic: &Clinic,
        period: Period,
    ) -> Result<DashboardMetrics, ClinicError> {
        let range = period.range_ending(Utc::now().date_naive());

        let new_plans = self.store.count_plans_created(range).await?;
        let offers_sent = self.store.count_offers_created(clinic.id, range).await?;
        let leads = self.store.lead_summary(clinic.id).await?;

        debug!(
            "Clinic {} dashboard: {} offers, {} leads",
            clinic.id, offers_sent, leads.leads
        );
        Ok(DashboardMetrics {
            period,
            new_plans,
            offers_sent,
            leads: leads.leads,
            potential_revenue: leads.potential_revenue,
            conversion_rate: conversion_rate(leads.leads, offers_sent),
        })
    }

    /// Accepted offers, newest first.
    pub async fn leads(&self, clinic: &Clinic) -> Result<Vec<ClinicOffer>, ClinicError> {
        Ok(self
            .store
            .clinic_offers(clinic.id, Some(OfferStatus::Accepted))
            .await?)
    }

    pub async fn appointments(
        &self,
        clinic: &Clinic,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, ClinicError> {
        Ok(self.store.clinic_appointments(clinic.id, status).await?)
    }

    /// Moves one of the clinic's own appointments along its lifecycle. The
    /// row stays locked from the status check to the write.
    pub async fn update_appointment(
        &self,
        clinic: &Clinic,
        appointment_id: i64,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, ClinicError> {
        let mut tx = self.store.begin().await?;
        let current = match tx.appointment_for_update(appointment_id).await? {
            Some(appointment) if appointment.clinic_id == clinic.id => appointment,
            _ => return Err(ClinicError::AppointmentNotFound(appointment_id)),
        };

        self.lifecycle
            .validate_status_transition(current.status, request.status)?;

        let updated = tx
            .update_appointment(appointment_id, request.status, request.notes)
            .await?;
        tx.commit().await?;

        info!(
            "Appointment {} moved {} -> {} by clinic {}",
            appointment_id, current.status, updated.status, clinic.id
        );
        Ok(updated)
    }

    pub async fn price_list(
        &self,
        clinic: &Clinic,
        specialization: Option<Specialization>,
    ) -> Result<Vec<PriceListItem>, ClinicError> {
        Ok(self.store.price_list(clinic.id, specialization).await?)
    }

    /// Creates or replaces price-list rows in one transaction. A row id
    /// belonging to another clinic fails the whole batch.
    pub async fn update_price_list(
        &self,
        clinic: &Clinic,
        items: Vec<PriceListInput>,
    ) -> Result<Vec<PriceListItem>, ClinicError> {
        for item in &items {
            validate_price_item(item)?;
        }

        let mut tx = self.store.begin().await?;
        let mut saved = Vec::with_capacity(items.len());
        for item in &items {
            saved.push(tx.upsert_price_item(clinic.id, item).await?);
        }
        tx.commit().await?;

        info!("Clinic {} saved {} price list items", clinic.id, saved.len());
        Ok(saved)
    }

    pub async fn analytics(
        &self,
        clinic: &Clinic,
        period: Period,
    ) -> Result<ClinicAnalytics, ClinicError> {
        Ok(self.statistics.clinic_analytics(clinic, period).await?)
    }
}

fn validate_price_item(item: &PriceListInput) -> Result<(), ClinicError> {
    if item.service_name.trim().is_empty() {
        return Err(ClinicError::ValidationError(
            "service_name is required".to_string(),
        ));
    }
    if item.price < 0 || item.warranty_years < 0 {
        return Err(ClinicError::ValidationError(format!(
            "price and warranty of '{}' cannot be negative",
            item.service_name
        )));
    }
    Ok(())
}
