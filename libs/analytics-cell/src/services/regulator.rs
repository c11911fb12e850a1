// libs/analytics-cell/src/services/regulator.rs
use std::sync::Arc;

use tracing::{debug, info};

use shared_database::{AppState, ClinicFilter, MarketplaceStore, StatisticsScope};
use shared_models::{Complaint, ComplaintStatus};

use crate::models::{
    AnalyticsError, ClinicDetails, ClinicOverview, DashboardSummary, DiseaseAnalytics, Period,
    RegionalDashboard, StatisticsReport,
};
use crate::services::statistics::{disease_breakdown, rollup, StatisticsService};

/// Regional oversight queries for regulators.
pub struct RegulatorService {
    store: Arc<dyn MarketplaceStore>,
    statistics: StatisticsService,
}

impl RegulatorService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
            statistics: StatisticsService::new(state),
        }
    }

    pub async fn dashboard(&self, period: Period) -> Result<RegionalDashboard, AnalyticsError> {
        let time_series = self
            .statistics
            .for_period(period, StatisticsScope::Regional)
            .await?;
        let total_clinics = self.store.list_clinics(&ClinicFilter::default()).await?.len();

        let rollup = rollup(&time_series);
        info!(
            "Regional dashboard for {}: {} days, {} clinics",
            period.label(),
            rollup.days_reported,
            total_clinics
        );

        Ok(RegionalDashboard {
            period,
            disease_statistics: rollup.diseases,
            summary: DashboardSummary {
                total_clinics,
                rollup,
            },
            time_series,
        })
    }

    /// Regional rows, or one clinic's rows when `clinic_id` is given.
    pub async fn statistics(
        &self,
        period: Period,
        clinic_id: Option<i64>,
    ) -> Result<StatisticsReport, AnalyticsError> {
        let scope = StatisticsScope::from_clinic_id(clinic_id);
        let statistics = self.statistics.for_period(period, scope).await?;

        let clinic = match clinic_id {
            Some(id) => self.store.clinic_by_id(id).await?,
            None => None,
        };

        Ok(StatisticsReport {
            period,
            clinic,
            statistics,
        })
    }

    pub async fn disease_analytics(
        &self,
        period: Period,
    ) -> Result<DiseaseAnalytics, AnalyticsError> {
        let time_series = self
            .statistics
            .for_period(period, StatisticsScope::Regional)
            .await?;
        let counts = rollup(&time_series).diseases;

        Ok(DiseaseAnalytics {
            period,
            total_cases: counts.total(),
            diseases: disease_breakdown(&counts),
            time_series,
        })
    }

    /// Clinics by rating, each with its latest per-clinic figures.
    pub async fn clinics(
        &self,
        filter: &ClinicFilter,
    ) -> Result<Vec<ClinicOverview>, AnalyticsError> {
        let clinics = self.store.list_clinics(filter).await?;
        debug!("Regulator listing {} clinics", clinics.len());

        let mut overview = Vec::with_capacity(clinics.len());
        for clinic in clinics {
            let latest = self.store.latest_clinic_statistics(clinic.id).await?;
            let (patient_count, total_revenue, average_wait_days) = latest
                .map(|s| (s.patient_count, s.total_revenue, s.average_wait_days))
                .unwrap_or_default();
            overview.push(ClinicOverview {
                clinic,
                patient_count,
                total_revenue,
                average_wait_days,
            });
        }
        Ok(overview)
    }

    pub async fn clinic_details(
        &self,
        clinic_id: i64,
        period: Period,
    ) -> Result<ClinicDetails, AnalyticsError> {
        let clinic = self
            .store
            .clinic_by_id(clinic_id)
            .await?
            .ok_or(AnalyticsError::ClinicNotFound(clinic_id))?;

        let statistics = self
            .statistics
            .for_period(period, StatisticsScope::Clinic(clinic_id))
            .await?;
        let price_list_count = self.store.price_list(clinic_id, None).await?.len();
        let appointments_count = self.store.clinic_appointments(clinic_id, None).await?.len();

        Ok(ClinicDetails {
            clinic,
            period,
            rollup: rollup(&statistics),
            statistics,
            price_list_count,
            appointments_count,
        })
    }

    pub async fn complaints(
        &self,
        status: Option<ComplaintStatus>,
    ) -> Result<Vec<Complaint>, AnalyticsError> {
        Ok(self.store.list_complaints(status).await?)
    }
}
