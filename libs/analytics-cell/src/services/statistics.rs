// libs/analytics-cell/src/services/statistics.rs
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tracing::debug;

use shared_database::{AppState, DateRange, MarketplaceStore, StatisticsScope};
use shared_models::{Clinic, Statistics};

use crate::models::{
    AnalyticsError, ClinicAnalytics, DiseaseCounts, DiseaseShare, Period, StatisticsRollup,
};

/// Read-only view over the daily statistics series.
pub struct StatisticsService {
    store: Arc<dyn MarketplaceStore>,
}

impl StatisticsService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
        }
    }

    /// Rows of exactly one scope inside `range`, oldest first.
    pub async fn get_statistics(
        &self,
        range: DateRange,
        scope: StatisticsScope,
    ) -> Result<Vec<Statistics>, AnalyticsError> {
        debug!(
            "Loading statistics {:?} from {} to {}",
            scope, range.start, range.end
        );
        Ok(self.store.statistics(range, scope).await?)
    }

    pub async fn for_period(
        &self,
        period: Period,
        scope: StatisticsScope,
    ) -> Result<Vec<Statistics>, AnalyticsError> {
        self.get_statistics(period.range_ending(today()), scope).await
    }

    pub async fn clinic_analytics(
        &self,
        clinic: &Clinic,
        period: Period,
    ) -> Result<ClinicAnalytics, AnalyticsError> {
        let statistics = self
            .for_period(period, StatisticsScope::Clinic(clinic.id))
            .await?;
        Ok(ClinicAnalytics {
            period,
            clinic: clinic.clone(),
            rollup: rollup(&statistics),
            statistics,
        })
    }
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Sums the counters and averages wait days and treatment cost per row.
/// An empty slice yields all zeroes.
pub fn rollup(rows: &[Statistics]) -> StatisticsRollup {
    let mut summary = StatisticsRollup {
        days_reported: rows.len(),
        ..StatisticsRollup::default()
    };
    let mut wait_days = 0.0;
    let mut treatment_cost = 0.0;

    for row in rows {
        summary.total_treatment_plans += row.treatment_plans_generated;
        summary.total_appointments += row.appointments_completed;
        summary.total_revenue += row.total_revenue;
        summary.total_patients += row.patient_count;

        summary.diseases.caries += row.caries_count;
        summary.diseases.pulpitis += row.pulpitis_count;
        summary.diseases.periodontitis += row.periodontitis_count;
        summary.diseases.gingivitis += row.gingivitis_count;
        summary.diseases.parodontitis += row.parodontitis_count;

        wait_days += row.average_wait_days;
        treatment_cost += row.average_treatment_cost as f64;
    }

    if !rows.is_empty() {
        let count = rows.len() as f64;
        summary.average_wait_days = wait_days / count;
        summary.average_treatment_cost = (treatment_cost / count) as i64;
    }
    summary
}

/// Share of each disease in the total case count, in reporting order.
/// Every share is 0 when there are no cases.
pub fn disease_breakdown(counts: &DiseaseCounts) -> Vec<DiseaseShare> {
    let total = counts.total();
    counts
        .entries()
        .into_iter()
        .map(|(disease, count)| DiseaseShare {
            disease,
            count,
            percentage: if total > 0 {
                count as f64 / total as f64 * 100.0
            } else {
                0.0
            },
        })
        .collect()
}
