// libs/analytics-cell/src/models.rs
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::{DateRange, DbError};
use shared_models::error::AppError;
use shared_models::{Clinic, ComplaintStatus, Statistics};

// ==============================================================================
// PERIODS
// ==============================================================================

/// Symbolic reporting window. Anything unrecognised reads as 30 days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Period {
    SevenDays,
    #[default]
    ThirtyDays,
    NinetyDays,
}

impl Period {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("7d") => Period::SevenDays,
            Some("90d") => Period::NinetyDays,
            _ => Period::ThirtyDays,
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Period::SevenDays => 7,
            Period::ThirtyDays => 30,
            Period::NinetyDays => 90,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::SevenDays => "7d",
            Period::ThirtyDays => "30d",
            Period::NinetyDays => "90d",
        }
    }

    /// `[today - N days, today]`, both ends included.
    pub fn range_ending(&self, today: NaiveDate) -> DateRange {
        DateRange::new(today - Duration::days(self.days()), today)
    }
}

impl Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

// ==============================================================================
// QUERY MODELS
// ==============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub period: Option<String>,
}

impl PeriodQuery {
    pub fn period(&self) -> Period {
        Period::parse(self.period.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StatisticsQuery {
    pub period: Option<String>,
    pub clinic_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClinicListQuery {
    pub city: Option<String>,
    pub district: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ComplaintQuery {
    pub status: Option<ComplaintStatus>,
}

// ==============================================================================
// ROLLUPS
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiseaseCounts {
    pub caries: i64,
    pub pulpitis: i64,
    pub periodontitis: i64,
    pub gingivitis: i64,
    pub parodontitis: i64,
}

impl DiseaseCounts {
    pub fn total(&self) -> i64 {
        self.caries + self.pulpitis + self.periodontitis + self.gingivitis + self.parodontitis
    }

    /// Counters in reporting order.
    pub fn entries(&self) -> [(&'static str, i64); 5] {
        [
            ("caries", self.caries),
            ("pulpitis", self.pulpitis),
            ("periodontitis", self.periodontitis),
            ("gingivitis", self.gingivitis),
            ("parodontitis", self.parodontitis),
        ]
    }
}

/// Sums and means over a set of daily statistics rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsRollup {
    pub days_reported: usize,
    pub total_treatment_plans: i64,
    pub total_appointments: i64,
    pub total_revenue: i64,
    pub total_patients: i64,
    pub average_wait_days: f64,
    pub average_treatment_cost: i64,
    #[serde(skip)]
    pub diseases: DiseaseCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiseaseShare {
    pub disease: &'static str,
    pub count: i64,
    pub percentage: f64,
}

// ==============================================================================
// RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub total_clinics: usize,
    #[serde(flatten)]
    pub rollup: StatisticsRollup,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionalDashboard {
    pub period: Period,
    pub summary: DashboardSummary,
    pub disease_statistics: DiseaseCounts,
    pub time_series: Vec<Statistics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    pub period: Period,
    pub clinic: Option<Clinic>,
    pub statistics: Vec<Statistics>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiseaseAnalytics {
    pub period: Period,
    pub total_cases: i64,
    pub diseases: Vec<DiseaseShare>,
    pub time_series: Vec<Statistics>,
}

/// Clinic with figures from its most recent per-clinic statistics row.
#[derive(Debug, Clone, Serialize)]
pub struct ClinicOverview {
    #[serde(flatten)]
    pub clinic: Clinic,
    pub patient_count: i64,
    pub total_revenue: i64,
    pub average_wait_days: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClinicDetails {
    pub clinic: Clinic,
    pub period: Period,
    pub statistics: Vec<Statistics>,
    pub rollup: StatisticsRollup,
    pub price_list_count: usize,
    pub appointments_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClinicAnalytics {
    pub period: Period,
    pub clinic: Clinic,
    pub statistics: Vec<Statistics>,
    pub rollup: StatisticsRollup,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Clinic {0} not found")]
    ClinicNotFound(i64),

    #[error("Database error: {0}")]
    Database(#[from] DbError),
}

impl From<AnalyticsError> for AppError {
    fn from(err: AnalyticsError) -> Self {
        match err {
            AnalyticsError::ClinicNotFound(_) => AppError::NotFound(err.to_string()),
            AnalyticsError::Database(db) => db.into(),
        }
    }
}
