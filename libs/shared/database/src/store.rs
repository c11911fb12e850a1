// libs/shared/database/src/store.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use shared_models::{
    Appointment, AppointmentStatus, Clinic, ClinicOffer, Complaint, ComplaintStatus,
    CostBreakdown, CtScan, OfferStatus, Patient, PlanStatus, PriceListItem, PriceSegment,
    Regulator, Review, Specialization, Statistics, TreatmentPlan,
};

use crate::error::DbResult;

// ==============================================================================
// QUERY AND WRITE INPUTS
// ==============================================================================

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn contains_instant(&self, instant: DateTime<Utc>) -> bool {
        self.contains(instant.date_naive())
    }

    /// First instant of `start`.
    pub fn start_instant(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&self.start.and_time(NaiveTime::default()))
    }

    /// First instant after `end`.
    pub fn end_instant_exclusive(&self) -> DateTime<Utc> {
        Utc.from_utc_datetime(&(self.end + Duration::days(1)).and_time(NaiveTime::default()))
    }
}

/// Which statistics rows a query selects. Never mixes the two kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsScope {
    Regional,
    Clinic(i64),
}

impl StatisticsScope {
    pub fn from_clinic_id(clinic_id: Option<i64>) -> Self {
        match clinic_id {
            Some(id) => StatisticsScope::Clinic(id),
            None => StatisticsScope::Regional,
        }
    }

    pub fn matches(&self, row: &Statistics) -> bool {
        match self {
            StatisticsScope::Regional => row.clinic_id.is_none(),
            StatisticsScope::Clinic(id) => row.clinic_id == Some(*id),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicFilter {
    pub city: Option<String>,
    pub district: Option<String>,
}

impl ClinicFilter {
    pub fn matches(&self, clinic: &Clinic) -> bool {
        let city_ok = self
            .city
            .as_deref()
            .map_or(true, |city| clinic.city.as_deref() == Some(city));
        let district_ok = self
            .district
            .as_deref()
            .map_or(true, |district| clinic.district.as_deref() == Some(district));
        city_ok && district_ok
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub city: Option<String>,
    pub district: Option<String>,
    pub price_segment: Option<PriceSegment>,
}

#[derive(Debug, Clone, Default)]
pub struct NewClinicOffer {
    pub treatment_plan_id: i64,
    pub clinic_id: i64,
    pub status: OfferStatus,
    pub costs: CostBreakdown,
    pub total_cost: i64,
    pub estimated_duration: Option<String>,
    pub installment_months: i32,
    pub warranty_details: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: i64,
    pub clinic_id: i64,
    pub treatment_plan_id: i64,
    pub clinic_offer_id: i64,
    pub appointment_date: DateTime<Utc>,
    pub specialization: Option<Specialization>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub patient_id: i64,
    pub clinic_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub is_public: bool,
}

#[derive(Debug, Clone)]
pub struct NewComplaint {
    pub patient_id: i64,
    pub clinic_id: i64,
    pub subject: String,
    pub description: String,
}

/// Price-list row to create (`id == None`) or replace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceListInput {
    pub id: Option<i64>,
    pub specialization: Specialization,
    pub service_name: String,
    pub price: i64,
    #[serde(default)]
    pub warranty_years: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingSummary {
    pub rating: f64,
    pub review_count: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadSummary {
    pub leads: i64,
    pub potential_revenue: i64,
}

// ==============================================================================
// STORE TRAITS
// ==============================================================================

/// Relational store with transactional semantics.
///
/// Every read excludes soft-deleted rows. Multi-row writes go through
/// [`StoreTransaction`] obtained from [`MarketplaceStore::begin`].
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>>;

    // Profiles
    async fn patient_by_user_id(&self, user_id: i64) -> DbResult<Option<Patient>>;
    async fn clinic_by_user_id(&self, user_id: i64) -> DbResult<Option<Clinic>>;
    async fn regulator_by_user_id(&self, user_id: i64) -> DbResult<Option<Regulator>>;
    async fn clinic_by_id(&self, clinic_id: i64) -> DbResult<Option<Clinic>>;
    /// Ordered by rating, best first.
    async fn list_clinics(&self, filter: &ClinicFilter) -> DbResult<Vec<Clinic>>;
    async fn update_search_criteria(
        &self,
        patient_id: i64,
        criteria: &SearchCriteria,
    ) -> DbResult<Patient>;

    // Scans and plans
    /// Newest upload first.
    async fn patient_scans(&self, patient_id: i64) -> DbResult<Vec<CtScan>>;
    async fn scan_by_id(&self, scan_id: i64) -> DbResult<Option<CtScan>>;
    /// Plan with its items.
    async fn plan_by_id(&self, plan_id: i64) -> DbResult<Option<TreatmentPlan>>;
    /// Plan with its items.
    async fn plan_by_scan_id(&self, scan_id: i64) -> DbResult<Option<TreatmentPlan>>;
    /// Newest first, with items and patient-visible offers.
    async fn patient_plans(&self, patient_id: i64) -> DbResult<Vec<TreatmentPlan>>;
    /// Plans the clinic has not bid on, newest first, carrying only that
    /// clinic's own offers.
    async fn incoming_plans(
        &self,
        clinic_id: i64,
        status: Option<PlanStatus>,
    ) -> DbResult<Vec<TreatmentPlan>>;

    // Offers
    /// Non-pending offers of a plan, cheapest first, with the bidding clinic.
    async fn visible_offers(&self, plan_id: i64) -> DbResult<Vec<ClinicOffer>>;
    async fn offers_for_plan(&self, plan_id: i64) -> DbResult<Vec<ClinicOffer>>;
    /// Newest first.
    async fn clinic_offers(
        &self,
        clinic_id: i64,
        status: Option<OfferStatus>,
    ) -> DbResult<Vec<ClinicOffer>>;
    async fn lead_summary(&self, clinic_id: i64) -> DbResult<LeadSummary>;
    async fn count_offers_created(&self, clinic_id: i64, range: DateRange) -> DbResult<i64>;
    async fn count_plans_created(&self, range: DateRange) -> DbResult<i64>;

    // Appointments
    /// Latest appointment date first.
    async fn patient_appointments(&self, patient_id: i64) -> DbResult<Vec<Appointment>>;
    /// Latest appointment date first.
    async fn clinic_appointments(
        &self,
        clinic_id: i64,
        status: Option<AppointmentStatus>,
    ) -> DbResult<Vec<Appointment>>;
    async fn appointments_for_plan(&self, plan_id: i64) -> DbResult<Vec<Appointment>>;
    async fn appointment_by_id(&self, appointment_id: i64) -> DbResult<Option<Appointment>>;

    // Price list
    /// Ordered by specialization, then service name.
    async fn price_list(
        &self,
        clinic_id: i64,
        specialization: Option<Specialization>,
    ) -> DbResult<Vec<PriceListItem>>;

    // Feedback
    async fn reviews_for_clinic(&self, clinic_id: i64) -> DbResult<Vec<Review>>;
    async fn insert_complaint(&self, complaint: &NewComplaint) -> DbResult<Complaint>;
    /// Newest first.
    async fn list_complaints(&self, status: Option<ComplaintStatus>) -> DbResult<Vec<Complaint>>;

    // Statistics
    /// Ascending by date, inclusive range, rows of exactly one scope.
    async fn statistics(
        &self,
        range: DateRange,
        scope: StatisticsScope,
    ) -> DbResult<Vec<Statistics>>;
    async fn latest_clinic_statistics(&self, clinic_id: i64) -> DbResult<Option<Statistics>>;
}

/// Unit of work. Dropping it without [`StoreTransaction::commit`] discards
/// every write made through it.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Loads and row-locks an offer, locking its plan row first.
    async fn offer_for_update(&mut self, offer_id: i64) -> DbResult<Option<ClinicOffer>>;
    /// Loads and row-locks a plan (without items or offers).
    async fn plan_for_update(&mut self, plan_id: i64) -> DbResult<Option<TreatmentPlan>>;
    async fn clinic_exists(&mut self, clinic_id: i64) -> DbResult<bool>;
    /// Row-locks a live clinic; `false` when there is none. Writers of a
    /// clinic's aggregate rating take this lock before touching its reviews.
    async fn clinic_for_update(&mut self, clinic_id: i64) -> DbResult<bool>;
    async fn clinic_has_offer(&mut self, plan_id: i64, clinic_id: i64) -> DbResult<bool>;

    async fn insert_offer(&mut self, offer: &NewClinicOffer) -> DbResult<ClinicOffer>;
    async fn set_offer_status(&mut self, offer_id: i64, status: OfferStatus) -> DbResult<()>;
    /// Rejects every other live offer of the plan; returns how many changed.
    async fn reject_competing_offers(&mut self, plan_id: i64, keep_offer_id: i64) -> DbResult<u64>;
    async fn set_plan_status(&mut self, plan_id: i64, status: PlanStatus) -> DbResult<()>;
    async fn insert_appointment(&mut self, appointment: &NewAppointment) -> DbResult<Appointment>;
    async fn appointment_for_update(
        &mut self,
        appointment_id: i64,
    ) -> DbResult<Option<Appointment>>;
    /// Sets the status; `notes == None` keeps the stored notes.
    async fn update_appointment(
        &mut self,
        appointment_id: i64,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> DbResult<Appointment>;

    async fn insert_review(&mut self, review: &NewReview) -> DbResult<Review>;
    /// Recomputes AVG/COUNT over the clinic's live reviews and stores them.
    async fn refresh_clinic_rating(&mut self, clinic_id: i64) -> DbResult<RatingSummary>;

    async fn upsert_price_item(
        &mut self,
        clinic_id: i64,
        item: &PriceListInput,
    ) -> DbResult<PriceListItem>;

    async fn commit(self: Box<Self>) -> DbResult<()>;
}
