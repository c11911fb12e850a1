// libs/shared/database/src/memory.rs
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use shared_models::{
    Appointment, AppointmentStatus, Clinic, ClinicOffer, Complaint, ComplaintStatus, CtScan,
    OfferStatus, Patient, PlanStatus, PriceListItem, Regulator, Review, Specialization,
    Statistics, TreatmentItem, TreatmentPlan,
};

use crate::error::{DbError, DbResult};
use crate::store::{
    ClinicFilter, DateRange, LeadSummary, MarketplaceStore, NewAppointment, NewClinicOffer,
    NewComplaint, NewReview, PriceListInput, RatingSummary, SearchCriteria, StatisticsScope,
    StoreTransaction,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    next_id: i64,
    patients: BTreeMap<i64, Patient>,
    clinics: BTreeMap<i64, Clinic>,
    regulators: BTreeMap<i64, Regulator>,
    scans: BTreeMap<i64, CtScan>,
    plans: BTreeMap<i64, TreatmentPlan>,
    items: BTreeMap<i64, TreatmentItem>,
    offers: BTreeMap<i64, ClinicOffer>,
    appointments: BTreeMap<i64, Appointment>,
    reviews: BTreeMap<i64, Review>,
    complaints: BTreeMap<i64, Complaint>,
    price_items: BTreeMap<i64, PriceListItem>,
    statistics: BTreeMap<i64, Statistics>,
}

/// Process-local store backing tests and credential-less runs.
///
/// A transaction owns the state lock until it commits or is dropped, so
/// callers must not use the store's read methods while holding one.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

fn stamp(ts: &mut DateTime<Utc>, now: DateTime<Utc>) {
    if *ts == DateTime::<Utc>::default() {
        *ts = now;
    }
}

/// Newest first, ties broken by id.
fn newest_first<T>(rows: &mut [T], key: impl Fn(&T) -> (DateTime<Utc>, i64)) {
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn live_clinic(&self, clinic_id: i64) -> Option<Clinic> {
        self.clinics
            .get(&clinic_id)
            .filter(|c| c.deleted_at.is_none())
            .cloned()
    }

    fn live_plan(&self, plan_id: i64) -> Option<TreatmentPlan> {
        self.plans
            .get(&plan_id)
            .filter(|p| p.deleted_at.is_none())
            .cloned()
    }

    fn live_offer(&self, offer_id: i64) -> Option<ClinicOffer> {
        self.offers
            .get(&offer_id)
            .filter(|o| o.deleted_at.is_none())
            .cloned()
    }

    fn plan_items(&self, plan_id: i64) -> Vec<TreatmentItem> {
        self.items
            .values()
            .filter(|i| i.treatment_plan_id == plan_id && i.deleted_at.is_none())
            .cloned()
            .collect()
    }

    fn with_items(&self, mut plan: TreatmentPlan) -> TreatmentPlan {
        plan.items = self.plan_items(plan.id);
        plan
    }

    fn live_offers_of_plan(&self, plan_id: i64) -> impl Iterator<Item = &ClinicOffer> {
        self.offers
            .values()
            .filter(move |o| o.treatment_plan_id == plan_id && o.deleted_at.is_none())
    }

    fn visible_offers(&self, plan_id: i64) -> Vec<ClinicOffer> {
        let mut offers: Vec<ClinicOffer> = self
            .live_offers_of_plan(plan_id)
            .filter(|o| o.status != OfferStatus::Pending)
            .cloned()
            .map(|mut o| {
                o.clinic = self.live_clinic(o.clinic_id);
                o
            })
            .collect();
        offers.sort_by_key(|o| (o.total_cost, o.id));
        offers
    }

    fn has_offer(&self, plan_id: i64, clinic_id: i64) -> bool {
        self.live_offers_of_plan(plan_id)
            .any(|o| o.clinic_id == clinic_id)
    }

    fn live_reviews(&self, clinic_id: i64) -> impl Iterator<Item = &Review> {
        self.reviews
            .values()
            .filter(move |r| r.clinic_id == clinic_id && r.deleted_at.is_none())
    }

    fn sorted_appointments(&self, pred: impl Fn(&Appointment) -> bool) -> Vec<Appointment> {
        let mut rows: Vec<Appointment> = self
            .appointments
            .values()
            .filter(|a| a.deleted_at.is_none() && pred(a))
            .cloned()
            .collect();
        newest_first(&mut rows, |a| (a.appointment_date, a.id));
        rows
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // Seeding. Ids of zero are assigned; unset timestamps become "now".

    pub async fn insert_patient(&self, mut patient: Patient) -> Patient {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if patient.id == 0 {
            patient.id = state.next_id();
        }
        stamp(&mut patient.created_at, now);
        stamp(&mut patient.updated_at, now);
        state.patients.insert(patient.id, patient.clone());
        patient
    }

    pub async fn insert_clinic(&self, mut clinic: Clinic) -> Clinic {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if clinic.id == 0 {
            clinic.id = state.next_id();
        }
        stamp(&mut clinic.created_at, now);
        stamp(&mut clinic.updated_at, now);
        state.clinics.insert(clinic.id, clinic.clone());
        clinic
    }

    pub async fn insert_regulator(&self, mut regulator: Regulator) -> Regulator {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if regulator.id == 0 {
            regulator.id = state.next_id();
        }
        stamp(&mut regulator.created_at, now);
        stamp(&mut regulator.updated_at, now);
        state.regulators.insert(regulator.id, regulator.clone());
        regulator
    }

    pub async fn insert_scan(&self, mut scan: CtScan) -> CtScan {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if scan.id == 0 {
            scan.id = state.next_id();
        }
        stamp(&mut scan.upload_date, now);
        stamp(&mut scan.created_at, now);
        stamp(&mut scan.updated_at, now);
        state.scans.insert(scan.id, scan.clone());
        scan
    }

    /// Stores the plan and its items; the returned plan carries them.
    pub async fn insert_plan(&self, mut plan: TreatmentPlan) -> TreatmentPlan {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if plan.id == 0 {
            plan.id = state.next_id();
        }
        stamp(&mut plan.created_at, now);
        stamp(&mut plan.updated_at, now);

        let items = std::mem::take(&mut plan.items);
        plan.offers.clear();
        for mut item in items {
            if item.id == 0 {
                item.id = state.next_id();
            }
            item.treatment_plan_id = plan.id;
            stamp(&mut item.created_at, now);
            state.items.insert(item.id, item);
        }
        state.plans.insert(plan.id, plan.clone());
        state.with_items(plan)
    }

    pub async fn insert_offer(&self, mut offer: ClinicOffer) -> ClinicOffer {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if offer.id == 0 {
            offer.id = state.next_id();
        }
        stamp(&mut offer.created_at, now);
        stamp(&mut offer.updated_at, now);
        offer.clinic = None;
        state.offers.insert(offer.id, offer.clone());
        offer
    }

    pub async fn insert_statistics(&self, mut row: Statistics) -> Statistics {
        let mut state = self.state.lock().await;
        if row.id == 0 {
            row.id = state.next_id();
        }
        stamp(&mut row.created_at, Utc::now());
        state.statistics.insert(row.id, row.clone());
        row
    }

    /// Inserts a review without touching the clinic's aggregate.
    pub async fn insert_review(&self, mut review: Review) -> Review {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if review.id == 0 {
            review.id = state.next_id();
        }
        stamp(&mut review.created_at, now);
        stamp(&mut review.updated_at, now);
        state.reviews.insert(review.id, review.clone());
        review
    }

    pub async fn insert_price_item(&self, mut item: PriceListItem) -> PriceListItem {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        if item.id == 0 {
            item.id = state.next_id();
        }
        stamp(&mut item.created_at, now);
        stamp(&mut item.updated_at, now);
        state.price_items.insert(item.id, item.clone());
        item
    }

    pub async fn soft_delete_offer(&self, offer_id: i64) {
        if let Some(offer) = self.state.lock().await.offers.get_mut(&offer_id) {
            offer.deleted_at = Some(Utc::now());
        }
    }

    pub async fn soft_delete_plan(&self, plan_id: i64) {
        if let Some(plan) = self.state.lock().await.plans.get_mut(&plan_id) {
            plan.deleted_at = Some(Utc::now());
        }
    }

    pub async fn soft_delete_clinic(&self, clinic_id: i64) {
        if let Some(clinic) = self.state.lock().await.clinics.get_mut(&clinic_id) {
            clinic.deleted_at = Some(Utc::now());
        }
    }

    pub async fn soft_delete_review(&self, review_id: i64) {
        if let Some(review) = self.state.lock().await.reviews.get_mut(&review_id) {
            review.deleted_at = Some(Utc::now());
        }
    }
}

#[async_trait]
impl MarketplaceStore for InMemoryStore {
    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        debug!("in-memory transaction started");
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn patient_by_user_id(&self, user_id: i64) -> DbResult<Option<Patient>> {
        let state = self.state.lock().await;
        Ok(state
            .patients
            .values()
            .find(|p| p.user_id == user_id && p.deleted_at.is_none())
            .cloned())
    }

    async fn clinic_by_user_id(&self, user_id: i64) -> DbResult<Option<Clinic>> {
        let state = self.state.lock().await;
        Ok(state
            .clinics
            .values()
            .find(|c| c.user_id == user_id && c.deleted_at.is_none())
            .cloned())
    }

    async fn regulator_by_user_id(&self, user_id: i64) -> DbResult<Option<Regulator>> {
        let state = self.state.lock().await;
        Ok(state
            .regulators
            .values()
            .find(|r| r.user_id == user_id && r.deleted_at.is_none())
            .cloned())
    }

    async fn clinic_by_id(&self, clinic_id: i64) -> DbResult<Option<Clinic>> {
        Ok(self.state.lock().await.live_clinic(clinic_id))
    }

    async fn list_clinics(&self, filter: &ClinicFilter) -> DbResult<Vec<Clinic>> {
        let state = self.state.lock().await;
        let mut clinics: Vec<Clinic> = state
            .clinics
            .values()
            .filter(|c| c.deleted_at.is_none() && filter.matches(c))
            .cloned()
            .collect();
        clinics.sort_by(|a, b| b.rating.total_cmp(&a.rating).then(a.id.cmp(&b.id)));
        Ok(clinics)
    }

    async fn update_search_criteria(
        &self,
        patient_id: i64,
        criteria: &SearchCriteria,
    ) -> DbResult<Patient> {
        let mut state = self.state.lock().await;
        let patient = state
            .patients
            .get_mut(&patient_id)
            .filter(|p| p.deleted_at.is_none())
            .ok_or_else(|| DbError::NotFound(format!("patient {}", patient_id)))?;
        patient.city = criteria.city.clone();
        patient.district = criteria.district.clone();
        patient.price_segment = criteria.price_segment;
        patient.updated_at = Utc::now();
        Ok(patient.clone())
    }

    async fn patient_scans(&self, patient_id: i64) -> DbResult<Vec<CtScan>> {
        let state = self.state.lock().await;
        let mut scans: Vec<CtScan> = state
            .scans
            .values()
            .filter(|s| s.patient_id == patient_id && s.deleted_at.is_none())
            .cloned()
            .collect();
        newest_first(&mut scans, |s| (s.upload_date, s.id));
        Ok(scans)
    }

    async fn scan_by_id(&self, scan_id: i64) -> DbResult<Option<CtScan>> {
        let state = self.state.lock().await;
        Ok(state
            .scans
            .get(&scan_id)
            .filter(|s| s.deleted_at.is_none())
            .cloned())
    }

    async fn plan_by_id(&self, plan_id: i64) -> DbResult<Option<TreatmentPlan>> {
        let state = self.state.lock().await;
        Ok(state.live_plan(plan_id).map(|p| state.with_items(p)))
    }

    async fn plan_by_scan_id(&self, scan_id: i64) -> DbResult<Option<TreatmentPlan>> {
        let state = self.state.lock().await;
        Ok(state
            .plans
            .values()
            .find(|p| p.ct_scan_id == scan_id && p.deleted_at.is_none())
            .cloned()
            .map(|p| state.with_items(p)))
    }

    async fn patient_plans(&self, patient_id: i64) -> DbResult<Vec<TreatmentPlan>> {
        let state = self.state.lock().await;
        let mut plans: Vec<TreatmentPlan> = state
            .plans
            .values()
            .filter(|p| p.patient_id == patient_id && p.deleted_at.is_none())
            .cloned()
            .map(|p| {
                let mut plan = state.with_items(p);
                plan.offers = state.visible_offers(plan.id);
                plan
            })
            .collect();
        newest_first(&mut plans, |p| (p.created_at, p.id));
        Ok(plans)
    }

    async fn incoming_plans(
        &self,
        clinic_id: i64,
        status: Option<PlanStatus>,
    ) -> DbResult<Vec<TreatmentPlan>> {
        let state = self.state.lock().await;
        let mut plans: Vec<TreatmentPlan> = state
            .plans
            .values()
            .filter(|p| p.deleted_at.is_none())
            .filter(|p| status.map_or(true, |s| p.status == s))
            .filter(|p| !state.has_offer(p.id, clinic_id))
            .cloned()
            .map(|p| {
                let mut plan = state.with_items(p);
                plan.offers = state
                    .live_offers_of_plan(plan.id)
                    .filter(|o| o.clinic_id == clinic_id)
                    .cloned()
                    .collect();
                plan
            })
            .collect();
        newest_first(&mut plans, |p| (p.created_at, p.id));
        Ok(plans)
    }

    async fn visible_offers(&self, plan_id: i64) -> DbResult<Vec<ClinicOffer>> {
        Ok(self.state.lock().await.visible_offers(plan_id))
    }

    async fn offers_for_plan(&self, plan_id: i64) -> DbResult<Vec<ClinicOffer>> {
        let state = self.state.lock().await;
        Ok(state.live_offers_of_plan(plan_id).cloned().collect())
    }

    async fn clinic_offers(
        &self,
        clinic_id: i64,
        status: Option<OfferStatus>,
    ) -> DbResult<Vec<ClinicOffer>> {
        let state = self.state.lock().await;
        let mut offers: Vec<ClinicOffer> = state
            .offers
            .values()
            .filter(|o| o.clinic_id == clinic_id && o.deleted_at.is_none())
            .filter(|o| status.map_or(true, |s| o.status == s))
            .cloned()
            .collect();
        newest_first(&mut offers, |o| (o.created_at, o.id));
        Ok(offers)
    }

    async fn lead_summary(&self, clinic_id: i64) -> DbResult<LeadSummary> {
        let state = self.state.lock().await;
        let accepted = state.offers.values().filter(|o| {
            o.clinic_id == clinic_id && o.deleted_at.is_none() && o.status == OfferStatus::Accepted
        });
        Ok(accepted.fold(LeadSummary::default(), |acc, o| LeadSummary {
            leads: acc.leads + 1,
            potential_revenue: acc.potential_revenue + o.total_cost,
        }))
    }

    async fn count_offers_created(&self, clinic_id: i64, range: DateRange) -> DbResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .offers
            .values()
            .filter(|o| o.clinic_id == clinic_id && o.deleted_at.is_none())
            .filter(|o| range.contains_instant(o.created_at))
            .count() as i64)
    }

    async fn count_plans_created(&self, range: DateRange) -> DbResult<i64> {
        let state = self.state.lock().await;
        Ok(state
            .plans
            .values()
            .filter(|p| p.deleted_at.is_none() && range.contains_instant(p.created_at))
            .count() as i64)
    }

    async fn patient_appointments(&self, patient_id: i64) -> DbResult<Vec<Appointment>> {
        let state = self.state.lock().await;
        Ok(state.sorted_appointments(|a| a.patient_id == patient_id))
    }

    async fn clinic_appointments(
        &self,
        clinic_id: i64,
        status: Option<AppointmentStatus>,
    ) -> DbResult<Vec<Appointment>> {
        let state = self.state.lock().await;
        Ok(state.sorted_appointments(|a| {
            a.clinic_id == clinic_id && status.map_or(true, |s| a.status == s)
        }))
    }

    async fn appointments_for_plan(&self, plan_id: i64) -> DbResult<Vec<Appointment>> {
        let state = self.state.lock().await;
        Ok(state.sorted_appointments(|a| a.treatment_plan_id == plan_id))
    }

    async fn appointment_by_id(&self, appointment_id: i64) -> DbResult<Option<Appointment>> {
        let state = self.state.lock().await;
        Ok(state
            .appointments
            .get(&appointment_id)
            .filter(|a| a.deleted_at.is_none())
            .cloned())
    }

    async fn price_list(
        &self,
        clinic_id: i64,
        specialization: Option<Specialization>,
    ) -> DbResult<Vec<PriceListItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<PriceListItem> = state
            .price_items
            .values()
            .filter(|i| i.clinic_id == clinic_id && i.deleted_at.is_none())
            .filter(|i| specialization.map_or(true, |s| i.specialization == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            a.specialization
                .as_str()
                .cmp(b.specialization.as_str())
                .then_with(|| a.service_name.cmp(&b.service_name))
        });
        Ok(items)
    }

    async fn reviews_for_clinic(&self, clinic_id: i64) -> DbResult<Vec<Review>> {
        let state = self.state.lock().await;
        let mut reviews: Vec<Review> = state.live_reviews(clinic_id).cloned().collect();
        newest_first(&mut reviews, |r| (r.created_at, r.id));
        Ok(reviews)
    }

    async fn insert_complaint(&self, complaint: &NewComplaint) -> DbResult<Complaint> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let row = Complaint {
            id: state.next_id(),
            patient_id: complaint.patient_id,
            clinic_id: complaint.clinic_id,
            subject: complaint.subject.clone(),
            description: complaint.description.clone(),
            status: ComplaintStatus::Open,
            resolution: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.complaints.insert(row.id, row.clone());
        Ok(row)
    }

    async fn list_complaints(&self, status: Option<ComplaintStatus>) -> DbResult<Vec<Complaint>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Complaint> = state
            .complaints
            .values()
            .filter(|c| c.deleted_at.is_none())
            .filter(|c| status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();
        newest_first(&mut rows, |c| (c.created_at, c.id));
        Ok(rows)
    }

    async fn statistics(
        &self,
        range: DateRange,
        scope: StatisticsScope,
    ) -> DbResult<Vec<Statistics>> {
        let state = self.state.lock().await;
        let mut rows: Vec<Statistics> = state
            .statistics
            .values()
            .filter(|s| s.deleted_at.is_none() && range.contains(s.date) && scope.matches(s))
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.date, s.id));
        Ok(rows)
    }

    async fn latest_clinic_statistics(&self, clinic_id: i64) -> DbResult<Option<Statistics>> {
        let state = self.state.lock().await;
        Ok(state
            .statistics
            .values()
            .filter(|s| s.deleted_at.is_none() && s.clinic_id == Some(clinic_id))
            .max_by_key(|s| (s.date, s.id))
            .cloned())
    }
}

/// Holds the store lock for its whole lifetime; writes land in `working`
/// and replace the shared state only on commit.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn offer_for_update(&mut self, offer_id: i64) -> DbResult<Option<ClinicOffer>> {
        Ok(self.working.live_offer(offer_id))
    }

    async fn plan_for_update(&mut self, plan_id: i64) -> DbResult<Option<TreatmentPlan>> {
        Ok(self.working.live_plan(plan_id))
    }

    async fn clinic_exists(&mut self, clinic_id: i64) -> DbResult<bool> {
        Ok(self.working.live_clinic(clinic_id).is_some())
    }

    async fn clinic_for_update(&mut self, clinic_id: i64) -> DbResult<bool> {
        Ok(self.working.live_clinic(clinic_id).is_some())
    }

    async fn clinic_has_offer(&mut self, plan_id: i64, clinic_id: i64) -> DbResult<bool> {
        Ok(self.working.has_offer(plan_id, clinic_id))
    }

    async fn insert_offer(&mut self, offer: &NewClinicOffer) -> DbResult<ClinicOffer> {
        if self.working.has_offer(offer.treatment_plan_id, offer.clinic_id) {
            return Err(DbError::UniqueViolation(format!(
                "clinic {} already has an offer on plan {}",
                offer.clinic_id, offer.treatment_plan_id
            )));
        }
        let now = Utc::now();
        let row = ClinicOffer {
            id: self.working.next_id(),
            treatment_plan_id: offer.treatment_plan_id,
            clinic_id: offer.clinic_id,
            status: offer.status,
            costs: offer.costs,
            total_cost: offer.total_cost,
            estimated_duration: offer.estimated_duration.clone(),
            installment_months: offer.installment_months,
            warranty_details: offer.warranty_details.clone(),
            notes: offer.notes.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            clinic: None,
        };
        self.working.offers.insert(row.id, row.clone());
        Ok(row)
    }

    async fn set_offer_status(&mut self, offer_id: i64, status: OfferStatus) -> DbResult<()> {
        let plan_id = self
            .working
            .live_offer(offer_id)
            .map(|o| o.treatment_plan_id)
            .ok_or_else(|| DbError::NotFound(format!("offer {}", offer_id)))?;
        if status == OfferStatus::Accepted {
            let clash = self.working.live_offers_of_plan(plan_id).any(|o| {
                o.id != offer_id && o.status == OfferStatus::Accepted
            });
            if clash {
                return Err(DbError::UniqueViolation(format!(
                    "plan {} already has an accepted offer",
                    plan_id
                )));
            }
        }
        if let Some(offer) = self.working.offers.get_mut(&offer_id) {
            offer.status = status;
            offer.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn reject_competing_offers(&mut self, plan_id: i64, keep_offer_id: i64) -> DbResult<u64> {
        let now = Utc::now();
        let mut changed = 0;
        for offer in self.working.offers.values_mut() {
            if offer.treatment_plan_id == plan_id
                && offer.id != keep_offer_id
                && offer.deleted_at.is_none()
            {
                offer.status = OfferStatus::Rejected;
                offer.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn set_plan_status(&mut self, plan_id: i64, status: PlanStatus) -> DbResult<()> {
        let plan = self
            .working
            .plans
            .get_mut(&plan_id)
            .filter(|p| p.deleted_at.is_none())
            .ok_or_else(|| DbError::NotFound(format!("treatment plan {}", plan_id)))?;
        plan.status = status;
        plan.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_appointment(&mut self, appointment: &NewAppointment) -> DbResult<Appointment> {
        let now = Utc::now();
        let row = Appointment {
            id: self.working.next_id(),
            patient_id: appointment.patient_id,
            clinic_id: appointment.clinic_id,
            treatment_plan_id: appointment.treatment_plan_id,
            clinic_offer_id: appointment.clinic_offer_id,
            appointment_date: appointment.appointment_date,
            specialization: appointment.specialization,
            status: appointment.status,
            notes: appointment.notes.clone(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.working.appointments.insert(row.id, row.clone());
        Ok(row)
    }

    async fn appointment_for_update(
        &mut self,
        appointment_id: i64,
    ) -> DbResult<Option<Appointment>> {
        Ok(self
            .working
            .appointments
            .get(&appointment_id)
            .filter(|a| a.deleted_at.is_none())
            .cloned())
    }

    async fn update_appointment(
        &mut self,
        appointment_id: i64,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> DbResult<Appointment> {
        let appointment = self
            .working
            .appointments
            .get_mut(&appointment_id)
            .filter(|a| a.deleted_at.is_none())
            .ok_or_else(|| DbError::NotFound(format!("appointment {}", appointment_id)))?;
        appointment.status = status;
        if notes.is_some() {
            appointment.notes = notes;
        }
        appointment.updated_at = Utc::now();
        Ok(appointment.clone())
    }

    async fn insert_review(&mut self, review: &NewReview) -> DbResult<Review> {
        let now = Utc::now();
        let row = Review {
            id: self.working.next_id(),
            patient_id: review.patient_id,
            clinic_id: review.clinic_id,
            rating: review.rating,
            comment: review.comment.clone(),
            is_public: review.is_public,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.working.reviews.insert(row.id, row.clone());
        Ok(row)
    }

    async fn refresh_clinic_rating(&mut self, clinic_id: i64) -> DbResult<RatingSummary> {
        let (sum, count) = self
            .working
            .live_reviews(clinic_id)
            .fold((0i64, 0i64), |(sum, count), r| (sum + r.rating as i64, count + 1));
        let summary = RatingSummary {
            rating: if count == 0 { 0.0 } else { sum as f64 / count as f64 },
            review_count: count,
        };

        let clinic = self
            .working
            .clinics
            .get_mut(&clinic_id)
            .filter(|c| c.deleted_at.is_none())
            .ok_or_else(|| DbError::NotFound(format!("clinic {}", clinic_id)))?;
        clinic.rating = summary.rating;
        clinic.review_count = summary.review_count;
        clinic.updated_at = Utc::now();
        Ok(summary)
    }

    async fn upsert_price_item(
        &mut self,
        clinic_id: i64,
        item: &PriceListInput,
    ) -> DbResult<PriceListItem> {
        let now = Utc::now();
        match item.id {
            Some(id) => {
                let row = self
                    .working
                    .price_items
                    .get_mut(&id)
                    .filter(|i| i.clinic_id == clinic_id && i.deleted_at.is_none())
                    .ok_or_else(|| DbError::NotFound(format!("price list item {}", id)))?;
                row.specialization = item.specialization;
                row.service_name = item.service_name.clone();
                row.price = item.price;
                row.warranty_years = item.warranty_years;
                row.updated_at = now;
                Ok(row.clone())
            }
            None => {
                let row = PriceListItem {
                    id: self.working.next_id(),
                    clinic_id,
                    specialization: item.specialization,
                    service_name: item.service_name.clone(),
                    price: item.price,
                    warranty_years: item.warranty_years,
                    created_at: now,
                    updated_at: now,
                    deleted_at: None,
                };
                self.working.price_items.insert(row.id, row.clone());
                Ok(row)
            }
        }
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        debug!("in-memory transaction committed");
        Ok(())
    }
}
