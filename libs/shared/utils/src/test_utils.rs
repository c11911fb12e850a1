use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::Mutex;

use shared_config::AppConfig;
use shared_database::{
    AppState, ClinicFilter, DateRange, DbError, DbResult, InMemoryStore, LeadSummary,
    MarketplaceStore, NewAppointment, NewClinicOffer, NewComplaint, NewReview, PgStore,
    PriceListInput, RatingSummary, SearchCriteria, StatisticsScope, StoreTransaction,
};
use shared_models::auth::{Role, User};
use shared_models::{
    Appointment, AppointmentStatus, Clinic, ClinicOffer, Complaint, ComplaintStatus,
    CostBreakdown, CtScan, OfferStatus, Patient, PlanStatus, PriceListItem, Regulator, Review,
    ScanStatus, Specialization, Statistics, TreatmentItem, TreatmentPlan,
};

pub struct TestConfig {
    pub jwt_secret: String,
    pub appointment_lead_days: i64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            appointment_lead_days: 7,
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            jwt_secret: self.jwt_secret.clone(),
            appointment_lead_days: self.appointment_lead_days,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub role: String,
}

impl TestUser {
    pub fn new(id: i64, role: &str) -> Self {
        Self {
            id,
            username: format!("{}-{}", role, id),
            role: role.to_string(),
        }
    }

    pub fn patient(id: i64) -> Self {
        Self::new(id, "patient")
    }

    pub fn clinic(id: i64) -> Self {
        Self::new(id, "clinic")
    }

    pub fn regulator(id: i64) -> Self {
        Self::new(id, "regulator")
    }

    pub fn to_user(&self) -> Option<User> {
        let role: Role = self.role.parse().ok()?;
        Some(User {
            id: self.id,
            username: Some(self.username.clone()),
            role,
        })
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id.to_string(),
            "username": user.username,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Seeded in-memory marketplace: two patients, two clinics, one regulator
/// and one generated plan owned by `patient`.
pub struct TestFixture {
    pub config: TestConfig,
    pub store: InMemoryStore,
    pub state: Arc<AppState>,

    pub patient_user: TestUser,
    pub patient: Patient,
    pub other_patient_user: TestUser,
    pub other_patient: Patient,

    pub clinic_user: TestUser,
    pub clinic: Clinic,
    pub rival_clinic_user: TestUser,
    pub rival_clinic: Clinic,

    pub regulator_user: TestUser,
    pub regulator: Regulator,

    pub scan: CtScan,
    pub plan: TreatmentPlan,
}

impl TestFixture {
    pub async fn new() -> Self {
        let config = TestConfig::default();
        let store = InMemoryStore::new();

        let patient_user = TestUser::patient(100);
        let patient = store
            .insert_patient(Patient {
                user_id: patient_user.id,
                first_name: "Aigerim".into(),
                last_name: "Sadykova".into(),
                city: Some("Almaty".into()),
                ..Patient::default()
            })
            .await;

        let other_patient_user = TestUser::patient(101);
        let other_patient = store
            .insert_patient(Patient {
                user_id: other_patient_user.id,
                first_name: "Dauren".into(),
                last_name: "Omarov".into(),
                ..Patient::default()
            })
            .await;

        let clinic_user = TestUser::clinic(200);
        let clinic = store
            .insert_clinic(Clinic {
                user_id: clinic_user.id,
                name: "Dental Lux".into(),
                city: Some("Almaty".into()),
                district: Some("Medeu".into()),
                rating: 4.5,
                has_therapy: true,
                has_orthopedics: true,
                has_surgery: true,
                has_hygiene: true,
                offers_installment: true,
                ..Clinic::default()
            })
            .await;

        let rival_clinic_user = TestUser::clinic(201);
        let rival_clinic = store
            .insert_clinic(Clinic {
                user_id: rival_clinic_user.id,
                name: "Smile Care".into(),
                city: Some("Almaty".into()),
                district: Some("Bostandyk".into()),
                rating: 4.8,
                has_therapy: true,
                has_orthopedics: true,
                has_surgery: true,
                has_hygiene: true,
                ..Clinic::default()
            })
            .await;

        let regulator_user = TestUser::regulator(300);
        let regulator = store
            .insert_regulator(Regulator {
                user_id: regulator_user.id,
                organization: Some("City Health Department".into()),
                region: Some("Almaty".into()),
                ..Regulator::default()
            })
            .await;

        let scan = store
            .insert_scan(CtScan {
                patient_id: patient.id,
                status: ScanStatus::Completed,
                ai_processed: true,
                file_url: Some("scans/ct-0001.dcm".into()),
                ..CtScan::default()
            })
            .await;

        let plan = store.insert_plan(sample_plan(patient.id, scan.id)).await;

        let state = Arc::new(AppState::new(
            config.to_app_config(),
            Arc::new(store.clone()),
        ));

        Self {
            config,
            store,
            state,
            patient_user,
            patient,
            other_patient_user,
            other_patient,
            clinic_user,
            clinic,
            rival_clinic_user,
            rival_clinic,
            regulator_user,
            regulator,
            scan,
            plan,
        }
    }

    pub fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, Some(1))
    }

    /// `Authorization` header value for `user`.
    pub fn bearer(&self, user: &TestUser) -> String {
        format!("Bearer {}", self.token(user))
    }
}

/// Generated plan needing therapy, orthopedics, surgery and hygiene.
pub fn sample_plan(patient_id: i64, ct_scan_id: i64) -> TreatmentPlan {
    let item = |specialization: Specialization,
                tooth: &str,
                diagnosis: &str,
                procedure: &str,
                cost: i64| TreatmentItem {
        specialization,
        tooth_number: Some(tooth.to_string()),
        diagnosis: diagnosis.to_string(),
        procedure: procedure.to_string(),
        urgency: Some("medium".to_string()),
        estimated_cost: cost,
        ..TreatmentItem::default()
    };

    TreatmentPlan {
        patient_id,
        ct_scan_id,
        status: PlanStatus::Generated,
        requires_therapy: true,
        requires_orthopedics: true,
        requires_surgery: true,
        requires_hygiene: true,
        therapy_min_cost: 15_000,
        therapy_max_cost: 25_000,
        orthopedics_min_cost: 120_000,
        orthopedics_max_cost: 180_000,
        surgery_min_cost: 20_000,
        surgery_max_cost: 35_000,
        hygiene_min_cost: 5_000,
        hygiene_max_cost: 8_000,
        items: vec![
            item(Specialization::Therapy, "36", "caries", "composite filling", 20_000),
            item(Specialization::Orthopedics, "46", "missing tooth", "implant crown", 150_000),
            item(Specialization::Surgery, "38", "impacted wisdom tooth", "extraction", 27_500),
            item(Specialization::Hygiene, "11", "plaque", "professional cleaning", 6_000),
        ],
        ..TreatmentPlan::default()
    }
}

// ==============================================================================
// POSTGRES FIXTURE
// ==============================================================================

static SCHEMA_READY: Mutex<bool> = Mutex::const_new(false);
static NEXT_USER: AtomicI64 = AtomicI64::new(0);

/// PostgreSQL-backed tests run only when `DATABASE_URL` is set.
pub fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok().filter(|url| !url.is_empty())
}

/// Fresh per call, so fixtures never collide on a shared database.
fn unique_user_id() -> i64 {
    Utc::now().timestamp_micros() * 1_000 + NEXT_USER.fetch_add(1, Ordering::SeqCst) % 1_000
}

/// The [`TestFixture`] marketplace seeded into a real database: one patient,
/// two clinics and one generated plan.
pub struct PgFixture {
    pub config: TestConfig,
    pub pool: PgPool,
    pub store: PgStore,
    pub state: Arc<AppState>,

    pub patient: Patient,
    pub clinic: Clinic,
    pub rival_clinic: Clinic,
    pub plan: TreatmentPlan,
}

impl PgFixture {
    /// `None` when no database is configured.
    pub async fn connect() -> Option<Self> {
        let url = database_url()?;
        let config = TestConfig::default();
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(&url)
            .await
            .expect("DATABASE_URL must point at a reachable PostgreSQL");
        let store = PgStore::new(pool.clone());

        {
            let mut ready = SCHEMA_READY.lock().await;
            if !*ready {
                store.migrate().await.expect("schema migration failed");
                *ready = true;
            }
        }

        let patient_user_id = unique_user_id();
        sqlx::query(
            "INSERT INTO patients (user_id, first_name, last_name, city) \
             VALUES ($1, 'Aigerim', 'Sadykova', 'Almaty')",
        )
        .bind(patient_user_id)
        .execute(&pool)
        .await
        .expect("seed patient");
        let patient = store
            .patient_by_user_id(patient_user_id)
            .await
            .unwrap()
            .expect("seeded patient");

        let clinic = seed_clinic(&pool, &store, "Dental Lux", "Medeu", 4.5).await;
        let rival_clinic = seed_clinic(&pool, &store, "Smile Care", "Bostandyk", 4.8).await;

        let plan = seed_plan(&pool, &store, patient.id).await;

        let state = Arc::new(AppState::new(
            config.to_app_config(),
            Arc::new(store.clone()),
        ));

        Some(Self {
            config,
            pool,
            store,
            state,
            patient,
            clinic,
            rival_clinic,
            plan,
        })
    }

    /// Another generated plan for the fixture patient, on its own scan.
    pub async fn add_plan(&self) -> TreatmentPlan {
        seed_plan(&self.pool, &self.store, self.patient.id).await
    }

    /// An accepted offer from the fixture clinic on the fixture plan, with
    /// its appointment in `status`.
    pub async fn seed_appointment(&self, status: AppointmentStatus) -> Appointment {
        let mut tx = self.store.begin().await.unwrap();
        let offer = tx
            .insert_offer(&NewClinicOffer {
                treatment_plan_id: self.plan.id,
                clinic_id: self.clinic.id,
                status: OfferStatus::Accepted,
                costs: CostBreakdown::default(),
                total_cost: 150_000,
                estimated_duration: None,
                installment_months: 0,
                warranty_details: None,
                notes: None,
            })
            .await
            .unwrap();
        let appointment = tx
            .insert_appointment(&NewAppointment {
                patient_id: self.patient.id,
                clinic_id: self.clinic.id,
                treatment_plan_id: self.plan.id,
                clinic_offer_id: offer.id,
                appointment_date: Utc::now() + Duration::days(7),
                specialization: None,
                status,
                notes: Some("Initial consultation".to_string()),
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        appointment
    }

    pub async fn insert_statistics(&self, row: &Statistics) -> i64 {
        sqlx::query_scalar(
            "INSERT INTO statistics (date, clinic_id, treatment_plans_generated, \
             appointments_scheduled, appointments_completed, total_revenue, patient_count, \
             caries_count, pulpitis_count, periodontitis_count, gingivitis_count, \
             parodontitis_count, average_wait_days, average_treatment_cost) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) RETURNING id",
        )
        .bind(row.date)
        .bind(row.clinic_id)
        .bind(row.treatment_plans_generated)
        .bind(row.appointments_scheduled)
        .bind(row.appointments_completed)
        .bind(row.total_revenue)
        .bind(row.patient_count)
        .bind(row.caries_count)
        .bind(row.pulpitis_count)
        .bind(row.periodontitis_count)
        .bind(row.gingivitis_count)
        .bind(row.parodontitis_count)
        .bind(row.average_wait_days)
        .bind(row.average_treatment_cost)
        .fetch_one(&self.pool)
        .await
        .expect("seed statistics")
    }
}

async fn seed_clinic(
    pool: &PgPool,
    store: &PgStore,
    name: &str,
    district: &str,
    rating: f64,
) -> Clinic {
    let user_id = unique_user_id();
    sqlx::query(
        "INSERT INTO clinics (user_id, name, city, district, rating, has_therapy, \
         has_orthopedics, has_surgery, has_hygiene) \
         VALUES ($1, $2, 'Almaty', $3, $4, TRUE, TRUE, TRUE, TRUE)",
    )
    .bind(user_id)
    .bind(name)
    .bind(district)
    .bind(rating)
    .execute(pool)
    .await
    .expect("seed clinic");
    store
        .clinic_by_user_id(user_id)
        .await
        .unwrap()
        .expect("seeded clinic")
}

async fn seed_plan(pool: &PgPool, store: &PgStore, patient_id: i64) -> TreatmentPlan {
    let scan_id: i64 = sqlx::query_scalar(
        "INSERT INTO ct_scans (patient_id, file_url, status, ai_processed) \
         VALUES ($1, 'scans/ct-0001.dcm', 'completed', TRUE) RETURNING id",
    )
    .bind(patient_id)
    .fetch_one(pool)
    .await
    .expect("seed scan");

    let plan = sample_plan(patient_id, scan_id);
    let plan_id: i64 = sqlx::query_scalar(
        "INSERT INTO treatment_plans (patient_id, ct_scan_id, status, requires_therapy, \
         requires_orthopedics, requires_surgery, requires_hygiene, requires_periodontics, \
         therapy_min_cost, therapy_max_cost, orthopedics_min_cost, orthopedics_max_cost, \
         surgery_min_cost, surgery_max_cost, hygiene_min_cost, hygiene_max_cost) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         RETURNING id",
    )
    .bind(plan.patient_id)
    .bind(plan.ct_scan_id)
    .bind(plan.status.as_str())
    .bind(plan.requires_therapy)
    .bind(plan.requires_orthopedics)
    .bind(plan.requires_surgery)
    .bind(plan.requires_hygiene)
    .bind(plan.requires_periodontics)
    .bind(plan.therapy_min_cost)
    .bind(plan.therapy_max_cost)
    .bind(plan.orthopedics_min_cost)
    .bind(plan.orthopedics_max_cost)
    .bind(plan.surgery_min_cost)
    .bind(plan.surgery_max_cost)
    .bind(plan.hygiene_min_cost)
    .bind(plan.hygiene_max_cost)
    .fetch_one(pool)
    .await
    .expect("seed plan");

    for item in &plan.items {
        sqlx::query(
            "INSERT INTO treatment_items (treatment_plan_id, specialization, tooth_number, \
             diagnosis, procedure, urgency, estimated_cost) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(plan_id)
        .bind(item.specialization.as_str())
        .bind(item.tooth_number.as_deref())
        .bind(&item.diagnosis)
        .bind(&item.procedure)
        .bind(item.urgency.as_deref())
        .bind(item.estimated_cost)
        .execute(pool)
        .await
        .expect("seed treatment item");
    }

    store
        .plan_by_id(plan_id)
        .await
        .unwrap()
        .expect("seeded plan")
}

// ==============================================================================
// FAULT INJECTION
// ==============================================================================

/// Transaction step that [`FaultyStore`] makes fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    InsertAppointment,
    SetPlanStatus,
    RefreshClinicRating,
    UpsertPriceItem,
}

/// Wraps an [`InMemoryStore`]; every transaction fails at `fault` after the
/// preceding writes went through, so callers can observe rollback.
#[derive(Clone)]
pub struct FaultyStore {
    inner: InMemoryStore,
    fault: Fault,
}

impl FaultyStore {
    pub fn new(inner: InMemoryStore, fault: Fault) -> Self {
        Self { inner, fault }
    }

    pub fn into_state(self, config: &TestConfig) -> Arc<AppState> {
        Arc::new(AppState::new(config.to_app_config(), Arc::new(self)))
    }
}

fn injected(fault: Fault) -> DbError {
    DbError::Corrupt(format!("injected fault at {:?}", fault))
}

#[async_trait]
impl MarketplaceStore for FaultyStore {
    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            fault: self.fault,
        }))
    }

    async fn patient_by_user_id(&self, user_id: i64) -> DbResult<Option<Patient>> {
        self.inner.patient_by_user_id(user_id).await
    }

    async fn clinic_by_user_id(&self, user_id: i64) -> DbResult<Option<Clinic>> {
        self.inner.clinic_by_user_id(user_id).await
    }

    async fn regulator_by_user_id(&self, user_id: i64) -> DbResult<Option<Regulator>> {
        self.inner.regulator_by_user_id(user_id).await
    }

    async fn clinic_by_id(&self, clinic_id: i64) -> DbResult<Option<Clinic>> {
        self.inner.clinic_by_id(clinic_id).await
    }

    async fn list_clinics(&self, filter: &ClinicFilter) -> DbResult<Vec<Clinic>> {
        self.inner.list_clinics(filter).await
    }

    async fn update_search_criteria(
        &self,
        patient_id: i64,
        criteria: &SearchCriteria,
    ) -> DbResult<Patient> {
        self.inner.update_search_criteria(patient_id, criteria).await
    }

    async fn patient_scans(&self, patient_id: i64) -> DbResult<Vec<CtScan>> {
        self.inner.patient_scans(patient_id).await
    }

    async fn scan_by_id(&self, scan_id: i64) -> DbResult<Option<CtScan>> {
        self.inner.scan_by_id(scan_id).await
    }

    async fn plan_by_id(&self, plan_id: i64) -> DbResult<Option<TreatmentPlan>> {
        self.inner.plan_by_id(plan_id).await
    }

    async fn plan_by_scan_id(&self, scan_id: i64) -> DbResult<Option<TreatmentPlan>> {
        self.inner.plan_by_scan_id(scan_id).await
    }

    async fn patient_plans(&self, patient_id: i64) -> DbResult<Vec<TreatmentPlan>> {
        self.inner.patient_plans(patient_id).await
    }

    async fn incoming_plans(
        &self,
        clinic_id: i64,
        status: Option<PlanStatus>,
    ) -> DbResult<Vec<TreatmentPlan>> {
        self.inner.incoming_plans(clinic_id, status).await
    }

    async fn visible_offers(&self, plan_id: i64) -> DbResult<Vec<ClinicOffer>> {
        self.inner.visible_offers(plan_id).await
    }

    async fn offers_for_plan(&self, plan_id: i64) -> DbResult<Vec<ClinicOffer>> {
        self.inner.offers_for_plan(plan_id).await
    }

    async fn clinic_offers(
        &self,
        clinic_id: i64,
        status: Option<OfferStatus>,
    ) -> DbResult<Vec<ClinicOffer>> {
        self.inner.clinic_offers(clinic_id, status).await
    }

    async fn lead_summary(&self, clinic_id: i64) -> DbResult<LeadSummary> {
        self.inner.lead_summary(clinic_id).await
    }

    async fn count_offers_created(&self, clinic_id: i64, range: DateRange) -> DbResult<i64> {
        self.inner.count_offers_created(clinic_id, range).await
    }

    async fn count_plans_created(&self, range: DateRange) -> DbResult<i64> {
        self.inner.count_plans_created(range).await
    }

    async fn patient_appointments(&self, patient_id: i64) -> DbResult<Vec<Appointment>> {
        self.inner.patient_appointments(patient_id).await
    }

    async fn clinic_appointments(
        &self,
        clinic_id: i64,
        status: Option<AppointmentStatus>,
    ) -> DbResult<Vec<Appointment>> {
        self.inner.clinic_appointments(clinic_id, status).await
    }

    async fn appointments_for_plan(&self, plan_id: i64) -> DbResult<Vec<Appointment>> {
        self.inner.appointments_for_plan(plan_id).await
    }

    async fn appointment_by_id(&self, appointment_id: i64) -> DbResult<Option<Appointment>> {
        self.inner.appointment_by_id(appointment_id).await
    }

    async fn price_list(
        &self,
        clinic_id: i64,
        specialization: Option<Specialization>,
    ) -> DbResult<Vec<PriceListItem>> {
        self.inner.price_list(clinic_id, specialization).await
    }

    async fn reviews_for_clinic(&self, clinic_id: i64) -> DbResult<Vec<Review>> {
        self.inner.reviews_for_clinic(clinic_id).await
    }

    async fn insert_complaint(&self, complaint: &NewComplaint) -> DbResult<Complaint> {
        self.inner.insert_complaint(complaint).await
    }

    async fn list_complaints(&self, status: Option<ComplaintStatus>) -> DbResult<Vec<Complaint>> {
        self.inner.list_complaints(status).await
    }

    async fn statistics(
        &self,
        range: DateRange,
        scope: StatisticsScope,
    ) -> DbResult<Vec<Statistics>> {
        self.inner.statistics(range, scope).await
    }

    async fn latest_clinic_statistics(&self, clinic_id: i64) -> DbResult<Option<Statistics>> {
        self.inner.latest_clinic_statistics(clinic_id).await
    }
}

struct FaultyTransaction {
    inner: Box<dyn StoreTransaction>,
    fault: Fault,
}

#[async_trait]
impl StoreTransaction for FaultyTransaction {
    async fn offer_for_update(&mut self, offer_id: i64) -> DbResult<Option<ClinicOffer>> {
        self.inner.offer_for_update(offer_id).await
    }

    async fn plan_for_update(&mut self, plan_id: i64) -> DbResult<Option<TreatmentPlan>> {
        self.inner.plan_for_update(plan_id).await
    }

    async fn clinic_exists(&mut self, clinic_id: i64) -> DbResult<bool> {
        self.inner.clinic_exists(clinic_id).await
    }

    async fn clinic_for_update(&mut self, clinic_id: i64) -> DbResult<bool> {
        self.inner.clinic_for_update(clinic_id).await
    }

    async fn clinic_has_offer(&mut self, plan_id: i64, clinic_id: i64) -> DbResult<bool> {
        self.inner.clinic_has_offer(plan_id, clinic_id).await
    }

    async fn insert_offer(&mut self, offer: &NewClinicOffer) -> DbResult<ClinicOffer> {
        self.inner.insert_offer(offer).await
    }

    async fn set_offer_status(&mut self, offer_id: i64, status: OfferStatus) -> DbResult<()> {
        self.inner.set_offer_status(offer_id, status).await
    }

    async fn reject_competing_offers(&mut self, plan_id: i64, keep_offer_id: i64) -> DbResult<u64> {
        self.inner.reject_competing_offers(plan_id, keep_offer_id).await
    }

    async fn set_plan_status(&mut self, plan_id: i64, status: PlanStatus) -> DbResult<()> {
        if self.fault == Fault::SetPlanStatus {
            return Err(injected(self.fault));
        }
        self.inner.set_plan_status(plan_id, status).await
    }

    async fn insert_appointment(&mut self, appointment: &NewAppointment) -> DbResult<Appointment> {
        if self.fault == Fault::InsertAppointment {
            return Err(injected(self.fault));
        }
        self.inner.insert_appointment(appointment).await
    }

    async fn appointment_for_update(
        &mut self,
        appointment_id: i64,
    ) -> DbResult<Option<Appointment>> {
        self.inner.appointment_for_update(appointment_id).await
    }

    async fn update_appointment(
        &mut self,
        appointment_id: i64,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> DbResult<Appointment> {
        self.inner.update_appointment(appointment_id, status, notes).await
    }

    async fn insert_review(&mut self, review: &NewReview) -> DbResult<Review> {
        self.inner.insert_review(review).await
    }

    async fn refresh_clinic_rating(&mut self, clinic_id: i64) -> DbResult<RatingSummary> {
        if self.fault == Fault::RefreshClinicRating {
            return Err(injected(self.fault));
        }
        self.inner.refresh_clinic_rating(clinic_id).await
    }

    async fn upsert_price_item(
        &mut self,
        clinic_id: i64,
        item: &PriceListInput,
    ) -> DbResult<PriceListItem> {
        // Writes the row first, then fails.
        let row = self.inner.upsert_price_item(clinic_id, item).await?;
        if self.fault == Fault::UpsertPriceItem {
            return Err(injected(self.fault));
        }
        Ok(row)
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.inner.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert!(app_config.is_configured());
        assert!(!app_config.uses_database());
        assert_eq!(app_config.appointment_lead_days, 7);
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::regulator(5);
        assert_eq!(user.role, "regulator");

        let user_model = user.to_user().unwrap();
        assert_eq!(user_model.id, 5);
        assert_eq!(user_model.role, Role::Regulator);
        assert!(TestUser::new(6, "doctor").to_user().is_none());
    }

    #[test]
    fn test_jwt_token_creation() {
        let token = JwtTestUtils::create_test_token(&TestUser::patient(1), "test-secret", Some(1));
        assert_eq!(token.split('.').count(), 3);
    }

    #[tokio::test]
    async fn fixture_seeds_plan_with_items() {
        let fixture = TestFixture::new().await;
        assert_eq!(fixture.plan.items.len(), 4);
        assert_eq!(fixture.plan.patient_id, fixture.patient.id);
        assert_ne!(fixture.clinic.id, fixture.rival_clinic.id);
    }
}
