// libs/shared/database/src/postgres.rs
use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_models::{
    Appointment, AppointmentStatus, Clinic, ClinicOffer, Complaint, ComplaintStatus,
    CostBreakdown, CtScan, OfferStatus, Patient, PlanStatus, PriceListItem, Regulator, Review,
    Specialization, Statistics, TreatmentItem, TreatmentPlan,
};

use crate::error::{DbError, DbResult};
use crate::schema;
use crate::store::{
    ClinicFilter, DateRange, LeadSummary, MarketplaceStore, NewAppointment, NewClinicOffer,
    NewComplaint, NewReview, PriceListInput, RatingSummary, SearchCriteria, StatisticsScope,
    StoreTransaction,
};

// ==============================================================================
// COLUMN LISTS
// ==============================================================================

const PATIENT_COLUMNS: &str = "id, user_id, first_name, last_name, date_of_birth, gender, \
     city, district, price_segment, created_at, updated_at, deleted_at";

const CLINIC_COLUMNS: &str = "id, user_id, name, license_number, year_established, rating, \
     review_count, city, district, address, has_therapy, has_orthopedics, has_surgery, \
     has_hygiene, has_periodontics, offers_installment, offers_insurance, created_at, \
     updated_at, deleted_at";

const REGULATOR_COLUMNS: &str =
    "id, user_id, organization, region, position, created_at, updated_at, deleted_at";

const SCAN_COLUMNS: &str =
    "id, patient_id, upload_date, file_url, status, ai_processed, created_at, updated_at, deleted_at";

const PLAN_COLUMNS: &str = "id, patient_id, ct_scan_id, status, requires_therapy, \
     requires_orthopedics, requires_surgery, requires_hygiene, requires_periodontics, \
     therapy_min_cost, therapy_max_cost, orthopedics_min_cost, orthopedics_max_cost, \
     surgery_min_cost, surgery_max_cost, hygiene_min_cost, hygiene_max_cost, \
     periodontics_min_cost, periodontics_max_cost, created_at, updated_at, deleted_at";

const ITEM_COLUMNS: &str = "id, treatment_plan_id, specialization, tooth_number, diagnosis, \
     procedure, urgency, estimated_cost, created_at, deleted_at";

const OFFER_COLUMNS: &str = "id, treatment_plan_id, clinic_id, status, therapy_cost, \
     orthopedics_cost, surgery_cost, hygiene_cost, periodontics_cost, total_cost, \
     estimated_duration, installment_months, warranty_details, notes, created_at, updated_at, \
     deleted_at";

const APPOINTMENT_COLUMNS: &str = "id, patient_id, clinic_id, treatment_plan_id, \
     clinic_offer_id, appointment_date, specialization, status, notes, created_at, updated_at, \
     deleted_at";

const REVIEW_COLUMNS: &str =
    "id, patient_id, clinic_id, rating, comment, is_public, created_at, updated_at, deleted_at";

const COMPLAINT_COLUMNS: &str = "id, patient_id, clinic_id, subject, description, status, \
     resolution, created_at, updated_at, deleted_at";

const PRICE_COLUMNS: &str = "id, clinic_id, specialization, service_name, price, \
     warranty_years, created_at, updated_at, deleted_at";

const STATISTICS_COLUMNS: &str = "id, date, clinic_id, treatment_plans_generated, \
     appointments_scheduled, appointments_completed, total_revenue, patient_count, \
     caries_count, pulpitis_count, periodontitis_count, gingivitis_count, parodontitis_count, \
     average_wait_days, average_treatment_cost, created_at, deleted_at";

// ==============================================================================
// ROW MAPPING
// ==============================================================================

fn text<T>(row: &PgRow, column: &str) -> DbResult<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(DbError::Corrupt)
}

fn optional_text<T>(row: &PgRow, column: &str) -> DbResult<Option<T>>
where
    T: FromStr<Err = String>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|value| value.parse().map_err(DbError::Corrupt))
        .transpose()
}

fn patient_from_row(row: &PgRow) -> DbResult<Patient> {
    Ok(Patient {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        date_of_birth: row.try_get("date_of_birth")?,
        gender: row.try_get("gender")?,
        city: row.try_get("city")?,
        district: row.try_get("district")?,
        price_segment: optional_text(row, "price_segment")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn clinic_from_row(row: &PgRow) -> DbResult<Clinic> {
    Ok(Clinic {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        license_number: row.try_get("license_number")?,
        year_established: row.try_get("year_established")?,
        rating: row.try_get("rating")?,
        review_count: row.try_get("review_count")?,
        city: row.try_get("city")?,
        district: row.try_get("district")?,
        address: row.try_get("address")?,
        has_therapy: row.try_get("has_therapy")?,
        has_orthopedics: row.try_get("has_orthopedics")?,
        has_surgery: row.try_get("has_surgery")?,
        has_hygiene: row.try_get("has_hygiene")?,
        has_periodontics: row.try_get("has_periodontics")?,
        offers_installment: row.try_get("offers_installment")?,
        offers_insurance: row.try_get("offers_insurance")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn regulator_from_row(row: &PgRow) -> DbResult<Regulator> {
    Ok(Regulator {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        organization: row.try_get("organization")?,
        region: row.try_get("region")?,
        position: row.try_get("position")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn scan_from_row(row: &PgRow) -> DbResult<CtScan> {
    Ok(CtScan {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        upload_date: row.try_get("upload_date")?,
        file_url: row.try_get("file_url")?,
        status: text(row, "status")?,
        ai_processed: row.try_get("ai_processed")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn plan_from_row(row: &PgRow) -> DbResult<TreatmentPlan> {
    Ok(TreatmentPlan {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        ct_scan_id: row.try_get("ct_scan_id")?,
        status: text(row, "status")?,
        requires_therapy: row.try_get("requires_therapy")?,
        requires_orthopedics: row.try_get("requires_orthopedics")?,
        requires_surgery: row.try_get("requires_surgery")?,
        requires_hygiene: row.try_get("requires_hygiene")?,
        requires_periodontics: row.try_get("requires_periodontics")?,
        therapy_min_cost: row.try_get("therapy_min_cost")?,
        therapy_max_cost: row.try_get("therapy_max_cost")?,
        orthopedics_min_cost: row.try_get("orthopedics_min_cost")?,
        orthopedics_max_cost: row.try_get("orthopedics_max_cost")?,
        surgery_min_cost: row.try_get("surgery_min_cost")?,
        surgery_max_cost: row.try_get("surgery_max_cost")?,
        hygiene_min_cost: row.try_get("hygiene_min_cost")?,
        hygiene_max_cost: row.try_get("hygiene_max_cost")?,
        periodontics_min_cost: row.try_get("periodontics_min_cost")?,
        periodontics_max_cost: row.try_get("periodontics_max_cost")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
        items: Vec::new(),
        offers: Vec::new(),
    })
}

fn item_from_row(row: &PgRow) -> DbResult<TreatmentItem> {
    Ok(TreatmentItem {
        id: row.try_get("id")?,
        treatment_plan_id: row.try_get("treatment_plan_id")?,
        specialization: text(row, "specialization")?,
        tooth_number: row.try_get("tooth_number")?,
        diagnosis: row.try_get("diagnosis")?,
        procedure: row.try_get("procedure")?,
        urgency: row.try_get("urgency")?,
        estimated_cost: row.try_get("estimated_cost")?,
        created_at: row.try_get("created_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn offer_from_row(row: &PgRow) -> DbResult<ClinicOffer> {
    Ok(ClinicOffer {
        id: row.try_get("id")?,
        treatment_plan_id: row.try_get("treatment_plan_id")?,
        clinic_id: row.try_get("clinic_id")?,
        status: text(row, "status")?,
        costs: CostBreakdown {
            therapy_cost: row.try_get("therapy_cost")?,
            orthopedics_cost: row.try_get("orthopedics_cost")?,
            surgery_cost: row.try_get("surgery_cost")?,
            hygiene_cost: row.try_get("hygiene_cost")?,
            periodontics_cost: row.try_get("periodontics_cost")?,
        },
        total_cost: row.try_get("total_cost")?,
        estimated_duration: row.try_get("estimated_duration")?,
        installment_months: row.try_get("installment_months")?,
        warranty_details: row.try_get("warranty_details")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
        clinic: None,
    })
}

fn appointment_from_row(row: &PgRow) -> DbResult<Appointment> {
    Ok(Appointment {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        clinic_id: row.try_get("clinic_id")?,
        treatment_plan_id: row.try_get("treatment_plan_id")?,
        clinic_offer_id: row.try_get("clinic_offer_id")?,
        appointment_date: row.try_get("appointment_date")?,
        specialization: optional_text(row, "specialization")?,
        status: text(row, "status")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn review_from_row(row: &PgRow) -> DbResult<Review> {
    Ok(Review {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        clinic_id: row.try_get("clinic_id")?,
        rating: row.try_get("rating")?,
        comment: row.try_get("comment")?,
        is_public: row.try_get("is_public")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn complaint_from_row(row: &PgRow) -> DbResult<Complaint> {
    Ok(Complaint {
        id: row.try_get("id")?,
        patient_id: row.try_get("patient_id")?,
        clinic_id: row.try_get("clinic_id")?,
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        status: text(row, "status")?,
        resolution: row.try_get("resolution")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn price_item_from_row(row: &PgRow) -> DbResult<PriceListItem> {
    Ok(PriceListItem {
        id: row.try_get("id")?,
        clinic_id: row.try_get("clinic_id")?,
        specialization: text(row, "specialization")?,
        service_name: row.try_get("service_name")?,
        price: row.try_get("price")?,
        warranty_years: row.try_get("warranty_years")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn statistics_from_row(row: &PgRow) -> DbResult<Statistics> {
    Ok(Statistics {
        id: row.try_get("id")?,
        date: row.try_get("date")?,
        clinic_id: row.try_get("clinic_id")?,
        treatment_plans_generated: row.try_get("treatment_plans_generated")?,
        appointments_scheduled: row.try_get("appointments_scheduled")?,
        appointments_completed: row.try_get("appointments_completed")?,
        total_revenue: row.try_get("total_revenue")?,
        patient_count: row.try_get("patient_count")?,
        caries_count: row.try_get("caries_count")?,
        pulpitis_count: row.try_get("pulpitis_count")?,
        periodontitis_count: row.try_get("periodontitis_count")?,
        gingivitis_count: row.try_get("gingivitis_count")?,
        parodontitis_count: row.try_get("parodontitis_count")?,
        average_wait_days: row.try_get("average_wait_days")?,
        average_treatment_cost: row.try_get("average_treatment_cost")?,
        created_at: row.try_get("created_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

fn map_rows<T>(rows: &[PgRow], map: fn(&PgRow) -> DbResult<T>) -> DbResult<Vec<T>> {
    rows.iter().map(map).collect()
}

// ==============================================================================
// STORE
// ==============================================================================

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &AppConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?;
        info!(
            "Connected to PostgreSQL (max {} connections)",
            config.db_max_connections
        );
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> DbResult<()> {
        schema::migrate(&self.pool).await
    }

    async fn attach_items(&self, plans: &mut [TreatmentPlan]) -> DbResult<()> {
        if plans.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = plans.iter().map(|p| p.id).collect();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM treatment_items \
             WHERE treatment_plan_id = ANY($1) AND deleted_at IS NULL ORDER BY id",
            ITEM_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_plan: HashMap<i64, Vec<TreatmentItem>> = HashMap::new();
        for item in map_rows(&rows, item_from_row)? {
            by_plan.entry(item.treatment_plan_id).or_default().push(item);
        }
        for plan in plans.iter_mut() {
            plan.items = by_plan.remove(&plan.id).unwrap_or_default();
        }
        Ok(())
    }

    async fn attach_clinics(&self, offers: &mut [ClinicOffer]) -> DbResult<()> {
        if offers.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = offers.iter().map(|o| o.clinic_id).collect();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM clinics WHERE id = ANY($1) AND deleted_at IS NULL",
            CLINIC_COLUMNS
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let clinics: HashMap<i64, Clinic> = map_rows(&rows, clinic_from_row)?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();
        for offer in offers.iter_mut() {
            offer.clinic = clinics.get(&offer.clinic_id).cloned();
        }
        Ok(())
    }

    /// Non-pending offers of the given plans, cheapest first, with clinics.
    async fn visible_offers_of(&self, plan_ids: &[i64]) -> DbResult<Vec<ClinicOffer>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM clinic_offers \
             WHERE treatment_plan_id = ANY($1) AND status <> $2 AND deleted_at IS NULL \
             ORDER BY total_cost ASC, id ASC",
            OFFER_COLUMNS
        ))
        .bind(plan_ids)
        .bind(OfferStatus::Pending.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut offers = map_rows(&rows, offer_from_row)?;
        self.attach_clinics(&mut offers).await?;
        Ok(offers)
    }

    async fn fetch_plans(&self, sql: String, bind: i64) -> DbResult<Vec<TreatmentPlan>> {
        let rows = sqlx::query(&sql).bind(bind).fetch_all(&self.pool).await?;
        let mut plans = map_rows(&rows, plan_from_row)?;
        self.attach_items(&mut plans).await?;
        Ok(plans)
    }
}

#[async_trait]
impl MarketplaceStore for PgStore {
    async fn begin(&self) -> DbResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        debug!("PostgreSQL transaction started");
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn patient_by_user_id(&self, user_id: i64) -> DbResult<Option<Patient>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM patients WHERE user_id = $1 AND deleted_at IS NULL LIMIT 1",
            PATIENT_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(patient_from_row).transpose()
    }

    async fn clinic_by_user_id(&self, user_id: i64) -> DbResult<Option<Clinic>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM clinics WHERE user_id = $1 AND deleted_at IS NULL LIMIT 1",
            CLINIC_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(clinic_from_row).transpose()
    }

    async fn regulator_by_user_id(&self, user_id: i64) -> DbResult<Option<Regulator>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM regulators WHERE user_id = $1 AND deleted_at IS NULL LIMIT 1",
            REGULATOR_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(regulator_from_row).transpose()
    }

    async fn clinic_by_id(&self, clinic_id: i64) -> DbResult<Option<Clinic>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM clinics WHERE id = $1 AND deleted_at IS NULL",
            CLINIC_COLUMNS
        ))
        .bind(clinic_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(clinic_from_row).transpose()
    }

    async fn list_clinics(&self, filter: &ClinicFilter) -> DbResult<Vec<Clinic>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM clinics WHERE deleted_at IS NULL \
             AND ($1::TEXT IS NULL OR city = $1) \
             AND ($2::TEXT IS NULL OR district = $2) \
             ORDER BY rating DESC, id ASC",
            CLINIC_COLUMNS
        ))
        .bind(filter.city.as_deref())
        .bind(filter.district.as_deref())
        .fetch_all(&self.pool)
        .await?;
        map_rows(&rows, clinic_from_row)
    }

    async fn update_search_criteria(
        &self,
        patient_id: i64,
        criteria: &SearchCriteria,
    ) -> DbResult<Patient> {
        let row = sqlx::query(&format!(
            "UPDATE patients SET city = $2, district = $3, price_segment = $4, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            PATIENT_COLUMNS
        ))
        .bind(patient_id)
        .bind(criteria.city.as_deref())
        .bind(criteria.district.as_deref())
        .bind(criteria.price_segment.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("patient {}", patient_id)))?;
        patient_from_row(&row)
    }

    async fn patient_scans(&self, patient_id: i64) -> DbResult<Vec<CtScan>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM ct_scans WHERE patient_id = $1 AND deleted_at IS NULL \
             ORDER BY upload_date DESC, id DESC",
            SCAN_COLUMNS
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        map_rows(&rows, scan_from_row)
    }

    async fn scan_by_id(&self, scan_id: i64) -> DbResult<Option<CtScan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM ct_scans WHERE id = $1 AND deleted_at IS NULL",
            SCAN_COLUMNS
        ))
        .bind(scan_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(scan_from_row).transpose()
    }

    async fn plan_by_id(&self, plan_id: i64) -> DbResult<Option<TreatmentPlan>> {
        let sql = format!(
            "SELECT {} FROM treatment_plans WHERE id = $1 AND deleted_at IS NULL",
            PLAN_COLUMNS
        );
        Ok(self.fetch_plans(sql, plan_id).await?.into_iter().next())
    }

    async fn plan_by_scan_id(&self, scan_id: i64) -> DbResult<Option<TreatmentPlan>> {
        let sql = format!(
            "SELECT {} FROM treatment_plans WHERE ct_scan_id = $1 AND deleted_at IS NULL LIMIT 1",
            PLAN_COLUMNS
        );
        Ok(self.fetch_plans(sql, scan_id).await?.into_iter().next())
    }

    async fn patient_plans(&self, patient_id: i64) -> DbResult<Vec<TreatmentPlan>> {
        let sql = format!(
            "SELECT {} FROM treatment_plans WHERE patient_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC",
            PLAN_COLUMNS
        );
        let mut plans = self.fetch_plans(sql, patient_id).await?;
        let ids: Vec<i64> = plans.iter().map(|p| p.id).collect();
        for offer in self.visible_offers_of(&ids).await? {
            if let Some(plan) = plans.iter_mut().find(|p| p.id == offer.treatment_plan_id) {
                plan.offers.push(offer);
            }
        }
        Ok(plans)
    }

    async fn incoming_plans(
        &self,
        clinic_id: i64,
        status: Option<PlanStatus>,
    ) -> DbResult<Vec<TreatmentPlan>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM treatment_plans p \
             WHERE p.deleted_at IS NULL \
             AND ($2::TEXT IS NULL OR p.status = $2) \
             AND NOT EXISTS ( \
                 SELECT 1 FROM clinic_offers o \
                 WHERE o.treatment_plan_id = p.id AND o.clinic_id = $1 AND o.deleted_at IS NULL \
             ) \
             ORDER BY p.created_at DESC, p.id DESC",
            PLAN_COLUMNS
        ))
        .bind(clinic_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        let mut plans = map_rows(&rows, plan_from_row)?;
        self.attach_items(&mut plans).await?;

        // Only the requesting clinic's own bids ever travel with a plan.
        let ids: Vec<i64> = plans.iter().map(|p| p.id).collect();
        let rows = sqlx::query(&format!(
            "SELECT {} FROM clinic_offers \
             WHERE treatment_plan_id = ANY($1) AND clinic_id = $2 AND deleted_at IS NULL",
            OFFER_COLUMNS
        ))
        .bind(&ids)
        .bind(clinic_id)
        .fetch_all(&self.pool)
        .await?;
        for offer in map_rows(&rows, offer_from_row)? {
            if let Some(plan) = plans.iter_mut().find(|p| p.id == offer.treatment_plan_id) {
                plan.offers.push(offer);
            }
        }
        Ok(plans)
    }

    async fn visible_offers(&self, plan_id: i64) -> DbResult<Vec<ClinicOffer>> {
        self.visible_offers_of(&[plan_id]).await
    }

    async fn offers_for_plan(&self, plan_id: i64) -> DbResult<Vec<ClinicOffer>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM clinic_offers WHERE treatment_plan_id = $1 AND deleted_at IS NULL \
             ORDER BY id",
            OFFER_COLUMNS
        ))
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;
        map_rows(&rows, offer_from_row)
    }

    async fn clinic_offers(
        &self,
        clinic_id: i64,
        status: Option<OfferStatus>,
    ) -> DbResult<Vec<ClinicOffer>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM clinic_offers WHERE clinic_id = $1 AND deleted_at IS NULL \
             AND ($2::TEXT IS NULL OR status = $2) ORDER BY created_at DESC, id DESC",
            OFFER_COLUMNS
        ))
        .bind(clinic_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        map_rows(&rows, offer_from_row)
    }

    async fn lead_summary(&self, clinic_id: i64) -> DbResult<LeadSummary> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS leads, COALESCE(SUM(total_cost), 0)::BIGINT AS revenue \
             FROM clinic_offers WHERE clinic_id = $1 AND status = $2 AND deleted_at IS NULL",
        )
        .bind(clinic_id)
        .bind(OfferStatus::Accepted.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(LeadSummary {
            leads: row.try_get("leads")?,
            potential_revenue: row.try_get("revenue")?,
        })
    }

    async fn count_offers_created(&self, clinic_id: i64, range: DateRange) -> DbResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) FROM clinic_offers WHERE clinic_id = $1 AND deleted_at IS NULL \
             AND created_at >= $2 AND created_at < $3",
        )
        .bind(clinic_id)
        .bind(range.start_instant())
        .bind(range.end_instant_exclusive())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get(0)?)
    }

    async fn count_plans_created(&self, range: DateRange) -> DbResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) FROM treatment_plans WHERE deleted_at IS NULL \
             AND created_at >= $1 AND created_at < $2",
        )
        .bind(range.start_instant())
        .bind(range.end_instant_exclusive())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get(0)?)
    }

    async fn patient_appointments(&self, patient_id: i64) -> DbResult<Vec<Appointment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE patient_id = $1 AND deleted_at IS NULL \
             ORDER BY appointment_date DESC, id DESC",
            APPOINTMENT_COLUMNS
        ))
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;
        map_rows(&rows, appointment_from_row)
    }

    async fn clinic_appointments(
        &self,
        clinic_id: i64,
        status: Option<AppointmentStatus>,
    ) -> DbResult<Vec<Appointment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE clinic_id = $1 AND deleted_at IS NULL \
             AND ($2::TEXT IS NULL OR status = $2) ORDER BY appointment_date DESC, id DESC",
            APPOINTMENT_COLUMNS
        ))
        .bind(clinic_id)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        map_rows(&rows, appointment_from_row)
    }

    async fn appointments_for_plan(&self, plan_id: i64) -> DbResult<Vec<Appointment>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE treatment_plan_id = $1 AND deleted_at IS NULL \
             ORDER BY appointment_date DESC, id DESC",
            APPOINTMENT_COLUMNS
        ))
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await?;
        map_rows(&rows, appointment_from_row)
    }

    async fn appointment_by_id(&self, appointment_id: i64) -> DbResult<Option<Appointment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE id = $1 AND deleted_at IS NULL",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn price_list(
        &self,
        clinic_id: i64,
        specialization: Option<Specialization>,
    ) -> DbResult<Vec<PriceListItem>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM price_lists WHERE clinic_id = $1 AND deleted_at IS NULL \
             AND ($2::TEXT IS NULL OR specialization = $2) \
             ORDER BY specialization ASC, service_name ASC",
            PRICE_COLUMNS
        ))
        .bind(clinic_id)
        .bind(specialization.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        map_rows(&rows, price_item_from_row)
    }

    async fn reviews_for_clinic(&self, clinic_id: i64) -> DbResult<Vec<Review>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM reviews WHERE clinic_id = $1 AND deleted_at IS NULL \
             ORDER BY created_at DESC, id DESC",
            REVIEW_COLUMNS
        ))
        .bind(clinic_id)
        .fetch_all(&self.pool)
        .await?;
        map_rows(&rows, review_from_row)
    }

    async fn insert_complaint(&self, complaint: &NewComplaint) -> DbResult<Complaint> {
        let row = sqlx::query(&format!(
            "INSERT INTO complaints (patient_id, clinic_id, subject, description, status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            COMPLAINT_COLUMNS
        ))
        .bind(complaint.patient_id)
        .bind(complaint.clinic_id)
        .bind(&complaint.subject)
        .bind(&complaint.description)
        .bind(ComplaintStatus::Open.as_str())
        .fetch_one(&self.pool)
        .await?;
        complaint_from_row(&row)
    }

    async fn list_complaints(&self, status: Option<ComplaintStatus>) -> DbResult<Vec<Complaint>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM complaints WHERE deleted_at IS NULL \
             AND ($1::TEXT IS NULL OR status = $1) ORDER BY created_at DESC, id DESC",
            COMPLAINT_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        map_rows(&rows, complaint_from_row)
    }

    async fn statistics(
        &self,
        range: DateRange,
        scope: StatisticsScope,
    ) -> DbResult<Vec<Statistics>> {
        let rows = match scope {
            StatisticsScope::Regional => {
                sqlx::query(&format!(
                    "SELECT {} FROM statistics WHERE date BETWEEN $1 AND $2 \
                     AND clinic_id IS NULL AND deleted_at IS NULL ORDER BY date ASC, id ASC",
                    STATISTICS_COLUMNS
                ))
                .bind(range.start)
                .bind(range.end)
                .fetch_all(&self.pool)
                .await?
            }
            StatisticsScope::Clinic(clinic_id) => {
                sqlx::query(&format!(
                    "SELECT {} FROM statistics WHERE date BETWEEN $1 AND $2 \
                     AND clinic_id = $3 AND deleted_at IS NULL ORDER BY date ASC, id ASC",
                    STATISTICS_COLUMNS
                ))
                .bind(range.start)
                .bind(range.end)
                .bind(clinic_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        map_rows(&rows, statistics_from_row)
    }

    async fn latest_clinic_statistics(&self, clinic_id: i64) -> DbResult<Option<Statistics>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM statistics WHERE clinic_id = $1 AND deleted_at IS NULL \
             ORDER BY date DESC, id DESC LIMIT 1",
            STATISTICS_COLUMNS
        ))
        .bind(clinic_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(statistics_from_row).transpose()
    }
}

// ==============================================================================
// TRANSACTION
// ==============================================================================

/// Rolls back when dropped without `commit`.
pub struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgTransaction {
    fn expect_one(affected: u64, what: String) -> DbResult<()> {
        if affected == 0 {
            return Err(DbError::NotFound(what));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn offer_for_update(&mut self, offer_id: i64) -> DbResult<Option<ClinicOffer>> {
        let plan_id: Option<i64> = sqlx::query_scalar(
            "SELECT treatment_plan_id FROM clinic_offers WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(offer_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        let Some(plan_id) = plan_id else {
            return Ok(None);
        };

        // Plan first, then offer: every writer of a plan's offers takes the
        // locks in this order.
        sqlx::query("SELECT id FROM treatment_plans WHERE id = $1 FOR UPDATE")
            .bind(plan_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        let row = sqlx::query(&format!(
            "SELECT {} FROM clinic_offers WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            OFFER_COLUMNS
        ))
        .bind(offer_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(offer_from_row).transpose()
    }

    async fn plan_for_update(&mut self, plan_id: i64) -> DbResult<Option<TreatmentPlan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM treatment_plans WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            PLAN_COLUMNS
        ))
        .bind(plan_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(plan_from_row).transpose()
    }

    async fn clinic_exists(&mut self, clinic_id: i64) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM clinics WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(clinic_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn clinic_for_update(&mut self, clinic_id: i64) -> DbResult<bool> {
        let locked: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM clinics WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(clinic_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(locked.is_some())
    }

    async fn clinic_has_offer(&mut self, plan_id: i64, clinic_id: i64) -> DbResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM clinic_offers \
             WHERE treatment_plan_id = $1 AND clinic_id = $2 AND deleted_at IS NULL)",
        )
        .bind(plan_id)
        .bind(clinic_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn insert_offer(&mut self, offer: &NewClinicOffer) -> DbResult<ClinicOffer> {
        let row = sqlx::query(&format!(
            "INSERT INTO clinic_offers (treatment_plan_id, clinic_id, status, therapy_cost, \
             orthopedics_cost, surgery_cost, hygiene_cost, periodontics_cost, total_cost, \
             estimated_duration, installment_months, warranty_details, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING {}",
            OFFER_COLUMNS
        ))
        .bind(offer.treatment_plan_id)
        .bind(offer.clinic_id)
        .bind(offer.status.as_str())
        .bind(offer.costs.therapy_cost)
        .bind(offer.costs.orthopedics_cost)
        .bind(offer.costs.surgery_cost)
        .bind(offer.costs.hygiene_cost)
        .bind(offer.costs.periodontics_cost)
        .bind(offer.total_cost)
        .bind(offer.estimated_duration.as_deref())
        .bind(offer.installment_months)
        .bind(offer.warranty_details.as_deref())
        .bind(offer.notes.as_deref())
        .fetch_one(&mut *self.tx)
        .await?;
        offer_from_row(&row)
    }

    async fn set_offer_status(&mut self, offer_id: i64, status: OfferStatus) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE clinic_offers SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(offer_id)
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await?;
        Self::expect_one(result.rows_affected(), format!("offer {}", offer_id))
    }

    async fn reject_competing_offers(&mut self, plan_id: i64, keep_offer_id: i64) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE clinic_offers SET status = $3, updated_at = NOW() \
             WHERE treatment_plan_id = $1 AND id <> $2 AND deleted_at IS NULL",
        )
        .bind(plan_id)
        .bind(keep_offer_id)
        .bind(OfferStatus::Rejected.as_str())
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn set_plan_status(&mut self, plan_id: i64, status: PlanStatus) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE treatment_plans SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(plan_id)
        .bind(status.as_str())
        .execute(&mut *self.tx)
        .await?;
        Self::expect_one(result.rows_affected(), format!("treatment plan {}", plan_id))
    }

    async fn insert_appointment(&mut self, appointment: &NewAppointment) -> DbResult<Appointment> {
        let row = sqlx::query(&format!(
            "INSERT INTO appointments (patient_id, clinic_id, treatment_plan_id, clinic_offer_id, \
             appointment_date, specialization, status, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment.patient_id)
        .bind(appointment.clinic_id)
        .bind(appointment.treatment_plan_id)
        .bind(appointment.clinic_offer_id)
        .bind(appointment.appointment_date)
        .bind(appointment.specialization.map(|s| s.as_str()))
        .bind(appointment.status.as_str())
        .bind(appointment.notes.as_deref())
        .fetch_one(&mut *self.tx)
        .await?;
        appointment_from_row(&row)
    }

    async fn appointment_for_update(
        &mut self,
        appointment_id: i64,
    ) -> DbResult<Option<Appointment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM appointments WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        row.as_ref().map(appointment_from_row).transpose()
    }

    async fn update_appointment(
        &mut self,
        appointment_id: i64,
        status: AppointmentStatus,
        notes: Option<String>,
    ) -> DbResult<Appointment> {
        let row = sqlx::query(&format!(
            "UPDATE appointments SET status = $2, notes = COALESCE($3, notes), updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING {}",
            APPOINTMENT_COLUMNS
        ))
        .bind(appointment_id)
        .bind(status.as_str())
        .bind(notes)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("appointment {}", appointment_id)))?;
        appointment_from_row(&row)
    }

    async fn insert_review(&mut self, review: &NewReview) -> DbResult<Review> {
        let row = sqlx::query(&format!(
            "INSERT INTO reviews (patient_id, clinic_id, rating, comment, is_public) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            REVIEW_COLUMNS
        ))
        .bind(review.patient_id)
        .bind(review.clinic_id)
        .bind(review.rating)
        .bind(review.comment.as_deref())
        .bind(review.is_public)
        .fetch_one(&mut *self.tx)
        .await?;
        review_from_row(&row)
    }

    async fn refresh_clinic_rating(&mut self, clinic_id: i64) -> DbResult<RatingSummary> {
        let row = sqlx::query(
            "UPDATE clinics c SET rating = s.avg_rating, review_count = s.review_count, \
             updated_at = NOW() \
             FROM ( \
                 SELECT COALESCE(AVG(rating), 0)::DOUBLE PRECISION AS avg_rating, \
                        COUNT(*) AS review_count \
                 FROM reviews WHERE clinic_id = $1 AND deleted_at IS NULL \
             ) s \
             WHERE c.id = $1 AND c.deleted_at IS NULL \
             RETURNING c.rating, c.review_count",
        )
        .bind(clinic_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("clinic {}", clinic_id)))?;
        Ok(RatingSummary {
            rating: row.try_get("rating")?,
            review_count: row.try_get("review_count")?,
        })
    }

    async fn upsert_price_item(
        &mut self,
        clinic_id: i64,
        item: &PriceListInput,
    ) -> DbResult<PriceListItem> {
        let row = match item.id {
            Some(id) => sqlx::query(&format!(
                "UPDATE price_lists SET specialization = $3, service_name = $4, price = $5, \
                 warranty_years = $6, updated_at = NOW() \
                 WHERE id = $1 AND clinic_id = $2 AND deleted_at IS NULL RETURNING {}",
                PRICE_COLUMNS
            ))
            .bind(id)
            .bind(clinic_id)
            .bind(item.specialization.as_str())
            .bind(&item.service_name)
            .bind(item.price)
            .bind(item.warranty_years)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("price list item {}", id)))?,
            None => sqlx::query(&format!(
                "INSERT INTO price_lists (clinic_id, specialization, service_name, price, \
                 warranty_years) VALUES ($1, $2, $3, $4, $5) RETURNING {}",
                PRICE_COLUMNS
            ))
            .bind(clinic_id)
            .bind(item.specialization.as_str())
            .bind(&item.service_name)
            .bind(item.price)
            .bind(item.warranty_years)
            .fetch_one(&mut *self.tx)
            .await?,
        };
        price_item_from_row(&row)
    }

    async fn commit(self: Box<Self>) -> DbResult<()> {
        self.tx.commit().await?;
        debug!("PostgreSQL transaction committed");
        Ok(())
    }
}
