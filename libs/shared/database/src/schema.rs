// libs/shared/database/src/schema.rs
use sqlx::PgPool;
use tracing::info;

use crate::error::DbResult;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS patients (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        first_name TEXT NOT NULL,
        last_name TEXT NOT NULL,
        date_of_birth DATE,
        gender TEXT,
        city TEXT,
        district TEXT,
        price_segment TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clinics (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        name TEXT NOT NULL,
        license_number TEXT,
        year_established INTEGER,
        rating DOUBLE PRECISION NOT NULL DEFAULT 0,
        review_count BIGINT NOT NULL DEFAULT 0,
        city TEXT,
        district TEXT,
        address TEXT,
        has_therapy BOOLEAN NOT NULL DEFAULT FALSE,
        has_orthopedics BOOLEAN NOT NULL DEFAULT FALSE,
        has_surgery BOOLEAN NOT NULL DEFAULT FALSE,
        has_hygiene BOOLEAN NOT NULL DEFAULT FALSE,
        has_periodontics BOOLEAN NOT NULL DEFAULT FALSE,
        offers_installment BOOLEAN NOT NULL DEFAULT FALSE,
        offers_insurance BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS regulators (
        id BIGSERIAL PRIMARY KEY,
        user_id BIGINT NOT NULL,
        organization TEXT,
        region TEXT,
        position TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS ct_scans (
        id BIGSERIAL PRIMARY KEY,
        patient_id BIGINT NOT NULL REFERENCES patients(id),
        upload_date TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        file_url TEXT,
        status TEXT NOT NULL DEFAULT 'uploaded',
        ai_processed BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS treatment_plans (
        id BIGSERIAL PRIMARY KEY,
        patient_id BIGINT NOT NULL REFERENCES patients(id),
        ct_scan_id BIGINT NOT NULL UNIQUE REFERENCES ct_scans(id),
        status TEXT NOT NULL DEFAULT 'generated',
        requires_therapy BOOLEAN NOT NULL DEFAULT FALSE,
        requires_orthopedics BOOLEAN NOT NULL DEFAULT FALSE,
        requires_surgery BOOLEAN NOT NULL DEFAULT FALSE,
        requires_hygiene BOOLEAN NOT NULL DEFAULT FALSE,
        requires_periodontics BOOLEAN NOT NULL DEFAULT FALSE,
        therapy_min_cost BIGINT NOT NULL DEFAULT 0,
        therapy_max_cost BIGINT NOT NULL DEFAULT 0,
        orthopedics_min_cost BIGINT NOT NULL DEFAULT 0,
        orthopedics_max_cost BIGINT NOT NULL DEFAULT 0,
        surgery_min_cost BIGINT NOT NULL DEFAULT 0,
        surgery_max_cost BIGINT NOT NULL DEFAULT 0,
        hygiene_min_cost BIGINT NOT NULL DEFAULT 0,
        hygiene_max_cost BIGINT NOT NULL DEFAULT 0,
        periodontics_min_cost BIGINT NOT NULL DEFAULT 0,
        periodontics_max_cost BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS treatment_items (
        id BIGSERIAL PRIMARY KEY,
        treatment_plan_id BIGINT NOT NULL REFERENCES treatment_plans(id),
        specialization TEXT NOT NULL,
        tooth_number TEXT,
        diagnosis TEXT NOT NULL,
        procedure TEXT NOT NULL,
        urgency TEXT,
        estimated_cost BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS clinic_offers (
        id BIGSERIAL PRIMARY KEY,
        treatment_plan_id BIGINT NOT NULL REFERENCES treatment_plans(id),
        clinic_id BIGINT NOT NULL REFERENCES clinics(id),
        status TEXT NOT NULL DEFAULT 'pending',
        therapy_cost BIGINT NOT NULL DEFAULT 0,
        orthopedics_cost BIGINT NOT NULL DEFAULT 0,
        surgery_cost BIGINT NOT NULL DEFAULT 0,
        hygiene_cost BIGINT NOT NULL DEFAULT 0,
        periodontics_cost BIGINT NOT NULL DEFAULT 0,
        total_cost BIGINT NOT NULL DEFAULT 0,
        estimated_duration TEXT,
        installment_months INTEGER NOT NULL DEFAULT 0,
        warranty_details TEXT,
        notes TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS appointments (
        id BIGSERIAL PRIMARY KEY,
        patient_id BIGINT NOT NULL REFERENCES patients(id),
        clinic_id BIGINT NOT NULL REFERENCES clinics(id),
        treatment_plan_id BIGINT NOT NULL REFERENCES treatment_plans(id),
        clinic_offer_id BIGINT NOT NULL REFERENCES clinic_offers(id),
        appointment_date TIMESTAMPTZ NOT NULL,
        specialization TEXT,
        status TEXT NOT NULL DEFAULT 'scheduled',
        notes TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS reviews (
        id BIGSERIAL PRIMARY KEY,
        patient_id BIGINT NOT NULL REFERENCES patients(id),
        clinic_id BIGINT NOT NULL REFERENCES clinics(id),
        rating INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
        comment TEXT,
        is_public BOOLEAN NOT NULL DEFAULT FALSE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS complaints (
        id BIGSERIAL PRIMARY KEY,
        patient_id BIGINT NOT NULL REFERENCES patients(id),
        clinic_id BIGINT NOT NULL REFERENCES clinics(id),
        subject TEXT NOT NULL,
        description TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'open',
        resolution TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS price_lists (
        id BIGSERIAL PRIMARY KEY,
        clinic_id BIGINT NOT NULL REFERENCES clinics(id),
        specialization TEXT NOT NULL,
        service_name TEXT NOT NULL,
        price BIGINT NOT NULL,
        warranty_years INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS statistics (
        id BIGSERIAL PRIMARY KEY,
        date DATE NOT NULL,
        clinic_id BIGINT REFERENCES clinics(id),
        treatment_plans_generated BIGINT NOT NULL DEFAULT 0,
        appointments_scheduled BIGINT NOT NULL DEFAULT 0,
        appointments_completed BIGINT NOT NULL DEFAULT 0,
        total_revenue BIGINT NOT NULL DEFAULT 0,
        patient_count BIGINT NOT NULL DEFAULT 0,
        caries_count BIGINT NOT NULL DEFAULT 0,
        pulpitis_count BIGINT NOT NULL DEFAULT 0,
        periodontitis_count BIGINT NOT NULL DEFAULT 0,
        gingivitis_count BIGINT NOT NULL DEFAULT 0,
        parodontitis_count BIGINT NOT NULL DEFAULT 0,
        average_wait_days DOUBLE PRECISION NOT NULL DEFAULT 0,
        average_treatment_cost BIGINT NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at TIMESTAMPTZ
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_patients_user_id ON patients(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_clinics_user_id ON clinics(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_regulators_user_id ON regulators(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_ct_scans_patient_id ON ct_scans(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_treatment_plans_patient_id ON treatment_plans(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_treatment_items_plan_id ON treatment_items(treatment_plan_id)",
    "CREATE INDEX IF NOT EXISTS idx_clinic_offers_clinic_id ON clinic_offers(clinic_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_clinic_id ON appointments(clinic_id)",
    "CREATE INDEX IF NOT EXISTS idx_appointments_patient_id ON appointments(patient_id)",
    "CREATE INDEX IF NOT EXISTS idx_reviews_clinic_id ON reviews(clinic_id)",
    "CREATE INDEX IF NOT EXISTS idx_price_lists_clinic_id ON price_lists(clinic_id)",
    "CREATE INDEX IF NOT EXISTS idx_statistics_date_clinic ON statistics(date, clinic_id)",
    // One live offer per clinic and plan.
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_clinic_offers_plan_clinic \
     ON clinic_offers(treatment_plan_id, clinic_id) WHERE deleted_at IS NULL",
    // At most one accepted offer per plan.
    "CREATE UNIQUE INDEX IF NOT EXISTS uq_clinic_offers_plan_accepted \
     ON clinic_offers(treatment_plan_id) WHERE status = 'accepted' AND deleted_at IS NULL",
];

/// Creates every table and index that does not exist yet.
pub async fn migrate(pool: &PgPool) -> DbResult<()> {
    for statement in TABLES {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database tables created successfully");

    for statement in INDEXES {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database indexes created successfully");

    Ok(())
}
