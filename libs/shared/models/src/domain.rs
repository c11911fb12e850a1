// libs/shared/models/src/domain.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Declares a status-like enum stored as lowercase text, with `Display`,
/// `FromStr` and a snake_case serde representation that all agree.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(format!("unknown {} '{}'", stringify!($name), other)),
                }
            }
        }
    };
}

// ==============================================================================
// STATUSES AND CATEGORIES
// ==============================================================================

text_enum! {
    /// Dental service category used to bucket costs and plan requirements.
    pub enum Specialization {
        #[default]
        Therapy => "therapy",
        Orthopedics => "orthopedics",
        Surgery => "surgery",
        Hygiene => "hygiene",
        Periodontics => "periodontics",
    }
}

text_enum! {
    pub enum ScanStatus {
        #[default]
        Uploaded => "uploaded",
        Processing => "processing",
        Completed => "completed",
        Error => "error",
    }
}

text_enum! {
    pub enum PlanStatus {
        #[default]
        Generated => "generated",
        /// Declared but never entered by any operation.
        OffersRequested => "offers_requested",
        OffersReceived => "offers_received",
        OfferSelected => "offer_selected",
    }
}

text_enum! {
    pub enum OfferStatus {
        #[default]
        Pending => "pending",
        Sent => "sent",
        Accepted => "accepted",
        Rejected => "rejected",
    }
}

text_enum! {
    pub enum AppointmentStatus {
        #[default]
        Scheduled => "scheduled",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
        NoShow => "no_show",
    }
}

text_enum! {
    pub enum ComplaintStatus {
        #[default]
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
        Closed => "closed",
    }
}

text_enum! {
    pub enum PriceSegment {
        Economy => "economy",
        #[default]
        Medium => "medium",
        Premium => "premium",
    }
}

// ==============================================================================
// PROFILES
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub district: Option<String>,
    pub price_segment: Option<PriceSegment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Patient {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clinic {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub license_number: Option<String>,
    pub year_established: Option<i32>,
    /// Mean of all live reviews, recomputed on every review write.
    pub rating: f64,
    pub review_count: i64,
    pub city: Option<String>,
    pub district: Option<String>,
    pub address: Option<String>,
    pub has_therapy: bool,
    pub has_orthopedics: bool,
    pub has_surgery: bool,
    pub has_hygiene: bool,
    pub has_periodontics: bool,
    pub offers_installment: bool,
    pub offers_insurance: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Clinic {
    pub fn provides(&self, specialization: Specialization) -> bool {
        match specialization {
            Specialization::Therapy => self.has_therapy,
            Specialization::Orthopedics => self.has_orthopedics,
            Specialization::Surgery => self.has_surgery,
            Specialization::Hygiene => self.has_hygiene,
            Specialization::Periodontics => self.has_periodontics,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Regulator {
    pub id: i64,
    pub user_id: i64,
    pub organization: Option<String>,
    pub region: Option<String>,
    pub position: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// SCANS AND TREATMENT PLANS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CtScan {
    pub id: i64,
    pub patient_id: i64,
    pub upload_date: DateTime<Utc>,
    pub file_url: Option<String>,
    pub status: ScanStatus,
    pub ai_processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostRange {
    pub min: i64,
    pub max: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreatmentPlan {
    pub id: i64,
    pub patient_id: i64,
    pub ct_scan_id: i64,
    pub status: PlanStatus,

    pub requires_therapy: bool,
    pub requires_orthopedics: bool,
    pub requires_surgery: bool,
    pub requires_hygiene: bool,
    pub requires_periodontics: bool,

    pub therapy_min_cost: i64,
    pub therapy_max_cost: i64,
    pub orthopedics_min_cost: i64,
    pub orthopedics_max_cost: i64,
    pub surgery_min_cost: i64,
    pub surgery_max_cost: i64,
    pub hygiene_min_cost: i64,
    pub hygiene_max_cost: i64,
    pub periodontics_min_cost: i64,
    pub periodontics_max_cost: i64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<TreatmentItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offers: Vec<ClinicOffer>,
}

impl TreatmentPlan {
    pub fn requires(&self, specialization: Specialization) -> bool {
        match specialization {
            Specialization::Therapy => self.requires_therapy,
            Specialization::Orthopedics => self.requires_orthopedics,
            Specialization::Surgery => self.requires_surgery,
            Specialization::Hygiene => self.requires_hygiene,
            Specialization::Periodontics => self.requires_periodontics,
        }
    }

    pub fn required_specializations(&self) -> Vec<Specialization> {
        Specialization::ALL
            .iter()
            .copied()
            .filter(|s| self.requires(*s))
            .collect()
    }

    pub fn cost_range(&self, specialization: Specialization) -> CostRange {
        let (min, max) = match specialization {
            Specialization::Therapy => (self.therapy_min_cost, self.therapy_max_cost),
            Specialization::Orthopedics => (self.orthopedics_min_cost, self.orthopedics_max_cost),
            Specialization::Surgery => (self.surgery_min_cost, self.surgery_max_cost),
            Specialization::Hygiene => (self.hygiene_min_cost, self.hygiene_max_cost),
            Specialization::Periodontics => (self.periodontics_min_cost, self.periodontics_max_cost),
        };
        CostRange { min, max }
    }
}

/// Single diagnosed procedure of a plan. Immutable once created.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreatmentItem {
    pub id: i64,
    pub treatment_plan_id: i64,
    pub specialization: Specialization,
    /// FDI notation, 11-48.
    pub tooth_number: Option<String>,
    pub diagnosis: String,
    pub procedure: String,
    pub urgency: Option<String>,
    pub estimated_cost: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// OFFERS AND APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBreakdown {
    #[serde(default)]
    pub therapy_cost: i64,
    #[serde(default)]
    pub orthopedics_cost: i64,
    #[serde(default)]
    pub surgery_cost: i64,
    #[serde(default)]
    pub hygiene_cost: i64,
    #[serde(default)]
    pub periodontics_cost: i64,
}

impl CostBreakdown {
    pub fn cost_for(&self, specialization: Specialization) -> i64 {
        match specialization {
            Specialization::Therapy => self.therapy_cost,
            Specialization::Orthopedics => self.orthopedics_cost,
            Specialization::Surgery => self.surgery_cost,
            Specialization::Hygiene => self.hygiene_cost,
            Specialization::Periodontics => self.periodontics_cost,
        }
    }

    pub fn component_sum(&self) -> i64 {
        Specialization::ALL.iter().map(|s| self.cost_for(*s)).sum()
    }
}

/// A clinic's priced bid against a treatment plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicOffer {
    pub id: i64,
    pub treatment_plan_id: i64,
    pub clinic_id: i64,
    pub status: OfferStatus,
    #[serde(flatten)]
    pub costs: CostBreakdown,
    /// Caller-supplied; not reconciled against `costs`.
    pub total_cost: i64,
    pub estimated_duration: Option<String>,
    pub installment_months: i32,
    pub warranty_details: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic: Option<Clinic>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub patient_id: i64,
    pub clinic_id: i64,
    pub treatment_plan_id: i64,
    pub clinic_offer_id: i64,
    pub appointment_date: DateTime<Utc>,
    pub specialization: Option<Specialization>,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// FEEDBACK
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Review {
    pub id: i64,
    pub patient_id: i64,
    pub clinic_id: i64,
    /// 1-5
    pub rating: i32,
    pub comment: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Complaint {
    pub id: i64,
    pub patient_id: i64,
    pub clinic_id: i64,
    pub subject: String,
    pub description: String,
    pub status: ComplaintStatus,
    pub resolution: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceListItem {
    pub id: i64,
    pub clinic_id: i64,
    pub specialization: Specialization,
    pub service_name: String,
    pub price: i64,
    pub warranty_years: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

// ==============================================================================
// STATISTICS
// ==============================================================================

/// Daily fact row. `clinic_id == None` marks a regional aggregate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Statistics {
    pub id: i64,
    pub date: NaiveDate,
    pub clinic_id: Option<i64>,

    pub treatment_plans_generated: i64,
    pub appointments_scheduled: i64,
    pub appointments_completed: i64,
    pub total_revenue: i64,
    pub patient_count: i64,

    pub caries_count: i64,
    pub pulpitis_count: i64,
    pub periodontitis_count: i64,
    pub gingivitis_count: i64,
    pub parodontitis_count: i64,

    pub average_wait_days: f64,
    pub average_treatment_cost: i64,

    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Statistics {
    pub fn is_regional(&self) -> bool {
        self.clinic_id.is_none()
    }
}
