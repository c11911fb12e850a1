use std::sync::Arc;

use tracing::{debug, info};

use shared_database::{AppState, MarketplaceStore, NewComplaint, SearchCriteria};
use shared_models::{Appointment, Complaint, CtScan, Patient, TreatmentPlan};

use crate::models::{CreateComplaintRequest, PatientError, ScanDetails, SearchCriteriaRequest};

pub struct PatientService {
    store: Arc<dyn MarketplaceStore>,
}

impl PatientService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: Arc::clone(&state.store),
        }
    }

    pub async fn scans(&self, patient: &Patient) -> Result<Vec<CtScan>, PatientError> {
        debug!("Listing scans for patient {}", patient.id);
        Ok(self.store.patient_scans(patient.id).await?)
    }

    /// Scans of other patients read as missing.
    async fn owned_scan(&self, patient: &Patient, scan_id: i64) -> Result<CtScan, PatientError> {
        match self.store.scan_by_id(scan_id).await? {
            Some(scan) if scan.patient_id == patient.id => Ok(scan),
            _ => Err(PatientError::ScanNotFound(scan_id)),
        }
    }

    pub async fn scan(&self, patient: &Patient, scan_id: i64) -> Result<ScanDetails, PatientError> {
        let scan = self.owned_scan(patient, scan_id).await?;
        let treatment_plan = if scan.ai_processed {
            self.store.plan_by_scan_id(scan.id).await?
        } else {
            None
        };
        Ok(ScanDetails {
            scan,
            treatment_plan,
        })
    }

    pub async fn plan_for_scan(
        &self,
        patient: &Patient,
        scan_id: i64,
    ) -> Result<TreatmentPlan, PatientError> {
        let scan = self.owned_scan(patient, scan_id).await?;
        self.store
            .plan_by_scan_id(scan.id)
            .await?
            .ok_or(PatientError::PlanNotFound(scan_id))
    }

    pub async fn plans(&self, patient: &Patient) -> Result<Vec<TreatmentPlan>, PatientError> {
        Ok(self.store.patient_plans(patient.id).await?)
    }

    pub async fn update_search_criteria(
        &self,
        patient: &Patient,
        request: SearchCriteriaRequest,
    ) -> Result<Patient, PatientError> {
        let criteria = SearchCriteria {
            city: non_blank(request.city),
            district: non_blank(request.district),
            price_segment: request.price_segment,
        };
        let updated = self.store.update_search_criteria(patient.id, &criteria).await?;
        info!("Patient {} updated search criteria", patient.id);
        Ok(updated)
    }

    pub async fn appointments(&self, patient: &Patient) -> Result<Vec<Appointment>, PatientError> {
        Ok(self.store.patient_appointments(patient.id).await?)
    }

    pub async fn create_complaint(
        &self,
        patient: &Patient,
        request: CreateComplaintRequest,
    ) -> Result<Complaint, PatientError> {
        if request.subject.trim().is_empty() || request.description.trim().is_empty() {
            return Err(PatientError::ValidationError(
                "subject and description are required".to_string(),
            ));
        }
        if self.store.clinic_by_id(request.clinic_id).await?.is_none() {
            return Err(PatientError::ClinicNotFound(request.clinic_id));
        }

        let complaint = self
            .store
            .insert_complaint(&NewComplaint {
                patient_id: patient.id,
                clinic_id: request.clinic_id,
                subject: request.subject,
                description: request.description,
            })
            .await?;
        info!(
            "Patient {} filed complaint {} against clinic {}",
            patient.id, complaint.id, complaint.clinic_id
        );
        Ok(complaint)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
