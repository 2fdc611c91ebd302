//! One-row progress summary for the clinic spreadsheet.

use serde::{Deserialize, Serialize};

use crate::models::PatientRecord;

/// Shown in the status column when no step is in progress.
pub const NO_CURRENT_STEP: &str = "完了/待機中";

/// Row pushed to the spreadsheet webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    /// When the summary was built
    pub timestamp: String,
    /// Clinic-assigned patient number
    pub patient_id: String,
    pub name: String,
    pub birth_date: String,
    pub last_visit: String,
    /// Label of the step in progress
    pub current_status: String,
    /// `"completed/total"`
    pub progress: String,
}

impl SheetSummary {
    pub fn from_patient(patient: &PatientRecord) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            patient_id: patient.patient_id.clone(),
            name: patient.name.clone(),
            birth_date: patient.birth_date.clone(),
            last_visit: patient.last_visit.clone(),
            current_status: patient
                .current_step_label()
                .unwrap_or(NO_CURRENT_STEP)
                .to_string(),
            progress: patient.plan.progress_fraction(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPatient, StepStatus, StepUpdate};

    fn patient() -> PatientRecord {
        PatientRecord::register(NewPatient {
            patient_id: "P1".into(),
            name: "Taro".into(),
            birth_date: "1990-01-01".into(),
            profile_notes: String::new(),
        })
        .unwrap()
    }

    #[test]
    fn test_summary_of_new_patient() {
        let summary = SheetSummary::from_patient(&patient());
        assert_eq!(summary.patient_id, "P1");
        assert_eq!(summary.current_status, "歯周精密検査 (1回目)");
        assert_eq!(summary.progress, "0/8");
    }

    #[test]
    fn test_summary_without_step_in_progress() {
        let mut patient = patient();
        let ids: Vec<String> = patient.plan.steps().iter().map(|s| s.id.clone()).collect();
        for id in &ids {
            patient
                .plan
                .update_step(id, StepUpdate::status(StepStatus::Completed), "Sato");
        }

        let summary = SheetSummary::from_patient(&patient);
        assert_eq!(summary.current_status, NO_CURRENT_STEP);
        assert_eq!(summary.progress, "8/8");
    }

    #[test]
    fn test_summary_json_keys() {
        let json = SheetSummary::from_patient(&patient()).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for key in ["timestamp", "patientId", "name", "birthDate", "lastVisit", "currentStatus", "progress"] {
            assert!(value.get(key).is_some(), "missing {}", key);
        }
    }
}
