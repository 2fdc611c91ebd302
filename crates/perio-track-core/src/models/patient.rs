//! Patient models.

use serde::{Deserialize, Serialize};

use super::plan::TreatmentPlan;

/// Name used when a record arrives without one (legacy imports only).
pub const UNNAMED_PATIENT: &str = "名称未設定";

/// A patient and their treatment plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    /// Local UUID - always present, generated locally
    pub id: String,
    /// Clinic-assigned patient number (free-form, not unique)
    pub patient_id: String,
    /// Patient name
    #[serde(default = "unnamed")]
    pub name: String,
    /// Date of birth as entered (YYYY-MM-DD)
    #[serde(default)]
    pub birth_date: String,
    /// Free-text profile notes
    #[serde(default)]
    pub profile_notes: String,
    /// Treatment plan
    #[serde(default)]
    pub plan: TreatmentPlan,
    /// Registration timestamp
    pub created_at: String,
    /// Refreshed on every change to the patient or the plan
    pub last_visit: String,
}

fn unnamed() -> String {
    UNNAMED_PATIENT.to_string()
}

/// Registration form input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPatient {
    pub patient_id: String,
    pub name: String,
    pub birth_date: String,
    pub profile_notes: String,
}

/// Partial update of profile fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub patient_id: Option<String>,
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub profile_notes: Option<String>,
}

impl PatientRecord {
    /// Register a patient with the default plan.
    ///
    /// Returns `None` when the name is missing; nothing is created then.
    pub fn register(input: NewPatient) -> Option<Self> {
        let name = input.name.trim();
        if name.is_empty() {
            return None;
        }

        let now = chrono::Utc::now();
        let patient_id = match input.patient_id.trim() {
            "" => format!("P-{}", now.timestamp_millis()),
            id => id.to_string(),
        };

        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            name: name.to_string(),
            birth_date: input.birth_date.trim().to_string(),
            profile_notes: input.profile_notes,
            plan: TreatmentPlan::default_plan(),
            created_at: now.to_rfc3339(),
            last_visit: now.to_rfc3339(),
        })
    }

    /// Refresh the last-visit timestamp.
    pub fn touch(&mut self) {
        self.last_visit = chrono::Utc::now().to_rfc3339();
    }

    /// Apply a profile update. Returns whether anything changed.
    pub fn update_profile(&mut self, update: ProfileUpdate) -> bool {
        let mut changed = false;
        let mut set = |field: &mut String, value: Option<String>| {
            if let Some(value) = value {
                if *field != value {
                    *field = value;
                    changed = true;
                }
            }
        };

        set(&mut self.patient_id, update.patient_id);
        set(&mut self.name, update.name);
        set(&mut self.birth_date, update.birth_date);
        set(&mut self.profile_notes, update.profile_notes);
        changed
    }

    /// Substring match on name or clinic patient number.
    pub fn matches(&self, term: &str) -> bool {
        self.name.contains(term) || self.patient_id.contains(term)
    }

    /// Label of the step currently in progress, if any.
    pub fn current_step_label(&self) -> Option<&str> {
        self.plan.current_step().map(|s| s.label.as_str())
    }
}
