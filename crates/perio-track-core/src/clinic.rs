//! Application state: the patient list, its store, and the staff session.
//!
//! Every mutation goes through [`Clinic`], which stamps the acting staff
//! member, refreshes the patient's last visit and rewrites the whole patient
//! list to the store. A failed save leaves the in-memory list as it was.

use perio_track_llm::{Advisor, AdvisorError, AdvisoryRequest, Attachment};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::{self, AuthError};
use crate::db::{DbError, OutboxEntry, OutboxStore, PatientStore, UserStore};
use crate::export::{merge_patients, ImportReport, PatientBackup};
use crate::models::{
    Direction, NewPatient, PatientFile, PatientRecord, ProfileUpdate, StaffSession, StepUpdate,
    NEW_STEP_LABEL,
};
use crate::sync::{Delivery, SheetSummary, SummarySink, SyncError, SyncResult};

/// Clinic errors.
#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("No staff member is logged in")]
    NotAuthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Advisor error: {0}")]
    Advisor(#[from] AdvisorError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ClinicResult<T> = Result<T, ClinicError>;

/// Outcome of an outbox retry pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// The clinic's working state.
pub struct Clinic<S> {
    store: S,
    patients: Vec<PatientRecord>,
    session: Option<StaffSession>,
}

impl<S> Clinic<S>
where
    S: PatientStore + UserStore + OutboxStore,
{
    /// Load the patient list from `store`. No one is logged in yet.
    pub fn open(store: S) -> ClinicResult<Self> {
        let patients = store.load()?;
        debug!(count = patients.len(), "loaded patients");
        Ok(Self {
            store,
            patients,
            session: None,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Create an account and log it in.
    pub fn sign_up(&mut self, name: &str, password: &str) -> ClinicResult<StaffSession> {
        let user = auth::sign_up(&self.store, name, password)?;
        info!(staff = %user.name, "staff account created");
        Ok(self.start_session(user.name))
    }

    pub fn log_in(&mut self, name: &str, password: &str) -> ClinicResult<StaffSession> {
        let user = auth::log_in(&self.store, name, password)?;
        info!(staff = %user.name, "staff logged in");
        Ok(self.start_session(user.name))
    }

    pub fn log_out(&mut self) {
        if let Some(session) = self.session.take() {
            info!(staff = %session.name, "staff logged out");
        }
    }

    pub fn current_staff(&self) -> Option<&StaffSession> {
        self.session.as_ref()
    }

    fn start_session(&mut self, name: String) -> StaffSession {
        let session = StaffSession::start(name);
        self.session = Some(session.clone());
        session
    }

    fn actor(&self) -> ClinicResult<String> {
        self.session
            .as_ref()
            .map(|s| s.name.clone())
            .ok_or(ClinicError::NotAuthenticated)
    }

    // =========================================================================
    // Patients
    // =========================================================================

    /// Register a patient with the default plan and return its ID.
    ///
    /// Incomplete input is ignored: `Ok(None)` and nothing is stored.
    pub fn register_patient(&mut self, input: NewPatient) -> ClinicResult<Option<String>> {
        let actor = self.actor()?;
        let Some(patient) = PatientRecord::register(input) else {
            debug!("registration ignored: missing name");
            return Ok(None);
        };

        let id = patient.id.clone();
        self.patients.insert(0, patient);
        if let Err(e) = self.persist() {
            self.patients.remove(0);
            return Err(e);
        }
        info!(patient = %id, staff = %actor, "patient registered");
        Ok(Some(id))
    }

    /// All patients, newest registration first.
    pub fn patients(&self) -> &[PatientRecord] {
        &self.patients
    }

    pub fn patient(&self, patient_id: &str) -> Option<&PatientRecord> {
        self.patients.iter().find(|p| p.id == patient_id)
    }

    /// Patients whose name or clinic number contains `term`.
    pub fn search_patients(&self, term: &str) -> Vec<&PatientRecord> {
        self.patients.iter().filter(|p| p.matches(term)).collect()
    }

    pub fn update_profile(&mut self, patient_id: &str, update: ProfileUpdate) -> ClinicResult<bool> {
        self.mutate_patient(patient_id, |patient, _| patient.update_profile(update))
    }

    /// Delete a patient together with its steps and files.
    pub fn delete_patient(&mut self, patient_id: &str) -> ClinicResult<bool> {
        let actor = self.actor()?;
        let Some(idx) = self.position(patient_id) else {
            return Ok(false);
        };

        let removed = self.patients.remove(idx);
        if let Err(e) = self.persist() {
            self.patients.insert(idx, removed);
            return Err(e);
        }
        info!(patient = %patient_id, staff = %actor, "patient deleted");
        Ok(true)
    }

    // =========================================================================
    // Treatment plan
    // =========================================================================

    /// Append a pending step; returns its ID.
    pub fn add_step(&mut self, patient_id: &str, label: Option<&str>) -> ClinicResult<Option<String>> {
        let mut added = None;
        self.mutate_patient(patient_id, |patient, _| {
            added = Some(patient.plan.add_step(label.unwrap_or(NEW_STEP_LABEL)));
            true
        })?;
        Ok(added)
    }

    /// Remove a step; the last remaining step stays.
    ///
    /// `active` is the step currently shown. Returns the step to show next,
    /// or `None` when nothing was removed.
    pub fn remove_step(
        &mut self,
        patient_id: &str,
        step_id: &str,
        active: Option<&str>,
    ) -> ClinicResult<Option<String>> {
        let mut next_active = None;
        self.mutate_patient(patient_id, |patient, _| {
            if !patient.plan.remove_step(step_id) {
                return false;
            }
            next_active = patient.plan.active_after_removal(step_id, active);
            true
        })?;
        Ok(next_active)
    }

    pub fn move_step(&mut self, patient_id: &str, step_id: &str, direction: Direction) -> ClinicResult<bool> {
        self.mutate_patient(patient_id, |patient, _| patient.plan.move_step(step_id, direction))
    }

    pub fn rename_step(&mut self, patient_id: &str, step_id: &str, label: &str) -> ClinicResult<bool> {
        self.mutate_patient(patient_id, |patient, _| patient.plan.rename_step(step_id, label))
    }

    /// Merge a partial update into a step as the logged-in staff member.
    pub fn update_step(&mut self, patient_id: &str, step_id: &str, update: StepUpdate) -> ClinicResult<bool> {
        self.mutate_patient(patient_id, |patient, actor| {
            patient.plan.update_step(step_id, update, actor)
        })
    }

    pub fn attach_file(&mut self, patient_id: &str, step_id: &str, file: PatientFile) -> ClinicResult<bool> {
        self.mutate_patient(patient_id, |patient, actor| {
            patient.plan.attach_file(step_id, file, actor)
        })
    }

    pub fn remove_file(&mut self, patient_id: &str, step_id: &str, file_id: &str) -> ClinicResult<bool> {
        self.mutate_patient(patient_id, |patient, actor| {
            patient.plan.remove_file(step_id, file_id, actor)
        })
    }

    /// Apply `f` to a copy of a patient; on change, refresh its last visit
    /// and save. The in-memory record is only replaced once the save succeeds.
    fn mutate_patient<F>(&mut self, patient_id: &str, f: F) -> ClinicResult<bool>
    where
        F: FnOnce(&mut PatientRecord, &str) -> bool,
    {
        let actor = self.actor()?;
        let Some(idx) = self.position(patient_id) else {
            return Ok(false);
        };

        let mut updated = self.patients[idx].clone();
        if !f(&mut updated, &actor) {
            return Ok(false);
        }
        updated.touch();

        let previous = std::mem::replace(&mut self.patients[idx], updated);
        if let Err(e) = self.persist() {
            self.patients[idx] = previous;
            return Err(e);
        }
        debug!(patient = %patient_id, staff = %actor, "patient updated");
        Ok(true)
    }

    fn position(&self, patient_id: &str) -> Option<usize> {
        self.patients.iter().position(|p| p.id == patient_id)
    }

    fn persist(&mut self) -> ClinicResult<()> {
        self.store.save_all(&self.patients)?;
        Ok(())
    }

    // =========================================================================
    // External collaborators
    //
    // Prepare and record steps never touch the network; only the
    // `Advisor`/`SummarySink` call between them does.
    // =========================================================================

    /// Advisor input for a step.
    pub fn advisory_request(&self, patient_id: &str, step_id: &str) -> ClinicResult<AdvisoryRequest> {
        self.actor()?;
        let patient = self
            .patient(patient_id)
            .ok_or_else(|| ClinicError::NotFound(format!("patient {}", patient_id)))?;
        let step = patient
            .plan
            .step(step_id)
            .ok_or_else(|| ClinicError::NotFound(format!("step {}", step_id)))?;

        Ok(AdvisoryRequest {
            patient_name: patient.name.clone(),
            profile_notes: patient.profile_notes.clone(),
            step_label: step.label.clone(),
            step_notes: step.notes.clone(),
            attachments: step
                .files
                .iter()
                .map(|f| Attachment {
                    url: f.url.clone(),
                    is_image: f.is_image(),
                })
                .collect(),
        })
    }

    /// Ask the advisor about a step. The plan is left untouched.
    pub fn request_advice(&self, patient_id: &str, step_id: &str, advisor: &dyn Advisor) -> ClinicResult<String> {
        let request = self.advisory_request(patient_id, step_id)?;
        Ok(advisor.advise(&request)?)
    }

    /// JSON summary row for a patient.
    pub fn sync_payload(&self, patient_id: &str) -> ClinicResult<String> {
        self.actor()?;
        let patient = self
            .patient(patient_id)
            .ok_or_else(|| ClinicError::NotFound(format!("patient {}", patient_id)))?;
        Ok(SheetSummary::from_patient(patient).to_json()?)
    }

    /// Record the outcome of delivering `payload`. Failed deliveries are
    /// queued, replacing any summary already queued for the patient.
    pub fn record_sync(
        &self,
        patient_id: &str,
        payload: &str,
        outcome: SyncResult<Delivery>,
    ) -> ClinicResult<Delivery> {
        match outcome {
            Ok(delivery) => {
                info!(patient = %patient_id, ?delivery, "summary synced");
                Ok(delivery)
            }
            Err(SyncError::NotConfigured) => Err(SyncError::NotConfigured.into()),
            Err(e) => {
                warn!(patient = %patient_id, error = %e, "summary queued for retry");
                self.store.enqueue(patient_id, payload, &e.to_string())?;
                Err(e.into())
            }
        }
    }

    /// Push a patient's summary row.
    pub fn sync_patient(&self, patient_id: &str, sink: &dyn SummarySink) -> ClinicResult<Delivery> {
        let payload = self.sync_payload(patient_id)?;
        let outcome = sink.deliver(&payload);
        self.record_sync(patient_id, &payload, outcome)
    }

    /// Summaries waiting for redelivery, oldest first.
    pub fn pending_syncs(&self) -> ClinicResult<Vec<OutboxEntry>> {
        self.actor()?;
        Ok(self.store.pending()?)
    }

    /// Record a redelivery attempt; returns whether it went through.
    pub fn record_retry(&self, entry: &OutboxEntry, outcome: SyncResult<Delivery>) -> ClinicResult<bool> {
        match outcome {
            Ok(_) => {
                self.store.mark_delivered(entry.id)?;
                Ok(true)
            }
            Err(e) => {
                self.store.record_failure(entry.id, &e.to_string())?;
                Ok(false)
            }
        }
    }

    /// Resend every queued summary once.
    pub fn retry_outbox(&self, sink: &dyn SummarySink) -> ClinicResult<RetryReport> {
        let mut report = RetryReport::default();
        for entry in self.pending_syncs()? {
            let outcome = sink.deliver(&entry.payload);
            if self.record_retry(&entry, outcome)? {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }
        debug!(delivered = report.delivered, failed = report.failed, "outbox retried");
        Ok(report)
    }

    // =========================================================================
    // Backup
    // =========================================================================

    pub fn export_json(&self) -> ClinicResult<String> {
        Ok(PatientBackup::new(&self.patients).to_json()?)
    }

    /// Merge a backup (or a legacy patient array) into the list and save.
    /// The list is unchanged when the file is invalid or the save fails.
    pub fn import_json(&mut self, json: &str) -> ClinicResult<ImportReport> {
        let actor = self.actor()?;
        let imported = PatientBackup::from_json(json)?;

        let mut merged = self.patients.clone();
        let report = merge_patients(&mut merged, imported);
        self.store.save_all(&merged)?;
        self.patients = merged;

        info!(added = report.added, replaced = report.replaced, staff = %actor, "patients imported");
        Ok(report)
    }
}
