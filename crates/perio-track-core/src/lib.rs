//! Perio-Track Core Library
//!
//! Local-first patient tracking for periodontal treatment in dental clinics.
//!
//! # Architecture
//!
//! ```text
//!   Staff login ──► Clinic (session + patient list) ◄── UI shell (FFI)
//!                        │
//!          ┌─────────────┼──────────────────────┐
//!          │             │                      │
//!          ▼             ▼                      ▼
//!    Treatment plan   PatientStore        External collaborators
//!    (steps, notes,   (SQLite, whole      ├─ AI advisor (read-only)
//!     files, progress) list per save)     └─ Sheet webhook + outbox
//! ```
//!
//! # Core Principle
//!
//! **Staff drive every status change.** Steps never advance on their own and
//! neither the advisor nor the sheet sync ever writes to a plan.
//!
//! # Modules
//!
//! - [`db`]: SQLite persistence for patients, staff accounts and the outbox
//! - [`models`]: Domain types (PatientRecord, TreatmentPlan, TreatmentStep, etc.)
//! - [`auth`]: Salted password hashing and login
//! - [`clinic`]: Application state and every user-facing operation
//! - [`sync`]: Spreadsheet summary webhook
//! - [`export`]: JSON backup and restore
//! - [`config`]: TOML configuration with environment overrides

pub mod auth;
pub mod clinic;
pub mod config;
pub mod db;
pub mod export;
pub mod models;
pub mod sync;

// Re-export commonly used types
pub use clinic::{Clinic, ClinicError, ClinicResult, RetryReport};
pub use config::ClinicConfig;
pub use db::{Database, PatientStore};
pub use models::{
    Direction, FileKind, NewPatient, PatientFile, PatientRecord, ProfileUpdate, StaffSession,
    StepStatus, StepUpdate, TreatmentPlan, TreatmentStep,
};
pub use sync::{Delivery, SheetSummary, SheetWebhook};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use perio_track_llm::{Advisor, AdvisorError, GeminiClient};
use sync::SummarySink;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum PerioTrackError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Not authenticated: {0}")]
    NotAuthenticated(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Advisor configuration error: {0}")]
    AdvisorConfiguration(String),

    #[error("Advisor authentication error: {0}")]
    AdvisorAuth(String),

    #[error("Advisor network error: {0}")]
    AdvisorNetwork(String),

    #[error("Advisor returned no advice: {0}")]
    AdvisorEmpty(String),

    #[error("Sync error: {0}")]
    SyncError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<ClinicError> for PerioTrackError {
    fn from(e: ClinicError) -> Self {
        match e {
            ClinicError::Database(e) => PerioTrackError::DatabaseError(e.to_string()),
            ClinicError::Json(e) => e.into(),
            ClinicError::Auth(e) => PerioTrackError::AuthError(e.to_string()),
            ClinicError::NotAuthenticated => {
                PerioTrackError::NotAuthenticated("log in first".to_string())
            }
            ClinicError::NotFound(what) => PerioTrackError::NotFound(what),
            ClinicError::Advisor(e) => e.into(),
            ClinicError::Sync(e) => PerioTrackError::SyncError(e.to_string()),
        }
    }
}

impl From<AdvisorError> for PerioTrackError {
    fn from(e: AdvisorError) -> Self {
        // The troubleshooting text is what staff should see.
        let text = e.troubleshooting();
        match e {
            AdvisorError::Configuration(_) => PerioTrackError::AdvisorConfiguration(text),
            AdvisorError::Auth(_) => PerioTrackError::AdvisorAuth(text),
            AdvisorError::Network(_) | AdvisorError::Api { .. } => {
                PerioTrackError::AdvisorNetwork(text)
            }
            AdvisorError::InvalidResponse(_) | AdvisorError::EmptyResponse => {
                PerioTrackError::AdvisorEmpty(text)
            }
        }
    }
}

impl From<serde_json::Error> for PerioTrackError {
    fn from(e: serde_json::Error) -> Self {
        PerioTrackError::SerializationError(e.to_string())
    }
}

impl From<db::DbError> for PerioTrackError {
    fn from(e: db::DbError) -> Self {
        PerioTrackError::DatabaseError(e.to_string())
    }
}

impl From<sync::SyncError> for PerioTrackError {
    fn from(e: sync::SyncError) -> Self {
        PerioTrackError::SyncError(e.to_string())
    }
}

impl From<config::ConfigError> for PerioTrackError {
    fn from(e: config::ConfigError) -> Self {
        PerioTrackError::ConfigError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for PerioTrackError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        PerioTrackError::DatabaseError(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open a clinic using explicit settings. Unset fields fall back to the
/// environment, then to defaults.
#[uniffi::export]
pub fn open_clinic(config: FfiConfig) -> Result<Arc<PerioTrackCore>, PerioTrackError> {
    let mut clinic_config = ClinicConfig::default().with_env();
    if !config.database_path.is_empty() {
        clinic_config.database_path = config.database_path.into();
    }
    if config.api_key.is_some() {
        clinic_config.advisor.api_key = config.api_key;
    }
    if let Some(model) = config.model {
        clinic_config.advisor.model = model;
    }
    if config.webhook_url.is_some() {
        clinic_config.sheet.webhook_url = config.webhook_url;
    }

    let db = Database::open(&clinic_config.database_path)?;
    PerioTrackCore::new(db, clinic_config)
}

/// Open a clinic from a TOML config file plus environment overrides.
#[uniffi::export]
pub fn open_clinic_from_file(path: String) -> Result<Arc<PerioTrackCore>, PerioTrackError> {
    let config = ClinicConfig::load(&path)?.with_env();
    let db = Database::open(&config.database_path)?;
    PerioTrackCore::new(db, config)
}

/// Create an in-memory clinic (for testing).
#[uniffi::export]
pub fn open_clinic_in_memory() -> Result<Arc<PerioTrackCore>, PerioTrackError> {
    let db = Database::open_in_memory()?;
    PerioTrackCore::new(db, ClinicConfig::default())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe clinic wrapper for FFI.
///
/// Advisor and sync calls block the calling thread on HTTP, but the clinic
/// lock is not held during the request.
#[derive(uniffi::Object)]
pub struct PerioTrackCore {
    clinic: Arc<Mutex<Clinic<Database>>>,
    config: ClinicConfig,
}

impl PerioTrackCore {
    fn new(db: Database, config: ClinicConfig) -> Result<Arc<Self>, PerioTrackError> {
        let clinic = Clinic::open(db)?;
        Ok(Arc::new(Self {
            clinic: Arc::new(Mutex::new(clinic)),
            config,
        }))
    }
}

#[uniffi::export]
impl PerioTrackCore {
    // =========================================================================
    // Session Operations
    // =========================================================================

    /// Create a staff account and log it in.
    pub fn sign_up(&self, name: String, password: String) -> Result<FfiSession, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        Ok(clinic.sign_up(&name, &password)?.into())
    }

    pub fn log_in(&self, name: String, password: String) -> Result<FfiSession, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        Ok(clinic.log_in(&name, &password)?.into())
    }

    pub fn log_out(&self) -> Result<(), PerioTrackError> {
        self.clinic.lock()?.log_out();
        Ok(())
    }

    pub fn current_staff(&self) -> Result<Option<FfiSession>, PerioTrackError> {
        let clinic = self.clinic.lock()?;
        Ok(clinic.current_staff().cloned().map(Into::into))
    }

    // =========================================================================
    // Patient Operations
    // =========================================================================

    /// Register a patient. Returns `None` when required fields are missing.
    pub fn register_patient(&self, input: FfiNewPatient) -> Result<Option<String>, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        Ok(clinic.register_patient(input.into())?)
    }

    pub fn list_patients(&self) -> Result<Vec<FfiPatient>, PerioTrackError> {
        let clinic = self.clinic.lock()?;
        Ok(clinic.patients().iter().map(FfiPatient::from).collect())
    }

    /// Search patients by name or clinic number.
    pub fn search_patients(&self, term: String) -> Result<Vec<FfiPatient>, PerioTrackError> {
        let clinic = self.clinic.lock()?;
        Ok(clinic
            .search_patients(&term)
            .into_iter()
            .map(FfiPatient::from)
            .collect())
    }

    pub fn get_patient(&self, patient_id: String) -> Result<Option<FfiPatient>, PerioTrackError> {
        let clinic = self.clinic.lock()?;
        Ok(clinic.patient(&patient_id).map(FfiPatient::from))
    }

    pub fn update_profile(
        &self,
        patient_id: String,
        update: FfiProfileUpdate,
    ) -> Result<bool, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        Ok(clinic.update_profile(&patient_id, update.into())?)
    }

    pub fn delete_patient(&self, patient_id: String) -> Result<bool, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        Ok(clinic.delete_patient(&patient_id)?)
    }

    // =========================================================================
    // Treatment Plan Operations
    // =========================================================================

    pub fn add_step(
        &self,
        patient_id: String,
        label: Option<String>,
    ) -> Result<Option<String>, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        Ok(clinic.add_step(&patient_id, label.as_deref())?)
    }

    /// Remove a step. `active` is the step currently shown; returns the
    /// step to show next, or `None` when nothing was removed.
    pub fn remove_step(
        &self,
        patient_id: String,
        step_id: String,
        active: Option<String>,
    ) -> Result<Option<String>, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        Ok(clinic.remove_step(&patient_id, &step_id, active.as_deref())?)
    }

    pub fn move_step(
        &self,
        patient_id: String,
        step_id: String,
        direction: FfiDirection,
    ) -> Result<bool, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        Ok(clinic.move_step(&patient_id, &step_id, direction.into())?)
    }

    pub fn rename_step(
        &self,
        patient_id: String,
        step_id: String,
        label: String,
    ) -> Result<bool, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        Ok(clinic.rename_step(&patient_id, &step_id, &label)?)
    }

    /// Update status and/or notes of a step.
    pub fn update_step(
        &self,
        patient_id: String,
        step_id: String,
        status: Option<FfiStepStatus>,
        notes: Option<String>,
    ) -> Result<bool, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        let update = StepUpdate {
            status: status.map(Into::into),
            notes,
            files: None,
        };
        Ok(clinic.update_step(&patient_id, &step_id, update)?)
    }

    /// Attach an already-resized image; returns the new file ID.
    pub fn attach_image(
        &self,
        patient_id: String,
        step_id: String,
        name: String,
        data_url: String,
    ) -> Result<Option<String>, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        let file = PatientFile::image(name, data_url);
        let file_id = file.id.clone();
        let attached = clinic.attach_file(&patient_id, &step_id, file)?;
        Ok(attached.then_some(file_id))
    }

    pub fn remove_file(
        &self,
        patient_id: String,
        step_id: String,
        file_id: String,
    ) -> Result<bool, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        Ok(clinic.remove_file(&patient_id, &step_id, &file_id)?)
    }

    /// Step to select when the patient is opened; `selected` is kept while
    /// it still exists.
    pub fn active_step(
        &self,
        patient_id: String,
        selected: Option<String>,
    ) -> Result<Option<String>, PerioTrackError> {
        let clinic = self.clinic.lock()?;
        Ok(clinic
            .patient(&patient_id)
            .and_then(|p| p.plan.resolve_active(selected.as_deref()))
            .map(|s| s.id.clone()))
    }

    // =========================================================================
    // Advisor and Sync Operations
    // =========================================================================

    /// Ask the AI advisor about a step. Nothing is stored.
    pub fn request_advice(&self, patient_id: String, step_id: String) -> Result<String, PerioTrackError> {
        let advisor = GeminiClient::new(self.config.advisor.clone())?;
        let request = self.clinic.lock()?.advisory_request(&patient_id, &step_id)?;
        Ok(advisor.advise(&request)?)
    }

    /// Push the patient's summary row to the spreadsheet.
    pub fn sync_patient(&self, patient_id: String) -> Result<FfiDelivery, PerioTrackError> {
        let webhook = SheetWebhook::new(&self.config.sheet)?;
        let payload = self.clinic.lock()?.sync_payload(&patient_id)?;
        let outcome = webhook.deliver(&payload);
        let delivery = self
            .clinic
            .lock()?
            .record_sync(&patient_id, &payload, outcome)?;
        Ok(delivery.into())
    }

    /// Resend summaries that failed earlier.
    pub fn retry_outbox(&self) -> Result<FfiRetryReport, PerioTrackError> {
        let webhook = SheetWebhook::new(&self.config.sheet)?;
        let entries = self.clinic.lock()?.pending_syncs()?;

        let mut report = RetryReport::default();
        for entry in entries {
            let outcome = webhook.deliver(&entry.payload);
            if self.clinic.lock()?.record_retry(&entry, outcome)? {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(report.into())
    }

    // =========================================================================
    // Backup Operations
    // =========================================================================

    pub fn export_json(&self) -> Result<String, PerioTrackError> {
        let clinic = self.clinic.lock()?;
        Ok(clinic.export_json()?)
    }

    pub fn import_json(&self, json: String) -> Result<FfiImportReport, PerioTrackError> {
        let mut clinic = self.clinic.lock()?;
        let report = clinic.import_json(&json)?;
        Ok(FfiImportReport {
            added: report.added as u32,
            replaced: report.replaced as u32,
        })
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe settings for `open_clinic`.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiConfig {
    /// Empty string keeps the default/environment value
    pub database_path: String,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub webhook_url: Option<String>,
}

/// FFI-safe staff session.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSession {
    pub name: String,
    pub logged_in_at: String,
}

impl From<StaffSession> for FfiSession {
    fn from(session: StaffSession) -> Self {
        Self {
            name: session.name,
            logged_in_at: session.logged_in_at,
        }
    }
}

/// FFI-safe registration input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewPatient {
    pub patient_id: String,
    pub name: String,
    pub birth_date: String,
    pub profile_notes: String,
}

impl From<FfiNewPatient> for NewPatient {
    fn from(input: FfiNewPatient) -> Self {
        NewPatient {
            patient_id: input.patient_id,
            name: input.name,
            birth_date: input.birth_date,
            profile_notes: input.profile_notes,
        }
    }
}

/// FFI-safe profile update.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiProfileUpdate {
    pub patient_id: Option<String>,
    pub name: Option<String>,
    pub birth_date: Option<String>,
    pub profile_notes: Option<String>,
}

impl From<FfiProfileUpdate> for ProfileUpdate {
    fn from(update: FfiProfileUpdate) -> Self {
        ProfileUpdate {
            patient_id: update.patient_id,
            name: update.name,
            birth_date: update.birth_date,
            profile_notes: update.profile_notes,
        }
    }
}

/// FFI-safe step status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiStepStatus {
    Pending,
    InProgress,
    Completed,
}

impl From<StepStatus> for FfiStepStatus {
    fn from(status: StepStatus) -> Self {
        match status {
            StepStatus::Pending => FfiStepStatus::Pending,
            StepStatus::InProgress => FfiStepStatus::InProgress,
            StepStatus::Completed => FfiStepStatus::Completed,
        }
    }
}

impl From<FfiStepStatus> for StepStatus {
    fn from(status: FfiStepStatus) -> Self {
        match status {
            FfiStepStatus::Pending => StepStatus::Pending,
            FfiStepStatus::InProgress => StepStatus::InProgress,
            FfiStepStatus::Completed => StepStatus::Completed,
        }
    }
}

/// FFI-safe reorder direction.
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiDirection {
    Up,
    Down,
}

impl From<FfiDirection> for Direction {
    fn from(direction: FfiDirection) -> Self {
        match direction {
            FfiDirection::Up => Direction::Up,
            FfiDirection::Down => Direction::Down,
        }
    }
}

/// FFI-safe attached file.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFile {
    pub id: String,
    pub url: String,
    pub name: String,
    pub is_image: bool,
    pub date: String,
}

impl From<&PatientFile> for FfiFile {
    fn from(file: &PatientFile) -> Self {
        Self {
            id: file.id.clone(),
            url: file.url.clone(),
            name: file.name.clone(),
            is_image: file.is_image(),
            date: file.date.clone(),
        }
    }
}

/// FFI-safe treatment step.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiStep {
    pub id: String,
    pub label: String,
    pub status: FfiStepStatus,
    pub notes: String,
    pub files: Vec<FfiFile>,
    pub updated_by: Option<String>,
}

impl From<&TreatmentStep> for FfiStep {
    fn from(step: &TreatmentStep) -> Self {
        Self {
            id: step.id.clone(),
            label: step.label.clone(),
            status: step.status.into(),
            notes: step.notes.clone(),
            files: step.files.iter().map(FfiFile::from).collect(),
            updated_by: step.updated_by.clone(),
        }
    }
}

/// FFI-safe patient with derived progress.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiPatient {
    pub id: String,
    pub patient_id: String,
    pub name: String,
    pub birth_date: String,
    pub profile_notes: String,
    pub steps: Vec<FfiStep>,
    pub created_at: String,
    pub last_visit: String,
    pub progress_percent: u32,
    /// `"completed/total"`
    pub progress: String,
}

impl From<&PatientRecord> for FfiPatient {
    fn from(patient: &PatientRecord) -> Self {
        Self {
            id: patient.id.clone(),
            patient_id: patient.patient_id.clone(),
            name: patient.name.clone(),
            birth_date: patient.birth_date.clone(),
            profile_notes: patient.profile_notes.clone(),
            steps: patient.plan.steps().iter().map(FfiStep::from).collect(),
            created_at: patient.created_at.clone(),
            last_visit: patient.last_visit.clone(),
            progress_percent: patient.plan.progress_percent(),
            progress: patient.plan.progress_fraction(),
        }
    }
}

/// FFI-safe delivery result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDelivery {
    /// True when the endpoint confirmed receipt
    pub acknowledged: bool,
    pub status: u16,
}

impl From<Delivery> for FfiDelivery {
    fn from(delivery: Delivery) -> Self {
        match delivery {
            Delivery::Acknowledged { status } => Self {
                acknowledged: true,
                status,
            },
            Delivery::Sent { status } => Self {
                acknowledged: false,
                status,
            },
        }
    }
}

/// FFI-safe outbox retry result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRetryReport {
    pub delivered: u32,
    pub failed: u32,
}

impl From<RetryReport> for FfiRetryReport {
    fn from(report: RetryReport) -> Self {
        Self {
            delivered: report.delivered as u32,
            failed: report.failed as u32,
        }
    }
}

/// FFI-safe import result.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiImportReport {
    pub added: u32,
    pub replaced: u32,
}
