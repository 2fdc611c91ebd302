//! Treatment plan models.
//!
//! A plan is an ordered list of steps. Step status is set by staff only:
//! nothing here advances a step automatically, and more than one step may be
//! in progress at the same time.

use serde::{Deserialize, Serialize};

/// The periodontal workflow every new patient starts with.
pub const DEFAULT_PLAN_LABELS: [&str; 8] = [
    "歯周精密検査 (1回目)",
    "スケーリング・TBI",
    "再評価 (1回目)",
    "SRP (ルートプレーニング)",
    "再評価 (2回目)",
    "歯周外科手術 (必要時)",
    "再評価 (最終)",
    "メンテナンス (SPT)",
];

/// Label given to steps added in plan edit mode.
pub const NEW_STEP_LABEL: &str = "新しい工程";

/// Treatment step status.
///
/// The original display values are accepted on input so that exports from
/// the browser version of the app load unchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum StepStatus {
    /// Not started
    #[serde(rename = "PENDING", alias = "未着手")]
    Pending,
    /// Being worked on
    #[serde(rename = "IN_PROGRESS", alias = "実施中")]
    InProgress,
    /// Done
    #[serde(rename = "COMPLETED", alias = "完了")]
    Completed,
}

impl StepStatus {
    /// Label shown to staff.
    pub fn display_label(&self) -> &'static str {
        match self {
            StepStatus::Pending => "未着手",
            StepStatus::InProgress => "実施中",
            StepStatus::Completed => "完了",
        }
    }
}

/// Kind of an attached file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Other,
}

/// A file attached to a treatment step. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientFile {
    /// Unique file ID
    pub id: String,
    /// Embedded content as a data URL
    pub url: String,
    /// Original file name
    pub name: String,
    /// File kind
    #[serde(rename = "type")]
    pub kind: FileKind,
    /// Capture date
    pub date: String,
}

impl PatientFile {
    /// Wrap an already-encoded image data URL.
    pub fn image(name: impl Into<String>, data_url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: data_url.into(),
            name: name.into(),
            kind: FileKind::Image,
            date: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == FileKind::Image
    }
}

/// A single step of a treatment plan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentStep {
    /// Unique step ID
    pub id: String,
    /// Step name, editable by staff
    pub label: String,
    /// Current status
    pub status: StepStatus,
    /// Clinician notes
    #[serde(default)]
    pub notes: String,
    /// Attached files, in upload order
    #[serde(default)]
    pub files: Vec<PatientFile>,
    /// Last staff member to update this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl TreatmentStep {
    /// Create a pending step with no notes or files.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            label: label.into(),
            status: StepStatus::Pending,
            notes: String::new(),
            files: Vec::new(),
            updated_by: None,
        }
    }

    /// Merge a partial update into this step.
    pub fn apply(&mut self, update: StepUpdate, actor: &str) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(notes) = update.notes {
            self.notes = notes;
        }
        if let Some(files) = update.files {
            self.files = files;
        }
        self.updated_by = Some(actor.to_string());
    }
}

/// Partial update of a step's editable fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepUpdate {
    pub status: Option<StepStatus>,
    pub notes: Option<String>,
    pub files: Option<Vec<PatientFile>>,
}

impl StepUpdate {
    pub fn status(status: StepStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(notes.into()),
            ..Self::default()
        }
    }

    pub fn files(files: Vec<PatientFile>) -> Self {
        Self {
            files: Some(files),
            ..Self::default()
        }
    }
}

/// Direction for reordering a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Ordered list of treatment steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct TreatmentPlan {
    steps: Vec<TreatmentStep>,
}

impl TreatmentPlan {
    /// Build a plan from labels; the first step starts in progress.
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut steps: Vec<TreatmentStep> = labels.into_iter().map(TreatmentStep::new).collect();
        if let Some(first) = steps.first_mut() {
            first.status = StepStatus::InProgress;
        }
        Self { steps }
    }

    /// The standard periodontal plan.
    pub fn default_plan() -> Self {
        Self::from_labels(DEFAULT_PLAN_LABELS)
    }

    pub fn from_steps(steps: Vec<TreatmentStep>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[TreatmentStep] {
        &self.steps
    }

    pub fn into_steps(self) -> Vec<TreatmentStep> {
        self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, step_id: &str) -> Option<&TreatmentStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    fn position(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }

    // =========================================================================
    // Editing
    // =========================================================================

    /// Append a pending step and return its ID.
    pub fn add_step(&mut self, label: impl Into<String>) -> String {
        let step = TreatmentStep::new(label);
        let id = step.id.clone();
        self.steps.push(step);
        id
    }

    /// Remove a step. The last remaining step cannot be removed.
    pub fn remove_step(&mut self, step_id: &str) -> bool {
        if self.steps.len() <= 1 {
            return false;
        }
        match self.position(step_id) {
            Some(idx) => {
                self.steps.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Active step after `removed_id` was removed: the new first step when
    /// the removed step was the active one, otherwise unchanged.
    pub fn active_after_removal(&self, removed_id: &str, active: Option<&str>) -> Option<String> {
        match active {
            Some(id) if id != removed_id => Some(id.to_string()),
            _ => self.steps.first().map(|s| s.id.clone()),
        }
    }

    /// Swap a step with its neighbour. No-op at the boundaries.
    pub fn move_step(&mut self, step_id: &str, direction: Direction) -> bool {
        let Some(idx) = self.position(step_id) else {
            return false;
        };
        let target = match direction {
            Direction::Up if idx > 0 => idx - 1,
            Direction::Down if idx + 1 < self.steps.len() => idx + 1,
            _ => return false,
        };
        self.steps.swap(idx, target);
        true
    }

    /// Replace a step's label.
    pub fn rename_step(&mut self, step_id: &str, label: impl Into<String>) -> bool {
        match self.steps.iter_mut().find(|s| s.id == step_id) {
            Some(step) => {
                step.label = label.into();
                true
            }
            None => false,
        }
    }

    /// Merge a partial update into a step, stamping the acting staff member.
    pub fn update_step(&mut self, step_id: &str, update: StepUpdate, actor: &str) -> bool {
        match self.steps.iter_mut().find(|s| s.id == step_id) {
            Some(step) => {
                step.apply(update, actor);
                true
            }
            None => false,
        }
    }

    /// Append a file to a step.
    pub fn attach_file(&mut self, step_id: &str, file: PatientFile, actor: &str) -> bool {
        let Some(step) = self.step(step_id) else {
            return false;
        };
        let mut files = step.files.clone();
        files.push(file);
        self.update_step(step_id, StepUpdate::files(files), actor)
    }

    /// Drop a file from a step.
    pub fn remove_file(&mut self, step_id: &str, file_id: &str, actor: &str) -> bool {
        let Some(step) = self.step(step_id) else {
            return false;
        };
        if !step.files.iter().any(|f| f.id == file_id) {
            return false;
        }
        let files = step.files.iter().filter(|f| f.id != file_id).cloned().collect();
        self.update_step(step_id, StepUpdate::files(files), actor)
    }

    // =========================================================================
    // Derived state
    // =========================================================================

    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// Completed steps as a rounded percentage; an empty plan is 0%.
    pub fn progress_percent(&self) -> u32 {
        let total = self.steps.len();
        if total == 0 {
            return 0;
        }
        // round-half-up of 100 * completed / total
        ((200 * self.completed_count() + total) / (2 * total)) as u32
    }

    /// Progress as `"completed/total"`.
    pub fn progress_fraction(&self) -> String {
        format!("{}/{}", self.completed_count(), self.steps.len())
    }

    /// First step currently in progress.
    pub fn current_step(&self) -> Option<&TreatmentStep> {
        self.steps
            .iter()
            .find(|s| s.status == StepStatus::InProgress)
    }

    /// Step to show when a patient is first opened.
    pub fn default_active_step(&self) -> Option<&TreatmentStep> {
        self.current_step().or_else(|| self.steps.first())
    }

    /// Keep `selected` while it still exists, otherwise use the default.
    pub fn resolve_active(&self, selected: Option<&str>) -> Option<&TreatmentStep> {
        selected
            .and_then(|id| self.step(id))
            .or_else(|| self.default_active_step())
    }
}
