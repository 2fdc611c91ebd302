//! Patient database operations.

use std::collections::HashMap;

use rusqlite::params;
use tracing::debug;

use super::{Database, DbError, DbResult, PatientStore};
use crate::models::{
    FileKind, PatientFile, PatientRecord, StepStatus, TreatmentPlan, TreatmentStep,
};

impl PatientStore for Database {
    /// Load every patient with their plans, in list order.
    fn load(&self) -> DbResult<Vec<PatientRecord>> {
        let mut files = self.load_files()?;
        let mut steps = self.load_steps(&mut files)?;

        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, name, birth_date, profile_notes,
                   created_at, last_visit
            FROM patients
            ORDER BY position
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(PatientRow {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                name: row.get(2)?,
                birth_date: row.get(3)?,
                profile_notes: row.get(4)?,
                created_at: row.get(5)?,
                last_visit: row.get(6)?,
            })
        })?;

        let mut patients = Vec::new();
        for row in rows {
            let row = row?;
            let plan = TreatmentPlan::from_steps(steps.remove(&row.id).unwrap_or_default());
            patients.push(PatientRecord {
                id: row.id,
                patient_id: row.patient_id,
                name: row.name,
                birth_date: row.birth_date,
                profile_notes: row.profile_notes,
                plan,
                created_at: row.created_at,
                last_visit: row.last_visit,
            });
        }
        Ok(patients)
    }

    /// Replace the stored patient list with `patients`.
    fn save_all(&mut self, patients: &[PatientRecord]) -> DbResult<()> {
        let tx = self.conn.transaction()?;
        // Steps and files go with their patients via ON DELETE CASCADE
        tx.execute("DELETE FROM patients", [])?;

        {
            let mut insert_patient = tx.prepare(
                r#"
                INSERT INTO patients (
                    id, patient_id, name, birth_date, profile_notes,
                    position, created_at, last_visit
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            let mut insert_step = tx.prepare(
                r#"
                INSERT INTO treatment_steps (
                    patient_id, id, position, label, status, notes, updated_by
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            let mut insert_file = tx.prepare(
                r#"
                INSERT INTO patient_files (
                    patient_id, step_id, id, position, url, name, kind, date
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;

            for (position, patient) in patients.iter().enumerate() {
                insert_patient.execute(params![
                    patient.id,
                    patient.patient_id,
                    patient.name,
                    patient.birth_date,
                    patient.profile_notes,
                    position as i64,
                    patient.created_at,
                    patient.last_visit,
                ])?;

                for (step_pos, step) in patient.plan.steps().iter().enumerate() {
                    insert_step.execute(params![
                        patient.id,
                        step.id,
                        step_pos as i64,
                        step.label,
                        status_to_string(&step.status),
                        step.notes,
                        step.updated_by,
                    ])?;

                    for (file_pos, file) in step.files.iter().enumerate() {
                        insert_file.execute(params![
                            patient.id,
                            step.id,
                            file.id,
                            file_pos as i64,
                            file.url,
                            file.name,
                            kind_to_string(&file.kind),
                            file.date,
                        ])?;
                    }
                }
            }
        }

        tx.commit()?;
        debug!(count = patients.len(), "saved patient list");
        Ok(())
    }
}

impl Database {
    /// Steps grouped by patient, files already attached.
    fn load_steps(
        &self,
        files: &mut HashMap<(String, String), Vec<PatientFile>>,
    ) -> DbResult<HashMap<String, Vec<TreatmentStep>>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT patient_id, id, label, status, notes, updated_by
            FROM treatment_steps
            ORDER BY patient_id, position
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(StepRow {
                patient_id: row.get(0)?,
                id: row.get(1)?,
                label: row.get(2)?,
                status: row.get(3)?,
                notes: row.get(4)?,
                updated_by: row.get(5)?,
            })
        })?;

        let mut steps: HashMap<String, Vec<TreatmentStep>> = HashMap::new();
        for row in rows {
            let row = row?;
            let step_files = files
                .remove(&(row.patient_id.clone(), row.id.clone()))
                .unwrap_or_default();
            let step = TreatmentStep {
                status: string_to_status(&row.status)?,
                id: row.id,
                label: row.label,
                notes: row.notes,
                files: step_files,
                updated_by: row.updated_by,
            };
            steps.entry(row.patient_id).or_default().push(step);
        }
        Ok(steps)
    }

    /// Files grouped by (patient, step).
    fn load_files(&self) -> DbResult<HashMap<(String, String), Vec<PatientFile>>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT patient_id, step_id, id, url, name, kind, date
            FROM patient_files
            ORDER BY patient_id, step_id, position
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(FileRow {
                patient_id: row.get(0)?,
                step_id: row.get(1)?,
                id: row.get(2)?,
                url: row.get(3)?,
                name: row.get(4)?,
                kind: row.get(5)?,
                date: row.get(6)?,
            })
        })?;

        let mut files: HashMap<(String, String), Vec<PatientFile>> = HashMap::new();
        for row in rows {
            let row = row?;
            let file = PatientFile {
                kind: string_to_kind(&row.kind)?,
                id: row.id,
                url: row.url,
                name: row.name,
                date: row.date,
            };
            files
                .entry((row.patient_id, row.step_id))
                .or_default()
                .push(file);
        }
        Ok(files)
    }

    /// Number of stored steps across all patients.
    pub fn count_steps(&self) -> DbResult<u32> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM treatment_steps", [], |row| row.get(0))?)
    }

    /// Number of stored files across all patients.
    pub fn count_files(&self) -> DbResult<u32> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM patient_files", [], |row| row.get(0))?)
    }
}

/// Intermediate row structs for database mapping.
struct PatientRow {
    id: String,
    patient_id: String,
    name: String,
    birth_date: String,
    profile_notes: String,
    created_at: String,
    last_visit: String,
}

struct StepRow {
    patient_id: String,
    id: String,
    label: String,
    status: String,
    notes: String,
    updated_by: Option<String>,
}

struct FileRow {
    patient_id: String,
    step_id: String,
    id: String,
    url: String,
    name: String,
    kind: String,
    date: String,
}

fn status_to_string(status: &StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "pending",
        StepStatus::InProgress => "in_progress",
        StepStatus::Completed => "completed",
    }
}

fn string_to_status(s: &str) -> Result<StepStatus, DbError> {
    match s {
        "pending" => Ok(StepStatus::Pending),
        "in_progress" => Ok(StepStatus::InProgress),
        "completed" => Ok(StepStatus::Completed),
        _ => Err(DbError::Constraint(format!("Unknown step status: {}", s))),
    }
}

fn kind_to_string(kind: &FileKind) -> &'static str {
    match kind {
        FileKind::Image => "image",
        FileKind::Other => "other",
    }
}

fn string_to_kind(s: &str) -> Result<FileKind, DbError> {
    match s {
        "image" => Ok(FileKind::Image),
        "other" => Ok(FileKind::Other),
        _ => Err(DbError::Constraint(format!("Unknown file kind: {}", s))),
    }
}
