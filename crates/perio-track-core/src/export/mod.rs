//! JSON backup and restore of the patient list.
//!
//! Imports accept either a backup written by [`PatientBackup::to_json`] or
//! the bare patient array the browser version kept in local storage.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::models::PatientRecord;

/// Full patient-list backup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PatientBackup {
    /// Export timestamp
    pub exported_at: String,
    pub patients: Vec<PatientRecord>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BackupInput {
    Envelope(PatientBackup),
    Bare(Vec<PatientRecord>),
}

/// Outcome of merging imported records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub added: usize,
    pub replaced: usize,
}

impl PatientBackup {
    pub fn new(patients: &[PatientRecord]) -> Self {
        Self {
            exported_at: chrono::Utc::now().to_rfc3339(),
            patients: patients.to_vec(),
        }
    }

    /// Export to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a backup or a bare patient array.
    pub fn from_json(json: &str) -> Result<Vec<PatientRecord>, serde_json::Error> {
        Ok(match serde_json::from_str::<BackupInput>(json)? {
            BackupInput::Envelope(backup) => backup.patients,
            BackupInput::Bare(patients) => patients,
        })
    }
}

/// Merge `imported` into `existing` by record ID. Replaced records keep
/// their position; new records go to the front, in import order. When the
/// import repeats an ID, the later record wins and is counted once.
pub fn merge_patients(existing: &mut Vec<PatientRecord>, imported: Vec<PatientRecord>) -> ImportReport {
    let mut report = ImportReport::default();
    let mut seen = HashSet::new();
    let mut added: Vec<PatientRecord> = Vec::new();

    for patient in imported {
        let first_time = seen.insert(patient.id.clone());

        if let Some(slot) = added.iter_mut().find(|p| p.id == patient.id) {
            *slot = patient;
            continue;
        }
        match existing.iter_mut().find(|p| p.id == patient.id) {
            Some(slot) => {
                *slot = patient;
                if first_time {
                    report.replaced += 1;
                }
            }
            None => {
                added.push(patient);
                report.added += 1;
            }
        }
    }

    added.append(existing);
    *existing = added;
    report
}
