//! SQLite schema definition.

/// Complete database schema for perio-track.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL,                    -- clinic-assigned, not unique
    name TEXT NOT NULL,
    birth_date TEXT NOT NULL DEFAULT '',
    profile_notes TEXT NOT NULL DEFAULT '',
    position INTEGER NOT NULL,                   -- list order, newest first
    created_at TEXT NOT NULL,
    last_visit TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_patients_patient_id ON patients(patient_id);
CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);

-- ============================================================================
-- Treatment Plans
-- ============================================================================

CREATE TABLE IF NOT EXISTS treatment_steps (
    patient_id TEXT NOT NULL REFERENCES patients(id) ON DELETE CASCADE,
    id TEXT NOT NULL,
    position INTEGER NOT NULL,
    label TEXT NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('pending', 'in_progress', 'completed')),
    notes TEXT NOT NULL DEFAULT '',
    updated_by TEXT,
    PRIMARY KEY (patient_id, id)
);

CREATE TABLE IF NOT EXISTS patient_files (
    patient_id TEXT NOT NULL,
    step_id TEXT NOT NULL,
    id TEXT NOT NULL,
    position INTEGER NOT NULL,
    url TEXT NOT NULL,                           -- data URL
    name TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('image', 'other')),
    date TEXT NOT NULL,
    PRIMARY KEY (patient_id, step_id, id),
    FOREIGN KEY (patient_id, step_id)
        REFERENCES treatment_steps(patient_id, id) ON DELETE CASCADE
);

-- ============================================================================
-- Staff Accounts
-- ============================================================================

CREATE TABLE IF NOT EXISTS users (
    name TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,                 -- argon2 PHC string
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Sheet Sync Outbox
-- ============================================================================

-- No foreign key: patients are rewritten wholesale on every save.
CREATE TABLE IF NOT EXISTS sync_outbox (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id TEXT NOT NULL,
    payload TEXT NOT NULL,                       -- JSON SheetSummary
    attempts INTEGER NOT NULL DEFAULT 1,
    last_error TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
