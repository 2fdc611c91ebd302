//! Database layer for perio-track.

mod schema;
mod outbox;
mod patients;
mod users;

pub use schema::*;
pub use outbox::*;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

use crate::models::{PatientRecord, User};

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Persistence for the patient list.
///
/// The whole list is written on every save; there is no incremental update.
pub trait PatientStore {
    fn load(&self) -> DbResult<Vec<PatientRecord>>;
    fn save_all(&mut self, patients: &[PatientRecord]) -> DbResult<()>;
}

/// Persistence for staff accounts.
pub trait UserStore {
    fn find_user(&self, name: &str) -> DbResult<Option<User>>;
    /// Insert a user; fails with `Constraint` when the name is taken.
    fn insert_user(&self, user: &User) -> DbResult<()>;
}

/// Persistence for undelivered sheet summaries.
pub trait OutboxStore {
    /// Queue a summary, replacing any entry already queued for the patient.
    fn enqueue(&self, patient_id: &str, payload: &str, error: &str) -> DbResult<i64>;
    fn pending(&self) -> DbResult<Vec<OutboxEntry>>;
    fn mark_delivered(&self, entry_id: i64) -> DbResult<bool>;
    fn record_failure(&self, entry_id: i64, error: &str) -> DbResult<bool>;
}

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}
