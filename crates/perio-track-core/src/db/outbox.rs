//! Outbox for sheet summaries that could not be delivered.

use rusqlite::params;

use super::{Database, DbResult, OutboxStore};

/// A queued summary awaiting redelivery.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub id: i64,
    pub patient_id: String,
    /// JSON-encoded summary, sent as-is on retry
    pub payload: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at: String,
}

impl OutboxStore for Database {
    /// Queue a summary. An entry already queued for the patient is
    /// replaced, carrying its attempt count forward.
    fn enqueue(&self, patient_id: &str, payload: &str, error: &str) -> DbResult<i64> {
        let tx = self.conn.unchecked_transaction()?;

        let previous_attempts: u32 = tx.query_row(
            "SELECT COALESCE(MAX(attempts), 0) FROM sync_outbox WHERE patient_id = ?",
            [patient_id],
            |row| row.get(0),
        )?;
        tx.execute("DELETE FROM sync_outbox WHERE patient_id = ?", [patient_id])?;
        tx.execute(
            "INSERT INTO sync_outbox (patient_id, payload, attempts, last_error) VALUES (?1, ?2, ?3, ?4)",
            params![patient_id, payload, previous_attempts + 1, error],
        )?;
        let id = tx.last_insert_rowid();

        tx.commit()?;
        Ok(id)
    }

    /// Pending entries, oldest first.
    fn pending(&self) -> DbResult<Vec<OutboxEntry>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, patient_id, payload, attempts, last_error, created_at
            FROM sync_outbox
            ORDER BY id
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(OutboxEntry {
                id: row.get(0)?,
                patient_id: row.get(1)?,
                payload: row.get(2)?,
                attempts: row.get(3)?,
                last_error: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn mark_delivered(&self, entry_id: i64) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM sync_outbox WHERE id = ?", [entry_id])?;
        Ok(rows_affected > 0)
    }

    fn record_failure(&self, entry_id: i64, error: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            r#"
            UPDATE sync_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                updated_at = datetime('now')
            WHERE id = ?1
            "#,
            params![entry_id, error],
        )?;
        Ok(rows_affected > 0)
    }
}
