//! Spreadsheet sync.
//!
//! Protocol:
//! 1. Build a `SheetSummary` for one patient
//! 2. POST it as JSON to the configured webhook
//! 3. 2xx means acknowledged, 3xx means accepted but unconfirmed
//! 4. Anything else is queued in the outbox for a manual retry

mod summary;
mod webhook;

pub use summary::*;
pub use webhook::*;

use thiserror::Error;

/// Sync errors.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("No webhook URL configured")]
    NotConfigured,

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Webhook rejected the summary with HTTP {status}")]
    Rejected { status: u16 },
}

pub type SyncResult<T> = Result<T, SyncError>;

/// What is known about a delivered summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The request went out and the endpoint answered without confirming
    Sent { status: u16 },
    /// The endpoint confirmed receipt
    Acknowledged { status: u16 },
}

impl Delivery {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Delivery::Acknowledged { .. })
    }
}

/// Destination for sheet summaries.
pub trait SummarySink {
    /// Deliver one JSON-encoded summary.
    fn deliver(&self, payload: &str) -> SyncResult<Delivery>;
}
