//! Staff account models.

use serde::{Deserialize, Serialize};

/// A registered staff account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Display name, unique across accounts
    pub name: String,
    /// Argon2 PHC string
    pub password_hash: String,
    /// Sign-up timestamp
    pub created_at: String,
}

/// The logged-in staff member. Lives in memory only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StaffSession {
    pub name: String,
    pub logged_in_at: String,
}

impl StaffSession {
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logged_in_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
