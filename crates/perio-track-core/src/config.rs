//! Clinic configuration.
//!
//! Loaded from a TOML file, then overridden by environment variables:
//!
//! | Variable                     | Field                  |
//! |------------------------------|------------------------|
//! | `PERIO_TRACK_DB`             | `database_path`        |
//! | `API_KEY` / `GEMINI_API_KEY` | `advisor.api_key`      |
//! | `GEMINI_MODEL`               | `advisor.model`        |
//! | `SHEET_WEBHOOK_URL`          | `sheet.webhook_url`    |
//!
//! ```toml
//! database_path = "clinic.db"
//!
//! [advisor]
//! model = "gemini-3-flash-preview"
//! max_images = 3
//!
//! [sheet]
//! webhook_url = "https://script.google.com/macros/s/.../exec"
//! ```

use std::path::{Path, PathBuf};

use perio_track_llm::AdvisorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sync::SheetConfig;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClinicConfig {
    /// SQLite database file
    pub database_path: PathBuf,
    pub advisor: AdvisorConfig,
    pub sheet: SheetConfig,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("perio-track.db"),
            advisor: AdvisorConfig::default(),
            sheet: SheetConfig::default(),
        }
    }
}

impl ClinicConfig {
    /// Parse a TOML document. Missing sections take their defaults.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Read and parse a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&source)
    }

    /// Apply overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = lookup("PERIO_TRACK_DB") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(key) = lookup("API_KEY").or_else(|| lookup("GEMINI_API_KEY")) {
            self.advisor.api_key = Some(key);
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.advisor.model = model;
        }
        if let Some(url) = lookup("SHEET_WEBHOOK_URL") {
            self.sheet.webhook_url = Some(url);
        }
        self
    }
}
