//! Advisor configuration and API key validation.

use serde::{Deserialize, Serialize};

use crate::client::{AdvisorError, AdvisorResult};

/// Default Gemini REST endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default model used for step analysis.
pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";

/// Images forwarded per request.
pub const DEFAULT_MAX_IMAGES: usize = 3;

/// Real Gemini keys are well above this length.
const MIN_KEY_LEN: usize = 25;

/// Settings for the advisory client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdvisorConfig {
    /// API key as provided by the environment or config file (may be dirty)
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Base endpoint, without trailing path
    pub endpoint: String,
    /// Maximum number of images inlined into a request
    pub max_images: usize,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            max_images: DEFAULT_MAX_IMAGES,
            timeout_secs: 60,
        }
    }
}

impl AdvisorConfig {
    /// Create a config with the given key and defaults for everything else.
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    /// Return the cleaned API key, or a configuration error describing what
    /// is wrong with it.
    pub fn validated_key(&self) -> AdvisorResult<String> {
        let key = self.api_key.as_deref().map(clean_key).unwrap_or_default();

        if key.contains("PLACEHOLDER") {
            return Err(AdvisorError::Configuration(format!(
                "API key is a placeholder value (\"{}\"), not a real key",
                key
            )));
        }

        if key.len() < MIN_KEY_LEN {
            let hint = if key.is_empty() {
                "none".to_string()
            } else {
                mask_key(&key)
            };
            return Err(AdvisorError::Configuration(format!(
                "API key could not be loaded correctly (value: {}, length: {})",
                hint,
                key.len()
            )));
        }

        Ok(key)
    }

    /// Full URL of the `generateContent` call for the configured model.
    pub fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

/// Strip surrounding whitespace and any quote characters.
fn clean_key(raw: &str) -> String {
    raw.trim().chars().filter(|c| *c != '"' && *c != '\'').collect()
}

/// First and last four characters only.
fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}
