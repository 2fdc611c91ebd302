//! Gemini `generateContent` client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::AdvisorConfig;
use crate::prompts::build_advice_prompt;
use crate::request::{AdvisoryRequest, InlineImage};

/// Advisor errors.
#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model returned no text")]
    EmptyResponse,
}

pub type AdvisorResult<T> = Result<T, AdvisorError>;

impl AdvisorError {
    /// Operator-facing text for display in place of advice.
    pub fn troubleshooting(&self) -> String {
        let hint = match self {
            AdvisorError::Configuration(_) => {
                "Check that API_KEY is set for this deployment, holds the real key \
                 (starting with 'AIza'), and is not defined twice. Redeploy after changing it."
            }
            AdvisorError::Auth(_) => {
                "The key was rejected. Copy the key again from the provider console \
                 and confirm the Generative Language API is enabled for it."
            }
            AdvisorError::Network(_) => "Check the network connection and try again.",
            AdvisorError::Api { .. } => {
                "The model endpoint refused the request. Check the model name and quota."
            }
            AdvisorError::InvalidResponse(_) | AdvisorError::EmptyResponse => {
                "The model did not return usable advice. Try again, or shorten the notes."
            }
        };
        format!("[AI advisor unavailable]\n{}\n\n{}", self, hint)
    }
}

/// Something that can produce advice for a treatment step.
pub trait Advisor {
    fn advise(&self, request: &AdvisoryRequest) -> AdvisorResult<String>;
}

/// Blocking HTTP client for the Gemini REST API.
pub struct GeminiClient {
    config: AdvisorConfig,
    http: reqwest::blocking::Client,
}

impl GeminiClient {
    /// Build a client. The API key is validated per request, not here, so a
    /// misconfigured client still reports its problem through `advise`.
    pub fn new(config: AdvisorConfig) -> AdvisorResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }
}

impl Advisor for GeminiClient {
    fn advise(&self, request: &AdvisoryRequest) -> AdvisorResult<String> {
        let key = self.config.validated_key()?;
        let images = request.inline_images(self.config.max_images);
        let body = GenerateRequest::new(&images, build_advice_prompt(request));

        debug!(
            model = %self.config.model,
            images = images.len(),
            step = %request.step_label,
            "requesting step advice"
        );

        let response = self
            .http
            .post(self.config.generate_url())
            .header("x-goog-api-key", key)
            .json(&body)
            .send()?;

        let status = response.status().as_u16();
        let text = response.text()?;

        if !(200..300).contains(&status) {
            let err = classify_failure(status, &text);
            warn!(status, error = %err, "advice request failed");
            return Err(err);
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| AdvisorError::InvalidResponse(e.to_string()))?;

        parsed.text().ok_or(AdvisorError::EmptyResponse)
    }
}

/// Map a non-2xx response to an error variant.
fn classify_failure(status: u16, body: &str) -> AdvisorError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    // Gemini answers an invalid key with 400 rather than 401.
    let bad_key = status == 400 && message.contains("API key");
    if status == 401 || status == 403 || bad_key {
        AdvisorError::Auth(message)
    } else {
        AdvisorError::Api { status, message }
    }
}

// =========================================================================
// Wire types
// =========================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

impl GenerateRequest {
    fn new(images: &[InlineImage], prompt: String) -> Self {
        let mut parts: Vec<Part> = images
            .iter()
            .map(|img| Part::InlineData {
                inline_data: Blob {
                    mime_type: img.mime_type.clone(),
                    data: img.data.clone(),
                },
            })
            .collect();
        parts.push(Part::Text { text: prompt });

        Self {
            contents: vec![Content { parts }],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                Part::InlineData { .. } => None,
            })
            .collect();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
