//! Blocking webhook client for the clinic spreadsheet.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Delivery, SummarySink, SyncError, SyncResult};

/// Webhook settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SheetConfig {
    /// Endpoint receiving summaries; sync is disabled without one
    pub webhook_url: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: 30,
        }
    }
}

/// Posts summaries to a spreadsheet webhook.
pub struct SheetWebhook {
    url: Option<String>,
    http: reqwest::blocking::Client,
}

impl SheetWebhook {
    /// Build a client. Redirects are not followed: script-hosted sheets
    /// answer with a redirect once the row has been accepted.
    pub fn new(config: &SheetConfig) -> SyncResult<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(Policy::none())
            .build()?;

        let url = config
            .webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Ok(Self { url, http })
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some()
    }
}

impl SummarySink for SheetWebhook {
    fn deliver(&self, payload: &str) -> SyncResult<Delivery> {
        let url = self.url.as_deref().ok_or(SyncError::NotConfigured)?;

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .map_err(|e| {
                warn!(error = %e, "sheet webhook unreachable");
                SyncError::Transport(e)
            })?;

        let status = response.status();
        let code = status.as_u16();
        debug!(status = code, "sheet webhook answered");

        if status.is_success() {
            Ok(Delivery::Acknowledged { status: code })
        } else if status.is_redirection() {
            Ok(Delivery::Sent { status: code })
        } else {
            warn!(status = code, "sheet webhook rejected summary");
            Err(SyncError::Rejected { status: code })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_url_means_not_configured() {
        let webhook = SheetWebhook::new(&SheetConfig {
            webhook_url: Some("   ".into()),
            ..SheetConfig::default()
        })
        .unwrap();

        assert!(!webhook.is_configured());
        assert!(matches!(webhook.deliver("{}"), Err(SyncError::NotConfigured)));
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let webhook = SheetWebhook::new(&SheetConfig {
            webhook_url: Some("http://127.0.0.1:1/hook".into()),
            timeout_secs: 2,
        })
        .unwrap();

        assert!(matches!(webhook.deliver("{}"), Err(SyncError::Transport(_))));
    }
}
