//! Advisory request context and image selection.

use serde::{Deserialize, Serialize};

/// MIME type assumed when a data URL does not declare one.
pub const FALLBACK_MIME: &str = "image/jpeg";

/// Everything the model is told about one treatment step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AdvisoryRequest {
    /// Patient display name
    pub patient_name: String,
    /// Free-text profile notes for the patient
    pub profile_notes: String,
    /// Label of the active step
    pub step_label: String,
    /// Clinician notes for the active step
    pub step_notes: String,
    /// Candidate attachments, in plan order
    pub attachments: Vec<Attachment>,
}

/// An attachment offered to the advisor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    /// Data URL (`data:image/jpeg;base64,...`)
    pub url: String,
    /// Whether the attachment is an image
    pub is_image: bool,
}

/// An image ready to be inlined into a request.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload without the data-URL header
    pub data: String,
}

impl AdvisoryRequest {
    /// Pick the images to forward: images only, first `max` in order, and
    /// only those carrying an inline payload.
    pub fn inline_images(&self, max: usize) -> Vec<InlineImage> {
        self.attachments
            .iter()
            .filter(|a| a.is_image)
            .take(max)
            .filter_map(|a| parse_data_url(&a.url))
            .collect()
    }
}

/// Split a data URL into MIME type and payload.
pub fn parse_data_url(url: &str) -> Option<InlineImage> {
    let (header, data) = url.split_once(',')?;
    let mime_type = header
        .strip_prefix("data:")
        .and_then(|h| h.split(';').next())
        .filter(|m| !m.is_empty())
        .unwrap_or(FALLBACK_MIME);

    Some(InlineImage {
        mime_type: mime_type.to_string(),
        data: data.to_string(),
    })
}
