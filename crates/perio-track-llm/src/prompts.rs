//! Prompts for step analysis.
//!
//! The clinic works in Japanese, so the model is asked to answer in Japanese
//! and empty fields are rendered with the wording staff expect to see.

use crate::request::AdvisoryRequest;

/// Shown when the patient has no profile notes.
pub const NO_PROFILE_NOTES: &str = "特になし";

/// Shown when the step has no notes.
pub const NO_STEP_NOTES: &str = "なし";

/// Role instruction placed ahead of the case details.
pub const ADVISOR_PREAMBLE: &str = "歯科臨床アドバイザーとして以下の処置内容を分析し、日本語でアドバイスしてください。";

/// Build the text part of an advisory request.
pub fn build_advice_prompt(request: &AdvisoryRequest) -> String {
    let profile_notes = non_empty_or(&request.profile_notes, NO_PROFILE_NOTES);
    let step_notes = non_empty_or(&request.step_notes, NO_STEP_NOTES);

    format!(
        "{}\n患者: {} 様 / 特記事項: {}\n工程: {}\n実施メモ: {}",
        ADVISOR_PREAMBLE, request.patient_name, profile_notes, request.step_label, step_notes
    )
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}
