//! Generative-AI advisory client for periodontal treatment steps.
//!
//! This crate turns a patient's active treatment step (label, notes and up to
//! three attached photos) into a prompt for a Gemini model and returns the
//! model's free-text advice. It never touches the treatment plan itself; what
//! happens to the advice is up to the caller.

pub mod client;
pub mod config;
pub mod prompts;
pub mod request;

pub use client::*;
pub use config::*;
pub use prompts::*;
pub use request::*;
