//! Domain models for the perio-track system.

mod patient;
mod plan;
mod user;

pub use patient::*;
pub use plan::*;
pub use user::*;
