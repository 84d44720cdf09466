//! HTTP handlers for the health assistant.

pub mod assistant;
pub mod health;
pub mod metrics;

pub use assistant::{ai_assistant, assist};
pub use health::{health_check, readiness_check};
