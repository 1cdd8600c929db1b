//! HTTP handlers for the quiz service.

pub mod health;
pub mod metrics;
pub mod quiz;
pub mod upload;

pub use health::{health_check, index, not_found, readiness_check};
pub use metrics::metrics_endpoint;
pub use quiz::generate_quiz;
pub use upload::generate_quiz_from_document;
