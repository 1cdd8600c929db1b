pub mod document;
pub mod extract;
pub mod metrics;
pub mod prompt;
pub mod providers;
pub mod quiz_generator;

pub use metrics::{get_metrics, init_metrics};
pub use quiz_generator::QuizGenerator;
