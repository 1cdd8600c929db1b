//! quiz-service: free-form text in, multiple-choice quiz out.
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
