use crate::services::document::DocumentError;
use crate::services::extract::ExtractError;
use crate::services::providers::ProviderError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use service_core::error::AppError;
use thiserror::Error;

/// The only failure message callers ever see.
pub const GENERATION_FAILED_DETAIL: &str = "Question generation failed.";

/// Everything that can go wrong between receiving text and returning a quiz.
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("model generation failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("could not extract quiz JSON: {0}")]
    Extract(#[from] ExtractError),

    #[error("quiz JSON has the wrong shape: {0}")]
    Shape(serde_json::Error),

    #[error("quiz failed validation: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl QuizError {
    /// Stage label for logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            QuizError::Provider(_) => "generation",
            QuizError::Extract(_) => "extraction",
            QuizError::Shape(_) => "shape",
            QuizError::Invalid(_) => "validation",
        }
    }
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        // Callers cannot tell stages apart; the cause is only logged.
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": GENERATION_FAILED_DETAIL })),
        )
            .into_response()
    }
}

/// Failure of `POST /api/generate-quiz`: either the upload itself is unusable,
/// or generation failed after the document was read.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error(transparent)]
    Rejected(#[from] AppError),

    #[error(transparent)]
    Generation(#[from] QuizError),
}

impl From<DocumentError> for UploadError {
    fn from(err: DocumentError) -> Self {
        UploadError::Rejected(AppError::BadRequest(anyhow::Error::new(err)))
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        match self {
            UploadError::Rejected(err) => err.into_response(),
            UploadError::Generation(err) => err.into_response(),
        }
    }
}
