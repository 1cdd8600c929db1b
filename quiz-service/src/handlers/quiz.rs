use crate::error::QuizError;
use crate::models::{QuizRequest, QuizResponse};
use crate::startup::AppState;
use axum::{extract::State, Extension, Json};
use service_core::middleware::RequestId;

/// `POST /generate`: turn the submitted text into a quiz.
///
/// Every failure is logged with its cause and answered with the same opaque 500.
pub async fn generate_quiz(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    Json(request): Json<QuizRequest>,
) -> Result<Json<QuizResponse>, QuizError> {
    let request_id = request_id
        .map(|Extension(id)| id.0)
        .unwrap_or_default();

    tracing::info!(
        request_id = %request_id,
        prompt_len = request.prompt.len(),
        hide_answers = request.hide_answers,
        "Quiz generation requested"
    );

    match state.generator.generate(&request.prompt).await {
        Ok(questions) => {
            tracing::info!(
                request_id = %request_id,
                questions = questions.as_array().map_or(0, Vec::len),
                "Quiz generated"
            );
            Ok(Json(QuizResponse::new(questions, request.hide_answers)))
        }
        Err(e) => {
            tracing::error!(
                request_id = %request_id,
                stage = e.stage(),
                error = %e,
                "Question generation failed"
            );
            Err(e)
        }
    }
}
