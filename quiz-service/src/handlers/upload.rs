use crate::error::UploadError;
use crate::models::strip_answers;
use crate::services::document::{self, DocumentKind};
use crate::startup::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use service_core::error::AppError;
use service_core::middleware::RequestId;

const DOCUMENT_FIELD: &str = "document";
const HIDE_ANSWERS_FIELD: &str = "hide_answers";

struct Upload {
    file_name: String,
    data: Vec<u8>,
    hide_answers: bool,
}

/// `POST /api/generate-quiz`: multipart form with a `document` file (PDF or
/// TXT) and an optional `hide_answers` field.
///
/// Unusable uploads are answered with 400 and the reason; generation
/// failures get the same opaque 500 as `/generate`.
pub async fn generate_quiz_from_document(
    State(state): State<AppState>,
    request_id: Option<Extension<RequestId>>,
    mut multipart: Multipart,
) -> Result<Json<Value>, UploadError> {
    let request_id = request_id
        .map(|Extension(id)| id.0)
        .unwrap_or_default();

    let upload = read_upload(&mut multipart).await.map_err(|e| {
        tracing::warn!(request_id = %request_id, error = %e, "Upload rejected");
        e
    })?;
    let document_size = upload.data.len();

    let kind = DocumentKind::from_file_name(&upload.file_name)?;
    let text = document::extract_text(kind, upload.data).await.map_err(|e| {
        tracing::warn!(
            request_id = %request_id,
            file_name = %upload.file_name,
            error = %e,
            "Document rejected"
        );
        e
    })?;
    let excerpt = document::truncate_chars(&text, state.config.documents.max_chars);

    tracing::info!(
        request_id = %request_id,
        file_name = %upload.file_name,
        document_size,
        extracted_chars = text.chars().count(),
        used_chars = excerpt.chars().count(),
        "Quiz generation from document requested"
    );

    let questions = state.generator.generate(excerpt).await.map_err(|e| {
        tracing::error!(
            request_id = %request_id,
            stage = e.stage(),
            error = %e,
            "Question generation failed"
        );
        e
    })?;

    let questions_generated = questions.as_array().map_or(0, Vec::len);
    let quiz = if upload.hide_answers {
        strip_answers(questions)
    } else {
        questions
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "quiz": quiz,
            "document_title": upload.file_name,
            "metadata": {
                "questions_generated": questions_generated,
                "document_size": document_size,
                "processed_at": Utc::now().to_rfc3339(),
            }
        }
    })))
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, AppError> {
    let mut document = None;
    let mut hide_answers = false;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            DOCUMENT_FIELD => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                document = Some((file_name, data.to_vec()));
            }
            HIDE_ANSWERS_FIELD => {
                let value = field.text().await.map_err(multipart_error)?;
                hide_answers = matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "true" | "1" | "on"
                );
            }
            _ => {}
        }
    }

    let (file_name, data) = document.ok_or_else(|| {
        AppError::BadRequest(anyhow::anyhow!(
            "No document file provided. Please upload a PDF or TXT file."
        ))
    })?;

    Ok(Upload {
        file_name,
        data,
        hide_answers,
    })
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge
    } else {
        AppError::BadRequest(anyhow::anyhow!(
            "Failed to read multipart body: {}",
            err.body_text()
        ))
    }
}
