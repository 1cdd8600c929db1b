//! Text extraction for uploaded documents.

use std::path::Path;
use thiserror::Error;

/// Documents with fewer characters than this, ignoring surrounding
/// whitespace, are rejected.
pub const MIN_DOCUMENT_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported file type: '{0}'. Allowed types: .pdf, .txt")]
    UnsupportedType(String),

    #[error("Could not read text from PDF: {0}")]
    Pdf(String),

    #[error(
        "Document content is too short ({chars} characters, at least {} required). \
         Please provide a document with more content.",
        MIN_DOCUMENT_CHARS
    )]
    TooShort { chars: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Text,
    Pdf,
}

impl DocumentKind {
    /// Decide by file extension, case-insensitively.
    pub fn from_file_name(file_name: &str) -> Result<Self, DocumentError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "txt" => Ok(DocumentKind::Text),
            "pdf" => Ok(DocumentKind::Pdf),
            other => Err(DocumentError::UnsupportedType(format!(".{}", other))),
        }
    }
}

/// Pull plain text out of an uploaded file and reject near-empty documents.
pub async fn extract_text(kind: DocumentKind, data: Vec<u8>) -> Result<String, DocumentError> {
    let text = match kind {
        DocumentKind::Text => String::from_utf8_lossy(&data).into_owned(),
        // PDF parsing is CPU bound and may panic on hostile input.
        DocumentKind::Pdf => {
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data))
                .await
                .map_err(|e| DocumentError::Pdf(format!("extraction aborted: {}", e)))?
                .map_err(|e| DocumentError::Pdf(e.to_string()))?
        }
    };

    let chars = text.trim().chars().count();
    if chars < MIN_DOCUMENT_CHARS {
        return Err(DocumentError::TooShort { chars });
    }

    Ok(text)
}

/// At most `max_chars` characters of `text`, cut on a character boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
