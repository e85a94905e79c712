//! Axum route handlers for the Document API.

use axum::{
    extract::{Multipart, State},
    Json,
};

use crate::documents::{parse_tags, upload_all, PendingDocument, UploadOutcome};
use crate::errors::AppError;
use crate::state::AppState;

/// POST /api/v1/documents
///
/// Multipart body: one or more `files` parts and an optional comma-separated
/// `tags` part. Returns the service references of every uploaded file and
/// the names of the files that failed.
pub async fn handle_upload_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadOutcome>, AppError> {
    let mut files: Vec<PendingDocument> = Vec::new();
    let mut tags: Vec<String> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" | "file" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("document-{}", files.len() + 1));
                let content = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read '{file_name}': {e}")))?;
                if content.is_empty() {
                    return Err(AppError::Validation(format!("File '{file_name}' is empty")));
                }
                files.push(PendingDocument { file_name, content });
            }
            "tags" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid tags field: {e}")))?;
                tags.extend(parse_tags(&raw));
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(AppError::Validation(
            "At least one file is required".to_string(),
        ));
    }

    let outcome = upload_all(state.service.clone(), files, tags).await;
    if outcome.documents.is_empty() {
        return Err(AppError::Llm(format!(
            "No document could be uploaded ({} failed)",
            outcome.failed.len()
        )));
    }

    Ok(Json(outcome))
}
