//! Axum route handlers for the Template API.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::models::{
    DocumentRef, DocumentType, Question, QuotaMap, RawQuotaMap, TemplateMetadata,
};
use crate::generation::store::NewTemplate;
use crate::models::template::TemplateRow;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateTemplateRequest {
    #[serde(default)]
    pub document_refs: Vec<DocumentRef>,
    pub document_type: DocumentType,
    pub metadata: TemplateMetadata,
    pub quotas: RawQuotaMap,
}

#[derive(Debug, Deserialize)]
pub struct FallbackTemplateRequest {
    pub document_type: DocumentType,
    pub metadata: TemplateMetadata,
    pub quotas: RawQuotaMap,
}

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub template_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub purpose: Option<String>,
    pub department: Option<String>,
    pub document_type: String,
    pub generation_method: String,
    pub questions: Vec<Question>,
    pub source_document_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for TemplateResponse {
    type Error = AppError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        let questions: Vec<Question> = serde_json::from_value(row.questions).map_err(|e| {
            AppError::Internal(anyhow::anyhow!(
                "Stored questions for template {} are unreadable: {e}",
                row.id
            ))
        })?;

        Ok(Self {
            template_id: row.id,
            name: row.name,
            description: row.description,
            purpose: row.purpose,
            department: row.department,
            document_type: row.document_type,
            generation_method: row.generation_method,
            questions,
            source_document_ids: row.source_document_ids,
            created_at: row.created_at,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/templates/generate
///
/// Runs the full generation pipeline against the referenced documents and
/// persists the result. Quota violations are rejected before any service call.
pub async fn handle_generate_template(
    State(state): State<AppState>,
    Json(request): Json<GenerateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), AppError> {
    let quotas = QuotaMap::try_from(request.quotas)?;
    validate_metadata(&request.metadata)?;

    let result = state
        .generator
        .generate(
            &request.document_refs,
            &request.document_type,
            &request.metadata,
            &quotas,
        )
        .await;

    let row = state
        .store
        .save(NewTemplate {
            metadata: request.metadata,
            document_type: request.document_type,
            result,
            source_document_ids: request.document_refs.into_iter().map(|d| d.id).collect(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TemplateResponse::try_from(row)?)))
}

/// POST /api/v1/templates/fallback
///
/// Builds a template from the deterministic question library only.
pub async fn handle_fallback_template(
    State(state): State<AppState>,
    Json(request): Json<FallbackTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), AppError> {
    let quotas = QuotaMap::try_from(request.quotas)?;
    validate_metadata(&request.metadata)?;

    let result = state
        .generator
        .fallback_generate(&request.document_type, &quotas);

    let row = state
        .store
        .save(NewTemplate {
            metadata: request.metadata,
            document_type: request.document_type,
            result,
            source_document_ids: Vec::new(),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(TemplateResponse::try_from(row)?)))
}

/// GET /api/v1/templates/:id
pub async fn handle_get_template(
    State(state): State<AppState>,
    Path(template_id): Path<Uuid>,
) -> Result<Json<TemplateResponse>, AppError> {
    let row = state
        .store
        .get(template_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Template {template_id} not found")))?;

    Ok(Json(TemplateResponse::try_from(row)?))
}

fn validate_metadata(metadata: &TemplateMetadata) -> Result<(), AppError> {
    if metadata.name.trim().is_empty() {
        return Err(AppError::Validation(
            "metadata.name cannot be empty".to_string(),
        ));
    }
    Ok(())
}
