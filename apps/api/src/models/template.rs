use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted assessment template. `questions` holds the serialized
/// question list of the `GenerationResult` it was created from.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TemplateRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub purpose: Option<String>,
    pub department: Option<String>,
    pub document_type: String,
    pub questions: Value,
    pub generation_method: String,
    pub source_document_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}
