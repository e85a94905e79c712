//! Template persistence. The store assigns template identifiers; the
//! pipeline only hands over finished `GenerationResult`s.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::generation::models::{DocumentType, GenerationResult, TemplateMetadata};
use crate::models::template::TemplateRow;

/// Everything needed to persist one generated template.
#[derive(Debug, Clone)]
pub struct NewTemplate {
    pub metadata: TemplateMetadata,
    pub document_type: DocumentType,
    pub result: GenerationResult,
    pub source_document_ids: Vec<String>,
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn save(&self, template: NewTemplate) -> Result<TemplateRow, AppError>;
    async fn get(&self, id: Uuid) -> Result<Option<TemplateRow>, AppError>;
}

#[derive(Clone)]
pub struct PgTemplateStore {
    pool: PgPool,
}

impl PgTemplateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn save(&self, template: NewTemplate) -> Result<TemplateRow, AppError> {
        let id = Uuid::new_v4();
        let questions = serde_json::to_value(&template.result.questions).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Failed to serialize questions: {e}"))
        })?;

        let row = sqlx::query_as::<_, TemplateRow>(
            r#"
            INSERT INTO assessment_templates
                (id, name, description, purpose, department, document_type,
                 questions, generation_method, source_document_ids)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&template.metadata.name)
        .bind(&template.metadata.description)
        .bind(&template.metadata.purpose)
        .bind(&template.metadata.department)
        .bind(template.document_type.label())
        .bind(&questions)
        .bind(template.result.generation_method.label())
        .bind(&template.source_document_ids)
        .fetch_one(&self.pool)
        .await?;

        info!(
            "Saved template {} with {} questions ({})",
            row.id,
            template.result.questions.len(),
            row.generation_method
        );
        Ok(row)
    }

    async fn get(&self, id: Uuid) -> Result<Option<TemplateRow>, AppError> {
        Ok(
            sqlx::query_as::<_, TemplateRow>("SELECT * FROM assessment_templates WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }
}
