use std::sync::Arc;

use crate::generation::orchestrator::TemplateGenerator;
use crate::generation::store::TemplateStore;
use crate::llm_client::TextGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<TemplateGenerator>,
    /// Generation service, also used directly for document uploads.
    pub service: Arc<dyn TextGenerator>,
    /// Template persistence. PostgreSQL in production.
    pub store: Arc<dyn TemplateStore>,
}
