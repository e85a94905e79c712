pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::documents::handlers as documents;
use crate::generation::handlers as templates;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Document API
        .route("/api/v1/documents", post(documents::handle_upload_documents))
        // Template API
        .route(
            "/api/v1/templates/generate",
            post(templates::handle_generate_template),
        )
        .route(
            "/api/v1/templates/fallback",
            post(templates::handle_fallback_template),
        )
        .route("/api/v1/templates/:id", get(templates::handle_get_template))
        .with_state(state)
}
