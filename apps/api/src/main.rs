mod config;
mod db;
mod documents;
mod errors;
mod generation;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::generation::orchestrator::TemplateGenerator;
use crate::generation::store::PgTemplateStore;
use crate::llm_client::cache::ResponseCache;
use crate::llm_client::{GenerationClient, TextGenerator};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Assessment API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize generation service client, with the response cache when Redis is configured
    let mut client = GenerationClient::new(config.client_settings())?;
    if let Some(redis_url) = &config.redis_url {
        let redis = redis::Client::open(redis_url.as_str())?;
        client = client.with_cache(ResponseCache::new(redis, config.cache_ttl_secs));
        info!("Response cache enabled (ttl {}s)", config.cache_ttl_secs);
    }
    info!(
        "Generation client initialized (model: {})",
        client.model().unwrap_or("service default")
    );
    let service: Arc<dyn TextGenerator> = Arc::new(client);

    // Build app state
    let state = AppState {
        generator: Arc::new(TemplateGenerator::new(
            service.clone(),
            config.pipeline_settings(),
        )),
        service,
        store: Arc::new(PgTemplateStore::new(db)),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
