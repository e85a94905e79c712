//! Redis-backed cache of generation-service completions.
//!
//! Keys are derived from everything that shapes the completion: instructions,
//! attached document IDs and model. Cache failures never fail a request.

use redis::AsyncCommands;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::llm_client::GenerationRequest;

const KEY_PREFIX: &str = "assessment:completion:";

#[derive(Clone)]
pub struct ResponseCache {
    client: redis::Client,
    ttl_secs: u64,
}

impl ResponseCache {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self { client, ttl_secs }
    }

    pub fn key(request: &GenerationRequest, model: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.instructions.as_bytes());
        for id in &request.document_ids {
            hasher.update([0u8]);
            hasher.update(id.as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(model.unwrap_or_default().as_bytes());
        format!("{KEY_PREFIX}{}", hex::encode(hasher.finalize()))
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Response cache unavailable: {e}");
                return None;
            }
        };

        let cached: Option<String> = match conn.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Response cache read failed: {e}");
                return None;
            }
        };

        let value = cached.and_then(|raw| serde_json::from_str(&raw).ok());
        debug!(
            "Response cache {} for {key}",
            if value.is_some() { "hit" } else { "miss" }
        );
        value
    }

    pub async fn put(&self, key: &str, envelope: &Value) {
        let payload = match serde_json::to_string(envelope) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize completion for cache: {e}");
                return;
            }
        };

        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Response cache unavailable: {e}");
                return;
            }
        };

        let result: redis::RedisResult<()> = conn.set_ex(key, payload, self.ttl_secs).await;
        if let Err(e) = result {
            warn!("Response cache write failed: {e}");
        }
    }
}
