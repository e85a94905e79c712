//! Generation-service client: the single point of entry for every call to the
//! external text-generation service.
//!
//! ARCHITECTURAL RULE: No other module may talk to the service over HTTP.
//! The pipeline depends only on the `TextGenerator` capability so tests can
//! substitute a scripted fake.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{multipart, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::generation::models::DocumentRef;

pub mod cache;
pub mod circuit_breaker;
pub mod prompts;

use cache::ResponseCache;
use circuit_breaker::CircuitBreaker;
use prompts::STRUCTURED_OUTPUT_PREAMBLE;

const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
const FILES_PATH: &str = "/v1/files";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Generation service circuit is open")]
    CircuitOpen,

    #[error("Gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("Upload rejected: {0}")]
    UploadRejected(String),
}

/// A single request to the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub instructions: String,
    pub document_ids: Vec<String>,
}

impl GenerationRequest {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            document_ids: Vec::new(),
        }
    }

    pub fn with_documents(mut self, documents: &[DocumentRef]) -> Self {
        self.document_ids = documents.iter().map(|d| d.id.clone()).collect();
        self
    }
}

/// Capability the generation pipeline needs from the external service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Sends instructions (with optional document attachments) and returns
    /// the raw response envelope.
    async fn complete(&self, request: &GenerationRequest) -> Result<Value, LlmError>;

    /// Uploads a document and returns its opaque service reference.
    async fn upload_document(
        &self,
        file_name: &str,
        content: Bytes,
        tags: &[String],
    ) -> Result<DocumentRef, LlmError>;
}

/// Bounded attempts with a fixed backoff between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub api_key: String,
    pub model: Option<String>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attachments: Option<Attachments<'a>>,
    preamble: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    mode: &'a str,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Attachments<'a> {
    files: &'a [String],
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Vec<UploadedFile>,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

/// HTTP client for the generation service, with retry policy, circuit
/// breaker and optional response cache.
#[derive(Clone)]
pub struct GenerationClient {
    client: Client,
    settings: ClientSettings,
    breaker: Arc<CircuitBreaker>,
    cache: Option<ResponseCache>,
}

impl GenerationClient {
    pub fn new(settings: ClientSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            settings,
            breaker: Arc::new(CircuitBreaker::default()),
            cache: None,
        })
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.settings.model.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    /// Posts a chat completion, retrying transport errors, 429 and 5xx with a
    /// fixed backoff. Other non-success statuses fail immediately.
    async fn post_with_retry(&self, request: &GenerationRequest) -> Result<Value, LlmError> {
        let body = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: &request.instructions,
            }],
            attachments: (!request.document_ids.is_empty()).then_some(Attachments {
                files: &request.document_ids,
            }),
            preamble: STRUCTURED_OUTPUT_PREAMBLE,
            model: self.settings.model.as_deref(),
            mode: "rag",
            stream: false,
        };

        let max_attempts = self.settings.retry.max_attempts.max(1);
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                warn!(
                    "Generation call attempt {} failed, retrying after {}ms...",
                    attempt,
                    self.settings.retry.backoff.as_millis()
                );
                tokio::time::sleep(self.settings.retry.backoff).await;
            }

            let response = self
                .client
                .post(self.url(CHAT_COMPLETIONS_PATH))
                .header("X-API-Key", &self.settings.api_key)
                .header("Accept", "application/json")
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let message = response.text().await.unwrap_or_default();
                warn!("Generation service returned {}: {}", status, message);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let raw = response.text().await?;
            // Some deployments answer with a bare text body instead of JSON.
            let envelope =
                serde_json::from_str::<Value>(&raw).unwrap_or_else(|_| Value::String(raw));
            debug!("Generation call succeeded on attempt {}", attempt + 1);
            return Ok(envelope);
        }

        Err(last_error.unwrap_or(LlmError::Exhausted {
            attempts: max_attempts,
        }))
    }

    async fn send_upload(
        &self,
        form: multipart::Form,
        file_name: &str,
    ) -> Result<DocumentRef, LlmError> {
        let response = self
            .client
            .post(self.url(FILES_PATH))
            .header("X-API-Key", &self.settings.api_key)
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: UploadResponse = response.json().await?;
        match body.data.into_iter().next() {
            Some(file) if body.success => Ok(DocumentRef {
                id: file.id,
                file_name: Some(file_name.to_string()),
            }),
            _ => Err(LlmError::UploadRejected(
                body.message
                    .unwrap_or_else(|| "service returned no file id".to_string()),
            )),
        }
    }
}

#[async_trait]
impl TextGenerator for GenerationClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<Value, LlmError> {
        let cache_key = self
            .cache
            .as_ref()
            .map(|_| ResponseCache::key(request, self.model()));

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.get(key).await {
                return Ok(hit);
            }
        }

        if !self.breaker.allow() {
            warn!("Generation service circuit open, skipping call");
            return Err(LlmError::CircuitOpen);
        }

        let envelope = match self.post_with_retry(request).await {
            Ok(envelope) => {
                self.breaker.record_success();
                envelope
            }
            Err(e) => {
                self.breaker.record_failure();
                debug!("Generation circuit is {:?}", self.breaker.state());
                return Err(e);
            }
        };

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if envelope_text(&envelope).is_some() {
                cache.put(key, &envelope).await;
            }
        }

        Ok(envelope)
    }

    async fn upload_document(
        &self,
        file_name: &str,
        content: Bytes,
        tags: &[String],
    ) -> Result<DocumentRef, LlmError> {
        if !self.breaker.allow() {
            return Err(LlmError::CircuitOpen);
        }

        let mut form = multipart::Form::new().part(
            "files",
            multipart::Part::bytes(content.to_vec()).file_name(file_name.to_string()),
        );
        if !tags.is_empty() {
            form = form.text("tags", tags.join(","));
        }

        let result = self.send_upload(form, file_name).await;

        match &result {
            Ok(_) => self.breaker.record_success(),
            Err(_) => self.breaker.record_failure(),
        }
        result
    }
}

/// Awaits a completion with a bounded timeout and extracts its text.
/// Every failure mode (error, timeout, unknown envelope) yields `None`.
pub async fn complete_text(
    service: &dyn TextGenerator,
    request: &GenerationRequest,
    timeout: Duration,
) -> Option<String> {
    match tokio::time::timeout(timeout, service.complete(request)).await {
        Ok(Ok(envelope)) => {
            let text = envelope_text(&envelope);
            if text.is_none() {
                warn!("Generation service returned an envelope without text");
            }
            text
        }
        Ok(Err(e)) => {
            warn!("Generation service call failed: {e}");
            None
        }
        Err(_) => {
            warn!(
                "Generation service call timed out after {}s",
                timeout.as_secs()
            );
            None
        }
    }
}

/// Extracts the text payload from a response envelope.
///
/// Accepted shapes:
/// - object with content: `choices[0].message.content`, `message.content` or
///   `content` (a string or a list of text blocks)
/// - plain string
/// - nested string: a string holding a JSON-encoded envelope, or an object
///   wrapping the text under `data`/`response`/`text`/`output`
///
/// Anything else, or blank text, is `None`.
pub fn envelope_text(envelope: &Value) -> Option<String> {
    let text = match envelope {
        Value::String(s) => string_text(s),
        Value::Object(_) => object_text(envelope, 0),
        _ => None,
    }?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn string_text(s: &str) -> Option<String> {
    match serde_json::from_str::<Value>(s.trim()) {
        Ok(inner @ Value::Object(_)) => object_text(&inner, 1),
        Ok(Value::String(inner)) => Some(inner),
        _ => Some(s.to_string()),
    }
}

fn object_text(value: &Value, depth: u8) -> Option<String> {
    let content = value
        .pointer("/choices/0/message/content")
        .or_else(|| value.pointer("/message/content"))
        .or_else(|| value.get("content"));
    if let Some(content) = content {
        return content_text(content);
    }

    for key in ["data", "response", "text", "output"] {
        match value.get(key) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(inner @ Value::Object(_)) if depth < 2 => return object_text(inner, depth + 1),
            _ => {}
        }
    }
    None
}

fn content_text(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let joined = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_choices_shape() {
        let envelope = json!({
            "choices": [{"message": {"role": "assistant", "content": "  Hello  "}}]
        });
        assert_eq!(envelope_text(&envelope).as_deref(), Some("Hello"));
    }

    #[test]
    fn test_envelope_content_blocks_shape() {
        let envelope = json!({
            "content": [{"type": "text", "text": "First"}, {"type": "text", "text": "Second"}]
        });
        assert_eq!(envelope_text(&envelope).as_deref(), Some("First\nSecond"));
    }

    #[test]
    fn test_envelope_plain_string() {
        let envelope = Value::String("MANAGER ASSESSMENT QUESTIONS".to_string());
        assert_eq!(
            envelope_text(&envelope).as_deref(),
            Some("MANAGER ASSESSMENT QUESTIONS")
        );
    }

    #[test]
    fn test_envelope_nested_string() {
        let inner = json!({"message": {"content": "Nested"}}).to_string();
        assert_eq!(
            envelope_text(&Value::String(inner)).as_deref(),
            Some("Nested")
        );
        assert_eq!(
            envelope_text(&json!({"data": {"response": "Deep"}})).as_deref(),
            Some("Deep")
        );
    }

    #[test]
    fn test_envelope_unknown_shapes_are_none() {
        assert_eq!(envelope_text(&json!(42)), None);
        assert_eq!(envelope_text(&json!(null)), None);
        assert_eq!(envelope_text(&json!({"status": "ok"})), None);
        assert_eq!(envelope_text(&json!([1, 2, 3])), None);
        assert_eq!(envelope_text(&json!({"content": 7})), None);
        assert_eq!(envelope_text(&json!({"content": "   "})), None);
    }

    #[test]
    fn test_numeric_string_stays_plain_text() {
        assert_eq!(envelope_text(&json!("42")).as_deref(), Some("42"));
    }

    #[test]
    fn test_request_with_documents() {
        let docs = vec![
            DocumentRef {
                id: "file-1".to_string(),
                file_name: None,
            },
            DocumentRef {
                id: "file-2".to_string(),
                file_name: Some("model.pdf".to_string()),
            },
        ];
        let request = GenerationRequest::new("prompt").with_documents(&docs);
        assert_eq!(request.document_ids, vec!["file-1", "file-2"]);
    }

    #[test]
    fn test_chat_request_omits_empty_attachments() {
        let body = ChatRequest {
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            attachments: None,
            preamble: STRUCTURED_OUTPUT_PREAMBLE,
            model: None,
            mode: "rag",
            stream: false,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("attachments").is_none());
        assert!(value.get("model").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
