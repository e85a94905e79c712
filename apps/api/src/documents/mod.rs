//! Source-document upload. Files go to the generation service concurrently;
//! the returned references are what template generation attaches.

pub mod handlers;

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::generation::models::DocumentRef;
use crate::llm_client::TextGenerator;

/// A file received from the caller, not yet uploaded.
#[derive(Debug, Clone)]
pub struct PendingDocument {
    pub file_name: String,
    pub content: Bytes,
}

#[derive(Debug, Default, Serialize)]
pub struct UploadOutcome {
    pub documents: Vec<DocumentRef>,
    pub failed: Vec<String>,
}

/// Uploads every file concurrently. Results keep the order files were sent
/// in; a failed upload never aborts the others.
pub async fn upload_all(
    service: Arc<dyn TextGenerator>,
    files: Vec<PendingDocument>,
    tags: Vec<String>,
) -> UploadOutcome {
    let tags = Arc::new(tags);
    let mut tasks = JoinSet::new();

    for (index, file) in files.into_iter().enumerate() {
        let service = service.clone();
        let tags = tags.clone();
        tasks.spawn(async move {
            let result = service
                .upload_document(&file.file_name, file.content, &tags)
                .await;
            (index, file.file_name, result)
        });
    }

    let mut uploaded: Vec<(usize, DocumentRef)> = Vec::new();
    let mut failed: Vec<(usize, String)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, _, Ok(document))) => uploaded.push((index, document)),
            Ok((index, file_name, Err(e))) => {
                warn!("Upload of '{file_name}' failed: {e}");
                failed.push((index, file_name));
            }
            Err(e) => warn!("Upload task panicked: {e}"),
        }
    }

    uploaded.sort_by_key(|(index, _)| *index);
    failed.sort_by_key(|(index, _)| *index);
    info!(
        "Uploaded {} documents ({} failed)",
        uploaded.len(),
        failed.len()
    );

    UploadOutcome {
        documents: uploaded.into_iter().map(|(_, d)| d).collect(),
        failed: failed.into_iter().map(|(_, name)| name).collect(),
    }
}

/// Splits a comma-separated tag field.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
