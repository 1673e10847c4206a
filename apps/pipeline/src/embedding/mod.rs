//! Embedding generation.
//!
//! The provider sits behind the [`Embedder`] trait so the cache can be tested
//! with a call-counting stub and the HTTP backend can be swapped without
//! touching callers.

pub mod cache;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{PipelineError, Result};

pub use cache::EmbeddingCache;

use crate::extraction::models::ResumeRecord;
use crate::store::DocumentStore;

/// Embeds a stored record's searchable text through the cache and saves the
/// vector on the document row.
pub async fn embed_document(
    store: &DocumentStore,
    cache: &EmbeddingCache,
    file_id: &str,
) -> Result<()> {
    let doc = store
        .get_by_file_id(file_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("document {file_id}")))?;

    let record: ResumeRecord = serde_json::from_value(doc.record)?;
    let text = record.searchable_text();
    if text.is_empty() {
        return Err(PipelineError::Embedding(format!(
            "document {file_id} has no text to embed"
        )));
    }

    let vector = cache
        .get_or_compute(&text, TaskType::RetrievalDocument)
        .await?;
    store.update_embedding(file_id, &vector).await
}

/// Embedding purpose. Part of the cache key: the same text embedded for a
/// different purpose is a different cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    RetrievalQuery,
    RetrievalDocument,
    SemanticSimilarity,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::RetrievalQuery => "retrieval_query",
            TaskType::RetrievalDocument => "retrieval_document",
            TaskType::SemanticSimilarity => "semantic_similarity",
        }
    }
}

/// The external embedding call.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;
    async fn embed(&self, text: &str, task: TaskType) -> Result<Vec<f32>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    input_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// HTTP embedder against an OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpEmbedder {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str, task: TaskType) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: [text],
            input_type: task.as_str(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::Embedding(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::Embedding(format!(
                "API returned {status}: {body}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::Embedding(format!("malformed response: {e}")))?;

        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| PipelineError::Embedding("empty embedding response".to_string()))?;

        if vector.is_empty() {
            return Err(PipelineError::Embedding(
                "provider returned a zero-length vector".to_string(),
            ));
        }

        debug!(
            "Generated embedding: model={}, task={}, dims={}",
            self.model,
            task.as_str(),
            vector.len()
        );
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_type_strings() {
        assert_eq!(TaskType::RetrievalQuery.as_str(), "retrieval_query");
        assert_eq!(TaskType::RetrievalDocument.as_str(), "retrieval_document");
        assert_eq!(TaskType::SemanticSimilarity.as_str(), "semantic_similarity");
    }

    #[test]
    fn test_endpoint_handles_trailing_slash() {
        let e = HttpEmbedder::new(
            "https://api.example.com/v1/".to_string(),
            "key".to_string(),
            "embed-1".to_string(),
        );
        assert_eq!(e.endpoint(), "https://api.example.com/v1/embeddings");
    }
}
