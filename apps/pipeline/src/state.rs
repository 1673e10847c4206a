use std::sync::Arc;

use crate::config::Config;
use crate::embedding::EmbeddingCache;
use crate::errors::{PipelineError, Result};
use crate::llm_client::LlmClient;
use crate::store::DocumentStore;

/// Shared pipeline state: every client is constructed once at batch start and
/// passed by reference (or cheap clone) into processing functions. No
/// module-level singletons.
#[derive(Clone)]
pub struct PipelineState {
    pub store: DocumentStore,
    /// Fast model: first-pass extraction and the validation agent.
    pub llm_extraction: LlmClient,
    /// Stronger model: derived analytics.
    pub llm_analysis: LlmClient,
    /// Stronger model at a higher temperature: treatment rephrasing.
    pub llm_treatment: LlmClient,
    /// Absent when EMBEDDINGS_API_KEY is not configured.
    pub embeddings: Option<Arc<EmbeddingCache>>,
    pub config: Config,
}

impl PipelineState {
    /// The embedding cache, or a configuration error naming the missing key.
    pub fn embeddings(&self) -> Result<&Arc<EmbeddingCache>> {
        self.embeddings.as_ref().ok_or_else(|| {
            PipelineError::Configuration(
                "EMBEDDINGS_API_KEY is not set; this command needs the embedding service"
                    .to_string(),
            )
        })
    }
}
