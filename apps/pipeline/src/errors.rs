use thiserror::Error;

use crate::llm_client::LlmError;
use crate::template::TemplateError;

/// Application-level error type.
/// Batch drivers catch these per item; only `main` converts to an exit status.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Schema violation in {context}: {}", .violations.join("; "))]
    Schema {
        context: String,
        violations: Vec<String>,
    },

    #[error("Document conversion failed: {0}")]
    Conversion(String),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Treatment generation failed: {0}")]
    Treatment(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Prompt template error: {0}")]
    Template(#[from] TemplateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Builds a `Schema` error from a list of boundary-check violations.
    pub fn schema(context: impl Into<String>, violations: Vec<String>) -> Self {
        PipelineError::Schema {
            context: context.into(),
            violations,
        }
    }
}
