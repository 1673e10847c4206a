use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// One standardized resume document. `record` holds the `ResumeRecord` JSON;
/// `key_metrics` and `validation` are filled by later passes. `models` and
/// `usage_tokens` are per-pass objects, e.g. `{"parse": ..., "eda": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeDocumentRow {
    pub id: Uuid,
    pub file_id: String,
    pub industry_prefix: String,
    pub file_size_bytes: i64,
    pub file_hash: String,
    pub text_excerpt: Option<String>,
    pub record: Value,
    pub key_metrics: Option<Value>,
    pub validation: Option<Value>,
    pub embedding: Option<Vec<f32>>,
    pub models: Value,
    pub usage_tokens: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A generated treatment variant, stored as its own document so each variant
/// can be exported and mailed independently.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TreatedResumeRow {
    pub id: Uuid,
    pub source_file_id: String,
    pub treatment: String,
    pub record: Value,
    pub similarity: Option<f32>,
    pub style_modifier: Option<String>,
    pub injected: Option<Value>,
    pub company_map: Option<Value>,
    pub models: Value,
    pub usage_tokens: Value,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a first-pass document upsert.
#[derive(Debug, Clone)]
pub struct NewResumeDocument {
    pub file_id: String,
    pub industry_prefix: String,
    pub file_size_bytes: i64,
    pub file_hash: String,
    pub text_excerpt: Option<String>,
    pub record: Value,
    pub model_name: String,
    pub usage: Value,
}

/// Insert payload for a treated variant.
#[derive(Debug, Clone)]
pub struct NewTreatedResume {
    pub source_file_id: String,
    pub treatment: String,
    pub record: Value,
    pub similarity: Option<f32>,
    pub style_modifier: Option<String>,
    pub injected: Option<Value>,
    pub company_map: Option<Value>,
    pub model_name: String,
    pub usage: Value,
}
