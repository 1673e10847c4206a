//! Hash-keyed embedding cache.
//!
//! Pure memoization: the key is a SHA-256 over the exact text, task type and
//! model name, so a model upgrade produces misses rather than stale hits.
//! No eviction, no TTL. The only concurrent race — two processes computing
//! the same missing key — is tolerated as redundant work, not locked out.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::embedding::{Embedder, TaskType};
use crate::errors::Result;

/// Storage backend for cached vectors.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, text_hash: &str) -> Result<Option<Vec<f32>>>;
    async fn put(
        &self,
        text_hash: &str,
        model_name: &str,
        task_type: TaskType,
        embedding: &[f32],
    ) -> Result<()>;
}

/// Postgres-backed cache store (the shared `embedding_cache` table).
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embedding_cache")
            .fetch_one(&self.pool)
            .await?;
        let by_model: Vec<(String, i64)> = sqlx::query_as(
            "SELECT model_name, COUNT(*) FROM embedding_cache GROUP BY model_name ORDER BY 2 DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        let by_task: Vec<(String, i64)> = sqlx::query_as(
            "SELECT task_type, COUNT(*) FROM embedding_cache GROUP BY task_type ORDER BY 2 DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        let oldest: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MIN(created_at) FROM embedding_cache")
                .fetch_one(&self.pool)
                .await?;
        let newest: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT MAX(created_at) FROM embedding_cache")
                .fetch_one(&self.pool)
                .await?;

        Ok(CacheStats {
            total_entries: total,
            by_model,
            by_task,
            oldest_entry: oldest,
            newest_entry: newest,
        })
    }
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn get(&self, text_hash: &str) -> Result<Option<Vec<f32>>> {
        Ok(sqlx::query_scalar(
            "SELECT embedding FROM embedding_cache WHERE text_hash = $1",
        )
        .bind(text_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn put(
        &self,
        text_hash: &str,
        model_name: &str,
        task_type: TaskType,
        embedding: &[f32],
    ) -> Result<()> {
        // DO NOTHING on conflict: a concurrent writer already stored the
        // same deterministic vector for this key.
        sqlx::query(
            r#"
            INSERT INTO embedding_cache (text_hash, model_name, task_type, embedding)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (text_hash) DO NOTHING
            "#,
        )
        .bind(text_hash)
        .bind(model_name)
        .bind(task_type.as_str())
        .bind(embedding)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Cache population summary for operators (manual pruning is their job).
#[derive(Debug, Serialize)]
pub struct CacheStats {
    pub total_entries: i64,
    pub by_model: Vec<(String, i64)>,
    pub by_task: Vec<(String, i64)>,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
}

/// Memoizing wrapper around an [`Embedder`].
pub struct EmbeddingCache {
    store: Arc<dyn CacheStore>,
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingCache {
    pub fn new(store: Arc<dyn CacheStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Derives the cache key for (text, task, model).
    pub fn cache_key(text: &str, task: TaskType, model_name: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(b":");
        hasher.update(task.as_str().as_bytes());
        hasher.update(b":");
        hasher.update(model_name.as_bytes());
        let digest = hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Returns the cached vector for (text, task, model) or computes, stores
    /// and returns it. On provider failure nothing is written and the error
    /// propagates, so a failed batch cannot poison the cache.
    pub async fn get_or_compute(&self, text: &str, task: TaskType) -> Result<Vec<f32>> {
        let key = Self::cache_key(text, task, self.embedder.model_name());

        if let Some(cached) = self.store.get(&key).await? {
            debug!("Embedding cache hit for {}...", &key[..16]);
            return Ok(cached);
        }

        info!(
            "Embedding cache miss for {}... (text length {})",
            &key[..16],
            text.len()
        );
        let vector = self.embedder.embed(text, task).await?;
        self.store
            .put(&key, self.embedder.model_name(), task, &vector)
            .await?;
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::errors::PipelineError;

    #[derive(Default)]
    struct MemoryStore {
        entries: Mutex<HashMap<String, Vec<f32>>>,
    }

    #[async_trait]
    impl CacheStore for MemoryStore {
        async fn get(&self, text_hash: &str) -> Result<Option<Vec<f32>>> {
            Ok(self.entries.lock().unwrap().get(text_hash).cloned())
        }

        async fn put(
            &self,
            text_hash: &str,
            _model_name: &str,
            _task_type: TaskType,
            embedding: &[f32],
        ) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .entry(text_hash.to_string())
                .or_insert_with(|| embedding.to_vec());
            Ok(())
        }
    }

    /// Embedder stub that counts external calls and derives a vector from the
    /// input length, so distinct inputs are distinguishable.
    struct CountingEmbedder {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "stub-embed-1"
        }

        async fn embed(&self, text: &str, _task: TaskType) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PipelineError::Embedding("provider down".to_string()));
            }
            Ok(vec![text.len() as f32, 1.0, 2.0])
        }
    }

    fn cache_with(embedder: Arc<CountingEmbedder>) -> (EmbeddingCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        (
            EmbeddingCache::new(store.clone(), embedder),
            store,
        )
    }

    #[tokio::test]
    async fn test_second_identical_call_hits_cache_without_provider_call() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (cache, _) = cache_with(embedder.clone());

        let first = cache
            .get_or_compute("some resume text", TaskType::RetrievalDocument)
            .await
            .unwrap();
        let second = cache
            .get_or_compute("some resume text", TaskType::RetrievalDocument)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(embedder.call_count(), 1);
    }

    #[tokio::test]
    async fn test_different_text_misses() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (cache, _) = cache_with(embedder.clone());

        cache
            .get_or_compute("text a", TaskType::RetrievalDocument)
            .await
            .unwrap();
        cache
            .get_or_compute("text b!", TaskType::RetrievalDocument)
            .await
            .unwrap();

        assert_eq!(embedder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_different_task_type_misses_for_same_text() {
        let embedder = Arc::new(CountingEmbedder::new());
        let (cache, _) = cache_with(embedder.clone());

        cache
            .get_or_compute("same text", TaskType::RetrievalDocument)
            .await
            .unwrap();
        cache
            .get_or_compute("same text", TaskType::RetrievalQuery)
            .await
            .unwrap();

        assert_eq!(embedder.call_count(), 2);
    }

    #[test]
    fn test_different_model_changes_key() {
        let a = EmbeddingCache::cache_key("text", TaskType::RetrievalDocument, "model-1");
        let b = EmbeddingCache::cache_key("text", TaskType::RetrievalDocument, "model-2");
        assert_ne!(a, b);
    }

    #[test]
    fn test_cache_key_is_deterministic_hex() {
        let a = EmbeddingCache::cache_key("text", TaskType::SemanticSimilarity, "m");
        let b = EmbeddingCache::cache_key("text", TaskType::SemanticSimilarity, "m");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_provider_failure_writes_nothing() {
        let embedder = Arc::new(CountingEmbedder::failing());
        let (cache, store) = cache_with(embedder.clone());

        let err = cache
            .get_or_compute("text", TaskType::RetrievalDocument)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Embedding(_)));
        assert!(store.entries.lock().unwrap().is_empty());
    }
}
