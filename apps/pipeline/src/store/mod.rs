pub mod documents;
pub mod models;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::errors::Result;

pub use documents::DocumentStore;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Idempotent schema bootstrap: tables and lookup indexes for the three
/// collections (standardized documents, treated variants, embedding cache).
/// Run at batch start so a fresh database is usable without a separate step.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS resume_documents (
            id UUID PRIMARY KEY,
            file_id TEXT NOT NULL UNIQUE,
            industry_prefix TEXT NOT NULL,
            file_size_bytes BIGINT NOT NULL,
            file_hash TEXT NOT NULL,
            text_excerpt TEXT,
            record JSONB NOT NULL,
            key_metrics JSONB,
            validation JSONB,
            embedding REAL[],
            models JSONB NOT NULL DEFAULT '{}'::jsonb,
            usage_tokens JSONB NOT NULL DEFAULT '{}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_resume_documents_file_hash \
         ON resume_documents (file_hash)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS treated_resumes (
            id UUID PRIMARY KEY,
            source_file_id TEXT NOT NULL,
            treatment TEXT NOT NULL,
            record JSONB NOT NULL,
            similarity REAL,
            style_modifier TEXT,
            injected JSONB,
            company_map JSONB,
            models JSONB NOT NULL DEFAULT '{}'::jsonb,
            usage_tokens JSONB NOT NULL DEFAULT '{}'::jsonb,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_treated_resumes_source \
         ON treated_resumes (source_file_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embedding_cache (
            text_hash TEXT PRIMARY KEY,
            model_name TEXT NOT NULL,
            task_type TEXT NOT NULL,
            embedding REAL[] NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_embedding_cache_model \
         ON embedding_cache (model_name)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_embedding_cache_task \
         ON embedding_cache (task_type)",
    )
    .execute(pool)
    .await?;

    info!("Document store schema ensured");
    Ok(())
}
