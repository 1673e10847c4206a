//! Document store CRUD.
//!
//! Every write is a single-document insert or upsert; there is nothing to
//! roll back on failure, so an aborted operation leaves no partial record.

use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::Result;
use crate::store::models::{
    NewResumeDocument, NewTreatedResume, ResumeDocumentRow, TreatedResumeRow,
};

/// Handle to the shared document store. Constructed once at batch start and
/// passed by reference into every processing function.
#[derive(Clone)]
pub struct DocumentStore {
    pool: PgPool,
}

impl DocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Upserts a standardized document keyed by `file_id`. Re-parsing a file
    /// overwrites the earlier pass and resets derived fields.
    pub async fn upsert_resume(&self, doc: &NewResumeDocument) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO resume_documents
                (id, file_id, industry_prefix, file_size_bytes, file_hash,
                 text_excerpt, record, models, usage_tokens)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (file_id) DO UPDATE SET
                industry_prefix = EXCLUDED.industry_prefix,
                file_size_bytes = EXCLUDED.file_size_bytes,
                file_hash = EXCLUDED.file_hash,
                text_excerpt = EXCLUDED.text_excerpt,
                record = EXCLUDED.record,
                key_metrics = NULL,
                validation = NULL,
                embedding = NULL,
                models = EXCLUDED.models,
                usage_tokens = EXCLUDED.usage_tokens,
                updated_at = now()
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&doc.file_id)
        .bind(&doc.industry_prefix)
        .bind(doc.file_size_bytes)
        .bind(&doc.file_hash)
        .bind(&doc.text_excerpt)
        .bind(&doc.record)
        .bind(json!({ "parse": doc.model_name }))
        .bind(json!({ "parse": doc.usage }))
        .fetch_one(&self.pool)
        .await?;

        info!("Stored document {} as {}", doc.file_id, id);
        Ok(id)
    }

    pub async fn get_by_file_id(&self, file_id: &str) -> Result<Option<ResumeDocumentRow>> {
        Ok(sqlx::query_as::<_, ResumeDocumentRow>(
            "SELECT * FROM resume_documents WHERE file_id = $1",
        )
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn get_by_hash(&self, file_hash: &str) -> Result<Option<ResumeDocumentRow>> {
        Ok(sqlx::query_as::<_, ResumeDocumentRow>(
            "SELECT * FROM resume_documents WHERE file_hash = $1 LIMIT 1",
        )
        .bind(file_hash)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn list_file_ids(&self) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT file_id FROM resume_documents ORDER BY file_id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// File ids for one sector of the study.
    pub async fn list_by_prefix(&self, industry_prefix: &str) -> Result<Vec<String>> {
        Ok(sqlx::query_scalar(
            "SELECT file_id FROM resume_documents WHERE industry_prefix = $1 ORDER BY file_id",
        )
        .bind(industry_prefix)
        .fetch_all(&self.pool)
        .await?)
    }

    /// File ids of documents a given pass has not touched yet.
    pub async fn list_missing(&self, column: DerivedColumn) -> Result<Vec<String>> {
        let sql = match column {
            DerivedColumn::KeyMetrics => {
                "SELECT file_id FROM resume_documents WHERE key_metrics IS NULL ORDER BY file_id"
            }
            DerivedColumn::Validation => {
                "SELECT file_id FROM resume_documents WHERE validation IS NULL ORDER BY file_id"
            }
            DerivedColumn::Embedding => {
                "SELECT file_id FROM resume_documents WHERE embedding IS NULL ORDER BY file_id"
            }
        };
        Ok(sqlx::query_scalar(sql).fetch_all(&self.pool).await?)
    }

    pub async fn update_metrics(
        &self,
        file_id: &str,
        metrics: &Value,
        model_name: &str,
        usage: &Value,
    ) -> Result<()> {
        self.update_derived(file_id, "key_metrics", "eda", metrics, model_name, usage)
            .await
    }

    pub async fn update_validation(
        &self,
        file_id: &str,
        report: &Value,
        model_name: &str,
        usage: &Value,
    ) -> Result<()> {
        self.update_derived(file_id, "validation", "validation", report, model_name, usage)
            .await
    }

    async fn update_derived(
        &self,
        file_id: &str,
        column: &str,
        pass: &str,
        value: &Value,
        model_name: &str,
        usage: &Value,
    ) -> Result<()> {
        // `column` comes from the two callers above, never from input.
        let sql = format!(
            "UPDATE resume_documents SET {column} = $2, \
             models = models || $3, usage_tokens = usage_tokens || $4, \
             updated_at = now() WHERE file_id = $1"
        );
        let result = sqlx::query(&sql)
            .bind(file_id)
            .bind(value)
            .bind(json!({ pass: model_name }))
            .bind(json!({ pass: usage }))
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(crate::errors::PipelineError::NotFound(format!(
                "document {file_id}"
            )));
        }
        Ok(())
    }

    pub async fn update_embedding(&self, file_id: &str, embedding: &[f32]) -> Result<()> {
        let result = sqlx::query(
            "UPDATE resume_documents SET embedding = $2, updated_at = now() WHERE file_id = $1",
        )
        .bind(file_id)
        .bind(embedding)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(crate::errors::PipelineError::NotFound(format!(
                "document {file_id}"
            )));
        }
        Ok(())
    }

    pub async fn insert_treated(&self, doc: &NewTreatedResume) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO treated_resumes
                (id, source_file_id, treatment, record, similarity,
                 style_modifier, injected, company_map, models, usage_tokens)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(id)
        .bind(&doc.source_file_id)
        .bind(&doc.treatment)
        .bind(&doc.record)
        .bind(doc.similarity)
        .bind(&doc.style_modifier)
        .bind(&doc.injected)
        .bind(&doc.company_map)
        .bind(json!({ "treatment": doc.model_name }))
        .bind(json!({ "treatment": doc.usage }))
        .execute(&self.pool)
        .await?;

        info!(
            "Stored treated variant {} of {} as {}",
            doc.treatment, doc.source_file_id, id
        );
        Ok(id)
    }

    pub async fn list_treated(&self, source_file_id: &str) -> Result<Vec<TreatedResumeRow>> {
        Ok(sqlx::query_as::<_, TreatedResumeRow>(
            "SELECT * FROM treated_resumes WHERE source_file_id = $1 ORDER BY created_at",
        )
        .bind(source_file_id)
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn all_treated(&self) -> Result<Vec<TreatedResumeRow>> {
        Ok(sqlx::query_as::<_, TreatedResumeRow>(
            "SELECT * FROM treated_resumes ORDER BY source_file_id, created_at",
        )
        .fetch_all(&self.pool)
        .await?)
    }
}

/// Derived fields a later pass fills in.
#[derive(Debug, Clone, Copy)]
pub enum DerivedColumn {
    KeyMetrics,
    Validation,
    Embedding,
}
