//! EDA pass: derived analytics over a stored record.
//!
//! The record is injected into the prompt as JSON; no document upload.

use serde_json::to_value;
use tracing::info;

use crate::errors::{PipelineError, Result};
use crate::extraction::models::EdaReply;
use crate::extraction::prompts::eda_system;
use crate::state::PipelineState;
use crate::store::documents::DerivedColumn;
use crate::template::PromptTemplate;

/// Runs the EDA pass for one stored document and persists the metrics.
pub async fn run_eda(
    state: &PipelineState,
    template: &PromptTemplate,
    file_id: &str,
) -> Result<()> {
    let doc = state
        .store
        .get_by_file_id(file_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("document {file_id}")))?;

    let resume_json = serde_json::to_string_pretty(&doc.record)?;
    let prompt = template.render(&[("resume_json", resume_json.as_str())])?;
    let (reply, usage): (EdaReply, _) = state
        .llm_analysis
        .call_json(&prompt, &eda_system())
        .await?;
    reply.key_metrics.validate()?;

    state
        .store
        .update_metrics(
            file_id,
            &to_value(&reply.key_metrics)?,
            state.llm_analysis.model(),
            &to_value(&usage)?,
        )
        .await?;

    info!(
        "EDA stored for {}: level={:?}, quality={}",
        file_id, reply.key_metrics.experience_level, reply.key_metrics.quality_score
    );
    Ok(())
}

/// Resolves which documents the pass should touch: an explicit list, or every
/// document the pass has not seen yet (`force` re-runs everything).
pub async fn eda_targets(
    state: &PipelineState,
    explicit: &[String],
    force: bool,
) -> Result<Vec<String>> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }
    if force {
        return state.store.list_file_ids().await;
    }
    state.store.list_missing(DerivedColumn::KeyMetrics).await
}
