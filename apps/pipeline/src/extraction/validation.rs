//! Validation agent: a second LLM pass reviewing a stored record.
//!
//! This catches schema drift the deterministic boundary checks cannot see
//! (semantically wrong groupings, mixed-up fields). Low scores are flagged
//! for manual review; the pipeline never silently applies corrections.

use serde_json::to_value;
use tracing::{info, warn};

use crate::errors::{PipelineError, Result};
use crate::extraction::models::ValidationReply;
use crate::extraction::prompts::validation_system;
use crate::state::PipelineState;
use crate::store::documents::DerivedColumn;
use crate::template::PromptTemplate;

/// Scores below this are surfaced to operators.
pub const REVIEW_THRESHOLD: f64 = 7.0;

/// Runs the validation agent for one stored document and persists the report.
pub async fn run_validation(
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
    let (reply, usage): (ValidationReply, _) = state
        .llm_extraction
        .call_json(&prompt, &validation_system())
        .await?;
    reply.validation.validate()?;

    if reply.validation.score < REVIEW_THRESHOLD {
        warn!(
            "Validation flagged {} (score {:.1}): {}",
            file_id,
            reply.validation.score,
            reply.validation.flags.join("; ")
        );
    }

    state
        .store
        .update_validation(
            file_id,
            &to_value(&reply.validation)?,
            state.llm_extraction.model(),
            &to_value(&usage)?,
        )
        .await?;

    info!(
        "Validation stored for {}: score={:.1}, {} flag(s)",
        file_id,
        reply.validation.score,
        reply.validation.flags.len()
    );
    Ok(())
}

pub async fn validation_targets(
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
    state.store.list_missing(DerivedColumn::Validation).await
}
