use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::batch::run_batch;
use crate::commands::{finish, BatchLimits};
use crate::errors::PipelineError;
use crate::state::PipelineState;
use crate::template::PromptTemplate;
use crate::treatment::generator::{self, TreatmentTemplates};
use crate::treatment::models::TreatmentPools;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    state: PipelineState,
    limits: BatchLimits,
    sector: String,
    file_ids: Vec<String>,
    treatments_path: PathBuf,
    prompt: PathBuf,
    refiner_prompt: PathBuf,
    research_prompt: PathBuf,
) -> anyhow::Result<()> {
    // Treatment runs need the embedding service for the similarity gate;
    // fail before any LLM spend if it is not configured.
    state.embeddings()?;

    let pools = Arc::new(TreatmentPools::load(&treatments_path, &sector)?);
    info!(
        "Loaded treatment pools for {}: {} education, {} work",
        sector.to_uppercase(),
        pools.education.len(),
        pools.work.len()
    );

    let templates = TreatmentTemplates {
        treatment: PromptTemplate::load(&prompt)?,
        control_refiner: PromptTemplate::load(&refiner_prompt)?,
        company_research: PromptTemplate::load(&research_prompt)?,
    };

    let targets = if !file_ids.is_empty() {
        file_ids
    } else {
        state.store.list_by_prefix(&sector.to_uppercase()).await?
    };
    if targets.is_empty() {
        info!("No stored documents for sector {}", sector.to_uppercase());
        return Ok(());
    }

    let items: Vec<(String, String)> = targets.into_iter().map(|id| (id.clone(), id)).collect();
    let report = run_batch(
        items,
        limits.concurrency,
        limits.per_item_timeout,
        move |file_id: String| {
            let state = state.clone();
            let templates = templates.clone();
            let pools = pools.clone();
            async move {
                let summary =
                    generator::generate_for_resume(&state, &templates, &pools, &file_id).await?;
                if summary.stored.is_empty() {
                    let reasons: Vec<String> = summary
                        .failed
                        .iter()
                        .map(|(kind, error)| format!("{}: {error}", kind.as_str()))
                        .collect();
                    return Err(PipelineError::Treatment(format!(
                        "all variants failed ({})",
                        reasons.join("; ")
                    )));
                }
                Ok(())
            }
        },
    )
    .await;

    finish(report, "treat")
}
