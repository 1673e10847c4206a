//! Derived-data passes over stored documents: EDA metrics, the validation
//! agent, and embeddings.

use std::path::PathBuf;

use tracing::info;

use crate::batch::run_batch;
use crate::commands::{finish, BatchLimits};
use crate::embedding;
use crate::extraction::{eda, validation};
use crate::state::PipelineState;
use crate::store::documents::DerivedColumn;
use crate::template::PromptTemplate;

pub async fn run_eda(
    state: PipelineState,
    limits: BatchLimits,
    file_ids: Vec<String>,
    prompt: PathBuf,
    force: bool,
) -> anyhow::Result<()> {
    let template = PromptTemplate::load(&prompt)?;
    let targets = eda::eda_targets(&state, &file_ids, force).await?;
    if targets.is_empty() {
        info!("Every stored document already has key metrics");
        return Ok(());
    }

    let items = labelled(targets);
    let report = run_batch(
        items,
        limits.concurrency,
        limits.per_item_timeout,
        move |file_id: String| {
            let state = state.clone();
            let template = template.clone();
            async move { eda::run_eda(&state, &template, &file_id).await }
        },
    )
    .await;

    finish(report, "eda")
}

pub async fn run_validation(
    state: PipelineState,
    limits: BatchLimits,
    file_ids: Vec<String>,
    prompt: PathBuf,
    force: bool,
) -> anyhow::Result<()> {
    let template = PromptTemplate::load(&prompt)?;
    let targets = validation::validation_targets(&state, &file_ids, force).await?;
    if targets.is_empty() {
        info!("Every stored document already has a validation report");
        return Ok(());
    }

    let items = labelled(targets);
    let report = run_batch(
        items,
        limits.concurrency,
        limits.per_item_timeout,
        move |file_id: String| {
            let state = state.clone();
            let template = template.clone();
            async move { validation::run_validation(&state, &template, &file_id).await }
        },
    )
    .await;

    finish(report, "validate")
}

pub async fn run_embed(
    state: PipelineState,
    limits: BatchLimits,
    file_ids: Vec<String>,
    force: bool,
) -> anyhow::Result<()> {
    // Resolve the cache up front so a missing key fails before any work.
    let cache = state.embeddings()?.clone();

    let targets = if !file_ids.is_empty() {
        file_ids
    } else if force {
        state.store.list_file_ids().await?
    } else {
        state.store.list_missing(DerivedColumn::Embedding).await?
    };
    if targets.is_empty() {
        info!("Every stored document already has an embedding");
        return Ok(());
    }

    let store = state.store.clone();
    let items = labelled(targets);
    let report = run_batch(
        items,
        limits.concurrency,
        limits.per_item_timeout,
        move |file_id: String| {
            let store = store.clone();
            let cache = cache.clone();
            async move { embedding::embed_document(&store, &cache, &file_id).await }
        },
    )
    .await;

    finish(report, "embed")
}

fn labelled(ids: Vec<String>) -> Vec<(String, String)> {
    ids.into_iter().map(|id| (id.clone(), id)).collect()
}
