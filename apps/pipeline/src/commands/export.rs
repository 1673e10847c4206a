use std::path::PathBuf;

use serde_json::Value;
use tracing::info;

use crate::batch::run_batch;
use crate::commands::{finish, BatchLimits};
use crate::errors::PipelineError;
use crate::export::{export_file_name, export_record};
use crate::state::PipelineState;

pub async fn run(
    state: PipelineState,
    limits: BatchLimits,
    output_dir: PathBuf,
    theme: String,
    file_ids: Vec<String>,
    treated: bool,
) -> anyhow::Result<()> {
    let items = if treated {
        treated_items(&state, &file_ids, &output_dir).await?
    } else {
        standard_items(&state, &file_ids, &output_dir).await?
    };
    if items.is_empty() {
        info!("Nothing to export");
        return Ok(());
    }

    let report = run_batch(
        items,
        limits.concurrency,
        limits.per_item_timeout,
        move |(record, out_path): (Value, PathBuf)| {
            let theme = theme.clone();
            async move { export_record(&record, &out_path, &theme).await }
        },
    )
    .await;

    finish(report, "export")
}

async fn standard_items(
    state: &PipelineState,
    file_ids: &[String],
    output_dir: &PathBuf,
) -> anyhow::Result<Vec<(String, (Value, PathBuf))>> {
    let targets = if file_ids.is_empty() {
        state.store.list_file_ids().await?
    } else {
        file_ids.to_vec()
    };

    let mut items = Vec::with_capacity(targets.len());
    for file_id in targets {
        let doc = state
            .store
            .get_by_file_id(&file_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("document {file_id}")))?;
        let out_path = output_dir.join(export_file_name(&file_id, None));
        items.push((file_id, (doc.record, out_path)));
    }
    Ok(items)
}

async fn treated_items(
    state: &PipelineState,
    file_ids: &[String],
    output_dir: &PathBuf,
) -> anyhow::Result<Vec<(String, (Value, PathBuf))>> {
    let rows = if file_ids.is_empty() {
        state.store.all_treated().await?
    } else {
        let mut rows = Vec::new();
        for file_id in file_ids {
            rows.extend(state.store.list_treated(file_id).await?);
        }
        rows
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            let label = format!("{}:{}", row.source_file_id, row.treatment);
            let out_path =
                output_dir.join(export_file_name(&row.source_file_id, Some(&row.treatment)));
            (label, (row.record, out_path))
        })
        .collect())
}
