//! Command handlers: each subcommand wires templates and the batch driver
//! around the processing functions.

pub mod cache;
pub mod derive;
pub mod export;
pub mod parse;
pub mod treat;

use std::time::Duration;

use crate::batch::BatchReport;
use crate::cli::{Cli, Commands};
use crate::state::PipelineState;

/// Batch knobs shared by every command.
#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    pub concurrency: usize,
    pub per_item_timeout: Duration,
}

pub async fn dispatch(state: PipelineState, cli: Cli) -> anyhow::Result<()> {
    let limits = BatchLimits {
        concurrency: cli.concurrency,
        per_item_timeout: Duration::from_secs(cli.item_timeout),
    };

    match cli.command {
        Commands::Parse {
            input_dir,
            prompt,
            processed_dir,
            raw_output_dir,
            keep_inputs,
        } => {
            parse::run(
                state,
                limits,
                input_dir,
                prompt,
                processed_dir,
                raw_output_dir,
                keep_inputs,
            )
            .await
        }
        Commands::Eda {
            file_id,
            prompt,
            force,
        } => derive::run_eda(state, limits, file_id, prompt, force).await,
        Commands::Validate {
            file_id,
            prompt,
            force,
        } => derive::run_validation(state, limits, file_id, prompt, force).await,
        Commands::Treat {
            sector,
            file_id,
            treatments,
            prompt,
            refiner_prompt,
            research_prompt,
        } => {
            treat::run(
                state,
                limits,
                sector,
                file_id,
                treatments,
                prompt,
                refiner_prompt,
                research_prompt,
            )
            .await
        }
        Commands::Embed { file_id, force } => derive::run_embed(state, limits, file_id, force).await,
        Commands::Export {
            output_dir,
            theme,
            file_id,
            treated,
        } => export::run(state, limits, output_dir, theme, file_id, treated).await,
        Commands::CacheStats => cache::run(state).await,
    }
}

/// Converts a batch report into the command's exit outcome: any failed item
/// fails the command, after every item had its chance to run.
pub fn finish(report: BatchReport, what: &str) -> anyhow::Result<()> {
    report.log_summary(what);
    if report.failed.is_empty() {
        Ok(())
    } else {
        anyhow::bail!(
            "{what}: {} of {} items failed",
            report.failed.len(),
            report.total()
        )
    }
}
