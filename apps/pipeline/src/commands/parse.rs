use std::path::PathBuf;

use tracing::info;

use crate::batch::run_batch;
use crate::commands::{finish, BatchLimits};
use crate::extraction::parser::{self, ParseOptions};
use crate::ingest;
use crate::state::PipelineState;
use crate::template::PromptTemplate;

/// Originals of converted DOCX files are archived under the input directory,
/// matching where operators drop new files.
const DOCX_ARCHIVE_SUBDIR: &str = "base_docx_pre-conversion";

#[allow(clippy::too_many_arguments)]
pub async fn run(
    state: PipelineState,
    limits: BatchLimits,
    input_dir: PathBuf,
    prompt: PathBuf,
    processed_dir: PathBuf,
    raw_output_dir: PathBuf,
    keep_inputs: bool,
) -> anyhow::Result<()> {
    let template = PromptTemplate::load(&prompt)?;
    let files = ingest::scan_input_dir(&input_dir)?;
    if files.is_empty() {
        info!("Nothing to parse in {}", input_dir.display());
        return Ok(());
    }

    let opts = ParseOptions {
        archive_dir: input_dir.join(DOCX_ARCHIVE_SUBDIR),
        processed_dir,
        raw_output_dir,
        keep_inputs,
    };

    let items: Vec<(String, ingest::SourceFile)> = files
        .into_iter()
        .map(|f| (f.file_id.clone(), f))
        .collect();

    let report = run_batch(
        items,
        limits.concurrency,
        limits.per_item_timeout,
        move |file| {
            let state = state.clone();
            let template = template.clone();
            let opts = opts.clone();
            async move {
                parser::parse_file(&state, &template, file, &opts)
                    .await
                    .map(|_| ())
            }
        },
    )
    .await;

    finish(report, "parse")
}
