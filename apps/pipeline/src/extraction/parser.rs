//! First-pass extraction: PDF in, stored `ResumeRecord` out.

use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::to_value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::Result;
use crate::extraction::models::ParseReply;
use crate::extraction::prompts::resume_parse_system;
use crate::ingest::{self, PreparedFile, SourceFile};
use crate::llm_client::parse_reply;
use crate::state::PipelineState;
use crate::store::models::NewResumeDocument;
use crate::template::PromptTemplate;

/// Per-run options for the parse command.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub archive_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub raw_output_dir: PathBuf,
    /// Leave inputs in place instead of moving them after success.
    pub keep_inputs: bool,
}

/// Processes one input file end to end: prepare, call the LLM with the
/// document attached, validate the reply, upsert, archive the input.
pub async fn parse_file(
    state: &PipelineState,
    template: &PromptTemplate,
    file: SourceFile,
    opts: &ParseOptions,
) -> Result<Uuid> {
    let prepared = ingest::prepare(file, &opts.archive_dir).await?;
    info!(
        "Processing {} ({} bytes, hash {})",
        prepared.file_id,
        prepared.bytes.len(),
        &prepared.file_hash[..12]
    );

    if let Some(existing) = state.store.get_by_hash(&prepared.file_hash).await? {
        if existing.file_id != prepared.file_id {
            warn!(
                "{} has the same content hash as stored document {}",
                prepared.file_id, existing.file_id
            );
        }
    }

    let prompt = template.render(&[])?;
    let system = resume_parse_system();
    let response = state
        .llm_extraction
        .call_with_document(&prompt, &system, &prepared.bytes)
        .await?;
    let text = response
        .text()
        .ok_or(crate::llm_client::LlmError::EmptyContent)?
        .to_string();

    // Raw replies are kept on disk regardless of parse outcome so a malformed
    // reply can be inspected without re-running the call.
    if let Err(e) = save_raw_output(&opts.raw_output_dir, &prepared.file_id, &text) {
        warn!("Could not save raw LLM output for {}: {e}", prepared.file_id);
    }

    let reply: ParseReply = parse_reply(&text)?;
    reply.resume_data.validate()?;

    let doc = build_document(&prepared, &reply, state.llm_extraction.model(), &response.usage)?;
    let id = state.store.upsert_resume(&doc).await?;

    if !opts.keep_inputs {
        let dest = opts
            .processed_dir
            .join(prepared.path.file_name().unwrap_or_default());
        let moved = ingest::safe_move(&prepared.path, &dest)?;
        info!("Moved processed file to {}", moved.display());
    }

    Ok(id)
}

/// Assembles the store payload from a prepared file and a parsed reply.
/// Pure with respect to I/O, so the stub-reply path is testable end to end.
pub fn build_document(
    prepared: &PreparedFile,
    reply: &ParseReply,
    model_name: &str,
    usage: &crate::llm_client::Usage,
) -> Result<NewResumeDocument> {
    Ok(NewResumeDocument {
        file_id: prepared.file_id.clone(),
        industry_prefix: prepared.industry_prefix.clone(),
        file_size_bytes: prepared.bytes.len() as i64,
        file_hash: prepared.file_hash.clone(),
        text_excerpt: prepared.text_excerpt.clone(),
        record: to_value(&reply.resume_data)?,
        model_name: model_name.to_string(),
        usage: to_value(usage)?,
    })
}

/// Writes the raw LLM reply next to the pipeline's other artifacts.
pub fn save_raw_output(dir: &Path, file_id: &str, text: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let stamp = Local::now().format("%d-%m-%y_%H-%M");
    let path = dir.join(format!("{file_id}_{stamp}.txt"));
    std::fs::write(&path, text)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::models::ResumeRecord;
    use crate::ingest::sha256_hex;
    use crate::llm_client::Usage;

    fn prepared_fixture() -> PreparedFile {
        let bytes = b"%PDF-1.4 fixture".to_vec();
        PreparedFile {
            path: PathBuf::from("ITC-01.pdf"),
            file_id: "ITC-01".to_string(),
            industry_prefix: "ITC".to_string(),
            file_hash: sha256_hex(&bytes),
            bytes,
            text_excerpt: Some("Acme Corp Engineer".to_string()),
        }
    }

    /// The end-to-end stub contract: a reply containing a known work entry
    /// produces a document payload carrying exactly that entry.
    #[test]
    fn test_stubbed_reply_produces_exact_work_entry() {
        let stub_reply = r#"```json
{
  "resume_data": {
    "basics": {"name": null, "email": null, "phone": null, "summary": "Engineer."},
    "work_experience": [{
      "company": "Acme Corp",
      "position": "Engineer",
      "start_date": "2019-01",
      "end_date": "2021-12",
      "highlights": ["Shipped the v2 platform"]
    }]
  }
}
```"#;
        let reply: ParseReply = parse_reply(stub_reply).unwrap();
        reply.resume_data.validate().unwrap();

        let usage = Usage {
            input_tokens: 1200,
            output_tokens: 400,
        };
        let doc = build_document(&prepared_fixture(), &reply, "claude-3-5-haiku-latest", &usage)
            .unwrap();

        assert_eq!(doc.file_id, "ITC-01");
        assert_eq!(doc.industry_prefix, "ITC");
        let record: ResumeRecord = serde_json::from_value(doc.record.clone()).unwrap();
        assert_eq!(record.work_experience.len(), 1);
        let work = &record.work_experience[0];
        assert_eq!(work.company, "Acme Corp");
        assert_eq!(work.position, "Engineer");
        assert_eq!(work.start_date.as_deref(), Some("2019-01"));
        assert_eq!(work.end_date.as_deref(), Some("2021-12"));
        assert_eq!(doc.usage["output_tokens"], 400);
    }

    #[test]
    fn test_malformed_stub_reply_is_error_not_empty_record() {
        let err = parse_reply::<ParseReply>("Sorry, I cannot parse this resume.").unwrap_err();
        assert!(err.to_string().contains("No JSON object found"));
    }

    #[test]
    fn test_save_raw_output_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = save_raw_output(dir.path(), "ITC-01", "raw reply text").unwrap();
        assert!(path.file_name().unwrap().to_str().unwrap().starts_with("ITC-01_"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "raw reply text");
    }
}
