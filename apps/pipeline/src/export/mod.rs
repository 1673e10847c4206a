//! PDF export through the external `resumed` JSON-Resume toolchain.
//!
//! One-way and best-effort: rendering quality varies across themes, and a
//! failed render never touches the stored document.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;

use serde_json::Value;
use tokio::process::Command;
use tracing::info;

use crate::errors::{PipelineError, Result};

/// Renders one stored record to `out_path` via `resumed export`.
/// The record is written to a temp file that is removed on return.
pub async fn export_record(record: &Value, out_path: &Path, theme: &str) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut tmp = tempfile::Builder::new()
        .prefix("resume-export-")
        .suffix(".json")
        .tempfile()?;
    tmp.write_all(serde_json::to_string(record)?.as_bytes())?;
    tmp.flush()?;

    let output = Command::new("resumed")
        .arg("export")
        .arg(tmp.path())
        .arg("-o")
        .arg(out_path)
        .arg("-t")
        .arg(theme)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| PipelineError::Export(format!("failed to run resumed: {e}")))?;

    if !output.status.success() {
        return Err(PipelineError::Export(format!(
            "resumed export exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    info!("Exported PDF to {}", out_path.display());
    Ok(())
}

/// Output file name for a stored document or treated variant.
pub fn export_file_name(file_id: &str, treatment: Option<&str>) -> String {
    match treatment {
        Some(t) => format!("{file_id}_{t}.pdf"),
        None => format!("{file_id}.pdf"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name("ITC-01", None), "ITC-01.pdf");
        assert_eq!(
            export_file_name("ITC-01", Some("combined")),
            "ITC-01_combined.pdf"
        );
    }
}
