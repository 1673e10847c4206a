//! Local folder ingestion.
//!
//! Input is a flat directory of PDF resumes; Word documents are converted to
//! PDF through LibreOffice before processing, with the original archived.
//! File identity is the stem; the industry prefix is the leading token of the
//! study's naming convention ("ITC-01.pdf", "HRC resume 10.pdf").

use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::Local;
use sha2::{Digest, Sha256};
use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::{PipelineError, Result};

/// How much extracted text to keep on the stored document for inspection.
const EXCERPT_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Pdf,
    Docx,
}

/// A file discovered in the input directory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
    pub file_id: String,
    pub industry_prefix: String,
}

/// A source file ready for the LLM: always a PDF, bytes in memory.
#[derive(Debug)]
pub struct PreparedFile {
    pub path: PathBuf,
    pub file_id: String,
    pub industry_prefix: String,
    pub bytes: Vec<u8>,
    pub file_hash: String,
    pub text_excerpt: Option<String>,
}

/// Lists processable files in `dir` (non-recursive). Unsupported extensions
/// are skipped with a warning; only that item is affected.
pub fn scan_input_dir(dir: &Path) -> Result<Vec<SourceFile>> {
    if !dir.is_dir() {
        return Err(PipelineError::NotFound(format!(
            "input directory {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    for path in entries {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        let kind = match ext.as_deref() {
            Some("pdf") => SourceKind::Pdf,
            Some("docx") => SourceKind::Docx,
            _ => {
                warn!("Skipping unsupported file: {}", path.display());
                continue;
            }
        };
        let file_id = match path.file_stem().and_then(|s| s.to_str()) {
            Some(stem) => stem.to_string(),
            None => {
                warn!("Skipping file with unreadable name: {}", path.display());
                continue;
            }
        };
        let industry_prefix = industry_prefix(&file_id);
        files.push(SourceFile {
            path,
            kind,
            file_id,
            industry_prefix,
        });
    }

    info!("Found {} processable files in {}", files.len(), dir.display());
    Ok(files)
}

/// Leading token of the file name under the study's naming convention.
pub fn industry_prefix(file_id: &str) -> String {
    file_id
        .split([' ', '-', '_'])
        .next()
        .unwrap_or(file_id)
        .to_uppercase()
}

/// Converts DOCX inputs, archives originals, reads bytes, hashes, and pulls a
/// text excerpt for the stored document.
pub async fn prepare(file: SourceFile, archive_dir: &Path) -> Result<PreparedFile> {
    let pdf_path = match file.kind {
        SourceKind::Pdf => file.path.clone(),
        SourceKind::Docx => {
            let converted = convert_docx_to_pdf(&file.path).await?;
            std::fs::create_dir_all(archive_dir)?;
            let archived = safe_move(
                &file.path,
                &archive_dir.join(file.path.file_name().unwrap_or_default()),
            )?;
            info!("Archived original DOCX to {}", archived.display());
            converted
        }
    };

    let bytes = std::fs::read(&pdf_path)?;
    let file_hash = sha256_hex(&bytes);

    // Scanned resumes have no text layer; that only degrades the excerpt.
    let text_excerpt = match pdf_extract::extract_text(&pdf_path) {
        Ok(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(truncate_chars(trimmed, EXCERPT_LEN))
            }
        }
        Err(e) => {
            warn!(
                "Could not extract text from {}: {e}",
                pdf_path.display()
            );
            None
        }
    };

    Ok(PreparedFile {
        path: pdf_path,
        file_id: file.file_id,
        industry_prefix: file.industry_prefix,
        bytes,
        file_hash,
        text_excerpt,
    })
}

/// Runs LibreOffice headless to produce a sibling PDF.
pub async fn convert_docx_to_pdf(docx_path: &Path) -> Result<PathBuf> {
    let out_dir = docx_path
        .parent()
        .ok_or_else(|| PipelineError::Conversion("input file has no parent directory".into()))?;

    info!("Converting {} to PDF...", docx_path.display());
    let output = Command::new("soffice")
        .arg("--headless")
        .arg("--convert-to")
        .arg("pdf")
        .arg("--outdir")
        .arg(out_dir)
        .arg(docx_path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| PipelineError::Conversion(format!("failed to run soffice: {e}")))?;

    if !output.status.success() {
        return Err(PipelineError::Conversion(format!(
            "soffice exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let pdf_path = docx_path.with_extension("pdf");
    if !pdf_path.exists() {
        return Err(PipelineError::Conversion(format!(
            "expected converted file at {}",
            pdf_path.display()
        )));
    }
    Ok(pdf_path)
}

/// Moves `src` to `dst`, appending a timestamp suffix if `dst` exists.
pub fn safe_move(src: &Path, dst: &Path) -> Result<PathBuf> {
    let target = if dst.exists() {
        let stem = dst
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("file")
            .to_string();
        let ext = dst
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        dst.with_file_name(format!("{stem}_{stamp}{ext}"))
    } else {
        dst.to_path_buf()
    };

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // rename fails across filesystems; fall back to copy+remove.
    match std::fs::rename(src, &target) {
        Ok(()) => {}
        Err(_) => {
            std::fs::copy(src, &target)?;
            std::fs::remove_file(src)?;
        }
    }
    Ok(target)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_industry_prefix_variants() {
        assert_eq!(industry_prefix("ITC-01"), "ITC");
        assert_eq!(industry_prefix("HRC resume 10"), "HRC");
        assert_eq!(industry_prefix("fin_04"), "FIN");
        assert_eq!(industry_prefix("plain"), "PLAIN");
    }

    #[test]
    fn test_scan_skips_unsupported_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"%PDF").unwrap();
        std::fs::write(dir.path().join("b.docx"), b"PK").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let files = scan_input_dir(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].file_id, "a");
        assert_eq!(files[0].kind, SourceKind::Pdf);
        assert_eq!(files[1].kind, SourceKind::Docx);
    }

    #[test]
    fn test_scan_missing_dir_is_not_found() {
        let err = scan_input_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[test]
    fn test_safe_move_plain() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.pdf");
        std::fs::write(&src, b"data").unwrap();
        let dst = dir.path().join("out/dst.pdf");

        let moved = safe_move(&src, &dst).unwrap();
        assert_eq!(moved, dst);
        assert!(!src.exists());
        assert_eq!(std::fs::read(&moved).unwrap(), b"data");
    }

    #[test]
    fn test_safe_move_collision_gets_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.pdf");
        std::fs::write(&src, b"new").unwrap();
        let dst = dir.path().join("dst.pdf");
        std::fs::write(&dst, b"old").unwrap();

        let moved = safe_move(&src, &dst).unwrap();
        assert_ne!(moved, dst);
        assert_eq!(std::fs::read(&dst).unwrap(), b"old");
        assert_eq!(std::fs::read(&moved).unwrap(), b"new");
        let name = moved.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("dst_") && name.ends_with(".pdf"));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 5), "héllo");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }
}
