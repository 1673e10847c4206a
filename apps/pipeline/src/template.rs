//! Prompt template loading.
//!
//! Prompt templates live in markdown files. The prompt body is the content of
//! a single triple-backtick fenced block; everything outside the fence is
//! documentation for the prompt author. Zero or multiple fenced blocks are
//! rejected with a typed error rather than guessed at.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Failed to read template {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("No fenced prompt block found in {} (expected one ``` ... ``` block)", .0.display())]
    NoFencedBlock(PathBuf),

    #[error("Found {found} fenced blocks in {} (expected exactly one)", .path.display())]
    MultipleFencedBlocks { path: PathBuf, found: usize },

    #[error("Placeholder {{{name}}} does not occur in template {}", .path.display())]
    MissingPlaceholder { path: PathBuf, name: String },
}

/// A prompt template with named `{placeholder}` slots.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    path: PathBuf,
    body: String,
}

impl PromptTemplate {
    /// Loads a template from a markdown file, extracting the single fenced block.
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let body = extract_fenced_block(&content, path)?;
        Ok(Self {
            path: path.to_path_buf(),
            body,
        })
    }

    /// Builds a template from an in-memory string (tests and defaults).
    pub fn from_str(name: &str, content: &str) -> Result<Self, TemplateError> {
        let path = PathBuf::from(name);
        let body = extract_fenced_block(content, &path)?;
        Ok(Self { path, body })
    }

    /// Substitutes each `(name, value)` pair into its `{name}` slot.
    /// A variable whose placeholder does not occur in the body is a typed
    /// error: it means the template and the caller disagree on the contract.
    pub fn render(&self, vars: &[(&str, &str)]) -> Result<String, TemplateError> {
        let mut out = self.body.clone();
        for (name, value) in vars {
            let placeholder = format!("{{{name}}}");
            if !out.contains(&placeholder) {
                return Err(TemplateError::MissingPlaceholder {
                    path: self.path.clone(),
                    name: (*name).to_string(),
                });
            }
            out = out.replace(&placeholder, value);
        }
        Ok(out)
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

/// Extracts the content of exactly one ``` fenced block.
fn extract_fenced_block(content: &str, path: &Path) -> Result<String, TemplateError> {
    let mut blocks: Vec<String> = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            match current.take() {
                Some(lines) => blocks.push(lines.join("\n")),
                None => current = Some(Vec::new()),
            }
            continue;
        }
        if let Some(lines) = current.as_mut() {
            lines.push(line);
        }
    }

    // An unterminated fence is treated as no block at all.
    match blocks.len() {
        0 => Err(TemplateError::NoFencedBlock(path.to_path_buf())),
        1 => Ok(blocks.remove(0)),
        found => Err(TemplateError::MultipleFencedBlocks {
            path: path.to_path_buf(),
            found,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_single_fenced_block() {
        let md = "# Parsing prompt\n\nNotes for editors.\n\n```\nExtract the resume as JSON.\nDates are {date_format}.\n```\n";
        let t = PromptTemplate::from_str("parse.md", md).unwrap();
        assert!(t.body().starts_with("Extract the resume"));
        assert!(t.body().contains("{date_format}"));
    }

    #[test]
    fn test_no_fenced_block_is_error() {
        let err = PromptTemplate::from_str("empty.md", "just prose, no fence").unwrap_err();
        assert!(matches!(err, TemplateError::NoFencedBlock(_)));
    }

    #[test]
    fn test_multiple_fenced_blocks_is_error() {
        let md = "```\nfirst\n```\ntext\n```\nsecond\n```\n";
        let err = PromptTemplate::from_str("two.md", md).unwrap_err();
        match err {
            TemplateError::MultipleFencedBlocks { found, .. } => assert_eq!(found, 2),
            other => panic!("expected MultipleFencedBlocks, got {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_fence_is_error() {
        let err = PromptTemplate::from_str("open.md", "```\nnever closed").unwrap_err();
        assert!(matches!(err, TemplateError::NoFencedBlock(_)));
    }

    #[test]
    fn test_render_substitutes_placeholders() {
        let md = "```\nResume:\n{resume_json}\nStyle: {style}\n```";
        let t = PromptTemplate::from_str("t.md", md).unwrap();
        let out = t
            .render(&[("resume_json", "{\"work\":[]}"), ("style", "concise")])
            .unwrap();
        assert!(out.contains("{\"work\":[]}"));
        assert!(out.contains("Style: concise"));
        assert!(!out.contains("{resume_json}"));
    }

    #[test]
    fn test_render_missing_placeholder_is_error() {
        let t = PromptTemplate::from_str("t.md", "```\nno slots here\n```").unwrap();
        let err = t.render(&[("resume_json", "{}")]).unwrap_err();
        assert!(matches!(err, TemplateError::MissingPlaceholder { .. }));
    }

    #[test]
    fn test_render_leaves_json_braces_alone() {
        // Literal JSON examples in the prompt body must survive rendering.
        let md = "```\nReturn {\"resume_data\": {...}} for {file_kind} input.\n```";
        let t = PromptTemplate::from_str("t.md", md).unwrap();
        let out = t.render(&[("file_kind", "PDF")]).unwrap();
        assert!(out.contains("{\"resume_data\": {...}}"));
        assert!(out.contains("PDF input"));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompt.md");
        std::fs::write(&path, "intro\n```\nbody {x}\n```\n").unwrap();
        let t = PromptTemplate::load(&path).unwrap();
        assert_eq!(t.render(&[("x", "1")]).unwrap(), "body 1");
    }
}
