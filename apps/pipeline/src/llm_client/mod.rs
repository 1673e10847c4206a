/// LLM Client — the single point of entry for all Claude API calls in the
/// pipeline.
///
/// ARCHITECTURAL RULE: No other module may call the Anthropic API directly.
/// All LLM interactions MUST go through this module.
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 8192;
const MAX_RETRIES: u32 = 3;

/// Fast model for the first-pass resume extraction and the validation agent.
pub const EXTRACTION_MODEL: &str = "claude-3-5-haiku-latest";
/// Stronger model for derived analytics and treatment generation.
pub const ANALYSIS_MODEL: &str = "claude-sonnet-4-5";

const DEFAULT_TEMPERATURE: f32 = 0.4;

/// How much raw LLM text to keep inside an error for manual inspection.
const RAW_EXCERPT_LEN: usize = 500;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {message}; raw reply begins: {raw_excerpt}")]
    Parse {
        message: String,
        raw_excerpt: String,
    },

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("No JSON object found in LLM reply; raw reply begins: {raw_excerpt}")]
    NoJsonFound { raw_excerpt: String },

    #[error("Ambiguous LLM reply: {found} fenced blocks (expected one)")]
    AmbiguousJson { found: usize },
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    Document { source: DocumentSource },
}

#[derive(Debug, Serialize)]
struct DocumentSource {
    #[serde(rename = "type")]
    kind: &'static str,
    media_type: &'static str,
    data: String,
}

impl DocumentSource {
    fn pdf(bytes: &[u8]) -> Self {
        Self {
            kind: "base64",
            media_type: "application/pdf",
            data: BASE64.encode(bytes),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub content: Vec<ContentBlock>,
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

/// Token usage for one call; persisted alongside each stored document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl LlmResponse {
    /// Extracts the text content from the first text block.
    pub fn text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|b| b.block_type == "text")
            .and_then(|b| b.text.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

/// The single LLM client used by every pipeline pass.
/// Wraps the Anthropic Messages API with retry logic and structured output
/// helpers. Construct one per pass via `with_model` so each pass's model and
/// temperature are explicit in the wiring, not buried in call sites.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl LlmClient {
    pub fn new(api_key: String, model: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            model: model.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    /// Derives a client for another pass; the underlying HTTP client is shared.
    pub fn with_model(&self, model: &str) -> Self {
        Self {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            model: model.to_string(),
            temperature: self.temperature,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Makes a text-only call, returning the full response object.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        self.send(
            vec![ContentPart::Text {
                text: prompt.to_string(),
            }],
            system,
        )
        .await
    }

    /// Sends a PDF as a document block together with the prompt. This replaces
    /// a separate upload step: the document travels inline with the request,
    /// so there is no remote file lifecycle to clean up afterwards.
    pub async fn call_with_document(
        &self,
        prompt: &str,
        system: &str,
        pdf_bytes: &[u8],
    ) -> Result<LlmResponse, LlmError> {
        self.send(
            vec![
                ContentPart::Document {
                    source: DocumentSource::pdf(pdf_bytes),
                },
                ContentPart::Text {
                    text: prompt.to_string(),
                },
            ],
            system,
        )
        .await
    }

    /// Raw call with retry on 429 (rate limit) and 5xx errors, with
    /// exponential backoff.
    async fn send(
        &self,
        content: Vec<ContentPart>,
        system: &str,
    ) -> Result<LlmResponse, LlmError> {
        let request_body = AnthropicRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            temperature: self.temperature,
            system: system.to_string(),
            messages: vec![AnthropicMessage {
                role: "user",
                content,
            }],
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<AnthropicError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await.map_err(LlmError::Http)?;

            debug!(
                "LLM call succeeded: model={}, input_tokens={}, output_tokens={}",
                self.model, llm_response.usage.input_tokens, llm_response.usage.output_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// Calls the LLM and parses the reply as a typed JSON value.
    /// The prompt must instruct the model to return a single JSON object.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<(T, Usage), LlmError> {
        let response = self.call(prompt, system).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let parsed = parse_reply(text)?;
        Ok((parsed, response.usage))
    }

    /// Document-attached variant of `call_json`.
    pub async fn call_json_with_document<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
        pdf_bytes: &[u8],
    ) -> Result<(T, Usage), LlmError> {
        let response = self.call_with_document(prompt, system, pdf_bytes).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let parsed = parse_reply(text)?;
        Ok((parsed, response.usage))
    }
}

/// Extracts the single JSON object from an LLM reply and deserializes it.
pub fn parse_reply<T: DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let value = extract_json(text)?;
    serde_json::from_value(value).map_err(|e| LlmError::Parse {
        message: e.to_string(),
        raw_excerpt: excerpt(text),
    })
}

/// Strict JSON extraction from an LLM reply.
///
/// Accepted shapes, in order:
/// 1. The whole (trimmed) reply is a JSON object or array.
/// 2. The reply contains exactly one ``` fenced block (optionally tagged
///    `json`) whose content is valid JSON.
///
/// Zero fenced blocks in a non-JSON reply and multiple fenced blocks are both
/// typed errors — extraction never silently returns an empty structure.
pub fn extract_json(text: &str) -> Result<serde_json::Value, LlmError> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| LlmError::Parse {
            message: e.to_string(),
            raw_excerpt: excerpt(text),
        });
    }

    let blocks = fenced_blocks(trimmed);
    match blocks.len() {
        0 => Err(LlmError::NoJsonFound {
            raw_excerpt: excerpt(text),
        }),
        1 => {
            let content = blocks[0].strip_prefix("json").unwrap_or(blocks[0]).trim();
            serde_json::from_str(content).map_err(|e| LlmError::Parse {
                message: e.to_string(),
                raw_excerpt: excerpt(text),
            })
        }
        found => Err(LlmError::AmbiguousJson { found }),
    }
}

/// Returns the content between each pair of ``` fences. An unterminated
/// trailing fence is ignored.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        match after_open.find("```") {
            Some(close) => {
                blocks.push(after_open[..close].trim());
                rest = &after_open[close + 3..];
            }
            None => break,
        }
    }
    blocks
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.len() <= RAW_EXCERPT_LEN {
        trimmed.to_string()
    } else {
        let mut end = RAW_EXCERPT_LEN;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_bare_json() {
        let value = extract_json("  {\"key\": \"value\"}  ").unwrap();
        assert_eq!(value, json!({"key": "value"}));
    }

    #[test]
    fn test_extract_single_fenced_block_with_json_tag() {
        let text = "Here is the result:\n```json\n{\"key\": \"value\"}\n```\n";
        let value = extract_json(text).unwrap();
        assert_eq!(value, json!({"key": "value"}));
    }

    #[test]
    fn test_extract_single_fenced_block_without_tag() {
        let text = "```\n{\"n\": 1}\n```";
        assert_eq!(extract_json(text).unwrap(), json!({"n": 1}));
    }

    #[test]
    fn test_extracted_block_equals_direct_parse() {
        let inner = r#"{"work": [{"company": "Acme Corp", "position": "Engineer"}]}"#;
        let text = format!("Some commentary.\n```json\n{inner}\n```");
        let value = extract_json(&text).unwrap();
        let direct: serde_json::Value = serde_json::from_str(inner).unwrap();
        assert_eq!(value, direct);
    }

    #[test]
    fn test_no_json_is_typed_error() {
        let err = extract_json("I could not process this resume, sorry.").unwrap_err();
        assert!(matches!(err, LlmError::NoJsonFound { .. }));
    }

    #[test]
    fn test_multiple_fenced_blocks_is_typed_error() {
        let text = "```json\n{}\n```\nand also\n```json\n{\"a\": 1}\n```";
        let err = extract_json(text).unwrap_err();
        match err {
            LlmError::AmbiguousJson { found } => assert_eq!(found, 2),
            other => panic!("expected AmbiguousJson, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_json_in_fence_preserves_raw_excerpt() {
        let err = extract_json("```json\n{not valid\n```").unwrap_err();
        match err {
            LlmError::Parse { raw_excerpt, .. } => assert!(raw_excerpt.contains("not valid")),
            other => panic!("expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_reply_typed() {
        #[derive(serde::Deserialize)]
        struct Reply {
            score: u8,
        }
        let reply: Reply = parse_reply("```json\n{\"score\": 7}\n```").unwrap();
        assert_eq!(reply.score, 7);
    }

    #[test]
    fn test_excerpt_truncates_long_text() {
        let long = "x".repeat(2000);
        let e = excerpt(&long);
        assert!(e.len() < 600);
        assert!(e.ends_with("..."));
    }

    #[test]
    fn test_document_source_is_base64_pdf() {
        let source = DocumentSource::pdf(b"%PDF-1.4");
        assert_eq!(source.kind, "base64");
        assert_eq!(source.media_type, "application/pdf");
        assert_eq!(BASE64.decode(&source.data).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_content_part_serialization_shape() {
        let part = ContentPart::Document {
            source: DocumentSource::pdf(b"%PDF"),
        };
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["type"], "document");
        assert_eq!(value["source"]["type"], "base64");
        assert_eq!(value["source"]["media_type"], "application/pdf");
    }
}
