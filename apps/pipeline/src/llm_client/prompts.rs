// Shared prompt constants and prompt-building utilities.
// Each pass that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction appended to every extraction prompt: missing sections
/// stay empty. The study's non-hallucination contract depends on this.
pub const NO_FABRICATION_INSTRUCTION: &str = "\
    CRITICAL: Extract only what the document actually contains. \
    If a section (education, certificates, languages, volunteer work) is absent, \
    return an empty list for it. \
    NEVER invent placeholder entries, estimate missing dates, or fill in \
    'typical' values. Absent data is represented as null or an empty list.";

/// Instruction enforcing the PII policy: identifying fields are nulled so the
/// shared collection carries no personal contact data.
pub const PII_NULLING_INSTRUCTION: &str = "\
    CRITICAL: Set basics.name, basics.email and basics.phone to null in the \
    output regardless of what the document contains. Keep city and region; \
    drop street addresses.";
