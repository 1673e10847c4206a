// Extraction pass system prompts. The user-facing prompt bodies live in
// prompts/*.md and are maintained by the research team; these constants pin
// the output contract the code depends on.

use crate::llm_client::prompts::{
    JSON_ONLY_SYSTEM, NO_FABRICATION_INSTRUCTION, PII_NULLING_INSTRUCTION,
};

pub const RESUME_PARSE_SYSTEM_CORE: &str = "\
    You are a precise resume data extractor for a labor-market study. \
    Read the attached resume document and emit one JSON object with a single \
    top-level key 'resume_data' following the schema in the prompt. \
    Dates use 'YYYY-MM'; an ongoing position has end_date null.";

pub const EDA_SYSTEM_CORE: &str = "\
    You are a labor-market analyst. Given a standardized resume JSON, emit \
    one JSON object with a single top-level key 'key_metrics' containing the \
    derived analytics requested in the prompt. quality_score is an integer \
    from 1 to 10. Base every flag on the provided data only.";

pub const VALIDATION_SYSTEM_CORE: &str = "\
    You are a meticulous reviewer of structured resume data. Given a \
    standardized resume JSON, emit one JSON object with a single top-level \
    key 'validation' scoring schema conformance from 0 to 10 and listing \
    flags for every deviation you find. Do not rewrite the record unless a \
    field is unambiguously wrong; put fixes under 'corrected_record'.";

pub fn resume_parse_system() -> String {
    format!("{RESUME_PARSE_SYSTEM_CORE} {JSON_ONLY_SYSTEM} {NO_FABRICATION_INSTRUCTION} {PII_NULLING_INSTRUCTION}")
}

pub fn eda_system() -> String {
    format!("{EDA_SYSTEM_CORE} {JSON_ONLY_SYSTEM}")
}

pub fn validation_system() -> String {
    format!("{VALIDATION_SYSTEM_CORE} {JSON_ONLY_SYSTEM}")
}
