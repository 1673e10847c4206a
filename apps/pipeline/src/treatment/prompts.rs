// Treatment pass system prompts and rephrasing style modifiers.
// User-facing prompt bodies live in prompts/*.md.

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;

pub const TREATMENT_SYSTEM_CORE: &str = "\
    You rewrite resume prose for a research study. Rephrase the summary and \
    work highlights of the given resume JSON without changing facts, dates, \
    employers, skills or any injected entries. Emit one JSON object with a \
    single top-level key 'resume_data' in the same schema as the input.";

pub const CONTROL_REFINER_SYSTEM_CORE: &str = "\
    You prepare control resumes for a correspondence study. Remove North \
    American work experience and education entries from the given resume \
    JSON, keeping everything else intact. Emit one JSON object with a single \
    top-level key 'resume_data' in the same schema as the input.";

pub const COMPANY_RESEARCH_SYSTEM_CORE: &str = "\
    You suggest plausible same-sector, same-size replacement company names \
    for the employers in a resume, to reduce detection risk in a mailing \
    experiment. Emit one JSON object with a single top-level key \
    'replacements' mapping each original company name to a replacement.";

pub fn treatment_system() -> String {
    format!("{TREATMENT_SYSTEM_CORE} {JSON_ONLY_SYSTEM}")
}

pub fn control_refiner_system() -> String {
    format!("{CONTROL_REFINER_SYSTEM_CORE} {JSON_ONLY_SYSTEM}")
}

pub fn company_research_system() -> String {
    format!("{COMPANY_RESEARCH_SYSTEM_CORE} {JSON_ONLY_SYSTEM}")
}

/// Rotated across variants so the four rephrasings of one resume differ in
/// texture, not just content.
pub const STYLE_MODIFIERS: [&str; 5] = [
    "using strong, action-oriented verbs and focusing on quantifiable outcomes",
    "using a direct, concise, and professional tone, prioritizing clarity and brevity",
    "by emphasizing collaborative efforts and cross-functional teamwork",
    "by describing the technical aspects of the work with more precision and detail",
    "by framing the accomplishments as a narrative of challenges, actions, and results",
];
