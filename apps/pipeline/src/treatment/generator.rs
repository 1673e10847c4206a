//! Treatment generation — orchestrates the per-resume variant pipeline.
//!
//! Flow: fetch control → refine (strip North American entries) → company-name
//! swap → draw treatments → for each of the four variants: inject, rephrase
//! via LLM, similarity-gate, persist.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use serde_json::to_value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::{PipelineError, Result};
use crate::extraction::models::{ParseReply, ResumeRecord};
use crate::state::PipelineState;
use crate::store::models::NewTreatedResume;
use crate::template::PromptTemplate;
use crate::treatment::models::{swap_companies, TreatmentKind, TreatmentPools};
use crate::treatment::prompts::{
    company_research_system, control_refiner_system, treatment_system, STYLE_MODIFIERS,
};
use crate::treatment::similarity::{focused_similarity, SIMILARITY_THRESHOLD};

/// Rephrase retries per variant when similarity falls below the threshold.
const MAX_REPHRASE_RETRIES: usize = 2;

/// The three prompt templates the pass needs.
#[derive(Clone)]
pub struct TreatmentTemplates {
    pub treatment: PromptTemplate,
    pub control_refiner: PromptTemplate,
    pub company_research: PromptTemplate,
}

#[derive(Debug, Deserialize)]
struct CompanyResearchReply {
    replacements: BTreeMap<String, String>,
}

/// Outcome of one resume's treatment run. A variant failure does not abort
/// the remaining variants.
#[derive(Debug, Default)]
pub struct TreatmentSummary {
    pub stored: Vec<(TreatmentKind, Uuid, f32)>,
    pub failed: Vec<(TreatmentKind, String)>,
}

/// Generates and stores the four variants for one control resume.
pub async fn generate_for_resume(
    state: &PipelineState,
    templates: &TreatmentTemplates,
    pools: &TreatmentPools,
    file_id: &str,
) -> Result<TreatmentSummary> {
    let doc = state
        .store
        .get_by_file_id(file_id)
        .await?
        .ok_or_else(|| PipelineError::NotFound(format!("document {file_id}")))?;
    let base: ResumeRecord = serde_json::from_value(doc.record)?;

    // 1. Control refinement: strip North American entries.
    let refined = refine_control(state, templates, &base).await?;

    // 2. Company-name swap on the refined control.
    let mut control = refined;
    let company_map = research_companies(state, templates, &control).await?;
    swap_companies(&mut control, &company_map);

    // 3. Draw this resume's treatment sample.
    let mut rng = StdRng::from_entropy();
    let drawn = pools.draw(&mut rng);
    let control_text = control.rephrased_text();
    if control_text.is_empty() {
        return Err(PipelineError::schema(
            format!("control resume {file_id}"),
            vec!["no summary or highlights to rephrase".to_string()],
        ));
    }

    let company_map_value = to_value(&company_map)?;
    let mut summary = TreatmentSummary::default();

    // 4. Generate, gate and persist each variant.
    for kind in TreatmentKind::ALL {
        let input = drawn.apply(kind, &control);
        let mut style_order: Vec<&'static str> = STYLE_MODIFIERS.to_vec();
        style_order.shuffle(&mut rng);

        match rephrase_with_gate(state, templates, &input, &control_text, &style_order).await {
            Ok((record, similarity, style, usage)) => {
                let injected = drawn.ids_for(kind);
                let stored = NewTreatedResume {
                    source_file_id: file_id.to_string(),
                    treatment: kind.as_str().to_string(),
                    record: to_value(&record)?,
                    similarity: Some(similarity),
                    style_modifier: Some(style.to_string()),
                    injected: if injected.is_empty() {
                        None
                    } else {
                        Some(to_value(&injected)?)
                    },
                    company_map: Some(company_map_value.clone()),
                    model_name: state.llm_treatment.model().to_string(),
                    usage: to_value(&usage)?,
                };
                let id = state.store.insert_treated(&stored).await?;
                summary.stored.push((kind, id, similarity));
            }
            Err(e) => {
                warn!(
                    "Variant {} of {} failed: {e}",
                    kind.as_str(),
                    file_id
                );
                summary.failed.push((kind, e.to_string()));
            }
        }
    }

    info!(
        "Treatments for {}: {} stored, {} failed",
        file_id,
        summary.stored.len(),
        summary.failed.len()
    );
    Ok(summary)
}

async fn refine_control(
    state: &PipelineState,
    templates: &TreatmentTemplates,
    base: &ResumeRecord,
) -> Result<ResumeRecord> {
    let resume_json = serde_json::to_string_pretty(base)?;
    let prompt = templates
        .control_refiner
        .render(&[("resume_json", resume_json.as_str())])?;
    let (reply, _usage): (ParseReply, _) = state
        .llm_treatment
        .call_json(&prompt, &control_refiner_system())
        .await?;
    reply.resume_data.validate()?;
    Ok(reply.resume_data)
}

async fn research_companies(
    state: &PipelineState,
    templates: &TreatmentTemplates,
    control: &ResumeRecord,
) -> Result<BTreeMap<String, String>> {
    if control.work_experience.is_empty() {
        return Ok(BTreeMap::new());
    }
    let companies: Vec<&str> = control
        .work_experience
        .iter()
        .map(|j| j.company.as_str())
        .collect();
    let companies_json = serde_json::to_string(&companies)?;
    let prompt = templates
        .company_research
        .render(&[("companies_json", companies_json.as_str())])?;
    let (reply, _usage): (CompanyResearchReply, _) = state
        .llm_treatment
        .call_json(&prompt, &company_research_system())
        .await?;
    Ok(reply.replacements)
}

/// Rephrases one variant, retrying with a different style modifier while the
/// similarity gate fails. Returns the accepted record, its similarity, the
/// style used and the accepting call's token usage.
async fn rephrase_with_gate(
    state: &PipelineState,
    templates: &TreatmentTemplates,
    input: &ResumeRecord,
    control_text: &str,
    style_order: &[&'static str],
) -> Result<(ResumeRecord, f32, &'static str, crate::llm_client::Usage)> {
    let cache = state.embeddings()?;
    let resume_json = serde_json::to_string_pretty(input)?;
    let mut last_similarity = 0.0_f32;

    for attempt in 0..=MAX_REPHRASE_RETRIES {
        // style_order is a shuffle of STYLE_MODIFIERS, so indexing wraps
        // safely and every retry phrases differently.
        let style = style_order[attempt % style_order.len()];

        let prompt = templates.treatment.render(&[
            ("resume_json", resume_json.as_str()),
            ("style_modifier", style),
        ])?;
        let (reply, usage): (ParseReply, _) = state
            .llm_treatment
            .call_json(&prompt, &treatment_system())
            .await?;
        reply.resume_data.validate()?;

        let treated_text = reply.resume_data.rephrased_text();
        let similarity = focused_similarity(cache, control_text, &treated_text).await?;
        if similarity >= SIMILARITY_THRESHOLD {
            return Ok((reply.resume_data, similarity, style, usage));
        }

        last_similarity = similarity;
        warn!(
            "Rephrasing attempt {}/{} below similarity threshold ({:.2} < {:.2}), retrying",
            attempt + 1,
            MAX_REPHRASE_RETRIES + 1,
            similarity,
            SIMILARITY_THRESHOLD
        );
    }

    Err(PipelineError::Treatment(format!(
        "rephrasing stayed below similarity threshold after {} attempts (last {:.2})",
        MAX_REPHRASE_RETRIES + 1,
        last_similarity
    )))
}
