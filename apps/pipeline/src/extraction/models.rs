//! Typed schemas for LLM-produced documents.
//!
//! Every reply crosses this boundary before storage: free-form JSON is
//! deserialized into these structs and then range/format-checked, so schema
//! drift becomes a typed error instead of a corrupt collection.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};

/// "YYYY-MM" per the study's date convention; `None` means ongoing/unknown.
pub type MonthDate = Option<String>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Location {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

/// Contact block. Name, email and phone are deliberately nulled by the
/// extraction prompt; the types stay optional so the policy is visible here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Basics {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub location: Option<Location>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkEntry {
    pub company: String,
    pub position: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_date: MonthDate,
    #[serde(default)]
    pub end_date: MonthDate,
    #[serde(default)]
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EducationEntry {
    pub institution: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub study_type: Option<String>,
    #[serde(default)]
    pub start_date: MonthDate,
    #[serde(default)]
    pub end_date: MonthDate,
    #[serde(default)]
    pub courses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkillGroup {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Certificate {
    pub name: String,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub date: MonthDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageEntry {
    pub language: String,
    #[serde(default)]
    pub fluency: Option<String>,
}

/// A standardized resume. Every list field defaults to empty: a resume with
/// no education section yields an empty `education` list, never fabricated
/// placeholder entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResumeRecord {
    #[serde(default)]
    pub basics: Basics,
    #[serde(default)]
    pub work_experience: Vec<WorkEntry>,
    #[serde(default)]
    pub volunteer: Vec<WorkEntry>,
    #[serde(default)]
    pub education: Vec<EducationEntry>,
    #[serde(default)]
    pub skills: Vec<SkillGroup>,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default)]
    pub languages: Vec<LanguageEntry>,
}

impl ResumeRecord {
    /// Deterministic boundary checks on top of deserialization.
    /// Collects every violation so one reply yields one actionable error.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();

        for (i, entry) in self.work_experience.iter().enumerate() {
            check_month(&entry.start_date, &format!("work_experience[{i}].start_date"), &mut violations);
            check_month(&entry.end_date, &format!("work_experience[{i}].end_date"), &mut violations);
            if entry.company.trim().is_empty() {
                violations.push(format!("work_experience[{i}].company is empty"));
            }
        }
        for (i, entry) in self.education.iter().enumerate() {
            check_month(&entry.start_date, &format!("education[{i}].start_date"), &mut violations);
            check_month(&entry.end_date, &format!("education[{i}].end_date"), &mut violations);
        }
        for (i, cert) in self.certificates.iter().enumerate() {
            check_month(&cert.date, &format!("certificates[{i}].date"), &mut violations);
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::schema("resume record", violations))
        }
    }

    /// Flat text used for retrieval embeddings of a standardized record:
    /// summary, roles, skill keywords and highlights.
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(summary) = self.basics.summary.as_deref() {
            parts.push(summary.to_string());
        }
        for job in &self.work_experience {
            parts.push(format!("{} at {}", job.position, job.company));
            parts.extend(job.highlights.iter().cloned());
        }
        for group in &self.skills {
            if !group.keywords.is_empty() {
                parts.push(group.keywords.join(", "));
            }
        }
        for edu in &self.education {
            let mut line = edu.institution.clone();
            if let Some(area) = edu.area.as_deref() {
                line.push_str(": ");
                line.push_str(area);
            }
            parts.push(line);
        }
        parts.join("\n")
    }

    /// Concatenated free text that treatments rephrase: summary plus work
    /// highlights. Used for embedding-based similarity checks.
    pub fn rephrased_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(summary) = self.basics.summary.as_deref() {
            parts.push(summary);
        }
        let joined: Vec<String> = self
            .work_experience
            .iter()
            .map(|job| job.highlights.join(" "))
            .filter(|s| !s.is_empty())
            .collect();
        let mut text = parts.join(" ");
        for j in &joined {
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(j);
        }
        text
    }
}

fn check_month(value: &MonthDate, field: &str, violations: &mut Vec<String>) {
    if let Some(s) = value {
        if !is_valid_month(s) {
            violations.push(format!("{field} is '{s}' (expected YYYY-MM)"));
        }
    }
}

/// Accepts "YYYY-MM" only.
pub fn is_valid_month(s: &str) -> bool {
    if s.len() != 7 {
        return false;
    }
    NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceLevel {
    Entry,
    Junior,
    Mid,
    Senior,
    Executive,
}

/// Derived analytics (EDA record) computed by the LLM from a stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMetrics {
    pub experience_level: ExperienceLevel,
    /// 1..=10 inclusive; range-checked at the boundary.
    pub quality_score: u8,
    #[serde(default)]
    pub total_experience_years: Option<f32>,
    pub has_career_gap: bool,
    #[serde(default)]
    pub has_quantified_achievements: Option<bool>,
    #[serde(default)]
    pub top_skills: Vec<String>,
    #[serde(default)]
    pub flags: Vec<String>,
}

impl KeyMetrics {
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();
        if !(1..=10).contains(&self.quality_score) {
            violations.push(format!(
                "quality_score is {} (expected 1..=10)",
                self.quality_score
            ));
        }
        if let Some(years) = self.total_experience_years {
            if !(0.0..=70.0).contains(&years) {
                violations.push(format!("total_experience_years is {years} (implausible)"));
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::schema("key metrics", violations))
        }
    }
}

/// Output of the second-pass validation agent reviewing a stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// 0..=10 conformance score.
    pub score: f64,
    #[serde(default)]
    pub flags: Vec<String>,
    #[serde(default)]
    pub corrected_record: Option<ResumeRecord>,
}

impl ValidationReport {
    pub fn validate(&self) -> Result<()> {
        if (0.0..=10.0).contains(&self.score) {
            Ok(())
        } else {
            Err(PipelineError::schema(
                "validation report",
                vec![format!("score is {} (expected 0..=10)", self.score)],
            ))
        }
    }
}

/// First-pass reply envelope: the record under its documented top-level key.
#[derive(Debug, Deserialize)]
pub struct ParseReply {
    pub resume_data: ResumeRecord,
}

/// EDA-pass reply envelope.
#[derive(Debug, Deserialize)]
pub struct EdaReply {
    pub key_metrics: KeyMetrics,
}

/// Validation-pass reply envelope.
#[derive(Debug, Deserialize)]
pub struct ValidationReply {
    pub validation: ValidationReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_record_json() -> serde_json::Value {
        json!({
            "basics": {"name": null, "email": null, "phone": null, "summary": "Engineer."},
            "work_experience": [{
                "company": "Acme Corp",
                "position": "Engineer",
                "start_date": "2019-03",
                "end_date": "2021-06",
                "highlights": ["Built the widget service"]
            }],
            "skills": [{"name": "Backend", "keywords": ["Rust", "SQL"]}]
        })
    }

    #[test]
    fn test_missing_education_deserializes_empty_not_fabricated() {
        let record: ResumeRecord = serde_json::from_value(minimal_record_json()).unwrap();
        assert!(record.education.is_empty());
        assert!(record.certificates.is_empty());
        assert!(record.languages.is_empty());
        assert!(record.volunteer.is_empty());
    }

    #[test]
    fn test_record_round_trips_field_for_field() {
        let record: ResumeRecord = serde_json::from_value(minimal_record_json()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        let back: ResumeRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_valid_record_passes_boundary_checks() {
        let record: ResumeRecord = serde_json::from_value(minimal_record_json()).unwrap();
        record.validate().unwrap();
    }

    #[test]
    fn test_freeform_date_is_schema_violation() {
        let mut value = minimal_record_json();
        value["work_experience"][0]["start_date"] = json!("March 2019");
        let record: ResumeRecord = serde_json::from_value(value).unwrap();
        let err = record.validate().unwrap_err();
        assert!(err.to_string().contains("start_date"));
    }

    #[test]
    fn test_null_end_date_means_ongoing_and_is_valid() {
        let mut value = minimal_record_json();
        value["work_experience"][0]["end_date"] = json!(null);
        let record: ResumeRecord = serde_json::from_value(value).unwrap();
        record.validate().unwrap();
        assert!(record.work_experience[0].end_date.is_none());
    }

    #[test]
    fn test_is_valid_month() {
        assert!(is_valid_month("2021-06"));
        assert!(is_valid_month("1999-12"));
        assert!(!is_valid_month("2021-13"));
        assert!(!is_valid_month("2021-6"));
        assert!(!is_valid_month("2021"));
        assert!(!is_valid_month("June 2021"));
    }

    #[test]
    fn test_quality_score_out_of_range_is_violation() {
        let metrics = KeyMetrics {
            experience_level: ExperienceLevel::Mid,
            quality_score: 11,
            total_experience_years: Some(6.0),
            has_career_gap: false,
            has_quantified_achievements: Some(true),
            top_skills: vec![],
            flags: vec![],
        };
        assert!(metrics.validate().is_err());
    }

    #[test]
    fn test_quality_score_bounds_accepted() {
        for score in [1u8, 10] {
            let metrics = KeyMetrics {
                experience_level: ExperienceLevel::Senior,
                quality_score: score,
                total_experience_years: None,
                has_career_gap: true,
                has_quantified_achievements: None,
                top_skills: vec!["Rust".into()],
                flags: vec![],
            };
            metrics.validate().unwrap();
        }
    }

    #[test]
    fn test_experience_level_snake_case_wire_format() {
        let level: ExperienceLevel = serde_json::from_value(json!("senior")).unwrap();
        assert_eq!(level, ExperienceLevel::Senior);
    }

    #[test]
    fn test_validation_report_score_range() {
        let report: ValidationReport =
            serde_json::from_value(json!({"score": 8.5, "flags": ["dates normalized"]})).unwrap();
        report.validate().unwrap();
        let bad: ValidationReport = serde_json::from_value(json!({"score": 12.0})).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_rephrased_text_joins_summary_and_highlights() {
        let record: ResumeRecord = serde_json::from_value(minimal_record_json()).unwrap();
        let text = record.rephrased_text();
        assert_eq!(text, "Engineer. Built the widget service");
    }

    #[test]
    fn test_rephrased_text_empty_record() {
        assert_eq!(ResumeRecord::default().rephrased_text(), "");
    }

    #[test]
    fn test_searchable_text_covers_roles_and_skills() {
        let record: ResumeRecord = serde_json::from_value(minimal_record_json()).unwrap();
        let text = record.searchable_text();
        assert!(text.contains("Engineer at Acme Corp"));
        assert!(text.contains("Rust, SQL"));
        assert!(text.contains("Built the widget service"));
    }

    #[test]
    fn test_parse_reply_envelope() {
        let reply: ParseReply =
            serde_json::from_value(json!({"resume_data": minimal_record_json()})).unwrap();
        assert_eq!(reply.resume_data.work_experience[0].company, "Acme Corp");
    }
}
