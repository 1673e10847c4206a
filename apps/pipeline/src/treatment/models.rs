//! Treatment specifications and pools.

use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::errors::{PipelineError, Result};
use crate::extraction::models::ResumeRecord;

/// The four variants generated per control resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentKind {
    Control,
    EducationCredential,
    WorkExperience,
    Combined,
}

impl TreatmentKind {
    pub const ALL: [TreatmentKind; 4] = [
        TreatmentKind::Control,
        TreatmentKind::EducationCredential,
        TreatmentKind::WorkExperience,
        TreatmentKind::Combined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TreatmentKind::Control => "control",
            TreatmentKind::EducationCredential => "education_credential",
            TreatmentKind::WorkExperience => "work_experience",
            TreatmentKind::Combined => "combined",
        }
    }

    pub fn injects_education(&self) -> bool {
        matches!(self, TreatmentKind::EducationCredential | TreatmentKind::Combined)
    }

    pub fn injects_work(&self) -> bool {
        matches!(self, TreatmentKind::WorkExperience | TreatmentKind::Combined)
    }
}

/// A Canadian education credential to inject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationTreatment {
    pub id: String,
    pub sector: String,
    pub institution: String,
    pub credential: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// A Canadian work-experience entry to inject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkTreatment {
    pub id: String,
    pub sector: String,
    pub company: String,
    pub position: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
}

/// Sector-filtered treatment pools loaded from the experiment's data file.
#[derive(Debug, Clone, Deserialize)]
pub struct TreatmentPools {
    pub education: Vec<EducationTreatment>,
    pub work: Vec<WorkTreatment>,
}

/// How many entries of each pool a resume draws.
const DRAW_PER_POOL: usize = 2;

impl TreatmentPools {
    /// Loads pools from JSON and filters to `sector` (case-insensitive).
    /// An empty filtered pool is a configuration error, not an empty batch.
    pub fn load(path: &Path, sector: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let all: TreatmentPools = serde_json::from_str(&content)?;
        let sector_upper = sector.trim().to_uppercase();

        let education: Vec<_> = all
            .education
            .into_iter()
            .filter(|t| t.sector.to_uppercase() == sector_upper)
            .collect();
        let work: Vec<_> = all
            .work
            .into_iter()
            .filter(|t| t.sector.to_uppercase() == sector_upper)
            .collect();

        if education.is_empty() || work.is_empty() {
            return Err(PipelineError::Configuration(format!(
                "treatment file {} has no entries for sector {sector_upper} \
                 (education: {}, work: {})",
                path.display(),
                education.len(),
                work.len()
            )));
        }
        Ok(Self { education, work })
    }

    /// Draws the per-resume treatment sample.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> DrawnTreatments {
        DrawnTreatments {
            education: self
                .education
                .choose_multiple(rng, DRAW_PER_POOL.min(self.education.len()))
                .cloned()
                .collect(),
            work: self
                .work
                .choose_multiple(rng, DRAW_PER_POOL.min(self.work.len()))
                .cloned()
                .collect(),
        }
    }
}

/// The sample applied to one resume's treated variants.
#[derive(Debug, Clone, Serialize)]
pub struct DrawnTreatments {
    pub education: Vec<EducationTreatment>,
    pub work: Vec<WorkTreatment>,
}

impl DrawnTreatments {
    /// Applies the draws for `kind` to a copy of the control record.
    pub fn apply(&self, kind: TreatmentKind, control: &ResumeRecord) -> ResumeRecord {
        let mut record = control.clone();
        if kind.injects_education() {
            inject_education(&mut record, &self.education);
        }
        if kind.injects_work() {
            inject_work(&mut record, &self.work);
        }
        record
    }

    /// Treatment ids carried on the stored variant for audit.
    pub fn ids_for(&self, kind: TreatmentKind) -> Vec<String> {
        let mut ids = Vec::new();
        if kind.injects_education() {
            ids.extend(self.education.iter().map(|t| t.id.clone()));
        }
        if kind.injects_work() {
            ids.extend(self.work.iter().map(|t| t.id.clone()));
        }
        ids
    }
}

fn inject_education(record: &mut ResumeRecord, treatments: &[EducationTreatment]) {
    for t in treatments {
        record.education.insert(
            0,
            crate::extraction::models::EducationEntry {
                institution: t.institution.clone(),
                area: t.area.clone(),
                study_type: Some(t.credential.clone()),
                start_date: t.start_date.clone(),
                end_date: t.end_date.clone(),
                courses: Vec::new(),
            },
        );
    }
}

fn inject_work(record: &mut ResumeRecord, treatments: &[WorkTreatment]) {
    for t in treatments {
        record.work_experience.insert(
            0,
            crate::extraction::models::WorkEntry {
                company: t.company.clone(),
                position: t.position.clone(),
                location: t.location.clone(),
                start_date: t.start_date.clone(),
                end_date: t.end_date.clone(),
                highlights: t.highlights.clone(),
            },
        );
    }
}

/// Swaps company names in work entries per the research mapping. Entries not
/// in the mapping are untouched.
pub fn swap_companies(
    record: &mut ResumeRecord,
    mapping: &std::collections::BTreeMap<String, String>,
) {
    for job in &mut record.work_experience {
        if let Some(replacement) = mapping.get(&job.company) {
            job.company = replacement.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    fn control_record() -> ResumeRecord {
        serde_json::from_value(json!({
            "basics": {"summary": "Engineer."},
            "work_experience": [{
                "company": "Acme Corp",
                "position": "Engineer",
                "start_date": "2019-01",
                "end_date": "2021-12",
                "highlights": ["Did things"]
            }],
            "education": [{"institution": "State University"}]
        }))
        .unwrap()
    }

    fn pools() -> TreatmentPools {
        serde_json::from_value(json!({
            "education": [
                {"id": "cec-1", "sector": "ITC", "institution": "Seneca College",
                 "credential": "Postgraduate Certificate", "area": "Cloud Computing",
                 "start_date": "2021-09", "end_date": "2022-08"},
                {"id": "cec-2", "sector": "ITC", "institution": "UBC",
                 "credential": "Certificate", "area": "Software Engineering"}
            ],
            "work": [
                {"id": "cwe-1", "sector": "ITC", "company": "Maple Analytics",
                 "position": "Developer", "location": "Toronto, ON",
                 "start_date": "2022-01", "end_date": "2023-01",
                 "highlights": ["Maintained data services"]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_control_variant_injects_nothing() {
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = pools().draw(&mut rng);
        let control = control_record();
        let variant = drawn.apply(TreatmentKind::Control, &control);
        assert_eq!(variant, control);
        assert!(drawn.ids_for(TreatmentKind::Control).is_empty());
    }

    #[test]
    fn test_education_variant_prepends_credentials() {
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = pools().draw(&mut rng);
        let variant = drawn.apply(TreatmentKind::EducationCredential, &control_record());
        assert_eq!(variant.education.len(), 3);
        // Injected entries precede the original.
        assert_ne!(variant.education[0].institution, "State University");
        assert_eq!(variant.education[2].institution, "State University");
        // Work history untouched.
        assert_eq!(variant.work_experience.len(), 1);
    }

    #[test]
    fn test_combined_variant_injects_both() {
        let mut rng = StdRng::seed_from_u64(7);
        let drawn = pools().draw(&mut rng);
        let variant = drawn.apply(TreatmentKind::Combined, &control_record());
        assert_eq!(variant.education.len(), 3);
        assert_eq!(variant.work_experience.len(), 2);
        assert_eq!(variant.work_experience[0].company, "Maple Analytics");
        let ids = drawn.ids_for(TreatmentKind::Combined);
        assert!(ids.contains(&"cwe-1".to_string()));
    }

    #[test]
    fn test_swap_companies_only_touches_mapped_entries() {
        let mut record = control_record();
        let mut mapping = std::collections::BTreeMap::new();
        mapping.insert("Acme Corp".to_string(), "Apex Industries".to_string());
        mapping.insert("Unused Co".to_string(), "Nobody".to_string());
        swap_companies(&mut record, &mapping);
        assert_eq!(record.work_experience[0].company, "Apex Industries");
    }

    #[test]
    fn test_pools_load_filters_by_sector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("treatments.json");
        std::fs::write(
            &path,
            serde_json::to_string(&json!({
                "education": [
                    {"id": "a", "sector": "ITC", "institution": "X", "credential": "Cert"},
                    {"id": "b", "sector": "FIN", "institution": "Y", "credential": "Cert"}
                ],
                "work": [
                    {"id": "c", "sector": "itc", "company": "Z", "position": "Dev"}
                ]
            }))
            .unwrap(),
        )
        .unwrap();

        let pools = TreatmentPools::load(&path, "itc").unwrap();
        assert_eq!(pools.education.len(), 1);
        assert_eq!(pools.work.len(), 1);

        let err = TreatmentPools::load(&path, "HRC").unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn test_treatment_kind_wire_names() {
        assert_eq!(TreatmentKind::EducationCredential.as_str(), "education_credential");
        let k: TreatmentKind = serde_json::from_value(json!("combined")).unwrap();
        assert_eq!(k, TreatmentKind::Combined);
    }
}
