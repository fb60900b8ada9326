use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The eight fixed resume skill categories.
///
/// Every extracted candidate must map to one of these; candidates the model
/// assigns to anything else are rejected, never silently re-bucketed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum SkillCategory {
    #[serde(rename = "Programming Languages")]
    ProgrammingLanguages,
    #[serde(rename = "Frontend")]
    Frontend,
    #[serde(rename = "Backend")]
    Backend,
    #[serde(rename = "Cloud & DevOps")]
    CloudDevOps,
    #[serde(rename = "AI & LLM Tools")]
    AiLlmTools,
    #[serde(rename = "Automation & Productivity")]
    AutomationProductivity,
    #[serde(rename = "Security & Operating Systems")]
    SecurityOperatingSystems,
    #[serde(rename = "Databases")]
    Databases,
}

impl SkillCategory {
    pub const ALL: [SkillCategory; 8] = [
        SkillCategory::ProgrammingLanguages,
        SkillCategory::Frontend,
        SkillCategory::Backend,
        SkillCategory::CloudDevOps,
        SkillCategory::AiLlmTools,
        SkillCategory::AutomationProductivity,
        SkillCategory::SecurityOperatingSystems,
        SkillCategory::Databases,
    ];

    /// The display label used in artifacts and resume section headers.
    pub fn label(&self) -> &'static str {
        match self {
            SkillCategory::ProgrammingLanguages => "Programming Languages",
            SkillCategory::Frontend => "Frontend",
            SkillCategory::Backend => "Backend",
            SkillCategory::CloudDevOps => "Cloud & DevOps",
            SkillCategory::AiLlmTools => "AI & LLM Tools",
            SkillCategory::AutomationProductivity => "Automation & Productivity",
            SkillCategory::SecurityOperatingSystems => "Security & Operating Systems",
            SkillCategory::Databases => "Databases",
        }
    }
}

impl fmt::Display for SkillCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SkillCategory {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SkillCategory::ALL
            .iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or(())
    }
}

/// One extracted skill, post-validation.
///
/// Invariant: `evidence` holds at least one trimmed, case-insensitive
/// substring of the source job description. Candidates that cannot meet
/// this are dropped before the artifact is assembled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillCandidate {
    pub token: String,
    pub canonical: String,
    pub section: SkillCategory,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// The Phase-1 artifact, persisted as `jd_skills.json` and consumed by
/// Phases 2 and 3. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillsArtifact {
    /// Cleaned, deduplicated, evidence-checked candidates, ranked by
    /// confidence (ties broken by first occurrence in the job text).
    pub job_skills_ranked: Vec<SkillCandidate>,
    /// Top-N canonical names per category, N = the configured section cap.
    pub by_section_top3: BTreeMap<SkillCategory, Vec<String>>,
    /// Deduplicated union of surviving canonical names, in rank order.
    pub skills_flat: Vec<String>,
}

impl SkillsArtifact {
    /// Ranked candidates belonging to one category, rank order preserved.
    pub fn candidates_for(&self, category: SkillCategory) -> Vec<&SkillCandidate> {
        self.job_skills_ranked
            .iter()
            .filter(|c| c.section == category)
            .collect()
    }
}

/// Permissive deserialization targets for the raw model response.
/// Field absence is tolerated everywhere; sanitization decides what survives.
#[derive(Debug, Default, Deserialize)]
pub struct RawExtraction {
    #[serde(default)]
    pub job_skills_ranked: Vec<RawSkill>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawSkill {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub canonical: Option<String>,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
}
