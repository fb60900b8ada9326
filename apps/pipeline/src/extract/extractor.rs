//! Skill Extractor — drives the Phase-1 LLM call and distills the response
//! into a validated, deduplicated, ranked `SkillsArtifact`.
//!
//! Flow: render prompt → await full response (no streaming) → repair-parse →
//! evidence-validate each candidate → dedupe by canonical → rank → cap per
//! section → persist. On timeout or malformed output, a previously persisted
//! artifact is reused and the outcome is reported as degraded.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::artifacts::ArtifactStore;
use crate::errors::PipelineError;
use crate::extract::evidence;
use crate::extract::prompts::{EXTRACTION_REQUIRED_KEYS, EXTRACTOR_SYSTEM};
use crate::extract::types::{RawExtraction, RawSkill, SkillCandidate, SkillCategory, SkillsArtifact};
use crate::llm_client::{repair, ChatEndpoint, ChatMessage, GenOptions};

/// Per-category cap for `by_section_top3`.
pub const DEFAULT_SECTION_CAP: usize = 3;

/// Evidence snippets kept per raw candidate; minimal snippets are enough
/// to substantiate a skill and keep the artifact compact.
const MAX_EVIDENCE: usize = 2;
const MAX_ALIASES: usize = 3;

/// Result of Phase 1. `degraded` carries the reason when a previous
/// artifact was substituted for a fresh extraction.
#[derive(Debug)]
pub struct ExtractionOutcome {
    pub artifact: SkillsArtifact,
    pub degraded: Option<String>,
}

pub struct SkillExtractor {
    endpoint: Arc<dyn ChatEndpoint>,
    section_cap: usize,
}

impl SkillExtractor {
    pub fn new(endpoint: Arc<dyn ChatEndpoint>, section_cap: usize) -> Self {
        Self {
            endpoint,
            section_cap,
        }
    }

    pub async fn extract(
        &self,
        job_text: &str,
        store: &ArtifactStore,
    ) -> Result<ExtractionOutcome, PipelineError> {
        let messages = [
            ChatMessage::system(EXTRACTOR_SYSTEM),
            ChatMessage::user(job_text),
        ];

        info!("Requesting skill extraction ({} JD chars)", job_text.len());
        let raw = match self
            .endpoint
            .chat(&messages, &GenOptions::deterministic())
            .await
        {
            Ok(raw) => raw,
            Err(e) => return self.fall_back(store, e.into()),
        };

        let value = match repair::coerce_json(&raw, EXTRACTION_REQUIRED_KEYS) {
            Ok(value) => value,
            Err(e) => {
                return self.fall_back(store, PipelineError::MalformedResponse(e.to_string()))
            }
        };
        let parsed: RawExtraction = match serde_json::from_value(value) {
            Ok(parsed) => parsed,
            Err(e) => {
                return self.fall_back(store, PipelineError::MalformedResponse(e.to_string()))
            }
        };

        let artifact = build_artifact(parsed.job_skills_ranked, job_text, self.section_cap);
        info!(
            "Extraction kept {} validated skills",
            artifact.job_skills_ranked.len()
        );
        store.write_skills_artifact(&artifact)?;

        Ok(ExtractionOutcome {
            artifact,
            degraded: None,
        })
    }

    /// Graceful degradation: reuse the previous artifact for recoverable
    /// failures. The substitution is reported, never silent.
    fn fall_back(
        &self,
        store: &ArtifactStore,
        error: PipelineError,
    ) -> Result<ExtractionOutcome, PipelineError> {
        if !error.is_recoverable() {
            return Err(error);
        }
        match store.load_skills_artifact() {
            Ok(Some(artifact)) => {
                warn!("Extraction degraded, reusing previous artifact: {error}");
                Ok(ExtractionOutcome {
                    artifact,
                    degraded: Some(error.to_string()),
                })
            }
            _ => Err(error),
        }
    }
}

/// Distills raw model candidates into the final artifact. Pure.
///
/// Steps: canonical fallback to token → typo normalization → category
/// mapping (unmapped rejected) → evidence validation → dedupe by normalized
/// canonical (merging evidence/aliases, keeping the higher-confidence
/// entry's fields) → rank by confidence desc, tie-break by first occurrence
/// position in the job text → per-section cap.
pub fn build_artifact(
    raw: Vec<RawSkill>,
    job_text: &str,
    section_cap: usize,
) -> SkillsArtifact {
    let haystack = evidence::normalize(job_text);

    let mut merged: Vec<SkillCandidate> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for raw_skill in raw {
        let canonical = raw_skill
            .canonical
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| raw_skill.token.clone());
        let canonical = fix_common_typos(canonical);
        let key = evidence::normalize(&canonical);
        if key.is_empty() {
            continue;
        }
        let Ok(section) = raw_skill.section.parse::<SkillCategory>() else {
            // Unmapped categories are rejected, not silently bucketed.
            continue;
        };

        let candidate = SkillCandidate {
            token: raw_skill.token,
            canonical,
            section,
            confidence: raw_skill.confidence.clamp(0.0, 1.0),
            evidence: raw_skill.evidence.into_iter().take(MAX_EVIDENCE).collect(),
            aliases: raw_skill.aliases.into_iter().take(MAX_ALIASES).collect(),
        };
        if !evidence::validate(&candidate, job_text) {
            continue;
        }

        match index.get(&key) {
            Some(&i) => merge_duplicate(&mut merged[i], candidate),
            None => {
                index.insert(key, merged.len());
                merged.push(candidate);
            }
        }
    }

    // Rank: confidence descending, ties broken by where the skill first
    // appears in the job text.
    let mut ranked: Vec<(usize, SkillCandidate)> = merged
        .into_iter()
        .map(|c| (first_occurrence(&c, &haystack), c))
        .collect();
    ranked.sort_by(|(pos_a, a), (pos_b, b)| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| pos_a.cmp(pos_b))
    });
    let ranked: Vec<SkillCandidate> = ranked.into_iter().map(|(_, c)| c).collect();

    let mut by_section: BTreeMap<SkillCategory, Vec<String>> = SkillCategory::ALL
        .iter()
        .map(|&c| (c, Vec::new()))
        .collect();
    for candidate in &ranked {
        let slot = by_section
            .get_mut(&candidate.section)
            .expect("all categories pre-seeded");
        if slot.len() < section_cap {
            slot.push(candidate.canonical.clone());
        }
    }

    let skills_flat = ranked.iter().map(|c| c.canonical.clone()).collect();

    SkillsArtifact {
        job_skills_ranked: ranked,
        by_section_top3: by_section,
        skills_flat,
    }
}

/// Folds a duplicate candidate into the existing entry: evidence and
/// aliases union; the higher-confidence entry's other fields win.
fn merge_duplicate(existing: &mut SkillCandidate, duplicate: SkillCandidate) {
    if duplicate.confidence > existing.confidence {
        existing.token = duplicate.token;
        existing.canonical = duplicate.canonical;
        existing.section = duplicate.section;
        existing.confidence = duplicate.confidence;
    }
    for ev in duplicate.evidence {
        if !existing
            .evidence
            .iter()
            .any(|e| evidence::normalize(e) == evidence::normalize(&ev))
        {
            existing.evidence.push(ev);
        }
    }
    for alias in duplicate.aliases {
        if !existing
            .aliases
            .iter()
            .any(|a| evidence::normalize(a) == evidence::normalize(&alias))
        {
            existing.aliases.push(alias);
        }
    }
}

/// Earliest position of any evidence snippet in the normalized job text.
fn first_occurrence(candidate: &SkillCandidate, haystack: &str) -> usize {
    candidate
        .evidence
        .iter()
        .filter_map(|ev| haystack.find(&evidence::normalize(ev)))
        .min()
        .unwrap_or(usize::MAX)
}

/// Canonical-name typo fixes observed in model output.
fn fix_common_typos(canonical: String) -> String {
    if evidence::normalize(&canonical) == "seim" {
        "SIEM".to_string()
    } else {
        canonical
    }
}
