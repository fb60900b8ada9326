//! Summary Tailorer — Phase 3.
//!
//! The professional summary lives between two literal marker comments in
//! the resume source; the span between them is the entire replaceable unit.
//! The tailorer asks the LLM for a subtle revision, validates structural
//! bounds, and replaces the span — everything outside the markers stays
//! byte-identical. Missing markers are fatal: there is no safe partial
//! write target. LLM failures degrade to "summary unchanged".

use std::sync::Arc;

use tracing::{info, warn};

use crate::changes::SummaryChange;
use crate::errors::PipelineError;
use crate::extract::types::SkillsArtifact;
use crate::llm_client::{ChatEndpoint, ChatMessage, GenOptions};

pub const MARKER_START: &str = "% SUMMARY_BLOCK_START";
pub const MARKER_END: &str = "% SUMMARY_BLOCK_END";

/// Guards against truncated or runaway output.
const MIN_SUMMARY_CHARS: usize = 40;
const MAX_SUMMARY_CHARS: usize = 4000;
const MAX_GROWTH_FACTOR: usize = 4;

const TAILOR_SYSTEM: &str = "You are a helpful assistant.";

const TAILOR_PROMPT_TEMPLATE: &str = r#"Original Professional Summary:
---
{original_summary}
---

Job Description Details:
---
{jd_skills}
---

Instructions:
Revise the 'Original Professional Summary' to subtly align with the 'Job Description Details'.
- Do NOT simply list the skills from the job description.
- Integrate the essence of the responsibilities and company values.
- Maintain a professional and confident tone.
- The revised summary should be a natural evolution of the original, not a complete rewrite.
- Make the changes subtle, so it's not obvious it was tailored.
- Output ONLY the revised summary text, without any preamble or explanation."#;

/// Result of Phase 3. `revised` is None when the phase degraded and the
/// summary was left as it was.
#[derive(Debug)]
pub struct TailorOutcome {
    pub revised: Option<String>,
    pub change: SummaryChange,
    pub degraded: Option<String>,
}

pub struct SummaryTailorer {
    endpoint: Arc<dyn ChatEndpoint>,
}

impl SummaryTailorer {
    pub fn new(endpoint: Arc<dyn ChatEndpoint>) -> Self {
        Self { endpoint }
    }

    pub async fn tailor(
        &self,
        resume_text: &str,
        artifact: &SkillsArtifact,
    ) -> Result<TailorOutcome, PipelineError> {
        let original = extract_summary(resume_text)?.trim().to_string();
        let skills_json = serde_json::to_string_pretty(artifact)?;
        let prompt = TAILOR_PROMPT_TEMPLATE
            .replace("{original_summary}", &original)
            .replace("{jd_skills}", &skills_json);

        info!("Requesting summary revision ({} chars)", original.len());
        let messages = [ChatMessage::system(TAILOR_SYSTEM), ChatMessage::user(prompt)];
        let response = match self.endpoint.chat(&messages, &GenOptions::creative()).await {
            Ok(text) => text,
            Err(e) => {
                let error: PipelineError = e.into();
                if !error.is_recoverable() {
                    return Err(error);
                }
                return Ok(self.unchanged(original, error.to_string()));
            }
        };

        let revised = response.trim().to_string();
        if let Err(reason) = validate_revision(&original, &revised) {
            warn!("Rejecting revised summary: {reason}");
            return Ok(self.unchanged(original, reason));
        }

        let change = SummaryChange {
            original,
            revised: revised.clone(),
            reason: "tailored to emphasize job-relevant strengths".to_string(),
        };
        Ok(TailorOutcome {
            revised: Some(revised),
            change,
            degraded: None,
        })
    }

    fn unchanged(&self, original: String, reason: String) -> TailorOutcome {
        warn!("Summary left unchanged: {reason}");
        TailorOutcome {
            revised: None,
            change: SummaryChange {
                revised: original.clone(),
                original,
                reason: "summary unchanged (degraded)".to_string(),
            },
            degraded: Some(reason),
        }
    }
}

/// Structural validation of the revised summary — a guard against
/// truncated, empty, or runaway-repetition output.
fn validate_revision(original: &str, revised: &str) -> Result<(), String> {
    if revised.is_empty() {
        return Err("revised summary is empty".to_string());
    }
    if revised.len() < MIN_SUMMARY_CHARS {
        return Err(format!(
            "revised summary too short ({} chars, minimum {MIN_SUMMARY_CHARS})",
            revised.len()
        ));
    }
    if revised.len() > MAX_SUMMARY_CHARS {
        return Err(format!(
            "revised summary too long ({} chars, maximum {MAX_SUMMARY_CHARS})",
            revised.len()
        ));
    }
    if !original.is_empty() && revised.len() > original.len() * MAX_GROWTH_FACTOR {
        return Err(format!(
            "revised summary grew beyond {MAX_GROWTH_FACTOR}x the original"
        ));
    }
    Ok(())
}

/// The text strictly between the two markers.
pub fn extract_summary(resume: &str) -> Result<&str, PipelineError> {
    let start = resume
        .find(MARKER_START)
        .ok_or(PipelineError::MarkerNotFound)?;
    let content_start = start + MARKER_START.len();
    let end_rel = resume[content_start..]
        .find(MARKER_END)
        .ok_or(PipelineError::MarkerNotFound)?;
    Ok(&resume[content_start..content_start + end_rel])
}

/// Replaces the span strictly between the markers, leaving every byte
/// outside it untouched.
pub fn replace_summary(resume: &str, revised: &str) -> Result<String, PipelineError> {
    let start = resume
        .find(MARKER_START)
        .ok_or(PipelineError::MarkerNotFound)?;
    let content_start = start + MARKER_START.len();
    let end_rel = resume[content_start..]
        .find(MARKER_END)
        .ok_or(PipelineError::MarkerNotFound)?;
    let end_marker_start = content_start + end_rel;

    Ok(format!(
        "{}\n{}\n{}",
        &resume[..content_start],
        revised.trim(),
        &resume[end_marker_start..]
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{Script, ScriptedEndpoint};
    use std::collections::BTreeMap;

    const RESUME: &str = "\\documentclass{article}\nheader text\n% SUMMARY_BLOCK_START\nSeasoned engineer with a decade of backend work.\n% SUMMARY_BLOCK_END\nfooter text\n";

    fn artifact() -> SkillsArtifact {
        SkillsArtifact {
            job_skills_ranked: vec![],
            by_section_top3: BTreeMap::new(),
            skills_flat: vec!["Python".to_string()],
        }
    }

    #[test]
    fn test_extract_summary_span() {
        let span = extract_summary(RESUME).unwrap();
        assert_eq!(span.trim(), "Seasoned engineer with a decade of backend work.");
    }

    #[test]
    fn test_extract_missing_markers_fatal() {
        let err = extract_summary("no markers at all").unwrap_err();
        assert!(matches!(err, PipelineError::MarkerNotFound));
    }

    #[test]
    fn test_replace_is_byte_identical_outside_span() {
        let out = replace_summary(RESUME, "A new summary paragraph.").unwrap();
        let marker_start = out.find(MARKER_START).unwrap();
        let prefix_end = marker_start + MARKER_START.len();
        assert_eq!(&out[..prefix_end], &RESUME[..prefix_end]);

        let out_suffix = &out[out.find(MARKER_END).unwrap()..];
        let in_suffix = &RESUME[RESUME.find(MARKER_END).unwrap()..];
        assert_eq!(out_suffix, in_suffix);
        assert!(out.contains("\nA new summary paragraph.\n"));
    }

    #[test]
    fn test_replace_missing_end_marker_fatal() {
        let err = replace_summary("% SUMMARY_BLOCK_START\ntext, no end", "x").unwrap_err();
        assert!(matches!(err, PipelineError::MarkerNotFound));
    }

    #[test]
    fn test_validate_rejects_short_output() {
        let original = "A perfectly reasonable professional summary paragraph.";
        assert!(validate_revision(original, "Too short.").is_err());
        assert!(validate_revision(original, "").is_err());
    }

    #[test]
    fn test_validate_rejects_runaway_growth() {
        let original = "Backend engineer focused on reliability and scale today.";
        let runaway = original.repeat(10);
        assert!(validate_revision(original, &runaway).is_err());
    }

    #[test]
    fn test_validate_accepts_reasonable_revision() {
        let original = "Backend engineer focused on reliability and scale today.";
        let revised = "Backend engineer focused on reliability, scale, and cloud automation.";
        assert!(validate_revision(original, revised).is_ok());
    }

    #[tokio::test]
    async fn test_tailor_happy_path() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Script::Reply(
            "Seasoned engineer with a decade of backend and platform work.".to_string(),
        )]));
        let tailorer = SummaryTailorer::new(endpoint);

        let outcome = tailorer.tailor(RESUME, &artifact()).await.unwrap();
        assert!(outcome.degraded.is_none());
        assert!(outcome.revised.unwrap().contains("platform work"));
    }

    #[tokio::test]
    async fn test_tailor_degrades_on_timeout() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Script::Timeout]));
        let tailorer = SummaryTailorer::new(endpoint);

        let outcome = tailorer.tailor(RESUME, &artifact()).await.unwrap();
        assert!(outcome.revised.is_none());
        assert!(outcome.degraded.is_some());
        assert_eq!(
            outcome.change.original.trim(),
            "Seasoned engineer with a decade of backend work."
        );
    }

    #[tokio::test]
    async fn test_tailor_degrades_on_invalid_output() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Script::Reply(
            "ok".to_string(),
        )]));
        let tailorer = SummaryTailorer::new(endpoint);

        let outcome = tailorer.tailor(RESUME, &artifact()).await.unwrap();
        assert!(outcome.revised.is_none());
        assert!(outcome.degraded.unwrap().contains("too short"));
    }

    #[tokio::test]
    async fn test_tailor_degrades_on_empty_response() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Script::Empty]));
        let tailorer = SummaryTailorer::new(endpoint);

        let outcome = tailorer.tailor(RESUME, &artifact()).await.unwrap();
        assert!(outcome.revised.is_none());
        assert!(outcome.degraded.is_some());
    }

    #[tokio::test]
    async fn test_tailor_missing_markers_fatal() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![]));
        let tailorer = SummaryTailorer::new(endpoint);

        let err = tailorer
            .tailor("resume without markers", &artifact())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MarkerNotFound));
    }

    #[tokio::test]
    async fn test_tailor_unreachable_is_fatal() {
        let endpoint = Arc::new(ScriptedEndpoint::new(vec![Script::Unreachable]));
        let tailorer = SummaryTailorer::new(endpoint);

        let err = tailorer.tailor(RESUME, &artifact()).await.unwrap_err();
        assert!(matches!(err, PipelineError::LlmUnavailable(_)));
    }
}
