//! Evidence validation — the anti-hallucination gate.
//!
//! The LLM's role is to suggest skills; this module is the sole authority
//! on acceptance. A candidate survives only if at least one of its evidence
//! snippets occurs verbatim (case-insensitive, whitespace-trimmed) in the
//! job description. No stemming, no fuzzy matching.

use crate::extract::types::SkillCandidate;

/// Normalizes text for comparison: trim plus lowercase. Pure.
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Pure predicate: does any evidence snippet substantiate this candidate?
///
/// Zero evidence fails unconditionally. Deterministic for identical inputs,
/// which is what makes the pipeline reproducible given a fixed LLM response.
pub fn validate(candidate: &SkillCandidate, job_text: &str) -> bool {
    let haystack = normalize(job_text);
    candidate.evidence.iter().any(|ev| {
        let needle = normalize(ev);
        !needle.is_empty() && haystack.contains(&needle)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::types::SkillCategory;

    fn candidate(evidence: Vec<&str>) -> SkillCandidate {
        SkillCandidate {
            token: "python".to_string(),
            canonical: "Python".to_string(),
            section: SkillCategory::ProgrammingLanguages,
            confidence: 0.9,
            evidence: evidence.into_iter().map(String::from).collect(),
            aliases: vec![],
        }
    }

    const JD: &str = "Experience with Python and Kubernetes required";

    #[test]
    fn test_verbatim_evidence_passes() {
        assert!(validate(&candidate(vec!["Experience with Python"]), JD));
    }

    #[test]
    fn test_case_insensitive_match() {
        assert!(validate(&candidate(vec!["experience with PYTHON"]), JD));
    }

    #[test]
    fn test_whitespace_trimmed_before_comparison() {
        assert!(validate(&candidate(vec!["  Kubernetes required  "]), JD));
    }

    #[test]
    fn test_zero_evidence_fails_unconditionally() {
        assert!(!validate(&candidate(vec![]), JD));
    }

    #[test]
    fn test_blank_evidence_does_not_count() {
        assert!(!validate(&candidate(vec!["", "   "]), JD));
    }

    #[test]
    fn test_absent_evidence_fails() {
        assert!(!validate(&candidate(vec!["ten years of Rust"]), JD));
    }

    #[test]
    fn test_one_good_snippet_is_enough() {
        assert!(validate(
            &candidate(vec!["not in the text", "Kubernetes required"]),
            JD
        ));
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let c = candidate(vec!["Experience with Python"]);
        assert_eq!(validate(&c, JD), validate(&c, JD));
        let missing = candidate(vec!["golang"]);
        assert_eq!(validate(&missing, JD), validate(&missing, JD));
    }
}
