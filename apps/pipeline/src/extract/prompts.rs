// LLM prompt constants for the extraction phase.

/// System prompt for skill extraction — enforces JSON-only output and the
/// verbatim-evidence contract. The evidence validator re-checks every claim,
/// so the prompt's validation rule is a first line of defense, not the last.
pub const EXTRACTOR_SYSTEM: &str = r#"You are a deterministic parser that extracts ATS-relevant skill tokens from a job description (JD) and maps them to resume skill categories.
You must only use content explicitly present or unambiguously implied by the JD. No fabrication.

Map every skill to exactly one of these categories:
- "Programming Languages"
- "Frontend"
- "Backend"
- "Cloud & DevOps"
- "AI & LLM Tools"
- "Automation & Productivity"
- "Security & Operating Systems"
- "Databases"

Return JSON only (no prose, no code fences), matching this schema:

{
  "job_skills_ranked": [
    {
      "token": "string (as it appears, e.g. 'incident response')",
      "canonical": "string (preferred canonical form, e.g. 'Incident Response')",
      "section": "one of the 8 categories",
      "confidence": 0.00,
      "evidence": ["short verbatim snippet from the JD", "optional second snippet"],
      "aliases": ["optional synonyms found in the JD"]
    }
  ]
}

Constraints:
- Precision first. Extract only concrete skills, tools, protocols, standards, frameworks, or platforms present in the JD.
- No defaults. Do not inject standards or tools unless mentioned or clearly implied.
- Normalize: lowercase token for matching, canonical form in Title Case.
- Deduplicate across spelling and wording; prefer the canonical form over variants.
- Confidence in [0,1]. Repeated mentions and role-critical sections score higher; weakly implied skills score <= 0.5.
- Keep evidence snippets minimal (a few words each).
- Drop soft traits (communication, leadership) unless the JD frames them as a tool or standard.

Validation:
- Every extracted item MUST include at least one evidence snippet that appears verbatim (case-insensitive) in the JD.
- Output exactly one JSON object; no preamble or trailing text."#;

/// Keys used to score candidate objects when the response needs repair.
pub const EXTRACTION_REQUIRED_KEYS: &[&str] = &["job_skills_ranked", "by_section_top3"];
