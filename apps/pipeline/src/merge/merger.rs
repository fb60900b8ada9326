//! Section Merger — Phase 2.
//!
//! Deterministic slot-budget merge of validated job skills into the
//! existing skills block. No LLM involvement: given the same artifact and
//! block, the output is always the same. Existing entries keep their order;
//! new candidates append in rank order; evictions come from the end of the
//! original list and only when the budget demands them.

use crate::changes::ChangeRecord;
use crate::extract::evidence::normalize;
use crate::extract::types::SkillsArtifact;
use crate::merge::latex::ResumeSkillsBlock;

/// Maximum entries per category line after a merge.
pub const DEFAULT_SLOT_BUDGET: usize = 10;

const REASON_PRESENT: &str = "already present";
const REASON_ADDED: &str = "relevant to job requirements";
const REASON_REMOVED: &str = "removed to make room for job-relevant skills";
const REASON_NO_BUDGET: &str = "no slot budget remaining";

/// Merges the artifact into the block under a per-category slot budget.
///
/// The input block is never mutated; the merger reasons over a copy and
/// returns the new block alongside the accumulated change record.
pub fn merge(
    artifact: &SkillsArtifact,
    block: &ResumeSkillsBlock,
    budget: usize,
) -> (ResumeSkillsBlock, ChangeRecord) {
    let mut updated = block.clone();
    let mut record = ChangeRecord::default();

    for category in block.categories() {
        let existing = block
            .skills(category)
            .cloned()
            .unwrap_or_default();
        let existing_keys: Vec<String> = existing.iter().map(|s| normalize(s)).collect();

        // Candidates for this category, highest confidence first.
        let candidates: Vec<&str> = artifact
            .candidates_for(category)
            .into_iter()
            .map(|c| c.canonical.as_str())
            .collect();
        let candidate_keys: Vec<String> = candidates.iter().map(|c| normalize(c)).collect();

        let mut new_candidates: Vec<&str> = Vec::new();
        for candidate in &candidates {
            if existing_keys.contains(&normalize(candidate)) {
                record.skipped(*candidate, category, REASON_PRESENT);
            } else if new_candidates
                .iter()
                .any(|n| normalize(n) == normalize(candidate))
            {
                // Candidate list duplicates fold silently.
            } else {
                new_candidates.push(candidate);
            }
        }

        let mut merged = existing.clone();

        // Evict from the end of the original list until the appended result
        // fits the budget. A line that starts out over budget is trimmed even
        // when there is nothing to add. Entries that are themselves surviving
        // candidates are passed over first and trimmed only if the line
        // cannot fit otherwise.
        let admissible = new_candidates.len().min(budget);
        let mut needed = (merged.len() + admissible).saturating_sub(budget);
        if needed > 0 {
            let mut keep = vec![true; merged.len()];
            for (i, entry) in merged.iter().enumerate().rev() {
                if needed == 0 {
                    break;
                }
                if !candidate_keys.contains(&normalize(entry)) {
                    keep[i] = false;
                    needed -= 1;
                }
            }
            for i in (0..merged.len()).rev() {
                if needed == 0 {
                    break;
                }
                if keep[i] {
                    keep[i] = false;
                    needed -= 1;
                }
            }
            let mut kept = Vec::with_capacity(merged.len());
            for (entry, retain) in merged.into_iter().zip(keep) {
                if retain {
                    kept.push(entry);
                } else {
                    record.removed(entry, category, REASON_REMOVED);
                }
            }
            merged = kept;
        }

        for candidate in new_candidates {
            if merged.len() < budget {
                merged.push(candidate.to_string());
                record.added(candidate, category, REASON_ADDED);
            } else {
                record.skipped(candidate, category, REASON_NO_BUDGET);
            }
        }

        updated.set_skills(category, merged);
    }

    (updated, record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::types::{SkillCandidate, SkillCategory};
    use std::collections::BTreeMap;

    fn candidate(canonical: &str, section: SkillCategory, confidence: f64) -> SkillCandidate {
        SkillCandidate {
            token: canonical.to_lowercase(),
            canonical: canonical.to_string(),
            section,
            confidence,
            evidence: vec![canonical.to_string()],
            aliases: vec![],
        }
    }

    fn artifact(candidates: Vec<SkillCandidate>) -> SkillsArtifact {
        let skills_flat = candidates.iter().map(|c| c.canonical.clone()).collect();
        SkillsArtifact {
            job_skills_ranked: candidates,
            by_section_top3: BTreeMap::new(),
            skills_flat,
        }
    }

    fn block(line: &str) -> ResumeSkillsBlock {
        ResumeSkillsBlock::parse(line)
    }

    const LANGS: SkillCategory = SkillCategory::ProgrammingLanguages;

    #[test]
    fn test_scenario_b_append_within_budget() {
        let art = artifact(vec![candidate("Python", LANGS, 0.9)]);
        let blk = block("\\textbf{Programming Languages:} Java, C++");

        let (updated, record) = merge(&art, &blk, 3);

        assert_eq!(
            updated.skills(LANGS).unwrap(),
            &vec!["Java".to_string(), "C++".to_string(), "Python".to_string()]
        );
        assert_eq!(record.added.len(), 1);
        assert_eq!(record.added[0].skill, "Python");
        assert!(record.removed.is_empty());
    }

    #[test]
    fn test_scenario_c_eviction_from_end() {
        let art = artifact(vec![candidate("Python", LANGS, 0.9)]);
        let blk = block("\\textbf{Programming Languages:} Java, C++");

        let (updated, record) = merge(&art, &blk, 2);

        assert_eq!(
            updated.skills(LANGS).unwrap(),
            &vec!["Java".to_string(), "Python".to_string()]
        );
        assert_eq!(record.added[0].skill, "Python");
        assert_eq!(record.removed.len(), 1);
        assert_eq!(record.removed[0].skill, "C++");
    }

    #[test]
    fn test_idempotent_when_all_candidates_present() {
        let art = artifact(vec![
            candidate("Java", LANGS, 0.9),
            candidate("C++", LANGS, 0.8),
        ]);
        let blk = block("\\textbf{Programming Languages:} Java, C++");

        let (updated, record) = merge(&art, &blk, 5);

        assert_eq!(updated.skills(LANGS).unwrap(), blk.skills(LANGS).unwrap());
        assert!(record.added.is_empty());
        assert!(record.removed.is_empty());
        assert_eq!(record.skipped.len(), 2);
        assert!(record.skipped.iter().all(|s| s.reason == "already present"));
    }

    #[test]
    fn test_budget_never_exceeded() {
        let art = artifact(vec![
            candidate("Python", LANGS, 0.9),
            candidate("Go", LANGS, 0.8),
            candidate("Rust", LANGS, 0.7),
        ]);
        let blk = block("\\textbf{Programming Languages:} Java, C++, Kotlin");

        for budget in 1..=6 {
            let (updated, _) = merge(&art, &blk, budget);
            assert!(updated.skills(LANGS).unwrap().len() <= budget);
        }
    }

    #[test]
    fn test_overfull_line_trimmed_down_to_budget() {
        // The source line already exceeds the budget; the merge must end at
        // the budget, not at "budget plus the pre-existing excess".
        let art = artifact(vec![candidate("Python", LANGS, 0.9)]);
        let blk = block("\\textbf{Programming Languages:} Java, C++, Kotlin");

        let (updated, record) = merge(&art, &blk, 2);

        assert_eq!(
            updated.skills(LANGS).unwrap(),
            &vec!["Java".to_string(), "Python".to_string()]
        );
        assert_eq!(record.added[0].skill, "Python");
        assert_eq!(record.removed.len(), 2);
    }

    #[test]
    fn test_overfull_line_trimmed_without_candidates() {
        let art = artifact(vec![]);
        let blk = block("\\textbf{Programming Languages:} Java, C++, Kotlin");

        let (updated, record) = merge(&art, &blk, 2);

        assert_eq!(
            updated.skills(LANGS).unwrap(),
            &vec!["Java".to_string(), "C++".to_string()]
        );
        assert!(record.added.is_empty());
        assert_eq!(record.removed.len(), 1);
        assert_eq!(record.removed[0].skill, "Kotlin");
    }

    #[test]
    fn test_overfull_line_of_candidates_still_trimmed() {
        // Every existing entry is also a candidate; the budget still wins,
        // and the trim comes from the end.
        let art = artifact(vec![
            candidate("Java", LANGS, 0.9),
            candidate("C++", LANGS, 0.8),
            candidate("Kotlin", LANGS, 0.7),
        ]);
        let blk = block("\\textbf{Programming Languages:} Java, C++, Kotlin");

        let (updated, record) = merge(&art, &blk, 2);

        assert_eq!(
            updated.skills(LANGS).unwrap(),
            &vec!["Java".to_string(), "C++".to_string()]
        );
        assert_eq!(record.removed[0].skill, "Kotlin");
    }

    #[test]
    fn test_surviving_candidate_never_evicted() {
        // Java is both existing and a candidate; with budget 2 the eviction
        // must take C++ (last non-candidate), never Java.
        let art = artifact(vec![
            candidate("Java", LANGS, 0.9),
            candidate("Python", LANGS, 0.8),
        ]);
        let blk = block("\\textbf{Programming Languages:} Java, C++");

        let (updated, record) = merge(&art, &blk, 2);

        assert_eq!(
            updated.skills(LANGS).unwrap(),
            &vec!["Java".to_string(), "Python".to_string()]
        );
        assert!(record.removed.iter().all(|r| r.skill != "Java"));
    }

    #[test]
    fn test_no_loss_without_budget_pressure() {
        let art = artifact(vec![candidate("Python", LANGS, 0.9)]);
        let blk = block("\\textbf{Programming Languages:} Java, C++, Kotlin");

        let (updated, _) = merge(&art, &blk, 10);
        let skills = updated.skills(LANGS).unwrap();
        for kept in ["Java", "C++", "Kotlin"] {
            assert!(skills.iter().any(|s| s == kept), "{kept} must survive");
        }
    }

    #[test]
    fn test_overflow_candidates_skipped_with_reason() {
        let art = artifact(vec![
            candidate("Python", LANGS, 0.9),
            candidate("Go", LANGS, 0.8),
            candidate("Rust", LANGS, 0.7),
        ]);
        let blk = block("\\textbf{Programming Languages:} Java");

        let (updated, record) = merge(&art, &blk, 2);

        // Java evicted (not a candidate), two candidates fit, one skipped.
        assert_eq!(updated.skills(LANGS).unwrap().len(), 2);
        assert!(record
            .skipped
            .iter()
            .any(|s| s.reason == "no slot budget remaining"));
    }

    #[test]
    fn test_case_insensitive_presence_check() {
        let art = artifact(vec![candidate("python", LANGS, 0.9)]);
        let blk = block("\\textbf{Programming Languages:} Python");

        let (updated, record) = merge(&art, &blk, 5);

        assert_eq!(updated.skills(LANGS).unwrap().len(), 1);
        assert!(record.added.is_empty());
        assert_eq!(record.skipped[0].reason, "already present");
    }

    #[test]
    fn test_categories_merge_independently() {
        let art = artifact(vec![
            candidate("Python", LANGS, 0.9),
            candidate("Kubernetes", SkillCategory::CloudDevOps, 0.8),
        ]);
        let blk = block(
            "\\textbf{Programming Languages:} Java\n\\textbf{Cloud \\& DevOps:} Docker",
        );

        let (updated, record) = merge(&art, &blk, 5);

        assert_eq!(
            updated.skills(LANGS).unwrap(),
            &vec!["Java".to_string(), "Python".to_string()]
        );
        assert_eq!(
            updated.skills(SkillCategory::CloudDevOps).unwrap(),
            &vec!["Docker".to_string(), "Kubernetes".to_string()]
        );
        assert_eq!(record.added.len(), 2);
    }

    #[test]
    fn test_input_block_unchanged() {
        let art = artifact(vec![candidate("Python", LANGS, 0.9)]);
        let blk = block("\\textbf{Programming Languages:} Java");
        let before = blk.serialize();

        let _ = merge(&art, &blk, 5);

        assert_eq!(blk.serialize(), before);
    }
}
