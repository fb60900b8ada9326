//! Audit types shared by the merge and summary phases.
//!
//! A `ChangeRecord` is written to `change_log.json` for UI/audit display
//! only — it has no effect on later phases.

use serde::{Deserialize, Serialize};

use crate::extract::types::SkillCategory;

/// One skill-level change with a human-readable reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEntry {
    pub skill: String,
    pub section: SkillCategory,
    pub reason: String,
}

/// Before/after record of a summary replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryChange {
    pub original: String,
    pub revised: String,
    pub reason: String,
}

/// Accumulated audit output of a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub added: Vec<ChangeEntry>,
    pub removed: Vec<ChangeEntry>,
    pub skipped: Vec<ChangeEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SummaryChange>,
}

impl ChangeRecord {
    pub fn added(&mut self, skill: impl Into<String>, section: SkillCategory, reason: &str) {
        self.added.push(ChangeEntry {
            skill: skill.into(),
            section,
            reason: reason.to_string(),
        });
    }

    pub fn removed(&mut self, skill: impl Into<String>, section: SkillCategory, reason: &str) {
        self.removed.push(ChangeEntry {
            skill: skill.into(),
            section,
            reason: reason.to_string(),
        });
    }

    pub fn skipped(&mut self, skill: impl Into<String>, section: SkillCategory, reason: &str) {
        self.skipped.push(ChangeEntry {
            skill: skill.into(),
            section,
            reason: reason.to_string(),
        });
    }
}
