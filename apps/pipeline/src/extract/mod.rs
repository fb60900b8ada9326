//! Phase 1 — skill extraction from a job description.

pub mod evidence;
pub mod extractor;
pub mod prompts;
pub mod types;

pub use extractor::{ExtractionOutcome, SkillExtractor};
pub use types::{SkillCandidate, SkillCategory, SkillsArtifact};
