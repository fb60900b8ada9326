//! Phase 2 — merging validated job skills into the LaTeX skills block.

pub mod latex;
pub mod merger;

pub use latex::ResumeSkillsBlock;
pub use merger::{merge, DEFAULT_SLOT_BUDGET};
