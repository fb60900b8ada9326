//! Artifact store — persisted, checkpointed outputs of each phase.
//!
//! All writes are atomic (write to a temp file in the target directory,
//! then rename) so a concurrent reader never observes a partial artifact.
//! Control characters are stripped from text artifacts before writing,
//! since stray ones break LaTeX recompilation.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::errors::PipelineError;
use crate::extract::types::SkillsArtifact;

pub const SKILLS_ARTIFACT: &str = "jd_skills.json";
pub const CHANGE_LOG: &str = "change_log.json";
pub const SKILLS_BLOCK: &str = "skills_updated_block.tex";
pub const SUMMARY_OUTPUT: &str = "summary_editor_output.json";
pub const SUMMARY_BLOCK: &str = "summary_updated_block.tex";

pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<(), PipelineError> {
        let body = serde_json::to_string_pretty(value)?;
        atomic_write(&self.path(name), body.as_bytes())
    }

    pub fn write_text(&self, name: &str, content: &str) -> Result<(), PipelineError> {
        let cleaned = clean_control_chars(content);
        atomic_write(&self.path(name), cleaned.as_bytes())
    }

    pub fn write_skills_artifact(&self, artifact: &SkillsArtifact) -> Result<(), PipelineError> {
        self.write_json(SKILLS_ARTIFACT, artifact)
    }

    /// Removes an artifact if present.
    pub fn remove(&self, name: &str) -> Result<(), PipelineError> {
        match std::fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Loads the persisted Phase-1 artifact, if any. A corrupt file is
    /// treated as absent so a bad checkpoint cannot poison a fallback.
    pub fn load_skills_artifact(&self) -> Result<Option<SkillsArtifact>, PipelineError> {
        let path = self.path(SKILLS_ARTIFACT);
        if !path.exists() {
            return Ok(None);
        }
        let body = std::fs::read_to_string(&path)?;
        match serde_json::from_str(&body) {
            Ok(artifact) => Ok(Some(artifact)),
            Err(e) => {
                warn!("Ignoring unreadable skills artifact at {path:?}: {e}");
                Ok(None)
            }
        }
    }
}

/// Atomic write for files outside the artifact directory (the live resume
/// sources). The temp file lives next to the target so the rename stays on
/// one filesystem.
pub fn write_file_atomic(path: &Path, content: &str) -> Result<(), PipelineError> {
    let cleaned = clean_control_chars(content);
    atomic_write(path, cleaned.as_bytes())
}

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| PipelineError::Io(e.error))?;
    Ok(())
}

/// Drops control characters except tab, newline, and carriage return.
pub fn clean_control_chars(content: &str) -> String {
    content
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect()
}
