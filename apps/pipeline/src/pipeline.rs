//! Pipeline coordinator — runs the three phases strictly in sequence.
//!
//! Phase 1 extracts and validates job skills, Phase 2 merges them into the
//! LaTeX skills block, Phase 3 tailors the summary. Each phase persists its
//! artifacts before the next begins, so a failed run can resume from the
//! last checkpoint with `run_from`. A phase failure halts the run; later
//! phases never execute against a broken predecessor.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::artifacts::{
    self, ArtifactStore, CHANGE_LOG, SKILLS_BLOCK, SUMMARY_BLOCK, SUMMARY_OUTPUT,
};
use crate::changes::ChangeRecord;
use crate::errors::{Phase, PipelineError, PipelineFailure};
use crate::extract::extractor::SkillExtractor;
use crate::extract::types::SkillsArtifact;
use crate::llm_client::ChatEndpoint;
use crate::merge::latex::splice_into_resume;
use crate::merge::{merge, ResumeSkillsBlock};
use crate::summary::{replace_summary, SummaryTailorer};

/// Observable pipeline state, reported into the task registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    ExtractingSkills,
    MergingSkills,
    TailoringSummary,
    Done,
    Failed { phase: Phase, reason: String },
}

/// What the run is allowed to write.
///
/// Artifacts are always written; the live `.tex` sources are only touched
/// in `Full` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    Full,
    ArtifactsOnly,
    DryRun,
}

impl WriteMode {
    fn touches_live_files(self) -> bool {
        matches!(self, WriteMode::Full)
    }
}

/// Input and output paths for one run.
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub jd: PathBuf,
    pub skills: PathBuf,
    pub resume: PathBuf,
}

#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub state: PipelineState,
    pub changes: ChangeRecord,
    /// One entry per phase that completed in degraded form.
    pub degradations: Vec<String>,
}

type ProgressFn = Box<dyn Fn(PipelineState) + Send + Sync>;

pub struct Pipeline {
    endpoint: Arc<dyn ChatEndpoint>,
    store: ArtifactStore,
    paths: PipelinePaths,
    mode: WriteMode,
    section_cap: usize,
    slot_budget: usize,
    clean_stale: bool,
    on_progress: Option<ProgressFn>,
}

impl Pipeline {
    pub fn new(
        endpoint: Arc<dyn ChatEndpoint>,
        store: ArtifactStore,
        paths: PipelinePaths,
        mode: WriteMode,
        section_cap: usize,
        slot_budget: usize,
    ) -> Self {
        Self {
            endpoint,
            store,
            paths,
            mode,
            section_cap,
            slot_budget,
            clean_stale: true,
            on_progress: None,
        }
    }

    /// Registers an observer invoked at every state transition, so a
    /// poll-based caller can follow the run phase by phase.
    pub fn on_progress(mut self, f: impl Fn(PipelineState) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    fn progress(&self, state: PipelineState) {
        if let Some(observer) = &self.on_progress {
            observer(state);
        }
    }

    /// Keeps derived artifacts from earlier runs instead of removing them
    /// up front. The Phase-1 checkpoint is never cleaned either way.
    pub fn keep_stale_artifacts(mut self) -> Self {
        self.clean_stale = false;
        self
    }

    pub async fn run(&self) -> Result<PipelineReport, PipelineFailure> {
        self.run_from(Phase::ExtractSkills).await
    }

    /// Resumes from the given phase. Phases before it must have left their
    /// artifacts behind; a missing checkpoint fails immediately.
    pub async fn run_from(&self, start: Phase) -> Result<PipelineReport, PipelineFailure> {
        if self.clean_stale {
            // Derived outputs from an earlier run must not be mistaken for
            // this run's results. The jd_skills.json checkpoint stays: the
            // extractor's fallback depends on it.
            for name in [SKILLS_BLOCK, CHANGE_LOG, SUMMARY_OUTPUT, SUMMARY_BLOCK] {
                self.store
                    .remove(name)
                    .map_err(|error| PipelineFailure { phase: start, error })?;
            }
        }

        let mut degradations = Vec::new();

        let artifact = if start == Phase::ExtractSkills {
            self.progress(PipelineState::ExtractingSkills);
            let outcome = self.extract_phase().await?;
            if let Some(reason) = outcome.1 {
                degradations.push(format!("skill extraction degraded: {reason}"));
            }
            outcome.0
        } else {
            self.load_checkpoint()
                .map_err(|error| PipelineFailure { phase: start, error })?
        };

        let mut changes = if start != Phase::TailorSummary {
            self.progress(PipelineState::MergingSkills);
            self.merge_phase(&artifact)?
        } else {
            ChangeRecord::default()
        };

        self.progress(PipelineState::TailoringSummary);
        let summary_degraded = self.summary_phase(&artifact, &mut changes).await?;
        if let Some(reason) = summary_degraded {
            degradations.push(format!("summary tailoring degraded: {reason}"));
        }

        self.store
            .write_json(CHANGE_LOG, &changes)
            .map_err(|error| PipelineFailure {
                phase: Phase::TailorSummary,
                error,
            })?;

        info!(
            "Pipeline complete: {} added, {} removed, {} skipped, {} degradations",
            changes.added.len(),
            changes.removed.len(),
            changes.skipped.len(),
            degradations.len()
        );
        self.progress(PipelineState::Done);
        Ok(PipelineReport {
            state: PipelineState::Done,
            changes,
            degradations,
        })
    }

    fn load_checkpoint(&self) -> Result<SkillsArtifact, PipelineError> {
        self.store.load_skills_artifact()?.ok_or_else(|| {
            PipelineError::MissingArtifact(
                "no persisted skills artifact; run the extraction phase first".to_string(),
            )
        })
    }

    async fn extract_phase(&self) -> Result<(SkillsArtifact, Option<String>), PipelineFailure> {
        let phase = Phase::ExtractSkills;
        info!("Phase 1/3: {phase}");
        let fail = |error: PipelineError| PipelineFailure { phase, error };

        let job_text = std::fs::read_to_string(&self.paths.jd)
            .map_err(PipelineError::from)
            .map_err(fail)?;
        let extractor = SkillExtractor::new(Arc::clone(&self.endpoint), self.section_cap);
        let outcome = extractor.extract(&job_text, &self.store).await.map_err(fail)?;
        Ok((outcome.artifact, outcome.degraded))
    }

    fn merge_phase(&self, artifact: &SkillsArtifact) -> Result<ChangeRecord, PipelineFailure> {
        let phase = Phase::MergeSkills;
        info!("Phase 2/3: {phase}");
        let fail = |error: PipelineError| PipelineFailure { phase, error };

        let skills_text = std::fs::read_to_string(&self.paths.skills)
            .map_err(PipelineError::from)
            .map_err(fail)?;
        let block = ResumeSkillsBlock::parse(&skills_text);
        let (updated, changes) = merge(artifact, &block, self.slot_budget);
        let rendered = updated.serialize();

        self.store.write_text(SKILLS_BLOCK, &rendered).map_err(fail)?;
        self.store.write_json(CHANGE_LOG, &changes).map_err(fail)?;

        if self.mode.touches_live_files() {
            artifacts::write_file_atomic(&self.paths.skills, &rendered).map_err(fail)?;

            let resume_text = std::fs::read_to_string(&self.paths.resume)
                .map_err(PipelineError::from)
                .map_err(fail)?;
            let spliced = splice_into_resume(&resume_text, &rendered).map_err(fail)?;
            artifacts::write_file_atomic(&self.paths.resume, &spliced).map_err(fail)?;
        }

        Ok(changes)
    }

    /// Phase 3. Reads the resume fresh from disk so it sees Phase 2's
    /// splice in Full mode. Returns the degradation reason, if any.
    async fn summary_phase(
        &self,
        artifact: &SkillsArtifact,
        changes: &mut ChangeRecord,
    ) -> Result<Option<String>, PipelineFailure> {
        let phase = Phase::TailorSummary;
        info!("Phase 3/3: {phase}");
        let fail = |error: PipelineError| PipelineFailure { phase, error };

        let resume_text = std::fs::read_to_string(&self.paths.resume)
            .map_err(PipelineError::from)
            .map_err(fail)?;
        let tailorer = SummaryTailorer::new(Arc::clone(&self.endpoint));
        let outcome = tailorer.tailor(&resume_text, artifact).await.map_err(fail)?;

        self.store
            .write_json(SUMMARY_OUTPUT, &outcome.change)
            .map_err(fail)?;
        self.store
            .write_text(SUMMARY_BLOCK, &outcome.change.revised)
            .map_err(fail)?;
        changes.summary = Some(outcome.change.clone());

        if let Some(revised) = &outcome.revised {
            if self.mode.touches_live_files() {
                let updated = replace_summary(&resume_text, revised).map_err(fail)?;
                artifacts::write_file_atomic(&self.paths.resume, &updated).map_err(fail)?;
            }
        }

        Ok(outcome.degraded)
    }
}
