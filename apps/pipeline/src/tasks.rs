//! In-process task registry for background pipeline runs.
//!
//! Each submitted run gets a UUID-keyed record that survives until the
//! retention window expires. State transitions are one-way: a terminal
//! record never changes again, and cancellation only applies to tasks
//! that have not started.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::Phase;
use crate::pipeline::{Pipeline, PipelineState};

/// How long finished records stay queryable.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub task_type: String,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: Option<PipelineState>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl TaskRecord {
    fn new(task_type: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.to_string(),
            state: TaskState::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            progress: None,
            result: None,
            error: None,
        }
    }
}

pub struct TaskRegistry {
    tasks: Mutex<HashMap<Uuid, TaskRecord>>,
    retention: Duration,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl TaskRegistry {
    pub fn new(retention: Duration) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            retention,
        }
    }

    pub fn create(&self, task_type: &str) -> Uuid {
        let record = TaskRecord::new(task_type);
        let id = record.id;
        self.lock().insert(id, record);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<TaskRecord> {
        self.lock().get(&id).cloned()
    }

    pub fn mark_running(&self, id: Uuid) {
        self.update(id, |record| {
            record.state = TaskState::Running;
            record.started_at = Some(Utc::now());
        });
    }

    pub fn set_progress(&self, id: Uuid, progress: PipelineState) {
        self.update(id, |record| record.progress = Some(progress));
    }

    pub fn complete(&self, id: Uuid, result: serde_json::Value) {
        self.update(id, |record| {
            record.state = TaskState::Completed;
            record.completed_at = Some(Utc::now());
            record.result = Some(result);
        });
    }

    pub fn fail(&self, id: Uuid, reason: String) {
        self.update(id, |record| {
            record.state = TaskState::Failed;
            record.completed_at = Some(Utc::now());
            record.error = Some(reason);
        });
    }

    /// Cancels a task that has not started. Running and terminal tasks are
    /// left alone; returns whether the cancellation took effect.
    pub fn cancel(&self, id: Uuid) -> bool {
        let mut tasks = self.lock();
        match tasks.get_mut(&id) {
            Some(record) if record.state == TaskState::Pending => {
                record.state = TaskState::Cancelled;
                record.completed_at = Some(Utc::now());
                true
            }
            _ => false,
        }
    }

    /// Drops terminal records older than the retention window.
    pub fn cleanup_expired(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.retention).unwrap_or(chrono::Duration::zero());
        let mut tasks = self.lock();
        let before = tasks.len();
        tasks.retain(|_, record| {
            !(record.state.is_terminal()
                && record.completed_at.map(|t| t < cutoff).unwrap_or(false))
        });
        before - tasks.len()
    }

    fn update(&self, id: Uuid, f: impl FnOnce(&mut TaskRecord)) {
        if let Some(record) = self.lock().get_mut(&id) {
            f(record);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, TaskRecord>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Runs a pipeline in the background, tracking it in the registry.
/// Returns the task id and the join handle immediately.
pub fn spawn_pipeline(
    registry: Arc<TaskRegistry>,
    pipeline: Pipeline,
    start: Phase,
) -> (Uuid, tokio::task::JoinHandle<()>) {
    let id = registry.create("jd_pipeline");
    registry.set_progress(id, PipelineState::Idle);

    // Every coordinator state transition lands in the task record, so a
    // poll-based caller sees which phase is running.
    let progress_registry = Arc::clone(&registry);
    let pipeline = pipeline.on_progress(move |state| progress_registry.set_progress(id, state));

    let handle = tokio::spawn(async move {
        if registry.get(id).map(|r| r.state) != Some(TaskState::Pending) {
            return;
        }
        registry.mark_running(id);

        match pipeline.run_from(start).await {
            Ok(report) => {
                match serde_json::to_value(&report) {
                    Ok(value) => registry.complete(id, value),
                    Err(e) => registry.fail(id, format!("report serialization failed: {e}")),
                }
                info!("Task {id} completed");
            }
            Err(failure) => {
                registry.set_progress(
                    id,
                    PipelineState::Failed {
                        phase: failure.phase,
                        reason: failure.error.to_string(),
                    },
                );
                error!("Task {id} failed: {failure}");
                registry.fail(id, failure.to_string());
            }
        }
    });
    (id, handle)
}
