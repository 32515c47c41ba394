use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Suffix marking an input key as optional. An optional input may remain
/// absent without failing [`Task::has_required_inputs`].
pub const OPTIONAL_INPUT_SUFFIX: char = '?';

/// Status of a task within a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet attempted (or reset for another attempt).
    Pending,
    /// Currently executing.
    InProgress,
    /// Finished successfully; outputs are recorded.
    Completed,
    /// Failed terminally for this attempt.
    Failed,
}

/// A named unit of work with dynamic input/output bags, a status, and retry
/// bookkeeping.
///
/// `inputs` maps declared input keys to optionally-resolved values; a key
/// ending in `?` is optional. `outputs` stays empty until the task reaches
/// [`TaskStatus::Completed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: Uuid,
    /// Name used for input mapping and executor lookup.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Current status.
    pub status: TaskStatus,
    /// Declared inputs; `None` means not yet resolved.
    pub inputs: HashMap<String, Option<Value>>,
    /// Recorded outputs, populated only on successful completion.
    pub outputs: HashMap<String, Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Set only when the task reaches a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// Number of retries consumed so far.
    pub retry_count: u32,
    /// Maximum number of retries before a failure becomes terminal.
    pub max_retries: u32,
}

impl Task {
    /// Creates a pending task with no inputs and no retries.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            status: TaskStatus::Pending,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            created_at: Utc::now(),
            completed_at: None,
            retry_count: 0,
            max_retries: 0,
        }
    }

    /// Declares an unresolved input key. A trailing `?` marks it optional.
    pub fn with_input(mut self, key: impl Into<String>) -> Self {
        self.inputs.insert(key.into(), None);
        self
    }

    /// Declares an input key with a pre-resolved value.
    pub fn with_input_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.inputs.insert(key.into(), Some(value));
        self
    }

    /// Sets the retry budget.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Resolves (or overwrites) an input value.
    pub fn set_input(&mut self, key: impl Into<String>, value: Value) {
        self.inputs.insert(key.into(), Some(value));
    }

    /// True iff every input key not marked optional holds a value.
    pub fn has_required_inputs(&self) -> bool {
        self.inputs
            .iter()
            .filter(|(key, _)| !key.ends_with(OPTIONAL_INPUT_SUFFIX))
            .all(|(_, value)| value.is_some())
    }

    /// True while the retry budget is not exhausted.
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// True once the task reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Transitions the task to in-progress.
    pub fn mark_in_progress(&mut self) {
        self.status = TaskStatus::InProgress;
    }

    /// Merges `outputs` into the recorded outputs and completes the task.
    pub fn mark_completed(&mut self, outputs: HashMap<String, Value>) {
        self.outputs.extend(outputs);
        self.status = TaskStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    /// Fails the task terminally for this attempt.
    pub fn mark_failed(&mut self) {
        self.status = TaskStatus::Failed;
        self.completed_at = Some(Utc::now());
    }

    /// Returns the task to pending, clearing outputs, completion timestamp,
    /// and the retry counter.
    pub fn reset(&mut self) {
        self.outputs.clear();
        self.completed_at = None;
        self.retry_count = 0;
        self.status = TaskStatus::Pending;
    }

    /// Consumes one retry and returns the task to pending for another
    /// attempt. Unlike [`reset`](Self::reset), the retry counter survives.
    pub fn prepare_retry(&mut self) {
        self.retry_count += 1;
        self.outputs.clear();
        self.completed_at = None;
        self.status = TaskStatus::Pending;
    }
}
