use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall state of a workflow run.
///
/// Transitions are monotonic forward except via [`Workflow::reset`].
/// `Stopped`, `Completed`, and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    /// Execution has not begun.
    NotStarted,
    /// The manager is driving tasks forward.
    InProgress,
    /// Stopped by the caller; no further cursor advancement.
    Stopped {
        /// When the stop was requested.
        stopped_at: DateTime<Utc>,
    },
    /// All tasks completed.
    Completed {
        /// When the final task completed.
        completed_at: DateTime<Utc>,
    },
    /// A task exhausted its retries.
    Failed {
        /// When the terminal failure occurred.
        failed_at: DateTime<Utc>,
        /// Retries consumed by the failing task at the time of failure.
        retry_count: u32,
    },
}

impl WorkflowState {
    /// True for `Stopped`, `Completed`, and `Failed`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowState::NotStarted | WorkflowState::InProgress)
    }
}

/// An ordered, fixed-at-start sequence of tasks plus a cursor and an overall
/// state.
///
/// Once a run begins the task list is structurally fixed; only per-task
/// status and outputs mutate. The cursor is monotonically non-decreasing
/// within one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: Uuid,
    /// Workflow name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// The ordered task sequence.
    pub tasks: Vec<Task>,
    /// Index of the task the manager will execute next.
    pub current_task_index: usize,
    /// Overall run state.
    pub state: WorkflowState,
}

impl Workflow {
    /// Creates a not-started workflow over an ordered task list.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        tasks: Vec<Task>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
            tasks,
            current_task_index: 0,
            state: WorkflowState::NotStarted,
        }
    }

    /// Looks up a task by name.
    pub fn task_by_name(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// True while the workflow may still make progress.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            WorkflowState::NotStarted | WorkflowState::InProgress
        )
    }

    /// Returns the workflow to its initial state: cursor zeroed, every task
    /// fully reset, state back to [`WorkflowState::NotStarted`].
    pub fn reset(&mut self) {
        for task in &mut self.tasks {
            task.reset();
        }
        self.current_task_index = 0;
        self.state = WorkflowState::NotStarted;
    }
}

/// Fluent builder assembling a [`Workflow`] from an explicit ordered task
/// list.
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    name: String,
    description: String,
    tasks: Vec<Task>,
}

impl WorkflowBuilder {
    /// Starts a builder for a workflow with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            tasks: Vec::new(),
        }
    }

    /// Sets the workflow description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a task to the ordered sequence.
    pub fn add_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Builds the workflow.
    pub fn build(self) -> Workflow {
        Workflow::new(self.name, self.description, self.tasks)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::task::TaskStatus;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn builder_preserves_task_order() {
        let workflow = WorkflowBuilder::new("pipeline")
            .description("three steps")
            .add_task(Task::new("a", ""))
            .add_task(Task::new("b", ""))
            .add_task(Task::new("c", ""))
            .build();

        let names: Vec<&str> = workflow.tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(workflow.state, WorkflowState::NotStarted);
        assert_eq!(workflow.current_task_index, 0);
    }

    #[test]
    fn task_lookup_by_name() {
        let workflow = WorkflowBuilder::new("w")
            .add_task(Task::new("first", ""))
            .add_task(Task::new("second", ""))
            .build();

        assert!(workflow.task_by_name("second").is_some());
        assert!(workflow.task_by_name("missing").is_none());
    }

    #[test]
    fn reset_returns_to_initial_state() {
        let mut workflow = WorkflowBuilder::new("w")
            .add_task(Task::new("a", "").with_max_retries(1))
            .build();

        workflow.state = WorkflowState::InProgress;
        workflow.current_task_index = 1;
        workflow.tasks[0].prepare_retry();
        let mut outputs = HashMap::new();
        outputs.insert("x".to_string(), json!(1));
        workflow.tasks[0].mark_completed(outputs);

        workflow.reset();
        assert_eq!(workflow.state, WorkflowState::NotStarted);
        assert_eq!(workflow.current_task_index, 0);
        assert_eq!(workflow.tasks[0].status, TaskStatus::Pending);
        assert!(workflow.tasks[0].outputs.is_empty());
        assert_eq!(workflow.tasks[0].retry_count, 0);
    }

    #[test]
    fn terminal_states() {
        assert!(!WorkflowState::NotStarted.is_terminal());
        assert!(!WorkflowState::InProgress.is_terminal());
        assert!(WorkflowState::Stopped {
            stopped_at: Utc::now()
        }
        .is_terminal());
        assert!(WorkflowState::Failed {
            failed_at: Utc::now(),
            retry_count: 2
        }
        .is_terminal());
    }

    #[test]
    fn state_serialization_is_tagged() {
        let state = WorkflowState::Failed {
            failed_at: Utc::now(),
            retry_count: 3,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert!(json.contains("\"state\":\"failed\""));
        assert!(json.contains("\"retry_count\":3"));
        let parsed: WorkflowState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
