use crate::executor::TaskExecutor;
use crate::mapping::InputMapping;
use crate::task::TaskStatus;
use crate::workflow::{Workflow, WorkflowState};
use chrono::Utc;
use maestro_core::{MaestroError, MaestroResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

/// What the run loop should do after a step.
enum Flow {
    Continue,
    Halt,
}

/// Outcome of preparing the task at the cursor.
enum Prepared {
    /// The run is over (completed, failed terminally, or stopped).
    Finished,
    /// A validation failure consumed a retry; re-enter the loop.
    Retry,
    /// The task is in progress and ready to execute.
    Execute {
        index: usize,
        name: String,
        executor: Arc<dyn TaskExecutor>,
        inputs: HashMap<String, Value>,
    },
}

/// Drives a [`Workflow`] forward one task at a time.
///
/// The manager applies the [`InputMapping`] before each task, interprets
/// execution results, and enforces the retry and fail-fast policy: a failing
/// task is retried immediately (no backoff) while its retry budget lasts;
/// once exhausted the task and the workflow are marked failed and no
/// subsequent task executes.
///
/// Methods take `&self`; share the manager behind an [`Arc`] to issue
/// [`stop_workflow`](Self::stop_workflow) from another tokio task while
/// [`start`](Self::start) is suspended inside a task execution.
pub struct WorkflowManager {
    workflow: Arc<RwLock<Workflow>>,
    mapping: InputMapping,
    executors: HashMap<String, Arc<dyn TaskExecutor>>,
    final_outputs: RwLock<HashMap<String, Value>>,
}

impl WorkflowManager {
    /// Creates a manager over a workflow and its input-mapping table.
    pub fn new(workflow: Workflow, mapping: InputMapping) -> Self {
        Self {
            workflow: Arc::new(RwLock::new(workflow)),
            mapping,
            executors: HashMap::new(),
            final_outputs: RwLock::new(HashMap::new()),
        }
    }

    /// Registers the executor for the task with the given name.
    pub fn with_executor(
        mut self,
        task_name: impl Into<String>,
        executor: Arc<dyn TaskExecutor>,
    ) -> Self {
        self.executors.insert(task_name.into(), executor);
        self
    }

    /// A shared handle to the managed workflow.
    pub fn workflow(&self) -> Arc<RwLock<Workflow>> {
        Arc::clone(&self.workflow)
    }

    /// The current workflow state.
    pub async fn state(&self) -> WorkflowState {
        self.workflow.read().await.state.clone()
    }

    /// The last executed task's outputs, recorded as the workflow's final
    /// result once the run ends.
    pub async fn final_outputs(&self) -> HashMap<String, Value> {
        self.final_outputs.read().await.clone()
    }

    /// Starts (or resumes) execution from the current cursor.
    ///
    /// Allowed only while the workflow is not started or in progress. Task
    /// failures never escape as errors from this method — they surface via
    /// the workflow state.
    pub async fn start(&self) -> MaestroResult<()> {
        {
            let mut wf = self.workflow.write().await;
            if !wf.is_active() {
                return Err(MaestroError::Workflow(format!(
                    "cannot start workflow '{}' from state {:?}",
                    wf.name, wf.state
                )));
            }
            wf.state = WorkflowState::InProgress;
            info!(workflow = %wf.name, tasks = wf.tasks.len(), "workflow started");
        }

        loop {
            match self.prepare_step().await {
                Prepared::Finished => break,
                Prepared::Retry => continue,
                Prepared::Execute {
                    index,
                    name,
                    executor,
                    inputs,
                } => {
                    // No lock is held across the executor await.
                    let result = executor.execute(&inputs).await;
                    if let Flow::Halt = self.apply_result(index, &name, result).await {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Stops the workflow: terminal, but cooperative — an already-suspended
    /// task is not interrupted, its eventual result is disregarded and the
    /// cursor never advances again.
    pub async fn stop_workflow(&self) -> MaestroResult<()> {
        let mut wf = self.workflow.write().await;
        if !wf.is_active() {
            return Err(MaestroError::Workflow(format!(
                "cannot stop workflow '{}' from state {:?}",
                wf.name, wf.state
            )));
        }
        wf.state = WorkflowState::Stopped {
            stopped_at: Utc::now(),
        };
        info!(workflow = %wf.name, "workflow stopped");
        Ok(())
    }

    /// Defensively recomputes the workflow state from task statuses, for
    /// callers that mutate tasks directly.
    ///
    /// Idempotent: a second call with no intervening mutation returns the
    /// identical state, timestamps included. A no-op when already stopped.
    pub async fn evaluate_state(&self) -> WorkflowState {
        let mut wf = self.workflow.write().await;
        if matches!(wf.state, WorkflowState::Stopped { .. }) {
            return wf.state.clone();
        }

        let failed = wf.tasks.iter().find(|t| t.status == TaskStatus::Failed);
        let recomputed = if let Some(task) = failed {
            match wf.state {
                WorkflowState::Failed { .. } => None,
                _ => Some(WorkflowState::Failed {
                    failed_at: Utc::now(),
                    retry_count: task.retry_count,
                }),
            }
        } else if !wf.tasks.is_empty()
            && wf.tasks.iter().all(|t| t.status == TaskStatus::Completed)
        {
            match wf.state {
                WorkflowState::Completed { .. } => None,
                _ => Some(WorkflowState::Completed {
                    completed_at: Utc::now(),
                }),
            }
        } else if wf
            .tasks
            .iter()
            .any(|t| matches!(t.status, TaskStatus::InProgress | TaskStatus::Completed))
        {
            match wf.state {
                WorkflowState::InProgress => None,
                _ => Some(WorkflowState::InProgress),
            }
        } else {
            match wf.state {
                WorkflowState::NotStarted => None,
                _ => Some(WorkflowState::NotStarted),
            }
        };

        if let Some(state) = recomputed {
            wf.state = state;
        }
        wf.state.clone()
    }

    /// Returns the workflow (and the recorded final outputs) to the initial
    /// state.
    pub async fn reset(&self) {
        self.workflow.write().await.reset();
        self.final_outputs.write().await.clear();
    }

    /// Applies input mapping and validation to the task at the cursor and
    /// marks it in progress, or resolves the step another way.
    async fn prepare_step(&self) -> Prepared {
        let mut wf = self.workflow.write().await;
        if wf.state != WorkflowState::InProgress {
            return Prepared::Finished;
        }

        let index = wf.current_task_index;
        if index >= wf.tasks.len() {
            wf.state = WorkflowState::Completed {
                completed_at: Utc::now(),
            };
            info!(workflow = %wf.name, "workflow completed");
            return Prepared::Finished;
        }

        let assignments = self.mapping.resolve(&wf.tasks, index);
        let task = &mut wf.tasks[index];
        for (key, value) in assignments {
            task.set_input(key, value);
        }

        if !task.has_required_inputs() {
            return match Self::fail_current(&mut wf, index, "missing required inputs") {
                Flow::Continue => Prepared::Retry,
                Flow::Halt => Prepared::Finished,
            };
        }

        let name = wf.tasks[index].name.clone();
        let Some(executor) = self.executors.get(&name) else {
            let reason = "no executor registered for task";
            return match Self::fail_current(&mut wf, index, reason) {
                Flow::Continue => Prepared::Retry,
                Flow::Halt => Prepared::Finished,
            };
        };

        let task = &mut wf.tasks[index];
        task.mark_in_progress();
        let inputs: HashMap<String, Value> = task
            .inputs
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k.clone(), v.clone())))
            .collect();
        info!(workflow = %wf.name, task = %name, attempt = wf.tasks[index].retry_count + 1, "executing task");

        Prepared::Execute {
            index,
            name,
            executor: Arc::clone(executor),
            inputs,
        }
    }

    /// Interprets an execution result for the task at `index`.
    async fn apply_result(
        &self,
        index: usize,
        name: &str,
        result: MaestroResult<HashMap<String, Value>>,
    ) -> Flow {
        let mut wf = self.workflow.write().await;
        if wf.state != WorkflowState::InProgress {
            // Stop was requested while the task was suspended; the result
            // is vestigial and is disregarded.
            info!(workflow = %wf.name, task = name, "discarding result after stop");
            return Flow::Halt;
        }

        match result {
            Ok(outputs) => {
                let task = &mut wf.tasks[index];
                task.mark_completed(outputs);
                *self.final_outputs.write().await = task.outputs.clone();
                wf.current_task_index += 1;
                info!(workflow = %wf.name, task = name, "task completed");
                Flow::Continue
            }
            Err(e) => Self::fail_current(&mut wf, index, &e.to_string()),
        }
    }

    /// Applies the retry/failure policy to the task at `index`.
    ///
    /// While the retry budget lasts the task is returned to pending for an
    /// immediate re-attempt; once exhausted the task and the workflow are
    /// marked failed and the run halts.
    fn fail_current(wf: &mut Workflow, index: usize, reason: &str) -> Flow {
        let task = &mut wf.tasks[index];
        if task.can_retry() {
            task.prepare_retry();
            warn!(
                workflow = %wf.name,
                task = %wf.tasks[index].name,
                retry = wf.tasks[index].retry_count,
                max_retries = wf.tasks[index].max_retries,
                reason,
                "task failed, retrying"
            );
            Flow::Continue
        } else {
            task.mark_failed();
            let retry_count = task.retry_count;
            let task_name = task.name.clone();
            wf.state = WorkflowState::Failed {
                failed_at: Utc::now(),
                retry_count,
            };
            error!(
                workflow = %wf.name,
                task = %task_name,
                retry_count,
                reason,
                "task failed terminally, workflow failed"
            );
            Flow::Halt
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::executor::FnExecutor;
    use crate::task::Task;
    use crate::workflow::WorkflowBuilder;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn outputs(key: &str, value: Value) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert(key.to_string(), value);
        map
    }

    #[tokio::test]
    async fn single_task_runs_to_completion() {
        let workflow = WorkflowBuilder::new("w").add_task(Task::new("only", "")).build();
        let manager = WorkflowManager::new(workflow, InputMapping::new()).with_executor(
            "only",
            Arc::new(FnExecutor::new(|_: &HashMap<String, Value>| {
                Ok(outputs("done", json!(true)))
            })),
        );

        manager.start().await.unwrap();
        assert!(matches!(
            manager.state().await,
            WorkflowState::Completed { .. }
        ));
        assert_eq!(manager.final_outputs().await.get("done"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn start_is_rejected_from_terminal_state() {
        let workflow = WorkflowBuilder::new("w").build();
        let manager = WorkflowManager::new(workflow, InputMapping::new());
        manager.start().await.unwrap();
        assert!(matches!(
            manager.state().await,
            WorkflowState::Completed { .. }
        ));

        let err = manager.start().await.unwrap_err();
        assert!(err.to_string().contains("cannot start"));
    }

    #[tokio::test]
    async fn missing_executor_is_a_failure() {
        let workflow = WorkflowBuilder::new("w").add_task(Task::new("orphan", "")).build();
        let manager = WorkflowManager::new(workflow, InputMapping::new());

        manager.start().await.unwrap();
        assert!(matches!(
            manager.state().await,
            WorkflowState::Failed { retry_count: 0, .. }
        ));
    }

    #[tokio::test]
    async fn retry_then_succeed() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let workflow = WorkflowBuilder::new("w")
            .add_task(Task::new("flaky", "").with_max_retries(2))
            .build();
        let manager = WorkflowManager::new(workflow, InputMapping::new()).with_executor(
            "flaky",
            Arc::new(FnExecutor::new(move |_: &HashMap<String, Value>| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(MaestroError::Task("transient".into()))
                } else {
                    Ok(outputs("ok", json!(1)))
                }
            })),
        );

        manager.start().await.unwrap();
        assert!(matches!(
            manager.state().await,
            WorkflowState::Completed { .. }
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);

        let wf = manager.workflow();
        let wf = wf.read().await;
        assert_eq!(wf.tasks[0].retry_count, 1);
        assert_eq!(wf.tasks[0].status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn evaluate_state_recomputes_from_tasks() {
        let workflow = WorkflowBuilder::new("w")
            .add_task(Task::new("a", ""))
            .add_task(Task::new("b", ""))
            .build();
        let manager = WorkflowManager::new(workflow, InputMapping::new());
        assert_eq!(manager.evaluate_state().await, WorkflowState::NotStarted);

        {
            let wf = manager.workflow();
            let mut wf = wf.write().await;
            wf.tasks[0].mark_completed(HashMap::new());
        }
        assert_eq!(manager.evaluate_state().await, WorkflowState::InProgress);

        {
            let wf = manager.workflow();
            let mut wf = wf.write().await;
            wf.tasks[1].mark_failed();
        }
        assert!(matches!(
            manager.evaluate_state().await,
            WorkflowState::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn reset_allows_a_fresh_run() {
        let workflow = WorkflowBuilder::new("w")
            .add_task(Task::new("a", ""))
            .build();
        let manager = WorkflowManager::new(workflow, InputMapping::new()).with_executor(
            "a",
            Arc::new(FnExecutor::new(|_: &HashMap<String, Value>| {
                Ok(outputs("n", json!(1)))
            })),
        );

        manager.start().await.unwrap();
        manager.reset().await;
        assert_eq!(manager.state().await, WorkflowState::NotStarted);
        assert!(manager.final_outputs().await.is_empty());

        manager.start().await.unwrap();
        assert!(matches!(
            manager.state().await,
            WorkflowState::Completed { .. }
        ));
    }
}
