use crate::task::Task;
use serde_json::Value;
use std::collections::HashMap;

/// Static name-based table wiring prior tasks' outputs into a task's inputs.
///
/// Keyed by task name, each entry maps an input key to a source reference of
/// the form `"sourceTaskName.sourceOutputKey"`. The table is owned by the
/// manager and is not part of workflow identity.
#[derive(Debug, Clone, Default)]
pub struct InputMapping {
    entries: HashMap<String, HashMap<String, String>>,
}

impl InputMapping {
    /// Creates an empty mapping table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wires `task`'s input `input_key` to `source_ref`
    /// (`"sourceTaskName.sourceOutputKey"`).
    pub fn map_input(
        mut self,
        task: impl Into<String>,
        input_key: impl Into<String>,
        source_ref: impl Into<String>,
    ) -> Self {
        self.entries
            .entry(task.into())
            .or_default()
            .insert(input_key.into(), source_ref.into());
        self
    }

    /// The mapping entries declared for a task, if any.
    pub fn for_task(&self, task_name: &str) -> Option<&HashMap<String, String>> {
        self.entries.get(task_name)
    }

    /// Resolves the mapped inputs for the task at `index` from the recorded
    /// outputs of the other tasks in the sequence.
    ///
    /// Returns the `(input key, value)` assignments that could be resolved.
    /// A source reference naming an unknown task or output key resolves to
    /// nothing, leaving that input unset.
    pub fn resolve(&self, tasks: &[Task], index: usize) -> Vec<(String, Value)> {
        let Some(task) = tasks.get(index) else {
            return Vec::new();
        };
        let Some(wiring) = self.entries.get(&task.name) else {
            return Vec::new();
        };

        let mut assignments = Vec::new();
        for (input_key, source_ref) in wiring {
            if !task.inputs.contains_key(input_key) {
                continue;
            }
            let Some((source_task, output_key)) = source_ref.split_once('.') else {
                continue;
            };
            let value = tasks
                .iter()
                .find(|t| t.name == source_task)
                .and_then(|t| t.outputs.get(output_key));
            if let Some(value) = value {
                assignments.push((input_key.clone(), value.clone()));
            }
        }
        assignments
    }
}
