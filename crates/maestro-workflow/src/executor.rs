use async_trait::async_trait;
use maestro_core::MaestroResult;
use serde_json::Value;
use std::collections::HashMap;

/// The execution contract a task delegates its actual work to.
///
/// Implemented by the consuming application; the manager looks up executors
/// by task name. Execution may suspend on external I/O and may fail — the
/// manager converts failures into retry or terminal-failure transitions.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Performs the work, returning the task's output values.
    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
    ) -> MaestroResult<HashMap<String, Value>>;
}

/// Adapts a synchronous closure into a [`TaskExecutor`].
pub struct FnExecutor<F> {
    f: F,
}

impl<F> FnExecutor<F>
where
    F: Fn(&HashMap<String, Value>) -> MaestroResult<HashMap<String, Value>> + Send + Sync,
{
    /// Wraps the given closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> TaskExecutor for FnExecutor<F>
where
    F: Fn(&HashMap<String, Value>) -> MaestroResult<HashMap<String, Value>> + Send + Sync,
{
    async fn execute(
        &self,
        inputs: &HashMap<String, Value>,
    ) -> MaestroResult<HashMap<String, Value>> {
        (self.f)(inputs)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn fn_executor_passes_inputs_through() {
        let executor = FnExecutor::new(|inputs: &HashMap<String, Value>| {
            let mut outputs = HashMap::new();
            outputs.insert("echo".to_string(), inputs["msg"].clone());
            Ok(outputs)
        });

        let mut inputs = HashMap::new();
        inputs.insert("msg".to_string(), json!("hi"));
        let outputs = executor.execute(&inputs).await.unwrap();
        assert_eq!(outputs.get("echo"), Some(&json!("hi")));
    }
}
