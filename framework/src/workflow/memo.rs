//! Step memo table
//!
//! Results are keyed by `(execution_id, step_name)`. A successful result is
//! immutable for the lifetime of the execution.

use crate::error::FrameworkError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Recorded outcome of a step
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Succeeded(Value),
    Failed {
        error: String,
        retriable: bool,
        attempts: u32,
    },
    NotRun,
}

impl StepResult {
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Number of failed invocations recorded so far
    pub fn failed_attempts(&self) -> u32 {
        match self {
            Self::Failed { attempts, .. } => *attempts,
            _ => 0,
        }
    }
}

/// Durable storage for step results
#[async_trait]
pub trait StepStore: Send + Sync {
    /// Load the recorded result, `NotRun` if the step has no row
    async fn load(&self, execution_id: i64, step: &str) -> Result<StepResult, FrameworkError>;

    /// Record a result, replacing an earlier failure
    async fn record(
        &self,
        execution_id: i64,
        step: &str,
        result: &StepResult,
    ) -> Result<(), FrameworkError>;

    /// Drop every result of an execution
    async fn clear(&self, execution_id: i64) -> Result<(), FrameworkError>;

    /// Called after each step so long executions keep their lease
    async fn heartbeat(&self, _execution_id: i64) -> Result<(), FrameworkError> {
        Ok(())
    }
}

/// In-process step store
#[derive(Default)]
pub struct MemoryStepStore {
    steps: Mutex<HashMap<(i64, String), StepResult>>,
}

impl MemoryStepStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded steps for an execution
    pub fn len(&self, execution_id: i64) -> usize {
        self.steps
            .lock()
            .map(|steps| steps.keys().filter(|(id, _)| *id == execution_id).count())
            .unwrap_or(0)
    }

    fn poisoned() -> FrameworkError {
        FrameworkError::internal("step store lock poisoned")
    }
}

#[async_trait]
impl StepStore for MemoryStepStore {
    async fn load(&self, execution_id: i64, step: &str) -> Result<StepResult, FrameworkError> {
        let steps = self.steps.lock().map_err(|_| Self::poisoned())?;
        Ok(steps
            .get(&(execution_id, step.to_string()))
            .cloned()
            .unwrap_or(StepResult::NotRun))
    }

    async fn record(
        &self,
        execution_id: i64,
        step: &str,
        result: &StepResult,
    ) -> Result<(), FrameworkError> {
        let mut steps = self.steps.lock().map_err(|_| Self::poisoned())?;
        let key = (execution_id, step.to_string());
        if matches!(steps.get(&key), Some(StepResult::Succeeded(_))) {
            return Ok(());
        }
        match result {
            StepResult::NotRun => {
                steps.remove(&key);
            }
            other => {
                steps.insert(key, other.clone());
            }
        }
        Ok(())
    }

    async fn clear(&self, execution_id: i64) -> Result<(), FrameworkError> {
        let mut steps = self.steps.lock().map_err(|_| Self::poisoned())?;
        steps.retain(|(id, _), _| *id != execution_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_success_is_immutable() {
        let store = MemoryStepStore::new();
        store
            .record(1, "fetch", &StepResult::Succeeded(json!(1)))
            .await
            .unwrap();
        store
            .record(1, "fetch", &StepResult::Succeeded(json!(2)))
            .await
            .unwrap();

        assert_eq!(
            store.load(1, "fetch").await.unwrap(),
            StepResult::Succeeded(json!(1))
        );
    }

    #[tokio::test]
    async fn test_clear_only_touches_one_execution() {
        let store = MemoryStepStore::new();
        store
            .record(1, "a", &StepResult::Succeeded(json!(null)))
            .await
            .unwrap();
        store
            .record(2, "a", &StepResult::Succeeded(json!(null)))
            .await
            .unwrap();

        store.clear(1).await.unwrap();

        assert_eq!(store.load(1, "a").await.unwrap(), StepResult::NotRun);
        assert!(store.load(2, "a").await.unwrap().is_succeeded());
    }
}
