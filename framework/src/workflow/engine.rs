//! Workflow definitions and attempt semantics

use crate::error::FrameworkError;
use crate::workflow::context::WorkflowContext;
use crate::workflow::memo::{MemoryStepStore, StepStore};
use crate::workflow::registry::WorkflowRegistry;
use crate::workflow::types::{CaughtFailure, ExecutionStatus, RetryPolicy};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// A named, retryable sequence of steps
///
/// ```rust,ignore
/// struct Greet;
///
/// #[async_trait]
/// impl Workflow for Greet {
///     fn name(&self) -> &'static str {
///         "greet"
///     }
///
///     async fn run(&self, ctx: &WorkflowContext, input: Value) -> Result<Value, FrameworkError> {
///         let name: String = ctx.run_step("load-name", || async { Ok("world".to_string()) }).await?;
///         Ok(json!({ "greeting": format!("hello {}", name) }))
///     }
/// }
/// ```
#[async_trait]
pub trait Workflow: Send + Sync {
    /// Unique name, also the trigger event or cron task it answers to
    fn name(&self) -> &'static str;

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Maximum executions of this workflow running at once across all workers
    fn concurrency_limit(&self) -> Option<usize> {
        None
    }

    /// Run one attempt
    ///
    /// Returning `Err` fails the attempt. Failures caught on the context
    /// leave the attempt successful but may still schedule a re-attempt.
    async fn run(&self, ctx: &WorkflowContext, input: Value) -> Result<Value, FrameworkError>;
}

/// Result of a single attempt
#[derive(Debug)]
pub enum AttemptOutcome {
    /// Terminal success, possibly with caught failures (partial data)
    Succeeded {
        output: Value,
        caught: Vec<CaughtFailure>,
    },
    /// Try again later; finished steps will replay from the memo
    Retry { error: String },
    /// Terminal failure
    Failed { error: String },
}

/// Run one attempt of `workflow` and classify its outcome
pub async fn run_attempt(
    workflow: &dyn Workflow,
    steps: Arc<dyn StepStore>,
    execution_id: i64,
    attempt: u32,
    max_attempts: u32,
    input: Value,
) -> AttemptOutcome {
    let ctx = WorkflowContext::new(execution_id, workflow.name(), attempt, steps);
    let attempts_left = attempt < max_attempts;

    match workflow.run(&ctx, input).await {
        Ok(output) => {
            let caught = ctx.caught_failures();
            let retriable: Vec<&CaughtFailure> =
                caught.iter().filter(|f| f.is_retriable()).collect();

            if !retriable.is_empty() && attempts_left {
                let error = retriable
                    .iter()
                    .map(|f| format!("{}: {}", f.label, f.error))
                    .collect::<Vec<_>>()
                    .join("; ");
                return AttemptOutcome::Retry { error };
            }

            if !caught.is_empty() {
                tracing::warn!(
                    execution_id,
                    workflow = workflow.name(),
                    failures = caught.len(),
                    "execution finished with partial data"
                );
            }
            AttemptOutcome::Succeeded { output, caught }
        }
        Err(err) if err.is_retriable() && attempts_left => AttemptOutcome::Retry {
            error: err.to_string(),
        },
        Err(err) => AttemptOutcome::Failed {
            error: err.to_string(),
        },
    }
}

/// Terminal state of an inline execution
#[derive(Debug)]
pub struct ExecutionReport {
    pub execution_id: i64,
    pub status: ExecutionStatus,
    pub attempts: u32,
    pub output: Option<Value>,
    pub error: Option<String>,
    /// Failures caught during the final attempt
    pub caught: Vec<CaughtFailure>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> bool {
        self.status == ExecutionStatus::Succeeded
    }
}

/// Drives executions to a terminal state in the current process
///
/// Re-attempts run back to back without backoff. The memo lives in memory
/// and is discarded once the execution settles.
pub struct Engine {
    registry: Arc<WorkflowRegistry>,
    steps: Arc<MemoryStepStore>,
    next_id: AtomicI64,
}

impl Engine {
    pub fn new(registry: Arc<WorkflowRegistry>) -> Self {
        Self {
            registry,
            steps: Arc::new(MemoryStepStore::new()),
            next_id: AtomicI64::new(1),
        }
    }

    pub fn registry(&self) -> &WorkflowRegistry {
        &self.registry
    }

    pub async fn run_inline(
        &self,
        name: &str,
        input: Value,
    ) -> Result<ExecutionReport, FrameworkError> {
        let workflow = self.registry.find(name).ok_or_else(|| {
            FrameworkError::internal(format!("Workflow '{}' is not registered", name))
        })?;
        let execution_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let max_attempts = workflow.retry_policy().max_attempts;
        let steps: Arc<dyn StepStore> = self.steps.clone();

        let mut attempt = 1;
        let report = loop {
            let outcome = run_attempt(
                workflow.as_ref(),
                steps.clone(),
                execution_id,
                attempt,
                max_attempts,
                input.clone(),
            )
            .await;

            match outcome {
                AttemptOutcome::Succeeded { output, caught } => {
                    break ExecutionReport {
                        execution_id,
                        status: ExecutionStatus::Succeeded,
                        attempts: attempt,
                        output: Some(output),
                        error: None,
                        caught,
                    };
                }
                AttemptOutcome::Retry { error } => {
                    tracing::info!(execution_id, workflow = name, attempt, %error, "retrying execution");
                    attempt += 1;
                }
                AttemptOutcome::Failed { error } => {
                    tracing::error!(execution_id, workflow = name, attempt, %error, "execution failed");
                    break ExecutionReport {
                        execution_id,
                        status: ExecutionStatus::Failed,
                        attempts: attempt,
                        output: None,
                        error: Some(error),
                        caught: Vec::new(),
                    };
                }
            }
        };

        self.steps.clear(execution_id).await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counters {
        always: AtomicUsize,
        flaky: AtomicUsize,
    }

    struct FlakyWorkflow {
        counters: Arc<Counters>,
        failures_before_success: usize,
    }

    #[async_trait]
    impl Workflow for FlakyWorkflow {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy::attempts(2)
        }

        async fn run(&self, ctx: &WorkflowContext, _input: Value) -> Result<Value, FrameworkError> {
            let counters = self.counters.clone();
            let limit = self.failures_before_success;

            let report = ctx
                .group()
                .step("always", || async {
                    counters.always.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, FrameworkError>(1)
                })
                .step("flaky", || async {
                    if counters.flaky.fetch_add(1, Ordering::SeqCst) < limit {
                        Err(FrameworkError::upstream("remote", "timeout"))
                    } else {
                        Ok(2)
                    }
                })
                .join()
                .await;

            Ok(json!({ "succeeded": report.succeeded.len() }))
        }
    }

    struct MissingRecord;

    #[async_trait]
    impl Workflow for MissingRecord {
        fn name(&self) -> &'static str {
            "missing"
        }

        async fn run(&self, ctx: &WorkflowContext, _input: Value) -> Result<Value, FrameworkError> {
            ctx.run_step("find", || async {
                Err::<Value, _>(FrameworkError::model_not_found("Tool"))
            })
            .await
        }
    }

    fn engine(failures_before_success: usize) -> (Engine, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let mut registry = WorkflowRegistry::new();
        registry.register(FlakyWorkflow {
            counters: counters.clone(),
            failures_before_success,
        });
        registry.register(MissingRecord);
        (Engine::new(Arc::new(registry)), counters)
    }

    #[tokio::test]
    async fn test_retry_reruns_only_failed_step() {
        let (engine, counters) = engine(1);

        let report = engine.run_inline("flaky", json!({})).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.attempts, 2);
        assert_eq!(counters.always.load(Ordering::SeqCst), 1);
        assert_eq!(counters.flaky.load(Ordering::SeqCst), 2);
        assert!(report.caught.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_retries_finish_with_partial_data() {
        let (engine, counters) = engine(usize::MAX);

        let report = engine.run_inline("flaky", json!({})).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.attempts, 2);
        assert_eq!(report.output, Some(json!({ "succeeded": 1 })));
        assert_eq!(report.caught.len(), 1);
        assert_eq!(counters.always.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fatal_error_fails_immediately() {
        let (engine, _) = engine(0);

        let report = engine.run_inline("missing", json!({})).await.unwrap();

        assert_eq!(report.status, ExecutionStatus::Failed);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.error.as_deref(), Some("Tool not found"));
    }

    #[tokio::test]
    async fn test_unknown_workflow() {
        let (engine, _) = engine(0);
        assert!(engine.run_inline("nope", json!({})).await.is_err());
    }
}
