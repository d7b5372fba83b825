//! Workflow execution context

use crate::error::FrameworkError;
use crate::workflow::memo::{StepResult, StepStore};
use crate::workflow::types::CaughtFailure;
use futures::future::{self, BoxFuture};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

/// Handle passed to a running workflow attempt
///
/// Every side effect of a workflow goes through [`WorkflowContext::run_step`]
/// so that a re-attempt of the execution replays finished steps from the
/// memo instead of running them again.
#[derive(Clone)]
pub struct WorkflowContext {
    inner: Arc<WorkflowContextInner>,
}

struct WorkflowContextInner {
    execution_id: i64,
    workflow: String,
    attempt: u32,
    steps: Arc<dyn StepStore>,
    caught: Mutex<Vec<CaughtFailure>>,
}

impl WorkflowContext {
    pub fn new(
        execution_id: i64,
        workflow: impl Into<String>,
        attempt: u32,
        steps: Arc<dyn StepStore>,
    ) -> Self {
        Self {
            inner: Arc::new(WorkflowContextInner {
                execution_id,
                workflow: workflow.into(),
                attempt,
                steps,
                caught: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn execution_id(&self) -> i64 {
        self.inner.execution_id
    }

    pub fn workflow(&self) -> &str {
        &self.inner.workflow
    }

    /// Attempt number, starting at 1
    pub fn attempt(&self) -> u32 {
        self.inner.attempt
    }

    /// Run a named step at most once per execution
    ///
    /// - a recorded success is deserialized and returned without calling `f`
    /// - a recorded non-retriable failure is returned without calling `f`
    /// - otherwise `f` runs and its outcome is recorded
    pub async fn run_step<T, F, Fut>(&self, name: &str, f: F) -> Result<T, FrameworkError>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, FrameworkError>> + Send,
    {
        let execution_id = self.inner.execution_id;

        let prior_failures = match self.inner.steps.load(execution_id, name).await? {
            StepResult::Succeeded(value) => {
                tracing::debug!(
                    execution_id,
                    workflow = %self.inner.workflow,
                    step = name,
                    "replaying memoized step"
                );
                return Ok(serde_json::from_value(value)?);
            }
            StepResult::Failed {
                error,
                retriable: false,
                ..
            } => {
                tracing::debug!(
                    execution_id,
                    workflow = %self.inner.workflow,
                    step = name,
                    "replaying non-retriable failure"
                );
                return Err(FrameworkError::non_retriable(format!(
                    "step '{}' previously failed: {}",
                    name, error
                )));
            }
            StepResult::Failed { attempts, .. } => attempts,
            StepResult::NotRun => 0,
        };

        tracing::info!(
            execution_id,
            workflow = %self.inner.workflow,
            step = name,
            attempt = prior_failures + 1,
            "step started"
        );

        let outcome = f().await;

        let recorded = match &outcome {
            Ok(value) => StepResult::Succeeded(serde_json::to_value(value)?),
            Err(err) => StepResult::Failed {
                error: err.to_string(),
                retriable: err.is_retriable(),
                attempts: prior_failures + 1,
            },
        };
        self.inner.steps.record(execution_id, name, &recorded).await?;
        self.inner.steps.heartbeat(execution_id).await?;

        match &outcome {
            Ok(_) => tracing::info!(
                execution_id,
                workflow = %self.inner.workflow,
                step = name,
                "step succeeded"
            ),
            Err(err) => tracing::warn!(
                execution_id,
                workflow = %self.inner.workflow,
                step = name,
                retriable = err.is_retriable(),
                error = %err,
                "step failed"
            ),
        }

        outcome
    }

    /// Start a group of steps that run concurrently
    pub fn group(&self) -> StepGroup<'_> {
        StepGroup {
            ctx: self,
            steps: Vec::new(),
        }
    }

    /// Record a failure that the workflow handled instead of propagating
    pub fn catch(&self, label: impl Into<String>, error: FrameworkError) {
        let label = label.into();
        tracing::warn!(
            execution_id = self.inner.execution_id,
            workflow = %self.inner.workflow,
            step = %label,
            retriable = error.is_retriable(),
            error = %error,
            "caught failure"
        );
        self.inner
            .caught
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(CaughtFailure { label, error });
    }

    /// Failures caught during this attempt
    pub fn caught_failures(&self) -> Vec<CaughtFailure> {
        self.inner
            .caught
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

type StepFuture<'a> = BoxFuture<'a, Result<Value, FrameworkError>>;

/// A fan-out of steps joined by a barrier
///
/// ```rust,ignore
/// let report = ctx
///     .group()
///     .step("fetch-repository-data", || fetch(&tool))
///     .step("upload-favicon", || upload(&tool))
///     .join()
///     .await;
/// ```
pub struct StepGroup<'a> {
    ctx: &'a WorkflowContext,
    steps: Vec<(String, StepFuture<'a>)>,
}

impl<'a> StepGroup<'a> {
    pub fn step<T, F, Fut>(mut self, name: impl Into<String>, f: F) -> Self
    where
        T: Serialize + DeserializeOwned + Send + 'a,
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, FrameworkError>> + Send + 'a,
    {
        let name = name.into();
        let ctx = self.ctx;
        let step_name = name.clone();
        let fut: StepFuture<'a> = Box::pin(async move {
            let value = ctx.run_step(&step_name, f).await?;
            Ok(serde_json::to_value(value)?)
        });
        self.steps.push((name, fut));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Wait for every step to settle
    ///
    /// Failures are caught on the context, never propagated, so one failing
    /// step cannot stop its siblings.
    pub async fn join(self) -> GroupReport {
        let (names, futures): (Vec<_>, Vec<_>) = self.steps.into_iter().unzip();
        let results = future::join_all(futures).await;

        let mut report = GroupReport::default();
        for (name, result) in names.into_iter().zip(results) {
            match result {
                Ok(value) => report.succeeded.push((name, value)),
                Err(err) => {
                    self.ctx.catch(name.clone(), err.clone());
                    report.failed.push(CaughtFailure {
                        label: name,
                        error: err,
                    });
                }
            }
        }
        report
    }
}

/// Outcome of a joined step group
#[derive(Debug, Default)]
pub struct GroupReport {
    /// Step name and its output, in registration order
    pub succeeded: Vec<(String, Value)>,
    pub failed: Vec<CaughtFailure>,
}

impl GroupReport {
    /// Name for a follow-up step that depends on what this group produced
    ///
    /// Successes are memoized and never revert, so the count only grows
    /// across attempts. A step named this way replays while the group's
    /// output is unchanged and runs again once a retried step succeeds.
    pub fn covering_step(&self, name: &str) -> String {
        format!("{}:{}", name, self.succeeded.len())
    }

    pub fn output(&self, step: &str) -> Option<&Value> {
        self.succeeded
            .iter()
            .find(|(name, _)| name == step)
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::memo::MemoryStepStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn context(steps: Arc<MemoryStepStore>, attempt: u32) -> WorkflowContext {
        WorkflowContext::new(7, "test", attempt, steps)
    }

    #[tokio::test]
    async fn test_step_caching() {
        let steps = Arc::new(MemoryStepStore::new());
        let calls = AtomicUsize::new(0);

        let first = context(steps.clone(), 1)
            .run_step("cache-step", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FrameworkError>(42)
            })
            .await
            .unwrap();

        let second = context(steps, 2)
            .run_step("cache-step", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, FrameworkError>(99)
            })
            .await
            .unwrap();

        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retriable_failure_reruns() {
        let steps = Arc::new(MemoryStepStore::new());
        let calls = AtomicUsize::new(0);

        let flaky = || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FrameworkError::upstream("github", "timeout"))
            } else {
                Ok(2)
            }
        };

        let first = context(steps.clone(), 1).run_step("flaky", flaky).await;
        assert!(first.is_err());
        assert_eq!(steps.load(7, "flaky").await.unwrap().failed_attempts(), 1);

        let second = context(steps, 2).run_step("flaky", flaky).await.unwrap();
        assert_eq!(second, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retriable_failure_is_memoized() {
        let steps = Arc::new(MemoryStepStore::new());
        let calls = AtomicUsize::new(0);

        let post = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(FrameworkError::non_retriable("rejected"))
        };

        let _ = context(steps.clone(), 1).run_step("post", post).await;
        let replay = context(steps, 2).run_step("post", post).await;

        assert!(replay.unwrap_err().is_fatal());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_group_isolates_failures() {
        let ctx = context(Arc::new(MemoryStepStore::new()), 1);

        let report = ctx
            .group()
            .step("a", || async { Ok::<_, FrameworkError>("a".to_string()) })
            .step("b", || async {
                Err::<String, _>(FrameworkError::upstream("x", "down"))
            })
            .step("c", || async { Ok::<_, FrameworkError>(3) })
            .join()
            .await;

        assert_eq!(report.succeeded.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.output("c"), Some(&serde_json::json!(3)));
        assert_eq!(ctx.caught_failures().len(), 1);
        assert_eq!(ctx.caught_failures()[0].label, "b");
    }

    #[tokio::test]
    async fn test_covering_step_reruns_after_retried_success() {
        let steps = Arc::new(MemoryStepStore::new());
        let calls = AtomicUsize::new(0);
        let flaky = || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(FrameworkError::upstream("github", "timeout"))
            } else {
                Ok(1)
            }
        };
        let signals = AtomicUsize::new(0);
        let signal = || async {
            signals.fetch_add(1, Ordering::SeqCst);
            Ok::<_, FrameworkError>(())
        };

        let mut names = Vec::new();
        for attempt in 1..=3 {
            let ctx = context(steps.clone(), attempt);
            let report = ctx
                .group()
                .step("stable", || async { Ok::<_, FrameworkError>(0) })
                .step("flaky", flaky)
                .join()
                .await;
            let name = report.covering_step("signal");
            ctx.run_step(&name, signal).await.unwrap();
            names.push(name);
        }

        assert_eq!(names, vec!["signal:1", "signal:2", "signal:2"]);
        // once for the first attempt, once when `flaky` recovered
        assert_eq!(signals.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_catch_survives_poisoned_lock() {
        let ctx = context(Arc::new(MemoryStepStore::new()), 1);
        let holder = ctx.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.inner.caught.lock().unwrap();
            panic!("panicked while holding the lock");
        })
        .join();
        assert!(ctx.inner.caught.is_poisoned());

        ctx.catch("send-email", FrameworkError::upstream("mail", "503"));

        let caught = ctx.caught_failures();
        assert_eq!(caught.len(), 1);
        assert!(caught[0].is_retriable());
    }
}
