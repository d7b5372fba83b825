//! Workflow worker daemon

use crate::error::FrameworkError;
use crate::workflow::config::WorkflowConfig;
use crate::workflow::engine::{run_attempt, AttemptOutcome};
use crate::workflow::memo::StepStore;
use crate::workflow::registry::WorkflowRegistry;
use crate::workflow::store::{ExecutionStore, SeaOrmStepStore};
use crate::workflow::types::{ClaimedExecution, ExecutionStatus};
use crate::database::DbConnection;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Polls the execution queue and runs claimed executions
#[derive(Clone)]
pub struct WorkflowWorker {
    config: Arc<WorkflowConfig>,
    worker_id: String,
    registry: Arc<WorkflowRegistry>,
    executions: ExecutionStore,
    steps: Arc<dyn StepStore>,
}

impl WorkflowWorker {
    pub fn new(db: DbConnection, registry: Arc<WorkflowRegistry>, config: WorkflowConfig) -> Self {
        let random: u32 = rand::thread_rng().gen();
        let worker_id = format!("{}-{:08x}", std::process::id(), random);
        let lease = Duration::from_secs(config.lock_timeout_secs);

        Self {
            config: Arc::new(config),
            worker_id,
            registry,
            executions: ExecutionStore::new(db.clone()),
            steps: Arc::new(SeaOrmStepStore::new(db).with_lease(lease)),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    fn lease(&self) -> Duration {
        Duration::from_secs(self.config.lock_timeout_secs)
    }

    /// Run until ctrl-c, then wait for in-flight executions
    pub async fn run(self) -> Result<(), FrameworkError> {
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let limits = self.registry.concurrency_limits();

        tracing::info!(
            worker_id = %self.worker_id,
            concurrency = self.config.concurrency,
            workflows = ?self.registry.names(),
            "workflow worker started"
        );

        loop {
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => permit
                    .map_err(|e| FrameworkError::internal(e.to_string()))?,
                _ = tokio::signal::ctrl_c() => break,
            };

            let claim = match self
                .executions
                .claim_next(&self.worker_id, self.lease(), &limits)
                .await
            {
                Ok(claim) => claim,
                Err(err) => {
                    tracing::error!(error = %err, "failed to claim execution");
                    None
                }
            };

            match claim {
                Some(claimed) => {
                    let worker = self.clone();
                    tokio::spawn(async move {
                        let id = claimed.id;
                        if let Err(err) = worker.process(claimed).await {
                            tracing::error!(execution_id = id, error = %err, "workflow execution error");
                        }
                        drop(permit);
                    });
                }
                None => {
                    drop(permit);
                    tokio::select! {
                        _ = tokio::time::sleep(poll) => {}
                        _ = tokio::signal::ctrl_c() => break,
                    }
                }
            }
        }

        tracing::info!(worker_id = %self.worker_id, "shutting down, waiting for running executions");
        let _ = semaphore
            .acquire_many(self.config.concurrency as u32)
            .await;
        Ok(())
    }

    /// Claim and run executions until none is runnable
    ///
    /// Executions requeued with a backoff are left for a later pass.
    pub async fn drain(&self) -> Result<usize, FrameworkError> {
        let limits = self.registry.concurrency_limits();
        let mut processed = 0;
        while let Some(claimed) = self
            .executions
            .claim_next(&self.worker_id, self.lease(), &limits)
            .await?
        {
            self.process(claimed).await?;
            processed += 1;
        }
        Ok(processed)
    }

    /// Run one attempt of a claimed execution and persist its outcome
    pub async fn process(&self, claimed: ClaimedExecution) -> Result<ExecutionStatus, FrameworkError> {
        let Some(workflow) = self.registry.find(&claimed.name) else {
            self.executions
                .mark_failed(claimed.id, "Workflow not registered")
                .await?;
            return Ok(ExecutionStatus::Failed);
        };

        tracing::info!(
            execution_id = claimed.id,
            workflow = %claimed.name,
            key = %claimed.idempotency_key,
            attempt = claimed.attempt,
            "execution started"
        );

        let outcome = run_attempt(
            workflow.as_ref(),
            self.steps.clone(),
            claimed.id,
            claimed.attempt,
            claimed.max_attempts,
            claimed.input,
        )
        .await;

        match outcome {
            AttemptOutcome::Succeeded { output, .. } => {
                self.executions.mark_succeeded(claimed.id, &output).await?;
                self.steps.clear(claimed.id).await?;
                tracing::info!(execution_id = claimed.id, workflow = %claimed.name, "execution succeeded");
                Ok(ExecutionStatus::Succeeded)
            }
            AttemptOutcome::Retry { error } => {
                let delay = workflow.retry_policy().backoff_after(claimed.attempt);
                self.executions.requeue(claimed.id, &error, delay).await?;
                tracing::warn!(
                    execution_id = claimed.id,
                    workflow = %claimed.name,
                    attempt = claimed.attempt,
                    delay_secs = delay.as_secs(),
                    %error,
                    "execution requeued"
                );
                Ok(ExecutionStatus::Pending)
            }
            AttemptOutcome::Failed { error } => {
                self.executions.mark_failed(claimed.id, &error).await?;
                self.steps.clear(claimed.id).await?;
                tracing::error!(execution_id = claimed.id, workflow = %claimed.name, %error, "execution failed");
                Ok(ExecutionStatus::Failed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::TestDatabase;
    use crate::workflow::context::WorkflowContext;
    use crate::workflow::engine::Workflow;
    use crate::workflow::migration;
    use crate::workflow::types::RetryPolicy;
    use async_trait::async_trait;
    use sea_orm_migration::prelude::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct TestMigrator;

    #[async_trait]
    impl MigratorTrait for TestMigrator {
        fn migrations() -> Vec<Box<dyn MigrationTrait>> {
            migration::migrations()
        }
    }

    struct TwoSteps {
        first: Arc<AtomicUsize>,
        second: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Workflow for TwoSteps {
        fn name(&self) -> &'static str {
            "two-steps"
        }

        fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy::new(2, Duration::ZERO)
        }

        async fn run(&self, ctx: &WorkflowContext, _input: Value) -> Result<Value, FrameworkError> {
            let first = self.first.clone();
            let second = self.second.clone();

            let a: i32 = ctx
                .run_step("first", || async move {
                    first.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await?;
            let b: i32 = ctx
                .run_step("second", || async move {
                    if second.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(FrameworkError::upstream("remote", "flaky"))
                    } else {
                        Ok(2)
                    }
                })
                .await?;
            Ok(json!(a + b))
        }
    }

    #[tokio::test]
    async fn test_retry_flow() {
        let db = TestDatabase::fresh::<TestMigrator>().await.expect("test db");
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let mut registry = WorkflowRegistry::new();
        registry.register(TwoSteps {
            first: first.clone(),
            second: second.clone(),
        });

        let worker = WorkflowWorker::new(db.conn().clone(), Arc::new(registry), WorkflowConfig::default());
        let executions = ExecutionStore::new(db.conn().clone());
        let handle = executions.enqueue("two-steps", "k", &json!({}), 2).await.unwrap();

        let processed = worker.drain().await.unwrap();

        assert_eq!(processed, 2);
        assert_eq!(executions.status(handle.id).await.unwrap(), ExecutionStatus::Succeeded);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);

        let row = executions.find(handle.id).await.unwrap().unwrap();
        assert_eq!(row.output.as_deref(), Some("3"));
        assert_eq!(row.attempts, 2);
    }

    #[tokio::test]
    async fn test_unregistered_workflow_fails() {
        let db = TestDatabase::fresh::<TestMigrator>().await.expect("test db");
        let worker = WorkflowWorker::new(
            db.conn().clone(),
            Arc::new(WorkflowRegistry::new()),
            WorkflowConfig::default(),
        );
        let executions = ExecutionStore::new(db.conn().clone());
        let handle = executions.enqueue("ghost", "k", &json!({}), 1).await.unwrap();

        worker.drain().await.unwrap();

        assert_eq!(executions.status(handle.id).await.unwrap(), ExecutionStatus::Failed);
    }
}
