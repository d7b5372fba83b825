//! Durable execution queue and step memo over SeaORM

use crate::database::{DatabaseType, DbConnection};
use crate::error::FrameworkError;
use crate::workflow::entities::{workflow_executions, workflow_steps};
use crate::workflow::memo::{StepResult, StepStore};
use crate::workflow::types::{ClaimedExecution, ExecutionHandle, ExecutionStatus, StepStatus};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDateTime, Utc};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Candidates inspected per claim
const CLAIM_BATCH: u64 = 32;

/// Advisory lock keys held for the length of a claim or enqueue transaction
const CLAIM_LOCK: i64 = 0x6f61_6c01;
const ENQUEUE_LOCK: i64 = 0x6f61_6c02;

/// Serialize the surrounding transaction against others using `key`
///
/// Postgres takes a transaction-scoped advisory lock. SQLite already allows
/// a single writer at a time.
async fn advisory_lock<C: ConnectionTrait>(
    conn: &C,
    kind: DatabaseType,
    key: i64,
) -> Result<(), FrameworkError> {
    if kind == DatabaseType::Postgres {
        conn.execute_unprepared(&format!("SELECT pg_advisory_xact_lock({})", key))
            .await?;
    }
    Ok(())
}

fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

fn after(delay: Duration) -> NaiveDateTime {
    now() + ChronoDuration::milliseconds(delay.as_millis() as i64)
}

/// Queue of workflow executions
#[derive(Clone)]
pub struct ExecutionStore {
    db: DbConnection,
}

impl ExecutionStore {
    pub fn new(db: DbConnection) -> Self {
        Self { db }
    }

    /// Enqueue an execution unless one with the same key is still pending
    pub async fn enqueue(
        &self,
        name: &str,
        key: &str,
        input: &Value,
        max_attempts: u32,
    ) -> Result<ExecutionHandle, FrameworkError> {
        self.enqueue_unless(name, key, input, max_attempts, Some(ExecutionStatus::Pending))
            .await
    }

    /// Enqueue an execution unless the key was ever enqueued before
    ///
    /// Used for cron ticks, where the key is the due minute.
    pub async fn enqueue_once(
        &self,
        name: &str,
        key: &str,
        input: &Value,
        max_attempts: u32,
    ) -> Result<ExecutionHandle, FrameworkError> {
        self.enqueue_unless(name, key, input, max_attempts, None).await
    }

    /// Look up and insert in one serialized transaction, so concurrent
    /// triggers for the same key produce a single row
    async fn enqueue_unless(
        &self,
        name: &str,
        key: &str,
        input: &Value,
        max_attempts: u32,
        status: Option<ExecutionStatus>,
    ) -> Result<ExecutionHandle, FrameworkError> {
        let txn = self.db.inner().begin().await?;
        advisory_lock(&txn, self.db.kind(), ENQUEUE_LOCK).await?;

        let mut existing = workflow_executions::Entity::find()
            .filter(workflow_executions::Column::Name.eq(name))
            .filter(workflow_executions::Column::IdempotencyKey.eq(key));
        if let Some(status) = status {
            existing = existing.filter(workflow_executions::Column::Status.eq(status.as_str()));
        }

        let handle = match existing.one(&txn).await? {
            Some(row) => Self::handle(row, false),
            None => Self::insert(&txn, name, key, input, max_attempts).await?,
        };
        txn.commit().await?;
        Ok(handle)
    }

    async fn insert<C: ConnectionTrait>(
        conn: &C,
        name: &str,
        key: &str,
        input: &Value,
        max_attempts: u32,
    ) -> Result<ExecutionHandle, FrameworkError> {
        let now = now();
        let model = workflow_executions::ActiveModel {
            name: Set(name.to_string()),
            idempotency_key: Set(key.to_string()),
            status: Set(ExecutionStatus::Pending.as_str().to_string()),
            input: Set(serde_json::to_string(input)?),
            output: Set(None),
            error: Set(None),
            attempts: Set(0),
            max_attempts: Set(max_attempts.max(1) as i32),
            next_run_at: Set(None),
            locked_until: Set(None),
            worker_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            started_at: Set(None),
            completed_at: Set(None),
            ..Default::default()
        };

        let inserted = model.insert(conn).await?;
        tracing::info!(
            execution_id = inserted.id,
            workflow = name,
            key,
            "execution enqueued"
        );
        Ok(Self::handle(inserted, true))
    }

    fn handle(row: workflow_executions::Model, created: bool) -> ExecutionHandle {
        ExecutionHandle {
            id: row.id,
            name: row.name,
            idempotency_key: row.idempotency_key,
            created,
        }
    }

    pub async fn find(&self, id: i64) -> Result<Option<workflow_executions::Model>, FrameworkError> {
        Ok(workflow_executions::Entity::find_by_id(id)
            .one(self.db.inner())
            .await?)
    }

    pub async fn status(&self, id: i64) -> Result<ExecutionStatus, FrameworkError> {
        let row = self.load(id).await?;
        ExecutionStatus::parse(&row.status)
            .ok_or_else(|| FrameworkError::internal("Invalid workflow status"))
    }

    /// Every execution for a (name, key), oldest first
    pub async fn find_by_key(
        &self,
        name: &str,
        key: &str,
    ) -> Result<Vec<workflow_executions::Model>, FrameworkError> {
        Ok(workflow_executions::Entity::find()
            .filter(workflow_executions::Column::Name.eq(name))
            .filter(workflow_executions::Column::IdempotencyKey.eq(key))
            .order_by_asc(workflow_executions::Column::Id)
            .all(self.db.inner())
            .await?)
    }

    async fn load(&self, id: i64) -> Result<workflow_executions::Model, FrameworkError> {
        self.find(id)
            .await?
            .ok_or_else(|| FrameworkError::model_not_found("Workflow execution"))
    }

    /// Claim the next runnable execution
    ///
    /// Runnable means pending and due, or running with an expired lease.
    /// Candidates are skipped when their workflow is at its concurrency limit
    /// or when another execution with the same key is running.
    pub async fn claim_next(
        &self,
        worker_id: &str,
        lock_timeout: Duration,
        limits: &HashMap<String, usize>,
    ) -> Result<Option<ClaimedExecution>, FrameworkError> {
        let txn = self.db.inner().begin().await?;
        // The running set read below must not change before the claim commits
        advisory_lock(&txn, self.db.kind(), CLAIM_LOCK).await?;
        let now = now();

        let running = workflow_executions::Entity::find()
            .filter(workflow_executions::Column::Status.eq(ExecutionStatus::Running.as_str()))
            .filter(workflow_executions::Column::LockedUntil.gt(now))
            .all(&txn)
            .await?;

        let mut running_per_name: HashMap<&str, usize> = HashMap::new();
        let mut running_keys: HashSet<(&str, &str)> = HashSet::new();
        for row in &running {
            *running_per_name.entry(row.name.as_str()).or_default() += 1;
            running_keys.insert((row.name.as_str(), row.idempotency_key.as_str()));
        }

        let runnable = Condition::any()
            .add(
                Condition::all()
                    .add(workflow_executions::Column::Status.eq(ExecutionStatus::Pending.as_str()))
                    .add(
                        Condition::any()
                            .add(workflow_executions::Column::NextRunAt.is_null())
                            .add(workflow_executions::Column::NextRunAt.lte(now)),
                    ),
            )
            .add(
                Condition::all()
                    .add(workflow_executions::Column::Status.eq(ExecutionStatus::Running.as_str()))
                    .add(workflow_executions::Column::LockedUntil.lte(now)),
            );

        let mut query = workflow_executions::Entity::find()
            .filter(runnable)
            .order_by_asc(workflow_executions::Column::Id)
            .limit(CLAIM_BATCH);
        if self.db.kind() == DatabaseType::Postgres {
            query = query.lock_with_behavior(LockType::Update, LockBehavior::SkipLocked);
        }
        let candidates = query.all(&txn).await?;

        let picked = candidates.into_iter().find(|row| {
            let saturated = limits
                .get(&row.name)
                .map(|limit| running_per_name.get(row.name.as_str()).copied().unwrap_or(0) >= *limit)
                .unwrap_or(false);
            let key_busy = running_keys.contains(&(row.name.as_str(), row.idempotency_key.as_str()));
            !saturated && !key_busy
        });

        let Some(row) = picked else {
            txn.commit().await?;
            return Ok(None);
        };

        let attempts = row.attempts + 1;
        let started_at = row.started_at.unwrap_or(now);
        let mut active: workflow_executions::ActiveModel = row.into();
        active.status = Set(ExecutionStatus::Running.as_str().to_string());
        active.attempts = Set(attempts);
        active.locked_until = Set(Some(after(lock_timeout)));
        active.worker_id = Set(Some(worker_id.to_string()));
        active.started_at = Set(Some(started_at));
        active.updated_at = Set(now);
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        Ok(Some(ClaimedExecution {
            id: updated.id,
            name: updated.name,
            idempotency_key: updated.idempotency_key,
            input: serde_json::from_str(&updated.input)?,
            attempt: updated.attempts.max(1) as u32,
            max_attempts: updated.max_attempts.max(1) as u32,
        }))
    }

    pub async fn mark_succeeded(&self, id: i64, output: &Value) -> Result<(), FrameworkError> {
        let now = now();
        let mut active: workflow_executions::ActiveModel = self.load(id).await?.into();
        active.status = Set(ExecutionStatus::Succeeded.as_str().to_string());
        active.output = Set(Some(serde_json::to_string(output)?));
        active.completed_at = Set(Some(now));
        active.locked_until = Set(None);
        active.worker_id = Set(None);
        active.updated_at = Set(now);
        active.update(self.db.inner()).await?;
        Ok(())
    }

    pub async fn mark_failed(&self, id: i64, error: &str) -> Result<(), FrameworkError> {
        let now = now();
        let mut active: workflow_executions::ActiveModel = self.load(id).await?.into();
        active.status = Set(ExecutionStatus::Failed.as_str().to_string());
        active.error = Set(Some(error.to_string()));
        active.completed_at = Set(Some(now));
        active.locked_until = Set(None);
        active.worker_id = Set(None);
        active.updated_at = Set(now);
        active.update(self.db.inner()).await?;
        Ok(())
    }

    /// Put an execution back in the queue after `delay`
    pub async fn requeue(&self, id: i64, error: &str, delay: Duration) -> Result<(), FrameworkError> {
        let mut active: workflow_executions::ActiveModel = self.load(id).await?.into();
        active.status = Set(ExecutionStatus::Pending.as_str().to_string());
        active.error = Set(Some(error.to_string()));
        active.next_run_at = Set(Some(after(delay)));
        active.locked_until = Set(None);
        active.worker_id = Set(None);
        active.updated_at = Set(now());
        active.update(self.db.inner()).await?;
        Ok(())
    }

    /// Cancel pending executions for a key, returning how many were cancelled
    pub async fn cancel_pending(&self, name: &str, key: &str) -> Result<u64, FrameworkError> {
        let now = now();
        let result = workflow_executions::Entity::update_many()
            .col_expr(
                workflow_executions::Column::Status,
                Expr::value(ExecutionStatus::Cancelled.as_str()),
            )
            .col_expr(workflow_executions::Column::CompletedAt, Expr::value(now))
            .col_expr(workflow_executions::Column::UpdatedAt, Expr::value(now))
            .filter(workflow_executions::Column::Name.eq(name))
            .filter(workflow_executions::Column::IdempotencyKey.eq(key))
            .filter(workflow_executions::Column::Status.eq(ExecutionStatus::Pending.as_str()))
            .exec(self.db.inner())
            .await?;
        Ok(result.rows_affected)
    }
}

async fn touch_lease<C: ConnectionTrait>(
    db: &C,
    id: i64,
    lock_timeout: Duration,
) -> Result<(), FrameworkError> {
    workflow_executions::Entity::update_many()
        .col_expr(
            workflow_executions::Column::LockedUntil,
            Expr::value(after(lock_timeout)),
        )
        .col_expr(workflow_executions::Column::UpdatedAt, Expr::value(now()))
        .filter(workflow_executions::Column::Id.eq(id))
        .filter(workflow_executions::Column::Status.eq(ExecutionStatus::Running.as_str()))
        .exec(db)
        .await?;
    Ok(())
}

/// Step memo backed by the `workflow_steps` table
#[derive(Clone)]
pub struct SeaOrmStepStore {
    db: DbConnection,
    lease: Option<Duration>,
}

impl SeaOrmStepStore {
    pub fn new(db: DbConnection) -> Self {
        Self { db, lease: None }
    }

    /// Refresh the execution lease by `lock_timeout` after every step
    pub fn with_lease(mut self, lock_timeout: Duration) -> Self {
        self.lease = Some(lock_timeout);
        self
    }

    async fn row(
        &self,
        execution_id: i64,
        step: &str,
    ) -> Result<Option<workflow_steps::Model>, FrameworkError> {
        Ok(workflow_steps::Entity::find()
            .filter(workflow_steps::Column::ExecutionId.eq(execution_id))
            .filter(workflow_steps::Column::StepName.eq(step))
            .one(self.db.inner())
            .await?)
    }
}

#[async_trait]
impl StepStore for SeaOrmStepStore {
    async fn load(&self, execution_id: i64, step: &str) -> Result<StepResult, FrameworkError> {
        let Some(row) = self.row(execution_id, step).await? else {
            return Ok(StepResult::NotRun);
        };

        match StepStatus::parse(&row.status) {
            Some(StepStatus::Succeeded) => {
                let output = row.output.as_deref().unwrap_or("null");
                Ok(StepResult::Succeeded(serde_json::from_str(output)?))
            }
            Some(StepStatus::Failed) => Ok(StepResult::Failed {
                error: row.error.unwrap_or_default(),
                retriable: row.retriable,
                attempts: row.attempts.max(0) as u32,
            }),
            None => Err(FrameworkError::internal(format!(
                "Invalid step status '{}'",
                row.status
            ))),
        }
    }

    async fn record(
        &self,
        execution_id: i64,
        step: &str,
        result: &StepResult,
    ) -> Result<(), FrameworkError> {
        let (status, output, error, retriable, attempts) = match result {
            StepResult::Succeeded(value) => (
                StepStatus::Succeeded,
                Some(serde_json::to_string(value)?),
                None,
                false,
                None,
            ),
            StepResult::Failed {
                error,
                retriable,
                attempts,
            } => (
                StepStatus::Failed,
                None,
                Some(error.clone()),
                *retriable,
                Some(*attempts as i32),
            ),
            StepResult::NotRun => {
                workflow_steps::Entity::delete_many()
                    .filter(workflow_steps::Column::ExecutionId.eq(execution_id))
                    .filter(workflow_steps::Column::StepName.eq(step))
                    .filter(workflow_steps::Column::Status.ne(StepStatus::Succeeded.as_str()))
                    .exec(self.db.inner())
                    .await?;
                return Ok(());
            }
        };

        let now = now();
        match self.row(execution_id, step).await? {
            Some(row) if row.status == StepStatus::Succeeded.as_str() => Ok(()),
            Some(row) => {
                let previous_attempts = row.attempts;
                let mut active: workflow_steps::ActiveModel = row.into();
                active.status = Set(status.as_str().to_string());
                active.output = Set(output);
                active.error = Set(error);
                active.retriable = Set(retriable);
                active.attempts = Set(attempts.unwrap_or(previous_attempts));
                active.updated_at = Set(now);
                active.update(self.db.inner()).await?;
                Ok(())
            }
            None => {
                let model = workflow_steps::ActiveModel {
                    execution_id: Set(execution_id),
                    step_name: Set(step.to_string()),
                    status: Set(status.as_str().to_string()),
                    output: Set(output),
                    error: Set(error),
                    retriable: Set(retriable),
                    attempts: Set(attempts.unwrap_or(0)),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                };
                model.insert(self.db.inner()).await?;
                Ok(())
            }
        }
    }

    async fn clear(&self, execution_id: i64) -> Result<(), FrameworkError> {
        workflow_steps::Entity::delete_many()
            .filter(workflow_steps::Column::ExecutionId.eq(execution_id))
            .exec(self.db.inner())
            .await?;
        Ok(())
    }

    async fn heartbeat(&self, execution_id: i64) -> Result<(), FrameworkError> {
        match self.lease {
            Some(lock_timeout) => touch_lease(self.db.inner(), execution_id, lock_timeout).await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::TestDatabase;
    use crate::workflow::migration;
    use sea_orm_migration::prelude::*;
    use serde_json::json;

    pub struct TestMigrator;

    #[async_trait::async_trait]
    impl MigratorTrait for TestMigrator {
        fn migrations() -> Vec<Box<dyn MigrationTrait>> {
            migration::migrations()
        }
    }

    async fn setup() -> (TestDatabase, ExecutionStore) {
        let db = TestDatabase::fresh::<TestMigrator>().await.expect("test db");
        let store = ExecutionStore::new(db.conn().clone());
        (db, store)
    }

    const LEASE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_enqueue_dedupes_pending() {
        let (_db, store) = setup().await;

        let first = store.enqueue("tool.scheduled", "foo", &json!({"slug": "foo"}), 2).await.unwrap();
        let second = store.enqueue("tool.scheduled", "foo", &json!({"slug": "foo"}), 2).await.unwrap();
        let other = store.enqueue("tool.scheduled", "bar", &json!({"slug": "bar"}), 2).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
        assert_ne!(first.id, other.id);
    }

    #[tokio::test]
    async fn test_enqueue_once_ignores_finished_rows() {
        let (_db, store) = setup().await;

        let first = store.enqueue_once("publish-tools", "2024-06-01T10:00", &json!({}), 1).await.unwrap();
        store.mark_succeeded(first.id, &json!({})).await.unwrap();
        let again = store.enqueue_once("publish-tools", "2024-06-01T10:00", &json!({}), 1).await.unwrap();

        assert!(!again.created);
        assert_eq!(store.find_by_key("publish-tools", "2024-06-01T10:00").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_claim_skips_running_key_and_saturated_workflow() {
        let (_db, store) = setup().await;
        let limits = HashMap::from([("tool.scheduled".to_string(), 1usize)]);

        store.enqueue("tool.scheduled", "foo", &json!({"slug": "foo"}), 2).await.unwrap();
        let claimed = store.claim_next("w1", LEASE, &limits).await.unwrap().unwrap();
        assert_eq!(claimed.attempt, 1);
        assert_eq!(claimed.input, json!({"slug": "foo"}));

        // Same key while the first one runs
        store.enqueue("tool.scheduled", "foo", &json!({"slug": "foo"}), 2).await.unwrap();
        // Different key, but the workflow is saturated
        store.enqueue("tool.scheduled", "bar", &json!({"slug": "bar"}), 2).await.unwrap();
        // Unrelated workflow
        let featured = store.enqueue("tool.featured", "foo", &json!({"slug": "foo"}), 1).await.unwrap();

        let next = store.claim_next("w1", LEASE, &limits).await.unwrap().unwrap();
        assert_eq!(next.id, featured.id);
        assert!(store.claim_next("w1", LEASE, &limits).await.unwrap().is_none());

        store.mark_succeeded(claimed.id, &json!({})).await.unwrap();
        let after_finish = store.claim_next("w1", LEASE, &limits).await.unwrap().unwrap();
        assert_eq!(after_finish.idempotency_key, "foo");
    }

    #[tokio::test]
    async fn test_concurrent_claims_respect_limit() {
        let (_db, store) = setup().await;
        let limits = HashMap::from([("tool.scheduled".to_string(), 1usize)]);
        store.enqueue("tool.scheduled", "foo", &json!({"slug": "foo"}), 2).await.unwrap();
        store.enqueue("tool.scheduled", "bar", &json!({"slug": "bar"}), 2).await.unwrap();

        let (a, b, c) = tokio::join!(
            store.claim_next("w1", LEASE, &limits),
            store.claim_next("w2", LEASE, &limits),
            store.claim_next("w3", LEASE, &limits),
        );

        let claimed = [a.unwrap(), b.unwrap(), c.unwrap()]
            .into_iter()
            .flatten()
            .count();
        assert_eq!(claimed, 1);
    }

    #[tokio::test]
    async fn test_concurrent_enqueues_share_one_row() {
        let (_db, store) = setup().await;
        let input = json!({"slug": "foo"});

        let (a, b) = tokio::join!(
            store.enqueue("tool.scheduled", "foo", &input, 2),
            store.enqueue("tool.scheduled", "foo", &input, 2),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.id, b.id);
        assert_ne!(a.created, b.created);
    }

    #[tokio::test]
    async fn test_requeue_respects_backoff() {
        let (_db, store) = setup().await;
        let limits = HashMap::new();

        let handle = store.enqueue("fetch-tools", "tick", &json!({}), 2).await.unwrap();
        let claimed = store.claim_next("w1", LEASE, &limits).await.unwrap().unwrap();
        store.requeue(claimed.id, "timeout", Duration::from_secs(3600)).await.unwrap();

        assert_eq!(store.status(handle.id).await.unwrap(), ExecutionStatus::Pending);
        assert!(store.claim_next("w1", LEASE, &limits).await.unwrap().is_none());

        store.requeue(claimed.id, "timeout", Duration::ZERO).await.unwrap();
        let reclaimed = store.claim_next("w1", LEASE, &limits).await.unwrap().unwrap();
        assert_eq!(reclaimed.attempt, 2);
    }

    #[tokio::test]
    async fn test_cancel_pending() {
        let (_db, store) = setup().await;

        let handle = store.enqueue("tool.scheduled", "foo", &json!({}), 2).await.unwrap();
        assert_eq!(store.cancel_pending("tool.scheduled", "foo").await.unwrap(), 1);
        assert_eq!(store.status(handle.id).await.unwrap(), ExecutionStatus::Cancelled);
        assert_eq!(store.cancel_pending("tool.scheduled", "foo").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_step_store_memo() {
        let (db, _store) = setup().await;
        let steps = SeaOrmStepStore::new(db.conn().clone());

        assert_eq!(steps.load(1, "find-tool").await.unwrap(), StepResult::NotRun);

        let failed = StepResult::Failed {
            error: "timeout".into(),
            retriable: true,
            attempts: 1,
        };
        steps.record(1, "find-tool", &failed).await.unwrap();
        assert_eq!(steps.load(1, "find-tool").await.unwrap(), failed);

        steps
            .record(1, "find-tool", &StepResult::Succeeded(json!({"id": 3})))
            .await
            .unwrap();
        steps
            .record(1, "find-tool", &StepResult::Succeeded(json!({"id": 4})))
            .await
            .unwrap();
        assert_eq!(
            steps.load(1, "find-tool").await.unwrap(),
            StepResult::Succeeded(json!({"id": 3}))
        );

        steps.clear(1).await.unwrap();
        assert_eq!(steps.load(1, "find-tool").await.unwrap(), StepResult::NotRun);
    }
}
