//! Scheduled task trait and entry types

use super::expression::CronExpression;
use crate::error::FrameworkError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Type alias for boxed task handlers
pub type BoxedTask = Arc<dyn Task>;

/// Type alias for async task result
pub type TaskResult = Result<(), FrameworkError>;

/// The minute a task was due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    pub due: DateTime<Utc>,
}

impl Tick {
    /// Truncate `time` to its minute
    pub fn at(time: DateTime<Utc>) -> Self {
        let due = time
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(time);
        Self { due }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Stable identifier of the minute, e.g. `2024-06-01T10:00Z`
    pub fn key(&self) -> String {
        self.due.format("%Y-%m-%dT%H:%MZ").to_string()
    }
}

/// Trait for defining scheduled tasks
///
/// ```rust,ignore
/// pub struct PublishToolsTask { queue: ExecutionStore }
///
/// #[async_trait]
/// impl Task for PublishToolsTask {
///     async fn handle(&self, tick: &Tick) -> TaskResult {
///         self.queue.enqueue_once("publish-tools", &tick.key(), &json!({}), 1).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Task: Send + Sync {
    async fn handle(&self, tick: &Tick) -> TaskResult;
}

/// A registered task entry in the schedule
pub struct TaskEntry {
    pub name: String,
    pub expression: CronExpression,
    /// Offset the expression is evaluated in
    pub timezone: FixedOffset,
    pub task: BoxedTask,
    pub description: Option<String>,
}

impl TaskEntry {
    /// Check if this task is due during the minute of `tick`
    pub fn is_due_at(&self, tick: &Tick) -> bool {
        self.expression
            .is_due_at(&tick.due.with_timezone(&self.timezone))
    }

    pub async fn run(&self, tick: &Tick) -> TaskResult {
        self.task.handle(tick).await
    }

    pub fn schedule_description(&self) -> String {
        format!("{} ({})", self.expression, self.timezone)
    }
}

/// Wrapper for closure-based tasks
pub(crate) struct ClosureTask<F>
where
    F: Fn(Tick) -> BoxFuture<'static, TaskResult> + Send + Sync,
{
    pub(crate) handler: F,
}

#[async_trait]
impl<F> Task for ClosureTask<F>
where
    F: Fn(Tick) -> BoxFuture<'static, TaskResult> + Send + Sync,
{
    async fn handle(&self, tick: &Tick) -> TaskResult {
        (self.handler)(*tick).await
    }
}
