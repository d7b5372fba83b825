//! Task builder for fluent schedule configuration

use super::expression::{CronExpression, DayOfWeek};
use super::task::{BoxedTask, ClosureTask, Task, TaskEntry, TaskResult, Tick};
use chrono::{FixedOffset, Offset, Utc};
use std::future::Future;
use std::sync::Arc;

/// Builder returned by `Schedule::task()` and `Schedule::call()`
///
/// ```rust,ignore
/// schedule.add(
///     schedule.task(PublishToolsTask::new(queue))
///         .cron(&config.publish_tools.expression)?
///         .timezone(config.timezone)
///         .name("publish-tools")
/// );
/// ```
pub struct TaskBuilder {
    pub(crate) task: BoxedTask,
    pub(crate) expression: CronExpression,
    pub(crate) timezone: FixedOffset,
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
}

impl TaskBuilder {
    fn with_task(task: BoxedTask) -> Self {
        Self {
            task,
            expression: CronExpression::every_minute(),
            timezone: Utc.fix(),
            name: None,
            description: None,
        }
    }

    /// Create a TaskBuilder from an async closure receiving the due tick
    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Tick) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self::with_task(Arc::new(ClosureTask {
            handler: move |tick| Box::pin(f(tick)) as futures::future::BoxFuture<'static, TaskResult>,
        }))
    }

    /// Create a TaskBuilder from a struct implementing the Task trait
    pub fn from_task<T: Task + 'static>(task: T) -> Self {
        Self::with_task(Arc::new(task))
    }

    /// Set a custom cron expression, failing on invalid input
    pub fn cron(mut self, expression: &str) -> Result<Self, String> {
        self.expression = CronExpression::parse(expression)?;
        Ok(self)
    }

    /// Use an already parsed expression
    pub fn expression(mut self, expression: CronExpression) -> Self {
        self.expression = expression;
        self
    }

    pub fn every_minute(mut self) -> Self {
        self.expression = CronExpression::every_minute();
        self
    }

    pub fn hourly(mut self) -> Self {
        self.expression = CronExpression::hourly();
        self
    }

    /// Run once daily at midnight
    pub fn daily(mut self) -> Self {
        self.expression = CronExpression::daily();
        self
    }

    /// Run daily at `HH:MM`
    pub fn daily_at(mut self, time: &str) -> Result<Self, String> {
        self.expression = CronExpression::daily_at(time)?;
        Ok(self)
    }

    pub fn weekly_on(mut self, day: DayOfWeek) -> Self {
        self.expression = CronExpression::weekly_on(day);
        self
    }

    /// Evaluate the expression in a fixed UTC offset
    pub fn timezone(mut self, offset: FixedOffset) -> Self {
        self.timezone = offset;
        self
    }

    /// The name is used in logs and when listing scheduled tasks
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn description(mut self, desc: &str) -> Self {
        self.description = Some(desc.to_string());
        self
    }

    pub(crate) fn build(self, task_index: usize) -> TaskEntry {
        let name = self
            .name
            .unwrap_or_else(|| format!("closure-task-{}", task_index));

        TaskEntry {
            name,
            expression: self.expression,
            timezone: self.timezone,
            task: self.task,
            description: self.description,
        }
    }
}
