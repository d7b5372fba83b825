//! Cron scheduler
//!
//! Tasks are registered with a fluent builder and evaluated once per
//! minute against their cron expression in a fixed UTC offset.
//!
//! ```rust,ignore
//! use openalt_kit::Schedule;
//!
//! pub fn register(schedule: &mut Schedule) {
//!     schedule.add(
//!         schedule.call(|tick| async move {
//!             tracing::info!(minute = %tick.key(), "tick");
//!             Ok(())
//!         })
//!         .hourly()
//!         .name("heartbeat")
//!     );
//! }
//! ```
//!
//! # Running the Scheduler
//!
//! ```bash
//! # Run due tasks once (for system cron)
//! openalt schedule:run
//!
//! # Run as daemon (continuous)
//! openalt schedule:work
//!
//! # List all scheduled tasks
//! openalt schedule:list
//! ```

pub mod builder;
pub mod expression;
pub mod task;

pub use builder::TaskBuilder;
pub use expression::{CronExpression, DayOfWeek};
pub use task::{BoxedTask, Task, TaskEntry, TaskResult, Tick};

use crate::error::FrameworkError;
use chrono::{Duration as ChronoDuration, Utc};
use std::time::Duration;

/// Registered scheduled tasks
#[derive(Default)]
pub struct Schedule {
    tasks: Vec<TaskEntry>,
}

impl Schedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trait-based scheduled task
    pub fn task<T: Task + 'static>(&self, task: T) -> TaskBuilder {
        TaskBuilder::from_task(task)
    }

    /// Register a closure-based scheduled task
    pub fn call<F, Fut>(&self, f: F) -> TaskBuilder
    where
        F: Fn(Tick) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<(), FrameworkError>> + Send + 'static,
    {
        TaskBuilder::from_async(f)
    }

    /// Add a configured task builder to the schedule
    pub fn add(&mut self, builder: TaskBuilder) -> &mut Self {
        let task_index = self.tasks.len();
        self.tasks.push(builder.build(task_index));
        self
    }

    pub fn tasks(&self) -> &[TaskEntry] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn find(&self, name: &str) -> Option<&TaskEntry> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Tasks due during the minute of `tick`
    pub fn due_tasks(&self, tick: &Tick) -> Vec<&TaskEntry> {
        self.tasks.iter().filter(|t| t.is_due_at(tick)).collect()
    }

    /// Run every task due at `tick`, one after another
    ///
    /// A failing task is logged and does not stop the others.
    pub async fn run_due_tasks(&self, tick: &Tick) -> Vec<(&str, Result<(), FrameworkError>)> {
        let mut results = Vec::new();

        for task in self.due_tasks(tick) {
            let result = task.run(tick).await;
            match &result {
                Ok(()) => tracing::info!(task = %task.name, minute = %tick.key(), "scheduled task ran"),
                Err(err) => tracing::error!(task = %task.name, minute = %tick.key(), error = %err, "scheduled task failed"),
            }
            results.push((task.name.as_str(), result));
        }

        results
    }

    /// Run a specific task by name, regardless of its schedule
    pub async fn run_task(&self, name: &str, tick: &Tick) -> Option<Result<(), FrameworkError>> {
        match self.find(name) {
            Some(task) => Some(task.run(tick).await),
            None => None,
        }
    }

    /// Run due tasks at every minute boundary until ctrl-c
    pub async fn work(&self) -> Result<(), FrameworkError> {
        tracing::info!(tasks = self.len(), "scheduler started");

        loop {
            let wait = until_next_minute();
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("scheduler stopped");
                    return Ok(());
                }
            }

            let tick = Tick::now();
            self.run_due_tasks(&tick).await;
        }
    }
}

fn until_next_minute() -> Duration {
    let now = Utc::now();
    let current = Tick::at(now).due;
    let next = current + ChronoDuration::minutes(1);
    (next - now)
        .to_std()
        .unwrap_or(Duration::from_secs(60))
        // land just past the boundary
        + Duration::from_millis(50)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingTask(Arc<AtomicUsize>);

    #[async_trait]
    impl Task for CountingTask {
        async fn handle(&self, _tick: &Tick) -> TaskResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn tick(rfc3339: &str) -> Tick {
        Tick::at(DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc))
    }

    #[test]
    fn test_schedule_find_task() {
        let mut schedule = Schedule::new();
        let counter = Arc::new(AtomicUsize::new(0));
        schedule.add(schedule.task(CountingTask(counter)).every_minute().name("find-me"));

        assert_eq!(schedule.len(), 1);
        assert!(schedule.find("find-me").is_some());
        assert!(schedule.find("not-exists").is_none());
    }

    #[tokio::test]
    async fn test_only_due_tasks_run() {
        let hourly = Arc::new(AtomicUsize::new(0));
        let midnight = Arc::new(AtomicUsize::new(0));
        let plus_one = FixedOffset::east_opt(3600).unwrap();

        let mut schedule = Schedule::new();
        schedule.add(schedule.task(CountingTask(hourly.clone())).hourly().name("hourly"));
        schedule.add(
            schedule
                .task(CountingTask(midnight.clone()))
                .daily()
                .timezone(plus_one)
                .name("midnight"),
        );

        let ran = schedule.run_due_tasks(&tick("2024-06-01T23:00:10Z")).await;
        assert_eq!(ran.len(), 2);

        let ran = schedule.run_due_tasks(&tick("2024-06-01T23:30:00Z")).await;
        assert!(ran.is_empty());

        assert_eq!(hourly.load(Ordering::SeqCst), 1);
        assert_eq!(midnight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_closure_task_receives_tick() {
        let mut schedule = Schedule::new();
        schedule.add(
            schedule
                .call(|tick: Tick| async move {
                    if tick.key() == "2024-06-01T10:00Z" {
                        Ok(())
                    } else {
                        Err(FrameworkError::internal("wrong tick"))
                    }
                })
                .name("closure"),
        );

        let result = schedule.run_task("closure", &tick("2024-06-01T10:00:30Z")).await;
        assert!(matches!(result, Some(Ok(()))));
        assert!(schedule.run_task("missing", &Tick::now()).await.is_none());
    }

    #[test]
    fn test_until_next_minute_is_bounded() {
        let wait = until_next_minute();
        assert!(wait <= Duration::from_millis(60_050));
    }
}
