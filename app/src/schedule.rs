//! Cron triggers
//!
//! A due task does not run its workflow; it enqueues an execution keyed by
//! the due minute, so two schedulers ticking the same minute enqueue once.

use async_trait::async_trait;
use kit::{ExecutionStore, Schedule, Task, TaskResult, Tick};
use serde_json::json;

use crate::config::{CronSchedule, ScheduleConfig};
use crate::workflows::{self, FetchTools, PublishTools};

/// Enqueues one execution of `workflow` per due minute
pub struct EnqueueWorkflow {
    executions: ExecutionStore,
    workflow: &'static str,
}

impl EnqueueWorkflow {
    pub fn new(executions: ExecutionStore, workflow: &'static str) -> Self {
        Self {
            executions,
            workflow,
        }
    }
}

#[async_trait]
impl Task for EnqueueWorkflow {
    async fn handle(&self, tick: &Tick) -> TaskResult {
        let key = tick.key();
        let max_attempts = workflows::retry_policy(self.workflow).max_attempts;
        let handle = self
            .executions
            .enqueue_once(self.workflow, &key, &json!({ "tick": key }), max_attempts)
            .await?;

        if !handle.created {
            tracing::debug!(workflow = self.workflow, minute = %key, "tick already enqueued");
        }
        Ok(())
    }
}

/// Register the publish sweep and the nightly refresh
pub fn register(schedule: &mut Schedule, executions: &ExecutionStore, config: &ScheduleConfig) {
    let triggers: [(&'static str, &CronSchedule, &str); 2] = [
        (
            PublishTools::NAME,
            &config.publish_tools,
            "Publish scheduled tools whose date has passed",
        ),
        (
            FetchTools::NAME,
            &config.fetch_tools,
            "Refresh repository data of listed tools",
        ),
    ];

    for (workflow, cron, description) in triggers {
        let task = schedule
            .task(EnqueueWorkflow::new(executions.clone(), workflow))
            .expression(cron.expression.clone())
            .timezone(cron.timezone)
            .name(workflow)
            .description(description);
        schedule.add(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_offset;
    use crate::migrations::Migrator;
    use chrono::{TimeZone, Utc};
    use kit::TestDatabase;

    fn config() -> ScheduleConfig {
        let tz = parse_offset("+01:00").unwrap();
        ScheduleConfig {
            publish_tools: CronSchedule::new("0 */2 * * *", tz).unwrap(),
            fetch_tools: CronSchedule::new("0 0 * * *", tz).unwrap(),
        }
    }

    fn tick(hour: u32) -> Tick {
        Tick::at(Utc.with_ymd_and_hms(2024, 5, 31, hour, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_due_tasks_follow_local_time() {
        let db = TestDatabase::fresh::<Migrator>().await.unwrap();
        let mut schedule = Schedule::new();
        register(&mut schedule, &ExecutionStore::new(db.conn().clone()), &config());

        let names = |tick: Tick| -> Vec<String> {
            schedule.due_tasks(&tick).iter().map(|t| t.name.clone()).collect()
        };

        // 23:00 UTC is midnight at +01:00
        assert_eq!(names(tick(23)), vec!["publish-tools", "fetch-tools"]);
        assert_eq!(names(tick(11)), vec!["publish-tools"]);
        assert!(names(tick(10)).is_empty());
    }

    #[tokio::test]
    async fn test_minute_is_enqueued_once() {
        let db = TestDatabase::fresh::<Migrator>().await.unwrap();
        let executions = ExecutionStore::new(db.conn().clone());
        let mut schedule = Schedule::new();
        register(&mut schedule, &executions, &config());

        let due = tick(11);
        schedule.run_due_tasks(&due).await;
        schedule.run_due_tasks(&due).await;

        let rows = executions
            .find_by_key(PublishTools::NAME, &due.key())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].max_attempts, 3);
    }
}
