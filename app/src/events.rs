//! Trigger events and the bus that turns them into workflow executions

use async_trait::async_trait;
use kit::{ExecutionStore, FrameworkError};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::workflows::{self, ToolDeleted, ToolFeatured, ToolScheduled};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ToolScheduled { slug: String },
    ToolFeatured { slug: String },
    ToolDeleted { slug: String },
}

impl Event {
    /// Event name, which is also the name of the workflow it triggers
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToolScheduled { .. } => ToolScheduled::NAME,
            Self::ToolFeatured { .. } => ToolFeatured::NAME,
            Self::ToolDeleted { .. } => ToolDeleted::NAME,
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            Self::ToolScheduled { slug } | Self::ToolFeatured { slug } | Self::ToolDeleted { slug } => {
                slug
            }
        }
    }

    pub fn payload(&self) -> Value {
        json!({ "slug": self.slug() })
    }

    pub fn parse(name: &str, data: &Value) -> Result<Self, FrameworkError> {
        let slug = data
            .get("slug")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|slug| !slug.is_empty())
            .ok_or_else(|| FrameworkError::validation("data.slug", "The slug field is required."))?
            .to_string();

        match name {
            ToolScheduled::NAME => Ok(Self::ToolScheduled { slug }),
            ToolFeatured::NAME => Ok(Self::ToolFeatured { slug }),
            ToolDeleted::NAME => Ok(Self::ToolDeleted { slug }),
            other => Err(FrameworkError::validation(
                "name",
                format!("Unknown event '{}'.", other),
            )),
        }
    }
}

/// Wire format of `POST /api/events`
#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    pub name: String,
    #[serde(default)]
    pub data: Value,
}

impl EventEnvelope {
    pub fn into_event(self) -> Result<Event, FrameworkError> {
        Event::parse(&self.name, &self.data)
    }
}

#[async_trait]
pub trait EventBus: Send + Sync {
    /// Start the workflow answering to `event`
    async fn send(&self, event: &Event) -> Result<(), FrameworkError>;

    /// Cancel executions of `workflow` for `key` that have not started yet
    async fn cancel_pending(&self, workflow: &str, key: &str) -> Result<u64, FrameworkError>;
}

/// Enqueues one execution per event, keyed by the tool slug
#[derive(Clone)]
pub struct QueueEventBus {
    executions: ExecutionStore,
}

impl QueueEventBus {
    pub fn new(executions: ExecutionStore) -> Self {
        Self { executions }
    }
}

#[async_trait]
impl EventBus for QueueEventBus {
    async fn send(&self, event: &Event) -> Result<(), FrameworkError> {
        let policy = workflows::retry_policy(event.name());
        let handle = self
            .executions
            .enqueue(event.name(), event.slug(), &event.payload(), policy.max_attempts)
            .await?;

        tracing::info!(
            event = event.name(),
            slug = event.slug(),
            execution_id = handle.id,
            created = handle.created,
            "event enqueued"
        );
        Ok(())
    }

    async fn cancel_pending(&self, workflow: &str, key: &str) -> Result<u64, FrameworkError> {
        let cancelled = self.executions.cancel_pending(workflow, key).await?;
        if cancelled > 0 {
            tracing::info!(workflow, key, cancelled, "pending executions cancelled");
        }
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_events() {
        let data = json!({ "slug": "foo" });

        assert_eq!(
            Event::parse("tool.scheduled", &data).unwrap(),
            Event::ToolScheduled { slug: "foo".into() }
        );
        assert_eq!(Event::parse("tool.featured", &data).unwrap().name(), "tool.featured");
        assert_eq!(Event::parse("tool.deleted", &data).unwrap().slug(), "foo");
    }

    #[test]
    fn test_parse_rejects_unknown_and_missing_slug() {
        let unknown = Event::parse("tool.exploded", &json!({ "slug": "foo" })).unwrap_err();
        assert_eq!(unknown.status_code(), 422);

        let missing = Event::parse("tool.scheduled", &json!({})).unwrap_err();
        assert!(missing.to_string().contains("data.slug"));

        let blank = Event::parse("tool.scheduled", &json!({ "slug": "  " }));
        assert!(blank.is_err());
    }
}
