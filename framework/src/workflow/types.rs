//! Workflow public types

use crate::error::FrameworkError;
use serde_json::Value;
use std::time::Duration;

/// Workflow execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Memoized step status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Succeeded,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// How often and how patiently an execution is re-attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Linear backoff unit; attempt `n` waits `n * backoff`
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// A single attempt, never retried
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn attempts(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::from_secs(5))
    }

    /// Delay before the attempt following `attempt`
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff * attempt.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::attempts(3)
    }
}

/// Handle for an enqueued execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionHandle {
    pub id: i64,
    pub name: String,
    pub idempotency_key: String,
    /// False when an existing execution was returned instead of a new one
    pub created: bool,
}

/// Execution claimed by a worker
#[derive(Debug, Clone)]
pub struct ClaimedExecution {
    pub id: i64,
    pub name: String,
    pub idempotency_key: String,
    pub input: Value,
    /// Attempt number of this claim, starting at 1
    pub attempt: u32,
    pub max_attempts: u32,
}

/// A step or labelled unit of work whose failure was caught instead of propagated
#[derive(Debug, Clone)]
pub struct CaughtFailure {
    pub label: String,
    pub error: FrameworkError,
}

impl CaughtFailure {
    pub fn is_retriable(&self) -> bool {
        self.error.is_retriable()
    }
}
