//! Workflow configuration

use crate::config::env;

/// Workflow worker configuration
///
/// # Environment Variables
///
/// - `WORKFLOW_POLL_INTERVAL_MS` - Worker poll interval in milliseconds (default: 1000)
/// - `WORKFLOW_CONCURRENCY` - Executions a single worker runs at once (default: 4)
/// - `WORKFLOW_LOCK_TIMEOUT_SECS` - Lease duration in seconds (default: 300)
/// - `WORKFLOW_MAX_ATTEMPTS` - Attempts for workflows without their own policy (default: 3)
/// - `WORKFLOW_RETRY_BACKOFF_SECS` - Linear backoff seconds per attempt (default: 5)
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    pub poll_interval_ms: u64,
    pub concurrency: usize,
    pub lock_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_secs: u64,
}

impl WorkflowConfig {
    /// Build config from environment variables
    pub fn from_env() -> Self {
        Self {
            poll_interval_ms: env("WORKFLOW_POLL_INTERVAL_MS", 1000u64),
            concurrency: env("WORKFLOW_CONCURRENCY", 4usize).max(1),
            lock_timeout_secs: env("WORKFLOW_LOCK_TIMEOUT_SECS", 300u64),
            max_attempts: env("WORKFLOW_MAX_ATTEMPTS", 3u32).max(1),
            retry_backoff_secs: env("WORKFLOW_RETRY_BACKOFF_SECS", 5u64),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
