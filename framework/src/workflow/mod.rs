//! Durable workflow engine
//!
//! Executions are rows in `workflow_executions`; every step result is
//! memoized in `workflow_steps` keyed by `(execution_id, step_name)`, so a
//! re-attempted execution replays finished steps and only runs the rest.
//!
//! # Example
//!
//! ```rust,ignore
//! use openalt_kit::workflow::{Workflow, WorkflowContext, RetryPolicy};
//!
//! struct Welcome;
//!
//! #[async_trait]
//! impl Workflow for Welcome {
//!     fn name(&self) -> &'static str {
//!         "user.registered"
//!     }
//!
//!     fn retry_policy(&self) -> RetryPolicy {
//!         RetryPolicy::attempts(2)
//!     }
//!
//!     async fn run(&self, ctx: &WorkflowContext, input: Value) -> Result<Value, FrameworkError> {
//!         let user: User = ctx.run_step("find-user", || find_user(&input)).await?;
//!         ctx.group()
//!             .step("send-email", || send_email(&user))
//!             .step("post-webhook", || post_webhook(&user))
//!             .join()
//!             .await;
//!         Ok(Value::Null)
//!     }
//! }
//!
//! // Enqueue:
//! // executions.enqueue("user.registered", "42", &json!({"id": 42}), 2).await?;
//!
//! // Run worker (separate process):
//! // openalt workflow:work
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod entities;
pub mod memo;
pub mod migration;
pub mod registry;
pub mod store;
pub mod types;
pub mod worker;

pub use config::WorkflowConfig;
pub use context::{GroupReport, StepGroup, WorkflowContext};
pub use engine::{run_attempt, AttemptOutcome, Engine, ExecutionReport, Workflow};
pub use memo::{MemoryStepStore, StepResult, StepStore};
pub use registry::WorkflowRegistry;
pub use store::{ExecutionStore, SeaOrmStepStore};
pub use types::{
    CaughtFailure, ClaimedExecution, ExecutionHandle, ExecutionStatus, RetryPolicy, StepStatus,
};
pub use worker::WorkflowWorker;
