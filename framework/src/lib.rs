//! Framework plumbing for the OpenAlternative workflow pipeline
//!
//! - typed configuration loaded from `.env` files
//! - a shared error type with retry classification
//! - SeaORM connections and in-memory test databases
//! - a durable workflow engine with memoized steps
//! - a cron scheduler and a small JSON ingestion server

pub mod config;
pub mod database;
pub mod error;
pub mod http;
pub mod logging;
pub mod routing;
pub mod schedule;
pub mod server;
pub mod workflow;

pub use config::{env, env_list, env_optional, AppConfig, Config, Environment, ServerConfig};
pub use database::{DatabaseConfig, DbConnection, TestDatabase, DB};
pub use error::{FrameworkError, ValidationErrors};
pub use http::{json, text, HttpResponse, Request, Response};
pub use routing::Router;
pub use schedule::{CronExpression, Schedule, Task, TaskResult, Tick};
pub use server::Server;
pub use workflow::{
    Engine, ExecutionStore, RetryPolicy, Workflow, WorkflowConfig, WorkflowContext,
    WorkflowRegistry, WorkflowWorker,
};

// Re-exports so applications and their tests share one version
pub use async_trait::async_trait;
pub use sea_orm;
pub use serde_json;
