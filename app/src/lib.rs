//! OpenAlternative tool pipeline
//!
//! Onboarding, publication and refresh workflows for the tool directory,
//! plus the admin actions and trigger ingestion around them.

pub mod actions;
pub mod bootstrap;
pub mod config;
pub mod enrichment;
pub mod events;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod repositories;
pub mod routes;
pub mod schedule;
pub mod services;
pub mod testing;
pub mod workflows;

pub use bootstrap::AppState;
