//! SeaORM entities for the directory tables
//!
//! Custom behavior lives next door in `models/tools.rs` and
//! `models/terms.rs`; these files only describe columns.

pub mod alternatives;
pub mod categories;
pub mod stacks;
pub mod tool_alternatives;
pub mod tool_categories;
pub mod tool_stacks;
pub mod tools;
