//! Application models

pub mod entities;
pub mod terms;
pub mod tool;
pub mod tools;

pub use terms::{Term, TermKind};
pub use tool::{slugify, NewTool, Tool, ToolPatch, ToolStatus};
