//! Categories, alternatives and stacks
//!
//! The three taxonomies share one shape (`id`, `name`, `slug`) and are
//! linked to tools through pivot tables.

use serde::{Deserialize, Serialize};

use super::entities::{
    alternatives, categories, stacks, tool_alternatives, tool_categories, tool_stacks,
};

impl sea_orm::ActiveModelBehavior for categories::ActiveModel {}
impl sea_orm::ActiveModelBehavior for alternatives::ActiveModel {}
impl sea_orm::ActiveModelBehavior for stacks::ActiveModel {}
impl sea_orm::ActiveModelBehavior for tool_categories::ActiveModel {}
impl sea_orm::ActiveModelBehavior for tool_alternatives::ActiveModel {}
impl sea_orm::ActiveModelBehavior for tool_stacks::ActiveModel {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TermKind {
    Category,
    Alternative,
    Stack,
}

impl TermKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Alternative => "alternative",
            Self::Stack => "stack",
        }
    }
}

/// A category, alternative or stack attached to tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Term {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

impl Term {
    /// Match on slug or on a case-insensitive name
    pub fn matches(&self, name: &str, slug: &str) -> bool {
        self.slug == slug || self.name.eq_ignore_ascii_case(name.trim())
    }
}

macro_rules! term_from_model {
    ($($module:ident),*) => {
        $(impl From<$module::Model> for Term {
            fn from(model: $module::Model) -> Self {
                Term {
                    id: model.id,
                    name: model.name,
                    slug: model.slug,
                }
            }
        })*
    };
}

term_from_model!(categories, alternatives, stacks);
