//! In-memory ToolRecord store

use async_trait::async_trait;
use chrono::Utc;
use kit::FrameworkError;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{ToolFilter, ToolStore};
use crate::models::{slugify, NewTool, Term, TermKind, Tool, ToolPatch};

#[derive(Default)]
struct State {
    next_id: i64,
    tools: BTreeMap<i64, Tool>,
    terms: BTreeMap<TermKind, Vec<Term>>,
    links: HashMap<(TermKind, i64), Vec<i64>>,
    updates: Vec<(i64, ToolPatch)>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Keeps tools in a map; every accepted update is logged for inspection
#[derive(Default)]
pub struct MemoryToolStore {
    state: Mutex<State>,
}

impl MemoryToolStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, FrameworkError> {
        self.state
            .lock()
            .map_err(|_| FrameworkError::internal("tool store lock poisoned"))
    }

    /// Store a fully built tool, assigning it a fresh id
    pub fn insert(&self, mut tool: Tool) -> Result<Tool, FrameworkError> {
        let mut state = self.lock()?;
        tool.id = state.next_id();
        state.tools.insert(tool.id, tool.clone());
        Ok(tool)
    }

    /// Accepted updates in order
    pub fn updates(&self) -> Vec<(i64, ToolPatch)> {
        self.lock().map(|s| s.updates.clone()).unwrap_or_default()
    }

    /// Accepted updates of one tool
    pub fn updates_for(&self, id: i64) -> Vec<ToolPatch> {
        self.updates()
            .into_iter()
            .filter(|(tool_id, _)| *tool_id == id)
            .map(|(_, patch)| patch)
            .collect()
    }
}

#[async_trait]
impl ToolStore for MemoryToolStore {
    async fn find_by_id(&self, id: i64) -> Result<Option<Tool>, FrameworkError> {
        Ok(self.lock()?.tools.get(&id).cloned())
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tool>, FrameworkError> {
        Ok(self.lock()?.tools.values().find(|t| t.slug == slug).cloned())
    }

    async fn find_many(&self, filter: &ToolFilter) -> Result<Vec<Tool>, FrameworkError> {
        let mut found: Vec<Tool> = self
            .lock()?
            .tools
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        found.sort_by_key(|t| (t.published_at, t.id));
        Ok(found)
    }

    async fn create(&self, input: &NewTool) -> Result<Tool, FrameworkError> {
        let slug = input.slug();
        if slug.is_empty() {
            return Err(FrameworkError::validation("slug", "The slug cannot be empty."));
        }

        let mut state = self.lock()?;
        if state.tools.values().any(|t| t.slug == slug) {
            return Err(FrameworkError::validation(
                "slug",
                format!("The slug '{}' has already been taken.", slug),
            ));
        }

        let now = Utc::now();
        let tool = Tool {
            id: state.next_id(),
            name: input.name.trim().to_string(),
            slug,
            website_url: input.website_url.clone(),
            repository_url: input.repository_url.clone(),
            tagline: input.tagline.clone(),
            description: input.description.clone(),
            content: None,
            submitter_name: input.submitter_name.clone(),
            submitter_email: input.submitter_email.clone(),
            status: input.initial_status(),
            published_at: input.published_at,
            is_featured: input.is_featured,
            stars: None,
            forks: None,
            score: None,
            license: None,
            first_commit_date: None,
            last_commit_date: None,
            favicon_url: None,
            screenshot_url: None,
            created_at: now,
            updated_at: now,
        };
        state.tools.insert(tool.id, tool.clone());
        Ok(tool)
    }

    async fn update(&self, id: i64, patch: &ToolPatch) -> Result<Tool, FrameworkError> {
        let mut state = self.lock()?;
        let tool = state
            .tools
            .get_mut(&id)
            .ok_or_else(|| FrameworkError::model_not_found(format!("Tool #{}", id)))?;

        tool.apply(patch)?;
        tool.updated_at = Utc::now();
        let updated = tool.clone();
        state.updates.push((id, patch.clone()));
        Ok(updated)
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<Vec<Tool>, FrameworkError> {
        let mut state = self.lock()?;
        let deleted: Vec<Tool> = ids.iter().filter_map(|id| state.tools.remove(id)).collect();
        state.links.retain(|(_, tool_id), _| !ids.contains(tool_id));
        Ok(deleted)
    }

    async fn resolve_terms(
        &self,
        kind: TermKind,
        names: &[String],
    ) -> Result<Vec<Term>, FrameworkError> {
        let mut state = self.lock()?;
        let mut resolved: Vec<Term> = Vec::new();

        for name in names {
            let name = name.trim();
            let slug = slugify(name);
            if slug.is_empty() {
                continue;
            }

            let existing = state
                .terms
                .get(&kind)
                .and_then(|terms| terms.iter().find(|t| t.matches(name, &slug)).cloned());
            let term = match existing {
                Some(term) => term,
                None => {
                    let term = Term {
                        id: state.next_id(),
                        name: name.to_string(),
                        slug,
                    };
                    state.terms.entry(kind).or_default().push(term.clone());
                    term
                }
            };

            if !resolved.iter().any(|t| t.id == term.id) {
                resolved.push(term);
            }
        }
        Ok(resolved)
    }

    async fn replace_terms(
        &self,
        kind: TermKind,
        tool_id: i64,
        term_ids: &[i64],
    ) -> Result<(), FrameworkError> {
        let mut ids: Vec<i64> = Vec::with_capacity(term_ids.len());
        for id in term_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        self.lock()?.links.insert((kind, tool_id), ids);
        Ok(())
    }

    async fn terms(&self, kind: TermKind, tool_id: i64) -> Result<Vec<Term>, FrameworkError> {
        let state = self.lock()?;
        let Some(ids) = state.links.get(&(kind, tool_id)) else {
            return Ok(Vec::new());
        };

        let mut linked: Vec<Term> = state
            .terms
            .get(&kind)
            .map(|terms| terms.iter().filter(|t| ids.contains(&t.id)).cloned().collect())
            .unwrap_or_default();
        linked.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(linked)
    }
}
