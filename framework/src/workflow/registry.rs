//! Workflow registry

use crate::workflow::engine::Workflow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Workflows known to a worker, keyed by name
#[derive(Clone, Default)]
pub struct WorkflowRegistry {
    workflows: BTreeMap<String, Arc<dyn Workflow>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a workflow, replacing one with the same name
    pub fn register<W: Workflow + 'static>(&mut self, workflow: W) -> &mut Self {
        self.workflows
            .insert(workflow.name().to_string(), Arc::new(workflow));
        self
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn Workflow>> {
        self.workflows.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        self.workflows.keys().map(String::as_str).collect()
    }

    /// Per-workflow concurrency caps, for workflows that declare one
    pub fn concurrency_limits(&self) -> HashMap<String, usize> {
        self.workflows
            .iter()
            .filter_map(|(name, wf)| wf.concurrency_limit().map(|limit| (name.clone(), limit)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}
