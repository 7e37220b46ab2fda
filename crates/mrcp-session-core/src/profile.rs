//! Process-wide configuration the orchestrator resolves resource names
//! against (SPEC_FULL.md §4.4 "Configuration"). No file/env loading -- that
//! is out of scope (spec §1); the embedder constructs one of these
//! programmatically.

use std::collections::HashMap;

use mrcp_media_core::DEFAULT_CONTEXT_CAPACITY;

/// One resource name's engine binding: just the bit the orchestrator needs
/// to decide `NO_SUCH_RESOURCE` vs. proceeding to open an engine channel.
/// The engine itself is out of scope (spec §1); the embedder supplies an
/// `EngineChannelHandle` factory keyed by this id.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub resource_engine_id: String,
}

/// A session's `profile` pointer (spec §3), modeled as the handful of
/// process-wide knobs the orchestrator reads: media context capacity and the
/// resource-name resolution table.
#[derive(Debug, Clone)]
pub struct Profile {
    pub media_context_capacity: usize,
    resources: HashMap<String, EngineConfig>,
}

impl Profile {
    pub fn new() -> Self {
        Self {
            media_context_capacity: DEFAULT_CONTEXT_CAPACITY,
            resources: HashMap::new(),
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.media_context_capacity = capacity;
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, config: EngineConfig) -> Self {
        self.resources.insert(name.into(), config);
        self
    }

    /// Resolves a resource name to its engine binding, or `None` -- the
    /// `NO_SUCH_RESOURCE` condition (spec §7).
    pub fn resolve(&self, resource_name: &str) -> Option<&EngineConfig> {
        self.resources.get(resource_name)
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}
