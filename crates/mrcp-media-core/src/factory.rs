//! Factory that owns every session's [`MediaContext`] and ticks the ones
//! that currently hold at least one termination.
//!
//! The original keeps contexts on an intrusive `APR_RING`; there's no
//! equivalent intrusive list in safe Rust, so membership is modeled as an
//! explicit `DashSet` of "active" ids kept in lockstep with each context's
//! `count` on the 0<->1 transitions (spec §3 invariant 3).

use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::context::MediaContext;
use crate::error::Result;
use crate::termination::{Slot, Termination, TerminationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(pub Uuid);

impl ContextId {
    pub fn new() -> Self {
        ContextId(Uuid::new_v4())
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the full set of live media contexts and the "ring" of currently
/// nonempty ones.
pub struct ContextFactory {
    contexts: DashMap<ContextId, Arc<Mutex<MediaContext>>>,
    active: DashSet<ContextId>,
}

impl ContextFactory {
    pub fn new() -> Self {
        Self {
            contexts: DashMap::new(),
            active: DashSet::new(),
        }
    }

    pub fn create_context(&self, capacity: usize) -> ContextId {
        let id = ContextId::new();
        self.contexts
            .insert(id, Arc::new(Mutex::new(MediaContext::new(capacity))));
        id
    }

    /// Drop a context entirely, e.g. at session teardown once every
    /// termination has already been subtracted.
    pub fn destroy_context(&self, id: ContextId) {
        self.contexts.remove(&id);
        self.active.remove(&id);
    }

    pub fn is_active(&self, id: ContextId) -> bool {
        self.active.contains(&id)
    }

    fn handle(&self, id: ContextId) -> Option<Arc<Mutex<MediaContext>>> {
        self.contexts.get(&id).map(|e| e.value().clone())
    }

    pub fn add_termination(&self, id: ContextId, termination: Termination) -> Result<Slot> {
        let ctx = self.handle(id).ok_or(crate::error::MediaError::TerminationNotAttached)?;
        let mut guard = ctx.lock();
        let was_empty = guard.count() == 0;
        let slot = guard.add_termination(termination)?;
        if was_empty && guard.count() > 0 {
            debug!(?id, "context entering factory ring");
            self.active.insert(id);
        }
        Ok(slot)
    }

    pub fn subtract_termination(&self, id: ContextId, term_id: TerminationId) -> Result<Termination> {
        let ctx = self.handle(id).ok_or(crate::error::MediaError::TerminationNotAttached)?;
        let mut guard = ctx.lock();
        let removed = guard.subtract_termination(term_id)?;
        if guard.count() == 0 {
            debug!(?id, "context leaving factory ring");
            self.active.remove(&id);
        }
        Ok(removed)
    }

    pub fn add_association(&self, id: ContextId, t1: TerminationId, t2: TerminationId) -> Result<()> {
        let ctx = self.handle(id).ok_or(crate::error::MediaError::TerminationNotAttached)?;
        ctx.lock().add_association(t1, t2)
    }

    pub fn remove_association(&self, id: ContextId, t1: TerminationId, t2: TerminationId) -> Result<()> {
        let ctx = self.handle(id).ok_or(crate::error::MediaError::TerminationNotAttached)?;
        ctx.lock().remove_association(t1, t2)
    }

    pub fn reset_associations(&self, id: ContextId) -> Result<()> {
        let ctx = self.handle(id).ok_or(crate::error::MediaError::TerminationNotAttached)?;
        ctx.lock().reset_associations();
        Ok(())
    }

    pub fn apply_topology(&self, id: ContextId) -> Result<()> {
        let ctx = self.handle(id).ok_or(crate::error::MediaError::TerminationNotAttached)?;
        ctx.lock().apply_topology();
        Ok(())
    }

    pub fn destroy_topology(&self, id: ContextId) -> Result<()> {
        let ctx = self.handle(id).ok_or(crate::error::MediaError::TerminationNotAttached)?;
        ctx.lock().destroy_topology();
        Ok(())
    }

    pub fn with_context<T>(&self, id: ContextId, f: impl FnOnce(&MediaContext) -> T) -> Option<T> {
        self.handle(id).map(|ctx| f(&ctx.lock()))
    }

    /// `factory.process()` — walks the active ring and ticks each context.
    /// Invoked once per media tick by the Media Engine.
    pub fn process(&self) {
        for id in self.active.iter() {
            if let Some(ctx) = self.handle(*id) {
                ctx.lock().process();
            }
        }
    }
}

impl Default for ContextFactory {
    fn default() -> Self {
        Self::new()
    }
}
