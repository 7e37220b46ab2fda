//! Process-wide session lookup (spec §9 "Global session table"): a bounded,
//! externally-synchronized structure the core only calls `add`/`remove` on.
//! Also where each session's dedicated processing task lives, fed by an
//! `mpsc` channel that realizes the FIFO queue + single-active-message
//! invariant (spec §3) without an explicit queue field on `Session` itself.

use std::sync::Arc;

use dashmap::DashMap;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::errors::{Result, SessionError};
use crate::session::Session;
use crate::signaling::SignalingMessage;
use crate::types::SessionId;

/// A handle into a live session: the lock guarding its state, and the
/// sender half of its signaling-message queue.
pub struct SessionHandle {
    pub session: Arc<Mutex<Session>>,
    pub sender: mpsc::UnboundedSender<SignalingMessage>,
}

/// Process-wide map from session id to session handle.
pub struct SessionTable {
    sessions: DashMap<SessionId, SessionHandle>,
    rng: Mutex<SmallRng>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            rng: Mutex::new(SmallRng::from_entropy()),
        }
    }

    /// Generates a fresh, collision-checked session id (spec §3 "generated
    /// on first offer"; spec §6 "unique per process lifetime").
    pub async fn generate_id(&self) -> SessionId {
        let mut rng = self.rng.lock().await;
        loop {
            let id = SessionId::generate(&mut rng);
            if !self.sessions.contains_key(&id) {
                return id;
            }
        }
    }

    pub fn insert(&self, id: SessionId, handle: SessionHandle) {
        debug!(session = %id, "session added to table");
        self.sessions.insert(id, handle);
    }

    pub fn remove(&self, id: &SessionId) {
        debug!(session = %id, "session removed from table");
        self.sessions.remove(id);
    }

    pub fn get(&self, id: &SessionId) -> Result<Arc<Mutex<Session>>> {
        self.sessions
            .get(id)
            .map(|entry| entry.session.clone())
            .ok_or_else(|| SessionError::session_not_found(id))
    }

    /// Queues a signaling message for dispatch on the session's own task.
    pub fn dispatch(&self, id: &SessionId, message: SignalingMessage) -> Result<()> {
        let entry = self
            .sessions
            .get(id)
            .ok_or_else(|| SessionError::session_not_found(id))?;
        entry
            .sender
            .send(message)
            .map_err(|_| SessionError::internal("session task no longer receiving"))
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }
}

impl Default for SessionTable {
    fn default() -> Self {
        Self::new()
    }
}
