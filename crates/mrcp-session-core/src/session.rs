//! The per-session state machine (spec §3 "Session", §4.3 "State machine").

use std::sync::Arc;

use mrcp_media_core::engine::MediaBatch;
use mrcp_media_core::factory::ContextId;
use tracing::warn;

use crate::channel::Channel;
use crate::profile::Profile;
use crate::termination_slot::TerminationSlot;
use crate::types::{AnswerDescriptor, MrcpVersion, OfferDescriptor, SessionId};

/// spec §4.3 "State machine": transitions are driven entirely by
/// `subrequest_count` reaching zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    None,
    Answering,
    Deactivating,
    Terminating,
}

/// One client <-> server MRCP conversation (spec §3). Owned exclusively by
/// its session task (spec §5 "the session's per-session memory arena is
/// owned exclusively by the orchestrator thread").
///
/// The FIFO queue of pending signaling messages and the single-active-message
/// invariant (spec §3) live outside this struct: each session is driven by a
/// dedicated task reading from an `mpsc` channel, so the channel itself is
/// the queue and "active" is simply whichever message that task is currently
/// awaiting the processing of. See [`crate::table::SessionTable`].
pub struct Session {
    pub id: SessionId,
    pub profile: Arc<Profile>,
    pub context: ContextId,
    pub channels: Vec<Channel>,
    pub termination_slots: Vec<TerminationSlot>,
    pub offer: Option<OfferDescriptor>,
    pub answer: Option<AnswerDescriptor>,
    pub pending_batch: MediaBatch,
    pub subrequest_count: u32,
    pub state: SessionState,
    /// Set on the first offer (spec §6 "the core branches only on the
    /// version discriminant"); decides v1-vs-v2 routing in offer and
    /// engine-message processing.
    pub version: Option<MrcpVersion>,
}

impl Session {
    pub fn new(id: SessionId, profile: Arc<Profile>, context: ContextId) -> Self {
        Self {
            id,
            profile,
            context,
            channels: Vec::new(),
            termination_slots: Vec::new(),
            offer: None,
            answer: None,
            pending_batch: MediaBatch::new(),
            subrequest_count: 0,
            state: SessionState::None,
            version: None,
        }
    }

    /// Enters a new state, defensively resetting the sub-request counter
    /// (spec §4.3 "entering any state resets subrequest_count to 0
    /// defensively"; spec §9 open question: treated as a warning here, per
    /// the source's own behavior, rather than a debug assertion, since the
    /// spec explicitly calls this a "warning logged" condition in §7).
    pub fn enter_state(&mut self, state: SessionState) {
        if self.subrequest_count != 0 {
            warn!(
                session = %self.id,
                count = self.subrequest_count,
                "sub-request count nonzero on state entry; forcing to 0"
            );
            self.subrequest_count = 0;
        }
        self.state = state;
    }

    pub fn bump(&mut self, n: u32) {
        self.subrequest_count += n;
    }

    /// Decrements the sub-request counter. An underflow here is a prior bug
    /// (spec §9 open question); we log and clamp rather than wrap, since a
    /// non-debug build must not panic on it (spec §7 "all other failures...
    /// the session remains well-formed").
    pub fn decrement(&mut self) {
        match self.subrequest_count.checked_sub(1) {
            Some(n) => self.subrequest_count = n,
            None => {
                warn!(session = %self.id, "sub-request count underflow; clamping to 0");
                self.subrequest_count = 0;
            }
        }
    }

    pub fn is_quiesced(&self) -> bool {
        self.subrequest_count == 0
    }

    /// Finds a channel by its `id` (SDP control-array position).
    pub fn channel_mut(&mut self, id: usize) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id == id)
    }

    pub fn termination_slot_mut(&mut self, id: usize) -> Option<&mut TerminationSlot> {
        self.termination_slots.iter_mut().find(|s| s.id == id)
    }
}
