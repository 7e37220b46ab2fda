//! Trait seams for the orchestrator's external collaborators (spec §1 "out
//! of scope... consumed only through the interfaces named in §6", and
//! SPEC_FULL.md §6 additions). Grounded on the async-trait callback style of
//! `CallHandler` in the teacher's `session-core/src/api`.

use std::sync::Arc;

use async_trait::async_trait;
use mrcp_media_core::termination::Termination;

use crate::types::{ControlMessage, EngineMessage, MrcpVersion};

/// Outcome of an MRCPv2 control-channel modify (spec §4.3 "bump sub-requests
/// if the modify returns pending").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOutcome {
    Immediate,
    Pending,
}

/// Per-channel half of the MRCPv2 signaling transport. MRCPv1 uses the
/// session-level signaling directly and never constructs one of these (spec
/// §2 component table).
#[async_trait]
pub trait ControlChannelHandle: Send + Sync {
    async fn modify(&self) -> ModifyOutcome;
    async fn remove(&self);
    async fn send_message(&self, message: ControlMessage);
}

/// Outcome of opening an engine channel (spec §4.3 "Open the engine channel
/// (async -- bumps sub-requests)").
pub struct OpenOutcome {
    pub succeeded: bool,
    /// Present when the engine channel owns a termination (spec §4.3 "if the
    /// engine channel owns a termination, batch ADD_TERMINATION"). Carries
    /// the full termination, not just its id, since the orchestrator needs
    /// to move it into an `ADD_TERMINATION` command.
    pub termination: Option<Termination>,
}

/// Per-channel handle to a resource engine instance.
#[async_trait]
pub trait EngineChannelHandle: Send + Sync {
    async fn open(&self) -> OpenOutcome;
    async fn close(&self);

    /// Forwards a client request into the resource's method state machine
    /// and returns everything it produced while handling it, in emission
    /// order (spec §4.3 "method state machine dispatch": zero or more events,
    /// then at most one response). The orchestrator delivers each in turn;
    /// request dispatch itself is the out-of-scope method state machine's job
    /// (spec §1), so this seam only routes.
    async fn process_request(&self, message: ControlMessage) -> Vec<EngineMessage>;
}

/// Per-resource method state machine (IDLE -> RECOGNIZING -> ...). The core
/// only routes messages into and out of it (spec §1 Non-goal); request
/// dispatch itself goes through [`EngineChannelHandle::process_request`], so
/// the only hook the orchestrator calls directly is deactivation.
#[async_trait]
pub trait MethodStateMachine: Send + Sync {
    /// Requests deactivation as part of terminate processing step 1. The
    /// orchestrator bumps the sub-request counter before awaiting this and
    /// decrements it on completion -- awaiting *is* the pending sub-request
    /// (spec §4.3 "each pending deactivation bumps sub-requests").
    async fn deactivate(&self);
}

/// Constructs the per-channel collaborators named in a resource/control-media
/// offer (spec §4.3 "resolve resource_name to a resource handle... create a
/// per-resource method state machine"). The resource-engine plugins
/// themselves are out of scope (spec §1); this is the seam an embedder
/// implements to supply them.
pub trait ChannelFactory: Send + Sync {
    /// `None` models engine-channel creation failure (spec §7
    /// "UNACCEPTABLE_RESOURCE").
    fn create_engine_channel(&self, resource_engine_id: &str) -> Option<Arc<dyn EngineChannelHandle>>;
    fn create_control_channel(&self, version: MrcpVersion) -> Option<Arc<dyn ControlChannelHandle>>;
    fn create_method_state_machine(&self, resource_engine_id: &str) -> Arc<dyn MethodStateMachine>;

    /// Allocates a fresh RTP termination for a new audio media line (spec
    /// §4.3 "allocate an RTP termination from the RTP termination factory").
    /// RTP socket I/O is out of scope (spec §1); this only needs to produce
    /// the `Termination` value the media context tracks.
    fn create_rtp_termination(&self) -> Termination;

    /// Assigns the local endpoint a new or renegotiated RTP termination will
    /// answer with (spec §4.2 "configures the local endpoint and fills
    /// `descriptor.audio.local` in the response"). Actual socket binding is
    /// out of scope (spec §1); this only produces the address descriptor.
    fn allocate_rtp_endpoint(&self) -> mrcp_media_core::engine::RtpEndpoint;
}

/// The Media Engine collaborator (spec §4.2), abstracted behind a trait so
/// tests can substitute a fake without spinning up `mrcp_media_core`'s
/// spawned-task engine.
#[async_trait]
pub trait MediaEngineHandle: Send + Sync {
    fn create_context(&self, capacity: usize) -> mrcp_media_core::factory::ContextId;
    fn destroy_context(&self, id: mrcp_media_core::factory::ContextId);

    /// Sends a batch and returns its responses once every command has
    /// completed, in the order they were issued (spec §5 "media-engine
    /// commands within one batch are executed in the order they were
    /// added").
    async fn send_batch(&self, batch: mrcp_media_core::engine::MediaBatch) -> Vec<mrcp_media_core::engine::MediaResponse>;
}

#[async_trait]
impl MediaEngineHandle for mrcp_media_core::engine::MediaEngine {
    fn create_context(&self, capacity: usize) -> mrcp_media_core::factory::ContextId {
        self.factory().create_context(capacity)
    }

    fn destroy_context(&self, id: mrcp_media_core::factory::ContextId) {
        self.factory().destroy_context(id);
    }

    async fn send_batch(&self, batch: mrcp_media_core::engine::MediaBatch) -> Vec<mrcp_media_core::engine::MediaResponse> {
        let expected = batch.len();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        self.send_batch(batch, tx);
        let mut responses = Vec::with_capacity(expected);
        while responses.len() < expected {
            match rx.recv().await {
                Some(response) => responses.push(response),
                None => break,
            }
        }
        responses
    }
}
