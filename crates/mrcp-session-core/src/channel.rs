//! Per-resource control leg within a session (spec §3 "Channel").

use std::sync::Arc;

use mrcp_media_core::termination::TerminationId;

use crate::collaborators::{ControlChannelHandle, EngineChannelHandle, MethodStateMachine};

/// One resource's control leg. `resource_handle` is `None` until the
/// resource name is resolved; it stays `None` for the lifetime of the
/// channel if resolution fails (answer carries `NO_SUCH_RESOURCE` instead).
pub struct Channel {
    /// Position in the SDP control array (spec §3 `id`).
    pub id: usize,
    pub resource_name: Option<String>,
    pub resource_handle: Option<String>,
    /// Present for MRCPv2 only.
    pub control_channel: Option<Arc<dyn ControlChannelHandle>>,
    pub engine_channel: Option<Arc<dyn EngineChannelHandle>>,
    pub method_state_machine: Option<Arc<dyn MethodStateMachine>>,
    /// Set once the engine channel reports the termination it owns (spec
    /// §4.3 "if the engine channel owns a termination, batch
    /// ADD_TERMINATION"); used to match `ADD_TERMINATION`/`SUBTRACT_TERMINATION`
    /// completions back to this channel.
    pub engine_termination: Option<TerminationId>,
    /// Grouping tag linking this channel to a termination slot by `mid`.
    pub cmid: Option<u32>,
    pub waiting_for_channel: bool,
    pub waiting_for_termination: bool,
}

impl Channel {
    pub fn new(id: usize, resource_name: Option<String>, cmid: Option<u32>) -> Self {
        Self {
            id,
            resource_name,
            resource_handle: None,
            control_channel: None,
            engine_channel: None,
            method_state_machine: None,
            engine_termination: None,
            cmid,
            waiting_for_channel: false,
            waiting_for_termination: false,
        }
    }

    pub fn has_engine(&self) -> bool {
        self.resource_handle.is_some()
    }
}
