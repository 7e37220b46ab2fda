//! Session orchestrator, channel, and termination-slot bookkeeping for an
//! MRCP server, driving [`mrcp_media_core`] as its media-plane collaborator.
//!
//! Every collaborator the orchestrator doesn't own outright — the wire
//! codec, SDP grammar, resource-engine plugins, RTP socket I/O, and the
//! per-resource method state machines — is represented as a trait in
//! [`collaborators`] and [`signaling`]; an embedder supplies the real thing.

pub mod channel;
pub mod collaborators;
pub mod errors;
pub mod logging;
pub mod orchestrator;
pub mod profile;
pub mod session;
pub mod signaling;
pub mod table;
pub mod termination_slot;
pub mod types;

pub use channel::Channel;
pub use collaborators::{
    ChannelFactory, ControlChannelHandle, EngineChannelHandle, MediaEngineHandle, MethodStateMachine,
    ModifyOutcome, OpenOutcome,
};
pub use errors::{Result, SessionError};
pub use orchestrator::SessionOrchestrator;
pub use profile::{EngineConfig, Profile};
pub use session::{Session, SessionState};
pub use signaling::{SignalingFrontend, SignalingMessage};
pub use table::{SessionHandle, SessionTable};
pub use termination_slot::TerminationSlot;
pub use types::{
    AnswerDescriptor, AnswerStatus, AudioMediaDescriptor, ControlMediaDescriptor, ControlMessage,
    EngineMessage, EngineMessageKind, MrcpVersion, OfferDescriptor, SessionId, VideoMediaDescriptor,
};
