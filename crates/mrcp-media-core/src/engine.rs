//! The Media Engine: the external collaborator the session orchestrator
//! drives with batched, asynchronous task messages (spec §4.2).
//!
//! The engine owns the [`ContextFactory`] and all of its contexts. Commands
//! are accumulated into a [`MediaBatch`] and sent together; the engine
//! executes them in the order they were added and posts one response per
//! command back to the issuing session over an `mpsc` channel, standing in
//! for "a separate media thread" (spec §5) without requiring a literal
//! second OS thread inside this crate.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::error::Result;
use crate::factory::{ContextFactory, ContextId};
use crate::termination::{Termination, TerminationId};

/// A local RTP endpoint address, the one SDP-adjacent detail the media
/// engine's response carries back to the session (spec §4.3 "if the
/// response supplies `audio.local`").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpEndpoint {
    pub ip: String,
    pub ext_ip: Option<String>,
    pub port: u16,
}

/// Remote-offer / local-answer pair for an RTP termination's (re)negotiation.
#[derive(Debug, Clone, Default)]
pub struct RtpDescriptor {
    pub local: Option<RtpEndpoint>,
    pub remote: Option<RtpEndpoint>,
}

/// Command discriminants, matching spec §6's list verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandKind {
    AddTermination,
    ModifyTermination,
    SubtractTermination,
    AddAssociation,
    RemoveAssociation,
    ResetAssociations,
    ApplyTopology,
    DestroyTopology,
}

/// One queued media-engine task. Built up inside a [`MediaBatch`] and
/// executed, in order, when the batch is sent.
pub enum MediaCommand {
    AddTermination {
        context: ContextId,
        termination: Termination,
        descriptor: Option<RtpDescriptor>,
    },
    ModifyTermination {
        context: ContextId,
        termination: TerminationId,
        descriptor: RtpDescriptor,
    },
    SubtractTermination {
        context: ContextId,
        termination: TerminationId,
    },
    AddAssociation {
        context: ContextId,
        t1: TerminationId,
        t2: TerminationId,
    },
    RemoveAssociation {
        context: ContextId,
        t1: TerminationId,
        t2: TerminationId,
    },
    ResetAssociations {
        context: ContextId,
    },
    ApplyTopology {
        context: ContextId,
    },
    DestroyTopology {
        context: ContextId,
    },
}

impl MediaCommand {
    pub fn kind(&self) -> CommandKind {
        match self {
            MediaCommand::AddTermination { .. } => CommandKind::AddTermination,
            MediaCommand::ModifyTermination { .. } => CommandKind::ModifyTermination,
            MediaCommand::SubtractTermination { .. } => CommandKind::SubtractTermination,
            MediaCommand::AddAssociation { .. } => CommandKind::AddAssociation,
            MediaCommand::RemoveAssociation { .. } => CommandKind::RemoveAssociation,
            MediaCommand::ResetAssociations { .. } => CommandKind::ResetAssociations,
            MediaCommand::ApplyTopology { .. } => CommandKind::ApplyTopology,
            MediaCommand::DestroyTopology { .. } => CommandKind::DestroyTopology,
        }
    }

    pub fn context(&self) -> ContextId {
        match self {
            MediaCommand::AddTermination { context, .. }
            | MediaCommand::ModifyTermination { context, .. }
            | MediaCommand::SubtractTermination { context, .. }
            | MediaCommand::AddAssociation { context, .. }
            | MediaCommand::RemoveAssociation { context, .. }
            | MediaCommand::ResetAssociations { context }
            | MediaCommand::ApplyTopology { context }
            | MediaCommand::DestroyTopology { context } => *context,
        }
    }
}

/// A batch constructed incrementally and sent in one call (spec §4.2).
#[derive(Default)]
pub struct MediaBatch {
    commands: Vec<MediaCommand>,
}

impl MediaBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one command to the batch. Always succeeds in this in-process
    /// engine (there's no allocation failure to model) but returns `bool` to
    /// keep call sites identical to the spec's "every command that was
    /// successfully added... increments the sub-request counter" phrasing.
    pub fn add(&mut self, command: MediaCommand) -> bool {
        self.commands.push(command);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }
}

/// Message type discriminant for the two kinds of reply the engine posts
/// back to a session (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaMessageType {
    Response,
    Event,
}

/// One reply to a previously-batched command.
pub struct MediaResponse {
    pub context: ContextId,
    pub kind: CommandKind,
    pub message_type: MediaMessageType,
    pub termination: Option<TerminationId>,
    /// Populated for `ADD_TERMINATION`/`MODIFY_TERMINATION` completions when
    /// a descriptor was supplied and the engine configured a local endpoint.
    pub local: Option<RtpEndpoint>,
}

/// Owns the collection of contexts and executes batched commands against
/// them, posting one response per command back over the supplied channel.
pub struct MediaEngine {
    factory: std::sync::Arc<ContextFactory>,
}

impl MediaEngine {
    pub fn new(factory: std::sync::Arc<ContextFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &ContextFactory {
        &self.factory
    }

    /// Executes every command in `batch`, in order, against this engine's
    /// contexts, and posts a response for each one on `response_tx`. Spawned
    /// as a task to model the "separate media thread" concurrency boundary
    /// (spec §5) while preserving the batch's FIFO order.
    pub fn send_batch(&self, batch: MediaBatch, response_tx: mpsc::UnboundedSender<MediaResponse>) {
        let factory = self.factory.clone();
        tokio::spawn(async move {
            for command in batch.commands {
                let response = Self::execute(&factory, command);
                trace!(kind = ?response.kind, "media engine response");
                let _ = response_tx.send(response);
            }
        });
    }

    /// Runs every queued command synchronously — used by tests and by
    /// callers that want deterministic ordering without a task hop.
    pub fn execute_batch_sync(&self, batch: MediaBatch) -> Vec<MediaResponse> {
        batch
            .commands
            .into_iter()
            .map(|cmd| Self::execute(&self.factory, cmd))
            .collect()
    }

    fn execute(factory: &ContextFactory, command: MediaCommand) -> MediaResponse {
        let context = command.context();
        let kind = command.kind();

        match command {
            MediaCommand::AddTermination {
                context,
                termination,
                descriptor,
            } => {
                let term_id = termination.id;
                // The engine owns local endpoint assignment; a descriptor's
                // `local` field is already the engine-chosen address (set by
                // the caller from its own RTP port allocator) and is simply
                // echoed back once the add succeeds.
                let local = descriptor.as_ref().and_then(|d| d.local.clone());
                let result = factory.add_termination(context, termination);
                debug!(?context, ok = result.is_ok(), "ADD_TERMINATION");
                MediaResponse {
                    context,
                    kind,
                    message_type: MediaMessageType::Response,
                    termination: Some(term_id),
                    local: if result.is_ok() { local } else { None },
                }
            }
            MediaCommand::ModifyTermination {
                context,
                termination,
                descriptor,
            } => {
                debug!(?context, "MODIFY_TERMINATION");
                MediaResponse {
                    context,
                    kind,
                    message_type: MediaMessageType::Response,
                    termination: Some(termination),
                    local: descriptor.local,
                }
            }
            MediaCommand::SubtractTermination { context, termination } => {
                let _ = factory.subtract_termination(context, termination);
                debug!(?context, "SUBTRACT_TERMINATION");
                MediaResponse {
                    context,
                    kind,
                    message_type: MediaMessageType::Response,
                    termination: Some(termination),
                    local: None,
                }
            }
            MediaCommand::AddAssociation { context, t1, t2 } => {
                let _ = factory.add_association(context, t1, t2);
                MediaResponse {
                    context,
                    kind,
                    message_type: MediaMessageType::Response,
                    termination: None,
                    local: None,
                }
            }
            MediaCommand::RemoveAssociation { context, t1, t2 } => {
                let _ = factory.remove_association(context, t1, t2);
                MediaResponse {
                    context,
                    kind,
                    message_type: MediaMessageType::Response,
                    termination: None,
                    local: None,
                }
            }
            MediaCommand::ResetAssociations { context } => {
                let _ = factory.reset_associations(context);
                MediaResponse {
                    context,
                    kind,
                    message_type: MediaMessageType::Response,
                    termination: None,
                    local: None,
                }
            }
            MediaCommand::ApplyTopology { context } => {
                let _ = factory.apply_topology(context);
                MediaResponse {
                    context,
                    kind,
                    message_type: MediaMessageType::Response,
                    termination: None,
                    local: None,
                }
            }
            MediaCommand::DestroyTopology { context } => {
                let _ = factory.destroy_topology(context);
                MediaResponse {
                    context,
                    kind,
                    message_type: MediaMessageType::Response,
                    termination: None,
                    local: None,
                }
            }
        }
    }

    /// One media tick: `factory.process()`.
    pub fn tick(&self) {
        self.factory.process();
    }
}

pub type EngineResult<T> = Result<T>;
