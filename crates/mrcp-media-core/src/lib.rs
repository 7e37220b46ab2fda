//! Media context, termination, and stream-processing topology for MRCP
//! media sessions.
//!
//! This crate is the "media plane" half of the MRCP server session core: a
//! per-session association matrix over audio terminations ([`context`]),
//! the factory that ticks the contexts that currently hold terminations
//! ([`factory`]), the compiled graph of bridges/encoders/decoders a context
//! builds from its matrix ([`processors`]), and the batched-command engine
//! API the session orchestrator drives ([`engine`]).

pub mod context;
pub mod engine;
pub mod error;
pub mod factory;
pub mod processors;
pub mod termination;

pub use context::MediaContext;
pub use engine::{CommandKind, MediaBatch, MediaCommand, MediaEngine, MediaMessageType, MediaResponse, RtpDescriptor, RtpEndpoint};
pub use error::{MediaError, Result};
pub use factory::{ContextFactory, ContextId};
pub use termination::{AudioStream, Codec, CodecDescriptor, StreamMode, Termination, TerminationId};

/// Default media-context capacity (spec §4.3 step 1: "create the media
/// context (capacity 5)").
pub const DEFAULT_CONTEXT_CAPACITY: usize = 5;
