//! Wire-adjacent data types: session identity, offer/answer descriptors, and
//! the per-media-line shapes the orchestrator reads and writes (spec §3, §6).

use std::fmt;

use mrcp_media_core::termination::StreamMode;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

/// 16-character uppercase hex session id, unique per process lifetime
/// (spec §3, §6 "Session ID format").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generates one id from a process-local RNG. Collisions are checked by
    /// the caller (`SessionTable::insert`) rather than assumed impossible —
    /// the spec's invariant is uniqueness, not improbability of collision.
    pub fn generate(rng: &mut SmallRng) -> Self {
        let value = rng.next_u64();
        SessionId(format!("{:016X}", value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// MRCP protocol version discriminant (spec §6 "Protocol versions"). The
/// core branches on this only at the three points the spec names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MrcpVersion {
    V1,
    V2,
}

/// Observable answer status codes (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerStatus {
    Ok,
    NoSuchResource,
    UnacceptableResource,
    UnavailableResource,
}

/// Opaque per-method request/response/event body. Method state machines are
/// out of scope (spec §1); the orchestrator routes this without interpreting
/// its contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMessage {
    pub body: serde_json::Value,
}

/// Distinguishes a resource engine's method response from an out-of-band
/// event when routing it back to the client (spec §4.3 "method state machine
/// dispatch"): a response advances the signaling queue, an event does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMessageKind {
    Response,
    Event,
}

/// One message a resource engine hands back while processing a request
/// (spec §4.3 "method state machine dispatch"): zero or more events followed
/// by at most one response, in emission order.
#[derive(Debug, Clone)]
pub struct EngineMessage {
    pub kind: EngineMessageKind,
    pub message: ControlMessage,
}

/// One `application/mrcp*` control media line in an offer or answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlMediaDescriptor {
    /// Position in the SDP control array; becomes `Channel::id`.
    pub id: usize,
    pub resource_name: Option<String>,
    /// Grouping tag linking this control line to an `audio` line by `mid`.
    pub cmid: Option<u32>,
    pub port: u16,
}

/// One `audio` media line in an offer or answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioMediaDescriptor {
    /// Position in the SDP audio array; becomes `TerminationSlot::id`.
    pub id: usize,
    pub mid: Option<u32>,
    #[serde(skip)]
    pub mode: StreamMode,
    pub codec_name: Option<String>,
    pub sampling_rate: Option<u32>,
    pub ip: Option<String>,
    pub ext_ip: Option<String>,
    pub port: u16,
}

impl Default for AudioMediaDescriptor {
    fn default() -> Self {
        Self {
            id: 0,
            mid: None,
            mode: StreamMode::NONE,
            codec_name: None,
            sampling_rate: None,
            ip: None,
            ext_ip: None,
            port: 0,
        }
    }
}

/// Video media lines are carried through untouched (spec §9 open question:
/// "preserve the pass-through; do not invent semantics"). The core never
/// reads or writes fields inside this value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoMediaDescriptor {
    pub raw: serde_json::Value,
}

/// A client offer (spec §6 `OFFER { descriptor }`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferDescriptor {
    /// MRCPv1 only: the single implicit resource name.
    pub resource_name: Option<String>,
    pub resource_state: Option<String>,
    pub status: Option<AnswerStatus>,
    pub control: Vec<ControlMediaDescriptor>,
    pub audio: Vec<AudioMediaDescriptor>,
    pub video: Vec<VideoMediaDescriptor>,
}

/// The answer the orchestrator builds up and eventually sends back (spec
/// §4.3 step 2: "copy resource_name/resource_state/status... allocate
/// per-media answer slots filled with null").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerDescriptor {
    pub resource_name: Option<String>,
    pub resource_state: Option<String>,
    pub status: AnswerStatus,
    pub control: Vec<Option<ControlMediaDescriptor>>,
    pub audio: Vec<Option<AudioMediaDescriptor>>,
    pub video: Vec<VideoMediaDescriptor>,
}

impl AnswerDescriptor {
    /// Builds the "fresh answer" that offer processing step 2 describes:
    /// copied scalar fields, null-filled per-media slots sized to the offer.
    pub fn from_offer(offer: &OfferDescriptor) -> Self {
        Self {
            resource_name: offer.resource_name.clone(),
            resource_state: offer.resource_state.clone(),
            status: AnswerStatus::Ok,
            control: vec![None; offer.control.len()],
            audio: vec![None; offer.audio.len()],
            video: offer.video.clone(),
        }
    }
}
