//! One audio endpoint inside a [`crate::context::MediaContext`].

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Index back into a context's `header[]` array. `SLOT_UNATTACHED` stands in
/// for the C original's `(apr_size_t)-1` sentinel.
pub type Slot = usize;

pub const SLOT_UNATTACHED: Slot = usize::MAX;

/// Stream direction capability mask. A termination's audio stream may
/// support sending, receiving, or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMode(u8);

impl StreamMode {
    pub const NONE: StreamMode = StreamMode(0);
    pub const SEND: StreamMode = StreamMode(1 << 0);
    pub const RECEIVE: StreamMode = StreamMode(1 << 1);
    pub const SEND_RECEIVE: StreamMode = StreamMode(Self::SEND.0 | Self::RECEIVE.0);

    pub fn contains(self, other: StreamMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for StreamMode {
    type Output = StreamMode;
    fn bitor(self, rhs: StreamMode) -> StreamMode {
        StreamMode(self.0 | rhs.0)
    }
}

impl BitOrAssign for StreamMode {
    fn bitor_assign(&mut self, rhs: StreamMode) {
        self.0 |= rhs.0;
    }
}

impl Default for StreamMode {
    fn default() -> Self {
        StreamMode::NONE
    }
}

/// Codec identity used for the descriptor-equality check in connection
/// construction (§4.1 step 3: "if `rx.descriptor == tx.descriptor`").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecDescriptor {
    pub name: String,
    pub sampling_rate: u32,
    pub channels: u8,
}

/// A codec's presence implies whether it needs a decode/encode wrapper when
/// bridging against a mismatched tx/rx codec (§4.1 step 5).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codec {
    pub descriptor: CodecDescriptor,
    /// `true` when this codec exposes a decode/encode vtable, i.e. it isn't
    /// raw/linear PCM and needs a wrapper object in the compiled topology.
    pub has_codec_vtable: bool,
}

/// The audio half of a termination: direction mask plus the two codec
/// descriptors connection construction reads from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioStream {
    pub mode: StreamMode,
    pub rx_codec: Option<Codec>,
    pub tx_codec: Option<Codec>,
}

impl AudioStream {
    pub fn new(mode: StreamMode) -> Self {
        Self {
            mode,
            rx_codec: None,
            tx_codec: None,
        }
    }

    pub fn with_codecs(mut self, rx: Codec, tx: Codec) -> Self {
        self.rx_codec = Some(rx);
        self.tx_codec = Some(tx);
        self
    }
}

/// Unique id for a termination, independent of its (transient) context slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TerminationId(pub Uuid);

impl TerminationId {
    pub fn new() -> Self {
        TerminationId(Uuid::new_v4())
    }
}

impl Default for TerminationId {
    fn default() -> Self {
        Self::new()
    }
}

/// One audio endpoint — either an RTP termination (talks to the network) or
/// an engine-owned termination (talks to a resource engine). The core
/// doesn't care which; it only reads the audio stream and slot.
#[derive(Debug, Clone)]
pub struct Termination {
    pub id: TerminationId,
    pub audio_stream: AudioStream,
    /// Arena index back into the owning context's `header[]`, or
    /// `SLOT_UNATTACHED` while the termination isn't in any context.
    pub slot: Slot,
}

impl Termination {
    pub fn new(audio_stream: AudioStream) -> Self {
        Self {
            id: TerminationId::new(),
            audio_stream,
            slot: SLOT_UNATTACHED,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot != SLOT_UNATTACHED
    }
}
