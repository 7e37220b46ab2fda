//! Compiled stream-processing objects: the graph nodes that `apply_topology`
//! builds from the association matrix and that `process()` advances once
//! per tick.
//!
//! The original distinguishes four object kinds (null bridge, bridge,
//! encoder, decoder) but gives them all the same two operations. Rather than
//! a small class hierarchy, they're modeled here as one enum implementing a
//! single trait — per §9's guidance to avoid deep hierarchies.

use crate::termination::TerminationId;

/// Shared behavior of every compiled stream-processing object.
pub trait StreamProcessor: std::fmt::Debug + Send {
    /// Advance this object by one media tick.
    fn process(&mut self);

    /// Release any resources held by this object. Called once, in order,
    /// before the compiled topology is replaced or torn down.
    fn destroy(&mut self) {}
}

/// Zero-copy pass-through between two terminations whose codec descriptors
/// match exactly (§4.1 step 3).
#[derive(Debug)]
pub struct NullBridge {
    pub src: TerminationId,
    pub sink: TerminationId,
    pub frames_forwarded: u64,
}

impl NullBridge {
    pub fn new(src: TerminationId, sink: TerminationId) -> Self {
        Self {
            src,
            sink,
            frames_forwarded: 0,
        }
    }
}

impl StreamProcessor for NullBridge {
    fn process(&mut self) {
        self.frames_forwarded += 1;
    }
}

/// Bridge between two (possibly decoder/encoder-wrapped) streams whose
/// underlying codec differs but whose sampling rate matches (§4.1 step 5).
#[derive(Debug)]
pub struct Bridge {
    pub src: TerminationId,
    pub sink: TerminationId,
    pub decoded_at_source: bool,
    pub encoded_at_sink: bool,
    pub frames_forwarded: u64,
}

impl StreamProcessor for Bridge {
    fn process(&mut self) {
        self.frames_forwarded += 1;
    }
}

/// Decodes `src`'s codec to linear before handing frames downstream to a
/// [`Bridge`]. A thin wrapper, not a standalone graph edge — it shares the
/// source termination with the bridge it feeds.
#[derive(Debug)]
pub struct Decoder {
    pub termination: TerminationId,
    pub frames_decoded: u64,
}

impl StreamProcessor for Decoder {
    fn process(&mut self) {
        self.frames_decoded += 1;
    }
}

/// Encodes linear audio into `sink`'s codec before it leaves the bridge.
#[derive(Debug)]
pub struct Encoder {
    pub termination: TerminationId,
    pub frames_encoded: u64,
}

impl StreamProcessor for Encoder {
    fn process(&mut self) {
        self.frames_encoded += 1;
    }
}

/// One connection in the compiled topology. A [`Bridge`] connection may be
/// preceded by a [`Decoder`] and/or followed by an [`Encoder`]; those wrapper
/// stages are processed (and destroyed) alongside it.
#[derive(Debug)]
pub struct Connection {
    pub decoder: Option<Decoder>,
    pub core: ConnectionCore,
    pub encoder: Option<Encoder>,
}

#[derive(Debug)]
pub enum ConnectionCore {
    Null(NullBridge),
    Bridged(Bridge),
}

impl StreamProcessor for Connection {
    fn process(&mut self) {
        if let Some(d) = self.decoder.as_mut() {
            d.process();
        }
        match &mut self.core {
            ConnectionCore::Null(b) => b.process(),
            ConnectionCore::Bridged(b) => b.process(),
        }
        if let Some(e) = self.encoder.as_mut() {
            e.process();
        }
    }

    fn destroy(&mut self) {
        // Intentionally empty: the fake stream objects here own no external
        // resources. A real engine's bridge/encoder/decoder would release
        // codec contexts and ring buffers here.
    }
}
