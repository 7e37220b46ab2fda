//! The association matrix + compiled topology that is the per-session media
//! context (spec §3, §4.1).

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::{MediaError, Result};
use crate::processors::{Bridge, Connection, ConnectionCore, Decoder, Encoder, NullBridge, StreamProcessor};
use crate::termination::{Slot, Termination, TerminationId, SLOT_UNATTACHED, StreamMode};

/// One row of the association-matrix header (`header[i]` in the original).
struct HeaderItem {
    termination: Option<Termination>,
    tx_count: usize,
    rx_count: usize,
}

impl HeaderItem {
    fn empty() -> Self {
        Self {
            termination: None,
            tx_count: 0,
            rx_count: 0,
        }
    }
}

/// Fixed-capacity association matrix over a session's terminations, plus the
/// topology compiled from it. See spec §3 "Media Context" and §4.1.
pub struct MediaContext {
    capacity: usize,
    count: usize,
    header: Vec<HeaderItem>,
    /// `matrix[i][j] == true` means a directed flow `i -> j` exists.
    matrix: Vec<Vec<bool>>,
    by_id: HashMap<TerminationId, Slot>,
    topology: Vec<Connection>,
}

impl MediaContext {
    pub fn new(capacity: usize) -> Self {
        let mut header = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            header.push(HeaderItem::empty());
        }
        Self {
            capacity,
            count: 0,
            header,
            matrix: vec![vec![false; capacity]; capacity],
            by_id: HashMap::new(),
            topology: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of occupied slots. A context belongs in the factory ring
    /// exactly while this is nonzero (invariant 3).
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn tx_count(&self, slot: Slot) -> usize {
        self.header[slot].tx_count
    }

    pub fn rx_count(&self, slot: Slot) -> usize {
        self.header[slot].rx_count
    }

    fn slot_of(&self, id: TerminationId) -> Result<Slot> {
        self.by_id
            .get(&id)
            .copied()
            .ok_or(MediaError::TerminationNotAttached)
    }

    /// `add_termination` — finds the first empty header slot, stores `t`,
    /// sets `t.slot`, bumps `count`. The caller is responsible for inserting
    /// the context into the factory ring on the 0->1 transition; see
    /// [`crate::factory::ContextFactory::add_termination`] which wraps this.
    pub fn add_termination(&mut self, mut termination: Termination) -> Result<Slot> {
        let free = self.header.iter().position(|h| h.termination.is_none());
        let slot = free.ok_or(MediaError::SlotFull {
            capacity: self.capacity,
        })?;

        termination.slot = slot;
        let id = termination.id;
        self.header[slot] = HeaderItem {
            termination: Some(termination),
            tx_count: 0,
            rx_count: 0,
        };
        self.by_id.insert(id, slot);
        self.count += 1;
        debug!(slot, "add termination");
        Ok(slot)
    }

    /// `subtract_termination` — clears every association bit touching `i`,
    /// decrements counts on the other endpoints, clears the header, returns
    /// the detached termination with its slot reset to unattached.
    pub fn subtract_termination(&mut self, id: TerminationId) -> Result<Termination> {
        let i = self.slot_of(id)?;

        for j in 0..self.capacity {
            if self.header[j].termination.is_none() {
                continue;
            }
            if self.matrix[i][j] {
                self.matrix[i][j] = false;
                self.header[i].tx_count -= 1;
                self.header[j].rx_count -= 1;
            }
            if self.matrix[j][i] {
                self.matrix[j][i] = false;
                self.header[j].tx_count -= 1;
                self.header[i].rx_count -= 1;
            }
        }

        let mut termination = self.header[i]
            .termination
            .take()
            .ok_or(MediaError::TerminationNotAttached)?;
        self.by_id.remove(&id);
        termination.slot = SLOT_UNATTACHED;
        self.count -= 1;
        debug!(slot = i, "subtract termination");
        Ok(termination)
    }

    /// `add_association(t1, t2)` — for each direction independently, sets the
    /// bit and bumps counts iff the bit was clear and the source/sink mode
    /// masks are compatible (§4.1, Association in GLOSSARY).
    pub fn add_association(&mut self, t1: TerminationId, t2: TerminationId) -> Result<()> {
        let i = self.slot_of(t1)?;
        let j = self.slot_of(t2)?;

        self.try_set_direction(i, j);
        self.try_set_direction(j, i);
        Ok(())
    }

    fn try_set_direction(&mut self, src: Slot, sink: Slot) {
        if self.matrix[src][sink] {
            return;
        }
        if Self::mode_compatible(&self.header[src], &self.header[sink]) {
            self.matrix[src][sink] = true;
            self.header[src].tx_count += 1;
            self.header[sink].rx_count += 1;
        }
    }

    fn mode_compatible(src: &HeaderItem, sink: &HeaderItem) -> bool {
        let (Some(src_t), Some(sink_t)) = (&src.termination, &sink.termination) else {
            return false;
        };
        src_t.audio_stream.mode.contains(StreamMode::RECEIVE)
            && sink_t.audio_stream.mode.contains(StreamMode::SEND)
    }

    /// `remove_association(t1, t2)` — clears both directions' bits if set.
    pub fn remove_association(&mut self, t1: TerminationId, t2: TerminationId) -> Result<()> {
        let i = self.slot_of(t1)?;
        let j = self.slot_of(t2)?;

        if self.matrix[i][j] {
            self.matrix[i][j] = false;
            self.header[i].tx_count -= 1;
            self.header[j].rx_count -= 1;
        }
        if self.matrix[j][i] {
            self.matrix[j][i] = false;
            self.header[j].tx_count -= 1;
            self.header[i].rx_count -= 1;
        }
        Ok(())
    }

    /// `reset_associations()` — destroys the topology, then clears every set
    /// bit and zeroes every count. Scans `j >= i` only: both directions of a
    /// pair are cleared in the same visit, so revisiting `j < i` would
    /// double-decrement nothing but waste a pass (mirrors the original's
    /// `for(j=i; ...)`).
    pub fn reset_associations(&mut self) {
        self.destroy_topology();

        let mut seen = 0;
        for i in 0..self.capacity {
            if seen == self.count {
                break;
            }
            if self.header[i].termination.is_none() {
                continue;
            }
            seen += 1;

            if self.header[i].tx_count == 0 && self.header[i].rx_count == 0 {
                continue;
            }
            for j in i..self.capacity {
                if self.header[j].termination.is_none() {
                    continue;
                }
                if self.matrix[i][j] {
                    self.matrix[i][j] = false;
                    self.header[i].tx_count -= 1;
                    self.header[j].rx_count -= 1;
                }
                if self.matrix[j][i] {
                    self.matrix[j][i] = false;
                    self.header[j].tx_count -= 1;
                    self.header[i].rx_count -= 1;
                }
            }
        }
    }

    /// `apply_topology()` — destroys the existing topology, then walks every
    /// ordered pair `(i, j)` with `matrix[i][j]` set and compiles a
    /// connection object for it.
    pub fn apply_topology(&mut self) {
        self.destroy_topology();

        let mut seen = 0;
        for i in 0..self.capacity {
            if seen == self.count {
                break;
            }
            if self.header[i].termination.is_none() {
                continue;
            }
            seen += 1;

            if self.header[i].tx_count == 0 && self.header[i].rx_count == 0 {
                continue;
            }
            for j in i..self.capacity {
                if self.header[j].termination.is_none() {
                    continue;
                }
                if self.matrix[i][j] {
                    if let Some(conn) = self.build_connection(i, j) {
                        self.topology.push(conn);
                    }
                }
                if i != j && self.matrix[j][i] {
                    if let Some(conn) = self.build_connection(j, i) {
                        self.topology.push(conn);
                    }
                }
            }
        }
    }

    /// `destroy_topology()` — calls each compiled object's destructor hook
    /// in order, then empties the list.
    pub fn destroy_topology(&mut self) {
        for obj in self.topology.iter_mut() {
            obj.destroy();
        }
        self.topology.clear();
    }

    /// `process()` — advances each compiled object one step, in list order.
    pub fn process(&mut self) {
        for obj in self.topology.iter_mut() {
            obj.process();
        }
    }

    pub fn topology_len(&self) -> usize {
        self.topology.len()
    }

    /// Connection construction (src -> sink), spec §4.1.
    fn build_connection(&self, src_slot: Slot, sink_slot: Slot) -> Option<Connection> {
        let src = self.header[src_slot].termination.as_ref()?;
        let sink = self.header[sink_slot].termination.as_ref()?;

        if !src.audio_stream.mode.contains(StreamMode::RECEIVE)
            || !sink.audio_stream.mode.contains(StreamMode::SEND)
        {
            return None;
        }

        let rx = src.audio_stream.rx_codec.as_ref()?;
        let tx = sink.audio_stream.tx_codec.as_ref()?;

        if rx.descriptor == tx.descriptor {
            return Some(Connection {
                decoder: None,
                core: ConnectionCore::Null(NullBridge::new(src.id, sink.id)),
                encoder: None,
            });
        }

        if rx.descriptor.sampling_rate != tx.descriptor.sampling_rate {
            warn!(
                rx_rate = rx.descriptor.sampling_rate,
                tx_rate = tx.descriptor.sampling_rate,
                "resampling is not supported; no connection object produced"
            );
            return None;
        }

        let decoder = rx.has_codec_vtable.then(|| Decoder {
            termination: src.id,
            frames_decoded: 0,
        });
        let encoder = tx.has_codec_vtable.then(|| Encoder {
            termination: sink.id,
            frames_encoded: 0,
        });

        Some(Connection {
            decoder,
            core: ConnectionCore::Bridged(Bridge {
                src: src.id,
                sink: sink.id,
                decoded_at_source: rx.has_codec_vtable,
                encoded_at_sink: tx.has_codec_vtable,
                frames_forwarded: 0,
            }),
            encoder,
        })
    }
}
