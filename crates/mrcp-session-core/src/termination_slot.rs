//! Per-RTP-media-line record (spec §3 "Termination Slot").

use mrcp_media_core::termination::TerminationId;

pub struct TerminationSlot {
    /// Position in the SDP audio array (spec §3 `id`).
    pub id: usize,
    pub mid: Option<u32>,
    pub termination: TerminationId,
    /// Ids of the channels sharing this slot's `mid` (spec §4.3 "build the
    /// slot's channel list by scanning channels with matching cmid").
    pub channels: Vec<usize>,
    pub waiting: bool,
}

impl TerminationSlot {
    pub fn new(id: usize, mid: Option<u32>, termination: TerminationId) -> Self {
        Self {
            id,
            mid,
            termination,
            channels: Vec::new(),
            waiting: false,
        }
    }
}
