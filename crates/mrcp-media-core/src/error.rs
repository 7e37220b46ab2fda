//! Media error types

use thiserror::Error;

/// Errors surfaced by the media context and its collaborators.
///
/// Predicate-style failures named in the spec (slot full, wrong termination
/// at a slot, mode mismatch) are reported as `bool`/`Option` return values,
/// not as `Err` — this enum is reserved for misuse that a well-formed caller
/// should never trigger (capacity exceeded at construction time, an
/// out-of-range slot index).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MediaError {
    /// `add_termination` found no free header slot.
    #[error("media context has no free termination slot (capacity {capacity})")]
    SlotFull { capacity: usize },

    /// A termination was addressed by a slot index it no longer (or never) occupies.
    #[error("termination is not attached to this context")]
    TerminationNotAttached,

    /// Requested association is impossible because mode bits don't line up.
    #[error("association requires source RECEIVE and sink SEND capability")]
    ModeIncompatible,

    /// Two codecs differ in sampling rate; resampling is a non-goal.
    #[error("sampling rate mismatch ({rx} != {tx}); resampling is not supported")]
    SamplingRateMismatch { rx: u32, tx: u32 },

    /// Escape hatch for everything else, mirroring `media-core`'s own
    /// catch-all error variant.
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, MediaError>;
