//! Error kinds shared across the port, bus and scheduler layers.
//!
//! These are modeled as plain enums in the teacher's style rather than one
//! monolithic error type: each subsystem has its own failure shape, and
//! `EMemory`/out-of-memory is not representable as a catchable Rust error
//! (the allocator aborts the process), so it is not listed as a variant
//! here — see the scheduler's `Result`-returning run loop for how a fatal
//! container condition instead stops playback.

use derive_more::{Debug, Display, Error};

/// A native MIDI backend call failed (open, send, poll). Carries a
/// backend-supplied diagnostic string and is always scoped to one port.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
#[display("backend error on port: {diagnostic}")]
pub struct BackendError {
    pub diagnostic: String,
}

impl BackendError {
    pub fn new(diagnostic: impl Into<String>) -> Self {
        BackendError {
            diagnostic: diagnostic.into(),
        }
    }
}

/// An operation referenced a port that does not exist or is not open.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum InvalidPortError {
    #[display("port index {_0} is out of range")]
    OutOfRange(usize),
    #[display("port index {_0} is not open")]
    NotOpen(usize),
}

/// Input queue overflowed; some received events were dropped. Surfaced as a
/// single notification rather than per event, per the design's stated
/// policy.
#[derive(Debug, Display, Error, Clone, Copy, PartialEq, Eq)]
#[display("input queue overflowed, {dropped} event(s) dropped")]
pub struct OverflowError {
    pub dropped: u64,
}

/// Malformed wire data: SysEx without EOX, a truncated message, or a
/// tempo/time-signature meta-event with the wrong length. The offending
/// bytes are discarded by the caller; this type only carries the reason.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum MalformedError {
    #[display("system exclusive payload is missing its terminating 0xF7")]
    UnterminatedSysEx,
    #[display("message truncated: expected {expected} byte(s), got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[display("tempo meta-event had length {_0}, expected 3")]
    BadTempoLength(usize),
    #[display("time signature meta-event had length {_0}, expected 4")]
    BadTimeSignatureLength(usize),
}

/// Asserts an invariant in development builds (`EInvariant`, §7); in release
/// builds it logs and lets the caller's clamping logic carry on, since a
/// release-mode invariant violation must never crash playback.
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $($arg:tt)+) => {
        if cfg!(debug_assertions) {
            assert!($cond, $($arg)+);
        } else if !$cond {
            log::error!("invariant violated: {}", format!($($arg)+));
        }
    };
}
