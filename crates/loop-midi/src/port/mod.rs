//! The external collaborator interface (§4.6): a uniform contract over
//! native MIDI backends (ALSA, JACK, CoreMIDI, WinMM/PortMidi — none of
//! which live in this crate) plus the [`dummy`] test backend.

pub mod dummy;
pub mod queue;

use crate::error::BackendError;
use crate::event::Event;

/// Static information about one open port, reported by the backend at
/// open time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub client_id: u32,
    pub port_id: u32,
    pub name: String,
    pub is_input: bool,
}

/// One direction of one native MIDI endpoint. Every concrete backend
/// implements this; the core never knows which one it holds (§9 "no
/// virtual-dispatch midi_api base exposed outside the port module" — this
/// trait itself is the one seam that polymorphism is allowed to live at).
pub trait Port: std::fmt::Debug + Send {
    fn info(&self) -> &PortInfo;

    /// Opens one hardware endpoint.
    fn init_out(&mut self) -> Result<(), BackendError>;
    fn init_in(&mut self) -> Result<(), BackendError>;

    /// Opens one backend-advertised virtual endpoint other applications can
    /// connect to. Not every backend supports this; the default
    /// implementation reports it as unsupported rather than panicking.
    fn init_out_sub(&mut self) -> Result<(), BackendError> {
        Err(BackendError::new("virtual output ports are not supported by this backend"))
    }
    fn init_in_sub(&mut self) -> Result<(), BackendError> {
        Err(BackendError::new("virtual input ports are not supported by this backend"))
    }

    /// Unsubscribes/closes the input side without destroying the port
    /// object.
    fn deinit_in(&mut self);

    /// Serializes and sends one channel event, with `channel` ORed into
    /// the status byte.
    fn send_event(&mut self, event: &Event, channel: u8) -> Result<(), BackendError>;

    /// Serializes and sends one SysEx message, chunked by the backend's
    /// preferred maximum.
    fn send_sysex(&mut self, payload: &[u8]) -> Result<(), BackendError>;

    /// Drains any backend-local output queue.
    fn flush(&mut self) -> Result<(), BackendError>;

    fn emit_start(&mut self) -> Result<(), BackendError>;
    fn emit_stop(&mut self) -> Result<(), BackendError>;
    /// `beats` is the 16th-note count since song start (tick / (PPQN/4)).
    fn emit_continue_from(&mut self, beats: u16) -> Result<(), BackendError>;
    fn emit_clock(&mut self, tick: i64) -> Result<(), BackendError>;

    /// Returns the number of pending input bytes without blocking.
    fn poll_for_midi(&mut self) -> Result<usize, BackendError>;

    /// Dequeues one pending input event, if any.
    fn get_midi_event(&mut self) -> Result<Option<Event>, BackendError>;
}
