//! The master bus: owns every input and output port, aggregates error
//! diagnostics, and handles recording and realtime transport messages
//! (§4.3).

use crate::error::{BackendError, InvalidPortError};
use crate::event::{Event, Pulse};
use crate::port::Port;
use log::{info, warn};

/// Whether and how an output port receives the scheduler's MIDI clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    Off,
    /// Clock tied to the transport position (restarts at song position 0).
    PosClock,
    /// Free-running clock, independent of transport position.
    ModClock,
}

struct OutputSlot {
    port: Box<dyn Port>,
    clock_mode: ClockMode,
    last_error: Option<String>,
}

struct InputSlot {
    port: Box<dyn Port>,
    record_enable: bool,
    last_error: Option<String>,
}

/// Which pattern (if any) is currently the recording target, and whether
/// incoming note-offs should be filtered (i.e. velocity-zero note-ons are
/// always normalized regardless of this flag; this only affects whether
/// *explicit* note-off status bytes are recorded at all).
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingState {
    pub pattern: Option<usize>,
    pub filter_note_offs: bool,
}

#[derive(Default)]
pub struct MasterBus {
    inputs: Vec<InputSlot>,
    outputs: Vec<OutputSlot>,
    pub recording: RecordingState,
}

impl MasterBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_output(&mut self, port: Box<dyn Port>, clock_mode: ClockMode) -> usize {
        self.outputs.push(OutputSlot {
            port,
            clock_mode,
            last_error: None,
        });
        self.outputs.len() - 1
    }

    pub fn add_input(&mut self, port: Box<dyn Port>, record_enable: bool) -> usize {
        self.inputs.push(InputSlot {
            port,
            record_enable,
            last_error: None,
        });
        self.inputs.len() - 1
    }

    pub fn port_count(&self, is_input: bool) -> usize {
        if is_input { self.inputs.len() } else { self.outputs.len() }
    }

    pub fn port_name(&self, is_input: bool, index: usize) -> Option<&str> {
        if is_input {
            self.inputs.get(index).map(|slot| slot.port.info().name.as_str())
        } else {
            self.outputs.get(index).map(|slot| slot.port.info().name.as_str())
        }
    }

    /// Opens every configured port. Errors on individual ports are
    /// collected rather than aborting the whole bus: a dead port is marked
    /// unusable and the rest of the bus continues (§7 `EBackend`).
    pub fn init(&mut self) -> Vec<(usize, BackendError)> {
        let mut failures = Vec::new();
        for (i, slot) in self.outputs.iter_mut().enumerate() {
            if let Err(e) = slot.port.init_out() {
                warn!("output port {i} failed to open: {e}");
                slot.last_error = Some(e.diagnostic.clone());
                failures.push((i, e));
            }
        }
        for (i, slot) in self.inputs.iter_mut().enumerate() {
            if let Err(e) = slot.port.init_in() {
                warn!("input port {i} failed to open: {e}");
                slot.last_error = Some(e.diagnostic.clone());
                failures.push((i, e));
            }
        }
        info!(
            "master bus initialized: {} output(s), {} input(s)",
            self.outputs.len(),
            self.inputs.len()
        );
        failures
    }

    /// Non-blocking: the total number of pending input bytes across every
    /// input port.
    pub fn poll_for_midi(&mut self) -> usize {
        self.inputs
            .iter_mut()
            .filter_map(|slot| slot.port.poll_for_midi().ok())
            .sum()
    }

    /// Dequeues the next pending input event from any input port. If
    /// recording is armed, the event is also handed back so the caller can
    /// route it to the recording pattern (the bus does not own patterns).
    /// A velocity-zero note-on is normalized to a note-off before it is
    /// ever returned.
    pub fn get_midi_event(&mut self) -> Option<Event> {
        for slot in &mut self.inputs {
            match slot.port.get_midi_event() {
                Ok(Some(mut event)) => {
                    if event.status_kind() == crate::event::STATUS_NOTE_ON && event.is_note_off() {
                        let channel_nibble = event.status & 0x0F;
                        event.status = crate::event::STATUS_NOTE_OFF | channel_nibble;
                    }
                    return Some(event);
                }
                Ok(None) => continue,
                Err(e) => {
                    slot.last_error = Some(e.diagnostic.clone());
                }
            }
        }
        None
    }

    /// Delivers a non-SysEx event to the named output port, stamping the
    /// channel nibble into the status byte.
    pub fn play(&mut self, bus: usize, event: &Event, channel: u8) -> Result<(), InvalidPortError> {
        let slot = self
            .outputs
            .get_mut(bus)
            .ok_or(InvalidPortError::OutOfRange(bus))?;
        if let Err(e) = slot.port.send_event(event, channel) {
            warn!("send failed on output {bus}: {e}");
            slot.last_error = Some(e.diagnostic);
        }
        Ok(())
    }

    /// Chunks and sends a SysEx payload to `bus`.
    pub fn sysex(&mut self, bus: usize, payload: &[u8]) -> Result<(), InvalidPortError> {
        let slot = self
            .outputs
            .get_mut(bus)
            .ok_or(InvalidPortError::OutOfRange(bus))?;
        if let Err(e) = slot.port.send_sysex(payload) {
            warn!("sysex send failed on output {bus}: {e}");
            slot.last_error = Some(e.diagnostic);
        }
        Ok(())
    }

    fn for_each_clocking_output(&mut self, mut f: impl FnMut(&mut dyn Port) -> Result<(), BackendError>) {
        for slot in &mut self.outputs {
            if slot.clock_mode == ClockMode::Off {
                continue;
            }
            if let Err(e) = f(slot.port.as_mut()) {
                slot.last_error = Some(e.diagnostic);
            }
        }
    }

    pub fn start(&mut self) {
        info!("transport start");
        self.for_each_clocking_output(|port| port.emit_start());
    }

    pub fn stop(&mut self) {
        info!("transport stop");
        self.for_each_clocking_output(|port| port.emit_stop());
    }

    /// Resumes from `tick`, emitting a song-position-pointer (tick /
    /// (PPQN/4), masked to 14 bits) before the continue message.
    pub fn continue_from(&mut self, tick: Pulse, ppqn: i32) {
        let sixteenth = (i64::from(ppqn) / 4).max(1);
        let beats = ((tick / sixteenth) & 0x3FFF) as u16;
        info!("transport continue from tick {tick} (song position {beats})");
        self.for_each_clocking_output(|port| port.emit_continue_from(beats));
    }

    /// Emits a MIDI clock byte to every clocking output, to be called when
    /// the scheduler determines the tick crossed a `PPQN/24` boundary.
    pub fn emit_clock(&mut self, tick: Pulse) {
        self.for_each_clocking_output(|port| port.emit_clock(tick));
    }

    /// Aggregates the last backend error string across every port, for a
    /// UI to display; `None` if every port is healthy.
    pub fn last_errors(&self) -> Vec<String> {
        self.outputs
            .iter()
            .filter_map(|s| s.last_error.clone())
            .chain(self.inputs.iter().filter_map(|s| s.last_error.clone()))
            .collect()
    }
}
