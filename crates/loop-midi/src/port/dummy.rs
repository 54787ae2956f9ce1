//! A no-op backend used by integration tests and the demonstration binary:
//! it never touches real hardware, but otherwise behaves like a real port,
//! recording everything sent through it for assertions.

use super::queue::InboundQueue;
use super::{Port, PortInfo};
use crate::error::BackendError;
use crate::event::Event;

/// The SysEx chunk size the reference backends use, per §6 ("80 ms is the
/// reference value" for the inter-chunk pause — the chunk size itself is
/// implementation-defined; this one keeps single-packet USB-MIDI transfers
/// in mind).
pub const SYSEX_CHUNK_SIZE: usize = 256;

/// How many inbound events the dummy's callback-simulation queue holds
/// before `push_inbound` starts reporting overflow, matching the bounded
/// queue every real backend is expected to use.
pub const INBOUND_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Realtime {
    Start,
    Stop,
    ContinueFrom(u16),
    Clock(i64),
}

#[derive(Debug)]
pub struct DummyPort {
    info: PortInfo,
    sent_events: Vec<Event>,
    sent_sysex_chunks: Vec<Vec<u8>>,
    realtime_log: Vec<Realtime>,
    inbound: InboundQueue,
    open: bool,
}

impl DummyPort {
    pub fn new(name: impl Into<String>) -> Self {
        DummyPort {
            info: PortInfo {
                client_id: 0,
                port_id: 0,
                name: name.into(),
                is_input: false,
            },
            sent_events: Vec::new(),
            sent_sysex_chunks: Vec::new(),
            realtime_log: Vec::new(),
            inbound: InboundQueue::new(INBOUND_QUEUE_CAPACITY),
            open: false,
        }
    }

    pub fn sent_events(&self) -> &[Event] {
        &self.sent_events
    }

    pub fn sent_sysex_chunks(&self) -> &[Vec<u8>] {
        &self.sent_sysex_chunks
    }

    pub fn realtime_log(&self) -> &[Realtime] {
        &self.realtime_log
    }

    /// Test hook: queues an event as if it had arrived from the backend's
    /// own callback thread, through the same bounded queue a real backend
    /// would push onto.
    pub fn push_inbound(&mut self, event: Event) {
        let _ = self.inbound.producer().push(event);
    }

    /// How many inbound events have been dropped because the queue was
    /// full when `push_inbound` ran.
    pub fn inbound_dropped_count(&self) -> u64 {
        self.inbound.dropped_count()
    }
}

impl Port for DummyPort {
    fn info(&self) -> &PortInfo {
        &self.info
    }

    fn init_out(&mut self) -> Result<(), BackendError> {
        self.open = true;
        Ok(())
    }

    fn init_in(&mut self) -> Result<(), BackendError> {
        self.open = true;
        Ok(())
    }

    fn deinit_in(&mut self) {
        self.open = false;
        while self.inbound.pop().is_some() {}
    }

    fn send_event(&mut self, event: &Event, channel: u8) -> Result<(), BackendError> {
        self.sent_events.push(event.with_channel(channel));
        Ok(())
    }

    fn send_sysex(&mut self, payload: &[u8]) -> Result<(), BackendError> {
        for chunk in payload.chunks(SYSEX_CHUNK_SIZE) {
            self.sent_sysex_chunks.push(chunk.to_vec());
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BackendError> {
        Ok(())
    }

    fn emit_start(&mut self) -> Result<(), BackendError> {
        self.realtime_log.push(Realtime::Start);
        Ok(())
    }

    fn emit_stop(&mut self) -> Result<(), BackendError> {
        self.realtime_log.push(Realtime::Stop);
        Ok(())
    }

    fn emit_continue_from(&mut self, beats: u16) -> Result<(), BackendError> {
        self.realtime_log.push(Realtime::ContinueFrom(beats));
        Ok(())
    }

    fn emit_clock(&mut self, tick: i64) -> Result<(), BackendError> {
        self.realtime_log.push(Realtime::Clock(tick));
        Ok(())
    }

    fn poll_for_midi(&mut self) -> Result<usize, BackendError> {
        Ok(self.inbound.len())
    }

    fn get_midi_event(&mut self) -> Result<Option<Event>, BackendError> {
        Ok(self.inbound.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    #[test]
    fn send_sysex_chunks_large_payloads() {
        let mut port = DummyPort::new("dummy");
        let payload = vec![0x41u8; 4096];
        port.send_sysex(&payload).unwrap();
        let reassembled: Vec<u8> = port.sent_sysex_chunks().concat();
        assert_eq!(reassembled, payload);
        assert_eq!(port.sent_sysex_chunks().len(), 4096usize.div_ceil(SYSEX_CHUNK_SIZE));
    }

    #[test]
    fn send_event_ors_channel_into_status() {
        let mut port = DummyPort::new("dummy");
        port.send_event(&Event::note_on(0, 0, 60, 100), 5).unwrap();
        assert_eq!(port.sent_events()[0].channel, Some(5));
    }

    #[test]
    fn inbound_queue_is_fifo() {
        let mut port = DummyPort::new("dummy");
        port.push_inbound(Event::note_on(0, 0, 60, 100));
        port.push_inbound(Event::note_on(0, 0, 61, 100));
        assert_eq!(port.poll_for_midi().unwrap(), 2);
        assert_eq!(port.get_midi_event().unwrap().unwrap().note_number(), Some(60));
        assert_eq!(port.get_midi_event().unwrap().unwrap().note_number(), Some(61));
    }

    #[test]
    fn deinit_in_drains_pending_inbound_events() {
        let mut port = DummyPort::new("dummy");
        port.push_inbound(Event::note_on(0, 0, 60, 100));
        port.deinit_in();
        assert_eq!(port.poll_for_midi().unwrap(), 0);
    }

    #[test]
    fn push_inbound_past_capacity_drops_and_counts() {
        let mut port = DummyPort::new("dummy");
        for i in 0..(INBOUND_QUEUE_CAPACITY + 4) {
            port.push_inbound(Event::note_on(0, 0, (i % 128) as u8, 100));
        }
        assert_eq!(port.poll_for_midi().unwrap(), INBOUND_QUEUE_CAPACITY);
        assert_eq!(port.inbound_dropped_count(), 4);
    }
}
