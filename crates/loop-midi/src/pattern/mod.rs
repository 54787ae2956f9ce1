//! A pattern: one looping container of events plus the playback, recording
//! and editing state attached to it.

pub mod trigger;
pub mod undo;

use crate::calc::TimeSignature;
use crate::event::container::EventContainer;
use crate::event::{Event, Flags, Payload, Pulse};
use crate::port::Port;
use trigger::TriggerList;
use undo::UndoStack;

/// What happens to a note-on whose paired note-off falls past a pattern's
/// new, shorter length (§9 open question). The source was inconsistent
/// about this; exposing it as configuration resolves it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShrinkMode {
    /// Synthesize an artificial note-off exactly at the new end.
    SynthesizeNoteOff,
    /// Drop the orphaned note-on outright.
    Drop,
}

impl Default for ShrinkMode {
    fn default() -> Self {
        ShrinkMode::SynthesizeNoteOff
    }
}

/// The pattern's position in the queue/mute state machine (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Stopped,
    Playing,
    Muted,
    QueuedOff,
    QueuedOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetLengthError {
    NotPositive,
    NotAMeasureMultiple,
}

impl std::fmt::Display for SetLengthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetLengthError::NotPositive => write!(f, "pattern length must be positive"),
            SetLengthError::NotAMeasureMultiple => {
                write!(f, "pattern length must be a whole multiple of one measure")
            }
        }
    }
}

impl std::error::Error for SetLengthError {}

/// Where a pattern's window walk sends its events — a directly-held port or
/// the master bus — kept as a trait so channel messages and SysEx can be
/// routed down different wire paths (§4.6; SysEx must go through the
/// chunking path, never `send_event`/`play`).
trait PlaySink {
    fn send_channel(&mut self, event: &Event);
    fn send_sysex(&mut self, payload: &[u8]);
}

struct PortSink<'a> {
    port: &'a mut dyn Port,
    channel: u8,
}

impl PlaySink for PortSink<'_> {
    fn send_channel(&mut self, event: &Event) {
        let _ = self.port.send_event(event, self.channel);
    }

    fn send_sysex(&mut self, payload: &[u8]) {
        let _ = self.port.send_sysex(payload);
    }
}

struct BusSink<'a> {
    bus: &'a mut crate::bus::MasterBus,
    bus_index: usize,
    channel: u8,
}

impl PlaySink for BusSink<'_> {
    fn send_channel(&mut self, event: &Event) {
        let _ = self.bus.play(self.bus_index, event, self.channel);
    }

    fn send_sysex(&mut self, payload: &[u8]) {
        let _ = self.bus.sysex(self.bus_index, payload);
    }
}

pub struct Pattern {
    pub name: String,
    pub channel: u8,
    pub bus: usize,
    pub color: Option<u8>,

    pub length: Pulse,
    pub time_signature: TimeSignature,
    pub ppqn: i32,
    /// Overrides the engine's tempo for this pattern alone, when set.
    pub tempo_override: Option<f64>,

    pub state: PlayState,
    pub recording: bool,
    pub thru: bool,
    pub snap_on: bool,
    pub snap_pulses: Pulse,
    pub shrink_mode: ShrinkMode,

    modified: bool,
    container: EventContainer,
    triggers: TriggerList,
    undo_stack: UndoStack<EventContainer>,
    redo_stack: UndoStack<EventContainer>,

    /// Note numbers (per channel) currently sounding during live playback;
    /// flushed as note-offs when the pattern is stopped.
    active_notes: Vec<(u8, u8)>,
}

impl Pattern {
    pub fn new(name: impl Into<String>, ppqn: i32, time_signature: TimeSignature, undo_depth: usize) -> Self {
        let length = time_signature.pulses_per_measure(ppqn);
        Pattern {
            name: name.into(),
            channel: 0,
            bus: 0,
            color: None,
            length,
            time_signature,
            ppqn,
            tempo_override: None,
            state: PlayState::Stopped,
            recording: false,
            thru: false,
            snap_on: false,
            snap_pulses: ppqn as Pulse / 4,
            shrink_mode: ShrinkMode::default(),
            modified: false,
            container: EventContainer::new(),
            triggers: TriggerList::new(),
            undo_stack: UndoStack::new(undo_depth),
            redo_stack: UndoStack::new(undo_depth),
            active_notes: Vec::new(),
        }
    }

    pub fn container(&self) -> &EventContainer {
        &self.container
    }

    pub fn triggers(&self) -> &TriggerList {
        &self.triggers
    }

    pub fn triggers_mut(&mut self) -> &mut TriggerList {
        &mut self.triggers
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    // -- state machine transitions (§4.2) ------------------------------

    pub fn request_play(&mut self) {
        if self.state != PlayState::Playing {
            self.state = PlayState::Playing;
        }
    }

    pub fn set_mute(&mut self, muted: bool) {
        if muted {
            self.state = PlayState::Muted;
        } else if self.state == PlayState::Muted {
            self.state = PlayState::Playing;
        }
    }

    pub fn request_queue_off(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::QueuedOff;
        }
    }

    pub fn request_queue_on(&mut self) {
        if self.state == PlayState::Muted {
            self.state = PlayState::QueuedOn;
        }
    }

    /// Called by the scheduler exactly once per bar boundary crossed;
    /// resolves any pending queue transition.
    pub fn on_bar_boundary(&mut self) {
        self.state = match self.state {
            PlayState::QueuedOff => PlayState::Muted,
            PlayState::QueuedOn => PlayState::Playing,
            other => other,
        };
    }

    /// Stops the pattern outright, returning note-off events for every
    /// still-sounding note so the caller can flush them to the bus.
    pub fn stop(&mut self) -> Vec<Event> {
        self.state = PlayState::Stopped;
        let flush: Vec<Event> = self
            .active_notes
            .drain(..)
            .map(|(channel, note)| Event::note_off(0, channel, note, 0))
            .collect();
        flush
    }

    pub fn is_audible(&self) -> bool {
        matches!(self.state, PlayState::Playing | PlayState::QueuedOff)
    }

    // -- editing --------------------------------------------------------

    fn snapshot(&self) -> EventContainer {
        // `EventContainer` doesn't derive `Clone` generically cheap-copy
        // fields only, so a full snapshot walks and rebuilds it; done via
        // merge-from-iterator to keep this in one place.
        let mut copy = EventContainer::new();
        for (_, event) in self.container.iter() {
            copy.append(crate::event::unlinked_copy(event));
        }
        copy
    }

    pub fn push_undo(&mut self) {
        self.undo_stack.push(self.snapshot());
        self.redo_stack.clear();
    }

    pub fn pop_undo(&mut self) -> bool {
        if let Some(prior) = self.undo_stack.pop() {
            self.redo_stack.push(self.snapshot());
            self.container = prior;
            self.modified = true;
            true
        } else {
            false
        }
    }

    pub fn push_redo(&mut self) {
        self.redo_stack.push(self.snapshot());
    }

    pub fn pop_redo(&mut self) -> bool {
        if let Some(next) = self.redo_stack.pop() {
            self.undo_stack.push(self.snapshot());
            self.container = next;
            self.modified = true;
            true
        } else {
            false
        }
    }

    /// Sets the pattern's length. `pulses` must be a positive multiple of
    /// one measure under the pattern's current time signature.
    pub fn set_length(&mut self, pulses: Pulse) -> Result<(), SetLengthError> {
        if pulses <= 0 {
            return Err(SetLengthError::NotPositive);
        }
        let measure = self.time_signature.pulses_per_measure(self.ppqn);
        if measure == 0 || pulses % measure != 0 {
            return Err(SetLengthError::NotAMeasureMultiple);
        }

        if pulses < self.length {
            self.shrink_to(pulses);
        }
        self.length = pulses;
        self.triggers.truncate_to(pulses);
        self.container.verify_and_link(pulses);
        self.modified = true;
        Ok(())
    }

    fn shrink_to(&mut self, new_length: Pulse) {
        let orphans: Vec<Event> = self
            .container
            .iter()
            .filter(|(_, e)| {
                e.is_live_note_on()
                    && e.timestamp < new_length
                    && match e.link {
                        crate::event::Link::Partner(_) => false,
                        _ => true,
                    }
            })
            .map(|(_, e)| e.clone())
            .collect();

        match self.shrink_mode {
            ShrinkMode::SynthesizeNoteOff => {
                for note_on in orphans {
                    if let Some(note) = note_on.note_number() {
                        let channel = note_on.channel.unwrap_or(self.channel);
                        self.container
                            .append(Event::note_off(new_length.saturating_sub(1), channel, note, 0));
                    }
                }
            }
            ShrinkMode::Drop => {
                // Nothing to synthesize; verify_and_link's length prune
                // will also remove the note-on itself once it crosses
                // new_length, but notes that start before it and would
                // otherwise remain unpaired are left unpaired (visible
                // only during recording, per the container's own
                // invariant) and get cleaned up on the next edit.
            }
        }
    }

    /// Appends `event`, marking the pattern modified. When snap is enabled
    /// and the event is a note, its timestamp is first quantized to the
    /// nearest multiple of the snap grid.
    pub fn add_event(&mut self, mut event: Event) {
        if self.snap_on && event.note_number().is_some() && self.snap_pulses > 0 {
            event.timestamp = snap_to_grid(event.timestamp, self.snap_pulses);
        }
        self.container.append(event);
        self.modified = true;
    }

    /// Live-recording entry point: stamps `event` with `current_tick`
    /// (wrapped into the pattern's length) and appends it. Returns the
    /// stamped event for thru-mode forwarding by the caller (the bus owns
    /// the actual output port, not the pattern).
    pub fn stream_event(&mut self, mut event: Event, current_tick: Pulse) -> Event {
        event.timestamp = current_tick.rem_euclid(self.length.max(1));
        self.container.append(event.clone());
        self.modified = true;
        event
    }

    /// Emits events whose timestamp falls in `[begin, end)` modulo the
    /// pattern's length to `out_port`, with the pattern's channel ORed into
    /// the status byte of channel messages. A window that wraps past the
    /// pattern's length is split into two sub-windows.
    ///
    /// Meta events (set-tempo included) are never transmitted — they are a
    /// file-only construct and `0xFF` on the wire means System Reset. Use
    /// [`Self::tempo_change_in_window`] to consume set-tempo events for the
    /// same span.
    pub fn play(&mut self, begin: Pulse, end: Pulse, out_port: &mut dyn Port) {
        let channel = self.channel;
        let mut sink = PortSink { port: out_port, channel };
        self.play_dispatch(begin, end, &mut sink);
    }

    /// Same as [`Self::play`], but routes each event through the master
    /// bus's named output instead of a directly-held port. This is what
    /// the scheduler actually calls, since it mediates every send through
    /// the bus rather than touching a port directly.
    pub fn play_via_bus(&mut self, begin: Pulse, end: Pulse, bus_index: usize, bus: &mut crate::bus::MasterBus) {
        let channel = self.channel;
        let mut sink = BusSink { bus, bus_index, channel };
        self.play_dispatch(begin, end, &mut sink);
    }

    /// Returns the BPM a set-tempo event in `[begin, end)` (modulo the
    /// pattern's length, split across a wrap the same way [`Self::play`]
    /// splits it) should publish to the engine's tempo block, if any falls
    /// in range. When more than one does, the chronologically last one
    /// wins. `tempo_override`, when set, substitutes for whatever BPM the
    /// event itself encodes, while still gating on the event's presence.
    pub fn tempo_change_in_window(&self, begin: Pulse, end: Pulse) -> Option<f64> {
        if self.length <= 0 || begin >= end {
            return None;
        }
        let span = end - begin;
        if span >= self.length {
            return self.last_tempo_in_range(0, self.length);
        }
        let begin = begin.rem_euclid(self.length);
        let true_end = begin + span;
        if true_end <= self.length {
            self.last_tempo_in_range(begin, true_end)
        } else {
            let first = self.last_tempo_in_range(begin, self.length);
            let second = self.last_tempo_in_range(0, true_end - self.length);
            second.or(first)
        }
    }

    fn last_tempo_in_range(&self, begin: Pulse, end: Pulse) -> Option<f64> {
        if !self.container.has_tempo() {
            return None;
        }
        self.container
            .iter()
            .filter(|(_, e)| e.timestamp >= begin && e.timestamp < end && e.is_set_tempo())
            .filter_map(|(_, e)| self.tempo_override.or_else(|| e.tempo_bpm()))
            .last()
    }

    fn play_dispatch(&mut self, begin: Pulse, end: Pulse, sink: &mut dyn PlaySink) {
        if self.length <= 0 || begin >= end {
            return;
        }
        let span = end - begin;
        if span >= self.length {
            self.play_window(0, self.length, sink);
            return;
        }
        let begin = begin.rem_euclid(self.length);
        let true_end = begin + span;
        if true_end <= self.length {
            self.play_window(begin, true_end, sink);
        } else {
            self.play_window(begin, self.length, sink);
            self.play_window(0, true_end - self.length, sink);
        }
    }

    fn play_window(&mut self, begin: Pulse, end: Pulse, sink: &mut dyn PlaySink) {
        let channel = self.channel;
        let events: Vec<Event> = self
            .container
            .iter()
            .filter(|(_, e)| e.timestamp >= begin && e.timestamp < end)
            .map(|(_, e)| e.clone())
            .collect();
        for event in events {
            match &event.payload {
                // Meta events are file-only; set-tempo is consumed via
                // `tempo_change_in_window` and the rest have no live-port
                // meaning at all.
                Payload::Meta { .. } => continue,
                Payload::SysEx(payload) => {
                    sink.send_sysex(payload.as_slice());
                    continue;
                }
                Payload::Channel { .. } => {}
            }
            let out_event = event.with_channel(channel);
            if let Some(ch) = out_event.channel {
                if out_event.is_live_note_on() {
                    if let Some(note) = out_event.note_number() {
                        self.active_notes.push((ch, note));
                    }
                } else if out_event.is_note_off() {
                    if let Some(note) = out_event.note_number() {
                        self.active_notes.retain(|&(c, n)| !(c == ch && n == note));
                    }
                }
            }
            sink.send_channel(&out_event);
        }
    }

    // -- bulk transforms (§4.2) -----------------------------------------

    pub fn multiply_pattern(&mut self, factor: u32) {
        self.push_undo();
        if factor == 0 {
            return;
        }
        let mut copies = Vec::new();
        for (_, event) in self.container.iter() {
            for i in 1..factor {
                let mut copy = crate::event::unlinked_copy(event);
                copy.timestamp += self.length * i as i64;
                copies.push(copy);
            }
        }
        for copy in copies {
            self.container.append(copy);
        }
        self.length *= factor as i64;
        self.container.verify_and_link(self.length);
        self.modified = true;
    }

    pub fn reverse(&mut self) {
        self.push_undo();
        let length = self.length;
        let reversed: Vec<Event> = self
            .container
            .iter()
            .map(|(_, e)| {
                let mut copy = crate::event::unlinked_copy(e);
                copy.timestamp = (length - 1 - copy.timestamp).max(0);
                copy
            })
            .collect();
        let mut fresh = EventContainer::new();
        for event in reversed {
            fresh.append(event);
        }
        self.container = fresh;
        self.container.verify_and_link(self.length);
        self.modified = true;
    }

    pub fn transpose(&mut self, semitones: i32) {
        self.push_undo();
        let transposed: Vec<Event> = self
            .container
            .iter()
            .map(|(_, e)| crate::event::unlinked_copy(&e.transposed(semitones)))
            .collect();
        let mut fresh = EventContainer::new();
        for event in transposed {
            fresh.append(event);
        }
        self.container = fresh;
        self.container.verify_and_link(self.length);
        self.modified = true;
    }

    /// Randomizes each note's velocity by up to `+/- range`, clamped into
    /// `1..=127` (a randomized velocity of 0 would silently become a
    /// note-off, which is never the intent here).
    pub fn randomize(&mut self, range: u8, rng: &mut impl rand::RngCore) {
        use rand::Rng;
        self.push_undo();
        let randomized: Vec<Event> = self
            .container
            .iter()
            .map(|(_, e)| {
                let mut copy = crate::event::unlinked_copy(e);
                if copy.is_live_note_on() {
                    if let Payload::Channel { data2: Some(vel), .. } = &mut copy.payload {
                        let delta = rng.gen_range(-(range as i32)..=range as i32);
                        *vel = (i32::from(*vel) + delta).clamp(1, 127) as u8;
                    }
                }
                copy
            })
            .collect();
        let mut fresh = EventContainer::new();
        for event in randomized {
            fresh.append(event);
        }
        self.container = fresh;
        self.container.verify_and_link(self.length);
        self.modified = true;
    }

    /// `use_measures` scales the LFO period by one measure instead of the
    /// pattern's full length, matching the original's LFO editor toggle.
    #[allow(clippy::too_many_arguments)]
    pub fn change_event_data_lfo(
        &mut self,
        value: f64,
        range: f64,
        speed: f64,
        phase: f64,
        wave: crate::lfo::Wave,
        status: u8,
        cc: Option<u8>,
        use_measures: bool,
    ) {
        self.push_undo();
        let measure_pulses = self.time_signature.pulses_per_measure(self.ppqn);
        crate::lfo::apply(
            &mut self.container,
            self.length,
            measure_pulses,
            use_measures,
            value,
            range,
            speed,
            phase,
            wave,
            status,
            cc,
        );
        self.modified = true;
    }

    pub fn select_all(&mut self) {
        self.apply_flag_to_all(Flags::SELECTED, true);
    }

    pub fn unselect_all(&mut self) {
        self.apply_flag_to_all(Flags::SELECTED, false);
    }

    fn apply_flag_to_all(&mut self, flag: Flags, set: bool) {
        let ids: Vec<_> = self.container.iter().map(|(id, _)| id).collect();
        for id in ids {
            if let Some(event) = self.container.get_mut(id) {
                if set {
                    event.flags |= flag;
                } else {
                    event.flags.remove(flag);
                }
            }
        }
    }
}

/// Rounds `pulse` to the nearest multiple of `grid`, per §4.2 `add_event`
/// snap-on quantization.
fn snap_to_grid(pulse: Pulse, grid: Pulse) -> Pulse {
    if grid <= 0 {
        return pulse;
    }
    let half = grid / 2;
    ((pulse + half) / grid) * grid
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::dummy::DummyPort;

    fn new_pattern() -> Pattern {
        Pattern::new("test", 192, TimeSignature::default(), 8)
    }

    #[test]
    fn set_length_rejects_non_measure_multiples() {
        let mut p = new_pattern();
        assert_eq!(p.set_length(100), Err(SetLengthError::NotAMeasureMultiple));
        assert_eq!(p.set_length(0), Err(SetLengthError::NotPositive));
        assert!(p.set_length(768 * 2).is_ok());
    }

    #[test]
    fn add_event_with_snap_quantizes_note_timestamps() {
        let mut p = new_pattern();
        p.snap_on = true;
        p.snap_pulses = 48;
        p.add_event(Event::note_on(70, 0, 60, 100));
        let (_, e) = p.container().iter().next().unwrap();
        assert_eq!(e.timestamp, 48);
    }

    #[test]
    fn stream_event_wraps_timestamp_into_pattern_length() {
        let mut p = new_pattern();
        let stamped = p.stream_event(Event::note_on(0, 0, 60, 100), 768 + 10);
        assert_eq!(stamped.timestamp, 10);
    }

    #[test]
    fn play_forwards_events_in_window_with_channel_ored_in() {
        let mut p = new_pattern();
        p.channel = 3;
        p.add_event(Event::note_on(0, 0, 60, 100));
        p.add_event(Event::note_off(96, 0, 60, 0));
        let mut port = DummyPort::new("test");
        p.play(0, 100, &mut port);
        let sent = port.sent_events();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].channel, Some(3));
    }

    #[test]
    fn play_window_wrapping_past_length_splits_into_two_calls() {
        let mut p = new_pattern();
        p.add_event(Event::note_on(0, 0, 60, 100));
        p.add_event(Event::note_on(700, 0, 61, 100));
        let mut port = DummyPort::new("test");
        p.play(700, 800, &mut port);
        let sent = port.sent_events();
        // one event at 700 (first sub-window) and one at wrapped tick 0..32
        // (second sub-window) should both be forwarded.
        assert_eq!(sent.len(), 2);
    }

    #[test]
    fn reverse_mirrors_timestamps_across_the_pattern_length() {
        let mut p = new_pattern();
        p.add_event(Event::note_on(0, 0, 60, 100));
        p.reverse();
        let (_, e) = p.container().iter().next().unwrap();
        assert_eq!(e.timestamp, p.length - 1);
    }

    #[test]
    fn transpose_shifts_every_note_by_semitones() {
        let mut p = new_pattern();
        p.add_event(Event::note_on(0, 0, 60, 100));
        p.transpose(5);
        let (_, e) = p.container().iter().next().unwrap();
        assert_eq!(e.note_number(), Some(65));
    }

    #[test]
    fn undo_restores_prior_state_and_redo_restores_the_edit() {
        let mut p = new_pattern();
        p.add_event(Event::note_on(0, 0, 60, 100));
        p.push_undo();
        p.add_event(Event::note_on(10, 0, 61, 100));
        assert_eq!(p.container().len(), 2);
        assert!(p.pop_undo());
        assert_eq!(p.container().len(), 1);
        assert!(p.pop_redo());
        assert_eq!(p.container().len(), 2);
    }

    #[test]
    fn queue_on_transitions_to_playing_only_at_a_bar_boundary() {
        let mut p = new_pattern();
        p.set_mute(true);
        p.request_queue_on();
        assert_eq!(p.state, PlayState::QueuedOn);
        p.on_bar_boundary();
        assert_eq!(p.state, PlayState::Playing);
    }

    #[test]
    fn stop_flushes_note_offs_for_every_active_note() {
        let mut p = new_pattern();
        p.add_event(Event::note_on(0, 0, 60, 100));
        let mut port = DummyPort::new("test");
        p.play(0, 10, &mut port);
        let flushed = p.stop();
        assert_eq!(flushed.len(), 1);
        assert!(flushed[0].is_note_off());
    }

    #[test]
    fn play_never_forwards_meta_events_to_the_port() {
        let mut p = new_pattern();
        p.add_event(Event::note_on(0, 0, 60, 100));
        p.add_event(Event::set_tempo(10, 140.0));
        let mut port = DummyPort::new("test");
        p.play(0, 50, &mut port);
        assert_eq!(port.sent_events().len(), 1);
        assert!(port.sent_events()[0].is_live_note_on());
    }

    #[test]
    fn play_routes_sysex_through_the_chunking_path() {
        let mut p = new_pattern();
        p.add_event(Event::sysex(10, vec![0xF0, 0x41, 0xF7]));
        let mut port = DummyPort::new("test");
        p.play(0, 50, &mut port);
        assert!(port.sent_events().is_empty());
        assert_eq!(port.sent_sysex_chunks().concat(), vec![0xF0, 0x41, 0xF7]);
    }

    #[test]
    fn tempo_change_in_window_reports_in_range_set_tempo_event() {
        let mut p = new_pattern();
        p.add_event(Event::set_tempo(96, 240.0));
        assert_eq!(p.tempo_change_in_window(0, 96), None);
        let bpm = p.tempo_change_in_window(0, 100).unwrap();
        assert!((bpm - 240.0).abs() < 0.01);
    }

    #[test]
    fn tempo_change_in_window_prefers_the_last_event_in_a_wrapped_window() {
        let mut p = new_pattern();
        p.add_event(Event::set_tempo(760, 100.0));
        p.add_event(Event::set_tempo(5, 200.0));
        // window [760, 10) wraps past length (768): the second sub-window
        // [0, 10) is chronologically later, so its event wins.
        let bpm = p.tempo_change_in_window(760, 778).unwrap();
        assert!((bpm - 200.0).abs() < 0.01);
    }

    #[test]
    fn tempo_override_substitutes_for_the_event_encoded_bpm() {
        let mut p = new_pattern();
        p.tempo_override = Some(90.0);
        p.add_event(Event::set_tempo(10, 240.0));
        let bpm = p.tempo_change_in_window(0, 20).unwrap();
        assert!((bpm - 90.0).abs() < 0.01);
    }

    #[test]
    fn change_event_data_lfo_with_use_measures_scales_period_to_one_measure() {
        let mut p = new_pattern();
        p.set_length(768 * 2).unwrap();
        p.add_event(Event::control_change(0, 0, 74, 64));
        p.add_event(Event::control_change(768, 0, 74, 64));
        p.change_event_data_lfo(64.0, 63.0, 1.0, 0.0, crate::lfo::Wave::Sine, crate::event::STATUS_CONTROL_CHANGE, Some(74), true);
        // one LFO cycle per measure: both events sit at theta=0 (tick 0 of
        // their own measure), so both land back at the base value.
        let values: Vec<u8> = p
            .container()
            .iter()
            .map(|(_, e)| match e.payload {
                Payload::Channel { data2: Some(v), .. } => v,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(values, vec![64, 64]);
    }
}
