//! One MIDI event: a pulse-accurate timestamp, status/channel/data bytes or
//! a SysEx payload, an optional link to a partner event, and a small set of
//! editor flags.

pub mod container;

use bitflags::bitflags;
use derive_more::Debug;

/// A 64-bit signed pulse (tick) count from pattern origin. Negative values
/// are invalid except as the [`NONE`] sentinel.
pub type Pulse = i64;

/// Sentinel for "no timestamp" / "not yet scheduled".
pub const NONE: Pulse = -1;

bitflags! {
    /// Mutually independent editor flags. `MARKED` is the scratch flag bulk
    /// operations use to stage removals; it is unrelated to `SELECTED`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Flags: u8 {
        const SELECTED = 0b0000_0001;
        const MARKED   = 0b0000_0010;
        const PAINTED  = 0b0000_0100;
    }
}

/// A tie-break ordinal used when two events share a timestamp. Lower sorts
/// first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Rank {
    NoteOff = 0,
    NoteOn = 1,
    /// Polyphonic aftertouch, channel pressure, or pitch wheel.
    Touch = 2,
    ControlChange = 3,
    ProgramChange = 4,
    /// Meta events and SysEx: the spec leaves their relative order
    /// unspecified, so they sort after every channel message.
    Other = 5,
}

/// A handle to an event inside one [`container::EventContainer`]. Stable
/// across insertions and removals of *other* events (it indexes a slab, not
/// a sorted position), so a partner link never dangles just because some
/// earlier event was deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(pub(crate) u32);

/// What an event is linked to, if anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    None,
    /// A note-on linked to its note-off, or vice versa (bidirectional).
    Partner(EventId),
    /// A set-tempo event linked forward to the next set-tempo event
    /// (one-way chain).
    NextTempo(EventId),
}

/// The event's data: two channel-message data bytes (the second may be
/// absent for single-byte messages like program change), a SysEx payload,
/// or a meta-event body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Channel { data1: u8, data2: Option<u8> },
    #[debug("SysEx {}", pretty_hex::pretty_hex(_0))]
    SysEx(Vec<u8>),
    /// `kind` is the meta-event type byte (e.g. `0x51` for set-tempo).
    #[debug("Meta(kind=0x{:02X}) {}", kind, pretty_hex::pretty_hex(data))]
    Meta { kind: u8, data: Vec<u8> },
}

pub const STATUS_NOTE_OFF: u8 = 0x80;
pub const STATUS_NOTE_ON: u8 = 0x90;
pub const STATUS_POLY_AFTERTOUCH: u8 = 0xA0;
pub const STATUS_CONTROL_CHANGE: u8 = 0xB0;
pub const STATUS_PROGRAM_CHANGE: u8 = 0xC0;
pub const STATUS_CHANNEL_PRESSURE: u8 = 0xD0;
pub const STATUS_PITCH_WHEEL: u8 = 0xE0;
pub const STATUS_SYSEX: u8 = 0xF0;
pub const STATUS_META: u8 = 0xFF;

pub const META_SET_TEMPO: u8 = 0x51;
pub const META_TIME_SIGNATURE: u8 = 0x58;
pub const META_END_OF_TRACK: u8 = 0x2F;

/// One MIDI event.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub timestamp: Pulse,
    /// High nibble is the message kind; for channel messages the low
    /// nibble doubles as the channel and is kept in sync with `channel`.
    pub status: u8,
    /// `Some(0..=15)` for channel messages, `None` otherwise.
    pub channel: Option<u8>,
    pub payload: Payload,
    pub link: Link,
    pub flags: Flags,
}

impl Event {
    /// Builds a channel-message event (note on/off, control change, etc).
    pub fn channel_message(
        timestamp: Pulse,
        status_kind: u8,
        channel: u8,
        data1: u8,
        data2: Option<u8>,
    ) -> Self {
        let channel = channel & 0x0F;
        Event {
            timestamp,
            status: (status_kind & 0xF0) | channel,
            channel: Some(channel),
            payload: Payload::Channel { data1, data2 },
            link: Link::None,
            flags: Flags::empty(),
        }
    }

    pub fn note_on(timestamp: Pulse, channel: u8, note: u8, velocity: u8) -> Self {
        Event::channel_message(timestamp, STATUS_NOTE_ON, channel, note, Some(velocity))
    }

    pub fn note_off(timestamp: Pulse, channel: u8, note: u8, velocity: u8) -> Self {
        Event::channel_message(timestamp, STATUS_NOTE_OFF, channel, note, Some(velocity))
    }

    pub fn control_change(timestamp: Pulse, channel: u8, controller: u8, value: u8) -> Self {
        Event::channel_message(timestamp, STATUS_CONTROL_CHANGE, channel, controller, Some(value))
    }

    pub fn set_tempo(timestamp: Pulse, bpm: f64) -> Self {
        let bytes = crate::calc::bpm_to_tempo_bytes(bpm);
        Event {
            timestamp,
            status: STATUS_META,
            channel: None,
            payload: Payload::Meta {
                kind: META_SET_TEMPO,
                data: bytes.to_vec(),
            },
            link: Link::None,
            flags: Flags::empty(),
        }
    }

    pub fn sysex(timestamp: Pulse, payload: Vec<u8>) -> Self {
        Event {
            timestamp,
            status: STATUS_SYSEX,
            channel: None,
            payload: Payload::SysEx(payload),
            link: Link::None,
            flags: Flags::empty(),
        }
    }

    /// The high-nibble message kind: equal to `status & 0xF0` for channel
    /// messages, or the raw status byte itself for SysEx/meta/realtime.
    #[inline]
    pub fn status_kind(&self) -> u8 {
        match self.payload {
            Payload::Channel { .. } => self.status & 0xF0,
            _ => self.status,
        }
    }

    /// The tie-break rank used by the container's sort order.
    pub fn rank(&self) -> Rank {
        match self.payload {
            Payload::SysEx(_) | Payload::Meta { .. } => Rank::Other,
            Payload::Channel { .. } => match self.status_kind() {
                STATUS_NOTE_OFF => Rank::NoteOff,
                STATUS_NOTE_ON => Rank::NoteOn,
                STATUS_POLY_AFTERTOUCH | STATUS_CHANNEL_PRESSURE | STATUS_PITCH_WHEEL => {
                    Rank::Touch
                }
                STATUS_CONTROL_CHANGE => Rank::ControlChange,
                STATUS_PROGRAM_CHANGE => Rank::ProgramChange,
                _ => Rank::Other,
            },
        }
    }

    /// The `(timestamp, rank)` pair the container sorts by.
    #[inline]
    pub fn sort_key(&self) -> (Pulse, Rank) {
        (self.timestamp, self.rank())
    }

    /// A note-on is "live" if its velocity is nonzero; a note-on with
    /// velocity zero is conventionally a note-off in disguise (§4.3).
    pub fn is_live_note_on(&self) -> bool {
        self.status_kind() == STATUS_NOTE_ON
            && matches!(self.payload, Payload::Channel { data2: Some(v), .. } if v > 0)
    }

    pub fn is_note_off(&self) -> bool {
        self.status_kind() == STATUS_NOTE_OFF
            || (self.status_kind() == STATUS_NOTE_ON
                && matches!(self.payload, Payload::Channel { data2: Some(0), .. }))
    }

    /// The note number, for note-on/note-off events.
    pub fn note_number(&self) -> Option<u8> {
        if matches!(self.status_kind(), STATUS_NOTE_ON | STATUS_NOTE_OFF) {
            match self.payload {
                Payload::Channel { data1, .. } => Some(data1),
                _ => None,
            }
        } else {
            None
        }
    }

    pub fn is_control_change(&self) -> bool {
        self.status_kind() == STATUS_CONTROL_CHANGE
    }

    pub fn controller_number(&self) -> Option<u8> {
        if self.is_control_change() {
            match self.payload {
                Payload::Channel { data1, .. } => Some(data1),
                _ => None,
            }
        } else {
            None
        }
    }

    pub fn is_set_tempo(&self) -> bool {
        matches!(self.payload, Payload::Meta { kind, .. } if kind == META_SET_TEMPO)
    }

    pub fn is_time_signature(&self) -> bool {
        matches!(self.payload, Payload::Meta { kind, .. } if kind == META_TIME_SIGNATURE)
    }

    /// Decodes this event's tempo payload to BPM, if it is a set-tempo
    /// event with a well-formed 3-byte payload.
    pub fn tempo_bpm(&self) -> Option<f64> {
        match &self.payload {
            Payload::Meta { kind, data } if *kind == META_SET_TEMPO && data.len() == 3 => {
                crate::calc::tempo_bytes_to_bpm([data[0], data[1], data[2]]).ok()
            }
            _ => None,
        }
    }

    /// Returns a copy of this event with its status/channel rewritten to
    /// `channel`, used by the scheduler when a pattern's channel is ORed
    /// into a channel message on the way out (§4.2 `play`). Non-channel
    /// events are returned unchanged.
    pub fn with_channel(&self, channel: u8) -> Event {
        let mut out = self.clone();
        if out.channel.is_some() {
            let channel = channel & 0x0F;
            out.status = (out.status & 0xF0) | channel;
            out.channel = Some(channel);
        }
        out
    }

    /// Returns a copy transposed by `semitones`, for note and polyphonic
    /// aftertouch events; other events are returned unchanged. The result
    /// is clamped into `0..=127`.
    pub fn transposed(&self, semitones: i32) -> Event {
        let mut out = self.clone();
        if matches!(
            self.status_kind(),
            STATUS_NOTE_ON | STATUS_NOTE_OFF | STATUS_POLY_AFTERTOUCH
        ) {
            if let Payload::Channel { data1, data2 } = &mut out.payload {
                let transposed = i32::from(*data1) + semitones;
                *data1 = transposed.clamp(0, 127) as u8;
                let _ = data2;
            }
        }
        out
    }
}

/// Copying an event (e.g. for paste or undo restore) must not carry stale
/// partner links into the new owner; callers that need a plain value copy
/// use this instead of [`Clone`] when the copy crosses container
/// boundaries.
pub fn unlinked_copy(event: &Event) -> Event {
    let mut copy = event.clone();
    copy.link = Link::None;
    copy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rank_orders_note_off_before_note_on_before_others() {
        let off = Event::note_off(0, 0, 60, 0);
        let on = Event::note_on(0, 0, 60, 100);
        let cc = Event::control_change(0, 0, 74, 64);
        assert!(off.rank() < on.rank());
        assert!(on.rank() < cc.rank());
    }

    #[test]
    fn velocity_zero_note_on_is_treated_as_note_off() {
        let e = Event::note_on(10, 0, 60, 0);
        assert!(e.is_note_off());
        assert!(!e.is_live_note_on());
    }

    #[test]
    fn with_channel_ors_channel_into_status_for_channel_messages() {
        let e = Event::note_on(0, 3, 60, 100).with_channel(7);
        assert_eq!(e.channel, Some(7));
        assert_eq!(e.status & 0x0F, 7);
        assert_eq!(e.status & 0xF0, STATUS_NOTE_ON);
    }

    #[test]
    fn with_channel_leaves_non_channel_events_unchanged() {
        let e = Event::set_tempo(0, 120.0).with_channel(5);
        assert_eq!(e.channel, None);
    }

    #[test]
    fn transposed_clamps_into_midi_note_range() {
        let e = Event::note_on(0, 0, 120, 100).transposed(20);
        assert_eq!(e.note_number(), Some(127));
        let e = Event::note_on(0, 0, 5, 100).transposed(-20);
        assert_eq!(e.note_number(), Some(0));
    }

    #[test]
    fn set_tempo_round_trips_through_bpm() {
        let e = Event::set_tempo(0, 140.0);
        assert!(e.is_set_tempo());
        assert!((e.tempo_bpm().unwrap() - 140.0).abs() < 0.01);
    }
}
