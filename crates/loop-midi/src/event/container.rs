//! An ordered multiset of [`Event`]s keyed by `(timestamp, rank)`.
//!
//! Storage is a slab (`Vec<Option<Event>>`) plus a separate always-sorted
//! index of [`EventId`]s. Events are addressed by `EventId`, which indexes
//! the slab and is therefore stable across insertions and removals of
//! *other* events — exactly the handle-not-pointer link design called for
//! in the design notes, applied at the granularity of individual events so
//! that note-on/note-off partnerships never dangle just because some
//! unrelated earlier event was deleted.

use super::{Event, EventId, Flags, Link, Pulse};

#[derive(Debug, Default)]
pub struct EventContainer {
    slab: Vec<Option<Event>>,
    free: Vec<u32>,
    /// Always sorted by `(timestamp, rank)`; this is the container's public
    /// iteration order.
    order: Vec<EventId>,
    has_tempo: bool,
    has_time_signature: bool,
}

impl EventContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn has_tempo(&self) -> bool {
        self.has_tempo
    }

    pub fn has_time_signature(&self) -> bool {
        self.has_time_signature
    }

    pub fn get(&self, id: EventId) -> Option<&Event> {
        self.slab.get(id.0 as usize).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.slab
            .get_mut(id.0 as usize)
            .and_then(|slot| slot.as_mut())
    }

    /// Iterates events in sorted `(timestamp, rank)` order.
    pub fn iter(&self) -> impl Iterator<Item = (EventId, &Event)> {
        self.order.iter().filter_map(move |&id| {
            self.slab[id.0 as usize].as_ref().map(|event| (id, event))
        })
    }

    /// The timestamp of the last event in sorted order, or 0 when empty
    /// (§4.1 `get_length`).
    pub fn get_length(&self) -> Pulse {
        self.order
            .last()
            .and_then(|&id| self.get(id))
            .map(|event| event.timestamp)
            .unwrap_or(0)
    }

    fn track_meta_flags(&mut self, event: &Event) {
        if event.is_set_tempo() {
            self.has_tempo = true;
        }
        if event.is_time_signature() {
            self.has_time_signature = true;
        }
    }

    fn alloc_slot(&mut self, mut event: Event) -> EventId {
        if event.timestamp < 0 {
            event.timestamp = 0;
        }
        self.track_meta_flags(&event);
        if let Some(index) = self.free.pop() {
            self.slab[index as usize] = Some(event);
            EventId(index)
        } else {
            let index = self.slab.len() as u32;
            self.slab.push(Some(event));
            EventId(index)
        }
    }

    fn insert_into_order(&mut self, id: EventId) {
        let key = self.get(id).expect("freshly allocated slot").sort_key();
        let position = self
            .order
            .partition_point(|&other| self.get(other).expect("live id in order").sort_key() <= key);
        self.order.insert(position, id);
    }

    /// Inserts `event`, keeping the container sorted. Returns the event's
    /// new handle. Mutations that would place an event at a negative
    /// timestamp silently clamp to zero rather than fail (§4.1 failure
    /// policy).
    pub fn append(&mut self, event: Event) -> EventId {
        let id = self.alloc_slot(event);
        self.insert_into_order(id);
        id
    }

    /// Moves every event out of `other` and into `self`, preserving sorted
    /// order. When `presort` is true, both containers are assumed already
    /// internally sorted and are merged in one linear pass; otherwise each
    /// event is inserted one at a time via [`Self::append`].
    pub fn merge(&mut self, other: &mut EventContainer, presort: bool) {
        let incoming: Vec<Event> = std::mem::take(&mut other.order)
            .into_iter()
            .filter_map(|id| other.slab[id.0 as usize].take())
            .collect();
        other.free.clear();
        other.has_tempo = false;
        other.has_time_signature = false;

        if !presort || self.is_empty() {
            for event in incoming {
                self.append(event);
            }
            return;
        }

        // Linear merge: both `self.order` and `incoming` are already sorted.
        let mut merged = Vec::with_capacity(self.order.len() + incoming.len());
        let mut existing = std::mem::take(&mut self.order).into_iter().peekable();
        let mut fresh = incoming.into_iter().peekable();

        loop {
            match (existing.peek(), fresh.peek()) {
                (Some(&eid), Some(fevent)) => {
                    let ekey = self.get(eid).expect("live id").sort_key();
                    if ekey <= fevent.sort_key() {
                        merged.push(existing.next().unwrap());
                    } else {
                        let fevent = fresh.next().unwrap();
                        let id = self.alloc_slot(fevent);
                        merged.push(id);
                    }
                }
                (Some(_), None) => merged.push(existing.next().unwrap()),
                (None, Some(_)) => {
                    let fevent = fresh.next().unwrap();
                    let id = self.alloc_slot(fevent);
                    merged.push(id);
                }
                (None, None) => break,
            }
        }
        self.order = merged;
    }

    /// Clears every existing link, re-pairs note-on/note-off events by note
    /// number (wrapping forward from the start of the container if no
    /// partner is found after the note-on), prunes events outside
    /// `[0, pattern_length)`, and finally chains set-tempo events forward
    /// to the next set-tempo event.
    pub fn verify_and_link(&mut self, pattern_length: Pulse) {
        for slot in self.slab.iter_mut().flatten() {
            slot.link = Link::None;
        }

        let order = self.order.clone();
        let mut paired: Vec<bool> = vec![false; order.len()];

        for (i, &on_id) in order.iter().enumerate() {
            let (is_on, note) = match self.get(on_id) {
                Some(e) if e.is_live_note_on() => (true, e.note_number()),
                _ => (false, None),
            };
            if !is_on || paired[i] {
                continue;
            }
            let channel = self.get(on_id).and_then(|e| e.channel);

            let found = (i + 1..order.len())
                .chain(0..i)
                .find(|&j| {
                    if paired[j] {
                        return false;
                    }
                    match self.get(order[j]) {
                        Some(e) => e.is_note_off() && e.note_number() == note && e.channel == channel,
                        None => false,
                    }
                });

            if let Some(j) = found {
                paired[i] = true;
                paired[j] = true;
                let off_id = order[j];
                if let Some(e) = self.get_mut(on_id) {
                    e.link = Link::Partner(off_id);
                }
                if let Some(e) = self.get_mut(off_id) {
                    e.link = Link::Partner(on_id);
                }
            }
        }

        for &id in &order {
            if let Some(e) = self.get(id) {
                if e.timestamp < 0 || e.timestamp >= pattern_length {
                    if let Some(e) = self.get_mut(id) {
                        e.flags |= Flags::MARKED;
                    }
                }
            }
        }
        self.remove_marked();
        self.link_tempos();
    }

    fn link_tempos(&mut self) {
        let tempo_ids: Vec<EventId> = self
            .order
            .iter()
            .copied()
            .filter(|&id| self.get(id).is_some_and(|e| e.is_set_tempo()))
            .collect();
        for pair in tempo_ids.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            if let Some(e) = self.get_mut(first) {
                e.link = Link::NextTempo(second);
            }
        }
    }

    pub fn mark_selected(&mut self) {
        for slot in self.slab.iter_mut().flatten() {
            if slot.flags.contains(Flags::SELECTED) {
                slot.flags |= Flags::MARKED;
            }
        }
    }

    pub fn mark_all(&mut self) {
        for slot in self.slab.iter_mut().flatten() {
            slot.flags |= Flags::MARKED;
        }
    }

    pub fn unmark_all(&mut self) {
        for slot in self.slab.iter_mut().flatten() {
            slot.flags.remove(Flags::MARKED);
        }
    }

    /// Removes every event flagged `MARKED`. Returns whether anything was
    /// removed.
    pub fn remove_marked(&mut self) -> bool {
        let before = self.order.len();
        let slab = &mut self.slab;
        let free = &mut self.free;
        self.order.retain(|&id| {
            let marked = slab[id.0 as usize]
                .as_ref()
                .is_some_and(|e| e.flags.contains(Flags::MARKED));
            if marked {
                slab[id.0 as usize] = None;
                free.push(id.0);
            }
            !marked
        });
        self.recompute_meta_flags();
        self.order.len() != before
    }

    fn recompute_meta_flags(&mut self) {
        self.has_tempo = self.slab.iter().flatten().any(|e| e.is_set_tempo());
        self.has_time_signature = self.slab.iter().flatten().any(|e| e.is_time_signature());
    }

    /// Counts selected note-on events ("notes" are counted once, by their
    /// note-on half, regardless of whether the partner note-off is also
    /// selected).
    pub fn count_selected_notes(&self) -> usize {
        self.slab
            .iter()
            .flatten()
            .filter(|e| e.flags.contains(Flags::SELECTED) && e.is_live_note_on())
            .count()
    }

    pub fn any_selected_notes(&self) -> bool {
        self.slab
            .iter()
            .flatten()
            .any(|e| e.flags.contains(Flags::SELECTED) && e.is_live_note_on())
    }

    /// Counts selected events matching `status_kind` (e.g. `0x90` for
    /// note-on). When `status_kind` is control-change, `cc` must also match
    /// the controller number if given. Set-tempo events are always
    /// counted, regardless of `status_kind`.
    pub fn count_selected_events(&self, status_kind: u8, cc: Option<u8>) -> usize {
        self.slab
            .iter()
            .flatten()
            .filter(|e| e.flags.contains(Flags::SELECTED) && Self::matches_status(e, status_kind, cc))
            .count()
    }

    pub fn any_selected_events(&self, status_kind: u8, cc: Option<u8>) -> bool {
        self.slab
            .iter()
            .flatten()
            .any(|e| e.flags.contains(Flags::SELECTED) && Self::matches_status(e, status_kind, cc))
    }

    fn matches_status(event: &Event, status_kind: u8, cc: Option<u8>) -> bool {
        if event.is_set_tempo() {
            return true;
        }
        if event.status_kind() != status_kind {
            return false;
        }
        if status_kind == super::STATUS_CONTROL_CHANGE {
            if let Some(cc) = cc {
                return event.controller_number() == Some(cc);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;

    #[test]
    fn append_keeps_sorted_order_by_timestamp_then_rank() {
        let mut c = EventContainer::new();
        c.append(Event::note_on(10, 0, 60, 100));
        c.append(Event::note_off(10, 0, 60, 0));
        c.append(Event::note_on(5, 0, 61, 100));

        let events: Vec<_> = c.iter().map(|(_, e)| (e.timestamp, e.rank())).collect();
        assert_eq!(
            events,
            vec![(5, crate::event::Rank::NoteOn), (10, crate::event::Rank::NoteOff), (10, crate::event::Rank::NoteOn)]
        );
    }

    #[test]
    fn negative_timestamps_clamp_to_zero() {
        let mut c = EventContainer::new();
        let id = c.append(Event::note_on(-5, 0, 60, 100));
        assert_eq!(c.get(id).unwrap().timestamp, 0);
    }

    #[test]
    fn verify_and_link_pairs_note_on_with_following_note_off() {
        let mut c = EventContainer::new();
        let on = c.append(Event::note_on(0, 0, 60, 100));
        let off = c.append(Event::note_off(96, 0, 60, 0));
        c.verify_and_link(768);
        assert_eq!(c.get(on).unwrap().link, Link::Partner(off));
        assert_eq!(c.get(off).unwrap().link, Link::Partner(on));
    }

    #[test]
    fn verify_and_link_wraps_forward_when_partner_precedes_note_on() {
        let mut c = EventContainer::new();
        // Note-off near loop start, note-on near loop end: the note-on
        // must wrap forward to find it.
        let off = c.append(Event::note_off(10, 0, 60, 0));
        let on = c.append(Event::note_on(700, 0, 60, 100));
        c.verify_and_link(768);
        assert_eq!(c.get(on).unwrap().link, Link::Partner(off));
    }

    #[test]
    fn verify_and_link_prunes_events_outside_pattern_length() {
        let mut c = EventContainer::new();
        c.append(Event::note_on(0, 0, 60, 100));
        c.append(Event::note_off(800, 0, 60, 0));
        c.verify_and_link(768);
        assert_eq!(c.len(), 1);
    }

    #[test]
    fn verify_and_link_chains_set_tempo_events_forward() {
        let mut c = EventContainer::new();
        let a = c.append(Event::set_tempo(0, 120.0));
        let b = c.append(Event::set_tempo(200, 140.0));
        let cc = c.append(Event::set_tempo(400, 160.0));
        c.verify_and_link(768);
        assert_eq!(c.get(a).unwrap().link, Link::NextTempo(b));
        assert_eq!(c.get(b).unwrap().link, Link::NextTempo(cc));
        assert_eq!(c.get(cc).unwrap().link, Link::None);
    }

    #[test]
    fn remove_marked_drops_flagged_events_and_reports_change() {
        let mut c = EventContainer::new();
        let id = c.append(Event::note_on(0, 0, 60, 100));
        c.get_mut(id).unwrap().flags |= Flags::MARKED;
        assert!(c.remove_marked());
        assert_eq!(c.len(), 0);
        assert!(!c.remove_marked());
    }

    #[test]
    fn count_selected_events_matches_control_change_and_controller() {
        let mut c = EventContainer::new();
        let mut cc74 = Event::control_change(0, 0, 74, 64);
        cc74.flags |= Flags::SELECTED;
        c.append(cc74);
        let mut cc10 = Event::control_change(10, 0, 10, 64);
        cc10.flags |= Flags::SELECTED;
        c.append(cc10);

        assert_eq!(
            c.count_selected_events(super::super::STATUS_CONTROL_CHANGE, Some(74)),
            1
        );
        assert_eq!(
            c.count_selected_events(super::super::STATUS_CONTROL_CHANGE, None),
            2
        );
    }

    #[test]
    fn set_tempo_events_always_count_regardless_of_status_filter() {
        let mut c = EventContainer::new();
        let mut tempo = Event::set_tempo(0, 120.0);
        tempo.flags |= Flags::SELECTED;
        c.append(tempo);
        assert_eq!(c.count_selected_events(super::super::STATUS_NOTE_ON, None), 1);
    }

    #[test]
    fn has_tempo_and_has_time_signature_track_presence() {
        let mut c = EventContainer::new();
        assert!(!c.has_tempo());
        c.append(Event::set_tempo(0, 120.0));
        assert!(c.has_tempo());
    }

    #[test]
    fn get_length_is_last_events_timestamp_or_zero_when_empty() {
        let mut c = EventContainer::new();
        assert_eq!(c.get_length(), 0);
        c.append(Event::note_on(500, 0, 60, 100));
        assert_eq!(c.get_length(), 500);
    }

    #[test]
    fn merge_preserves_sorted_order_with_and_without_presort_hint() {
        let mut a = EventContainer::new();
        a.append(Event::note_on(0, 0, 60, 100));
        a.append(Event::note_on(20, 0, 61, 100));

        let mut b = EventContainer::new();
        b.append(Event::note_on(10, 0, 62, 100));

        a.merge(&mut b, true);
        let timestamps: Vec<_> = a.iter().map(|(_, e)| e.timestamp).collect();
        assert_eq!(timestamps, vec![0, 10, 20]);
        assert_eq!(b.len(), 0);
    }
}
