//! The song-layer arrangement primitive: a half-open tick range mapped onto
//! an offset into a pattern's own event stream.

use crate::event::Pulse;

/// A half-open `[start, end)` tick range that plays the pattern's events
/// starting from `offset` (wrapping modulo the pattern's length).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub start: Pulse,
    pub end: Pulse,
    pub offset: Pulse,
}

impl Trigger {
    pub fn new(start: Pulse, end: Pulse, offset: Pulse) -> Self {
        debug_assert!(start < end, "trigger must span a non-empty range");
        Trigger { start, end, offset }
    }

    pub fn contains(&self, tick: Pulse) -> bool {
        tick >= self.start && tick < self.end
    }

    pub fn len(&self) -> Pulse {
        self.end - self.start
    }
}

/// A sorted, non-overlapping list of [`Trigger`]s. Insertion truncates or
/// splits whatever triggers it overlaps, per §3's "never overlap" invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerList {
    triggers: Vec<Trigger>,
}

impl TriggerList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Trigger> {
        self.triggers.iter()
    }

    /// The trigger whose range contains `tick`, if any.
    pub fn at(&self, tick: Pulse) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.contains(tick))
    }

    /// Inserts `new`, truncating or splitting any existing trigger it
    /// overlaps so the list remains pairwise non-overlapping and sorted by
    /// start tick.
    pub fn insert(&mut self, new: Trigger) {
        let mut result = Vec::with_capacity(self.triggers.len() + 1);
        for existing in self.triggers.drain(..) {
            if existing.end <= new.start || existing.start >= new.end {
                // No overlap; keep as-is.
                result.push(existing);
                continue;
            }
            // Overlap: keep the part before `new` (truncated) and the part
            // after `new` (offset-adjusted split), dropping whatever falls
            // inside `new`'s range entirely.
            if existing.start < new.start {
                result.push(Trigger::new(existing.start, new.start, existing.offset));
            }
            if existing.end > new.end {
                let advanced = existing.end - new.end;
                let split_offset = existing.offset + (existing.len() - advanced);
                result.push(Trigger::new(new.end, existing.end, split_offset));
            }
        }
        result.push(new);
        result.sort_by_key(|t| t.start);
        self.triggers = result;
    }

    /// Truncates every trigger to end at or before `length`, dropping
    /// triggers that start at or past it entirely (§4.2 `set_length`).
    pub fn truncate_to(&mut self, length: Pulse) {
        self.triggers.retain_mut(|t| {
            if t.start >= length {
                return false;
            }
            if t.end > length {
                t.end = length;
            }
            true
        });
    }

    /// Checks the pairwise non-overlap and sort-order invariant; used only
    /// in tests and debug assertions.
    pub fn is_well_formed(&self) -> bool {
        self.triggers
            .windows(2)
            .all(|pair| pair[0].end <= pair[1].start && pair[0].start <= pair[1].start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_into_empty_list_just_appends() {
        let mut list = TriggerList::new();
        list.insert(Trigger::new(0, 768, 0));
        assert_eq!(list.len(), 1);
        assert!(list.is_well_formed());
    }

    #[test]
    fn insert_truncates_overlapping_trigger_from_the_left() {
        let mut list = TriggerList::new();
        list.insert(Trigger::new(0, 768, 0));
        list.insert(Trigger::new(384, 1152, 0));
        assert!(list.is_well_formed());
        assert_eq!(list.at(0).unwrap().end, 384);
        assert_eq!(list.at(384).unwrap().start, 384);
    }

    #[test]
    fn insert_splits_a_trigger_that_fully_contains_the_new_one() {
        let mut list = TriggerList::new();
        list.insert(Trigger::new(0, 1536, 0));
        list.insert(Trigger::new(384, 768, 100));
        assert_eq!(list.len(), 3);
        assert!(list.is_well_formed());
        // Left remnant keeps the original offset.
        assert_eq!(list.triggers[0], Trigger::new(0, 384, 0));
        assert_eq!(list.triggers[1], Trigger::new(384, 768, 100));
        // Right remnant's offset advances by the consumed span.
        assert_eq!(list.triggers[2].start, 768);
        assert_eq!(list.triggers[2].offset, 768);
    }

    #[test]
    fn truncate_to_drops_triggers_past_new_length_and_clips_the_rest() {
        let mut list = TriggerList::new();
        list.insert(Trigger::new(0, 768, 0));
        list.insert(Trigger::new(768, 1536, 0));
        list.truncate_to(1000);
        assert_eq!(list.len(), 2);
        assert_eq!(list.triggers[1].end, 1000);
    }
}
