//! Patterns are held in an arena and referenced everywhere else by a
//! stable integer handle rather than an owning pointer (§9): the
//! potentially cyclic pattern-reference graph (background pattern
//! display, song-trigger offsets into another pattern's stream) is then
//! representable without lifetime gymnastics, and the scheduler can take
//! one lock per pattern instead of one lock for the whole arena.

use crate::pattern::Pattern;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternHandle(u32);

#[derive(Default)]
pub struct PatternArena {
    slots: Vec<Option<Mutex<Pattern>>>,
    free: Vec<u32>,
}

impl PatternArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pattern: Pattern) -> PatternHandle {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Some(Mutex::new(pattern));
            PatternHandle(index)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Some(Mutex::new(pattern)));
            PatternHandle(index)
        }
    }

    /// Removes the pattern at `handle`, if it is still live. Later lookups
    /// through this (now-stale) handle return `None` rather than panicking
    /// ("handle-validity checked on dereference", §9).
    pub fn remove(&mut self, handle: PatternHandle) -> Option<Pattern> {
        let slot = self.slots.get_mut(handle.0 as usize)?;
        let mutex = slot.take()?;
        self.free.push(handle.0);
        Some(mutex.into_inner().unwrap_or_else(|poison| poison.into_inner()))
    }

    pub fn get(&self, handle: PatternHandle) -> Option<&Mutex<Pattern>> {
        self.slots.get(handle.0 as usize).and_then(|slot| slot.as_ref())
    }

    pub fn handles(&self) -> impl Iterator<Item = PatternHandle> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|_| PatternHandle(i as u32)))
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
