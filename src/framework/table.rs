//! # Slot Table
//!
//! Arena of live entries addressed by a stable [`Handle`]. Entries are stored
//! densely; removal swaps the last entry into the hole and patches its index,
//! so both insert and remove are O(1). Storage doubles when full, up to a hard
//! cap beyond which inserts are refused with `Full`.

use crate::framework::FrameworkError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Stable identity of a table entry. Never reused within one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Handle(u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct SlotTable<T> {
    entries: Vec<(Handle, T)>,
    index: HashMap<Handle, usize>,
    next: u64,
    hard_cap: usize,
}

impl<T> SlotTable<T> {
    pub fn new(initial: usize, hard_cap: usize) -> Self {
        let hard_cap = hard_cap.max(1);
        let initial = initial.clamp(1, hard_cap);
        Self {
            entries: Vec::with_capacity(initial),
            index: HashMap::with_capacity(initial),
            next: 1,
            hard_cap,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.hard_cap
    }

    pub fn hard_cap(&self) -> usize {
        self.hard_cap
    }

    pub fn insert(&mut self, value: T) -> Result<Handle, FrameworkError> {
        if self.is_full() {
            return Err(FrameworkError::Full(self.hard_cap));
        }
        if self.entries.len() == self.entries.capacity() {
            let target = (self.entries.capacity() * 2).clamp(1, self.hard_cap);
            self.entries.reserve_exact(target - self.entries.len());
            debug!(capacity = self.entries.capacity(), "slot table grown");
        }
        let handle = Handle(self.next);
        self.next += 1;
        self.index.insert(handle, self.entries.len());
        self.entries.push((handle, value));
        Ok(handle)
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        let position = self.index.remove(&handle)?;
        let (_, value) = self.entries.swap_remove(position);
        if let Some((moved, _)) = self.entries.get(position) {
            self.index.insert(*moved, position);
        }
        Some(value)
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        let position = *self.index.get(&handle)?;
        self.entries.get(position).map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        self.entries.iter().map(|(handle, value)| (*handle, value))
    }

    /// Handles of the entries matching `predicate`.
    pub fn handles_where(&self, predicate: impl Fn(&T) -> bool) -> Vec<Handle> {
        self.iter()
            .filter(|(_, value)| predicate(value))
            .map(|(handle, _)| handle)
            .collect()
    }

    /// Empties the table, returning every entry.
    pub fn drain(&mut self) -> Vec<(Handle, T)> {
        self.index.clear();
        self.entries.drain(..).collect()
    }
}
