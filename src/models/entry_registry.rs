//! Process-wide registry of media entries discovered in the feed.
//!
//! This module provides the `EntryRegistry` struct which tracks:
//! - Media entry metadata keyed by `(group_id, uri)`
//! - Weak view handles used to measure the source thumbnail on demand
//!
//! Feed thumbnails are the only writers: each registers itself on mount and
//! unregisters on unmount. The viewer only reads, and tolerates entries that
//! disappear between two reads.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::layout::ScreenRect;
use crate::models::view_handle::{ViewHandle, ViewHandleRegistry};
use crate::models::{EntryPatch, MediaEntry};

static GLOBAL_REGISTRY: Lazy<Arc<EntryRegistry>> = Lazy::new(|| Arc::new(EntryRegistry::new()));

/// Which entries to drop on unregister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unregister {
    /// Every entry with this URI, in any group.
    Uri(String),
    /// Every entry in this group, e.g. when the feed screen goes away.
    Group(String),
}

#[derive(Debug, Clone)]
struct Slot {
    entry: MediaEntry,
    /// Insertion sequence; breaks ties between equal sort keys.
    seq: u64,
}

#[derive(Default)]
struct Entries {
    slots: Vec<Slot>,
    next_seq: u64,
}

impl Entries {
    fn position(&self, group_id: &str, uri: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.entry.group_id == group_id && s.entry.uri == uri)
    }

    fn resort(&mut self) {
        self.slots
            .sort_by_key(|s| (s.entry.index.unwrap_or(0), s.seq));
    }
}

#[derive(Default)]
pub struct EntryRegistry {
    entries: RwLock<Entries>,
    handles: ViewHandleRegistry,
}

impl EntryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry shared by the feed and the viewer.
    pub fn global() -> Arc<EntryRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Inserts or replaces the entry for `(group_id, uri)` and records the
    /// thumbnail's view handle when one is given.
    ///
    /// Re-registering a key keeps its original insertion slot.
    pub fn register(&self, entry: MediaEntry, handle: Option<&Arc<dyn ViewHandle>>) {
        if let Some(handle) = handle {
            self.handles.insert(&entry.group_id, &entry.uri, handle);
        }

        let mut entries = self.entries.write();
        match entries.position(&entry.group_id, &entry.uri) {
            Some(pos) => {
                trace!(uri = %entry.uri, group_id = %entry.group_id, "Replacing media entry");
                entries.slots[pos].entry = entry;
            }
            None => {
                trace!(uri = %entry.uri, group_id = %entry.group_id, "Registering media entry");
                let seq = entries.next_seq;
                entries.next_seq += 1;
                entries.slots.push(Slot { entry, seq });
            }
        }
        entries.resort();
    }

    /// Merges `patch` into every matching entry. Returns how many changed.
    pub fn update(&self, patch: &EntryPatch) -> usize {
        let mut entries = self.entries.write();
        let mut updated = 0;
        for slot in entries.slots.iter_mut() {
            let group_matches = patch
                .group_id
                .as_deref()
                .map_or(true, |g| slot.entry.group_id == g);
            if slot.entry.uri == patch.uri && group_matches {
                slot.entry.apply(patch);
                updated += 1;
            }
        }
        if updated > 0 {
            entries.resort();
            trace!(uri = %patch.uri, updated, "Updated media entries");
        }
        updated
    }

    pub fn unregister(&self, target: &Unregister) -> usize {
        let removed: Vec<MediaEntry> = {
            let mut entries = self.entries.write();
            let (gone, kept): (Vec<Slot>, Vec<Slot>) =
                entries.slots.drain(..).partition(|s| match target {
                    Unregister::Uri(uri) => s.entry.uri == *uri,
                    Unregister::Group(group_id) => s.entry.group_id == *group_id,
                });
            entries.slots = kept;
            gone.into_iter().map(|s| s.entry).collect()
        };

        match target {
            Unregister::Group(group_id) => {
                self.handles.remove_group(group_id);
            }
            Unregister::Uri(_) => {
                for entry in &removed {
                    self.handles.remove(&entry.group_id, &entry.uri);
                }
            }
        }

        debug!(?target, removed = removed.len(), "Unregistered media entries");
        removed.len()
    }

    pub fn clear(&self) {
        *self.entries.write() = Entries::default();
        self.handles.clear();
        debug!("Cleared media entry registry");
    }

    pub fn get(&self, group_id: &str, uri: &str) -> Option<MediaEntry> {
        let entries = self.entries.read();
        entries
            .position(group_id, uri)
            .map(|pos| entries.slots[pos].entry.clone())
    }

    /// Entries of one group in pager order.
    ///
    /// Entries are walked by sort key; reversed entries are pushed to the
    /// front and normal entries to the back.
    pub fn list_by_group(&self, group_id: &str) -> Vec<MediaEntry> {
        let entries = self.entries.read();
        let mut ordered = std::collections::VecDeque::new();
        for slot in entries.slots.iter().filter(|s| s.entry.group_id == group_id) {
            if slot.entry.is_reversed {
                ordered.push_front(slot.entry.clone());
            } else {
                ordered.push_back(slot.entry.clone());
            }
        }
        ordered.into()
    }

    /// Current rectangle of the thumbnail for `(group_id, uri)`, if mounted.
    pub async fn resolve_handle(&self, group_id: &str, uri: &str) -> Option<ScreenRect> {
        self.handles.resolve(group_id, uri).await
    }

    pub fn handles(&self) -> &ViewHandleRegistry {
        &self.handles
    }

    pub fn len(&self) -> usize {
        self.entries.read().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().slots.is_empty()
    }
}
