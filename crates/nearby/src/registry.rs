// Publish Registry - tracks active publish operations by id

use crate::provider::PublishHandle;
use crate::strategy::DiscoveryStrategy;
use crate::types::{Message, PublishId};
use std::collections::HashMap;
use tracing::debug;

/// Coordinator record of one confirmed publish
#[derive(Debug, Clone, PartialEq)]
pub struct PublishEntry {
    pub id: PublishId,
    pub message: Message,
    pub strategy: DiscoveryStrategy,
    pub handle: PublishHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    InFlight,
    ExpiredWhileInFlight,
}

/// Id to entry mapping, plus ids whose provider publish has not resolved.
///
/// Ids are reported in insertion order. Not synchronized on its own; the
/// session lock guards it.
#[derive(Debug, Default)]
pub struct PublishRegistry {
    entries: HashMap<PublishId, PublishEntry>,
    order: Vec<PublishId>,
    pending: HashMap<PublishId, Pending>,
}

impl PublishRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `id`
    pub fn add(&mut self, id: PublishId, entry: PublishEntry) {
        if self.entries.insert(id, entry).is_none() {
            self.order.push(id);
        }
    }

    /// Remove and return the entry; a missing id is not an error
    pub fn remove(&mut self, id: &PublishId) -> Option<PublishEntry> {
        let entry = self.entries.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(entry)
    }

    pub fn get(&self, id: &PublishId) -> Option<&PublishEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &PublishId) -> Option<&mut PublishEntry> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &PublishId) -> bool {
        self.entries.contains_key(id)
    }

    /// Snapshot of every entry, in insertion order
    pub fn all(&self) -> Vec<PublishEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .cloned()
            .collect()
    }

    pub fn ids(&self) -> Vec<PublishId> {
        self.order.clone()
    }

    /// Drop every entry and return them; pending ids are untouched
    pub fn clear(&mut self) -> Vec<PublishEntry> {
        let order = std::mem::take(&mut self.order);
        let mut entries = std::mem::take(&mut self.entries);
        order.iter().filter_map(|id| entries.remove(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Mark `id` as awaiting its provider publish result
    pub fn begin(&mut self, id: PublishId) {
        self.pending.insert(id, Pending::InFlight);
    }

    pub fn is_pending(&self, id: &PublishId) -> bool {
        self.pending.contains_key(id)
    }

    /// Insert the entry of a successful publish.
    ///
    /// Returns false, inserting nothing, when the id expired while pending.
    pub fn confirm(&mut self, entry: PublishEntry) -> bool {
        match self.pending.remove(&entry.id) {
            Some(Pending::ExpiredWhileInFlight) => {
                debug!("Publish {} expired before it was confirmed", entry.id);
                false
            }
            _ => {
                self.add(entry.id, entry);
                true
            }
        }
    }

    /// Forget a pending id whose provider publish failed
    pub fn abandon(&mut self, id: &PublishId) {
        self.pending.remove(id);
    }

    /// Mark every pending id expired and return them
    pub fn expire_pending(&mut self) -> Vec<PublishId> {
        let mut ids = Vec::new();
        for (id, state) in self.pending.iter_mut() {
            if *state == Pending::InFlight {
                *state = Pending::ExpiredWhileInFlight;
                ids.push(*id);
            }
        }
        ids
    }

    /// Apply a provider expiry for `id`.
    ///
    /// Removes an active entry, or marks a pending id so its later success
    /// is not inserted. Returns false if the id was unknown or already
    /// expired.
    pub fn expire(&mut self, id: &PublishId) -> bool {
        if let Some(state) = self.pending.get_mut(id) {
            let fresh = *state == Pending::InFlight;
            *state = Pending::ExpiredWhileInFlight;
            return fresh;
        }
        self.remove(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(handle: &str) -> PublishEntry {
        PublishEntry {
            id: PublishId::new(),
            message: Message::new(b"hello".to_vec(), "demo"),
            strategy: DiscoveryStrategy::Default,
            handle: PublishHandle::new(handle),
        }
    }

    #[test]
    fn test_add_get_remove() {
        let mut registry = PublishRegistry::new();
        let first = entry("a");
        let second = entry("b");
        registry.add(first.id, first.clone());
        registry.add(second.id, second.clone());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.ids(), vec![first.id, second.id]);
        assert_eq!(registry.get(&first.id), Some(&first));

        assert_eq!(registry.remove(&first.id), Some(first.clone()));
        assert_eq!(registry.remove(&first.id), None);
        assert_eq!(registry.ids(), vec![second.id]);
    }

    #[test]
    fn test_clear_returns_entries_in_order() {
        let mut registry = PublishRegistry::new();
        let entries: Vec<_> = ["a", "b", "c"].iter().map(|h| entry(h)).collect();
        for e in &entries {
            registry.add(e.id, e.clone());
        }

        assert_eq!(registry.clear(), entries);
        assert!(registry.is_empty());
        assert!(registry.ids().is_empty());
    }

    #[test]
    fn test_expiry_while_pending_blocks_confirm() {
        let mut registry = PublishRegistry::new();
        let pending = entry("a");
        registry.begin(pending.id);

        assert!(registry.expire(&pending.id));
        assert!(!registry.confirm(pending.clone()));
        assert!(!registry.contains(&pending.id));
        assert!(!registry.is_pending(&pending.id));
    }

    #[test]
    fn test_confirm_and_abandon() {
        let mut registry = PublishRegistry::new();
        let ok = entry("a");
        let failed = entry("b");
        registry.begin(ok.id);
        registry.begin(failed.id);

        assert!(registry.confirm(ok.clone()));
        registry.abandon(&failed.id);

        assert_eq!(registry.ids(), vec![ok.id]);
        assert!(!registry.expire(&failed.id));
        assert!(registry.expire(&ok.id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_expire_pending_reports_each_id_once() {
        let mut registry = PublishRegistry::new();
        let a = entry("a");
        let b = entry("b");
        registry.begin(a.id);
        registry.begin(b.id);
        registry.expire(&b.id);

        assert_eq!(registry.expire_pending(), vec![a.id]);
        assert!(registry.expire_pending().is_empty());
        assert!(!registry.confirm(a));
    }
}
