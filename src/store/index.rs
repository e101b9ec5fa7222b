//! Block index
//!
//! In-memory key → [`Node`] map rebuilt on every open. Never persisted.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::block::Node;

/// State of one key in the index
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// Claimed by a write that has not completed (or failed part way)
    Reserved,
    /// Fully written block; a size of 0 is a valid empty payload
    Present(Node),
}

/// Concurrent key index
///
/// ## Concurrency:
/// - Lookups take the read lock and may run in parallel
/// - `reserve()` checks and marks a key under one write lock, so two callers
///   racing on the same key get exactly one winner
#[derive(Debug, Default)]
pub struct Index {
    slots: RwLock<HashMap<String, Slot>>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key` for a write. Returns false if the key is already taken.
    pub fn reserve(&self, key: &str) -> bool {
        match self.slots.write().entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Slot::Reserved);
                true
            }
        }
    }

    /// Drop a reservation that never touched the resource
    pub fn release(&self, key: &str) {
        let mut slots = self.slots.write();
        if matches!(slots.get(key), Some(Slot::Reserved)) {
            slots.remove(key);
        }
    }

    /// Publish a written block. Returns the previous node if the key was
    /// already present (possible only when scanning a file with repeats).
    pub fn insert(&self, node: Node) -> Option<Node> {
        let previous = self.slots.write().insert(node.key.clone(), Slot::Present(node));
        match previous {
            Some(Slot::Present(old)) => Some(old),
            _ => None,
        }
    }

    /// Look up a present block
    pub fn get(&self, key: &str) -> Option<Node> {
        match self.slots.read().get(key) {
            Some(Slot::Present(node)) => Some(node.clone()),
            _ => None,
        }
    }

    pub fn slot(&self, key: &str) -> Option<Slot> {
        self.slots.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(self.slots.read().get(key), Some(Slot::Present(_)))
    }

    /// Record the decompressed size the first time it is learned
    pub fn set_origin_size(&self, key: &str, origin_size: u64) {
        if let Some(Slot::Present(node)) = self.slots.write().get_mut(key) {
            node.origin_size.get_or_insert(origin_size);
        }
    }

    /// Keys of present blocks, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .slots
            .read()
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Present(_)))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Present blocks, sorted by payload offset
    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes: Vec<Node> = self
            .slots
            .read()
            .values()
            .filter_map(|slot| match slot {
                Slot::Present(node) => Some(node.clone()),
                Slot::Reserved => None,
            })
            .collect();
        nodes.sort_by_key(|n| n.offset);
        nodes
    }

    /// Number of present blocks
    pub fn len(&self) -> usize {
        self.slots
            .read()
            .values()
            .filter(|slot| matches!(slot, Slot::Present(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
