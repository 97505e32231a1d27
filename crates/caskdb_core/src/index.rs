//! In-memory key directory.

use std::collections::HashMap;

/// Maps each key to the byte offset of its latest record in the active
/// segment.
///
/// Only the last write per key is indexed; older records for that key still
/// exist in the segment but are unreachable until rotation drops them. The
/// key directory itself is not synchronized - the store guards it with its
/// reader/writer lock, and rotation swaps in a freshly built one wholesale.
#[derive(Debug, Default)]
pub(crate) struct KeyDir {
    offsets: HashMap<String, u64>,
}

impl KeyDir {
    /// Creates an empty key directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up the offset of the latest record for `key`.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    /// Points `key` at a new latest record, replacing any previous offset.
    pub fn insert(&mut self, key: String, offset: u64) {
        self.offsets.insert(key, offset);
    }

    /// Returns the number of distinct keys.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Returns whether the directory holds no keys.
    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}
