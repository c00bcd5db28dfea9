//! In-memory checkpoint map

use crate::IndexRange;
use std::collections::BTreeMap;

/// Mapping from block index to normalized timestamp.
///
/// Keys are unique and iterate in ascending order. The map only grows: the
/// owning [`CheckpointStore`](super::CheckpointStore) refuses to overwrite an
/// index that is already present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointMap {
    entries: BTreeMap<u64, String>,
}

impl CheckpointMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing set of entries
    pub fn from_entries(entries: BTreeMap<u64, String>) -> Self {
        Self { entries }
    }

    /// Number of committed indices
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been committed yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Timestamp committed for `index`
    pub fn get(&self, index: u64) -> Option<&str> {
        self.entries.get(&index).map(String::as_str)
    }

    /// Whether `index` has been committed
    pub fn contains(&self, index: u64) -> bool {
        self.entries.contains_key(&index)
    }

    /// Lowest committed index
    pub fn first_index(&self) -> Option<u64> {
        self.entries.keys().next().copied()
    }

    /// Highest committed index
    pub fn max_index(&self) -> Option<u64> {
        self.entries.keys().next_back().copied()
    }

    /// Iterate entries in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Borrow the underlying ordered entries
    pub fn entries(&self) -> &BTreeMap<u64, String> {
        &self.entries
    }

    /// Maximal runs of indices missing from `0..=max_index`
    pub fn gaps(&self) -> Vec<IndexRange> {
        let mut gaps = Vec::new();
        let mut expected = 0u64;
        for &index in self.entries.keys() {
            if index > expected {
                if let Some(gap) = IndexRange::new(expected, index - 1) {
                    gaps.push(gap);
                }
            }
            expected = index.saturating_add(1);
        }
        gaps
    }

    /// Total number of indices covered by [`gaps`](Self::gaps)
    pub fn missing_count(&self) -> u64 {
        self.gaps().iter().map(IndexRange::len).sum()
    }

    /// Insert only if `index` is absent. Returns whether the entry was added.
    pub(crate) fn insert_new(&mut self, index: u64, timestamp: String) -> bool {
        if self.entries.contains_key(&index) {
            return false;
        }
        self.entries.insert(index, timestamp);
        true
    }

    /// Undo an insert whose flush failed
    pub(crate) fn rollback(&mut self, index: u64) {
        self.entries.remove(&index);
    }
}

impl FromIterator<(u64, String)> for CheckpointMap {
    fn from_iter<I: IntoIterator<Item = (u64, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
