//! Per-run state shared by the migration components

use std::collections::HashMap;

use super::MarkerLabel;
use crate::models::ThreadId;

/// Source thread ID -> destination thread ID
///
/// The first mapping recorded for a source thread wins; later inserts into
/// the same conversation reuse it.
#[derive(Debug, Default)]
pub struct ThreadMap {
    map: HashMap<ThreadId, ThreadId>,
}

impl ThreadMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination thread for a source thread, if one was recorded
    pub fn get(&self, source: &ThreadId) -> Option<&ThreadId> {
        self.map.get(source)
    }

    /// Record a mapping unless the source thread already has one
    ///
    /// Returns `true` if the mapping was recorded.
    pub fn set(&mut self, source: ThreadId, destination: ThreadId) -> bool {
        if self.map.contains_key(&source) {
            return false;
        }
        self.map.insert(source, destination);
        true
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Statistics from a migration run
///
/// `inserted` and `trashed` only count changes actually made; a dry run
/// counts the changes it would have made in `simulated_inserted` and
/// `simulated_trashed` instead.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunStats {
    /// Messages successfully fetched from the source
    pub fetched: usize,
    /// Messages inserted into the destination
    pub inserted: usize,
    /// Source messages moved to the trash
    pub trashed: usize,
    pub simulated_inserted: usize,
    pub simulated_trashed: usize,
    /// Messages found to already exist at the destination
    pub duplicates: usize,
    /// Messages that could not be fetched from the source
    pub unavailable: usize,
}

/// Mutable state owned by one migration run
#[derive(Debug, Default)]
pub struct Session {
    pub thread_map: ThreadMap,
    /// Marker label, once resolved
    pub label: Option<MarkerLabel>,
    pub stats: RunStats,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_map_first_writer_wins() {
        let mut map = ThreadMap::new();
        assert!(map.set(ThreadId::new("src"), ThreadId::new("dst-1")));
        assert!(!map.set(ThreadId::new("src"), ThreadId::new("dst-2")));

        assert_eq!(map.get(&ThreadId::new("src")), Some(&ThreadId::new("dst-1")));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_thread_map_unknown_thread() {
        let map = ThreadMap::new();
        assert!(map.is_empty());
        assert_eq!(map.get(&ThreadId::new("src")), None);
    }
}
