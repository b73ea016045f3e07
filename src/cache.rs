use dashmap::DashMap;
use log::debug;

use crate::model::RecipeRecord;

/// Successful records keyed by the literal URL string.
///
/// Bounded by entry count; once full, new records are simply not stored.
#[derive(Debug)]
pub struct RecipeCache {
    entries: DashMap<String, RecipeRecord>,
    max_entries: usize,
}

impl RecipeCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
        }
    }

    pub fn get(&self, url: &str) -> Option<RecipeRecord> {
        self.entries.get(url).map(|entry| entry.value().clone())
    }

    /// Store `record` if it is a successful extraction and there is room.
    pub fn insert(&self, record: &RecipeRecord) -> bool {
        if !record.found() {
            return false;
        }
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&record.source_url) {
            debug!("cache full, not storing {}", record.source_url);
            return false;
        }
        self.entries
            .insert(record.source_url.clone(), record.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
