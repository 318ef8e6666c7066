//! Item index implementation
//!
//! BTreeMap-based index so that id iteration is ordered and deterministic.

use std::collections::BTreeMap;

use crate::error::{Result, StashError};
use crate::files::{DataRange, Description, SlotIndex, StoreId};

use super::{CacheEntry, Item};

/// In-memory index mapping store ids to cache entries
pub struct ItemManager<T> {
    entries: BTreeMap<StoreId, CacheEntry<T>>,
}

impl<T> ItemManager<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Install an entry for a recovered item; the payload stays absent
    pub fn new_item(&mut self, description: Description) -> Result<()> {
        let id = description.id;
        if self.entries.insert(id, CacheEntry::new(description)).is_some() {
            return Err(StashError::Corruption(format!(
                "id {} appears in more than one live slot",
                id
            )));
        }
        Ok(())
    }

    /// Install or replace the entry of an item
    pub fn set_entry(&mut self, id: StoreId, entry: CacheEntry<T>) {
        self.entries.insert(id, entry);
    }

    /// Update the cached payload, preserving the description
    pub fn set_content(&mut self, id: StoreId, content: T) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(StashError::NotFound(id))?;
        entry.content = Some(content);
        Ok(())
    }

    /// Item with its cached payload
    ///
    /// Fails with `NotLoaded` if the payload is absent; callers load it
    /// through the store first.
    pub fn get(&self, id: StoreId) -> Result<Item<T>>
    where
        T: Clone,
    {
        let entry = self.entries.get(&id).ok_or(StashError::NotFound(id))?;
        match &entry.content {
            Some(content) => Ok(Item::new(id, content.clone())),
            None => Err(StashError::NotLoaded(id)),
        }
    }

    /// Whether the item's payload is currently cached
    pub fn is_loaded(&self, id: StoreId) -> Result<bool> {
        let entry = self.entries.get(&id).ok_or(StashError::NotFound(id))?;
        Ok(entry.content.is_some())
    }

    /// Drop an item from the index, returning its last entry
    pub fn remove(&mut self, id: StoreId) -> Result<CacheEntry<T>> {
        self.entries.remove(&id).ok_or(StashError::NotFound(id))
    }

    pub fn contains(&self, id: StoreId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Data range currently holding the item's payload
    pub fn location(&self, id: StoreId) -> Result<DataRange> {
        self.entries
            .get(&id)
            .map(|entry| entry.description.range)
            .ok_or(StashError::NotFound(id))
    }

    /// Description slot currently holding the item
    pub fn slot_index(&self, id: StoreId) -> Result<SlotIndex> {
        self.entries
            .get(&id)
            .map(|entry| entry.description.index)
            .ok_or(StashError::NotFound(id))
    }

    /// Drop every cached payload, keeping all descriptions
    pub fn clear_cache(&mut self) {
        for entry in self.entries.values_mut() {
            entry.content = None;
        }
    }

    /// Snapshot of all live ids, ascending
    pub fn ids(&self) -> Vec<StoreId> {
        self.entries.keys().copied().collect()
    }

    /// Number of live items
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for ItemManager<T> {
    fn default() -> Self {
        Self::new()
    }
}
