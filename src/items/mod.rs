//! Items Module
//!
//! The in-memory index of live items.
//!
//! ## Responsibilities
//! - Map each store id to its description slot and data range
//! - Hold the per-item payload cache
//! - Hand out immutable `(id, payload)` pairs to callers

mod manager;

pub use manager::ItemManager;

use crate::files::{Description, StoreId};

/// One indexed item: its description plus an optionally cached payload
///
/// The payload is absent for items discovered during recovery and for
/// items whose cache has been cleared; it is filled in on first read.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Current slot and data range of the item
    pub description: Description,

    /// Cached payload, if loaded
    pub content: Option<T>,
}

impl<T> CacheEntry<T> {
    /// Entry with no cached payload
    pub fn new(description: Description) -> Self {
        Self {
            description,
            content: None,
        }
    }

    /// Entry with the payload already in cache
    pub fn with_content(description: Description, content: T) -> Self {
        Self {
            description,
            content: Some(content),
        }
    }
}

/// Immutable pair returned to the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<T> {
    id: StoreId,
    content: T,
}

impl<T> Item<T> {
    pub fn new(id: StoreId, content: T) -> Self {
        Self { id, content }
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn content(&self) -> &T {
        &self.content
    }

    /// Consume the item, keeping only the payload
    pub fn into_content(self) -> T {
        self.content
    }
}
