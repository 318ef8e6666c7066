//! Store queries
//!
//! A query runs over a snapshot of the live ids taken when the query was
//! created; items are loaded through the store (and cached) as filters
//! demand them. Ids failing an id filter are skipped, not aborted on.

use crate::error::Result;
use crate::files::StoreId;
use crate::items::Item;

use super::Store;

/// Id predicate
pub type IdFilter = Box<dyn Fn(StoreId) -> bool>;

/// Content predicate
pub type ContentFilter<T> = Box<dyn Fn(&T) -> bool>;

/// A reusable filter/collect query over a [`Store`]
///
/// Intermediate operations add filters; terminal operations iterate the
/// id snapshot in ascending order and load matching items. A query can be
/// run as often as needed, but it borrows the store exclusively, so the
/// store cannot change underneath it.
pub struct StoreQuery<'a, T> {
    store: &'a mut Store<T>,
    ids: Vec<StoreId>,
    id_filters: Vec<IdFilter>,
    content_filters: Vec<ContentFilter<T>>,
}

impl<'a, T: Clone> StoreQuery<'a, T> {
    pub(super) fn new(store: &'a mut Store<T>, ids: Vec<StoreId>) -> Self {
        Self {
            store,
            ids,
            id_filters: Vec::new(),
            content_filters: Vec::new(),
        }
    }

    // =========================================================================
    // Intermediate Operations
    // =========================================================================

    /// Keep only items whose id satisfies `filter`
    pub fn where_id(mut self, filter: impl Fn(StoreId) -> bool + 'static) -> Self {
        self.id_filters.push(Box::new(filter));
        self
    }

    /// Keep only items whose content satisfies `filter`
    pub fn where_content(mut self, filter: impl Fn(&T) -> bool + 'static) -> Self {
        self.content_filters.push(Box::new(filter));
        self
    }

    // =========================================================================
    // Terminal Operations
    // =========================================================================

    /// Content of the first matching item, if any
    pub fn first(&mut self) -> Result<Option<T>> {
        for index in 0..self.ids.len() {
            if let Some(item) = self.match_at(index)? {
                return Ok(Some(item.into_content()));
            }
        }
        Ok(None)
    }

    /// Content of the last matching item, if any
    pub fn last(&mut self) -> Result<Option<T>> {
        let mut last = None;
        for index in 0..self.ids.len() {
            if let Some(item) = self.match_at(index)? {
                last = Some(item.into_content());
            }
        }
        Ok(last)
    }

    /// Every matching item, in ascending id order
    pub fn all(&mut self) -> Result<Vec<Item<T>>> {
        let mut items = Vec::new();
        for index in 0..self.ids.len() {
            if let Some(item) = self.match_at(index)? {
                items.push(item);
            }
        }
        Ok(items)
    }

    /// Every matching item's content, in ascending id order
    pub fn all_content(&mut self) -> Result<Vec<T>> {
        Ok(self.all()?.into_iter().map(Item::into_content).collect())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Load and test the item at snapshot position `index`
    fn match_at(&mut self, index: usize) -> Result<Option<Item<T>>> {
        let id = self.ids[index];
        if !self.id_filters.iter().all(|filter| filter(id)) {
            return Ok(None);
        }
        let item = self.store.get(id)?;
        if !self.content_filters.iter().all(|filter| filter(item.content())) {
            return Ok(None);
        }
        Ok(Some(item))
    }
}
