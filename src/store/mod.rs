//! Store Module
//!
//! The public façade. Composes the file manager, the location manager,
//! the item index, and the shared staging buffer into the store API.
//!
//! ## Write Ordering
//! Within one operation, disk writes are issued in a fixed order:
//! - mutations write the new payload bytes *before* the new description,
//!   and release the old range only after the new description is written;
//! - deletions clear the description *before* freeing the data range.
//!
//! A crash between any two writes leaves either the old state, the new
//! state, or an orphaned data range that the next recovery reclaims
//! (orphaned bytes are referenced by no live slot, so they fall into the
//! free-set complement).
//!
//! ## Threading
//! A store is single-threaded by contract. Nothing here serializes
//! concurrent callers; embed the store behind your own synchronization if
//! you need sharing.

mod query;

pub use query::StoreQuery;

use crate::buffer::{BufferMode, StoreBuffer};
use crate::config::Config;
use crate::error::{Result, StashError};
use crate::files::{DataRange, Description, FileManager, StoreId};
use crate::items::{CacheEntry, Item, ItemManager};
use crate::space::LocationManager;

/// Serialization callback: encode one value into the writable buffer
pub type PutInto<T> = Box<dyn Fn(&T, &mut StoreBuffer) -> Result<()>>;

/// Deserialization callback: decode exactly one value from the readable
/// buffer; `transferable_data()` tells the callback how many bytes remain
pub type GetFrom<T> = Box<dyn Fn(&mut StoreBuffer) -> Result<T>>;

/// Embedded persistent object store
///
/// Maps monotonically allocated `u64` ids to user values, serialized to
/// variable-length byte payloads through the two callbacks captured at
/// construction. Payloads are cached per item after the first read.
pub struct Store<T> {
    is_closed: bool,
    files: FileManager,
    locations: LocationManager,
    items: ItemManager<T>,
    buffer: StoreBuffer,
    put_into: PutInto<T>,
    get_from: GetFrom<T>,
}

impl<T> std::fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("is_closed", &self.is_closed)
            .finish_non_exhaustive()
    }
}

impl<T: Clone> Store<T> {
    /// Open or create a store described by `config`
    ///
    /// Runs the full recovery protocol: bootstrap the id counter, scan the
    /// description file for live slots, rebuild the free-slot list and the
    /// free-range set as the complement of the live ranges.
    pub fn open(
        config: Config,
        put_into: impl Fn(&T, &mut StoreBuffer) -> Result<()> + 'static,
        get_from: impl Fn(&mut StoreBuffer) -> Result<T> + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let mut files = FileManager::open(&config)?;
        let mut buffer = StoreBuffer::new(config.byte_buffer_size);
        let mut locations = LocationManager::new(config.minimum_data_file_size);
        let mut items = ItemManager::new();

        let live = files.initialize(&mut buffer)?;
        locations.initialize(&live, &files)?;
        for description in live {
            items.new_item(description)?;
        }

        Ok(Self {
            is_closed: false,
            files,
            locations,
            items,
            buffer,
            put_into: Box::new(put_into),
            get_from: Box::new(get_from),
        })
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Persist a new value and return it with its freshly allocated id
    pub fn store(&mut self, content: T) -> Result<Item<T>> {
        self.assure_open()?;
        let range = self.stage_payload(&content)?;
        let description = self.files.create_description(range)?;
        self.save_description(&description)?;
        let item = Item::new(description.id, content.clone());
        self.items
            .set_entry(description.id, CacheEntry::with_content(description, content));
        Ok(item)
    }

    /// Replace the value of an existing item, keeping its id and slot
    ///
    /// The new payload lands in a new range and the slot is rewritten in
    /// place; only then is the old range released.
    pub fn update(&mut self, id: StoreId, content: T) -> Result<Item<T>> {
        self.assure_open()?;
        if !self.items.contains(id) {
            return Err(StashError::NotFound(id));
        }
        let range = self.stage_payload(&content)?;
        let old_range = self.items.location(id)?;
        let description = Description::new(id, self.items.slot_index(id)?, range);
        self.save_description(&description)?;
        self.locations.add_free_location(old_range, &self.files)?;
        let item = Item::new(id, content.clone());
        self.items
            .set_entry(id, CacheEntry::with_content(description, content));
        Ok(item)
    }

    /// Remove an item: clear its slot, recycle the slot index, free its
    /// data range, drop its cache entry
    pub fn delete(&mut self, id: StoreId) -> Result<()> {
        self.assure_open()?;
        if !self.items.contains(id) {
            return Err(StashError::NotFound(id));
        }
        let range = self.items.location(id)?;
        let index = self.items.slot_index(id)?;
        self.files.clear_description(index)?;
        self.files.add_empty_index(index);
        self.items.remove(id)?;
        self.locations.add_free_location(range, &self.files)?;
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Item by id, loading the payload from disk if it is not cached
    pub fn get(&mut self, id: StoreId) -> Result<Item<T>> {
        self.assure_open()?;
        if !self.items.contains(id) {
            return Err(StashError::NotFound(id));
        }
        if !self.items.is_loaded(id)? {
            self.load(id)?;
        }
        self.items.get(id)
    }

    pub fn contains(&self, id: StoreId) -> bool {
        self.items.contains(id)
    }

    /// Number of live items
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Query over a snapshot of the current live ids
    pub fn query(&mut self) -> StoreQuery<'_, T> {
        let ids = self.items.ids();
        StoreQuery::new(self, ids)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Opportunistic compaction: trim the description file, merge adjacent
    /// free ranges, trim free tail space off the data file
    ///
    /// Never moves live data.
    pub fn organize(&mut self) -> Result<()> {
        self.assure_open()?;
        self.files.trim_description_file_size()?;
        self.locations.merge_free_locations();
        self.locations.trim_data_file(&mut self.files)?;
        Ok(())
    }

    /// Drop every cached payload; descriptions stay intact
    pub fn clear_cache(&mut self) {
        self.items.clear_cache();
    }

    // =========================================================================
    // Space Accounting
    // =========================================================================

    /// Current data file length
    pub fn total_space(&self) -> u64 {
        self.files.total_space()
    }

    /// Bytes available for allocation without growing the data file
    pub fn free_space(&self) -> u64 {
        self.locations.free_space()
    }

    /// Bytes occupied by live payloads
    pub fn used_space(&self) -> u64 {
        self.total_space() - self.free_space()
    }

    /// Number of free ranges in the data file
    pub fn free_location_count(&self) -> usize {
        self.locations.free_location_count()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn is_closed(&self) -> bool {
        self.is_closed
    }

    /// Flush and close the store; idempotent
    ///
    /// Every operation after this fails with `Closed`.
    pub fn close(&mut self) -> Result<()> {
        if self.is_closed {
            return Ok(());
        }
        self.is_closed = true;
        self.files.close()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn assure_open(&self) -> Result<()> {
        if self.is_closed {
            return Err(StashError::Closed);
        }
        Ok(())
    }

    /// Serialize `content` and write it into a freshly allocated range
    ///
    /// The buffer is emptied before the callback runs and again after the
    /// write, whether it succeeded or not: a callback that errors after
    /// writing partial bytes must not leak them into the next operation.
    fn stage_payload(&mut self, content: &T) -> Result<DataRange> {
        self.buffer.set_mode(BufferMode::Write);
        let result = self.stage_payload_inner(content);
        self.buffer.set_mode(BufferMode::Write);
        result
    }

    fn stage_payload_inner(&mut self, content: &T) -> Result<DataRange> {
        (self.put_into)(content, &mut self.buffer)?;
        self.buffer.set_mode(BufferMode::Read);
        let size = self.buffer.transferable_data() as u64;
        let range = self.locations.get_free_location(size, &mut self.files)?;
        self.files.write_data(range, &mut self.buffer)?;
        Ok(range)
    }

    /// Stage a description slot and rewrite it in place
    ///
    /// Same buffer discipline as [`Store::stage_payload`]: emptied before
    /// staging, emptied again on both the success and error paths.
    fn save_description(&mut self, description: &Description) -> Result<()> {
        self.buffer.set_mode(BufferMode::Write);
        let result = self.save_description_inner(description);
        self.buffer.set_mode(BufferMode::Write);
        result
    }

    fn save_description_inner(&mut self, description: &Description) -> Result<()> {
        self.buffer.put_description(description)?;
        self.buffer.set_mode(BufferMode::Read);
        self.files
            .write_description(description.index, &mut self.buffer)
    }

    /// Read the item's payload from disk into its cache entry
    fn load(&mut self, id: StoreId) -> Result<()> {
        let range = self.items.location(id)?;
        self.files.read_data(range, &mut self.buffer)?;
        self.buffer.set_mode(BufferMode::Read);
        let decoded = (self.get_from)(&mut self.buffer);
        self.buffer.set_mode(BufferMode::Write);
        self.items.set_content(id, decoded?)
    }
}
