//! Location Manager
//!
//! Owns the set of free `DataRange`s in the data file.
//!
//! ## Allocation Strategy
//! First-fit in offset order: the lowest-offset free range long enough for
//! the request is carved from the front. This keeps freed low offsets hot
//! for reuse and makes allocation deterministic.
//!
//! Released ranges are added without merging; adjacent ranges are
//! tolerated until `merge_free_locations()` coalesces them.

use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{Result, StashError};
use crate::files::{DataRange, Description, FileManager};

/// Manages the free ranges of the data file
///
/// The manager does not own the data file; operations that change or
/// consult the file length borrow the [`FileManager`].
pub struct LocationManager {
    /// Free ranges keyed by offset; values are lengths. Disjoint, but
    /// possibly adjacent between merges.
    free: BTreeMap<u64, u64>,

    /// Sum of all free range lengths
    free_total: u64,

    /// Minimum growth step of the data file
    minimum_data_file_size: u64,

    /// Guards against a second recovery pass
    initialized: bool,
}

impl LocationManager {
    pub fn new(minimum_data_file_size: u64) -> Self {
        Self {
            free: BTreeMap::new(),
            free_total: 0,
            minimum_data_file_size,
            initialized: false,
        }
    }

    /// Compute the initial free set as the complement of the live ranges
    /// in `[0, data_file_length)`
    ///
    /// Must be called exactly once, right after the file manager's
    /// recovery scan. Overlapping live ranges are corruption.
    pub fn initialize(&mut self, live: &[Description], files: &FileManager) -> Result<()> {
        if self.initialized {
            return Err(StashError::InvalidState(
                "location manager initialized twice".into(),
            ));
        }
        self.initialized = true;

        let total = files.total_space();
        let mut ranges: Vec<DataRange> = live.iter().map(|d| d.range).collect();
        ranges.sort_by_key(|r| r.offset);

        let mut cursor = 0u64;
        for range in ranges {
            if range.offset < cursor {
                return Err(StashError::Corruption(format!(
                    "live ranges overlap at offset {}",
                    range.offset
                )));
            }
            if range.end() > total {
                return Err(StashError::Corruption(format!(
                    "live range [{}, {}) beyond data file length {}",
                    range.offset,
                    range.end(),
                    total
                )));
            }
            if range.offset > cursor {
                self.insert_free(cursor, range.offset - cursor);
            }
            cursor = range.end();
        }
        if cursor < total {
            self.insert_free(cursor, total - cursor);
        }

        debug!(
            free_ranges = self.free.len(),
            free_bytes = self.free_total,
            "free set recovered"
        );
        Ok(())
    }

    /// Return a free range of exactly `size` bytes
    ///
    /// Carves the front of the first fitting free range. If none fits, the
    /// data file grows by `max(size, minimum_data_file_size)` and the new
    /// tail becomes free.
    pub fn get_free_location(&mut self, size: u64, files: &mut FileManager) -> Result<DataRange> {
        if size == 0 {
            return Err(StashError::InvalidArgument(
                "cannot allocate a zero-length range".into(),
            ));
        }
        loop {
            let fit = self
                .free
                .iter()
                .find(|(_, &length)| length >= size)
                .map(|(&offset, &length)| (offset, length));
            match fit {
                Some((offset, length)) => {
                    self.free.remove(&offset);
                    if length > size {
                        self.free.insert(offset + size, length - size);
                    }
                    self.free_total -= size;
                    return Ok(DataRange::new(offset, size));
                }
                None => self.grow(size, files)?,
            }
        }
    }

    /// Add a released range to the free set without merging
    ///
    /// The range must lie inside the data file and must not overlap any
    /// free range; a violation indicates a bookkeeping bug elsewhere.
    pub fn add_free_location(&mut self, range: DataRange, files: &FileManager) -> Result<()> {
        if range.length == 0 || range.end() > files.total_space() {
            return Err(StashError::Corruption(format!(
                "released range [{}, {}) outside data file of length {}",
                range.offset,
                range.end(),
                files.total_space()
            )));
        }
        if let Some((&offset, &length)) = self.free.range(..=range.offset).next_back() {
            if offset + length > range.offset {
                return Err(StashError::Corruption(format!(
                    "released range at {} overlaps free range [{}, {})",
                    range.offset,
                    offset,
                    offset + length
                )));
            }
        }
        if let Some((&offset, _)) = self.free.range(range.offset..).next() {
            if range.end() > offset {
                return Err(StashError::Corruption(format!(
                    "released range [{}, {}) overlaps free range at {}",
                    range.offset,
                    range.end(),
                    offset
                )));
            }
        }
        self.insert_free(range.offset, range.length);
        Ok(())
    }

    /// Coalesce every pair of adjacent free ranges
    pub fn merge_free_locations(&mut self) {
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(self.free.len());
        for (&offset, &length) in &self.free {
            match merged.last_mut() {
                Some((last_offset, last_length)) if *last_offset + *last_length == offset => {
                    *last_length += length;
                }
                _ => merged.push((offset, length)),
            }
        }
        self.free = merged.into_iter().collect();
    }

    /// If the highest free range touches the end of the data file, drop it
    /// from the free set and truncate the file by its length
    pub fn trim_data_file(&mut self, files: &mut FileManager) -> Result<()> {
        if let Some((&offset, &length)) = self.free.iter().next_back() {
            if offset + length == files.total_space() {
                self.free.remove(&offset);
                self.free_total -= length;
                files.set_data_file_length(offset)?;
                debug!(trimmed = length, new_length = offset, "data file trimmed");
            }
        }
        Ok(())
    }

    /// Total free bytes
    pub fn free_space(&self) -> u64 {
        self.free_total
    }

    /// Number of free ranges
    pub fn free_location_count(&self) -> usize {
        self.free.len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn insert_free(&mut self, offset: u64, length: u64) {
        self.free.insert(offset, length);
        self.free_total += length;
    }

    /// Extend the data file; the new tail becomes a single free range
    fn grow(&mut self, size: u64, files: &mut FileManager) -> Result<()> {
        let old_length = files.total_space();
        let step = size.max(self.minimum_data_file_size);
        files.set_data_file_length(old_length + step)?;
        self.insert_free(old_length, step);
        debug!(
            old_length,
            new_length = old_length + step,
            "data file grown"
        );
        Ok(())
    }
}
