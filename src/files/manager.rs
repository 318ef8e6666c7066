//! File Manager
//!
//! Owns the three store files and performs all disk I/O.
//!
//! ## Responsibilities
//! - Open/create the store directory and files
//! - Recover state on open: scan slots, rebuild the free-slot list
//! - Fixed-size slot I/O on the description file
//! - Byte-ranged I/O on the data file
//! - Monotonic id allocation backed by the id file
//!
//! ## Durability
//! All handles are unbuffered `File`s, so every write reaches the OS when
//! the call returns; the write order within one store operation is the
//! order the calls are issued in. `close()` additionally runs `sync_all`
//! on all three files. The id counter is persisted before any description
//! referencing a new id is written — a crash in between leaks the id but
//! never duplicates one.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::buffer::{BufferMode, StoreBuffer};
use crate::config::Config;
use crate::error::{Result, StashError};

use super::{DataRange, Description, SlotIndex, StoreId, LIVE_FLAG, SLOT_SIZE};

/// Manages the description, data, and id files of one store
#[derive(Debug)]
pub struct FileManager {
    /// Array of fixed-size description slots
    description_file: File,

    /// Raw payload bytes
    data_file: File,

    /// Single big-endian u64: the next id to allocate
    id_file: File,

    /// Cached id counter; mirrors the id file
    next_id: StoreId,

    /// Number of slots the description file is sized for
    slot_count: u64,

    /// Indices of slots with `live = 0`, available for reuse
    free_slots: BTreeSet<SlotIndex>,

    /// Cached data file length; mirrors the file's metadata
    data_file_size: u64,
}

impl FileManager {
    /// Open or create the store files under `config.store_directory()`
    ///
    /// If the id file is absent (or too short) the counter is initialized
    /// to 1. Call [`FileManager::initialize`] next to scan the slots.
    pub fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(config.store_directory())?;

        let description_file = open_store_file(&config.description_file_path())?;
        let data_file = open_store_file(&config.data_file_path())?;
        let mut id_file = open_store_file(&config.id_file_path())?;

        let description_len = description_file.metadata()?.len();
        if description_len % SLOT_SIZE != 0 {
            return Err(StashError::Corruption(format!(
                "description file length {} is not a multiple of the slot size {}",
                description_len, SLOT_SIZE
            )));
        }

        // Bootstrap or read the id counter. Only a brand-new, empty file is
        // bootstrapped; a short file is a torn write, and resetting it
        // could re-issue ids still referenced by live slots.
        let id_file_len = id_file.metadata()?.len();
        let next_id = if id_file_len == 0 {
            id_file.seek(SeekFrom::Start(0))?;
            id_file.write_all(&1u64.to_be_bytes())?;
            1
        } else if id_file_len < 8 {
            return Err(StashError::Corruption(format!(
                "id file is {} bytes, expected 8",
                id_file_len
            )));
        } else {
            let mut counter = [0u8; 8];
            id_file.seek(SeekFrom::Start(0))?;
            id_file.read_exact(&mut counter)?;
            let next_id = u64::from_be_bytes(counter);
            if next_id == 0 {
                return Err(StashError::Corruption("id counter is zero".into()));
            }
            next_id
        };

        let data_file_size = data_file.metadata()?.len();

        Ok(Self {
            description_file,
            data_file,
            id_file,
            next_id,
            slot_count: description_len / SLOT_SIZE,
            free_slots: BTreeSet::new(),
            data_file_size,
        })
    }

    /// Scan the description file and return every live description
    ///
    /// Slots with `live = 0` are recorded in the internal free-slot list.
    /// A live slot whose range points beyond the data file is corruption.
    pub fn initialize(&mut self, buffer: &mut StoreBuffer) -> Result<Vec<Description>> {
        let mut live = Vec::new();

        self.description_file.seek(SeekFrom::Start(0))?;
        for index in 0..self.slot_count {
            buffer.set_mode(BufferMode::Write);
            buffer.fill_from(&mut self.description_file, SLOT_SIZE as usize)?;
            buffer.set_mode(BufferMode::Read);

            let flag = buffer.get_u8()?;
            match flag {
                0 => {
                    self.free_slots.insert(index);
                }
                LIVE_FLAG => {
                    let id = buffer.get_u64()?;
                    let range = DataRange::new(buffer.get_u64()?, buffer.get_u64()?);
                    if range.length == 0 {
                        return Err(StashError::Corruption(format!(
                            "slot {} is live with a zero-length range",
                            index
                        )));
                    }
                    if range.end() > self.data_file_size {
                        return Err(StashError::Corruption(format!(
                            "slot {} references [{}, {}) beyond data file length {}",
                            index,
                            range.offset,
                            range.end(),
                            self.data_file_size
                        )));
                    }
                    live.push(Description::new(id, index, range));
                }
                other => {
                    return Err(StashError::Corruption(format!(
                        "slot {} has invalid live flag {}",
                        index, other
                    )));
                }
            }
        }
        buffer.set_mode(BufferMode::Write);

        debug!(
            live = live.len(),
            free_slots = self.free_slots.len(),
            next_id = self.next_id,
            "description file scanned"
        );
        Ok(live)
    }

    // =========================================================================
    // Description Slots
    // =========================================================================

    /// Write exactly one slot's bytes at `index * SLOT_SIZE`
    ///
    /// The buffer must hold exactly one staged slot.
    pub fn write_description(&mut self, index: SlotIndex, buffer: &mut StoreBuffer) -> Result<()> {
        let len = buffer.transferable_data();
        if len as u64 != SLOT_SIZE {
            return Err(StashError::Corruption(format!(
                "staged description is {} bytes, slot size is {}",
                len, SLOT_SIZE
            )));
        }
        self.description_file
            .seek(SeekFrom::Start(index * SLOT_SIZE))?;
        let bytes = buffer.get_bytes(len)?;
        self.description_file.write_all(bytes)?;
        Ok(())
    }

    /// Overwrite the live byte of a slot with 0; the rest of the slot
    /// remains stale
    pub fn clear_description(&mut self, index: SlotIndex) -> Result<()> {
        if index >= self.slot_count {
            return Err(StashError::Corruption(format!(
                "slot {} cleared but only {} slots exist",
                index, self.slot_count
            )));
        }
        self.description_file
            .seek(SeekFrom::Start(index * SLOT_SIZE))?;
        self.description_file.write_all(&[0u8])?;
        Ok(())
    }

    /// Record a slot index as reusable
    pub fn add_empty_index(&mut self, index: SlotIndex) {
        self.free_slots.insert(index);
    }

    /// Allocate a fresh id and a slot for a new item at `range`
    ///
    /// The id counter is bumped and persisted first; the slot comes from
    /// the free-slot list if one is available, otherwise the slot array
    /// grows by one.
    pub fn create_description(&mut self, range: DataRange) -> Result<Description> {
        let id = self.allocate_id()?;
        let index = match self.free_slots.pop_first() {
            Some(index) => index,
            None => {
                let index = self.slot_count;
                self.slot_count += 1;
                index
            }
        };
        Ok(Description::new(id, index, range))
    }

    /// Truncate the description file after the highest live slot and drop
    /// now-out-of-range indices from the free-slot list
    pub fn trim_description_file_size(&mut self) -> Result<()> {
        let mut new_count = self.slot_count;
        while new_count > 0 && self.free_slots.contains(&(new_count - 1)) {
            new_count -= 1;
        }
        if new_count == self.slot_count {
            return Ok(());
        }
        let _ = self.free_slots.split_off(&new_count);
        self.description_file.set_len(new_count * SLOT_SIZE)?;
        debug!(
            from = self.slot_count,
            to = new_count,
            "description file trimmed"
        );
        self.slot_count = new_count;
        Ok(())
    }

    // =========================================================================
    // Data File
    // =========================================================================

    /// Read `range.length` bytes at `range.offset` into the buffer
    ///
    /// The buffer is switched to `Write` mode and filled; the caller flips
    /// it to `Read` to decode.
    pub fn read_data(&mut self, range: DataRange, buffer: &mut StoreBuffer) -> Result<()> {
        if range.end() > self.data_file_size {
            return Err(StashError::Corruption(format!(
                "read of [{}, {}) beyond data file length {}",
                range.offset,
                range.end(),
                self.data_file_size
            )));
        }
        buffer.set_mode(BufferMode::Write);
        self.data_file.seek(SeekFrom::Start(range.offset))?;
        buffer.fill_from(&mut self.data_file, range.length as usize)?;
        Ok(())
    }

    /// Write the buffer's pending bytes at `range.offset`
    ///
    /// The pending byte count must equal `range.length` exactly.
    pub fn write_data(&mut self, range: DataRange, buffer: &mut StoreBuffer) -> Result<()> {
        let len = buffer.transferable_data();
        if len as u64 != range.length {
            return Err(StashError::Corruption(format!(
                "{} bytes staged for a range of length {}",
                len, range.length
            )));
        }
        self.data_file.seek(SeekFrom::Start(range.offset))?;
        let bytes = buffer.get_bytes(len)?;
        self.data_file.write_all(bytes)?;
        Ok(())
    }

    /// Current data file length
    pub fn total_space(&self) -> u64 {
        self.data_file_size
    }

    /// Grow or truncate the data file; used by the location manager
    pub fn set_data_file_length(&mut self, len: u64) -> Result<()> {
        self.data_file.set_len(len)?;
        self.data_file_size = len;
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Flush everything to stable storage
    pub fn close(&mut self) -> Result<()> {
        self.description_file.sync_all()?;
        self.data_file.sync_all()?;
        self.id_file.sync_all()?;
        Ok(())
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Id allocation protocol: use the counter, bump it, persist the bump
    fn allocate_id(&mut self) -> Result<StoreId> {
        let id = self.next_id;
        self.next_id += 1;
        self.id_file.seek(SeekFrom::Start(0))?;
        self.id_file.write_all(&self.next_id.to_be_bytes())?;
        Ok(id)
    }
}

fn open_store_file(path: &Path) -> Result<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?)
}
