//! Files Module
//!
//! Bytes-on-disk layer. A store owns three files inside
//! `base_path/store_name/`, all managed here:
//!
//! - `<name>.def` — array of fixed-size description slots
//! - `<name>.daf` — raw payload bytes, addressed by `(offset, length)`
//! - `<name>.id`  — a single big-endian `u64`: the next id to allocate
//!
//! ## Description Slot Format
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Slot (25 bytes, repeated)                    │
//! │ ┌─────────┬──────────┬───────────┬─────────┐ │
//! │ │ live(1) │ id (8)   │ offset(8) │ len (8) │ │
//! │ └─────────┴──────────┴───────────┴─────────┘ │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! The description file length is always an exact multiple of the slot
//! size; a slot's position in the file is its `SlotIndex`. All integers
//! are big-endian.

mod description;
mod manager;

pub use description::{DataRange, Description, SlotIndex, StoreId, LIVE_FLAG, SLOT_SIZE};
pub use manager::FileManager;
