//! # StashDB
//!
//! An embedded, single-process, persistent object store with:
//! - Opaque monotonic `u64` identifiers, never reused
//! - Caller-supplied value (de)serialization through a shared buffer
//! - First-fit free-space management with merge and tail trimming
//! - Recovery of the full index from the description file on open
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                               │
//! │        (façade: store / get / update / delete / query)      │
//! └───────┬──────────────────┬──────────────────┬───────────────┘
//!         │                  │                  │
//!         ▼                  ▼                  ▼
//!  ┌─────────────┐   ┌───────────────┐   ┌─────────────┐
//!  │ ItemManager │   │ LocationMgr   │   │ StoreBuffer │
//!  │  (id index) │   │ (free ranges) │   │  (staging)  │
//!  └─────────────┘   └───────┬───────┘   └──────┬──────┘
//!                            │                  │
//!                            ▼                  ▼
//!                    ┌─────────────────────────────┐
//!                    │         FileManager         │
//!                    │  (.def / .daf / .id files)  │
//!                    └─────────────────────────────┘
//! ```
//!
//! A store is single-threaded; see the `store` module docs for the write
//! ordering that bounds what a crash can leave behind.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod buffer;
pub mod files;
pub mod items;
pub mod space;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, StashError};
pub use config::Config;
pub use buffer::{BufferMode, StoreBuffer};
pub use files::{DataRange, Description, SlotIndex, StoreId};
pub use items::Item;
pub use store::{Store, StoreQuery};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of StashDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
