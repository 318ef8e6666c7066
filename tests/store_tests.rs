//! Tests for Store
//!
//! These tests verify:
//! - Round-trips, id uniqueness, id persistence across reopen
//! - Delete/update semantics and space reclamation
//! - Recovery from the description file
//! - organize(): merge, description trim, data file trim
//! - Closed-store behavior
//! - The normative on-disk slot layout (parsed byte by byte)

use std::path::Path;

use stashdb::files::SLOT_SIZE;
use stashdb::{Config, StashError, Store, StoreBuffer};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn config(base: &Path) -> Config {
    Config::new("teststore", base)
}

/// Store of u64 values encoded as 8 big-endian bytes
fn open_u64_store(config: Config) -> Store<u64> {
    Store::open(
        config,
        |value: &u64, buffer: &mut StoreBuffer| buffer.put_u64(*value),
        |buffer: &mut StoreBuffer| buffer.get_u64(),
    )
    .unwrap()
}

/// Store of raw byte vectors; a payload is the bytes themselves
fn open_bytes_store(config: Config) -> Store<Vec<u8>> {
    Store::open(
        config,
        |value: &Vec<u8>, buffer: &mut StoreBuffer| buffer.put_bytes(value),
        |buffer: &mut StoreBuffer| {
            let len = buffer.transferable_data();
            Ok(buffer.get_bytes(len)?.to_vec())
        },
    )
    .unwrap()
}

/// Parse the description file into `(live, id, offset, length)` slots
fn read_slots(config: &Config) -> Vec<(u8, u64, u64, u64)> {
    let bytes = std::fs::read(config.description_file_path()).unwrap();
    assert_eq!(bytes.len() % SLOT_SIZE as usize, 0);
    bytes
        .chunks(SLOT_SIZE as usize)
        .map(|slot| {
            (
                slot[0],
                u64::from_be_bytes(slot[1..9].try_into().unwrap()),
                u64::from_be_bytes(slot[9..17].try_into().unwrap()),
                u64::from_be_bytes(slot[17..25].try_into().unwrap()),
            )
        })
        .collect()
}

fn assert_space_accounting<T: Clone>(store: &Store<T>) {
    assert_eq!(store.used_space() + store.free_space(), store.total_space());
}

// =============================================================================
// Round-Trip Tests (P1, P2)
// =============================================================================

#[test]
fn test_store_and_get_round_trip() {
    let temp = TempDir::new().unwrap();
    let mut store = open_u64_store(config(temp.path()));

    let item = store.store(0xFEED).unwrap();
    assert_eq!(*store.get(item.id()).unwrap().content(), 0xFEED);
    assert_space_accounting(&store);
}

#[test]
fn test_ids_are_unique_and_monotonic() {
    let temp = TempDir::new().unwrap();
    let mut store = open_u64_store(config(temp.path()));

    let mut previous = 0;
    for value in 0..100u64 {
        let item = store.store(value).unwrap();
        assert!(item.id() > previous);
        previous = item.id();
    }
}

#[test]
fn test_store_returns_the_stored_content() {
    let temp = TempDir::new().unwrap();
    let mut store = open_bytes_store(config(temp.path()));

    let item = store.store(b"abc".to_vec()).unwrap();
    assert_eq!(item.content(), &b"abc".to_vec());
}

#[test]
fn test_empty_payload_is_invalid_argument() {
    let temp = TempDir::new().unwrap();
    let mut store = open_bytes_store(config(temp.path()));

    let err = store.store(Vec::new()).unwrap_err();
    assert!(matches!(err, StashError::InvalidArgument(_)));
}

// =============================================================================
// Failed-Callback Tests
// =============================================================================

/// Value the encoder refuses, but only after writing half the payload
const POISON: u64 = 0xBAD;

/// Store whose encoder writes the high half, then errors on POISON
fn open_fallible_store(config: Config) -> Store<u64> {
    Store::open(
        config,
        |value: &u64, buffer: &mut StoreBuffer| {
            buffer.put_u32((*value >> 32) as u32)?;
            if *value == POISON {
                return Err(StashError::InvalidArgument("unencodable value".into()));
            }
            buffer.put_u32(*value as u32)
        },
        |buffer: &mut StoreBuffer| {
            let high = buffer.get_u32()? as u64;
            let low = buffer.get_u32()? as u64;
            Ok((high << 32) | low)
        },
    )
    .unwrap()
}

#[test]
fn test_failed_encode_does_not_leak_into_next_store() {
    let temp = TempDir::new().unwrap();
    let mut store = open_fallible_store(config(temp.path()));

    let first = store.store(0x11).unwrap().id();
    let err = store.store(POISON).unwrap_err();
    assert!(matches!(err, StashError::InvalidArgument(_)));

    // The partial bytes from the failed encode must be gone: the next
    // payload is exactly 8 bytes and round-trips
    let second = store.store(0x22).unwrap().id();
    assert_eq!(*store.get(second).unwrap().content(), 0x22);
    assert_eq!(*store.get(first).unwrap().content(), 0x11);
    assert_eq!(store.used_space(), 16);
    assert_space_accounting(&store);
}

#[test]
fn test_failed_encode_leaves_update_target_intact() {
    let temp = TempDir::new().unwrap();
    let mut store = open_fallible_store(config(temp.path()));

    let id = store.store(0x55).unwrap().id();
    let err = store.update(id, POISON).unwrap_err();
    assert!(matches!(err, StashError::InvalidArgument(_)));

    assert_eq!(*store.get(id).unwrap().content(), 0x55);
    store.update(id, 0x66).unwrap();
    assert_eq!(*store.get(id).unwrap().content(), 0x66);
    assert_space_accounting(&store);
}

// =============================================================================
// Scenario 1: Empty Round-Trip With Reopen
// =============================================================================

#[test]
fn test_empty_store_round_trip_and_reopen() {
    let temp = TempDir::new().unwrap();

    {
        let mut store = open_u64_store(config(temp.path()));
        assert_eq!(store.store(0x11).unwrap().id(), 1);
        assert_eq!(store.store(0x22).unwrap().id(), 2);
        assert_eq!(*store.get(1).unwrap().content(), 0x11);
        assert_eq!(*store.get(2).unwrap().content(), 0x22);
        store.close().unwrap();
    }

    let mut store = open_u64_store(config(temp.path()));
    assert_eq!(*store.get(1).unwrap().content(), 0x11);
    assert_eq!(*store.get(2).unwrap().content(), 0x22);
    assert_space_accounting(&store);
}

// =============================================================================
// Scenario 2: Delete Reclaim (First-Fit)
// =============================================================================

#[test]
fn test_delete_frees_space_and_new_store_reuses_offset() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());
    let mut store = open_u64_store(cfg.clone());

    store.store(0x11).unwrap();
    store.store(0x22).unwrap();
    store.delete(1).unwrap();
    assert!(store.free_space() >= 8);

    let item = store.store(0x33).unwrap();
    assert_eq!(item.id(), 3);
    assert_space_accounting(&store);
    store.close().unwrap();

    // Id 3 landed on id 1's former range and reused its slot
    let slots = read_slots(&cfg);
    assert_eq!(slots[0], (1, 3, 0, 8));
    assert_eq!(slots[1], (1, 2, 8, 8));
}

// =============================================================================
// Scenario 3: Update Grows (P7)
// =============================================================================

#[test]
fn test_update_moves_payload_and_keeps_slot() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());
    let mut store = open_bytes_store(cfg.clone());

    let id = store.store(vec![0x11; 4]).unwrap().id();
    let free_before = store.free_space();

    store.update(id, vec![0x22; 12]).unwrap();

    assert!(store.contains(id));
    assert_eq!(store.get(id).unwrap().content(), &vec![0x22; 12]);
    // Old 4-byte range at offset 0 is free again; the payload moved
    assert_eq!(store.free_space(), free_before - 12 + 4);
    assert_space_accounting(&store);
    store.close().unwrap();

    let slots = read_slots(&cfg);
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0], (1, id, 4, 12));
}

#[test]
fn test_updated_value_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());

    let id = {
        let mut store = open_bytes_store(cfg.clone());
        let id = store.store(b"old".to_vec()).unwrap().id();
        store.update(id, b"new value".to_vec()).unwrap();
        store.close().unwrap();
        id
    };

    let mut store = open_bytes_store(cfg);
    assert_eq!(store.get(id).unwrap().content(), &b"new value".to_vec());
}

#[test]
fn test_update_unknown_id_is_not_found() {
    let temp = TempDir::new().unwrap();
    let mut store = open_u64_store(config(temp.path()));

    let err = store.update(99, 0).unwrap_err();
    assert!(matches!(err, StashError::NotFound(99)));
}

// =============================================================================
// Scenario 4: Recovery Skips Cleared Slots (P3, P6)
// =============================================================================

#[test]
fn test_reopen_skips_deleted_items() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());

    let (first, second, third) = {
        let mut store = open_u64_store(cfg.clone());
        let first = store.store(0xA).unwrap().id();
        let second = store.store(0xB).unwrap().id();
        let third = store.store(0xC).unwrap().id();
        store.delete(second).unwrap();
        store.close().unwrap();
        (first, second, third)
    };

    let mut store = open_u64_store(cfg);
    assert!(store.contains(first));
    assert!(!store.contains(second));
    assert!(store.contains(third));
    assert_eq!(*store.get(first).unwrap().content(), 0xA);
    assert_eq!(*store.get(third).unwrap().content(), 0xC);
    assert!(matches!(
        store.get(second).unwrap_err(),
        StashError::NotFound(_)
    ));
}

#[test]
fn test_delete_then_contains_is_false() {
    let temp = TempDir::new().unwrap();
    let mut store = open_u64_store(config(temp.path()));

    let id = store.store(0x42).unwrap().id();
    store.delete(id).unwrap();

    assert!(!store.contains(id));
    assert!(matches!(store.get(id).unwrap_err(), StashError::NotFound(_)));
    assert!(matches!(
        store.delete(id).unwrap_err(),
        StashError::NotFound(_)
    ));
    assert_space_accounting(&store);
}

// =============================================================================
// Scenario 5: Organize Trims (P5)
// =============================================================================

#[test]
fn test_organize_trims_free_tail() {
    let temp = TempDir::new().unwrap();
    let mut store = open_u64_store(config(temp.path()));

    store.store(0x11).unwrap();
    let highest = store.store(0x22).unwrap().id();
    store.delete(highest).unwrap();

    let total_before = store.total_space();
    store.organize().unwrap();

    assert!(store.total_space() <= total_before - 8);
    assert_space_accounting(&store);
}

#[test]
fn test_organize_restores_tight_file_lengths() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());
    let mut store = open_u64_store(cfg.clone());

    let a = store.store(0x1).unwrap().id();
    let b = store.store(0x2).unwrap().id();
    let c = store.store(0x3).unwrap().id();
    store.delete(b).unwrap();
    store.delete(c).unwrap();
    store.organize().unwrap();

    // One live item left in slot 0, occupying [0, 8)
    assert_eq!(store.total_space(), 8);
    assert_eq!(store.free_space(), 0);
    assert!(store.contains(a));
    store.close().unwrap();

    let description_len = std::fs::metadata(cfg.description_file_path()).unwrap().len();
    assert_eq!(description_len, SLOT_SIZE);
    let data_len = std::fs::metadata(cfg.data_file_path()).unwrap().len();
    assert_eq!(data_len, 8);
}

#[test]
fn test_organize_on_empty_store_truncates_to_zero() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());
    let mut store = open_u64_store(cfg.clone());

    let id = store.store(0x11).unwrap().id();
    store.delete(id).unwrap();
    store.organize().unwrap();

    assert_eq!(store.total_space(), 0);
    assert_eq!(store.free_space(), 0);
    store.close().unwrap();

    assert_eq!(std::fs::metadata(cfg.description_file_path()).unwrap().len(), 0);
    assert_eq!(std::fs::metadata(cfg.data_file_path()).unwrap().len(), 0);
}

#[test]
fn test_organize_never_moves_live_data() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());
    let mut store = open_u64_store(cfg.clone());

    let keep = store.store(0xAA).unwrap().id();
    let victim = store.store(0xBB).unwrap().id();
    store.delete(victim).unwrap();

    store.close().unwrap();
    let offset_before = read_slots(&cfg)[0].2;

    let mut store = open_u64_store(cfg.clone());
    store.organize().unwrap();
    assert_eq!(*store.get(keep).unwrap().content(), 0xAA);
    store.close().unwrap();

    assert_eq!(read_slots(&cfg)[0].2, offset_before);
}

// =============================================================================
// Scenario 6: Id Monotonicity Across Reopen
// =============================================================================

#[test]
fn test_ids_stay_monotonic_across_reopen() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());

    let first_id = {
        let mut store = open_u64_store(cfg.clone());
        let id = store.store(0x11).unwrap().id();
        store.delete(id).unwrap();
        store.close().unwrap();
        id
    };

    let mut store = open_u64_store(cfg);
    let second_id = store.store(0x22).unwrap().id();
    assert!(second_id > first_id);
}

// =============================================================================
// Cache Tests
// =============================================================================

#[test]
fn test_clear_cache_forces_reload_from_disk() {
    let temp = TempDir::new().unwrap();
    let mut store = open_u64_store(config(temp.path()));

    let id = store.store(0x77).unwrap().id();
    store.clear_cache();

    assert_eq!(*store.get(id).unwrap().content(), 0x77);
}

#[test]
fn test_reads_after_reopen_come_from_disk() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());

    {
        let mut store = open_bytes_store(cfg.clone());
        for i in 0..10u8 {
            store.store(vec![i; (i as usize % 3) + 1]).unwrap();
        }
        store.close().unwrap();
    }

    let mut store = open_bytes_store(cfg);
    for id in 1..=10u64 {
        let i = (id - 1) as u8;
        assert_eq!(store.get(id).unwrap().content(), &vec![i; (i as usize % 3) + 1]);
    }
    assert_eq!(store.item_count(), 10);
}

// =============================================================================
// Closed-Store Tests
// =============================================================================

#[test]
fn test_operations_after_close_fail_with_closed() {
    let temp = TempDir::new().unwrap();
    let mut store = open_u64_store(config(temp.path()));

    let id = store.store(0x11).unwrap().id();
    store.close().unwrap();

    assert!(store.is_closed());
    assert!(matches!(store.store(0x22).unwrap_err(), StashError::Closed));
    assert!(matches!(store.get(id).unwrap_err(), StashError::Closed));
    assert!(matches!(store.update(id, 0).unwrap_err(), StashError::Closed));
    assert!(matches!(store.delete(id).unwrap_err(), StashError::Closed));
    assert!(matches!(store.organize().unwrap_err(), StashError::Closed));
}

#[test]
fn test_close_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let mut store = open_u64_store(config(temp.path()));

    store.close().unwrap();
    store.close().unwrap();
}

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_invalid_configuration_is_rejected() {
    let temp = TempDir::new().unwrap();

    let cfg = Config::new("", temp.path());
    let err = Store::<u64>::open(
        cfg,
        |v: &u64, b: &mut StoreBuffer| b.put_u64(*v),
        |b: &mut StoreBuffer| b.get_u64(),
    )
    .unwrap_err();
    assert!(matches!(err, StashError::InvalidArgument(_)));

    let cfg = Config::builder("s", temp.path()).byte_buffer_size(0).build();
    let err = Store::<u64>::open(
        cfg,
        |v: &u64, b: &mut StoreBuffer| b.put_u64(*v),
        |b: &mut StoreBuffer| b.get_u64(),
    )
    .unwrap_err();
    assert!(matches!(err, StashError::InvalidArgument(_)));
}

#[test]
fn test_custom_suffixes_name_the_files() {
    let temp = TempDir::new().unwrap();
    let cfg = Config::builder("custom", temp.path())
        .data_file_suffix("data")
        .description_file_suffix("desc")
        .id_file_suffix("counter")
        .build();

    let mut store = open_u64_store(cfg.clone());
    store.store(0x11).unwrap();
    store.close().unwrap();

    let dir = cfg.store_directory();
    assert!(dir.join("custom.data").is_file());
    assert!(dir.join("custom.desc").is_file());
    assert!(dir.join("custom.counter").is_file());
}

// =============================================================================
// On-Disk Layout Tests
// =============================================================================

#[test]
fn test_slot_layout_is_normative() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());
    let mut store = open_u64_store(cfg.clone());

    store.store(0x1122334455667788).unwrap();
    store.close().unwrap();

    let bytes = std::fs::read(cfg.description_file_path()).unwrap();
    assert_eq!(bytes.len(), 25);
    assert_eq!(bytes[0], 1); // live
    assert_eq!(&bytes[1..9], &1u64.to_be_bytes()); // id
    assert_eq!(&bytes[9..17], &0u64.to_be_bytes()); // offset
    assert_eq!(&bytes[17..25], &8u64.to_be_bytes()); // length

    // Payload bytes land verbatim at the range's offset
    let data = std::fs::read(cfg.data_file_path()).unwrap();
    assert_eq!(&data[0..8], &0x1122334455667788u64.to_be_bytes());

    // Id file holds the next id to allocate
    let id = std::fs::read(cfg.id_file_path()).unwrap();
    assert_eq!(id, 2u64.to_be_bytes());
}

#[test]
fn test_cleared_slot_keeps_stale_bytes_but_dead_flag() {
    let temp = TempDir::new().unwrap();
    let cfg = config(temp.path());
    let mut store = open_u64_store(cfg.clone());

    store.store(0x11).unwrap();
    store.store(0x22).unwrap();
    store.delete(1).unwrap();
    store.close().unwrap();

    let slots = read_slots(&cfg);
    assert_eq!(slots[0].0, 0); // dead
    assert_eq!(slots[0].1, 1); // stale id bytes remain
    assert_eq!(slots[1], (1, 2, 8, 8));
}
