//! Tests for the double-buffered write cache
//!
//! These tests verify:
//! - Synchronous and asynchronous draining into an inner file
//! - Ordering under buffer-full back-pressure
//! - flush(wait) draining everything buffered
//! - The seek-to-end mode appending while the handle moves

use std::sync::Arc;

use parking_lot::Mutex;
use pvfs::cache::WriteCache;
use pvfs::vfs::FileHandle;
use pvfs::Vfs;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_cache_file(name: &str) -> (TempDir, Arc<Mutex<FileHandle>>) {
    let temp_dir = TempDir::new().unwrap();
    let vfs = Vfs::create(&temp_dir.path().join("cache.pvfs")).unwrap();
    let handle = vfs.create_inner(name).unwrap();
    (temp_dir, Arc::new(Mutex::new(handle)))
}

fn contents(file: &Mutex<FileHandle>) -> Vec<u8> {
    let mut handle = file.lock();
    let mut out = vec![0u8; handle.size() as usize];
    handle.seek_to(0).unwrap();
    let mut done = 0;
    while done < out.len() {
        let n = handle.read_bytes(&mut out[done..]).unwrap();
        assert!(n > 0);
        done += n;
    }
    out
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

// =============================================================================
// Synchronous Mode
// =============================================================================

#[test]
fn test_sync_drain_round_trip() {
    let (_temp, file) = setup_cache_file("sync");
    let mut cache = WriteCache::new(64, false, true);
    cache.set_file(Arc::clone(&file));

    let bytes = pattern(1000);
    for chunk in bytes.chunks(10) {
        cache.write(chunk).unwrap();
    }
    assert!(cache.flush(true));

    assert_eq!(contents(&file), bytes);
}

#[test]
fn test_tell_tracks_buffered_bytes() {
    let (_temp, file) = setup_cache_file("tell");
    let mut cache = WriteCache::new(64, false, true);
    cache.set_file(Arc::clone(&file));

    cache.write(&[1, 2, 3]).unwrap();
    assert_eq!(cache.tell(), 3);
    assert_eq!(cache.space_before_flush(), 61);

    cache.flush(true);
    assert_eq!(cache.tell(), 0);
    assert_eq!(contents(&file), vec![1, 2, 3]);
}

// =============================================================================
// Asynchronous Mode
// =============================================================================

#[test]
fn test_async_drain_round_trip() {
    let (_temp, file) = setup_cache_file("async");
    let mut cache = WriteCache::new(64, true, true);
    cache.set_file(Arc::clone(&file));

    let bytes = pattern(4000);
    for chunk in bytes.chunks(16) {
        cache.write(chunk).unwrap();
    }
    assert!(cache.flush(true));
    assert!(!cache.is_writing());

    assert_eq!(contents(&file), bytes);
}

#[test]
fn test_async_backpressure_preserves_order() {
    let (_temp, file) = setup_cache_file("pressure");
    // A tiny cache so the producer constantly laps the worker
    let mut cache = WriteCache::new(32, true, true);
    cache.set_file(Arc::clone(&file));

    let mut expected = Vec::new();
    for i in 0..5000u32 {
        let value = i.to_le_bytes();
        expected.extend_from_slice(&value);
        cache.write(&value).unwrap();
    }
    cache.flush(true);

    assert_eq!(contents(&file), expected);
}

#[test]
fn test_oversized_value_is_rejected() {
    let (_temp, file) = setup_cache_file("oversized");
    let mut cache = WriteCache::new(16, true, true);
    cache.set_file(Arc::clone(&file));

    // Twice the flush size can never fit in a buffer
    assert!(cache.write(&[0u8; 40]).is_err());
    // The cache still works for reasonable values afterwards
    cache.write(&[1, 2, 3, 4]).unwrap();
    cache.flush(true);
    assert_eq!(contents(&file), vec![1, 2, 3, 4]);
}

#[test]
fn test_seek_to_end_appends_despite_reads() {
    let (_temp, file) = setup_cache_file("append");
    let mut cache = WriteCache::new(64, false, true);
    cache.set_file(Arc::clone(&file));

    cache.write(b"first half ").unwrap();
    cache.flush(true);

    // A reader repositions the handle between drains
    {
        let mut handle = file.lock();
        handle.seek_to(0).unwrap();
        let mut buf = [0u8; 5];
        handle.read_bytes(&mut buf).unwrap();
    }

    cache.write(b"second half").unwrap();
    cache.flush(true);

    assert_eq!(contents(&file), b"first half second half".to_vec());
}
