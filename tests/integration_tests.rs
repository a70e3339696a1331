//! Integration tests spanning the archive and the sample store
//!
//! Component-level coverage lives in the dedicated suites:
//! - Archive and file table: tests/archive_tests.rs
//! - Inner-file I/O: tests/file_io_tests.rs
//! - Write cache: tests/write_cache_tests.rs
//! - Sample store: tests/indexed_store_tests.rs

use std::sync::Arc;

use pvfs::store::ALL_POINTS;
use pvfs::{Config, HighTime, IndexedDataFile, Vfs};
use tempfile::TempDir;

// =============================================================================
// Config Tests
// =============================================================================

#[test]
fn test_config_default() {
    let config = Config::default();

    assert_eq!(config.cache_size, 40_000);
    assert_eq!(config.time_stamp_interval_secs, 10);
    assert_eq!(config.datarate, 1.0);
    assert!(!config.async_cache);
    assert!(!config.overwrite);
}

#[test]
fn test_config_builder() {
    let config = Config::builder()
        .cache_size(8192)
        .async_cache(true)
        .time_stamp_interval_secs(60)
        .datarate(512.0)
        .data_type(7)
        .overwrite(true)
        .build();

    assert_eq!(config.cache_size, 8192);
    assert!(config.async_cache);
    assert_eq!(config.time_stamp_interval_secs, 60);
    assert_eq!(config.datarate, 512.0);
    assert_eq!(config.data_type, 7);
    assert!(config.overwrite);
}

// =============================================================================
// End-to-End Integration Tests
// =============================================================================

#[test]
fn test_full_recording_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("session.pvfs");
    let rate = 500i64;
    let seconds = 20i64;

    // Phase 1: record two channels from separate producer threads
    {
        let vfs = Vfs::create(&path).unwrap();
        let config = Config::builder()
            .datarate(rate as f32)
            .time_stamp_interval_secs(2)
            .async_cache(true)
            .build();

        let eeg = Arc::new(IndexedDataFile::open_or_create(&vfs, "eeg", &config).unwrap());
        let emg = Arc::new(IndexedDataFile::open_or_create(&vfs, "emg", &config).unwrap());

        std::thread::scope(|scope| {
            for (channel, scale) in [(Arc::clone(&eeg), 1.0f64), (Arc::clone(&emg), -2.0)] {
                scope.spawn(move || {
                    for k in 0..rate * seconds {
                        let time = HighTime::new(k / rate, (k % rate) as f64 / rate as f64);
                        channel.append(time, k as f64 * scale).unwrap();
                    }
                });
            }
        });

        Arc::into_inner(eeg).unwrap().close().unwrap();
        Arc::into_inner(emg).unwrap().close().unwrap();
    }

    // Phase 2: reopen and verify everything persisted
    {
        let vfs = Vfs::open(&path).unwrap();
        let mut names = IndexedDataFile::channel_names(&vfs).unwrap();
        names.sort();
        assert_eq!(names, vec!["eeg", "emg"]);

        let config = Config::default();
        for (name, scale) in [("eeg", 1.0f64), ("emg", -2.0)] {
            let channel = IndexedDataFile::open(&vfs, name, &config).unwrap();
            assert_eq!(channel.datarate(), rate as f32);

            let mut times = Vec::new();
            let mut values = Vec::new();
            channel
                .get_data(
                    HighTime::ZERO,
                    HighTime::new(seconds + 1, 0.0),
                    &mut times,
                    &mut values,
                    ALL_POINTS,
                )
                .unwrap();

            assert_eq!(values.len() as i64, rate * seconds, "channel {name}");
            for (k, v) in values.iter().enumerate() {
                assert_eq!(*v, (k as f64 * scale) as f32, "channel {name} sample {k}");
            }
        }
    }
}

#[test]
fn test_channels_and_plain_files_coexist() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("mixed.pvfs");

    let vfs = Vfs::create(&path).unwrap();

    // A plain inner file next to a channel pair
    let mut notes = vfs.create_inner("notes.txt").unwrap();
    notes.write_bytes(b"subject 42, day 3").unwrap();
    notes.flush(false).unwrap();
    drop(notes);

    let config = Config::builder().datarate(10.0).build();
    let channel = IndexedDataFile::open_or_create(&vfs, "temp", &config).unwrap();
    for k in 0..100i64 {
        let time = HighTime::new(k / 10, (k % 10) as f64 / 10.0);
        channel.append(time, 36.5 + (k % 10) as f64 * 0.01).unwrap();
    }
    channel.close().unwrap();

    let mut names = vfs.list().unwrap();
    names.sort();
    assert_eq!(names, vec!["notes.txt", "temp.idat", "temp.index"]);
    assert_eq!(IndexedDataFile::channel_names(&vfs).unwrap(), vec!["temp"]);

    let mut notes = vfs.open_inner("notes.txt").unwrap();
    let mut buf = [0u8; 32];
    let n = notes.read_bytes(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"subject 42, day 3");
}

#[test]
fn test_flush_makes_live_data_readable() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("live.pvfs");

    let vfs = Vfs::create(&path).unwrap();
    let config = Config::builder()
        .datarate(100.0)
        .async_cache(true)
        .build();

    let mut channel = IndexedDataFile::open_or_create(&vfs, "live", &config).unwrap();
    for k in 0..1000i64 {
        let time = HighTime::new(k / 100, (k % 100) as f64 / 100.0);
        channel.append(time, k as f64).unwrap();
    }
    channel.flush(true).unwrap();

    // The header now reflects the acquisition in progress
    assert!(channel.is_modified());
    assert!(channel.header().end_time > channel.header().start_time);

    channel.close().unwrap();
}
