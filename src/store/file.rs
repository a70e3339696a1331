//! Channel file pair
//!
//! `IndexedDataFile` ties one channel's `.index`/`.idat` pair to its cache:
//! create/open orchestration, header maintenance, and the public append and
//! read API. Closing a modified channel writes the final NaN stamp, drains
//! the caches, and rewrites the header with the real time range.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{PvfsError, Result};
use crate::time::HighTime;
use crate::vfs::{FileHandle, Vfs};

use super::cache::IndexedFileCache;
use super::header::IndexHeader;
use super::{DATA_EXTENSION, INDEX_EXTENSION};

pub struct IndexedDataFile {
    name: String,
    index_file: Arc<Mutex<FileHandle>>,
    data_file: Arc<Mutex<FileHandle>>,
    cache: IndexedFileCache,
    header: IndexHeader,
    closed: bool,
}

impl IndexedDataFile {
    // =========================================================================
    // Creation / Opening
    // =========================================================================

    /// Create the channel's file pair and write an initial header. Fails
    /// when the channel already exists unless `overwrite` is set.
    pub fn create(vfs: &Vfs, name: &str, config: &Config) -> Result<()> {
        let index_name = format!("{name}{INDEX_EXTENSION}");
        let data_name = format!("{name}{DATA_EXTENSION}");

        if vfs.has_file(&index_name) && !config.overwrite {
            return Err(PvfsError::ArgNull("channel already exists"));
        }

        let mut index = open_or_create(vfs, &index_name)?;
        let mut data = open_or_create(vfs, &data_name)?;

        IndexHeader::reserve(&mut index)?;
        let header = IndexHeader {
            datarate: config.datarate,
            data_type: config.data_type,
            interval_seconds: config.time_stamp_interval_secs,
            ..Default::default()
        };
        header.write(&mut index)?;
        data.flush(false)?;

        tracing::debug!(channel = name, "created channel");
        Ok(())
    }

    /// Open an existing channel. The header drives the cache setup: data
    /// rate, stamp interval, time range, and the zero time all come from
    /// the file.
    pub fn open(vfs: &Vfs, name: &str, config: &Config) -> Result<Self> {
        let index_name = format!("{name}{INDEX_EXTENSION}");
        let data_name = format!("{name}{DATA_EXTENSION}");

        let index_file = Arc::new(Mutex::new(vfs.open_inner(&index_name)?));
        let data_file = Arc::new(Mutex::new(vfs.open_inner(&data_name)?));

        let mut cache = IndexedFileCache::new(
            Arc::clone(&index_file),
            Arc::clone(&data_file),
            config.cache_size,
            config.async_cache,
            !config.overwrite,
        );

        let header = IndexHeader::read(&mut index_file.lock())?;
        cache.set_zero_time(header.start_time);
        cache.set_time_range(header.start_time, header.end_time);
        cache.set_datarate(header.datarate);
        cache.set_time_stamp_interval(HighTime::new(header.interval_seconds as i64, 0.0));
        cache.read_index()?;

        Ok(IndexedDataFile {
            name: name.to_string(),
            index_file,
            data_file,
            cache,
            header,
            closed: false,
        })
    }

    /// Open the channel, creating it first when absent.
    pub fn open_or_create(vfs: &Vfs, name: &str, config: &Config) -> Result<Self> {
        let index_name = format!("{name}{INDEX_EXTENSION}");
        if !vfs.has_file(&index_name) || config.overwrite {
            Self::create(vfs, name, config)?;
        }
        Self::open(vfs, name, config)
    }

    /// Tombstone both inner files of a channel.
    pub fn delete_channel(vfs: &Vfs, name: &str) -> Result<()> {
        vfs.delete_inner(&format!("{name}{INDEX_EXTENSION}"))?;
        vfs.delete_inner(&format!("{name}{DATA_EXTENSION}"))
    }

    /// Channel names present in an archive: every base name with both an
    /// index and a data file.
    pub fn channel_names(vfs: &Vfs) -> Result<Vec<String>> {
        let files = vfs.list()?;
        let mut names = Vec::new();
        for file in &files {
            if let Some(base) = file.strip_suffix(INDEX_EXTENSION) {
                let data_name = format!("{base}{DATA_EXTENSION}");
                if files.iter().any(|f| f == &data_name) {
                    names.push(base.to_string());
                }
            }
        }
        Ok(names)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn header(&self) -> IndexHeader {
        self.header
    }

    pub fn datarate(&self) -> f32 {
        self.cache.datarate()
    }

    pub fn start_time(&self) -> HighTime {
        self.cache.start_time().unwrap_or(self.header.start_time)
    }

    pub fn end_time(&self) -> HighTime {
        self.cache.end_time()
    }

    pub fn is_modified(&self) -> bool {
        self.cache.is_modified()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    pub fn set_datarate(&mut self, rate: f32) {
        self.cache.set_datarate(rate);
        self.header.datarate = self.cache.datarate();
    }

    pub fn set_time_stamp_interval(&mut self, seconds: u32) {
        self.header.interval_seconds = seconds;
        self.cache
            .set_time_stamp_interval(HighTime::new(seconds as i64, 0.0));
    }

    pub fn set_zero_time(&mut self, zero: HighTime) {
        self.cache.set_zero_time(zero);
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Append one sample at `time`.
    pub fn append(&self, time: HighTime, value: f64) -> Result<()> {
        self.cache.append(time, value, false)
    }

    /// Append one sample without the gap and NaN heuristics; for batch
    /// loaders feeding contiguous data.
    pub fn append_consolidated(&self, time: HighTime, value: f64) -> Result<()> {
        self.cache.append(time, value, true)
    }

    /// Append a contiguous block of samples starting at `start_time`.
    pub fn append_block(&self, start_time: HighTime, values: &[f32]) -> Result<()> {
        self.cache.append_block(start_time, values)
    }

    /// Drain the caches and rewrite the header with the current time
    /// range. `synchronous` waits for the background writes to land.
    pub fn flush(&mut self, synchronous: bool) -> Result<()> {
        self.cache.flush(synchronous);

        if let Some(start) = self.cache.start_time() {
            self.header.start_time = start;
        }
        if let Some(last) = self.cache.last_index_time_stamp() {
            self.header.end_time = last;
        }
        self.header.write(&mut self.index_file.lock())
    }

    /// Finalize and close the channel. On a modified channel this writes
    /// the closing NaN stamp, waits out both caches, and persists the
    /// header.
    pub fn close(mut self) -> Result<()> {
        self.do_close()
    }

    fn do_close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.cache.is_modified() {
            let last = self.cache.finalize_time_stamps()?;
            self.cache.flush(true);

            self.header.end_time = last;
            if let Some(start) = self.cache.start_time() {
                self.header.start_time = start;
            }
            self.header.write(&mut self.index_file.lock())?;
        }
        Ok(())
    }

    // =========================================================================
    // Reading
    // =========================================================================

    /// Offset of the index record covering `time`, or -1 when outside the
    /// file's range.
    pub fn find(&self, time: HighTime) -> i64 {
        self.cache.find(time)
    }

    /// Decimated range read; see [`IndexedFileCache::get_data`].
    pub fn get_data(
        &self,
        start: HighTime,
        end: HighTime,
        t_out: &mut Vec<f64>,
        y_out: &mut Vec<f32>,
        max_points: i64,
    ) -> Result<()> {
        self.cache.get_data(start, end, t_out, y_out, max_points)
    }

    /// Position the sequential cursor; then call `get_next_point` or
    /// `get_next_chunk`.
    pub fn start(&self, time: HighTime) -> bool {
        self.cache.start(time)
    }

    pub fn get_next_point(&self) -> Result<Option<(HighTime, f32)>> {
        self.cache.get_next_point()
    }

    pub fn get_next_chunk(&self, out: &mut Vec<f32>) -> Result<Option<(HighTime, HighTime)>> {
        self.cache.get_next_chunk(out)
    }

    /// Entries in the in-memory index.
    pub fn index_len(&self) -> usize {
        self.cache.index_len()
    }
}

impl Drop for IndexedDataFile {
    fn drop(&mut self) {
        if let Err(e) = self.do_close() {
            tracing::error!(channel = %self.name, error = %e, "close failed");
        }
    }
}

/// Open the inner file, creating it when missing.
fn open_or_create(vfs: &Vfs, name: &str) -> Result<FileHandle> {
    match vfs.open_inner(name) {
        Ok(handle) => Ok(handle),
        Err(PvfsError::FileNotOpened) => vfs.create_inner(name),
        Err(e) => Err(e),
    }
}
