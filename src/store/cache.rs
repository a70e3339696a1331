//! Channel cache: the append state machine and all read paths
//!
//! One `IndexedFileCache` owns everything that moves samples in or out of a
//! channel's file pair. Writes go through two double-buffered write caches
//! (index and data stream); reads go through two read-through caches plus
//! the in-memory index scanned at open.
//!
//! ## Concurrency
//! - `write`: append state, held across one whole append
//! - `read`: sequential cursor and read caches, held across one range read
//! - `times`: the file's start/end range, shared by both sides and only
//!   ever taken while holding at most one of the other two
//!
//! Appends and reads therefore proceed concurrently; two appenders or two
//! readers serialize.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::{ReadCache, WriteCache};
use crate::crc32::Crc32;
use crate::error::{PvfsError, Result};
use crate::time::HighTime;
use crate::vfs::FileHandle;

use super::index::{self, IndexEntry};
use super::{
    ALL_POINTS, CHUNK_HEADER_BEFORE_DATA, CHUNK_HEADER_SIZE, INDEX_HEADER_SIZE, TIME_STAMP_SIZE,
    UNIQUE_MARKER_BYTE, UNIQUE_MARKER_LEN,
};

/// The file's known time range.
struct TimeRange {
    start: HighTime,
    /// Set by the first accepted sample, never cleared
    start_set: bool,
    end: HighTime,
}

/// Everything the append path mutates.
struct WriteState {
    index_cache: WriteCache,
    data_cache: WriteCache,
    /// Running size of the data file; the offset the next chunk lands at
    data_file_index: i64,
    previous_time: HighTime,
    /// When the next periodic stamp is due
    next_time_stamp: HighTime,
    previous_nan: bool,
    needs_first: bool,
    modified: bool,
    /// CRC over the samples of the chunk currently being written
    chunk_crc: Crc32,
    /// Suppresses the NaN log line while finalizing
    block_log: bool,
}

/// Everything the read paths mutate.
struct ReadState {
    index_read: ReadCache,
    data_read: ReadCache,
    entries: Vec<IndexEntry>,
    /// Cursor into `entries` for sequential traversal
    current: usize,
    /// Stamp opening the chunk about to be traversed
    next_time: HighTime,
    next_index: i64,
    num_points: u32,
    cur_point: u32,
    seq_delta: HighTime,
    cur_time: HighTime,
    data_seq_index: i64,
}

pub struct IndexedFileCache {
    index_file: Arc<Mutex<FileHandle>>,
    data_file: Arc<Mutex<FileHandle>>,
    write: Mutex<WriteState>,
    read: Mutex<ReadState>,
    times: Mutex<TimeRange>,
    // Set while opening, before the cache is shared; plain fields after.
    interval: HighTime,
    zero_time: HighTime,
    datarate: f32,
    /// `1 / datarate`
    delta: HighTime,
    /// Largest gap between samples that does not force a NaN stamp
    max_delta: HighTime,
}

impl IndexedFileCache {
    /// `seek_to_end` keeps appends at the end of the file even while reads
    /// reposition the handles; an overwriting writer passes `false`.
    pub fn new(
        index_file: Arc<Mutex<FileHandle>>,
        data_file: Arc<Mutex<FileHandle>>,
        cache_size: usize,
        asynchronous: bool,
        seek_to_end: bool,
    ) -> Self {
        let mut index_cache = WriteCache::new(cache_size, asynchronous, seek_to_end);
        let mut data_cache = WriteCache::new(cache_size, asynchronous, seek_to_end);
        index_cache.set_file(Arc::clone(&index_file));
        data_cache.set_file(Arc::clone(&data_file));

        // Chunks appended to an existing file continue at its current end.
        let data_file_index = data_file.lock().size();

        IndexedFileCache {
            index_file,
            data_file,
            write: Mutex::new(WriteState {
                index_cache,
                data_cache,
                data_file_index,
                previous_time: HighTime::new(-1, 0.0),
                next_time_stamp: HighTime::new(-1, 0.0),
                previous_nan: false,
                needs_first: true,
                modified: false,
                chunk_crc: Crc32::new(),
                block_log: false,
            }),
            read: Mutex::new(ReadState {
                index_read: ReadCache::new(cache_size),
                data_read: ReadCache::new(cache_size),
                entries: Vec::new(),
                current: 0,
                next_time: HighTime::ZERO,
                next_index: 0,
                num_points: 0,
                cur_point: 0,
                seq_delta: HighTime::ZERO,
                cur_time: HighTime::ZERO,
                data_seq_index: 0,
            }),
            times: Mutex::new(TimeRange {
                start: HighTime::ZERO,
                start_set: false,
                end: HighTime::ZERO,
            }),
            interval: HighTime::new(super::DEFAULT_TIME_STAMP_INTERVAL_SECS as i64, 0.0),
            zero_time: HighTime::ZERO,
            datarate: 1.0,
            delta: HighTime::new(1, 0.0),
            max_delta: HighTime::new(2, 0.0),
        }
    }

    // =========================================================================
    // Configuration (before the cache is shared)
    // =========================================================================

    /// Bio channels occasionally report a rate of zero; those keep the
    /// previous rate.
    pub fn set_datarate(&mut self, rate: f32) {
        if rate == 0.0 {
            return;
        }
        self.datarate = rate;
        self.delta = HighTime::from_secs_f64(1.0 / rate as f64);
        self.max_delta = HighTime::from_secs_f64(2.0 / rate as f64);
    }

    pub fn datarate(&self) -> f32 {
        self.datarate
    }

    pub fn set_time_stamp_interval(&mut self, interval: HighTime) {
        self.interval = interval;
    }

    pub fn time_stamp_interval(&self) -> HighTime {
        self.interval
    }

    /// Zero time offsets every returned sample time; it lets several
    /// devices report on one shared clock.
    pub fn set_zero_time(&mut self, zero: HighTime) {
        self.zero_time = zero;
    }

    pub fn zero_time(&self) -> HighTime {
        self.zero_time
    }

    /// Adopt the time range recorded in the file header. Does not mark the
    /// start as set: that stays reserved for the first accepted sample.
    pub fn set_time_range(&mut self, start: HighTime, end: HighTime) {
        let times = self.times.get_mut();
        times.start = start;
        times.end = end;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn is_modified(&self) -> bool {
        self.write.lock().modified
    }

    /// Time of the first accepted sample, once one exists.
    pub fn start_time(&self) -> Option<HighTime> {
        let times = self.times.lock();
        if times.start_set {
            Some(times.start)
        } else {
            None
        }
    }

    pub fn end_time(&self) -> HighTime {
        self.times.lock().end
    }

    /// Where the final stamp will land when the file is finalized; the
    /// current live end of the file during acquisition.
    pub fn last_index_time_stamp(&self) -> Option<HighTime> {
        let previous = self.write.lock().previous_time;
        let set = self.times.lock().start_set;
        if set {
            Some(previous + self.delta)
        } else {
            None
        }
    }

    /// Number of in-memory index entries (mostly for diagnostics).
    pub fn index_len(&self) -> usize {
        self.read.lock().entries.len()
    }

    // =========================================================================
    // Append Path
    // =========================================================================

    /// Append one sample.
    ///
    /// Inserts time stamps when the stamp interval has elapsed, when the
    /// stream gaps by more than two sample periods, and around NaN runs.
    /// Samples older than the previous one are dropped silently; upstream
    /// rate estimators emit those transients routinely.
    ///
    /// `consolidate` is for batch appenders that know their input is
    /// contiguous; it suppresses the gap and NaN heuristics.
    pub fn append(&self, time: HighTime, value: f64, consolidate: bool) -> Result<()> {
        let ws = &mut *self.write.lock();

        if time < ws.previous_time {
            return Ok(());
        }

        let sample = value as f32;

        if ws.needs_first {
            ws.needs_first = false;
            self.write_time_stamp_and_data(ws, time, sample)?;
        } else if value.is_nan() && !consolidate {
            // Only the first NaN of a run is recorded; one boundary stamp
            // carries the whole outage.
            if !ws.previous_nan {
                if !ws.block_log {
                    tracing::warn!(seconds = time.seconds(), "stream dropped out, stamping NaN");
                }
                ws.previous_nan = true;

                let boundary = ws.previous_time + self.delta;
                if boundary < time {
                    self.write_time_stamp_and_data(ws, boundary, f32::NAN)?;
                }
                self.write_time_stamp_and_data(ws, time, f32::NAN)?;
            }
        } else {
            if !consolidate && (time - ws.previous_time) > self.max_delta {
                tracing::warn!(
                    seconds = time.seconds(),
                    previous_seconds = ws.previous_time.seconds(),
                    "sample gap exceeded two periods, inserting NaN"
                );
                // A NaN where the stream should have continued, then the
                // late sample under a fresh stamp.
                let boundary = ws.previous_time + self.delta;
                if boundary < time {
                    self.write_time_stamp_and_data(ws, boundary, f32::NAN)?;
                }
                self.write_time_stamp_and_data(ws, time, sample)?;
            } else if ws.previous_nan || time >= ws.next_time_stamp {
                self.write_time_stamp_and_data(ws, time, sample)?;
            } else {
                self.write_data(ws, &sample.to_le_bytes(), true)?;
            }
            ws.previous_nan = false;
        }

        ws.previous_time = time;
        Ok(())
    }

    /// Append a contiguous block of samples starting at `start`, one stamp
    /// for the block and bare writes for the rest.
    pub fn append_block(&self, start: HighTime, values: &[f32]) -> Result<()> {
        if values.is_empty() {
            return Err(PvfsError::ArgNull("empty sample block"));
        }
        let ws = &mut *self.write.lock();
        ws.needs_first = false;

        self.write_time_stamp_and_data(ws, start, values[0])?;
        ws.previous_time = start;

        for &value in &values[1..] {
            self.write_data(ws, &value.to_le_bytes(), true)?;
            ws.previous_time = ws.previous_time + self.delta;
        }
        Ok(())
    }

    /// Write the closing stamp: one NaN a sample period past the last
    /// sample. Without it the final chunk has no CRC and no end marker, and
    /// the tail of the file is unreadable after reopen.
    pub fn finalize_time_stamps(&self) -> Result<HighTime> {
        let last = {
            let mut ws = self.write.lock();
            ws.block_log = true;
            ws.previous_time + self.delta
        };
        let result = self.append(last, f64::NAN, false);
        self.write.lock().block_log = false;
        result?;
        Ok(last)
    }

    /// Drain both write caches.
    pub fn flush(&self, wait_for_finish: bool) {
        let ws = &mut *self.write.lock();
        ws.index_cache.flush(wait_for_finish);
        ws.data_cache.flush(wait_for_finish);
    }

    /// Write one index record for `time` pointing at the current end of
    /// the data stream.
    fn write_time_stamp(&self, ws: &mut WriteState, time: HighTime) -> Result<()> {
        // When the index cache is about to spill we flush both streams and
        // wait on the data side, so no record ever points past the durable
        // data frontier.
        let flush_needed = ws.index_cache.space_before_flush() < TIME_STAMP_SIZE as usize;

        ws.index_cache.write(&[UNIQUE_MARKER_BYTE; UNIQUE_MARKER_LEN])?;

        let mut record = [0u8; 36];
        record[0..8].copy_from_slice(&time.seconds().to_le_bytes());
        record[8..16].copy_from_slice(&time.sub_seconds().to_le_bytes());
        // bytes 16..24 reserved, zero
        record[24..32].copy_from_slice(&ws.data_file_index.to_le_bytes());
        let crc = Crc32::calculate(&record[..32]);
        record[32..36].copy_from_slice(&crc.to_le_bytes());
        ws.index_cache.write(&record)?;

        if flush_needed {
            let _ = ws.data_cache.write_cache_to_file();
            let _ = ws.index_cache.write_cache_to_file();
            ws.data_cache.wait();
        }

        {
            let mut times = self.times.lock();
            if !times.start_set {
                times.start_set = true;
                times.start = time;
            }
            times.end = time;
        }
        ws.previous_time = time;
        ws.next_time_stamp = time + self.interval;
        Ok(())
    }

    /// Close the running chunk, stamp the index, and open a new chunk
    /// whose first sample is `value`.
    fn write_time_stamp_and_data(&self, ws: &mut WriteState, time: HighTime, value: f32) -> Result<()> {
        // The previous chunk ends with its CRC. It counts toward the data
        // offset, so it must land before the stamp captures that offset.
        if ws.data_file_index > 0 {
            let crc = ws.chunk_crc.get();
            self.write_data(ws, &crc.to_le_bytes(), false)?;
        }

        self.write_time_stamp(ws, time)?;

        // Chunk header: marker, the stamp's time, reserved space.
        self.write_data(ws, &[UNIQUE_MARKER_BYTE; UNIQUE_MARKER_LEN], false)?;
        self.write_data(ws, &time.seconds().to_le_bytes(), false)?;
        self.write_data(ws, &time.sub_seconds().to_le_bytes(), false)?;
        self.write_data(ws, &0i64.to_le_bytes(), false)?;

        ws.chunk_crc.reset();
        self.write_data(ws, &value.to_le_bytes(), true)
    }

    /// Push bytes into the data stream, tracking the file offset and the
    /// chunk CRC.
    fn write_data(&self, ws: &mut WriteState, bytes: &[u8], with_crc: bool) -> Result<()> {
        ws.data_file_index += bytes.len() as i64;
        if with_crc {
            ws.chunk_crc.append(bytes);
        }
        if ws.data_cache.write(bytes)? {
            // The data stream spilled; nudge the index stream out too so the
            // two files stay close on disk. No need to wait on it.
            let _ = ws.index_cache.write_cache_to_file();
        }
        ws.modified = true;
        Ok(())
    }

    // =========================================================================
    // Index Scan
    // =========================================================================

    /// Build the in-memory index by scanning every record in the index
    /// file. The scan stops at the first bad record and serves the valid
    /// prefix, clamping the end time to the last good stamp.
    pub fn read_index(&self) -> Result<()> {
        let rs = &mut *self.read.lock();
        rs.entries.clear();
        rs.current = 0;

        let index_size = self.index_file.lock().size();
        let record_count = (index_size - INDEX_HEADER_SIZE).max(0) / TIME_STAMP_SIZE;

        let mut location = INDEX_HEADER_SIZE;
        let mut last: Option<(HighTime, i64, i64)> = None;
        let mut stamps = 0i64;
        let mut truncated = false;

        for _ in 0..record_count {
            match read_time_stamp(&mut rs.index_read, &self.index_file, location) {
                Ok((time, data_location)) => {
                    stamps += 1;
                    if let Some((prev_time, prev_loc, prev_data)) = last {
                        rs.entries.push(IndexEntry {
                            start_time: prev_time,
                            end_time: time,
                            my_location: prev_loc,
                            data_location: prev_data,
                        });
                    }
                    last = Some((time, location, data_location));
                }
                Err(e) => {
                    tracing::warn!(location, error = %e, "index scan stopped at bad record");
                    truncated = true;
                    break;
                }
            }
            location += TIME_STAMP_SIZE;
        }

        // A lone stamp spans no time; the index stays empty until a second
        // one exists.
        if stamps >= 2 {
            if let Some((last_time, last_loc, last_data)) = last {
                let end = {
                    let times = self.times.lock();
                    if truncated || times.end < last_time {
                        last_time
                    } else {
                        times.end
                    }
                };
                rs.entries.push(IndexEntry {
                    start_time: last_time,
                    end_time: end,
                    my_location: last_loc,
                    data_location: last_data,
                });
            }
        }
        if truncated {
            if let Some((last_time, _, _)) = last {
                self.times.lock().end = last_time;
            }
        }

        tracing::debug!(entries = rs.entries.len(), truncated, "index scan complete");
        Ok(())
    }

    /// Locate the index record whose span contains `time`. Returns the
    /// record's offset in the index file, or -1 when `time` lies outside
    /// the file. Positions the sequential cursor on a hit.
    pub fn find(&self, time: HighTime) -> i64 {
        let rs = &mut *self.read.lock();
        match index::find(&rs.entries, &time) {
            Some(i) => {
                rs.current = i;
                rs.entries[i].my_location
            }
            None => -1,
        }
    }

    // =========================================================================
    // Sequential Traversal
    // =========================================================================

    /// Position the sequential cursor at the first sample not before
    /// `time`. Returns false when the time is not in the file.
    pub fn start(&self, time: HighTime) -> bool {
        let rs = &mut *self.read.lock();
        self.start_locked(rs, time)
    }

    fn start_locked(&self, rs: &mut ReadState, time: HighTime) -> bool {
        let idx = match index::find(&rs.entries, &time) {
            Some(i) => i,
            None => return false,
        };
        rs.current = idx;

        let (stamp_time, data_location) = match Self::next_entry(rs) {
            Some(x) => x,
            None => return false,
        };
        rs.next_time = stamp_time;
        rs.next_index = data_location;

        if !Self::start_next_sequence(rs) {
            return false;
        }

        // The sequence starts at its stamp; shift right to the first
        // sample at or past the requested time.
        if rs.cur_time < time {
            let step = rs.seq_delta.to_secs_f64();
            if step > 0.0 {
                let offset = ((time - rs.cur_time).to_secs_f64() / step).ceil().max(0.0) as i64;
                rs.cur_point = offset as u32;
                rs.cur_time = rs.cur_time + rs.seq_delta * offset;
                rs.data_seq_index += offset * 4;
            }
        }
        true
    }

    fn next_entry(rs: &mut ReadState) -> Option<(HighTime, i64)> {
        if rs.current >= rs.entries.len() {
            return None;
        }
        let entry = rs.entries[rs.current];
        rs.current += 1;
        Some((entry.start_time, entry.data_location))
    }

    /// Move the cursor to the next chunk. The chunk's sample count falls
    /// out of the distance between its stamp's data offset and the next
    /// stamp's, minus the chunk overhead.
    fn start_next_sequence(rs: &mut ReadState) -> bool {
        let (next_time, next_data) = match Self::next_entry(rs) {
            Some(x) => x,
            None => return false,
        };

        rs.num_points = if next_data > CHUNK_HEADER_SIZE + rs.next_index {
            ((next_data - rs.next_index - CHUNK_HEADER_SIZE) / 4) as u32
        } else {
            0
        };
        rs.cur_point = 0;

        let span = next_time - rs.next_time;
        rs.seq_delta = if rs.num_points > 0 {
            span / rs.num_points as i64
        } else {
            HighTime::ZERO
        };

        rs.cur_time = rs.next_time;
        rs.data_seq_index = rs.next_index + CHUNK_HEADER_BEFORE_DATA;
        rs.next_time = next_time;
        rs.next_index = next_data;
        true
    }

    /// Read one sample at the cursor. `Ok(None)` past the last chunk.
    pub fn get_next_point(&self) -> Result<Option<(HighTime, f32)>> {
        let rs = &mut *self.read.lock();
        if rs.cur_point >= rs.num_points && !Self::start_next_sequence(rs) {
            return Ok(None);
        }
        rs.cur_point += 1;

        let value = match rs.data_read.read_f32(&self.data_file, rs.data_seq_index) {
            Ok(v) => v,
            Err(e) => {
                // Unflushed data or a torn tail; drop the sequence.
                rs.num_points = 0;
                rs.cur_point = 0;
                return Err(e);
            }
        };

        let time = rs.cur_time;
        rs.cur_time = rs.cur_time + rs.seq_delta;
        rs.data_seq_index += 4;
        Ok(Some((time, value)))
    }

    /// Read every remaining sample of the current chunk into `out` and
    /// return the chunk's time span. `Ok(None)` past the last chunk.
    pub fn get_next_chunk(&self, out: &mut Vec<f32>) -> Result<Option<(HighTime, HighTime)>> {
        let rs = &mut *self.read.lock();
        self.next_chunk_locked(rs, out)
    }

    fn next_chunk_locked(
        &self,
        rs: &mut ReadState,
        out: &mut Vec<f32>,
    ) -> Result<Option<(HighTime, HighTime)>> {
        out.clear();
        if rs.cur_point >= rs.num_points && !Self::start_next_sequence(rs) {
            return Ok(None);
        }

        let count = rs.num_points - rs.cur_point;
        if count > 0 {
            if let Err(e) =
                rs.data_read
                    .read_f32_into(&self.data_file, rs.data_seq_index, count as usize, out)
            {
                rs.num_points = 0;
                rs.cur_point = 0;
                return Err(e);
            }
        }

        let start = rs.cur_time;
        let end = if count > 0 {
            rs.cur_time + rs.seq_delta * (count as i64 - 1)
        } else {
            rs.cur_time
        };
        rs.cur_point = rs.num_points;
        Ok(Some((start, end)))
    }

    // =========================================================================
    // Range Read
    // =========================================================================

    /// Read the samples in `[start, end]`, decimated so at most roughly
    /// `max_points` come back (`ALL_POINTS` returns everything). Times are
    /// reported relative to the zero time.
    pub fn get_data(
        &self,
        start: HighTime,
        end: HighTime,
        t_out: &mut Vec<f64>,
        y_out: &mut Vec<f32>,
        max_points: i64,
    ) -> Result<()> {
        t_out.clear();
        y_out.clear();

        let (file_start, file_end) = {
            let times = self.times.lock();
            (times.start, times.end)
        };
        if start > end {
            return Err(PvfsError::ArgNull("range start after end"));
        }
        if start > file_end || end < file_start {
            return Err(PvfsError::ArgNull("range outside the file"));
        }
        if max_points == 0 {
            return Err(PvfsError::ArgNull("max_points is zero"));
        }

        let actual_start = if start < file_start { file_start } else { start };
        let actual_end = if end > file_end { file_end } else { end };

        // Decimation stride in samples, rounded up so the cap holds.
        let mut di = 1.0f64;
        if max_points != ALL_POINTS {
            di = (actual_end - actual_start).to_secs_f64() * self.datarate as f64
                / max_points as f64;
            di = if di < 1.0 { 1.0 } else { (di + 0.5).floor() };
        }
        let idi = di as usize;

        let rs = &mut *self.read.lock();
        if !self.start_locked(rs, actual_start) {
            return Err(PvfsError::Eof);
        }

        let mut chunk: Vec<f32> = Vec::new();
        let (mut chunk_start, mut chunk_end) = match self.next_chunk_locked(rs, &mut chunk)? {
            Some(span) => span,
            None => return Err(PvfsError::Eof),
        };

        let end_rel = (actual_end - self.zero_time).to_secs_f64();
        let mut single_point_skips = 0usize;

        while chunk_start < actual_end {
            let count = chunk.len();
            let mut dt = 0.0f64;
            if count > 1 {
                dt = (chunk_end - chunk_start).to_secs_f64() / (count - 1) as f64 * di;
            } else {
                // Forced stamps and NaN boundaries produce one-sample
                // chunks; emit only every di-th of them so dropouts do not
                // dominate a decimated plot.
                single_point_skips += 1;
                if single_point_skips < idi {
                    match self.next_chunk_locked(rs, &mut chunk)? {
                        Some((s, e)) => {
                            chunk_start = s;
                            chunk_end = e;
                            continue;
                        }
                        None => break,
                    }
                }
                single_point_skips = 0;
            }

            let mut current = (chunk_start - self.zero_time).to_secs_f64();
            let mut i = 0usize;
            while i < count {
                if current >= end_rel {
                    break;
                }
                t_out.push(current);
                y_out.push(chunk[i]);
                current += dt;
                i += idi;
            }

            match self.next_chunk_locked(rs, &mut chunk)? {
                Some((s, e)) => {
                    chunk_start = s;
                    chunk_end = e;
                }
                None => break,
            }
        }
        Ok(())
    }
}

/// Read and verify one index record: marker, time, reserved, data offset,
/// CRC over the 32 payload bytes.
fn read_time_stamp(
    cache: &mut ReadCache,
    file: &Mutex<FileHandle>,
    location: i64,
) -> Result<(HighTime, i64)> {
    for i in 0..UNIQUE_MARKER_LEN as i64 {
        if cache.read_u8(file, location + i)? != UNIQUE_MARKER_BYTE {
            return Err(PvfsError::Corruption(format!(
                "index record marker mismatch at {location:#x}"
            )));
        }
    }

    let mut pos = location + UNIQUE_MARKER_LEN as i64;
    let seconds = cache.read_i64(file, pos)?;
    pos += 8;
    let sub_seconds = cache.read_f64(file, pos)?;
    pos += 8;
    let reserved = cache.read_i64(file, pos)?;
    pos += 8;
    let data_location = cache.read_i64(file, pos)?;
    pos += 8;
    let stored_crc = cache.read_u32(file, pos)?;

    let mut crc = Crc32::new();
    crc.append(&seconds.to_le_bytes());
    crc.append(&sub_seconds.to_le_bytes());
    crc.append(&reserved.to_le_bytes());
    crc.append(&data_location.to_le_bytes());
    if crc.get() != stored_crc {
        return Err(PvfsError::Corruption(format!(
            "index record crc mismatch at {location:#x}"
        )));
    }

    Ok((HighTime::new(seconds, sub_seconds), data_location))
}
