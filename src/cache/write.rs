//! Double-buffered asynchronous write cache
//!
//! The producer appends into the active buffer; when it passes the flush
//! threshold the buffers swap and the full one is handed to a background
//! worker that writes it into the inner file. Two buffers are enough: when
//! the producer outruns the disk it blocks in `wait` until the worker hands
//! the previous buffer back.
//!
//! Worker I/O errors are logged and swallowed. The producer is typically a
//! live sample stream that cannot act on a write failure; the only signal
//! it sees is buffer-full back-pressure.

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::error::{PvfsError, Result};
use crate::vfs::FileHandle;

/// Outcome of copying bytes into the active buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    /// Copied, room remains
    Success,
    /// Copied, and the flush threshold has been reached
    Full,
    /// Not copied: the buffer cannot take this many bytes right now
    Fail,
}

/// One unit of background work: a drained buffer is sent back on the
/// completion channel when done.
struct WriteJob {
    file: Arc<Mutex<FileHandle>>,
    buffer: Vec<u8>,
    size: usize,
    seek_to_end: bool,
}

/// Per-stream buffered writer with one background worker.
pub struct WriteCache {
    /// Flush threshold; each buffer holds twice this for headroom
    flush_size: usize,
    buffer_size: usize,
    active: Vec<u8>,
    /// The idle buffer; `None` while the worker holds it
    spare: Option<Vec<u8>>,
    cursor: usize,
    file: Option<Arc<Mutex<FileHandle>>>,
    seek_to_end: bool,
    asynchronous: bool,
    jobs: Option<Sender<WriteJob>>,
    completions: Receiver<Vec<u8>>,
    worker: Option<JoinHandle<()>>,
    outstanding: bool,
}

impl WriteCache {
    /// `flush_size` is the fill level that triggers a background write.
    ///
    /// `seek_to_end` makes every drain seek to the file's current size
    /// first, which is required when the same file is also being read; an
    /// overwriting producer passes `false` to keep writing at the cursor.
    pub fn new(flush_size: usize, asynchronous: bool, seek_to_end: bool) -> Self {
        let buffer_size = flush_size * 2;
        let (job_tx, job_rx) = bounded::<WriteJob>(1);
        let (done_tx, done_rx) = bounded::<Vec<u8>>(1);

        let worker = if asynchronous {
            let handle = std::thread::Builder::new()
                .name("pvfs-writecache".to_string())
                .spawn(move || worker_loop(job_rx, done_tx))
                .ok();
            if handle.is_none() {
                tracing::error!("failed to spawn write cache worker, falling back to inline writes");
            }
            handle
        } else {
            None
        };

        WriteCache {
            flush_size,
            buffer_size,
            active: vec![0u8; buffer_size],
            spare: Some(vec![0u8; buffer_size]),
            cursor: 0,
            file: None,
            seek_to_end,
            asynchronous: worker.is_some(),
            jobs: Some(job_tx),
            completions: done_rx,
            worker,
            outstanding: false,
        }
    }

    /// Attach the destination file. Must be set before any drain.
    pub fn set_file(&mut self, file: Arc<Mutex<FileHandle>>) {
        self.file = Some(file);
    }

    /// Cursor of the next byte to be added. Together with the file size
    /// this gives the offset an item will land at.
    pub fn tell(&self) -> usize {
        self.cursor
    }

    /// Bytes that can still be added before the flush threshold trips.
    pub fn space_before_flush(&self) -> usize {
        self.flush_size.saturating_sub(self.cursor)
    }

    /// Whether the background worker is still draining a buffer.
    pub fn is_writing(&mut self) -> bool {
        if !self.outstanding {
            return false;
        }
        match self.completions.try_recv() {
            Ok(buffer) => {
                self.spare = Some(buffer);
                self.outstanding = false;
                false
            }
            Err(TryRecvError::Empty) => true,
            Err(TryRecvError::Disconnected) => {
                self.outstanding = false;
                false
            }
        }
    }

    /// Block until the in-flight background write, if any, completes.
    pub fn wait(&mut self) {
        if !self.outstanding {
            return;
        }
        if let Ok(buffer) = self.completions.recv() {
            self.spare = Some(buffer);
        }
        self.outstanding = false;
    }

    /// Copy bytes into the active buffer without triggering a drain.
    pub fn add_value(&mut self, bytes: &[u8]) -> AddResult {
        let end = self.cursor + bytes.len();
        if end >= self.buffer_size {
            return AddResult::Fail;
        }
        self.active[self.cursor..end].copy_from_slice(bytes);
        self.cursor = end;
        if end >= self.flush_size {
            AddResult::Full
        } else {
            AddResult::Success
        }
    }

    /// Append bytes, draining buffers as they fill.
    ///
    /// Returns:
    /// - `Ok(true)`: the cache flushed (or attempted to) during this call
    /// - `Ok(false)`: bytes were buffered with room to spare
    ///
    /// When both buffers are behind, blocks until the worker catches up.
    /// A value that can never fit is caller misuse.
    pub fn write(&mut self, bytes: &[u8]) -> Result<bool> {
        match self.add_value(bytes) {
            AddResult::Success => Ok(false),
            AddResult::Full => {
                // If the worker is still busy the flush is skipped; there is
                // headroom left for the next call to try again.
                Ok(self.write_cache_to_file().is_ok())
            }
            AddResult::Fail => {
                self.wait();
                let _ = self.write_cache_to_file();
                match self.add_value(bytes) {
                    AddResult::Success => Ok(true),
                    AddResult::Full => {
                        let _ = self.write_cache_to_file();
                        Ok(true)
                    }
                    AddResult::Fail => Err(PvfsError::ArgNull("value larger than write cache")),
                }
            }
        }
    }

    /// Hand the filled portion of the active buffer to the worker (or write
    /// it inline in synchronous mode) and reset the cursor.
    ///
    /// Fails with `WouldBlock` while the previous drain is still running
    /// and with `FileNotOpened` when no file is attached; callers treat
    /// both as "skip this flush".
    pub fn write_cache_to_file(&mut self) -> Result<()> {
        if self.is_writing() {
            return Err(PvfsError::WouldBlock);
        }
        let file = self.file.clone().ok_or(PvfsError::FileNotOpened)?;

        let size = self.cursor;
        self.cursor = 0;

        if self.asynchronous {
            let spare = self
                .spare
                .take()
                .unwrap_or_else(|| vec![0u8; self.buffer_size]);
            let buffer = std::mem::replace(&mut self.active, spare);
            let job = WriteJob {
                file,
                buffer,
                size,
                seek_to_end: self.seek_to_end,
            };
            match self.jobs.as_ref().map(|tx| tx.send(job)) {
                Some(Ok(())) => {
                    self.outstanding = true;
                }
                Some(Err(send_error)) => {
                    // Worker is gone; reclaim the buffer and degrade to an
                    // inline write.
                    tracing::error!("write cache worker unavailable, writing inline");
                    let job = send_error.into_inner();
                    drain_buffer(&job.file, &job.buffer[..job.size], job.seek_to_end);
                    self.spare = Some(job.buffer);
                }
                None => {}
            }
        } else {
            drain_buffer(&file, &self.active[..size], self.seek_to_end);
        }
        Ok(())
    }

    /// Drain everything buffered so far.
    ///
    /// Returns `true` once the buffered bytes have been handed off (and, if
    /// `wait_for_finish`, fully written).
    pub fn flush(&mut self, wait_for_finish: bool) -> bool {
        if self.file.is_none() {
            return false;
        }
        if self.cursor == 0 {
            return true;
        }

        // A drain may already be in flight.
        self.wait();
        let _ = self.write_cache_to_file();

        if wait_for_finish {
            self.wait();
        }
        true
    }
}

impl Drop for WriteCache {
    fn drop(&mut self) {
        self.wait();
        // Closing the channel stops the worker loop.
        self.jobs = None;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Background worker: drain buffers until the job channel closes.
fn worker_loop(jobs: Receiver<WriteJob>, completions: Sender<Vec<u8>>) {
    while let Ok(job) = jobs.recv() {
        drain_buffer(&job.file, &job.buffer[..job.size], job.seek_to_end);
        if completions.send(job.buffer).is_err() {
            break;
        }
    }
}

/// Write one buffer into the file. Holds the handle lock across the whole
/// seek/write/flush sequence so readers never observe a torn append. Errors
/// are logged, never propagated.
fn drain_buffer(file: &Mutex<FileHandle>, bytes: &[u8], seek_to_end: bool) {
    let mut handle = file.lock();
    if seek_to_end {
        let end = handle.size();
        if let Err(e) = handle.seek_to(end) {
            tracing::error!(error = %e, "write cache seek to end failed");
            return;
        }
    }
    if !bytes.is_empty() {
        match handle.write_bytes(bytes) {
            Ok(n) if n == bytes.len() => {}
            Ok(n) => tracing::error!(wrote = n, expected = bytes.len(), "short cache write"),
            Err(e) => tracing::error!(error = %e, "cache write failed"),
        }
    }
    // Flush here so the file size tracks the durable frontier exactly.
    if let Err(e) = handle.flush(false) {
        tracing::error!(error = %e, "cache flush failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_value_thresholds() {
        let mut cache = WriteCache::new(8, false, true);

        assert_eq!(cache.add_value(&[1, 2, 3]), AddResult::Success);
        assert_eq!(cache.tell(), 3);
        assert_eq!(cache.space_before_flush(), 5);

        // Crossing flush_size reports Full but still buffers the bytes
        assert_eq!(cache.add_value(&[4, 5, 6, 7, 8, 9]), AddResult::Full);
        assert_eq!(cache.tell(), 9);

        // Overflowing the double buffer is refused outright
        assert_eq!(cache.add_value(&[0u8; 7]), AddResult::Fail);
        assert_eq!(cache.tell(), 9);
    }

    #[test]
    fn test_flush_without_file_fails() {
        let mut cache = WriteCache::new(8, false, true);
        cache.add_value(&[1, 2, 3]);
        assert!(matches!(
            cache.write_cache_to_file(),
            Err(PvfsError::FileNotOpened)
        ));
        assert!(!cache.flush(true));
    }

    #[test]
    fn test_sync_cache_is_not_writing() {
        let mut cache = WriteCache::new(8, false, true);
        assert!(!cache.is_writing());
        cache.wait(); // no-op without an outstanding drain
        assert_eq!(cache.tell(), 0);
    }
}
