//! Read-through cache
//!
//! One buffer per stream. Index scans and chunk reads fetch small items at
//! known offsets; the cache turns those into block-sized reads against the
//! inner file and serves repeats from memory. There is no invalidation:
//! both store files are append-only, and the header (the one rewritten
//! region) is read through the handle directly.

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;

use crate::error::{PvfsError, Result};
use crate::vfs::FileHandle;

pub struct ReadCache {
    buffer: Vec<u8>,
    /// File offset of `buffer[0]`; `-1` before the first fill
    start: i64,
    /// Valid bytes in the buffer
    len: usize,
}

impl ReadCache {
    pub fn new(cache_size: usize) -> Self {
        ReadCache {
            buffer: vec![0u8; cache_size],
            start: -1,
            len: 0,
        }
    }

    /// Refill the buffer from `offset`, reading as much as the file still
    /// has. Reads entirely past the end fail with `Eof`.
    fn fill(&mut self, file: &Mutex<FileHandle>, offset: i64) -> Result<()> {
        let mut handle = file.lock();
        if offset >= handle.size() {
            self.start = -1;
            self.len = 0;
            return Err(PvfsError::Eof);
        }
        handle.seek_to(offset)?;
        let n = handle.read_bytes(&mut self.buffer)?;
        self.start = offset;
        self.len = n;
        if n == 0 {
            Err(PvfsError::Eof)
        } else {
            Ok(())
        }
    }

    /// Borrow `count` cached bytes at `offset`, refilling on a miss.
    fn window(&mut self, file: &Mutex<FileHandle>, offset: i64, count: usize) -> Result<&[u8]> {
        let miss = self.start < 0
            || offset < self.start
            || offset + count as i64 > self.start + self.len as i64;
        if miss {
            self.fill(file, offset)?;
            if self.len < count {
                return Err(PvfsError::Eof);
            }
        }
        let at = (offset - self.start) as usize;
        Ok(&self.buffer[at..at + count])
    }

    // =========================================================================
    // Typed Items
    // =========================================================================

    pub fn read_u8(&mut self, file: &Mutex<FileHandle>, offset: i64) -> Result<u8> {
        Ok(self.window(file, offset, 1)?[0])
    }

    pub fn read_u32(&mut self, file: &Mutex<FileHandle>, offset: i64) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.window(file, offset, 4)?))
    }

    pub fn read_i64(&mut self, file: &Mutex<FileHandle>, offset: i64) -> Result<i64> {
        Ok(LittleEndian::read_i64(self.window(file, offset, 8)?))
    }

    pub fn read_f32(&mut self, file: &Mutex<FileHandle>, offset: i64) -> Result<f32> {
        Ok(LittleEndian::read_f32(self.window(file, offset, 4)?))
    }

    pub fn read_f64(&mut self, file: &Mutex<FileHandle>, offset: i64) -> Result<f64> {
        Ok(LittleEndian::read_f64(self.window(file, offset, 8)?))
    }

    /// Append `count` consecutive `f32` items starting at `offset` into
    /// `out`, refilling across cache boundaries as needed. Returns the
    /// number of bytes consumed.
    pub fn read_f32_into(
        &mut self,
        file: &Mutex<FileHandle>,
        offset: i64,
        count: usize,
        out: &mut Vec<f32>,
    ) -> Result<usize> {
        out.reserve(count);
        let mut pos = offset;
        let mut remaining = count;
        while remaining > 0 {
            // Take whatever the current window covers, at least one item.
            let available = if self.start >= 0 && pos >= self.start {
                ((self.start + self.len as i64 - pos) / 4).max(0) as usize
            } else {
                0
            };
            let take = if available == 0 {
                self.fill(file, pos)?;
                if self.len < 4 {
                    return Err(PvfsError::Eof);
                }
                (self.len / 4).min(remaining)
            } else {
                available.min(remaining)
            };
            let bytes = self.window(file, pos, take * 4)?;
            for chunk in bytes.chunks_exact(4) {
                out.push(LittleEndian::read_f32(chunk));
            }
            pos += take as i64 * 4;
            remaining -= take;
        }
        Ok(count * 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::Vfs;
    use byteorder::WriteBytesExt;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn handle_with_floats(count: usize) -> (TempDir, Arc<Mutex<FileHandle>>) {
        let dir = TempDir::new().unwrap();
        let vfs = Vfs::create(&dir.path().join("cache.pvfs")).unwrap();
        let mut handle = vfs.create_inner("floats").unwrap();
        for i in 0..count {
            handle.write_f32::<LittleEndian>(i as f32).unwrap();
        }
        handle.flush(false).unwrap();
        (dir, Arc::new(Mutex::new(handle)))
    }

    #[test]
    fn test_item_reads_hit_cache() {
        let (_dir, file) = handle_with_floats(64);
        let mut cache = ReadCache::new(128);

        assert_eq!(cache.read_f32(&file, 0).unwrap(), 0.0);
        assert_eq!(cache.read_f32(&file, 40).unwrap(), 10.0);
        // Second read of the same region must not reposition the handle
        let before = file.lock().tell();
        assert_eq!(cache.read_f32(&file, 44).unwrap(), 11.0);
        assert_eq!(file.lock().tell(), before);
    }

    #[test]
    fn test_multi_item_read_crosses_refills() {
        let (_dir, file) = handle_with_floats(1000);
        let mut cache = ReadCache::new(64); // much smaller than the file

        let mut out = Vec::new();
        cache.read_f32_into(&file, 0, 1000, &mut out).unwrap();
        assert_eq!(out.len(), 1000);
        for (i, v) in out.iter().enumerate() {
            assert_eq!(*v, i as f32);
        }
    }

    #[test]
    fn test_read_past_end_is_eof() {
        let (_dir, file) = handle_with_floats(4);
        let mut cache = ReadCache::new(64);
        assert!(matches!(cache.read_f32(&file, 4096), Err(PvfsError::Eof)));
    }
}
