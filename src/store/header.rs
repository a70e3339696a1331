//! Index file header
//!
//! The first kilobyte of every `.index` file. Rewritten in place on flush
//! and close so the recorded time range tracks the data.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::{ReadRecordExt, WriteRecordExt};
use crate::error::{PvfsError, Result};
use crate::time::HighTime;
use crate::vfs::FileHandle;

use super::{DEFAULT_TIME_STAMP_INTERVAL_SECS, INDEX_HEADER_SIZE, INDEX_MAGIC, INDEX_VERSION};

#[derive(Debug, Clone, Copy)]
pub struct IndexHeader {
    pub magic: u32,
    pub version: u32,
    pub data_type: u32,
    pub datarate: f32,
    pub start_time: HighTime,
    pub end_time: HighTime,
    pub interval_seconds: u32,
}

impl Default for IndexHeader {
    fn default() -> Self {
        IndexHeader {
            magic: INDEX_MAGIC,
            version: INDEX_VERSION,
            data_type: 0,
            datarate: 1.0,
            start_time: HighTime::ZERO,
            end_time: HighTime::ZERO,
            interval_seconds: DEFAULT_TIME_STAMP_INTERVAL_SECS,
        }
    }
}

impl IndexHeader {
    /// Read the header from the front of an index file. A zero interval is
    /// replaced with the default so old writers cannot disable stamping.
    pub fn read(handle: &mut FileHandle) -> Result<IndexHeader> {
        handle.seek_to(0)?;
        let magic = handle.read_u32::<LittleEndian>()?;
        if magic != INDEX_MAGIC {
            return Err(PvfsError::Corruption(format!(
                "bad index file magic {magic:#010x} in {}",
                handle.name()
            )));
        }
        let version = handle.read_u32::<LittleEndian>()?;
        let data_type = handle.read_u32::<LittleEndian>()?;
        let datarate = handle.read_f32::<LittleEndian>()?;
        let start_time = handle.read_high_time()?;
        let end_time = handle.read_high_time()?;
        let mut interval_seconds = handle.read_u32::<LittleEndian>()?;
        if interval_seconds == 0 {
            interval_seconds = DEFAULT_TIME_STAMP_INTERVAL_SECS;
        }
        Ok(IndexHeader {
            magic,
            version,
            data_type,
            datarate,
            start_time,
            end_time,
            interval_seconds,
        })
    }

    /// Write the header at the front of an index file and flush it.
    pub fn write(&self, handle: &mut FileHandle) -> Result<()> {
        handle.seek_to(0)?;
        handle.write_u32::<LittleEndian>(self.magic)?;
        handle.write_u32::<LittleEndian>(self.version)?;
        handle.write_u32::<LittleEndian>(self.data_type)?;
        handle.write_f32::<LittleEndian>(self.datarate)?;
        handle.write_high_time(&self.start_time)?;
        handle.write_high_time(&self.end_time)?;
        handle.write_u32::<LittleEndian>(self.interval_seconds)?;
        handle.flush(false)
    }

    /// Reserve the full header region of a fresh index file with zeros,
    /// so records always start at the same offset.
    pub fn reserve(handle: &mut FileHandle) -> Result<()> {
        let zeros = vec![0u8; INDEX_HEADER_SIZE as usize];
        handle.write_bytes(&zeros)?;
        Ok(())
    }
}
