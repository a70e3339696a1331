//! Block encode/decode
//!
//! Every block on disk is a 29-byte header followed by a fixed-size payload.
//! `RawBlock` is the wire form; the typed blocks interpret the payload for
//! their kind. All links are absolute byte offsets within the host file,
//! with `-1` meaning "no link".

use std::io::{Cursor, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::codec::{ReadRecordExt, WriteRecordExt};
use crate::error::{PvfsError, Result};

use super::{FileEntry, INVALID_LOCATION, MAX_FILENAME_LEN};

// =============================================================================
// Block Kinds
// =============================================================================

/// One-byte type tag at the start of every block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Unknown = 0,
    Data = 1,
    Tree = 2,
    File = 3,
    Eof = 0xFF,
}

impl BlockKind {
    pub fn from_u8(tag: u8) -> Result<BlockKind> {
        match tag {
            0 => Ok(BlockKind::Unknown),
            1 => Ok(BlockKind::Data),
            2 => Ok(BlockKind::Tree),
            3 => Ok(BlockKind::File),
            0xFF => Ok(BlockKind::Eof),
            other => Err(PvfsError::Corruption(format!("unknown block type tag {other:#04x}"))),
        }
    }
}

/// One entry of a tree block: the smallest inner-file offset served by the
/// child at `block_loc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocationMap {
    pub virtual_addr: i64,
    pub block_loc: i64,
}

// =============================================================================
// Raw Blocks
// =============================================================================

/// A block as it appears on disk: header fields plus an uninterpreted
/// payload of exactly the archive's block size.
#[derive(Debug, Clone)]
pub struct RawBlock {
    pub kind: BlockKind,
    pub prev: i64,
    pub self_loc: i64,
    pub next: i64,
    pub count: i32,
    pub payload: Vec<u8>,
}

impl RawBlock {
    pub fn new(block_size: i32) -> Self {
        RawBlock {
            kind: BlockKind::Unknown,
            prev: INVALID_LOCATION,
            self_loc: INVALID_LOCATION,
            next: INVALID_LOCATION,
            count: 0,
            payload: vec![0u8; block_size as usize],
        }
    }

    /// Parse a block out of `bytes`, which must hold the header plus a full
    /// payload of `block_size` bytes.
    pub fn decode(bytes: &[u8], block_size: i32) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let kind = BlockKind::from_u8(cursor.read_u8()?)?;
        let prev = cursor.read_i64::<LittleEndian>()?;
        let self_loc = cursor.read_i64::<LittleEndian>()?;
        let next = cursor.read_i64::<LittleEndian>()?;
        let count = cursor.read_i32::<LittleEndian>()?;
        let mut payload = vec![0u8; block_size as usize];
        cursor.read_exact(&mut payload)?;
        Ok(RawBlock { kind, prev, self_loc, next, count, payload })
    }

    /// Serialize header plus payload into a single buffer for one positioned
    /// write.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(super::BLOCK_HEADER_SIZE as usize + self.payload.len());
        buf.write_u8(self.kind as u8)?;
        buf.write_i64::<LittleEndian>(self.prev)?;
        buf.write_i64::<LittleEndian>(self.self_loc)?;
        buf.write_i64::<LittleEndian>(self.next)?;
        buf.write_i32::<LittleEndian>(self.count)?;
        buf.write_all(&self.payload)?;
        Ok(buf)
    }
}

// =============================================================================
// Data Blocks
// =============================================================================

/// A leaf holding raw file bytes. `count` is the number of valid bytes and
/// `tree` points back at the tree block that indexes this leaf.
#[derive(Debug, Clone)]
pub struct DataBlock {
    pub prev: i64,
    pub self_loc: i64,
    pub next: i64,
    pub count: i32,
    pub tree: i64,
    pub data: Vec<u8>,
}

impl DataBlock {
    /// Payload bytes available for file data in a block of `block_size`.
    pub fn capacity_for(block_size: i32) -> i32 {
        block_size - 8
    }

    pub fn new(block_size: i32) -> Self {
        DataBlock {
            prev: INVALID_LOCATION,
            self_loc: INVALID_LOCATION,
            next: INVALID_LOCATION,
            count: 0,
            tree: INVALID_LOCATION,
            data: vec![0u8; Self::capacity_for(block_size) as usize],
        }
    }

    pub fn capacity(&self) -> i32 {
        self.data.len() as i32
    }

    pub fn from_raw(raw: &RawBlock) -> Result<Self> {
        if raw.kind != BlockKind::Data {
            return Err(PvfsError::Corruption(format!(
                "expected data block at {:#x}, found {:?}",
                raw.self_loc, raw.kind
            )));
        }
        let mut cursor = Cursor::new(raw.payload.as_slice());
        let tree = cursor.read_i64::<LittleEndian>()?;
        let mut data = vec![0u8; raw.payload.len() - 8];
        cursor.read_exact(&mut data)?;
        Ok(DataBlock {
            prev: raw.prev,
            self_loc: raw.self_loc,
            next: raw.next,
            count: raw.count,
            tree,
            data,
        })
    }

    pub fn to_raw(&self) -> Result<RawBlock> {
        let mut payload = Vec::with_capacity(8 + self.data.len());
        payload.write_i64::<LittleEndian>(self.tree)?;
        payload.write_all(&self.data)?;
        Ok(RawBlock {
            kind: BlockKind::Data,
            prev: self.prev,
            self_loc: self.self_loc,
            next: self.next,
            count: self.count,
            payload,
        })
    }
}

// =============================================================================
// Tree Blocks
// =============================================================================

/// An index node mapping starting virtual offsets to child blocks.
///
/// Mappings are appended in write order, which keeps them sorted by
/// `virtual_addr` because inner files only grow at the end.
#[derive(Debug, Clone)]
pub struct TreeBlock {
    pub prev: i64,
    pub self_loc: i64,
    pub next: i64,
    pub count: i32,
    pub up: i64,
    pub mappings: Vec<LocationMap>,
    max_mappings: i32,
}

impl TreeBlock {
    /// Mappings that fit in a block of `block_size` payload bytes.
    pub fn max_mappings_for(block_size: i32) -> i32 {
        (block_size - 16) / 16
    }

    pub fn new(block_size: i32) -> Self {
        TreeBlock {
            prev: INVALID_LOCATION,
            self_loc: INVALID_LOCATION,
            next: INVALID_LOCATION,
            count: 0,
            up: INVALID_LOCATION,
            mappings: Vec::new(),
            max_mappings: Self::max_mappings_for(block_size),
        }
    }

    pub fn max_mappings(&self) -> i32 {
        self.max_mappings
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.max_mappings
    }

    /// Append a mapping. The caller checks `is_full` first; offsets only
    /// grow, so appending keeps the array sorted.
    pub fn push(&mut self, map: LocationMap) {
        self.mappings.push(map);
        self.count += 1;
    }

    pub fn from_raw(raw: &RawBlock, block_size: i32) -> Result<Self> {
        if raw.kind != BlockKind::Tree {
            return Err(PvfsError::Corruption(format!(
                "expected tree block at {:#x}, found {:?}",
                raw.self_loc, raw.kind
            )));
        }
        let max_mappings = Self::max_mappings_for(block_size);
        if raw.count < 0 || raw.count > max_mappings {
            return Err(PvfsError::Corruption(format!(
                "tree block at {:#x} claims {} mappings, limit {}",
                raw.self_loc, raw.count, max_mappings
            )));
        }
        let mut cursor = Cursor::new(raw.payload.as_slice());
        let up = cursor.read_i64::<LittleEndian>()?;
        let mut mappings = Vec::with_capacity(raw.count as usize);
        for _ in 0..raw.count {
            let virtual_addr = cursor.read_i64::<LittleEndian>()?;
            let block_loc = cursor.read_i64::<LittleEndian>()?;
            mappings.push(LocationMap { virtual_addr, block_loc });
        }
        Ok(TreeBlock {
            prev: raw.prev,
            self_loc: raw.self_loc,
            next: raw.next,
            count: raw.count,
            up,
            mappings,
            max_mappings,
        })
    }

    pub fn to_raw(&self, block_size: i32) -> Result<RawBlock> {
        let mut payload = vec![0u8; block_size as usize];
        let mut cursor = Cursor::new(payload.as_mut_slice());
        cursor.write_i64::<LittleEndian>(self.up)?;
        for map in &self.mappings {
            cursor.write_i64::<LittleEndian>(map.virtual_addr)?;
            cursor.write_i64::<LittleEndian>(map.block_loc)?;
        }
        Ok(RawBlock {
            kind: BlockKind::Tree,
            prev: self.prev,
            self_loc: self.self_loc,
            next: self.next,
            count: self.count,
            payload,
        })
    }
}

// =============================================================================
// File Table Blocks
// =============================================================================

/// One link of the file table chain.
#[derive(Debug, Clone)]
pub struct FileBlock {
    pub prev: i64,
    pub self_loc: i64,
    pub next: i64,
    pub count: i32,
    pub files: Vec<FileEntry>,
    max_files: i32,
}

impl FileBlock {
    /// Entries that fit in a block of `block_size` payload bytes.
    pub fn max_files_for(block_size: i32) -> i32 {
        block_size / (16 + MAX_FILENAME_LEN as i32)
    }

    pub fn new(block_size: i32) -> Self {
        FileBlock {
            prev: INVALID_LOCATION,
            self_loc: INVALID_LOCATION,
            next: INVALID_LOCATION,
            count: 0,
            files: Vec::new(),
            max_files: Self::max_files_for(block_size),
        }
    }

    pub fn max_files(&self) -> i32 {
        self.max_files
    }

    pub fn is_full(&self) -> bool {
        self.count >= self.max_files
    }

    pub fn push(&mut self, entry: FileEntry) {
        self.files.push(entry);
        self.count += 1;
    }

    pub fn from_raw(raw: &RawBlock, block_size: i32) -> Result<Self> {
        if raw.kind != BlockKind::File {
            return Err(PvfsError::Corruption(format!(
                "expected file table block at {:#x}, found {:?}",
                raw.self_loc, raw.kind
            )));
        }
        let max_files = Self::max_files_for(block_size);
        if raw.count < 0 || raw.count > max_files {
            return Err(PvfsError::Corruption(format!(
                "file table block at {:#x} claims {} entries, limit {}",
                raw.self_loc, raw.count, max_files
            )));
        }
        let mut cursor = Cursor::new(raw.payload.as_slice());
        let mut files = Vec::with_capacity(raw.count as usize);
        for _ in 0..raw.count {
            let start_block = cursor.read_i64::<LittleEndian>()?;
            let size = cursor.read_i64::<LittleEndian>()?;
            let filename = cursor.read_name()?;
            files.push(FileEntry { start_block, size, filename });
        }
        Ok(FileBlock {
            prev: raw.prev,
            self_loc: raw.self_loc,
            next: raw.next,
            count: raw.count,
            files,
            max_files,
        })
    }

    pub fn to_raw(&self, block_size: i32) -> Result<RawBlock> {
        let mut payload = vec![0u8; block_size as usize];
        let mut cursor = Cursor::new(payload.as_mut_slice());
        for entry in &self.files {
            cursor.write_i64::<LittleEndian>(entry.start_block)?;
            cursor.write_i64::<LittleEndian>(entry.size)?;
            cursor.write_name(&entry.filename)?;
        }
        Ok(RawBlock {
            kind: BlockKind::File,
            prev: self.prev,
            self_loc: self.self_loc,
            next: self.next,
            count: self.count,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK_SIZE: i32 = 4096 - 29;

    #[test]
    fn test_raw_round_trip() {
        let mut raw = RawBlock::new(BLOCK_SIZE);
        raw.kind = BlockKind::Data;
        raw.prev = 0x400;
        raw.self_loc = 0x1400;
        raw.next = INVALID_LOCATION;
        raw.count = 7;
        raw.payload[0] = 0xAB;

        let bytes = raw.encode().unwrap();
        assert_eq!(bytes.len(), 29 + BLOCK_SIZE as usize);
        assert_eq!(bytes[0], 1); // type tag

        let back = RawBlock::decode(&bytes, BLOCK_SIZE).unwrap();
        assert_eq!(back.kind, BlockKind::Data);
        assert_eq!(back.prev, 0x400);
        assert_eq!(back.self_loc, 0x1400);
        assert_eq!(back.next, INVALID_LOCATION);
        assert_eq!(back.count, 7);
        assert_eq!(back.payload[0], 0xAB);
    }

    #[test]
    fn test_bad_type_tag_rejected() {
        let mut raw = RawBlock::new(BLOCK_SIZE);
        raw.kind = BlockKind::Data;
        let mut bytes = raw.encode().unwrap();
        bytes[0] = 9;
        assert!(matches!(
            RawBlock::decode(&bytes, BLOCK_SIZE),
            Err(crate::PvfsError::Corruption(_))
        ));
    }

    #[test]
    fn test_data_block_round_trip() {
        let mut data = DataBlock::new(BLOCK_SIZE);
        data.self_loc = 0x400;
        data.tree = 0x2400;
        data.count = 3;
        data.data[..3].copy_from_slice(b"abc");

        let raw = data.to_raw().unwrap();
        let back = DataBlock::from_raw(&raw).unwrap();
        assert_eq!(back.tree, 0x2400);
        assert_eq!(back.count, 3);
        assert_eq!(&back.data[..3], b"abc");
        assert_eq!(back.capacity(), BLOCK_SIZE - 8);
    }

    #[test]
    fn test_tree_block_round_trip() {
        let mut tree = TreeBlock::new(BLOCK_SIZE);
        tree.self_loc = 0x400;
        tree.up = INVALID_LOCATION;
        tree.push(LocationMap { virtual_addr: 0, block_loc: 0x1400 });
        tree.push(LocationMap { virtual_addr: 4067, block_loc: 0x2400 });

        let raw = tree.to_raw(BLOCK_SIZE).unwrap();
        let back = TreeBlock::from_raw(&raw, BLOCK_SIZE).unwrap();
        assert_eq!(back.count, 2);
        assert_eq!(back.mappings[1].virtual_addr, 4067);
        assert_eq!(back.mappings[1].block_loc, 0x2400);
        assert_eq!(back.max_mappings(), (BLOCK_SIZE - 16) / 16);
    }

    #[test]
    fn test_file_block_round_trip() {
        let mut block = FileBlock::new(BLOCK_SIZE);
        block.self_loc = 0x400;
        block.push(FileEntry::with_name("alpha.index").unwrap());
        block.push(FileEntry::with_name("alpha.idat").unwrap());

        let raw = block.to_raw(BLOCK_SIZE).unwrap();
        let back = FileBlock::from_raw(&raw, BLOCK_SIZE).unwrap();
        assert_eq!(back.count, 2);
        assert_eq!(back.files[0].name(), "alpha.index");
        assert_eq!(back.files[1].name(), "alpha.idat");
    }

    #[test]
    fn test_file_block_count_overflow_rejected() {
        let block = FileBlock::new(BLOCK_SIZE);
        let mut raw = block.to_raw(BLOCK_SIZE).unwrap();
        raw.count = FileBlock::max_files_for(BLOCK_SIZE) + 1;
        assert!(matches!(
            FileBlock::from_raw(&raw, BLOCK_SIZE),
            Err(crate::PvfsError::Corruption(_))
        ));
    }
}
