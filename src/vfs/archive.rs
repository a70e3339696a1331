//! Archive core
//!
//! Owns the host file, the archive header, the append-only block allocator,
//! and the file table chain.
//!
//! ## Concurrency
//! - The host `File` sits behind a `parking_lot::Mutex`; every positioned
//!   block read or write holds it for the whole seek + I/O pair, so blocks
//!   are always observed and written atomically.
//! - Read-modify-write sequences on the table chain hold a dedicated table
//!   lock: entries for different files share table blocks.
//! - Handles shared with a background writer are additionally wrapped in
//!   their own mutex by the caller.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use parking_lot::Mutex;

use crate::error::{PvfsError, Result};

use super::block::{DataBlock, FileBlock, LocationMap, RawBlock, TreeBlock};
use super::file::FileHandle;
use super::{
    FileEntry, Version, BLOCK_HEADER_SIZE, DEFAULT_BLOCK_SIZE, EOF_MARKER, HEADER_SIZE,
    INVALID_LOCATION, MAGIC,
};

/// Mutable state guarded by the archive lock
struct Inner {
    file: File,
    /// Offset at which the next allocated block starts. The EOF sentinel
    /// byte lives exactly here.
    next_block: i64,
}

/// Everything an archive shares between its handles.
struct Shared {
    inner: Mutex<Inner>,
    /// Serializes read-modify-write sequences on the file table chain.
    table_lock: Mutex<()>,
    block_size: i32,
    version: Version,
    table_loc: i64,
    read_only: bool,
}

/// An open archive.
///
/// `Vfs` is a cheap clone; every clone and every open handle shares the
/// same host file and locks. Geometry values (block size, fan-outs) are
/// immutable after open and readable without any lock.
#[derive(Clone)]
pub struct Vfs {
    shared: Arc<Shared>,
}

impl Vfs {
    // =========================================================================
    // Creation / Opening
    // =========================================================================

    /// Create a fresh archive with the default block size, truncating any
    /// existing file at `path`.
    pub fn create(path: &Path) -> Result<Vfs> {
        Self::create_with_block_size(path, DEFAULT_BLOCK_SIZE)
    }

    /// Create a fresh archive. `block_size` is the payload size; the full
    /// on-disk block adds the 29-byte header.
    pub fn create_with_block_size(path: &Path, block_size: i32) -> Result<Vfs> {
        if block_size < 16 + MAX_ENTRY_BYTES {
            return Err(PvfsError::ArgNull("block size too small"));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        let version = Version::current();
        let vfs = Vfs {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner { file, next_block: HEADER_SIZE }),
                table_lock: Mutex::new(()),
                block_size,
                version,
                table_loc: HEADER_SIZE,
                read_only: false,
            }),
        };

        // Write the header; the gap up to the first block reads as zeros.
        {
            let mut header = Vec::with_capacity(20);
            header.write_all(MAGIC)?;
            header.write_u8(version.major)?;
            header.write_u8(version.minor)?;
            header.write_u16::<LittleEndian>(version.revision)?;
            header.write_i32::<LittleEndian>(block_size)?;
            header.write_i64::<LittleEndian>(HEADER_SIZE)?;

            let mut inner = vfs.shared.inner.lock();
            inner.file.seek(SeekFrom::Start(0))?;
            inner.file.write_all(&header)?;
        }

        // First block is the (empty) file table.
        let table_loc = vfs.allocate_block()?;
        let mut table = FileBlock::new(block_size);
        table.self_loc = table_loc;
        vfs.write_file_block(&table)?;

        tracing::debug!(path = %path.display(), block_size, "created archive");
        Ok(vfs)
    }

    /// Open an existing archive for reading and writing.
    pub fn open(path: &Path) -> Result<Vfs> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Self::open_with(file, false, path)
    }

    /// Open an existing archive for reading only. Any write attempt fails.
    pub fn open_read_only(path: &Path) -> Result<Vfs> {
        let file = OpenOptions::new().read(true).open(path)?;
        Self::open_with(file, true, path)
    }

    fn open_with(mut file: File, read_only: bool, path: &Path) -> Result<Vfs> {
        file.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(PvfsError::Corruption(format!(
                "bad archive magic {magic:02x?} in {}",
                path.display()
            )));
        }

        let version = Version {
            major: file.read_u8()?,
            minor: file.read_u8()?,
            revision: file.read_u16::<LittleEndian>()?,
        };
        let block_size = file.read_i32::<LittleEndian>()?;
        let table_loc = file.read_i64::<LittleEndian>()?;
        if block_size <= 0 || table_loc != HEADER_SIZE {
            return Err(PvfsError::Corruption(format!(
                "implausible archive header: block_size={block_size}, table_loc={table_loc}"
            )));
        }

        // The byte past the last block is the EOF sentinel.
        let next_block = file.metadata()?.len() as i64 - 1;

        tracing::debug!(path = %path.display(), block_size, read_only, "opened archive");
        Ok(Vfs {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner { file, next_block }),
                table_lock: Mutex::new(()),
                block_size,
                version,
                table_loc,
                read_only,
            }),
        })
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    pub fn block_size(&self) -> i32 {
        self.shared.block_size
    }

    pub fn version(&self) -> Version {
        self.shared.version
    }

    pub fn is_read_only(&self) -> bool {
        self.shared.read_only
    }

    /// Data bytes per leaf block (payload minus the tree back-pointer)
    pub fn data_capacity(&self) -> i32 {
        DataBlock::capacity_for(self.shared.block_size)
    }

    /// Mappings per tree block
    pub fn max_mappings(&self) -> i32 {
        TreeBlock::max_mappings_for(self.shared.block_size)
    }

    /// File entries per table block
    pub fn max_files(&self) -> i32 {
        FileBlock::max_files_for(self.shared.block_size)
    }

    // =========================================================================
    // Block I/O
    // =========================================================================

    /// Claim the next block-sized region at the tail of the host file and
    /// move the EOF sentinel past it. Returns the new block's offset.
    pub fn allocate_block(&self) -> Result<i64> {
        self.check_writable()?;
        let mut inner = self.shared.inner.lock();
        let loc = inner.next_block;
        inner.next_block += self.shared.block_size as i64 + BLOCK_HEADER_SIZE;
        let sentinel_at = inner.next_block;
        inner.file.seek(SeekFrom::Start(sentinel_at as u64))?;
        inner.file.write_all(&[EOF_MARKER])?;
        Ok(loc)
    }

    pub fn read_raw_block(&self, address: i64) -> Result<RawBlock> {
        if address == INVALID_LOCATION {
            return Err(PvfsError::ArgNull("read at invalid block location"));
        }
        let mut bytes = vec![0u8; (BLOCK_HEADER_SIZE + self.shared.block_size as i64) as usize];
        {
            let mut inner = self.shared.inner.lock();
            inner.file.seek(SeekFrom::Start(address as u64))?;
            inner.file.read_exact(&mut bytes)?;
        }
        RawBlock::decode(&bytes, self.shared.block_size)
    }

    pub fn write_raw_block(&self, block: &RawBlock) -> Result<()> {
        self.check_writable()?;
        if block.self_loc == INVALID_LOCATION {
            return Err(PvfsError::ArgNull("write at invalid block location"));
        }
        let bytes = block.encode()?;
        let mut inner = self.shared.inner.lock();
        inner.file.seek(SeekFrom::Start(block.self_loc as u64))?;
        inner.file.write_all(&bytes)?;
        Ok(())
    }

    pub fn read_data_block(&self, address: i64) -> Result<DataBlock> {
        DataBlock::from_raw(&self.read_raw_block(address)?)
    }

    pub fn read_tree_block(&self, address: i64) -> Result<TreeBlock> {
        TreeBlock::from_raw(&self.read_raw_block(address)?, self.shared.block_size)
    }

    pub fn read_file_block(&self, address: i64) -> Result<FileBlock> {
        FileBlock::from_raw(&self.read_raw_block(address)?, self.shared.block_size)
    }

    pub fn write_data_block(&self, block: &DataBlock) -> Result<()> {
        self.write_raw_block(&block.to_raw()?)
    }

    pub fn write_tree_block(&self, block: &TreeBlock) -> Result<()> {
        self.write_raw_block(&block.to_raw(self.shared.block_size)?)
    }

    pub fn write_file_block(&self, block: &FileBlock) -> Result<()> {
        self.write_raw_block(&block.to_raw(self.shared.block_size)?)
    }

    /// Force everything the OS is buffering onto the disk.
    pub fn sync(&self) -> Result<()> {
        let inner = self.shared.inner.lock();
        inner.file.sync_all()?;
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        if self.shared.read_only {
            return Err(PvfsError::ArgNull("archive opened read-only"));
        }
        Ok(())
    }

    /// Hold this across any read-modify-write of a table block.
    pub(super) fn lock_table(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.shared.table_lock.lock()
    }

    // =========================================================================
    // File Table
    // =========================================================================

    /// Create a named inner file and return a handle positioned at offset 0.
    ///
    /// The name is not checked for uniqueness; `open_inner` resolves
    /// duplicates by first match, which is what re-creation after delete
    /// relies on.
    pub fn create_inner(&self, name: &str) -> Result<FileHandle> {
        self.check_writable()?;
        let entry_name = FileEntry::with_name(name)?;
        let _table_guard = self.lock_table();

        // Find the last table block, growing the chain if it is full.
        let mut table = self.read_file_block(self.shared.table_loc)?;
        while table.next != INVALID_LOCATION {
            table = self.read_file_block(table.next)?;
        }
        if table.is_full() {
            let new_loc = self.allocate_block()?;
            let mut fresh = FileBlock::new(self.shared.block_size);
            fresh.self_loc = new_loc;
            fresh.prev = table.self_loc;
            table.next = new_loc;
            self.write_file_block(&table)?;
            self.write_file_block(&fresh)?;
            table = fresh;
        }

        // Root tree plus the first (empty) data block.
        let root_loc = self.allocate_block()?;
        let data_loc = self.allocate_block()?;

        let mut data = DataBlock::new(self.shared.block_size);
        data.self_loc = data_loc;
        data.tree = root_loc;
        self.write_data_block(&data)?;

        let mut root = TreeBlock::new(self.shared.block_size);
        root.self_loc = root_loc;
        root.up = INVALID_LOCATION;
        root.push(LocationMap { virtual_addr: 0, block_loc: data_loc });
        self.write_tree_block(&root)?;

        let mut entry = entry_name;
        entry.start_block = root_loc;
        entry.size = 0;

        let table_index = table.count;
        table.push(entry);
        self.write_file_block(&table)?;

        let mut handle =
            FileHandle::new(self.clone(), entry, data, root, table.self_loc, table_index);
        handle.seek_to(0)?;
        Ok(handle)
    }

    /// Open a named inner file. The first exact match in the table chain
    /// wins. Fails with `FileNotOpened` when the name is absent.
    pub fn open_inner(&self, name: &str) -> Result<FileHandle> {
        if name.is_empty() {
            return Err(PvfsError::ArgNull("empty filename"));
        }
        let mut address = self.shared.table_loc;
        while address != INVALID_LOCATION {
            let table = self.read_file_block(address)?;
            for (i, entry) in table.files.iter().enumerate() {
                if entry.name() == name {
                    let mut handle = FileHandle::new(
                        self.clone(),
                        *entry,
                        DataBlock::new(self.shared.block_size),
                        TreeBlock::new(self.shared.block_size),
                        table.self_loc,
                        i as i32,
                    );
                    handle.seek_to(0)?;
                    return Ok(handle);
                }
            }
            address = table.next;
        }
        Err(PvfsError::FileNotOpened)
    }

    /// Tombstone a file by zeroing its name in every matching entry. The
    /// blocks it owned stay allocated.
    pub fn delete_inner(&self, name: &str) -> Result<()> {
        self.check_writable()?;
        if name.is_empty() {
            return Err(PvfsError::ArgNull("empty filename"));
        }
        let _table_guard = self.lock_table();
        let mut deleted = false;
        let mut address = self.shared.table_loc;
        while address != INVALID_LOCATION {
            let mut table = self.read_file_block(address)?;
            let mut touched = false;
            for entry in table.files.iter_mut() {
                if entry.name() == name {
                    entry.filename = [0u8; super::MAX_FILENAME_LEN];
                    touched = true;
                }
            }
            if touched {
                self.write_file_block(&table)?;
                deleted = true;
            }
            address = table.next;
        }
        if deleted {
            Ok(())
        } else {
            Err(PvfsError::FileNotOpened)
        }
    }

    /// True when the name exists anywhere in the table chain.
    pub fn has_file(&self, name: &str) -> bool {
        let mut address = self.shared.table_loc;
        while address != INVALID_LOCATION {
            let table = match self.read_file_block(address) {
                Ok(t) => t,
                Err(_) => return false,
            };
            if table.files.iter().any(|e| e.name() == name) {
                return true;
            }
            address = table.next;
        }
        false
    }

    /// Names of all live inner files. An entry only counts when it can
    /// actually be opened, so half-written table state is skipped.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut address = self.shared.table_loc;
        while address != INVALID_LOCATION {
            let table = self.read_file_block(address)?;
            for entry in &table.files {
                if entry.is_blank() {
                    continue;
                }
                let name = entry.name();
                match self.open_inner(&name) {
                    Ok(_) => names.push(name),
                    Err(PvfsError::FileNotOpened) => continue,
                    Err(e) => {
                        tracing::warn!(file = %name, error = %e, "skipping unreadable entry");
                        continue;
                    }
                }
            }
            address = table.next;
        }
        Ok(names)
    }

    // =========================================================================
    // Import / Export
    // =========================================================================

    /// Copy a host-OS file into the archive under `name`.
    pub fn add_file(&self, name: &str, source: &Path) -> Result<()> {
        let mut input = File::open(source).map_err(|_| PvfsError::FileNotOpened)?;
        let mut handle = self.create_inner(name)?;
        let mut buffer = [0u8; 1024];
        loop {
            let n = input.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            handle.write_bytes(&buffer[..n])?;
        }
        handle.flush(false)?;
        Ok(())
    }

    /// Copy an inner file out to a host-OS path.
    pub fn extract_file(&self, name: &str, destination: &Path) -> Result<()> {
        let mut handle = self.open_inner(name)?;
        let mut output = File::create(destination)?;
        let mut buffer = [0u8; 1024];
        loop {
            let n = handle.read_bytes(&mut buffer)?;
            if n == 0 {
                break;
            }
            output.write_all(&buffer[..n])?;
        }
        Ok(())
    }
}

/// Smallest payload that can still hold one file table entry.
const MAX_ENTRY_BYTES: i32 = 16 + super::MAX_FILENAME_LEN as i32;
