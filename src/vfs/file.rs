//! Inner-file I/O
//!
//! A `FileHandle` is an exclusive cursor into one inner file. It keeps the
//! currently loaded data block and its owning tree block as private scratch
//! buffers; the disk is the only shared truth, so every hand-off point
//! (seek, block boundary, flush) rereads or rewrites through the archive.
//!
//! ## Responsibilities
//! - seek by virtual offset via tree descent
//! - sequential read/write across block boundaries
//! - flush of the table entry plus the loaded data/tree blocks
//! - tree growth, including root promotion, as the file extends

use std::io;

use crate::error::{PvfsError, Result};

use super::archive::Vfs;
use super::block::{BlockKind, DataBlock, LocationMap, TreeBlock};
use super::{FileEntry, INVALID_LOCATION};

/// Exclusive handle to one inner file.
pub struct FileHandle {
    vfs: Vfs,
    info: FileEntry,
    /// Virtual offset of the next byte to read or write. `-1` until the
    /// first seek positions the handle.
    current_offset: i64,
    /// Loaded leaf and cursor within it
    data: DataBlock,
    data_offset: i32,
    /// Most recently visited tree block
    tree: TreeBlock,
    /// Where this file's table entry lives
    table_block: i64,
    table_index: i32,
    dirty: bool,
    eof: bool,
}

impl FileHandle {
    pub(super) fn new(
        vfs: Vfs,
        info: FileEntry,
        data: DataBlock,
        tree: TreeBlock,
        table_block: i64,
        table_index: i32,
    ) -> Self {
        FileHandle {
            vfs,
            info,
            current_offset: -1,
            data,
            data_offset: 0,
            tree,
            table_block,
            table_index,
            dirty: false,
            eof: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> String {
        self.info.name()
    }

    /// Total bytes ever written, i.e. the virtual file length.
    pub fn size(&self) -> i64 {
        self.info.size
    }

    pub fn tell(&self) -> i64 {
        self.current_offset
    }

    /// True after a read hit the end of the file.
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    pub fn archive(&self) -> &Vfs {
        &self.vfs
    }

    // =========================================================================
    // Seek
    // =========================================================================

    /// Position the cursor at `address`, which must lie in `0..=size`.
    ///
    /// Descends the tree from the file's root, at each level taking the
    /// mapping with the largest starting offset not beyond `address`. On
    /// failure the cursor is left where it was.
    pub fn seek_to(&mut self, address: i64) -> Result<()> {
        if address < 0 || address > self.info.size {
            return Err(PvfsError::ArgNull("seek outside file"));
        }
        if address == self.current_offset {
            return Ok(());
        }

        // The loaded block may hold unwritten bytes.
        self.flush(false)?;

        let mut location = self.info.start_block;
        let mut raw = self.vfs.read_raw_block(location)?;
        let mut visited_tree: Option<TreeBlock> = None;
        let mut map_addr = 0i64;

        while raw.kind == BlockKind::Tree {
            let tree = TreeBlock::from_raw(&raw, self.vfs.block_size())?;
            if tree.count == 0 {
                return Err(PvfsError::Corruption(format!(
                    "empty tree block at {:#x}",
                    tree.self_loc
                )));
            }
            // Mappings are sorted ascending; take the last one at or below
            // the target. A single mapping is always followed.
            let mut chosen = tree.mappings[0];
            for map in &tree.mappings[1..] {
                if map.virtual_addr <= address {
                    chosen = *map;
                } else {
                    break;
                }
            }
            map_addr = chosen.virtual_addr;
            location = chosen.block_loc;
            visited_tree = Some(tree);
            raw = self.vfs.read_raw_block(location)?;
        }

        if raw.kind != BlockKind::Data {
            return Err(PvfsError::Corruption(format!(
                "tree descent reached {:?} block at {location:#x}",
                raw.kind
            )));
        }

        self.data = DataBlock::from_raw(&raw)?;
        if let Some(tree) = visited_tree {
            self.tree = tree;
        }
        self.current_offset = address;
        self.data_offset = (address - map_addr) as i32;
        self.eof = false;
        Ok(())
    }

    // =========================================================================
    // Read / Write
    // =========================================================================

    /// Copy bytes at the cursor into `buf`, following leaf links across
    /// block boundaries. Returns the bytes actually read; 0 marks the end
    /// of the file and latches the EOF flag.
    pub fn read_bytes(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.current_offset >= self.info.size {
            self.eof = true;
            return Ok(0);
        }

        let file_rem = (self.info.size - self.current_offset) as usize;
        let want = buf.len().min(file_rem);
        let mut done = 0usize;

        while done < want {
            let copy_rem = want - done;
            let block_rem = (self.data.capacity() - self.data_offset) as usize;
            if copy_rem < block_rem {
                let at = self.data_offset as usize;
                buf[done..done + copy_rem].copy_from_slice(&self.data.data[at..at + copy_rem]);
                done += copy_rem;
                self.data_offset += copy_rem as i32;
                self.current_offset += copy_rem as i64;
            } else {
                let at = self.data_offset as usize;
                buf[done..done + block_rem].copy_from_slice(&self.data.data[at..at + block_rem]);
                done += block_rem;
                self.current_offset += block_rem as i64;

                // Unwritten bytes in this block must land before we move on.
                self.flush(false)?;
                if done < want {
                    if self.data.next == INVALID_LOCATION {
                        tracing::warn!(
                            file = %self.info.name(),
                            offset = self.current_offset,
                            "leaf chain ended before file size"
                        );
                        return Ok(done);
                    }
                    self.data = self.vfs.read_data_block(self.data.next)?;
                    self.data_offset = 0;
                } else {
                    self.data_offset = self.data.capacity();
                }
            }
        }
        Ok(want)
    }

    /// Copy `buf` at the cursor, extending the file and growing the tree as
    /// blocks fill up. Always writes the whole buffer.
    pub fn write_bytes(&mut self, buf: &[u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.current_offset < 0 {
            return Err(PvfsError::FileNotOpened);
        }
        self.dirty = true;

        let mut done = 0usize;
        while done < buf.len() {
            let copy_rem = buf.len() - done;
            let block_rem = (self.data.capacity() - self.data_offset) as usize;
            if copy_rem < block_rem {
                let at = self.data_offset as usize;
                self.data.data[at..at + copy_rem].copy_from_slice(&buf[done..done + copy_rem]);
                done += copy_rem;
                self.data_offset += copy_rem as i32;
                self.current_offset += copy_rem as i64;
                if self.data_offset > self.data.count {
                    self.data.count = self.data_offset;
                }
                if self.current_offset > self.info.size {
                    self.info.size = self.current_offset;
                }
            } else {
                // Fill the block to capacity, persist it, then move to the
                // next leaf or grow the file by one block.
                let at = self.data_offset as usize;
                self.data.data[at..at + block_rem].copy_from_slice(&buf[done..done + block_rem]);
                done += block_rem;
                self.current_offset += block_rem as i64;
                self.data.count = self.data.capacity();
                if self.current_offset > self.info.size {
                    self.info.size = self.current_offset;
                }
                self.flush(false)?;
                self.data_offset = 0;

                if self.data.next == INVALID_LOCATION {
                    self.append_data_block()?;
                } else {
                    self.data = self.vfs.read_data_block(self.data.next)?;
                }
            }
        }
        Ok(buf.len())
    }

    /// Persist the table entry and the loaded data/tree blocks. A no-op on
    /// a clean handle. `commit` additionally forces an fsync of the host
    /// file.
    pub fn flush(&mut self, commit: bool) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.update_table_entry()?;
        self.vfs.write_data_block(&self.data)?;
        self.vfs.write_tree_block(&self.tree)?;
        if commit {
            self.vfs.sync()?;
        }
        self.dirty = false;
        Ok(())
    }

    // =========================================================================
    // Tree Growth
    // =========================================================================

    /// Allocate a fresh leaf chained after the current one and register it
    /// in the tree.
    fn append_data_block(&mut self) -> Result<()> {
        let new_loc = self.vfs.allocate_block()?;
        let mut fresh = DataBlock::new(self.vfs.block_size());
        fresh.self_loc = new_loc;
        fresh.prev = self.data.self_loc;
        fresh.tree = self.data.tree;

        self.data.next = new_loc;
        self.vfs.write_data_block(&self.data)?;
        self.vfs.write_data_block(&fresh)?;

        let tree_loc = fresh.tree;
        self.data = fresh;

        let tree = self.vfs.read_tree_block(tree_loc)?;
        let map = LocationMap {
            virtual_addr: self.current_offset,
            block_loc: new_loc,
        };
        self.tree_add_data(tree, map)
    }

    /// Insert `map` into `tree`, also keeping the loaded data block's
    /// back-pointer on the tree that ends up holding its mapping.
    fn tree_add_data(&mut self, mut tree: TreeBlock, map: LocationMap) -> Result<()> {
        if !tree.is_full() {
            tree.push(map);
            self.vfs.write_tree_block(&tree)?;
            self.data.tree = tree.self_loc;
            self.vfs.write_data_block(&self.data)?;
            self.tree = tree;
            return Ok(());
        }

        // Full: open a sibling for the new mapping and promote it upward.
        let parent_loc = tree.up;
        let mut sibling = TreeBlock::new(self.vfs.block_size());
        sibling.self_loc = self.vfs.allocate_block()?;
        sibling.up = parent_loc;
        sibling.push(map);

        self.data.tree = sibling.self_loc;
        self.vfs.write_data_block(&self.data)?;

        let promote = LocationMap {
            virtual_addr: self.current_offset,
            block_loc: sibling.self_loc,
        };

        if parent_loc != INVALID_LOCATION {
            self.vfs.write_tree_block(&sibling)?;
            let parent = self.vfs.read_tree_block(parent_loc)?;
            self.tree_add(parent, promote)
        } else {
            self.promote_root(tree, sibling, promote)
        }
    }

    /// Insert `map` into `tree`, splitting upward as needed.
    fn tree_add(&mut self, mut tree: TreeBlock, map: LocationMap) -> Result<()> {
        if !tree.is_full() {
            tree.push(map);
            self.vfs.write_tree_block(&tree)?;
            self.tree = tree;
            return Ok(());
        }

        let parent_loc = tree.up;
        let mut sibling = TreeBlock::new(self.vfs.block_size());
        sibling.self_loc = self.vfs.allocate_block()?;
        sibling.up = parent_loc;
        sibling.push(map);

        let promote = LocationMap {
            virtual_addr: self.current_offset,
            block_loc: sibling.self_loc,
        };

        if parent_loc != INVALID_LOCATION {
            self.vfs.write_tree_block(&sibling)?;
            let parent = self.vfs.read_tree_block(parent_loc)?;
            self.tree_add(parent, promote)
        } else {
            self.promote_root(tree, sibling, promote)
        }
    }

    /// The old root overflowed: allocate a new root above it holding the
    /// old root and the new sibling, and repoint the file's table entry.
    /// The entry update lands in the same pass so a reopened archive never
    /// sees a root without its file.
    fn promote_root(
        &mut self,
        mut old_root: TreeBlock,
        mut sibling: TreeBlock,
        promote: LocationMap,
    ) -> Result<()> {
        let mut root = TreeBlock::new(self.vfs.block_size());
        root.self_loc = self.vfs.allocate_block()?;
        root.up = INVALID_LOCATION;

        old_root.up = root.self_loc;
        self.vfs.write_tree_block(&old_root)?;

        root.push(LocationMap {
            virtual_addr: old_root.mappings[0].virtual_addr,
            block_loc: old_root.self_loc,
        });
        root.push(promote);

        sibling.up = root.self_loc;
        self.vfs.write_tree_block(&sibling)?;
        self.vfs.write_tree_block(&root)?;

        self.info.start_block = root.self_loc;
        self.update_table_entry()?;
        self.tree = sibling;
        Ok(())
    }

    fn update_table_entry(&mut self) -> Result<()> {
        let _table_guard = self.vfs.lock_table();
        let mut table = self.vfs.read_file_block(self.table_block)?;
        let index = self.table_index as usize;
        if index >= table.files.len() {
            return Err(PvfsError::Corruption(format!(
                "table entry {} missing from block at {:#x}",
                self.table_index, self.table_block
            )));
        }
        table.files[index] = self.info;
        self.vfs.write_file_block(&table)
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush(false) {
                tracing::error!(file = %self.info.name(), error = %e, "flush on close failed");
            }
        }
    }
}

// =============================================================================
// std::io Integration
// =============================================================================
//
// The handles speak the standard traits so byteorder's extension methods
// and generic copy helpers work on inner files directly.

impl io::Read for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_bytes(buf).map_err(PvfsError::into_io)
    }
}

impl io::Write for FileHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf).map_err(PvfsError::into_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        FileHandle::flush(self, false).map_err(PvfsError::into_io)
    }
}

impl io::Seek for FileHandle {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let target = match pos {
            io::SeekFrom::Start(n) => n as i64,
            io::SeekFrom::End(n) => self.info.size + n,
            io::SeekFrom::Current(n) => self.current_offset + n,
        };
        self.seek_to(target).map_err(PvfsError::into_io)?;
        Ok(target as u64)
    }
}
