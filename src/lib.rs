//! # pvfs
//!
//! A virtual file system held inside a single host-OS file, with an
//! indexed time-series sample store layered on top:
//! - Named inner files with file-like seek/read/write/flush semantics
//! - Fixed-size blocks indexed by a per-file tree with root promotion
//! - One `f32` channel per file pair, CRC-guarded and searchable by time
//! - Double-buffered asynchronous write caching off the producer thread
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   IndexedDataFile                            │
//! │        (append state machine, search, range reads)           │
//! └───────────┬─────────────────────────────────┬───────────────┘
//!             │                                 │
//!      ┌──────▼──────┐                   ┌──────▼──────┐
//!      │ WriteCache  │                   │  ReadCache  │
//!      │ (2 buffers, │                   │ (1 buffer)  │
//!      │  1 worker)  │                   └──────┬──────┘
//!      └──────┬──────┘                          │
//!             │                                 │
//! ┌───────────▼─────────────────────────────────▼───────────────┐
//! │                      FileHandle                              │
//! │         (seek / read / write / flush, tree growth)           │
//! └───────────────────────────┬─────────────────────────────────┘
//!                             │
//! ┌───────────────────────────▼─────────────────────────────────┐
//! │                          Vfs                                 │
//! │        (header, allocator, file table, block I/O)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod cache;
pub mod codec;
pub mod crc32;
pub mod store;
pub mod time;
pub mod vfs;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use crc32::Crc32;
pub use error::{PvfsError, Result};
pub use store::IndexedDataFile;
pub use time::HighTime;
pub use vfs::{FileHandle, Vfs};

// =============================================================================
// Version Info
// =============================================================================

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
