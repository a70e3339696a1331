//! Indexed Sample Store
//!
//! Persists one channel of `f32` samples produced at a fixed data rate.
//! Each channel owns two inner files inside the archive: `<name>.index`
//! holds periodic time stamps pointing into `<name>.idat`, which holds the
//! raw samples grouped into CRC-guarded chunks.
//!
//! ## Responsibilities
//! - Append samples, inserting time stamps on the configured interval, on
//!   gaps, and around NaN runs
//! - Binary search by wall-clock time over the in-memory index
//! - Decimated range reads and sequential chunk traversal
//! - Double-buffered asynchronous writing via the stream caches
//!
//! ## Index File Layout
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Header (1024 bytes)                                       │
//! │   Magic (4) | Version (4) | DataType (4) | Datarate (4)   │
//! │   StartTime (16) | EndTime (16) | Interval (4) | zeros    │
//! ├───────────────────────────────────────────────────────────┤
//! │ Record (44 bytes, repeated)                               │
//! │   Marker 8 x 0xA5 | Time (16) | Reserved (8)              │
//! │   DataOffset (8) | CRC32 (4)                              │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data File Layout
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Chunk (repeated)                                          │
//! │   Marker 8 x 0xA5 | Time (16) | Reserved (8)              │
//! │   Samples: N x f32                                        │
//! │   CRC32 (4) over the samples, written when the next       │
//! │   chunk starts (final chunk: at close)                    │
//! └───────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod file;
pub mod header;
pub mod index;

pub use cache::IndexedFileCache;
pub use file::IndexedDataFile;
pub use header::IndexHeader;
pub use index::IndexEntry;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic number at the start of every index file
pub const INDEX_MAGIC: u32 = 0xFF01_FF01;

/// Index file format version
pub const INDEX_VERSION: u32 = 1;

/// Inner-file name suffixes for the two files of a channel
pub const INDEX_EXTENSION: &str = ".index";
pub const DATA_EXTENSION: &str = ".idat";

/// Index file header size; the first record starts here
pub const INDEX_HEADER_SIZE: i64 = 0x0400;

/// Size of one index record
pub const TIME_STAMP_SIZE: i64 = 44;

/// Chunk overhead including the trailing CRC of the previous chunk
pub const CHUNK_HEADER_SIZE: i64 = 36;

/// Chunk bytes before the first sample
pub const CHUNK_HEADER_BEFORE_DATA: i64 = 32;

/// Byte repeated eight times to delimit records and chunks
pub const UNIQUE_MARKER_BYTE: u8 = 0xA5;
pub const UNIQUE_MARKER_LEN: usize = 8;

/// `max_points` value requesting every sample in range
pub const ALL_POINTS: i64 = -1;

/// Default cache flush threshold: ten thousand samples
pub const DEFAULT_CACHE_SIZE: usize = 4 * 10_000;

/// Default wall-clock gap between index records
pub const DEFAULT_TIME_STAMP_INTERVAL_SECS: u32 = 10;
