//! Stream Caches
//!
//! The sample store moves bytes through two small caches per stream:
//!
//! - [`WriteCache`]: a double-buffered writer. The producer fills one
//!   buffer while a single background worker drains the other into the
//!   inner file, so steady-state appends never wait on disk.
//! - [`ReadCache`]: a one-buffer read-through cache for the item-at-offset
//!   access pattern of index scans and chunk reads.

pub mod read;
pub mod write;

pub use read::ReadCache;
pub use write::{AddResult, WriteCache};
