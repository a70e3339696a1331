//! Error types for pvfs
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using PvfsError
pub type Result<T> = std::result::Result<T, PvfsError>;

/// Unified error type for pvfs operations
#[derive(Debug, Error)]
pub enum PvfsError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("invalid argument: {0}")]
    ArgNull(&'static str),

    #[error("file not opened")]
    FileNotOpened,

    // -------------------------------------------------------------------------
    // Data Errors
    // -------------------------------------------------------------------------
    #[error("end of file")]
    Eof,

    #[error("corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    /// The write cache's background worker has not finished the previous
    /// buffer yet. The caller keeps its bytes and retries later.
    #[error("cache write already in progress")]
    WouldBlock,
}

impl PvfsError {
    /// Map into an `std::io::Error` for use behind the `io::Read`/`io::Write`
    /// trait impls on file handles.
    pub(crate) fn into_io(self) -> std::io::Error {
        match self {
            PvfsError::Io(e) => e,
            PvfsError::Eof => std::io::Error::new(std::io::ErrorKind::UnexpectedEof, self),
            PvfsError::Corruption(_) => std::io::Error::new(std::io::ErrorKind::InvalidData, self),
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}
