//! Error types for the tree, buffer and storage layers.

use crate::types::PageId;
use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while operating the index.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the underlying storage back-end.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A read addressed a physical page number past the end of the medium.
    #[error("page {0} not found")]
    PageNotFound(PageId),

    /// Supplied key does not match the configured fixed key width.
    #[error("key must be {expected} bytes, got {actual}")]
    WrongKeySize { expected: usize, actual: usize },

    /// Supplied data does not match the configured fixed data width.
    #[error("data must be {expected} bytes, got {actual}")]
    WrongDataSize { expected: usize, actual: usize },

    /// Caller inserted a key that does not strictly exceed the previous one.
    #[error("keys must be inserted in strictly increasing order")]
    OutOfOrder,

    /// Tree depth would exceed `MAX_LEVEL`.
    #[error("tree would grow past the maximum of {max} levels")]
    OutOfTreeCapacity { max: u8 },

    /// Buffer pool configuration cannot support the eviction contract.
    #[error("invalid buffer configuration: {0}")]
    BufferConfig(String),

    /// A page read back from storage failed a structural sanity check.
    #[error("corrupt page: {0}")]
    Corruption(String),

    /// Operation is not valid in the current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn buffer_config(msg: impl Into<String>) -> Self {
        Self::BufferConfig(msg.into())
    }
}
