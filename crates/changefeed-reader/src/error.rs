//! Error types for change feed reads.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur while reading the change feed.
#[derive(Error, Debug)]
pub enum ChangeFeedError {
    /// The container holding the change feed does not exist.
    #[error("change feed is not enabled: container '{container}' does not exist")]
    FeatureNotEnabled {
        /// Name of the missing container.
        container: String,
    },
    /// A continuation token could not be decoded.
    #[error("malformed cursor: {0}")]
    MalformedCursor(String),
    /// A segment manifest could not be read.
    #[error("corrupt segment {path}: {reason}")]
    CorruptSegment {
        /// Path of the segment manifest.
        path: String,
        /// Reason for the failure.
        reason: String,
    },
    /// A chunk contains data the decoder rejected.
    #[error("corrupt chunk {path} at offset {offset}: {reason}")]
    CorruptChunk {
        /// Path of the chunk object.
        path: String,
        /// Byte offset of the offending block.
        offset: u64,
        /// Reason for the failure.
        reason: String,
    },
    /// The control document holding the safe boundary is malformed.
    #[error("malformed control document {path}: {reason}")]
    MalformedControlDocument {
        /// Path of the control document.
        path: String,
        /// Reason for the failure.
        reason: String,
    },
    /// Requested page size is not a positive integer.
    #[error("invalid page size {0}: must be at least 1")]
    InvalidPageSize(usize),
    /// Object store error, passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// JSON encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for change feed operations.
pub type Result<T> = std::result::Result<T, ChangeFeedError>;
