use thiserror::Error;

/// Errors that can occur while encoding or decoding chunk blocks.
#[derive(Error, Debug)]
pub enum FormatError {
    /// Invalid block header (magic, version, or flags).
    #[error("invalid block header: {0}")]
    InvalidBlockHeader(String),
    /// Invalid frame structure (kind, reserved bytes, or length).
    #[error("invalid frame at offset {offset}: {reason}")]
    InvalidFrame {
        /// Byte offset of the frame, relative to the start of the block.
        offset: u64,
        /// Reason for invalidity.
        reason: String,
    },
    /// Payload exceeds maximum size limit.
    #[error("payload size {size} exceeds maximum {max}")]
    PayloadTooLarge {
        /// Actual payload size.
        size: u32,
        /// Maximum allowed size.
        max: u32,
    },
    /// Block body exceeds maximum size limit.
    #[error("block body size {size} exceeds maximum {max}")]
    BlockTooLarge {
        /// Actual body size.
        size: u64,
        /// Maximum allowed size.
        max: u32,
    },
    /// Invalid UTF-8 in an event payload.
    #[error("invalid UTF-8 in event payload: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
    /// Invalid JSON in an event payload.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}
