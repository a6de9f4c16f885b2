//! In-memory chunk writer.

use crate::errors::FormatError;
use crate::event::EventJson;
use crate::frame::{BlockHeader, FrameKind, RecordFrame, MAX_BLOCK_BODY_SIZE};

/// Builds the bytes of one chunk object, block by block.
///
/// Chunks live in an object store and are uploaded whole, so the writer
/// accumulates bytes in memory instead of appending to a file.
///
/// # Example
///
/// ```rust
/// use changefeed_format::ChunkWriter;
/// use serde_json::json;
///
/// let mut writer = ChunkWriter::new();
/// let first = writer.append_block(&[json!({"id": "1", "eventType": "BlobCreated"})])?;
/// let second = writer.append_block(&[json!({"id": "2", "eventType": "BlobDeleted"})])?;
/// assert_eq!(first, 0);
/// assert!(second > first);
/// assert_eq!(writer.block_count(), 2);
/// let bytes = writer.into_bytes();
/// assert!(!bytes.is_empty());
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct ChunkWriter {
    buf: Vec<u8>,
    blocks: usize,
}

impl ChunkWriter {
    /// Creates an empty chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a block holding `events` and returns the byte offset it starts at.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`](crate::FormatError) if:
    /// - JSON serialization fails
    /// - A payload or the block body exceeds its size limit
    pub fn append_block(&mut self, events: &[EventJson]) -> Result<u64, FormatError> {
        let frames = events
            .iter()
            .map(|event| Ok((FrameKind::EventJson, serde_json::to_vec(event)?)))
            .collect::<Result<Vec<_>, FormatError>>()?;
        self.append_raw_block(&frames)
    }

    /// Appends a block built from raw frames and returns the byte offset it starts at.
    pub fn append_raw_block(&mut self, frames: &[(FrameKind, Vec<u8>)]) -> Result<u64, FormatError> {
        let mut body = Vec::new();
        for (kind, payload) in frames {
            let frame = RecordFrame::new(*kind, payload.len() as u32)?;
            body.extend_from_slice(&frame.to_bytes());
            body.extend_from_slice(payload);
        }

        if body.len() as u64 > MAX_BLOCK_BODY_SIZE as u64 {
            return Err(FormatError::BlockTooLarge {
                size: body.len() as u64,
                max: MAX_BLOCK_BODY_SIZE,
            });
        }

        let header = BlockHeader::new(frames.len() as u32, body.len() as u32)?;
        let offset = self.buf.len() as u64;
        self.buf.extend_from_slice(&header.to_bytes());
        self.buf.extend_from_slice(&body);
        self.blocks += 1;

        Ok(offset)
    }

    /// Number of blocks appended so far.
    pub fn block_count(&self) -> usize {
        self.blocks
    }

    /// Current length of the chunk in bytes.
    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    /// Returns true if no block has been appended.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Finishes the chunk and returns its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}
