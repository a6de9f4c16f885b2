//! Block decoding.

use crate::errors::FormatError;
use crate::event::EventJson;
use crate::frame::{BlockHeader, FrameKind, RecordFrame, BLOCK_HEADER_SIZE, FRAME_HEADER_SIZE};

/// Outcome of decoding the block at the start of a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum BlockDecode {
    /// A whole block was decoded.
    Complete {
        /// Records of the block, in order.
        records: Vec<EventJson>,
        /// Number of bytes the block occupies; the next block starts here.
        consumed: u64,
    },
    /// The buffer ends before the block does.
    Incomplete {
        /// Minimum buffer length needed to make progress.
        needed: u64,
    },
}

/// Decoder capability for self-describing blocks.
///
/// Implementations receive a buffer that begins exactly at a block boundary
/// and must either decode the whole block, report how many bytes they need,
/// or fail on malformed input. Decoding is pure and never performs I/O.
pub trait BlockDecoder: Send + Sync {
    /// Decodes the block at the start of `buf`.
    fn decode_block(&self, buf: &[u8]) -> Result<BlockDecode, FormatError>;
}

/// Decoder for the framed `CFB1` block format.
///
/// Frames of unknown kind are skipped and do not count as records.
///
/// # Example
///
/// ```rust
/// use changefeed_format::{BlockDecode, BlockDecoder, ChunkWriter, FramedBlockDecoder};
/// use serde_json::json;
///
/// let mut writer = ChunkWriter::new();
/// writer.append_block(&[json!({"id": "a"}), json!({"id": "b"})])?;
/// let bytes = writer.into_bytes();
///
/// match FramedBlockDecoder.decode_block(&bytes)? {
///     BlockDecode::Complete { records, consumed } => {
///         assert_eq!(records.len(), 2);
///         assert_eq!(consumed, bytes.len() as u64);
///     }
///     BlockDecode::Incomplete { .. } => unreachable!(),
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FramedBlockDecoder;

impl BlockDecoder for FramedBlockDecoder {
    fn decode_block(&self, buf: &[u8]) -> Result<BlockDecode, FormatError> {
        if buf.len() < BLOCK_HEADER_SIZE {
            return Ok(BlockDecode::Incomplete {
                needed: BLOCK_HEADER_SIZE as u64,
            });
        }

        let header = BlockHeader::from_bytes(&buf[..BLOCK_HEADER_SIZE])?;
        let block_len = header.block_len();
        if (buf.len() as u64) < block_len {
            return Ok(BlockDecode::Incomplete { needed: block_len });
        }

        let body = &buf[BLOCK_HEADER_SIZE..block_len as usize];
        let records = decode_body(body, header.record_count)?;

        Ok(BlockDecode::Complete {
            records,
            consumed: block_len,
        })
    }
}

/// A block decoded from an in-memory chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBlock {
    /// Byte offset of the block within the chunk.
    pub offset: u64,
    /// Records of the block, in order.
    pub records: Vec<EventJson>,
}

/// Decodes every block of a chunk that is already fully in memory.
///
/// Returns the decoded blocks and the offset where decoding stopped. The
/// offset is less than `bytes.len()` only when the chunk ends with a
/// truncated block.
pub fn decode_chunk(
    decoder: &dyn BlockDecoder,
    bytes: &[u8],
) -> Result<(Vec<DecodedBlock>, u64), FormatError> {
    let mut blocks = Vec::new();
    let mut offset = 0u64;

    while (offset as usize) < bytes.len() {
        match decoder.decode_block(&bytes[offset as usize..])? {
            BlockDecode::Complete { records, consumed } => {
                blocks.push(DecodedBlock { offset, records });
                offset += consumed;
            }
            BlockDecode::Incomplete { .. } => break,
        }
    }

    Ok((blocks, offset))
}

fn decode_body(body: &[u8], record_count: u32) -> Result<Vec<EventJson>, FormatError> {
    let capacity = (record_count as usize).min(body.len() / FRAME_HEADER_SIZE);
    let mut records = Vec::with_capacity(capacity);
    let mut position = 0usize;

    for _ in 0..record_count {
        let offset = (BLOCK_HEADER_SIZE + position) as u64;
        let remaining = &body[position..];
        if remaining.len() < FRAME_HEADER_SIZE {
            return Err(FormatError::InvalidFrame {
                offset,
                reason: "frame header runs past block body".to_string(),
            });
        }

        let frame = RecordFrame::from_bytes(&remaining[..FRAME_HEADER_SIZE], offset)?;
        let payload_start = FRAME_HEADER_SIZE;
        let payload_end = payload_start + frame.len as usize;
        if remaining.len() < payload_end {
            return Err(FormatError::InvalidFrame {
                offset,
                reason: format!(
                    "payload of {} bytes runs past block body",
                    frame.len
                ),
            });
        }

        match frame.kind {
            FrameKind::EventJson => {
                let utf8_str = std::str::from_utf8(&remaining[payload_start..payload_end])?;
                let json: EventJson = serde_json::from_str(utf8_str)?;
                records.push(json);
            }
            FrameKind::Unknown(_) => {}
        }

        position += payload_end;
    }

    if position != body.len() {
        return Err(FormatError::InvalidFrame {
            offset: (BLOCK_HEADER_SIZE + position) as u64,
            reason: format!(
                "{} trailing bytes after {} frames",
                body.len() - position,
                record_count
            ),
        });
    }

    Ok(records)
}
