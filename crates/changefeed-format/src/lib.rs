//! Framed block format for change feed chunk objects.
//!
//! A chunk is an append-only object made of self-describing blocks. Each
//! block carries a 16-byte header followed by record frames, and every
//! record is a JSON change event.
//!
//! This crate provides:
//! - Block and frame headers with strict validation
//! - The [`BlockDecoder`] capability and its default [`FramedBlockDecoder`]
//! - [`ChunkWriter`] for producing chunk bytes in memory
//!
//! ## Quick Start
//!
//! ```rust
//! use changefeed_format::{decode_chunk, ChunkWriter, FramedBlockDecoder};
//! use serde_json::json;
//!
//! let mut writer = ChunkWriter::new();
//! writer.append_block(&[json!({"id": "1", "eventType": "BlobCreated"})])?;
//! writer.append_block(&[json!({"id": "2", "eventType": "BlobDeleted"})])?;
//! let bytes = writer.into_bytes();
//!
//! let (blocks, end) = decode_chunk(&FramedBlockDecoder, &bytes)?;
//! assert_eq!(blocks.len(), 2);
//! assert_eq!(end, bytes.len() as u64);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]

/// Block decoding capability and default decoder.
pub mod decoder;
/// Error types for format operations.
pub mod errors;
/// Event JSON type alias and helpers.
pub mod event;
/// Block and frame headers.
pub mod frame;
/// In-memory chunk writer.
pub mod writer;

pub use decoder::{decode_chunk, BlockDecode, BlockDecoder, DecodedBlock, FramedBlockDecoder};
pub use errors::FormatError;
pub use event::{is_change_event, EventJson};
pub use frame::{BlockHeader, FrameKind, RecordFrame};
pub use writer::ChunkWriter;
