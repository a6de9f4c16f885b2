//! Resumable position in the change feed.
//!
//! A cursor narrows level by level: log (end time only), segment, shard, and
//! finally a position inside one chunk. Every transition produces a new
//! value; cursors are never mutated in place.
//!
//! Because the shards of a segment are merged concurrently, the cursor keeps
//! the last emitted position of every shard that has produced an event, not
//! only of the current one. Resuming restarts shards without a position from
//! their beginning.

use std::fmt;
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChangeFeedError, Result};

/// Version written into every serialized cursor.
pub const CURSOR_VERSION: u32 = 1;

/// Position reached within one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardCursor {
    /// Shard the position belongs to.
    pub shard_path: String,
    /// Chunk holding the last emitted record.
    pub chunk_path: String,
    /// Byte offset of the block holding the last emitted record.
    pub block_offset: u64,
    /// Index of the next record to emit within that block.
    pub record_index: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentPosition {
    segment_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    current_shard: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    shards: Vec<ShardCursor>,
}

/// Serializable position descriptor for resuming a change feed read.
///
/// # Example
///
/// ```rust
/// use changefeed::ChangeFeedCursor;
/// use chrono::{TimeZone, Utc};
///
/// let cursor = ChangeFeedCursor::new(None)
///     .derive_segment_cursor(Utc.with_ymd_and_hms(2021, 1, 1, 1, 0, 0).unwrap())
///     .derive_shard_cursor("log/00/2021/01/01/0100/")
///     .derive_chunk_cursor("log/00/2021/01/01/0100/00000.cfb", 0, 3);
///
/// let token = cursor.serialize()?;
/// assert_eq!(changefeed::ChangeFeedCursor::deserialize(&token)?, cursor);
/// # Ok::<(), changefeed::ChangeFeedError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFeedCursor {
    version: u32,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    segment: Option<SegmentPosition>,
}

impl ChangeFeedCursor {
    /// Creates a log-level cursor bounded by `end_time` (`None` = unbounded).
    pub fn new(end_time: Option<DateTime<Utc>>) -> Self {
        Self {
            version: CURSOR_VERSION,
            end_time,
            segment: None,
        }
    }

    /// Narrows the cursor to the start of one segment, keeping the end time.
    pub fn derive_segment_cursor(&self, segment_time: DateTime<Utc>) -> Self {
        Self {
            version: self.version,
            end_time: self.end_time,
            segment: Some(SegmentPosition {
                segment_time,
                current_shard: None,
                shards: Vec::new(),
            }),
        }
    }

    /// Narrows a segment cursor to one shard.
    ///
    /// Positions already recorded for other shards are kept. Has no effect on
    /// a cursor that is not scoped to a segment.
    pub fn derive_shard_cursor(&self, shard_path: &str) -> Self {
        let mut next = self.clone();
        if let Some(segment) = next.segment.as_mut() {
            segment.current_shard = Some(shard_path.to_string());
        }
        next
    }

    /// Records a position inside a chunk of the current shard.
    ///
    /// `record_index` is the index of the next record to emit in the block
    /// starting at `block_offset`. Has no effect on a cursor that is not
    /// scoped to a shard.
    pub fn derive_chunk_cursor(&self, chunk_path: &str, block_offset: u64, record_index: u64) -> Self {
        let mut next = self.clone();
        let Some(segment) = next.segment.as_mut() else {
            return next;
        };
        let Some(shard_path) = segment.current_shard.clone() else {
            return next;
        };

        let position = ShardCursor {
            shard_path,
            chunk_path: chunk_path.to_string(),
            block_offset,
            record_index,
        };
        match segment
            .shards
            .binary_search_by(|s| s.shard_path.cmp(&position.shard_path))
        {
            Ok(i) => segment.shards[i] = position,
            Err(i) => segment.shards.insert(i, position),
        }
        next
    }

    /// Upper time bound of the read; never crossed.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Time of the current segment, once inside one.
    pub fn segment_time(&self) -> Option<DateTime<Utc>> {
        self.segment.as_ref().map(|s| s.segment_time)
    }

    /// Path of the current shard, once inside one.
    pub fn shard_path(&self) -> Option<&str> {
        self.segment.as_ref()?.current_shard.as_deref()
    }

    /// Position of the current shard, once it has emitted an event.
    pub fn current_position(&self) -> Option<&ShardCursor> {
        self.shard_position(self.shard_path()?)
    }

    /// Chunk of the current shard's last emitted record.
    pub fn chunk_path(&self) -> Option<&str> {
        self.current_position().map(|p| p.chunk_path.as_str())
    }

    /// Block offset of the current shard's last emitted record.
    pub fn block_offset(&self) -> Option<u64> {
        self.current_position().map(|p| p.block_offset)
    }

    /// Index of the current shard's next record within its block.
    pub fn record_index(&self) -> Option<u64> {
        self.current_position().map(|p| p.record_index)
    }

    /// Recorded position of `shard_path` in the current segment.
    pub fn shard_position(&self, shard_path: &str) -> Option<&ShardCursor> {
        self.segment
            .as_ref()?
            .shards
            .iter()
            .find(|s| s.shard_path == shard_path)
    }

    /// All recorded shard positions of the current segment, sorted by shard.
    pub fn shard_positions(&self) -> &[ShardCursor] {
        self.segment
            .as_ref()
            .map(|s| s.shards.as_slice())
            .unwrap_or(&[])
    }

    /// Encodes the cursor as an opaque URL-safe token.
    pub fn serialize(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decodes a token produced by [`serialize`](Self::serialize).
    ///
    /// # Errors
    ///
    /// Returns [`ChangeFeedError::MalformedCursor`] if the token is not valid
    /// base64, not a cursor document, carries an unknown version, or records
    /// the same shard twice.
    pub fn deserialize(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| ChangeFeedError::MalformedCursor(format!("invalid encoding: {}", e)))?;
        let cursor: Self = serde_json::from_slice(&bytes)
            .map_err(|e| ChangeFeedError::MalformedCursor(format!("invalid document: {}", e)))?;

        if cursor.version != CURSOR_VERSION {
            return Err(ChangeFeedError::MalformedCursor(format!(
                "unsupported version {}, expected {}",
                cursor.version, CURSOR_VERSION
            )));
        }
        if let Some(segment) = &cursor.segment {
            let sorted = segment
                .shards
                .windows(2)
                .all(|pair| pair[0].shard_path < pair[1].shard_path);
            if !sorted {
                return Err(ChangeFeedError::MalformedCursor(
                    "shard positions are duplicated or out of order".to_string(),
                ));
            }
        }

        Ok(cursor)
    }
}

impl FromStr for ChangeFeedCursor {
    type Err = ChangeFeedError;

    fn from_str(s: &str) -> Result<Self> {
        Self::deserialize(s)
    }
}

impl fmt::Display for ChangeFeedCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.serialize() {
            Ok(token) => f.write_str(&token),
            Err(_) => Err(fmt::Error),
        }
    }
}
