//! Events emitted by the reader.

use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Serialize;

use changefeed_format::EventJson;

use crate::cursor::ChangeFeedCursor;
use crate::error::Result;

/// Where a record was read from.
///
/// `(chunk_path, block_offset, record_index)` identifies a record uniquely;
/// two events with the same triple are duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPosition {
    /// Shard the chunk belongs to.
    pub shard_path: String,
    /// Chunk object holding the record.
    pub chunk_path: String,
    /// Byte offset of the block holding the record.
    pub block_offset: u64,
    /// Index of the record within its block.
    pub record_index: u64,
}

/// One decoded change event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeFeedEvent {
    record: EventJson,
    position: EventPosition,
}

impl ChangeFeedEvent {
    /// Creates an event from a decoded record and its position.
    pub fn new(record: EventJson, position: EventPosition) -> Self {
        Self { record, position }
    }

    /// The decoded record.
    pub fn record(&self) -> &EventJson {
        &self.record
    }

    /// Consumes the event and returns the decoded record.
    pub fn into_record(self) -> EventJson {
        self.record
    }

    /// Where the record was read from.
    pub fn position(&self) -> &EventPosition {
        &self.position
    }

    /// The record's `id` field.
    pub fn id(&self) -> Option<&str> {
        self.str_field("id")
    }

    /// The record's `eventType` field.
    pub fn event_type(&self) -> Option<&str> {
        self.str_field("eventType")
    }

    /// The record's `subject` field.
    pub fn subject(&self) -> Option<&str> {
        self.str_field("subject")
    }

    /// The record's `eventTime` field, if present and RFC 3339.
    pub fn event_time(&self) -> Option<DateTime<Utc>> {
        let raw = self.str_field("eventTime")?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Returns true if both events were read from the same record.
    pub fn is_duplicate_of(&self, other: &ChangeFeedEvent) -> bool {
        self.position.chunk_path == other.position.chunk_path
            && self.position.block_offset == other.position.block_offset
            && self.position.record_index == other.position.record_index
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.record.get(name).and_then(|v| v.as_str())
    }
}

/// An event paired with the cursor to resume right after it.
#[derive(Debug, Clone, PartialEq)]
pub struct EventWithCursor {
    /// The emitted event.
    pub event: ChangeFeedEvent,
    /// Position just after the event.
    pub cursor: ChangeFeedCursor,
}

/// Lazy stream of events produced by every reader layer.
pub type EventStream = BoxStream<'static, Result<EventWithCursor>>;
