//! Segment manifests and the segment reader.
//!
//! A segment is one hour of the feed. Its manifest lists the shard paths that
//! hold the segment's chunks; the shards are read concurrently and their
//! events merged in arrival order.

use std::sync::LazyLock;

use chrono::{DateTime, TimeZone, Utc};
use futures::stream::{self, select_all, StreamExt, TryStreamExt};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use crate::context::FeedContext;
use crate::cursor::ChangeFeedCursor;
use crate::error::{ChangeFeedError, Result};
use crate::event::{EventStream, EventWithCursor};
use crate::shard::ShardReader;

static SEGMENT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|/)(\d{4})/(\d{2})/(\d{2})/(\d{2})(\d{2})/meta\.json$")
        .expect("invalid regex")
});

/// Parses the segment time encoded in a manifest path such as
/// `idx/segments/2021/01/01/0100/meta.json`.
pub fn segment_time_from_path(path: &str) -> Option<DateTime<Utc>> {
    let caps = SEGMENT_PATH.captures(path)?;
    let field = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    Utc.with_ymd_and_hms(year, field(2)?, field(3)?, field(4)?, field(5)?, 0)
        .single()
}

/// Manifest of one segment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentManifest {
    /// Manifest format version.
    #[serde(default)]
    pub version: Option<u32>,
    /// Time the segment begins, as written by the producer.
    #[serde(default)]
    pub begin: Option<String>,
    /// Length of the segment in seconds.
    #[serde(default)]
    pub interval_secs: Option<u64>,
    /// Producer status string.
    #[serde(default)]
    pub status: Option<String>,
    /// Shard paths, possibly prefixed with the container name.
    pub shard_paths: Vec<String>,
}

impl SegmentManifest {
    /// Parses a manifest document.
    pub fn from_slice(path: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| ChangeFeedError::CorruptSegment {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    /// Shard paths relative to the container root, each ending with `/`.
    ///
    /// A leading `<container>/` component is stripped.
    pub fn relative_shard_paths(&self, path: &str, container: &str) -> Result<Vec<String>> {
        self.shard_paths
            .iter()
            .map(|raw| {
                let trimmed = raw.trim_start_matches('/');
                let relative = trimmed
                    .strip_prefix(container)
                    .and_then(|rest| rest.strip_prefix('/'))
                    .filter(|_| !container.is_empty())
                    .unwrap_or(trimmed)
                    .trim_end_matches('/');
                if relative.is_empty() {
                    return Err(ChangeFeedError::CorruptSegment {
                        path: path.to_string(),
                        reason: format!("empty shard path '{}'", raw),
                    });
                }
                Ok(format!("{}/", relative))
            })
            .collect()
    }
}

/// A segment manifest located by listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SegmentRef {
    /// Segment time parsed from the manifest path.
    pub time: DateTime<Utc>,
    /// Manifest path relative to the container root.
    pub manifest_path: String,
}

impl SegmentRef {
    /// Builds a reference from a listed path, or `None` if the path is not a
    /// segment manifest.
    pub fn from_path(path: &str) -> Option<Self> {
        Some(Self {
            time: segment_time_from_path(path)?,
            manifest_path: path.to_string(),
        })
    }
}

/// Reads one segment by merging the event streams of all its shards.
///
/// Events are emitted as soon as any shard produces one. Every emitted cursor
/// carries the positions of all shards that have emitted so far in this
/// segment, so resuming never re-reads or skips another shard's events. The
/// stream ends after its first error.
pub struct SegmentReader {
    ctx: FeedContext,
    segment: SegmentRef,
    cursor: ChangeFeedCursor,
}

impl SegmentReader {
    /// Creates a reader for `segment`.
    ///
    /// `cursor` is either a resume cursor for this segment or any cursor
    /// carrying the read's end time; in the latter case reading starts fresh.
    pub fn new(ctx: FeedContext, segment: SegmentRef, cursor: ChangeFeedCursor) -> Self {
        let cursor = if cursor.segment_time() == Some(segment.time) {
            cursor
        } else {
            cursor.derive_segment_cursor(segment.time)
        };
        Self {
            ctx,
            segment,
            cursor,
        }
    }

    /// Downloads and parses the segment manifest.
    pub async fn read_manifest(&self) -> Result<SegmentManifest> {
        let path = &self.segment.manifest_path;
        let bytes = self.ctx.store().download_whole(path).await?;
        SegmentManifest::from_slice(path, &bytes)
    }

    /// Turns the reader into a lazy event stream. The manifest is downloaded
    /// on first poll.
    pub fn into_stream(self) -> EventStream {
        stream::once(async move {
            let manifest = self.read_manifest().await?;
            let shards = manifest
                .relative_shard_paths(&self.segment.manifest_path, &self.ctx.config().container)?;
            Ok::<_, ChangeFeedError>(self.merge_shards(shards))
        })
        .try_flatten()
        .boxed()
    }

    fn merge_shards(self, shards: Vec<String>) -> EventStream {
        debug!(
            segment = %self.segment.time,
            shards = shards.len(),
            resumed = !self.cursor.shard_positions().is_empty(),
            "reading segment"
        );

        let merged = select_all(
            shards
                .iter()
                .map(|shard| ShardReader::new(self.ctx.clone(), shard.clone(), self.cursor.clone()))
                .map(ShardReader::into_stream),
        );

        stream::unfold(
            (merged, self.cursor, false),
            |(mut merged, running, failed)| async move {
                if failed {
                    return None;
                }
                match merged.next().await? {
                    Ok(item) => {
                        let position = item.event.position();
                        let cursor = running
                            .derive_shard_cursor(&position.shard_path)
                            .derive_chunk_cursor(
                                &position.chunk_path,
                                position.block_offset,
                                position.record_index + 1,
                            );
                        let next = EventWithCursor {
                            event: item.event,
                            cursor: cursor.clone(),
                        };
                        Some((Ok(next), (merged, cursor, false)))
                    }
                    Err(e) => Some((Err(e), (merged, running, true))),
                }
            },
        )
        .boxed()
    }
}
