//! Log-level reader: time window, segment discovery and resumption.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, DurationRound, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Deserialize;
use tracing::{debug, info};

use changefeed_format::BlockDecoder;

use crate::config::ChangeFeedConfig;
use crate::context::FeedContext;
use crate::cursor::ChangeFeedCursor;
use crate::error::{ChangeFeedError, Result};
use crate::page::ChangeFeedStream;
use crate::segment::{SegmentReader, SegmentRef};
use crate::store::{BlobStore, ListMode, StoreError};

/// Bucket written by producers for entries without a real time.
const PLACEHOLDER_YEAR: i32 = 1601;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ControlDocument {
    last_consumable: DateTime<Utc>,
}

/// Time window of one read, already clipped to the safe boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    /// Segments before the hour containing this time are skipped.
    pub start: Option<DateTime<Utc>>,
    /// Last segment time that may be read, inclusive.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Returns true if a segment starting at `time` belongs to the window.
    pub fn contains_segment(&self, time: DateTime<Utc>) -> bool {
        let after_start = match self.start {
            Some(start) => floor_to_hour(start) <= time,
            None => true,
        };
        after_start && time <= self.end
    }

    /// Returns true if any segment of `year` can belong to the window.
    pub fn overlaps_year(&self, year: i32) -> bool {
        let after_start = self.start.map_or(true, |s| year >= s.year());
        after_start && year <= self.end.year()
    }
}

/// Truncates a time to the start of its hour.
pub fn floor_to_hour(time: DateTime<Utc>) -> DateTime<Utc> {
    time.duration_trunc(Duration::hours(1)).unwrap_or(time)
}

/// Entry point for reading a change feed.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use changefeed::{ChangeFeedClient, ChangeFeedConfig, ObjectStoreBlobs};
/// use object_store::local::LocalFileSystem;
///
/// let store = ObjectStoreBlobs::new(Arc::new(LocalFileSystem::new_with_prefix("/data")?), "changefeed");
/// let client = ChangeFeedClient::new(Arc::new(store), ChangeFeedConfig::default());
///
/// let mut feed = client.open(None, None).await?;
/// while let Some(page) = feed.next_page(Some(100)).await? {
///     for event in &page.events {
///         println!("{}", event.record());
///     }
///     if let Some(token) = page.continuation_token()? {
///         println!("resume with {}", token);
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChangeFeedClient {
    ctx: FeedContext,
}

impl ChangeFeedClient {
    /// Creates a client over `store` using the framed block decoder.
    pub fn new(store: Arc<dyn BlobStore>, config: ChangeFeedConfig) -> Self {
        Self {
            ctx: FeedContext::new(store, config),
        }
    }

    /// Replaces the block decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn BlockDecoder>) -> Self {
        self.ctx = self.ctx.with_decoder(decoder);
        self
    }

    /// The client configuration.
    pub fn config(&self) -> &ChangeFeedConfig {
        self.ctx.config()
    }

    /// The shared reader context.
    pub fn context(&self) -> &FeedContext {
        &self.ctx
    }

    /// Returns the safe boundary: the latest segment time that is complete.
    ///
    /// `None` means the control document does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`ChangeFeedError::FeatureNotEnabled`] if the container does
    /// not exist and [`ChangeFeedError::MalformedControlDocument`] if the
    /// control document cannot be parsed.
    pub async fn last_consumable(&self) -> Result<Option<DateTime<Utc>>> {
        self.ensure_enabled().await?;
        self.read_control_document().await
    }

    /// Opens a read of all events between `start` and `end`.
    ///
    /// Unbounded ends are open. The end is clipped to the safe boundary so
    /// that incomplete segments are never read.
    pub async fn open(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<ChangeFeedStream> {
        self.open_window(start, ChangeFeedCursor::new(end)).await
    }

    /// Resumes a read from a continuation token.
    ///
    /// # Errors
    ///
    /// Returns [`ChangeFeedError::MalformedCursor`] before touching the store
    /// if the token cannot be decoded.
    pub async fn open_with_cursor(&self, token: &str) -> Result<ChangeFeedStream> {
        let cursor = ChangeFeedCursor::deserialize(token)?;
        let start = cursor.segment_time();
        self.open_window(start, cursor).await
    }

    /// Lists the segments of `window`, sorted by time.
    pub async fn list_segments(&self, window: TimeWindow) -> Result<Vec<SegmentRef>> {
        let mut segments = Vec::new();
        for year in self.list_years(&window).await? {
            segments.extend(list_year_segments(&self.ctx, &window, &year).await?);
        }
        Ok(segments)
    }

    async fn open_window(
        &self,
        start: Option<DateTime<Utc>>,
        cursor: ChangeFeedCursor,
    ) -> Result<ChangeFeedStream> {
        let config = self.ctx.config();
        let Some(window) = self.resolve_window(start, cursor.end_time()).await? else {
            return Ok(ChangeFeedStream::empty(config));
        };

        let years = self.list_years(&window).await?;
        debug!(years = ?years, "listed time buckets");

        let ctx = self.ctx.clone();
        let segments = stream::iter(years)
            .then(move |year| {
                let ctx = ctx.clone();
                async move { list_year_segments(&ctx, &window, &year).await }
            })
            .map_ok(|segments| stream::iter(segments.into_iter().map(Ok::<_, ChangeFeedError>)))
            .try_flatten();

        let ctx = self.ctx.clone();
        let end_time = cursor.end_time();
        let mut resume = Some(cursor);
        let events = segments
            .map_ok(move |segment| {
                // Only the first retained segment can resume mid-way.
                let cursor = resume
                    .take()
                    .unwrap_or_else(|| ChangeFeedCursor::new(end_time));
                SegmentReader::new(ctx.clone(), segment, cursor).into_stream()
            })
            .try_flatten()
            .boxed();

        Ok(ChangeFeedStream::new(events, config))
    }

    /// Reads the safe boundary and clips the requested window to it.
    ///
    /// Returns `None` when nothing in the window is readable.
    async fn resolve_window(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Option<TimeWindow>> {
        self.ensure_enabled().await?;
        if let (Some(start), Some(end)) = (start, end) {
            if start > end {
                return Ok(None);
            }
        }

        let Some(last_consumable) = self.read_control_document().await? else {
            info!("change feed has no consumable segments yet");
            return Ok(None);
        };
        let effective_end = end.map_or(last_consumable, |e| e.min(last_consumable));

        info!(
            start = ?start,
            end = ?end,
            %last_consumable,
            %effective_end,
            "opening change feed window"
        );

        if start.is_some_and(|s| floor_to_hour(s) > effective_end) {
            return Ok(None);
        }
        Ok(Some(TimeWindow {
            start,
            end: effective_end,
        }))
    }

    async fn ensure_enabled(&self) -> Result<()> {
        if self.ctx.store().exists().await? {
            Ok(())
        } else {
            Err(ChangeFeedError::FeatureNotEnabled {
                container: self.ctx.config().container.clone(),
            })
        }
    }

    async fn read_control_document(&self) -> Result<Option<DateTime<Utc>>> {
        let path = &self.ctx.config().control_document;
        let bytes = match self.ctx.store().download_whole(path).await {
            Ok(bytes) => bytes,
            Err(StoreError::NotFound { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let document: ControlDocument =
            serde_json::from_slice(&bytes).map_err(|e| ChangeFeedError::MalformedControlDocument {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        Ok(Some(document.last_consumable))
    }

    async fn list_years(&self, window: &TimeWindow) -> Result<Vec<String>> {
        let prefix = segments_prefix(self.ctx.config());
        let entries = self
            .ctx
            .store()
            .list_children(&prefix, ListMode::Children)
            .await?;

        Ok(entries
            .into_iter()
            .filter(|entry| entry.is_directory)
            .filter(|entry| {
                bucket_year(&entry.name)
                    .is_some_and(|year| year != PLACEHOLDER_YEAR && window.overlaps_year(year))
            })
            .map(|entry| entry.name)
            .collect())
    }
}

async fn list_year_segments(
    ctx: &FeedContext,
    window: &TimeWindow,
    year_prefix: &str,
) -> Result<Vec<SegmentRef>> {
    let entries = ctx
        .store()
        .list_children(year_prefix, ListMode::Recursive)
        .await?;

    let mut segments: Vec<SegmentRef> = entries
        .iter()
        .filter(|entry| !entry.is_directory)
        .filter_map(|entry| SegmentRef::from_path(&entry.name))
        .filter(|segment| window.contains_segment(segment.time))
        .collect();
    segments.sort();
    debug!(bucket = year_prefix, segments = segments.len(), "listed segments");
    Ok(segments)
}

fn segments_prefix(config: &ChangeFeedConfig) -> String {
    let trimmed = config.segments_prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

fn bucket_year(name: &str) -> Option<i32> {
    let last = name.trim_end_matches('/').rsplit('/').next()?;
    if last.is_empty() || !last.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    last.parse().ok()
}
