//! Resumable reader for change feed logs stored in an object store.
//!
//! A change feed is an append-only log of JSON change events, partitioned by
//! time into hourly segments and, within a segment, into shards. Each shard
//! holds chunk objects made of framed blocks (see [`changefeed_format`]).
//!
//! Reading is organized as a hierarchy of lazy streams:
//!
//! - [`ChangeFeedClient`] lists time buckets and segment manifests inside the
//!   requested window, clipped to the safe boundary
//! - [`SegmentReader`] merges the streams of all shards of one segment
//! - [`ShardReader`] reads the chunks of one shard in lexical order
//! - [`ChunkReader`] fetches ranged downloads and decodes them block by block
//!
//! Every emitted event carries a [`ChangeFeedCursor`]. Serializing it yields
//! a continuation token; opening the feed with that token resumes right after
//! the event, without duplicates or gaps.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use changefeed::{ChangeFeedClient, ChangeFeedConfig, ObjectStoreBlobs};
//! use object_store::memory::InMemory;
//!
//! let store = ObjectStoreBlobs::new(Arc::new(InMemory::new()), "changefeed");
//! let client = ChangeFeedClient::new(Arc::new(store), ChangeFeedConfig::default());
//!
//! let mut feed = client.open(None, None).await?;
//! let mut token = None;
//! while let Some(page) = feed.next_page(Some(500)).await? {
//!     for event in &page.events {
//!         println!("{} {:?}", event.record(), event.position());
//!     }
//!     token = page.continuation_token()?;
//! }
//!
//! if let Some(token) = token {
//!     let resumed = client.open_with_cursor(&token).await?;
//! }
//! ```

#![deny(missing_docs)]

/// Chunk-level reader.
pub mod chunk;
/// Reader configuration.
pub mod config;
/// Collaborators shared by reader layers.
pub mod context;
/// Continuation cursor.
pub mod cursor;
/// Error types.
pub mod error;
/// Emitted events and positions.
pub mod event;
/// Log-level reader and time window.
pub mod feed;
/// Client-side event filters.
pub mod filter;
/// Pagination.
pub mod page;
/// Segment manifests and segment reader.
pub mod segment;
/// Shard-level reader.
pub mod shard;
/// Object store seam.
pub mod store;

pub use chunk::ChunkReader;
pub use config::{ChangeFeedConfig, ReadMode, DEFAULT_DOWNLOAD_BLOCK_SIZE, DEFAULT_PAGE_SIZE};
pub use context::FeedContext;
pub use cursor::{ChangeFeedCursor, ShardCursor, CURSOR_VERSION};
pub use error::{ChangeFeedError, Result};
pub use event::{ChangeFeedEvent, EventPosition, EventStream, EventWithCursor};
pub use feed::{floor_to_hour, ChangeFeedClient, TimeWindow};
pub use filter::{
    AndFilter, EventFilter, EventTypeFilter, OrFilter, SubjectPrefixFilter, TimeRangeFilter,
};
pub use page::{ChangeFeedStream, Page};
pub use segment::{segment_time_from_path, SegmentManifest, SegmentReader, SegmentRef};
pub use shard::ShardReader;
pub use store::{BlobEntry, BlobStore, ListMode, ObjectStoreBlobs, StoreError};
