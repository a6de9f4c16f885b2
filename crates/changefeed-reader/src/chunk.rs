//! Chunk reader: ranged downloads decoded block by block.

use std::collections::VecDeque;

use bytes::{Buf, BytesMut};
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use changefeed_format::{BlockDecode, EventJson};

use crate::config::ReadMode;
use crate::context::FeedContext;
use crate::cursor::ChangeFeedCursor;
use crate::error::{ChangeFeedError, Result};
use crate::event::{ChangeFeedEvent, EventPosition, EventStream, EventWithCursor};

/// Reads the events of one chunk object.
///
/// The chunk is fetched lazily with ranged downloads of at most
/// `download_block_size` bytes, growing a request only when a single block is
/// larger than that. At most one block plus one download is buffered.
///
/// The reader supports two modes for a chunk that ends inside a block:
/// - [`ReadMode::Strict`] - the chunk is reported as corrupt
/// - [`ReadMode::Permissive`] - the truncated block is dropped with a warning
///
/// # Example
///
/// ```ignore
/// use changefeed::{ChangeFeedCursor, ChunkReader};
/// use futures::TryStreamExt;
///
/// let cursor = ChangeFeedCursor::new(None)
///     .derive_segment_cursor(segment_time)
///     .derive_shard_cursor("log/00/");
/// let events: Vec<_> = ChunkReader::new(ctx, "log/00/", "log/00/000000.cfb", cursor)
///     .into_stream()
///     .try_collect()
///     .await?;
/// ```
pub struct ChunkReader {
    ctx: FeedContext,
    shard_path: String,
    chunk_path: String,
    cursor: ChangeFeedCursor,
    block_offset: u64,
    record_index: u64,
    download_block_size: u64,
    read_mode: ReadMode,
}

impl ChunkReader {
    /// Creates a reader positioned at the first block of `chunk_path`.
    ///
    /// `cursor` is the shard-scoped cursor every emitted cursor derives from.
    pub fn new(
        ctx: FeedContext,
        shard_path: impl Into<String>,
        chunk_path: impl Into<String>,
        cursor: ChangeFeedCursor,
    ) -> Self {
        let download_block_size = ctx.config().download_block_size.max(1);
        let read_mode = ctx.config().read_mode;
        Self {
            ctx,
            shard_path: shard_path.into(),
            chunk_path: chunk_path.into(),
            cursor,
            block_offset: 0,
            record_index: 0,
            download_block_size,
            read_mode,
        }
    }

    /// Resumes at the block starting at `block_offset`, skipping its first
    /// `record_index` records.
    pub fn starting_at(mut self, block_offset: u64, record_index: u64) -> Self {
        self.block_offset = block_offset;
        self.record_index = record_index;
        self
    }

    /// Overrides the configured ranged download size.
    pub fn with_download_block_size(mut self, size: u64) -> Self {
        self.download_block_size = size.max(1);
        self
    }

    /// Overrides the configured read mode.
    pub fn with_read_mode(mut self, mode: ReadMode) -> Self {
        self.read_mode = mode;
        self
    }

    /// Path of the chunk being read.
    pub fn chunk_path(&self) -> &str {
        &self.chunk_path
    }

    /// Turns the reader into a lazy event stream.
    ///
    /// Nothing is downloaded until the stream is first polled. The stream
    /// ends after yielding its first error.
    pub fn into_stream(self) -> EventStream {
        let state = ChunkState::new(self);
        stream::unfold(state, |mut state| async move {
            match state.read_event().await {
                Ok(Some(item)) => Some((Ok(item), state)),
                Ok(None) => None,
                Err(e) => {
                    state.done = true;
                    Some((Err(e), state))
                }
            }
        })
        .boxed()
    }
}

struct ChunkState {
    reader: ChunkReader,
    buffer: BytesMut,
    /// Offset of `buffer[0]` in the chunk; always a block boundary.
    buffer_offset: u64,
    /// Offset just past the last byte downloaded.
    fetched_to: u64,
    /// Offset of the block `pending` was decoded from.
    current_block: u64,
    pending: VecDeque<(u64, EventJson)>,
    skip: u64,
    started: bool,
    eof: bool,
    done: bool,
}

impl ChunkState {
    fn new(reader: ChunkReader) -> Self {
        let start = reader.block_offset;
        let skip = reader.record_index;
        Self {
            reader,
            buffer: BytesMut::new(),
            buffer_offset: start,
            fetched_to: start,
            current_block: start,
            pending: VecDeque::new(),
            skip,
            started: false,
            eof: false,
            done: false,
        }
    }

    async fn read_event(&mut self) -> Result<Option<EventWithCursor>> {
        if !self.started {
            self.started = true;
            debug!(
                chunk = %self.reader.chunk_path,
                block_offset = self.reader.block_offset,
                record_index = self.reader.record_index,
                "reading chunk"
            );
        }

        loop {
            if let Some((index, record)) = self.pending.pop_front() {
                return Ok(Some(self.emit(index, record)));
            }
            if self.done {
                return Ok(None);
            }

            let decoded = self
                .reader
                .ctx
                .decoder()
                .decode_block(&self.buffer)
                .map_err(|e| self.corrupt(e.to_string()))?;

            match decoded {
                BlockDecode::Complete { records, consumed } => {
                    if consumed == 0 || consumed > self.buffer.len() as u64 {
                        return Err(self.corrupt(format!(
                            "decoder consumed {} of {} buffered bytes",
                            consumed,
                            self.buffer.len()
                        )));
                    }
                    self.buffer.advance(consumed as usize);
                    self.current_block = self.buffer_offset;
                    self.buffer_offset += consumed;

                    let skip = std::mem::take(&mut self.skip) as usize;
                    self.pending = records
                        .into_iter()
                        .enumerate()
                        .skip(skip)
                        .map(|(index, record)| (index as u64, record))
                        .collect();
                }
                BlockDecode::Incomplete { needed } => {
                    if self.eof {
                        return self.finish_truncated();
                    }
                    self.fetch(needed).await?;
                }
            }
        }
    }

    async fn fetch(&mut self, needed: u64) -> Result<()> {
        let have = self.buffer.len() as u64;
        let want = needed
            .saturating_sub(have)
            .max(self.reader.download_block_size);

        let bytes = self
            .reader
            .ctx
            .store()
            .download_range(&self.reader.chunk_path, self.fetched_to, Some(want))
            .await?;

        if (bytes.len() as u64) < want {
            self.eof = true;
        }
        self.fetched_to += bytes.len() as u64;
        self.buffer.extend_from_slice(&bytes);
        Ok(())
    }

    fn finish_truncated(&mut self) -> Result<Option<EventWithCursor>> {
        self.done = true;
        if self.buffer.is_empty() {
            return Ok(None);
        }

        let trailing = self.buffer.len();
        match self.reader.read_mode {
            ReadMode::Strict => Err(self.corrupt(format!(
                "chunk ends inside a block ({} trailing bytes)",
                trailing
            ))),
            ReadMode::Permissive => {
                warn!(
                    chunk = %self.reader.chunk_path,
                    offset = self.buffer_offset,
                    trailing,
                    "dropping truncated block"
                );
                Ok(None)
            }
        }
    }

    fn emit(&self, index: u64, record: EventJson) -> EventWithCursor {
        let position = EventPosition {
            shard_path: self.reader.shard_path.clone(),
            chunk_path: self.reader.chunk_path.clone(),
            block_offset: self.current_block,
            record_index: index,
        };
        let cursor = self.reader.cursor.derive_chunk_cursor(
            &self.reader.chunk_path,
            self.current_block,
            index + 1,
        );
        EventWithCursor {
            event: ChangeFeedEvent::new(record, position),
            cursor,
        }
    }

    fn corrupt(&self, reason: String) -> ChangeFeedError {
        ChangeFeedError::CorruptChunk {
            path: self.reader.chunk_path.clone(),
            offset: self.buffer_offset,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChangeFeedConfig;
    use crate::store::ObjectStoreBlobs;
    use bytes::Bytes;
    use changefeed_format::{BlockDecoder, BlockHeader, ChunkWriter, FormatError};
    use chrono::{TimeZone, Utc};
    use futures::TryStreamExt;
    use object_store::memory::InMemory;
    use object_store::path::Path;
    use object_store::ObjectStore;
    use serde_json::json;
    use std::sync::Arc;

    const SHARD: &str = "log/00/";
    const CHUNK: &str = "log/00/2021/01/01/0100/000000.cfb";

    async fn context_with_chunk(bytes: Vec<u8>, config: ChangeFeedConfig) -> FeedContext {
        let memory = Arc::new(InMemory::new());
        memory
            .put(&Path::from(format!("changefeed/{}", CHUNK)), Bytes::from(bytes))
            .await
            .unwrap();
        FeedContext::new(Arc::new(ObjectStoreBlobs::new(memory, "changefeed")), config)
    }

    fn shard_cursor() -> ChangeFeedCursor {
        ChangeFeedCursor::new(None)
            .derive_segment_cursor(Utc.with_ymd_and_hms(2021, 1, 1, 1, 0, 0).unwrap())
            .derive_shard_cursor(SHARD)
    }

    fn two_block_chunk() -> (Vec<u8>, u64) {
        let mut writer = ChunkWriter::new();
        writer
            .append_block(&[json!({"id": "a"}), json!({"id": "b"})])
            .unwrap();
        let second = writer.append_block(&[json!({"id": "c"})]).unwrap();
        (writer.into_bytes(), second)
    }

    async fn read_ids(reader: ChunkReader) -> Vec<String> {
        let items: Vec<EventWithCursor> = reader.into_stream().try_collect().await.unwrap();
        items
            .iter()
            .map(|item| item.event.id().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn reads_every_record_in_order() {
        let (bytes, _) = two_block_chunk();
        let ctx = context_with_chunk(bytes, ChangeFeedConfig::default()).await;

        let ids = read_ids(ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor())).await;
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn cursors_point_past_each_record() {
        let (bytes, second) = two_block_chunk();
        let ctx = context_with_chunk(bytes, ChangeFeedConfig::default()).await;

        let items: Vec<EventWithCursor> = ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor())
            .into_stream()
            .try_collect()
            .await
            .unwrap();

        let positions: Vec<_> = items
            .iter()
            .map(|item| (item.cursor.block_offset(), item.cursor.record_index()))
            .collect();
        assert_eq!(
            positions,
            vec![(Some(0), Some(1)), (Some(0), Some(2)), (Some(second), Some(1))]
        );
        assert_eq!(items[2].event.position().block_offset, second);
        assert_eq!(items[2].event.position().record_index, 0);
    }

    #[tokio::test]
    async fn resumes_inside_a_block() {
        let (bytes, _) = two_block_chunk();
        let ctx = context_with_chunk(bytes, ChangeFeedConfig::default()).await;

        let reader = ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor()).starting_at(0, 1);
        assert_eq!(read_ids(reader).await, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn resume_past_last_record_of_block_moves_on() {
        let (bytes, _) = two_block_chunk();
        let ctx = context_with_chunk(bytes, ChangeFeedConfig::default()).await;

        let reader = ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor()).starting_at(0, 2);
        assert_eq!(read_ids(reader).await, vec!["c"]);
    }

    #[tokio::test]
    async fn tiny_downloads_still_decode_whole_blocks() {
        let (bytes, _) = two_block_chunk();
        let ctx = context_with_chunk(bytes, ChangeFeedConfig::default()).await;

        let reader =
            ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor()).with_download_block_size(3);
        assert_eq!(read_ids(reader).await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn empty_chunk_yields_nothing() {
        let ctx = context_with_chunk(Vec::new(), ChangeFeedConfig::default()).await;

        let ids = read_ids(ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor())).await;
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn truncated_tail_fails_in_strict_mode() {
        let (bytes, second) = two_block_chunk();
        let truncated = bytes[..bytes.len() - 2].to_vec();
        let ctx = context_with_chunk(truncated, ChangeFeedConfig::default()).await;

        let results: Vec<_> = ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor())
            .into_stream()
            .collect()
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(results[1].is_ok());
        match &results[2] {
            Err(ChangeFeedError::CorruptChunk { path, offset, .. }) => {
                assert_eq!(path, CHUNK);
                assert_eq!(*offset, second);
            }
            other => panic!("expected CorruptChunk, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn truncated_tail_ends_chunk_in_permissive_mode() {
        let (bytes, _) = two_block_chunk();
        let truncated = bytes[..bytes.len() - 2].to_vec();
        let config = ChangeFeedConfig {
            read_mode: ReadMode::Permissive,
            ..ChangeFeedConfig::default()
        };
        let ctx = context_with_chunk(truncated, config).await;

        let ids = read_ids(ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor())).await;
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn read_mode_override_takes_precedence_over_config() {
        let (bytes, _) = two_block_chunk();
        let truncated = bytes[..bytes.len() - 2].to_vec();
        let ctx = context_with_chunk(truncated, ChangeFeedConfig::default()).await;

        let reader =
            ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor()).with_read_mode(ReadMode::Permissive);
        assert_eq!(read_ids(reader).await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn impossible_record_count_is_corrupt_chunk() {
        let header = BlockHeader::new(u32::MAX, 0).unwrap().to_bytes();
        let ctx = context_with_chunk(header.to_vec(), ChangeFeedConfig::default()).await;

        let results: Vec<_> = ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor())
            .into_stream()
            .collect()
            .await;

        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(ChangeFeedError::CorruptChunk { offset: 0, .. })
        ));
    }

    /// Claims a complete block without consuming any bytes.
    struct StuckDecoder;

    impl BlockDecoder for StuckDecoder {
        fn decode_block(&self, _buf: &[u8]) -> std::result::Result<BlockDecode, FormatError> {
            Ok(BlockDecode::Complete {
                records: vec![json!({"id": "stuck"})],
                consumed: 0,
            })
        }
    }

    /// Claims more bytes than it was given.
    struct OverreachingDecoder;

    impl BlockDecoder for OverreachingDecoder {
        fn decode_block(&self, buf: &[u8]) -> std::result::Result<BlockDecode, FormatError> {
            Ok(BlockDecode::Complete {
                records: Vec::new(),
                consumed: buf.len() as u64 + 1,
            })
        }
    }

    async fn read_with_decoder(decoder: Arc<dyn BlockDecoder>) -> Vec<Result<EventWithCursor>> {
        let (bytes, _) = two_block_chunk();
        let ctx = context_with_chunk(bytes, ChangeFeedConfig::default())
            .await
            .with_decoder(decoder);
        ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor())
            .into_stream()
            .collect()
            .await
    }

    #[tokio::test]
    async fn decoder_making_no_progress_is_corrupt_chunk() {
        let results = read_with_decoder(Arc::new(StuckDecoder)).await;

        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(ChangeFeedError::CorruptChunk { offset: 0, .. })
        ));
    }

    #[tokio::test]
    async fn decoder_consuming_past_buffer_is_corrupt_chunk() {
        let results = read_with_decoder(Arc::new(OverreachingDecoder)).await;

        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(ChangeFeedError::CorruptChunk { .. })
        ));
    }

    #[tokio::test]
    async fn decoder_rejection_is_corrupt_chunk() {
        let (mut bytes, _) = two_block_chunk();
        bytes[0] = b'X';
        let ctx = context_with_chunk(bytes, ChangeFeedConfig::default()).await;

        let results: Vec<_> = ChunkReader::new(ctx, SHARD, CHUNK, shard_cursor())
            .into_stream()
            .collect()
            .await;

        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(ChangeFeedError::CorruptChunk { offset: 0, .. })
        ));
    }
}
