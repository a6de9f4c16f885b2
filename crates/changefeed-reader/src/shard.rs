//! Shard reader: the chunks of one shard, in order.

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::debug;

use crate::chunk::ChunkReader;
use crate::context::FeedContext;
use crate::cursor::ChangeFeedCursor;
use crate::error::{ChangeFeedError, Result};
use crate::event::EventStream;
use crate::store::ListMode;

/// Reads every chunk under a shard path, in lexical order.
///
/// If the cursor holds a position for this shard, chunks before the recorded
/// chunk are skipped and the recorded chunk resumes at its block offset and
/// record index. Later chunks start at their beginning.
pub struct ShardReader {
    ctx: FeedContext,
    shard_path: String,
    cursor: ChangeFeedCursor,
}

impl ShardReader {
    /// Creates a reader for `shard_path`. `cursor` must be scoped to the
    /// shard's segment.
    pub fn new(ctx: FeedContext, shard_path: impl Into<String>, cursor: ChangeFeedCursor) -> Self {
        let shard_path = shard_path.into();
        let cursor = cursor.derive_shard_cursor(&shard_path);
        Self {
            ctx,
            shard_path,
            cursor,
        }
    }

    /// Path of the shard being read.
    pub fn shard_path(&self) -> &str {
        &self.shard_path
    }

    /// Lists the chunk objects of the shard, sorted lexically.
    pub async fn list_chunks(&self) -> Result<Vec<String>> {
        let entries = self
            .ctx
            .store()
            .list_children(&self.shard_path, ListMode::Recursive)
            .await?;
        Ok(entries
            .into_iter()
            .filter(|entry| !entry.is_directory)
            .map(|entry| entry.name)
            .collect())
    }

    /// Turns the reader into a lazy event stream. The chunk listing happens
    /// on first poll.
    pub fn into_stream(self) -> EventStream {
        stream::once(async move {
            let chunks = self.list_chunks().await?;
            Ok::<_, ChangeFeedError>(self.chunk_streams(chunks))
        })
        .try_flatten()
        .boxed()
    }

    fn chunk_streams(self, chunks: Vec<String>) -> EventStream {
        let resume = self.cursor.shard_position(&self.shard_path).cloned();
        debug!(
            shard = %self.shard_path,
            chunks = chunks.len(),
            resume_chunk = resume.as_ref().map(|p| p.chunk_path.as_str()),
            "reading shard"
        );

        let chunks: Vec<String> = match &resume {
            Some(position) => chunks
                .into_iter()
                .filter(|chunk| chunk.as_str() >= position.chunk_path.as_str())
                .collect(),
            None => chunks,
        };

        let ctx = self.ctx;
        let shard_path = self.shard_path;
        let cursor = self.cursor;
        let readers = chunks.into_iter().map(move |chunk| {
            let reader = ChunkReader::new(ctx.clone(), shard_path.clone(), chunk, cursor.clone());
            match &resume {
                Some(position) if position.chunk_path == reader.chunk_path() => {
                    reader.starting_at(position.block_offset, position.record_index)
                }
                _ => reader,
            }
        });

        stream::iter(readers)
            .map(ChunkReader::into_stream)
            .flatten()
            .boxed()
    }
}
