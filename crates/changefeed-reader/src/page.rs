//! Paginated view over a change feed read.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future;
use futures::stream::{self, BoxStream, Peekable, Stream, StreamExt, TryStreamExt};

use crate::config::ChangeFeedConfig;
use crate::cursor::ChangeFeedCursor;
use crate::error::{ChangeFeedError, Result};
use crate::event::{ChangeFeedEvent, EventStream, EventWithCursor};
use crate::filter::EventFilter;

/// One page of events.
#[derive(Debug, Clone)]
pub struct Page {
    /// Events of the page, in emission order.
    pub events: Vec<ChangeFeedEvent>,
    /// Cursor positioned just after the last event, or `None` when the read
    /// is exhausted.
    pub continuation: Option<ChangeFeedCursor>,
}

impl Page {
    /// Number of events in the page.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if the page holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Serialized continuation, ready to hand to
    /// [`ChangeFeedClient::open_with_cursor`](crate::ChangeFeedClient::open_with_cursor).
    pub fn continuation_token(&self) -> Result<Option<String>> {
        self.continuation
            .as_ref()
            .map(ChangeFeedCursor::serialize)
            .transpose()
    }
}

/// Stream of events returned by [`ChangeFeedClient`](crate::ChangeFeedClient).
///
/// Events can be consumed one at a time through the [`Stream`] impl or
/// [`next_event`](Self::next_event), or in pages through
/// [`next_page`](Self::next_page). Both views share the same position.
pub struct ChangeFeedStream {
    inner: Peekable<EventStream>,
    default_page_size: usize,
    max_page_size: usize,
}

impl ChangeFeedStream {
    pub(crate) fn new(inner: EventStream, config: &ChangeFeedConfig) -> Self {
        Self {
            inner: inner.peekable(),
            default_page_size: config.default_page_size.max(1),
            max_page_size: config.max_page_size.max(1),
        }
    }

    /// A stream with no events.
    pub fn empty(config: &ChangeFeedConfig) -> Self {
        Self::new(stream::empty().boxed(), config)
    }

    /// Returns the next event, or `None` when the read is exhausted.
    pub async fn next_event(&mut self) -> Result<Option<EventWithCursor>> {
        self.inner.next().await.transpose()
    }

    /// Returns the next page of at most `page_size` events.
    ///
    /// `None` uses the configured default; larger requests are clamped to the
    /// configured maximum. Returns `Ok(None)` once the read is exhausted. The
    /// last page carries no continuation.
    ///
    /// A full page reads one event ahead to find out whether more follow.
    /// That event may sit in the next segment, in which case its manifest and
    /// shard listings are fetched before the caller asks for another page.
    /// The look-ahead event is kept and returned first by the next call.
    ///
    /// # Errors
    ///
    /// Returns [`ChangeFeedError::InvalidPageSize`] for a page size of zero,
    /// and any error raised while reading. Events gathered for the failing
    /// page are discarded; the previous page's continuation stays valid.
    pub async fn next_page(&mut self, page_size: Option<usize>) -> Result<Option<Page>> {
        let size = self.resolve_page_size(page_size)?;
        let mut events = Vec::with_capacity(size.min(1024));
        let mut last_cursor = None;

        while events.len() < size {
            match self.inner.next().await {
                Some(Ok(item)) => {
                    last_cursor = Some(item.cursor);
                    events.push(item.event);
                }
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        if events.is_empty() {
            return Ok(None);
        }

        let exhausted = Pin::new(&mut self.inner).peek().await.is_none();
        let continuation = if exhausted { None } else { last_cursor };
        Ok(Some(Page {
            events,
            continuation,
        }))
    }

    /// Flattens the read into a stream of events, dropping cursors.
    pub fn into_events(self) -> BoxStream<'static, Result<ChangeFeedEvent>> {
        self.map_ok(|item| item.event).boxed()
    }

    /// Like [`into_events`](Self::into_events), keeping only events that
    /// match `filter`.
    pub fn filtered<F>(self, filter: F) -> BoxStream<'static, Result<ChangeFeedEvent>>
    where
        F: EventFilter + Send + 'static,
    {
        self.into_events()
            .try_filter(move |event| future::ready(filter.matches(event)))
            .boxed()
    }

    fn resolve_page_size(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            None => Ok(self.default_page_size.min(self.max_page_size)),
            Some(0) => Err(ChangeFeedError::InvalidPageSize(0)),
            Some(n) => Ok(n.min(self.max_page_size)),
        }
    }
}

impl Stream for ChangeFeedStream {
    type Item = Result<EventWithCursor>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
