//! Collaborators shared by every reader layer.

use std::fmt;
use std::sync::Arc;

use changefeed_format::{BlockDecoder, FramedBlockDecoder};

use crate::config::ChangeFeedConfig;
use crate::store::BlobStore;

/// Store handle, decoder and configuration handed down from the log level to
/// the chunk level.
///
/// Cloning is cheap; all readers of one segment share the same store handle.
#[derive(Clone)]
pub struct FeedContext {
    store: Arc<dyn BlobStore>,
    decoder: Arc<dyn BlockDecoder>,
    config: Arc<ChangeFeedConfig>,
}

impl FeedContext {
    /// Creates a context using the default framed block decoder.
    pub fn new(store: Arc<dyn BlobStore>, config: ChangeFeedConfig) -> Self {
        Self {
            store,
            decoder: Arc::new(FramedBlockDecoder),
            config: Arc::new(config),
        }
    }

    /// Replaces the block decoder.
    pub fn with_decoder(mut self, decoder: Arc<dyn BlockDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    /// The object store handle.
    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// The block decoder.
    pub fn decoder(&self) -> &Arc<dyn BlockDecoder> {
        &self.decoder
    }

    /// The reader configuration.
    pub fn config(&self) -> &ChangeFeedConfig {
        &self.config
    }
}

impl fmt::Debug for FeedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
