//! Reader configuration.

/// Default and maximum number of events per page.
pub const DEFAULT_PAGE_SIZE: usize = 5000;

/// Default size of a single ranged chunk download: 4 MiB.
pub const DEFAULT_DOWNLOAD_BLOCK_SIZE: u64 = 4 * 1024 * 1024;

/// Read mode for handling a truncated trailing block in a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Strict mode: a truncated block is a corrupt chunk.
    #[default]
    Strict,
    /// Permissive mode: truncation is treated as the end of the chunk.
    Permissive,
}

/// Options for opening the change feed.
///
/// The layout constants describe where the feed lives inside its container;
/// they are passed to the reader rather than baked in so that tests and
/// alternative deployments can relocate them.
#[derive(Debug, Clone)]
pub struct ChangeFeedConfig {
    /// Container name. Shard paths in segment manifests may start with it.
    pub container: String,
    /// Prefix under which time buckets and segment manifests live.
    pub segments_prefix: String,
    /// Path of the control document holding the safe boundary.
    pub control_document: String,
    /// Upper bound on the bytes fetched by one ranged chunk download.
    pub download_block_size: u64,
    /// How truncated chunks are handled (default: strict).
    pub read_mode: ReadMode,
    /// Page size used when the caller does not request one.
    pub default_page_size: usize,
    /// Larger page requests are clamped to this value.
    pub max_page_size: usize,
}

impl Default for ChangeFeedConfig {
    fn default() -> Self {
        Self {
            container: "changefeed".to_string(),
            segments_prefix: "idx/segments/".to_string(),
            control_document: "meta/segments.json".to_string(),
            download_block_size: DEFAULT_DOWNLOAD_BLOCK_SIZE,
            read_mode: ReadMode::Strict,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}
