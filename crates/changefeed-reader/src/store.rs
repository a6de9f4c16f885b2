//! Object store seam.
//!
//! The reader only needs four remote operations; [`BlobStore`] names them so
//! that every layer can share one client handle and tests can substitute an
//! in-memory backend. [`ObjectStoreBlobs`] implements it over any
//! [`object_store::ObjectStore`].

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::path::Path;
use object_store::ObjectStore;
use thiserror::Error;

/// Errors surfaced by a [`BlobStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// The object does not exist.
    #[error("object not found: {path}")]
    NotFound {
        /// Path of the missing object, relative to the container root.
        path: String,
    },
    /// Any other backend failure.
    #[error("object store error: {0}")]
    Backend(#[from] object_store::Error),
}

/// How [`BlobStore::list_children`] walks a prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMode {
    /// Direct children only; sub-prefixes are reported as directories.
    Children,
    /// Every object under the prefix, at any depth.
    Recursive,
}

/// One entry returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Path relative to the container root. Directories end with `/`.
    pub name: String,
    /// Whether the entry is a prefix rather than an object.
    pub is_directory: bool,
}

/// Read-only access to the container holding the change feed.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns true if the container exists.
    async fn exists(&self) -> Result<bool, StoreError>;

    /// Lists entries under `prefix`, sorted by name.
    async fn list_children(&self, prefix: &str, mode: ListMode)
        -> Result<Vec<BlobEntry>, StoreError>;

    /// Downloads `length` bytes starting at `offset`, or up to the end of the
    /// object when `length` is `None`.
    ///
    /// Ranges are clamped to the object size; an offset at or past the end
    /// yields an empty buffer.
    async fn download_range(
        &self,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<Bytes, StoreError>;

    /// Downloads a whole object. Only used for small documents.
    async fn download_whole(&self, path: &str) -> Result<Bytes, StoreError>;
}

/// [`BlobStore`] over an [`ObjectStore`], scoped to a container root prefix.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use changefeed::ObjectStoreBlobs;
/// use object_store::memory::InMemory;
///
/// let blobs = ObjectStoreBlobs::new(Arc::new(InMemory::new()), "changefeed");
/// assert!(!blobs.exists().await?);
/// ```
#[derive(Debug, Clone)]
pub struct ObjectStoreBlobs {
    inner: Arc<dyn ObjectStore>,
    root: String,
}

impl ObjectStoreBlobs {
    /// Creates a store rooted at `root` inside `inner`. An empty root uses the
    /// whole store as the container.
    pub fn new(inner: Arc<dyn ObjectStore>, root: impl Into<String>) -> Self {
        let root = root.into().trim_matches('/').to_string();
        Self { inner, root }
    }

    /// Returns the container root prefix.
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the underlying object store.
    pub fn inner(&self) -> &Arc<dyn ObjectStore> {
        &self.inner
    }

    fn full_path(&self, relative: &str) -> Path {
        if self.root.is_empty() {
            Path::from(relative)
        } else {
            Path::from(format!("{}/{}", self.root, relative))
        }
    }

    fn prefix_path(&self, relative: &str) -> Option<Path> {
        if self.root.is_empty() && relative.trim_matches('/').is_empty() {
            None
        } else {
            Some(self.full_path(relative))
        }
    }

    fn relative(&self, location: &Path) -> String {
        let path_str = location.to_string();
        if self.root.is_empty() {
            return path_str;
        }
        let prefix_with_slash = format!("{}/", self.root);
        match path_str.strip_prefix(&prefix_with_slash) {
            Some(stripped) => stripped.to_string(),
            None => path_str,
        }
    }

    fn store_error(path: &str, err: object_store::Error) -> StoreError {
        match err {
            object_store::Error::NotFound { .. } => StoreError::NotFound {
                path: path.to_string(),
            },
            other => StoreError::Backend(other),
        }
    }
}

#[async_trait]
impl BlobStore for ObjectStoreBlobs {
    async fn exists(&self) -> Result<bool, StoreError> {
        let root = self.prefix_path("");
        let listing = self
            .inner
            .list_with_delimiter(root.as_ref())
            .await
            .map_err(|e| Self::store_error(&self.root, e))?;
        Ok(!listing.objects.is_empty() || !listing.common_prefixes.is_empty())
    }

    async fn list_children(
        &self,
        prefix: &str,
        mode: ListMode,
    ) -> Result<Vec<BlobEntry>, StoreError> {
        let location = self.prefix_path(prefix);
        tracing::trace!(prefix, ?mode, "list_children");

        let mut entries = match mode {
            ListMode::Children => {
                let listing = self
                    .inner
                    .list_with_delimiter(location.as_ref())
                    .await
                    .map_err(|e| Self::store_error(prefix, e))?;

                let directories = listing.common_prefixes.iter().map(|p| BlobEntry {
                    name: format!("{}/", self.relative(p)),
                    is_directory: true,
                });
                let objects = listing.objects.iter().map(|meta| BlobEntry {
                    name: self.relative(&meta.location),
                    is_directory: false,
                });
                directories.chain(objects).collect::<Vec<_>>()
            }
            ListMode::Recursive => {
                let metas: Vec<_> = self
                    .inner
                    .list(location.as_ref())
                    .try_collect()
                    .await
                    .map_err(|e| Self::store_error(prefix, e))?;

                metas
                    .iter()
                    .map(|meta| BlobEntry {
                        name: self.relative(&meta.location),
                        is_directory: false,
                    })
                    .collect()
            }
        };

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn download_range(
        &self,
        path: &str,
        offset: u64,
        length: Option<u64>,
    ) -> Result<Bytes, StoreError> {
        let location = self.full_path(path);
        let meta = self
            .inner
            .head(&location)
            .await
            .map_err(|e| Self::store_error(path, e))?;

        let size = meta.size as u64;
        if offset >= size {
            return Ok(Bytes::new());
        }
        let end = match length {
            Some(len) => offset.saturating_add(len).min(size),
            None => size,
        };

        tracing::trace!(path, offset, end, "download_range");
        self.inner
            .get_range(&location, offset as usize..end as usize)
            .await
            .map_err(|e| Self::store_error(path, e))
    }

    async fn download_whole(&self, path: &str) -> Result<Bytes, StoreError> {
        let location = self.full_path(path);
        tracing::trace!(path, "download_whole");
        let result = self
            .inner
            .get(&location)
            .await
            .map_err(|e| Self::store_error(path, e))?;
        result.bytes().await.map_err(|e| Self::store_error(path, e))
    }
}
