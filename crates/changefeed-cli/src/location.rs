//! Container directory validation and client construction.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use changefeed::{ChangeFeedClient, ChangeFeedConfig, ObjectStoreBlobs};
use object_store::local::LocalFileSystem;
use thiserror::Error;

/// Errors for container and chunk paths given on the command line.
#[derive(Error, Debug)]
pub enum LocationError {
    /// The path does not exist.
    #[error("{0} does not exist")]
    Missing(String),
    /// The path exists but has the wrong kind.
    #[error("{path} is not a {expected}")]
    WrongKind {
        /// Sanitized path.
        path: String,
        /// "directory" or "file".
        expected: &'static str,
    },
    /// The path could not be resolved.
    #[error("cannot resolve {path}: {source}")]
    Io {
        /// Sanitized path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

/// Resolves `root` to an absolute container directory.
pub fn validate_container_dir(root: &str) -> Result<PathBuf, LocationError> {
    let path = resolve(root)?;
    if !path.is_dir() {
        return Err(LocationError::WrongKind {
            path: sanitize_path_for_error(&path),
            expected: "directory",
        });
    }
    Ok(path)
}

/// Resolves `file` to an absolute path of an existing regular file.
pub fn validate_file(file: &str) -> Result<PathBuf, LocationError> {
    let path = resolve(file)?;
    if !path.is_file() {
        return Err(LocationError::WrongKind {
            path: sanitize_path_for_error(&path),
            expected: "file",
        });
    }
    Ok(path)
}

/// Keeps only the last two components of a path for error messages.
pub fn sanitize_path_for_error(path: &Path) -> String {
    let mut components = path
        .components()
        .rev()
        .map(|c| c.as_os_str().to_string_lossy().into_owned());
    match (components.next(), components.next()) {
        (None, _) => String::from("<empty>"),
        (Some(only), None) => only,
        (Some(last), Some(parent)) => format!(".../{}/{}", parent, last),
    }
}

/// Builds a client reading the container at `root`.
pub fn open_client(root: &str, container: &str) -> Result<ChangeFeedClient, Box<dyn std::error::Error>> {
    let dir = validate_container_dir(root)?;
    let local = LocalFileSystem::new_with_prefix(&dir)?;
    let blobs = ObjectStoreBlobs::new(Arc::new(local), "");
    let config = ChangeFeedConfig {
        container: container.to_string(),
        ..ChangeFeedConfig::default()
    };
    Ok(ChangeFeedClient::new(Arc::new(blobs), config))
}

fn resolve(raw: &str) -> Result<PathBuf, LocationError> {
    if raw.is_empty() {
        return Err(LocationError::Missing(String::from("<empty>")));
    }
    let path = Path::new(raw);
    if !path.exists() {
        return Err(LocationError::Missing(sanitize_path_for_error(path)));
    }
    path.canonicalize().map_err(|source| LocationError::Io {
        path: sanitize_path_for_error(path),
        source,
    })
}
