//! Error types for the tree synchronizer.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unable to stat {}: {source}", path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't read local directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't create local directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Can't delete {}: {source}", path.display())]
    Delete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Target is a directory, cannot overwrite (use --force): {0}")]
    IsADirectory(String),

    #[error("Target is not a regular file, cannot overwrite: {0}")]
    NotRegularFile(String),

    #[error("Target is not a directory, cannot write here: {0}")]
    NotADirectory(String),

    #[error("Remote node not found: {0}")]
    RemoteNotFound(String),

    #[error("Remote node already exists: {0}")]
    RemoteExists(String),

    #[error("Remote path must be a folder: {0}")]
    RemoteNotFolder(String),

    #[error("Local directory not found: {}", .0.display())]
    LocalNotFound(PathBuf),

    #[error("{op} failed for {path}: {source}")]
    Remote {
        op: &'static str,
        path: String,
        #[source]
        source: Box<SyncError>,
    },

    #[error("Malformed extended attribute data: {0}")]
    XattrBlob(String),

    #[error("Can't set extended attribute {name} on {}: {source}", path.display())]
    Xattr {
        path: PathBuf,
        name: String,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Wraps a remote store failure with the operation and path it hit.
    pub fn remote(op: &'static str, path: &str, source: SyncError) -> Self {
        SyncError::Remote {
            op,
            path: path.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_message_names_operation_and_path() {
        let err = SyncError::remote(
            "Upload",
            "/r/x.txt",
            SyncError::RemoteExists("/r/x.txt".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "Upload failed for /r/x.txt: Remote node already exists: /r/x.txt"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SyncError = io.into();
        assert!(matches!(err, SyncError::Io(_)));
    }
}
