//! Remote store abstraction.
//!
//! A remote tree is addressed by absolute, `/`-separated paths. The root is
//! `/`. Nodes are either files or folders; files may carry the modification
//! time of the local file they were uploaded from and a blob of extended
//! attributes.

pub mod vault;

use crate::Result;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use vault::VaultStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// A node in the remote tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub path: String,
    pub kind: NodeKind,

    /// Size in bytes (0 for folders)
    pub size: u64,

    /// When the object was stored (seconds since epoch)
    pub upload_timestamp: i64,

    /// Local mtime the uploader preserved, if any
    pub original_timestamp: Option<i64>,

    /// JSON array of `{name, value}` pairs, values base64 encoded
    pub extended_attributes: Option<String>,
}

impl RemoteEntry {
    /// Timestamp used for change detection: the preserved local mtime when
    /// known and positive, the upload time otherwise.
    pub fn effective_timestamp(&self) -> i64 {
        match self.original_timestamp {
            Some(ts) if ts > 0 => ts,
            _ => self.upload_timestamp,
        }
    }
}

/// Progress callback handed to transfers: `(bytes_done, bytes_total)`.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Remote store interface
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Look up a node; `Ok(None)` when nothing exists at `path`
    async fn stat(&self, path: &str) -> Result<Option<RemoteEntry>>;

    /// List the direct children of a container
    async fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>>;

    async fn make_directory(&self, path: &str) -> Result<()>;

    /// Remove a node together with everything beneath it
    async fn remove(&self, path: &str) -> Result<()>;

    /// Upload a whole local file to a path that does not exist yet
    async fn put_file(&self, remote_path: &str, local_path: &Path, progress: ProgressFn<'_>)
        -> Result<()>;

    /// Download a whole remote file to `local_path`
    async fn get_file(&self, local_path: &Path, remote_path: &str, progress: ProgressFn<'_>)
        -> Result<()>;

    fn is_container(&self, entry: &RemoteEntry) -> bool {
        entry.kind == NodeKind::Folder
    }

    /// Flush the cached node listing to durable storage
    async fn persist(&self) -> Result<()> {
        Ok(())
    }

    /// Store name (for logs)
    fn name(&self) -> &str;
}

/// Join a child name onto a remote directory path.
pub fn join(parent: &str, name: &str) -> String {
    if parent.ends_with('/') {
        format!("{}{}", parent, name)
    } else {
        format!("{}/{}", parent, name)
    }
}

/// Normalize a user supplied remote path: leading `/`, no trailing `/`,
/// no empty segments.
pub fn normalize(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

/// Parent path and base name of a normalized path; `None` for the root.
pub fn split(path: &str) -> Option<(&str, &str)> {
    if path == "/" {
        return None;
    }
    let idx = path.rfind('/')?;
    let parent = if idx == 0 { "/" } else { &path[..idx] };
    Some((parent, &path[idx + 1..]))
}

/// One extended attribute as stored in a node's attribute blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XattrEntry {
    pub name: String,
    /// Base64 (standard alphabet) encoded value
    pub value: String,
}

impl XattrEntry {
    pub fn decode_value(&self) -> std::result::Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.value)
    }
}

/// Encode attributes into a blob; `None` when there is nothing to store.
pub fn encode_xattrs(attributes: &[(String, Vec<u8>)]) -> Result<Option<String>> {
    if attributes.is_empty() {
        return Ok(None);
    }
    let entries: Vec<XattrEntry> = attributes
        .iter()
        .map(|(name, value)| XattrEntry {
            name: name.clone(),
            value: STANDARD.encode(value),
        })
        .collect();
    Ok(Some(serde_json::to_string(&entries)?))
}

/// Parse a blob into its ordered entries.
pub fn decode_xattrs(blob: &str) -> Result<Vec<XattrEntry>> {
    serde_json::from_str(blob).map_err(|e| crate::SyncError::XattrBlob(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(upload: i64, original: Option<i64>) -> RemoteEntry {
        RemoteEntry {
            name: "x".into(),
            path: "/x".into(),
            kind: NodeKind::File,
            size: 1,
            upload_timestamp: upload,
            original_timestamp: original,
            extended_attributes: None,
        }
    }

    #[test]
    fn test_effective_timestamp_prefers_original() {
        assert_eq!(entry(200, Some(100)).effective_timestamp(), 100);
        assert_eq!(entry(200, None).effective_timestamp(), 200);
        assert_eq!(entry(200, Some(0)).effective_timestamp(), 200);
        assert_eq!(entry(200, Some(-5)).effective_timestamp(), 200);
    }

    #[test]
    fn test_path_helpers() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/r", "a"), "/r/a");
        assert_eq!(normalize("r//b/"), "/r/b");
        assert_eq!(normalize("/"), "/");
        assert_eq!(split("/r/b"), Some(("/r", "b")));
        assert_eq!(split("/r"), Some(("/", "r")));
        assert_eq!(split("/"), None);
    }

    #[test]
    fn test_xattr_blob_keeps_order() {
        let blob = encode_xattrs(&[
            ("user.b".to_string(), b"2".to_vec()),
            ("user.a".to_string(), b"1".to_vec()),
        ])
        .unwrap()
        .unwrap();

        let entries = decode_xattrs(&blob).unwrap();
        assert_eq!(entries[0].name, "user.b");
        assert_eq!(entries[1].decode_value().unwrap(), b"1");
        assert_eq!(encode_xattrs(&[]).unwrap(), None);
    }

    #[test]
    fn test_malformed_blob() {
        assert!(matches!(
            decode_xattrs("{not json"),
            Err(crate::SyncError::XattrBlob(_))
        ));
    }
}
