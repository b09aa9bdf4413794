//! Directory-backed remote store.
//!
//! Layout of a vault directory:
//!
//! ```text
//! <vault>/index.json      node index, written by `persist`
//! <vault>/objects/<uuid>  one blob per stored file
//! ```
//!
//! The index is held in memory and only written back on [`RemoteStore::persist`],
//! the same way a remote session keeps its cached listing until it is saved.
//! Blobs are written immediately.

use super::{encode_xattrs, join, normalize, split, NodeKind, ProgressFn, RemoteEntry, RemoteStore};
use crate::fs::xattr::{read_user_attributes, XattrError};
use crate::{Result, SyncError};
use async_trait::async_trait;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const INDEX_FILE: &str = "index.json";
const OBJECTS_DIR: &str = "objects";
const INDEX_VERSION: u32 = 1;
const COPY_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeRecord {
    kind: NodeKind,
    #[serde(default)]
    size: u64,
    timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    local_ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    xattrs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    blob: Option<String>,
}

impl NodeRecord {
    fn folder() -> Self {
        Self {
            kind: NodeKind::Folder,
            size: 0,
            timestamp: chrono::Utc::now().timestamp(),
            local_ts: None,
            xattrs: None,
            blob: None,
        }
    }

    fn to_entry(&self, path: &str) -> RemoteEntry {
        let name = split(path).map(|(_, name)| name).unwrap_or("");
        RemoteEntry {
            name: name.to_string(),
            path: path.to_string(),
            kind: self.kind,
            size: self.size,
            upload_timestamp: self.timestamp,
            original_timestamp: self.local_ts,
            extended_attributes: self.xattrs.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VaultIndex {
    version: u32,
    nodes: BTreeMap<String, NodeRecord>,
}

impl VaultIndex {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), NodeRecord::folder());
        Self {
            version: INDEX_VERSION,
            nodes,
        }
    }

    /// Check that `path` is free and its parent is a folder.
    fn check_insert(&self, path: &str) -> Result<()> {
        let (parent, _) =
            split(path).ok_or_else(|| SyncError::RemoteExists(path.to_string()))?;
        match self.nodes.get(parent) {
            Some(record) if record.kind == NodeKind::Folder => {}
            Some(_) => return Err(SyncError::RemoteNotFolder(parent.to_string())),
            None => return Err(SyncError::RemoteNotFound(parent.to_string())),
        }
        if self.nodes.contains_key(path) {
            return Err(SyncError::RemoteExists(path.to_string()));
        }
        Ok(())
    }

    /// Keys of `path` and everything beneath it
    fn subtree(&self, path: &str) -> Vec<String> {
        let prefix = join(path, "");
        let mut keys = vec![path.to_string()];
        keys.extend(
            self.nodes
                .range(prefix.clone()..)
                .take_while(|(key, _)| key.starts_with(&prefix))
                .map(|(key, _)| key.clone()),
        );
        keys
    }
}

pub struct VaultStore {
    root: PathBuf,
    index: RwLock<VaultIndex>,
    name: String,
}

impl VaultStore {
    /// Open a vault, creating an empty one if `root` holds none yet.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join(OBJECTS_DIR)).await?;

        let index_path = root.join(INDEX_FILE);
        let index = match fs::read(&index_path).await {
            Ok(data) => {
                let index: VaultIndex = serde_json::from_slice(&data)?;
                if index.version != INDEX_VERSION {
                    return Err(SyncError::Config(format!(
                        "unsupported vault index version {} in {}",
                        index.version,
                        index_path.display()
                    )));
                }
                index
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => VaultIndex::new(),
            Err(e) => return Err(e.into()),
        };

        let swept = sweep_orphan_blobs(&root.join(OBJECTS_DIR), &index).await?;
        if swept > 0 {
            info!("Removed {} unreferenced blob(s) from {}", swept, root.display());
        }

        info!("Opened vault {} ({} nodes)", root.display(), index.nodes.len());
        let name = format!("vault:{}", root.display());
        Ok(Self {
            root,
            index: RwLock::new(index),
            name,
        })
    }

    fn blob_path(&self, blob: &str) -> PathBuf {
        self.root.join(OBJECTS_DIR).join(blob)
    }
}

/// Remove blobs no index entry refers to, such as the partial copy left
/// behind by an interrupted upload. Returns how many were removed.
async fn sweep_orphan_blobs(objects: &Path, index: &VaultIndex) -> Result<usize> {
    let referenced: HashSet<&str> = index
        .nodes
        .values()
        .filter_map(|record| record.blob.as_deref())
        .collect();

    let mut removed = 0;
    let mut entries = fs::read_dir(objects).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_str().is_some_and(|blob| referenced.contains(blob)) {
            continue;
        }
        match fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!("Removed unreferenced blob {}", entry.path().display());
                removed += 1;
            }
            Err(e) => warn!("Can't remove {}: {}", entry.path().display(), e),
        }
    }
    Ok(removed)
}

async fn copy_with_progress(
    source: &Path,
    destination: &Path,
    total: u64,
    progress: ProgressFn<'_>,
) -> std::io::Result<u64> {
    let mut reader = fs::File::open(source).await?;
    let mut writer = fs::File::create(destination).await?;
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut done = 0u64;

    progress(0, total);
    loop {
        let n = reader.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        writer.write_all(&buffer[..n]).await?;
        done += n as u64;
        progress(done, total);
    }
    writer.flush().await?;

    Ok(done)
}

#[async_trait]
impl RemoteStore for VaultStore {
    async fn stat(&self, path: &str) -> Result<Option<RemoteEntry>> {
        let path = normalize(path);
        let index = self.index.read().await;
        Ok(index.nodes.get(&path).map(|record| record.to_entry(&path)))
    }

    async fn list_children(&self, path: &str) -> Result<Vec<RemoteEntry>> {
        let path = normalize(path);
        let index = self.index.read().await;
        match index.nodes.get(&path) {
            Some(record) if record.kind == NodeKind::Folder => {}
            Some(_) => return Err(SyncError::RemoteNotFolder(path)),
            None => return Err(SyncError::RemoteNotFound(path)),
        }

        let prefix = join(&path, "");
        Ok(index
            .nodes
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| key.len() > prefix.len() && !key[prefix.len()..].contains('/'))
            .map(|(key, record)| record.to_entry(key))
            .collect())
    }

    async fn make_directory(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        let mut index = self.index.write().await;
        index.check_insert(&path)?;
        index.nodes.insert(path, NodeRecord::folder());
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<()> {
        let path = normalize(path);
        if path == "/" {
            return Err(SyncError::RemoteNotFolder("cannot remove the root".to_string()));
        }

        let blobs: Vec<String> = {
            let mut index = self.index.write().await;
            if !index.nodes.contains_key(&path) {
                return Err(SyncError::RemoteNotFound(path));
            }
            index
                .subtree(&path)
                .into_iter()
                .filter_map(|key| index.nodes.remove(&key))
                .filter_map(|record| record.blob)
                .collect()
        };

        for blob in blobs {
            match fs::remove_file(self.blob_path(&blob)).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove blob {}: {}", blob, e),
            }
        }
        Ok(())
    }

    async fn put_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let remote_path = normalize(remote_path);
        self.index.read().await.check_insert(&remote_path)?;

        let metadata = fs::metadata(local_path).await?;
        let mtime = FileTime::from_last_modification_time(&metadata).unix_seconds();

        let xattrs = match read_user_attributes(local_path) {
            Ok(attributes) => encode_xattrs(&attributes)?,
            Err(XattrError::Unsupported) => None,
            Err(XattrError::Io(e)) => {
                warn!("Can't read extended attributes of {}: {}", local_path.display(), e);
                None
            }
        };

        let blob = uuid::Uuid::new_v4().to_string();
        let blob_path = self.blob_path(&blob);
        let size = match copy_with_progress(local_path, &blob_path, metadata.len(), progress).await
        {
            Ok(size) => size,
            Err(e) => {
                let _ = fs::remove_file(&blob_path).await;
                return Err(e.into());
            }
        };

        let mut index = self.index.write().await;
        if let Err(e) = index.check_insert(&remote_path) {
            drop(index);
            let _ = fs::remove_file(&blob_path).await;
            return Err(e);
        }
        debug!("Stored {} as blob {} ({} bytes)", remote_path, blob, size);
        index.nodes.insert(
            remote_path,
            NodeRecord {
                kind: NodeKind::File,
                size,
                timestamp: chrono::Utc::now().timestamp(),
                local_ts: (mtime > 0).then_some(mtime),
                xattrs,
                blob: Some(blob),
            },
        );
        Ok(())
    }

    async fn get_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        progress: ProgressFn<'_>,
    ) -> Result<()> {
        let remote_path = normalize(remote_path);
        let (blob, size) = {
            let index = self.index.read().await;
            match index.nodes.get(&remote_path) {
                Some(NodeRecord {
                    kind: NodeKind::File,
                    blob: Some(blob),
                    size,
                    ..
                }) => (blob.clone(), *size),
                Some(_) => return Err(SyncError::NotRegularFile(remote_path)),
                None => return Err(SyncError::RemoteNotFound(remote_path)),
            }
        };

        copy_with_progress(&self.blob_path(&blob), local_path, size, progress).await?;
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        let data = {
            let index = self.index.read().await;
            serde_json::to_vec_pretty(&*index)?
        };

        let index_path = self.root.join(INDEX_FILE);
        let temp_path = index_path.with_extension("tmp");
        fs::write(&temp_path, data).await?;
        fs::rename(&temp_path, &index_path).await?;

        debug!("Persisted vault index to {}", index_path.display());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
