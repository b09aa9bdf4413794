//! Metadata applier: restores timestamps and extended attributes on a file
//! that was just downloaded.

use crate::fs::{LocalStore, XattrError};
use crate::remote::{decode_xattrs, RemoteEntry};
use crate::{Result, SyncError};
use std::path::Path;
use tracing::{debug, warn};

/// Apply the remote node's metadata to `path`. Does nothing on a dry run.
///
/// A timestamp that cannot be set only produces a warning. Attributes are
/// applied in blob order; the first hard failure stops the rest, and those
/// already set stay set.
pub fn apply_remote_metadata(
    local: &dyn LocalStore,
    entry: &RemoteEntry,
    path: &Path,
    dry_run: bool,
) -> Result<()> {
    if dry_run {
        return Ok(());
    }

    let timestamp = entry.effective_timestamp();
    if timestamp > 0 {
        if let Err(e) = local.set_times(path, timestamp, timestamp) {
            warn!("Failed to set file times on {}: {}", path.display(), e);
        }
    }

    if let Some(blob) = &entry.extended_attributes {
        restore_xattrs(local, path, blob)?;
    }

    Ok(())
}

fn restore_xattrs(local: &dyn LocalStore, path: &Path, blob: &str) -> Result<()> {
    for attribute in decode_xattrs(blob)? {
        if attribute.name.is_empty() {
            continue;
        }

        let value = attribute.decode_value().map_err(|e| {
            SyncError::XattrBlob(format!("attribute {}: {}", attribute.name, e))
        })?;

        match local.set_extended_attribute(path, &attribute.name, &value) {
            Ok(()) => {}
            Err(XattrError::Unsupported) => {
                debug!(
                    "Extended attributes unsupported on {}, skipping {}",
                    path.display(),
                    attribute.name
                );
            }
            Err(XattrError::Io(source)) => {
                return Err(SyncError::Xattr {
                    path: path.to_path_buf(),
                    name: attribute.name,
                    source,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{LocalEntry, LocalKind, LocalStat};
    use crate::remote::{encode_xattrs, NodeKind};
    use std::io;
    use std::sync::Mutex;

    /// Records metadata calls; fails attributes named in `failing`.
    #[derive(Default)]
    struct RecordingStore {
        times: Mutex<Vec<(i64, i64)>>,
        attributes: Mutex<Vec<(String, Vec<u8>)>>,
        failing: Vec<String>,
        unsupported: bool,
        times_fail: bool,
    }

    impl LocalStore for RecordingStore {
        fn stat(&self, _path: &Path) -> io::Result<LocalStat> {
            Err(io::Error::from(io::ErrorKind::Unsupported))
        }

        fn list_children(&self, _path: &Path) -> io::Result<Vec<LocalEntry>> {
            Ok(Vec::new())
        }

        fn kind_of(&self, _path: &Path) -> LocalKind {
            LocalKind::RegularFile
        }

        fn make_directory(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }

        fn delete(&self, _path: &Path) -> io::Result<()> {
            Ok(())
        }

        fn set_times(&self, _path: &Path, atime: i64, mtime: i64) -> io::Result<()> {
            if self.times_fail {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            self.times.lock().unwrap().push((atime, mtime));
            Ok(())
        }

        fn set_extended_attribute(
            &self,
            _path: &Path,
            name: &str,
            value: &[u8],
        ) -> std::result::Result<(), XattrError> {
            if self.unsupported {
                return Err(XattrError::Unsupported);
            }
            if self.failing.iter().any(|f| f == name) {
                return Err(XattrError::Io(io::Error::from(io::ErrorKind::PermissionDenied)));
            }
            self.attributes
                .lock()
                .unwrap()
                .push((name.to_string(), value.to_vec()));
            Ok(())
        }
    }

    fn entry(xattrs: Option<String>) -> RemoteEntry {
        RemoteEntry {
            name: "f".into(),
            path: "/f".into(),
            kind: NodeKind::File,
            size: 1,
            upload_timestamp: 2_000,
            original_timestamp: Some(1_000),
            extended_attributes: xattrs,
        }
    }

    fn blob(names: &[&str]) -> Option<String> {
        let pairs: Vec<(String, Vec<u8>)> = names
            .iter()
            .map(|n| (n.to_string(), n.as_bytes().to_vec()))
            .collect();
        encode_xattrs(&pairs).unwrap()
    }

    #[test]
    fn test_sets_effective_timestamp() {
        let store = RecordingStore::default();
        apply_remote_metadata(&store, &entry(None), Path::new("/f"), false).unwrap();
        assert_eq!(*store.times.lock().unwrap(), vec![(1_000, 1_000)]);
    }

    #[test]
    fn test_time_failure_is_only_a_warning() {
        let store = RecordingStore {
            times_fail: true,
            ..Default::default()
        };
        assert!(apply_remote_metadata(&store, &entry(None), Path::new("/f"), false).is_ok());
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let store = RecordingStore::default();
        apply_remote_metadata(&store, &entry(blob(&["user.a"])), Path::new("/f"), true).unwrap();
        assert!(store.times.lock().unwrap().is_empty());
        assert!(store.attributes.lock().unwrap().is_empty());
    }

    #[test]
    fn test_attributes_applied_in_order() {
        let store = RecordingStore::default();
        let blob = blob(&["user.b", "user.a"]);
        apply_remote_metadata(&store, &entry(blob), Path::new("/f"), false).unwrap();

        let applied = store.attributes.lock().unwrap();
        assert_eq!(applied[0], ("user.b".to_string(), b"user.b".to_vec()));
        assert_eq!(applied[1].0, "user.a");
    }

    #[test]
    fn test_empty_names_are_skipped() {
        let store = RecordingStore::default();
        let blob = r#"[{"name":"","value":"eA=="},{"name":"user.x","value":"eA=="}]"#;
        apply_remote_metadata(&store, &entry(Some(blob.into())), Path::new("/f"), false).unwrap();
        assert_eq!(*store.attributes.lock().unwrap(), vec![("user.x".to_string(), b"x".to_vec())]);
    }

    #[test]
    fn test_unsupported_filesystem_is_ignored() {
        let store = RecordingStore {
            unsupported: true,
            ..Default::default()
        };
        assert!(apply_remote_metadata(&store, &entry(blob(&["user.a"])), Path::new("/f"), false).is_ok());
    }

    #[test]
    fn test_failure_stops_remaining_but_keeps_applied() {
        let store = RecordingStore {
            failing: vec!["user.b".to_string()],
            ..Default::default()
        };
        let blob = blob(&["user.a", "user.b", "user.c"]);
        let err = apply_remote_metadata(&store, &entry(blob), Path::new("/f"), false).unwrap_err();

        assert!(matches!(err, SyncError::Xattr { ref name, .. } if name == "user.b"));
        let applied = store.attributes.lock().unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].0, "user.a");
    }

    #[test]
    fn test_bad_base64_is_an_error() {
        let store = RecordingStore::default();
        let blob = r#"[{"name":"user.x","value":"***"}]"#;
        let err = apply_remote_metadata(&store, &entry(Some(blob.into())), Path::new("/f"), false)
            .unwrap_err();
        assert!(matches!(err, SyncError::XattrBlob(_)));
    }
}
