//! Local filesystem capability used by the reconciler.
//!
//! The reconciler never touches `std::fs` directly; every primitive goes
//! through [`LocalStore`] so it can be swapped out in tests.

use super::metadata::{LocalEntry, LocalKind, LocalStat};
use super::xattr::{self, XattrError};
use filetime::FileTime;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

pub trait LocalStore: Send + Sync {
    /// Stat a path without following a trailing symlink
    fn stat(&self, path: &Path) -> io::Result<LocalStat>;

    /// List one directory level
    fn list_children(&self, path: &Path) -> io::Result<Vec<LocalEntry>>;

    fn kind_of(&self, path: &Path) -> LocalKind;

    fn exists(&self, path: &Path) -> bool {
        self.kind_of(path) != LocalKind::Absent
    }

    fn make_directory(&self, path: &Path) -> io::Result<()>;

    /// Delete a file or an empty directory. Not recursive.
    fn delete(&self, path: &Path) -> io::Result<()>;

    /// Set access and modification time, in seconds since the epoch
    fn set_times(&self, path: &Path, atime: i64, mtime: i64) -> io::Result<()>;

    fn set_extended_attribute(&self, path: &Path, name: &str, value: &[u8])
        -> Result<(), XattrError>;
}

/// Stat each enumerated child. A child that cannot be stat'ed (it may have
/// vanished since the directory was read) is left out.
fn stat_entries(entries: impl IntoIterator<Item = fs::DirEntry>) -> Vec<LocalEntry> {
    entries
        .into_iter()
        .filter_map(|entry| match LocalEntry::from_dir_entry(&entry) {
            Ok(local) => Some(local),
            Err(e) => {
                warn!("Skipping {}: {}", entry.path().display(), e);
                None
            }
        })
        .collect()
}

/// [`LocalStore`] backed by the real filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

impl LocalStore for LocalFs {
    fn stat(&self, path: &Path) -> io::Result<LocalStat> {
        LocalStat::from_path(path)
    }

    fn list_children(&self, path: &Path) -> io::Result<Vec<LocalEntry>> {
        let entries = fs::read_dir(path)?.collect::<io::Result<Vec<_>>>()?;
        Ok(stat_entries(entries))
    }

    fn kind_of(&self, path: &Path) -> LocalKind {
        LocalKind::of_path(path)
    }

    fn make_directory(&self, path: &Path) -> io::Result<()> {
        fs::create_dir(path)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        if LocalKind::of_path(path) == LocalKind::Directory {
            fs::remove_dir(path)
        } else {
            fs::remove_file(path)
        }
    }

    fn set_times(&self, path: &Path, atime: i64, mtime: i64) -> io::Result<()> {
        filetime::set_file_times(
            path,
            FileTime::from_unix_time(atime, 0),
            FileTime::from_unix_time(mtime, 0),
        )
    }

    fn set_extended_attribute(
        &self,
        path: &Path,
        name: &str,
        value: &[u8],
    ) -> Result<(), XattrError> {
        xattr::set_attribute(path, name, value)
    }
}
