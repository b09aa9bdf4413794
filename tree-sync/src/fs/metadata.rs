//! Local entry classification and stat snapshots.
//!
//! Entries are classified with `symlink_metadata`, so a symbolic link is
//! reported as [`LocalKind::Other`] and is never followed.

use filetime::FileTime;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

/// Type of a local path as seen by the reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Directory,
    RegularFile,
    /// Symlinks, sockets, devices, fifos
    Other,
    Absent,
}

impl LocalKind {
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let file_type = metadata.file_type();
        if file_type.is_dir() {
            LocalKind::Directory
        } else if file_type.is_file() {
            LocalKind::RegularFile
        } else {
            LocalKind::Other
        }
    }

    /// Classify `path` without following a trailing symlink.
    pub fn of_path(path: &Path) -> Self {
        match fs::symlink_metadata(path) {
            Ok(metadata) => Self::from_metadata(&metadata),
            Err(_) => LocalKind::Absent,
        }
    }
}

/// Size and modification time of a local path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalStat {
    pub kind: LocalKind,

    /// Size in bytes (0 for directories)
    pub size: u64,

    /// Last modified time (seconds since Unix epoch)
    pub mtime: i64,
}

impl LocalStat {
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let kind = LocalKind::from_metadata(metadata);
        Self {
            kind,
            size: if kind == LocalKind::Directory { 0 } else { metadata.len() },
            mtime: FileTime::from_last_modification_time(metadata).unix_seconds(),
        }
    }

    /// Extract a stat snapshot from a path
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(Self::from_metadata(&metadata))
    }
}

/// One child returned by local directory enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    /// Raw file name; may not be valid UTF-8
    pub name: OsString,
    pub kind: LocalKind,
    pub size: u64,
    pub mtime: i64,
}

impl LocalEntry {
    /// The name as UTF-8, or `None` when it cannot be represented remotely
    pub fn utf8_name(&self) -> Option<&str> {
        self.name.to_str()
    }

    pub fn from_dir_entry(entry: &fs::DirEntry) -> std::io::Result<Self> {
        let stat = LocalStat::from_metadata(&entry.metadata()?);
        Ok(Self {
            name: entry.file_name(),
            kind: stat.kind,
            size: stat.size,
            mtime: stat.mtime,
        })
    }
}
