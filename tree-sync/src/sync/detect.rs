//! Change detection between two versions of the same file.
//!
//! Size and whole-second modification time only; no content is read.

use crate::fs::LocalStat;
use crate::remote::RemoteEntry;
use tracing::debug;

/// The comparable facts about one side of a file pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileVersion {
    pub size: u64,
    /// Seconds since epoch
    pub timestamp: i64,
}

impl From<&LocalStat> for FileVersion {
    fn from(stat: &LocalStat) -> Self {
        Self {
            size: stat.size,
            timestamp: stat.mtime,
        }
    }
}

impl From<&RemoteEntry> for FileVersion {
    fn from(entry: &RemoteEntry) -> Self {
        Self {
            size: entry.size,
            timestamp: entry.effective_timestamp(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// `--always` was given
    Forced,
    SizeDiffers,
    TimestampDiffers,
    Unchanged,
}

impl Change {
    pub fn needs_transfer(self) -> bool {
        self != Change::Unchanged
    }
}

pub fn detect_change(source: FileVersion, destination: FileVersion, always: bool) -> Change {
    if always {
        Change::Forced
    } else if source.size != destination.size {
        Change::SizeDiffers
    } else if source.timestamp != destination.timestamp {
        Change::TimestampDiffers
    } else {
        Change::Unchanged
    }
}

/// Emit the debug note explaining a detection result.
pub fn log_change(path: &str, change: Change, source: FileVersion, destination: FileVersion) {
    match change {
        Change::Forced => debug!("File {}: transfer forced", path),
        Change::SizeDiffers => debug!(
            "File {}: sizes differ (source={}, target={})",
            path, source.size, destination.size
        ),
        Change::TimestampDiffers => debug!(
            "File {}: timestamp mismatch (source={}, target={})",
            path, source.timestamp, destination.timestamp
        ),
        Change::Unchanged => debug!("File {} appears identical, skipping", path),
    }
}
