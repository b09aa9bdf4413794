//! Run statistics.

use crate::transfer::progress::{format_bytes, format_duration, format_speed};
use std::fmt;
use std::time::Duration;

/// Counters updated by every leaf operation of a run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub files_processed: u64,
    pub files_with_errors: u64,
    pub folders_processed: u64,
    pub elements_deleted: u64,
    pub bytes_transferred: u64,
}

/// What a finished run hands back to the caller
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub stats: SyncStats,
    pub duration: Duration,
    /// Whether the top-level walk succeeded
    pub success: bool,
}

impl SyncReport {
    /// Bytes per second, with the duration floored to one second.
    pub fn average_speed(&self) -> u64 {
        self.stats.bytes_transferred / self.duration.as_secs().max(1)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Files processed: {}", self.stats.files_processed)?;
        writeln!(f, "Folders processed: {}", self.stats.folders_processed)?;
        writeln!(f, "Files with errors: {}", self.stats.files_with_errors)?;
        if self.stats.elements_deleted > 0 {
            writeln!(f, "Elements deleted: {}", self.stats.elements_deleted)?;
        }
        write!(
            f,
            "Transferred: {} in {} ({})",
            format_bytes(self.stats.bytes_transferred),
            format_duration(self.duration.as_secs()),
            format_speed(self.average_speed())
        )
    }
}
