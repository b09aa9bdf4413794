//! Tree reconciliation engine.
//!
//! Walks a local tree and a remote tree in lock-step and issues the create,
//! transfer and remove operations that bring the target side in line with
//! the source side.
//!
//! - Upload: local is authoritative, the remote tree is changed
//! - Download: remote is authoritative, the local tree is changed

pub mod context;
pub mod controller;
pub mod detect;
pub mod download;
pub mod prune;
pub mod restore;
pub mod stats;
pub mod upload;


use crate::{Result, SyncError};
use std::path::PathBuf;

pub use context::{Action, Decision, DecisionSink, Outcome, StdoutSink, SyncContext};
pub use controller::run_sync;
pub use detect::{detect_change, Change, FileVersion};
pub use prune::PendingDeletions;
pub use stats::{SyncReport, SyncStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local → remote
    Upload,
    /// Remote → local
    Download,
}

/// Configuration for one run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub remote_root: String,
    pub local_root: PathBuf,
    pub direction: Direction,

    /// Remove target entries that have no source counterpart
    pub delete: bool,

    /// Only remove leftovers, never create or transfer (implies `delete`)
    pub delete_only: bool,

    /// Transfer every file without comparing size and time
    pub always: bool,

    /// Allow replacing a directory with a file
    pub force: bool,

    pub dry_run: bool,

    /// Continue past per-item failures
    pub ignore_errors: bool,

    pub no_progress: bool,

    /// Suppress decision lines
    pub quiet: bool,
}

impl SyncOptions {
    pub fn new(remote_root: impl Into<String>, local_root: impl Into<PathBuf>, direction: Direction) -> Self {
        Self {
            remote_root: remote_root.into(),
            local_root: local_root.into(),
            direction,
            delete: false,
            delete_only: false,
            always: false,
            force: false,
            dry_run: false,
            ignore_errors: false,
            no_progress: false,
            quiet: false,
        }
    }

    /// Reject flag combinations that contradict each other.
    pub fn validate(&self) -> Result<()> {
        if self.delete_only && self.always {
            return Err(SyncError::InvalidOptions(
                "--delete-only and --always are mutually exclusive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether leftovers on the target side are tracked and removed
    pub fn deletes(&self) -> bool {
        self.delete || self.delete_only
    }
}

#[cfg(test)]
mod option_tests {
    use super::*;

    #[test]
    fn test_delete_only_and_always_conflict() {
        let mut options = SyncOptions::new("/r", "/tmp", Direction::Upload);
        options.delete_only = true;
        options.always = true;
        assert!(matches!(options.validate(), Err(SyncError::InvalidOptions(_))));

        options.always = false;
        assert!(options.validate().is_ok());
        assert!(options.deletes());
    }
}
