//! Run controller: validates a run, walks the tree pair in the requested
//! direction and reports the totals.

use super::context::{DecisionSink, SyncContext};
use super::download::dl_sync_dir;
use super::stats::SyncReport;
use super::upload::up_sync_dir;
use super::{Direction, SyncOptions};
use crate::fs::{LocalKind, LocalStore};
use crate::remote::{self, RemoteStore};
use crate::transfer::ProgressReporter;
use crate::{Result, SyncError};
use std::time::Instant;
use tracing::{error, info};

/// Run one synchronization between `options.local_root` and
/// `options.remote_root`.
///
/// Errors returned here mean the run never started. Failures during the
/// walk are logged, counted, and reflected in [`SyncReport::success`].
pub async fn run_sync(
    options: &SyncOptions,
    remote: &dyn RemoteStore,
    local: &dyn LocalStore,
    sink: &mut dyn DecisionSink,
    progress: &ProgressReporter,
) -> Result<SyncReport> {
    options.validate()?;

    let mut options = options.clone();
    options.remote_root = remote::normalize(&options.remote_root);
    if options.delete_only {
        options.delete = true;
    }

    let root = remote
        .stat(&options.remote_root)
        .await?
        .ok_or_else(|| SyncError::RemoteNotFound(options.remote_root.clone()))?;
    if !remote.is_container(&root) {
        return Err(SyncError::RemoteNotFolder(options.remote_root.clone()));
    }

    match local.kind_of(&options.local_root) {
        LocalKind::Directory => {}
        LocalKind::Absent => return Err(SyncError::LocalNotFound(options.local_root.clone())),
        _ => {
            return Err(SyncError::NotADirectory(
                options.local_root.display().to_string(),
            ))
        }
    }

    info!(
        "Synchronizing {} {} {} on {}",
        options.local_root.display(),
        match options.direction {
            Direction::Upload => "->",
            Direction::Download => "<-",
        },
        options.remote_root,
        remote.name()
    );

    let started = Instant::now();
    let mut ctx = SyncContext::new(&options, remote, local, sink, progress);

    let outcome = match options.direction {
        Direction::Upload => {
            up_sync_dir(&mut ctx, &options.local_root, &options.remote_root, true).await
        }
        Direction::Download => dl_sync_dir(&mut ctx, &root, &options.local_root).await,
    };
    let mut success = outcome.is_success();

    if options.direction == Direction::Upload && !options.dry_run {
        if let Err(e) = remote.persist().await {
            error!("Failed to save remote listing: {}", e);
            success = false;
        }
    }

    let report = SyncReport {
        stats: ctx.into_stats(),
        duration: started.elapsed(),
        success,
    };
    info!(
        "Synchronization {} in {:.2?}",
        if report.success { "finished" } else { "failed" },
        report.duration
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFs;
    use crate::remote::{ProgressFn, VaultStore};
    use crate::sync::Decision;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    async fn vault() -> (TempDir, VaultStore) {
        let dir = TempDir::new().unwrap();
        let vault = VaultStore::open(dir.path().join("vault")).await.unwrap();
        (dir, vault)
    }

    #[tokio::test]
    async fn test_conflicting_flags_rejected_before_any_io() {
        let (_dir, vault) = vault().await;
        let mut options = SyncOptions::new("/does-not-exist", "/nowhere", Direction::Upload);
        options.delete_only = true;
        options.always = true;

        let mut sink: Vec<Decision> = Vec::new();
        let err = run_sync(&options, &vault, &LocalFs, &mut sink, &ProgressReporter::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidOptions(_)));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_missing_roots_rejected() {
        let (dir, vault) = vault().await;
        let progress = ProgressReporter::disabled();
        let mut sink: Vec<Decision> = Vec::new();

        let options = SyncOptions::new("/missing", dir.path(), Direction::Upload);
        let err = run_sync(&options, &vault, &LocalFs, &mut sink, &progress)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteNotFound(_)));

        let options = SyncOptions::new("/", dir.path().join("missing"), Direction::Download);
        let err = run_sync(&options, &vault, &LocalFs, &mut sink, &progress)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::LocalNotFound(_)));

        let file = dir.path().join("plain");
        fs::write(&file, b"x").unwrap();
        let options = SyncOptions::new("/", &file, Direction::Download);
        let err = run_sync(&options, &vault, &LocalFs, &mut sink, &progress)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_remote_root_must_be_a_folder() {
        let (dir, vault) = vault().await;
        let file = dir.path().join("f");
        fs::write(&file, b"abc").unwrap();
        let noop: ProgressFn<'_> = &|_, _| {};
        vault.put_file("/f", &file, noop).await.unwrap();

        let options = SyncOptions::new("/f", dir.path(), Direction::Download);
        let mut sink: Vec<Decision> = Vec::new();
        let err = run_sync(&options, &vault, &LocalFs, &mut sink, &ProgressReporter::disabled())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::RemoteNotFolder(_)));
    }

    #[tokio::test]
    async fn test_upload_persists_listing() {
        let dir = TempDir::new().unwrap();
        let vault_dir = dir.path().join("vault");
        let tree = dir.path().join("tree");
        fs::create_dir(&tree).unwrap();
        fs::write(tree.join("a.txt"), b"hello").unwrap();

        let vault = VaultStore::open(&vault_dir).await.unwrap();
        let options = SyncOptions::new("/", &tree, Direction::Upload);
        let mut sink: Vec<Decision> = Vec::new();
        let report = run_sync(&options, &vault, &LocalFs, &mut sink, &ProgressReporter::disabled())
            .await
            .unwrap();
        assert!(report.success);

        let reopened = VaultStore::open(&vault_dir).await.unwrap();
        let node = reopened.stat("/a.txt").await.unwrap().unwrap();
        assert_eq!(node.size, 5);
        assert!(Path::new(&vault_dir).join("index.json").exists());
    }
}
