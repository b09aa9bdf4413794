//! Upload walker: makes a remote subtree match a local one.

use super::context::{Action, Outcome, SyncContext};
use super::detect::{detect_change, log_change, FileVersion};
use super::prune::{self, PendingDeletions};
use crate::fs::LocalKind;
use crate::remote;
use crate::SyncError;
use futures_util::future::BoxFuture;
use std::path::Path;
use tracing::{debug, warn};

/// Reconcile the remote directory `remote_path` against `local_dir`.
///
/// `is_root` marks the synchronization root, which is known to exist and is
/// never replaced or created.
pub(crate) fn up_sync_dir<'a, 'b: 'a>(
    ctx: &'a mut SyncContext<'b>,
    local_dir: &'a Path,
    remote_path: &'a str,
    is_root: bool,
) -> BoxFuture<'a, Outcome> {
    Box::pin(async move {
        ctx.stats.folders_processed += 1;
        let remote = ctx.remote;
        let options = ctx.options;

        // Children can only be listed if the directory existed before this visit
        let mut listable = true;

        if !is_root {
            let node = match remote.stat(remote_path).await {
                Ok(node) => node,
                Err(e) => return ctx.recoverable(SyncError::remote("Stat", remote_path, e)),
            };

            if options.delete_only {
                if !node.as_ref().is_some_and(|n| remote.is_container(n)) {
                    debug!("No remote directory at {}, nothing to prune", remote_path);
                    return Outcome::Success;
                }
            } else {
                let mut missing = node.is_none();

                if let Some(node) = &node {
                    if !remote.is_container(node) {
                        ctx.announce(Action::Remove, remote_path);
                        if !options.dry_run {
                            if let Err(e) = remote.remove(remote_path).await {
                                return ctx.recoverable(SyncError::remote("Remove", remote_path, e));
                            }
                        }
                        missing = true;
                    }
                }

                if missing {
                    ctx.announce(Action::CreateDir, remote_path);
                    if !options.dry_run {
                        if let Err(e) = remote.make_directory(remote_path).await {
                            return ctx.recoverable(SyncError::remote(
                                "Create directory",
                                remote_path,
                                e,
                            ));
                        }
                    }
                    listable = false;
                }
            }
        }

        let mut pending = if !options.deletes() {
            None
        } else if listable {
            match remote.list_children(remote_path).await {
                Ok(children) => Some(PendingDeletions::from_remote(children)),
                Err(e) => return ctx.fatal(SyncError::remote("List", remote_path, e)),
            }
        } else {
            Some(PendingDeletions::default())
        };

        let children = match ctx.local.list_children(local_dir) {
            Ok(children) => children,
            Err(source) => {
                return ctx.fatal(SyncError::ReadDir {
                    path: local_dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut status = Outcome::Success;
        for child in children {
            let child_local = local_dir.join(&child.name);

            // Remote names are UTF-8 only
            let Some(name) = child.utf8_name() else {
                warn!("Skipping {}: name is not valid UTF-8", child_local.display());
                continue;
            };
            let child_remote = remote::join(remote_path, name);

            if let Some(pending) = pending.as_mut() {
                if !pending.claim(name) {
                    debug!("New file: {}", child_remote);
                }
            }

            let outcome = match child.kind {
                LocalKind::Directory => up_sync_dir(ctx, &child_local, &child_remote, false).await,
                LocalKind::RegularFile if options.delete_only => Outcome::Success,
                LocalKind::RegularFile => up_sync_file(ctx, &child_local, &child_remote).await,
                LocalKind::Other | LocalKind::Absent => {
                    warn!("Skipping special file {}", child_local.display());
                    Outcome::Success
                }
            };

            if !ctx.absorb(&mut status, outcome) {
                break;
            }
        }

        if let Some(pending) = pending {
            if status.is_success() && !pending.is_empty() {
                let outcome = prune::remove_remote_leftovers(ctx, pending).await;
                ctx.absorb(&mut status, outcome);
            }
        }

        status
    })
}

/// Upload one local file to `remote_path` if the remote copy differs.
pub(crate) async fn up_sync_file(
    ctx: &mut SyncContext<'_>,
    local_file: &Path,
    remote_path: &str,
) -> Outcome {
    ctx.stats.files_processed += 1;
    let remote = ctx.remote;
    let options = ctx.options;

    let stat = match ctx.local.stat(local_file) {
        Ok(stat) => stat,
        Err(source) => {
            return ctx.recoverable(SyncError::Stat {
                path: local_file.to_path_buf(),
                source,
            })
        }
    };

    if stat.size == 0 {
        debug!("Ignoring empty file {}", local_file.display());
        return Outcome::Success;
    }

    let node = match remote.stat(remote_path).await {
        Ok(node) => node,
        Err(e) => return ctx.recoverable(SyncError::remote("Stat", remote_path, e)),
    };

    if let Some(node) = node {
        if remote.is_container(&node) && !options.force {
            return ctx.recoverable(SyncError::IsADirectory(remote_path.to_string()));
        }

        let source = FileVersion::from(&stat);
        let destination = FileVersion::from(&node);
        let change = detect_change(source, destination, options.always);
        log_change(remote_path, change, source, destination);
        if !change.needs_transfer() {
            return Outcome::Success;
        }

        ctx.announce(Action::Remove, remote_path);
        if !options.dry_run {
            if let Err(e) = remote.remove(remote_path).await {
                return ctx.recoverable(SyncError::remote("Remove", remote_path, e));
            }
        }
    }

    ctx.announce(Action::Transfer, remote_path);

    if !options.dry_run {
        let progress = ctx.progress;
        let label = local_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        progress.begin(&label, stat.size);
        let report = |done: u64, total: u64| progress.update(done, total);
        let result = remote.put_file(remote_path, local_file, &report).await;
        progress.finish(result.is_ok());

        if let Err(e) = result {
            return ctx.recoverable(SyncError::remote("Upload", remote_path, e));
        }
    }

    ctx.stats.bytes_transferred += stat.size;
    Outcome::Success
}
