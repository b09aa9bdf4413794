//! Download walker: makes a local subtree match a remote one.

use super::context::{Action, Outcome, SyncContext};
use super::detect::{detect_change, log_change, FileVersion};
use super::prune::{self, delete_local_tree, PendingDeletions};
use super::restore::apply_remote_metadata;
use crate::fs::LocalKind;
use crate::remote::{NodeKind, RemoteEntry};
use crate::SyncError;
use futures_util::future::BoxFuture;
use std::path::Path;
use tracing::debug;

/// Reconcile `local_dir` against the remote folder `remote_dir`.
pub(crate) fn dl_sync_dir<'a, 'b: 'a>(
    ctx: &'a mut SyncContext<'b>,
    remote_dir: &'a RemoteEntry,
    local_dir: &'a Path,
) -> BoxFuture<'a, Outcome> {
    Box::pin(async move {
        ctx.stats.folders_processed += 1;
        let remote = ctx.remote;
        let local = ctx.local;
        let options = ctx.options;

        if options.delete_only {
            if local.kind_of(local_dir) != LocalKind::Directory {
                debug!("No local directory at {}, nothing to prune", local_dir.display());
                return Outcome::Success;
            }
        } else {
            let create = match local.kind_of(local_dir) {
                LocalKind::Directory => false,
                LocalKind::Absent => true,
                LocalKind::RegularFile => {
                    ctx.announce(Action::Remove, local_dir.display());
                    if !options.dry_run {
                        if let Err(source) = local.delete(local_dir) {
                            return ctx.recoverable(SyncError::Delete {
                                path: local_dir.to_path_buf(),
                                source,
                            });
                        }
                    }
                    true
                }
                LocalKind::Other => {
                    return ctx.recoverable(SyncError::NotADirectory(
                        local_dir.display().to_string(),
                    ))
                }
            };

            if create {
                ctx.announce(Action::CreateDir, local_dir.display());
                if !options.dry_run {
                    if let Err(source) = local.make_directory(local_dir) {
                        return ctx.recoverable(SyncError::CreateDir {
                            path: local_dir.to_path_buf(),
                            source,
                        });
                    }
                }
            }
        }

        // Under a dry run the directory may still not exist
        let mut pending = if options.deletes() && local.kind_of(local_dir) == LocalKind::Directory {
            match local.list_children(local_dir) {
                Ok(children) => Some(PendingDeletions::from_local(children)),
                Err(source) => {
                    return ctx.fatal(SyncError::ReadDir {
                        path: local_dir.to_path_buf(),
                        source,
                    })
                }
            }
        } else {
            None
        };

        let children = match remote.list_children(&remote_dir.path).await {
            Ok(children) => children,
            Err(e) => return ctx.fatal(SyncError::remote("List", &remote_dir.path, e)),
        };

        let mut status = Outcome::Success;
        for child in &children {
            let child_local = local_dir.join(&child.name);

            if let Some(pending) = pending.as_mut() {
                if !pending.claim(&child.name) {
                    debug!("New file: {}", child.path);
                }
            }

            let outcome = match child.kind {
                NodeKind::Folder => dl_sync_dir(ctx, child, &child_local).await,
                NodeKind::File if options.delete_only => Outcome::Success,
                NodeKind::File => dl_sync_file(ctx, child, &child_local).await,
            };

            if !ctx.absorb(&mut status, outcome) {
                break;
            }
        }

        if let Some(pending) = pending {
            if status.is_success() && !pending.is_empty() {
                let outcome = prune::remove_local_leftovers(ctx, local_dir, pending);
                ctx.absorb(&mut status, outcome);
            }
        }

        status
    })
}

/// Download one remote file to `local_file` if the local copy differs,
/// then restore its metadata.
pub(crate) async fn dl_sync_file(
    ctx: &mut SyncContext<'_>,
    node: &RemoteEntry,
    local_file: &Path,
) -> Outcome {
    ctx.stats.files_processed += 1;
    let remote = ctx.remote;
    let local = ctx.local;
    let options = ctx.options;

    let kind = local.kind_of(local_file);
    if kind != LocalKind::Absent {
        match kind {
            LocalKind::Directory if !options.force => {
                return ctx.recoverable(SyncError::IsADirectory(node.path.clone()));
            }
            LocalKind::Other => {
                return ctx.recoverable(SyncError::NotRegularFile(node.path.clone()));
            }
            _ => {}
        }

        let stat = match local.stat(local_file) {
            Ok(stat) => stat,
            Err(source) => {
                return ctx.recoverable(SyncError::Stat {
                    path: local_file.to_path_buf(),
                    source,
                })
            }
        };

        let source = FileVersion::from(node);
        let destination = FileVersion::from(&stat);
        let change = detect_change(source, destination, options.always);
        log_change(&node.path, change, source, destination);
        if !change.needs_transfer() {
            return Outcome::Success;
        }

        ctx.announce(Action::Remove, local_file.display());
        if !options.dry_run {
            let removed = if kind == LocalKind::Directory {
                delete_local_tree(local, local_file)
            } else {
                local.delete(local_file)
            };
            if let Err(source) = removed {
                return ctx.recoverable(SyncError::Delete {
                    path: local_file.to_path_buf(),
                    source,
                });
            }
        }
    }

    ctx.announce(Action::Transfer, local_file.display());

    if !options.dry_run {
        let progress = ctx.progress;
        progress.begin(&node.name, node.size);
        let report = |done: u64, total: u64| progress.update(done, total);
        let result = remote.get_file(local_file, &node.path, &report).await;
        progress.finish(result.is_ok());

        if let Err(e) = result {
            return ctx.recoverable(SyncError::remote("Download", &node.path, e));
        }
    }

    ctx.stats.bytes_transferred += node.size;

    if let Err(e) = apply_remote_metadata(local, node, local_file, options.dry_run) {
        return ctx.recoverable(e);
    }

    Outcome::Success
}
