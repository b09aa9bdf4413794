//! Deletion reconciler.
//!
//! At every directory level the target side's children are loaded into a
//! [`PendingDeletions`] set; each source child claims its name, and whatever
//! is left over once the level has been walked is removed. The set lives in
//! a single call frame and is dropped with it.

use super::context::{Action, Outcome, SyncContext};
use crate::fs::{LocalEntry, LocalKind, LocalStore};
use crate::remote::RemoteEntry;
use crate::SyncError;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Name-keyed target entries not yet matched by a source entry.
///
/// Keys are raw file names so local entries whose names are not valid UTF-8
/// are still tracked and can be pruned.
#[derive(Debug)]
pub struct PendingDeletions<T> {
    entries: HashMap<OsString, T>,
}

impl<T> Default for PendingDeletions<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> PendingDeletions<T> {
    pub fn track(entries: impl IntoIterator<Item = (OsString, T)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Mark `name` as present on the source side. Returns `false` when the
    /// target had no entry of that name.
    pub fn claim(&mut self, name: impl AsRef<OsStr>) -> bool {
        self.entries.remove(name.as_ref()).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_leftovers(self) -> impl Iterator<Item = (OsString, T)> {
        self.entries.into_iter()
    }
}

impl PendingDeletions<RemoteEntry> {
    pub fn from_remote(children: Vec<RemoteEntry>) -> Self {
        Self::track(children.into_iter().map(|c| (OsString::from(&c.name), c)))
    }
}

impl PendingDeletions<LocalEntry> {
    pub fn from_local(children: Vec<LocalEntry>) -> Self {
        Self::track(children.into_iter().map(|c| (c.name.clone(), c)))
    }
}

/// Remove remote nodes that have no local counterpart.
pub(crate) async fn remove_remote_leftovers(
    ctx: &mut SyncContext<'_>,
    pending: PendingDeletions<RemoteEntry>,
) -> Outcome {
    let remote = ctx.remote;
    let dry_run = ctx.options.dry_run;
    let mut status = Outcome::Success;

    for (_, node) in pending.into_leftovers() {
        ctx.announce(Action::Remove, &node.path);

        if !dry_run {
            if let Err(e) = remote.remove(&node.path).await {
                let outcome = ctx.recoverable(SyncError::remote("Remove", &node.path, e));
                if !ctx.absorb(&mut status, outcome) {
                    break;
                }
                continue;
            }
        }
        ctx.stats.elements_deleted += 1;
    }

    status
}

/// Remove local entries that have no remote counterpart. Special files are
/// left in place.
pub(crate) fn remove_local_leftovers(
    ctx: &mut SyncContext<'_>,
    local_dir: &Path,
    pending: PendingDeletions<LocalEntry>,
) -> Outcome {
    let local = ctx.local;
    let dry_run = ctx.options.dry_run;
    let mut status = Outcome::Success;

    for (name, entry) in pending.into_leftovers() {
        let path = local_dir.join(&name);

        let result = match entry.kind {
            LocalKind::Directory => {
                ctx.announce(Action::Remove, path.display());
                if dry_run {
                    Ok(())
                } else {
                    delete_local_tree(local, &path)
                }
            }
            LocalKind::RegularFile => {
                ctx.announce(Action::Remove, path.display());
                if dry_run {
                    Ok(())
                } else {
                    local.delete(&path)
                }
            }
            LocalKind::Other | LocalKind::Absent => {
                warn!("Skipping special file {}", path.display());
                continue;
            }
        };

        match result {
            Ok(()) => ctx.stats.elements_deleted += 1,
            Err(source) => {
                let outcome = ctx.recoverable(SyncError::Delete { path, source });
                if !ctx.absorb(&mut status, outcome) {
                    break;
                }
            }
        }
    }

    status
}

/// Delete a local directory and everything under it.
///
/// Nothing beneath `path` is followed: symlinks inside are removed as links.
pub fn delete_local_tree(local: &dyn LocalStore, path: &Path) -> io::Result<()> {
    for child in local.list_children(path)? {
        let child_path = path.join(&child.name);
        if child.kind == LocalKind::Directory {
            delete_local_tree(local, &child_path)?;
        } else {
            debug!("Deleting: {}", child_path.display());
            local.delete(&child_path)?;
        }
    }

    debug!("Deleting: {}", path.display());
    local.delete(path)
}
