//! Hot and cold backups of node data directories.
//!
//! A backup of a running node is bracketed with `pg_backup_start` and
//! `pg_backup_stop` so the copied tree reflects one consistent point in the
//! source's write history; a stopped node is copied directly. Either way the
//! result is an immutable directory tree that can seed replicas and branches.

mod filter;

pub use filter::{EntryFilter, NoExclusions};

use std::fs;
use std::path::{Path, PathBuf};

use testkit_postgres::node::{DATA_DIR, NodeStatus, POSTMASTER_PID_FILE, ParentRef, PgNode};
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, TestkitError, TestkitResult};
use crate::{bail, testkit_error};

const BACKUP_START_QUERY: &str = "SELECT pg_backup_start('testkit', true);";
const BACKUP_STOP_QUERY: &str = "SELECT pg_backup_stop();";

/// A consistent snapshot of a node's data directory.
///
/// Immutable after creation; any number of replicas or branches may be
/// spawned from the same backup without synchronization.
#[derive(Debug)]
pub struct NodeBackup {
    base_dir: PathBuf,
    source: ParentRef,
}

impl NodeBackup {
    /// Takes a backup of `node` into `base_dir`, excluding entries per `filter`.
    ///
    /// A running node is put into backup mode for the duration of the copy;
    /// end-backup is issued even when the copy fails, so the source never
    /// stays in backup mode. The transient `postmaster.pid` is stripped from
    /// hot copies. A stopped node is copied directly.
    pub async fn take<F>(
        node: &PgNode,
        base_dir: impl Into<PathBuf>,
        filter: F,
    ) -> TestkitResult<NodeBackup>
    where
        F: EntryFilter + 'static,
    {
        let base_dir = base_dir.into();
        let destination = base_dir.join(DATA_DIR);

        match node.status() {
            NodeStatus::Running => take_hot(node, &destination, filter).await?,
            NodeStatus::Stopped => {
                copy_tree_filtered(node.data_dir(), destination, filter).await?
            }
            NodeStatus::Uninitialized => bail!(
                ErrorKind::InvalidState,
                "Cannot back up an uninitialized node"
            ),
        }

        info!(
            source = %node.data_dir().display(),
            backup = %base_dir.display(),
            "backup complete"
        );

        Ok(NodeBackup {
            base_dir,
            source: node.as_parent_ref(),
        })
    }

    /// Takes a backup with no exclusions.
    pub async fn take_unfiltered(
        node: &PgNode,
        base_dir: impl Into<PathBuf>,
    ) -> TestkitResult<NodeBackup> {
        NodeBackup::take(node, base_dir, NoExclusions).await
    }

    /// Root directory of this backup.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// The copied data directory.
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join(DATA_DIR)
    }

    /// Identity of the node this backup was taken from.
    pub fn source(&self) -> &ParentRef {
        &self.source
    }

    /// Removes the backup directory.
    pub async fn cleanup(self) -> TestkitResult<()> {
        match tokio::fs::remove_dir_all(&self.base_dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(fs_error(&self.base_dir, err)),
        }
    }
}

async fn take_hot<F>(node: &PgNode, destination: &Path, filter: F) -> TestkitResult<()>
where
    F: EntryFilter + 'static,
{
    let client = node.connect().await?;

    client.simple_query(BACKUP_START_QUERY).await.map_err(|err| {
        testkit_error!(
            ErrorKind::BackupFailed,
            "Failed to put the source node into backup mode",
            source: err
        )
    })?;
    debug!(node = node.name(), "source node entered backup mode");

    let copy_result = copy_tree_filtered(node.data_dir(), destination.to_path_buf(), filter).await;
    // The bracket must close on every exit path or the source stays in backup mode.
    let stop_result = client.simple_query(BACKUP_STOP_QUERY).await;

    if let Err(copy_error) = copy_result {
        if let Err(stop_error) = stop_result {
            warn!(error = %stop_error, "failed to end backup mode after copy failure");
        }
        return Err(testkit_error!(
            ErrorKind::BackupFailed,
            "Hot backup copy failed",
            source: copy_error
        ));
    }
    stop_result.map_err(|err| {
        testkit_error!(
            ErrorKind::BackupFailed,
            "Failed to take the source node out of backup mode",
            source: err
        )
    })?;
    debug!(node = node.name(), "source node left backup mode");

    // A fresh instance refuses to start on a tree that claims to be owned by
    // a live server.
    let pid_file = destination.join(POSTMASTER_PID_FILE);
    tokio::fs::remove_file(&pid_file).await.map_err(|err| {
        testkit_error!(
            ErrorKind::BackupFailed,
            "Failed to strip the postmaster pid file from the backup",
            pid_file.display(),
            source: err
        )
    })?;

    Ok(())
}

/// Recursively copies `src` into `dest`, consulting `filter` per directory.
///
/// Runs on a blocking thread. Directory listings are consumed in sorted order
/// so exclusion decisions are reproducible.
pub async fn copy_tree_filtered<F>(src: PathBuf, dest: PathBuf, filter: F) -> TestkitResult<()>
where
    F: EntryFilter + 'static,
{
    let result = tokio::task::spawn_blocking(move || copy_tree_blocking(&src, &dest, &filter));
    match result.await {
        Ok(result) => result,
        Err(join_error) if join_error.is_panic() => {
            std::panic::resume_unwind(join_error.into_panic())
        }
        Err(join_error) => Err(testkit_error!(
            ErrorKind::Unknown,
            "Backup copy task was cancelled",
            source: join_error
        )),
    }
}

fn copy_tree_blocking(src: &Path, dest: &Path, filter: &dyn EntryFilter) -> TestkitResult<()> {
    fs::create_dir_all(dest).map_err(|err| fs_error(dest, err))?;
    // The server refuses a data directory with group or world access, so
    // directory modes must survive the copy.
    let src_metadata = fs::metadata(src).map_err(|err| fs_error(src, err))?;
    fs::set_permissions(dest, src_metadata.permissions()).map_err(|err| fs_error(dest, err))?;

    let mut names = Vec::new();
    for entry in fs::read_dir(src).map_err(|err| fs_error(src, err))? {
        let entry = entry.map_err(|err| fs_error(src, err))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();

    let excluded = filter.entries_to_exclude(src, &names);
    for name in &names {
        if excluded.contains(name) {
            continue;
        }

        let from = src.join(name);
        let to = dest.join(name);
        // Entries can vanish between the listing and the copy while the
        // source is live; the backup bracket makes them irrelevant.
        let metadata = match fs::symlink_metadata(&from) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %from.display(), "entry vanished during copy");
                continue;
            }
            Err(err) => return Err(fs_error(&from, err)),
        };

        if metadata.is_dir() {
            copy_tree_blocking(&from, &to, filter)?;
        } else if metadata.file_type().is_symlink() {
            // Tablespace links must stay links.
            copy_symlink(&from, &to)?;
        } else {
            match fs::copy(&from, &to) {
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %from.display(), "entry vanished during copy");
                }
                Err(err) => return Err(fs_error(&from, err)),
            }
        }
    }

    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> TestkitResult<()> {
    let target = fs::read_link(from).map_err(|err| fs_error(from, err))?;
    std::os::unix::fs::symlink(target, to).map_err(|err| fs_error(to, err))
}

#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> TestkitResult<()> {
    let _ = (from, to);
    Ok(())
}

fn fs_error(path: &Path, source: std::io::Error) -> TestkitError {
    let detail = format!("{}: {source}", path.display());
    testkit_error!(
        ErrorKind::IoError,
        "Filesystem operation failed",
        detail,
        source: source
    )
}
