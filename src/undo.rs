//! Undo functionality for reverting an execution.
//!
//! Undo reads a [`RollbackLog`] and moves every file back to where it came
//! from, newest move first. It is best-effort: a file that cannot be restored
//! is recorded and the rest of the log is still processed.

use crate::executor::{FsMover, MoveError, MoveErrorKind, Mover, RetryPolicy};
use crate::progress::{NoProgress, Operation, ProgressEvent, ProgressObserver};
use crate::rollback::{RecordedMove, RollbackError, RollbackLog};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One move that could not be reversed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreFailure {
    /// Where the file was expected to be.
    pub destination: PathBuf,
    /// Where it should have gone back to.
    pub source: PathBuf,
    pub reason: MoveErrorKind,
    pub message: String,
}

/// Represents the result of an undo operation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UndoResult {
    pub restored: usize,
    pub failed: usize,
    pub failures: Vec<RestoreFailure>,
    /// Empty directories removed after the restore.
    pub removed_dirs: Vec<PathBuf>,
}

impl UndoResult {
    /// Returns true if every recorded move was reversed.
    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Clone)]
pub struct UndoOptions {
    pub retry: RetryPolicy,
    /// Remove directories left empty by restored files, up to the root.
    pub remove_empty_dirs: bool,
}

impl Default for UndoOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            remove_empty_dirs: true,
        }
    }
}

/// Reverses `log` using the filesystem directly.
///
/// # Examples
///
/// ```no_run
/// use filetidy::rollback::RollbackLog;
/// use filetidy::undo::{UndoOptions, undo};
/// use std::path::Path;
///
/// let log = RollbackLog::load(Path::new("/data/.filetidy_rollback_20240101_120000.json"))?;
/// let result = undo(&log, &UndoOptions::default());
/// println!("Restored {} files", result.restored);
/// # Ok::<(), filetidy::rollback::RollbackError>(())
/// ```
pub fn undo(log: &RollbackLog, options: &UndoOptions) -> UndoResult {
    undo_with(log, options, &FsMover, &NoProgress)
}

/// Like [`undo`], with an explicit mover and progress observer.
pub fn undo_with(
    log: &RollbackLog,
    options: &UndoOptions,
    mover: &dyn Mover,
    observer: &dyn ProgressObserver,
) -> UndoResult {
    let mut result = UndoResult::default();
    let mut vacated = BTreeSet::new();
    let total = log.moves.len();

    tracing::info!(root = %log.root.display(), moves = total, "undoing");

    for (i, recorded) in log.moves.iter().rev().enumerate() {
        match restore_file(recorded, options, mover) {
            Ok(()) => {
                result.restored += 1;
                if let Some(parent) = recorded.destination.parent() {
                    vacated.insert(parent.to_path_buf());
                }
            }
            Err(err) => {
                tracing::warn!(
                    destination = %recorded.destination.display(),
                    reason = %err.kind,
                    "restore failed: {}",
                    err.message
                );
                result.failed += 1;
                result.failures.push(RestoreFailure {
                    destination: recorded.destination.clone(),
                    source: recorded.source.clone(),
                    reason: err.kind,
                    message: err.message,
                });
            }
        }
        observer.on_progress(&ProgressEvent::new(
            Operation::Undo,
            i + 1,
            Some(total),
            &recorded.destination,
        ));
    }

    if options.remove_empty_dirs {
        // Deepest first so parents empty out before they are checked.
        for dir in vacated.iter().rev() {
            remove_empty_ancestors(dir, &log.root, &mut result.removed_dirs);
        }
    }

    tracing::info!(
        restored = result.restored,
        failed = result.failed,
        "undo finished"
    );
    result
}

/// Restores a single file to its original location.
///
/// An occupied original location is a failure; nothing is overwritten or
/// backed up.
fn restore_file(
    recorded: &RecordedMove,
    options: &UndoOptions,
    mover: &dyn Mover,
) -> Result<(), MoveError> {
    if recorded.destination.symlink_metadata().is_err() {
        return Err(MoveError::new(
            MoveErrorKind::DestinationMissing,
            format!("{} is no longer there", recorded.destination.display()),
        ));
    }
    if recorded.source.symlink_metadata().is_ok() {
        return Err(MoveError::new(
            MoveErrorKind::SourceOccupied,
            format!("{} already exists", recorded.source.display()),
        ));
    }

    if let Some(parent) = recorded.source.parent() {
        fs::create_dir_all(parent).map_err(|e| MoveError::from_io(&e))?;
    }
    options
        .retry
        .run(|| mover.move_file(&recorded.destination, &recorded.source))
        .map_err(|e| MoveError::from_io(&e))
}

fn remove_empty_ancestors(start: &Path, root: &Path, removed: &mut Vec<PathBuf>) {
    let mut dir = start;
    while dir != root && dir.starts_with(root) {
        // remove_dir only succeeds on empty directories.
        if fs::remove_dir(dir).is_err() {
            break;
        }
        tracing::debug!(dir = %dir.display(), "removed empty directory");
        removed.push(dir.to_path_buf());
        match dir.parent() {
            Some(parent) => dir = parent,
            None => break,
        }
    }
}

/// Loads the log at `path`, undoes it, and deletes the log when every move
/// was reversed.
pub fn undo_file(path: &Path, options: &UndoOptions) -> Result<UndoResult, RollbackError> {
    undo_file_with(path, options, &FsMover, &NoProgress)
}

pub fn undo_file_with(
    path: &Path,
    options: &UndoOptions,
    mover: &dyn Mover,
    observer: &dyn ProgressObserver,
) -> Result<UndoResult, RollbackError> {
    let log = RollbackLog::load(path)?;
    let result = undo_with(&log, options, mover, observer);

    // Only delete the log if undo was successful
    if result.is_complete_success()
        && let Err(e) = fs::remove_file(path)
    {
        tracing::warn!(path = %path.display(), error = %e, "could not delete rollback log");
    }
    Ok(result)
}
