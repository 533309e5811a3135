//! Executes a [`MovePlan`] against the filesystem.
//!
//! Each planned entry is moved independently: one failure is recorded on the
//! entry and in the [`ExecutionResult`], and the batch continues. Every
//! successful move is appended to a [`RollbackLog`] which is written to disk
//! once the batch ends.
//!
//! Only `planned` entries are touched. Entries that are already `moved`,
//! `failed` or `skipped` are left as they are, so a partly executed plan can
//! be edited and submitted again; [`MovePlan::retry_failed`] opts failures
//! back in.

use crate::config::ExecuteSection;
use crate::plan::{MoveEntry, MovePlan, MoveStatus, unique_path};
use crate::progress::{CancelToken, NoProgress, Operation, ProgressEvent, ProgressObserver};
use crate::rollback::RollbackLog;
use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Why a single move (or restore) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveErrorKind {
    Permission,
    /// Still busy after every retry.
    Locked,
    PathTooLong,
    DiskFull,
    SourceVanished,
    DestinationConflict,
    /// Undo only: the moved file is no longer where the log says.
    DestinationMissing,
    /// Undo only: something now occupies the original location.
    SourceOccupied,
    Io,
}

impl fmt::Display for MoveErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Permission => "permission denied",
            Self::Locked => "file is locked",
            Self::PathTooLong => "path too long",
            Self::DiskFull => "disk full",
            Self::SourceVanished => "source vanished",
            Self::DestinationConflict => "destination conflict",
            Self::DestinationMissing => "destination missing",
            Self::SourceOccupied => "source occupied",
            Self::Io => "I/O error",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct MoveError {
    pub kind: MoveErrorKind,
    pub message: String,
}

impl MoveError {
    pub fn new(kind: MoveErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Maps an I/O error from a move onto a failure reason.
    pub fn from_io(err: &io::Error) -> Self {
        let kind = if is_busy(err) {
            MoveErrorKind::Locked
        } else if is_name_too_long(err) {
            MoveErrorKind::PathTooLong
        } else {
            match err.kind() {
                ErrorKind::PermissionDenied => MoveErrorKind::Permission,
                ErrorKind::StorageFull => MoveErrorKind::DiskFull,
                ErrorKind::NotFound => MoveErrorKind::SourceVanished,
                ErrorKind::AlreadyExists => MoveErrorKind::DestinationConflict,
                _ => MoveErrorKind::Io,
            }
        };
        Self::new(kind, err.to_string())
    }
}

/// Errors that are worth waiting out.
pub fn is_busy(err: &io::Error) -> bool {
    if matches!(
        err.kind(),
        ErrorKind::ResourceBusy | ErrorKind::ExecutableFileBusy | ErrorKind::WouldBlock
    ) {
        return true;
    }
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    cfg!(windows) && matches!(err.raw_os_error(), Some(32) | Some(33))
}

fn is_name_too_long(err: &io::Error) -> bool {
    let code = if cfg!(windows) {
        206
    } else if cfg!(any(target_os = "macos", target_os = "ios", target_os = "freebsd")) {
        63
    } else {
        36
    };
    err.raw_os_error() == Some(code)
}

/// How the executor physically relocates one file.
///
/// Implementations must not overwrite an existing destination.
pub trait Mover: Send + Sync {
    fn move_file(&self, source: &Path, destination: &Path) -> io::Result<()>;
}

/// Moves files without ever replacing an existing destination.
///
/// On unix a regular file is moved by hard-linking it to the destination and
/// unlinking the source; `link` fails if the destination exists, so there is
/// no window in which another file could be overwritten. Where links are not
/// possible (symlinks, filesystems without hard links, other platforms) it
/// falls back to `rename` after an existence check, and across filesystems to
/// a copy that keeps the timestamps. The `rename` fallback can still replace
/// a file created between the check and the call.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMover;

impl Mover for FsMover {
    fn move_file(&self, source: &Path, destination: &Path) -> io::Result<()> {
        if destination.symlink_metadata().is_ok() {
            return Err(already_exists(destination));
        }
        let metadata = source.symlink_metadata()?;
        if let Some(linked) = link_then_unlink(source, destination, &metadata) {
            return linked;
        }

        match fs::rename(source, destination) {
            Err(e) if e.kind() == ErrorKind::CrossesDevices => {
                tracing::debug!(source = %source.display(), "rename crosses devices, copying");
                copy_then_remove(source, destination)
            }
            other => other,
        }
    }
}

fn already_exists(path: &Path) -> io::Error {
    io::Error::new(
        ErrorKind::AlreadyExists,
        format!("{} already exists", path.display()),
    )
}

/// `None` when linking is not possible here and the caller should rename.
#[cfg(unix)]
fn link_then_unlink(
    source: &Path,
    destination: &Path,
    metadata: &fs::Metadata,
) -> Option<io::Result<()>> {
    if !metadata.is_file() {
        return None;
    }
    match fs::hard_link(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Some(Err(e)),
        Err(e) => {
            tracing::debug!(source = %source.display(), error = %e, "cannot hard link, renaming");
            return None;
        }
    }
    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(destination);
        return Some(Err(e));
    }
    Some(Ok(()))
}

#[cfg(not(unix))]
fn link_then_unlink(
    _source: &Path,
    _destination: &Path,
    _metadata: &fs::Metadata,
) -> Option<io::Result<()>> {
    None
}

/// Cross-device move. The copy keeps permissions and access/modification
/// times, since the modification year decides where a file belongs.
fn copy_then_remove(source: &Path, destination: &Path) -> io::Result<()> {
    let metadata = source.symlink_metadata()?;
    let is_symlink = metadata.file_type().is_symlink();
    if is_symlink {
        copy_symlink(source, destination)?;
    } else {
        copy_new(source, destination, &metadata)?;
    }

    let atime = FileTime::from_last_access_time(&metadata);
    let mtime = FileTime::from_last_modification_time(&metadata);
    let stamped = if is_symlink {
        filetime::set_symlink_file_times(destination, atime, mtime)
    } else {
        filetime::set_file_times(destination, atime, mtime)
    };

    if let Err(e) = stamped.and_then(|()| fs::remove_file(source)) {
        // Leave exactly one copy behind.
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}

/// Copies into a file that must not exist yet.
fn copy_new(source: &Path, destination: &Path, metadata: &fs::Metadata) -> io::Result<()> {
    let mut reader = fs::File::open(source)?;
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;
    let copied = io::copy(&mut reader, &mut writer)
        .and_then(|_| writer.set_permissions(metadata.permissions()));
    if let Err(e) = copied {
        drop(writer);
        let _ = fs::remove_file(destination);
        return Err(e);
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    let target = fs::read_link(source)?;
    std::os::unix::fs::symlink(target, destination)
}

#[cfg(not(unix))]
fn copy_symlink(source: &Path, destination: &Path) -> io::Result<()> {
    fs::copy(source, destination).map(|_| ())
}

/// Bounded retry for busy/locked files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(section: &ExecuteSection) -> Self {
        Self {
            max_attempts: section.retries.max(1),
            delay: section.retry_delay(),
        }
    }

    /// Runs `op`, retrying only while it fails with a busy error.
    pub fn run<T>(&self, mut op: impl FnMut() -> io::Result<T>) -> io::Result<T> {
        let mut attempt = 1;
        loop {
            match op() {
                Err(e) if is_busy(&e) && attempt < self.max_attempts => {
                    tracing::debug!(attempt, error = %e, "busy, retrying");
                    thread::sleep(self.delay);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    pub retry: RetryPolicy,
    /// Where the rollback log goes; the plan root when unset.
    pub rollback_dir: Option<PathBuf>,
}

impl ExecuteOptions {
    pub fn from_config(section: &ExecuteSection) -> Self {
        Self {
            retry: RetryPolicy::from_config(section),
            rollback_dir: section.rollback_dir.clone(),
        }
    }
}

/// Errors that stop an execution before anything is touched.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("execution was not confirmed")]
    NotConfirmed,
    #[error("{} planned destination(s) are shared by several entries", .0.len())]
    DuplicateDestinations(Vec<PathBuf>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: MoveErrorKind,
    pub message: String,
}

/// Outcome of one execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub moved: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Entries whose destination appeared after planning and got a new suffix.
    pub renamed: usize,
    pub failures: Vec<MoveFailure>,
    pub cancelled: bool,
    pub rollback_path: Option<PathBuf>,
    /// Set when the rollback log could not be written; `rollback` still holds it.
    pub rollback_error: Option<String>,
    pub rollback: RollbackLog,
}

impl ExecutionResult {
    fn new(root: &Path) -> Self {
        Self {
            moved: 0,
            failed: 0,
            skipped: 0,
            renamed: 0,
            failures: Vec::new(),
            cancelled: false,
            rollback_path: None,
            rollback_error: None,
            rollback: RollbackLog::new(root),
        }
    }
}

/// Runs move plans.
///
/// # Examples
///
/// ```no_run
/// use filetidy::executor::{ExecuteOptions, Executor};
/// use filetidy::organizer::{AnalyzeOptions, analyze};
/// use std::path::Path;
///
/// let mut report = analyze(Path::new("/home/me/Downloads"), &AnalyzeOptions::default())?;
/// let result = Executor::new(ExecuteOptions::default()).execute(&mut report.plan, true)?;
/// println!("moved {} file(s)", result.moved);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Executor {
    options: ExecuteOptions,
    mover: Arc<dyn Mover>,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancelToken,
}

impl Executor {
    pub fn new(options: ExecuteOptions) -> Self {
        Self {
            options,
            mover: Arc::new(FsMover),
            observer: Arc::new(NoProgress),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_mover(mut self, mover: impl Mover + 'static) -> Self {
        self.mover = Arc::new(mover);
        self
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Moves every `planned` entry of `plan` and updates its status in place.
    ///
    /// Other entries are left alone; `skipped` ones are counted. Nothing is
    /// touched, the plan included, unless `confirm` is true and no two
    /// planned entries share a destination.
    pub fn execute(
        &self,
        plan: &mut MovePlan,
        confirm: bool,
    ) -> Result<ExecutionResult, ExecuteError> {
        if !confirm {
            return Err(ExecuteError::NotConfirmed);
        }
        let duplicates = plan.duplicate_destinations();
        if !duplicates.is_empty() {
            return Err(ExecuteError::DuplicateDestinations(duplicates));
        }

        let total = plan.count(MoveStatus::Planned);
        let mut reserved: HashSet<PathBuf> = plan
            .entries
            .iter()
            .filter(|e| e.status == MoveStatus::Planned)
            .map(|e| e.destination.clone())
            .collect();

        tracing::info!(root = %plan.root.display(), planned = total, "executing plan");

        let mut result = ExecutionResult::new(&plan.root);
        let mut current = 0;
        for entry in plan.entries.iter_mut() {
            match entry.status {
                MoveStatus::Skipped => {
                    result.skipped += 1;
                    continue;
                }
                MoveStatus::Planned => {}
                MoveStatus::Moved | MoveStatus::Failed => continue,
            }

            if self.cancel.is_cancelled() {
                entry.status = MoveStatus::Skipped;
                entry.reason = Some("cancelled".to_string());
                result.skipped += 1;
                result.cancelled = true;
                continue;
            }

            current += 1;
            match self.move_entry(entry, &mut reserved) {
                Ok(renamed) => {
                    if renamed {
                        result.renamed += 1;
                    }
                    entry.status = MoveStatus::Moved;
                    entry.reason = None;
                    result.rollback.record(&entry.source, &entry.destination);
                    result.moved += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        source = %entry.source.display(),
                        reason = %err.kind,
                        "move failed: {}",
                        err.message
                    );
                    entry.status = MoveStatus::Failed;
                    entry.reason = Some(err.to_string());
                    result.failures.push(MoveFailure {
                        source: entry.source.clone(),
                        destination: entry.destination.clone(),
                        reason: err.kind,
                        message: err.message,
                    });
                    result.failed += 1;
                }
            }

            self.observer.on_progress(&ProgressEvent::new(
                Operation::Execute,
                current,
                Some(total),
                &entry.source,
            ));
        }

        if result.cancelled {
            tracing::warn!(skipped = result.skipped, "execution cancelled");
        }

        if !result.rollback.is_empty() {
            let dir = self
                .options
                .rollback_dir
                .clone()
                .unwrap_or_else(|| plan.root.clone());
            match result.rollback.save(&dir) {
                Ok(path) => result.rollback_path = Some(path),
                Err(e) => {
                    tracing::error!(error = %e, "could not write rollback log");
                    result.rollback_error = Some(e.to_string());
                }
            }
        }

        tracing::info!(
            moved = result.moved,
            failed = result.failed,
            skipped = result.skipped,
            renamed = result.renamed,
            "execution finished"
        );
        Ok(result)
    }

    /// Returns whether the destination had to be re-suffixed.
    fn move_entry(
        &self,
        entry: &mut MoveEntry,
        reserved: &mut HashSet<PathBuf>,
    ) -> Result<bool, MoveError> {
        if entry.source.symlink_metadata().is_err() {
            return Err(MoveError::new(
                MoveErrorKind::SourceVanished,
                format!("{} no longer exists", entry.source.display()),
            ));
        }

        let mut renamed = false;
        if entry.destination.symlink_metadata().is_ok() {
            let resolved = unique_path(&entry.destination, |p| {
                p.symlink_metadata().is_ok() || reserved.contains(p)
            });
            tracing::info!(
                planned = %entry.destination.display(),
                resolved = %resolved.display(),
                "collision resolved"
            );
            reserved.insert(resolved.clone());
            entry.destination = resolved;
            renamed = true;
        }

        if let Some(parent) = entry.destination.parent() {
            fs::create_dir_all(parent).map_err(|e| MoveError::from_io(&e))?;
        }

        self.options
            .retry
            .run(|| self.mover.move_file(&entry.source, &entry.destination))
            .map_err(|e| MoveError::from_io(&e))?;

        tracing::debug!(
            source = %entry.source.display(),
            destination = %entry.destination.display(),
            "moved"
        );
        Ok(renamed)
    }
}
