//! Directory scanning.
//!
//! The scanner walks a tree with `walkdir` in file-name order, never
//! following links, and yields one [`FileRecord`] per regular file or symlink.
//! Protected directories are pruned before they are entered. Entries that
//! cannot be read are reported as [`ScanError`]s and the walk continues.
//!
//! Size accounting:
//! - symlinks always have `size == effective_size == 0`
//! - the first path seen for a `(device, inode)` pair keeps its size as
//!   `effective_size`; every later hardlink to it gets `0`

use crate::config::{CompiledFilters, DEFAULT_MAX_DEPTH, LOCAL_CONFIG_FILE};
use crate::progress::{CancelToken, Operation, ProgressEvent, ProgressObserver};
use crate::protected::ProtectedFolderSet;
use crate::rollback::is_rollback_file_name;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// One observed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    pub effective_size: u64,
    pub modified_year: i32,
    /// Lowercase extension without the dot, or empty.
    pub extension: String,
    pub device_inode: Option<(u64, u64)>,
    pub is_symlink: bool,
}

impl FileRecord {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// An entry the scanner could not read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{}: {reason}", path.display())]
pub struct ScanError {
    pub path: PathBuf,
    pub reason: String,
}

/// Scan settings.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Depth 0 means only the root's direct children.
    pub max_depth: usize,
    pub protected: ProtectedFolderSet,
    pub filters: CompiledFilters,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            protected: ProtectedFolderSet::default(),
            filters: CompiledFilters::default(),
        }
    }
}

/// Everything a completed scan produced.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub records: Vec<FileRecord>,
    pub errors: Vec<ScanError>,
    /// Protected directories that were skipped, relative to the root.
    pub protected_found: Vec<PathBuf>,
    pub cancelled: bool,
}

pub struct Scanner {
    root: PathBuf,
    options: ScanOptions,
}

impl Scanner {
    pub fn new(root: impl Into<PathBuf>, options: ScanOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts a fresh walk from the root.
    pub fn iter(&self) -> ScanIter<'_> {
        let walker = WalkDir::new(&self.root)
            .min_depth(1)
            .max_depth(self.options.max_depth.saturating_add(1))
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        ScanIter {
            root: &self.root,
            options: &self.options,
            walker,
            seen_inodes: HashSet::new(),
            protected_found: Vec::new(),
        }
    }

    /// Drains a walk, reporting each record to `observer`.
    ///
    /// Stops early (with `cancelled` set) when `cancel` fires between items.
    pub fn scan_all(&self, observer: &dyn ProgressObserver, cancel: &CancelToken) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let mut iter = self.iter();

        for item in iter.by_ref() {
            if cancel.is_cancelled() {
                tracing::info!("scan cancelled");
                outcome.cancelled = true;
                break;
            }
            match item {
                Ok(record) => {
                    observer.on_progress(&ProgressEvent::new(
                        Operation::Scan,
                        outcome.records.len() + 1,
                        None,
                        &record.path,
                    ));
                    outcome.records.push(record);
                }
                Err(err) => {
                    tracing::warn!(path = %err.path.display(), reason = %err.reason, "skipping unreadable entry");
                    outcome.errors.push(err);
                }
            }
        }

        outcome.protected_found = iter.into_protected_found();
        tracing::info!(
            root = %self.root.display(),
            files = outcome.records.len(),
            errors = outcome.errors.len(),
            protected = outcome.protected_found.len(),
            "scan finished"
        );
        outcome
    }
}

/// Lazy stream of scan results. Not restartable; call [`Scanner::iter`] again.
pub struct ScanIter<'a> {
    root: &'a Path,
    options: &'a ScanOptions,
    walker: walkdir::IntoIter,
    seen_inodes: HashSet<(u64, u64)>,
    protected_found: Vec<PathBuf>,
}

impl ScanIter<'_> {
    /// Protected directories skipped so far.
    pub fn protected_found(&self) -> &[PathBuf] {
        &self.protected_found
    }

    pub fn into_protected_found(self) -> Vec<PathBuf> {
        self.protected_found
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.root).unwrap_or(path)
    }

    fn record(&mut self, entry: &DirEntry) -> Result<FileRecord, ScanError> {
        let path = entry.path();
        let scan_error = |reason: String| ScanError {
            path: path.to_path_buf(),
            reason,
        };

        // lstat semantics: walkdir does not follow links here
        let metadata = entry.metadata().map_err(|e| scan_error(e.to_string()))?;
        let modified = metadata.modified().map_err(|e| scan_error(e.to_string()))?;
        let modified_year = chrono::DateTime::<chrono::Local>::from(modified).year();

        let is_symlink = entry.file_type().is_symlink();
        let device_inode = device_inode(&metadata);
        let (size, effective_size) = if is_symlink {
            (0, 0)
        } else {
            let size = metadata.len();
            match device_inode {
                Some(key) if !self.seen_inodes.insert(key) => {
                    tracing::debug!(path = %path.display(), "hardlink already counted");
                    (size, 0)
                }
                _ => (size, size),
            }
        };

        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        Ok(FileRecord {
            path: path.to_path_buf(),
            size,
            effective_size,
            modified_year,
            extension,
            device_inode,
            is_symlink,
        })
    }
}

impl Iterator for ScanIter<'_> {
    type Item = Result<FileRecord, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.root.to_path_buf());
                    return Some(Err(ScanError {
                        path,
                        reason: err.to_string(),
                    }));
                }
            };

            let rel = self.relative(entry.path()).to_path_buf();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                if self.options.protected.is_protected(&rel) {
                    tracing::debug!(path = %rel.display(), "skipping protected folder");
                    self.walker.skip_current_dir();
                    self.protected_found.push(rel);
                }
                continue;
            }

            // sockets, fifos and devices are not organized
            if !file_type.is_file() && !file_type.is_symlink() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if is_rollback_file_name(&name) || name == LOCAL_CONFIG_FILE {
                continue;
            }
            if !self.options.filters.should_include(&rel) {
                continue;
            }

            return Some(self.record(&entry));
        }
    }
}

#[cfg(unix)]
fn device_inode(metadata: &Metadata) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    Some((metadata.dev(), metadata.ino()))
}

#[cfg(not(unix))]
fn device_inode(_metadata: &Metadata) -> Option<(u64, u64)> {
    None
}
