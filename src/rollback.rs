//! Rollback logs.
//!
//! Every execution that moves at least one file leaves a JSON log of the
//! moves it made, named `.filetidy_rollback_YYYYMMDD_HHMMSS.json`. The log is
//! the only input [`crate::undo`] needs to restore the original layout, so it
//! is written once after the batch and never rewritten.

use crate::plan::unique_path;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ROLLBACK_PREFIX: &str = ".filetidy_rollback_";
pub const ROLLBACK_EXTENSION: &str = "json";
pub const ROLLBACK_FORMAT: &str = "filetidy-rollback";
pub const ROLLBACK_VERSION: u32 = 1;

/// True for names produced by [`RollbackLog::save`].
pub fn is_rollback_file_name(name: &str) -> bool {
    name.starts_with(ROLLBACK_PREFIX) && name.ends_with(&format!(".{}", ROLLBACK_EXTENSION))
}

#[derive(Debug, thiserror::Error)]
pub enum RollbackError {
    #[error("cannot access rollback log {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("rollback log {} is not valid: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// One completed move: `source` is where the file was, `destination` where it is now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackLog {
    pub format: String,
    pub version: u32,
    pub id: String,
    pub created: DateTime<Local>,
    pub root: PathBuf,
    /// Moves in the order they were performed.
    pub moves: Vec<RecordedMove>,
}

impl RollbackLog {
    pub fn new(root: &Path) -> Self {
        let created = Local::now();
        Self {
            format: ROLLBACK_FORMAT.to_string(),
            version: ROLLBACK_VERSION,
            id: created.format("%Y%m%d_%H%M%S").to_string(),
            created,
            root: root.to_path_buf(),
            moves: Vec::new(),
        }
    }

    pub fn record(&mut self, source: &Path, destination: &Path) {
        self.moves.push(RecordedMove {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn file_name(&self) -> String {
        format!("{}{}.{}", ROLLBACK_PREFIX, self.id, ROLLBACK_EXTENSION)
    }

    /// Writes the log into `dir` and returns the path written.
    ///
    /// A log from the same second is never overwritten; the new one gets a
    /// numbered suffix instead.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, RollbackError> {
        let path = unique_path(&dir.join(self.file_name()), |p| p.exists());
        let json = serde_json::to_string_pretty(self).map_err(|e| RollbackError::Invalid {
            path: path.clone(),
            reason: format!("JSON serialization failed: {}", e),
        })?;

        fs::create_dir_all(dir).map_err(|source| RollbackError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        // Write next to the target then rename, so a crash never leaves half a log.
        let staging = path.with_extension("partial");
        fs::write(&staging, json).map_err(|source| RollbackError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| RollbackError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(path = %path.display(), moves = self.moves.len(), "rollback log written");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, RollbackError> {
        let text = fs::read_to_string(path).map_err(|source| RollbackError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let log: Self = serde_json::from_str(&text).map_err(|e| RollbackError::Invalid {
            path: path.to_path_buf(),
            reason: format!("JSON parse error: {}", e),
        })?;

        if log.format != ROLLBACK_FORMAT {
            return Err(RollbackError::Invalid {
                path: path.to_path_buf(),
                reason: format!("unexpected format '{}'", log.format),
            });
        }
        if log.version > ROLLBACK_VERSION {
            return Err(RollbackError::Invalid {
                path: path.to_path_buf(),
                reason: format!("unsupported version {}", log.version),
            });
        }
        Ok(log)
    }
}

/// What `rollbacks` shows for one log on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackSummary {
    pub path: PathBuf,
    pub id: String,
    pub created: DateTime<Local>,
    pub root: PathBuf,
    pub moves: usize,
}

/// Rollback logs in `dir`, newest first. Unreadable logs are logged and left out.
pub fn list_rollbacks(dir: &Path) -> Result<Vec<RollbackSummary>, RollbackError> {
    let entries = fs::read_dir(dir).map_err(|source| RollbackError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut summaries = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_str().is_some_and(is_rollback_file_name) {
            continue;
        }
        let path = entry.path();
        match RollbackLog::load(&path) {
            Ok(log) => summaries.push(RollbackSummary {
                path,
                id: log.id,
                created: log.created,
                root: log.root,
                moves: log.moves.len(),
            }),
            Err(e) => tracing::warn!(error = %e, "skipping rollback log"),
        }
    }

    summaries.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.path.cmp(&a.path)));
    Ok(summaries)
}
