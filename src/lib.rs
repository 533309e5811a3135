//! filetidy - sort a directory tree into `Category/Year` folders
//!
//! The library scans a tree, classifies files by extension and modification
//! year, plans collision-free moves, executes them while recording a rollback
//! log, and can undo an execution from that log. Configuration comes from
//! TOML files and the command line; see [`config`].

pub mod cli;
pub mod config;
pub mod executor;
pub mod file_category;
pub mod grouping;
pub mod jobs;
pub mod logging;
pub mod organizer;
pub mod output;
pub mod plan;
pub mod progress;
pub mod protected;
pub mod rollback;
pub mod scanner;
pub mod undo;

pub use config::{AppConfig, CompiledFilters, ConfigError};
pub use executor::{ExecuteError, ExecuteOptions, ExecutionResult, Executor, Mover, RetryPolicy};
pub use file_category::{Category, classify};
pub use grouping::{GroupConfig, YearGrouping, bucket_for};
pub use jobs::{JobRecord, JobRegistry, JobState};
pub use organizer::{AnalyzeError, AnalyzeOptions, Report, analyze};
pub use plan::{MoveEntry, MovePlan, MoveStatus, build_plan};
pub use progress::{CancelToken, ProgressEvent, ProgressObserver};
pub use protected::ProtectedFolderSet;
pub use rollback::{RollbackLog, list_rollbacks};
pub use scanner::{FileRecord, ScanError, Scanner};
pub use undo::{UndoOptions, UndoResult, undo, undo_file};
