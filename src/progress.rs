//! Progress reporting and cooperative cancellation.
//!
//! Long-running operations call a [`ProgressObserver`] after each item and
//! check a [`CancelToken`] between items. Observers must return quickly; a
//! front end that needs more should hand the event to a channel.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Which operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Scan,
    Execute,
    Undo,
}

/// One progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub operation: Operation,
    /// 1-based index of the item just processed.
    pub current: usize,
    /// Total items, when known up front (scans stream, so they report `None`).
    pub total: Option<usize>,
    pub path: PathBuf,
}

impl ProgressEvent {
    pub fn new(operation: Operation, current: usize, total: Option<usize>, path: &Path) -> Self {
        Self {
            operation,
            current,
            total,
            path: path.to_path_buf(),
        }
    }
}

/// Receives progress updates.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Shared flag checked between items of a batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_observer_receives_events() {
        let seen = Mutex::new(Vec::new());
        let observer = |event: &ProgressEvent| seen.lock().unwrap().push(event.current);

        observer.on_progress(&ProgressEvent::new(
            Operation::Execute,
            1,
            Some(2),
            Path::new("a"),
        ));
        observer.on_progress(&ProgressEvent::new(
            Operation::Execute,
            2,
            Some(2),
            Path::new("b"),
        ));

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_cancel_token_is_shared_between_clones() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
