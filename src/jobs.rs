//! Background jobs for hosts that serve several requests at once.
//!
//! A [`JobRegistry`] runs each analyze/execute/undo request on its own
//! thread and keeps a [`JobRecord`] that callers can poll. Jobs touching the
//! same root are serialized; jobs on different roots run in parallel.

use crate::executor::{ExecuteError, ExecuteOptions, Executor, FsMover};
use crate::organizer::{AnalyzeOptions, analyze_with};
use crate::plan::MovePlan;
use crate::progress::{CancelToken, ProgressEvent, ProgressObserver};
use crate::rollback::RollbackLog;
use crate::undo::{UndoOptions, undo_file_with};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Analyze,
    Execute,
    Undo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub current: usize,
    pub total: Option<usize>,
}

/// Snapshot of one job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRecord {
    pub id: String,
    pub root: PathBuf,
    pub kind: JobKind,
    pub state: JobState,
    pub progress: JobProgress,
    pub message: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct JobEntry {
    record: JobRecord,
    cancel: CancelToken,
    handle: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Tickets {
    next: u64,
    serving: u64,
}

/// First-come first-served queue of jobs on one root.
#[derive(Default)]
struct RootQueue {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

impl RootQueue {
    fn ticket(&self) -> u64 {
        let mut tickets = lock(&self.tickets);
        let ticket = tickets.next;
        tickets.next += 1;
        ticket
    }

    fn wait_turn(self: &Arc<Self>, ticket: u64) -> Turn {
        let mut tickets = lock(&self.tickets);
        while tickets.serving != ticket {
            tickets = self
                .turn
                .wait(tickets)
                .unwrap_or_else(PoisonError::into_inner);
        }
        Turn(Arc::clone(self))
    }
}

/// Passes the root to the next ticket when dropped.
struct Turn(Arc<RootQueue>);

impl Drop for Turn {
    fn drop(&mut self) {
        lock(&self.0.tickets).serving += 1;
        self.0.turn.notify_all();
    }
}

#[derive(Default)]
struct Inner {
    jobs: Mutex<HashMap<String, JobEntry>>,
    roots: Mutex<HashMap<PathBuf, Arc<RootQueue>>>,
    next_id: AtomicU64,
}

impl Inner {
    fn update(&self, id: &str, f: impl FnOnce(&mut JobRecord)) {
        if let Some(entry) = lock(&self.jobs).get_mut(id) {
            f(&mut entry.record);
        }
    }

    fn root_queue(&self, root: &Path) -> Arc<RootQueue> {
        Arc::clone(lock(&self.roots).entry(root.to_path_buf()).or_default())
    }

    /// Drops queues no job holds any more.
    fn prune_roots(&self) {
        lock(&self.roots).retain(|_, queue| Arc::strong_count(queue) > 1);
    }
}

/// Handle given to running work: progress sink, message setter and cancel flag.
#[derive(Clone)]
pub struct JobContext {
    id: String,
    inner: Arc<Inner>,
    cancel: CancelToken,
}

impl JobContext {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn set_message(&self, message: impl Into<String>) {
        let message = message.into();
        self.inner.update(&self.id, |record| record.message = message);
    }
}

impl ProgressObserver for JobContext {
    fn on_progress(&self, event: &ProgressEvent) {
        self.inner.update(&self.id, |record| {
            record.progress = JobProgress {
                current: event.current,
                total: event.total,
            };
        });
    }
}

/// Owns every job started through it.
#[derive(Clone, Default)]
pub struct JobRegistry {
    inner: Arc<Inner>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `work` on a background thread and returns the job id.
    ///
    /// The job waits in `pending` until no other job holds the same root.
    pub fn spawn<F, T, E>(&self, root: &Path, kind: JobKind, work: F) -> String
    where
        F: FnOnce(&JobContext) -> Result<T, E> + Send + 'static,
        T: Serialize + 'static,
        E: Display + 'static,
    {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let id = format!("job-{}", self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let cancel = CancelToken::new();
        let context = JobContext {
            id: id.clone(),
            inner: Arc::clone(&self.inner),
            cancel: cancel.clone(),
        };

        lock(&self.inner.jobs).insert(
            id.clone(),
            JobEntry {
                record: JobRecord {
                    id: id.clone(),
                    root: root.clone(),
                    kind,
                    state: JobState::Pending,
                    progress: JobProgress::default(),
                    message: "waiting".to_string(),
                    result: None,
                    error: None,
                },
                cancel,
                handle: None,
            },
        );

        let queue = self.inner.root_queue(&root);
        let ticket = queue.ticket();
        let handle = thread::spawn(move || {
            let _turn = queue.wait_turn(ticket);
            let inner = Arc::clone(&context.inner);

            if context.cancel.is_cancelled() {
                inner.update(&context.id, |record| {
                    record.state = JobState::Failed;
                    record.error = Some("cancelled before start".to_string());
                });
                return;
            }
            inner.update(&context.id, |record| {
                record.state = JobState::Running;
                record.message = "running".to_string();
            });
            tracing::debug!(job = %context.id, ?kind, "job started");

            let outcome = catch_unwind(AssertUnwindSafe(|| work(&context)));
            let (state, result, error) = match outcome {
                Ok(Ok(value)) => match serde_json::to_value(value) {
                    Ok(json) => (JobState::Done, Some(json), None),
                    Err(e) => (JobState::Failed, None, Some(e.to_string())),
                },
                Ok(Err(e)) => (JobState::Failed, None, Some(e.to_string())),
                Err(_) => (JobState::Failed, None, Some("job panicked".to_string())),
            };

            if let Some(e) = &error {
                tracing::warn!(job = %context.id, error = %e, "job failed");
            }
            let message = match state {
                JobState::Done => "done",
                _ => "failed",
            };
            inner.update(&context.id, |record| {
                record.state = state;
                record.message = message.to_string();
                record.result = result;
                record.error = error;
            });
        });

        if let Some(entry) = lock(&self.inner.jobs).get_mut(&id) {
            entry.handle = Some(handle);
        }
        id
    }

    pub fn spawn_analyze(&self, root: &Path, options: AnalyzeOptions) -> String {
        let target = root.to_path_buf();
        self.spawn(root, JobKind::Analyze, move |ctx| {
            analyze_with(&target, &options, ctx, ctx.cancel_token())
        })
    }

    pub fn spawn_execute(&self, mut plan: MovePlan, options: ExecuteOptions) -> String {
        let root = plan.root.clone();
        self.spawn(&root, JobKind::Execute, move |ctx| {
            let result = Executor::new(options)
                .with_observer(ctx.clone())
                .with_cancel(ctx.cancel_token().clone())
                .execute(&mut plan, true)?;
            Ok::<_, ExecuteError>(serde_json::json!({
                "result": result,
                "plan": plan,
            }))
        })
    }

    /// Undo jobs are serialized on the root recorded in the log. A log that
    /// cannot be read gives a job that fails straight away.
    pub fn spawn_undo(&self, rollback_file: PathBuf, options: UndoOptions) -> String {
        match RollbackLog::load(&rollback_file) {
            Ok(log) => self.spawn(&log.root, JobKind::Undo, move |ctx| {
                undo_file_with(&rollback_file, &options, &FsMover, ctx)
            }),
            Err(e) => {
                let dir = rollback_file
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                self.spawn(&dir, JobKind::Undo, move |_| Err::<(), _>(e))
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        lock(&self.inner.jobs).get(id).map(|entry| entry.record.clone())
    }

    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<_> = lock(&self.inner.jobs)
            .values()
            .map(|entry| entry.record.clone())
            .collect();
        records.sort_by_key(|r| {
            r.id.trim_start_matches("job-")
                .parse::<u64>()
                .unwrap_or_default()
        });
        records
    }

    /// Requests cancellation; returns false for unknown or finished jobs.
    pub fn cancel(&self, id: &str) -> bool {
        match lock(&self.inner.jobs).get(id) {
            Some(entry) if !entry.record.state.is_finished() => {
                entry.cancel.cancel();
                true
            }
            _ => false,
        }
    }

    /// Forgets a finished job and returns its final record. Pending and
    /// running jobs are kept.
    pub fn remove(&self, id: &str) -> Option<JobRecord> {
        let removed = {
            let mut jobs = lock(&self.inner.jobs);
            match jobs.get(id) {
                Some(entry) if entry.record.state.is_finished() => jobs.remove(id),
                _ => None,
            }
        }?;
        self.inner.prune_roots();
        Some(removed.record)
    }

    /// Forgets every finished job; returns how many were dropped.
    pub fn prune_finished(&self) -> usize {
        let pruned = {
            let mut jobs = lock(&self.inner.jobs);
            let before = jobs.len();
            jobs.retain(|_, entry| !entry.record.state.is_finished());
            before - jobs.len()
        };
        self.inner.prune_roots();
        pruned
    }

    /// Blocks until the job finishes and returns its final record.
    pub fn wait(&self, id: &str) -> Option<JobRecord> {
        let handle = lock(&self.inner.jobs).get_mut(id)?.handle.take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            self.inner.update(id, |record| {
                record.state = JobState::Failed;
                record.error = Some("job thread panicked".to_string());
            });
        }
        self.get(id)
    }
}
