//! UI-facing callbacks and the executor that serializes them.

use crate::state::SyncStatus;
use parking_lot::Mutex;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// Receives everything the engine surfaces to the application.
pub trait UiDelegate: Send + Sync {
    /// An encoded update or update container tagged with `type_tag`.
    fn on_update(&self, type_tag: i64, bytes: Vec<u8>);

    /// The sync status changed.
    fn on_sync_status_changed(&self, status: SyncStatus);
}

/// A unit of work for a [`UiExecutor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs UI callbacks.
pub trait UiExecutor: Send + Sync {
    /// Schedules `job`.
    fn execute(&self, job: Job);
}

/// Runs jobs one at a time on a dedicated worker thread, in submission order.
pub struct SerialExecutor {
    sender: Option<mpsc::UnboundedSender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialExecutor {
    /// Spawns the worker thread.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let worker = std::thread::Builder::new()
            .name("tideline-ui".into())
            .spawn(move || {
                while let Some(job) = receiver.blocking_recv() {
                    job();
                }
            });
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "failed to spawn ui executor thread");
                None
            }
        };
        Self {
            sender: Some(sender),
            worker,
        }
    }

    /// Blocks until every job submitted so far has run.
    pub fn flush(&self) {
        let (done, wait) = oneshot::channel::<()>();
        self.execute(Box::new(move || {
            let _ = done.send(());
        }));
        let _ = wait.blocking_recv();
    }
}

impl Default for SerialExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl UiExecutor for SerialExecutor {
    fn execute(&self, job: Job) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(job).is_err() {
            warn!("ui executor is gone, dropping job");
        }
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        // closing the channel lets the worker drain and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// Runs jobs on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl UiExecutor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// A [`UiDelegate`] that stores what it receives.
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    updates: Mutex<Vec<(i64, Vec<u8>)>>,
    statuses: Mutex<Vec<SyncStatus>>,
}

impl RecordingDelegate {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates received so far.
    pub fn updates(&self) -> Vec<(i64, Vec<u8>)> {
        self.updates.lock().clone()
    }

    /// Status changes received so far.
    pub fn statuses(&self) -> Vec<SyncStatus> {
        self.statuses.lock().clone()
    }
}

impl UiDelegate for RecordingDelegate {
    fn on_update(&self, type_tag: i64, bytes: Vec<u8>) {
        self.updates.lock().push((type_tag, bytes));
    }

    fn on_sync_status_changed(&self, status: SyncStatus) {
        self.statuses.lock().push(status);
    }
}
