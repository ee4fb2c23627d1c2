//! Registry of detached tasks.
//!
//! Countdowns and audio cues are fire-and-forget from the message loop, but
//! they are never left unattended: every task gets a `TaskId`, a watcher that
//! reports how it ended, and can be aborted. A panic inside a cue is caught
//! by the runtime, logged here, and goes no further.

use parking_lot::Mutex;
use slotmap::SlotMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error};

use crate::common::{TaskId, TaskKind};
use crate::events::TaskEvent;

struct TaskEntry {
    kind: TaskKind,
    abort: AbortHandle,
}

/// Spawns, tracks and reaps detached tasks.
#[derive(Clone)]
pub struct Supervisor {
    tasks: Arc<Mutex<SlotMap<TaskId, TaskEntry>>>,
    events: broadcast::Sender<TaskEvent>,
}

impl Supervisor {
    pub fn new(events: broadcast::Sender<TaskEvent>) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(SlotMap::with_key())),
            events,
        }
    }

    /// Subscribes to the `TaskEvent` stream.
    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    /// Runs an async task under supervision.
    pub fn spawn<F>(&self, kind: TaskKind, task: F) -> TaskId
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // Hold the registry lock across the spawn so the entry exists before
        // the reaper can try to remove it.
        let mut tasks = self.tasks.lock();
        let handle = tokio::spawn(task);
        let id = tasks.insert(TaskEntry {
            kind,
            abort: handle.abort_handle(),
        });
        drop(tasks);
        self.reap(id, kind, handle);
        id
    }

    /// Runs blocking work (audio playback) on the blocking pool under
    /// supervision. Blocking work cannot be interrupted once started.
    pub fn spawn_blocking<F>(&self, kind: TaskKind, work: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        let mut tasks = self.tasks.lock();
        let handle = tokio::task::spawn_blocking(work);
        let id = tasks.insert(TaskEntry {
            kind,
            abort: handle.abort_handle(),
        });
        drop(tasks);
        self.reap(id, kind, handle);
        id
    }

    fn reap(&self, id: TaskId, kind: TaskKind, handle: JoinHandle<()>) {
        self.events.send(TaskEvent::Spawned { id, kind }).ok();
        debug!(%kind, ?id, "task spawned");
        let tasks = self.tasks.clone();
        let events = self.events.clone();
        tokio::spawn(async move {
            let event = match handle.await {
                Ok(()) => TaskEvent::Finished { id, kind },
                Err(err) if err.is_panic() => {
                    error!(%kind, ?id, "supervised task panicked");
                    TaskEvent::Panicked { id, kind }
                }
                Err(_) => TaskEvent::Aborted { id, kind },
            };
            tasks.lock().remove(id);
            debug!(%kind, ?id, ?event, "task ended");
            events.send(event).ok();
        });
    }

    /// Aborts one task. Returns `true` if it was still registered.
    pub fn abort(&self, id: TaskId) -> bool {
        match self.tasks.lock().get(id) {
            Some(entry) => {
                entry.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Number of live tasks of `kind`.
    pub fn running(&self, kind: TaskKind) -> usize {
        self.tasks
            .lock()
            .values()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    /// Aborts everything still registered.
    pub fn shutdown(&self) {
        let tasks = self.tasks.lock();
        for entry in tasks.values() {
            entry.abort.abort();
        }
        debug!(count = tasks.len(), "supervisor shut down");
    }
}
