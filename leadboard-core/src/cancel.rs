/// Cancellation primitives for debounced, superseding work.
///
/// A `CancelToken` is a shared flag backed by a watch channel: every clone
/// observes the same state, and `cancelled()` resolves once any holder calls
/// `cancel()`. A `TaskSlot` owns at most one running task; putting a new task
/// in the slot cancels the old token and aborts the old join handle.
use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the token is cancelled. Never resolves otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives inside `self`, so `wait_for` cannot fail while we
        // hold a reference to it.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

struct RunningTask {
    token: CancelToken,
    handle: JoinHandle<()>,
}

/// Holds the single outstanding task for one owner.
#[derive(Default)]
pub struct TaskSlot {
    current: Option<RunningTask>,
}

impl TaskSlot {
    pub fn new() -> Self {
        Self { current: None }
    }

    /// Cancel the current task (if any) and spawn `make(token)` in its place.
    pub fn replace<F, Fut>(&mut self, make: F) -> CancelToken
    where
        F: FnOnce(CancelToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let token = CancelToken::new();
        let handle = tokio::spawn(make(token.clone()));
        self.current = Some(RunningTask {
            token: token.clone(),
            handle,
        });
        token
    }

    /// Cancel and abort the current task. Returns true if one was running.
    pub fn cancel(&mut self) -> bool {
        match self.current.take() {
            Some(task) => {
                task.token.cancel();
                let was_running = !task.handle.is_finished();
                task.handle.abort();
                was_running
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}
