use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::Semaphore;
use tokio::task;

use crate::bridge::PaneTarget;

/// Bounded pool that runs every blocking bridge and file-store call off the
/// async scheduler, plus the per-pane serialization locks for keystroke
/// injection.
///
/// Capture calls take only a worker permit; inject calls additionally hold
/// their pane's lock, so injections against one pane land in submission
/// order and never interleave. The lock is a tokio mutex, which is FIFO.
#[derive(Clone)]
pub struct BridgeRuntime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    workers: Semaphore,
    inject_locks: Mutex<HashMap<PaneTarget, Arc<Mutex<()>>>>,
}

impl BridgeRuntime {
    pub fn new(worker_count: usize) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                workers: Semaphore::new(worker_count.max(1)),
                inject_locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Run a blocking call on the pool and await its result.
    pub async fn run<T, F>(&self, f: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        // The semaphore is owned by `inner` and never closed.
        let _permit = self.inner.workers.acquire().await.ok();
        match task::spawn_blocking(f).await {
            Ok(value) => value,
            // Blocking tasks are never aborted, so a join error is a panic
            // in the closure; surface it on the caller.
            Err(err) => std::panic::resume_unwind(err.into_panic()),
        }
    }

    /// Run a blocking inject call while holding the pane's serialization
    /// lock. Concurrent callers against the same pane are applied in the
    /// order their calls were accepted.
    pub async fn run_inject<T, F>(&self, target: &PaneTarget, f: F) -> T
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let lock = self.inject_lock(target).await;
        let _guard = lock.lock().await;
        self.run(f).await
    }

    async fn inject_lock(&self, target: &PaneTarget) -> Arc<Mutex<()>> {
        let mut locks = self.inner.inject_locks.lock().await;
        Arc::clone(locks.entry(target.clone()).or_default())
    }
}
