//! Process-wide bounded worker pool for data-source calls.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::warn;

/// Bounded pool of concurrent source calls.
///
/// Submissions beyond capacity wait for a free permit instead of being
/// rejected. Each submission runs on its own tokio task, so dropping the
/// returned handle detaches the work rather than cancelling it.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// A pool with `size` permits. A size of zero is raised to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Permits not currently held by a running task.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Queue `work` on the pool.
    pub fn submit<F>(&self, work: F) -> JoinHandle<Option<F::Output>>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        tokio::spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                warn!("Worker pool closed before task could start");
                return None;
            };
            Some(work.await)
        })
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(8)
    }
}
