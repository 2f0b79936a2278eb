use std::num::NonZeroUsize;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
#[error("worker pool is closed")]
pub struct PoolError;

/// Bounded set of slots for blocking probe work.
///
/// Jobs run on tokio's blocking threads, but never more than `size` at once,
/// however many callers submit concurrently. Clones share the same slots.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        let size = std::thread::available_parallelism().map_or(4, NonZeroUsize::get);
        Self::new(size)
    }
}

impl WorkerPool {
    /// A pool of `size` slots. A size of 0 is raised to 1.
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

    /// Slots not currently held by a running job.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Waits for a free slot, then starts `job` on a blocking thread.
    ///
    /// The slot stays taken until `job` returns, even if the returned handle
    /// is dropped or aborted first.
    pub async fn submit<F, T>(&self, job: F) -> Result<JoinHandle<T>, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError)?;

        Ok(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        }))
    }
}
