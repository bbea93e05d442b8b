//! Bounded worker pool for network and filesystem work.
//!
//! One webhook maps to one pipeline invocation; the pool caps how many
//! invocations make progress at once so a slow provider cannot stall
//! every other request.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::debug;

use crate::error::{Classify, ErrorKind};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("worker pool needs at least one worker")]
    ZeroWorkers,

    #[error("worker pool is closed")]
    Closed,

    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Classify for PoolError {
    fn kind(&self) -> ErrorKind {
        match self {
            PoolError::ZeroWorkers => ErrorKind::Configuration,
            PoolError::Closed | PoolError::Join(_) => ErrorKind::Other,
        }
    }
}

/// Semaphore-bounded executor. Cheap to clone; clones share permits.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::ZeroWorkers);
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of workers currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Wait for a free worker, then drive `fut` to completion while holding it.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, PoolError>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;
        debug!(available = self.permits.available_permits(), "Worker acquired");
        Ok(fut.await)
    }

    /// Run a blocking closure on the blocking thread pool while holding a worker.
    pub async fn run_blocking<F, T>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        Ok(tokio::task::spawn_blocking(f).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(PoolError::ZeroWorkers)));
    }

    #[tokio::test]
    async fn test_run_returns_value() {
        let pool = WorkerPool::new(2).unwrap();
        let value = pool.run(async { 7 }).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_run_blocking_returns_value() {
        let pool = WorkerPool::new(1).unwrap();
        let value = pool.run_blocking(|| 2 + 2).await.unwrap();
        assert_eq!(value, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let pool = WorkerPool::new(2).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let pool = pool.clone();
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    pool.run(async {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
                })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            task.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(pool.available(), 2);
    }
}
