//! Blocking provider adapter.
//!
//! Wraps a synchronous [`SyncWebSearcher`] so its calls run on tokio's
//! blocking threads, bounded by a shared [`WorkerPool`], and never stall the
//! async executor.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::error::{ResearchError, Result};
use crate::traits::searcher::{SyncWebSearcher, WebHit, WebSearcher};

/// Bounded pool of blocking worker slots shared across providers.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
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

    /// Slots not currently in use.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `work` on a blocking thread once a slot is free.
    pub async fn run<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ResearchError::Config(format!("worker pool closed: {e}")))?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        })
        .await
        .map_err(|e| ResearchError::Config(format!("blocking worker panicked: {e}")))?
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Async [`WebSearcher`] over a synchronous provider.
pub struct BlockingSearcher<S: SyncWebSearcher> {
    inner: Arc<S>,
    pool: WorkerPool,
}

impl<S: SyncWebSearcher> BlockingSearcher<S> {
    pub fn new(inner: S, pool: WorkerPool) -> Self {
        Self {
            inner: Arc::new(inner),
            pool,
        }
    }
}

#[async_trait]
impl<S: SyncWebSearcher> WebSearcher for BlockingSearcher<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebHit>> {
        let inner = Arc::clone(&self.inner);
        let query = query.to_string();
        self.pool
            .run(move || inner.search_blocking(&query, max_results))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct SlowSearcher {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl SyncWebSearcher for SlowSearcher {
        fn name(&self) -> &str {
            "legacy"
        }

        fn search_blocking(&self, query: &str, _max_results: usize) -> Result<Vec<WebHit>> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(vec![WebHit::new("legacy", format!("https://legacy.example/{query}"))])
        }
    }

    #[tokio::test]
    async fn test_runs_sync_provider() {
        let searcher = BlockingSearcher::new(
            SlowSearcher {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            },
            WorkerPool::new(2),
        );
        let hits = searcher.search("ferry", 5).await.unwrap();
        assert_eq!(hits[0].url, "https://legacy.example/ferry");
        assert_eq!(searcher.name(), "legacy");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pool_bounds_concurrency() {
        let searcher = Arc::new(BlockingSearcher::new(
            SlowSearcher {
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            },
            WorkerPool::new(2),
        ));

        let calls = (0..6).map(|i| {
            let searcher = Arc::clone(&searcher);
            tokio::spawn(async move { searcher.search(&i.to_string(), 1).await })
        });
        for handle in futures::future::join_all(calls).await {
            assert!(handle.unwrap().is_ok());
        }

        assert!(searcher.inner.peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(searcher.pool.available(), 2);
    }
}
