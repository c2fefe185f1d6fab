//! Start barrier for parallel benchmark workers.
//!
//! A worker must not start generating load until every worker of its job has
//! been scheduled, otherwise early workers measure a partially loaded
//! cluster. Each worker polls a view of how many workers of its job have
//! reached the barrier and proceeds once that count reaches the job size.
//!
//! The arrival count only grows. A worker that finishes quickly after release
//! must not pull the count back under the job size while slower workers are
//! still polling.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Arrival count of one job, as seen from inside a worker.
#[async_trait]
pub trait JobCountView: Send + Sync {
    /// Workers that have reached the barrier so far, including finished ones.
    async fn arrived_workers(&self) -> Result<usize>;
}

/// Shared in-process counters used by the local facade.
///
/// `arrived` is monotonic and drives the barrier; `running` is the live
/// figure reported through job status.
#[derive(Debug, Clone, Default)]
pub struct WorkerCounter {
    arrived: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
}

impl WorkerCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark one worker as arrived and running. Returns the arrival count.
    pub fn register(&self) -> usize {
        self.running.fetch_add(1, Ordering::SeqCst);
        self.arrived.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Mark one worker as no longer running. The arrival count is unchanged.
    pub fn deregister(&self) {
        let _ = self
            .running
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }

    pub fn arrived(&self) -> usize {
        self.arrived.load(Ordering::SeqCst)
    }

    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobCountView for WorkerCounter {
    async fn arrived_workers(&self) -> Result<usize> {
        Ok(self.arrived())
    }
}

/// Block until `expected` workers have arrived.
///
/// Query failures are logged and retried without limit; the job's own
/// timeout bounds how long a worker can wait here.
pub async fn wait_for_start(
    view: &dyn JobCountView,
    expected: usize,
    poll_interval: Duration,
) -> usize {
    loop {
        match view.arrived_workers().await {
            Ok(arrived) if arrived >= expected => return arrived,
            Ok(arrived) => {
                debug!("Waiting for workers: {}/{} arrived", arrived, expected);
            }
            Err(e) => {
                warn!("Failed to query arrived workers: {:#}", e);
            }
        }
        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FlakyView {
        responses: Mutex<Vec<Result<usize>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl JobCountView for FlakyView {
        async fn arrived_workers(&self) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok(usize::MAX)
            } else {
                responses.remove(0)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_barrier_retries_query_failures() {
        let view = FlakyView {
            responses: Mutex::new(vec![
                Ok(1),
                Err(anyhow::anyhow!("throttled")),
                Ok(2),
                Ok(3),
            ]),
            calls: AtomicUsize::new(0),
        };

        let running = wait_for_start(&view, 3, Duration::from_secs(5)).await;
        assert_eq!(running, 3);
        assert_eq!(view.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_barrier_releases_all_workers_together() {
        let counter = WorkerCounter::new();
        let mut handles = Vec::new();

        for _ in 0..4 {
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                counter.register();
                wait_for_start(&counter, 4, Duration::from_millis(100)).await
            }));
            tokio::time::sleep(Duration::from_secs(1)).await;
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 4);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_barrier_releases_after_early_worker_exits() {
        let counter = WorkerCounter::new();
        let mut handles = Vec::new();

        for _ in 0..3 {
            let counter = counter.clone();
            handles.push(tokio::spawn(async move {
                counter.register();
                wait_for_start(&counter, 4, Duration::from_secs(1)).await
            }));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        // The last worker passes straight through and exits before the
        // others poll again.
        assert_eq!(counter.register(), 4);
        assert_eq!(wait_for_start(&counter, 4, Duration::from_secs(1)).await, 4);
        counter.deregister();
        assert_eq!(counter.running(), 3);

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 4);
        }
    }

    #[test]
    fn test_counter_never_underflows() {
        let counter = WorkerCounter::new();
        counter.deregister();
        assert_eq!(counter.running(), 0);
        assert_eq!(counter.register(), 1);
        counter.deregister();
        assert_eq!(counter.running(), 0);
        assert_eq!(counter.arrived(), 1);
    }
}
