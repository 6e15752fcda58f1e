use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

use crate::error::CrawlError;

/// Bounded admission control for crawl branches.
///
/// At most `limit` branches hold a permit (and therefore execute) at once;
/// the rest wait in the semaphore's queue. Registered-but-unfinished branches
/// are counted separately so `drain` can block until no branch is in flight
/// or pending, without busy-spinning.
pub struct BranchScheduler {
    permits: Arc<Semaphore>,
    in_flight: AtomicUsize,
    idle: Notify,
    cancelled: AtomicBool,
}

impl BranchScheduler {
    pub fn new(limit: usize) -> Result<Self, CrawlError> {
        if limit == 0 {
            return Err(CrawlError::config(
                "concurrency limit must be greater than 0",
            ));
        }
        Ok(Self {
            permits: Arc::new(Semaphore::new(limit)),
            in_flight: AtomicUsize::new(0),
            idle: Notify::new(),
            cancelled: AtomicBool::new(false),
        })
    }

    /// Registers a branch before it is offered for admission. Must be paired
    /// with exactly one `finish` call.
    pub fn register(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    /// Waits for an execution slot. Returns `None` only if the semaphore was
    /// closed, which callers treat as cancellation.
    pub async fn admit(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).acquire_owned().await.ok()
    }

    /// Marks a registered branch as done and wakes drainers when it was the
    /// last one.
    pub fn finish(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }

    /// Blocks until no branch is in flight or pending.
    pub async fn drain(&self) {
        loop {
            let notified = self.idle.notified();
            if self.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stops admission of new branches; branches already running finish
    /// normally.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_admission_never_exceeds_limit() {
        let scheduler = Arc::new(BranchScheduler::new(3).unwrap());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            scheduler.register();
            let scheduler = Arc::clone(&scheduler);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                let _permit = scheduler.admit().await.unwrap();
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                scheduler.finish();
            }));
        }

        scheduler.drain().await;
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert!(peak.load(Ordering::SeqCst) >= 1);
        assert_eq!(scheduler.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_drain_returns_immediately_when_idle() {
        let scheduler = BranchScheduler::new(2).unwrap();
        scheduler.drain().await;
    }

    #[tokio::test]
    async fn test_drain_waits_for_registered_branches() {
        let scheduler = Arc::new(BranchScheduler::new(1).unwrap());
        scheduler.register();

        let worker = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move {
                let _permit = scheduler.admit().await.unwrap();
                sleep(Duration::from_millis(20)).await;
                scheduler.finish();
            })
        };

        scheduler.drain().await;
        assert_eq!(scheduler.in_flight(), 0);
        worker.await.unwrap();
    }

    #[test]
    fn test_zero_limit_rejected() {
        assert!(matches!(
            BranchScheduler::new(0),
            Err(CrawlError::Config(_))
        ));
    }

    #[test]
    fn test_cancel_flag() {
        let scheduler = BranchScheduler::new(1).unwrap();
        assert!(!scheduler.is_cancelled());
        scheduler.cancel();
        assert!(scheduler.is_cancelled());
    }
}
