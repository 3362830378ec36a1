//! Fire-and-forget cache writes with an observable completion point.

use crate::metrics::CacheMetrics;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::warn;

/// Tracks cache work detached from the caller.
///
/// Tasks never report back to the caller; failures are logged inside the
/// task. [`settle`](Self::settle) waits until nothing is in flight, which
/// gives tests and graceful shutdown a deterministic point to observe.
#[derive(Clone, Default)]
pub(crate) struct BackgroundTasks {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when the task finishes or is dropped.
struct Completion(Arc<Inner>);

impl Drop for Completion {
    fn drop(&mut self) {
        let remaining = self.0.in_flight.fetch_sub(1, Ordering::AcqRel) - 1;
        CacheMetrics::background_tasks(remaining);
        if remaining == 0 {
            self.0.idle.notify_waiters();
        }
    }
}

impl BackgroundTasks {
    /// Run `task` without awaiting it.
    ///
    /// Outside a Tokio runtime the task is dropped with a warning.
    pub(crate) fn spawn<F>(&self, op: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(op, "No async runtime available; background cache task skipped");
            return;
        };

        let count = self.inner.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        CacheMetrics::background_tasks(count);
        let completion = Completion(Arc::clone(&self.inner));

        handle.spawn(async move {
            let _completion = completion;
            task.await;
        });
    }

    /// Number of tasks still running.
    pub(crate) fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Wait until every spawned task has finished.
    pub(crate) async fn settle(&self) {
        loop {
            let idle = self.inner.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }
}
