//! Cancelable polling task bound to an active context.
//!
//! Transient UI-state checks (dialog presence and the like) run on an
//! interval; the handle guarantees the timer stops when its owning context
//! goes away, either by explicit `cancel()` or by dropping the handle.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub struct PollTask {
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Run `tick` every `interval` until it returns false or the task is
    /// canceled. The first tick fires after one full interval.
    pub fn spawn<F>(interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(interval);
            // Consume the immediate first tick so the cadence starts after
            // one interval
            timer.tick().await;
            loop {
                timer.tick().await;
                if !tick() {
                    debug!("Poll task stopping (tick returned false)");
                    break;
                }
            }
        });
        Self { handle }
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_on_interval() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let _task = PollTask::spawn(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        tokio::task::yield_now().await;
        assert!(count.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticking() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = PollTask::spawn(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            true
        });

        task.cancel();
        tokio::task::yield_now().await;
        let after_cancel = count.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), after_cancel);
    }

    #[tokio::test(start_paused = true)]
    async fn test_false_return_stops_task() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let task = PollTask::spawn(Duration::from_secs(1), move || {
            counter.fetch_add(1, Ordering::SeqCst) < 2
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(task.is_finished());
    }
}
