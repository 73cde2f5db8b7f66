//! Timer scheduling
//!
//! A small wrapper over tokio tasks that enforces the cancellation rules the
//! pipeline relies on: starting a scheduler that is already running replaces
//! the existing timer (never stacks a second one), and stopping aborts the
//! underlying task so no further callbacks fire.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Recurring timer with replace-don't-stack semantics
#[derive(Default)]
pub struct Scheduler {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start firing `task` every `period`, replacing any existing timer.
    /// The first invocation happens one full period after start.
    pub fn start<F, Fut>(&self, period: Duration, mut task: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let new_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick of a tokio interval completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                task().await;
            }
        });

        if let Ok(mut handle) = self.handle.lock() {
            if let Some(old) = handle.replace(new_handle) {
                old.abort();
            }
        }
    }

    /// Abort the timer. Safe to call when idle; no callback fires after
    /// this returns.
    pub fn stop(&self) {
        if let Ok(mut handle) = self.handle.lock() {
            if let Some(old) = handle.take() {
                old.abort();
            }
        }
    }

    /// Whether a timer task is currently scheduled
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .map(|h| h.as_ref().is_some_and(|t| !t.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_fires_periodically() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        scheduler.start(Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(count.load(Ordering::SeqCst) >= 2);
        assert!(scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_future_ticks() {
        let scheduler = Scheduler::new();
        let count = Arc::new(AtomicUsize::new(0));

        let counter = count.clone();
        scheduler.start(Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(25)).await;
        scheduler.stop();
        let after_stop = count.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), after_stop);
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_timer() {
        let scheduler = Scheduler::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        scheduler.start(Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let counter = second.clone();
        scheduler.start(Duration::from_millis(10), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(45)).await;

        // Only the replacement timer fires
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert!(second.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_noop() {
        let scheduler = Scheduler::new();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
